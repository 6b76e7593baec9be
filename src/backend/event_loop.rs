//! Event loop integration
//!
//! Feeds provider events into the shell through a calloop channel, one at a
//! time and in arrival order, and reaps subprograms on a timer while idle.

use std::time::Duration;

use calloop::channel::{self, Channel, Sender};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop as CalLoop, LoopHandle, LoopSignal};
use log::{debug, error, info};

use crate::backend::Backend;
use crate::shell::{Shell, ShellEvent};

/// How often exited subprograms are collected when no events arrive
const REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Shell event loop wrapper
pub struct EventLoop<B: Backend + 'static> {
    /// Calloop event loop
    event_loop: CalLoop<'static, Shell<B>>,
    /// Loop signal for waking/stopping
    signal: LoopSignal,
}

impl<B: Backend + 'static> EventLoop<B> {
    /// Create a new event loop and the sender providers push events into.
    ///
    /// Dropping every sender stops the shell.
    pub fn new() -> anyhow::Result<(Self, Sender<ShellEvent>)> {
        let event_loop = CalLoop::try_new()?;
        let signal = event_loop.get_signal();
        let (sender, events): (Sender<ShellEvent>, Channel<ShellEvent>) = channel::channel();

        event_loop
            .handle()
            .insert_source(events, |event, _, shell: &mut Shell<B>| match event {
                channel::Event::Msg(event) => shell.dispatch(event),
                channel::Event::Closed => {
                    info!("Event source closed");
                    shell.stop();
                }
            })
            .map_err(|e| anyhow::anyhow!("Failed to register event channel: {}", e.error))?;

        event_loop
            .handle()
            .insert_source(Timer::from_duration(REAP_INTERVAL), |_, _, shell: &mut Shell<B>| {
                shell.reap_children();
                TimeoutAction::ToDuration(REAP_INTERVAL)
            })
            .map_err(|e| anyhow::anyhow!("Failed to register reaper timer: {}", e.error))?;

        Ok((Self { event_loop, signal }, sender))
    }

    /// Get a handle to register event sources
    pub fn handle(&self) -> LoopHandle<'static, Shell<B>> {
        self.event_loop.handle()
    }

    /// Get the loop signal for waking
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Run one iteration of the event loop
    pub fn dispatch(&mut self, timeout: Option<Duration>, shell: &mut Shell<B>) -> anyhow::Result<()> {
        self.event_loop.dispatch(timeout, shell)?;
        Ok(())
    }

    /// Run the event loop until the shell stops
    pub fn run(&mut self, shell: &mut Shell<B>) -> anyhow::Result<()> {
        debug!("Starting event loop");

        let signal = self.signal.clone();
        let result = self.event_loop.run(None, shell, |shell| {
            if !shell.is_running() {
                signal.stop();
            }
        });
        if let Err(e) = &result {
            error!("Event loop error: {}", e);
        }
        result?;

        debug!("Event loop finished");
        Ok(())
    }

    /// Stop the event loop
    pub fn stop(&self) {
        self.signal.stop();
    }

    /// Wake the event loop from another thread
    pub fn wake(&self) {
        self.signal.wakeup();
    }
}
