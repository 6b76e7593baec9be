//! v128-shell - headless entry point
//!
//! Loads the configuration, starts the shell against the headless backend
//! and runs the event loop until a quit binding or the event source closes.

use std::path::PathBuf;

use anyhow::Context;
use log::info;
use v128_shell::backend::{EventLoop, HeadlessBackend};
use v128_shell::config::ShellConfig;
use v128_shell::shell::Shell;

/// Log to stderr, or to `<log_dir>/v128-shell.log` when a log directory is
/// configured
fn init_logging(config: &ShellConfig) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(file) = config.open_shell_log()? {
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(config: ShellConfig) -> anyhow::Result<()> {
    info!("Starting v128-shell");

    let backend = HeadlessBackend::new(config.headless_outputs());
    let mut shell = Shell::start(&config, backend).context("Failed to start shell")?;

    // A provider pushes its events through this sender
    let (mut event_loop, _events) = EventLoop::new()?;
    event_loop.run(&mut shell)?;

    info!("v128-shell exiting");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ShellConfig::load_or_default(config_path.as_deref())?;

    // Initialize logging
    init_logging(&config)?;

    run(config)
}
