//! v128-shell - window-management policy for a Wayland compositor
//!
//! v128-shell is the shell layer of a compositor: it decides where outputs
//! sit, how windows stack, who gets keyboard focus and the pointer grab,
//! where input goes, and where layer-shell surfaces (bars, panels, lock
//! screens) are placed. Rendering, protocol plumbing and device I/O belong to
//! a primitives provider behind the [`backend::Backend`] trait.
//!
//! # Architecture
//!
//! - **Shell Core**: output registry, surface stack, focus state machine and
//!   layer-shell placement resolver, wired together by [`shell::Shell`]
//! - **Input**: keybindings and the router that sends each event to a binding
//!   or a client surface
//! - **Backend**: the provider interface, a headless provider and the calloop
//!   event loop that feeds [`shell::ShellEvent`]s into the shell
//! - **Launcher**: subprograms started by bindings and autostart
//!
//! # Example
//!
//! ```no_run
//! use v128_shell::backend::{EventLoop, HeadlessBackend};
//! use v128_shell::config::ShellConfig;
//! use v128_shell::shell::Shell;
//!
//! let config = ShellConfig::default();
//! let backend = HeadlessBackend::new(config.headless_outputs());
//! let mut shell = Shell::start(&config, backend).unwrap();
//! let (mut event_loop, _events) = EventLoop::new().unwrap();
//! event_loop.run(&mut shell).unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod input;
pub mod launcher;
pub mod shell;

pub use error::{Result, ShellError};
