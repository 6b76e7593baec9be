//! Shell error types

use thiserror::Error;

use crate::shell::{Edge, OutputId, SurfaceId};

/// Errors raised by the shell components
///
/// Only [`ShellError::NoOutputAvailable`] is fatal: it fails
/// [`Shell::start`](crate::shell::Shell::start) and stops a running shell.
/// Everything else is logged and dropped at the dispatch boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("no enabled output available")]
    NoOutputAvailable,

    #[error("surface {0:?} cannot take keyboard focus")]
    NotFocusable(SurfaceId),

    #[error("exclusive zone of {surface:?} overlaps another zone on the {edge:?} edge of {output:?}")]
    PlacementConflict {
        surface: SurfaceId,
        output: OutputId,
        edge: Edge,
    },

    #[error("unknown surface {0:?}")]
    UnknownSurface(SurfaceId),

    #[error("unknown output {0:?}")]
    UnknownOutput(OutputId),

    #[error("output {0:?} is already registered")]
    OutputExists(OutputId),

    #[error("surface {0:?} is already mapped")]
    SurfaceExists(SurfaceId),
}

impl ShellError {
    /// Whether the error must terminate the shell
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::NoOutputAvailable)
    }
}

/// Result type for shell operations
pub type Result<T> = std::result::Result<T, ShellError>;
