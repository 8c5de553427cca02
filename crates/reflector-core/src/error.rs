//! Error types for reflector-core.

use thiserror::Error;

/// Errors surfaced by the reflection solver at its non-frame seams.
///
/// Per-tick failure conditions (missing collaborators, startup ordering
/// races) are deliberately not errors; the solver suspends and retries.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The reflecting surface is not attached to an active scene, so no
    /// reflection plane exists.
    #[error("reflecting surface is detached from the scene")]
    SurfaceDetached,

    /// Mirroring was attempted through the invalid-plane sentinel.
    #[error("reflection plane is degenerate")]
    DegeneratePlane,
}

/// A specialized Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
