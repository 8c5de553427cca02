//! Core abstractions for planar reflections.
//!
//! This crate holds everything about mirroring a camera across a reflecting
//! surface that does not touch the GPU:
//! - [`ReflectionPlane`] derivation and point/basis mirroring
//! - [`OffsetBlender`] for artistic adjustments to the mirrored pose
//! - [`LodResolver`] for distance-based render-target sizing
//! - [`ReflectionSolver`], the per-frame state machine driving it all
//! - Collaborator traits ([`MirrorCamera`], [`RenderTarget`],
//!   [`ParameterSink`]) through which a host engine applies the outputs

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Settings structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod cache;
pub mod camera;
pub mod error;
pub mod lod;
pub mod offset;
pub mod params;
pub mod plane;
pub mod solver;
pub mod surface;
pub mod transform;

pub use cache::{ApproxTransform, Cache};
pub use camera::{
    CameraState, EditorViewportProbe, MirrorCamera, MirroredProjection, ProjectionMode,
    RenderTarget,
};
pub use error::{Result, SolverError};
pub use lod::{LodResolver, LodSettings};
pub use offset::{OffsetBlendMode, OffsetBlender, OffsetSettings};
pub use params::{ParamKey, ParamValue, ParamWriter, ParameterSink, TextureHandle};
pub use plane::{PlaneCache, ReflectionPlane};
pub use solver::{HostFrame, ReflectionSolver, SolverState, TickOutcome};
pub use surface::SurfaceSettings;
pub use transform::Transform3;

// Re-export glam types for convenience
pub use glam::{Mat3, Mat4, UVec2, Vec3};
