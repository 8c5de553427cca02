//! GPU stage of the planar reflection system.
//!
//! This crate provides the wgpu-based intersection mask pass, including:
//! - Parameter packing with matrix caching and upload dedup
//! - The two-pass separable compute pipeline with a bind-group cache
//! - Lazy intermediate-image management

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod mask_params;
pub mod mask_pipeline;

pub use error::{RenderError, RenderResult};
pub use mask_params::{MaskParamsPacker, MaskSettings, ParamBlock, PARAM_FLOATS};
pub use mask_pipeline::IntersectionMaskPipeline;
