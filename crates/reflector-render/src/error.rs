//! Rendering error types.

use thiserror::Error;

/// Errors that can occur while setting up the GPU mask pass.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The render-target color format cannot be used as a storage texture.
    #[error("color format {0:?} is not usable as a storage texture")]
    UnsupportedColorFormat(wgpu::TextureFormat),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
