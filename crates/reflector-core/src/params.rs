//! Shader parameter bundle emitted by the solver.
//!
//! The host material system is loosely typed, so values travel as a small
//! tagged variant instead of an open-ended map. Writes are deduplicated per
//! parameter with float tolerance, so an unchanged frame produces zero sink
//! calls.

use glam::Vec3;

/// Opaque handle to a host-owned texture (the render target's color
/// attachment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// The fixed set of parameters the surface material consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Sampled reflection color texture.
    ReflectionTexture,
    /// Whether the captured view was orthogonal.
    IsOrthogonalCamera,
    /// UV scale used for orthogonal sampling.
    OrthoUvScale,
    /// Whether the artistic offset is active.
    OffsetEnabled,
    /// Offset translation.
    OffsetPosition,
    /// Offset translation multiplier.
    OffsetScale,
    /// Reflection plane normal.
    PlaneNormal,
    /// Reflection plane signed distance.
    PlaneDistance,
    /// World-space Y of the reflecting surface.
    SurfaceHeight,
}

impl ParamKey {
    /// All nine keys, in emission order.
    pub const ALL: [Self; 9] = [
        Self::ReflectionTexture,
        Self::IsOrthogonalCamera,
        Self::OrthoUvScale,
        Self::OffsetEnabled,
        Self::OffsetPosition,
        Self::OffsetScale,
        Self::PlaneNormal,
        Self::PlaneDistance,
        Self::SurfaceHeight,
    ];

    /// The uniform name the surface shader declares for this parameter.
    #[must_use]
    pub fn uniform_name(self) -> &'static str {
        match self {
            Self::ReflectionTexture => "reflection_screen_texture",
            Self::IsOrthogonalCamera => "is_orthogonal_camera",
            Self::OrthoUvScale => "ortho_uv_scale",
            Self::OffsetEnabled => "reflection_offset_enabled",
            Self::OffsetPosition => "reflection_offset_position",
            Self::OffsetScale => "reflection_offset_scale",
            Self::PlaneNormal => "reflection_plane_normal",
            Self::PlaneDistance => "reflection_plane_distance",
            Self::SurfaceHeight => "planar_surface_y",
        }
    }
}

/// A loosely-typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    /// Texture handle.
    Texture(TextureHandle),
    /// Boolean flag.
    Bool(bool),
    /// Scalar.
    Float(f32),
    /// Three-component vector.
    Vector3(Vec3),
}

impl ParamValue {
    /// Equality with float tolerance; exact for textures and bools.
    #[must_use]
    pub fn approx_eq(&self, other: &Self) -> bool {
        const EPSILON: f32 = 1e-5;
        match (self, other) {
            (Self::Texture(a), Self::Texture(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => (a - b).abs() <= EPSILON,
            (Self::Vector3(a), Self::Vector3(b)) => a.abs_diff_eq(*b, EPSILON),
            _ => false,
        }
    }
}

/// Host material system: accepts named shader parameter writes.
pub trait ParameterSink {
    /// Applies one parameter to the surface material.
    fn set_parameter(&mut self, key: ParamKey, value: ParamValue);
}

/// Per-key change detection in front of a [`ParameterSink`].
#[derive(Debug, Clone, Default)]
pub struct ParamWriter {
    last: Vec<(ParamKey, ParamValue)>,
}

impl ParamWriter {
    /// Creates a writer with no recorded values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` through to `sink` only if it changed since the last
    /// write of the same key. Returns whether a write happened.
    pub fn write(
        &mut self,
        sink: &mut dyn ParameterSink,
        key: ParamKey,
        value: ParamValue,
    ) -> bool {
        if let Some((_, last)) = self.last.iter_mut().find(|(k, _)| *k == key) {
            if last.approx_eq(&value) {
                return false;
            }
            *last = value;
        } else {
            self.last.push((key, value));
        }
        sink.set_parameter(key, value);
        true
    }

    /// Forgets all recorded values so every parameter re-emits.
    pub fn invalidate(&mut self) {
        self.last.clear();
    }
}
