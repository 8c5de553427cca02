//! Configuration for a reflecting surface.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::lod::LodSettings;
use crate::offset::OffsetSettings;

/// All host-tweakable parameters of one reflecting surface.
///
/// Defaults match a 1080p mirror that recomputes every frame with offsets
/// and LOD disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceSettings {
    /// Master switch; an inactive surface suspends its solver.
    pub active: bool,
    /// Render-target resolution used while the viewer viewport has no size.
    pub target_resolution: UVec2,
    /// Render-layer mask the mirrored camera culls against.
    pub reflection_layers: u32,
    /// Match the mirrored camera's projection mode to the viewer's.
    pub auto_detect_camera_mode: bool,
    /// Multiplier applied to the viewer's orthogonal size.
    pub ortho_scale_multiplier: f32,
    /// UV scale forwarded to the surface shader for orthogonal sampling.
    pub ortho_uv_scale: f32,
    /// Recompute the mirrored camera every Nth tick (>= 1).
    pub update_frequency: u32,
    /// Re-evaluate the render-target size every Nth tick.
    pub viewport_check_frequency: u32,
    /// Viewer position delta below which recomputation is skipped.
    pub position_threshold: f32,
    /// Viewer Euler-rotation delta (radians) below which recomputation is
    /// skipped.
    pub rotation_threshold: f32,
    /// Distance-based resolution scaling.
    pub lod: LodSettings,
    /// Artistic offset applied to the mirrored pose.
    pub offset: OffsetSettings,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            active: true,
            target_resolution: UVec2::new(1920, 1080),
            reflection_layers: 1,
            auto_detect_camera_mode: true,
            ortho_scale_multiplier: 1.0,
            ortho_uv_scale: 1.0,
            update_frequency: 1,
            viewport_check_frequency: 5,
            position_threshold: 0.01,
            rotation_threshold: 0.001,
            lod: LodSettings::default(),
            offset: OffsetSettings::default(),
        }
    }
}

impl SurfaceSettings {
    /// Sets the recompute frequency, clamped to at least every frame.
    pub fn set_update_frequency(&mut self, frequency: u32) {
        self.update_frequency = frequency.max(1);
    }

    /// Whether layer 1 participates in the reflection. Hosts typically warn
    /// when it does not, since scene lights usually cull against it.
    #[must_use]
    pub fn is_layer_one_active(&self) -> bool {
        self.reflection_layers & 1 != 0
    }
}
