//! Distance-based resolution scaling for the reflection render target.

use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::cache::Cache;

/// Neither axis of the resolved target ever drops below this.
pub const MIN_AXIS_PIXELS: u32 = 128;

/// Distance change (world units) required before the factor is recomputed.
const DISTANCE_HYSTERESIS: f32 = 1.0;

/// LOD configuration for a reflecting surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LodSettings {
    /// Whether distance scaling is applied at all.
    pub enabled: bool,
    /// Distance at or below which full resolution is used.
    pub distance_near: f32,
    /// Distance at or beyond which `min_multiplier` is used.
    pub distance_far: f32,
    /// Resolution factor reached at `distance_far`.
    pub min_multiplier: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            distance_near: 24.0,
            distance_far: 32.0,
            min_multiplier: 0.45,
        }
    }
}

/// Distance key that only registers moves beyond the hysteresis band.
#[derive(Debug, Clone, Copy)]
struct LodDistance(f32);

impl PartialEq for LodDistance {
    fn eq(&self, other: &Self) -> bool {
        (self.0 - other.0).abs() <= DISTANCE_HYSTERESIS
    }
}

/// Maps camera-to-surface distance to a render-target size.
#[derive(Debug, Clone, Default)]
pub struct LodResolver {
    factor_cache: Cache<LodDistance, f32>,
}

impl LodResolver {
    /// Creates a resolver with an empty factor cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scales `target_size` by the factor for `distance`.
    ///
    /// Disabled settings pass the size through unchanged. Otherwise the
    /// factor is 1.0 up to `distance_near`, lerps down to `min_multiplier`
    /// at `distance_far`, and clamps there for anything farther. Each axis
    /// is floored at [`MIN_AXIS_PIXELS`].
    pub fn resolve(&mut self, settings: &LodSettings, target_size: UVec2, distance: f32) -> UVec2 {
        if !settings.enabled {
            return target_size;
        }

        let settings = *settings;
        let factor = *self
            .factor_cache
            .get_or_compute(LodDistance(distance), move |key| {
                compute_factor(&settings, key.0)
            });

        let scaled = target_size.as_vec2() * factor;
        UVec2::new(
            (scaled.x as u32).max(MIN_AXIS_PIXELS),
            (scaled.y as u32).max(MIN_AXIS_PIXELS),
        )
    }

    /// Drops the cached factor so the next resolve recomputes.
    pub fn invalidate(&mut self) {
        self.factor_cache.invalidate();
    }
}

fn compute_factor(settings: &LodSettings, distance: f32) -> f32 {
    if distance <= settings.distance_near {
        return 1.0;
    }
    let span = settings.distance_far - settings.distance_near;
    if span <= 0.0 {
        // Misconfigured near >= far: treat everything past near as far
        return settings.min_multiplier;
    }
    let t = ((distance - settings.distance_near) / span).clamp(0.0, 1.0);
    1.0 + (settings.min_multiplier - 1.0) * t
}
