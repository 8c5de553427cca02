//! Parameter packing for the intersection mask pass.
//!
//! The compute shader reads one 40-float storage block per pass. Packing is
//! cheap but uploading is not, so the block compares with an epsilon and the
//! two 16-float matrix halves are cached with independent dirty tracking.

use glam::{Mat4, UVec2};
use serde::{Deserialize, Serialize};

use reflector_core::Transform3;

/// Number of floats in the parameter storage block.
pub const PARAM_FLOATS: usize = 40;

/// Upload dedup epsilon, applied to the whole block as a unit.
const BLOCK_EPSILON: f32 = 1e-4;

/// Host-tweakable parameters of the intersection mask effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskSettings {
    /// Master switch; a disabled effect stops issuing dispatches.
    pub effect_enabled: bool,
    /// World-space height of the reflection plane; pixels reconstructed
    /// above it are masked out.
    pub intersect_height: f32,
    /// Soft band above the intersect height that blends instead of cutting.
    pub reflect_gap_fill: f32,
    /// Fill masked pixels from nearby valid ones.
    pub fill_enabled: bool,
    /// Search radius of the separable fill, in pixels.
    pub fill_radius_px: f32,
    /// How strongly fill samples replace masked pixels.
    pub fill_aggressiveness: f32,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            effect_enabled: true,
            intersect_height: 0.0,
            reflect_gap_fill: 0.0025,
            fill_enabled: true,
            fill_radius_px: 24.0,
            fill_aggressiveness: 1.0,
        }
    }
}

impl MaskSettings {
    /// Sets the fill radius, clamped to 1..=96 pixels.
    pub fn set_fill_radius_px(&mut self, radius: f32) {
        self.fill_radius_px = radius.clamp(1.0, 96.0);
    }

    /// Sets the fill aggressiveness, clamped to 0..=2.
    pub fn set_fill_aggressiveness(&mut self, aggressiveness: f32) {
        self.fill_aggressiveness = aggressiveness.clamp(0.0, 2.0);
    }
}

/// One packed parameter block, in shader layout order.
///
/// Layout: `[0]`=width, `[1]`=height, `[2]`=intersect height,
/// `[3]`=gap fill, `[4..20]`=inverse projection (column-major),
/// `[20..36]`=camera basis rows plus origin, each row padded to four floats
/// with the last column 0/0/0/1, `[36]`=fill enabled, `[37]`=fill radius,
/// `[38]`=fill aggressiveness, `[39]`=pass direction (0 horizontal,
/// 1 vertical).
#[derive(Debug, Clone, Copy)]
pub struct ParamBlock(pub [f32; PARAM_FLOATS]);

impl ParamBlock {
    /// Raw bytes for a buffer upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.0)
    }

    /// Returns a copy with the pass direction set.
    #[must_use]
    pub fn with_pass_direction(mut self, vertical: bool) -> Self {
        self.0[39] = if vertical { 1.0 } else { 0.0 };
        self
    }
}

impl PartialEq for ParamBlock {
    fn eq(&self, other: &Self) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= BLOCK_EPSILON)
    }
}

/// Builds [`ParamBlock`]s, caching the two matrix halves separately.
///
/// The inverse projection changes rarely (zoom, mode switch) and the camera
/// transform changes often, so each 16-float half is recomputed only when
/// its own source changed: the projection by exact equality, the transform
/// by approximate equality.
#[derive(Debug, Clone, Default)]
pub struct MaskParamsPacker {
    matrix_floats: [f32; 32],
    last_inv_proj: Option<Mat4>,
    last_camera: Option<Transform3>,
}

impl MaskParamsPacker {
    /// Creates a packer with empty matrix caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs a horizontal-pass block for the current frame.
    pub fn pack(
        &mut self,
        settings: &MaskSettings,
        size: UVec2,
        inv_proj: Mat4,
        camera: &Transform3,
    ) -> ParamBlock {
        self.refresh_matrix_cache(inv_proj, camera);

        let mut p = [0.0f32; PARAM_FLOATS];
        p[0] = size.x as f32;
        p[1] = size.y as f32;
        p[2] = settings.intersect_height;
        p[3] = settings.reflect_gap_fill;
        p[4..36].copy_from_slice(&self.matrix_floats);
        p[36] = if settings.fill_enabled { 1.0 } else { 0.0 };
        p[37] = settings.fill_radius_px.clamp(1.0, 96.0);
        p[38] = settings.fill_aggressiveness.clamp(0.0, 2.0);
        p[39] = 0.0;
        ParamBlock(p)
    }

    /// Drops the matrix caches so the next pack recomputes both halves.
    pub fn invalidate(&mut self) {
        self.last_inv_proj = None;
        self.last_camera = None;
    }

    fn refresh_matrix_cache(&mut self, inv_proj: Mat4, camera: &Transform3) {
        if self.last_inv_proj != Some(inv_proj) {
            self.last_inv_proj = Some(inv_proj);
            self.matrix_floats[0..16].copy_from_slice(&inv_proj.to_cols_array());
        }

        let camera_unchanged = self
            .last_camera
            .is_some_and(|last| last.is_equal_approx(camera));
        if !camera_unchanged {
            self.last_camera = Some(*camera);
            let m = &mut self.matrix_floats;
            // Basis rows, each padded; origin row ends the 4x4
            for row in 0..3 {
                let r = camera.basis.row(row);
                let base = 16 + row * 4;
                m[base] = r.x;
                m[base + 1] = r.y;
                m[base + 2] = r.z;
                m[base + 3] = 0.0;
            }
            m[28] = camera.origin.x;
            m[29] = camera.origin.y;
            m[30] = camera.origin.z;
            m[31] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_default_settings() {
        let s = MaskSettings::default();
        assert!(s.effect_enabled);
        assert!((s.reflect_gap_fill - 0.0025).abs() < 1e-9);
        assert!((s.fill_radius_px - 24.0).abs() < 1e-6);
        assert!((s.fill_aggressiveness - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_setter_clamps() {
        let mut s = MaskSettings::default();
        s.set_fill_radius_px(0.0);
        assert!((s.fill_radius_px - 1.0).abs() < 1e-6);
        s.set_fill_radius_px(500.0);
        assert!((s.fill_radius_px - 96.0).abs() < 1e-6);
        s.set_fill_aggressiveness(-1.0);
        assert!(s.fill_aggressiveness.abs() < 1e-6);
        s.set_fill_aggressiveness(9.0);
        assert!((s.fill_aggressiveness - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_block_layout() {
        let mut packer = MaskParamsPacker::new();
        let camera = Transform3::from_origin(Vec3::new(1.0, 2.0, 3.0));
        let inv_proj = Mat4::IDENTITY;
        let block = packer.pack(
            &MaskSettings::default(),
            UVec2::new(1920, 1080),
            inv_proj,
            &camera,
        );

        let p = block.0;
        assert!((p[0] - 1920.0).abs() < 1e-6);
        assert!((p[1] - 1080.0).abs() < 1e-6);
        // Inverse projection occupies [4..20], column-major
        assert!((p[4] - 1.0).abs() < 1e-6);
        assert!((p[19] - 1.0).abs() < 1e-6);
        // Identity basis rows with zero padding
        assert!((p[20] - 1.0).abs() < 1e-6);
        assert!(p[23].abs() < 1e-6);
        assert!(p[27].abs() < 1e-6);
        assert!(p[31].abs() < 1e-6);
        // Origin row padded with 1
        assert!((p[32] - 1.0).abs() < 1e-6);
        assert!((p[33] - 2.0).abs() < 1e-6);
        assert!((p[34] - 3.0).abs() < 1e-6);
        assert!((p[35] - 1.0).abs() < 1e-6);
        // Fill block and horizontal pass direction
        assert!((p[36] - 1.0).abs() < 1e-6);
        assert!((p[37] - 24.0).abs() < 1e-6);
        assert!(p[39].abs() < 1e-6);
    }

    #[test]
    fn test_pack_clamps_out_of_range_fields() {
        let mut packer = MaskParamsPacker::new();
        let mut settings = MaskSettings::default();
        // Fields written directly, bypassing the setters
        settings.fill_radius_px = 1000.0;
        settings.fill_aggressiveness = 5.0;
        let block = packer.pack(
            &settings,
            UVec2::new(64, 64),
            Mat4::IDENTITY,
            &Transform3::IDENTITY,
        );
        assert!((block.0[37] - 96.0).abs() < 1e-6);
        assert!((block.0[38] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_block_epsilon_equality() {
        let a = ParamBlock([0.5; PARAM_FLOATS]);
        let mut jittered = a;
        jittered.0[17] += 5e-5;
        assert_eq!(a, jittered);
        let mut moved = a;
        moved.0[17] += 1e-3;
        assert_ne!(a, moved);
    }

    #[test]
    fn test_pass_direction_flip() {
        let block = ParamBlock([0.0; PARAM_FLOATS]);
        let vertical = block.with_pass_direction(true);
        assert!((vertical.0[39] - 1.0).abs() < 1e-6);
        assert_ne!(block, vertical);
    }

    proptest::proptest! {
        #[test]
        fn prop_pack_is_deterministic(
            x in -50.0f32..50.0,
            y in -50.0f32..50.0,
            z in -50.0f32..50.0,
            fov in 0.3f32..2.5,
        ) {
            let settings = MaskSettings::default();
            let size = UVec2::new(800, 600);
            let inv_proj = Mat4::perspective_rh(fov, 4.0 / 3.0, 0.05, 500.0).inverse();
            let camera = Transform3::from_origin(Vec3::new(x, y, z));

            let mut packer = MaskParamsPacker::new();
            let a = packer.pack(&settings, size, inv_proj, &camera);
            // Same inputs through warm caches give the same block
            let b = packer.pack(&settings, size, inv_proj, &camera);
            proptest::prop_assert_eq!(a.0, b.0);
            // And a cold packer agrees with the cached path
            let c = MaskParamsPacker::new().pack(&settings, size, inv_proj, &camera);
            proptest::prop_assert_eq!(a.0, c.0);
        }
    }

    #[test]
    fn test_matrix_halves_tracked_independently() {
        let mut packer = MaskParamsPacker::new();
        let settings = MaskSettings::default();
        let size = UVec2::new(128, 128);
        let proj_a = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0).inverse();
        let cam_a = Transform3::from_origin(Vec3::new(0.0, 5.0, 0.0));

        let first = packer.pack(&settings, size, proj_a, &cam_a);

        // Move the camera only: projection half must be byte-identical
        let cam_b = Transform3::from_origin(Vec3::new(4.0, 5.0, 0.0));
        let second = packer.pack(&settings, size, proj_a, &cam_b);
        assert_eq!(&first.0[4..20], &second.0[4..20]);
        assert!((second.0[32] - 4.0).abs() < 1e-6);

        // Change the projection only: transform half stays put
        let proj_b = Mat4::perspective_rh(0.8, 1.5, 0.1, 100.0).inverse();
        let third = packer.pack(&settings, size, proj_b, &cam_b);
        assert_eq!(&second.0[20..36], &third.0[20..36]);
        assert_ne!(&second.0[4..20], &third.0[4..20]);
    }
}
