//! Per-frame reflection camera solver.
//!
//! Once per render frame the host calls [`ReflectionSolver::tick`] with a
//! [`HostFrame`] describing the collaborators that currently exist. The
//! solver gates work by update frequency and viewer movement, mirrors the
//! viewer across the surface's reflection plane, and pushes the results out
//! through the collaborator traits. Missing collaborators suspend the
//! solver instead of erroring; startup ordering races are expected.

use glam::{Mat3, UVec2, Vec3};

use crate::camera::{
    CameraState, EditorViewportProbe, MirrorCamera, MirroredProjection, ProjectionMode,
    RenderTarget,
};
use crate::lod::LodResolver;
use crate::offset::OffsetBlender;
use crate::params::{ParamKey, ParamValue, ParamWriter, ParameterSink};
use crate::plane::{PlaneCache, ReflectionPlane};
use crate::surface::SurfaceSettings;
use crate::transform::Transform3;

/// Lifecycle state of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverState {
    /// Never ticked.
    #[default]
    Uninitialized,
    /// Surface exists but is not yet part of an active scene.
    AwaitingAttachment,
    /// All collaborators present and the surface is active.
    Ready,
    /// Inactive, or a required collaborator is missing.
    Suspended,
}

/// Everything the host lends the solver for one tick.
pub struct HostFrame<'a> {
    /// Whether the surface is attached to an active scene.
    pub attached: bool,
    /// Surface world transform (scale ignored by the plane math).
    pub surface_transform: Transform3,
    /// Whether this tick runs inside an editor preview context.
    pub is_editor: bool,
    /// Viewer camera snapshot, if one exists.
    pub viewer: Option<&'a CameraState>,
    /// Mirrored camera node, if one exists.
    pub mirror_camera: Option<&'a mut dyn MirrorCamera>,
    /// Offscreen render target, if one exists.
    pub render_target: Option<&'a mut dyn RenderTarget>,
    /// Surface material parameter sink, if a material is assigned.
    pub material: Option<&'a mut dyn ParameterSink>,
    /// Editor viewport size probe; `None` outside the editor.
    pub editor_probe: Option<&'a dyn EditorViewportProbe>,
}

/// What one tick did, mostly for tests and host diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    /// State after this tick.
    pub state: SolverState,
    /// Whether the movement gate was evaluated this tick.
    pub gate_evaluated: bool,
    /// Whether the mirrored camera was recomputed.
    pub recomputed: bool,
    /// New render-target size, if it was changed this tick.
    pub viewport_resized: Option<UVec2>,
}

/// Derives the mirrored camera pose and shader parameters each frame.
#[derive(Debug, Default)]
pub struct ReflectionSolver {
    /// Host-tweakable configuration.
    pub settings: SurfaceSettings,
    state: SolverState,
    frame_counter: u64,
    last_sample: Option<(Vec3, Vec3)>,
    last_projection: ProjectionMode,
    plane_cache: PlaneCache,
    cached_plane: ReflectionPlane,
    offset: OffsetBlender,
    lod: LodResolver,
    params: ParamWriter,
    cached_viewport_size: Option<UVec2>,
}

impl ReflectionSolver {
    /// Creates a solver in the `Uninitialized` state.
    #[must_use]
    pub fn new(settings: SurfaceSettings) -> Self {
        Self {
            settings,
            cached_plane: ReflectionPlane::INVALID,
            ..Self::default()
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Reflection plane from the last recomputation; `INVALID` before the
    /// first one.
    #[must_use]
    pub fn current_plane(&self) -> ReflectionPlane {
        self.cached_plane
    }

    /// The reflection plane, or an error explaining why none exists.
    ///
    /// Hosts use this seam to configure downstream effects (the mask pass
    /// takes the plane height as its intersect height).
    pub fn require_plane(&self) -> crate::error::Result<ReflectionPlane> {
        match self.state {
            SolverState::Uninitialized | SolverState::AwaitingAttachment => {
                Err(crate::error::SolverError::SurfaceDetached)
            }
            SolverState::Ready | SolverState::Suspended => {
                if self.cached_plane.is_valid() {
                    Ok(self.cached_plane)
                } else {
                    Err(crate::error::SolverError::DegeneratePlane)
                }
            }
        }
    }

    /// Drops every derived cache so the next tick rebuilds from scratch.
    ///
    /// Called internally on (re)attachment; hosts call it after structural
    /// changes such as swapping the surface material.
    pub fn invalidate_caches(&mut self) {
        self.plane_cache.invalidate();
        self.offset.invalidate();
        self.lod.invalidate();
        self.params.invalidate();
        self.cached_viewport_size = None;
        self.last_sample = None;
    }

    /// Per-frame entry point; see the module docs for the protocol.
    pub fn tick(&mut self, mut frame: HostFrame<'_>) -> TickOutcome {
        self.transition(&frame);
        let mut outcome = TickOutcome {
            state: self.state,
            ..TickOutcome::default()
        };
        if self.state != SolverState::Ready {
            return outcome;
        }

        self.frame_counter += 1;

        let check_freq = self.settings.viewport_check_frequency;
        if check_freq > 0 && self.frame_counter % check_freq as u64 == 0 {
            outcome.viewport_resized = self.update_viewport(&mut frame);
        }

        if self.frame_counter % self.settings.update_frequency.max(1) as u64 == 0 {
            outcome.gate_evaluated = true;
            if self.should_update(&frame) {
                let resized = self.update_viewport(&mut frame);
                outcome.viewport_resized = outcome.viewport_resized.or(resized);
                self.update_reflection_camera(&mut frame);
                outcome.recomputed = true;
            }
        }

        outcome
    }

    /// Re-evaluates the lifecycle state from this frame's collaborators and
    /// logs once per transition.
    fn transition(&mut self, frame: &HostFrame<'_>) {
        let next = if !frame.attached {
            SolverState::AwaitingAttachment
        } else if !self.settings.active
            || frame.viewer.is_none()
            || frame.mirror_camera.is_none()
            || frame.render_target.is_none()
        {
            SolverState::Suspended
        } else {
            SolverState::Ready
        };

        if next == self.state {
            return;
        }

        match next {
            SolverState::AwaitingAttachment => {
                log::debug!("reflection solver waiting for scene attachment");
            }
            SolverState::Suspended => {
                let reason = if !self.settings.active {
                    "surface inactive"
                } else if frame.viewer.is_none() {
                    "viewer camera missing"
                } else if frame.mirror_camera.is_none() {
                    "mirror camera missing"
                } else {
                    "render target missing"
                };
                log::debug!("reflection solver suspended: {reason}");
            }
            SolverState::Ready => {
                log::debug!("reflection solver ready");
                // Rebuild derived state after (re)attachment or resume
                self.invalidate_caches();
            }
            SolverState::Uninitialized => {}
        }
        self.state = next;
    }

    /// Movement gate: skips recomputation while the viewer sits still
    /// within the configured thresholds. Records a new sample whenever it
    /// decides to update.
    fn should_update(&mut self, frame: &HostFrame<'_>) -> bool {
        let Some(viewer) = frame.viewer else {
            return false;
        };
        let pos = viewer.position();
        let euler = basis_euler(viewer.basis());

        if let Some((last_pos, last_euler)) = self.last_sample {
            let still = within(pos - last_pos, self.settings.position_threshold)
                && within(euler - last_euler, self.settings.rotation_threshold);
            if still {
                return false;
            }
        }

        self.last_sample = Some((pos, euler));
        true
    }

    /// Resolves the target size (editor probe, else viewer viewport, then
    /// LOD) and applies it if it changed.
    fn update_viewport(&mut self, frame: &mut HostFrame<'_>) -> Option<UVec2> {
        let target = frame.render_target.as_deref_mut()?;
        let viewer = frame.viewer?;

        let mut size = if frame.is_editor {
            frame
                .editor_probe
                .and_then(EditorViewportProbe::try_get_viewport_size)
                .unwrap_or(viewer.viewport_size)
        } else {
            viewer.viewport_size
        };
        if size.x == 0 || size.y == 0 {
            // Viewer viewport not sized yet, fall back to the configured
            // resolution
            size = self.settings.target_resolution;
        }

        if self.settings.lod.enabled {
            let distance = frame.surface_transform.origin.distance(viewer.position());
            size = self.lod.resolve(&self.settings.lod, size, distance);
        }

        if self.cached_viewport_size == Some(size) {
            return None;
        }
        target.set_size(size);
        self.cached_viewport_size = Some(size);
        Some(size)
    }

    /// Full recomputation: projection match, plane, mirrored pose, offset
    /// blend, shader parameter emission.
    fn update_reflection_camera(&mut self, frame: &mut HostFrame<'_>) {
        let Some(viewer) = frame.viewer else { return };
        let Some(mirror) = frame.mirror_camera.as_deref_mut() else {
            return;
        };

        let projection = self.resolve_projection(viewer, frame.is_editor);
        self.last_projection = projection.mode;

        let plane = self.plane_cache.plane_for(&frame.surface_transform);
        self.cached_plane = plane;

        let mirrored_pos = plane.mirror_point(viewer.position());
        let basis = viewer.basis();
        let mirrored_basis = Mat3::from_cols(
            plane.mirror_basis_vector(basis.col(0)),
            plane.mirror_basis_vector(basis.col(1)),
            plane.mirror_basis_vector(basis.col(2)),
        );
        let base = Transform3::new(mirrored_basis, mirrored_pos);

        let final_transform = self
            .offset
            .apply(&self.settings.offset, base, Some(viewer.basis()));

        mirror.set_projection(projection);
        mirror.set_world_transform(final_transform);

        self.emit_shader_parameters(frame, projection);
    }

    /// Projection for the mirrored camera: follow the viewer when
    /// auto-detect is on, except editor previews always force perspective.
    fn resolve_projection(&self, viewer: &CameraState, is_editor: bool) -> MirroredProjection {
        let mut mode = if self.settings.auto_detect_camera_mode {
            viewer.projection
        } else {
            self.last_projection
        };
        if self.settings.auto_detect_camera_mode && is_editor {
            mode = ProjectionMode::Perspective;
        }
        MirroredProjection {
            mode,
            fov_degrees: viewer.fov_degrees,
            ortho_size: viewer.ortho_size * self.settings.ortho_scale_multiplier,
        }
    }

    /// Pushes the nine-parameter bundle through the dedup writer.
    fn emit_shader_parameters(
        &mut self,
        frame: &mut HostFrame<'_>,
        projection: MirroredProjection,
    ) {
        let Some(sink) = frame.material.as_deref_mut() else {
            return;
        };
        let Some(target) = frame.render_target.as_deref() else {
            return;
        };

        let is_orthogonal = if frame.is_editor {
            projection.mode == ProjectionMode::Orthogonal
        } else {
            frame
                .viewer
                .is_some_and(|v| v.projection == ProjectionMode::Orthogonal)
        };

        let offset = &self.settings.offset;
        let writes = [
            (
                ParamKey::ReflectionTexture,
                ParamValue::Texture(target.color_texture()),
            ),
            (ParamKey::IsOrthogonalCamera, ParamValue::Bool(is_orthogonal)),
            (
                ParamKey::OrthoUvScale,
                ParamValue::Float(self.settings.ortho_uv_scale),
            ),
            (ParamKey::OffsetEnabled, ParamValue::Bool(offset.enabled)),
            (ParamKey::OffsetPosition, ParamValue::Vector3(offset.position)),
            (ParamKey::OffsetScale, ParamValue::Float(offset.scale)),
            (
                ParamKey::PlaneNormal,
                ParamValue::Vector3(self.cached_plane.normal),
            ),
            (ParamKey::PlaneDistance, ParamValue::Float(self.cached_plane.d)),
            (
                ParamKey::SurfaceHeight,
                ParamValue::Float(frame.surface_transform.origin.y),
            ),
        ];
        for (key, value) in writes {
            self.params.write(sink, key, value);
        }
    }
}

fn within(delta: Vec3, threshold: f32) -> bool {
    delta.abs().max_element() <= threshold
}

fn basis_euler(basis: Mat3) -> Vec3 {
    let (y, x, z) = glam::Quat::from_mat3(&basis).to_euler(glam::EulerRot::YXZ);
    Vec3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TextureHandle;

    #[derive(Default)]
    struct MockMirror {
        transform: Option<Transform3>,
        projection: Option<MirroredProjection>,
        set_calls: u32,
    }

    impl MirrorCamera for MockMirror {
        fn set_world_transform(&mut self, transform: Transform3) {
            self.transform = Some(transform);
            self.set_calls += 1;
        }
        fn set_projection(&mut self, projection: MirroredProjection) {
            self.projection = Some(projection);
        }
    }

    #[derive(Default)]
    struct MockTarget {
        size: Option<UVec2>,
        resize_calls: u32,
    }

    impl RenderTarget for MockTarget {
        fn set_size(&mut self, size: UVec2) {
            self.size = Some(size);
            self.resize_calls += 1;
        }
        fn color_texture(&self) -> TextureHandle {
            TextureHandle(42)
        }
    }

    #[derive(Default)]
    struct MockSink {
        writes: Vec<(ParamKey, ParamValue)>,
    }

    impl ParameterSink for MockSink {
        fn set_parameter(&mut self, key: ParamKey, value: ParamValue) {
            self.writes.push((key, value));
        }
    }

    fn viewer_at(pos: Vec3) -> CameraState {
        CameraState {
            transform: Transform3::from_origin(pos),
            projection: ProjectionMode::Perspective,
            fov_degrees: 60.0,
            ortho_size: 1.0,
            viewport_size: UVec2::new(1920, 1080),
        }
    }

    fn full_frame<'a>(
        viewer: &'a CameraState,
        mirror: &'a mut MockMirror,
        target: &'a mut MockTarget,
        sink: &'a mut MockSink,
    ) -> HostFrame<'a> {
        HostFrame {
            attached: true,
            surface_transform: Transform3::IDENTITY,
            is_editor: false,
            viewer: Some(viewer),
            mirror_camera: Some(mirror),
            render_target: Some(target),
            material: Some(sink),
            editor_probe: None,
        }
    }

    #[test]
    fn test_suspends_without_viewer() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let outcome = solver.tick(HostFrame {
            attached: true,
            surface_transform: Transform3::IDENTITY,
            is_editor: false,
            viewer: None,
            mirror_camera: Some(&mut mirror),
            render_target: Some(&mut target),
            material: None,
            editor_probe: None,
        });
        assert_eq!(outcome.state, SolverState::Suspended);
        assert!(!outcome.recomputed);
    }

    #[test]
    fn test_awaits_attachment() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();
        let mut frame = full_frame(&viewer, &mut mirror, &mut target, &mut sink);
        frame.attached = false;
        let outcome = solver.tick(frame);
        assert_eq!(outcome.state, SolverState::AwaitingAttachment);
    }

    #[test]
    fn test_end_to_end_mirrored_pose() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();

        let outcome = solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert_eq!(outcome.state, SolverState::Ready);
        assert!(outcome.recomputed);

        let transform = mirror.transform.expect("mirrored transform applied");
        assert!(transform
            .origin
            .abs_diff_eq(Vec3::new(0.0, -5.0, 10.0), 1e-5));
        let projection = mirror.projection.expect("projection applied");
        assert_eq!(projection.mode, ProjectionMode::Perspective);
        assert!((projection.fov_degrees - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_update_frequency_gating() {
        let mut settings = SurfaceSettings::default();
        settings.set_update_frequency(3);
        let mut solver = ReflectionSolver::new(settings);
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();

        let mut gated_frames = Vec::new();
        for tick in 1..=9 {
            // Move the viewer each tick so the movement gate never skips
            let viewer = viewer_at(Vec3::new(tick as f32, 5.0, 10.0));
            let outcome =
                solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
            if outcome.gate_evaluated {
                gated_frames.push(tick);
            }
        }
        assert_eq!(gated_frames, vec![3, 6, 9]);
    }

    #[test]
    fn test_movement_threshold() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();

        let base = Vec3::new(0.0, 5.0, 10.0);
        let viewer = viewer_at(base);
        let outcome = solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert!(outcome.recomputed);

        // 0.005 is inside the 0.01 threshold: no recompute
        let viewer = viewer_at(base + Vec3::new(0.005, 0.0, 0.0));
        let outcome = solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert!(outcome.gate_evaluated);
        assert!(!outcome.recomputed);

        // 0.02 is outside: recompute
        let viewer = viewer_at(base + Vec3::new(0.02, 0.0, 0.0));
        let outcome = solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert!(outcome.recomputed);
    }

    #[test]
    fn test_viewport_check_frequency_and_dedup() {
        let mut settings = SurfaceSettings::default();
        // Keep the mirrored-camera path quiet so only the size check runs
        settings.set_update_frequency(100);
        let mut solver = ReflectionSolver::new(settings);
        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();

        for _ in 1..=10 {
            solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        }
        // Checked on frames 5 and 10, but applied only once (unchanged)
        assert_eq!(target.resize_calls, 1);
        assert_eq!(target.size, Some(UVec2::new(1920, 1080)));
    }

    #[test]
    fn test_editor_probe_overrides_size() {
        struct Probe;
        impl EditorViewportProbe for Probe {
            fn try_get_viewport_size(&self) -> Option<UVec2> {
                Some(UVec2::new(640, 480))
            }
        }

        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();
        let mut frame = full_frame(&viewer, &mut mirror, &mut target, &mut sink);
        frame.is_editor = true;
        frame.editor_probe = Some(&Probe);

        // Tick 5 times so the viewport check fires at least once
        solver.tick(frame);
        for _ in 0..5 {
            let mut frame = full_frame(&viewer, &mut mirror, &mut target, &mut sink);
            frame.is_editor = true;
            frame.editor_probe = Some(&Probe);
            solver.tick(frame);
        }
        assert_eq!(target.size, Some(UVec2::new(640, 480)));
    }

    #[test]
    fn test_editor_forces_perspective() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let mut viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        viewer.projection = ProjectionMode::Orthogonal;
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();
        let mut frame = full_frame(&viewer, &mut mirror, &mut target, &mut sink);
        frame.is_editor = true;
        solver.tick(frame);

        let projection = mirror.projection.expect("projection applied");
        assert_eq!(projection.mode, ProjectionMode::Perspective);
    }

    #[test]
    fn test_shader_params_emitted_once_for_static_scene() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();

        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert_eq!(sink.writes.len(), ParamKey::ALL.len());

        // Second recompute from a big camera move: only the values that
        // actually stayed the same are skipped
        sink.writes.clear();
        let viewer = viewer_at(Vec3::new(0.0, 6.0, 10.0));
        solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert!(sink.writes.is_empty(), "pose change alone emits no params");
    }

    #[test]
    fn test_require_plane_follows_lifecycle() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        assert!(matches!(
            solver.require_plane(),
            Err(crate::error::SolverError::SurfaceDetached)
        ));

        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();
        solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));

        let plane = solver.require_plane().expect("plane after first tick");
        assert!(plane.normal.abs_diff_eq(Vec3::NEG_Y, 1e-5));
    }

    #[test]
    fn test_suspend_resume_cycle() {
        let mut solver = ReflectionSolver::new(SurfaceSettings::default());
        let viewer = viewer_at(Vec3::new(0.0, 5.0, 10.0));
        let mut mirror = MockMirror::default();
        let mut target = MockTarget::default();
        let mut sink = MockSink::default();

        solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert_eq!(solver.state(), SolverState::Ready);

        solver.settings.active = false;
        solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert_eq!(solver.state(), SolverState::Suspended);

        solver.settings.active = true;
        let outcome = solver.tick(full_frame(&viewer, &mut mirror, &mut target, &mut sink));
        assert_eq!(outcome.state, SolverState::Ready);
        // Resume invalidated the movement sample, so this tick recomputes
        assert!(outcome.recomputed);
    }
}
