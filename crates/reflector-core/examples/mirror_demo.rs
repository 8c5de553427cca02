//! Drives the reflection solver with stand-in collaborators and prints the
//! mirrored camera poses it produces. Run with `RUST_LOG=debug` to see the
//! solver's state transitions.

use glam::{Mat3, UVec2, Vec3};
use reflector_core::{
    CameraState, HostFrame, MirrorCamera, MirroredProjection, ParamKey, ParamValue,
    ParameterSink, ProjectionMode, ReflectionSolver, RenderTarget, SurfaceSettings,
    TextureHandle, Transform3,
};

#[derive(Default)]
struct DemoMirror {
    transform: Option<Transform3>,
}

impl MirrorCamera for DemoMirror {
    fn set_world_transform(&mut self, transform: Transform3) {
        self.transform = Some(transform);
    }
    fn set_projection(&mut self, _projection: MirroredProjection) {}
}

#[derive(Default)]
struct DemoTarget {
    size: Option<UVec2>,
}

impl RenderTarget for DemoTarget {
    fn set_size(&mut self, size: UVec2) {
        println!("render target resized to {}x{}", size.x, size.y);
        self.size = Some(size);
    }
    fn color_texture(&self) -> TextureHandle {
        TextureHandle(1)
    }
}

#[derive(Default)]
struct DemoMaterial;

impl ParameterSink for DemoMaterial {
    fn set_parameter(&mut self, key: ParamKey, value: ParamValue) {
        println!("  shader param {} = {value:?}", key.uniform_name());
    }
}

fn main() {
    env_logger::init();

    let mut settings = SurfaceSettings::default();
    settings.lod.enabled = true;
    let mut solver = ReflectionSolver::new(settings);

    let mut mirror = DemoMirror::default();
    let mut target = DemoTarget::default();
    let mut material = DemoMaterial;

    // Fly the camera away from a ground-plane mirror at the origin
    for step in 0..8 {
        let distance = 10.0 + step as f32 * 4.0;
        let viewer = CameraState {
            transform: Transform3::new(Mat3::IDENTITY, Vec3::new(0.0, 5.0, distance)),
            projection: ProjectionMode::Perspective,
            fov_degrees: 70.0,
            ortho_size: 1.0,
            viewport_size: UVec2::new(1280, 720),
        };

        let outcome = solver.tick(HostFrame {
            attached: true,
            surface_transform: Transform3::IDENTITY,
            is_editor: false,
            viewer: Some(&viewer),
            mirror_camera: Some(&mut mirror),
            render_target: Some(&mut target),
            material: Some(&mut material),
            editor_probe: None,
        });

        if let Some(transform) = mirror.transform {
            println!(
                "frame {step}: viewer y=5.0 z={distance:.1} -> mirrored origin {:?} (recomputed: {})",
                transform.origin, outcome.recomputed
            );
        }
    }
}
