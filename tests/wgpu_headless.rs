//! Reflector passes on a real wgpu device.
//!
//! Skipped with a message when no adapter is available (CI without a GPU
//! or software rasterizer).

#![cfg(feature = "wgpu-backend")]

mod common;

use glam::Vec3;
use rstest::rstest;

use common::{init_logging, viewer_at, RecordingScene, FLOOR};
use mesh_reflector::{
    GraphicsBackend, MeshReflector, ReflectionOutcome, ReflectorOptions, ReflectorResult,
    ViewerCamera, WgpuBackend,
};

/// One submitted frame containing a single reflection pass
fn render_frame(
    backend: &mut WgpuBackend,
    reflector: &mut MeshReflector,
    scene: &mut RecordingScene,
    viewer: &ViewerCamera,
) -> ReflectorResult<ReflectionOutcome> {
    backend.begin_frame()?;
    let outcome = reflector.render(backend, scene, Some(FLOOR), viewer)?;
    backend.end_frame()?;
    backend.wait_idle();
    Ok(outcome)
}

fn headless() -> Option<WgpuBackend> {
    match WgpuBackend::new_headless() {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("wgpu backend not available, skipping: {}", err);
            None
        }
    }
}

#[rstest]
#[case::sharp(ReflectorOptions::default(), false)]
#[case::blurred(ReflectorOptions::default().with_blur([300.0, 100.0]), true)]
#[case::depth_blur(
    ReflectorOptions::default().with_blur(8.0).with_depth_scale(1.0).with_resolution(128),
    true
)]
fn test_render_reflection(#[case] options: ReflectorOptions, #[case] blurred: bool) {
    init_logging();
    let Some(mut backend) = headless() else {
        return;
    };

    let mut scene = RecordingScene::with_floor();
    let mut reflector = MeshReflector::new(options).unwrap();
    let viewer = viewer_at(Vec3::new(0.0, 2.0, 5.0));
    let outcome = render_frame(&mut backend, &mut reflector, &mut scene, &viewer).unwrap();

    assert_eq!(outcome, ReflectionOutcome::Rendered { blurred });
    let bindings = reflector.bindings().unwrap();
    assert!(backend.texture_view(bindings.t_diffuse).is_some());
    assert!(backend.texture_view(bindings.t_depth).is_some());
    assert_eq!(bindings.has_blur(), blurred);

    reflector.release(&mut backend);
    assert!(backend.texture_view(bindings.t_diffuse).is_none());
}

#[test]
fn test_resize_on_device() {
    init_logging();
    let Some(mut backend) = headless() else {
        return;
    };

    let mut scene = RecordingScene::with_floor();
    let mut reflector = MeshReflector::new(ReflectorOptions::default()).unwrap();
    let viewer = viewer_at(Vec3::new(0.0, 2.0, 5.0));

    render_frame(&mut backend, &mut reflector, &mut scene, &viewer).unwrap();
    let before = reflector.bindings().unwrap();

    reflector
        .set_options(ReflectorOptions::default().with_resolution(512))
        .unwrap();
    render_frame(&mut backend, &mut reflector, &mut scene, &viewer).unwrap();

    let after = reflector.bindings().unwrap();
    assert!(after.generation > before.generation);
    assert!(backend.texture_view(after.t_diffuse).is_some());
    assert_eq!(scene.renders.len(), 2);
}
