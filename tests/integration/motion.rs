//! Headless runs of the fish scene.

use shoal::motion::{FishScene, Frame, Part, Viewport};

const FPS: f64 = 60.0;

fn run(scene: &mut FishScene, seconds: f64) -> Vec<Frame> {
    let frames = (seconds * FPS) as usize;
    (0..frames).map(|_| scene.tick(1.0 / FPS)).collect()
}

/// Test: The fish keeps swimming
/// Given a 1280x720 viewport
/// When twenty seconds elapse
/// Then the fish stays on its track, wraps at least three times, and each
/// crossing holds one integer height inside the allowed band
#[test]
fn test_swim_loops_forever_inside_band() {
    let viewport = Viewport::new(1280.0, 720.0);
    let mut scene = FishScene::seeded(viewport, 100.0, 11);

    let frames = run(&mut scene, 20.0);

    assert!(scene.swim().cycle >= 3);
    for frame in &frames {
        let fish = frame.get(Part::Fish);
        assert!(fish.x <= 840.0 + 1e-9 && fish.x >= -840.0 - 1e-9);
        assert!(fish.y >= -260.0 && fish.y <= 260.0);
        assert_eq!(fish.y, fish.y.floor());
    }
}

/// Test: Ambient loops never stop
/// When a long time has elapsed
/// Then the fins are still moving between frames
#[test]
fn test_ambient_loops_keep_running() {
    let mut scene = FishScene::seeded(Viewport::new(800.0, 600.0), 80.0, 5);
    run(&mut scene, 600.0);

    let a = scene.tick(0.25).get(Part::Tail);
    let b = scene.tick(0.25).get(Part::Tail);
    assert_ne!(a, b);
}

/// Test: Frames serialize for the preview command
#[test]
fn test_frame_json_uses_part_names() {
    let mut scene = FishScene::seeded(Viewport::new(800.0, 600.0), 80.0, 5);
    let json = serde_json::to_value(scene.tick(0.5)).unwrap();

    assert_eq!(json["time"], 0.5);
    assert!(json["parts"]["fin_bottom"]["rotation"].is_number());
    assert_eq!(json["parts"]["gills"]["opacity"], 1.0);
    assert!(json["parts"]["eye_inner"].is_object());
}
