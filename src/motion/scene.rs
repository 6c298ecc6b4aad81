use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tween::{Ease, Timeline, Transform, Tween};

/// Seconds for one crossing of the screen.
pub const SWIM_DURATION: f64 = 6.0;
/// How far past each edge the fish starts and ends.
pub const SWIM_MARGIN: f64 = 200.0;
/// Eye-hover timeline length.
pub const EYE_HOVER_DURATION: f64 = 0.4;
/// Eye-tracking tween length.
pub const EYE_TRACK_DURATION: f64 = 0.3;

/// Animated elements of the fish illustration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    FinBottom,
    FinCentral,
    ScaleOne,
    ScaleTwo,
    ScaleThree,
    ScaleFour,
    Eye,
    Tail,
    FinBottomRight,
    Gills,
    EyeInner,
    Fish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Direction from the viewport center to the pointer, in degrees.
///
/// 0 is to the right, 90 is straight down (screen y grows downward).
pub fn gaze_angle(x: f64, y: f64, viewport: Viewport) -> f64 {
    (y - viewport.height / 2.0)
        .atan2(x - viewport.width / 2.0)
        .to_degrees()
}

/// Integer in `[min, max]` picked by the unit sample `r`.
///
/// An empty range (viewport shorter than twice the fish) falls back to the
/// midpoint.
pub fn random_offset(r: f64, min: f64, max: f64) -> f64 {
    if min > max {
        return ((min + max) / 2.0).floor();
    }
    (r * (max - min + 1.0) + min).floor().min(max.floor())
}

/// The looping tweens on fins, scales, tail and gills.
pub fn ambient_tweens() -> Vec<(Part, Tween)> {
    let fin = Transform::at(1.0, 1.0).with_rotation(-5.0);
    let scale = |y: f64, delay: f64| {
        Tween::to(Transform::at(1.0, y).with_opacity(0.0), 1.8)
            .repeat_delay(0.8)
            .delay(delay)
            .repeat_forever()
    };

    vec![
        (
            Part::FinBottom,
            Tween::to(fin, 1.0).yoyo().repeat_delay(1.0).repeat_forever(),
        ),
        (
            Part::FinCentral,
            Tween::to(fin, 1.0).yoyo().delay(0.1).repeat_forever(),
        ),
        (Part::ScaleOne, scale(-2.0, -1.0)),
        (Part::ScaleTwo, scale(3.0, -2.0)),
        (Part::ScaleThree, scale(3.0, -3.0)),
        (Part::ScaleFour, scale(-3.0, -4.0)),
        (
            Part::Tail,
            Tween::new(
                Transform::at(-0.5, -2.0).with_rotation(-1.0),
                Transform::at(0.5, 2.0).with_rotation(1.0),
                1.0,
            )
            .yoyo()
            .repeat_delay(0.8)
            .delay(-1.0)
            .repeat_forever(),
        ),
        (
            Part::FinBottomRight,
            Tween::new(
                Transform::at(-0.5, -1.0).with_rotation(-2.0),
                Transform::at(0.5, 0.0).with_rotation(3.0),
                1.0,
            )
            .yoyo()
            .delay(-1.0)
            .repeat_forever(),
        ),
        (
            Part::Gills,
            Tween::to(Transform::default().with_scale_x(1.3), 1.8)
                .yoyo()
                .repeat_delay(1.0)
                .delay(-1.0)
                .repeat_forever(),
        ),
    ]
}

/// One right-to-left crossing at a fixed height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwimCycle {
    pub from_x: f64,
    pub to_x: f64,
    pub y: f64,
    pub elapsed: f64,
    pub cycle: u64,
}

impl SwimCycle {
    fn start<R: Rng>(viewport: Viewport, fish_height: f64, cycle: u64, rng: &mut R) -> Self {
        let min = -viewport.height / 2.0 + fish_height;
        let max = viewport.height / 2.0 - fish_height;
        Self {
            from_x: viewport.width / 2.0 + SWIM_MARGIN,
            to_x: -viewport.width / 2.0 - SWIM_MARGIN,
            y: random_offset(rng.random::<f64>(), min, max),
            elapsed: 0.0,
            cycle,
        }
    }

    pub fn transform(&self) -> Transform {
        let progress = Ease::Linear.apply(self.elapsed / SWIM_DURATION);
        Transform::at(self.from_x + (self.to_x - self.from_x) * progress, self.y)
    }
}

/// Per-part transforms at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: f64,
    pub parts: BTreeMap<Part, Transform>,
}

impl Frame {
    pub fn get(&self, part: Part) -> Transform {
        self.parts.get(&part).copied().unwrap_or_default()
    }
}

/// The whole fish: ambient loops, eye interaction, and swimming.
///
/// State only changes in [`FishScene::tick`] and the input handlers.
#[derive(Debug, Clone)]
pub struct FishScene {
    time: f64,
    viewport: Viewport,
    fish_height: f64,
    ambient: Vec<(Part, Tween)>,
    eye_hover: Timeline,
    /// Start time and tween of the last pointer move.
    eye_tracking: Option<(f64, Tween)>,
    swim: SwimCycle,
    rng: StdRng,
}

impl FishScene {
    pub fn new(viewport: Viewport, fish_height: f64) -> Self {
        Self::with_rng(viewport, fish_height, StdRng::from_os_rng())
    }

    /// Reproducible swim heights.
    pub fn seeded(viewport: Viewport, fish_height: f64, seed: u64) -> Self {
        Self::with_rng(viewport, fish_height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(viewport: Viewport, fish_height: f64, mut rng: StdRng) -> Self {
        let swim = SwimCycle::start(viewport, fish_height, 0, &mut rng);
        let hover = Tween::to(
            Transform::at(-15.0, 12.0).with_rotation(-60.0),
            EYE_HOVER_DURATION,
        );
        Self {
            time: 0.0,
            viewport,
            fish_height,
            ambient: ambient_tweens(),
            eye_hover: Timeline::paused(hover),
            eye_tracking: None,
            swim,
            rng,
        }
    }

    pub fn swim(&self) -> &SwimCycle {
        &self.swim
    }

    pub fn pointer_enter(&mut self) {
        self.eye_hover.play();
    }

    pub fn pointer_leave(&mut self) {
        self.eye_hover.reverse();
    }

    /// Point the inner eye at the pointer, replacing any tween in flight.
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let angle = gaze_angle(x, y, self.viewport);
        let current = self.eye_inner();
        let tween = Tween::new(
            current,
            Transform::at(10.0, 5.0).with_rotation(angle),
            EYE_TRACK_DURATION,
        );
        self.eye_tracking = Some((self.time, tween));
    }

    /// Gaze uses the new size at once; the swim picks it up next crossing.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn eye_inner(&self) -> Transform {
        match &self.eye_tracking {
            Some((started, tween)) => tween.sample(self.time - started),
            None => Transform::default(),
        }
    }

    /// Advance by `dt` seconds and return the new frame.
    ///
    /// Negative or non-finite steps leave the scene where it is. A step
    /// spanning several crossings lands in the last one.
    pub fn tick(&mut self, dt: f64) -> Frame {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.time += dt;
        self.eye_hover.advance(dt);

        let elapsed = self.swim.elapsed + dt;
        if elapsed >= SWIM_DURATION {
            let crossings = (elapsed / SWIM_DURATION).floor() as u64;
            let next = self.swim.cycle.saturating_add(crossings);
            self.swim = SwimCycle::start(self.viewport, self.fish_height, next, &mut self.rng);
            self.swim.elapsed = elapsed % SWIM_DURATION;
        } else {
            self.swim.elapsed = elapsed;
        }

        self.frame()
    }

    /// Transforms at the current time without advancing.
    pub fn frame(&self) -> Frame {
        let mut parts: BTreeMap<Part, Transform> = self
            .ambient
            .iter()
            .map(|(part, tween)| (*part, tween.sample(self.time)))
            .collect();
        parts.insert(Part::Eye, self.eye_hover.sample());
        parts.insert(Part::EyeInner, self.eye_inner());
        parts.insert(Part::Fish, self.swim.transform());
        Frame {
            time: self.time,
            parts,
        }
    }
}
