//! Tweens, easing and a reversible timeline.
//!
//! Everything here is a pure function of elapsed time: sampling a tween
//! twice at the same time gives the same transform.

use serde::{Deserialize, Serialize};

/// Visual state of one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub rotation: f64,
    pub opacity: f64,
    pub scale_x: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            opacity: 1.0,
            scale_x: 1.0,
        }
    }
}

impl Transform {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_scale_x(mut self, scale_x: f64) -> Self {
        self.scale_x = scale_x;
        self
    }

    /// Linear blend; `progress` 0 is `self`, 1 is `to`.
    pub fn lerp(&self, to: &Transform, progress: f64) -> Transform {
        let mix = |a: f64, b: f64| a + (b - a) * progress;
        Transform {
            x: mix(self.x, to.x),
            y: mix(self.y, to.y),
            rotation: mix(self.rotation, to.rotation),
            opacity: mix(self.opacity, to.opacity),
            scale_x: mix(self.scale_x, to.scale_x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Ease {
    Linear,
    #[default]
    Power1Out,
}

impl Ease {
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::Power1Out => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

/// How many times a tween plays after the first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    Times(u32),
    Forever,
}

/// Interpolation between two transforms with timing options.
///
/// Time 0 is when the tween was created. A negative `delay` starts the
/// tween part-way through its first pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    pub from: Transform,
    pub to: Transform,
    pub duration: f64,
    pub delay: f64,
    pub repeat: Repeat,
    pub repeat_delay: f64,
    /// Alternate passes play backwards with the ease mirrored.
    pub yoyo: bool,
    pub ease: Ease,
}

impl Tween {
    pub fn new(from: Transform, to: Transform, duration: f64) -> Self {
        Self {
            from,
            to,
            duration,
            delay: 0.0,
            repeat: Repeat::Times(0),
            repeat_delay: 0.0,
            yoyo: false,
            ease: Ease::default(),
        }
    }

    /// Tween from the element's resting transform.
    pub fn to(to: Transform, duration: f64) -> Self {
        Self::new(Transform::default(), to, duration)
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn repeat_forever(mut self) -> Self {
        self.repeat = Repeat::Forever;
        self
    }

    pub fn repeat_delay(mut self, repeat_delay: f64) -> Self {
        self.repeat_delay = repeat_delay;
        self
    }

    pub fn yoyo(mut self) -> Self {
        self.yoyo = true;
        self
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    /// Length of one pass plus the pause before the next.
    fn cycle(&self) -> f64 {
        self.duration + self.repeat_delay
    }

    /// Eased progress (0 = `from`, 1 = `to`) at `time`.
    pub fn progress(&self, time: f64) -> f64 {
        let local = time - self.delay;
        if local <= 0.0 {
            return 0.0;
        }
        if self.duration <= 0.0 {
            return 1.0;
        }

        let last_pass = match self.repeat {
            Repeat::Forever => u64::MAX,
            Repeat::Times(n) => u64::from(n),
        };
        let mut pass = (local / self.cycle()).floor() as u64;
        let mut within = local - pass as f64 * self.cycle();
        if pass > last_pass {
            pass = last_pass;
            within = self.duration;
        }
        let t = (within / self.duration).min(1.0);

        if self.yoyo && pass % 2 == 1 {
            1.0 - self.ease.apply(t)
        } else {
            self.ease.apply(t)
        }
    }

    pub fn sample(&self, time: f64) -> Transform {
        self.from.lerp(&self.to, self.progress(time))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Paused,
    Forward,
    Reverse,
}

/// A single tween driven by an explicit playhead that can run either way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    tween: Tween,
    playhead: f64,
    state: PlaybackState,
}

impl Timeline {
    /// Created paused at the start.
    pub fn paused(tween: Tween) -> Self {
        Self {
            tween,
            playhead: 0.0,
            state: PlaybackState::Paused,
        }
    }

    pub fn play(&mut self) {
        self.state = PlaybackState::Forward;
    }

    /// Run backwards from wherever the playhead is.
    pub fn reverse(&mut self) {
        self.state = PlaybackState::Reverse;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playhead(&self) -> f64 {
        self.playhead
    }

    pub fn advance(&mut self, dt: f64) {
        let end = self.tween.duration;
        match self.state {
            PlaybackState::Paused => {}
            PlaybackState::Forward => {
                self.playhead = (self.playhead + dt).min(end);
                if self.playhead >= end {
                    self.state = PlaybackState::Paused;
                }
            }
            PlaybackState::Reverse => {
                self.playhead = (self.playhead - dt).max(0.0);
                if self.playhead <= 0.0 {
                    self.state = PlaybackState::Paused;
                }
            }
        }
    }

    pub fn sample(&self) -> Transform {
        self.tween.sample(self.playhead)
    }
}
