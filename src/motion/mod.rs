//! Motion model for the swimming-fish illustration.
//!
//! - [`tween`]: transforms, easing, repeating tweens and a reversible timeline
//! - [`scene`]: the fish itself, driven by [`FishScene::tick`] and pointer input

pub mod scene;
pub mod tween;

pub use scene::{gaze_angle, random_offset, FishScene, Frame, Part, SwimCycle, Viewport};
pub use tween::{Ease, PlaybackState, Repeat, Timeline, Transform, Tween};
