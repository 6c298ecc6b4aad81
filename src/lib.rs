pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod pipeline;
pub mod report;
pub mod sources;
pub mod tools;
pub mod util;

// Build graph execution, watch mode and the dev server
pub mod orchestration;

// Animation state machine
pub mod motion;

pub use config::{BuildContext, Config, Mode};
pub use error::{Error, Result};
