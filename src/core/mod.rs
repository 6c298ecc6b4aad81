//! Core domain models: tasks, the build DAG, and target composition.

pub mod compose;
pub mod dag;
pub mod task;

pub use compose::{Composition, Target};
pub use dag::TaskDAG;
pub use task::{Task, TaskId, TaskKind, TaskOutput, TaskStatus};
