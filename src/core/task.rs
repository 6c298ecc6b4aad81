//! Task data model for the build DAG.
//!
//! A task is one run of one pipeline step. The same [`TaskKind`] may appear
//! more than once in a DAG (the full build compiles styles twice), so tasks
//! are identified by a generated [`TaskId`] rather than by kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task within a DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Remove everything under the output directory.
    EmptyDist,
    /// Compile templates to HTML.
    Views,
    /// Lint templates.
    LintViews,
    /// Compile stylesheet entries to CSS.
    Styles,
    /// Lint stylesheets.
    LintStyles,
    /// Bundle the script entry.
    Scripts,
    /// Copy or optimize raster images.
    Images,
    /// Copy or optimize SVG icons.
    Icons,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::EmptyDist => "empty-dist",
            TaskKind::Views => "views",
            TaskKind::LintViews => "lint-views",
            TaskKind::Styles => "styles",
            TaskKind::LintStyles => "lint-styles",
            TaskKind::Scripts => "scripts",
            TaskKind::Images => "images",
            TaskKind::Icons => "icons",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed {
        error: String,
    },
    /// An upstream task failed, so this one never ran.
    Blocked {
        reason: String,
    },
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
            TaskStatus::Blocked { reason } => write!(f, "blocked: {}", reason),
        }
    }
}

/// What a finished task did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Files written to the output tree (or removed, for `EmptyDist`).
    pub written: usize,
    /// Files left alone because the output was already up to date.
    pub skipped: usize,
    /// Lint findings that did not fail the task.
    pub violations: usize,
}

impl TaskOutput {
    pub fn written(count: usize) -> Self {
        Self {
            written: count,
            ..Self::default()
        }
    }
}

/// A single node in the build DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<TaskOutput>,
}

impl Task {
    /// Create a pending task of the given kind.
    pub fn new(kind: TaskKind) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            output: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, output: TaskOutput) {
        self.status = TaskStatus::Completed;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed {
            error: error.to_string(),
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn block(&mut self, reason: &str) {
        self.status = TaskStatus::Blocked {
            reason: reason.to_string(),
        };
    }

    /// Check if the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed { .. } | TaskStatus::Blocked { .. }
        )
    }

    /// Wall-clock duration of the run, if it has both ends.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}
