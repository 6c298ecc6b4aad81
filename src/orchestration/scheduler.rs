//! Scheduler for parallel task execution.
//!
//! The Scheduler walks a [`TaskDAG`], dispatching every task whose
//! dependencies have completed and running independent tasks concurrently.
//! A failed task blocks everything downstream of it; unrelated branches keep
//! going. Each state change is emitted as a [`SchedulerEvent`].

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::BuildContext;
use crate::core::dag::TaskDAG;
use crate::core::task::{TaskId, TaskKind, TaskOutput, TaskStatus};
use crate::error::{Error, Result};
use crate::pipeline::run_task;
use crate::tools::Toolchain;
use crate::{slog, slog_error};

/// Events emitted by the scheduler for task lifecycle changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    TaskStarted {
        task_id: TaskId,
        kind: TaskKind,
    },
    TaskCompleted {
        task_id: TaskId,
        kind: TaskKind,
        output: TaskOutput,
        elapsed_ms: i64,
    },
    TaskFailed {
        task_id: TaskId,
        kind: TaskKind,
        error: String,
    },
    /// The task never ran because something upstream failed.
    TaskBlocked {
        task_id: TaskId,
        kind: TaskKind,
        reason: String,
    },
    /// Every task reached a terminal state.
    AllTasksComplete,
}

/// Final state of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub output: Option<TaskOutput>,
}

/// Outcome of a whole run, in dependency order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub results: Vec<TaskResult>,
}

impl RunSummary {
    /// True when every task completed.
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.status == TaskStatus::Completed)
    }

    pub fn failed(&self) -> Vec<&TaskResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Failed { .. }))
            .collect()
    }

    pub fn blocked(&self) -> Vec<&TaskResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Blocked { .. }))
            .collect()
    }

    /// Results for one kind of task, in dependency order.
    pub fn of_kind(&self, kind: TaskKind) -> Vec<&TaskResult> {
        self.results.iter().filter(|r| r.kind == kind).collect()
    }
}

/// Executes one DAG to completion.
///
/// # Example
///
/// ```ignore
/// let dag = Target::Build.composition().to_dag()?;
/// let summary = Scheduler::new(dag, ctx, tools).run().await?;
/// assert!(summary.is_success());
/// ```
pub struct Scheduler {
    dag: TaskDAG,
    ctx: Arc<BuildContext>,
    tools: Arc<dyn Toolchain>,
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
    completed: HashSet<TaskId>,
    running: HashSet<TaskId>,
}

impl Scheduler {
    pub fn new(dag: TaskDAG, ctx: Arc<BuildContext>, tools: Arc<dyn Toolchain>) -> Self {
        Self {
            dag,
            ctx,
            tools,
            event_tx: None,
            completed: HashSet::new(),
            running: HashSet::new(),
        }
    }

    /// Emit lifecycle events on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Tasks whose dependencies are satisfied and that are not already running.
    pub fn get_ready_tasks(&self) -> Vec<TaskId> {
        self.dag
            .ready_tasks(&self.completed)
            .into_iter()
            .filter(|task| !self.running.contains(&task.id))
            .map(|task| task.id)
            .collect()
    }

    async fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Start every ready task. Returns the number of tasks dispatched.
    async fn dispatch_ready_tasks(
        &mut self,
        in_flight: &mut JoinSet<(TaskId, Result<TaskOutput>)>,
    ) -> usize {
        let ready = self.get_ready_tasks();
        let mut dispatched = 0;

        for task_id in ready {
            let Some(task) = self.dag.get_task_mut(&task_id) else {
                continue;
            };
            task.start();
            let kind = task.kind;
            self.running.insert(task_id);

            let ctx = Arc::clone(&self.ctx);
            let tools = Arc::clone(&self.tools);
            in_flight.spawn(async move {
                let result = AssertUnwindSafe(run_task(kind, ctx, tools))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(Error::TaskJoin(format!("{} panicked", kind))));
                (task_id, result)
            });

            self.emit(SchedulerEvent::TaskStarted { task_id, kind }).await;
            dispatched += 1;
        }

        dispatched
    }

    async fn handle_completion(&mut self, task_id: TaskId, output: TaskOutput) {
        self.running.remove(&task_id);
        let Some(task) = self.dag.get_task_mut(&task_id) else {
            return;
        };
        task.complete(output);
        let kind = task.kind;
        let elapsed_ms = task.elapsed().map(|d| d.num_milliseconds()).unwrap_or(0);
        self.completed.insert(task_id);

        slog!("task {} completed: {:?}", kind, output);
        self.emit(SchedulerEvent::TaskCompleted {
            task_id,
            kind,
            output,
            elapsed_ms,
        })
        .await;
    }

    async fn handle_failure(&mut self, task_id: TaskId, error: String) {
        self.running.remove(&task_id);
        let Some(task) = self.dag.get_task_mut(&task_id) else {
            return;
        };
        task.fail(&error);
        let kind = task.kind;
        slog_error!("task {} failed: {}", kind, error);
        self.emit(SchedulerEvent::TaskFailed {
            task_id,
            kind,
            error,
        })
        .await;

        let reason = format!("{} failed", kind);
        for downstream in self.dag.descendants(&task_id) {
            let Some(task) = self.dag.get_task_mut(&downstream) else {
                continue;
            };
            if task.is_finished() {
                continue;
            }
            task.block(&reason);
            let blocked_kind = task.kind;
            self.emit(SchedulerEvent::TaskBlocked {
                task_id: downstream,
                kind: blocked_kind,
                reason: reason.clone(),
            })
            .await;
        }
    }

    fn summary(&self) -> RunSummary {
        let ordered = self
            .dag
            .topological_order()
            .unwrap_or_else(|_| self.dag.all_tasks());
        RunSummary {
            results: ordered
                .into_iter()
                .map(|task| TaskResult {
                    task_id: task.id,
                    kind: task.kind,
                    status: task.status.clone(),
                    output: task.output,
                })
                .collect(),
        }
    }

    /// Run until every task has completed, failed, or been blocked.
    pub async fn run(mut self) -> Result<RunSummary> {
        let mut in_flight = JoinSet::new();

        loop {
            self.dispatch_ready_tasks(&mut in_flight).await;

            match in_flight.join_next().await {
                Some(Ok((task_id, Ok(output)))) => self.handle_completion(task_id, output).await,
                Some(Ok((task_id, Err(e)))) => self.handle_failure(task_id, e.to_string()).await,
                Some(Err(e)) => return Err(Error::TaskJoin(e.to_string())),
                None => break,
            }
        }

        // Nothing is running and nothing is ready: anything still pending is unreachable.
        let stuck: Vec<TaskId> = self
            .dag
            .all_tasks()
            .into_iter()
            .filter(|t| !t.is_finished())
            .map(|t| t.id)
            .collect();
        for task_id in stuck {
            if let Some(task) = self.dag.get_task_mut(&task_id) {
                task.block("dependencies never completed");
            }
        }

        self.emit(SchedulerEvent::AllTasksComplete).await;
        Ok(self.summary())
    }
}
