//! Orchestration layer: running task graphs, watching sources, serving output.

pub mod scheduler;
pub mod server;
pub mod watch;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use scheduler::{RunSummary, Scheduler, SchedulerEvent, TaskResult};
pub use server::{LiveReload, ReloadEvent};
pub use watch::{Debouncer, SourceWatcher, WatchGroup, WatchRouter};

use crate::config::BuildContext;
use crate::core::Composition;
use crate::report;
use crate::tools::Toolchain;
use crate::Result;

/// Run a composition to completion, printing progress to the console.
pub async fn execute(
    composition: &Composition,
    ctx: Arc<BuildContext>,
    tools: Arc<dyn Toolchain>,
) -> Result<RunSummary> {
    let dag = composition.to_dag()?;
    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(report::print_events(rx));

    let summary = Scheduler::new(dag, ctx, tools).with_events(tx).run().await;
    // The scheduler owned the sender; the printer drains and exits.
    let _ = printer.await;
    summary
}
