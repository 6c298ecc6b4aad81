//! Watch mode: rebuild the affected group on every source change.
//!
//! One notify watcher covers the base directory of every source glob. Each
//! changed path is routed to the groups whose glob it matches, debounced per
//! path, rebuilt through a fresh scheduler run, and followed by a live-reload
//! event. Rebuild failures are reported and watching continues.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{BuildContext, Config};
use crate::core::{Composition, TaskKind};
use crate::orchestration::server::LiveReload;
use crate::orchestration::{execute, RunSummary};
use crate::sources::SourceSet;
use crate::tools::Toolchain;
use crate::{report, slog, slog_debug, slog_error, Result};

/// A family of sources that rebuild together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchGroup {
    Views,
    Styles,
    Scripts,
    Images,
    Icons,
}

impl WatchGroup {
    pub const ALL: [WatchGroup; 5] = [
        WatchGroup::Views,
        WatchGroup::Styles,
        WatchGroup::Scripts,
        WatchGroup::Images,
        WatchGroup::Icons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchGroup::Views => "views",
            WatchGroup::Styles => "styles",
            WatchGroup::Scripts => "scripts",
            WatchGroup::Images => "images",
            WatchGroup::Icons => "icons",
        }
    }

    /// What to run when a file of this group changes.
    pub fn composition(&self) -> Composition {
        match self {
            WatchGroup::Views => Composition::task(TaskKind::Views),
            WatchGroup::Styles => Composition::series([
                Composition::task(TaskKind::LintStyles),
                Composition::task(TaskKind::Styles),
            ]),
            WatchGroup::Scripts => Composition::task(TaskKind::Scripts),
            WatchGroup::Images => Composition::task(TaskKind::Images),
            WatchGroup::Icons => Composition::task(TaskKind::Icons),
        }
    }

    /// The source glob this group watches.
    pub fn pattern<'a>(&self, config: &'a Config) -> &'a str {
        let src = &config.paths.src;
        match self {
            WatchGroup::Views => &src.views,
            WatchGroup::Styles => &src.styles,
            WatchGroup::Scripts => &src.scripts,
            WatchGroup::Images => &src.images,
            WatchGroup::Icons => &src.icons,
        }
    }
}

impl std::fmt::Display for WatchGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps changed paths to the groups that must rebuild.
#[derive(Debug)]
pub struct WatchRouter {
    groups: Vec<(WatchGroup, SourceSet)>,
}

impl WatchRouter {
    pub fn new(ctx: &BuildContext) -> Result<Self> {
        let groups = WatchGroup::ALL
            .iter()
            .map(|group| Ok((*group, SourceSet::new(&ctx.root, group.pattern(&ctx.config))?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups })
    }

    /// Every group whose glob matches `path`.
    pub fn route(&self, path: &Path) -> Vec<WatchGroup> {
        self.groups
            .iter()
            .filter(|(_, set)| set.matches(path))
            .map(|(group, _)| *group)
            .collect()
    }

    /// Existing base directories to watch, without duplicates or nesting.
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut bases: Vec<PathBuf> = self
            .groups
            .iter()
            .map(|(_, set)| set.base().to_path_buf())
            .filter(|base| base.is_dir())
            .collect();
        bases.sort();
        bases.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !roots.iter().any(|root| base.starts_with(root)) {
                roots.push(base);
            }
        }
        roots
    }
}

/// Drops repeated changes to the same path inside a time window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_change: Arc<RwLock<HashMap<PathBuf, Instant>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_change: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// True if a change to `path` at `now` should trigger a rebuild.
    pub fn should_process(&self, path: &Path, now: Instant) -> bool {
        let mut state = match self.last_change.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(last) = state.get(path) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        state.insert(path.to_path_buf(), now);
        true
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Rebuild one group and tell the browser to reload.
pub async fn rebuild(
    group: WatchGroup,
    ctx: Arc<BuildContext>,
    tools: Arc<dyn Toolchain>,
    reload: &LiveReload,
) -> Result<RunSummary> {
    slog!("rebuilding {}", group);
    let summary = execute(&group.composition(), ctx, tools).await?;
    reload.notify(group.as_str());
    Ok(summary)
}

/// Long-running watch loop.
pub struct SourceWatcher {
    ctx: Arc<BuildContext>,
    tools: Arc<dyn Toolchain>,
    reload: LiveReload,
    router: Arc<WatchRouter>,
    debouncer: Debouncer,
}

impl SourceWatcher {
    pub fn new(
        ctx: Arc<BuildContext>,
        tools: Arc<dyn Toolchain>,
        reload: LiveReload,
    ) -> Result<Self> {
        let router = Arc::new(WatchRouter::new(&ctx)?);
        let debouncer = Debouncer::new(Duration::from_millis(ctx.config.watch.debounce_ms));
        Ok(Self {
            ctx,
            tools,
            reload,
            router,
            debouncer,
        })
    }

    /// Start the notify watcher. Changed, debounced paths are sent on `tx`.
    /// The returned watcher must be kept alive.
    fn start_watching(&self, tx: mpsc::Sender<PathBuf>) -> Result<RecommendedWatcher> {
        let debouncer = self.debouncer.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        slog_error!("watch error: {}", e);
                        return;
                    }
                };
                if !is_content_change(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if debouncer.should_process(&path, Instant::now()) {
                        let _ = tx.blocking_send(path);
                    }
                }
            },
            NotifyConfig::default(),
        )?;

        for root in self.router.roots() {
            slog_debug!("watching {}", root.display());
            watcher.watch(&root, RecursiveMode::Recursive)?;
        }
        Ok(watcher)
    }

    /// Watch until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(256);
        let _watcher = self.start_watching(tx)?;
        report::info("Watching for changes...");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.recv() => {
                    let Some(path) = changed else { break };
                    for group in self.router.route(&path) {
                        slog_debug!("{} changed -> {}", path.display(), group);
                        let ctx = Arc::clone(&self.ctx);
                        let tools = Arc::clone(&self.tools);
                        let reload = self.reload.clone();
                        tokio::spawn(async move {
                            if let Err(e) = rebuild(group, ctx, tools, &reload).await {
                                slog_error!("rebuild of {} failed: {}", group, e);
                                report::info(&format!("rebuild of {} failed: {}", group, e));
                            }
                        });
                    }
                }
            }
        }

        slog!("watch mode stopped");
        Ok(())
    }
}
