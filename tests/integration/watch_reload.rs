//! Watch mode and live-reload integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use shoal::config::Mode;
use shoal::orchestration::watch::rebuild;
use shoal::orchestration::{LiveReload, SourceWatcher, WatchGroup, WatchRouter};

use crate::fixtures::{FakeToolchain, TestProject};

/// Test: Group rebuild notifies browsers
/// Given a connected live-reload client
/// When the styles group rebuilds
/// Then CSS is written and the client receives a reload event
#[tokio::test]
async fn test_rebuild_notifies_reload() {
    let project = TestProject::new();
    let reload = LiveReload::new();
    let mut client = reload.subscribe();

    let summary = rebuild(
        WatchGroup::Styles,
        project.context(Mode::Development),
        Arc::new(FakeToolchain::new()),
        &reload,
    )
    .await
    .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.results.len(), 2);
    assert!(project.exists("dist/css/main.css"));
    assert_eq!(client.recv().await.unwrap().reason, "styles");
}

/// Test: Failed rebuild still reloads
/// Given a missing icons directory
/// When the icons group rebuilds
/// Then the run reports the failure and the reload still goes out
#[tokio::test]
async fn test_failed_rebuild_still_reloads() {
    let project = TestProject::new();
    project.remove_dir("src/icons");
    let reload = LiveReload::new();
    let mut client = reload.subscribe();

    let summary = rebuild(
        WatchGroup::Icons,
        project.context(Mode::Development),
        Arc::new(FakeToolchain::new()),
        &reload,
    )
    .await
    .unwrap();

    assert!(!summary.is_success());
    assert_eq!(client.recv().await.unwrap().reason, "icons");
}

/// Test: Routing covers the project layout
#[test]
fn test_router_roots_cover_sources() {
    let project = TestProject::new();
    let router = WatchRouter::new(&project.context(Mode::Development)).unwrap();

    assert_eq!(router.roots().len(), 5);
    assert_eq!(
        router.route(&project.path.join("src/js/app.js")),
        vec![WatchGroup::Scripts]
    );
    assert!(router
        .route(&project.path.join("src/pug/partials/head.pug"))
        .is_empty());
}

/// Test: File change triggers a rebuild
/// Given a running watcher
/// When a script changes on disk
/// Then the bundle is rebuilt and a reload event arrives
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_rebuilds_on_change() {
    let mut project = TestProject::new();
    project.config.watch.debounce_ms = 20;
    let reload = LiveReload::new();
    let mut client = reload.subscribe();
    let cancel = CancellationToken::new();

    let watcher = SourceWatcher::new(
        project.context(Mode::Development),
        Arc::new(FakeToolchain::new()),
        reload.clone(),
    )
    .unwrap();
    let handle = tokio::spawn(watcher.run(cancel.clone()));

    // Keep touching the file until the watcher is up and reacts.
    let event = timeout(Duration::from_secs(10), async {
        loop {
            project.write("src/js/app.js", "console.log('moved');");
            match timeout(Duration::from_millis(300), client.recv()).await {
                Ok(Ok(event)) => return event,
                _ => continue,
            }
        }
    })
    .await
    .expect("no reload event within 10s");

    assert_eq!(event.reason, "scripts");
    assert!(project.exists("dist/js/app.min.js"));

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
