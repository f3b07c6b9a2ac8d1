//! End-to-end hot reload over real Rhai modules on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotwire_kernel::HostContext;
use hotwire_runtime::host::{HeadlessHost, HeadlessSurface, LocalApp, LocalIpcMain};
use hotwire_runtime::{
    ChangeDispatcher, ChangeKind, Collaborators, ContextFactory, DevHarness, DevOptions,
    FileChange, ModuleController, ModuleLayout, RegistrationTracker, ScriptModuleLoader,
    WatchConfig,
};
use hotwire_runtime::watcher::{Debouncer, map_event};
use notify::Event;
use notify::event::{EventKind, ModifyKind, RenameMode};
use serde_json::json;
use tempfile::TempDir;

fn version_module(version: u32) -> String {
    format!(
        r#"
        fn main(ctx) {{
            ctx.ipc.handle("version", |payload| {version});
            ctx.ipc.on("ping", |payload| print("ping"));
        }}
        "#
    )
}

fn write(path: &Path, source: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, source).unwrap();
}

struct Rig {
    dir: TempDir,
    bus: Arc<LocalIpcMain>,
    surface: Arc<HeadlessSurface>,
    dispatcher: ChangeDispatcher,
}

impl Rig {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let bus = Arc::new(LocalIpcMain::new());
        let surface = Arc::new(HeadlessSurface::default());
        let host = HostContext::new(surface.clone(), bus.clone(), Arc::new(LocalApp::new()));
        let tracker = Arc::new(RegistrationTracker::new(bus.clone()));
        let controller = ModuleController::new(
            Arc::new(ScriptModuleLoader::default()),
            ContextFactory::new(host, tracker),
        );
        let dispatcher =
            ChangeDispatcher::new(ModuleLayout::new(dir.path()), controller, surface.clone());

        Self {
            dir,
            bus,
            surface,
            dispatcher,
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

#[tokio::test]
async fn test_hot_replace_runs_new_source() {
    let mut rig = Rig::new();
    let module = rig.path("ipc/version.rhai");
    write(&module, &version_module(1));

    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();
    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(1));

    write(&module, &version_module(2));
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Change, module.clone()))
        .await
        .unwrap();

    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(2));
    assert_eq!(rig.bus.listener_count("ping"), 1);
    assert_eq!(rig.surface.reload_count(), 0);
}

#[tokio::test]
async fn test_unlink_removes_module_registrations() {
    let mut rig = Rig::new();
    let module = rig.path("ipc/version.rhai");
    write(&module, &version_module(1));

    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();
    std::fs::remove_file(&module).unwrap();
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Unlink, module))
        .await
        .unwrap();

    assert!(!rig.bus.has_handler("version"));
    assert_eq!(rig.bus.listener_count("ping"), 0);
}

#[tokio::test]
async fn test_shared_file_change_reloads_entry_and_ipc_modules() {
    let mut rig = Rig::new();
    let entry = rig.path("index.rhai");
    let module = rig.path("ipc/version.rhai");
    write(
        &entry,
        r#"fn main(ctx) { ctx.ipc.on("ready", |payload| print("entry ready")); }"#,
    );
    write(&module, &version_module(1));

    rig.dispatcher.controller_mut().mount(&entry).await.unwrap();
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();

    write(&module, &version_module(3));
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Change, rig.path("lib/shared.rhai")))
        .await
        .unwrap();

    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(3));
    assert_eq!(rig.bus.listener_count("ready"), 1);
}

#[tokio::test]
async fn test_broken_module_is_reported_and_fixed_on_next_change() {
    let mut rig = Rig::new();
    let module = rig.path("ipc/version.rhai");
    write(&module, "fn main(ctx) { throw \"not yet\"; }");

    let result = rig
        .dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await;
    assert!(result.is_err());
    assert!(rig.dispatcher.is_known_ipc_module(&module));

    write(&module, &version_module(7));
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Change, module))
        .await
        .unwrap();
    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(7));
}

#[tokio::test]
async fn test_atomic_save_replaces_module_once() {
    let mut rig = Rig::new();
    let module = rig.path("ipc/version.rhai");
    write(&module, &version_module(1));
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();

    // editor writes a sibling temp file and renames it over the module
    let temp = rig.path("ipc/.version.rhai.tmp123");
    write(&temp, &version_module(2));
    std::fs::rename(&temp, &module).unwrap();
    let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(temp)
        .add_path(module.clone());
    for change in map_event(&event) {
        rig.dispatcher.dispatch(&change).await.unwrap();
    }

    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(2));
    assert_eq!(rig.bus.listener_count("ping"), 1);
    assert!(rig.dispatcher.is_known_ipc_module(&module));
}

#[tokio::test]
async fn test_repeated_add_reloads_instead_of_stacking() {
    let mut rig = Rig::new();
    let module = rig.path("ipc/version.rhai");
    write(&module, &version_module(1));

    // initial scan and the live watcher can both report the same file
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();
    write(&module, &version_module(2));
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();

    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(2));
    assert_eq!(rig.bus.listener_count("ping"), 1);
    assert_eq!(rig.dispatcher.ipc_modules().count(), 1);
}

#[tokio::test]
async fn test_debounced_change_sees_finished_write() {
    let mut rig = Rig::new();
    let module = rig.path("ipc/version.rhai");
    write(&module, &version_module(1));
    rig.dispatcher
        .dispatch(&FileChange::new(ChangeKind::Add, module.clone()))
        .await
        .unwrap();

    let mut debouncer = Debouncer::new(Duration::from_millis(100));
    let start = Instant::now();
    let source = version_module(2);
    let change = FileChange::new(ChangeKind::Change, module.clone());

    // truncate and write half, then finish 30ms later
    write(&module, &source[..source.len() / 2]);
    assert!(debouncer.push(change.clone(), start).is_none());
    assert!(debouncer.drain_due(start + Duration::from_millis(30)).is_empty());
    write(&module, &source);
    assert!(debouncer.push(change, start + Duration::from_millis(30)).is_none());

    let released = debouncer.drain_due(start + Duration::from_millis(130));
    assert_eq!(released.len(), 1);
    for change in released {
        rig.dispatcher.dispatch(&change).await.unwrap();
    }

    assert_eq!(rig.bus.invoke("version", json!(null)).unwrap(), json!(2));
    assert_eq!(rig.bus.listener_count("ping"), 1);
}

#[tokio::test]
async fn test_harness_picks_up_edits_while_running() {
    let dir = TempDir::new().unwrap();
    let module = dir.path().join("ipc/version.rhai");
    write(&dir.path().join("index.rhai"), "fn main(ctx) {}");
    write(&module, &version_module(1));

    let bus = Arc::new(LocalIpcMain::new());
    let options = DevOptions::new(dir.path()).with_watch_config(
        WatchConfig::default()
            .with_polling(true)
            .with_poll_interval(Duration::from_millis(50))
            .with_debounce(Duration::ZERO),
    );
    let collaborators = Collaborators {
        host: Arc::new(HeadlessHost::new()),
        ipc: bus.clone(),
        app: Arc::new(LocalApp::new()),
        loader: Arc::new(ScriptModuleLoader::default()),
    };
    let mut harness = DevHarness::start(options, collaborators).await.unwrap();

    let driver = {
        let bus = bus.clone();
        let module = module.clone();
        async move {
            wait_for(|| bus.invoke("version", json!(null)).ok() == Some(json!(1))).await;
            // make sure the rewrite lands on a later mtime
            tokio::time::sleep(Duration::from_millis(50)).await;
            write(&module, &version_module(2));
            wait_for(|| bus.invoke("version", json!(null)).ok() == Some(json!(2))).await;
        }
    };

    harness.run(driver).await.unwrap();

    assert_eq!(bus.invoke("version", json!(null)).ok(), None);
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
