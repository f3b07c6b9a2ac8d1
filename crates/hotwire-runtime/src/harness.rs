//! Dev harness
//!
//! Startup sequence and run loop: open the window, mount the entry module,
//! then feed filesystem changes to the [`ChangeDispatcher`] one at a time
//! until shut down.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use error_stack::ResultExt;
use hotwire_kernel::config::{load_user_config, resolve_window_config};
use hotwire_kernel::{
    AppLifecycle, HarnessError, HarnessResult, HostContext, IntoHarnessReport, IpcMain,
    ModuleLoader, Surface, SurfaceHost,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dispatcher::{ChangeDispatcher, ModuleLayout};
use crate::lifecycle::ModuleController;
use crate::proxy::ContextFactory;
use crate::tracker::{HandleScope, RegistrationTracker};
use crate::watcher::{ChangeKind, DistWatcher, FileChange, WatchConfig};

/// Default dev server port
pub const DEFAULT_PORT: u16 = 8000;

/// Harness settings
#[derive(Debug, Clone)]
pub struct DevOptions {
    pub layout: ModuleLayout,
    /// Port of the renderer dev server
    pub port: u16,
    pub watch: WatchConfig,
    pub handle_scope: HandleScope,
}

impl DevOptions {
    pub fn new<P: AsRef<Path>>(dist: P) -> Self {
        Self {
            layout: ModuleLayout::new(dist),
            port: DEFAULT_PORT,
            watch: WatchConfig::default(),
            handle_scope: HandleScope::default(),
        }
    }

    pub fn with_layout(mut self, layout: ModuleLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_watch_config(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_handle_scope(mut self, scope: HandleScope) -> Self {
        self.handle_scope = scope;
        self
    }

    /// URL the window loads
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Host objects the harness drives
pub struct Collaborators {
    pub host: Arc<dyn SurfaceHost>,
    pub ipc: Arc<dyn IpcMain>,
    pub app: Arc<dyn AppLifecycle>,
    pub loader: Arc<dyn ModuleLoader>,
}

/// Out-of-band requests to a running harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessCommand {
    /// Hot-replace the entry module and every known IPC module
    ReloadAll,
    /// Apply a change as if the watcher had reported it
    Apply(FileChange),
}

/// The running dev harness
pub struct DevHarness {
    options: DevOptions,
    surface: Arc<dyn Surface>,
    dispatcher: ChangeDispatcher,
    watcher: DistWatcher,
    command_tx: mpsc::Sender<HarnessCommand>,
    command_rx: mpsc::Receiver<HarnessCommand>,
}

impl DevHarness {
    /// Open the window and mount the entry module.
    ///
    /// A failing entry module is logged; the harness still starts so that
    /// the next change to the entry can fix it.
    pub async fn start(options: DevOptions, collaborators: Collaborators) -> HarnessResult<Self> {
        let config_path = options.layout.config();
        let user_config = match load_user_config(config_path) {
            Ok(Some(config)) => {
                info!("[config] loaded {:?}", config_path);
                Some(config)
            }
            Ok(None) => {
                info!("[config] user config not found");
                None
            }
            Err(e) => {
                warn!("[config] ignoring {:?}: {}", config_path, e);
                None
            }
        };

        let window = resolve_window_config(user_config.as_ref(), options.layout.preload())
            .map_err(HarnessError::from)
            .into_report()
            .attach("resolving window config")?;

        let surface = collaborators
            .host
            .create(&window)
            .await
            .map_err(HarnessError::from)
            .into_report()
            .attach("creating the application window")?;

        let url = options.url();
        surface
            .load_url(&url)
            .await
            .map_err(HarnessError::from)
            .into_report()
            .attach(format!("loading {}", url))?;

        let host = HostContext::new(surface.clone(), collaborators.ipc.clone(), collaborators.app);
        let tracker = Arc::new(RegistrationTracker::with_scope(
            collaborators.ipc,
            options.handle_scope,
        ));
        let controller =
            ModuleController::new(collaborators.loader, ContextFactory::new(host, tracker));
        let mut dispatcher =
            ChangeDispatcher::new(options.layout.clone(), controller, surface.clone());

        let entry = options.layout.entry().to_path_buf();
        if let Err(e) = dispatcher.controller_mut().mount(&entry).await {
            error!("Failed to mount entry module: {}", e);
        }

        let (command_tx, command_rx) = mpsc::channel(64);
        let watcher = DistWatcher::new(options.watch.clone());

        info!("Dev harness started on {}", url);
        Ok(Self {
            options,
            surface,
            dispatcher,
            watcher,
            command_tx,
            command_rx,
        })
    }

    pub fn options(&self) -> &DevOptions {
        &self.options
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    /// Sender for [`HarnessCommand`]s, processed by [`DevHarness::run`]
    pub fn commands(&self) -> mpsc::Sender<HarnessCommand> {
        self.command_tx.clone()
    }

    /// Apply one change now, logging instead of returning a module failure.
    pub async fn apply(&mut self, change: &FileChange) {
        if let Err(e) = self.dispatcher.dispatch(change).await {
            error!("Failed to apply {:?} of {:?}: {}", change.kind, change.path, e);
        }
    }

    async fn handle_command(&mut self, command: HarnessCommand) {
        match command {
            HarnessCommand::ReloadAll => {
                if let Err(e) = self.dispatcher.reload_everything().await {
                    error!("Reload failed: {}", e);
                }
            }
            HarnessCommand::Apply(change) => self.apply(&change).await,
        }
    }

    /// Watch the build output directory and apply changes until `shutdown`
    /// resolves, then stop watching and unmount every module.
    pub async fn run<F>(&mut self, shutdown: F) -> HarnessResult<()>
    where
        F: Future<Output = ()>,
    {
        let root = self.options.layout.root().to_path_buf();
        self.watcher
            .watch(&root)
            .await
            .map_err(|e| HarnessError::Watch(e.to_string()))
            .into_report()
            .attach(format!("watching {:?}", root))?;
        self.watcher
            .start()
            .await
            .map_err(|e| HarnessError::Watch(e.to_string()))
            .into_report()
            .attach("starting the watcher")?;
        let mut changes = self
            .watcher
            .take_event_receiver()
            .ok_or_else(|| HarnessError::Internal("watcher already consumed".to_string()))
            .into_report()?;

        let existing: Vec<PathBuf> = self.watcher.scan_existing().await;
        info!("Initial scan found {} file(s)", existing.len());
        for path in existing {
            self.apply(&FileChange::new(ChangeKind::Add, path)).await;
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command).await;
                }
                change = changes.recv() => match change {
                    Some(change) => self.apply(&change).await,
                    None => {
                        warn!("Watcher channel closed");
                        break;
                    }
                },
            }
        }

        self.watcher.stop().await;
        self.dispatcher.shutdown().await;
        info!("Dev harness stopped");
        Ok(())
    }
}
