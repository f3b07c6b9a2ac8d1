//! Change dispatcher
//!
//! Classifies every filesystem change under the build output directory and
//! routes it to the matching reload strategy.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotwire_kernel::{ModuleResult, Surface};
use tracing::{debug, error, info};

use crate::lifecycle::ModuleController;
use crate::watcher::{ChangeKind, FileChange};

/// Where the conventional files live inside the build output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    root: PathBuf,
    entry: PathBuf,
    preload: PathBuf,
    config: PathBuf,
    ipc_dir: PathBuf,
    extension: String,
}

impl ModuleLayout {
    /// Default layout: `index.rhai`, `preload.js`, `config.toml`, `ipc/*.rhai`
    ///
    /// A relative root is resolved against the current directory, since the
    /// watcher reports absolute paths.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            entry: root.join("index.rhai"),
            preload: root.join("preload.js"),
            config: root.join("config.toml"),
            ipc_dir: root.join("ipc"),
            extension: "rhai".to_string(),
            root,
        }
    }

    /// Set the entry module file name
    pub fn with_entry(mut self, file_name: &str) -> Self {
        self.entry = self.root.join(file_name);
        self
    }

    /// Set the preload script file name
    pub fn with_preload(mut self, file_name: &str) -> Self {
        self.preload = self.root.join(file_name);
        self
    }

    /// Set the user config file name
    pub fn with_config(mut self, file_name: &str) -> Self {
        self.config = self.root.join(file_name);
        self
    }

    /// Set the IPC module directory name
    pub fn with_ipc_dir(mut self, dir_name: &str) -> Self {
        self.ipc_dir = self.root.join(dir_name);
        self
    }

    /// Set the module file extension (without the dot)
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    pub fn preload(&self) -> &Path {
        &self.preload
    }

    pub fn config(&self) -> &Path {
        &self.config
    }

    pub fn ipc_dir(&self) -> &Path {
        &self.ipc_dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether `path` is a loadable module file directly inside the IPC directory
    pub fn is_ipc_module(&self, path: &Path) -> bool {
        path.parent() == Some(self.ipc_dir.as_path())
            && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
    }

    /// Classify `path`. Rules are ordered; the first match wins.
    pub fn classify(&self, path: &Path) -> PathClass {
        if path == self.preload {
            PathClass::Preload
        } else if path == self.config {
            PathClass::Config
        } else if self.is_ipc_module(path) {
            PathClass::IpcModule
        } else if path == self.entry {
            PathClass::Entry
        } else {
            PathClass::Other
        }
    }
}

/// What a changed path is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Preload,
    Config,
    IpcModule,
    Entry,
    /// Anything else, e.g. a dependency shared by several modules
    Other,
}

/// Routes file changes to module lifecycle operations
pub struct ChangeDispatcher {
    layout: ModuleLayout,
    controller: ModuleController,
    surface: Arc<dyn Surface>,
    ipc_modules: BTreeSet<PathBuf>,
}

impl ChangeDispatcher {
    pub fn new(layout: ModuleLayout, controller: ModuleController, surface: Arc<dyn Surface>) -> Self {
        Self {
            layout,
            controller,
            surface,
            ipc_modules: BTreeSet::new(),
        }
    }

    pub fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    pub fn controller(&self) -> &ModuleController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ModuleController {
        &mut self.controller
    }

    /// Currently known IPC modules, sorted
    pub fn ipc_modules(&self) -> impl Iterator<Item = &Path> {
        self.ipc_modules.iter().map(PathBuf::as_path)
    }

    pub fn is_known_ipc_module(&self, path: &Path) -> bool {
        self.ipc_modules.contains(path)
    }

    /// Apply one change.
    ///
    /// The first module failure aborts the rest of this change and is
    /// returned; the caller decides whether that is fatal.
    pub async fn dispatch(&mut self, change: &FileChange) -> ModuleResult<()> {
        let class = self.layout.classify(&change.path);
        debug!("{:?} {:?} classified as {:?}", change.kind, change.path, class);

        match (class, change.kind) {
            (PathClass::IpcModule, ChangeKind::Add) => {
                // atomic saves and the initial scan can report a known module again
                if self.ipc_modules.insert(change.path.clone()) {
                    self.controller.mount(&change.path).await
                } else {
                    self.controller.hot_replace(&change.path).await
                }
            }
            (PathClass::IpcModule, ChangeKind::Change) => {
                // a rename onto the path reports a change of a possibly new module
                self.ipc_modules.insert(change.path.clone());
                self.controller.hot_replace(&change.path).await
            }
            (PathClass::IpcModule, ChangeKind::Unlink) => {
                self.ipc_modules.remove(&change.path);
                self.controller.unmount(&change.path).await;
                Ok(())
            }
            (_, ChangeKind::Add | ChangeKind::Unlink) => {
                debug!("Ignoring {:?} of {:?}", change.kind, change.path);
                Ok(())
            }
            (PathClass::Preload, ChangeKind::Change) => {
                if let Err(e) = self.surface.reload().await {
                    error!("Failed to reload surface after preload change: {}", e);
                }
                Ok(())
            }
            (PathClass::Config, ChangeKind::Change) => {
                info!("[config] changed, restart application to take effect.");
                Ok(())
            }
            (PathClass::Entry, ChangeKind::Change) => {
                let entry = self.layout.entry.clone();
                self.controller.hot_replace(&entry).await
            }
            (PathClass::Other, ChangeKind::Change) => self.reload_everything().await,
        }
    }

    /// Hot-replace the entry module and then every known IPC module.
    pub async fn reload_everything(&mut self) -> ModuleResult<()> {
        let entry = self.layout.entry.clone();
        self.controller.hot_replace(&entry).await?;

        let ipc_modules: Vec<PathBuf> = self.ipc_modules.iter().cloned().collect();
        info!("Reloading {} IPC module(s)", ipc_modules.len());
        for path in ipc_modules {
            self.controller.hot_replace(&path).await?;
        }
        Ok(())
    }

    /// Unmount every module; used on shutdown.
    pub async fn shutdown(&mut self) {
        self.controller.unmount_all().await;
        self.ipc_modules.clear();
    }
}
