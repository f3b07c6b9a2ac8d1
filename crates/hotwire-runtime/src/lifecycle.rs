//! Module lifecycle controller
//!
//! Mount, unmount and hot-replace of single modules. Each operation runs to
//! completion before it returns, so a caller that awaits it never observes a
//! half-applied reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotwire_kernel::{ModuleLoader, ModuleResult};
use tracing::{debug, info};

use crate::proxy::ContextFactory;
use crate::tracker::ClearReport;

/// Lifecycle state of a module path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unloaded,
    Mounted,
}

/// Owns the mount state of every module path
pub struct ModuleController {
    loader: Arc<dyn ModuleLoader>,
    factory: ContextFactory,
    mounted: HashMap<PathBuf, u32>,
}

impl ModuleController {
    pub fn new(loader: Arc<dyn ModuleLoader>, factory: ContextFactory) -> Self {
        Self {
            loader,
            factory,
            mounted: HashMap::new(),
        }
    }

    pub fn factory(&self) -> &ContextFactory {
        &self.factory
    }

    pub fn loader(&self) -> &Arc<dyn ModuleLoader> {
        &self.loader
    }

    /// Load `path` (fresh if it was evicted) and run its entry function.
    ///
    /// An entry failure is returned as is. Whatever the module registered
    /// before failing stays tracked, so the next unmount removes it.
    pub async fn mount(&mut self, path: &Path) -> ModuleResult<()> {
        let module = self.loader.load(path).await?;
        let context = self.factory.for_module(path);
        module.invoke(context)?;

        let generation = self.mounted.entry(path.to_path_buf()).or_insert(0);
        *generation += 1;
        debug!("Mounted {:?} (generation {})", path, generation);
        Ok(())
    }

    /// Remove everything `path` registered and evict it from the loader cache.
    pub async fn unmount(&mut self, path: &Path) -> ClearReport {
        let report = self.factory.tracker().clear(path);
        let evicted = self.loader.evict(path).await;
        self.mounted.remove(path);

        debug!(
            "Unmounted {:?} (evicted: {}, listeners: {}, handlers: {})",
            path, evicted, report.listeners_removed, report.handlers_removed
        );
        report
    }

    /// Unmount then mount `path`.
    pub async fn hot_replace(&mut self, path: &Path) -> ModuleResult<()> {
        info!("[hrm] {}", path.display());
        self.unmount(path).await;
        self.mount(path).await
    }

    /// Unmount every mounted module.
    pub async fn unmount_all(&mut self) {
        let paths: Vec<PathBuf> = self.mounted.keys().cloned().collect();
        for path in paths {
            self.unmount(&path).await;
        }
    }

    pub fn state(&self, path: &Path) -> ModuleState {
        if self.mounted.contains_key(path) {
            ModuleState::Mounted
        } else {
            ModuleState::Unloaded
        }
    }

    /// Number of successful mounts of `path` since it was last unmounted
    pub fn generation(&self, path: &Path) -> u32 {
        self.mounted.get(path).copied().unwrap_or(0)
    }

    /// Mounted module paths, sorted
    pub fn mounted(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.mounted.keys().cloned().collect();
        paths.sort();
        paths
    }
}
