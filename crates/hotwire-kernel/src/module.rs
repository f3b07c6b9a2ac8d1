//! Loadable main-process modules
//!
//! A module is identified by its absolute path. Loaders cache what they
//! load; `evict` is the only way to force the next `load` to re-read the
//! source and re-execute the module body.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ModuleContext;

/// Errors raised while loading or invoking a module.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleError {
    /// The module source does not exist.
    #[error("Module not found: {0}")]
    NotFound(PathBuf),

    /// Reading the module source failed.
    #[error("Failed to read module {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The module source did not compile.
    #[error("Failed to compile module {path}: {message}")]
    Compile { path: PathBuf, message: String },

    /// The module has no entry function.
    #[error("Module {path} does not define entry function `{name}`")]
    MissingEntry { path: PathBuf, name: String },

    /// The module's entry function failed.
    #[error("Entry function of {path} failed: {message}")]
    EntryFailed { path: PathBuf, message: String },
}

impl ModuleError {
    /// Path of the module the error belongs to
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) => path,
            Self::Io { path, .. }
            | Self::Compile { path, .. }
            | Self::MissingEntry { path, .. }
            | Self::EntryFailed { path, .. } => path,
        }
    }
}

/// Module operation result type using the typed [`ModuleError`].
pub type ModuleResult<T> = Result<T, ModuleError>;

/// A loaded module, ready to be invoked.
pub trait ModuleEntry: Send + Sync {
    /// Run the module's entry function against `context`.
    ///
    /// Everything the module registers must go through `context`.
    fn invoke(&self, context: ModuleContext) -> ModuleResult<()>;
}

/// Module cache and loader.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Return the cached module for `path`, loading and caching it if absent.
    async fn load(&self, path: &Path) -> ModuleResult<Arc<dyn ModuleEntry>>;

    /// Drop `path` from the cache. Returns whether it was cached.
    async fn evict(&self, path: &Path) -> bool;

    /// Whether `path` is currently cached.
    fn is_cached(&self, path: &Path) -> bool;
}
