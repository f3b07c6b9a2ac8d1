//! Contexts handed to modules

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::AppLifecycle;
use crate::ipc::IpcMain;
use crate::surface::Surface;

/// The raw host API, created once at startup.
///
/// The surface is set at construction and never replaced; reloading happens
/// in place through [`Surface::reload`].
#[derive(Clone)]
pub struct HostContext {
    surface: Arc<dyn Surface>,
    ipc: Arc<dyn IpcMain>,
    app: Arc<dyn AppLifecycle>,
}

impl HostContext {
    pub fn new(
        surface: Arc<dyn Surface>,
        ipc: Arc<dyn IpcMain>,
        app: Arc<dyn AppLifecycle>,
    ) -> Self {
        Self { surface, ipc, app }
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    /// The unwrapped bus. Modules must never receive this directly.
    pub fn ipc(&self) -> &Arc<dyn IpcMain> {
        &self.ipc
    }

    pub fn app(&self) -> &Arc<dyn AppLifecycle> {
        &self.app
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext").finish_non_exhaustive()
    }
}

/// The view of the host a single module gets for one mount.
#[derive(Clone)]
pub struct ModuleContext {
    path: PathBuf,
    surface: Arc<dyn Surface>,
    ipc: Arc<dyn IpcMain>,
    app: Arc<dyn AppLifecycle>,
}

impl ModuleContext {
    pub fn new(
        path: PathBuf,
        surface: Arc<dyn Surface>,
        ipc: Arc<dyn IpcMain>,
        app: Arc<dyn AppLifecycle>,
    ) -> Self {
        Self {
            path,
            surface,
            ipc,
            app,
        }
    }

    /// Path of the module this context was built for
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    pub fn ipc(&self) -> &Arc<dyn IpcMain> {
        &self.ipc
    }

    pub fn app(&self) -> &Arc<dyn AppLifecycle> {
        &self.app
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
