//! hotwire kernel
//!
//! Collaborator traits and value types shared by the hot-reload runtime and
//! the hosts it drives: the IPC bus, the application lifecycle object, the
//! window surface and the module loader.

// ipc module
pub mod ipc;
pub use ipc::{Handler, IpcError, IpcMain, Listener, Payload};

// app module
pub mod app;
pub use app::AppLifecycle;

// surface module
pub mod surface;
pub use surface::{Surface, SurfaceError, SurfaceHost, WebPreferences, WindowConfig};

// module loading
pub mod module;
pub use module::{ModuleEntry, ModuleError, ModuleLoader, ModuleResult};

// context module
pub mod context;
pub use context::{HostContext, ModuleContext};

// error module
pub mod error;
pub use error::{HarnessError, HarnessResult, IntoHarnessReport};

// user config (requires the `config` feature)
#[cfg(feature = "config")]
pub mod config;
