// =============================================================================
// hotwire runtime - main-process hot reload
// =============================================================================
//
// Depends only on the kernel traits for the host objects it drives.
//
// Main Components:
// - RegistrationTracker: per-module bookkeeping of bus subscriptions
// - ContextFactory: tracked module contexts (bus proxy, deduplicated app events)
// - ModuleController: mount / unmount / hot_replace of single modules
// - ChangeDispatcher: routes file changes to reload strategies
// - DistWatcher: notify-based watcher over the build output directory
// - ScriptModuleLoader: Rhai script modules
// - DevHarness: startup sequence and run loop
//
// =============================================================================

pub mod dispatcher;
pub mod harness;
pub mod host;
pub mod lifecycle;
pub mod proxy;
pub mod script;
pub mod tracker;
pub mod watcher;

pub use dispatcher::{ChangeDispatcher, ModuleLayout, PathClass};
pub use harness::{Collaborators, DEFAULT_PORT, DevHarness, DevOptions, HarnessCommand};
pub use lifecycle::{ModuleController, ModuleState};
pub use proxy::{ContextFactory, DedupAppLifecycle, TrackedIpcMain};
pub use script::{ScriptLoaderConfig, ScriptModuleLoader};
pub use tracker::{ClearReport, HandleScope, RegistrationTracker};
pub use watcher::{ChangeKind, DistWatcher, FileChange, WatchConfig};

// Re-exports from kernel
pub use hotwire_kernel::{
    AppLifecycle, Handler, HarnessError, HarnessResult, IpcError, IpcMain, Listener, ModuleError,
    ModuleLoader, Payload, Surface, SurfaceHost, WindowConfig,
};
