//! Crate-level error types for `hotwire-kernel`.
//!
//! Provides a unified [`HarnessError`] that composes the errors of every
//! collaborator (modules, surface, bus, config) together with
//! [`error_stack::Report`] for context-carrying error propagation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hotwire_kernel::error::{HarnessError, HarnessResult, IntoHarnessReport};
//! use error_stack::ResultExt;
//!
//! async fn open(host: &dyn SurfaceHost, config: &WindowConfig) -> HarnessResult<()> {
//!     host.create(config)
//!         .await
//!         .map_err(HarnessError::from)
//!         .into_report()
//!         .attach("creating the application window")?;
//!     Ok(())
//! }
//! ```

use error_stack::Report;
use thiserror::Error;

use crate::ipc::IpcError;
use crate::module::ModuleError;
use crate::surface::SurfaceError;

/// Crate-level error type for the harness.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// Loading or invoking a module failed.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// The window host failed.
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// A bus operation failed.
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// A configuration-related error (requires the `config` feature).
    #[cfg(feature = "config")]
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The filesystem watcher could not be started.
    #[error("Watch error: {0}")]
    Watch(String),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias using [`error_stack::Report`].
///
/// Equivalent to `Result<T, error_stack::Report<HarnessError>>`.
pub type HarnessResult<T> = Result<T, Report<HarnessError>>;

/// Extension trait to convert `Result<T, HarnessError>` into [`HarnessResult<T>`].
pub trait IntoHarnessReport<T> {
    /// Wrap the error in an `error_stack::Report`.
    fn into_report(self) -> HarnessResult<T>;
}

impl<T> IntoHarnessReport<T> for Result<T, HarnessError> {
    #[inline]
    fn into_report(self) -> HarnessResult<T> {
        self.map_err(Report::new)
    }
}
