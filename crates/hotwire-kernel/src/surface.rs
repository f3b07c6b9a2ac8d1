//! Window / browser surface abstraction
//!
//! The harness never draws anything itself. It asks a [`SurfaceHost`] for one
//! surface at startup and afterwards only navigates or reloads it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a surface host.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SurfaceError {
    #[error("Surface creation failed: {0}")]
    CreateFailed(String),

    #[error("Navigation to {target} failed: {message}")]
    NavigationFailed { target: String, message: String },

    #[error("Reload failed: {0}")]
    ReloadFailed(String),
}

/// Renderer-side preferences of a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebPreferences {
    /// Script injected into the renderer before page scripts run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preload: Option<PathBuf>,

    /// Host specific options passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Construction options for the single application window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_true")]
    pub resizable: bool,

    #[serde(default)]
    pub web_preferences: WebPreferences,

    /// Host specific options passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_title() -> String {
    "hotwire".to_string()
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            resizable: true,
            web_preferences: WebPreferences::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl WindowConfig {
    /// Set the preload script
    pub fn with_preload<P: AsRef<Path>>(mut self, preload: P) -> Self {
        self.web_preferences.preload = Some(preload.as_ref().to_path_buf());
        self
    }
}

/// A live, displayable surface.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Navigate to a URL (typically the dev server).
    async fn load_url(&self, url: &str) -> Result<(), SurfaceError>;

    /// Navigate to a local file.
    async fn load_file(&self, path: &Path) -> Result<(), SurfaceError>;

    /// Reload the current page in place, re-running the preload script.
    async fn reload(&self) -> Result<(), SurfaceError>;
}

/// Creates surfaces from a [`WindowConfig`].
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    async fn create(&self, config: &WindowConfig) -> Result<Arc<dyn Surface>, SurfaceError>;
}
