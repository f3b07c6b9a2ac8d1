//! Headless surface host
//!
//! Stands in for a real window when the harness runs without a GUI toolkit:
//! every navigation is logged and remembered, nothing is rendered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hotwire_kernel::{Surface, SurfaceError, SurfaceHost, WindowConfig};
use parking_lot::Mutex;
use tracing::info;

/// What a surface currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Blank,
    Url(String),
    File(PathBuf),
}

/// A surface that records navigation instead of rendering
pub struct HeadlessSurface {
    config: WindowConfig,
    location: Mutex<Location>,
    reloads: AtomicUsize,
}

impl HeadlessSurface {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            location: Mutex::new(Location::Blank),
            reloads: AtomicUsize::new(0),
        }
    }

    /// The config the surface was created with
    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn location(&self) -> Location {
        self.location.lock().clone()
    }

    /// How many in-place reloads have happened
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

#[async_trait]
impl Surface for HeadlessSurface {
    async fn load_url(&self, url: &str) -> Result<(), SurfaceError> {
        info!("[surface] {} -> {}", self.config.title, url);
        *self.location.lock() = Location::Url(url.to_string());
        Ok(())
    }

    async fn load_file(&self, path: &Path) -> Result<(), SurfaceError> {
        if !path.is_file() {
            return Err(SurfaceError::NavigationFailed {
                target: path.display().to_string(),
                message: "file does not exist".to_string(),
            });
        }
        info!("[surface] {} -> {}", self.config.title, path.display());
        *self.location.lock() = Location::File(path.to_path_buf());
        Ok(())
    }

    async fn reload(&self) -> Result<(), SurfaceError> {
        let count = self.reloads.fetch_add(1, Ordering::SeqCst) + 1;
        info!("[surface] reload #{} of {:?}", count, self.location());
        Ok(())
    }
}

/// Hands out [`HeadlessSurface`]s and keeps the last one for inspection
#[derive(Default)]
pub struct HeadlessHost {
    last: Mutex<Option<Arc<HeadlessSurface>>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently created surface
    pub fn last_surface(&self) -> Option<Arc<HeadlessSurface>> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl SurfaceHost for HeadlessHost {
    async fn create(&self, config: &WindowConfig) -> Result<Arc<dyn Surface>, SurfaceError> {
        info!(
            "[surface] creating window \"{}\" {}x{}",
            config.title, config.width, config.height
        );
        let surface = Arc::new(HeadlessSurface::new(config.clone()));
        *self.last.lock() = Some(surface.clone());
        Ok(surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_navigation_and_reload_are_recorded() {
        let host = HeadlessHost::new();
        let surface = host.create(&WindowConfig::default()).await.unwrap();
        surface.load_url("http://localhost:8000").await.unwrap();
        surface.reload().await.unwrap();

        let headless = host.last_surface().unwrap();
        assert_eq!(
            headless.location(),
            Location::Url("http://localhost:8000".to_string())
        );
        assert_eq!(headless.reload_count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let surface = HeadlessSurface::default();
        let result = surface.load_file(Path::new("/definitely/not/here.html")).await;
        assert!(matches!(result, Err(SurfaceError::NavigationFailed { .. })));
        assert_eq!(surface.location(), Location::Blank);
    }
}
