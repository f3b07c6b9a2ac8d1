//! In-process implementations of the host collaborators
//!
//! Used by the `hotwire` binary when no real windowing toolkit is attached,
//! and by tests.

mod app;
mod bus;
mod surface;

pub use app::LocalApp;
pub use bus::LocalIpcMain;
pub use surface::{HeadlessHost, HeadlessSurface, Location};
