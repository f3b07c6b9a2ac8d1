//! Rhai script modules
//!
//! A module is a `.rhai` file defining `fn main(ctx)`. Mounting evaluates the
//! file's top-level statements and then calls `main` with the module context:
//!
//! ```rhai
//! fn main(ctx) {
//!     ctx.ipc.handle("version", |payload| "1.0.0");
//!     ctx.ipc.on("log", |payload| print(payload.message));
//!     ctx.app.on("before-quit", |payload| print("bye"));
//! }
//! ```

mod api;
mod loader;

pub use loader::{ScriptLoaderConfig, ScriptModule, ScriptModuleLoader};
