//! Host API exposed to module scripts
//!
//! A module's `main(ctx)` receives a `ModuleContext` value with `path`, `ipc`
//! and `app` properties. Callbacks passed to `ipc.on`, `ipc.handle` and
//! `app.on` take one payload argument and run against the module's own AST.

use std::path::PathBuf;
use std::sync::Arc;

use hotwire_kernel::{AppLifecycle, Handler, IpcError, IpcMain, Listener, ModuleContext, Payload};
use rhai::{AST, Dynamic, Engine, FnPtr};
use tracing::{debug, error, info};

/// Engine and AST a module's callbacks run against
#[derive(Clone)]
pub(crate) struct ScriptRuntime {
    engine: Arc<Engine>,
    ast: Arc<AST>,
    path: Arc<PathBuf>,
}

impl ScriptRuntime {
    pub(crate) fn new(engine: Arc<Engine>, ast: Arc<AST>, path: PathBuf) -> Self {
        Self {
            engine,
            ast,
            path: Arc::new(path),
        }
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }

    /// Call `callback` with `payload` and convert its return value back to JSON.
    fn call(&self, callback: &FnPtr, payload: &Payload) -> Result<Payload, String> {
        let arg = rhai::serde::to_dynamic(payload).map_err(|e| e.to_string())?;
        let result: Dynamic = callback
            .call(&self.engine, &self.ast, (arg,))
            .map_err(|e| e.to_string())?;
        serde_json::to_value(&result).map_err(|e| e.to_string())
    }

    fn listener(&self, event: &str, callback: FnPtr) -> Listener {
        let runtime = self.clone();
        let event = event.to_string();
        Listener::new(move |payload| {
            if let Err(e) = runtime.call(&callback, payload) {
                error!("Listener for {} in {:?} failed: {}", event, runtime.path, e);
            }
        })
    }

    fn handler(&self, channel: &str, callback: FnPtr) -> Handler {
        let runtime = self.clone();
        let channel = channel.to_string();
        Handler::new(move |payload| {
            runtime
                .call(&callback, &payload)
                .map_err(|message| IpcError::HandlerFailed {
                    channel: channel.clone(),
                    message,
                })
        })
    }
}

/// `ctx` as seen by a script
#[derive(Clone)]
pub(crate) struct ScriptContext {
    path: String,
    ipc: ScriptIpc,
    app: ScriptApp,
}

impl ScriptContext {
    pub(crate) fn new(context: &ModuleContext, runtime: ScriptRuntime) -> Self {
        Self {
            path: context.path().display().to_string(),
            ipc: ScriptIpc {
                ipc: context.ipc().clone(),
                runtime: runtime.clone(),
            },
            app: ScriptApp {
                app: context.app().clone(),
                runtime,
            },
        }
    }
}

/// `ctx.ipc`
#[derive(Clone)]
pub(crate) struct ScriptIpc {
    ipc: Arc<dyn IpcMain>,
    runtime: ScriptRuntime,
}

/// `ctx.app`
#[derive(Clone)]
pub(crate) struct ScriptApp {
    app: Arc<dyn AppLifecycle>,
    runtime: ScriptRuntime,
}

/// Register the context types and the script log hooks on `engine`.
pub(crate) fn register(engine: &mut Engine) {
    engine.on_print(|text| info!("[script] {}", text));
    engine.on_debug(|text, source, pos| {
        debug!("[script] {} @ {} {}", text, source.unwrap_or("<unknown>"), pos)
    });

    engine
        .register_type_with_name::<ScriptContext>("ModuleContext")
        .register_get("path", |ctx: &mut ScriptContext| ctx.path.clone())
        .register_get("ipc", |ctx: &mut ScriptContext| ctx.ipc.clone())
        .register_get("app", |ctx: &mut ScriptContext| ctx.app.clone());

    engine
        .register_type_with_name::<ScriptIpc>("IpcMain")
        .register_fn("on", |ipc: &mut ScriptIpc, event: &str, callback: FnPtr| {
            ipc.ipc.on(event, ipc.runtime.listener(event, callback));
        })
        .register_fn("once", |ipc: &mut ScriptIpc, event: &str, callback: FnPtr| {
            ipc.ipc.once(event, ipc.runtime.listener(event, callback));
        })
        .register_fn("handle", |ipc: &mut ScriptIpc, channel: &str, callback: FnPtr| {
            ipc.ipc.handle(channel, ipc.runtime.handler(channel, callback));
        })
        .register_fn(
            "handle_once",
            |ipc: &mut ScriptIpc, channel: &str, callback: FnPtr| {
                ipc.ipc
                    .handle_once(channel, ipc.runtime.handler(channel, callback));
            },
        )
        .register_fn("remove_handler", |ipc: &mut ScriptIpc, channel: &str| {
            ipc.ipc.remove_handler(channel);
        });

    engine
        .register_type_with_name::<ScriptApp>("App")
        .register_fn("on", |app: &mut ScriptApp, event: &str, callback: FnPtr| {
            app.app.on(event, app.runtime.listener(event, callback));
        });
}
