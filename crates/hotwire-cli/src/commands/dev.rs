//! `hotwire dev` command implementation

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use hotwire_kernel::Payload;
use hotwire_runtime::host::{HeadlessHost, LocalApp, LocalIpcMain};
use hotwire_runtime::{
    Collaborators, DevHarness, DevOptions, HarnessCommand, ScriptModuleLoader, WatchConfig,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::DevArgs;

/// A line typed into the dev console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Emit an event on the bus
    Emit { event: String, payload: Payload },
    /// Invoke a request handler
    Invoke { channel: String, payload: Payload },
    /// Hot-replace every module
    Reload,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match verb {
            "emit" | "invoke" => {
                let rest = rest.trim();
                let (name, json) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err(format!("usage: {} <name> [json]", verb));
                }
                let payload = parse_payload(json)?;
                let name = name.to_string();
                Ok(if verb == "emit" {
                    Self::Emit {
                        event: name,
                        payload,
                    }
                } else {
                    Self::Invoke {
                        channel: name,
                        payload,
                    }
                })
            }
            "reload" => Ok(Self::Reload),
            other => Err(format!("unknown command: {}", other)),
        }
    }
}

fn parse_payload(json: &str) -> Result<Payload, String> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Payload::Null);
    }
    serde_json::from_str(json).map_err(|e| format!("invalid JSON payload: {}", e))
}

/// Execute the `hotwire dev` command
pub async fn run(args: DevArgs) -> anyhow::Result<()> {
    println!("{} Starting dev harness for {}", "→".green(), args.dist.display().to_string().cyan());

    let bus = Arc::new(LocalIpcMain::new());
    let app = Arc::new(LocalApp::new());
    let collaborators = Collaborators {
        host: Arc::new(HeadlessHost::new()),
        ipc: bus.clone(),
        app: app.clone(),
        loader: Arc::new(ScriptModuleLoader::default()),
    };

    let options = DevOptions::new(&args.dist)
        .with_port(args.port)
        .with_handle_scope(args.handle_scope.into())
        .with_watch_config(
            WatchConfig::default()
                .with_polling(args.poll)
                .with_debounce(Duration::from_millis(args.debounce_ms)),
        );

    let mut harness = DevHarness::start(options, collaborators)
        .await
        .map_err(|report| anyhow::anyhow!("{report:?}"))?;

    spawn_console(bus, harness.commands());

    let shutdown = {
        let app = app.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl-C, quitting");
            app.emit("before-quit", &Payload::Null);
        }
    };

    harness
        .run(shutdown)
        .await
        .map_err(|report| anyhow::anyhow!("{report:?}"))?;

    println!("{} Dev harness stopped", "✓".green());
    Ok(())
}

/// Read console commands from stdin on a dedicated thread.
fn spawn_console(bus: Arc<LocalIpcMain>, commands: mpsc::Sender<HarnessCommand>) {
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            match ConsoleCommand::parse(&line) {
                Ok(ConsoleCommand::Emit { event, payload }) => {
                    let delivered = bus.emit(&event, &payload);
                    println!("{} {} delivered to {} listener(s)", "→".green(), event, delivered);
                }
                Ok(ConsoleCommand::Invoke { channel, payload }) => {
                    match bus.invoke(&channel, payload) {
                        Ok(value) => println!("{} {}", "←".green(), value),
                        Err(e) => println!("{} {}", "✗".red(), e),
                    }
                }
                Ok(ConsoleCommand::Reload) => {
                    if commands.send(HarnessCommand::ReloadAll).await.is_err() {
                        break;
                    }
                }
                Err(message) => println!("{} {}", "!".yellow(), message),
            }
        }
    });
}
