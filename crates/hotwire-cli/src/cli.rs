//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use hotwire_runtime::{DEFAULT_PORT, HandleScope};
use std::path::PathBuf;

/// hotwire - hot reload for desktop main-process modules
#[derive(Parser)]
#[command(name = "hotwire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Open the window and hot-reload modules as the build output changes
    Dev(DevArgs),

    /// Compile the entry module and every IPC module without running them
    Check {
        /// Build output directory
        #[arg(short, long, default_value = "dist")]
        dist: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct DevArgs {
    /// Build output directory
    #[arg(short, long, default_value = "dist")]
    pub dist: PathBuf,

    /// Port of the renderer dev server
    #[arg(short, long, env = "HOTWIRE_APP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Use the polling watcher (network drives, containers)
    #[arg(long)]
    pub poll: bool,

    /// Coalesce repeated changes within this many milliseconds, 0 disables
    #[arg(long, default_value_t = 100)]
    pub debounce_ms: u64,

    /// Which handler channels an unmount removes
    #[arg(long, value_enum, default_value_t = HandleScopeArg::Process)]
    pub handle_scope: HandleScopeArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HandleScopeArg {
    /// Every tracked channel
    Process,
    /// Only the unmounted module's channels
    Module,
}

impl From<HandleScopeArg> for HandleScope {
    fn from(arg: HandleScopeArg) -> Self {
        match arg {
            HandleScopeArg::Process => HandleScope::Harness,
            HandleScopeArg::Module => HandleScope::Module,
        }
    }
}
