//! Launchdeck — launchd job visibility and control from the terminal.
//!
//! # Usage
//!
//! ```text
//! launchdeck list [--domain user|gui|daemon|system | --all-domains] [--filter <substr>] [--hide-apple] [--json]
//! launchdeck show <label> [--domain <d>] [--raw] [--json]
//! launchdeck enable|disable|start|stop|reload <label> [--domain <d>]
//! launchdeck edit <label> [--domain <d>]
//! launchdeck reveal <label> [--domain <d>]
//! launchdeck watch [--domain <d> | --all-domains] [--interval <secs>] [--count <n>]
//! ```

mod commands;
mod snapshot;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    act::ActArgs,
    edit::{EditArgs, RevealArgs},
    list::ListArgs,
    show::ShowArgs,
    watch::WatchArgs,
};
use launchdeck_core::types::JobAction;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "launchdeck",
    version,
    about = "Reconcile launchd job definitions with live service state",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List jobs with their definition/live-state consistency flag.
    List(ListArgs),

    /// Show one job in full: definition, live state, flag.
    Show(ShowArgs),

    /// Clear a job's disabled override so it may load again.
    Enable(ActArgs),

    /// Persist a disabled override for a job.
    Disable(ActArgs),

    /// Start a loaded job now.
    Start(ActArgs),

    /// Send a loaded job SIGTERM.
    Stop(ActArgs),

    /// Unload and load a job again, picking up an edited definition.
    Reload(ActArgs),

    /// Open a job's definition file in the configured editor.
    Edit(EditArgs),

    /// Reveal a job's definition file in Finder.
    Reveal(RevealArgs),

    /// Re-reconcile on changes and print flag transitions.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::List(args) => args.run(),
        Commands::Show(args) => args.run(),
        Commands::Enable(args) => commands::act::run(JobAction::Enable, args),
        Commands::Disable(args) => commands::act::run(JobAction::Disable, args),
        Commands::Start(args) => commands::act::run(JobAction::Start, args),
        Commands::Stop(args) => commands::act::run(JobAction::Stop, args),
        Commands::Reload(args) => commands::act::run(JobAction::Reload, args),
        Commands::Edit(args) => args.run(),
        Commands::Reveal(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
