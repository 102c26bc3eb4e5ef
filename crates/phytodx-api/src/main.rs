//! phytodx CLI entry point.
//!
//! Binary name: `phytodx`
//!
//! Parses CLI arguments, sets up tracing, wires the remote client and the
//! session store, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = phytodx_observe::verbosity_filter(cli.verbose, cli.quiet);
    if let Err(e) = phytodx_observe::init_tracing(filter, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "phytodx", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Diagnose(args) => cli::diagnose::diagnose(&state, args, cli.json, cli.quiet).await,
        Commands::Status { soil } => cli::status::status(&state, soil, cli.json).await,
        Commands::Reset { soil, force } => cli::reset::reset(&state, soil, force, cli.json).await,
        Commands::Soil(args) => cli::soil::assess(&state, args, cli.json, cli.quiet).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    phytodx_observe::shutdown_tracing();
    result
}
