//! Menagerie CLI and REST API entry point.
//!
//! Binary name: `mnge`
//!
//! Parses CLI arguments, initializes database and services, then
//! dispatches to the appropriate command handler or starts the REST API
//! server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state or tracing
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "mnge", &mut std::io::stdout());
        return Ok(());
    }

    // The server gets the full structured setup from menagerie-observe;
    // one-shot commands use a plain fmt subscriber driven by verbosity.
    if let Commands::Serve { otel, .. } = &cli.command {
        menagerie_observe::tracing_setup::init_tracing(*otel)
            .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;
    } else {
        let filter = match cli.verbose {
            0 if cli.quiet => "error",
            0 => "warn",
            1 => "info,menagerie=debug",
            _ => "trace",
        };
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_target(false)
            .init();
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { host, port, otel: _ } => {
            let router = http::router::build_router(state);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, "Menagerie API listening");

            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutting down");
                })
                .await?;
            menagerie_observe::tracing_setup::shutdown_tracing();
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Seed => {
            cli::seed::seed(&state, cli.json).await?;
        }

        Commands::Reap => {
            let reaped = state
                .sandbox_service
                .reap_expired()
                .await
                .map_err(|e| anyhow::anyhow!("reap failed: {e}"))?;
            if cli.json {
                println!("{}", serde_json::json!({ "reaped": reaped }));
            } else {
                println!("  Reaped {reaped} expired sandbox(es)");
            }
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
