//! Queryloom CLI and REST API entry point.
//!
//! Binary name: `qloom`
//!
//! Parses CLI arguments, initializes the checkpoint store and backends,
//! then dispatches to the appropriate command handler or starts the REST
//! API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use console::style;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Verbosity flags pick the default filter; RUST_LOG overrides it.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,queryloom_core=debug,queryloom_infra=debug",
        _ => "trace",
    };
    let otel = std::env::var("QUERYLOOM_OTEL")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    queryloom_observe::tracing_setup::init_tracing(filter, otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "qloom", &mut std::io::stdout());
        return Ok(());
    }

    // Initialize application state (stores, backends, workflow graph)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Ask { question, resume } => {
            cli::ask::run(&state, question, resume, cli.json).await?;
        }

        Commands::Threads { limit } => {
            cli::threads::run(&state, limit, cli.json).await?;
        }

        Commands::Show { thread_id } => {
            cli::show::run(&state, &thread_id, cli.json).await?;
        }

        Commands::Discard { thread_id, force } => {
            cli::discard::run(&state, &thread_id, force, cli.json).await?;
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!();
            println!(
                "  {} Queryloom API listening on {}",
                style("*").green().bold(),
                style(format!("http://{addr}")).cyan()
            );
            let auth_enabled = std::env::var("QUERYLOOM_API_KEY")
                .map(|key| !key.trim().is_empty())
                .unwrap_or(false);
            if auth_enabled {
                println!("  {}", style("Bearer auth enabled (QUERYLOOM_API_KEY)").dim());
            } else {
                println!(
                    "  {}",
                    style("Auth disabled; set QUERYLOOM_API_KEY to require a bearer token").dim()
                );
            }
            println!(
                "  {}",
                style(format!(
                    "Checkpoints: {}",
                    state.data_dir.join("queryloom.db").display()
                ))
                .dim()
            );
            println!("  {}", style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            println!("\n  Server stopped.");
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    queryloom_observe::tracing_setup::shutdown_tracing();
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
