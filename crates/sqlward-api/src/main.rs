//! sqlward demo service entry point.
//!
//! Binary name: `sqlward-demo`
//!
//! Resolves database settings from flags, environment and
//! `{data_dir}/database.toml`, brings the schema up to date, then serves the
//! users REST API or exits after migrating.

mod cli;
mod http;
mod state;
mod user;

use clap::Parser;
use sqlward_infra::config;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    sqlward_observe::init_tracing(cli.log_format, cli.otel).map_err(|e| anyhow::anyhow!(e))?;

    let data_dir = cli.data_dir.clone().unwrap_or_else(config::data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let mut settings = config::load_settings(&data_dir).await;
    if let Some(url) = cli.database_url {
        settings.url = url;
    }
    if cli.echo {
        settings.echo = true;
    }

    let state = AppState::init(settings).await?;

    match cli.command.unwrap_or_default() {
        Commands::Migrate => {
            tracing::info!(dialect = %state.db.dialect(), "schema is up to date");
        }

        Commands::Serve { port, host } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("sqlward demo listening on http://{addr}");

            let router = http::router::build_router(state.clone());
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!("server stopped");
        }
    }

    state.db.close().await;
    sqlward_observe::shutdown_tracing();
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
