//! Journey Demo - serves the sample change-name journey over HTTP

use anyhow::Context;
use clap::Parser;
use journey_engine::JourneyManager;
use journey_web::{demo, telemetry, JourneyConfig, MissingInstance};
use tokio::net::TcpListener;

/// Journey demo CLI
#[derive(Parser)]
#[command(name = "journey-demo")]
#[command(about = "Journey Demo - sample multi-step web journey", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JOURNEY_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration
    #[arg(short, long, env = "JOURNEY_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level, overrides the configuration
    #[arg(long, env = "JOURNEY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "JOURNEY_LOG_JSON")]
    json: bool,

    /// Redirect to the entry point instead of answering with the configured
    /// status when a step is requested without an instance
    #[arg(long)]
    redirect_missing: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = JourneyConfig::load(cli.config.as_deref()).context("loading configuration")?;

    if let Some(listen) = &cli.listen {
        config.web.listen_addr = listen
            .parse()
            .with_context(|| format!("invalid listen address: {listen}"))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    telemetry::init_tracing(&config.logging)?;

    let store = config.store.connect().await?;
    let manager = JourneyManager::new(demo::registry()?, store);

    let on_missing = if cli.redirect_missing {
        MissingInstance::redirect("/people/{personId}/change-name/start")
    } else {
        MissingInstance::status(config.web.missing_instance_status())
    };
    let app = demo::router(manager, on_missing)?;

    let addr = config.web.listen_addr;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Journey demo listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Journey demo shutting down");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
