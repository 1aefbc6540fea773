//! dechorder-api - Chord Recognition Microservice
//!
//! Serves `POST /recognize` and `GET /health`. With `--recognize <FILE>` it
//! analyzes a local audio file, prints the chord timeline as JSON and exits.

use anyhow::{Context, Result};
use clap::Parser;
use dechorder_common::config::PredictionServiceKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dechorder_api::config::{resolve_config, CliOverrides};
use dechorder_api::services::RecognitionService;
use dechorder_api::{build_recognition_service, build_router, AppState, MODULE_NAME};

#[derive(Parser, Debug)]
#[command(name = "dechorder-api")]
#[command(about = "Chord recognition microservice")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: <config_dir>/dechorder/dechorder-api.toml)
    #[arg(short, long, env = "DECHORDER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "DECHORDER_PORT")]
    port: Option<u16>,

    /// Prediction backend: dummy, remote or embedded
    #[arg(long)]
    prediction_service: Option<PredictionServiceKind>,

    /// Directory for temporary uploads
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Recognize chords in a local file and print the timeline
    #[arg(long, value_name = "FILE")]
    recognize: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            bind_address: self.bind.clone(),
            port: self.port,
            prediction_service: self.prediction_service,
            upload_dir: self.upload_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Temporary subscriber while loading config; RUST_LOG overrides the configured level
    let config = {
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).finish(),
        );
        resolve_config(&args.overrides()).context("Failed to load configuration")?
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting {} v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let service = Arc::new(build_recognition_service(&config)?);
    info!(prediction_service = service.prediction_service_name(), "Recognition service ready");

    if let Some(path) = &args.recognize {
        return recognize_file(&service, path).await;
    }

    let state = AppState::new(Arc::clone(&service), config.max_upload_bytes);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// CLI test mode
async fn recognize_file(service: &RecognitionService, path: &Path) -> Result<()> {
    info!(path = %path.display(), "Recognizing local file");
    let events = service.recognize_file(path).await.map_err(|e| {
        error!(stage = e.stage(), error = %e, "Recognition failed");
        anyhow::Error::new(e)
    })?;
    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
