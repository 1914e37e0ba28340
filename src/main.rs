//! # SumiClock Server Entry Point
//!
//! Serves the clock image over HTTP. Configuration comes from
//! `sumiclock.toml` (or `$SUMICLOCK_CONFIG`) plus `SUMICLOCK_*` environment
//! overrides; logging is controlled with `RUST_LOG`.
//!
//! Development mode renders a single image to a file and exits:
//!
//! ```text
//! sumiclock --render clock.png [--portrait]
//! ```

use anyhow::Context;
use chrono::Utc;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sumiclock_lib::composer::ClockComposer;
use sumiclock_lib::config::Config;
use sumiclock_lib::server::{self, AppState};
use sumiclock_lib::{Orientation, RenderRequest};

/// Where `--render` writes, and in which orientation.
struct RenderArgs {
    output: String,
    orientation: Option<Orientation>,
}

fn parse_render_args(args: &[String]) -> anyhow::Result<Option<RenderArgs>> {
    let Some(pos) = args.iter().position(|arg| arg == "--render") else {
        return Ok(None);
    };
    let output = args
        .get(pos + 1)
        .filter(|value| !value.starts_with("--"))
        .cloned()
        .context("--render requires an output file path")?;
    let orientation = args
        .iter()
        .any(|arg| arg == "--portrait")
        .then_some(Orientation::Portrait);
    Ok(Some(RenderArgs {
        output,
        orientation,
    }))
}

fn render_to_file(config: Arc<Config>, args: RenderArgs) -> anyhow::Result<()> {
    let composer = ClockComposer::new(config);
    let request = RenderRequest {
        orientation: args.orientation,
        timezone: None,
    };
    let png = composer
        .render_png(&request, Utc::now())
        .context("failed to render clock image")?;
    std::fs::write(&args.output, &png)
        .with_context(|| format!("failed to write {}", args.output))?;
    info!(path = %args.output, size = png.len(), "clock image written");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);

    let args: Vec<String> = env::args().skip(1).collect();
    if let Some(render) = parse_render_args(&args)? {
        return tokio::task::spawn_blocking(move || render_to_file(config, render))
            .await
            .context("render task failed")?;
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::router(AppState::new(Arc::clone(&config)));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %listener.local_addr()?,
        timezone = %config.clock.timezone,
        "sumiclock listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}
