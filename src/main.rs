use std::path::PathBuf;
use std::sync::Arc;

use ab_glyph::FontArc;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spotter::config::AppConfig;
use spotter::core::db::AppDb;
use spotter::core::media::MediaStore;
use spotter::detection::ssd::SsdMobileNet;
use spotter::web::{AppState, router};

#[derive(Parser)]
#[command(name = "spotter")]
#[command(about = "Object detection web service with user accounts")]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Root directory for uploaded and generated media
    #[arg(long, value_name = "DIR")]
    media_root: Option<PathBuf>,

    /// Path to the SSD MobileNet V2 ONNX model
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// TrueType font used for annotation labels
    #[arg(long, value_name = "FILE")]
    label_font: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Minimum detection confidence to keep
    #[arg(long, value_name = "SCORE")]
    confidence_threshold: Option<f32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(media_root) = args.media_root {
        config.media_root = media_root;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(label_font) = args.label_font {
        config.label_font = Some(label_font);
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(threshold) = args.confidence_threshold {
        config.confidence_threshold = threshold;
    }

    let db = AppDb::connect(&config.database).await?;
    let media = MediaStore::new(&config.media_root)?;

    // The model is loaded once; every request shares the compiled plan.
    let detector = SsdMobileNet::load(&config.model)?;
    let label_font = match &config.label_font {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("failed to read label font {path:?}"))?;
            Some(FontArc::try_from_vec(data).context("failed to parse label font")?)
        }
        None => {
            tracing::warn!("no label font configured, boxes will be drawn without labels");
            None
        }
    };

    let state = AppState {
        db,
        media,
        detector: Arc::new(detector),
        label_font,
        confidence_threshold: config.confidence_threshold,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
