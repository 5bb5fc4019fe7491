use std::path::PathBuf;

use crate::detection::DEFAULT_CONFIDENCE_THRESHOLD;

/// Runtime configuration, resolved from environment variables with CLI
/// flags taking precedence (see `main.rs`).
///
/// Environment variables:
/// - `SPOTTER_DATABASE` — SQLite database file (default `spotter.db`)
/// - `SPOTTER_MEDIA_ROOT` — media storage root (default `media`)
/// - `SPOTTER_MODEL` — SSD MobileNet V2 ONNX file (default `ssd_mobilenet_v2.onnx`)
/// - `SPOTTER_LABEL_FONT` — optional TTF/OTF used for box labels
/// - `SPOTTER_BIND` — listen address (default `127.0.0.1:8000`)
/// - `SPOTTER_CONFIDENCE_THRESHOLD` — detection score cutoff (default 0.5)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PathBuf,
    pub media_root: PathBuf,
    pub model: PathBuf,
    pub label_font: Option<PathBuf>,
    pub bind: String,
    pub confidence_threshold: f32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let confidence_threshold = match std::env::var("SPOTTER_CONFIDENCE_THRESHOLD") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("SPOTTER_CONFIDENCE_THRESHOLD is not a number"))?,
            Err(_) => DEFAULT_CONFIDENCE_THRESHOLD,
        };
        Ok(Self {
            database: env_path("SPOTTER_DATABASE").unwrap_or_else(|| "spotter.db".into()),
            media_root: env_path("SPOTTER_MEDIA_ROOT").unwrap_or_else(|| "media".into()),
            model: env_path("SPOTTER_MODEL").unwrap_or_else(|| "ssd_mobilenet_v2.onnx".into()),
            label_font: env_path("SPOTTER_LABEL_FONT"),
            bind: std::env::var("SPOTTER_BIND").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            confidence_threshold,
        })
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}
