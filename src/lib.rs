pub mod auth;
pub mod config;
pub mod core;
pub mod detection;
pub mod models;
pub mod pipeline;
pub mod validate;
pub mod web;

pub use config::AppConfig;
pub use self::core::db::AppDb;
pub use self::core::media::MediaStore;
pub use detection::{DEFAULT_CONFIDENCE_THRESHOLD, Detector, RawDetections};
pub use models::{DetectedObject, DetectionReport};
pub use pipeline::{PipelineError, ProcessOutcome, process_record};
