use std::sync::Arc;

use relief_core::config::EngineConfig;
use relief_core::vocabulary::CategoryVocabulary;

use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
///
/// Every variable is optional; the engine falls back to its defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    /// CSV dataset to install at startup.
    pub dataset_path: Option<String>,
    /// JSON category vocabulary that replaced the built-in one, if any.
    pub vocabulary_path: Option<String>,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
}

impl Config {
    /// Optional:
    /// - `RELIEF_ASSUMED_SPEED_KMH`: travel speed for ETA estimates (default 40)
    /// - `RELIEF_MAPPING_THRESHOLD`: fuzzy header match threshold in (0, 1] (default 0.6)
    /// - `RELIEF_VOCABULARY_FILE`: JSON object of category label -> aliases
    /// - `RELIEF_DATASET_PATH`: CSV file loaded at startup
    /// - `MCP_TCP_LISTEN_ADDR`: e.g. "127.0.0.1:7400"
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut engine = EngineConfig::default();

        if let Some(speed) = parse_f64(&lookup, "RELIEF_ASSUMED_SPEED_KMH")? {
            engine.assumed_speed_kmh = speed;
        }
        if let Some(threshold) = parse_f64(&lookup, "RELIEF_MAPPING_THRESHOLD")? {
            engine.mapping_confidence_threshold = threshold;
        }

        let vocabulary_path = non_empty(lookup("RELIEF_VOCABULARY_FILE"));
        if let Some(path) = &vocabulary_path {
            let json = std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("failed to read RELIEF_VOCABULARY_FILE {path}: {e}"))
            })?;
            engine.vocabulary = Arc::new(CategoryVocabulary::from_json(&json)?);
        }

        engine.validate()?;

        Ok(Self {
            engine,
            dataset_path: non_empty(lookup("RELIEF_DATASET_PATH")),
            vocabulary_path,
            tcp_listen_addr: non_empty(lookup("MCP_TCP_LISTEN_ADDR")),
        })
    }
}

fn parse_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<f64>, AppError> {
    match non_empty(lookup(key)) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
