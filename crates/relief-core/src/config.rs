use std::sync::Arc;

use crate::error::CoreError;
use crate::geo::{GeoRanker, DEFAULT_ASSUMED_SPEED_KMH};
use crate::normalize::Normalizer;
use crate::query::QueryOrchestrator;
use crate::schema::{SchemaMapper, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::vocabulary::CategoryVocabulary;

/// Tunables for the ingestion pipeline and the ranker.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Travel speed for ETA estimates. Affects `eta_minutes` only.
    pub assumed_speed_kmh: f64,
    /// Minimum score, in (0, 1], for a fuzzy header match to be accepted.
    pub mapping_confidence_threshold: f64,
    /// Controlled category labels and their aliases.
    pub vocabulary: Arc<CategoryVocabulary>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assumed_speed_kmh: DEFAULT_ASSUMED_SPEED_KMH,
            mapping_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            vocabulary: Arc::new(CategoryVocabulary::default()),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.assumed_speed_kmh.is_finite() || self.assumed_speed_kmh <= 0.0 {
            return Err(CoreError::Config(format!(
                "assumed_speed_kmh must be a positive number, got {}",
                self.assumed_speed_kmh
            )));
        }
        let threshold = self.mapping_confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(CoreError::Config(format!(
                "mapping_confidence_threshold must be in (0, 1], got {threshold}"
            )));
        }
        Ok(())
    }

    pub fn schema_mapper(&self) -> SchemaMapper {
        SchemaMapper::new(self.mapping_confidence_threshold)
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(Arc::clone(&self.vocabulary))
    }

    pub fn orchestrator(&self) -> QueryOrchestrator {
        QueryOrchestrator::new(
            GeoRanker::new(self.assumed_speed_kmh),
            Arc::clone(&self.vocabulary),
        )
    }
}
