/// Query orchestrator: validate the reference point, filter, rank.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogHandle;
use crate::error::CoreError;
use crate::geo::{validate_reference, GeoRanker};
use crate::model::RankedResult;
use crate::vocabulary::{CategoryVocabulary, ALL_CATEGORIES};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    /// Ascending distance, ties in catalog order.
    #[default]
    Nearest,
    /// Resources reporting supplies first, then ascending distance.
    SuppliesFirst,
}

impl RankOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "" | "nearest" | "distance" => Some(RankOrder::Nearest),
            "supplies_first" | "inventory" | "inventory_first" => Some(RankOrder::SuppliesFirst),
            _ => None,
        }
    }
}

/// A full query. `ResourceQuery::new` gives the plain nearest-first,
/// all-categories form.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Category label or alias, or `all`.
    pub category: String,
    /// Keep only resources serving this disaster kind.
    pub disaster: Option<String>,
    pub order: RankOrder,
    pub limit: Option<usize>,
}

impl ResourceQuery {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            category: ALL_CATEGORIES.to_string(),
            disaster: None,
            order: RankOrder::Nearest,
            limit: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    ranker: GeoRanker,
    vocabulary: Arc<CategoryVocabulary>,
}

impl QueryOrchestrator {
    pub fn new(ranker: GeoRanker, vocabulary: Arc<CategoryVocabulary>) -> Self {
        Self { ranker, vocabulary }
    }

    pub fn ranker(&self) -> &GeoRanker {
        &self.ranker
    }

    /// Nearest-first resources in `category` (or `all`).
    pub fn query<'a>(
        &self,
        handle: &'a CatalogHandle,
        user_lat: f64,
        user_lon: f64,
        category: &str,
    ) -> Result<Vec<RankedResult<'a>>, CoreError> {
        let mut request = ResourceQuery::new(user_lat, user_lon);
        request.category = category.to_string();
        self.query_with(handle, &request)
    }

    /// Run a query against one catalog version.
    ///
    /// The reference point is checked first, so an invalid location is reported
    /// even when nothing is loaded. A never-loaded catalog is `EmptyCatalog`;
    /// a loaded catalog with no matches yields an empty list.
    pub fn query_with<'a>(
        &self,
        handle: &'a CatalogHandle,
        request: &ResourceQuery,
    ) -> Result<Vec<RankedResult<'a>>, CoreError> {
        let reference = validate_reference(request.latitude, request.longitude)?;
        if !handle.is_loaded() {
            return Err(CoreError::EmptyCatalog);
        }

        let filter = self.vocabulary.filter(&request.category);
        let candidates = handle
            .filter_by_category(&filter)
            .into_iter()
            .filter(|r| match &request.disaster {
                Some(disaster) if !disaster.trim().is_empty() => r.serves_disaster(disaster),
                _ => true,
            });

        let mut ranked = self.ranker.rank(reference, candidates)?;
        if request.order == RankOrder::SuppliesFirst {
            // Stable, so distance order holds within each group.
            ranked.sort_by_key(|r| !r.record.has_supplies());
        }
        if let Some(limit) = request.limit {
            ranked.truncate(limit);
        }

        debug!(
            version = handle.version(),
            category = %request.category,
            results = ranked.len(),
            "query answered"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogStore, DatasetSource};
    use crate::config::EngineConfig;
    use crate::model::{RawRow, RawValue};

    fn load(store: &CatalogStore, header: &[&str], data: &[&[&str]]) -> CatalogHandle {
        let config = EngineConfig::default();
        let mapping = config.schema_mapper().map_schema(header).unwrap();
        let rows: Vec<RawRow> = data
            .iter()
            .map(|cells| {
                header
                    .iter()
                    .zip(cells.iter())
                    .map(|(h, c)| (*h, RawValue::from_text(c)))
                    .collect()
            })
            .collect();
        let normalized = config.normalizer().normalize(&rows, &mapping);
        store.load_dataset(normalized, DatasetSource::default())
    }

    fn sample(store: &CatalogStore) -> CatalogHandle {
        load(
            store,
            &["name", "type", "lat", "lon", "supplies", "disasters"],
            &[
                &["Far Hospital", "hospital", "10.5", "20.0", "", "flood"],
                &["Near Shelter", "shelter", "10.1", "20.0", "", "flood|cyclone"],
                &["Mid Depot", "depot", "10.3", "20.0", "rice", "earthquake"],
                &["Near Clinic", "clinic", "10.2", "20.0", "beds", ""],
            ],
        )
    }

    fn names(results: &[RankedResult<'_>]) -> Vec<String> {
        results.iter().map(|r| r.record.name.clone()).collect()
    }

    #[test]
    fn test_query_all_ranks_by_distance() {
        let store = CatalogStore::new();
        let handle = sample(&store);
        let orchestrator = EngineConfig::default().orchestrator();
        let results = orchestrator.query(&handle, 10.0, 20.0, "all").unwrap();
        assert_eq!(
            names(&results),
            vec!["Near Shelter", "Near Clinic", "Mid Depot", "Far Hospital"]
        );
    }

    #[test]
    fn test_query_filters_by_category_alias() {
        let store = CatalogStore::new();
        let handle = sample(&store);
        let orchestrator = EngineConfig::default().orchestrator();
        let results = orchestrator.query(&handle, 10.0, 20.0, "Medical").unwrap();
        assert_eq!(names(&results), vec!["Near Clinic", "Far Hospital"]);
    }

    #[test]
    fn test_absent_category_is_empty_not_error() {
        let store = CatalogStore::new();
        let handle = sample(&store);
        let orchestrator = EngineConfig::default().orchestrator();
        assert!(orchestrator
            .query(&handle, 10.0, 20.0, "fire_station")
            .unwrap()
            .is_empty());
        assert!(orchestrator
            .query(&handle, 10.0, 20.0, "bakery")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unloaded_catalog_is_distinct_error() {
        let store = CatalogStore::new();
        let orchestrator = EngineConfig::default().orchestrator();
        let handle = store.current();
        assert!(matches!(
            orchestrator.query(&handle, 10.0, 20.0, "all"),
            Err(CoreError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_invalid_reference_checked_before_catalog_state() {
        let store = CatalogStore::new();
        let orchestrator = EngineConfig::default().orchestrator();
        let unloaded = store.current();
        assert!(matches!(
            orchestrator.query(&unloaded, 91.0, 0.0, "all"),
            Err(CoreError::InvalidReferenceLocation { .. })
        ));
        let loaded = sample(&store);
        assert!(matches!(
            orchestrator.query(&loaded, 91.0, 0.0, "all"),
            Err(CoreError::InvalidReferenceLocation { .. })
        ));
    }

    #[test]
    fn test_disaster_filter() {
        let store = CatalogStore::new();
        let handle = sample(&store);
        let orchestrator = EngineConfig::default().orchestrator();
        let mut request = ResourceQuery::new(10.0, 20.0);
        request.disaster = Some("Flood".to_string());
        let results = orchestrator.query_with(&handle, &request).unwrap();
        // Near Clinic declares nothing, so it serves every disaster.
        assert_eq!(
            names(&results),
            vec!["Near Shelter", "Near Clinic", "Far Hospital"]
        );
    }

    #[test]
    fn test_supplies_first_and_limit() {
        let store = CatalogStore::new();
        let handle = sample(&store);
        let orchestrator = EngineConfig::default().orchestrator();
        let mut request = ResourceQuery::new(10.0, 20.0);
        request.order = RankOrder::SuppliesFirst;
        let results = orchestrator.query_with(&handle, &request).unwrap();
        assert_eq!(
            names(&results),
            vec!["Near Clinic", "Mid Depot", "Near Shelter", "Far Hospital"]
        );

        request.limit = Some(1);
        let results = orchestrator.query_with(&handle, &request).unwrap();
        assert_eq!(names(&results), vec!["Near Clinic"]);
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let store = CatalogStore::new();
        let handle = load(
            &store,
            &["name", "lat", "lon"],
            &[&["A", "5", "5"], &["B", "5", "5"], &["C", "5", "5"]],
        );
        let orchestrator = EngineConfig::default().orchestrator();
        let first = names(&orchestrator.query(&handle, 0.0, 0.0, "all").unwrap());
        for _ in 0..10 {
            let again = names(&orchestrator.query(&handle, 0.0, 0.0, "all").unwrap());
            assert_eq!(first, again);
        }
        assert_eq!(first, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_rank_order_parse() {
        assert_eq!(RankOrder::parse("nearest"), Some(RankOrder::Nearest));
        assert_eq!(RankOrder::parse(""), Some(RankOrder::Nearest));
        assert_eq!(RankOrder::parse("Supplies First"), Some(RankOrder::SuppliesFirst));
        assert_eq!(RankOrder::parse("supplies-first"), Some(RankOrder::SuppliesFirst));
        assert_eq!(RankOrder::parse("alphabetical"), None);
    }
}
