/// MCP server implementation for the relief resource locator.
///
/// Exposes five tools:
/// - `upload_dataset`: Map, normalize, and install a CSV dataset
/// - `find_resources`: Rank resources near a location
/// - `dataset_status`: Describe the active dataset
/// - `rejection_report`: List rows excluded from the active dataset
/// - `list_categories`: List the category vocabulary with counts
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::info;

use relief_core::catalog::CatalogStore;
use relief_core::config::EngineConfig;
use relief_core::error::CoreError;
use relief_core::mcp_api::{
    CategoryCount, DatasetStatusResponse, ETA_DISCLAIMER, FieldMappingEntry, FindResourcesParams,
    FindResourcesResponse, ListCategoriesResponse, RankedResourceEntry, RejectionEntry,
    RejectionReportParams, RejectionReportResponse, UploadDatasetParams, UploadDatasetResponse,
};
use relief_core::model::Category;
use relief_core::query::{QueryOrchestrator, RankOrder, ResourceQuery};
use relief_core::vocabulary::{ALL_CATEGORIES, CategoryVocabulary};

use crate::error::AppError;
use crate::ingest::IngestService;

const DEFAULT_REPORT_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ReliefServer {
    store: Arc<CatalogStore>,
    ingest: Arc<IngestService>,
    orchestrator: Arc<QueryOrchestrator>,
    vocabulary: Arc<CategoryVocabulary>,
    tool_router: ToolRouter<ReliefServer>,
}

impl ReliefServer {
    pub fn new(config: &EngineConfig, store: Arc<CatalogStore>, ingest: Arc<IngestService>) -> Self {
        Self {
            store,
            ingest,
            orchestrator: Arc::new(config.orchestrator()),
            vocabulary: Arc::clone(&config.vocabulary),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ReliefServer {
    #[tool(description = "Upload a relief-centre dataset as CSV text. Column names are auto-mapped (name, type, latitude, longitude, address, contact, supplies, ...). Latitude and longitude columns are required; rows with bad coordinates are excluded and listed in the rejection report. Replaces the active dataset.")]
    async fn upload_dataset(
        &self,
        Parameters(params): Parameters<UploadDatasetParams>,
    ) -> Result<Json<UploadDatasetResponse>, String> {
        if params.csv_content.trim().is_empty() {
            return Err("csv_content must not be empty".to_string());
        }
        let source_name = params
            .source_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("upload.csv")
            .to_string();

        info!(source = %source_name, bytes = params.csv_content.len(), "upload_dataset tool invoked");
        let outcome = self
            .ingest
            .ingest(params.csv_content.as_bytes(), &source_name)
            .map_err(|e| format!("upload rejected: {e}"))?;

        let handle = outcome.handle;
        Ok(Json(UploadDatasetResponse {
            updated: outcome.updated,
            version: handle.version(),
            fingerprint: handle.fingerprint().unwrap_or_default().to_string(),
            accepted: handle.size(),
            invalid: handle.invalid_count(),
            rejected: handle.rejection_report().len(),
            mapping: outcome
                .mapping
                .as_ref()
                .map(FieldMappingEntry::from_mapping)
                .unwrap_or_default(),
        }))
    }

    #[tool(description = "Find relief resources near a location, nearest first, with great-circle distance and an approximate travel time. Filter by category ('hospital', 'shelter', 'depot', 'fire_station', 'unknown', or 'all') and optionally by disaster kind.")]
    async fn find_resources(
        &self,
        Parameters(params): Parameters<FindResourcesParams>,
    ) -> Result<Json<FindResourcesResponse>, String> {
        let order = match params.order.as_deref() {
            None => RankOrder::Nearest,
            Some(raw) => RankOrder::parse(raw).ok_or_else(|| {
                format!("unknown order '{raw}'. Use 'nearest' or 'supplies_first'")
            })?,
        };

        let request = ResourceQuery {
            latitude: params.latitude,
            longitude: params.longitude,
            category: params
                .category
                .unwrap_or_else(|| ALL_CATEGORIES.to_string()),
            disaster: params.disaster,
            order,
            limit: params.limit.map(|n| n as usize),
        };

        let handle = self.store.current();
        let ranked = self
            .orchestrator
            .query_with(&handle, &request)
            .map_err(|e| match e {
                CoreError::EmptyCatalog => {
                    "no dataset loaded: upload a dataset before searching".to_string()
                }
                other => other.to_string(),
            })?;

        Ok(Json(FindResourcesResponse {
            catalog_version: handle.version(),
            assumed_speed_kmh: self.orchestrator.ranker().assumed_speed_kmh(),
            note: ETA_DISCLAIMER.to_string(),
            results: ranked.iter().map(RankedResourceEntry::from).collect(),
        }))
    }

    #[tool(description = "Describe the active dataset: whether one is loaded, its version, source, fingerprint, record count, and rejected row count.")]
    async fn dataset_status(&self) -> Result<Json<DatasetStatusResponse>, String> {
        let handle = self.store.current();
        Ok(Json(DatasetStatusResponse {
            loaded: handle.is_loaded(),
            version: handle.version(),
            source_name: handle.source().map(|s| s.name.clone()),
            fingerprint: handle.fingerprint().map(str::to_string),
            catalog_size: handle.size(),
            rejected: handle.rejection_report().len(),
        }))
    }

    #[tool(description = "List rows excluded from the active dataset with the row index, reason, field, and offending value.")]
    async fn rejection_report(
        &self,
        Parameters(params): Parameters<RejectionReportParams>,
    ) -> Result<Json<RejectionReportResponse>, String> {
        let handle = self.store.current();
        let limit = params.limit.unwrap_or(DEFAULT_REPORT_LIMIT) as usize;
        let report = handle.rejection_report();
        Ok(Json(RejectionReportResponse {
            version: handle.version(),
            total: report.len(),
            entries: report.iter().take(limit).map(RejectionEntry::from).collect(),
        }))
    }

    #[tool(description = "List the controlled category vocabulary, each label's accepted aliases, and how many active records fall in each category.")]
    async fn list_categories(&self) -> Result<Json<ListCategoriesResponse>, String> {
        let handle = self.store.current();
        let counts = handle.category_counts();

        let mut categories: Vec<CategoryCount> = self
            .vocabulary
            .entries()
            .iter()
            .map(|entry| CategoryCount {
                label: entry.label.clone(),
                aliases: entry.aliases.clone(),
                count: counts.get(entry.label.as_str()).copied().unwrap_or(0),
            })
            .collect();
        categories.push(CategoryCount {
            label: Category::UNKNOWN.to_string(),
            aliases: Vec::new(),
            count: counts.get(Category::UNKNOWN).copied().unwrap_or(0),
        });

        Ok(Json(ListCategoriesResponse { categories }))
    }
}

impl ReliefServer {
    /// Install a dataset from disk before serving.
    pub fn preload(&self, path: &std::path::Path) -> Result<(), AppError> {
        let outcome = self.ingest.ingest_file(path)?;
        info!(
            path = %path.display(),
            version = outcome.handle.version(),
            records = outcome.handle.size(),
            rejected = outcome.handle.rejection_report().len(),
            "startup dataset loaded"
        );
        Ok(())
    }
}

#[tool_handler]
impl ServerHandler for ReliefServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "relief-locator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Disaster relief resource locator. Operators load a CSV of hospitals, \
                 shelters, supply depots, and fire stations with upload_dataset; \
                 find_resources ranks them by distance from a user's location. \
                 Use dataset_status and rejection_report to inspect the loaded data, \
                 and list_categories for the accepted category names."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ReliefServer {
        let config = EngineConfig::default();
        let store = Arc::new(CatalogStore::new());
        let ingest = Arc::new(IngestService::new(&config, Arc::clone(&store)));
        ReliefServer::new(&config, store, ingest)
    }

    fn find(latitude: f64, longitude: f64, category: Option<&str>) -> FindResourcesParams {
        FindResourcesParams {
            latitude,
            longitude,
            category: category.map(str::to_string),
            disaster: None,
            order: None,
            limit: None,
        }
    }

    const SAMPLE: &str = "Hospital Name,Lat,Long,Type\n\
                          City Hospital,12.9,77.6,hospital\n\
                          North Camp,13.0,77.6,relief camp\n\
                          Nowhere,0,0,shelter\n";

    #[test]
    fn tools_publish_output_schemas() {
        let tools = ReliefServer::tool_router().list_all();
        for name in [
            "upload_dataset",
            "find_resources",
            "dataset_status",
            "rejection_report",
            "list_categories",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[tokio::test]
    async fn find_before_upload_reports_no_dataset() {
        let server = server();
        let err = server
            .find_resources(Parameters(find(12.9, 77.6, None)))
            .await
            .err()
            .unwrap();
        assert!(err.contains("no dataset loaded"), "{err}");

        let status = server.dataset_status().await.unwrap().0;
        assert!(!status.loaded);
        assert_eq!(status.version, 0);
    }

    #[tokio::test]
    async fn upload_then_find() {
        let server = server();
        let upload = server
            .upload_dataset(Parameters(UploadDatasetParams {
                csv_content: SAMPLE.to_string(),
                source_name: Some("centres.csv".to_string()),
            }))
            .await
            .unwrap()
            .0;
        assert!(upload.updated);
        assert_eq!(upload.accepted, 2);
        assert_eq!(upload.invalid, 1);
        assert_eq!(upload.rejected, 1);
        assert!(upload
            .mapping
            .iter()
            .any(|m| m.field == "latitude" && m.source_column == "Lat"));

        let found = server
            .find_resources(Parameters(find(12.9, 77.6, Some("all"))))
            .await
            .unwrap()
            .0;
        assert_eq!(found.catalog_version, 1);
        assert_eq!(found.results.len(), 2);
        assert_eq!(found.results[0].name, "City Hospital");
        assert!(found.results[0].distance_km.abs() < 1e-6);
        assert_eq!(found.results[1].category, "shelter");

        let shelters = server
            .find_resources(Parameters(find(12.9, 77.6, Some("shelter"))))
            .await
            .unwrap()
            .0;
        assert_eq!(shelters.results.len(), 1);

        let report = server
            .rejection_report(Parameters(RejectionReportParams { limit: None }))
            .await
            .unwrap()
            .0;
        assert_eq!(report.total, 1);
        assert_eq!(report.entries[0].row_index, 2);
        assert_eq!(report.entries[0].reason, "missing coordinate sentinel");

        let categories = server.list_categories().await.unwrap().0;
        let hospital = categories
            .categories
            .iter()
            .find(|c| c.label == "hospital")
            .unwrap();
        assert_eq!(hospital.count, 1);
        assert_eq!(categories.categories.last().unwrap().label, "unknown");
    }

    #[tokio::test]
    async fn invalid_reference_and_bad_upload_are_tool_errors() {
        let server = server();
        server
            .upload_dataset(Parameters(UploadDatasetParams {
                csv_content: SAMPLE.to_string(),
                source_name: None,
            }))
            .await
            .unwrap();

        let err = server
            .find_resources(Parameters(find(91.0, 0.0, None)))
            .await
            .err()
            .unwrap();
        assert!(err.contains("invalid reference location"), "{err}");

        let err = server
            .upload_dataset(Parameters(UploadDatasetParams {
                csv_content: "name,address\nA,Main St\n".to_string(),
                source_name: None,
            }))
            .await
            .err()
            .unwrap();
        assert!(err.contains("latitude"), "{err}");

        let status = server.dataset_status().await.unwrap().0;
        assert_eq!(status.version, 1);
        assert_eq!(status.catalog_size, 2);
    }

    #[tokio::test]
    async fn combined_coordinates_upload_counts_and_unlimited_results() {
        let server = server();
        let mut csv = String::from("name,type,location_coordinates\n");
        for i in 0..30 {
            csv.push_str(&format!("Camp {i},shelter,\"{}, 77.6\"\n", 12.0 + i as f64 * 0.01));
        }
        csv.push_str(",shelter,\"12.5, 77.6\"\n");
        csv.push_str("Broken,shelter,12.5\n");

        let upload = server
            .upload_dataset(Parameters(UploadDatasetParams {
                csv_content: csv,
                source_name: None,
            }))
            .await
            .unwrap()
            .0;
        assert_eq!(upload.accepted, 30);
        assert_eq!(upload.invalid, 1);
        assert_eq!(upload.rejected, 2);
        assert!(upload
            .mapping
            .iter()
            .any(|m| m.field == "coordinates" && m.source_column == "location_coordinates"));

        let all = server
            .find_resources(Parameters(find(12.0, 77.6, None)))
            .await
            .unwrap()
            .0;
        assert_eq!(all.results.len(), 30);
        assert_eq!(all.results[0].name, "Camp 0");

        let mut capped = find(12.0, 77.6, None);
        capped.limit = Some(3);
        let capped = server.find_resources(Parameters(capped)).await.unwrap().0;
        assert_eq!(capped.results.len(), 3);
    }
}
