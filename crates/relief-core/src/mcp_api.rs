use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::RowRejected;
use crate::model::{FieldMapping, RankedResult};

pub const ETA_DISCLAIMER: &str = "eta_minutes assumes straight-line travel at a constant speed; \
     it is an approximation, not a routed travel time";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UploadDatasetParams {
    /// Full CSV text, header row first. Column names may vary; they are auto-mapped.
    pub csv_content: String,
    /// Name shown to operators, e.g. the original file name.
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindResourcesParams {
    /// User latitude in decimal degrees.
    pub latitude: f64,
    /// User longitude in decimal degrees.
    pub longitude: f64,
    /// Category such as "hospital", "shelter", "depot", "fire_station", or "all" (default).
    pub category: Option<String>,
    /// Disaster kind such as "flood" or "earthquake". Omit to ignore.
    pub disaster: Option<String>,
    /// "nearest" (default) or "supplies_first".
    pub order: Option<String>,
    /// Maximum number of results. Omit to return every match.
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RejectionReportParams {
    /// Maximum number of entries to return (default: 100).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldMappingEntry {
    pub field: String,
    pub source_column: String,
    pub score: f64,
}

impl FieldMappingEntry {
    pub fn from_mapping(mapping: &FieldMapping) -> Vec<Self> {
        mapping
            .iter()
            .map(|(field, column)| FieldMappingEntry {
                field: field.to_string(),
                source_column: column.name.clone(),
                score: column.score,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadDatasetResponse {
    /// False when the upload was byte-identical to the active dataset.
    pub updated: bool,
    pub version: u64,
    pub fingerprint: String,
    /// Rows installed in the catalog.
    pub accepted: usize,
    /// Named rows excluded for unusable coordinates.
    pub invalid: usize,
    /// Rows listed in the rejection report: the invalid rows plus nameless rows.
    pub rejected: usize,
    /// Empty when the upload was unchanged.
    pub mapping: Vec<FieldMappingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RankedResourceEntry {
    pub id: usize,
    pub name: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub contact: String,
    pub supply_info: String,
    pub supported_disasters: Vec<String>,
    pub last_updated: String,
    pub distance_km: f64,
    pub eta_minutes: f64,
}

impl From<&RankedResult<'_>> for RankedResourceEntry {
    fn from(result: &RankedResult<'_>) -> Self {
        let record = result.record;
        Self {
            id: record.id,
            name: record.name.clone(),
            category: record.category.to_string(),
            latitude: record.latitude,
            longitude: record.longitude,
            address: record.address.clone(),
            contact: record.contact.clone(),
            supply_info: record.supply_info.clone(),
            supported_disasters: record.supported_disasters.clone(),
            last_updated: record.last_updated.clone(),
            distance_km: result.distance_km,
            eta_minutes: result.eta_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FindResourcesResponse {
    pub catalog_version: u64,
    pub assumed_speed_kmh: f64,
    pub note: String,
    pub results: Vec<RankedResourceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatasetStatusResponse {
    pub loaded: bool,
    pub version: u64,
    pub source_name: Option<String>,
    pub fingerprint: Option<String>,
    pub catalog_size: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RejectionEntry {
    pub row_index: usize,
    pub reason: String,
    pub field: Option<String>,
    pub value: String,
    pub message: String,
}

impl From<&RowRejected> for RejectionEntry {
    fn from(rejected: &RowRejected) -> Self {
        Self {
            row_index: rejected.row_index,
            reason: rejected.reason.to_string(),
            field: rejected.field.map(|f| f.to_string()),
            value: rejected.value.clone(),
            message: rejected.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RejectionReportResponse {
    pub version: u64,
    pub total: usize,
    pub entries: Vec<RejectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategoryCount {
    pub label: String,
    pub aliases: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListCategoriesResponse {
    pub categories: Vec<CategoryCount>,
}
