/// Error types for the ingestion pipeline and the query path.
///
/// Dataset-level failures (`MappingError`) abort a load and leave the previous
/// catalog installed. Row-level problems are never errors on the success path;
/// they are collected as `RowRejected` entries in the rejection report.
use serde::{Deserialize, Serialize};

use crate::model::CanonicalField;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error(
        "no column matches mandatory field(s) {fields}; columns seen: [{columns}]",
        fields = join_fields(.missing),
        columns = .columns.join(", ")
    )]
    MissingMandatoryField {
        missing: Vec<CanonicalField>,
        columns: Vec<String>,
    },
}

/// Why a row was excluded from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    UnparseableCoordinate,
    OutOfRange,
    MissingCoordinateSentinel,
    MissingName,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::UnparseableCoordinate => "unparseable coordinate",
            RejectionReason::OutOfRange => "out of range",
            RejectionReason::MissingCoordinateSentinel => "missing coordinate sentinel",
            RejectionReason::MissingName => "missing name",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-row rejection, carrying enough context for an operator-facing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("row {row_index}: {reason}{}", describe_field(.field, .value))]
pub struct RowRejected {
    pub row_index: usize,
    pub reason: RejectionReason,
    /// The field that caused the rejection, when a single field is to blame.
    pub field: Option<CanonicalField>,
    /// The offending raw value, trimmed. Empty when the value was absent.
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("invalid reference location ({latitude}, {longitude}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidReferenceLocation { latitude: f64, longitude: f64 },

    #[error("no dataset has been loaded")]
    EmptyCatalog,

    #[error("config error: {0}")]
    Config(String),
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_field(field: &Option<CanonicalField>, value: &str) -> String {
    match field {
        Some(field) => format!(" ({field} = {value:?})"),
        None => String::new(),
    }
}
