use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single decoded spreadsheet cell, reduced to the three kinds the
/// normalizer understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
}

impl RawValue {
    /// Build a value from decoded text. Whitespace-only text is `Empty`.
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            RawValue::Empty
        } else {
            RawValue::Text(text.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawValue::Empty)
    }

    /// Render the value as trimmed text. Numbers use their shortest round-trip form.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) => n.to_string(),
        }
    }
}

/// One input row: column names in header order paired with their values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, RawValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: RawValue) {
        self.cells.push((column.into(), value));
    }

    /// Look up a cell by header position, falling back to the first cell with
    /// a matching name when the position does not carry that column.
    pub fn get(&self, index: usize, column: &str) -> Option<&RawValue> {
        match self.cells.get(index) {
            Some((name, value)) if name == column => Some(value),
            _ => self
                .cells
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RawValue)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (K, RawValue)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The fixed set of attributes every dataset is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    Type,
    Latitude,
    Longitude,
    Address,
    Contact,
    CapacityOrSupplies,
    SupportedDisasters,
    LastUpdated,
    /// A single "lat, lon" cell standing in for both coordinate columns.
    Coordinates,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::Name,
        CanonicalField::Type,
        CanonicalField::Latitude,
        CanonicalField::Longitude,
        CanonicalField::Address,
        CanonicalField::Contact,
        CanonicalField::CapacityOrSupplies,
        CanonicalField::SupportedDisasters,
        CanonicalField::LastUpdated,
        CanonicalField::Coordinates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Name => "name",
            CanonicalField::Type => "type",
            CanonicalField::Latitude => "latitude",
            CanonicalField::Longitude => "longitude",
            CanonicalField::Address => "address",
            CanonicalField::Contact => "contact",
            CanonicalField::CapacityOrSupplies => "capacity_or_supplies",
            CanonicalField::SupportedDisasters => "supported_disasters",
            CanonicalField::LastUpdated => "last_updated",
            CanonicalField::Coordinates => "coordinates",
        }
    }

    /// A dataset without a column for a mandatory field is rejected as a whole,
    /// unless a combined `Coordinates` column supplies both axes.
    pub fn is_mandatory(self) -> bool {
        matches!(self, CanonicalField::Latitude | CanonicalField::Longitude)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source column a canonical field was matched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedColumn {
    /// Header text exactly as it appeared in the upload.
    pub name: String,
    /// Zero-based position in the header.
    pub index: usize,
    /// Match confidence in (0, 1]; 1.0 means an exact alias hit.
    pub score: f64,
}

/// Canonical field → source column. Built once per upload and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    columns: BTreeMap<CanonicalField, MappedColumn>,
}

impl FieldMapping {
    pub(crate) fn from_columns(columns: BTreeMap<CanonicalField, MappedColumn>) -> Self {
        Self { columns }
    }

    pub fn get(&self, field: CanonicalField) -> Option<&MappedColumn> {
        self.columns.get(&field)
    }

    /// Name of the source column mapped to `field`, if any.
    pub fn source_column(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &MappedColumn)> {
        self.columns.iter().map(|(field, column)| (*field, column))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A label from the controlled category vocabulary, or `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub const UNKNOWN: &'static str = "unknown";

    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn in_bounds(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Exactly (0, 0), the "no coordinate" placeholder used by many exports.
    pub fn is_sentinel(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// A normalized relief resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Zero-based row index within the uploaded dataset.
    pub id: usize,
    pub name: String,
    pub category: Category,
    /// NaN when the source value could not be parsed.
    pub latitude: f64,
    /// NaN when the source value could not be parsed.
    pub longitude: f64,
    pub address: String,
    pub contact: String,
    pub supply_info: String,
    /// Lowercased disaster kinds this resource serves. Empty means general purpose.
    pub supported_disasters: Vec<String>,
    pub last_updated: String,
    /// True only when the coordinate is in bounds and not the (0, 0) sentinel.
    pub valid: bool,
}

impl ResourceRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn has_supplies(&self) -> bool {
        !self.supply_info.is_empty()
    }

    /// Whether this resource serves `disaster`. Resources declaring nothing, or
    /// declaring `general`, serve every disaster.
    pub fn serves_disaster(&self, disaster: &str) -> bool {
        if self.supported_disasters.is_empty() {
            return true;
        }
        let wanted = disaster.trim().to_lowercase();
        self.supported_disasters
            .iter()
            .any(|d| d == "general" || *d == wanted)
    }
}

/// A catalog record paired with its distance and travel estimate from one
/// reference point. Produced per query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult<'a> {
    pub record: &'a ResourceRecord,
    pub distance_km: f64,
    /// Straight-line distance at the configured speed. An approximation, not a routing estimate.
    pub eta_minutes: f64,
}
