/// Record normalizer: turns mapped raw rows into typed resource records.
///
/// Every input row ends up either as a record (valid or flagged invalid) or as
/// a rejection entry; row indices are assigned in input order so diagnostics
/// always point back at the source row.
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RejectionReason, RowRejected};
use crate::model::{CanonicalField, Coordinate, FieldMapping, RawRow, RawValue, ResourceRecord};
use crate::vocabulary::CategoryVocabulary;

/// Optional hemisphere letter, optional sign, digits with one `.` or `,`
/// decimal separator, optional degree marker, optional hemisphere letter.
static COORDINATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^([nsew])?\s*([+-])?\s*(\d+(?:[.,]\d+)?|[.,]\d+)\s*(?:°|º|degrees|deg)?\s*([nsew])?$",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Normalized {
    /// One record per named row, in input order. Includes invalid records.
    pub records: Vec<ResourceRecord>,
    /// One entry per row that is invalid or was dropped outright.
    pub rejections: Vec<RowRejected>,
}

impl Normalized {
    pub fn valid_count(&self) -> usize {
        self.records.iter().filter(|r| r.valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.records.len() - self.valid_count()
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    vocabulary: Arc<CategoryVocabulary>,
}

impl Normalizer {
    pub fn new(vocabulary: Arc<CategoryVocabulary>) -> Self {
        Self { vocabulary }
    }

    pub fn normalize(&self, rows: &[RawRow], mapping: &FieldMapping) -> Normalized {
        let mut out = Normalized::default();

        for (row_index, row) in rows.iter().enumerate() {
            let name = field_text(row, mapping, CanonicalField::Name);
            if name.is_empty() {
                out.rejections.push(RowRejected {
                    row_index,
                    reason: RejectionReason::MissingName,
                    field: Some(CanonicalField::Name),
                    value: String::new(),
                });
                continue;
            }

            let assessment = if mapping.get(CanonicalField::Coordinates).is_some() {
                let cell = field_value(row, mapping, CanonicalField::Coordinates);
                match split_combined(&cell) {
                    Some((lat_raw, lon_raw)) => assess_coordinate(&lat_raw, &lon_raw),
                    None => Assessment {
                        coordinate: Coordinate::new(f64::NAN, f64::NAN),
                        problem: Some((
                            RejectionReason::UnparseableCoordinate,
                            Some(CanonicalField::Coordinates),
                            cell.to_text(),
                        )),
                    },
                }
            } else {
                let lat_raw = field_value(row, mapping, CanonicalField::Latitude);
                let lon_raw = field_value(row, mapping, CanonicalField::Longitude);
                assess_coordinate(&lat_raw, &lon_raw)
            };

            if let Some((reason, field, value)) = assessment.problem.clone() {
                out.rejections.push(RowRejected {
                    row_index,
                    reason,
                    field,
                    value,
                });
            }

            let category_text = field_text(row, mapping, CanonicalField::Type);
            out.records.push(ResourceRecord {
                id: row_index,
                name,
                category: self.vocabulary.resolve(&category_text),
                latitude: assessment.coordinate.latitude,
                longitude: assessment.coordinate.longitude,
                address: field_text(row, mapping, CanonicalField::Address),
                contact: field_text(row, mapping, CanonicalField::Contact),
                supply_info: field_text(row, mapping, CanonicalField::CapacityOrSupplies),
                supported_disasters: split_disasters(&field_text(
                    row,
                    mapping,
                    CanonicalField::SupportedDisasters,
                )),
                last_updated: field_text(row, mapping, CanonicalField::LastUpdated),
                valid: assessment.problem.is_none(),
            });
        }

        info!(
            rows = rows.len(),
            valid = out.valid_count(),
            invalid = out.invalid_count(),
            rejected = out.rejections.len(),
            "rows normalized"
        );
        out
    }
}

struct Assessment {
    coordinate: Coordinate,
    problem: Option<(RejectionReason, Option<CanonicalField>, String)>,
}

/// Coerce both axes and classify the result. Unparseable beats out-of-range,
/// which beats the (0, 0) sentinel; latitude is reported before longitude.
fn assess_coordinate(lat_raw: &RawValue, lon_raw: &RawValue) -> Assessment {
    let lat = coerce_coordinate(lat_raw, Axis::Latitude);
    let lon = coerce_coordinate(lon_raw, Axis::Longitude);
    let coordinate = Coordinate::new(lat.unwrap_or(f64::NAN), lon.unwrap_or(f64::NAN));

    let problem = if lat.is_none() {
        Some((
            RejectionReason::UnparseableCoordinate,
            Some(CanonicalField::Latitude),
            lat_raw.to_text(),
        ))
    } else if lon.is_none() {
        Some((
            RejectionReason::UnparseableCoordinate,
            Some(CanonicalField::Longitude),
            lon_raw.to_text(),
        ))
    } else if !(-90.0..=90.0).contains(&coordinate.latitude) {
        Some((
            RejectionReason::OutOfRange,
            Some(CanonicalField::Latitude),
            lat_raw.to_text(),
        ))
    } else if !(-180.0..=180.0).contains(&coordinate.longitude) {
        Some((
            RejectionReason::OutOfRange,
            Some(CanonicalField::Longitude),
            lon_raw.to_text(),
        ))
    } else if coordinate.is_sentinel() {
        Some((
            RejectionReason::MissingCoordinateSentinel,
            None,
            format!("{}, {}", lat_raw.to_text(), lon_raw.to_text()),
        ))
    } else {
        None
    };

    Assessment {
        coordinate,
        problem,
    }
}

/// Parse a coordinate cell into decimal degrees.
///
/// Accepts surrounding whitespace, a comma decimal separator, a degree marker,
/// and one hemisphere letter (`S`/`W` negate). A hemisphere letter belonging to
/// the other axis, or one combined with an explicit sign, is rejected.
fn coerce_coordinate(raw: &RawValue, axis: Axis) -> Option<f64> {
    match raw {
        RawValue::Empty => None,
        RawValue::Number(n) => n.is_finite().then_some(*n),
        RawValue::Text(text) => {
            let caps = COORDINATE_RE.captures(text.trim())?;

            let hemisphere = match (caps.get(1), caps.get(4)) {
                (Some(_), Some(_)) => return None,
                (Some(h), None) | (None, Some(h)) => h.as_str().chars().next(),
                (None, None) => None,
            };
            let explicit_sign = caps.get(2).map(|m| m.as_str());

            let magnitude: f64 = caps[3].replace(',', ".").parse().ok()?;

            let negative = match hemisphere.map(|c| c.to_ascii_uppercase()) {
                Some(_) if explicit_sign.is_some() => return None,
                Some('N') | Some('S') if axis == Axis::Longitude => return None,
                Some('E') | Some('W') if axis == Axis::Latitude => return None,
                Some('S') | Some('W') => true,
                Some(_) => false,
                None => explicit_sign == Some("-"),
            };

            Some(if negative { -magnitude } else { magnitude })
        }
    }
}

/// Split a combined `lat, lon` cell at the first separator (`;`, `|`, then `,`),
/// or at whitespace when the cell holds exactly two tokens. Enclosing brackets
/// are ignored. Comma decimals need `;` or `|` between the two values.
fn split_combined(raw: &RawValue) -> Option<(RawValue, RawValue)> {
    let RawValue::Text(text) = raw else {
        return None;
    };
    let inner = text
        .trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']']);

    let (lat, lon) = [';', '|', ',']
        .iter()
        .find_map(|sep| inner.split_once(*sep))
        .or_else(|| {
            let mut tokens = inner.split_whitespace();
            match (tokens.next(), tokens.next(), tokens.next()) {
                (Some(lat), Some(lon), None) => Some((lat, lon)),
                _ => None,
            }
        })?;
    Some((RawValue::from_text(lat), RawValue::from_text(lon)))
}

fn field_value(row: &RawRow, mapping: &FieldMapping, field: CanonicalField) -> RawValue {
    mapping
        .get(field)
        .and_then(|column| row.get(column.index, &column.name))
        .cloned()
        .unwrap_or(RawValue::Empty)
}

fn field_text(row: &RawRow, mapping: &FieldMapping, field: CanonicalField) -> String {
    mapping
        .get(field)
        .and_then(|column| row.get(column.index, &column.name))
        .map(RawValue::to_text)
        .unwrap_or_default()
}

/// Split a `flood|cyclone` or `flood, cyclone` cell into lowercased entries.
fn split_disasters(cell: &str) -> Vec<String> {
    cell.split(['|', ','])
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaMapper;

    fn text(s: &str) -> RawValue {
        RawValue::from_text(s)
    }

    fn rows(header: &[&str], data: &[&[&str]]) -> Vec<RawRow> {
        data.iter()
            .map(|cells| {
                header
                    .iter()
                    .zip(cells.iter())
                    .map(|(h, c)| (*h, RawValue::from_text(c)))
                    .collect()
            })
            .collect()
    }

    fn normalize(header: &[&str], data: &[&[&str]]) -> Normalized {
        let mapping = SchemaMapper::default().map_schema(header).unwrap();
        let normalizer = Normalizer::new(Arc::new(CategoryVocabulary::default()));
        normalizer.normalize(&rows(header, data), &mapping)
    }

    #[test]
    fn test_coerce_plain_and_adorned() {
        let lat = |s: &str| coerce_coordinate(&text(s), Axis::Latitude);
        let lon = |s: &str| coerce_coordinate(&text(s), Axis::Longitude);

        assert_eq!(lat("12.9"), Some(12.9));
        assert_eq!(lat("  12.9  "), Some(12.9));
        assert_eq!(lat("12,9"), Some(12.9));
        assert_eq!(lat("12.9°"), Some(12.9));
        assert_eq!(lat("12.9 ° N"), Some(12.9));
        assert_eq!(lat("33.8S"), Some(-33.8));
        assert_eq!(lat("-33.8"), Some(-33.8));
        assert_eq!(lat("+33.8"), Some(33.8));
        assert_eq!(lon("77.6 E"), Some(77.6));
        assert_eq!(lon("W 122.4"), Some(-122.4));
        assert_eq!(lon("77.6 deg"), Some(77.6));
        assert_eq!(lon(".5"), Some(0.5));
    }

    #[test]
    fn test_coerce_rejects_garbage() {
        let lat = |s: &str| coerce_coordinate(&text(s), Axis::Latitude);
        let lon = |s: &str| coerce_coordinate(&text(s), Axis::Longitude);

        assert_eq!(lat(""), None);
        assert_eq!(lat("abc"), None);
        assert_eq!(lat("12.9.1"), None);
        assert_eq!(lat("1,234.5"), None);
        assert_eq!(lat("12.9 E"), None);
        assert_eq!(lon("77.6 N"), None);
        assert_eq!(lat("-12 S"), None);
        assert_eq!(lat("N 12 S"), None);
        assert_eq!(lat("NaN"), None);
    }

    #[test]
    fn test_coerce_numeric_cells() {
        assert_eq!(
            coerce_coordinate(&RawValue::Number(12.5), Axis::Latitude),
            Some(12.5)
        );
        assert_eq!(
            coerce_coordinate(&RawValue::Number(f64::INFINITY), Axis::Latitude),
            None
        );
        assert_eq!(coerce_coordinate(&RawValue::Empty, Axis::Latitude), None);
    }

    #[test]
    fn test_example_row_is_valid() {
        let out = normalize(
            &["Hospital Name", "Lat", "Long", "Type"],
            &[&["City Hospital", "12.9", "77.6", "hospital"]],
        );
        assert!(out.rejections.is_empty());
        let record = &out.records[0];
        assert_eq!(record.id, 0);
        assert_eq!(record.name, "City Hospital");
        assert_eq!(record.category.as_str(), "hospital");
        assert_eq!(record.latitude, 12.9);
        assert_eq!(record.longitude, 77.6);
        assert!(record.valid);
        assert_eq!(record.address, "");
    }

    #[test]
    fn test_invalid_coordinates_flagged_with_reasons() {
        let out = normalize(
            &["name", "lat", "lon"],
            &[
                &["A", "abc", "10"],
                &["B", "95", "10"],
                &["C", "10", "-181"],
                &["D", "0", "0"],
                &["E", "0", "12"],
                &["F", "", "12"],
            ],
        );

        assert_eq!(out.records.len(), 6);
        let valid: Vec<&str> = out
            .records
            .iter()
            .filter(|r| r.valid)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(valid, vec!["E"]);

        let reasons: Vec<(usize, RejectionReason, Option<CanonicalField>, &str)> = out
            .rejections
            .iter()
            .map(|r| (r.row_index, r.reason, r.field, r.value.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (0, RejectionReason::UnparseableCoordinate, Some(CanonicalField::Latitude), "abc"),
                (1, RejectionReason::OutOfRange, Some(CanonicalField::Latitude), "95"),
                (2, RejectionReason::OutOfRange, Some(CanonicalField::Longitude), "-181"),
                (3, RejectionReason::MissingCoordinateSentinel, None, "0, 0"),
                (5, RejectionReason::UnparseableCoordinate, Some(CanonicalField::Latitude), ""),
            ]
        );
    }

    #[test]
    fn test_nameless_rows_dropped_but_reported() {
        let out = normalize(
            &["name", "lat", "lon"],
            &[&["A", "1", "1"], &["   ", "2", "2"], &["C", "3", "3"]],
        );
        let ids: Vec<usize> = out.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(out.rejections.len(), 1);
        assert_eq!(out.rejections[0].row_index, 1);
        assert_eq!(out.rejections[0].reason, RejectionReason::MissingName);
    }

    #[test]
    fn test_every_row_accounted_for() {
        let data: &[&[&str]] = &[
            &["A", "1", "1"],
            &["", "x", "1"],
            &["C", "x", "1"],
            &["D", "0", "0"],
            &["E", "5", "5"],
        ];
        let out = normalize(&["name", "lat", "lon"], data);
        let valid_ids: Vec<usize> = out.records.iter().filter(|r| r.valid).map(|r| r.id).collect();
        let mut seen: Vec<usize> = out.rejections.iter().map(|r| r.row_index).collect();
        seen.extend(valid_ids);
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_reordering_rows_keeps_index_traceability() {
        let forward = normalize(
            &["name", "lat", "lon"],
            &[&["Good", "1", "1"], &["Bad", "999", "1"]],
        );
        let reversed = normalize(
            &["name", "lat", "lon"],
            &[&["Bad", "999", "1"], &["Good", "1", "1"]],
        );
        assert_eq!(forward.rejections[0].row_index, 1);
        assert_eq!(reversed.rejections[0].row_index, 0);
        assert_eq!(reversed.records[0].name, "Bad");
        assert_eq!(reversed.records[0].id, 0);
    }

    #[test]
    fn test_category_never_blocks_inclusion() {
        let out = normalize(
            &["name", "type", "lat", "lon"],
            &[
                &["A", "Relief Camp", "1", "1"],
                &["B", "bakery", "1", "1"],
                &["C", "", "1", "1"],
            ],
        );
        let categories: Vec<&str> = out.records.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(categories, vec!["shelter", "unknown", "unknown"]);
        assert!(out.records.iter().all(|r| r.valid));
    }

    #[test]
    fn test_optional_fields_and_disasters() {
        let out = normalize(
            &["Centre Name", "Latitude", "Longitude", "Inventory", "Supported Disasters", "Phone", "Last Updated"],
            &[&["Camp 1", "10", "20", "rice, water", "Flood| Cyclone ,", "+91 98765", "2024-06-01"]],
        );
        let record = &out.records[0];
        assert_eq!(record.supply_info, "rice, water");
        assert_eq!(record.supported_disasters, vec!["flood", "cyclone"]);
        assert_eq!(record.contact, "+91 98765");
        assert_eq!(record.last_updated, "2024-06-01");
    }

    #[test]
    fn test_numeric_cells() {
        let mapping = SchemaMapper::default().map_schema(&["name", "lat", "lon"]).unwrap();
        let row: RawRow = vec![
            ("name", text("Depot")),
            ("lat", RawValue::Number(-1.5)),
            ("lon", RawValue::Number(36.8)),
        ]
        .into_iter()
        .collect();
        let out = Normalizer::new(Arc::new(CategoryVocabulary::default())).normalize(&[row], &mapping);
        assert!(out.records[0].valid);
        assert_eq!(out.records[0].latitude, -1.5);
    }

    #[test]
    fn test_split_combined_cells() {
        let split = |s: &str| {
            split_combined(&text(s)).map(|(lat, lon)| (lat.to_text(), lon.to_text()))
        };
        let pair = |a: &str, b: &str| Some((a.to_string(), b.to_string()));

        assert_eq!(split("12.97, 77.59"), pair("12.97", "77.59"));
        assert_eq!(split("(12.97,77.59)"), pair("12.97", "77.59"));
        assert_eq!(split("12,97; 77,59"), pair("12,97", "77,59"));
        assert_eq!(split("12.97 77.59"), pair("12.97", "77.59"));
        assert_eq!(split("12.97"), None);
        assert_eq!(split_combined(&RawValue::Empty), None);
        assert_eq!(split_combined(&RawValue::Number(12.9)), None);
    }

    #[test]
    fn test_combined_coordinate_column_normalizes() {
        let out = normalize(
            &["name", "type", "location_coordinates"],
            &[
                &["North Camp", "shelter", "12.97, 77.59"],
                &["South Camp", "shelter", "33.8 S; 151.2 E"],
                &["Blank", "shelter", ""],
                &["Half", "shelter", "12.97"],
                &["Zero", "shelter", "0, 0"],
                &["Far", "shelter", "12.97, 200"],
            ],
        );

        let valid: Vec<(&str, f64, f64)> = out
            .records
            .iter()
            .filter(|r| r.valid)
            .map(|r| (r.name.as_str(), r.latitude, r.longitude))
            .collect();
        assert_eq!(
            valid,
            vec![("North Camp", 12.97, 77.59), ("South Camp", -33.8, 151.2)]
        );

        let reasons: Vec<(usize, RejectionReason, Option<CanonicalField>, &str)> = out
            .rejections
            .iter()
            .map(|r| (r.row_index, r.reason, r.field, r.value.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (2, RejectionReason::UnparseableCoordinate, Some(CanonicalField::Coordinates), ""),
                (3, RejectionReason::UnparseableCoordinate, Some(CanonicalField::Coordinates), "12.97"),
                (4, RejectionReason::MissingCoordinateSentinel, None, "0, 0"),
                (5, RejectionReason::OutOfRange, Some(CanonicalField::Longitude), "200"),
            ]
        );
    }
}
