/// Schema mapper: matches arbitrary upload headers onto canonical fields.
///
/// Scoring, per (field, column) pair, takes the best alias score:
/// - exact folded alias hit: 1.0
/// - alias appears as whole words inside the header (aliases of 3+ chars):
///   0.6 + 0.4 * alias_len / header_len
/// - otherwise, for aliases of 5+ chars: 1 - edit_distance / max_len
///
/// A column only competes for the field(s) it scores best on, so a latitude
/// header never drifts onto longitude through edit distance. Pairs below the
/// confidence threshold are discarded. The rest are assigned greedily by
/// descending score, then leftmost column, then field order, so every column
/// feeds at most one field and every field gets at most one column.
///
/// A combined coordinate column ("lat,lon" cells) is used only when the
/// separate latitude/longitude pair is incomplete.
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::MappingError;
use crate::model::{CanonicalField, FieldMapping, MappedColumn};
use crate::text::{edit_distance, fold};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

const CONTAINMENT_BASE: f64 = 0.6;
const MIN_CONTAINMENT_ALIAS_LEN: usize = 3;
const MIN_FUZZY_ALIAS_LEN: usize = 5;

/// Built-in aliases. Alias sets are disjoint across fields.
fn default_aliases(field: CanonicalField) -> &'static [&'static str] {
    match field {
        CanonicalField::Name => &[
            "name",
            "hospital name",
            "facility name",
            "station name",
            "centre name",
            "center name",
            "resource name",
            "site name",
            "title",
        ],
        CanonicalField::Type => &[
            "type",
            "category",
            "hospital category",
            "hospital type",
            "centre type",
            "center type",
            "facility type",
            "resource type",
            "kind",
        ],
        CanonicalField::Latitude => &[
            "lat",
            "latitude",
            "y",
            "geo lat",
            "latitude dd",
            "lat dd",
        ],
        CanonicalField::Longitude => &[
            "lon",
            "long",
            "longitude",
            "lng",
            "x",
            "geo lon",
            "geo long",
            "geo lng",
            "longitude dd",
            "lng dd",
            "lon dd",
        ],
        CanonicalField::Address => &[
            "address",
            "addr",
            "street address",
            "location",
            "full address",
        ],
        CanonicalField::Contact => &[
            "contact",
            "mobile number",
            "mobile",
            "telephone",
            "phone",
            "phone no",
            "phone number",
            "contact number",
            "email",
        ],
        CanonicalField::CapacityOrSupplies => &[
            "capacity or supplies",
            "capacity",
            "supplies",
            "supply",
            "inventory",
            "stock",
            "beds",
            "resources available",
        ],
        CanonicalField::SupportedDisasters => &[
            "supported disasters",
            "disasters",
            "disaster types",
            "disaster type",
            "hazards",
        ],
        CanonicalField::LastUpdated => &[
            "last updated",
            "updated",
            "updated at",
            "last update",
            "date",
        ],
        CanonicalField::Coordinates => &[
            "coordinates",
            "location coordinates",
            "geo coordinates",
            "gps coordinates",
            "coords",
            "lat lon",
            "lat long",
            "lat lng",
            "latlon",
            "latlong",
            "latlng",
            "latitude longitude",
        ],
    }
}

#[derive(Debug, Clone)]
pub struct SchemaMapper {
    aliases: Vec<(CanonicalField, Vec<String>)>,
    threshold: f64,
}

#[derive(Debug)]
struct Candidate {
    field: CanonicalField,
    column: usize,
    score: f64,
}

impl SchemaMapper {
    pub fn new(threshold: f64) -> Self {
        let aliases = CanonicalField::ALL
            .iter()
            .map(|&field| {
                let folded = default_aliases(field).iter().map(|a| fold(a)).collect();
                (field, folded)
            })
            .collect();
        Self { aliases, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Add aliases for a field on top of the built-in set.
    pub fn with_aliases<I, S>(mut self, field: CanonicalField, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some((_, aliases)) = self.aliases.iter_mut().find(|(f, _)| *f == field) {
            aliases.extend(
                extra
                    .into_iter()
                    .map(|a| fold(a.as_ref()))
                    .filter(|a| !a.is_empty()),
            );
        }
        self
    }

    /// Map a header onto canonical fields.
    ///
    /// Fails when latitude or longitude has no qualifying column; no partial
    /// mapping is returned in that case.
    pub fn map_schema<S: AsRef<str>>(&self, columns: &[S]) -> Result<FieldMapping, MappingError> {
        let folded: Vec<String> = columns.iter().map(|c| fold(c.as_ref())).collect();

        let mut candidates: Vec<Candidate> = Vec::new();
        for (column, header) in folded.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let scores: Vec<(CanonicalField, f64)> = self
                .aliases
                .iter()
                .map(|(field, aliases)| {
                    let score = aliases
                        .iter()
                        .map(|alias| score_alias(header, alias))
                        .fold(0.0_f64, f64::max);
                    (*field, score)
                })
                .collect();
            let best = scores.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);
            if best < self.threshold {
                continue;
            }
            candidates.extend(
                scores
                    .into_iter()
                    .filter(|(_, score)| *score == best)
                    .map(|(field, score)| Candidate {
                        field,
                        column,
                        score,
                    }),
            );
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.column.cmp(&b.column))
                .then(a.field.cmp(&b.field))
        });

        let mut assigned: BTreeMap<CanonicalField, MappedColumn> = BTreeMap::new();
        let mut used_columns = vec![false; columns.len()];
        for candidate in candidates {
            if used_columns[candidate.column] || assigned.contains_key(&candidate.field) {
                continue;
            }
            used_columns[candidate.column] = true;
            let name = columns[candidate.column].as_ref().to_string();
            debug!(
                field = %candidate.field,
                column = %name,
                score = candidate.score,
                "schema field mapped"
            );
            assigned.insert(
                candidate.field,
                MappedColumn {
                    name,
                    index: candidate.column,
                    score: candidate.score,
                },
            );
        }

        let has_pair = assigned.contains_key(&CanonicalField::Latitude)
            && assigned.contains_key(&CanonicalField::Longitude);
        if has_pair {
            assigned.remove(&CanonicalField::Coordinates);
        } else if assigned.contains_key(&CanonicalField::Coordinates) {
            for axis in [CanonicalField::Latitude, CanonicalField::Longitude] {
                if let Some(column) = assigned.remove(&axis) {
                    debug!(field = %axis, column = %column.name, "superseded by combined coordinates");
                }
            }
        }

        let combined = assigned.contains_key(&CanonicalField::Coordinates);
        let missing: Vec<CanonicalField> = CanonicalField::ALL
            .iter()
            .copied()
            .filter(|f| f.is_mandatory() && !combined && !assigned.contains_key(f))
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "dataset rejected: mandatory fields unmapped");
            return Err(MappingError::MissingMandatoryField {
                missing,
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            });
        }

        Ok(FieldMapping::from_columns(assigned))
    }
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Score a folded header against one folded alias.
fn score_alias(header: &str, alias: &str) -> f64 {
    if header == alias {
        return 1.0;
    }

    let alias_len = alias.chars().count();
    let header_len = header.chars().count();

    if alias_len >= MIN_CONTAINMENT_ALIAS_LEN && contains_words(header, alias) {
        return CONTAINMENT_BASE + (1.0 - CONTAINMENT_BASE) * alias_len as f64 / header_len as f64;
    }

    if alias_len >= MIN_FUZZY_ALIAS_LEN {
        let longest = alias_len.max(header_len);
        return 1.0 - edit_distance(header, alias) as f64 / longest as f64;
    }

    0.0
}

/// True when the words of `needle` appear contiguously among the words of `haystack`.
fn contains_words(haystack: &str, needle: &str) -> bool {
    let hay: Vec<&str> = haystack.split(' ').collect();
    let needle: Vec<&str> = needle.split(' ').collect();
    needle.len() <= hay.len() && hay.windows(needle.len()).any(|w| w == needle.as_slice())
}
