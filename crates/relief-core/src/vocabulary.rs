/// Controlled category vocabulary.
///
/// Each canonical label carries an explicit alias list. Matching folds case and
/// punctuation, then requires an exact hit on the label or one of its aliases;
/// there is no fuzzy guessing. Anything else resolves to `unknown`.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::model::Category;
use crate::text::fold;

/// Filter value that bypasses category filtering.
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub label: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryVocabulary {
    entries: Vec<VocabularyEntry>,
    lookup: HashMap<String, String>,
}

/// Which records a query keeps, by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: &Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => wanted == category,
        }
    }
}

impl CategoryVocabulary {
    /// Build a vocabulary from `(label, aliases)` pairs.
    ///
    /// Labels are stored folded with spaces replaced by underscores
    /// (`"Fire Station"` becomes `fire_station`). An alias claimed by two labels
    /// is a configuration error.
    pub fn new<I, L, A>(entries: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (L, Vec<A>)>,
        L: AsRef<str>,
        A: AsRef<str>,
    {
        let mut vocabulary = Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
        };

        for (label, aliases) in entries {
            let label = fold(label.as_ref()).replace(' ', "_");
            if label.is_empty() {
                return Err(CoreError::Config(
                    "category vocabulary contains an empty label".to_string(),
                ));
            }
            if label == Category::UNKNOWN || label == ALL_CATEGORIES {
                return Err(CoreError::Config(format!(
                    "'{label}' is reserved and cannot be a vocabulary label"
                )));
            }

            let mut keys = vec![fold(&label)];
            keys.extend(aliases.iter().map(|a| fold(a.as_ref())));
            keys.retain(|k| !k.is_empty());

            for key in &keys {
                match vocabulary.lookup.get(key) {
                    Some(existing) if *existing != label => {
                        return Err(CoreError::Config(format!(
                            "category alias '{key}' is claimed by both '{existing}' and '{label}'"
                        )));
                    }
                    _ => {
                        vocabulary.lookup.insert(key.clone(), label.clone());
                    }
                }
            }

            vocabulary.entries.push(VocabularyEntry {
                label,
                aliases: aliases.iter().map(|a| a.as_ref().to_string()).collect(),
            });
        }

        Ok(vocabulary)
    }

    /// Parse a JSON object of `label -> [aliases]`.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("invalid category vocabulary JSON: {e}")))?;
        Self::new(raw)
    }

    /// Resolve a raw category cell. Never fails: unmatched values are `unknown`.
    pub fn resolve(&self, raw: &str) -> Category {
        let key = fold(raw);
        match self.lookup.get(&key) {
            Some(label) => Category::new(label.clone()),
            None => {
                if !key.is_empty() {
                    debug!(value = raw, "category not in vocabulary, using unknown");
                }
                Category::unknown()
            }
        }
    }

    /// Interpret a caller-supplied filter. `all` (or blank) disables filtering,
    /// `unknown` selects uncategorised records, and a value outside the
    /// vocabulary selects nothing.
    pub fn filter(&self, raw: &str) -> CategoryFilter {
        let key = fold(raw);
        if key.is_empty() || key == ALL_CATEGORIES {
            return CategoryFilter::All;
        }
        if key == Category::UNKNOWN {
            return CategoryFilter::Only(Category::unknown());
        }
        match self.lookup.get(&key) {
            Some(label) => CategoryFilter::Only(Category::new(label.clone())),
            None => CategoryFilter::Only(Category::new(key.replace(' ', "_"))),
        }
    }

    /// Canonical labels in declaration order, without the implicit `unknown`.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }
}

impl Default for CategoryVocabulary {
    /// Built-in labels. Their alias lists are disjoint, so the table is indexed
    /// directly without the conflict checks of [`CategoryVocabulary::new`].
    fn default() -> Self {
        let mut vocabulary = Self {
            entries: Vec::with_capacity(DEFAULT_ENTRIES.len()),
            lookup: HashMap::new(),
        };
        for (label, aliases) in DEFAULT_ENTRIES {
            for key in std::iter::once(*label).chain(aliases.iter().copied()) {
                vocabulary.lookup.insert(fold(key), label.to_string());
            }
            vocabulary.entries.push(VocabularyEntry {
                label: label.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            });
        }
        vocabulary
    }
}

const DEFAULT_ENTRIES: &[(&str, &[&str])] = &[
    (
        "hospital",
        &[
            "clinic",
            "medical",
            "medical centre",
            "medical center",
            "health centre",
            "health center",
            "phc",
            "dispensary",
        ],
    ),
    (
        "shelter",
        &[
            "relief camp",
            "camp",
            "evacuation centre",
            "evacuation center",
            "relief centre",
            "relief center",
        ],
    ),
    (
        "depot",
        &[
            "supply depot",
            "warehouse",
            "food bank",
            "ration shop",
            "distribution point",
        ],
    ),
    (
        "fire_station",
        &["fire", "fire brigade", "fire service", "firehouse"],
    ),
];
