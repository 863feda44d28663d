/// Resource catalog and the session store that swaps it.
///
/// A `Catalog` is immutable once built. `CatalogStore` holds the active one
/// behind a `RwLock<CatalogHandle>`; installing a new dataset builds the
/// catalog completely and then replaces the handle under the write lock, so
/// readers only ever observe a fully built catalog. Queries clone the handle
/// and run without holding the lock.
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::{RejectionReason, RowRejected};
use crate::model::ResourceRecord;
use crate::normalize::Normalized;
use crate::vocabulary::CategoryFilter;

/// Where a dataset came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSource {
    /// Operator-facing name, e.g. the uploaded file name.
    pub name: String,
    /// Hex SHA-256 of the uploaded bytes, when known.
    pub fingerprint: Option<String>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    version: u64,
    source: Option<DatasetSource>,
    records: Vec<ResourceRecord>,
    rejections: Vec<RowRejected>,
}

impl Catalog {
    /// Whether a dataset has ever been installed. The initial catalog is unloaded.
    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    /// Monotonic load counter; 0 before the first load.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn source(&self) -> Option<&DatasetSource> {
        self.source.as_ref()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.source.as_ref()?.fingerprint.as_deref()
    }

    pub fn all(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Records matching `filter`, in catalog order.
    pub fn filter_by_category(&self, filter: &CategoryFilter) -> Vec<&ResourceRecord> {
        self.records
            .iter()
            .filter(|r| filter.matches(&r.category))
            .collect()
    }

    pub fn rejection_report(&self) -> &[RowRejected] {
        &self.rejections
    }

    /// Named rows excluded for bad coordinates. The rest of the rejection
    /// report is rows dropped for having no name.
    pub fn invalid_count(&self) -> usize {
        self.rejections
            .iter()
            .filter(|r| r.reason != RejectionReason::MissingName)
            .count()
    }

    /// Record count per category label.
    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.category.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Shared, read-only reference to one catalog version.
#[derive(Debug, Clone, Default)]
pub struct CatalogHandle(Arc<Catalog>);

impl CatalogHandle {
    /// A handle to the unloaded catalog.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Deref for CatalogHandle {
    type Target = Catalog;

    fn deref(&self) -> &Catalog {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<CatalogHandle>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active catalog.
    pub fn current(&self) -> CatalogHandle {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a normalized dataset, keeping only valid records, and return
    /// the new handle. The previous catalog stays visible until the swap.
    pub fn load_dataset(&self, normalized: Normalized, source: DatasetSource) -> CatalogHandle {
        let Normalized {
            records,
            rejections,
        } = normalized;
        let records: Vec<ResourceRecord> = records.into_iter().filter(|r| r.valid).collect();

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.version() + 1;
        let handle = CatalogHandle(Arc::new(Catalog {
            version,
            source: Some(source),
            records,
            rejections,
        }));
        *current = handle.clone();
        drop(current);

        info!(
            version,
            records = handle.size(),
            rejected = handle.rejection_report().len(),
            source = %handle.source().map(|s| s.name.as_str()).unwrap_or_default(),
            "catalog installed"
        );
        handle
    }
}
