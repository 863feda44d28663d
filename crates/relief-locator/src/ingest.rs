/// Ingest service: decode → map schema → normalize → install.
///
/// Uploads are serialized so only one normalization runs at a time. A mapping
/// failure returns before anything is installed, leaving the active catalog as
/// it was. Re-uploading the active dataset's exact bytes is a no-op.
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tracing::info;

use relief_core::catalog::{CatalogHandle, CatalogStore, DatasetSource};
use relief_core::config::EngineConfig;
use relief_core::model::FieldMapping;
use relief_core::normalize::Normalizer;
use relief_core::schema::SchemaMapper;

use crate::decode::decode_csv;
use crate::error::AppError;

/// Result of an ingest.
pub struct IngestOutcome {
    /// False when the bytes matched the active dataset and nothing changed.
    pub updated: bool,
    /// The active catalog after the ingest.
    pub handle: CatalogHandle,
    /// The mapping used, when a new dataset was installed.
    pub mapping: Option<FieldMapping>,
}

pub struct IngestService {
    mapper: SchemaMapper,
    normalizer: Normalizer,
    store: Arc<CatalogStore>,
    upload_lock: Mutex<()>,
}

impl IngestService {
    pub fn new(config: &EngineConfig, store: Arc<CatalogStore>) -> Self {
        Self {
            mapper: config.schema_mapper(),
            normalizer: config.normalizer(),
            store,
            upload_lock: Mutex::new(()),
        }
    }

    /// Ingest CSV bytes under an operator-facing source name.
    pub fn ingest(&self, bytes: &[u8], source_name: &str) -> Result<IngestOutcome, AppError> {
        let _guard = self.upload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let fingerprint = fingerprint(bytes);
        let current = self.store.current();
        if current.fingerprint() == Some(fingerprint.as_str()) {
            info!(
                source = source_name,
                version = current.version(),
                "dataset unchanged, skipping ingest"
            );
            return Ok(IngestOutcome {
                updated: false,
                handle: current,
                mapping: None,
            });
        }

        let table = decode_csv(bytes)?;
        info!(
            source = source_name,
            columns = table.columns.len(),
            rows = table.rows.len(),
            "dataset decoded"
        );

        let mapping = self.mapper.map_schema(table.columns.as_slice())?;
        let normalized = self.normalizer.normalize(&table.rows, &mapping);
        let handle = self.store.load_dataset(
            normalized,
            DatasetSource {
                name: source_name.to_string(),
                fingerprint: Some(fingerprint),
            },
        );

        Ok(IngestOutcome {
            updated: true,
            handle,
            mapping: Some(mapping),
        })
    }

    /// Ingest a CSV file from disk, named after its file name.
    pub fn ingest_file(&self, path: &Path) -> Result<IngestOutcome, AppError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest(&bytes, &name)
    }
}

/// Hex SHA-256 of the raw upload.
fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
