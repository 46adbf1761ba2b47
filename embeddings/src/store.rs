//! Embedding record persistence.
//!
//! The `EmbeddingStore` keeps one JSON file per expectation ID under a
//! dedicated directory. Filenames are the upsert key, so writing a record
//! for an ID that already has one replaces it; concurrent writers for the
//! same ID collapse to a single file (last rename wins). Reads always go
//! to disk; the store is the single source of truth for vectors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{EmbeddingError, Result};
use crate::record::EmbeddingRecord;

/// Storage backend for embedding records.
pub struct EmbeddingStore {
    /// Root directory for record storage.
    root: PathBuf,
}

impl EmbeddingStore {
    /// Create a new embedding store at the given root directory.
    ///
    /// This will create the directory if it doesn't exist.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", root.display())))?;

        Ok(Self { root })
    }

    /// Get the path for a record file.
    fn record_path(&self, expectation_id: &str) -> Result<PathBuf> {
        if expectation_id.is_empty()
            || expectation_id.contains(['/', '\\'])
            || expectation_id.contains("..")
        {
            return Err(EmbeddingError::Storage(format!(
                "invalid expectation id: {expectation_id:?}"
            )));
        }
        Ok(self.root.join(format!("{expectation_id}.json")))
    }

    /// Get the record for an expectation, if one exists.
    pub async fn get(&self, expectation_id: &str) -> Result<Option<EmbeddingRecord>> {
        let path = self.record_path(expectation_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", path.display())))?;
        let record: EmbeddingRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// Insert or replace the record for an expectation.
    pub async fn upsert_one(&self, record: &EmbeddingRecord) -> Result<()> {
        let path = self.record_path(&record.expectation_id)?;
        let content = serde_json::to_string(record)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", path.display())))?;

        debug!("Stored embedding for {}", record.expectation_id);
        Ok(())
    }

    /// Insert or replace a batch of records.
    ///
    /// Best-effort bulk write: each record is written independently, so a
    /// failure partway leaves earlier records persisted.
    pub async fn upsert_many(&self, records: &[EmbeddingRecord]) -> Result<()> {
        for record in records {
            self.upsert_one(record).await?;
        }
        debug!("Stored {} embedding records", records.len());
        Ok(())
    }

    /// Load every stored record.
    pub async fn find_all(&self) -> Result<Vec<EmbeddingRecord>> {
        let mut records = Vec::new();

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", self.root.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{e}")))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match self.load_file(&path).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping unreadable embedding record {}: {e}", path.display());
                }
            }
        }

        Ok(records)
    }

    /// Load every stored record except the given expectation's.
    pub async fn find_many_excluding(&self, exclude_id: &str) -> Result<Vec<EmbeddingRecord>> {
        let mut records = self.find_all().await?;
        records.retain(|r| r.expectation_id != exclude_id);
        Ok(records)
    }

    /// The set of expectation IDs that currently have a record.
    pub async fn ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", self.root.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{e}")))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(stem.to_string());
            }
        }

        Ok(ids)
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.ids().await?.len())
    }

    /// Delete every record whose model differs from `current_model`.
    ///
    /// Returns the number of records deleted. Idempotent: a second call
    /// finds nothing left to delete and returns 0.
    pub async fn delete_where_model_not(&self, current_model: &str) -> Result<usize> {
        let mut deleted = 0;

        for record in self.find_all().await? {
            if record.model != current_model {
                let path = self.record_path(&record.expectation_id)?;
                fs::remove_file(&path)
                    .await
                    .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", path.display())))?;
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!("Deleted {deleted} embedding records with stale model");
        }
        Ok(deleted)
    }

    async fn load_file(&self, path: &Path) -> Result<EmbeddingRecord> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| EmbeddingError::Storage(format!("{}: {e}", path.display())))?;
        let record: EmbeddingRecord = serde_json::from_str(&content)?;
        Ok(record)
    }
}
