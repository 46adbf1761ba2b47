//! Expectation catalog storage.
//!
//! Expectations are stored as JSON files in a dedicated directory, one
//! per ID. The embedding core only reads from here; writes exist for the
//! import path and for seeding test fixtures.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::expectation::Expectation;

/// Storage backend for curriculum expectations.
pub struct CatalogStore {
    /// Root directory for expectation storage.
    root: PathBuf,
}

impl CatalogStore {
    /// Create a new catalog store at the given root directory.
    ///
    /// This will create the directory if it doesn't exist.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| CatalogError::Storage(format!("{}: {e}", root.display())))?;

        Ok(Self { root })
    }

    fn expectation_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(CatalogError::Storage(format!(
                "invalid expectation id: {id:?}"
            )));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    /// Get an expectation by ID, if it exists.
    pub async fn get(&self, id: &str) -> Result<Option<Expectation>> {
        let path = self.expectation_path(id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| CatalogError::Storage(format!("{}: {e}", path.display())))?;
        let expectation: Expectation = serde_json::from_str(&content)?;
        Ok(Some(expectation))
    }

    /// Insert or update an expectation.
    pub async fn upsert(&self, expectation: &Expectation) -> Result<()> {
        let path = self.expectation_path(&expectation.id)?;
        let content = serde_json::to_string_pretty(expectation)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| CatalogError::Storage(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CatalogError::Storage(format!("{}: {e}", path.display())))?;

        debug!("Saved expectation: {}", expectation.id);
        Ok(())
    }

    /// Load every expectation in the catalog.
    pub async fn find_all(&self) -> Result<Vec<Expectation>> {
        let mut expectations = Vec::new();

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| CatalogError::Storage(format!("{}: {e}", self.root.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CatalogError::Storage(format!("{e}")))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| CatalogError::Storage(format!("{}: {e}", path.display())))?;
            match serde_json::from_str::<Expectation>(&content) {
                Ok(expectation) => expectations.push(expectation),
                Err(e) => {
                    warn!("Skipping unreadable expectation {}: {e}", path.display());
                }
            }
        }

        Ok(expectations)
    }

    /// Number of expectations in the catalog.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.find_all().await?.len())
    }
}
