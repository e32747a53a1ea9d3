//! StudyProvider trait definition.
//!
//! The merge engine never owns the schema catalog; it asks a provider for
//! the [`ReferenceMetadata`] of one study. The file-backed provider reads
//! JSON study documents from a directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;

use super::reference::ReferenceMetadata;
use super::study::StudyDefinition;
use crate::error::MergeResult;

/// Source of study schemas.
#[async_trait]
pub trait StudyProvider: Send + Sync {
    /// Load the entity tree and variable catalog of one study.
    async fn study(&self, study_id: &str) -> MergeResult<ReferenceMetadata>;

    /// Batch load several studies.
    ///
    /// Default implementation fetches studies in parallel using `join_all`.
    async fn studies(&self, study_ids: &[String]) -> MergeResult<Vec<ReferenceMetadata>> {
        let futures: Vec<_> = study_ids.iter().map(|id| self.study(id)).collect();
        let results = futures::future::join_all(futures).await;
        results.into_iter().collect()
    }
}

/// Reads `<dir>/<study_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonStudyProvider {
    dir: PathBuf,
}

impl JsonStudyProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a single study document from an explicit path.
    pub async fn load_file(path: &Path) -> MergeResult<ReferenceMetadata> {
        let json = tokio::fs::read_to_string(path).await?;
        let metadata = StudyDefinition::from_json(&json)?.into_metadata()?;
        info!(
            "Loaded study '{}' with {} entities from {}",
            metadata.study_id(),
            metadata.entities().len(),
            path.display()
        );
        Ok(metadata)
    }
}

#[async_trait]
impl StudyProvider for JsonStudyProvider {
    async fn study(&self, study_id: &str) -> MergeResult<ReferenceMetadata> {
        Self::load_file(&self.dir.join(format!("{}.json", study_id))).await
    }
}
