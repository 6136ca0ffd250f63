//! Builds the embedding index from the current document set.
//!
//! The build reads every current record from the store, loads its text
//! from the vault, encodes the whole batch with the configured model, and
//! replaces both index artifacts. Nothing is written unless every step
//! before the write succeeded, so a failed build leaves the previous
//! index on disk.

use ndarray::Array2;
use std::path::PathBuf;

use crate::embedding::EmbeddingModel;
use crate::error::{Result, VaultError};
use crate::index_store::{self, EmbeddingIndex, IndexPaths};
use crate::scanner::unix_now;
use crate::store::FileStateStore;

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    /// Current records whose content could not be read.
    pub skipped: usize,
    pub dims: usize,
}

pub struct IndexBuilder {
    root: PathBuf,
    paths: IndexPaths,
}

impl IndexBuilder {
    pub fn new(root: impl Into<PathBuf>, paths: IndexPaths) -> Self {
        Self {
            root: root.into(),
            paths,
        }
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    /// Build and persist the index, reporting only success or failure.
    ///
    /// Errors are logged here; the caller decides whether to retry or
    /// keep serving the previous index.
    pub async fn build(&self, store: &FileStateStore, model: &dyn EmbeddingModel) -> bool {
        match self.try_build(store, model).await {
            Ok(report) => {
                tracing::info!(
                    documents = report.documents,
                    skipped = report.skipped,
                    dims = report.dims,
                    "embedding index built"
                );
                true
            }
            Err(e) => {
                tracing::error!("index build failed, previous index kept: {}", e);
                false
            }
        }
    }

    pub async fn try_build(
        &self,
        store: &FileStateStore,
        model: &dyn EmbeddingModel,
    ) -> Result<BuildReport> {
        let records = store.get_current_files().await?;

        let mut paths = Vec::with_capacity(records.len());
        let mut texts = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for record in &records {
            let full = self.root.join(&record.path);
            match tokio::fs::read_to_string(&full).await {
                Ok(text) => {
                    paths.push(record.path.clone());
                    texts.push(text);
                }
                Err(e) => {
                    tracing::warn!(path = %record.path, "skipping unreadable document: {}", e);
                    skipped += 1;
                }
            }
        }

        if texts.is_empty() {
            let index = EmbeddingIndex::empty(model.model_name(), model.dims(), unix_now());
            index_store::write_index(&self.paths, &index)?;
            return Ok(BuildReport {
                documents: 0,
                skipped,
                dims: model.dims(),
            });
        }

        tracing::info!(
            documents = texts.len(),
            model = model.model_name(),
            "encoding documents"
        );
        let vectors = model
            .encode(&texts)
            .await
            .map_err(|e| VaultError::Model(format!("{:#}", e)))?;
        let vectors = to_matrix(vectors, texts.len())?;

        let index = EmbeddingIndex {
            vectors,
            paths,
            model: model.model_name().to_string(),
            built_at: unix_now(),
        };
        index_store::write_index(&self.paths, &index)?;

        Ok(BuildReport {
            documents: index.len(),
            skipped,
            dims: index.dims(),
        })
    }
}

/// Pack model output into an `(N, D)` matrix, rejecting ragged or short output.
fn to_matrix(vectors: Vec<Vec<f32>>, expected_rows: usize) -> Result<Array2<f32>> {
    if vectors.len() != expected_rows {
        return Err(VaultError::Model(format!(
            "model returned {} vectors for {} documents",
            vectors.len(),
            expected_rows
        )));
    }
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    if dims == 0 {
        return Err(VaultError::Model("model returned empty vectors".to_string()));
    }

    let mut flat = Vec::with_capacity(expected_rows * dims);
    for (i, v) in vectors.into_iter().enumerate() {
        if v.len() != dims {
            return Err(VaultError::Model(format!(
                "vector {} has {} dims, expected {}",
                i,
                v.len(),
                dims
            )));
        }
        flat.extend(v);
    }

    Array2::from_shape_vec((expected_rows, dims), flat)
        .map_err(|e| VaultError::Model(e.to_string()))
}
