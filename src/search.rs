//! Semantic search over the built embedding index.
//!
//! The query is encoded with the configured model and compared against
//! every row by cosine similarity. The index must have been built with a
//! model of the same dimensionality; a mismatch is refused rather than
//! silently returning meaningless scores.

use anyhow::{bail, Context, Result};
use std::cmp::Ordering;

use crate::config::Config;
use crate::embedding::{self, cosine_similarity};
use crate::index_store::{self, EmbeddingIndex, IndexPaths};

/// A single search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub score: f32,
}

/// Rank index rows against `query`, best first. Ties keep row order.
pub fn rank(index: &EmbeddingIndex, query: &[f32], limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = index
        .vectors
        .outer_iter()
        .zip(&index.paths)
        .map(|(row, path)| SearchHit {
            path: path.clone(),
            score: row
                .as_slice()
                .map(|r| cosine_similarity(r, query))
                .unwrap_or(0.0),
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}

/// Run the search command and print ranked paths.
pub async fn run_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Semantic search requires an embedding provider. Set [embedding] provider in config.");
    }

    let index = index_store::load_index(&IndexPaths::from_config(config))
        .context("Could not load the embedding index")?;
    let index = match index {
        Some(index) => index,
        None => bail!("No embedding index found. Run `vidx index build` first."),
    };

    if index.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }

    let model = embedding::create_model(&config.embedding)?;
    if model.dims() != index.dims() {
        bail!(
            "Index was built with {} dims ({}), but the configured model produces {} dims ({}). \
             Run `vidx index build --force`.",
            index.dims(),
            index.model,
            model.dims(),
            model.model_name()
        );
    }

    let query_vec = embedding::encode_query(model.as_ref(), query).await?;
    let hits = rank(&index, &query_vec, limit);

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. {} ({:.4})", i + 1, hit.path, hit.score);
    }
    Ok(())
}
