//! Embedding store — one reference embedding per enrolled user.
//!
//! Loaded wholesale from a directory of per-id JSON vector files and
//! replaced atomically on a roster sync; never mutated in place.

use crate::types::{Embedding, UserId, UNKNOWN_USER};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding file unreadable: {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("embedding file malformed: {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Ordered mapping from user id to reference embedding.
///
/// Entries are kept sorted by id, so a distance tie between two enrolled
/// users deterministically resolves to the lower id.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    entries: Vec<(UserId, Embedding)>,
}

impl EmbeddingStore {
    /// Build a store from in-memory pairs. The sentinel id is skipped;
    /// entries are sorted by id.
    pub fn from_entries(entries: impl IntoIterator<Item = (UserId, Embedding)>) -> Self {
        let mut entries: Vec<_> = entries
            .into_iter()
            .filter(|(id, _)| *id != UNKNOWN_USER)
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.dedup_by_key(|(id, _)| *id);
        Self { entries }
    }

    /// Load one embedding file per enrolled id from `dir`.
    ///
    /// Each file is named `<id>.json` and holds a JSON float array.
    /// The sentinel id is never loaded; an id without a file is an error
    /// (the roster and the enrollment directory must agree).
    pub fn load_dir(
        dir: &Path,
        ids: impl IntoIterator<Item = UserId>,
    ) -> Result<Self, StoreError> {
        let mut entries = Vec::new();
        for id in ids {
            if id == UNKNOWN_USER {
                continue;
            }
            let path = dir.join(format!("{id}.json"));
            let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let values: Vec<f32> = serde_json::from_str(&raw)
                .map_err(|source| StoreError::Malformed { path, source })?;
            entries.push((id, Embedding::new(values)));
        }
        tracing::info!(count = entries.len(), dir = %dir.display(), "embeddings loaded");
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest-match query: the enrolled id with minimum Euclidean
    /// distance to `query`, provided that distance is strictly below
    /// `threshold`. An empty store always answers `None`.
    pub fn best_match(&self, query: &Embedding, threshold: f32) -> Option<UserId> {
        let mut best: Option<(UserId, f32)> = None;
        for (id, emb) in &self.entries {
            let dist = emb.euclidean_distance(query);
            // Strict less-than keeps the first-seen (lowest id) on a tie.
            if best.map(|(_, d)| dist < d).unwrap_or(true) {
                best = Some((*id, dist));
            }
        }
        best.filter(|&(_, dist)| dist < threshold).map(|(id, _)| id)
    }
}
