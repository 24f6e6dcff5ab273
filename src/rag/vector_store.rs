//! Flat vector index with exhaustive cosine search and a single-file JSON
//! snapshot. Snapshots are replaced atomically: the new file is written next
//! to the old one and renamed over it.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, EmbeddingError};
use crate::models::{Document, RetrievedDocument};
use crate::rag::embeddings::check_batch;

pub const SNAPSHOT_FILE: &str = "index.json";
pub const SNAPSHOT_TEMP_FILE: &str = "index.json.tmp";
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    pub model: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub embedding: EmbeddingSpec,
    pub source_column: String,
    pub dataset_sha256: String,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub embedding: Vec<f32>,
    pub document: Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    manifest: SnapshotManifest,
    records: Vec<VectorRecord>,
}

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl VectorIndex {
    /// Builds an index, checking that every record shares the manifest's dimension.
    pub fn new(
        mut manifest: SnapshotManifest,
        records: Vec<VectorRecord>,
    ) -> Result<Self, EmbeddingError> {
        let vectors: Vec<Vec<f32>> = records.iter().map(|r| r.embedding.clone()).collect();
        check_batch(records.len(), &vectors, Some(manifest.embedding.dimension))?;
        manifest.record_count = records.len();
        Ok(Self { manifest, records })
    }

    pub fn manifest(&self) -> &SnapshotManifest {
        &self.manifest
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Up to `top_k` documents scoring at least `threshold`, best first.
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Vec<RetrievedDocument> {
        let mut scored: Vec<(f32, &VectorRecord)> = self
            .records
            .iter()
            .map(|r| (cosine_similarity(query, &r.embedding), r))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(score, r)| RetrievedDocument {
                document: r.document.clone(),
                score,
            })
            .collect()
    }

    pub fn save(&self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let tmp = dir.join(SNAPSHOT_TEMP_FILE);
        let target = snapshot_path(dir);

        let write = || -> std::io::Result<()> {
            let file = fs::File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            Ok(())
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &target)?;

        tracing::info!(
            "Saved index snapshot with {} records to {}",
            self.records.len(),
            target.display()
        );
        Ok(target)
    }

    pub fn load(dir: &Path) -> Result<Self, ConfigurationError> {
        let path = snapshot_path(dir);
        if !path.is_file() {
            return Err(ConfigurationError::SnapshotMissing(path));
        }

        let unreadable = |reason: String| ConfigurationError::SnapshotUnreadable {
            path: path.clone(),
            reason,
        };

        let data = fs::read(&path).map_err(|e| unreadable(e.to_string()))?;
        let index: Self = serde_json::from_slice(&data).map_err(|e| unreadable(e.to_string()))?;

        if index.manifest.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ConfigurationError::UnsupportedFormat {
                found: index.manifest.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let vectors: Vec<Vec<f32>> = index.records.iter().map(|r| r.embedding.clone()).collect();
        check_batch(
            index.records.len(),
            &vectors,
            Some(index.manifest.embedding.dimension),
        )
        .map_err(|e| unreadable(e.to_string()))?;

        tracing::debug!(
            "Loaded index snapshot {} ({} records, model {})",
            path.display(),
            index.records.len(),
            index.manifest.embedding.model
        );
        Ok(index)
    }
}
