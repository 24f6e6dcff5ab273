pub mod csv_loader;

use std::path::PathBuf;

use chrono::Utc;
use indicatif::ProgressBar;

use self::csv_loader::load_dataset;
use crate::error::{EmbeddingError, IngestionError};
use crate::rag::embeddings::{check_batch, Embedder};
use crate::rag::vector_store::{
    EmbeddingSpec, SnapshotManifest, VectorIndex, VectorRecord, SNAPSHOT_FORMAT_VERSION,
};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub dataset_path: PathBuf,
    pub source_column: String,
    pub index_dir: PathBuf,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub records: usize,
    pub dimension: usize,
    pub dataset_sha256: String,
    pub snapshot_path: PathBuf,
}

/// Embed every row of the dataset and publish a fresh snapshot.
///
/// Nothing is written until every row has been embedded; on error the
/// previous snapshot stays in place.
pub fn ingest(
    options: &IngestOptions,
    embedder: &dyn Embedder,
    progress: &ProgressBar,
) -> Result<IngestReport, IngestionError> {
    let dataset = load_dataset(&options.dataset_path, &options.source_column)?;
    let total = dataset.documents.len();
    tracing::info!(
        "Loaded {} rows from {} (sha256 {})",
        total,
        options.dataset_path.display(),
        dataset.sha256
    );

    progress.set_length(total as u64);

    let batch_size = options.batch_size.max(1);
    let mut records = Vec::with_capacity(total);
    let mut dimension = None;

    for batch in dataset.documents.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
        let vectors = embedder.embed(texts)?;
        dimension = Some(check_batch(batch.len(), &vectors, dimension)?);

        for (document, embedding) in batch.iter().zip(vectors) {
            records.push(VectorRecord {
                embedding,
                document: document.clone(),
            });
        }
        progress.inc(batch.len() as u64);
    }

    let dimension = dimension.ok_or(EmbeddingError::EmptyVector)?;
    let manifest = SnapshotManifest {
        format_version: SNAPSHOT_FORMAT_VERSION,
        embedding: EmbeddingSpec {
            model: embedder.model_name().to_string(),
            dimension,
        },
        source_column: options.source_column.clone(),
        dataset_sha256: dataset.sha256.clone(),
        record_count: records.len(),
        created_at: Utc::now(),
    };

    let index = VectorIndex::new(manifest, records)?;
    let snapshot_path = index
        .save(&options.index_dir)
        .map_err(|source| IngestionError::Persist {
            path: options.index_dir.clone(),
            source,
        })?;

    Ok(IngestReport {
        records: index.len(),
        dimension,
        dataset_sha256: dataset.sha256,
        snapshot_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::vector_store::{snapshot_path, VectorIndex};
    use crate::testing::HashEmbedder;
    use std::sync::atomic::Ordering;

    fn options(dir: &std::path::Path, csv: &str) -> IngestOptions {
        let dataset_path = dir.join("fashion.csv");
        std::fs::write(&dataset_path, csv).unwrap();
        IngestOptions {
            dataset_path,
            source_column: "Input".to_string(),
            index_dir: dir.join("vector_database"),
            batch_size: 2,
        }
    }

    #[test]
    fn test_one_record_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(
            dir.path(),
            "Input,Output\nbeach,linen\noffice,blazer\nparty,sequins\nhike,boots\ngala,gown\n",
        );
        let embedder = HashEmbedder::new();
        let report = ingest(&opts, &embedder, &ProgressBar::hidden()).unwrap();

        assert_eq!(report.records, 5);
        assert_eq!(report.dimension, crate::testing::HASH_DIM);
        // 5 rows in batches of 2
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

        let index = VectorIndex::load(&opts.index_dir).unwrap();
        let sources: Vec<&str> = index
            .records()
            .iter()
            .map(|r| r.document.source.as_str())
            .collect();
        assert_eq!(sources, vec!["beach", "office", "party", "hike", "gala"]);
        assert_eq!(index.manifest().embedding.model, "hash-embedder");
        assert_eq!(index.manifest().source_column, "Input");
        assert_eq!(index.manifest().dataset_sha256, report.dataset_sha256);
    }

    #[test]
    fn test_failure_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "Input,Output\nbeach,linen\n");
        ingest(&opts, &HashEmbedder::new(), &ProgressBar::hidden()).unwrap();
        let before = std::fs::read(snapshot_path(&opts.index_dir)).unwrap();

        let err = ingest(&opts, &HashEmbedder::failing(), &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, IngestionError::Embedding(_)));

        let bad_column = IngestOptions {
            source_column: "Missing".to_string(),
            ..opts.clone()
        };
        let err = ingest(&bad_column, &HashEmbedder::new(), &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, IngestionError::MissingColumn { .. }));

        let after = std::fs::read(snapshot_path(&opts.index_dir)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_failure_without_previous_snapshot_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "Input,Output\nbeach,linen\n");
        assert!(ingest(&opts, &HashEmbedder::failing(), &ProgressBar::hidden()).is_err());
        assert!(!snapshot_path(&opts.index_dir).exists());
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }

        fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
        }
    }

    #[test]
    fn test_malformed_vectors_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), "Input,Output\nbeach,linen\noffice,blazer\n");
        let err = ingest(&opts, &ShortEmbedder, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Embedding(EmbeddingError::CountMismatch { expected: 2, got: 1 })
        ));
    }
}
