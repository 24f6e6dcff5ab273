pub mod embeddings;
pub mod vector_store;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use self::embeddings::Embedder;
use self::vector_store::VectorIndex;
use crate::config::AppConfig;
use crate::error::{ConfigurationError, PipelineError, ProviderError};
use crate::llm::Generator;
use crate::models::{Answer, RetrievedDocument};
use crate::prompt::{PromptTemplate, NO_RECOMMENDATION};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    pub score_threshold: f32,
    pub top_k: usize,
    pub temperature: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.7,
            top_k: 4,
            temperature: 0.6,
        }
    }
}

impl From<&AppConfig> for RetrievalSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            score_threshold: cfg.retrieval.score_threshold,
            top_k: cfg.retrieval.top_k,
            temperature: cfg.llm.temperature,
        }
    }
}

/// Embed the query, pick matching documents from the snapshot, fill the
/// template and ask the generator.
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
    index_dir: PathBuf,
    index: RwLock<Option<Arc<VectorIndex>>>,
    settings: RetrievalSettings,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        template: PromptTemplate,
        index_dir: PathBuf,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            template,
            index_dir,
            index: RwLock::new(None),
            settings,
        }
    }

    pub fn settings(&self) -> RetrievalSettings {
        self.settings
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// The snapshot, loaded on first use. A missing snapshot is re-checked on
    /// every call so an ingestion run is picked up without a restart.
    pub async fn index(&self) -> Result<Arc<VectorIndex>, ConfigurationError> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = VectorIndex::load(&self.index_dir)?;
        let snapshot_model = &index.manifest().embedding.model;
        if snapshot_model != self.embedder.model_name() {
            return Err(ConfigurationError::EmbeddingMismatch {
                snapshot: snapshot_model.clone(),
                active: self.embedder.model_name().to_string(),
            });
        }

        tracing::info!(
            "Index snapshot loaded: {} records, {} dims, built {}",
            index.len(),
            index.manifest().embedding.dimension,
            index.manifest().created_at
        );
        let index = Arc::new(index);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    pub async fn is_ready(&self) -> bool {
        self.index().await.is_ok()
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>, PipelineError> {
        let index = self.index().await?;

        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed_one(&text))
            .await
            .map_err(|e| ProviderError::Join(e.to_string()))?
            .map_err(ProviderError::from)?;

        let spec = &index.manifest().embedding;
        if vector.len() != spec.dimension {
            return Err(ConfigurationError::EmbeddingMismatch {
                snapshot: format!("{} ({} dims)", spec.model, spec.dimension),
                active: format!("{} ({} dims)", self.embedder.model_name(), vector.len()),
            }
            .into());
        }

        Ok(index.search(&vector, self.settings.top_k, self.settings.score_threshold))
    }

    pub async fn answer(&self, query: &str) -> Result<Answer, PipelineError> {
        let sources = self.retrieve(query).await?;
        tracing::debug!(
            "Retrieved {} documents above {}",
            sources.len(),
            self.settings.score_threshold
        );

        let context = sources
            .iter()
            .map(|r| r.document.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self.template.render(&context, query);

        let completion = self
            .generator
            .generate(&prompt, self.settings.temperature)
            .await?;

        let text = if completion.trim().is_empty() {
            tracing::warn!("{} returned an empty completion", self.generator.name());
            NO_RECOMMENDATION.to_string()
        } else {
            completion
        };

        Ok(Answer { text, sources })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indexer::{ingest, IngestOptions};
    use crate::prompt::REFUSAL;
    use crate::testing::{provider_failure, HashEmbedder, InstructionFollower, ScriptedGenerator};
    use indicatif::ProgressBar;
    use std::path::Path;

    pub(crate) const DATASET: &str = "\
Input,Output
Casual summer outfit for a beach holiday,Linen shorts with a breezy cotton shirt and espadrilles
Formal office attire for women,Tailored navy pantsuit with a silk blouse and pumps
Winter layering for a rainy commute,Wool coat over a knit sweater with waterproof boots
";

    pub(crate) fn build_index(dir: &Path, embedder: &HashEmbedder) {
        let dataset = dir.join("fashion.csv");
        std::fs::write(&dataset, DATASET).unwrap();
        let options = IngestOptions {
            dataset_path: dataset,
            source_column: "Input".to_string(),
            index_dir: dir.join("vector_database"),
            batch_size: 2,
        };
        ingest(&options, embedder, &ProgressBar::hidden()).unwrap();
    }

    fn pipeline(dir: &Path, generator: Arc<dyn Generator>) -> RagPipeline {
        RagPipeline::new(
            Arc::new(HashEmbedder::new()),
            generator,
            PromptTemplate::default(),
            dir.join("vector_database"),
            RetrievalSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_exact_row_text_is_retrieved() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let pipeline = pipeline(dir.path(), Arc::new(ScriptedGenerator::new(vec![])));

        let row = "Input: Formal office attire for women\nOutput: Tailored navy pantsuit with a silk blouse and pumps";
        let sources = pipeline.retrieve(row).await.unwrap();
        assert_eq!(sources[0].document.source, "Formal office attire for women");
        assert!(sources[0].score >= 0.7);
    }

    #[tokio::test]
    async fn test_answer_fills_template_with_context() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok("Try linen.".to_string())]));
        let pipeline = pipeline(dir.path(), generator.clone());

        let query = "Input: Casual summer outfit for a beach holiday\nOutput: Linen shorts with a breezy cotton shirt and espadrilles";
        let answer = pipeline.answer(query).await.unwrap();
        assert_eq!(answer.text, "Try linen.");
        assert_eq!(answer.sources.len(), 1);

        let prompt = generator.last_prompt().unwrap();
        assert!(prompt.contains(&format!("CONTEXT:\n{}\n\nQUESTION:\n{}", answer.sources[0].document.text, query)));
        let (_, temperature) = generator.prompts.lock().unwrap()[0].clone();
        assert!((temperature - 0.6).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_no_match_still_calls_generator_with_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let pipeline = pipeline(dir.path(), generator.clone());

        let answer = pipeline.answer("What is the capital of France?").await.unwrap();
        assert!(answer.sources.is_empty());
        assert_eq!(generator.calls(), 1);
        assert!(generator
            .last_prompt()
            .unwrap()
            .contains("CONTEXT:\n\n\nQUESTION:\nWhat is the capital of France?"));
    }

    #[tokio::test]
    async fn test_off_domain_question_gets_refusal() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let pipeline = pipeline(dir.path(), Arc::new(InstructionFollower));

        let answer = pipeline.answer("What is the capital of France?").await.unwrap();
        assert_eq!(answer.text, REFUSAL);
    }

    #[tokio::test]
    async fn test_blank_completion_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let pipeline = pipeline(
            dir.path(),
            Arc::new(ScriptedGenerator::new(vec![Ok("   ".to_string())])),
        );

        let answer = pipeline.answer("beach outfit").await.unwrap();
        assert_eq!(answer.text, NO_RECOMMENDATION);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let pipeline = pipeline(
            dir.path(),
            Arc::new(ScriptedGenerator::new(vec![Err(provider_failure())])),
        );

        let err = pipeline.answer("beach outfit").await.unwrap_err();
        assert!(matches!(err, PipelineError::Provider(_)));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_configuration_error_until_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let pipeline = pipeline(dir.path(), generator.clone());

        let err = pipeline.answer("beach outfit").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigurationError::SnapshotMissing(_))
        ));
        assert_eq!(generator.calls(), 0);
        assert!(!pipeline.is_ready().await);

        build_index(dir.path(), &HashEmbedder::new());
        assert!(pipeline.is_ready().await);
        tokio_test::assert_ok!(pipeline.answer("beach outfit").await);
    }

    #[tokio::test]
    async fn test_embedding_model_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::named("other-model"));
        let pipeline = pipeline(dir.path(), Arc::new(ScriptedGenerator::new(vec![])));

        let err = pipeline.answer("beach outfit").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(ConfigurationError::EmbeddingMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        build_index(dir.path(), &HashEmbedder::new());
        let pipeline = RagPipeline::new(
            Arc::new(HashEmbedder::failing()),
            Arc::new(ScriptedGenerator::new(vec![])),
            PromptTemplate::default(),
            dir.path().join("vector_database"),
            RetrievalSettings::default(),
        );

        let err = pipeline.answer("beach outfit").await.unwrap_err();
        assert!(matches!(err, PipelineError::Provider(ProviderError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_reingestion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let query = "Winter layering for a rainy commute";

        build_index(dir.path(), &HashEmbedder::new());
        let first = pipeline(dir.path(), Arc::new(ScriptedGenerator::new(vec![])))
            .retrieve(query)
            .await
            .unwrap();

        build_index(dir.path(), &HashEmbedder::new());
        let second = pipeline(dir.path(), Arc::new(ScriptedGenerator::new(vec![])))
            .retrieve(query)
            .await
            .unwrap();

        assert_eq!(first, second);
    }
}
