use anyhow::Result;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

/// Maps text to fixed-length vectors. The model name is recorded in every
/// index snapshot so queries are embedded the same way as the corpus.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(vec![text.to_string()])?;
        check_batch(1, &vectors, None)?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }
}

/// Checks that `vectors` holds `expected` non-empty vectors of one dimension
/// (and of `dimension`, when given). Returns that dimension.
pub fn check_batch(
    expected: usize,
    vectors: &[Vec<f32>],
    dimension: Option<usize>,
) -> Result<usize, EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: vectors.len(),
        });
    }
    let mut dim = dimension;
    for v in vectors {
        if v.is_empty() {
            return Err(EmbeddingError::EmptyVector);
        }
        match dim {
            Some(d) if d != v.len() => {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: d,
                    got: v.len(),
                })
            }
            Some(_) => {}
            None => dim = Some(v.len()),
        }
    }
    Ok(dim.unwrap_or(0))
}

fn resolve_model(name: &str) -> Option<EmbeddingModel> {
    let model = match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "bge-large-en-v1.5" | "baai/bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "paraphrase-multilingual-minilm-l12-v2" => EmbeddingModel::ParaphraseMLMiniLML12V2,
        _ => return None,
    };
    Some(model)
}

/// Local ONNX sentence-embedding model.
pub struct EmbeddingGenerator {
    model: TextEmbedding,
    model_name: String,
}

impl EmbeddingGenerator {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = resolve_model(&config.model).ok_or_else(|| {
            anyhow::anyhow!("Unsupported embedding model: {}", config.model)
        })?;

        tracing::info!(
            "Initializing embedding model {} (cache: {})...",
            config.model,
            config.cache_dir.display()
        );

        let options = InitOptions {
            model_name: model,
            cache_dir: config.cache_dir.clone(),
            show_download_progress: true,
            ..Default::default()
        };

        let model = TextEmbedding::try_new(options)
            .map_err(|e| anyhow::anyhow!("Failed to initialize embedding model: {}", e))?;

        tracing::info!("Embedding model initialized successfully");
        Ok(Self {
            model,
            model_name: config.model.clone(),
        })
    }
}

impl Embedder for EmbeddingGenerator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.model
            .embed(texts, None)
            .map_err(|e| EmbeddingError::Model(e.to_string()))
    }
}
