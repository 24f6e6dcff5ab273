//! Deterministic stand-ins for the embedding model and the hosted LLM.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{EmbeddingError, ProviderError};
use crate::llm::Generator;
use crate::rag::embeddings::Embedder;

pub const HASH_DIM: usize = 256;

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// `HASH_DIM` buckets. Identical texts score 1.0; texts sharing no words
/// score close to 0.
pub struct HashEmbedder {
    name: String,
    pub calls: AtomicUsize,
    fail: bool,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::named("hash-embedder")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; HASH_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut h: u64 = 0xcbf2_9ce4_8422_2325;
            for b in word.to_lowercase().bytes() {
                h ^= u64::from(b);
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
            v[(h % HASH_DIM as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        } else {
            v[0] = 1.0;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::Model("embedding backend offline".to_string()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Records every prompt and replies from a script; falls back to a fixed
/// answer once the script runs out.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub prompts: Mutex<Vec<(String, f32)>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(p, _)| p.clone())
    }
}

pub fn provider_failure() -> ProviderError {
    ProviderError::Malformed {
        provider: "scripted",
        reason: "scripted failure".to_string(),
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), temperature));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Wear something comfortable.".to_string()))
    }
}

/// Follows the template literally: with no retrieved context and no fashion
/// words in the question it answers with the refusal quoted in the
/// out-of-domain instruction.
pub struct InstructionFollower;

const FASHION_WORDS: &[&str] = &[
    "wear", "outfit", "dress", "style", "fashion", "shirt", "shoes", "wedding", "gender",
];

#[async_trait]
impl Generator for InstructionFollower {
    fn name(&self) -> &'static str {
        "instruction-follower"
    }

    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, ProviderError> {
        let (_, tail) = prompt.rsplit_once("CONTEXT:\n").unwrap_or(("", ""));
        let (context, question) = tail.split_once("QUESTION:\n").unwrap_or(("", ""));
        let question = question.to_lowercase();
        let on_topic = FASHION_WORDS.iter().any(|w| question.contains(w));

        if context.trim().is_empty() && !on_topic {
            let marker = "respond with: \"";
            let start = prompt.find(marker).map(|i| i + marker.len()).unwrap_or(0);
            let end = prompt[start..].find('"').map(|i| start + i).unwrap_or(start);
            return Ok(prompt[start..end].to_string());
        }
        Ok("Option 1: a linen shirt in sky blue with tan loafers.".to_string())
    }
}
