pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::ProviderError;

pub use self::gemini::GeminiClient;
pub use self::openai::OpenAiClient;

/// A hosted generative model: one prompt in, one completion out. No retries.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError>;

    async fn health_check(&self) -> bool {
        true
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(client)
}

pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let generator: Arc<dyn Generator> = match config.provider {
        LlmProvider::Gemini => {
            let key = config.api_key.clone().ok_or_else(|| {
                anyhow::anyhow!("Gemini requires an API key (set GOOGLE_API_KEY or FASHION__LLM__API_KEY)")
            })?;
            Arc::new(GeminiClient::new(
                config.base_url().to_string(),
                config.model.clone(),
                key,
                timeout,
            )?)
        }
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            config.base_url().to_string(),
            config.model.clone(),
            config.api_key.clone(),
            timeout,
        )?),
    };
    tracing::info!(
        "Using {} model {} at {}",
        generator.name(),
        config.model,
        config.base_url()
    );
    Ok(generator)
}
