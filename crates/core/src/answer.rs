use crate::error::QueryError;
use crate::models::{Answer, RetrievalHit};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Generic text-completion capability. The composer decorates one of these
/// with the grounding template instead of extending a chat client.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, QueryError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's `/api/generate` endpoint.
pub struct OllamaCompleter {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaCompleter {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| QueryError::Completion(error.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl TextCompleter for OllamaCompleter {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, QueryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature },
            })
            .send()
            .await
            .map_err(|error| QueryError::Completion(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Completion(format!(
                "{} returned {status}",
                self.endpoint
            )));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|error| QueryError::Completion(error.to_string()))?;

        Ok(payload.response)
    }
}

/// Binds retrieved text and the question into a grounding prompt and invokes
/// the completer. Adherence to "use only the supplied text" is a prompt-level
/// contract; the composer never post-filters the model's output.
pub struct GroundedAnswerer<C>
where
    C: TextCompleter,
{
    completer: C,
    template: String,
    fallback: String,
    temperature: f32,
}

impl<C> GroundedAnswerer<C>
where
    C: TextCompleter,
{
    pub fn new(
        completer: C,
        template: impl Into<String>,
        fallback: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            completer,
            template: template.into(),
            fallback: fallback.into(),
            temperature,
        }
    }

    /// With no hits the configured fallback is returned immediately and the
    /// model is never invoked.
    pub async fn compose_answer(
        &self,
        hits: &[RetrievalHit],
        question: &str,
    ) -> Result<Answer, QueryError> {
        if hits.is_empty() {
            info!("no context retrieved, returning fallback");
            return Ok(Answer {
                text: self.fallback.clone(),
                used_fallback: true,
            });
        }

        let content = hits
            .iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = self
            .template
            .replace("{content}", &content)
            .replace("{question}", question);

        debug!(prompt_chars = prompt.len(), "invoking completion model");
        let text = self.completer.complete(&prompt, self.temperature).await?;

        Ok(Answer {
            text,
            used_fallback: false,
        })
    }
}
