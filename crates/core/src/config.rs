use crate::error::ConfigError;
use crate::models::{ContentKind, Source};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Default instruction block for the grounded composer. `{content}` receives
/// the retrieved texts and `{question}` the verbatim user question.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Answer the question only using the provided Documents.
Your tasks are to follow these instructions:
    Use ONLY the provided Documents. If the information is not available, respond with: \"{fallback}\"
    DO NOT invent, assume, or infer information.
    DO NOT use your internal knowledge.
    DO NOT answer with any general information.
    DO NOT add any best practices OUTSIDE of provided Documents.
    DO NOT answer OUTSIDE of question topic.
    DO NOT answer OUTSIDE of provided Documents.
    Use example(s) from Documents only and EXACTLY as it is written in Documents if applicable.
    Answer the question concisely and shortly.

Documents: {content}
Question: {question}
Answer:";

pub const DEFAULT_FALLBACK_RESPONSE: &str =
    "I do not have enough information to answer this question based on the provided sources.";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub html: HtmlSettings,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl Config {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolves the configured source entries into validated [`Source`]s.
    pub fn resolve_sources(&self) -> Result<Vec<Source>, ConfigError> {
        self.sources
            .iter()
            .map(|entry| {
                let url = Url::parse(&entry.url).map_err(|err| ConfigError::InvalidSource {
                    url: entry.url.clone(),
                    detail: err.to_string(),
                })?;
                let declared = match entry.content_type.as_deref() {
                    None => None,
                    Some(label) => Some(ContentKind::from_content_type(label).ok_or_else(
                        || ConfigError::InvalidSource {
                            url: entry.url.clone(),
                            detail: format!("unknown content type '{label}'"),
                        },
                    )?),
                };
                Ok(Source { url, declared })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    /// Expected content type, consulted only when the response omits the
    /// `Content-Type` header.
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChunkingSettings {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1_000
}
fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_dimensions() -> usize {
    768
}
fn default_embed_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_chat_model(),
            temperature: 0.0,
            prompt_template: default_prompt_template(),
            fallback_response: default_fallback_response(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_timeout_secs() -> u64 {
    120
}

fn default_chat_model() -> String {
    "gemma3:latest".to_string()
}
fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.replace("{fallback}", DEFAULT_FALLBACK_RESPONSE)
}
fn default_fallback_response() -> String {
    DEFAULT_FALLBACK_RESPONSE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("vector_store")
}
fn default_collection() -> String {
    "guidance".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_secs() -> u64 {
    1
}

/// Markup-cleaning rules: tags removed wholesale and per-tag class
/// exclusions, both applied before text is collected.
#[derive(Debug, Clone, Deserialize)]
pub struct HtmlSettings {
    #[serde(default = "default_strip_tags")]
    pub strip_tags: Vec<String>,
    #[serde(default)]
    pub strip_classes: BTreeMap<String, Vec<String>>,
}

impl Default for HtmlSettings {
    fn default() -> Self {
        Self {
            strip_tags: default_strip_tags(),
            strip_classes: BTreeMap::new(),
        }
    }
}

fn default_strip_tags() -> Vec<String> {
    [
        "script", "style", "nav", "header", "footer", "noscript", "iframe", "form",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
