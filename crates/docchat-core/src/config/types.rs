use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use docchat_memory::MmrConfig;
use docchat_memory::document::loader::DEFAULT_DOCX_SEGMENT_CHARS;
use docchat_memory::document::{DEFAULT_MAX_FILE_SIZE, SplitterConfig};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GREETING: &str =
    "안녕하세요! 주어진 문서에 대해 궁금하신 것이 있으면 언제든 물어봐주세요!";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub splitter: SplitterConfig,
    #[serde(default)]
    pub retrieval: MmrConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    /// Fall back to `OPENAI_API_KEY` when the browser sends a blank key.
    #[serde(default)]
    pub allow_env_key: bool,
    /// Round-trip the key to the service before any document work.
    #[serde(default = "default_true")]
    pub verify_credentials: bool,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".into()
}

fn default_llm_max_tokens() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: default_llm_max_tokens(),
            allow_env_key: false,
            verify_credentials: true,
        }
    }
}

/// Where chunk and question embeddings are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local sentence encoder run with candle.
    Candle,
    /// The `/embeddings` endpoint of the chat service, authenticated with the session key.
    OpenAi,
}

impl EmbeddingBackend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Candle => "candle",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candle" => Ok(Self::Candle),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown embedding backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_backend")]
    pub backend: EmbeddingBackend,
    /// HuggingFace repo id for `candle`, embedding model name for `openai`.
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_device")]
    pub device: String,
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Candle
}

fn default_embedding_model() -> String {
    "jhgan/ko-sroberta-multitask".into()
}

fn default_embedding_device() -> String {
    "cpu".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            model: default_embedding_model(),
            device: default_embedding_device(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Directory uploads are written to before parsing.
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_upload_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_docx_segment_chars")]
    pub docx_segment_chars: usize,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_upload_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_docx_segment_chars() -> usize {
    DEFAULT_DOCX_SEGMENT_CHARS
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_file_size: default_upload_max_file_size(),
            docx_segment_chars: default_docx_segment_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Requests per minute per client IP; 0 disables the limit.
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8501
}

fn default_gateway_rate_limit() -> u32 {
    120
}

fn default_gateway_max_body() -> usize {
    200 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Idle seconds before a session is dropped; 0 keeps sessions forever.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

fn default_greeting() -> String {
    DEFAULT_GREETING.into()
}

fn default_session_ttl() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            ttl_secs: default_session_ttl(),
        }
    }
}
