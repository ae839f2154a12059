use std::path::PathBuf;
use std::str::FromStr;

use super::Config;

/// Read `key` and parse it, warning about (and ignoring) values that do not parse.
fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse::<T>() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_server();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("DOCCHAT_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("DOCCHAT_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(t) = parsed::<f32>("DOCCHAT_LLM_TEMPERATURE") {
            self.llm.temperature = t;
        }
        if let Some(n) = parsed::<u32>("DOCCHAT_LLM_MAX_TOKENS") {
            self.llm.max_tokens = n;
        }
        if let Some(allow) = parsed::<bool>("DOCCHAT_LLM_ALLOW_ENV_KEY") {
            self.llm.allow_env_key = allow;
        }
        if let Some(verify) = parsed::<bool>("DOCCHAT_LLM_VERIFY_CREDENTIALS") {
            self.llm.verify_credentials = verify;
        }
        if let Some(backend) = parsed("DOCCHAT_EMBEDDING_BACKEND") {
            self.embedding.backend = backend;
        }
        if let Ok(v) = std::env::var("DOCCHAT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("DOCCHAT_EMBEDDING_DEVICE") {
            self.embedding.device = v;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Some(n) = parsed::<usize>("DOCCHAT_CHUNK_SIZE") {
            self.splitter.chunk_size = n;
        }
        if let Some(n) = parsed::<usize>("DOCCHAT_CHUNK_OVERLAP") {
            self.splitter.chunk_overlap = n;
        }
        if let Some(k) = parsed::<usize>("DOCCHAT_RETRIEVAL_K") {
            self.retrieval.k = k;
        }
        if let Some(k) = parsed::<usize>("DOCCHAT_RETRIEVAL_FETCH_K") {
            self.retrieval.fetch_k = k;
        }
        if let Some(lambda) = parsed::<f32>("DOCCHAT_RETRIEVAL_LAMBDA") {
            self.retrieval.lambda = lambda;
        }
        if let Ok(v) = std::env::var("DOCCHAT_UPLOAD_DIR") {
            self.upload.dir = PathBuf::from(v);
        }
        if let Some(n) = parsed::<u64>("DOCCHAT_UPLOAD_MAX_FILE_SIZE") {
            self.upload.max_file_size = n;
        }
        if let Some(n) = parsed::<usize>("DOCCHAT_UPLOAD_DOCX_SEGMENT_CHARS") {
            self.upload.docx_segment_chars = n;
        }
    }

    fn apply_env_overrides_server(&mut self) {
        if let Ok(v) = std::env::var("DOCCHAT_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Some(port) = parsed::<u16>("DOCCHAT_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Some(rate) = parsed::<u32>("DOCCHAT_GATEWAY_RATE_LIMIT") {
            self.gateway.rate_limit = rate;
        }
        if let Some(size) = parsed::<usize>("DOCCHAT_GATEWAY_MAX_BODY_SIZE") {
            self.gateway.max_body_size = size;
        }
        if let Ok(v) = std::env::var("DOCCHAT_SESSION_GREETING") {
            self.session.greeting = v;
        }
        if let Some(ttl) = parsed::<u64>("DOCCHAT_SESSION_TTL_SECS") {
            self.session.ttl_secs = ttl;
        }
    }
}
