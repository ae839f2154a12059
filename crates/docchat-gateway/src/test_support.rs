use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use docchat_core::config::{Config, DEFAULT_GREETING};
use docchat_core::vault::EnvVaultProvider;
use docchat_core::{EmbeddingSource, PipelineSettings, Secret, SessionRegistry};
use docchat_llm::any::AnyProvider;
use docchat_llm::mock::MockProvider;
use docchat_memory::document::{Loaders, SplitterConfig, TextSplitter};

use crate::server::AppState;

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

fn upload_dir() -> PathBuf {
    let n = NEXT_DIR.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("docchat-gateway-{}-{n}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// App state whose sessions all talk to `mock`, with default config.
pub(crate) fn test_state(mock: MockProvider) -> AppState {
    let mut settings = PipelineSettings::new(
        Loaders::default(),
        TextSplitter::new(SplitterConfig::default()).unwrap(),
        EmbeddingSource::Provider,
        Arc::new(move |_key: &Secret| AnyProvider::Mock(mock.clone())),
    );
    settings.upload_dir = upload_dir();

    let registry = SessionRegistry::new(
        Arc::new(settings),
        DEFAULT_GREETING,
        Duration::from_secs(3600),
    );
    AppState {
        registry: Arc::new(registry),
        config: Arc::new(Config::default()),
        vault: Arc::new(EnvVaultProvider),
        started_at: Instant::now(),
    }
}

/// `multipart/form-data` body with an `api_key` field and one `files` part per upload.
pub(crate) fn multipart_body(boundary: &str, api_key: &str, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"api_key\"\r\n\r\n{api_key}\r\n"
        )
        .as_bytes(),
    );
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
