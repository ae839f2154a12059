//! Application bootstrap: config resolution, embedder and session registry construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[cfg(not(feature = "candle"))]
use anyhow::bail;
use tokio::sync::watch;

use crate::config::{Config, EmbeddingBackend};
use crate::registry::SessionRegistry;
use crate::settings::{EmbeddingSource, PipelineSettings};
use crate::vault::{EnvVaultProvider, VaultProvider};

pub struct AppBuilder {
    config: Config,
    config_path: PathBuf,
    vault: Arc<dyn VaultProvider>,
}

impl AppBuilder {
    /// Resolve the config path from the command line or environment, load and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is unreadable or invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_path(resolve_config_path())
    }

    /// # Errors
    ///
    /// Returns an error if the config file is unreadable or invalid.
    pub fn from_path(config_path: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&config_path)?;
        config.validate()?;
        Ok(Self {
            config,
            config_path,
            vault: Arc::new(EnvVaultProvider),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    #[must_use]
    pub fn vault(&self) -> Arc<dyn VaultProvider> {
        Arc::clone(&self.vault)
    }

    /// Load the configured embedder; for the `openai` backend nothing is loaded
    /// up front and each session embeds through its own provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the local model cannot be loaded, or if the `candle`
    /// backend is selected in a build without the `candle` feature.
    pub async fn build_embedding(&self) -> anyhow::Result<EmbeddingSource> {
        match self.config.embedding.backend {
            EmbeddingBackend::OpenAi => {
                tracing::info!(
                    model = %self.config.embedding.model,
                    "embeddings computed by the chat service"
                );
                Ok(EmbeddingSource::Provider)
            }
            #[cfg(feature = "candle")]
            EmbeddingBackend::Candle => {
                use docchat_llm::candle_provider::{CandleEmbedder, device_from_name};

                let device = device_from_name(&self.config.embedding.device)?;
                let repo = self.config.embedding.model.clone();
                let embedder =
                    tokio::task::spawn_blocking(move || CandleEmbedder::load(&repo, device))
                        .await??;
                Ok(EmbeddingSource::Shared(embedder.embed_fn()))
            }
            #[cfg(not(feature = "candle"))]
            EmbeddingBackend::Candle => {
                bail!("embedding.backend = \"candle\" requires building with the `candle` feature")
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if the splitter cannot be constructed.
    pub fn build_registry(&self, embedding: EmbeddingSource) -> anyhow::Result<SessionRegistry> {
        let settings = PipelineSettings::from_config(&self.config, embedding)?;
        tracing::info!(
            upload_dir = %settings.upload_dir.display(),
            chunk_size = settings.splitter.config().chunk_size,
            k = settings.retrieval.k,
            "session pipeline configured"
        );
        Ok(SessionRegistry::new(
            Arc::new(settings),
            self.config.session.greeting.clone(),
            Duration::from_secs(self.config.session.ttl_secs),
        ))
    }

    #[must_use]
    pub fn build_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }
}

/// Priority: `--config <path>` > `DOCCHAT_CONFIG` > `config/default.toml`.
#[must_use]
pub fn resolve_config_path() -> PathBuf {
    let args: Vec<String> = std::env::args().collect();
    config_path_from(&args, std::env::var("DOCCHAT_CONFIG").ok())
}

fn config_path_from(args: &[String], env: Option<String>) -> PathBuf {
    if let Some(path) = args.windows(2).find(|w| w[0] == "--config").map(|w| &w[1]) {
        return PathBuf::from(path);
    }
    if let Some(path) = env {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}
