use std::path::PathBuf;
use std::sync::Arc;

use docchat_llm::any::AnyProvider;
use docchat_llm::openai::OpenAiProvider;
use docchat_llm::provider::EmbedFn;
use docchat_memory::MmrConfig;
use docchat_memory::document::{Loaders, TextSplitter};

use crate::chain::ChainError;
use crate::config::{Config, EmbeddingBackend};
use crate::vault::Secret;

/// Builds the chat model for a session from the key it was processed with.
pub type ProviderFactory = Arc<dyn Fn(&Secret) -> AnyProvider + Send + Sync>;

/// Where a session gets its embedder.
#[derive(Clone)]
pub enum EmbeddingSource {
    /// A model loaded once and shared by every session.
    Shared(EmbedFn),
    /// The session's own chat provider, which needs the session key.
    Provider,
}

impl std::fmt::Debug for EmbeddingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shared(_) => f.write_str("Shared"),
            Self::Provider => f.write_str("Provider"),
        }
    }
}

/// Everything a session needs to go from uploads to a ready chain.
#[derive(Clone)]
pub struct PipelineSettings {
    pub loaders: Loaders,
    pub splitter: TextSplitter,
    pub retrieval: MmrConfig,
    pub upload_dir: PathBuf,
    pub embedding: EmbeddingSource,
    pub verify_credentials: bool,
    provider_factory: ProviderFactory,
}

impl std::fmt::Debug for PipelineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineSettings")
            .field("loaders", &self.loaders)
            .field("splitter", &self.splitter)
            .field("retrieval", &self.retrieval)
            .field("upload_dir", &self.upload_dir)
            .field("embedding", &self.embedding)
            .field("verify_credentials", &self.verify_credentials)
            .finish_non_exhaustive()
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn new(
        loaders: Loaders,
        splitter: TextSplitter,
        embedding: EmbeddingSource,
        provider_factory: ProviderFactory,
    ) -> Self {
        Self {
            loaders,
            splitter,
            retrieval: MmrConfig::default(),
            upload_dir: PathBuf::from("."),
            embedding,
            verify_credentials: true,
            provider_factory,
        }
    }

    /// Settings for the OpenAI chat service described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the splitter settings are invalid or the tokenizer fails to load.
    pub fn from_config(config: &Config, embedding: EmbeddingSource) -> anyhow::Result<Self> {
        let splitter = TextSplitter::new(config.splitter)?;
        let loaders = Loaders::new(config.upload.max_file_size, config.upload.docx_segment_chars);

        let llm = config.llm.clone();
        let embedding_model = (config.embedding.backend == EmbeddingBackend::OpenAi)
            .then(|| config.embedding.model.clone());
        let factory: ProviderFactory = Arc::new(move |key: &Secret| {
            AnyProvider::OpenAi(OpenAiProvider::new(
                key.expose().to_owned(),
                llm.base_url.clone(),
                llm.model.clone(),
                llm.max_tokens,
                llm.temperature,
                embedding_model.clone(),
            ))
        });

        Ok(Self {
            retrieval: config.retrieval,
            upload_dir: config.upload.dir.clone(),
            verify_credentials: config.llm.verify_credentials,
            ..Self::new(loaders, splitter, embedding, factory)
        })
    }

    /// Chat provider for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::MissingCredential`] for a blank key.
    pub fn provider_for(&self, key: &Secret) -> Result<AnyProvider, ChainError> {
        if key.is_blank() {
            return Err(ChainError::MissingCredential);
        }
        Ok((self.provider_factory)(key))
    }

    #[must_use]
    pub fn embed_fn_for(&self, provider: &AnyProvider) -> EmbedFn {
        match &self.embedding {
            EmbeddingSource::Shared(embed_fn) => Arc::clone(embed_fn),
            EmbeddingSource::Provider => provider.embed_fn(),
        }
    }
}
