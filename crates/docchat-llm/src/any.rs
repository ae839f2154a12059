#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{EmbedFn, EmbedFuture, LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given closure for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    /// Return a shareable closure that calls `embed()` on this provider.
    #[must_use]
    pub fn embed_fn(&self) -> EmbedFn {
        let provider = std::sync::Arc::new(self.clone());
        std::sync::Arc::new(move |text: &str| -> EmbedFuture {
            let p = std::sync::Arc::clone(&provider);
            let owned = text.to_owned();
            Box::pin(async move { p.embed(&owned).await })
        })
    }
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    async fn verify_credentials(&self) -> Result<(), crate::LlmError> {
        delegate_provider!(self, |p| p.verify_credentials().await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}
