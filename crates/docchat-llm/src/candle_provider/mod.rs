//! Local sentence embeddings computed with candle.

pub mod embed;

pub use candle_core::Device;

use std::sync::Arc;

use crate::error::LlmError;
use crate::provider::{EmbedFn, EmbedFuture};

use self::embed::EmbedModel;

/// Resolve a configured device name (`cpu`, `cuda`, `metal`).
///
/// # Errors
///
/// Returns [`LlmError::ModelLoad`] for unknown names or unavailable accelerators.
pub fn device_from_name(name: &str) -> Result<Device, LlmError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0).map_err(|e| LlmError::ModelLoad(format!("cuda: {e}"))),
        "metal" => Device::new_metal(0).map_err(|e| LlmError::ModelLoad(format!("metal: {e}"))),
        other => Err(LlmError::ModelLoad(format!("unknown device: {other}"))),
    }
}

/// Shared handle to a loaded encoder; cheap to clone.
#[derive(Clone, Debug)]
pub struct CandleEmbedder {
    model: Arc<EmbedModel>,
    device: Device,
}

impl CandleEmbedder {
    /// Download (or reuse the hub cache) and load `repo_id` onto `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if model download or loading fails.
    pub fn load(repo_id: &str, device: Device) -> Result<Self, LlmError> {
        let model = EmbedModel::load(repo_id, &device)?;
        tracing::info!(repo = repo_id, device = Self::name_of(&device), "embedding model loaded");
        Ok(Self {
            model: Arc::new(model),
            device,
        })
    }

    fn name_of(device: &Device) -> &'static str {
        match device {
            Device::Cpu => "cpu",
            Device::Cuda(_) => "cuda",
            Device::Metal(_) => "metal",
        }
    }

    #[must_use]
    pub fn device_name(&self) -> &'static str {
        Self::name_of(&self.device)
    }

    /// Embed `text` on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the forward pass fails or the task panics.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = Arc::clone(&self.model);
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || model.embed_sync(&text))
            .await
            .map_err(|e| LlmError::Inference(format!("candle embedding task failed: {e}")))?
    }

    #[must_use]
    pub fn embed_fn(&self) -> EmbedFn {
        let embedder = self.clone();
        Arc::new(move |text: &str| -> EmbedFuture {
            let e = embedder.clone();
            let owned = text.to_owned();
            Box::pin(async move { e.embed(&owned).await })
        })
    }
}
