use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};

use crate::error::LlmError;
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as RobertaConfig, XLMRobertaModel};
use tokenizers::{Tokenizer, TruncationParams};

/// Upper bound on model tokens fed to the encoder; longer inputs are truncated.
pub const MAX_MODEL_TOKENS: usize = 512;

#[derive(Clone)]
pub struct EmbedModel {
    model: Arc<XLMRobertaModel>,
    tokenizer: Tokenizer,
    device: Device,
}

impl std::fmt::Debug for EmbedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedModel")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

enum Weights {
    SafeTensors(PathBuf),
    Pth(PathBuf),
}

impl EmbedModel {
    /// Load a RoBERTa-family sentence encoder from `HuggingFace` Hub.
    ///
    /// `model.safetensors` is used when the repository ships one, otherwise
    /// `pytorch_model.bin`.
    ///
    /// # Errors
    ///
    /// Returns an error if model download or loading fails.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, LlmError> {
        let api = hf_hub::api::sync::Api::new().map_err(|e| {
            LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
        })?;
        let repo = api.model(repo_id.to_owned());

        let config_path = repo.get("config.json").map_err(|e| {
            LlmError::ModelLoad(format!(
                "failed to download config.json from {repo_id}: {e}"
            ))
        })?;
        let tokenizer_path = repo.get("tokenizer.json").map_err(|e| {
            LlmError::ModelLoad(format!(
                "failed to download tokenizer.json from {repo_id}: {e}"
            ))
        })?;
        let weights = match repo.get("model.safetensors") {
            Ok(path) => Weights::SafeTensors(path),
            Err(safetensors_err) => {
                tracing::debug!("{repo_id} has no model.safetensors ({safetensors_err}), trying pytorch_model.bin");
                let path = repo.get("pytorch_model.bin").map_err(|e| {
                    LlmError::ModelLoad(format!("failed to download weights from {repo_id}: {e}"))
                })?;
                Weights::Pth(path)
            }
        };

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| LlmError::ModelLoad(format!("failed to read RoBERTa config: {e}")))?;
        let config: RobertaConfig = serde_json::from_str(&config_str)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| LlmError::ModelLoad(format!("failed to load tokenizer: {e}")))?;
        tokenizer
            .with_padding(None)
            .with_truncation(Some(TruncationParams {
                max_length: MAX_MODEL_TOKENS,
                ..TruncationParams::default()
            }))
            .map_err(|e| LlmError::ModelLoad(format!("failed to configure truncation: {e}")))?;

        let vb = match weights {
            // SAFETY: file is a valid safetensors downloaded from hf-hub, not modified during
            // VarBuilder lifetime
            Weights::SafeTensors(path) => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)?
            },
            Weights::Pth(path) => VarBuilder::from_pth(path, DType::F32, device)?,
        };

        // sentence-transformers exports prefix every tensor with the base model name
        let vb = if vb.contains_tensor("roberta.embeddings.word_embeddings.weight") {
            vb.pp("roberta")
        } else {
            vb
        };
        let model = XLMRobertaModel::new(&config, vb)?;

        Ok(Self {
            model: Arc::new(model),
            tokenizer,
            device: device.clone(),
        })
    }

    /// Generate a mean-pooled, L2-normalized embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the model forward pass fails.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let token_ids = encoding.get_ids();
        let token_type_ids: Vec<u32> = vec![0; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::ones((1, token_ids.len()), DType::F32, &self.device)?;

        let embeddings =
            self.model
                .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;

        // Mean pooling over sequence dimension
        let seq_len = embeddings.dim(1)?;
        let sum = embeddings.sum(1)?;
        let mean_pooled = (sum
            / f64::from(
                u32::try_from(seq_len)
                    .map_err(|e| LlmError::Inference(format!("sequence length overflow: {e}")))?,
            ))?;

        // L2 normalization
        let norm = mean_pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = mean_pooled.broadcast_div(&norm)?.squeeze(0)?;

        normalized.to_vec1::<f32>().map_err(LlmError::Candle)
    }
}
