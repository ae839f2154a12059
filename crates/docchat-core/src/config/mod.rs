mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

/// Environment variable consulted for the API key when `llm.allow_env_key` is set.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error describing the first out-of-range setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.splitter
            .validate()
            .context("invalid [splitter] section")?;
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be positive");
        }
        if self.retrieval.fetch_k < self.retrieval.k {
            bail!(
                "retrieval.fetch_k ({}) must be at least retrieval.k ({})",
                self.retrieval.fetch_k,
                self.retrieval.k
            );
        }
        if !(0.0..=1.0).contains(&self.retrieval.lambda) {
            bail!(
                "retrieval.lambda must be within [0, 1], got {}",
                self.retrieval.lambda
            );
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            );
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.upload.max_file_size == 0 {
            bail!("upload.max_file_size must be positive");
        }
        Ok(())
    }

    /// Pick the key a session processes with: the one typed into the UI, or
    /// `OPENAI_API_KEY` from the vault when that is blank and the fallback is enabled.
    ///
    /// A blank result is returned as is; the session rejects it.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_api_key(
        &self,
        provided: &str,
        vault: &dyn VaultProvider,
    ) -> anyhow::Result<Secret> {
        let provided = provided.trim();
        if !provided.is_empty() || !self.llm.allow_env_key {
            return Ok(Secret::new(provided));
        }
        let fallback = vault
            .get_secret(OPENAI_API_KEY_ENV)
            .await?
            .map(|v| v.trim().to_owned())
            .unwrap_or_default();
        if !fallback.is_empty() {
            tracing::debug!("using {OPENAI_API_KEY_ENV} for a session with no key entered");
        }
        Ok(Secret::new(fallback))
    }
}
