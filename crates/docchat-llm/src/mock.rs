//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex};

use crate::provider::{LlmProvider, Message};

/// Dimension of the bag-of-words vectors produced by [`MockProvider::embed`].
pub const MOCK_EMBED_DIM: usize = 256;

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub fail_chat: bool,
    pub reject_credentials: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            fail_chat: false,
            reject_credentials: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn rejecting_credentials() -> Self {
        Self {
            reject_credentials: true,
            ..Self::default()
        }
    }

    /// Every message list passed to `chat`, in call order. Clones share the log.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

/// Hashes lowercase alphanumeric words into buckets so texts sharing words
/// score a positive cosine similarity.
#[must_use]
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0_f32; MOCK_EMBED_DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_lowercase();
        let hash = blake3::hash(lower.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (u64::from_le_bytes(prefix) % MOCK_EMBED_DIM as u64) as usize;
        v[bucket] += 1.0;
    }
    v
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        Ok(bag_of_words(text))
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    async fn verify_credentials(&self) -> Result<(), crate::LlmError> {
        if self.reject_credentials {
            return Err(crate::LlmError::Unauthorized {
                provider: "mock".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_then_default() {
        let mock = MockProvider::with_responses(vec!["first".into()]);
        assert_eq!(mock.chat(&[Message::user("a")]).await.unwrap(), "first");
        assert_eq!(mock.chat(&[Message::user("b")]).await.unwrap(), "mock response");
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn failing_records_call_and_errors() {
        let mock = MockProvider::failing();
        assert!(mock.chat(&[Message::user("a")]).await.is_err());
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn rejecting_credentials() {
        let mock = MockProvider::rejecting_credentials();
        assert!(matches!(
            mock.verify_credentials().await,
            Err(crate::LlmError::Unauthorized { .. })
        ));
        assert!(MockProvider::default().verify_credentials().await.is_ok());
    }

    #[test]
    fn bag_of_words_ignores_case_and_punctuation() {
        assert_eq!(bag_of_words("Fever, 101F!"), bag_of_words("fever 101f"));
        assert!(bag_of_words("").iter().all(|x| *x == 0.0));
    }
}
