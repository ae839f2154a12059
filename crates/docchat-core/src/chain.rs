//! Question condensing, MMR retrieval and the "stuff" answer prompt.

use std::sync::Arc;

use docchat_llm::LlmError;
use docchat_llm::any::AnyProvider;
use docchat_llm::provider::{EmbedFn, LlmProvider, Message};
use docchat_memory::document::Chunk;
use docchat_memory::{InMemoryVectorStore, MmrConfig, VectorStoreError};

use crate::history::ChatHistory;

const CONDENSE_QUESTION_PROMPT: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const ANSWER_SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const CONTEXT_DIVIDER: &str = "----------------";

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("an API key is required to talk to the language model")]
    MissingCredential,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub answer: String,
    /// The prior history extended with this turn.
    pub history: ChatHistory,
    /// Retrieved chunks in MMR order.
    pub sources: Vec<Chunk>,
}

/// Prompt asking the model to turn a follow-up into a standalone question.
#[must_use]
pub fn condense_question_prompt(history: &ChatHistory, question: &str) -> String {
    format!(
        "{CONDENSE_QUESTION_PROMPT}\n\nChat History:\n{}\nFollow Up Input: {question}\nStandalone question:",
        history.render()
    )
}

/// System message carrying the retrieved context, then the question.
#[must_use]
pub fn stuff_messages(sources: &[Chunk], question: &str) -> Vec<Message> {
    let context = sources
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        Message::system(format!(
            "{ANSWER_SYSTEM_PROMPT}\n{CONTEXT_DIVIDER}\n{context}"
        )),
        Message::user(question),
    ]
}

/// A ready pipeline: one index, one chat model, one embedder.
#[derive(Clone)]
pub struct ConversationalRetrievalChain {
    provider: AnyProvider,
    embed_fn: EmbedFn,
    index: Arc<InMemoryVectorStore>,
    retrieval: MmrConfig,
}

impl std::fmt::Debug for ConversationalRetrievalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationalRetrievalChain")
            .field("provider", &self.provider.name())
            .field("index", &self.index)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl ConversationalRetrievalChain {
    #[must_use]
    pub fn new(
        provider: AnyProvider,
        embed_fn: EmbedFn,
        index: Arc<InMemoryVectorStore>,
        retrieval: MmrConfig,
    ) -> Self {
        Self {
            provider,
            embed_fn,
            index,
            retrieval,
        }
    }

    #[must_use]
    pub fn index(&self) -> &InMemoryVectorStore {
        &self.index
    }

    async fn standalone_question(
        &self,
        question: &str,
        history: &ChatHistory,
    ) -> Result<String, ChainError> {
        if history.is_empty() {
            return Ok(question.to_owned());
        }
        let prompt = condense_question_prompt(history, question);
        let rewritten = self.provider.chat(&[Message::user(prompt)]).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            tracing::warn!("empty standalone question, using the original");
            return Ok(question.to_owned());
        }
        tracing::debug!(standalone = rewritten, "condensed follow-up question");
        Ok(rewritten.to_owned())
    }

    /// Answer `question` given the turns so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the model or embedding call fails; nothing is retried.
    pub async fn answer(
        &self,
        question: &str,
        history: &ChatHistory,
    ) -> Result<RetrievalResult, ChainError> {
        let standalone = self.standalone_question(question, history).await?;

        let query = (self.embed_fn)(&standalone).await?;
        let sources: Vec<Chunk> = self
            .index
            .search_mmr(&query, &self.retrieval)?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect();

        let messages = stuff_messages(&sources, &standalone);
        let answer = self.provider.chat(&messages).await?;

        Ok(RetrievalResult {
            history: history.with_turn(question, answer.as_str()),
            answer,
            sources,
        })
    }
}
