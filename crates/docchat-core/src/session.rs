//! Per-session chat controller: transcript, history and the current chain.

use std::sync::Arc;

use docchat_llm::LlmError;
use docchat_llm::provider::{LlmProvider, Message};
use docchat_memory::document::{
    Chunk, DocumentError, IngestionPipeline, SkippedFile, UploadedFile,
};
use serde::Serialize;
use uuid::Uuid;

use crate::chain::{ChainError, ConversationalRetrievalChain};
use crate::history::ChatHistory;
use crate::settings::PipelineSettings;
use crate::vault::Secret;

pub type SessionId = Uuid;

/// Citations shown per answer.
pub const MAX_CITATIONS: usize = 3;

pub const NO_SOURCES_NOTICE: &str = "참고할 문서가 없습니다.";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("an API key is required before processing documents")]
    MissingCredential,

    #[error("the API key was rejected: {0}")]
    InvalidCredential(#[source] LlmError),

    #[error("no documents have been processed yet")]
    NotReady,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("no text could be extracted from the uploaded files")]
    NothingToIndex { skipped: Vec<SkippedFile> },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Chain(ChainError),
}

impl From<ChainError> for SessionError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::MissingCredential => Self::MissingCredential,
            other => Self::Chain(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub label: String,
    pub source: String,
    pub page: usize,
    pub content: String,
}

impl Citation {
    fn from_chunk(n: usize, chunk: Chunk) -> Self {
        Self {
            label: format!("문서 {n}: {}", chunk.metadata.source),
            source: chunk.metadata.source,
            page: chunk.metadata.page,
            content: chunk.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub no_sources: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl ChatReply {
    fn new(answer: String, sources: Vec<Chunk>) -> Self {
        let citations: Vec<Citation> = sources
            .into_iter()
            .take(MAX_CITATIONS)
            .enumerate()
            .map(|(i, chunk)| Citation::from_chunk(i + 1, chunk))
            .collect();
        let no_sources = citations.is_empty();
        Self {
            answer,
            citations,
            no_sources,
            notice: no_sources.then(|| NO_SOURCES_NOTICE.to_owned()),
        }
    }
}

/// State of one browser session.
///
/// Idle until [`Session::process`] succeeds, Ready afterwards; a later
/// successful `process` replaces the chain and restarts the conversation.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    settings: Arc<PipelineSettings>,
    greeting: String,
    messages: Vec<Message>,
    chat_history: ChatHistory,
    conversation: Option<ConversationalRetrievalChain>,
    process_complete: bool,
}

impl Session {
    #[must_use]
    pub fn new(id: SessionId, settings: Arc<PipelineSettings>, greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            id,
            settings,
            messages: vec![Message::assistant(greeting.clone())],
            greeting,
            chat_history: ChatHistory::new(),
            conversation: None,
            process_complete: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The chat transcript, greeting first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn chat_history(&self) -> &ChatHistory {
        &self.chat_history
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.conversation.is_some()
    }

    #[must_use]
    pub fn process_complete(&self) -> bool {
        self.process_complete
    }

    /// Load, chunk and index `files`, then make the session Ready.
    ///
    /// Nothing changes unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingCredential`] for a blank key before any
    /// file is touched, [`SessionError::InvalidCredential`] if the service
    /// rejects it, and [`SessionError::NothingToIndex`] when no file yields text.
    pub async fn process(
        &mut self,
        api_key: &Secret,
        files: &[UploadedFile],
    ) -> Result<ProcessSummary, SessionError> {
        let provider = self.settings.provider_for(api_key)?;
        if self.settings.verify_credentials {
            provider
                .verify_credentials()
                .await
                .map_err(SessionError::InvalidCredential)?;
        }

        let report = self
            .settings
            .loaders
            .load_uploads(&self.settings.upload_dir, files)
            .await?;
        if report.documents.is_empty() {
            return Err(SessionError::NothingToIndex {
                skipped: report.skipped,
            });
        }

        let embed_fn = self.settings.embed_fn_for(&provider);
        let pipeline = IngestionPipeline::new(self.settings.splitter.clone(), Arc::clone(&embed_fn));
        let (index, stats) = pipeline.build_index(&report.documents).await?;

        let chain = ConversationalRetrievalChain::new(
            provider,
            embed_fn,
            Arc::new(index),
            self.settings.retrieval,
        );
        tracing::info!(session = %self.id, "chain processing complete");

        self.conversation = Some(chain);
        self.chat_history = ChatHistory::new();
        self.messages = vec![Message::assistant(self.greeting.clone())];
        self.process_complete = true;

        Ok(ProcessSummary {
            documents: stats.documents,
            chunks: stats.chunks,
            skipped: report.skipped,
        })
    }

    /// Answer one question and record the turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] before a successful `process`. A failed
    /// model call leaves the user message in the transcript and nothing else changed.
    pub async fn ask(&mut self, question: &str) -> Result<ChatReply, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }
        let Some(chain) = self.conversation.as_ref() else {
            return Err(SessionError::NotReady);
        };

        self.messages.push(Message::user(question));
        let result = chain.answer(question, &self.chat_history).await?;

        self.messages.push(Message::assistant(result.answer.clone()));
        self.chat_history = result.history;
        Ok(ChatReply::new(result.answer, result.sources))
    }
}
