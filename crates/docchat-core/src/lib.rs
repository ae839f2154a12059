//! Configuration, conversational retrieval chain and per-session chat state.

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod history;
pub mod registry;
pub mod session;
pub mod settings;
pub mod vault;

pub use chain::{ChainError, ConversationalRetrievalChain, RetrievalResult};
pub use config::Config;
pub use history::ChatHistory;
pub use registry::SessionRegistry;
pub use session::{ChatReply, Citation, ProcessSummary, Session, SessionError, SessionId};
pub use settings::{EmbeddingSource, PipelineSettings};
pub use vault::Secret;
