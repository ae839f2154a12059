//! Language-model client and embedding backends.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle_provider;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use error::LlmError;
pub use provider::LlmProvider;
