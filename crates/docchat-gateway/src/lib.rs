//! Browser chat UI and JSON session API over per-session document chat.

mod error;
mod handlers;
mod router;
mod server;
#[cfg(test)]
mod test_support;

pub use error::{GatewayError, MISSING_KEY_MESSAGE};
pub use server::GatewayServer;
