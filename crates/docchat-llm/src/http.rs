//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create the HTTP client used for completion and embedding calls.
///
/// Config: 30s connect timeout, 120s request timeout, rustls TLS,
/// `docchat/{version}` user-agent, redirect limit 10.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("docchat/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}
