use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

const APP_USER_AGENT: &str = concat!("Lodestar/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client used by every networked component.
///
/// Content-Length must stay truthful for download progress aggregation, so
/// transparent compression is disabled.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .timeout(Duration::from_secs(120))
        .build()
}
