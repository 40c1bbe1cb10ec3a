pub mod anthropic;
pub mod google;
pub mod local;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use local::LocalAdapter;
pub use openai::OpenAIAdapter;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::error::Result;

/// Shared HTTP client for adapters. Credentials vary per config, so only
/// static headers are set here.
pub(crate) fn http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .build()?)
}

pub(crate) fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}
