//! Portal-specific scrapers.

pub mod swiggy;
pub mod zomato;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::error::ScrapeError;

/// HTTP client with the portal session cookie baked in. The portals gate
/// everything behind a logged-in session; the cookie comes from config.
pub(crate) fn build_client(user_agent: &str, session_cookie: &str) -> anyhow::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if !session_cookie.is_empty() {
        headers.insert(COOKIE, HeaderValue::from_str(session_cookie)?);
    }

    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()?;

    Ok(client)
}

/// Fetch a page body, mapping transport and HTTP failures to a unit-level
/// scrape error.
pub(crate) async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, ScrapeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ScrapeError::fetch(url, &e))?;

    if !response.status().is_success() {
        return Err(ScrapeError::PageFetch {
            url: url.to_string(),
            message: format!("status {}", response.status()),
        });
    }

    response.text().await.map_err(|e| ScrapeError::fetch(url, &e))
}
