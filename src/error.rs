use thiserror::Error;

/// Errors from the portal-scraping layer. Both kinds are recoverable at the
/// unit level: the caller logs, skips the outlet/card, and moves on.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("page fetch failed for {url}: {message}")]
    PageFetch { url: String, message: String },

    #[error("no locator in chain '{chain}' matched ({attempts} tried)")]
    ElementNotFound { chain: String, attempts: usize },
}

impl ScrapeError {
    pub fn fetch(url: &str, err: &reqwest::Error) -> Self {
        Self::PageFetch {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
