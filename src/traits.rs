//! Traits and interfaces for portal-agnostic dashboard scraping.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::Platform;

/// Configuration for one partner-portal scraper.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Display name for the portal
    pub name: String,
    /// Which platform rows from this portal are tagged with
    pub platform: Platform,
    /// Base URL for the partner portal
    pub base_url: String,
    /// Outlet IDs to cycle through
    pub outlet_ids: Vec<String>,
}

/// An ordered list of locator strategies for one logical page element.
///
/// Portal markup shifts constantly, so every element worth finding carries
/// the selector variants seen so far. Lookups walk the chain in order and
/// return the first hit; an exhausted chain is a unit-level error, never a
/// panic.
pub struct SelectorChain {
    name: &'static str,
    selectors: Vec<Selector>,
}

impl SelectorChain {
    pub fn parse(name: &'static str, css: &[&str]) -> anyhow::Result<Self> {
        let selectors = css
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map_err(|e| anyhow::anyhow!("failed to parse selector {s:?} for {name}: {e:?}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { name, selectors })
    }

    /// First element matched by the earliest selector that hits.
    pub fn select_first<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        for (i, selector) in self.selectors.iter().enumerate() {
            if let Some(element) = document.select(selector).next() {
                if i > 0 {
                    debug!("chain '{}' fell through to alternative {}", self.name, i + 1);
                }
                return Some(element);
            }
        }
        None
    }

    /// First match scoped to one element (a card, a panel) instead of the
    /// whole document.
    pub fn select_first_in<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors
            .iter()
            .find_map(|selector| scope.select(selector).next())
    }

    /// All elements from the earliest selector that matches anything.
    pub fn select_all<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in &self.selectors {
            let matches: Vec<_> = document.select(selector).collect();
            if !matches.is_empty() {
                return matches;
            }
        }
        Vec::new()
    }

    /// Inner text of the first match, or an `ElementNotFound` naming the
    /// chain once every strategy is exhausted.
    pub fn text_of(&self, document: &Html) -> Result<String, ScrapeError> {
        self.select_first(document)
            .map(|el| element_text(&el))
            .ok_or_else(|| ScrapeError::ElementNotFound {
                chain: self.name.to_string(),
                attempts: self.selectors.len(),
            })
    }
}

/// Collapse an element's text nodes into one trimmed, line-per-node blob.
pub fn element_text(element: &ElementRef<'_>) -> String {
    let mut out = String::new();
    for piece in element.text() {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(piece);
    }
    out
}

/// One complaint card as captured off the page, before extraction.
#[derive(Debug, Clone)]
pub struct ComplaintBlock {
    pub complaint_id: String,
    pub text: String,
    pub image_url: String,
}

/// Trait for portal-specific dashboard scrapers.
#[async_trait]
pub trait DashboardScraper: Send + Sync {
    /// Get the configuration for this scraper
    fn config(&self) -> &PortalConfig;

    /// Metric labels this portal's dashboard reports
    fn metric_labels(&self) -> &'static [&'static str];

    /// Capture the business-metrics dashboard text for one outlet.
    async fn metrics_text(&self, outlet_id: &str) -> Result<String, ScrapeError>;

    /// Capture every open complaint card.
    async fn complaint_blocks(&self) -> Result<Vec<ComplaintBlock>, ScrapeError>;

    /// Capture every review card for one outlet.
    async fn review_blocks(&self, outlet_id: &str) -> Result<Vec<String>, ScrapeError>;

    /// Get the user agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div class="metrics-panel-v2">
                <span>Delivered Orders: 42</span>
                <span>Online %: 97.5%</span>
            </div>
        </body></html>
    "#;

    #[test]
    fn chain_falls_through_to_later_strategy() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::parse(
            "metrics panel",
            &[".metrics-panel", "[class*='metrics-panel']", "body"],
        )
        .unwrap();

        let text = chain.text_of(&document).unwrap();
        assert!(text.contains("Delivered Orders: 42"));
        assert!(text.contains("Online %: 97.5%"));
    }

    #[test]
    fn exhausted_chain_reports_every_attempt() {
        let document = Html::parse_document(PAGE);
        let chain =
            SelectorChain::parse("complaint cards", &[".card-a", ".card-b", ".card-c"]).unwrap();

        match chain.text_of(&document) {
            Err(ScrapeError::ElementNotFound { chain, attempts }) => {
                assert_eq!(chain, "complaint cards");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected ElementNotFound, got {other:?}"),
        }
    }

    #[test]
    fn select_all_uses_first_matching_strategy() {
        let document = Html::parse_document(PAGE);
        let chain = SelectorChain::parse("spans", &[".missing", "span"]).unwrap();
        assert_eq!(chain.select_all(&document).len(), 2);
    }

    #[test]
    fn invalid_selector_is_a_setup_error() {
        assert!(SelectorChain::parse("broken", &["???"]).is_err());
    }
}
