//! Zomato partner-portal scraper.

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::extract::patterns::ZOMATO_METRIC_LABELS;
use crate::models::Platform;
use crate::traits::{ComplaintBlock, DashboardScraper, PortalConfig, SelectorChain, element_text};

use super::{build_client, fetch_text};

static COMPLAINT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Complaint ID[:\s]*(\d+)|#(\d+)").expect("invalid complaint id pattern")
});

struct ZomatoSelectors {
    report_table: SelectorChain,
    complaint_cards: SelectorChain,
    review_cards: SelectorChain,
}

pub struct ZomatoScraper {
    client: reqwest::Client,
    config: PortalConfig,
    selectors: ZomatoSelectors,
}

impl ZomatoScraper {
    pub fn new(
        base_url: &str,
        session_cookie: &str,
        outlet_ids: Vec<String>,
    ) -> anyhow::Result<Self> {
        let config = PortalConfig {
            name: "Zomato Partner".to_string(),
            platform: Platform::Zomato,
            base_url: base_url.trim_end_matches('/').to_string(),
            outlet_ids,
        };

        let selectors = ZomatoSelectors {
            report_table: SelectorChain::parse(
                "zomato report table",
                &["[class*='reporting']", "table", "main", "body"],
            )?,
            complaint_cards: SelectorChain::parse(
                "zomato complaint cards",
                &["[class*='issue-card']", "[class*='complaint']", "[class*='card']"],
            )?,
            review_cards: SelectorChain::parse(
                "zomato review cards",
                &["[class*='review-card']", "[class*='review']", "[class*='card']"],
            )?,
        };

        let client = build_client(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
            session_cookie,
        )?;

        Ok(Self {
            client,
            config,
            selectors,
        })
    }

    /// The reporting page moves around; try the known paths in order.
    fn report_urls(&self, outlet_id: &str) -> Vec<String> {
        let rid = urlencoding::encode(outlet_id).into_owned();
        vec![
            format!(
                "{}/partners/onlineordering/reporting/?resId={rid}",
                self.config.base_url
            ),
            format!("{}/partners/onlineordering/?resId={rid}", self.config.base_url),
            format!("{}/partners/?resId={rid}", self.config.base_url),
        ]
    }
}

pub(crate) fn complaint_id_from(text: &str) -> String {
    COMPLAINT_ID
        .captures(text)
        .and_then(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl DashboardScraper for ZomatoScraper {
    fn config(&self) -> &PortalConfig {
        &self.config
    }

    fn metric_labels(&self) -> &'static [&'static str] {
        ZOMATO_METRIC_LABELS
    }

    async fn metrics_text(&self, outlet_id: &str) -> Result<String, ScrapeError> {
        let mut last_err = None;
        for url in self.report_urls(outlet_id) {
            match fetch_text(&self.client, &url).await {
                Ok(body) => {
                    let document = Html::parse_document(&body);
                    return self.selectors.report_table.text_of(&document);
                }
                Err(e) => {
                    warn!("Zomato reporting fetch failed, trying next url: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(ScrapeError::ElementNotFound {
            chain: "zomato report table".to_string(),
            attempts: 0,
        }))
    }

    async fn complaint_blocks(&self) -> Result<Vec<ComplaintBlock>, ScrapeError> {
        let url = format!(
            "{}/partners/onlineordering/customerIssues/",
            self.config.base_url
        );
        let body = fetch_text(&self.client, &url).await?;

        let document = Html::parse_document(&body);
        let blocks: Vec<ComplaintBlock> = self
            .selectors
            .complaint_cards
            .select_all(&document)
            .iter()
            .map(element_text)
            .filter(|text| text.contains("Complaint") || text.contains('#'))
            .map(|text| ComplaintBlock {
                complaint_id: complaint_id_from(&text),
                text,
                // Zomato issue cards carry no customer photo
                image_url: String::new(),
            })
            .collect();

        info!("captured {} Zomato complaint cards", blocks.len());
        Ok(blocks)
    }

    async fn review_blocks(&self, outlet_id: &str) -> Result<Vec<String>, ScrapeError> {
        let url = format!(
            "{}/partners/onlineordering/reviews/?resId={}",
            self.config.base_url,
            urlencoding::encode(outlet_id)
        );
        let body = fetch_text(&self.client, &url).await?;

        let document = Html::parse_document(&body);
        let blocks: Vec<String> = self
            .selectors
            .review_cards
            .select_all(&document)
            .iter()
            .map(element_text)
            .filter(|text| text.contains("ID:") || text.contains('#'))
            .collect();

        info!("captured {} Zomato review cards for outlet {outlet_id}", blocks.len());
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complaint_id_variants() {
        assert_eq!(complaint_id_from("Complaint ID: 1234567890"), "1234567890");
        assert_eq!(complaint_id_from("ticket #778899 raised"), "778899");
        assert_eq!(complaint_id_from("no id in sight"), "");
    }

    #[test]
    fn report_urls_fall_back_in_order() {
        let scraper = ZomatoScraper::new("https://www.zomato.com", "", vec![]).unwrap();
        let urls = scraper.report_urls("20663");
        assert_eq!(urls.len(), 3);
        assert!(urls[0].contains("/partners/onlineordering/reporting/"));
        assert!(urls[2].ends_with("/partners/?resId=20663"));
    }
}
