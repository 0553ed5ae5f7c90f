//! Swiggy partner-portal scraper.

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use tracing::info;

use crate::error::ScrapeError;
use crate::extract::patterns::SWIGGY_METRIC_LABELS;
use crate::models::Platform;
use crate::traits::{ComplaintBlock, DashboardScraper, PortalConfig, SelectorChain, element_text};

use super::{build_client, fetch_text};

static COMPLAINT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\d+").expect("invalid complaint id pattern"));

struct SwiggySelectors {
    metrics_panel: SelectorChain,
    complaint_cards: SelectorChain,
    complaint_image: SelectorChain,
    review_cards: SelectorChain,
}

pub struct SwiggyScraper {
    client: reqwest::Client,
    config: PortalConfig,
    selectors: SwiggySelectors,
}

impl SwiggyScraper {
    pub fn new(
        base_url: &str,
        session_cookie: &str,
        outlet_ids: Vec<String>,
    ) -> anyhow::Result<Self> {
        let config = PortalConfig {
            name: "Swiggy Partner".to_string(),
            platform: Platform::Swiggy,
            base_url: base_url.trim_end_matches('/').to_string(),
            outlet_ids,
        };

        // the dashboard is a micro-frontend; class names churn, ids less so
        let selectors = SwiggySelectors {
            metrics_panel: SelectorChain::parse(
                "swiggy metrics panel",
                &["[class*='metric']", "#mfe-root", "main", "body"],
            )?,
            complaint_cards: SelectorChain::parse(
                "swiggy complaint cards",
                &[
                    "[class*='complaint-card']",
                    "[class*='complaint']",
                    "div[class*='card']",
                ],
            )?,
            complaint_image: SelectorChain::parse("swiggy complaint image", &["div img", "img"])?,
            review_cards: SelectorChain::parse(
                "swiggy review cards",
                &[
                    "[class*='review-card']",
                    "[class*='rating-card']",
                    "[class*='review']",
                ],
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
}

#[async_trait]
impl DashboardScraper for SwiggyScraper {
    fn config(&self) -> &PortalConfig {
        &self.config
    }

    fn metric_labels(&self) -> &'static [&'static str] {
        SWIGGY_METRIC_LABELS
    }

    async fn metrics_text(&self, outlet_id: &str) -> Result<String, ScrapeError> {
        let url = format!(
            "{}/business-metrics/overview/restaurant/{outlet_id}",
            self.config.base_url
        );
        let body = fetch_text(&self.client, &url).await?;

        let document = Html::parse_document(&body);
        self.selectors.metrics_panel.text_of(&document)
    }

    async fn complaint_blocks(&self) -> Result<Vec<ComplaintBlock>, ScrapeError> {
        let url = format!("{}/complaints/", self.config.base_url);
        let body = fetch_text(&self.client, &url).await?;

        let document = Html::parse_document(&body);
        let cards = self.selectors.complaint_cards.select_all(&document);

        let mut blocks = Vec::new();
        for card in cards {
            let text = element_text(&card);
            if !text.contains("Resolve this complaint") && !text.contains("UNRESOLVED") {
                continue;
            }

            let complaint_id = COMPLAINT_ID
                .find(&text)
                .map(|m| m.as_str().trim_start_matches('#').to_string())
                .unwrap_or_default();

            let image_url = self
                .selectors
                .complaint_image
                .select_first_in(card)
                .and_then(|img| img.value().attr("src"))
                .unwrap_or_default()
                .to_string();

            blocks.push(ComplaintBlock {
                complaint_id,
                text,
                image_url,
            });
        }

        info!("captured {} Swiggy complaint cards", blocks.len());
        Ok(blocks)
    }

    async fn review_blocks(&self, outlet_id: &str) -> Result<Vec<String>, ScrapeError> {
        let url = format!(
            "{}/business-metrics/customer-ratings?restaurantId={}",
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
            .filter(|text| text.contains('#'))
            .collect();

        info!("captured {} Swiggy review cards for outlet {outlet_id}", blocks.len());
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> SwiggyScraper {
        SwiggyScraper::new(
            "https://partner.swiggy.com/",
            "",
            vec!["121907".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(scraper().config().base_url, "https://partner.swiggy.com");
    }

    #[test]
    fn complaint_cards_are_parsed_from_markup() {
        let page = r#"
            <html><body>
                <div class="complaint-card">
                    <img src="https://cdn.example/photo.jpg"/>
                    <p>#778899</p>
                    <p>UNRESOLVED</p>
                    <p>Resolve this complaint</p>
                </div>
                <div class="complaint-card">
                    <p>promo banner, no complaint here</p>
                </div>
            </body></html>
        "#;

        let s = scraper();
        let document = Html::parse_document(page);
        let cards = s.selectors.complaint_cards.select_all(&document);
        assert_eq!(cards.len(), 2);

        let text = element_text(&cards[0]);
        assert_eq!(
            COMPLAINT_ID.find(&text).unwrap().as_str().trim_start_matches('#'),
            "778899"
        );
        let image = s
            .selectors
            .complaint_image
            .select_first_in(cards[0])
            .and_then(|img| img.value().attr("src"))
            .unwrap();
        assert_eq!(image, "https://cdn.example/photo.jpg");
    }
}
