use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dedup::{AppendGate, AppendOutcome, DedupIndex};
use crate::extract::{Extractor, adjust_to_ist, parse_expiry};
use crate::models::{ComplaintRecord, MetricRecord, ReviewRecord, SheetRecord};
use crate::normalize::{NormalizedValue, UnitHint, hint_for_label, normalize};
use crate::scrapers::swiggy::SwiggyScraper;
use crate::scrapers::zomato::ZomatoScraper;
use crate::sheets::{MemoryStore, SheetsClient, TabularStore};
use crate::traits::DashboardScraper;

/// Orchestrates one full sync: for each platform and record category, load
/// the dedup baseline, scrape, extract, normalize, and offer rows to the
/// append gate. Units that fail are skipped and logged; an unreachable store
/// aborts the run, since appends without a baseline would duplicate history.
#[derive(Clone)]
pub struct OutletPulse {
    config: Arc<Config>,
    store: Arc<dyn TabularStore>,
    extractor: Arc<Extractor>,
    swiggy: Arc<SwiggyScraper>,
    zomato: Arc<ZomatoScraper>,
}

impl OutletPulse {
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn TabularStore> = if config.dry_run {
            info!("dry run: rows go to an in-memory store");
            Arc::new(MemoryStore::new())
        } else {
            let mut client = SheetsClient::new(&config.spreadsheet_id, &config.sheets_token);
            if let Some(base) = &config.sheets_api_base {
                client = client.with_base_url(base);
            }
            Arc::new(client)
        };

        let extractor = Arc::new(Extractor::new(
            config.gemini_api_key.as_deref(),
            &config.gemini_model,
        ));

        let swiggy = Arc::new(SwiggyScraper::new(
            &config.swiggy_base_url,
            &config.swiggy_session_cookie,
            config.swiggy_outlet_ids.clone(),
        )?);
        let zomato = Arc::new(ZomatoScraper::new(
            &config.zomato_base_url,
            &config.zomato_session_cookie,
            config.zomato_outlet_ids.clone(),
        )?);

        Ok(Self {
            config: Arc::new(config),
            store,
            extractor,
            swiggy,
            zomato,
        })
    }

    pub async fn run_once(&self) -> Result<()> {
        let report_date = self.config.report_date();
        let sheets = &self.config.worksheets;

        self.sync_metrics(&*self.swiggy, &sheets.swiggy_metrics, &report_date)
            .await?;
        self.sync_metrics(&*self.zomato, &sheets.zomato_metrics, &report_date)
            .await?;
        self.sync_complaints(&*self.swiggy, &sheets.swiggy_complaints)
            .await?;
        self.sync_complaints(&*self.zomato, &sheets.zomato_complaints)
            .await?;
        self.sync_reviews(&*self.swiggy, &sheets.swiggy_reviews).await?;
        self.sync_reviews(&*self.zomato, &sheets.zomato_reviews).await?;

        Ok(())
    }

    async fn sync_metrics(
        &self,
        scraper: &dyn DashboardScraper,
        worksheet: &str,
        report_date: &str,
    ) -> Result<()> {
        let platform = scraper.config().platform;
        info!(
            "Syncing {} metrics for {report_date} into '{worksheet}'",
            scraper.config().name
        );

        let index = DedupIndex::load(&*self.store, worksheet, MetricRecord::KEY_COLUMNS)
            .await
            .with_context(|| format!("loading dedup baseline for '{worksheet}'"))?;
        if index.is_empty() {
            info!("'{worksheet}' has no rows yet");
        }
        let mut gate = AppendGate::new(&*self.store, worksheet, index);

        let mut appended = 0;
        for outlet_id in &scraper.config().outlet_ids {
            let text = match scraper.metrics_text(outlet_id).await {
                Ok(text) => text,
                Err(e) => {
                    error!("Skipping {platform} outlet {outlet_id}: {e}");
                    continue;
                }
            };

            let Ok(outlet_num) = outlet_id.parse::<i64>() else {
                warn!("Outlet id {outlet_id} is not numeric, skipping");
                continue;
            };

            let metrics = self
                .extractor
                .metrics(platform, scraper.metric_labels(), &text)
                .await;

            for (label, raw_value) in metrics {
                let value = normalize(&raw_value, hint_for_label(&label));
                let record = MetricRecord {
                    report_date: report_date.to_string(),
                    outlet_id: outlet_num,
                    metric_label: label,
                    value,
                    platform,
                };

                match gate.offer(&record).await {
                    Ok(AppendOutcome::Appended) => appended += 1,
                    Ok(_) => {}
                    Err(e) => error!(
                        "Metric append failed for {platform} outlet {outlet_id} ({}): {e}",
                        record.metric_label
                    ),
                }
            }
        }

        if appended > 0 {
            info!(
                "Wrote {appended} new {platform} metric rows ({} keys tracked)",
                gate.index().len()
            );
        } else {
            info!("No new {platform} metric rows");
        }
        Ok(())
    }

    async fn sync_complaints(
        &self,
        scraper: &dyn DashboardScraper,
        worksheet: &str,
    ) -> Result<()> {
        let platform = scraper.config().platform;
        info!(
            "Syncing {} complaints into '{worksheet}'",
            scraper.config().name
        );

        let index = DedupIndex::load(&*self.store, worksheet, ComplaintRecord::KEY_COLUMNS)
            .await
            .with_context(|| format!("loading dedup baseline for '{worksheet}'"))?;
        let mut gate = AppendGate::new(&*self.store, worksheet, index);

        let blocks = match scraper.complaint_blocks().await {
            Ok(blocks) => blocks,
            Err(e) => {
                error!("{platform} complaints scrape failed: {e}");
                return Ok(());
            }
        };

        let mut appended = 0;
        for block in blocks {
            let fields = self.extractor.complaint(&block.text).await;

            // page-level id beats whatever extraction produced
            let complaint_id = if block.complaint_id.is_empty() {
                fields.complaint_id.clone()
            } else {
                block.complaint_id.clone()
            };

            let (expiry_date, expiry_time) = match parse_expiry(&fields.expiry) {
                Some(parsed) => parsed,
                None => {
                    if !fields.expiry.is_empty() {
                        warn!("Unparsable expiry {:?} on complaint {complaint_id}", fields.expiry);
                    }
                    (String::new(), String::new())
                }
            };

            // Zomato reports "requested" instead of an amount until support
            // acts on the complaint; carry that through as text
            let refund = normalize(&fields.refund_amount, UnitHint::Currency);
            let refund_amount = if refund.is_missing() && !fields.refund_amount.is_empty() {
                NormalizedValue::text(fields.refund_amount.as_str())
            } else {
                refund
            };

            let record = ComplaintRecord {
                outlet_id: fields.outlet_id,
                complaint_id,
                status: fields.status,
                expiry_date,
                expiry_time,
                reason: fields.reason,
                customer_name: fields.customer_name,
                customer_history: fields.customer_history,
                description: fields.description,
                comment: fields.comment,
                resolution: fields.resolution,
                refund_amount,
                image_link: block.image_url,
            };

            match gate.offer(&record).await {
                Ok(AppendOutcome::Appended) => appended += 1,
                Ok(_) => {}
                Err(e) => error!(
                    "Complaint append failed for {platform} id {}: {e}",
                    record.complaint_id
                ),
            }
        }

        if appended > 0 {
            info!("Wrote {appended} new {platform} complaints");
        } else {
            info!("No new {platform} complaints");
        }
        Ok(())
    }

    async fn sync_reviews(&self, scraper: &dyn DashboardScraper, worksheet: &str) -> Result<()> {
        let platform = scraper.config().platform;
        info!(
            "Syncing {} reviews into '{worksheet}'",
            scraper.config().name
        );

        let index = DedupIndex::load(&*self.store, worksheet, ReviewRecord::KEY_COLUMNS)
            .await
            .with_context(|| format!("loading dedup baseline for '{worksheet}'"))?;
        let mut gate = AppendGate::new(&*self.store, worksheet, index);

        let mut appended = 0;
        for outlet_id in &scraper.config().outlet_ids {
            let blocks = match scraper.review_blocks(outlet_id).await {
                Ok(blocks) => blocks,
                Err(e) => {
                    error!("Skipping {platform} reviews for outlet {outlet_id}: {e}");
                    continue;
                }
            };

            for block in blocks {
                let fields = self.extractor.review(&block).await;

                let outlet_name = if fields.outlet.is_empty() {
                    outlet_id.clone()
                } else {
                    fields.outlet
                };

                let record = ReviewRecord {
                    order_id: fields.order_id,
                    timestamp: adjust_to_ist(&fields.timestamp),
                    outlet_name,
                    items_ordered: fields.items_ordered,
                    rating: normalize(&fields.rating, UnitHint::None),
                    status: fields.status,
                    customer_name: fields.customer_name,
                    customer_info: fields.customer_info,
                    orders_90d: normalize(&fields.orders_90d, UnitHint::None),
                    order_value_90d: normalize(&fields.order_value_90d, UnitHint::Currency),
                    complaints_90d: normalize(&fields.complaints_90d, UnitHint::None),
                    delivery_remark: fields.delivery_remark,
                };

                match gate.offer(&record).await {
                    Ok(AppendOutcome::Appended) => appended += 1,
                    Ok(_) => {}
                    Err(e) => error!(
                        "Review append failed for {platform} order {}: {e}",
                        record.order_id
                    ),
                }
            }
        }

        if appended > 0 {
            info!("Wrote {appended} new {platform} reviews");
        } else {
            info!("No new {platform} reviews");
        }
        Ok(())
    }
}
