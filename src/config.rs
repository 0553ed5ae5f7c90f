//! Runtime configuration, built once from the environment at process start
//! and passed by reference into everything that needs it.

use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset, Utc};
use std::env;

/// Worksheet (tab) names inside the shared spreadsheet.
#[derive(Debug, Clone)]
pub struct Worksheets {
    pub swiggy_metrics: String,
    pub zomato_metrics: String,
    pub swiggy_complaints: String,
    pub zomato_complaints: String,
    pub swiggy_reviews: String,
    pub zomato_reviews: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Tabular store
    pub spreadsheet_id: String,
    pub sheets_token: String,
    /// Override for the sheets API endpoint (local emulator in development).
    pub sheets_api_base: Option<String>,
    pub worksheets: Worksheets,

    // Text-generation extraction (optional; patterns-only without it)
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,

    // Partner portals
    pub swiggy_base_url: String,
    pub zomato_base_url: String,
    pub swiggy_session_cookie: String,
    pub zomato_session_cookie: String,
    pub swiggy_outlet_ids: Vec<String>,
    pub zomato_outlet_ids: Vec<String>,

    // Run control
    pub cron_schedule: String,
    pub dry_run: bool,
    /// dd/mm/yyyy override for backfills; otherwise yesterday in IST.
    pub report_date_override: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dry_run = matches!(
            env::var("DRY_RUN").unwrap_or_default().as_str(),
            "1" | "true" | "yes"
        );

        let (spreadsheet_id, sheets_token) = if dry_run {
            (String::new(), String::new())
        } else {
            (required_env("SPREADSHEET_ID")?, required_env("SHEETS_TOKEN")?)
        };

        Ok(Self {
            spreadsheet_id,
            sheets_token,
            sheets_api_base: env::var("SHEETS_API_BASE").ok().filter(|u| !u.is_empty()),
            worksheets: Worksheets {
                swiggy_metrics: optional_env("WORKSHEET_SWIGGY_METRICS", "Swiggy Live"),
                zomato_metrics: optional_env("WORKSHEET_ZOMATO_METRICS", "Zomato Live"),
                swiggy_complaints: optional_env("WORKSHEET_SWIGGY_COMPLAINTS", "Swiggy Complaints"),
                zomato_complaints: optional_env("WORKSHEET_ZOMATO_COMPLAINTS", "Zomato Complaints"),
                swiggy_reviews: optional_env("WORKSHEET_SWIGGY_REVIEWS", "Swiggy Reviews"),
                zomato_reviews: optional_env("WORKSHEET_ZOMATO_REVIEWS", "Zomato Order Data"),
            },
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            gemini_model: optional_env("GEMINI_MODEL", "gemini-1.5-flash"),
            swiggy_base_url: optional_env("SWIGGY_BASE_URL", "https://partner.swiggy.com"),
            zomato_base_url: optional_env("ZOMATO_BASE_URL", "https://www.zomato.com"),
            swiggy_session_cookie: env::var("SWIGGY_SESSION_COOKIE").unwrap_or_default(),
            zomato_session_cookie: env::var("ZOMATO_SESSION_COOKIE").unwrap_or_default(),
            swiggy_outlet_ids: id_list("SWIGGY_OUTLET_IDS"),
            zomato_outlet_ids: id_list("ZOMATO_OUTLET_IDS"),
            // 06:30 IST daily, after the previous day's report settles
            cron_schedule: optional_env("SYNC_CRON", "0 0 1 * * *"),
            dry_run,
            report_date_override: env::var("REPORT_DATE").ok().filter(|d| !d.is_empty()),
        })
    }

    /// Reporting date for metric rows: yesterday in IST unless overridden.
    pub fn report_date(&self) -> String {
        if let Some(date) = &self.report_date_override {
            return date.clone();
        }

        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("valid IST offset");
        let yesterday = Utc::now().with_timezone(&ist).date_naive() - Duration::days(1);
        yesterday.format("%d/%m/%Y").to_string()
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} environment variable is required"))
}

fn optional_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn id_list(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_date_override_wins() {
        let config = Config {
            spreadsheet_id: String::new(),
            sheets_token: String::new(),
            sheets_api_base: None,
            worksheets: Worksheets {
                swiggy_metrics: String::new(),
                zomato_metrics: String::new(),
                swiggy_complaints: String::new(),
                zomato_complaints: String::new(),
                swiggy_reviews: String::new(),
                zomato_reviews: String::new(),
            },
            gemini_api_key: None,
            gemini_model: String::new(),
            swiggy_base_url: String::new(),
            zomato_base_url: String::new(),
            swiggy_session_cookie: String::new(),
            zomato_session_cookie: String::new(),
            swiggy_outlet_ids: Vec::new(),
            zomato_outlet_ids: Vec::new(),
            cron_schedule: String::new(),
            dry_run: true,
            report_date_override: Some("01/08/2026".to_string()),
        };

        assert_eq!(config.report_date(), "01/08/2026");
    }
}
