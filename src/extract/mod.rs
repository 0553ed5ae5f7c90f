//! Unstructured-text-to-fields extraction.
//!
//! The captured portal text goes to a text-generation model with a schema
//! prompt; the response is treated as untrusted, fences stripped, JSON
//! parsed. Any failure along that path (service unreachable, bad JSON)
//! drops silently to the deterministic extractors in [`patterns`], which
//! report per-field missing values instead of erroring.

pub mod patterns;

use anyhow::{Result, anyhow};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::models::Platform;

/// Request-size cap for the text-generation service.
pub const MAX_PROMPT_CHARS: usize = 6000;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip optional markdown code fences from a model response.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(serde::Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

/// Gemini generateContent client.
struct GenClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GenClient {
    fn new(api_key: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        debug!(model = %self.model, "text-generation request");

        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("generation API error ({status}): {error_text}"));
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow!("generation response had no candidates"))
    }
}

/// Accept strings, numbers, or lists for a field the model may render
/// inconsistently ("Item Ordered" comes back as either).
fn flexible_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flatten_value(&value))
}

fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Fields extractable from one review card.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFields {
    #[serde(default, alias = "Order ID", deserialize_with = "flexible_string")]
    pub order_id: String,
    #[serde(default, alias = "Timestamp", deserialize_with = "flexible_string")]
    pub timestamp: String,
    #[serde(default, alias = "Outlet", deserialize_with = "flexible_string")]
    pub outlet: String,
    #[serde(default, alias = "Item Ordered", deserialize_with = "flexible_string")]
    pub items_ordered: String,
    #[serde(default, alias = "Rating", deserialize_with = "flexible_string")]
    pub rating: String,
    #[serde(default, alias = "Status", deserialize_with = "flexible_string")]
    pub status: String,
    #[serde(default, alias = "Customer Name", deserialize_with = "flexible_string")]
    pub customer_name: String,
    #[serde(default, alias = "Customer Info", deserialize_with = "flexible_string")]
    pub customer_info: String,
    #[serde(default, alias = "Total Orders (90d)", deserialize_with = "flexible_string")]
    pub orders_90d: String,
    #[serde(default, alias = "Order Value (90d)", deserialize_with = "flexible_string")]
    pub order_value_90d: String,
    #[serde(default, alias = "Complaints (90d)", deserialize_with = "flexible_string")]
    pub complaints_90d: String,
    #[serde(default, alias = "Delivery Remark", deserialize_with = "flexible_string")]
    pub delivery_remark: String,
}

/// Fields extractable from one complaint card.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplaintFields {
    #[serde(default, alias = "Outlet ID", deserialize_with = "flexible_string")]
    pub outlet_id: String,
    #[serde(default, alias = "Complaint ID", deserialize_with = "flexible_string")]
    pub complaint_id: String,
    #[serde(default, alias = "Status", deserialize_with = "flexible_string")]
    pub status: String,
    #[serde(default, alias = "Expiry", deserialize_with = "flexible_string")]
    pub expiry: String,
    #[serde(default, alias = "Reason", deserialize_with = "flexible_string")]
    pub reason: String,
    #[serde(default, alias = "Customer Name", deserialize_with = "flexible_string")]
    pub customer_name: String,
    #[serde(default, alias = "Customer History", deserialize_with = "flexible_string")]
    pub customer_history: String,
    #[serde(default, alias = "Description", deserialize_with = "flexible_string")]
    pub description: String,
    #[serde(default, alias = "Comment", deserialize_with = "flexible_string")]
    pub comment: String,
    #[serde(default, alias = "Resolution", deserialize_with = "flexible_string")]
    pub resolution: String,
    #[serde(default, alias = "Refund Amount", deserialize_with = "flexible_string")]
    pub refund_amount: String,
}

/// Extraction front door: model first when configured, patterns always as
/// the floor.
pub struct Extractor {
    client: Option<GenClient>,
}

impl Extractor {
    pub fn new(api_key: Option<&str>, model: &str) -> Self {
        let client = api_key
            .filter(|k| !k.is_empty())
            .map(|k| GenClient::new(k, model));
        Self { client }
    }

    /// Extract metric label → raw value pairs from dashboard text.
    pub async fn metrics(
        &self,
        platform: Platform,
        labels: &[&str],
        text: &str,
    ) -> BTreeMap<String, String> {
        if let Some(client) = &self.client {
            match Self::metrics_via_model(client, labels, text).await {
                Ok(metrics) => return metrics,
                Err(e) => warn!("model metric extraction failed, using patterns: {e}"),
            }
        }

        match platform {
            Platform::Swiggy => patterns::swiggy_metrics_fallback(text),
            Platform::Zomato => patterns::labelled_values_fallback(text, labels),
        }
    }

    async fn metrics_via_model(
        client: &GenClient,
        labels: &[&str],
        text: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut prompt = String::from(
            "Extract these metrics from the dashboard text below. Return ONLY a \
             JSON object with exactly these keys, each mapped to the bare number \
             or \"N/A\":\n",
        );
        for label in labels {
            let _ = writeln!(prompt, "- {label}");
        }
        prompt.push_str(
            "\nGuidelines:\n\
             - For monetary values like \"₹9,600\", return \"9600\" without currency or commas\n\
             - For percentages like \"85.0%\", return \"85.0\" without the % symbol\n\
             - For time values like \"12.5 min\", return \"12.5\" without the unit\n\
             - If a metric is not found, use \"N/A\"\n\n\
             Text to analyze:\n",
        );
        prompt.push_str(truncate_to_char_boundary(text, MAX_PROMPT_CHARS));

        let raw = client.generate(&prompt).await?;
        let parsed: BTreeMap<String, Value> = serde_json::from_str(strip_code_fences(&raw))?;
        Ok(parsed
            .into_iter()
            .map(|(label, value)| (label, flatten_value(&value)))
            .collect())
    }

    /// Extract one review's fields from captured card text.
    pub async fn review(&self, text: &str) -> ReviewFields {
        if let Some(client) = &self.client {
            let prompt = format!(
                "You are parsing customer review text from a food-delivery partner \
                 portal. Parse bottom-up, stopping at the first Order ID (a string \
                 starting with '#'), and extract only that review. Return a compact \
                 JSON object with these keys, empty string when absent: \
                 \"Order ID\", \"Timestamp\", \"Outlet\", \"Item Ordered\", \
                 \"Rating\", \"Status\", \"Customer Name\", \"Customer Info\", \
                 \"Total Orders (90d)\", \"Order Value (90d)\", \"Complaints (90d)\", \
                 \"Delivery Remark\". Do NOT use markdown or code block wrappers.\n\n\
                 Review Text:\n{}",
                truncate_to_char_boundary(text, MAX_PROMPT_CHARS)
            );

            match Self::fields_via_model::<ReviewFields>(client, &prompt).await {
                Ok(fields) => return fields,
                Err(e) => warn!("model review extraction failed, using patterns: {e}"),
            }
        }

        patterns::review_fallback(text)
    }

    /// Extract one complaint's fields from captured card text.
    pub async fn complaint(&self, text: &str) -> ComplaintFields {
        if let Some(client) = &self.client {
            let prompt = format!(
                "You are parsing one complaint card from a food-delivery partner \
                 portal. Focus only on the currently displayed complaint. Return a \
                 compact JSON object with these keys, empty string when absent: \
                 \"Outlet ID\", \"Complaint ID\", \"Status\", \"Expiry\", \"Reason\", \
                 \"Customer Name\", \"Customer History\", \"Description\", \
                 \"Comment\", \"Resolution\", \"Refund Amount\". For \"Refund \
                 Amount\" extract only the amount. For \"Complaint ID\" extract only \
                 the ID number. Do NOT use markdown or code block wrappers.\n\n\
                 Raw Complaint Text:\n{}",
                truncate_to_char_boundary(text, MAX_PROMPT_CHARS)
            );

            match Self::fields_via_model::<ComplaintFields>(client, &prompt).await {
                Ok(fields) => return fields,
                Err(e) => warn!("model complaint extraction failed, using patterns: {e}"),
            }
        }

        patterns::complaint_fallback(text)
    }

    async fn fields_via_model<T: serde::de::DeserializeOwned>(
        client: &GenClient,
        prompt: &str,
    ) -> Result<T> {
        let raw = client.generate(prompt).await?;
        Ok(serde_json::from_str(strip_code_fences(&raw))?)
    }
}

const IST_OFFSET_MINUTES: i64 = 5 * 60 + 30;

/// Shift a portal timestamp like "Jul 19, 10:59 PM" from UTC to IST. The
/// portal renders review times in UTC without a year; unparsable input is
/// passed through unchanged.
pub fn adjust_to_ist(timestamp: &str) -> String {
    let trimmed = timestamp.trim();

    // yearless portal format; pin a leap year so Feb 29 survives
    if let Ok(parsed) = NaiveDateTime::parse_from_str(&format!("2024 {trimmed}"), "%Y %b %d, %I:%M %p")
    {
        let adjusted = parsed + Duration::minutes(IST_OFFSET_MINUTES);
        return adjusted.format("%b %-d, %-I:%M %p").to_string();
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%b %d, %Y %I:%M %p") {
        let adjusted = parsed + Duration::minutes(IST_OFFSET_MINUTES);
        return adjusted.format("%b %-d, %Y %-I:%M %p").to_string();
    }

    timestamp.to_string()
}

/// Parse a complaint expiry like "25 Jul, 02:30 PM" or "2025-07-27 14:30"
/// into the sheet's (dd/mm/yyyy, HH:MM) pair.
pub fn parse_expiry(raw: &str) -> Option<(String, String)> {
    let trimmed = raw.trim();
    let year = Utc::now().format("%Y").to_string();

    let attempts = [
        (trimmed.to_string(), "%Y-%m-%d %H:%M"),
        (trimmed.to_string(), "%d %b %Y, %I:%M %p"),
        (format!("{trimmed} {year}"), "%d %b, %I:%M %p %Y"),
        (format!("{trimmed} {year}"), "%b %d, %I:%M %p %Y"),
    ];

    for (candidate, format) in &attempts {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(candidate, format) {
            return Some((
                parsed.format("%d/%m/%Y").to_string(),
                parsed.format("%H:%M").to_string(),
            ));
        }
    }

    // date-only fallback, midnight expiry
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = parsed.and_time(NaiveTime::MIN);
        return Some((
            midnight.format("%d/%m/%Y").to_string(),
            midnight.format("%H:%M").to_string(),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_char_boundary() {
        let text = "metrics ₹₹₹";
        let truncated = truncate_to_char_boundary(text, 10);
        assert!(truncated.len() <= 10);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_within_bounds() {
        assert_eq!(truncate_to_char_boundary("short", 100), "short");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");
    }

    #[test]
    fn review_fields_accept_model_variants() {
        let json = r##"{
            "Order ID": "#123-456",
            "Timestamp": "Jul 19, 10:59 PM",
            "Item Ordered": ["Sandwich", "Tub"],
            "Rating": 4,
            "Total Orders (90d)": 12,
            "debug_context": "ignored"
        }"##;

        let fields: ReviewFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.order_id, "#123-456");
        assert_eq!(fields.items_ordered, "Sandwich, Tub");
        assert_eq!(fields.rating, "4");
        assert_eq!(fields.orders_90d, "12");
        assert_eq!(fields.customer_name, "");
    }

    #[test]
    fn complaint_fields_accept_model_output() {
        let json = r#"{"Complaint ID": "778899", "Status": "UNRESOLVED", "Refund Amount": "₹180"}"#;
        let fields: ComplaintFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.complaint_id, "778899");
        assert_eq!(fields.refund_amount, "₹180");
        assert_eq!(fields.expiry, "");
    }

    #[test]
    fn ist_adjustment_shifts_five_thirty() {
        assert_eq!(adjust_to_ist("Jul 19, 10:59 PM"), "Jul 20, 4:29 AM");
        assert_eq!(adjust_to_ist("Jul 19, 10:00 AM"), "Jul 19, 3:30 PM");
    }

    #[test]
    fn ist_adjustment_passes_through_garbage() {
        assert_eq!(adjust_to_ist("yesterday-ish"), "yesterday-ish");
    }

    #[test]
    fn expiry_formats() {
        assert_eq!(
            parse_expiry("2025-07-27 14:30"),
            Some(("27/07/2025".to_string(), "14:30".to_string()))
        );
        assert_eq!(
            parse_expiry("27 Jul 2025, 02:30 PM"),
            Some(("27/07/2025".to_string(), "14:30".to_string()))
        );
        assert_eq!(parse_expiry("no date here"), None);
    }

    #[test]
    fn extractor_without_key_uses_patterns() {
        let extractor = Extractor::new(None, "gemini-1.5-flash");
        assert!(extractor.client.is_none());
    }
}
