//! Deterministic pattern extractors.
//!
//! These are the fallback path when the text-generation service is
//! unreachable or returns something unparsable. Each extractor reports
//! per-field "N/A" / empty rather than failing, so a messy page never aborts
//! a batch.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::{ComplaintFields, ReviewFields};

/// Metric labels on the Swiggy business-metrics dashboard.
pub const SWIGGY_METRIC_LABELS: &[&str] = &[
    "Delivered Orders",
    "Cancelled Orders",
    "Rated Orders",
    "Poor Rated Orders",
    "% of Bolt Orders",
    "Impressions",
    "Menu Opens",
    "Cart Builds",
    "Orders Placed",
    "New Customers",
    "Repeat Customers",
    "Dormant Customers",
    "New Customer Order %",
    "Dormant Customer Order %",
    "Ad Orders",
    "CPC Menu Visits",
    "Total Spends",
    "CBA Impressions",
    "CBA Menu Visits",
    "Online %",
    "Kitchen Prep Time",
    "Food Ready Accuracy (MFR)",
    "Delayed Orders (> 10 mins)",
];

/// Metric labels in the Zomato reporting table.
pub const ZOMATO_METRIC_LABELS: &[&str] = &[
    "Delivered orders",
    "Market share",
    "Average rating",
    "Rated orders",
    "Bad orders",
    "Rejected orders",
    "Delayed orders",
    "Poor rated orders",
    "Total complaints",
    "Online %",
    "Offline time",
    "Kitchen preparation time",
    "Food order ready accuracy",
    "Impressions",
    "Impressions to menu",
    "Menu to order",
    "Menu to cart",
    "Cart to order",
    "New users",
    "Repeat users",
    "Lapsed users",
    "Ads orders",
];

fn rx(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("invalid metric pattern"))
        .collect()
}

/// Ordered alternative patterns per Swiggy metric label. Dashboard copy
/// drifts, so each label carries the variants seen so far; first match wins.
static SWIGGY_METRIC_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            "Delivered Orders",
            rx(&[
                r"Delivered Orders[:\s]*(\d+)",
                r"Orders Delivered[:\s]*(\d+)",
                r"Delivered[:\s]*(\d+)",
            ]),
        ),
        (
            "Cancelled Orders",
            rx(&[
                r"Cancelled Orders[:\s]*(\d+)",
                r"Orders Cancelled[:\s]*(\d+)",
                r"Cancelled[:\s]*(\d+)",
            ]),
        ),
        (
            "Rated Orders",
            rx(&[r"Rated Orders[:\s]*(\d+)", r"Orders Rated[:\s]*(\d+)"]),
        ),
        (
            "Poor Rated Orders",
            rx(&[
                r"Poor Rated Orders[:\s]*(\d+)",
                r"Poor Rating Orders[:\s]*(\d+)",
            ]),
        ),
        (
            "% of Bolt Orders",
            rx(&[
                r"% of Bolt Orders[:\s]*([\d.]+%?)",
                r"Bolt Orders %[:\s]*([\d.]+%?)",
                r"Bolt[:\s]*([\d.]+%)",
            ]),
        ),
        (
            "Impressions",
            rx(&[
                r"IMPRESSIONS[:\s]+(\d+)",
                r"Impressions[:\s]+(\d+)",
                r"Total Impressions[:\s]+(\d+)",
            ]),
        ),
        (
            "Menu Opens",
            rx(&[r"MENU OPENS[:\s]+(\d+)", r"Menu Opens[:\s]+(\d+)"]),
        ),
        (
            "Cart Builds",
            rx(&[r"CART BUILDS[:\s]+(\d+)", r"Cart Builds[:\s]+(\d+)"]),
        ),
        (
            "Orders Placed",
            rx(&[r"ORDERS PLACED[:\s]+(\d+)", r"Orders Placed[:\s]+(\d+)"]),
        ),
        (
            "New Customers",
            rx(&[r"New Customers[:\s]+(\d+)", r"New Customer[:\s]+(\d+)"]),
        ),
        (
            "Repeat Customers",
            rx(&[
                r"Repeat Customers[:\s]+(\d+)",
                r"Returning Customers[:\s]+(\d+)",
            ]),
        ),
        (
            "Dormant Customers",
            rx(&[
                r"Dormant Customers[:\s]+(\d+)",
                r"Inactive Customers[:\s]+(\d+)",
            ]),
        ),
        (
            "New Customer Order %",
            rx(&[r"New Customer Order %[:\s]*([\d.]+%?)"]),
        ),
        (
            "Dormant Customer Order %",
            rx(&[r"Dormant Customer Order %[:\s]*([\d.]+%?)"]),
        ),
        (
            "Ad Orders",
            rx(&[
                r"CPC ADS Orders[:\s]+(\d+)",
                r"Ad Orders[:\s]+(\d+)",
                r"Ads Orders[:\s]+(\d+)",
            ]),
        ),
        (
            "CPC Menu Visits",
            rx(&[r"CPC Menu Visits[:\s]+(\d+)", r"Menu Visits[:\s]+(\d+)"]),
        ),
        (
            "Total Spends",
            rx(&[
                r"Total Spends[:\s]*₹?([\d,]+)",
                r"CPC Spends[:\s]*₹?([\d,]+)",
                r"Ad Spends[:\s]*₹?([\d,]+)",
            ]),
        ),
        (
            "CBA Impressions",
            rx(&[r"CBA Impressions[:\s]+(\d+)", r"Ad Impressions[:\s]+(\d+)"]),
        ),
        ("CBA Menu Visits", rx(&[r"CBA Menu Visits[:\s]+(\d+)"])),
        (
            "Online %",
            rx(&[r"Online %[:\s]*([\d.]+%?)", r"Online[:\s]+([\d.]+%)"]),
        ),
        (
            "Kitchen Prep Time",
            rx(&[
                r"Kitchen Prep Time[:\s]*([\d.]+)\s*min",
                r"Prep Time[:\s]*([\d.]+)\s*min",
            ]),
        ),
        (
            "Food Ready Accuracy (MFR)",
            rx(&[
                r"Food Ready Accuracy \(MFR\)[:\s]*([\d.]+%?)",
                r"Food Ready Accuracy[:\s]*([\d.]+%?)",
                r"MFR Accuracy[:\s]*([\d.]+%?)",
            ]),
        ),
        (
            "Delayed Orders (> 10 mins)",
            rx(&[
                r"Delayed Orders \(> 10 mins\)[:\s]*([\d.]+%?)",
                r"Delayed Orders[:\s]*([\d.]+%?)",
            ]),
        ),
    ]
});

/// Extract every Swiggy metric via the ordered pattern lists.
pub fn swiggy_metrics_fallback(text: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for (label, patterns) in SWIGGY_METRIC_PATTERNS.iter() {
        let value = patterns
            .iter()
            .find_map(|p| p.captures(text))
            .map(|cap| cap[1].to_string())
            .unwrap_or_else(|| "N/A".to_string());
        result.insert((*label).to_string(), value);
    }
    result
}

static REPORT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d,.]+%?|₹[\d,.]+").expect("invalid number pattern"));

/// Extract labelled values from a report laid out as label-then-value-lines
/// (the Zomato reporting table renders this way as flat text). The first
/// number after the label is the current reporting column.
pub fn labelled_values_fallback(text: &str, labels: &[&str]) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for label in labels {
        let pattern = Regex::new(&format!(r"(?i){}\s*\n((?:.*\n)+?)\n", regex::escape(label)))
            .expect("invalid label pattern");
        let value = match pattern.captures(text) {
            Some(cap) => REPORT_NUMBER
                .find(&cap[1])
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            None => "Not found".to_string(),
        };
        result.insert((*label).to_string(), value);
    }
    result
}

// Lines that look like order items rather than a customer name.
const ITEM_KEYWORDS: &[&str] = &[
    " x ", "gm", "ml", "scoop", "pack", "addon", "item", "pcs", "qty",
];

const CUSTOMER_TYPE_KEYWORDS: &[&str] = &[
    "HIGH VALUE CUSTOMER",
    "LOW VALUE CUSTOMER",
    "NEW CUSTOMER",
    "REPEAT CUSTOMER",
];

fn looks_like_item(line: &str) -> bool {
    let lower = line.to_lowercase();
    ITEM_KEYWORDS.iter().any(|k| lower.contains(k))
}

static QUOTED_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{201c}\"]([^\u{201d}\"]+)[\u{201d}\"]").expect("invalid comment pattern"));
static REFUND_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"₹[\d,]+").expect("invalid refund pattern"));
static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("invalid id pattern"));

/// Walk a complaint card's text and pick fields out positionally.
pub fn complaint_fallback(text: &str) -> ComplaintFields {
    let raw_lines: Vec<&str> = text.lines().collect();
    let lines: Vec<&str> = raw_lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut fields = ComplaintFields::default();

    fields.status = if lines.iter().any(|l| l.contains("UNRESOLVED")) {
        "UNRESOLVED".to_string()
    } else if lines.iter().any(|l| l.contains("EXPIRED")) {
        "EXPIRED".to_string()
    } else {
        String::new()
    };

    let expiry_index = lines.iter().position(|l| l.starts_with("Expires on"));
    if let Some(idx) = expiry_index {
        fields.expiry = lines[idx].trim_start_matches("Expires on").trim().to_string();

        // reason line plus any item lines under it
        let mut reason_lines = Vec::new();
        if let Some(reason) = lines.get(idx + 1) {
            reason_lines.push(*reason);
        }
        let mut i = idx + 2;
        while i < lines.len() && looks_like_item(lines[i]) {
            reason_lines.push(lines[i]);
            i += 1;
        }
        fields.reason = reason_lines.join("\n");

        // first short non-item line after the items is the customer
        while i < lines.len() {
            if !looks_like_item(lines[i]) && lines[i].split_whitespace().count() <= 4 {
                fields.customer_name = lines[i].to_string();
                break;
            }
            i += 1;
        }
    }

    if let Some(type_index) = lines
        .iter()
        .position(|l| CUSTOMER_TYPE_KEYWORDS.iter().any(|k| l.contains(k)))
    {
        fields.description = lines[type_index].to_string();
        fields.customer_history = lines[type_index + 1..]
            .iter()
            .take(3)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
    }

    if let Some(cap) = QUOTED_COMMENT.captures(text) {
        fields.comment = cap[1].to_string();
    }

    if let Some(res_index) = lines.iter().position(|l| *l == "RESOLUTION")
        && let Some(resolution) = lines.get(res_index + 1)
    {
        fields.resolution = (*resolution).to_string();
    }

    if let Some(refund_line) = lines.iter().find(|l| l.contains("Recommended Refund Amount"))
        && let Some(m) = REFUND_AMOUNT.find(refund_line)
    {
        fields.refund_amount = m.as_str().to_string();
    }

    // outlet id sits on the line above the last UNRESOLVED badge
    if let Some(last_unresolved) = raw_lines.iter().rposition(|l| l.contains("UNRESOLVED"))
        && last_unresolved > 0
        && let Some(m) = BARE_NUMBER.find(raw_lines[last_unresolved - 1])
    {
        fields.outlet_id = m.as_str().to_string();
    }

    fields
}

static ORDER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[\w-]+").expect("invalid order id pattern"));
static CARD_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z][a-z]{2} \d{1,2}, \d{1,2}:\d{2} [AP]M").expect("invalid timestamp pattern")
});
static LONE_RATING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([1-5])\s*$").expect("invalid rating pattern"));

/// Walk a review card's text bottom-up from the last order id.
pub fn review_fallback(text: &str) -> ReviewFields {
    let mut fields = ReviewFields::default();

    // the newest review sits at the bottom of the captured text
    let Some(id_match) = ORDER_ID.find_iter(text).last() else {
        return fields;
    };
    fields.order_id = id_match.as_str().to_string();
    let card = &text[id_match.start()..];

    if let Some(m) = CARD_TIMESTAMP.find(card) {
        fields.timestamp = m.as_str().to_string();
    }
    if let Some(cap) = LONE_RATING.captures(card) {
        fields.rating = cap[1].to_string();
    }
    if card.contains("UNRESOLVED") {
        fields.status = "UNRESOLVED".to_string();
    } else if card.contains("EXPIRED") {
        fields.status = "EXPIRED".to_string();
    }
    if let Some(cap) = QUOTED_COMMENT.captures(card) {
        fields.delivery_remark = cap[1].to_string();
    }

    let lines: Vec<&str> = card
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for (i, line) in lines.iter().enumerate() {
        if line.contains("New Customer") || line.contains("Repeat Customer") {
            fields.customer_info = (*line).to_string();
            // name is printed directly above the customer tag
            if i > 0 && fields.customer_name.is_empty() {
                fields.customer_name = lines[i - 1].to_string();
            }
        }
        if line.contains("Orders & Complaints are based on the last 90 days")
            && let Some(outlet) = lines.get(i + 1)
        {
            fields.outlet = (*outlet).to_string();
        }
        if line.starts_with("Orders")
            && !line.contains("based on")
            && let Some(m) = BARE_NUMBER.find(line)
        {
            fields.orders_90d = m.as_str().to_string();
        }
        if line.starts_with("Complaints")
            && let Some(m) = BARE_NUMBER.find(line)
        {
            fields.complaints_90d = m.as_str().to_string();
        }
        if line.contains("Bill Total")
            && let Some(next) = lines.get(i + 1)
        {
            fields.order_value_90d = (*next).to_string();
        }
        if line.contains("delivered") && fields.delivery_remark.is_empty() {
            fields.delivery_remark = (*line).to_string();
        }
    }

    // first item line under the order id
    if let Some(item) = lines.iter().skip(1).find(|l| looks_like_item(l)) {
        fields.items_ordered = (*item).to_string();
    }

    fields
}
