//! Record types for the three sheet-backed categories.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::normalize::NormalizedValue;

/// Source platform a record was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Swiggy,
    Zomato,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Swiggy => "Swiggy",
            Self::Zomato => "Zomato",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record category that can be appended to a worksheet.
///
/// `KEY_COLUMNS` are the zero-based positions of the natural-key field(s) in
/// the stored row, in the same order `key_fields` returns them. The dedup
/// index loader uses the former on historical rows, the append gate uses the
/// latter on candidates, and both must hash identically.
pub trait SheetRecord {
    /// Column positions of the natural key in the stored row.
    const KEY_COLUMNS: &'static [usize];

    /// Natural-key field values, in `KEY_COLUMNS` order.
    fn key_fields(&self) -> Vec<String>;

    /// The row in the worksheet's fixed column order.
    fn to_row(&self) -> Vec<Value>;
}

/// One metric observation: one outlet, one reporting date, one label.
#[derive(Debug, Clone)]
pub struct MetricRecord {
    pub report_date: String,
    pub outlet_id: i64,
    pub metric_label: String,
    pub value: NormalizedValue,
    pub platform: Platform,
}

impl SheetRecord for MetricRecord {
    // outlet + label + date together identify an observation
    const KEY_COLUMNS: &'static [usize] = &[1, 2, 0];

    fn key_fields(&self) -> Vec<String> {
        vec![
            self.outlet_id.to_string(),
            self.metric_label.clone(),
            self.report_date.clone(),
        ]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.report_date.as_str()),
            Value::from(self.outlet_id),
            Value::from(self.metric_label.as_str()),
            self.value.to_cell(),
            Value::from(self.platform.as_str()),
        ]
    }
}

/// One customer complaint card.
#[derive(Debug, Clone, Default)]
pub struct ComplaintRecord {
    pub outlet_id: String,
    pub complaint_id: String,
    pub status: String,
    pub expiry_date: String,
    pub expiry_time: String,
    pub reason: String,
    pub customer_name: String,
    pub customer_history: String,
    pub description: String,
    pub comment: String,
    pub resolution: String,
    pub refund_amount: NormalizedValue,
    pub image_link: String,
}

impl SheetRecord for ComplaintRecord {
    const KEY_COLUMNS: &'static [usize] = &[1];

    fn key_fields(&self) -> Vec<String> {
        vec![self.complaint_id.clone()]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.outlet_id.as_str()),
            Value::from(self.complaint_id.as_str()),
            Value::from(self.status.as_str()),
            Value::from(self.expiry_date.as_str()),
            Value::from(self.expiry_time.as_str()),
            Value::from(self.reason.as_str()),
            Value::from(self.customer_name.as_str()),
            Value::from(self.customer_history.as_str()),
            Value::from(self.description.as_str()),
            Value::from(self.comment.as_str()),
            Value::from(self.resolution.as_str()),
            self.refund_amount.to_cell(),
            Value::from(self.image_link.as_str()),
        ]
    }
}

/// One customer review / order-feedback card.
#[derive(Debug, Clone, Default)]
pub struct ReviewRecord {
    pub order_id: String,
    pub timestamp: String,
    pub outlet_name: String,
    pub items_ordered: String,
    pub rating: NormalizedValue,
    pub status: String,
    pub customer_name: String,
    pub customer_info: String,
    pub orders_90d: NormalizedValue,
    pub order_value_90d: NormalizedValue,
    pub complaints_90d: NormalizedValue,
    pub delivery_remark: String,
}

impl SheetRecord for ReviewRecord {
    const KEY_COLUMNS: &'static [usize] = &[0];

    fn key_fields(&self) -> Vec<String> {
        vec![self.order_id.clone()]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::from(self.order_id.as_str()),
            Value::from(self.timestamp.as_str()),
            Value::from(self.outlet_name.as_str()),
            Value::from(self.items_ordered.as_str()),
            self.rating.to_cell(),
            Value::from(self.status.as_str()),
            Value::from(self.customer_name.as_str()),
            Value::from(self.customer_info.as_str()),
            self.orders_90d.to_cell(),
            self.order_value_90d.to_cell(),
            self.complaints_90d.to_cell(),
            Value::from(self.delivery_remark.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{UnitHint, normalize};

    #[test]
    fn metric_row_layout_is_fixed() {
        let record = MetricRecord {
            report_date: "06/08/2026".to_string(),
            outlet_id: 121907,
            metric_label: "Delivered Orders".to_string(),
            value: normalize("42", UnitHint::None),
            platform: Platform::Zomato,
        };

        let row = record.to_row();
        assert_eq!(row.len(), 5);
        assert_eq!(row[0], Value::from("06/08/2026"));
        assert_eq!(row[1], Value::from(121907));
        assert_eq!(row[3], Value::from(42));
        assert_eq!(row[4], Value::from("Zomato"));
    }

    #[test]
    fn metric_key_fields_match_key_columns() {
        let record = MetricRecord {
            report_date: "06/08/2026".to_string(),
            outlet_id: 121907,
            metric_label: "Delivered Orders".to_string(),
            value: NormalizedValue::Missing,
            platform: Platform::Swiggy,
        };

        let row = record.to_row();
        let from_row: Vec<String> = MetricRecord::KEY_COLUMNS
            .iter()
            .map(|&c| match &row[c] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();

        assert_eq!(from_row, record.key_fields());
    }

    #[test]
    fn complaint_and_review_row_widths() {
        let complaint = ComplaintRecord {
            complaint_id: "778899".to_string(),
            ..Default::default()
        };
        assert_eq!(complaint.to_row().len(), 13);
        assert_eq!(complaint.key_fields(), vec!["778899".to_string()]);

        let review = ReviewRecord {
            order_id: "#21191574063-9546".to_string(),
            ..Default::default()
        };
        assert_eq!(review.to_row().len(), 12);
        assert_eq!(review.key_fields(), vec!["#21191574063-9546".to_string()]);
    }
}
