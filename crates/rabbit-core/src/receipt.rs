//! # Receipt Scan Normalisation
//!
//! Turns the raw text returned by the receipt-scanning service into items
//! and tab rates. The service itself is an external collaborator; only its
//! response is handled here.
//!
//! Expected response shape (prices in major units):
//! ```text
//! {
//!   "items": [{"description": "Burger", "price": 10.00}],
//!   "subtotal": 14.00,
//!   "tax": 1.12,   "tax_unit": "currency",
//!   "tip": 20,     "tip_unit": "percent",
//!   "total": 17.92,
//!   "currency_code": "USD"
//! }
//! ```
//!
//! Anything unreadable is [`ScanOutcome::NoItems`], never an error.
//! Descriptions always pass item validation: a blank one becomes
//! `Item <n>` and a long one is cut at [`MAX_TEXT_LEN`] characters.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::currency::{is_known_currency, major_to_units};
use crate::validation::MAX_TEXT_LEN;

/// One priced line read off a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScannedItem {
    pub description: String,
    pub price_cents: i64,
}

/// A successfully read receipt, ready to be added to a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScannedReceipt {
    pub items: Vec<ScannedItem>,
    pub currency_code: String,
    /// Only set when tax was actually charged.
    pub tax_percent: Option<f64>,
    /// Only set when a tip or service charge was actually charged.
    pub tip_percent: Option<f64>,
    pub subtotal_cents: Option<i64>,
    pub total_cents: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found(ScannedReceipt),
    NoItems,
}

#[derive(Debug, Deserialize)]
struct RawScan {
    #[serde(default)]
    items: Vec<RawItem>,
    subtotal: Option<f64>,
    tax: Option<f64>,
    tax_unit: Option<String>,
    tip: Option<f64>,
    tip_unit: Option<String>,
    total: Option<f64>,
    currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    description: String,
    price: Option<f64>,
}

/// Parses a scan response, tolerating markdown fences and surrounding prose.
pub fn parse_scan_response(raw: &str, fallback_currency: &str) -> ScanOutcome {
    let Some(json) = extract_json_object(raw) else {
        return ScanOutcome::NoItems;
    };
    let Ok(scan) = serde_json::from_str::<RawScan>(json) else {
        return ScanOutcome::NoItems;
    };

    let currency_code = scan
        .currency_code
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| is_known_currency(c))
        .unwrap_or_else(|| fallback_currency.to_ascii_uppercase());

    let priced: Vec<(String, f64)> = scan
        .items
        .into_iter()
        .filter_map(|item| {
            let price = item.price.filter(|p| p.is_finite() && *p >= 0.0)?;
            Some((item.description, price))
        })
        .enumerate()
        .map(|(index, (description, price))| (item_description(&description, index + 1), price))
        .collect();

    if priced.is_empty() {
        return ScanOutcome::NoItems;
    }

    let item_sum: f64 = priced.iter().map(|(_, price)| price).sum();
    let subtotal = scan
        .subtotal
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(item_sum);

    let items = priced
        .into_iter()
        .map(|(description, price)| ScannedItem {
            description,
            price_cents: major_to_units(price, &currency_code),
        })
        .collect();

    ScanOutcome::Found(ScannedReceipt {
        items,
        tax_percent: charge_as_percent(scan.tax, scan.tax_unit.as_deref(), subtotal),
        tip_percent: charge_as_percent(scan.tip, scan.tip_unit.as_deref(), subtotal),
        subtotal_cents: scan
            .subtotal
            .filter(|s| s.is_finite())
            .map(|s| major_to_units(s, &currency_code)),
        total_cents: scan
            .total
            .filter(|t| t.is_finite())
            .map(|t| major_to_units(t, &currency_code)),
        currency_code,
    })
}

fn item_description(raw: &str, position: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return format!("Item {position}");
    }
    trimmed.chars().take(MAX_TEXT_LEN).collect::<String>().trim_end().to_string()
}

/// Converts a tax or tip line into a percentage of the subtotal.
fn charge_as_percent(value: Option<f64>, unit: Option<&str>, subtotal: f64) -> Option<f64> {
    let value = value.filter(|v| v.is_finite() && *v != 0.0)?;
    match unit.map(str::trim) {
        Some(u) if u.eq_ignore_ascii_case("currency") => {
            if subtotal <= 0.0 {
                return None;
            }
            Some(round_to_hundredths(value / subtotal * 100.0))
        }
        _ => Some(value),
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}
