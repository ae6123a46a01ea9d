//! Response parsing and normalization for AI backend output
//!
//! Models wrap JSON in prose, markdown fences, or preamble text. These
//! helpers extract the first JSON object from raw output, then normalize
//! missing or malformed fields to safe defaults rather than failing the
//! whole extraction.

use chrono::NaiveDate;

use super::types::{
    CategorySuggestion, ExtractedItem, ExtractedReceipt, RawAmount, RawCategorySuggestion,
    RawExtraction,
};
use crate::error::{Error, Result};
use crate::money::{cents_from_f64, parse_cents};

/// Vendor used when the model can't read one
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// Description used when a line item has none
pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// Extract the first JSON object from raw model output
fn extract_json_object(raw: &str) -> Result<&str> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(&raw[s..=e]),
        _ => Err(Error::Extraction(format!(
            "No JSON object in model output: {}",
            truncate(raw, 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Parse raw model output into a normalized receipt extraction.
///
/// `today` fills a missing or unparseable date. Unreadable fields degrade
/// to defaults; only structurally invalid JSON is an error.
pub fn parse_extraction(raw: &str, today: NaiveDate) -> Result<ExtractedReceipt> {
    let json = extract_json_object(raw)?;
    let parsed: RawExtraction = serde_json::from_str(json)
        .map_err(|e| Error::Extraction(format!("Malformed extraction JSON: {}", e)))?;
    Ok(normalize_extraction(parsed, today))
}

/// Fill gaps in a raw extraction with defaults and convert amounts to cents
pub fn normalize_extraction(raw: RawExtraction, today: NaiveDate) -> ExtractedReceipt {
    let vendor = if raw.vendor.trim().is_empty() {
        UNKNOWN_VENDOR.to_string()
    } else {
        raw.vendor.trim().to_string()
    };

    let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d").unwrap_or(today);

    let items = raw
        .items
        .into_iter()
        .map(|item| ExtractedItem {
            description: if item.description.trim().is_empty() {
                UNKNOWN_ITEM.to_string()
            } else {
                item.description.trim().to_string()
            },
            amount_cents: amount_cents(&item.amount),
        })
        .collect();

    ExtractedReceipt {
        vendor,
        date,
        total_cents: amount_cents(&raw.total),
        items,
    }
}

/// Convert a raw model amount to cents. Quoted decimals go through the
/// exact string parser; unreadable or negative values clamp to zero.
fn amount_cents(raw: &RawAmount) -> i64 {
    match raw {
        RawAmount::Number(n) => cents_from_f64(*n),
        RawAmount::Text(s) => parse_cents(s).unwrap_or(0).max(0),
    }
}

/// Parse raw model output into a category suggestion.
///
/// Empty category falls back to "Other"; confidence defaults to 0.5 when
/// absent or outside [0, 1]. An explicit 0.0 is kept as-is.
pub fn parse_category_suggestion(raw: &str) -> Result<CategorySuggestion> {
    let json = extract_json_object(raw)?;
    let parsed: RawCategorySuggestion = serde_json::from_str(json)
        .map_err(|e| Error::Extraction(format!("Malformed category JSON: {}", e)))?;

    let category = if parsed.category.trim().is_empty() {
        "Other".to_string()
    } else {
        parsed.category.trim().to_string()
    };

    let confidence = match parsed.confidence {
        Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => c,
        _ => 0.5,
    };

    Ok(CategorySuggestion {
        category,
        confidence,
    })
}
