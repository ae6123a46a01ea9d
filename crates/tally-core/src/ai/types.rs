//! Shared types for AI backend responses

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw extraction output as the model returns it.
///
/// Every field defaults so a partial JSON object still deserializes; the
/// normalization pass fills the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub total: RawAmount,
    #[serde(default)]
    pub items: Vec<RawExtractionItem>,
}

/// One raw line item from the model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtractionItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: RawAmount,
}

/// A model amount: some models emit JSON numbers, others quoted decimal
/// strings like "42.50" or "$3.99"
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl Default for RawAmount {
    fn default() -> Self {
        RawAmount::Number(0.0)
    }
}

/// Normalized receipt extraction: every field present, amounts in cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedReceipt {
    pub vendor: String,
    pub date: NaiveDate,
    pub total_cents: i64,
    pub items: Vec<ExtractedItem>,
}

/// Normalized line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub description: String,
    pub amount_cents: i64,
}

/// Category suggestion for one expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub category: String,
    /// Model confidence, clamped into [0, 1]
    pub confidence: f64,
}

/// Raw categorization output from the model.
///
/// Confidence stays optional so an absent field is distinguishable from a
/// genuine zero-confidence answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCategorySuggestion {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}
