//! Mock AI backend for testing and offline development
//!
//! Responses are deterministic and keyword-driven so tests can assert on
//! exact values without a model server.

use async_trait::async_trait;
use chrono::Utc;

use super::types::{CategorySuggestion, ExtractedItem, ExtractedReceipt};
use super::AiBackend;
use crate::error::{Error, Result};

/// Mock backend with canned responses
#[derive(Debug, Clone)]
pub struct MockBackend {
    healthy: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// A mock that fails every call, for error-path tests
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }

    fn check_health(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(Error::Extraction("Mock backend is unhealthy".to_string()))
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    /// Keyword-driven extraction over the image bytes (tests embed markers
    /// in the fake image data). "empty" yields a receipt with no items.
    async fn extract_receipt(&self, image_data: &[u8], _mime_type: &str) -> Result<ExtractedReceipt> {
        self.check_health()?;
        let marker = String::from_utf8_lossy(image_data).to_lowercase();
        let today = Utc::now().date_naive();

        if marker.contains("empty") {
            return Ok(ExtractedReceipt {
                vendor: "Corner Market".to_string(),
                date: today,
                total_cents: 0,
                items: vec![],
            });
        }

        if marker.contains("grocery") {
            return Ok(ExtractedReceipt {
                vendor: "Fresh Foods Market".to_string(),
                date: today,
                total_cents: 4250,
                items: vec![
                    ExtractedItem {
                        description: "Organic Milk".to_string(),
                        amount_cents: 599,
                    },
                    ExtractedItem {
                        description: "Whole Grain Bread".to_string(),
                        amount_cents: 449,
                    },
                    ExtractedItem {
                        description: "Produce Assortment".to_string(),
                        amount_cents: 3202,
                    },
                ],
            });
        }

        Ok(ExtractedReceipt {
            vendor: "Corner Cafe".to_string(),
            date: today,
            total_cents: 1249,
            items: vec![
                ExtractedItem {
                    description: "Coffee".to_string(),
                    amount_cents: 450,
                },
                ExtractedItem {
                    description: "Sandwich".to_string(),
                    amount_cents: 799,
                },
            ],
        })
    }

    /// Same keyword markers as the image path, applied to body text
    async fn extract_receipt_text(&self, text: &str) -> Result<ExtractedReceipt> {
        self.extract_receipt(text.as_bytes(), "text/plain").await
    }

    async fn categorize_expense(
        &self,
        description: &str,
        vendor: &str,
    ) -> Result<CategorySuggestion> {
        self.check_health()?;
        let text = format!("{} {}", description, vendor).to_lowercase();

        let (category, confidence) = if text.contains("milk")
            || text.contains("bread")
            || text.contains("produce")
            || text.contains("grocer")
            || text.contains("market")
        {
            ("Groceries", 0.9)
        } else if text.contains("coffee")
            || text.contains("sandwich")
            || text.contains("cafe")
            || text.contains("restaurant")
        {
            ("Food & Dining", 0.9)
        } else if text.contains("gas") || text.contains("fuel") || text.contains("shell") {
            ("Gas & Fuel", 0.85)
        } else if text.contains("uber") || text.contains("lyft") || text.contains("transit") {
            ("Transportation", 0.85)
        } else if text.contains("movie") || text.contains("netflix") || text.contains("concert") {
            ("Entertainment", 0.85)
        } else if text.contains("pharmacy") || text.contains("clinic") {
            ("Healthcare", 0.85)
        } else {
            ("Other", 0.5)
        };

        Ok(CategorySuggestion {
            category: category.to_string(),
            confidence,
        })
    }

    async fn chat(&self, _context: &str, query: &str) -> Result<String> {
        self.check_health()?;
        Ok(format!(
            "Based on your recent spending, here's what I can tell you about \"{}\": \
             your expenses look well within budget this period.",
            query
        ))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
