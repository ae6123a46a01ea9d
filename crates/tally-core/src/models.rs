//! Domain models for expense tracking

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A user of the system.
///
/// Identity arrives from trusted proxy headers; rows are upserted on first
/// sight. The id is an opaque string chosen by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Display name for email greetings: first name, else email, else "there".
    pub fn display_name(&self) -> String {
        if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            return first.to_string();
        }
        if let Some(email) = self.email.as_deref().filter(|s| !s.is_empty()) {
            return email.to_string();
        }
        "there".to_string()
    }
}

/// An expense category (seeded defaults plus any later additions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Icon identifier for the frontend (font-awesome name)
    pub icon: Option<String>,
    /// Display color as "#rrggbb"
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Processing status of an uploaded receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Processing => "processing",
            ReceiptStatus::Completed => "completed",
            ReceiptStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ReceiptStatus::Pending),
            "processing" => Ok(ReceiptStatus::Processing),
            "completed" => Ok(ReceiptStatus::Completed),
            "failed" => Ok(ReceiptStatus::Failed),
            _ => Err(Error::InvalidData(format!("Unknown receipt status: {}", s))),
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded (or email-imported) receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub user_id: String,
    /// Relative path of the stored image under the receipts directory.
    /// Empty for receipts extracted from email body text.
    pub object_path: String,
    /// Raw extraction output, stored as JSON once processing completes
    pub extracted_json: Option<String>,
    pub status: ReceiptStatus,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A single expense row
///
/// Amounts are whole cents. `is_manual` distinguishes user-entered expenses
/// from rows produced by receipt ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: String,
    pub receipt_id: Option<i64>,
    pub category_id: Option<i64>,
    pub description: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub vendor: Option<String>,
    pub notes: Option<String>,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new expense
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub user_id: String,
    pub receipt_id: Option<i64>,
    pub category_id: Option<i64>,
    pub description: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub vendor: Option<String>,
    pub notes: Option<String>,
    pub is_manual: bool,
}

/// Budget evaluation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weekly" => Ok(BudgetPeriod::Weekly),
            "monthly" => Ok(BudgetPeriod::Monthly),
            "yearly" => Ok(BudgetPeriod::Yearly),
            _ => Err(Error::InvalidData(format!("Unknown budget period: {}", s))),
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A spending target, optionally scoped to one category
///
/// `spent` is never stored; it is computed on read over the goal's current
/// evaluation window. `last_alerted_at` arms/disarms threshold alerts so a
/// goal fires at most once per window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetGoal {
    pub id: i64,
    pub user_id: String,
    /// None means the goal counts expenses from every category
    pub category_id: Option<i64>,
    pub name: String,
    pub amount_cents: i64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    /// Optional hard cap on the evaluation window
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub email_alerts: bool,
    /// Percent of budget at which to alert (default 80.0)
    pub alert_threshold: f64,
    pub last_alerted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new budget goal
#[derive(Debug, Clone, Deserialize)]
pub struct NewBudgetGoal {
    pub user_id: String,
    pub category_id: Option<i64>,
    pub name: String,
    pub amount_cents: i64,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub email_alerts: bool,
    pub alert_threshold: f64,
}

/// A budget goal with its computed spend for the current window
#[derive(Debug, Clone, Serialize)]
pub struct BudgetGoalWithSpent {
    #[serde(flatten)]
    pub goal: BudgetGoal,
    pub spent_cents: i64,
    /// Display percentage with one decimal, e.g. "80.0"
    pub percentage: String,
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(Error::InvalidData(format!("Unknown chat role: {}", s))),
        }
    }
}

/// A conversation between a user and the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConversation {
    pub id: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single message within a conversation
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Stored Gmail OAuth credentials for one user
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GmailCredentials {
    /// Whether the access token has expired (with a 60s safety margin)
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now() + chrono::Duration::seconds(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_receipt_status_round_trip() {
        for s in ["pending", "processing", "completed", "failed"] {
            assert_eq!(ReceiptStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(ReceiptStatus::from_str("bogus").is_err());
    }

    #[test]
    fn test_budget_period_round_trip() {
        for s in ["weekly", "monthly", "yearly"] {
            assert_eq!(BudgetPeriod::from_str(s).unwrap().as_str(), s);
        }
        assert!(BudgetPeriod::from_str("daily").is_err());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = User {
            id: "u1".to_string(),
            email: Some("jo@example.com".to_string()),
            first_name: Some("Jo".to_string()),
            last_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "Jo");
        user.first_name = None;
        assert_eq!(user.display_name(), "jo@example.com");
        user.email = None;
        assert_eq!(user.display_name(), "there");
    }
}
