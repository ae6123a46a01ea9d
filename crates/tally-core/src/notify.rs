//! Budget alert delivery
//!
//! `Notifier` is the seam between the budget evaluator and the outside
//! world. Production uses SMTP via lettre; when SMTP is unconfigured the
//! `LogNotifier` keeps the pipeline running and visible in logs, and tests
//! use `RecordingNotifier` to assert on exactly what would have been sent.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::money::format_dollars;

/// Everything needed to render and address one budget alert email
#[derive(Debug, Clone)]
pub struct BudgetAlertEmail {
    pub user_email: String,
    pub user_name: String,
    pub goal_name: String,
    pub spent_cents: i64,
    pub budget_cents: i64,
    /// Display percentage with one decimal, e.g. "80.0"
    pub percentage: String,
    /// Category name, or "all categories" for unscoped goals
    pub category: String,
}

impl BudgetAlertEmail {
    /// Over-budget (above 100%) vs approaching-threshold warning
    pub fn is_over_budget(&self) -> bool {
        self.spent_cents > self.budget_cents
    }
}

/// Seam for alert delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_budget_alert(&self, alert: &BudgetAlertEmail) -> Result<()>;
}

/// SMTP notifier over lettre
///
/// Env: `SMTP_HOST`, `SMTP_PORT` (default 587), `SMTP_USER`, `SMTP_PASS`,
/// `SMTP_FROM` (default "Tally <noreply@localhost>").
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build from environment; None when `SMTP_HOST` is unset
    pub fn from_env() -> Option<Result<Self>> {
        let host = std::env::var("SMTP_HOST").ok()?;
        Some(Self::build(&host))
    }

    fn build(host: &str) -> Result<Self> {
        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let from = std::env::var("SMTP_FROM")
            .unwrap_or_else(|_| "Tally <noreply@localhost>".to_string());
        let from: Mailbox = from
            .parse()
            .map_err(|e| Error::Email(format!("Invalid SMTP_FROM address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| Error::Email(format!("SMTP relay setup failed: {}", e)))?
            .port(port);

        if let (Ok(user), Ok(pass)) = (std::env::var("SMTP_USER"), std::env::var("SMTP_PASS")) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_budget_alert(&self, alert: &BudgetAlertEmail) -> Result<()> {
        let to: Mailbox = alert
            .user_email
            .parse()
            .map_err(|e| Error::Email(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(alert_subject(alert))
            .header(ContentType::TEXT_HTML)
            .body(render_alert_html(alert))
            .map_err(|e| Error::Email(format!("Failed to build alert email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Email(format!("SMTP send failed: {}", e)))?;

        info!(
            to = %alert.user_email,
            goal = %alert.goal_name,
            "Budget alert sent"
        );
        Ok(())
    }
}

/// Fallback notifier used when SMTP is not configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_budget_alert(&self, alert: &BudgetAlertEmail) -> Result<()> {
        warn!(
            to = %alert.user_email,
            goal = %alert.goal_name,
            spent = %format_dollars(alert.spent_cents),
            budget = %format_dollars(alert.budget_cents),
            percentage = %alert.percentage,
            "Budget alert (SMTP not configured, not delivered)"
        );
        Ok(())
    }
}

/// Test notifier that records every alert it receives
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: std::sync::Mutex<Vec<BudgetAlertEmail>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<BudgetAlertEmail> {
        self.alerts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_budget_alert(&self, alert: &BudgetAlertEmail) -> Result<()> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert.clone());
        Ok(())
    }
}

/// Subject line: distinct phrasing for exceeded vs approaching
pub fn alert_subject(alert: &BudgetAlertEmail) -> String {
    if alert.is_over_budget() {
        format!("Budget Alert: {} is Over Budget!", alert.goal_name)
    } else {
        format!(
            "Budget Alert: {} at {}%",
            alert.goal_name, alert.percentage
        )
    }
}

/// Render the HTML alert body
pub fn render_alert_html(alert: &BudgetAlertEmail) -> String {
    let (headline, detail) = if alert.is_over_budget() {
        (
            "Budget Exceeded!",
            format!(
                "<p><strong>You've exceeded your budget by {}!</strong> \
                 Consider reviewing your {} expenses.</p>",
                format_dollars(alert.spent_cents - alert.budget_cents),
                alert.category
            ),
        )
    } else {
        (
            "Budget Warning",
            format!(
                "<p>You have {} remaining in your {} budget.</p>",
                format_dollars(alert.budget_cents - alert.spent_cents),
                alert.category
            ),
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Budget Alert</title></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background: #1976D2; color: white; padding: 20px; text-align: center;">
    <h1>Tally</h1>
    <p>Budget Alert Notification</p>
  </div>
  <div style="padding: 20px; border: 1px solid #e0e0e0;">
    <h2>Hello {user_name}!</h2>
    <h3>{headline}</h3>
    <p>Your <strong>{goal_name}</strong> budget has reached
       <strong>{percentage}%</strong> of your limit.</p>
    <p>Spent: <strong>{spent}</strong> &middot;
       Budget: <strong>{budget}</strong> &middot;
       Used: <strong>{percentage}%</strong></p>
    {detail}
  </div>
  <div style="background: #f5f5f5; padding: 15px; text-align: center; font-size: 13px; color: #666;">
    <p>This is an automated message from Tally.</p>
  </div>
</body>
</html>"#,
        user_name = alert.user_name,
        headline = headline,
        goal_name = alert.goal_name,
        percentage = alert.percentage,
        spent = format_dollars(alert.spent_cents),
        budget = format_dollars(alert.budget_cents),
        detail = detail,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert(spent: i64) -> BudgetAlertEmail {
        BudgetAlertEmail {
            user_email: "jo@example.com".to_string(),
            user_name: "Jo".to_string(),
            goal_name: "Monthly Groceries".to_string(),
            spent_cents: spent,
            budget_cents: 10000,
            percentage: crate::money::format_percentage(spent, 10000),
            category: "Groceries".to_string(),
        }
    }

    #[test]
    fn test_warning_subject_and_body() {
        let alert = sample_alert(8001);
        assert_eq!(
            alert_subject(&alert),
            "Budget Alert: Monthly Groceries at 80.0%"
        );
        let html = render_alert_html(&alert);
        assert!(html.contains("Budget Warning"));
        assert!(html.contains("$19.99 remaining"));
        assert!(html.contains("80.0%"));
    }

    #[test]
    fn test_over_budget_subject_and_body() {
        let alert = sample_alert(12550);
        assert_eq!(
            alert_subject(&alert),
            "Budget Alert: Monthly Groceries is Over Budget!"
        );
        let html = render_alert_html(&alert);
        assert!(html.contains("Budget Exceeded!"));
        assert!(html.contains("exceeded your budget by $25.50"));
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.send_budget_alert(&sample_alert(9000)).await.unwrap();
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].goal_name, "Monthly Groceries");
    }
}
