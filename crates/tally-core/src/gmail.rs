//! Gmail receipt import
//!
//! OAuth2 web flow plus message search and extraction. Tokens live in the
//! database scoped to one user; callers never hold ambient credentials.
//! Expired access tokens refresh transparently before any API call.

use std::collections::HashSet;
use std::sync::OnceLock;

use base64::Engine;
use chrono::{Duration, Utc};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ai::{AiBackend, AiClient};
use crate::budget::evaluate_user_budgets;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::ingest::persist_extraction;
use crate::notify::Notifier;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";
const GMAIL_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Search queries that surface receipt-bearing email
pub const RECEIPT_SEARCH_QUERIES: [&str; 4] = [
    "receipt OR invoice OR \"order confirmation\" OR \"purchase confirmation\"",
    "from:(amazon.com OR walmart.com OR target.com OR starbucks.com OR uber.com OR doordash.com)",
    "subject:(receipt OR invoice OR \"your order\" OR \"order #\" OR \"confirmation\")",
    "has:attachment (receipt OR invoice OR pdf)",
];

/// OAuth app configuration
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl GmailConfig {
    /// Env: `GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET`, `GMAIL_REDIRECT_URI`.
    /// None when the app is not configured; import endpoints then 404.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("GMAIL_REDIRECT_URI").ok()?;
        Some(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

/// Tokens returned by an exchange or refresh
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Result of one import run
#[derive(Debug, Clone, Serialize)]
pub struct GmailImportResult {
    pub receipts_found: usize,
    pub receipts_processed: usize,
}

/// Gmail API client for one OAuth app
#[derive(Clone)]
pub struct GmailClient {
    http: Client,
    config: GmailConfig,
    api_base: String,
    token_url: String,
}

impl GmailClient {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            api_base: GMAIL_API_BASE.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    pub fn from_env() -> Option<Self> {
        GmailConfig::from_env().map(Self::new)
    }

    /// Consent URL the frontend redirects the user to
    pub fn auth_url(&self) -> String {
        let url = reqwest::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", GMAIL_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        );
        // The base URL is a constant; parse can't fail on it
        url.map(|u| u.to_string()).unwrap_or_default()
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
        ])
        .await
    }

    /// Refresh an expired access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self.http.post(&self.token_url).form(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gmail(format!(
                "Token endpoint error {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(TokenSet {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    /// A fresh access token for the user, refreshing if expired.
    ///
    /// `Error::AuthRequired` carries the consent URL when the user has no
    /// stored credentials (or they can't be refreshed).
    pub async fn ensure_access_token(&self, db: &Database, user_id: &str) -> Result<String> {
        let credentials = db
            .get_gmail_credentials(user_id)?
            .ok_or_else(|| Error::AuthRequired(self.auth_url()))?;

        if !credentials.is_expired() {
            return Ok(credentials.access_token);
        }

        let refresh_token = credentials
            .refresh_token
            .ok_or_else(|| Error::AuthRequired(self.auth_url()))?;

        debug!(user = %user_id, "Refreshing expired Gmail access token");
        let refreshed = match self.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                // Revoked grant: drop the dead credentials and re-consent
                warn!(user = %user_id, error = %e, "Gmail token refresh failed");
                db.delete_gmail_credentials(user_id)?;
                return Err(Error::AuthRequired(self.auth_url()));
            }
        };

        db.store_gmail_credentials(
            user_id,
            &refreshed.access_token,
            refreshed.refresh_token.as_deref(),
            refreshed.expires_at,
        )?;
        Ok(refreshed.access_token)
    }

    /// Message ids matching a search query
    async fn search_messages(
        &self,
        access_token: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<String>> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/gmail/v1/users/me/messages", self.api_base),
            &[("q", query), ("maxResults", &max_results.to_string())],
        )
        .map_err(|e| Error::Gmail(format!("Bad search URL: {}", e)))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Gmail(format!(
                "Message search error {}: {}",
                status, body
            )));
        }

        let list: MessageList = response.json().await?;
        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    async fn get_message(&self, access_token: &str, id: &str) -> Result<GmailMessage> {
        let response = self
            .http
            .get(format!(
                "{}/gmail/v1/users/me/messages/{}",
                self.api_base, id
            ))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Gmail(format!("Message fetch error {}", status)));
        }
        Ok(response.json().await?)
    }

    async fn get_attachment(
        &self,
        access_token: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(format!(
                "{}/gmail/v1/users/me/messages/{}/attachments/{}",
                self.api_base, message_id, attachment_id
            ))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Gmail(format!("Attachment fetch error {}", status)));
        }

        let body: AttachmentBody = response.json().await?;
        decode_base64url(&body.data.unwrap_or_default())
    }
}

/// Decode Gmail's URL-safe base64 (with or without padding)
fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data))
        .map_err(|e| Error::Gmail(format!("Attachment base64 decode failed: {}", e)))
}

/// Whether body text looks like a receipt (totals, order numbers, amounts)
pub fn contains_receipt_markers(text: &str) -> bool {
    static MARKERS: OnceLock<Vec<Regex>> = OnceLock::new();
    let markers = MARKERS.get_or_init(|| {
        [
            r"(?i)total[:\s]*\$[\d,.]+",
            r"(?i)amount[:\s]*\$[\d,.]+",
            r"(?i)order\s*#?\s*\d+",
            r"(?i)receipt\s*#?\s*\d+",
            r"(?i)transaction\s*id",
            r"\$[\d,.]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    });
    markers.iter().any(|m| m.is_match(text))
}

/// Run a full import for one user: search, fetch, extract, persist, then
/// evaluate budgets once at the end.
///
/// Individual message failures are logged and skipped; the run only errors
/// on auth or search-level failures.
pub async fn import_receipts(
    db: &Database,
    ai: &AiClient,
    notifier: &dyn Notifier,
    client: &GmailClient,
    user_id: &str,
    max_results: usize,
) -> Result<GmailImportResult> {
    let access_token = client.ensure_access_token(db, user_id).await?;
    let per_query = (max_results / RECEIPT_SEARCH_QUERIES.len()).max(1);

    let mut seen = HashSet::new();
    let mut found = 0;
    let mut processed = 0;

    for query in RECEIPT_SEARCH_QUERIES {
        let ids = match client.search_messages(&access_token, query, per_query).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(query = %query, error = %e, "Gmail search query failed");
                continue;
            }
        };

        for id in ids {
            if !seen.insert(id.clone()) {
                continue;
            }
            found += 1;
            match import_message(db, ai, client, &access_token, user_id, &id).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => warn!(message = %id, error = %e, "Failed to import message"),
            }
        }
    }

    info!(
        user = %user_id,
        found,
        processed,
        "Gmail import finished"
    );
    evaluate_user_budgets(db, notifier, user_id, Utc::now().date_naive()).await?;

    Ok(GmailImportResult {
        receipts_found: found,
        receipts_processed: processed,
    })
}

/// Import one message. Returns true when a receipt was created.
async fn import_message(
    db: &Database,
    ai: &AiClient,
    client: &GmailClient,
    access_token: &str,
    user_id: &str,
    message_id: &str,
) -> Result<bool> {
    let message = client.get_message(access_token, message_id).await?;
    let Some(payload) = message.payload else {
        return Ok(false);
    };

    // Prefer an image attachment that looks like a receipt
    if let Some((attachment_id, mime)) = find_receipt_attachment(&payload) {
        let image = client
            .get_attachment(access_token, message_id, &attachment_id)
            .await?;
        let extracted = match ai.extract_receipt(&image, &mime).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(message = %message_id, error = %e, "Attachment extraction failed");
                return Ok(false);
            }
        };
        let receipt_id = db.create_receipt(user_id, &format!("gmail:{}", message_id))?;
        persist_extraction(db, ai, user_id, receipt_id, &extracted).await?;
        return Ok(true);
    }

    // Otherwise try the body text
    let body = collect_body_text(&payload);
    if body.is_empty() || !contains_receipt_markers(&body) {
        return Ok(false);
    }

    let subject = header_value(&payload, "Subject").unwrap_or_default();
    let from = header_value(&payload, "From").unwrap_or_default();
    let text = format!("Subject: {}\nFrom: {}\n\n{}", subject, from, body);

    let extracted = match ai.extract_receipt_text(&text).await {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(message = %message_id, error = %e, "Body extraction failed");
            return Ok(false);
        }
    };
    if extracted.items.is_empty() && extracted.total_cents == 0 {
        // Marker match but no extractable purchase
        return Ok(false);
    }

    let receipt_id = db.create_receipt(user_id, &format!("gmail:{}", message_id))?;
    persist_extraction(db, ai, user_id, receipt_id, &extracted).await?;
    Ok(true)
}

fn header_value(payload: &MessagePayload, name: &str) -> Option<String> {
    payload
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// First part that looks like a receipt image: named receipt/invoice, or
/// any image attachment
fn find_receipt_attachment(payload: &MessagePayload) -> Option<(String, String)> {
    for part in &payload.parts {
        let filename = part.filename.as_deref().unwrap_or("").to_lowercase();
        let mime = part.mime_type.as_deref().unwrap_or("");
        let looks_like_receipt =
            filename.contains("receipt") || filename.contains("invoice") || mime.starts_with("image/");
        if looks_like_receipt {
            if let Some(attachment_id) = part.body.as_ref().and_then(|b| b.attachment_id.clone())
            {
                let mime = if mime.starts_with("image/") {
                    mime.to_string()
                } else {
                    "image/jpeg".to_string()
                };
                return Some((attachment_id, mime));
            }
        }
    }
    None
}

/// Concatenate decoded text/plain and text/html part bodies
fn collect_body_text(payload: &MessagePayload) -> String {
    let mut out = String::new();
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref()) {
        if let Ok(bytes) = decode_base64url(data) {
            out.push_str(&String::from_utf8_lossy(&bytes));
        }
    }
    for part in &payload.parts {
        let mime = part.mime_type.as_deref().unwrap_or("");
        if mime == "text/plain" || mime == "text/html" {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                if let Ok(bytes) = decode_base64url(data) {
                    out.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
        }
    }
    out
}

// Gmail API wire types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GmailMessage {
    payload: Option<MessagePayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<MessageHeader>,
    mime_type: Option<String>,
    filename: Option<String>,
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    data: Option<String>,
    attachment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GmailClient {
        GmailClient::new(GmailConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://app.example.com/api/gmail/callback".to_string(),
        })
    }

    #[test]
    fn test_auth_url_contains_oauth_params() {
        let url = test_client().auth_url();
        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("gmail.readonly"));
    }

    #[test]
    fn test_receipt_markers() {
        assert!(contains_receipt_markers("Your total: $42.19 thanks!"));
        assert!(contains_receipt_markers("Order #12345 has shipped"));
        assert!(contains_receipt_markers("Transaction ID abc"));
        assert!(!contains_receipt_markers("See you at the meeting tomorrow"));
    }

    #[test]
    fn test_decode_base64url_with_and_without_padding() {
        assert_eq!(decode_base64url("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64url("aGVsbG8").unwrap(), b"hello");
        // URL-safe alphabet
        assert_eq!(decode_base64url("_w==").unwrap(), vec![0xff]);
        assert!(decode_base64url("!!!").is_err());
    }

    #[test]
    fn test_find_receipt_attachment_prefers_named_parts() {
        let payload = MessagePayload {
            headers: vec![],
            mime_type: None,
            filename: None,
            body: None,
            parts: vec![
                MessagePayload {
                    filename: Some("notes.txt".to_string()),
                    mime_type: Some("text/plain".to_string()),
                    ..Default::default()
                },
                MessagePayload {
                    filename: Some("Receipt-June.pdf".to_string()),
                    mime_type: Some("application/pdf".to_string()),
                    body: Some(PartBody {
                        data: None,
                        attachment_id: Some("att-1".to_string()),
                    }),
                    ..Default::default()
                },
            ],
        };
        let (id, mime) = find_receipt_attachment(&payload).unwrap();
        assert_eq!(id, "att-1");
        assert_eq!(mime, "image/jpeg");
    }

    #[test]
    fn test_collect_body_text_from_parts() {
        let payload = MessagePayload {
            parts: vec![MessagePayload {
                mime_type: Some("text/plain".to_string()),
                body: Some(PartBody {
                    data: Some("VG90YWw6ICQ5Ljk5".to_string()),
                    attachment_id: None,
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let body = collect_body_text(&payload);
        assert_eq!(body, "Total: $9.99");
        assert!(contains_receipt_markers(&body));
    }
}
