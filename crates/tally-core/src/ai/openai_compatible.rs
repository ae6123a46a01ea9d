//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API,
//! hosted or local (vLLM, LocalAI, llama-server, Docker Model Runner).
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_HOST`: Server URL (default: https://api.openai.com)
//! - `AI_MODEL`: Model name (default: gpt-4o; must support vision for
//!   receipt extraction)
//! - `AI_API_KEY`: API key if required (optional for local servers)

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parsing::{parse_category_suggestion, parse_extraction};
use super::types::{CategorySuggestion, ExtractedReceipt};
use super::AiBackend;
use crate::db::DEFAULT_CATEGORIES;
use crate::error::{Error, Result};

const EXTRACTION_PROMPT: &str = r#"You are an expert at reading receipts and extracting structured data.
Analyze the receipt image and extract key information in JSON format.
Return data in this exact format: {
  "vendor": "store name",
  "date": "YYYY-MM-DD",
  "total": number,
  "items": [
    {
      "description": "item name",
      "amount": number
    }
  ]
}
If you cannot determine a value, use reasonable defaults or empty strings."#;

/// OpenAI-compatible backend
///
/// Works with any server implementing the OpenAI `/v1/chat/completions` API.
#[derive(Clone)]
pub struct OpenAiCompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from environment variables
    ///
    /// Optional: `AI_HOST` (default: https://api.openai.com)
    /// Optional: `AI_MODEL` (default: gpt-4o)
    /// Optional: `AI_API_KEY`
    pub fn from_env() -> Option<Self> {
        let host =
            std::env::var("AI_HOST").unwrap_or_else(|_| "https://api.openai.com".to_string());
        let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let api_key = std::env::var("AI_API_KEY").ok();

        // The hosted endpoint is useless without a key; local servers work without one
        if api_key.is_none() && host.contains("api.openai.com") {
            return None;
        }

        let mut backend = Self::new(&host, &model);
        backend.api_key = api_key;
        Some(backend)
    }

    /// Make a chat completion request
    async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.1),
            max_tokens,
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "AI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("No response from AI API".into()))
    }
}

#[async_trait]
impl AiBackend for OpenAiCompatibleBackend {
    async fn extract_receipt(&self, image_data: &[u8], mime_type: &str) -> Result<ExtractedReceipt> {
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_data);

        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(EXTRACTION_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: ChatContent::Parts(vec![
                    ContentPart::Text {
                        text: "Please extract the receipt data from this image:".to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", mime_type, base64_image),
                        },
                    },
                ]),
            },
        ];

        let raw = self.chat_completion(messages, Some(1000)).await?;
        debug!(model = %self.model, "Receipt extraction response received");
        parse_extraction(&raw, Utc::now().date_naive())
    }

    async fn extract_receipt_text(&self, text: &str) -> Result<ExtractedReceipt> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(EXTRACTION_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: ChatContent::Text(format!(
                    "Extract receipt/purchase information from this email:\n\n{}",
                    text
                )),
            },
        ];

        let raw = self.chat_completion(messages, Some(1000)).await?;
        parse_extraction(&raw, Utc::now().date_naive())
    }

    async fn categorize_expense(
        &self,
        description: &str,
        vendor: &str,
    ) -> Result<CategorySuggestion> {
        let category_names: Vec<&str> = DEFAULT_CATEGORIES.iter().map(|(name, _, _)| *name).collect();
        let system = format!(
            "You are an expert at categorizing expenses. Given an expense description and vendor, \
             choose the most appropriate category from this list: {}.\n\n\
             Return your response in JSON format: {{\n  \"category\": \"category name from the list\",\n  \"confidence\": number between 0 and 1\n}}",
            category_names.join(", ")
        );

        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(system),
            },
            ChatMessage {
                role: "user".to_string(),
                content: ChatContent::Text(format!(
                    "Categorize this expense:\nDescription: {}\nVendor: {}",
                    description, vendor
                )),
            },
        ];

        let raw = self.chat_completion(messages, Some(200)).await?;
        parse_category_suggestion(&raw)
    }

    async fn chat(&self, context: &str, query: &str) -> Result<String> {
        let system = format!(
            "You are a helpful financial assistant. You help users understand their spending \
             patterns, track budget goals, and provide financial insights. Be conversational, \
             helpful, and specific with numbers when providing analysis.\n\n{}\n\n\
             Provide helpful, specific advice based on this financial data.",
            context
        );

        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(system),
            },
            ChatMessage {
                role: "user".to_string(),
                content: ChatContent::Text(query.to_string()),
            },
        ];

        self.chat_completion(messages, Some(500)).await
    }

    async fn health_check(&self) -> bool {
        let mut req = self
            .http_client
            .get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Chat message content (text or multimodal)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Content part for multimodal messages
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// Image URL for vision requests
#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = OpenAiCompatibleBackend::new("http://localhost:8000/", "test-model");
        assert_eq!(backend.host(), "http://localhost:8000");
        assert_eq!(backend.model(), "test-model");
    }

    #[test]
    fn test_vision_request_serializes_data_url() {
        let request = ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: ChatContent::Parts(vec![ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/jpeg;base64,AAAA".to_string(),
                    },
                }]),
            }],
            temperature: None,
            max_tokens: None,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][0]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
    }
}
