//! Pluggable AI backend abstraction
//!
//! Backend-agnostic interface for the three AI operations the tracker needs:
//! receipt extraction (vision), expense categorization, and assistant chat.
//!
//! # Architecture
//!
//! - `AiBackend` trait: defines the interface for all AI operations
//! - `AiClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAiCompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai, mock). Default: openai
//! - `AI_HOST`: Server URL (default: https://api.openai.com)
//! - `AI_MODEL`: Model name (default: gpt-4o)
//! - `AI_API_KEY`: API key if required

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use openai_compatible::OpenAiCompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all AI backends
///
/// Backends must be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Extract structured data from a receipt image
    async fn extract_receipt(&self, image_data: &[u8], mime_type: &str)
        -> Result<ExtractedReceipt>;

    /// Extract structured data from receipt-like text (imported email bodies)
    async fn extract_receipt_text(&self, text: &str) -> Result<ExtractedReceipt>;

    /// Categorize an expense by description and vendor
    async fn categorize_expense(&self, description: &str, vendor: &str)
        -> Result<CategorySuggestion>;

    /// Answer a user query given a financial context block
    async fn chat(&self, context: &str, query: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AiClient {
    /// OpenAI-compatible backend (hosted API, vLLM, LocalAI, llama-server, etc.)
    OpenAiCompatible(OpenAiCompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AiClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use:
    /// - `openai` (default): Uses AI_HOST, AI_MODEL, AI_API_KEY
    /// - `mock`: Creates a mock backend for testing
    ///
    /// Returns None if the required environment variables are not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai".to_string());

        match backend.to_lowercase().as_str() {
            "openai" | "openai_compatible" | "vllm" | "localai" | "llamacpp" => {
                OpenAiCompatibleBackend::from_env().map(AiClient::OpenAiCompatible)
            }
            "mock" => Some(AiClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai");
                OpenAiCompatibleBackend::from_env().map(AiClient::OpenAiCompatible)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AiClient::Mock(MockBackend::new())
    }

    /// Create a mock backend that fails every call
    pub fn mock_unhealthy() -> Self {
        AiClient::Mock(MockBackend::unhealthy())
    }
}

// Implement AiBackend for AiClient by delegating to the inner backend
#[async_trait]
impl AiBackend for AiClient {
    async fn extract_receipt(
        &self,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedReceipt> {
        match self {
            AiClient::OpenAiCompatible(b) => b.extract_receipt(image_data, mime_type).await,
            AiClient::Mock(b) => b.extract_receipt(image_data, mime_type).await,
        }
    }

    async fn extract_receipt_text(&self, text: &str) -> Result<ExtractedReceipt> {
        match self {
            AiClient::OpenAiCompatible(b) => b.extract_receipt_text(text).await,
            AiClient::Mock(b) => b.extract_receipt_text(text).await,
        }
    }

    async fn categorize_expense(
        &self,
        description: &str,
        vendor: &str,
    ) -> Result<CategorySuggestion> {
        match self {
            AiClient::OpenAiCompatible(b) => b.categorize_expense(description, vendor).await,
            AiClient::Mock(b) => b.categorize_expense(description, vendor).await,
        }
    }

    async fn chat(&self, context: &str, query: &str) -> Result<String> {
        match self {
            AiClient::OpenAiCompatible(b) => b.chat(context, query).await,
            AiClient::Mock(b) => b.chat(context, query).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AiClient::OpenAiCompatible(b) => b.health_check().await,
            AiClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AiClient::OpenAiCompatible(b) => b.model(),
            AiClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AiClient::OpenAiCompatible(b) => b.host(),
            AiClient::Mock(b) => b.host(),
        }
    }
}
