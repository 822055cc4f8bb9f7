//! Natural-language extraction capabilities.
//!
//! A capability turns free text into a raw JSON object. It makes no promise
//! about the shape of that object; `procura_core::extraction` normalizes it
//! and reports what it could not use as issues.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use procura_core::error::CoreError;
use procura_core::requirements::Requirements;

pub mod ollama;
pub mod rules;

pub use ollama::OllamaCapability;
pub use rules::RuleCapability;

/// Shared handle to a configured capability.
pub type SharedCapability = Arc<dyn ExtractionCapability>;

#[async_trait]
pub trait ExtractionCapability: Send + Sync {
    /// Short name for logs and issue messages.
    fn name(&self) -> &'static str;

    /// Raw RFP object: `title`, `description`, `requirements`, `budget`,
    /// `deadline`.
    async fn extract_rfp(&self, text: &str) -> Result<Value, CoreError>;

    /// Raw proposal object: `price`, `price_currency`, `delivery_time`,
    /// `warranty`, `payment_terms`, `specifications`, `special_conditions`.
    ///
    /// `requirements` names the specification keys worth looking for.
    async fn extract_proposal(
        &self,
        text: &str,
        requirements: &Requirements,
    ) -> Result<Value, CoreError>;
}

/// Cut the JSON object out of a model reply: from the first `{` to the
/// last `}`. Returns the reply as a JSON string when no object parses, so
/// the normalizer can report it as a non-object payload.
pub fn cut_json_object(reply: &str) -> Value {
    let start = reply.find('{');
    let end = reply.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&reply[start..=end]) {
                return value;
            }
        }
    }
    Value::String(reply.trim().to_string())
}
