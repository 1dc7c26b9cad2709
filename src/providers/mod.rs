//! Provider layer
//!
//! This module provides:
//! - [`ApiProvider`], the interface callers use to run a prompt
//! - [`script::ScriptProvider`], a generic provider backed by a script function
//! - [`openai_chat::ChatCompletionAdapter`], OpenAI chat completions through a bundled Python script

pub mod openai_chat;
pub mod script;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PyChatError;

pub use self::{
    openai_chat::{AdapterOptions, ChatCompletionAdapter},
    script::{ScriptProvider, ScriptProviderOptions},
};

/// Caller-supplied metadata forwarded to the script unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallContext(Map<String, Value>);

impl CallContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for CallContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Field the script reports usage under
const SCRIPT_USAGE_FIELD: &str = "token_usage";

/// Field callers read usage from
const USAGE_FIELD: &str = "tokenUsage";

/// A script's result exactly as it returned it
///
/// Values are kept as raw JSON: usage counters, error payloads and any
/// other field pass through whatever their shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<Value>,

    /// Anything else the script returned (`cached`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The result handed back to callers
///
/// Same content as [`RawResult`], with usage reported as `tokenUsage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<Value>,

    #[serde(
        rename = "tokenUsage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_usage: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProviderResponse {
    /// Response describing a failure that happened before the script could answer
    #[must_use]
    pub fn from_error(err: &PyChatError) -> Self {
        Self {
            error: Some(Value::String(err.to_string())),
            error_type: Some(Value::String(err.error_type().to_string())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The error as text, if the script reported it as a string
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(Value::as_str)
    }

    /// The error category, if it is a string
    #[must_use]
    pub fn error_kind(&self) -> Option<&str> {
        self.error_type.as_ref().and_then(Value::as_str)
    }

    /// The output as text, if it is a string
    #[must_use]
    pub fn output_text(&self) -> Option<&str> {
        self.output.as_ref().and_then(Value::as_str)
    }
}

impl From<RawResult> for ProviderResponse {
    fn from(raw: RawResult) -> Self {
        let RawResult {
            output,
            error,
            error_type,
            mut token_usage,
            mut extra,
        } = raw;

        // A script-supplied `tokenUsage` is replaced by the renamed usage,
        // or kept as the usage when there is nothing to rename.
        let existing = extra.remove(USAGE_FIELD);
        if token_usage.is_none() {
            token_usage = existing;
        }
        extra.remove(SCRIPT_USAGE_FIELD);

        Self {
            output,
            error,
            error_type,
            token_usage,
            extra,
        }
    }
}

/// Anything that can answer a prompt
#[async_trait]
pub trait ApiProvider: Send + Sync {
    /// Stable identifier for this provider instance
    fn id(&self) -> String;

    /// Run a prompt
    ///
    /// Failures are reported through [`ProviderResponse::error`], never as a panic
    /// or an `Err`.
    async fn call_api(&self, prompt: &str, context: Option<CallContext>) -> ProviderResponse;
}
