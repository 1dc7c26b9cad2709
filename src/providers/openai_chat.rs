//! OpenAI chat completions through a Python script
//!
//! The adapter resolves credentials and the endpoint, merges them with the
//! user's config into the call options, and hands the prompt to the bundled
//! `openai_chat.py` script. The script's `token_usage` comes back to callers
//! as `tokenUsage`.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, debug_span, warn, Instrument};

use super::{
    script::{ScriptProvider, ScriptProviderOptions},
    ApiProvider, CallContext, ProviderResponse,
};
use crate::{
    config::{
        env::{resolve_layered, OPENAI_API_KEY, OPENAI_API_URL, OPENAI_ORGANIZATION},
        AdapterConfig, EnvOverrides, EnvSource, ProcessEnv, ProviderOptions,
    },
    error::Result,
    runtime::ScriptRunner,
};

/// Script the adapter runs, relative to the bundled script directory
pub const SCRIPT_NAME: &str = "openai_chat.py";

/// Function called inside [`SCRIPT_NAME`]
pub const ENTRY_POINT: &str = "call_api";

/// Endpoint used when neither overrides nor the environment set one
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

const ID_PREFIX: &str = "openai";
const ID_MARKER: &str = "python";

/// Directory holding the bundled Python scripts
pub static BUNDLED_SCRIPT_DIR: Lazy<PathBuf> =
    Lazy::new(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("python"));

/// Construction options for [`ChatCompletionAdapter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOptions {
    pub config: Option<AdapterConfig>,
    pub id: Option<String>,
    pub env: Option<EnvOverrides>,
}

impl From<ProviderOptions> for AdapterOptions {
    fn from(options: ProviderOptions) -> Self {
        Self {
            config: Some(options.config),
            id: options.id,
            env: options.env,
        }
    }
}

/// Options sent to the script with every call
///
/// Keys keep insertion order: the computed credentials, endpoint and model
/// first, then the user's config entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallOptions(IndexMap<String, Value>);

impl CallOptions {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Copy with the API key masked, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(Value::String(key)) = copy.0.get_mut("api_key") {
            if !key.is_empty() {
                *key = "***".to_string();
            }
        }
        copy
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect())
    }
}

/// Merge computed defaults with config entries
///
/// `computed` is applied first and `config` second, so a config entry with
/// the same key replaces the computed value.
#[must_use]
pub fn merge_call_options(
    computed: impl IntoIterator<Item = (String, Value)>,
    config: IndexMap<String, Value>,
) -> CallOptions {
    let mut merged: IndexMap<String, Value> = computed.into_iter().collect();
    for (key, value) in config {
        merged.insert(key, value);
    }
    CallOptions(merged)
}

/// OpenAI chat-completion provider backed by `openai_chat.py`
pub struct ChatCompletionAdapter {
    model_name: String,
    id: Option<String>,
    env: Option<EnvOverrides>,
    base: ScriptProvider,
    env_source: Arc<dyn EnvSource>,
}

impl ChatCompletionAdapter {
    /// Create an adapter for `model_name`
    ///
    /// No I/O happens here; the script is only located when called.
    #[must_use]
    pub fn new(model_name: impl Into<String>, options: AdapterOptions) -> Self {
        let config = AdapterConfig {
            base_path: Some(BUNDLED_SCRIPT_DIR.clone()),
            ..options.config.unwrap_or_default()
        };

        let base = ScriptProvider::new(
            SCRIPT_NAME,
            ScriptProviderOptions {
                id: options.id.clone(),
                config,
                function_name: Some(ENTRY_POINT.to_string()),
            },
        );

        Self {
            model_name: model_name.into(),
            id: options.id,
            env: options.env,
            base,
            env_source: Arc::new(ProcessEnv),
        }
    }

    /// Replace the script runner
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.base = self.base.with_runner(runner);
        self
    }

    /// Replace the environment consulted after the overrides
    #[must_use]
    pub fn with_env_source(mut self, env_source: Arc<dyn EnvSource>) -> Self {
        self.env_source = env_source;
        self
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The config the script sees, with `basePath` injected
    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        self.base.config()
    }

    #[must_use]
    pub fn resolve_api_key(&self) -> String {
        resolve_layered(OPENAI_API_KEY, self.env.as_ref(), self.env_source.as_ref(), "")
    }

    #[must_use]
    pub fn resolve_organization(&self) -> String {
        resolve_layered(
            OPENAI_ORGANIZATION,
            self.env.as_ref(),
            self.env_source.as_ref(),
            "",
        )
    }

    #[must_use]
    pub fn resolve_api_url(&self) -> String {
        resolve_layered(
            OPENAI_API_URL,
            self.env.as_ref(),
            self.env_source.as_ref(),
            DEFAULT_API_URL,
        )
    }

    /// Build the options for one call
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be represented as JSON
    pub fn build_call_options(&self) -> Result<CallOptions> {
        let computed = [
            ("api_key", Value::String(self.resolve_api_key())),
            ("organization", Value::String(self.resolve_organization())),
            ("base_url", Value::String(self.resolve_api_url())),
            ("model", Value::String(self.model_name.clone())),
        ]
        .map(|(key, value)| (key.to_string(), value));

        Ok(merge_call_options(computed, self.config().to_entries()?))
    }
}

#[async_trait]
impl ApiProvider for ChatCompletionAdapter {
    fn id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{ID_PREFIX}:{ID_MARKER}:{}", self.model_name))
    }

    async fn call_api(&self, prompt: &str, context: Option<CallContext>) -> ProviderResponse {
        let span = debug_span!("call_api", provider = %self.id());

        async move {
            let options = match self.build_call_options() {
                Ok(options) => options,
                Err(err) => return ProviderResponse::from_error(&err),
            };
            debug!(
                model = %self.model_name,
                keys = ?options.keys().collect::<Vec<_>>(),
                "built call options"
            );

            let context = context
                .unwrap_or_default()
                .with("options", options.into_value());

            let response = match self.base.call_api(prompt, context).await {
                Ok(raw) => ProviderResponse::from(raw),
                Err(err) => ProviderResponse::from_error(&err),
            };

            if let Some(error) = &response.error {
                warn!(error = %error, error_type = ?response.error_type, "provider returned an error");
            }

            response
        }
        .instrument(span)
        .await
    }
}
