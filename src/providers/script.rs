//! Generic script-backed provider
//!
//! Resolves a script descriptor (`file://path/to/script.py:function`) to a
//! concrete file and function, then runs it through a [`ScriptRunner`] with
//! `[prompt, provider options, context]` as arguments.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde_json::{json, Value};
use tracing::debug;

use super::{CallContext, RawResult};
use crate::{
    config::AdapterConfig,
    error::{PyChatError, Result},
    runtime::{PythonRunner, RunOptions, ScriptRunner},
};

/// Function called when the descriptor and options name none
pub const DEFAULT_FUNCTION_NAME: &str = "call_api";

/// A parsed script descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    pub path: PathBuf,
    pub function_name: Option<String>,
}

/// Parse `[file://]path[:function]`
///
/// The suffix after the last `:` is only taken as a function name when it is
/// a valid identifier, so Windows drive letters are left alone.
#[must_use]
pub fn parse_script_descriptor(descriptor: &str) -> ScriptDescriptor {
    let trimmed = descriptor.strip_prefix("file://").unwrap_or(descriptor);

    if let Some((path, function)) = trimmed.rsplit_once(':') {
        if !path.is_empty() && is_identifier(function) {
            return ScriptDescriptor {
                path: PathBuf::from(path),
                function_name: Some(function.to_string()),
            };
        }
    }

    ScriptDescriptor {
        path: PathBuf::from(trimmed),
        function_name: None,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Options for a [`ScriptProvider`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptProviderOptions {
    /// Identity override
    pub id: Option<String>,

    /// Config forwarded to the script
    pub config: AdapterConfig,

    /// Function to call when the descriptor does not name one
    pub function_name: Option<String>,
}

/// Provider that answers prompts by calling a script function
pub struct ScriptProvider {
    declared_path: PathBuf,
    script_path: PathBuf,
    function_name: String,
    options: ScriptProviderOptions,
    runner: Arc<dyn ScriptRunner>,
}

impl ScriptProvider {
    /// Create a provider for `descriptor`, run with the local Python interpreter
    #[must_use]
    pub fn new(descriptor: &str, options: ScriptProviderOptions) -> Self {
        let parsed = parse_script_descriptor(descriptor);

        let function_name = parsed
            .function_name
            .or_else(|| options.function_name.clone())
            .unwrap_or_else(|| DEFAULT_FUNCTION_NAME.to_string());

        let script_path = match &options.config.base_path {
            Some(base) if parsed.path.is_relative() => base.join(&parsed.path),
            _ => parsed.path.clone(),
        };

        Self {
            declared_path: parsed.path,
            script_path,
            function_name,
            options,
            runner: Arc::new(PythonRunner::new()),
        }
    }

    /// Replace the script runner
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Identifier: the `id` option, or one derived from the script
    #[must_use]
    pub fn id(&self) -> String {
        self.options.id.clone().unwrap_or_else(|| {
            format!(
                "python:{}:{}",
                self.declared_path.display(),
                self.function_name
            )
        })
    }

    #[must_use]
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.options.config
    }

    fn run_options(&self) -> RunOptions {
        let config = &self.options.config;
        RunOptions {
            python_executable: config.python_executable.clone(),
            timeout: config.timeout_ms.map(Duration::from_millis),
            working_dir: None,
        }
    }

    /// Run the script function on `prompt`
    ///
    /// # Errors
    ///
    /// Returns an error if the runner fails or the script returns something
    /// other than a JSON object
    pub async fn call_api(&self, prompt: &str, context: CallContext) -> Result<RawResult> {
        let provider_options = json!({
            "id": self.id(),
            "config": self.options.config,
        });
        let args = vec![
            Value::String(prompt.to_string()),
            provider_options,
            Value::Object(context.into_inner()),
        ];

        debug!(
            script = %self.script_path.display(),
            function = %self.function_name,
            "calling script provider"
        );

        let value = self
            .runner
            .run(&self.script_path, &self.function_name, args, &self.run_options())
            .await?;

        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            other => Err(PyChatError::InvalidScriptOutput(format!(
                "expected a JSON object from {}, got {other}",
                self.function_name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MockRunner;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_path() {
        assert_eq!(
            parse_script_descriptor("openai_chat.py"),
            ScriptDescriptor {
                path: PathBuf::from("openai_chat.py"),
                function_name: None,
            }
        );
    }

    #[test]
    fn test_parse_file_url_with_function() {
        assert_eq!(
            parse_script_descriptor("file://openai_chat.py:call_api"),
            ScriptDescriptor {
                path: PathBuf::from("openai_chat.py"),
                function_name: Some("call_api".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_windows_drive_letter() {
        let parsed = parse_script_descriptor(r"C:\scripts\chat.py");
        assert_eq!(parsed.path, PathBuf::from(r"C:\scripts\chat.py"));
        assert_eq!(parsed.function_name, None);

        let parsed = parse_script_descriptor(r"C:\scripts\chat.py:run");
        assert_eq!(parsed.path, PathBuf::from(r"C:\scripts\chat.py"));
        assert_eq!(parsed.function_name.as_deref(), Some("run"));
    }

    #[test]
    fn test_function_name_precedence() {
        let options = ScriptProviderOptions {
            function_name: Some("from_options".to_string()),
            ..ScriptProviderOptions::default()
        };
        let provider = ScriptProvider::new("chat.py:from_descriptor", options.clone());
        assert_eq!(provider.function_name(), "from_descriptor");

        let provider = ScriptProvider::new("chat.py", options);
        assert_eq!(provider.function_name(), "from_options");

        let provider = ScriptProvider::new("chat.py", ScriptProviderOptions::default());
        assert_eq!(provider.function_name(), DEFAULT_FUNCTION_NAME);
    }

    #[test]
    fn test_relative_path_joins_base_path() {
        let options = ScriptProviderOptions {
            config: AdapterConfig {
                base_path: Some(PathBuf::from("/opt/scripts")),
                ..AdapterConfig::default()
            },
            ..ScriptProviderOptions::default()
        };

        let provider = ScriptProvider::new("chat.py", options.clone());
        assert_eq!(provider.script_path(), Path::new("/opt/scripts/chat.py"));

        let provider = ScriptProvider::new("/elsewhere/chat.py", options);
        assert_eq!(provider.script_path(), Path::new("/elsewhere/chat.py"));
    }

    #[test]
    fn test_default_id() {
        let provider = ScriptProvider::new("file://chat.py:run", ScriptProviderOptions::default());
        assert_eq!(provider.id(), "python:chat.py:run");

        let provider = ScriptProvider::new(
            "chat.py",
            ScriptProviderOptions {
                id: Some("custom".to_string()),
                ..ScriptProviderOptions::default()
            },
        );
        assert_eq!(provider.id(), "custom");
    }

    #[tokio::test]
    async fn test_call_passes_prompt_options_and_context() {
        let runner = Arc::new(MockRunner::returning(json!({"output": "ok"})));
        let options = ScriptProviderOptions {
            config: AdapterConfig {
                temperature: Some(0.5),
                python_executable: Some("python3.12".to_string()),
                timeout_ms: Some(2500),
                ..AdapterConfig::default()
            },
            ..ScriptProviderOptions::default()
        };
        let provider = ScriptProvider::new("chat.py", options).with_runner(runner.clone());

        let context = CallContext::new().with("vars", json!({"topic": "rust"}));
        let raw = provider.call_api("hello", context).await.unwrap();
        assert_eq!(raw.output, Some(json!("ok")));

        let call = runner.only_call();
        assert_eq!(call.script_path, PathBuf::from("chat.py"));
        assert_eq!(call.function_name, "call_api");
        assert_eq!(call.args[0], json!("hello"));
        assert_eq!(call.args[1]["config"]["temperature"], json!(0.5));
        assert_eq!(call.args[2], json!({"vars": {"topic": "rust"}}));
        assert_eq!(call.options.python_executable.as_deref(), Some("python3.12"));
        assert_eq!(call.options.timeout, Some(Duration::from_millis(2500)));
    }

    #[tokio::test]
    async fn test_non_object_result_is_rejected() {
        let runner = Arc::new(MockRunner::returning(json!("just a string")));
        let provider = ScriptProvider::new("chat.py", ScriptProviderOptions::default())
            .with_runner(runner);

        let err = provider.call_api("hello", CallContext::new()).await.unwrap_err();
        assert!(matches!(err, PyChatError::InvalidScriptOutput(_)));
    }

    #[tokio::test]
    async fn test_runner_errors_propagate() {
        let runner = Arc::new(MockRunner::failing(PyChatError::Timeout(
            Duration::from_millis(10),
        )));
        let provider = ScriptProvider::new("chat.py", ScriptProviderOptions::default())
            .with_runner(runner);

        let err = provider.call_api("hello", CallContext::new()).await.unwrap_err();
        assert!(matches!(err, PyChatError::Timeout(_)));
    }
}
