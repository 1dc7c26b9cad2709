//! CLI argument parsing and command routing

use std::{fs, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::{
    config::{EnvOverrides, ProviderOptions},
    error::{PyChatError, Result},
    messages::{validate_messages, ChatPrompt},
    providers::ChatCompletionAdapter,
};

/// pychat: OpenAI chat completions through a Python script
#[derive(Debug, Parser)]
#[command(name = "pychat")]
#[command(about = "OpenAI chat completions through a Python script", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one prompt and print the response as JSON
    Call {
        /// Prompt text, or a JSON array of {role, content} messages
        #[arg(required_unless_present = "messages")]
        prompt: Option<String>,

        /// Read the prompt from a JSON file of messages
        #[arg(long, conflicts_with = "prompt")]
        messages: Option<PathBuf>,

        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Print the options a call would send (API key redacted)
    Options {
        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Show version information
    Version,
}

/// Arguments shared by commands that build a provider
#[derive(Debug, Clone, Args)]
pub struct ProviderArgs {
    /// Model to request
    #[arg(short, long, env = "PYCHAT_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Provider options file (.json, .yaml, .yml or .toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Provider id override
    #[arg(long)]
    pub id: Option<String>,

    /// Environment override, may be repeated
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Python interpreter command
    #[arg(long)]
    pub python: Option<String>,

    /// Kill the script after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl ProviderArgs {
    /// Provider options from the config file with CLI flags applied on top
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded
    pub fn provider_options(&self) -> Result<ProviderOptions> {
        let mut options = match &self.config {
            Some(path) => ProviderOptions::load_from_path(path)?,
            None => ProviderOptions::default(),
        };

        if let Some(id) = &self.id {
            options.id = Some(id.clone());
        }
        if !self.env.is_empty() {
            let mut env = options.env.take().unwrap_or_default();
            env.extend(self.env.iter().cloned().collect::<EnvOverrides>());
            options.env = Some(env);
        }
        if let Some(python) = &self.python {
            options.config.python_executable = Some(python.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            options.config.timeout_ms = Some(timeout_ms);
        }

        Ok(options)
    }

    /// Build the adapter these arguments describe
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded
    pub fn build_adapter(&self) -> Result<ChatCompletionAdapter> {
        Ok(ChatCompletionAdapter::new(
            self.model.clone(),
            self.provider_options()?.into(),
        ))
    }
}

impl Cli {
    /// Parse CLI arguments from environment
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parse a `KEY=VALUE` pair
fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Resolve the prompt string for `call`
///
/// Message prompts are validated here so malformed input fails before a
/// script process is started. A valid messages file is forwarded as written.
///
/// # Errors
///
/// Returns an error if the messages file cannot be read or holds invalid messages
pub fn read_prompt(prompt: Option<String>, messages: Option<PathBuf>) -> Result<String> {
    if let Some(path) = messages {
        let contents = fs::read_to_string(&path)?;
        let Value::Array(items) = serde_json::from_str::<Value>(&contents)? else {
            return Err(PyChatError::InvalidMessages(format!(
                "{} must contain a JSON array",
                path.display()
            )));
        };
        validate_messages(&items)?;
        return Ok(contents);
    }

    let prompt = prompt.ok_or_else(|| PyChatError::InvalidInput("no prompt given".to_string()))?;
    ChatPrompt::parse(&prompt)?;
    Ok(prompt)
}
