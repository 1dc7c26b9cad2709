//! pychat: OpenAI chat completions through a Python script
//!
//! [`ChatCompletionAdapter`] resolves credentials from layered configuration,
//! forwards each prompt to a bundled Python script and normalizes the result.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::too_many_lines)]

pub mod cli;
pub mod config;
pub mod error;
pub mod messages;
pub mod providers;
pub mod runtime;

// Re-exports for convenience
pub use error::{PyChatError, Result};
pub use providers::{ApiProvider, ChatCompletionAdapter, ProviderResponse};
