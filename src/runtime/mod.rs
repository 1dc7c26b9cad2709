//! Script execution
//!
//! A [`ScriptRunner`] runs one function of an external script with JSON
//! arguments and hands back its JSON result. [`python::PythonRunner`] is the
//! process-backed implementation; tests substitute their own.

pub mod python;
#[cfg(test)]
pub(crate) mod testing;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use self::python::PythonRunner;

/// Per-invocation runtime options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Interpreter command, possibly with arguments (`uv run python`)
    pub python_executable: Option<String>,

    /// Kill the script if it runs longer than this
    pub timeout: Option<Duration>,

    /// Working directory for the script process
    pub working_dir: Option<PathBuf>,
}

/// Runs a named function in an external script
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Call `function_name` in `script_path` with positional `args`
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be started, fails, times out,
    /// or produces no parseable result
    async fn run(
        &self,
        script_path: &Path,
        function_name: &str,
        args: Vec<Value>,
        options: &RunOptions,
    ) -> Result<Value>;
}
