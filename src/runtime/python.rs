//! PythonRunner - run a Python function in a child process
//!
//! The bundled wrapper is passed to the interpreter with `-c`. It receives
//! the call on stdin and prints the result on stdout behind a per-call
//! marker, so anything else the script prints is ignored.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{RunOptions, ScriptRunner};
use crate::error::{PyChatError, Result};

/// Environment variable naming the interpreter to use
pub const PYTHON_ENV: &str = "PYCHAT_PYTHON";

const WRAPPER_SOURCE: &str = include_str!("../../python/wrapper.py");
const MAX_STDERR_LENGTH: usize = 4000;

/// Interpreter used when nothing else is configured
#[must_use]
pub const fn default_python() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// Runs scripts with a local Python interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonRunner;

impl PythonRunner {
    /// Create a new runner
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Work out the interpreter program and its leading arguments
    fn resolve_interpreter(options: &RunOptions) -> Result<(String, Vec<String>)> {
        let raw = options
            .python_executable
            .clone()
            .filter(|exe| !exe.trim().is_empty())
            .or_else(|| std::env::var(PYTHON_ENV).ok().filter(|exe| !exe.trim().is_empty()))
            .unwrap_or_else(|| default_python().to_string());

        let mut parts = shlex::split(&raw)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| {
                PyChatError::InvalidInput(format!("Cannot parse python executable: {raw}"))
            })?;
        let program = parts.remove(0);

        Ok((program, parts))
    }

    /// Truncate stderr for error messages
    fn truncate_stderr(stderr: &str) -> String {
        let trimmed = stderr.trim();
        match trimmed.char_indices().nth(MAX_STDERR_LENGTH) {
            Some((cut, _)) => format!("{}... <stderr truncated>", &trimmed[..cut]),
            None => trimmed.to_string(),
        }
    }
}

#[async_trait]
impl ScriptRunner for PythonRunner {
    async fn run(
        &self,
        script_path: &Path,
        function_name: &str,
        args: Vec<Value>,
        options: &RunOptions,
    ) -> Result<Value> {
        if tokio::fs::metadata(script_path).await.is_err() {
            return Err(PyChatError::InvalidInput(format!(
                "Script not found: {}",
                script_path.display()
            )));
        }

        let (program, mut interpreter_args) = Self::resolve_interpreter(options)?;
        interpreter_args.push("-c".to_string());
        interpreter_args.push(WRAPPER_SOURCE.to_string());

        let marker = format!("__pychat_result_{}__", Uuid::new_v4().simple());
        let request = json!({
            "script_path": script_path.to_string_lossy(),
            "function_name": function_name,
            "args": args,
            "marker": marker,
        });

        let mut command = Command::new(&program);
        command
            .args(&interpreter_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &options.working_dir {
            command.current_dir(dir);
        }

        debug!(
            program = %program,
            script = %script_path.display(),
            function = function_name,
            "spawning script"
        );

        let mut child = command.spawn().map_err(|source| PyChatError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let payload = serde_json::to_vec(&request)?;

        // The stdin write runs under the timeout as well.
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(&payload).await {
                    // The interpreter died before reading; its exit status says why.
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(PyChatError::from(e));
                    }
                }
                drop(stdin);
            }
            Ok(child.wait_with_output().await?)
        };

        // Dropping the future on timeout drops the child, which kills it.
        let output = match options.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| PyChatError::Timeout(limit))??,
            None => exchange.await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        for line in stderr.lines() {
            debug!(target: "pychat::script", "{line}");
        }

        let mut payload = None;
        for line in stdout.lines() {
            match line.strip_prefix(marker.as_str()) {
                Some(result) => payload = Some(result),
                None if !line.is_empty() => debug!(target: "pychat::script", "{line}"),
                None => {}
            }
        }

        match payload {
            Some(result) => {
                if !output.status.success() {
                    warn!(status = %output.status, "script exited unsuccessfully after producing a result");
                }
                Ok(serde_json::from_str(result)?)
            }
            None if !output.status.success() => Err(PyChatError::ScriptFailed {
                status: output.status,
                stderr: Self::truncate_stderr(&stderr),
            }),
            None => Err(PyChatError::InvalidScriptOutput(format!(
                "{} returned no result from {function_name}",
                script_path.display()
            ))),
        }
    }
}
