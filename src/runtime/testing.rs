//! Test doubles for [`ScriptRunner`]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{RunOptions, ScriptRunner};
use crate::error::{PyChatError, Result};

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub script_path: PathBuf,
    pub function_name: String,
    pub args: Vec<Value>,
    pub options: RunOptions,
}

/// Returns a canned result and records every call
pub struct MockRunner {
    response: Mutex<Option<Result<Value>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockRunner {
    /// Always answer with `value`
    pub fn returning(value: Value) -> Self {
        Self {
            response: Mutex::new(Some(Ok(value))),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first call with `err`
    pub fn failing(err: PyChatError) -> Self {
        Self {
            response: Mutex::new(Some(Err(err))),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// The single recorded call
    pub fn only_call(&self) -> RecordedCall {
        let calls = self.calls();
        assert_eq!(calls.len(), 1, "expected exactly one call");
        calls.into_iter().next().unwrap()
    }
}

#[async_trait]
impl ScriptRunner for MockRunner {
    async fn run(
        &self,
        script_path: &Path,
        function_name: &str,
        args: Vec<Value>,
        options: &RunOptions,
    ) -> Result<Value> {
        self.calls.lock().push(RecordedCall {
            script_path: script_path.to_path_buf(),
            function_name: function_name.to_string(),
            args,
            options: options.clone(),
        });

        let mut response = self.response.lock();
        match response.as_ref() {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(_)) => response.take().unwrap_or_else(|| Ok(Value::Null)),
            None => Err(PyChatError::Other("mock runner already failed".to_string())),
        }
    }
}
