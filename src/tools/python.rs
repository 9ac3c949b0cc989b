use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs a Python snippet in a child `python3` process.
///
/// The code is fed through stdin and the child is killed if it outlives
/// `timeout`. No further isolation is applied.
pub struct PythonRepl {
    interpreter: String,
    timeout: Duration,
}

impl Default for PythonRepl {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PythonRepl {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    async fn run(&self, code: &str) -> Result<Value> {
        let mut child = Command::new(&self.interpreter)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::BackendUnavailable(format!("Failed to start {}: {}", self.interpreter, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(code.as_bytes())
                .await
                .map_err(|e| AppError::Internal(format!("Failed to send code: {}", e)))?;
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| AppError::Internal(format!("Execution error: {}", e)))?,
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Python execution timed out");
                return Ok(json!({
                    "output": format!("Code execution timed out after {} seconds", self.timeout.as_secs()),
                    "exit_status": -1
                }));
            }
        };

        let exit_status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if exit_status == 0 {
            stdout.into_owned()
        } else {
            format!("{}{}", stdout, stderr)
        };

        Ok(json!({ "output": text, "exit_status": exit_status }))
    }
}

#[async_trait]
impl Tool for PythonRepl {
    fn name(&self) -> &str {
        "python_repl"
    }

    fn description(&self) -> &str {
        "Execute a Python snippet and return its output"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string" }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let code = args
            .get("code")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Missing 'code' parameter".to_string()))?;

        self.run(code).await
    }
}
