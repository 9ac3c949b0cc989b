use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::Local;
use parking_lot::RwLock;
use serde_json::{json, Value};

/// In-memory assistant journal with timestamped entries.
#[derive(Default)]
pub struct Journal {
    entries: RwLock<Vec<String>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Tool for Journal {
    fn name(&self) -> &str {
        "journal"
    }

    fn description(&self) -> &str {
        "Add entries to, read, or clear the assistant journal"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "read", "clear"],
                    "default": "add"
                },
                "entry": { "type": "string" }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let operation = args["operation"].as_str().unwrap_or("add");

        match operation {
            "add" => {
                let entry = args["entry"]
                    .as_str()
                    .filter(|e| !e.trim().is_empty())
                    .ok_or_else(|| AppError::InvalidInput("Missing 'entry' parameter".to_string()))?;
                let line = format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), entry);
                self.entries.write().push(line.clone());
                Ok(json!({ "output": line, "exit_status": 0 }))
            }
            "read" => {
                let entries = self.entries.read();
                let output = if entries.is_empty() {
                    "Journal is empty".to_string()
                } else {
                    entries.join("\n")
                };
                Ok(json!({ "output": output, "exit_status": 0 }))
            }
            "clear" => {
                let removed = {
                    let mut entries = self.entries.write();
                    let n = entries.len();
                    entries.clear();
                    n
                };
                Ok(json!({ "output": format!("Cleared {} entries", removed), "exit_status": 0 }))
            }
            other => Err(AppError::InvalidInput(format!(
                "Unknown journal operation: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_read_clear() {
        let journal = Journal::new();
        journal
            .execute(json!({"operation": "add", "entry": "met with Ana"}))
            .await
            .unwrap();
        assert_eq!(journal.len(), 1);

        let read = journal.execute(json!({"operation": "read"})).await.unwrap();
        assert!(read["output"].as_str().unwrap().ends_with("met with Ana"));

        journal.execute(json!({"operation": "clear"})).await.unwrap();
        assert!(journal.is_empty());
    }

    #[tokio::test]
    async fn test_empty_entry_rejected() {
        let journal = Journal::new();
        let result = journal.execute(json!({"entry": "  "})).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
