//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the switchboard CLI.

use crate::types::{HealthStatus, OverallHealth, SessionLifecycle, SessionStatus, TaskResponse};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the name and version line
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n  {} {}",
                "switchboard".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n  switchboard v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a directory creation message
    pub fn created_dir(&self, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                "directory".dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] directory {}", path);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<20}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 21).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 21));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<20}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }

    /// Print the reply to a task, or its error.
    pub fn task_response(&self, response: &TaskResponse) {
        let worker = response.worker_id.as_deref().unwrap_or("-");

        if response.success {
            if self.colored {
                println!("\n  {} {}", format!("[{}]", worker).cyan().bold(), response.response_text);
            } else {
                println!("\n  [{}] {}", worker, response.response_text);
            }
            if let Some(sources) = response.metadata.get("sources").and_then(|v| v.as_array()) {
                for source in sources.iter().filter_map(|s| s.as_str()) {
                    self.list_item(source);
                }
            }
            return;
        }

        let kind = response
            .error
            .map(|k| k.as_str().to_string())
            .unwrap_or_else(|| "Error".to_string());
        let detail = response.message.as_deref().unwrap_or(&response.response_text);
        self.error(&format!("{}: {}", kind, detail));
    }

    /// Print an engine health report
    pub fn health(&self, health: &HealthStatus) {
        self.header("Health");
        let overall = match health.overall {
            OverallHealth::Healthy => "healthy",
            OverallHealth::Degraded => "degraded",
            OverallHealth::Unhealthy => "unhealthy",
        };
        if self.colored {
            let painted = match health.overall {
                OverallHealth::Healthy => overall.green().bold().to_string(),
                OverallHealth::Degraded => overall.yellow().bold().to_string(),
                OverallHealth::Unhealthy => overall.red().bold().to_string(),
            };
            println!("    {}: {}", "overall".dimmed(), painted);
        } else {
            self.kv("overall", overall);
        }
        self.kv("active sessions", &health.active_sessions.to_string());
        self.kv("checked at", &health.checked_at.to_rfc3339());

        self.subheader("Circuit breakers");
        self.table_header(&["Breaker", "State"]);
        for (name, state) in &health.breakers {
            self.table_row(&[name, state.as_str()]);
        }
    }

    /// Print worker ids with their capabilities
    pub fn capabilities(&self, capabilities: &BTreeMap<String, Vec<String>>) {
        self.header("Workers");
        for (worker, items) in capabilities {
            self.subheader(worker);
            for item in items {
                self.list_item(item);
            }
        }
    }

    /// Print a session summary
    pub fn session_status(&self, status: &SessionStatus) {
        self.header("Session");
        self.kv("id", &status.session_id);
        if status.status == SessionLifecycle::NotFound {
            self.kv("status", "not found");
            return;
        }
        self.kv("status", "active");
        self.kv("iterations", &status.iteration_count.to_string());
        self.kv("workers used", &status.worker_count.to_string());
        if let Some(worker) = &status.current_worker {
            self.kv("current worker", worker);
        }
        if let Some(at) = status.last_activity_at {
            self.kv("last activity", &at.to_rfc3339());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::BreakerState;
    use crate::types::AppError;
    use chrono::Utc;

    #[test]
    fn test_output_new() {
        assert!(Output::new().colored);
        assert!(Output::default().colored);
        assert!(!Output::no_color().colored);
    }

    #[test]
    fn test_table_formatting_no_panic() {
        let output = Output::no_color();
        output.table_header(&["Breaker", "State"]);
        output.table_header(&[]);
        output.table_row(&["inference", "CLOSED"]);
        output.table_row(&[]);
    }

    #[test]
    fn test_output_methods_no_panic() {
        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("test success");
            output.info("test info");
            output.warning("test warning");
            output.error("test error");
            output.created("file", "path/to/file");
            output.skipped("path", "reason");
            output.created_dir("some/dir");
            output.header("Test Header");
            output.subheader("Test Subheader");
            output.kv("key", "value");
            output.list_item("item");
            output.hint("hint message");
            output.command("some command");
            output.complete("complete message");
            output.newline();
        }
    }

    #[test]
    fn test_report_printers_no_panic() {
        let output = Output::no_color();

        let mut metadata = serde_json::Map::new();
        metadata.insert("sources".to_string(), serde_json::json!(["https://a.example"]));
        output.task_response(&TaskResponse::succeeded(
            "s1",
            "search",
            "Found it.".to_string(),
            metadata,
        ));
        output.task_response(&TaskResponse::failed(
            "s1",
            None,
            &AppError::InvalidInput("empty".to_string()),
        ));

        let mut breakers = BTreeMap::new();
        breakers.insert("inference".to_string(), BreakerState::Open);
        output.health(&HealthStatus {
            overall: OverallHealth::Unhealthy,
            breakers,
            active_sessions: 2,
            checked_at: Utc::now(),
        });

        let mut caps = BTreeMap::new();
        caps.insert("calendar".to_string(), vec!["scheduling".to_string()]);
        output.capabilities(&caps);

        output.session_status(&SessionStatus {
            status: SessionLifecycle::NotFound,
            session_id: "missing".to_string(),
            current_worker: None,
            iteration_count: 0,
            worker_count: 0,
            last_activity_at: None,
        });
    }
}
