//! Init command implementation
//!
//! Writes a commented `switchboard.toml` plus `.env.example` and `.gitignore`.

use super::output::Output;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug)]
pub enum InitResult {
    Success,
    /// switchboard.toml already exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Ollama model to configure
    pub model: String,
    /// Persist sessions in `data/sessions.db` instead of memory
    pub sqlite: bool,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing switchboard");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir(&base_path.display().to_string());
    }

    let config_path = base_path.join("switchboard.toml");
    if config_path.exists() && !config.force {
        output.warning("switchboard.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if config.sqlite {
        let data_dir = base_path.join("data");
        if !data_dir.exists() {
            if let Err(e) = fs::create_dir_all(&data_dir) {
                output.error(&format!("Failed to create data: {}", e));
                return InitResult::Error(e.to_string());
            }
            output.created_dir("data");
        }
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_switchboard_toml(&config), config.force) {
        output.error(&format!("Failed to create switchboard.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "switchboard.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, &generate_env_example(), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    } else {
        output.skipped(".gitignore", "already exists");
    }

    output.complete("switchboard initialized");

    output.header("Next Steps");
    output.newline();
    output.info("1. Start Ollama (if not running):");
    output.command("ollama serve");
    output.command(&format!("ollama pull {}", config.model));
    output.newline();
    output.info("2. Ask something:");
    output.command("switchboard ask \"Schedule a meeting tomorrow 2-3pm\"");
    output.newline();
    output.hint("Run `switchboard chat` for an interactive session");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_switchboard_toml(config: &InitConfig) -> String {
    let persistence = if config.sqlite {
        "backend = \"sqlite\"\npath = \"data/sessions.db\""
    } else {
        "backend = \"memory\"\n# path = \"data/sessions.db\"  # required for backend = \"sqlite\""
    };

    format!(
        r#"# switchboard configuration
# Every value below is the default unless noted; delete what you don't change.

[engine]
# Tasks per session before it must be cleared
max_iterations = 10
# Minimum classifier confidence for a delegation to be accepted
confidence_floor = 0.5
worker_timeout_secs = 30
coordinator = "personal_assistant"
history_window = 10
session_ttl_secs = 3600

[retry]
# Total attempts per task, backoff doubles from base_delay_ms
max_attempts = 3
base_delay_ms = 1000

[breaker]
failure_threshold = 5
reset_timeout_secs = 30
failure_window_secs = 60

[inference]
# Overridden by SWITCHBOARD_OLLAMA_URL / SWITCHBOARD_MODEL
base_url = "http://localhost:11434"
model = "{model}"
max_tokens = 1000
classifier_max_tokens = 300

[search]
enabled = true
max_sources = 5

[persistence]
{persistence}

[logging]
# RUST_LOG takes precedence
level = "info"
json = false
"#,
        model = config.model,
        persistence = persistence,
    )
}

fn generate_env_example() -> String {
    r#"# switchboard environment variables
# Copy this file to .env; values here override switchboard.toml.

# Ollama endpoint and model
# SWITCHBOARD_OLLAMA_URL=http://localhost:11434
# SWITCHBOARD_MODEL=llama3.2:3b

# Logging filter (trace, debug, info, warn, error)
RUST_LOG=info,switchboard=debug
"#
    .to_string()
}

fn generate_gitignore() -> String {
    r#"# switchboard generated files
/data/
*.db
*.db-journal

# Environment
.env
.env.local

# Rust
/target/
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::{PersistenceBackend, SwitchboardConfig};
    use tempfile::TempDir;

    fn create_test_config(temp_dir: &TempDir) -> InitConfig {
        InitConfig {
            path: temp_dir.path().to_path_buf(),
            force: false,
            model: "llama3.2:3b".to_string(),
            sqlite: false,
        }
    }

    #[test]
    fn test_generated_toml_is_valid_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let content = generate_switchboard_toml(&create_test_config(&temp_dir));

        let parsed = SwitchboardConfig::from_toml_str(&content).expect("template must parse");
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed, SwitchboardConfig::default());
    }

    #[test]
    fn test_generated_toml_sqlite() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = create_test_config(&temp_dir);
        config.sqlite = true;
        config.model = "qwen2.5:7b".to_string();

        let parsed = SwitchboardConfig::from_toml_str(&generate_switchboard_toml(&config)).unwrap();
        assert_eq!(parsed.persistence.backend, PersistenceBackend::Sqlite);
        assert_eq!(parsed.persistence.path.as_deref(), Some("data/sessions.db"));
        assert_eq!(parsed.inference.model, "qwen2.5:7b");
    }

    #[test]
    fn test_write_file_skips_existing_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, "original").expect("Failed to write");

        write_file(&file_path, "new content", false).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original");

        write_file(&file_path, "new content", true).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_run_creates_all_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = create_test_config(&temp_dir);
        config.sqlite = true;

        let result = run(config, &Output::no_color());
        assert!(matches!(result, InitResult::Success));

        assert!(temp_dir.path().join("switchboard.toml").exists());
        assert!(temp_dir.path().join(".env.example").exists());
        assert!(temp_dir.path().join(".gitignore").exists());
        assert!(temp_dir.path().join("data").is_dir());
    }

    #[test]
    fn test_run_already_exists_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("switchboard.toml"), "existing").expect("Failed to write");

        let result = run(create_test_config(&temp_dir), &Output::no_color());
        assert!(matches!(result, InitResult::AlreadyExists));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("switchboard.toml")).unwrap(),
            "existing"
        );
    }

    #[test]
    fn test_run_force_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("switchboard.toml"), "existing").expect("Failed to write");

        let mut config = create_test_config(&temp_dir);
        config.force = true;
        let result = run(config, &Output::no_color());

        assert!(matches!(result, InitResult::Success));
        let content = fs::read_to_string(temp_dir.path().join("switchboard.toml")).unwrap();
        assert!(content.contains("[engine]"));
    }
}
