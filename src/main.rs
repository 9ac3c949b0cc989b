use anyhow::Context;
use switchboard::cli::init::{self, InitConfig, InitResult};
use switchboard::cli::output::Output;
use switchboard::cli::{Cli, Commands};
use switchboard::utils::{init_logging, ConfigError, SwitchboardConfig};
use switchboard::{WorkflowEngine, WorkflowEngineBuilder};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Commands::Init {
        path,
        force,
        model,
        sqlite,
    } = cli.command
    {
        init_logging(if cli.verbose { "debug" } else { "warn" }, false);
        let result = init::run(
            InitConfig {
                path,
                force,
                model,
                sqlite,
            },
            &output,
        );
        return match result {
            InitResult::Success => Ok(()),
            InitResult::AlreadyExists => std::process::exit(1),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        };
    }

    let config = load_config(&cli.config)?;
    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_logging(level, config.logging.json);

    let engine = WorkflowEngineBuilder::new(config)
        .build()
        .await
        .context("Failed to start the workflow engine")?;

    match cli.command {
        Commands::Ask { session, text } => {
            let response = engine
                .process_task(session.as_deref().unwrap_or_default(), &text.join(" "))
                .await;
            if cli.json {
                print_json(&response)?;
            } else {
                output.task_response(&response);
                if cli.verbose {
                    output.kv("session", &response.session_id);
                }
            }
            if !response.success {
                std::process::exit(2);
            }
        }
        Commands::Chat { session } => chat(&engine, session, &output).await?,
        Commands::Health if cli.json => print_json(&engine.health_status())?,
        Commands::Health => output.health(&engine.health_status()),
        Commands::Capabilities if cli.json => print_json(&engine.list_capabilities())?,
        Commands::Capabilities => output.capabilities(&engine.list_capabilities()),
        Commands::Session { id, clear: true } => {
            let existed = engine.clear_session(&id).await?;
            if cli.json {
                print_json(&serde_json::json!({ "session_id": id, "cleared": existed }))?;
            } else if existed {
                output.success(&format!("Cleared session {}", id));
            } else {
                output.warning(&format!("No session named {}", id));
            }
        }
        Commands::Session { id, clear: false } => {
            let status = engine.session_status(&id).await?;
            if cli.json {
                print_json(&status)?;
            } else {
                output.session_status(&status);
            }
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Missing files fall back to defaults so `ask` works before `init`.
fn load_config(path: &Path) -> anyhow::Result<SwitchboardConfig> {
    match SwitchboardConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            let mut config = SwitchboardConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

async fn chat(engine: &WorkflowEngine, session: Option<String>, output: &Output) -> anyhow::Result<()> {
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    output.banner();
    output.kv("session", &session_id);
    output.hint("Commands: /health, /capabilities, /status, /clear, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/health" => output.health(&engine.health_status()),
            "/capabilities" => output.capabilities(&engine.list_capabilities()),
            "/status" => output.session_status(&engine.session_status(&session_id).await?),
            "/clear" => {
                engine.clear_session(&session_id).await?;
                output.success("Session cleared");
            }
            task => {
                let response = engine.process_task(&session_id, task).await;
                output.task_response(&response);
            }
        }
        engine.evict_idle_sessions();
    }

    Ok(())
}
