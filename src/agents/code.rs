use crate::agents::{mentions_any, mentions_word, Backends, TaskContext, Worker, WorkerOutput};
use crate::memory::to_prompt_messages;
use crate::types::{PromptMessage, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const CODE_ASSISTANT_ID: &str = "code_assistant";

/// Tool id the code assistant runs snippets through.
pub const PYTHON_TOOL: &str = "python_repl";

/// Tool id for the assistant journal.
pub const JOURNAL_TOOL: &str = "journal";

const CODE_KEYWORDS: &[&str] = &[
    "code", "program", "script", "function", "debug", "error", "python", "javascript", "java",
    "cpp", "html", "css", "react", "node", "sql", "database", "api", "algorithm", "class",
    "method", "variable", "loop", "syntax", "compile", "runtime", "exception", "library",
    "framework", "git", "deploy", "unit test", "refactor", "optimize", "```", "journal",
];

const JOURNAL_WORDS: &[&str] = &["journal", "note", "notes"];
const JOURNAL_READ_WORDS: &[&str] = &["read", "show", "list", "what's in", "what is in"];
const JOURNAL_CLEAR_WORDS: &[&str] = &["clear", "wipe", "erase"];

const RUN_WORDS: &[&str] = &["run", "execute", "exec", "evaluate", "eval"];

const SYSTEM_PROMPT: &str = "You are a programming assistant. Give correct, idiomatic code with a \
short explanation. Point out bugs and security problems you notice. Use fenced code blocks.";

/// A fenced code block in a message.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
    /// The message with the block removed.
    pub prose: String,
}

/// Extract the first ``` fenced block from `text`.
pub fn extract_code_block(text: &str) -> Option<CodeBlock> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let close = after_fence.find("```")?;
    let inner = &after_fence[..close];

    let (tag, body) = match inner.split_once('\n') {
        Some((first, rest)) if !first.trim().contains(' ') => (first.trim(), rest),
        _ => ("", inner),
    };

    let code = body.trim_matches('\n').to_string();
    if code.trim().is_empty() {
        return None;
    }

    let prose = format!("{} {}", &text[..open], &after_fence[close + 3..]);
    Some(CodeBlock {
        language: (!tag.is_empty()).then(|| tag.to_lowercase()),
        code,
        prose: prose.trim().to_string(),
    })
}

fn asks_to_run(prose: &str) -> bool {
    prose
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| RUN_WORDS.contains(&word))
}

/// Journal tool arguments for `task`: read, clear, or add the text after
/// the first `:` (the whole request when there is none).
fn journal_args(task: &str) -> Value {
    if mentions_word(task, JOURNAL_CLEAR_WORDS) {
        return json!({ "operation": "clear" });
    }
    if mentions_word(task, JOURNAL_READ_WORDS) {
        return json!({ "operation": "read" });
    }
    let entry = match task.split_once(':') {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
        _ => task.trim(),
    };
    json!({ "operation": "add", "entry": entry })
}

fn is_python(language: Option<&str>) -> bool {
    matches!(language, None | Some("python" | "py" | "python3"))
}

pub struct CodeAssistantWorker {
    backends: Backends,
    max_tokens: u32,
}

impl CodeAssistantWorker {
    pub fn new(backends: Backends, max_tokens: u32) -> Self {
        Self {
            backends,
            max_tokens,
        }
    }

    async fn run_snippet(&self, block: &CodeBlock, context: &TaskContext) -> Result<WorkerOutput> {
        let run = self
            .backends
            .run_tool(PYTHON_TOOL, json!({ "code": block.code }))
            .await?;

        tracing::info!(
            session_id = %context.session_id,
            exit_status = run.exit_status,
            "Ran code snippet"
        );

        let output = if run.output.trim().is_empty() {
            "(no output)".to_string()
        } else {
            run.output.trim_end().to_string()
        };
        let heading = if run.succeeded() {
            "Ran successfully.".to_string()
        } else {
            format!("Exited with status {}.", run.exit_status)
        };

        let runs = context
            .local_context
            .get("runs")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            + 1;

        Ok(WorkerOutput::text(format!("{}\n```\n{}\n```", heading, output))
            .with_metadata("executed", true)
            .with_metadata("tool", PYTHON_TOOL)
            .with_metadata("exit_status", run.exit_status)
            .with_local("runs", runs)
            .with_action("run_code"))
    }

    async fn use_journal(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput> {
        let args = journal_args(task);
        let operation = args["operation"].as_str().unwrap_or("add").to_string();
        let run = self.backends.run_tool(JOURNAL_TOOL, args).await?;

        tracing::info!(session_id = %context.session_id, operation = %operation, "Used journal");

        let text = match operation.as_str() {
            "add" => format!("Added to the journal: {}", run.output.trim()),
            _ => run.output.trim().to_string(),
        };
        Ok(WorkerOutput::text(text)
            .with_metadata("tool", JOURNAL_TOOL)
            .with_metadata("operation", operation)
            .with_metadata("exit_status", run.exit_status)
            .with_action("journal"))
    }
}

#[async_trait]
impl Worker for CodeAssistantWorker {
    fn id(&self) -> &str {
        CODE_ASSISTANT_ID
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "code generation".to_string(),
            "debugging and error analysis".to_string(),
            "code review".to_string(),
            "explaining programming concepts".to_string(),
            "running python snippets".to_string(),
            "keeping notes in the assistant journal".to_string(),
        ]
    }

    fn can_handle(&self, task: &str, _context: &TaskContext) -> bool {
        mentions_any(task, CODE_KEYWORDS)
    }

    async fn process(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput> {
        let block = extract_code_block(task);

        if let Some(block) = &block {
            if asks_to_run(&block.prose) && is_python(block.language.as_deref()) {
                return self.run_snippet(block, context).await;
            }
        } else if mentions_word(task, JOURNAL_WORDS) {
            return self.use_journal(task, context).await;
        }

        let mut messages = vec![PromptMessage::system(SYSTEM_PROMPT)];
        messages.extend(to_prompt_messages(&context.history));
        if context.history.last().is_none_or(|m| m.content != task) {
            messages.push(PromptMessage::user(task));
        }

        let response = self.backends.complete(&messages, self.max_tokens).await?;

        let mut output = WorkerOutput::text(response.trim())
            .with_metadata("executed", false)
            .with_action("code_help");
        if let Some(language) = block.and_then(|b| b.language) {
            output = output.with_context("last_code_language", language);
        }
        Ok(output)
    }
}
