//! Shared output formatting for atarefa CLI commands.
//!
//! Every command renders either a human report (header, summary, details,
//! warnings, next steps) or one JSON envelope on stdout.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};
use crate::task::Task;

pub const SCHEMA_VERSION: &str = "atarefa.v1";

/// Command groups that take a subcommand
const COMMAND_GROUPS: [&str; 5] = ["person", "team", "invite", "task", "calendar"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    error: ErrorBody,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let payload = SuccessEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings: human.map(|h| h.warnings.clone()).unwrap_or_default(),
            next_steps: human.map(|h| h.next_steps.clone()).unwrap_or_default(),
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if let Some(human) = human {
        if options.quiet {
            // Warnings still matter when the rest is suppressed.
            for warning in &human.warnings {
                eprintln!("warning: {warning}");
            }
            return Ok(());
        }
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        let payload = ErrorEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Error::BlockedByPendingTask { tasks, .. } = err {
        for task in tasks {
            eprintln!("  pending: {task}");
        }
    }
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// One-line task rendering used by list views
pub fn task_line(task: &Task) -> String {
    format!(
        "[{}] {} (due {}, {}) {}",
        task.status.label(),
        task.title,
        task.due_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M"),
        if task.responsible_name.is_empty() {
            "unassigned"
        } else {
            task.responsible_name.as_str()
        },
        task.id
    )
}

/// `group sub` for grouped commands, else the command name
pub fn infer_command_name_from_args() -> String {
    let mut positional = std::env::args().skip(1).filter(|arg| !arg.starts_with('-'));

    let Some(command) = positional.next() else {
        return "atarefa".to_string();
    };

    if COMMAND_GROUPS.contains(&command.as_str()) {
        if let Some(sub) = positional.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::POLICY_BLOCKED => "policy_blocked",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::NoIdentity => vec!["atarefa login <user-id>".to_string()],
        Error::NoCurrentTeam => vec![
            "atarefa team use <team-id>".to_string(),
            "or pass --team <team-id>".to_string(),
        ],
        Error::BlockedByPendingTask { .. } => {
            vec!["complete or delete the pending tasks, then retry".to_string()]
        }
        Error::PersonNotFound(_) => vec!["atarefa person ls".to_string()],
        Error::TeamNotFound(_) => vec!["atarefa team ls".to_string()],
        Error::InvitationNotFound(_) => vec!["atarefa invite ls".to_string()],
        Error::DuplicatePending { .. } => {
            vec!["wait for the invitee to answer, or remove the pending invitation".to_string()]
        }
        Error::InvalidConfig(_) => vec!["fix atarefa.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["another atarefa process holds the store; retry".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
