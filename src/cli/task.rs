//! atarefa task command implementations.

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::cli::{Context, PartitionArgs, StoreArgs};
use crate::dates;
use crate::error::{Error, Result};
use crate::output::{emit_success, task_line, HumanOutput, OutputOptions};
use crate::storage::Partition;
use crate::task::{sort_for_display, Task, TaskDraft, TaskStatus};
use crate::team::Team;
use crate::watch::{OverdueWatcher, WatchEvent};

pub struct NewOptions {
    pub title: String,
    pub description: String,
    pub due: String,
    pub assignee: Option<String>,
    pub assignee_name: Option<String>,
    pub partition: PartitionArgs,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub partition: PartitionArgs,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct IdOptions {
    pub id: String,
    pub partition: PartitionArgs,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct WatchOptions {
    pub interval: Option<u64>,
    pub ticks: Option<usize>,
    pub partition: PartitionArgs,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskListOutput {
    partition: String,
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct WatchLine {
    partition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    overdue: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn partition_label(partition: &Partition, team: Option<&Team>) -> String {
    match team {
        Some(team) => team.name.clone(),
        None => partition.to_string(),
    }
}

/// Responsible id and display name for a new task
fn resolve_responsible(
    ctx: &Context,
    team: Option<&Team>,
    assignee: Option<&str>,
    assignee_name: Option<&str>,
) -> Result<(Option<String>, String)> {
    let Some(id) = assignee.map(str::trim).filter(|id| !id.is_empty()) else {
        let name = assignee_name.unwrap_or_default().trim().to_string();
        return Ok((None, name));
    };

    match team {
        Some(team) => {
            let people = ctx.people.list()?;
            let profile = ctx
                .teams
                .member_profiles(team, &people)
                .into_iter()
                .find(|profile| profile.id == id)
                .ok_or_else(|| {
                    Error::Validation(format!("'{id}' is not a member of team {}", team.name))
                })?;
            Ok((Some(profile.id), profile.name))
        }
        None => {
            let person = ctx
                .people
                .get(id)?
                .ok_or_else(|| Error::PersonNotFound(id.to_string()))?;
            Ok((Some(person.id), person.name))
        }
    }
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let (partition, team) = ctx.resolve_partition(&options.partition)?;

    let due_at = dates::parse_instant_str(&options.due)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid due date '{}'", options.due)))?;
    let (responsible_id, responsible_name) = resolve_responsible(
        &ctx,
        team.as_ref(),
        options.assignee.as_deref(),
        options.assignee_name.as_deref(),
    )?;

    let task = ctx.tasks.create(
        &partition,
        TaskDraft {
            title: options.title,
            description: options.description,
            due_at,
            responsible_name,
            responsible_id,
        },
        Utc::now(),
    )?;

    let mut human = HumanOutput::new(format!("atarefa task new: {}", task.title));
    human.push_summary("id", task.id.clone());
    human.push_summary("list", partition_label(&partition, team.as_ref()));
    human.push_summary("responsible", task.responsible_name.clone());
    human.push_summary(
        "due",
        task.due_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
    );

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task new",
        &task,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let (partition, team) = ctx.resolve_partition(&options.partition)?;
    let status = options
        .status
        .as_deref()
        .map(|raw| {
            TaskStatus::from_str(raw)
                .map_err(|_| Error::InvalidArgument(format!("unknown task status '{raw}'")))
        })
        .transpose()?;

    let mut tasks = ctx.tasks.list_tasks(&partition, Utc::now())?;
    if let Some(status) = status {
        tasks.retain(|task| task.status == status);
    }
    sort_for_display(&mut tasks);

    let label = partition_label(&partition, team.as_ref());
    let mut human = HumanOutput::new(format!("atarefa task ls: {label} ({} tasks)", tasks.len()));
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    if tasks.is_empty() && status.is_none() {
        human.push_next_step("atarefa task new <title> --description <text> --due <date> --assignee <id>");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task ls",
        &TaskListOutput {
            partition: partition.to_string(),
            total: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}

pub fn run_done(options: IdOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let (partition, _) = ctx.resolve_partition(&options.partition)?;
    let task = ctx.tasks.complete_task(&partition, &options.id)?;

    let mut human = HumanOutput::new(format!("atarefa task done: {}", task.title));
    human.push_summary("id", task.id.clone());
    human.push_summary("status", task.status.label());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task done",
        &task,
        Some(&human),
    )
}

pub fn run_rm(options: IdOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let (partition, _) = ctx.resolve_partition(&options.partition)?;
    let task = ctx.tasks.delete_task(&partition, &options.id)?;

    let mut human = HumanOutput::new(format!("atarefa task rm: {}", task.title));
    human.push_summary("id", task.id.clone());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task rm",
        &task,
        Some(&human),
    )
}

/// Prints one line per reload until `--ticks` reloads happened (or forever)
pub fn run_watch(options: WatchOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let (partition, _) = ctx.resolve_partition(&options.partition)?;

    let secs = options
        .interval
        .unwrap_or(ctx.config.tasks.overdue_poll_secs);
    if secs == 0 {
        return Err(Error::InvalidArgument(
            "watch interval must be at least 1 second".to_string(),
        ));
    }
    if options.ticks == Some(0) {
        return Err(Error::InvalidArgument("--ticks must be greater than 0".to_string()));
    }

    let (watcher, events) = OverdueWatcher::spawn(
        ctx.tasks.clone(),
        vec![partition],
        Duration::from_secs(secs),
    );

    let mut seen = 0usize;
    for event in events.iter() {
        let line = match event {
            WatchEvent::Tick(tick) => WatchLine {
                partition: tick.partition.to_string(),
                overdue: Some(tick.overdue),
                total: Some(tick.total),
                error: None,
            },
            WatchEvent::Error { partition, message } => WatchLine {
                partition: partition.to_string(),
                overdue: None,
                total: None,
                error: Some(message),
            },
        };
        print_watch_line(&line, options.json, options.quiet)?;

        seen += 1;
        if options.ticks.is_some_and(|limit| seen >= limit) {
            break;
        }
    }

    watcher.stop();
    Ok(())
}

fn print_watch_line(line: &WatchLine, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(line)?);
        return Ok(());
    }
    match &line.error {
        Some(message) => eprintln!("warning: {}: {message}", line.partition),
        None if !quiet => println!(
            "{} {}: {} overdue of {}",
            Utc::now().with_timezone(&chrono::Local).format("%H:%M:%S"),
            line.partition,
            line.overdue.unwrap_or_default(),
            line.total.unwrap_or_default()
        ),
        None => {}
    }
    Ok(())
}
