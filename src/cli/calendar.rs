//! atarefa calendar command implementations.

use chrono::Utc;
use serde::Serialize;

use crate::calendar::{format_day_key, CalendarScope, CalendarSource, CalendarView, DotKind};
use crate::cli::{Context, StoreArgs};
use crate::dates;
use crate::error::{Error, Result};
use crate::output::{emit_success, task_line, HumanOutput, OutputOptions};
use crate::task::Task;

pub struct MarksOptions {
    pub team: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct DayOptions {
    pub day: String,
    pub team: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct Dot {
    kind: DotKind,
    color: &'static str,
    label: &'static str,
}

#[derive(Serialize)]
struct DayMarkOutput {
    day: String,
    dots: Vec<Dot>,
}

#[derive(Serialize)]
struct MarksOutput {
    scope: CalendarScope,
    teams: Vec<String>,
    days: Vec<DayMarkOutput>,
}

#[derive(Serialize)]
struct DayOutput {
    scope: CalendarScope,
    day: String,
    total: usize,
    tasks: Vec<Task>,
}

fn open_view(ctx: &Context, team: Option<&str>) -> Result<(CalendarView, Vec<String>)> {
    let user = ctx.current_user()?;
    let mut warnings = Vec::new();
    let has_user = user.is_some();
    if !has_user {
        warnings.push("no current user; run `atarefa login <id>` to see team tasks".to_string());
    }

    let requested = match team.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => CalendarScope::Team(id.to_string()),
        None => CalendarScope::AllTeams,
    };
    let source = CalendarSource::new(ctx.teams.clone(), ctx.tasks.clone());
    let view = CalendarView::open(source, user, requested.clone(), Utc::now())?;

    if has_user && scope_fell_back(&requested, view.scope()) {
        warnings.push(format!("{requested} is not one of your teams; showing all teams"));
    }
    Ok((view, warnings))
}

fn scope_fell_back(requested: &CalendarScope, applied: &CalendarScope) -> bool {
    matches!(requested, CalendarScope::Team(_)) && applied != requested
}

pub fn run_marks(options: MarksOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let (view, warnings) = open_view(&ctx, options.team.as_deref())?;

    let days: Vec<DayMarkOutput> = view
        .marks()
        .iter()
        .map(|(day, kinds)| DayMarkOutput {
            day: format_day_key(*day),
            dots: kinds
                .iter()
                .map(|kind| Dot {
                    kind: *kind,
                    color: kind.color(),
                    label: kind.label(),
                })
                .collect(),
        })
        .collect();

    let mut human = HumanOutput::new(format!(
        "atarefa calendar marks: {} ({} days)",
        view.scope(),
        days.len()
    ));
    for day in &days {
        let labels: Vec<&str> = day.dots.iter().map(|dot| dot.label).collect();
        human.push_detail(format!("{} {}", day.day, labels.join(", ")));
    }
    for warning in warnings {
        human.push_warning(warning);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "calendar marks",
        &MarksOutput {
            scope: view.scope().clone(),
            teams: view.teams().iter().map(|team| team.id.clone()).collect(),
            days,
        },
        Some(&human),
    )
}

pub fn run_day(options: DayOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let day = dates::parse_date_str(&options.day)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid day '{}'", options.day)))?;
    let (mut view, warnings) = open_view(&ctx, options.team.as_deref())?;
    view.select_day(day);

    let tasks = view.day_tasks().to_vec();
    let mut human = HumanOutput::new(format!(
        "atarefa calendar day: {} ({} tasks)",
        format_day_key(day),
        tasks.len()
    ));
    human.push_summary("scope", view.scope().to_string());
    for task in &tasks {
        human.push_detail(task_line(task));
    }
    for warning in warnings {
        human.push_warning(warning);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "calendar day",
        &DayOutput {
            scope: view.scope().clone(),
            day: format_day_key(day),
            total: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}
