//! Calendar projection of tasks.
//!
//! Tasks are bucketed by the local calendar date of their due date. Each day
//! carries the set of status dots present on it. A [`CalendarView`] keeps the
//! marks and the selected day's list consistent with the active team scope:
//! changing the scope recomputes both before returning.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::identity::CurrentUser;
use crate::storage::Partition;
use crate::task::{sort_for_display, Task, TaskStatus, TaskStore};
use crate::team::{Team, TeamStore};

/// Calendar day a task falls on
pub type DayKey = NaiveDate;

/// Local calendar date of an instant
pub fn day_key(instant: DateTime<Utc>) -> DayKey {
    instant.with_timezone(&Local).date_naive()
}

/// `YYYY-MM-DD`
pub fn format_day_key(day: DayKey) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DotKind {
    Overdue,
    Pending,
    Completed,
}

impl DotKind {
    pub fn color(&self) -> &'static str {
        match self {
            DotKind::Overdue => "#ef4444",
            DotKind::Pending => "#f59e0b",
            DotKind::Completed => "#22c55e",
        }
    }

    pub fn label(&self) -> &'static str {
        TaskStatus::from(*self).label()
    }
}

impl From<TaskStatus> for DotKind {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Overdue => DotKind::Overdue,
            TaskStatus::Pending => DotKind::Pending,
            TaskStatus::Completed => DotKind::Completed,
        }
    }
}

impl From<DotKind> for TaskStatus {
    fn from(kind: DotKind) -> Self {
        match kind {
            DotKind::Overdue => TaskStatus::Overdue,
            DotKind::Pending => TaskStatus::Pending,
            DotKind::Completed => TaskStatus::Completed,
        }
    }
}

pub type DayMarks = BTreeMap<DayKey, BTreeSet<DotKind>>;

/// Distinct status dots per day
pub fn build_day_marks(tasks: &[Task]) -> DayMarks {
    let mut marks = DayMarks::new();
    for task in tasks {
        marks
            .entry(day_key(task.due_at))
            .or_default()
            .insert(DotKind::from(task.status));
    }
    marks
}

/// Tasks due on `day`, in display order
pub fn tasks_on_day(tasks: &[Task], day: DayKey) -> Vec<Task> {
    let mut due: Vec<Task> = tasks
        .iter()
        .filter(|task| day_key(task.due_at) == day)
        .cloned()
        .collect();
    sort_for_display(&mut due);
    due
}

/// Which teams feed the calendar
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "team", rename_all = "snake_case")]
pub enum CalendarScope {
    /// Every team the user belongs to
    #[default]
    AllTeams,
    Team(String),
}

impl fmt::Display for CalendarScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarScope::AllTeams => write!(f, "all teams"),
            CalendarScope::Team(id) => write!(f, "team {id}"),
        }
    }
}

/// Tasks loaded for one scope
#[derive(Debug, Clone, Default)]
pub struct CalendarData {
    /// Teams the user belongs to
    pub teams: Vec<Team>,
    /// Scope actually applied (a team outside `teams` falls back to all)
    pub scope: CalendarScope,
    pub tasks: Vec<Task>,
}

/// Loads scoped task sets from the team and task stores
#[derive(Debug, Clone)]
pub struct CalendarSource {
    teams: TeamStore,
    tasks: TaskStore,
}

impl CalendarSource {
    pub fn new(teams: TeamStore, tasks: TaskStore) -> Self {
        Self { teams, tasks }
    }

    /// Teams visible to `user` and the tasks of the requested scope, with
    /// statuses recomputed at `now`
    pub fn load(
        &self,
        user: Option<&CurrentUser>,
        scope: &CalendarScope,
        now: DateTime<Utc>,
    ) -> Result<CalendarData> {
        let Some(user) = user else {
            return Ok(CalendarData::default());
        };

        let teams = self
            .teams
            .list_teams_for_user(&user.id, user.email.as_deref())?;

        let scope = match scope {
            CalendarScope::Team(id) if !teams.iter().any(|team| &team.id == id) => {
                tracing::debug!(team = %id, "selected team not visible, showing all teams");
                CalendarScope::AllTeams
            }
            other => other.clone(),
        };

        let mut tasks = Vec::new();
        for team in &teams {
            if matches!(&scope, CalendarScope::Team(id) if id != &team.id) {
                continue;
            }
            tasks.extend(self.tasks.list_tasks(&Partition::team(team.id.as_str()), now)?);
        }

        Ok(CalendarData {
            teams,
            scope,
            tasks,
        })
    }
}

/// Scoped calendar state: day marks plus the selected day's tasks
#[derive(Debug, Clone)]
pub struct CalendarView {
    source: CalendarSource,
    user: Option<CurrentUser>,
    now: DateTime<Utc>,
    data: CalendarData,
    marks: DayMarks,
    selected_day: DayKey,
    day_tasks: Vec<Task>,
}

impl CalendarView {
    /// Load the view for `scope`, with today selected
    pub fn open(
        source: CalendarSource,
        user: Option<CurrentUser>,
        scope: CalendarScope,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut view = Self {
            source,
            user,
            now,
            data: CalendarData::default(),
            marks: DayMarks::new(),
            selected_day: day_key(now),
            day_tasks: Vec::new(),
        };
        view.reload(&scope)?;
        Ok(view)
    }

    /// Switch scope; marks and the selected day's list are rebuilt together
    pub fn set_scope(&mut self, scope: CalendarScope) -> Result<()> {
        self.reload(&scope)
    }

    /// Reload the current scope at a new instant
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.now = now;
        let scope = self.data.scope.clone();
        self.reload(&scope)
    }

    pub fn select_day(&mut self, day: DayKey) {
        self.selected_day = day;
        self.day_tasks = tasks_on_day(&self.data.tasks, day);
    }

    pub fn scope(&self) -> &CalendarScope {
        &self.data.scope
    }

    pub fn teams(&self) -> &[Team] {
        &self.data.teams
    }

    pub fn tasks(&self) -> &[Task] {
        &self.data.tasks
    }

    pub fn marks(&self) -> &DayMarks {
        &self.marks
    }

    pub fn selected_day(&self) -> DayKey {
        self.selected_day
    }

    pub fn day_tasks(&self) -> &[Task] {
        &self.day_tasks
    }

    fn reload(&mut self, scope: &CalendarScope) -> Result<()> {
        let data = self.source.load(self.user.as_ref(), scope, self.now)?;
        self.marks = build_day_marks(&data.tasks);
        self.day_tasks = tasks_on_day(&data.tasks, self.selected_day);
        self.data = data;
        Ok(())
    }
}
