//! Task management for atarefa.
//!
//! Tasks live in per-team partitions (`tasks:<teamId>`), one JSON file each,
//! plus the legacy ungrouped partition. Reads repair the partition: entries
//! without required fields are dropped, missing team ids are stamped, and
//! pending tasks past their due date are promoted to overdue. The repaired
//! list is written back whenever it differs from what was read.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::config::TasksConfig;
use crate::error::{Error, Result};
use crate::guard::normalize_name;
use crate::storage::{Partition, Storage, StoreKey};

/// Task status
///
/// `Pending` and `Overdue` are derived from the due date on every load;
/// `Completed` is terminal and only set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Overdue,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Completed => "completed",
        }
    }

    /// User-facing label
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pendente",
            TaskStatus::Overdue => "Atrasada",
            TaskStatus::Completed => "Concluída",
        }
    }

    /// Display priority: overdue first, completed last
    pub fn display_rank(&self) -> u8 {
        match self {
            TaskStatus::Overdue => 1,
            TaskStatus::Pending => 2,
            TaskStatus::Completed => 3,
        }
    }

    /// Whether a task in this status still counts as open work
    pub fn is_open(&self) -> bool {
        !matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    /// Accepts the canonical names as well as the localized labels written
    /// by older clients, ignoring case and accents
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let folded = normalize_name(raw);
        if folded.starts_with("pend") {
            Ok(TaskStatus::Pending)
        } else if folded.starts_with("overdue") || folded.starts_with("atras") {
            Ok(TaskStatus::Overdue)
        } else if folded.starts_with("complet")
            || folded.starts_with("conclu")
            || folded == "done"
        {
            Ok(TaskStatus::Completed)
        } else {
            Err(format!("unknown task status '{raw}'"))
        }
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(alias = "nomeDaTarefa")]
    pub title: String,
    #[serde(default, alias = "descricao")]
    pub description: String,
    pub status: TaskStatus,
    #[serde(alias = "dataHora", deserialize_with = "crate::dates::deserialize_instant")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "dataEntrega", deserialize_with = "crate::dates::deserialize_instant")]
    pub due_at: DateTime<Utc>,
    #[serde(default, alias = "responsavel")]
    pub responsible_name: String,
    #[serde(
        default,
        alias = "responsavelId",
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub responsible_id: Option<String>,
    #[serde(
        default,
        alias = "equipeId",
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub team_id: Option<String>,
}

impl Task {
    fn has_required_fields(&self) -> bool {
        !self.id.trim().is_empty() && !self.title.trim().is_empty()
    }

    /// Status after the overdue recompute at `now`
    pub fn status_at(&self, now: DateTime<Utc>) -> TaskStatus {
        match self.status {
            TaskStatus::Pending if self.due_at < now => TaskStatus::Overdue,
            status => status,
        }
    }
}

/// Ids were stored as strings, numbers or empty strings; empty means absent
fn deserialize_optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Task creation input
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_at: DateTime<Utc>,
    pub responsible_name: String,
    pub responsible_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    storage: Storage,
    config: TasksConfig,
}

impl TaskStore {
    pub fn new(storage: Storage, config: TasksConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &TasksConfig {
        &self.config
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Load a partition with the overdue recompute applied and persisted
    pub fn list_tasks(&self, partition: &Partition, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let key = StoreKey::Tasks(partition.clone());
        self.storage
            .update_collection(&key, |tasks: &mut Vec<Task>| {
                let before = tasks.len();
                tasks.retain(Task::has_required_fields);
                if tasks.len() != before {
                    tracing::warn!(%partition, dropped = before - tasks.len(), "dropped incomplete tasks");
                }

                for task in tasks.iter_mut() {
                    match (partition.team_id(), task.team_id.as_deref()) {
                        (Some(team), None) => task.team_id = Some(team.to_string()),
                        (Some(team), Some(found)) if team != found => {
                            tracing::warn!(%partition, task = %task.id, found, "reassigning task to its partition team");
                            task.team_id = Some(team.to_string());
                        }
                        (None, Some(found)) => {
                            tracing::warn!(%partition, task = %task.id, found, "clearing team id of legacy task");
                            task.team_id = None;
                        }
                        _ => {}
                    }

                    let status = task.status_at(now);
                    if status != task.status {
                        tracing::debug!(%partition, task = %task.id, "task is now overdue");
                        task.status = status;
                    }
                }
                Ok(tasks.clone())
            })
    }

    /// Read a partition as stored, without repair or write-back
    pub fn read_partition(&self, partition: &Partition) -> Result<Vec<Task>> {
        let key = StoreKey::Tasks(partition.clone());
        let mut tasks = self.storage.read_collection::<Task>(&key)?.items;
        tasks.retain(Task::has_required_fields);
        Ok(tasks)
    }

    /// Every persisted partition with its stored tasks
    pub fn all_partitions_tasks(&self) -> Result<Vec<(Partition, Vec<Task>)>> {
        self.storage
            .task_partitions()?
            .into_iter()
            .map(|partition| {
                let tasks = self.read_partition(&partition)?;
                Ok((partition, tasks))
            })
            .collect()
    }

    /// Validate and create a new pending task in `partition`
    pub fn create(&self, partition: &Partition, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task> {
        let title = draft.title.trim();
        let description = draft.description.trim();
        let responsible_name = draft.responsible_name.trim();

        if title.is_empty() || description.is_empty() || responsible_name.is_empty() {
            return Err(Error::Validation(
                "title, description and responsible are required".to_string(),
            ));
        }
        if self.config.reject_past_due && draft.due_at < now {
            return Err(Error::Validation(
                "due date cannot be in the past".to_string(),
            ));
        }

        let task = Task {
            id: Ulid::new().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            created_at: now,
            due_at: draft.due_at,
            responsible_name: responsible_name.to_string(),
            responsible_id: draft
                .responsible_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
            team_id: partition.team_id().map(str::to_string),
        };

        self.save_task(partition, task)
    }

    /// Upsert by id (remove existing, prepend new)
    ///
    /// The task's team id must match the partition; it is filled in when
    /// absent. The status is stored as given.
    pub fn save_task(&self, partition: &Partition, mut task: Task) -> Result<Task> {
        if !task.has_required_fields() {
            return Err(Error::Validation("task id and title are required".to_string()));
        }

        match (partition.team_id(), task.team_id.clone()) {
            (Some(team), None) => task.team_id = Some(team.to_string()),
            (expected, Some(found)) if expected != Some(found.as_str()) => {
                return Err(Error::PartitionMismatch {
                    task: task.id,
                    expected: partition.to_string(),
                    found: Partition::team(found).to_string(),
                });
            }
            _ => {}
        }

        let key = StoreKey::Tasks(partition.clone());
        let saved = task.clone();
        self.storage
            .update_collection(&key, move |tasks: &mut Vec<Task>| {
                tasks.retain(|existing| existing.id != task.id);
                tasks.insert(0, task);
                Ok(())
            })?;

        tracing::info!(%partition, task = %saved.id, "saved task");
        Ok(saved)
    }

    pub fn delete_task(&self, partition: &Partition, task_id: &str) -> Result<Task> {
        let key = StoreKey::Tasks(partition.clone());
        let removed = self
            .storage
            .update_collection(&key, |tasks: &mut Vec<Task>| {
                let idx = tasks
                    .iter()
                    .position(|task| task.id == task_id)
                    .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
                Ok(tasks.remove(idx))
            })?;
        tracing::info!(%partition, task = %task_id, "deleted task");
        Ok(removed)
    }

    /// Mark a task completed; completing it again is a no-op
    pub fn complete_task(&self, partition: &Partition, task_id: &str) -> Result<Task> {
        let key = StoreKey::Tasks(partition.clone());
        let task = self
            .storage
            .update_collection(&key, |tasks: &mut Vec<Task>| {
                let task = tasks
                    .iter_mut()
                    .find(|task| task.id == task_id)
                    .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
                task.status = TaskStatus::Completed;
                Ok(task.clone())
            })?;
        tracing::info!(%partition, task = %task_id, "completed task");
        Ok(task)
    }
}

/// Order for display: overdue, pending, completed; earliest due date first
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        left.status
            .display_rank()
            .cmp(&right.status.display_rank())
            .then_with(|| left.due_at.cmp(&right.due_at))
            .then_with(|| left.id.cmp(&right.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn store(temp: &TempDir) -> TaskStore {
        TaskStore::new(Storage::new(temp.path()), TasksConfig::default())
    }

    fn task(id: &str, status: TaskStatus, due_at: DateTime<Utc>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: String::new(),
            status,
            created_at: now() - Duration::days(3),
            due_at,
            responsible_name: "Ana".to_string(),
            responsible_id: Some("p1".to_string()),
            team_id: None,
        }
    }

    #[test]
    fn status_parsing_accepts_legacy_labels() {
        assert_eq!("Pendente".parse::<TaskStatus>(), Ok(TaskStatus::Pending));
        assert_eq!("ATRASADA".parse::<TaskStatus>(), Ok(TaskStatus::Overdue));
        assert_eq!("Concluída".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!("concluida".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!("overdue".parse::<TaskStatus>(), Ok(TaskStatus::Overdue));
        assert!("archived".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn list_promotes_pending_past_due_and_persists() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let partition = Partition::team("t1");

        store
            .save_task(&partition, task("a", TaskStatus::Pending, now() - Duration::days(1)))
            .unwrap();
        store
            .save_task(&partition, task("b", TaskStatus::Pending, now() + Duration::days(1)))
            .unwrap();

        let listed = store.list_tasks(&partition, now()).unwrap();
        let status_of = |tasks: &[Task], id: &str| {
            tasks.iter().find(|t| t.id == id).map(|t| t.status)
        };
        assert_eq!(status_of(&listed, "a"), Some(TaskStatus::Overdue));
        assert_eq!(status_of(&listed, "b"), Some(TaskStatus::Pending));

        let stored = store.read_partition(&partition).unwrap();
        assert_eq!(status_of(&stored, "a"), Some(TaskStatus::Overdue));

        let again = store.list_tasks(&partition, now()).unwrap();
        assert_eq!(again, listed);
    }

    #[test]
    fn completed_is_never_downgraded() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let partition = Partition::team("t1");
        store
            .save_task(&partition, task("a", TaskStatus::Pending, now() - Duration::days(1)))
            .unwrap();

        store.complete_task(&partition, "a").unwrap();
        let first = store.complete_task(&partition, "a").unwrap();
        assert_eq!(first.status, TaskStatus::Completed);

        let listed = store.list_tasks(&partition, now() + Duration::days(30)).unwrap();
        assert_eq!(listed[0].status, TaskStatus::Completed);

        assert!(matches!(
            store.complete_task(&partition, "missing"),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn save_upserts_and_stamps_team() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let partition = Partition::team("t1");

        store
            .save_task(&partition, task("a", TaskStatus::Pending, now()))
            .unwrap();
        store
            .save_task(&partition, task("b", TaskStatus::Pending, now()))
            .unwrap();
        let mut edited = task("a", TaskStatus::Pending, now());
        edited.title = "renamed".to_string();
        store.save_task(&partition, edited).unwrap();

        let stored = store.read_partition(&partition).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].title, "renamed");
        assert_eq!(stored[0].team_id.as_deref(), Some("t1"));
    }

    #[test]
    fn save_rejects_partition_mismatch() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mut foreign = task("a", TaskStatus::Pending, now());
        foreign.team_id = Some("t2".to_string());
        let err = store.save_task(&Partition::team("t1"), foreign.clone()).unwrap_err();
        assert!(matches!(err, Error::PartitionMismatch { .. }));

        let err = store.save_task(&Partition::Legacy, foreign).unwrap_err();
        assert!(matches!(err, Error::PartitionMismatch { .. }));
        assert!(store.read_partition(&Partition::team("t1")).unwrap().is_empty());
    }

    #[test]
    fn partitions_are_isolated() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        store
            .save_task(&Partition::team("t1"), task("a", TaskStatus::Pending, now()))
            .unwrap();
        store
            .save_task(&Partition::Legacy, task("b", TaskStatus::Pending, now()))
            .unwrap();

        assert_eq!(store.read_partition(&Partition::team("t1")).unwrap().len(), 1);
        assert!(store.read_partition(&Partition::team("t2")).unwrap().is_empty());
        let legacy = store.read_partition(&Partition::Legacy).unwrap();
        assert_eq!(legacy[0].team_id, None);

        let all = store.all_partitions_tasks().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, Partition::team("t1"));
        assert_eq!(all[1].0, Partition::Legacy);
    }

    #[test]
    fn create_validates_and_respects_past_due_rule() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let partition = Partition::team("t1");
        let draft = TaskDraft {
            title: " Relatório ".to_string(),
            description: "mensal".to_string(),
            due_at: now() + Duration::days(2),
            responsible_name: "Ana".to_string(),
            responsible_id: Some("p1".to_string()),
        };

        let created = store.create(&partition, draft.clone(), now()).unwrap();
        assert_eq!(created.title, "Relatório");
        assert_eq!(created.status, TaskStatus::Pending);
        assert_eq!(created.team_id.as_deref(), Some("t1"));

        let mut past = draft.clone();
        past.due_at = now() - Duration::hours(1);
        assert!(matches!(
            store.create(&partition, past.clone(), now()),
            Err(Error::Validation(_))
        ));

        let lenient = TaskStore::new(
            Storage::new(temp.path()),
            TasksConfig {
                reject_past_due: false,
                ..TasksConfig::default()
            },
        );
        let stored = lenient.create(&partition, past, now()).unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        let listed = lenient.list_tasks(&partition, now()).unwrap();
        let recomputed = listed.iter().find(|t| t.id == stored.id).unwrap();
        assert_eq!(recomputed.status, TaskStatus::Overdue);

        let mut blank = draft;
        blank.responsible_name = "  ".to_string();
        assert!(matches!(
            store.create(&partition, blank, now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn list_drops_malformed_entries_and_writes_back() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let partition = Partition::team("t1");
        storage.init().unwrap();
        std::fs::write(
            storage.path_for(&StoreKey::Tasks(partition.clone())),
            r#"[
                {"id":"1","title":"ok","status":"Pendente","createdAt":"2025-05-01T00:00:00Z","dueAt":"2025-07-01T00:00:00Z","responsibleName":"Ana","responsibleId":""},
                {"id":"2","title":"no due","status":"Pendente","createdAt":"2025-05-01T00:00:00Z"},
                {"id":"3","title":"bad status","status":"???","createdAt":"2025-05-01T00:00:00Z","dueAt":"2025-07-01T00:00:00Z"},
                {"id":"","title":"no id","status":"pending","createdAt":"2025-05-01T00:00:00Z","dueAt":"2025-07-01T00:00:00Z"}
            ]"#,
        )
        .unwrap();

        let store = TaskStore::new(storage.clone(), TasksConfig::default());
        let listed = store.list_tasks(&partition, now()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].responsible_id, None);
        assert_eq!(listed[0].team_id.as_deref(), Some("t1"));

        let raw: Value = serde_json::from_str(
            &std::fs::read_to_string(storage.path_for(&StoreKey::Tasks(partition))).unwrap(),
        )
        .unwrap();
        assert_eq!(raw.as_array().map(|a| a.len()), Some(1));
        assert_eq!(raw[0]["status"], "pending");
    }

    #[test]
    fn list_reassigns_foreign_team_id_to_partition() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let partition = Partition::team("t1");
        storage.init().unwrap();
        std::fs::write(
            storage.path_for(&StoreKey::Tasks(partition.clone())),
            r#"[{"id":"1","title":"moved","status":"pending","createdAt":"2025-05-01T00:00:00Z","dueAt":"2025-07-01T00:00:00Z","responsibleName":"Ana","teamId":"t2"}]"#,
        )
        .unwrap();
        std::fs::write(
            storage.path_for(&StoreKey::Tasks(Partition::Legacy)),
            r#"[{"id":"9","title":"old","status":"pending","createdAt":"2025-05-01T00:00:00Z","dueAt":"2025-07-01T00:00:00Z","responsibleName":"Ana","teamId":"t3"}]"#,
        )
        .unwrap();

        let store = TaskStore::new(storage, TasksConfig::default());
        let listed = store.list_tasks(&partition, now()).unwrap();
        assert_eq!(listed[0].team_id.as_deref(), Some("t1"));
        assert_eq!(store.read_partition(&partition).unwrap()[0].team_id.as_deref(), Some("t1"));

        let mut edited = listed[0].clone();
        edited.title = "edited".to_string();
        store.save_task(&partition, edited).unwrap();
        assert_eq!(store.read_partition(&partition).unwrap()[0].title, "edited");

        let legacy = store.list_tasks(&Partition::Legacy, now()).unwrap();
        assert_eq!(legacy[0].team_id, None);
        store.save_task(&Partition::Legacy, legacy[0].clone()).unwrap();
    }

    #[test]
    fn delete_is_unconditional() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let partition = Partition::team("t1");
        store
            .save_task(&partition, task("a", TaskStatus::Overdue, now()))
            .unwrap();

        store.delete_task(&partition, "a").unwrap();
        assert!(store.read_partition(&partition).unwrap().is_empty());
        assert!(matches!(
            store.delete_task(&partition, "a"),
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn display_order_is_status_then_due_date() {
        let mut tasks = vec![
            task("done", TaskStatus::Completed, now() - Duration::days(5)),
            task("later", TaskStatus::Pending, now() + Duration::days(3)),
            task("late", TaskStatus::Overdue, now() - Duration::days(1)),
            task("sooner", TaskStatus::Pending, now() + Duration::days(1)),
        ];
        sort_for_display(&mut tasks);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "sooner", "later", "done"]);
    }
}
