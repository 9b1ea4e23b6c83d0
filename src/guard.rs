//! Membership guard.
//!
//! A person who still owns open work cannot be removed, neither from one
//! team nor from the registry. Both flows share one predicate over the task
//! partitions; the caller mutates nothing when it refuses.
//!
//! Task ownership is matched by `responsibleId`, and also by normalized
//! responsible name for tasks written before ids were recorded. The name
//! channel is kept only for that older data: a renamed person is not matched
//! by name, and two people sharing a normalized name block each other.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::lock::KeyLock;
use crate::people::{Person, PersonStore};
use crate::storage::{Partition, StoreKey};
use crate::task::{Task, TaskStore};
use crate::team::{accepted_invitee_name, Team, TeamStore};

/// Which partitions the guard scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardScope {
    /// Every partition, for removing a person everywhere
    Global,
    /// One team's partition
    Team(String),
}

/// Strip diacritics, trim and lowercase
pub fn normalize_name(raw: &str) -> String {
    raw.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Whether `task` keeps `person_id` from being removed
///
/// `person_name` must already be normalized; an empty name never matches.
pub fn blocks_removal(task: &Task, person_id: &str, person_name: &str) -> bool {
    if !task.status.is_open() {
        return false;
    }
    if task.responsible_id.as_deref() == Some(person_id) {
        return true;
    }
    // Legacy: tasks that only recorded a free-text responsible name.
    !person_name.is_empty() && normalize_name(&task.responsible_name) == person_name
}

#[derive(Debug, Clone)]
pub struct MembershipGuard {
    tasks: TaskStore,
    teams: TeamStore,
    people: PersonStore,
}

impl MembershipGuard {
    pub fn new(tasks: TaskStore, teams: TeamStore, people: PersonStore) -> Self {
        Self {
            tasks,
            teams,
            people,
        }
    }

    /// Ids of the open tasks owned by the person within `scope`
    pub fn blocking_tasks(
        &self,
        person_id: &str,
        person_name: &str,
        scope: &GuardScope,
    ) -> Result<Vec<String>> {
        let name = normalize_name(person_name);
        let partitions = match scope {
            GuardScope::Global => self.tasks.all_partitions_tasks()?,
            GuardScope::Team(team_id) => {
                let partition = Partition::team(team_id.as_str());
                let tasks = self.tasks.read_partition(&partition)?;
                vec![(partition, tasks)]
            }
        };

        Ok(partitions
            .iter()
            .flat_map(|(_, tasks)| tasks.iter())
            .filter(|task| blocks_removal(task, person_id, &name))
            .map(|task| task.id.clone())
            .collect())
    }

    pub fn has_blocking_pending_task(
        &self,
        person_id: &str,
        person_name: &str,
        scope: &GuardScope,
    ) -> Result<bool> {
        Ok(!self.blocking_tasks(person_id, person_name, scope)?.is_empty())
    }

    /// Remove a member from a team unless they still own open tasks there
    ///
    /// Invitations addressed to the person are dropped with the membership.
    pub fn remove_member(&self, team_id: &str, person_id: &str) -> Result<Team> {
        let team = self.teams.require(team_id)?;
        if !team.is_member(person_id) {
            return Err(Error::PersonNotFound(format!(
                "{person_id} is not a member of team {team_id}"
            )));
        }

        let name = self.display_name(&team, person_id)?;
        let partition = Partition::team(team_id);
        let _partition_lock = self.lock_partitions(std::slice::from_ref(&partition))?;

        let blocking = self.blocking_tasks(person_id, &name, &GuardScope::Team(team_id.to_string()))?;
        if !blocking.is_empty() {
            tracing::warn!(team = %team_id, person = %person_id, tasks = blocking.len(), "refusing member removal");
            return Err(Error::BlockedByPendingTask {
                person: display_or_id(&name, person_id),
                tasks: blocking,
            });
        }

        let ((), updated) = self.teams.update_team(team_id, |team| {
            team.remove_member(person_id);
            team.invitations.retain(|inv| inv.invitee_id != person_id);
            Ok(())
        })?;
        tracing::info!(team = %team_id, person = %person_id, "removed member");
        Ok(updated)
    }

    /// Delete a person from the registry unless they own open tasks anywhere
    ///
    /// Membership lists are left untouched.
    pub fn delete_person(&self, person_id: &str) -> Result<Person> {
        let person = self
            .people
            .get(person_id)?
            .ok_or_else(|| Error::PersonNotFound(person_id.to_string()))?;

        let partitions = self.tasks.storage().task_partitions()?;
        let _partition_locks = self.lock_partitions(&partitions)?;

        let blocking = self.blocking_tasks(person_id, &person.name, &GuardScope::Global)?;
        if !blocking.is_empty() {
            tracing::warn!(person = %person_id, tasks = blocking.len(), "refusing person deletion");
            return Err(Error::BlockedByPendingTask {
                person: person.name,
                tasks: blocking,
            });
        }

        let removed = self.people.remove(person_id)?;
        tracing::info!(person = %person_id, "deleted person");
        Ok(removed)
    }

    /// Registry name, else the name recorded on an accepted invitation
    fn display_name(&self, team: &Team, person_id: &str) -> Result<String> {
        if let Some(person) = self.people.get(person_id)? {
            return Ok(person.name);
        }
        Ok(accepted_invitee_name(team, person_id)
            .unwrap_or_default()
            .to_string())
    }

    /// Hold task writers off while the check and the removal run
    fn lock_partitions(&self, partitions: &[Partition]) -> Result<Vec<KeyLock>> {
        partitions
            .iter()
            .map(|partition| {
                self.tasks
                    .storage()
                    .lock_key(&StoreKey::Tasks(partition.clone()))
            })
            .collect()
    }
}

fn display_or_id(name: &str, id: &str) -> String {
    if name.trim().is_empty() {
        id.to_string()
    } else {
        name.to_string()
    }
}
