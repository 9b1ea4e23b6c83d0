//! Team store and the current-team pointer.
//!
//! Teams own their membership list and their invitations. Tasks are not
//! embedded here; each team's tasks live in a separate partition keyed by
//! the team id (see [`crate::task`]).
//!
//! Every mutation of a team goes through [`TeamStore::update_team`] (or
//! [`TeamStore::upsert_team`]), which rewrites the collection entry and,
//! when the current-team pointer refers to the same team, the pointer too,
//! before returning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::people::Person;
use crate::storage::{Storage, StoreKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    #[serde(alias = "pendente", alias = "Pending")]
    Pending,
    #[serde(alias = "aceito", alias = "Accepted")]
    Accepted,
    #[serde(alias = "recusado", alias = "Declined")]
    Declined,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }
}

/// Request for a person to join a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    #[serde(alias = "usuarioId")]
    pub invitee_id: String,
    #[serde(default, alias = "usuarioNome")]
    pub invitee_name: String,
    pub status: InvitationStatus,
    #[serde(default, alias = "equipeId")]
    pub team_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    #[serde(alias = "nomeDaEquipe")]
    pub name: String,
    #[serde(default, alias = "descricao")]
    pub description: String,
    #[serde(alias = "dataHora", deserialize_with = "crate::dates::deserialize_instant")]
    pub created_at: DateTime<Utc>,
    /// Member person ids, in join order, without duplicates
    #[serde(default, alias = "membros", deserialize_with = "deserialize_members")]
    pub members: Vec<String>,
    #[serde(default, alias = "convites")]
    pub invitations: Vec<Invitation>,
}

impl Team {
    pub fn is_member(&self, person_id: &str) -> bool {
        self.members.iter().any(|member| member == person_id)
    }

    /// Append a member unless already present; returns whether it was added
    pub fn add_member(&mut self, person_id: &str) -> bool {
        if self.is_member(person_id) {
            return false;
        }
        self.members.push(person_id.to_string());
        true
    }

    pub fn remove_member(&mut self, person_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member != person_id);
        before != self.members.len()
    }

    pub fn invitation(&self, invitation_id: &str) -> Option<&Invitation> {
        self.invitations.iter().find(|inv| inv.id == invitation_id)
    }

    pub fn invitation_mut(&mut self, invitation_id: &str) -> Option<&mut Invitation> {
        self.invitations.iter_mut().find(|inv| inv.id == invitation_id)
    }

    pub fn pending_invitation_for(&self, person_id: &str) -> Option<&Invitation> {
        self.invitations
            .iter()
            .find(|inv| inv.invitee_id == person_id && inv.status == InvitationStatus::Pending)
    }

    fn has_required_fields(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

/// Membership lists were written either as id strings or as `{ "id": ... }`
/// objects. Both decode to plain ids; duplicates are removed.
fn deserialize_members<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut members: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        let id = match entry {
            Value::String(id) => Some(id),
            Value::Number(number) => Some(number.to_string()),
            Value::Object(map) => match map.get("id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(number)) => Some(number.to_string()),
                _ => None,
            },
            _ => None,
        };
        if let Some(id) = id.filter(|id| !id.trim().is_empty()) {
            if !members.contains(&id) {
                members.push(id);
            }
        }
    }
    Ok(members)
}

/// Team creation input; `id` is set when editing an existing team
#[derive(Debug, Clone, Default)]
pub struct TeamDraft {
    pub id: Option<String>,
    pub name: String,
    pub description: String,
}

/// Member id resolved to a displayable profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// The persisted "selected team" pointer
///
/// Set when a team is selected or created, cleared on logout. Readers treat
/// it only as a default scope when no team is passed explicitly.
#[derive(Debug, Clone)]
pub struct CurrentTeam {
    storage: Storage,
}

impl CurrentTeam {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get(&self) -> Result<Option<Team>> {
        self.storage.read_value(&StoreKey::CurrentTeam)
    }

    pub fn id(&self) -> Result<Option<String>> {
        Ok(self.get()?.map(|team| team.id))
    }

    pub fn set(&self, team: Option<&Team>) -> Result<()> {
        let _lock = self.storage.lock_key(&StoreKey::CurrentTeam)?;
        match team {
            Some(team) => {
                tracing::debug!(team = %team.id, "selecting team");
                self.storage.write_value(&StoreKey::CurrentTeam, team)
            }
            None => {
                self.storage.remove_key(&StoreKey::CurrentTeam)?;
                Ok(())
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.set(None)
    }

    /// Rewrite the pointer with `team` when it currently refers to the same id
    fn sync(&self, team: &Team) -> Result<bool> {
        let _lock = self.storage.lock_key(&StoreKey::CurrentTeam)?;
        let current: Option<Team> = self.storage.read_value(&StoreKey::CurrentTeam)?;
        match current {
            Some(current) if current.id == team.id => {
                self.storage.write_value(&StoreKey::CurrentTeam, team)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drop the pointer when it refers to `team_id`
    fn forget(&self, team_id: &str) -> Result<bool> {
        let _lock = self.storage.lock_key(&StoreKey::CurrentTeam)?;
        let current: Option<Team> = self.storage.read_value(&StoreKey::CurrentTeam)?;
        match current {
            Some(current) if current.id == team_id => {
                self.storage.remove_key(&StoreKey::CurrentTeam)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeamStore {
    storage: Storage,
    current: CurrentTeam,
}

impl TeamStore {
    pub fn new(storage: Storage) -> Self {
        let current = CurrentTeam::new(storage.clone());
        Self { storage, current }
    }

    pub fn current(&self) -> &CurrentTeam {
        &self.current
    }

    /// Every decodable team; malformed entries are dropped
    pub fn list_teams(&self) -> Result<Vec<Team>> {
        let decoded = self.storage.read_collection::<Team>(&StoreKey::Teams)?;
        let mut teams = decoded.items;
        teams.retain(Team::has_required_fields);
        Ok(teams)
    }

    /// Teams the user belongs to, by id or (for older records) by e-mail
    pub fn list_teams_for_user(&self, user_id: &str, email: Option<&str>) -> Result<Vec<Team>> {
        let email = email.map(str::trim).filter(|email| !email.is_empty());
        Ok(self
            .list_teams()?
            .into_iter()
            .filter(|team| {
                team.members.iter().any(|member| {
                    member == user_id
                        || email
                            .map(|email| member.trim().eq_ignore_ascii_case(email))
                            .unwrap_or(false)
                })
            })
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Team>> {
        Ok(self.list_teams()?.into_iter().find(|team| team.id == id))
    }

    pub fn require(&self, id: &str) -> Result<Team> {
        self.get(id)?
            .ok_or_else(|| Error::TeamNotFound(id.to_string()))
    }

    /// Create (or rename) a team and select it as the current team
    pub fn create_team(&self, draft: TeamDraft, now: DateTime<Utc>) -> Result<Team> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("team name is required".to_string()));
        }

        let id = draft
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let team = match self.get(&id)? {
            Some(mut existing) => {
                existing.name = name.to_string();
                existing.description = draft.description.trim().to_string();
                existing
            }
            None => Team {
                id,
                name: name.to_string(),
                description: draft.description.trim().to_string(),
                created_at: now,
                members: Vec::new(),
                invitations: Vec::new(),
            },
        };

        self.upsert_team(team.clone())?;
        self.current.set(Some(&team))?;
        tracing::info!(team = %team.id, "saved team");
        Ok(team)
    }

    /// Replace-by-id: drop any record with the same id, prepend the new one
    pub fn upsert_team(&self, team: Team) -> Result<()> {
        let _lock = self.storage.lock_key(&StoreKey::Teams)?;
        let mut teams = self.storage.read_collection::<Team>(&StoreKey::Teams)?.items;
        teams.retain(|existing| existing.id != team.id);
        teams.insert(0, team.clone());
        self.storage.write_collection(&StoreKey::Teams, &teams)?;
        self.current.sync(&team)?;
        Ok(())
    }

    /// Mutate one team as the single source of truth
    ///
    /// `f` runs on the stored record; if it fails nothing is written. On
    /// success the collection entry is rewritten and then copied into the
    /// current-team pointer when it refers to the same team.
    pub fn update_team<R, F>(&self, team_id: &str, f: F) -> Result<(R, Team)>
    where
        F: FnOnce(&mut Team) -> Result<R>,
    {
        let _lock = self.storage.lock_key(&StoreKey::Teams)?;
        let mut teams = self.storage.read_collection::<Team>(&StoreKey::Teams)?.items;

        let team = teams
            .iter_mut()
            .find(|team| team.id == team_id)
            .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))?;
        let result = f(team)?;
        let updated = team.clone();

        self.storage.write_collection(&StoreKey::Teams, &teams)?;
        self.current.sync(&updated)?;
        Ok((result, updated))
    }

    /// Remove a team record; its task partition is left in place
    pub fn delete_team(&self, team_id: &str) -> Result<Team> {
        let removed = self
            .storage
            .update_collection(&StoreKey::Teams, |teams: &mut Vec<Team>| {
                let idx = teams
                    .iter()
                    .position(|team| team.id == team_id)
                    .ok_or_else(|| Error::TeamNotFound(team_id.to_string()))?;
                Ok(teams.remove(idx))
            })?;
        self.current.forget(team_id)?;
        tracing::info!(team = %team_id, "deleted team");
        Ok(removed)
    }

    /// Resolve member ids to profiles: registry first, then accepted
    /// invitations, else a shortened id placeholder
    pub fn member_profiles(&self, team: &Team, people: &[Person]) -> Vec<MemberProfile> {
        team.members
            .iter()
            .map(|id| {
                if let Some(person) = people.iter().find(|person| &person.id == id) {
                    return MemberProfile {
                        id: id.clone(),
                        name: person.name.clone(),
                        email: person.email.clone(),
                    };
                }
                if let Some(name) = accepted_invitee_name(team, id) {
                    return MemberProfile {
                        id: id.clone(),
                        name: name.to_string(),
                        email: String::new(),
                    };
                }
                MemberProfile {
                    id: id.clone(),
                    name: format!("{}...", id.chars().take(6).collect::<String>()),
                    email: String::new(),
                }
            })
            .collect()
    }
}

/// Display name recorded on an accepted invitation for `person_id`
pub fn accepted_invitee_name<'a>(team: &'a Team, person_id: &str) -> Option<&'a str> {
    team.invitations
        .iter()
        .find(|inv| inv.invitee_id == person_id && inv.status == InvitationStatus::Accepted)
        .map(|inv| inv.invitee_name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap()
    }

    fn draft(name: &str) -> TeamDraft {
        TeamDraft {
            id: None,
            name: name.to_string(),
            description: "desc".to_string(),
        }
    }

    #[test]
    fn create_team_selects_it() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));

        let team = store.create_team(draft("Alpha"), now()).unwrap();
        assert!(team.members.is_empty());
        assert!(team.invitations.is_empty());
        assert_eq!(store.current().id().unwrap(), Some(team.id.clone()));
        assert_eq!(store.list_teams().unwrap().len(), 1);
    }

    #[test]
    fn create_team_requires_name() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));

        let err = store.create_team(draft("   "), now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.list_teams().unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_by_id_and_prepends() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));
        let a = store.create_team(draft("A"), now()).unwrap();
        let b = store.create_team(draft("B"), now()).unwrap();

        let mut renamed = a.clone();
        renamed.name = "A2".to_string();
        store.upsert_team(renamed).unwrap();

        let teams = store.list_teams().unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].name, "A2");
        assert_eq!(teams[1].id, b.id);
    }

    #[test]
    fn update_team_syncs_matching_pointer_only() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));
        let a = store.create_team(draft("A"), now()).unwrap();
        let b = store.create_team(draft("B"), now()).unwrap();
        assert_eq!(store.current().id().unwrap(), Some(b.id.clone()));

        store
            .update_team(&a.id, |team| {
                team.add_member("p1");
                Ok(())
            })
            .unwrap();
        let pointer = store.current().get().unwrap().unwrap();
        assert_eq!(pointer.id, b.id);
        assert!(pointer.members.is_empty());

        store
            .update_team(&b.id, |team| {
                team.add_member("p2");
                Ok(())
            })
            .unwrap();
        let pointer = store.current().get().unwrap().unwrap();
        assert_eq!(pointer.members, vec!["p2".to_string()]);
        assert_eq!(store.require(&b.id).unwrap().members, pointer.members);
    }

    #[test]
    fn failed_update_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));
        let a = store.create_team(draft("A"), now()).unwrap();

        let result: Result<((), Team)> = store.update_team(&a.id, |team| {
            team.add_member("p1");
            Err(Error::Validation("nope".to_string()))
        });
        assert!(result.is_err());
        assert!(store.require(&a.id).unwrap().members.is_empty());

        let missing = store.update_team("missing", |_| Ok(()));
        assert!(matches!(missing, Err(Error::TeamNotFound(_))));
    }

    #[test]
    fn delete_team_clears_pointer() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));
        let a = store.create_team(draft("A"), now()).unwrap();

        store.delete_team(&a.id).unwrap();
        assert!(store.list_teams().unwrap().is_empty());
        assert!(store.current().get().unwrap().is_none());
        assert!(matches!(store.delete_team(&a.id), Err(Error::TeamNotFound(_))));
    }

    #[test]
    fn legacy_member_shapes_are_normalized() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        std::fs::write(
            storage.path_for(&StoreKey::Teams),
            r#"[
                {"id":"t1","name":"Legacy","createdAt":"2024-01-01T00:00:00Z",
                 "members":["p1",{"id":"p2","name":"Bia"},"p1",42,null],
                 "invitations":[{"id":"i1","inviteeId":"p2","inviteeName":"Bia","status":"aceito","teamId":"t1"}]},
                {"id":"","name":"no id","createdAt":"2024-01-01T00:00:00Z"},
                {"name":"broken"}
            ]"#,
        )
        .unwrap();

        let teams = TeamStore::new(storage).list_teams().unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].members, vec!["p1", "p2", "42"]);
        assert_eq!(teams[0].invitations[0].status, InvitationStatus::Accepted);
    }

    #[test]
    fn teams_for_user_match_id_or_email() {
        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));
        let a = store.create_team(draft("A"), now()).unwrap();
        let b = store.create_team(draft("B"), now()).unwrap();
        store.create_team(draft("C"), now()).unwrap();

        store
            .update_team(&a.id, |team| Ok(team.add_member("u1")))
            .unwrap();
        store
            .update_team(&b.id, |team| Ok(team.add_member("U1@Mail.com")))
            .unwrap();

        let by_id = store.list_teams_for_user("u1", None).unwrap();
        assert_eq!(by_id.len(), 1);

        let mut both: Vec<String> = store
            .list_teams_for_user("u1", Some("u1@mail.com"))
            .unwrap()
            .into_iter()
            .map(|team| team.name)
            .collect();
        both.sort();
        assert_eq!(both, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn member_profiles_fall_back_to_invitation_then_placeholder() {
        let team = Team {
            id: "t1".to_string(),
            name: "T".to_string(),
            description: String::new(),
            created_at: now(),
            members: vec![
                "p1".to_string(),
                "p2".to_string(),
                "abcdefghij".to_string(),
            ],
            invitations: vec![Invitation {
                id: "i1".to_string(),
                invitee_id: "p2".to_string(),
                invitee_name: "Bia".to_string(),
                status: InvitationStatus::Accepted,
                team_id: "t1".to_string(),
            }],
        };
        let people = vec![Person {
            id: "p1".to_string(),
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            national_id: "12345678901".to_string(),
            birth_date: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        }];

        let temp = TempDir::new().unwrap();
        let store = TeamStore::new(Storage::new(temp.path()));
        let names: Vec<String> = store
            .member_profiles(&team, &people)
            .into_iter()
            .map(|profile| profile.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Bia", "abcdef..."]);
    }
}
