//! Current-user resolution.
//!
//! Resolution order:
//! 1) Session identifier (CLI `--user` or `ATAREFA_USER`)
//! 2) Cached current-user record, under each configured key alias in order
//!
//! No user resolved means no team scoping: callers get `None`, never an error.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::IdentityConfig;
use crate::error::{Error, Result};
use crate::storage::{Storage, StoreKey};
use crate::team::CurrentTeam;

const ID_FIELDS: [&str; 3] = ["id", "uid", "userId"];

/// The logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentUser {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    storage: Storage,
    config: IdentityConfig,
}

impl IdentityResolver {
    pub fn new(storage: Storage, config: IdentityConfig) -> Self {
        Self { storage, config }
    }

    pub fn resolve_current_user_id(&self, session: Option<&str>) -> Result<Option<String>> {
        Ok(self.resolve(session)?.map(|user| user.id))
    }

    /// Resolve the current user from the session, then the cached records
    pub fn resolve(&self, session: Option<&str>) -> Result<Option<CurrentUser>> {
        let cached = self.cached_user()?;

        if let Some(id) = non_empty(session) {
            let email = cached
                .filter(|user| user.id == id)
                .and_then(|user| user.email);
            return Ok(Some(CurrentUser {
                id: id.to_string(),
                email,
            }));
        }

        if cached.is_none() {
            tracing::debug!("no current user");
        }
        Ok(cached)
    }

    /// Cache `id` as the current user under the primary key
    pub fn login(&self, id: &str, email: Option<&str>) -> Result<CurrentUser> {
        let id = non_empty(Some(id))
            .ok_or_else(|| Error::InvalidArgument("user id cannot be empty".to_string()))?;
        let alias = self
            .config
            .cache_keys
            .first()
            .ok_or_else(|| Error::InvalidConfig("identity.cache_keys cannot be empty".to_string()))?;

        let user = CurrentUser {
            id: id.to_string(),
            email: non_empty(email).map(str::to_string),
        };
        let record = match &user.email {
            Some(email) => json!({ "id": user.id, "email": email }),
            None => json!({ "id": user.id }),
        };

        let key = StoreKey::CurrentUser(alias.clone());
        let _lock = self.storage.lock_key(&key)?;
        self.storage.write_value(&key, &record)?;
        tracing::info!(user = %user.id, "logged in");
        Ok(user)
    }

    /// Forget every cached identity and the selected team
    pub fn logout(&self) -> Result<usize> {
        let mut removed = 0;
        for alias in &self.config.cache_keys {
            let key = StoreKey::CurrentUser(alias.clone());
            let _lock = self.storage.lock_key(&key)?;
            if self.storage.remove_key(&key)? {
                removed += 1;
            }
        }
        CurrentTeam::new(self.storage.clone()).clear()?;
        tracing::info!(removed, "logged out");
        Ok(removed)
    }

    fn cached_user(&self) -> Result<Option<CurrentUser>> {
        for alias in &self.config.cache_keys {
            let key = StoreKey::CurrentUser(alias.clone());
            let Some(record) = self.storage.read_value::<Value>(&key)? else {
                continue;
            };
            if let Some(user) = user_from_record(&record) {
                return Ok(Some(user));
            }
            tracing::debug!(%key, "cached user record has no id");
        }
        Ok(None)
    }
}

fn user_from_record(record: &Value) -> Option<CurrentUser> {
    let id = ID_FIELDS.iter().find_map(|field| match record.get(*field)? {
        Value::String(id) => non_empty(Some(id)).map(str::to_string),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })?;
    let email = record
        .get("email")
        .and_then(Value::as_str)
        .and_then(|email| non_empty(Some(email)))
        .map(str::to_string);
    Some(CurrentUser { id, email })
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::{TeamDraft, TeamStore};
    use chrono::Utc;
    use tempfile::TempDir;

    fn resolver(temp: &TempDir) -> IdentityResolver {
        IdentityResolver::new(Storage::new(temp.path()), IdentityConfig::default())
    }

    #[test]
    fn nothing_resolves_to_none() {
        let temp = TempDir::new().unwrap();
        assert_eq!(resolver(&temp).resolve(None).unwrap(), None);
        assert_eq!(resolver(&temp).resolve(Some("  ")).unwrap(), None);
    }

    #[test]
    fn session_wins_over_cache() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver(&temp);
        resolver.login("cached", Some("c@x.com")).unwrap();

        let user = resolver.resolve(Some("session")).unwrap().unwrap();
        assert_eq!(user.id, "session");
        assert_eq!(user.email, None);

        let user = resolver.resolve(Some("cached")).unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("c@x.com"));
    }

    #[test]
    fn legacy_aliases_and_id_fields_are_read() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        std::fs::write(
            storage.path_for(&StoreKey::CurrentUser("authUser".to_string())),
            r#"{"uid":"u-42","email":"u@x.com"}"#,
        )
        .unwrap();
        std::fs::write(
            storage.path_for(&StoreKey::CurrentUser("user".to_string())),
            r#"{"name":"no id here"}"#,
        )
        .unwrap();

        let user = resolver(&temp).resolve(None).unwrap().unwrap();
        assert_eq!(user.id, "u-42");
        assert_eq!(user.email.as_deref(), Some("u@x.com"));
        assert_eq!(
            resolver(&temp).resolve_current_user_id(None).unwrap(),
            Some("u-42".to_string())
        );
    }

    #[test]
    fn logout_clears_aliases_and_current_team() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let resolver = resolver(&temp);
        resolver.login("u1", None).unwrap();
        std::fs::write(
            storage.path_for(&StoreKey::CurrentUser("currentUser".to_string())),
            r#"{"userId":7}"#,
        )
        .unwrap();
        let teams = TeamStore::new(storage);
        teams
            .create_team(
                TeamDraft {
                    id: None,
                    name: "T".to_string(),
                    description: String::new(),
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(resolver.logout().unwrap(), 2);
        assert_eq!(resolver.resolve(None).unwrap(), None);
        assert!(teams.current().get().unwrap().is_none());
    }
}
