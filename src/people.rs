//! Person registry.
//!
//! People ("atarefados") are registered locally and referenced by id from
//! team membership lists and task assignments. The registry never cascades:
//! deleting a person leaves membership lists untouched, and deletion itself
//! is gated by the membership guard.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PeopleConfig;
use crate::error::{Error, Result};
use crate::storage::{Storage, StoreKey};

/// A registered person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(alias = "nome")]
    pub name: String,
    pub email: String,
    #[serde(alias = "cpf")]
    pub national_id: String,
    #[serde(alias = "nascimento", deserialize_with = "crate::dates::deserialize_date")]
    pub birth_date: NaiveDate,
}

impl Person {
    fn has_required_fields(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.national_id.trim().is_empty()
    }
}

/// Registration input; `id` is set when editing an existing person
#[derive(Debug, Clone, Default)]
pub struct PersonDraft {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub national_id: String,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct PersonStore {
    storage: Storage,
    config: PeopleConfig,
}

impl PersonStore {
    pub fn new(storage: Storage, config: PeopleConfig) -> Self {
        Self { storage, config }
    }

    /// All valid people; entries missing required fields are dropped
    pub fn list(&self) -> Result<Vec<Person>> {
        let decoded = self.storage.read_collection::<Person>(&StoreKey::People)?;
        let mut people = decoded.items;
        people.retain(Person::has_required_fields);
        Ok(people)
    }

    pub fn get(&self, id: &str) -> Result<Option<Person>> {
        Ok(self.list()?.into_iter().find(|person| person.id == id))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Person>> {
        let wanted = email.trim();
        Ok(self
            .list()?
            .into_iter()
            .find(|person| person.email.trim().eq_ignore_ascii_case(wanted)))
    }

    /// Validate and upsert a person (replace by id, newest first)
    pub fn register(&self, draft: PersonDraft, today: NaiveDate) -> Result<Person> {
        let person = self.validate(draft, today)?;

        let saved = person.clone();
        self.storage
            .update_collection(&StoreKey::People, move |people: &mut Vec<Person>| {
                let email = person.email.trim();
                if people.iter().any(|existing| {
                    existing.id != person.id && existing.email.trim().eq_ignore_ascii_case(email)
                }) {
                    return Err(Error::Validation(format!(
                        "e-mail '{email}' is already registered"
                    )));
                }
                people.retain(|existing| existing.id != person.id);
                people.insert(0, person);
                Ok(())
            })?;

        tracing::info!(person = %saved.id, "registered person");
        Ok(saved)
    }

    /// Remove a person record without consulting the guard
    ///
    /// Callers go through [`crate::guard::MembershipGuard::delete_person`].
    pub(crate) fn remove(&self, id: &str) -> Result<Person> {
        self.storage
            .update_collection(&StoreKey::People, |people: &mut Vec<Person>| {
                let idx = people
                    .iter()
                    .position(|person| person.id == id)
                    .ok_or_else(|| Error::PersonNotFound(id.to_string()))?;
                Ok(people.remove(idx))
            })
    }

    fn validate(&self, draft: PersonDraft, today: NaiveDate) -> Result<Person> {
        let name = draft.name.trim();
        let email = draft.email.trim();
        let national_id = draft.national_id.trim();

        if name.is_empty() || email.is_empty() || national_id.is_empty() {
            return Err(Error::Validation(
                "name, email and national id are required".to_string(),
            ));
        }

        if !is_valid_email(email) {
            return Err(Error::Validation(format!("invalid email '{email}'")));
        }

        let digits: Vec<char> = national_id.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != self.config.national_id_digits {
            return Err(Error::Validation(format!(
                "national id must contain {} digits",
                self.config.national_id_digits
            )));
        }
        if digits.windows(2).all(|pair| pair[0] == pair[1]) {
            return Err(Error::Validation(
                "national id cannot repeat a single digit".to_string(),
            ));
        }

        let birth_date = draft
            .birth_date
            .ok_or_else(|| Error::Validation("birth date is required".to_string()))?;
        if age_on(birth_date, today) < self.config.min_age_years as i32 {
            return Err(Error::Validation(format!(
                "person must be at least {} years old",
                self.config.min_age_years
            )));
        }

        let id = draft
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Person {
            id,
            name: name.to_string(),
            email: email.to_string(),
            national_id: national_id.to_string(),
            birth_date,
        })
    }
}

/// `local@domain.tld` with no whitespace anywhere
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> PersonStore {
        PersonStore::new(Storage::new(temp.path()), PeopleConfig::default())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn draft(name: &str, email: &str) -> PersonDraft {
        PersonDraft {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
            national_id: "123.456.789-01".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 15),
        }
    }

    #[test]
    fn register_assigns_id_and_prepends() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let ana = store.register(draft("Ana", "ana@x.com"), today()).unwrap();
        let bia = store.register(draft("Bia", "bia@x.com"), today()).unwrap();
        assert!(!ana.id.is_empty());

        let names: Vec<String> = store.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bia".to_string(), "Ana".to_string()]);
        assert_eq!(store.get(&bia.id).unwrap().map(|p| p.email), Some("bia@x.com".to_string()));
    }

    #[test]
    fn register_with_existing_id_replaces_record() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let ana = store.register(draft("Ana", "ana@x.com"), today()).unwrap();
        let mut edit = draft("Ana Maria", "ana@x.com");
        edit.id = Some(ana.id.clone());
        store.register(edit, today()).unwrap();

        let people = store.list().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "Ana Maria");
    }

    #[test]
    fn validation_rules() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let bad_email = store.register(draft("Ana", "ana at x"), today());
        assert!(matches!(bad_email, Err(Error::Validation(_))));

        let mut short_id = draft("Ana", "ana@x.com");
        short_id.national_id = "1234".to_string();
        assert!(matches!(store.register(short_id, today()), Err(Error::Validation(_))));

        let mut too_young = draft("Ana", "ana@x.com");
        too_young.birth_date = NaiveDate::from_ymd_opt(2011, 6, 2);
        assert!(matches!(store.register(too_young, today()), Err(Error::Validation(_))));

        let mut just_old_enough = draft("Ana", "ana@x.com");
        just_old_enough.birth_date = NaiveDate::from_ymd_opt(2011, 6, 1);
        assert!(store.register(just_old_enough, today()).is_ok());
    }

    #[test]
    fn national_id_of_one_repeated_digit_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mut repeated = draft("Ana", "ana@x.com");
        repeated.national_id = "111.111.111-11".to_string();
        let err = store.register(repeated, today()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("repeat")));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn email_already_taken_is_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let ana = store.register(draft("Ana", "a@x.com"), today()).unwrap();
        let err = store.register(draft("Bia", " A@X.com"), today()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("already registered")));
        assert_eq!(store.find_by_email("a@x.com").unwrap().map(|p| p.id), Some(ana.id.clone()));

        // Editing a person keeps their own address.
        let mut edit = draft("Ana Maria", "A@x.com");
        edit.id = Some(ana.id);
        assert!(store.register(edit, today()).is_ok());
    }

    #[test]
    fn find_by_email_ignores_case_and_padding() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let ana = store.register(draft("Ana", "Ana@X.com"), today()).unwrap();

        let found = store.find_by_email("  ana@x.COM ").unwrap();
        assert_eq!(found.map(|p| p.id), Some(ana.id));
        assert!(store.find_by_email("nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn list_drops_incomplete_entries() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        std::fs::write(
            storage.path_for(&StoreKey::People),
            r#"[
                {"id":"1","name":"Ana","email":"a@x.com","nationalId":"12345678901","birthDate":"1990-01-01T03:00:00.000Z"},
                {"id":"2","name":"","email":"b@x.com","nationalId":"12345678901","birthDate":"1990-01-01"},
                {"id":"3","name":"Caio"}
            ]"#,
        )
        .unwrap();

        let people = PersonStore::new(storage, PeopleConfig::default()).list().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, "1");
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("a@.d"));
    }
}
