//! External collaborators of the invitation flow.
//!
//! [`Notifier`] sends the invitation e-mail; [`Directory`] resolves people
//! by e-mail or id. Both are traits so the engine can run against the local
//! registry and an HTTP sender in the CLI, and against fakes in tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::InvitesConfig;
use crate::error::{NotifyError, Result};
use crate::people::PersonStore;

/// Payload of one invitation e-mail
///
/// Field names follow the sender endpoint's JSON contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteNotice {
    #[serde(rename = "emailDestino")]
    pub to_email: String,
    #[serde(rename = "nomeDestino")]
    pub to_name: String,
    #[serde(rename = "nomeEquipe")]
    pub team_name: String,
}

pub trait Notifier {
    fn send(&self, notice: &InviteNotice) -> std::result::Result<(), NotifyError>;
}

/// Used when no sender endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send(&self, _notice: &InviteNotice) -> std::result::Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

#[derive(Debug, Deserialize)]
struct SenderReply {
    #[serde(default)]
    error: Option<String>,
}

/// Posts invitation notices as JSON to the configured endpoint
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> std::result::Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("atarefa/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("build client failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl Notifier for HttpNotifier {
    fn send(&self, notice: &InviteNotice) -> std::result::Result<(), NotifyError> {
        tracing::debug!(endpoint = %self.endpoint, to = %notice.to_email, "sending invitation e-mail");

        let response = self
            .client
            .post(&self.endpoint)
            .json(notice)
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<SenderReply>(&body)
            .ok()
            .and_then(|reply| reply.error)
            .unwrap_or(body);
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Build the sender for a configuration: HTTP when an endpoint is set
pub fn notifier_from_config(config: &InvitesConfig) -> std::result::Result<Box<dyn Notifier>, NotifyError> {
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => Ok(Box::new(HttpNotifier::new(
            endpoint,
            Duration::from_secs(config.timeout_secs),
        )?)),
        _ => Ok(Box::new(DisabledNotifier)),
    }
}

/// Person as seen by the directory lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Profile lookup used to resolve invitees
pub trait Directory {
    fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>>;
    fn find_by_id(&self, id: &str) -> Result<Option<DirectoryEntry>>;
}

/// Directory backed by the local people registry
#[derive(Debug, Clone)]
pub struct PeopleDirectory {
    people: PersonStore,
}

impl PeopleDirectory {
    pub fn new(people: PersonStore) -> Self {
        Self { people }
    }
}

impl Directory for PeopleDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>> {
        Ok(self.people.find_by_email(email)?.map(|person| DirectoryEntry {
            id: person.id,
            name: person.name,
            email: person.email,
        }))
    }

    fn find_by_id(&self, id: &str) -> Result<Option<DirectoryEntry>> {
        Ok(self.people.get(id)?.map(|person| DirectoryEntry {
            id: person.id,
            name: person.name,
            email: person.email,
        }))
    }
}
