//! Invitation lifecycle.
//!
//! An invitation starts `pending` and is resolved once, to `accepted` (which
//! adds the invitee to the team) or `declined`. Any invitation can be removed
//! outright. Every change is written through [`TeamStore::update_team`], so
//! the team entry and the current-team pointer never diverge.
//!
//! Sending the invitation e-mail is best effort: the invitation is persisted
//! first and the send result is reported next to it, never rolled back.

use ulid::Ulid;

use crate::error::{Error, NotifyError, Result};
use crate::notify::{Directory, InviteNotice, Notifier};
use crate::team::{Invitation, InvitationStatus, Team, TeamStore};

/// What happened to the invitation e-mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Sent,
    Failed(NotifyError),
}

/// Result of [`InvitationEngine::invite`]
#[derive(Debug, Clone)]
pub struct InviteOutcome {
    pub invitation: Invitation,
    pub team: Team,
    pub notification: Notification,
}

pub struct InvitationEngine {
    teams: TeamStore,
    directory: Box<dyn Directory>,
    notifier: Box<dyn Notifier>,
}

impl InvitationEngine {
    pub fn new(teams: TeamStore, directory: Box<dyn Directory>, notifier: Box<dyn Notifier>) -> Self {
        Self {
            teams,
            directory,
            notifier,
        }
    }

    /// Invite the person registered under `email` to a team
    pub fn invite(&self, team_id: &str, email: &str) -> Result<InviteOutcome> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::Validation("invitee e-mail is required".to_string()));
        }

        let invitee = self
            .directory
            .find_by_email(email)?
            .ok_or_else(|| Error::PersonNotFound(email.to_string()))?;

        let (invitation, team) = self.teams.update_team(team_id, |team| {
            if team.pending_invitation_for(&invitee.id).is_some() {
                return Err(Error::DuplicatePending {
                    team: team.name.clone(),
                    person: invitee.email.clone(),
                });
            }
            let invitation = Invitation {
                id: Ulid::new().to_string(),
                invitee_id: invitee.id.clone(),
                invitee_name: invitee.name.clone(),
                status: InvitationStatus::Pending,
                team_id: team.id.clone(),
            };
            team.invitations.push(invitation.clone());
            Ok(invitation)
        })?;
        tracing::info!(team = %team_id, invitation = %invitation.id, "created invitation");

        let notice = InviteNotice {
            to_email: invitee.email,
            to_name: invitee.name,
            team_name: team.name.clone(),
        };
        let notification = match self.notifier.send(&notice) {
            Ok(()) => Notification::Sent,
            Err(err) => {
                tracing::warn!(team = %team_id, invitation = %invitation.id, error = %err, "invitation e-mail not sent");
                Notification::Failed(err)
            }
        };

        Ok(InviteOutcome {
            invitation,
            team,
            notification,
        })
    }

    /// Accept an invitation and add the invitee to the team
    ///
    /// Accepting an already accepted invitation succeeds without adding the
    /// member twice.
    pub fn accept(&self, team_id: &str, invitation_id: &str) -> Result<(Invitation, Team)> {
        let team = self.teams.require(team_id)?;
        let invitee_id = team
            .invitation(invitation_id)
            .map(|inv| inv.invitee_id.clone())
            .ok_or_else(|| Error::InvitationNotFound(invitation_id.to_string()))?;
        if self.directory.find_by_id(&invitee_id)?.is_none() {
            return Err(Error::PersonNotFound(invitee_id));
        }

        let (invitation, team) = self.teams.update_team(team_id, |team| {
            let invitation = team
                .invitation_mut(invitation_id)
                .ok_or_else(|| Error::InvitationNotFound(invitation_id.to_string()))?;
            match invitation.status {
                InvitationStatus::Pending | InvitationStatus::Accepted => {
                    invitation.status = InvitationStatus::Accepted;
                }
                InvitationStatus::Declined => {
                    return Err(Error::InvalidTransition {
                        id: invitation.id.clone(),
                        status: invitation.status.as_str().to_string(),
                    });
                }
            }
            let invitation = invitation.clone();
            team.add_member(&invitation.invitee_id);
            Ok(invitation)
        })?;
        tracing::info!(team = %team_id, invitation = %invitation_id, "accepted invitation");
        Ok((invitation, team))
    }

    /// Decline an invitation; membership is not touched
    pub fn decline(&self, team_id: &str, invitation_id: &str) -> Result<(Invitation, Team)> {
        let (invitation, team) = self.teams.update_team(team_id, |team| {
            let invitation = team
                .invitation_mut(invitation_id)
                .ok_or_else(|| Error::InvitationNotFound(invitation_id.to_string()))?;
            match invitation.status {
                InvitationStatus::Pending | InvitationStatus::Declined => {
                    invitation.status = InvitationStatus::Declined;
                }
                InvitationStatus::Accepted => {
                    return Err(Error::InvalidTransition {
                        id: invitation.id.clone(),
                        status: invitation.status.as_str().to_string(),
                    });
                }
            }
            Ok(invitation.clone())
        })?;
        tracing::info!(team = %team_id, invitation = %invitation_id, "declined invitation");
        Ok((invitation, team))
    }

    /// Delete an invitation regardless of its status
    pub fn remove(&self, team_id: &str, invitation_id: &str) -> Result<(Invitation, Team)> {
        let (invitation, team) = self.teams.update_team(team_id, |team| {
            let idx = team
                .invitations
                .iter()
                .position(|inv| inv.id == invitation_id)
                .ok_or_else(|| Error::InvitationNotFound(invitation_id.to_string()))?;
            Ok(team.invitations.remove(idx))
        })?;
        tracing::info!(team = %team_id, invitation = %invitation_id, "removed invitation");
        Ok((invitation, team))
    }

    /// Team owning an invitation, searched across every team
    pub fn team_of(&self, invitation_id: &str) -> Result<Team> {
        self.teams
            .list_teams()?
            .into_iter()
            .find(|team| team.invitation(invitation_id).is_some())
            .ok_or_else(|| Error::InvitationNotFound(invitation_id.to_string()))
    }

    pub fn list(&self, team_id: &str) -> Result<Vec<Invitation>> {
        Ok(self.teams.require(team_id)?.invitations)
    }

    /// Pending invitations addressed to a person, across every team
    pub fn pending_for(&self, person_id: &str) -> Result<Vec<Invitation>> {
        Ok(self
            .teams
            .list_teams()?
            .into_iter()
            .flat_map(|team| team.invitations)
            .filter(|inv| inv.invitee_id == person_id && inv.status == InvitationStatus::Pending)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::DirectoryEntry;
    use crate::storage::Storage;
    use crate::team::TeamDraft;
    use chrono::{TimeZone, Utc};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct FakeDirectory(Vec<DirectoryEntry>);

    impl Directory for FakeDirectory {
        fn find_by_email(&self, email: &str) -> Result<Option<DirectoryEntry>> {
            Ok(self.0.iter().find(|e| e.email.eq_ignore_ascii_case(email)).cloned())
        }

        fn find_by_id(&self, id: &str) -> Result<Option<DirectoryEntry>> {
            Ok(self.0.iter().find(|e| e.id == id).cloned())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<InviteNotice>>>,
        fail: bool,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, notice: &InviteNotice) -> std::result::Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notice.clone());
            if self.fail {
                Err(NotifyError::Transport("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn entry(id: &str, name: &str, email: &str) -> DirectoryEntry {
        DirectoryEntry {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    fn setup(temp: &TempDir, notifier: RecordingNotifier) -> (InvitationEngine, TeamStore, Team) {
        let teams = TeamStore::new(Storage::new(temp.path()));
        let team = teams
            .create_team(
                TeamDraft {
                    id: None,
                    name: "T1".to_string(),
                    description: String::new(),
                },
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            )
            .unwrap();
        let directory = FakeDirectory(vec![
            entry("p1", "Ana", "a@x.com"),
            entry("p2", "Bia", "b@x.com"),
        ]);
        let engine = InvitationEngine::new(teams.clone(), Box::new(directory), Box::new(notifier));
        (engine, teams, team)
    }

    #[test]
    fn invite_creates_pending_and_notifies() {
        let temp = TempDir::new().unwrap();
        let notifier = RecordingNotifier::default();
        let (engine, teams, team) = setup(&temp, notifier.clone());

        let outcome = engine.invite(&team.id, " A@x.com ").unwrap();
        assert_eq!(outcome.invitation.status, InvitationStatus::Pending);
        assert_eq!(outcome.invitation.invitee_id, "p1");
        assert_eq!(outcome.notification, Notification::Sent);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].team_name, "T1");

        let stored = teams.require(&team.id).unwrap();
        assert_eq!(stored.invitations, vec![outcome.invitation.clone()]);
        assert_eq!(teams.current().get().unwrap().unwrap(), stored);
    }

    #[test]
    fn invite_rejects_unknown_and_duplicate_pending() {
        let temp = TempDir::new().unwrap();
        let (engine, teams, team) = setup(&temp, RecordingNotifier::default());

        assert!(matches!(
            engine.invite(&team.id, "nobody@x.com"),
            Err(Error::PersonNotFound(_))
        ));

        engine.invite(&team.id, "a@x.com").unwrap();
        assert!(matches!(
            engine.invite(&team.id, "a@x.com"),
            Err(Error::DuplicatePending { .. })
        ));
        assert_eq!(teams.require(&team.id).unwrap().invitations.len(), 1);
    }

    #[test]
    fn failed_notification_keeps_invitation() {
        let temp = TempDir::new().unwrap();
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        let (engine, teams, team) = setup(&temp, notifier);

        let outcome = engine.invite(&team.id, "b@x.com").unwrap();
        assert!(matches!(outcome.notification, Notification::Failed(NotifyError::Transport(_))));
        assert_eq!(teams.require(&team.id).unwrap().invitations.len(), 1);
    }

    #[test]
    fn accept_twice_does_not_duplicate_member() {
        let temp = TempDir::new().unwrap();
        let (engine, teams, team) = setup(&temp, RecordingNotifier::default());
        let invitation = engine.invite(&team.id, "a@x.com").unwrap().invitation;

        let (accepted, _) = engine.accept(&team.id, &invitation.id).unwrap();
        assert_eq!(accepted.status, InvitationStatus::Accepted);
        let (_, team_after) = engine.accept(&team.id, &invitation.id).unwrap();
        assert_eq!(team_after.members, vec!["p1".to_string()]);
        assert_eq!(teams.current().get().unwrap().unwrap().members, vec!["p1".to_string()]);

        assert!(matches!(
            engine.decline(&team.id, &invitation.id),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn accept_when_already_member_still_transitions() {
        let temp = TempDir::new().unwrap();
        let (engine, teams, team) = setup(&temp, RecordingNotifier::default());
        teams
            .update_team(&team.id, |team| Ok(team.add_member("p2")))
            .unwrap();
        let invitation = engine.invite(&team.id, "b@x.com").unwrap().invitation;

        let (accepted, updated) = engine.accept(&team.id, &invitation.id).unwrap();
        assert_eq!(accepted.status, InvitationStatus::Accepted);
        assert_eq!(updated.members, vec!["p2".to_string()]);
    }

    #[test]
    fn decline_leaves_membership_and_blocks_accept() {
        let temp = TempDir::new().unwrap();
        let (engine, _teams, team) = setup(&temp, RecordingNotifier::default());
        let invitation = engine.invite(&team.id, "a@x.com").unwrap().invitation;

        let (declined, updated) = engine.decline(&team.id, &invitation.id).unwrap();
        assert_eq!(declined.status, InvitationStatus::Declined);
        assert!(updated.members.is_empty());
        assert!(engine.decline(&team.id, &invitation.id).is_ok());
        assert!(matches!(
            engine.accept(&team.id, &invitation.id),
            Err(Error::InvalidTransition { .. })
        ));

        // A declined invitation does not block a new one.
        assert!(engine.invite(&team.id, "a@x.com").is_ok());
    }

    #[test]
    fn remove_deletes_any_status() {
        let temp = TempDir::new().unwrap();
        let (engine, _teams, team) = setup(&temp, RecordingNotifier::default());
        let first = engine.invite(&team.id, "a@x.com").unwrap().invitation;
        let second = engine.invite(&team.id, "b@x.com").unwrap().invitation;
        engine.accept(&team.id, &second.id).unwrap();

        engine.remove(&team.id, &first.id).unwrap();
        let (_, team_after) = engine.remove(&team.id, &second.id).unwrap();
        assert!(team_after.invitations.is_empty());
        assert_eq!(team_after.members, vec!["p2".to_string()]);
        assert!(matches!(
            engine.remove(&team.id, &first.id),
            Err(Error::InvitationNotFound(_))
        ));
    }

    #[test]
    fn pending_for_spans_teams() {
        let temp = TempDir::new().unwrap();
        let (engine, teams, team) = setup(&temp, RecordingNotifier::default());
        let other = teams
            .create_team(
                TeamDraft {
                    id: None,
                    name: "T2".to_string(),
                    description: String::new(),
                },
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            )
            .unwrap();
        engine.invite(&team.id, "a@x.com").unwrap();
        engine.invite(&other.id, "a@x.com").unwrap();
        engine.invite(&other.id, "b@x.com").unwrap();

        assert_eq!(engine.pending_for("p1").unwrap().len(), 2);
        let last = engine.list(&other.id).unwrap().pop().unwrap();
        assert_eq!(engine.team_of(&last.id).unwrap().id, other.id);
        assert!(matches!(engine.team_of("nope"), Err(Error::InvitationNotFound(_))));
        assert_eq!(engine.list(&other.id).unwrap().len(), 2);
    }
}
