//! atarefa invite command implementations.

use serde::Serialize;

use crate::cli::{Context, StoreArgs};
use crate::error::Result;
use crate::invite::Notification;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::team::Invitation;

pub struct SendOptions {
    pub email: String,
    pub team: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum Response {
    Accept,
    Decline,
    Remove,
}

impl Response {
    fn command(&self) -> &'static str {
        match self {
            Response::Accept => "invite accept",
            Response::Decline => "invite decline",
            Response::Remove => "invite rm",
        }
    }
}

pub struct RespondOptions {
    pub action: Response,
    pub id: String,
    pub team: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub team: Option<String>,
    pub mine: bool,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct SendOutput {
    invitation: Invitation,
    email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_error: Option<String>,
}

#[derive(Serialize)]
struct RespondOutput {
    invitation: Invitation,
    members: Vec<String>,
}

#[derive(Serialize)]
struct ListOutput {
    total: usize,
    invitations: Vec<Invitation>,
}

fn invitation_line(invitation: &Invitation) -> String {
    format!(
        "[{}] {} ({}) {}",
        invitation.status.as_str(),
        invitation.invitee_name,
        invitation.team_id,
        invitation.id
    )
}

pub fn run_send(options: SendOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let team = ctx.resolve_team(options.team.as_deref())?;
    let outcome = ctx.invitations()?.invite(&team.id, &options.email)?;

    let mut human = HumanOutput::new(format!(
        "atarefa invite send: {} to {}",
        outcome.invitation.invitee_name, outcome.team.name
    ));
    human.push_summary("invitation", outcome.invitation.id.clone());
    human.push_summary("status", outcome.invitation.status.as_str());

    let email_error = match &outcome.notification {
        Notification::Sent => {
            human.push_summary("e-mail", "sent");
            None
        }
        Notification::Failed(err) => {
            human.push_warning(format!("invitation saved but e-mail not sent: {err}"));
            Some(err.to_string())
        }
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "invite send",
        &SendOutput {
            invitation: outcome.invitation,
            email_sent: email_error.is_none(),
            email_error,
        },
        Some(&human),
    )
}

pub fn run_respond(options: RespondOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let engine = ctx.invitations()?;
    let team = match options.team.as_deref() {
        Some(team) => ctx.resolve_team(Some(team))?,
        None => engine.team_of(&options.id)?,
    };

    let (invitation, team) = match options.action {
        Response::Accept => engine.accept(&team.id, &options.id)?,
        Response::Decline => engine.decline(&team.id, &options.id)?,
        Response::Remove => engine.remove(&team.id, &options.id)?,
    };

    let command = options.action.command();
    let mut human = HumanOutput::new(format!("atarefa {command}: {}", invitation.invitee_name));
    human.push_summary("invitation", invitation.id.clone());
    human.push_summary("status", invitation.status.as_str());
    human.push_summary("team", team.name.clone());
    human.push_summary("members", team.members.len().to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        command,
        &RespondOutput {
            invitation,
            members: team.members,
        },
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let engine = ctx.invitations()?;

    let (header, invitations) = if options.mine {
        let user = ctx.require_user()?;
        ("pending for you".to_string(), engine.pending_for(&user.id)?)
    } else {
        let team = ctx.resolve_team(options.team.as_deref())?;
        let invitations = engine.list(&team.id)?;
        (team.name, invitations)
    };

    let mut human = HumanOutput::new(format!(
        "atarefa invite ls: {} ({} invitations)",
        header,
        invitations.len()
    ));
    for invitation in &invitations {
        human.push_detail(invitation_line(invitation));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "invite ls",
        &ListOutput {
            total: invitations.len(),
            invitations,
        },
        Some(&human),
    )
}
