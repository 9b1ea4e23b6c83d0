//! atarefa team command implementations.

use chrono::Utc;
use serde::Serialize;

use crate::cli::{Context, StoreArgs};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::team::{MemberProfile, Team, TeamDraft};

pub struct NewOptions {
    pub name: String,
    pub description: String,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub mine: bool,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub id: String,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct UseOptions {
    /// `None` clears the selection
    pub id: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct CurrentOptions {
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct MembersOptions {
    pub team: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct KickOptions {
    pub person: String,
    pub team: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TeamListOutput {
    total: usize,
    current: Option<String>,
    teams: Vec<Team>,
}

#[derive(Serialize)]
struct MembersOutput {
    team: String,
    members: Vec<MemberProfile>,
}

fn team_line(team: &Team, current: Option<&str>) -> String {
    let marker = if current == Some(team.id.as_str()) { "* " } else { "" };
    format!(
        "{marker}{} ({} members, {} invitations) {}",
        team.name,
        team.members.len(),
        team.invitations.len(),
        team.id
    )
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let team = ctx.teams.create_team(
        TeamDraft {
            id: None,
            name: options.name,
            description: options.description,
        },
        Utc::now(),
    )?;

    let mut human = HumanOutput::new(format!("atarefa team new: {}", team.name));
    human.push_summary("id", team.id.clone());
    human.push_summary("selected", "yes");
    human.push_next_step("atarefa invite send <email>");

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "team new",
        &team,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let teams = if options.mine {
        let user = ctx.require_user()?;
        ctx.teams.list_teams_for_user(&user.id, user.email.as_deref())?
    } else {
        ctx.teams.list_teams()?
    };
    let current = ctx.teams.current().id()?;

    let mut human = HumanOutput::new(format!("atarefa team ls: {} teams", teams.len()));
    for team in &teams {
        human.push_detail(team_line(team, current.as_deref()));
    }
    if teams.is_empty() {
        human.push_next_step("atarefa team new <name>");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "team ls",
        &TeamListOutput {
            total: teams.len(),
            current,
            teams,
        },
        Some(&human),
    )
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let removed = ctx.teams.delete_team(&options.id)?;

    let mut human = HumanOutput::new(format!("atarefa team rm: {}", removed.name));
    human.push_summary("id", removed.id.clone());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "team rm",
        &removed,
        Some(&human),
    )
}

pub fn run_use(options: UseOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let output = OutputOptions {
        json: options.json,
        quiet: options.quiet,
    };

    match options.id {
        Some(id) => {
            let team = ctx.teams.require(&id)?;
            ctx.teams.current().set(Some(&team))?;
            let mut human = HumanOutput::new(format!("atarefa team use: {}", team.name));
            human.push_summary("id", team.id.clone());
            emit_success(output, "team use", &team, Some(&human))
        }
        None => {
            ctx.teams.current().clear()?;
            let human = HumanOutput::new("atarefa team use: selection cleared");
            emit_success(output, "team use", &Option::<Team>::None, Some(&human))
        }
    }
}

pub fn run_current(options: CurrentOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let team = ctx.teams.current().get()?.ok_or(Error::NoCurrentTeam)?;

    let mut human = HumanOutput::new(format!("atarefa team current: {}", team.name));
    human.push_summary("id", team.id.clone());
    if !team.description.is_empty() {
        human.push_summary("description", team.description.clone());
    }
    human.push_summary("members", team.members.len().to_string());
    human.push_summary("invitations", team.invitations.len().to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "team current",
        &team,
        Some(&human),
    )
}

pub fn run_members(options: MembersOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let team = ctx.resolve_team(options.team.as_deref())?;
    let people = ctx.people.list()?;
    let members = ctx.teams.member_profiles(&team, &people);

    let mut human = HumanOutput::new(format!(
        "atarefa team members: {} ({} members)",
        team.name,
        members.len()
    ));
    for member in &members {
        if member.email.is_empty() {
            human.push_detail(format!("{} {}", member.name, member.id));
        } else {
            human.push_detail(format!("{} <{}> {}", member.name, member.email, member.id));
        }
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "team members",
        &MembersOutput {
            team: team.id,
            members,
        },
        Some(&human),
    )
}

pub fn run_kick(options: KickOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let team = ctx.resolve_team(options.team.as_deref())?;
    let updated = ctx.guard().remove_member(&team.id, &options.person)?;

    let mut human = HumanOutput::new(format!("atarefa team kick: {}", options.person));
    human.push_summary("team", updated.name.clone());
    human.push_summary("members", updated.members.len().to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "team kick",
        &updated,
        Some(&human),
    )
}
