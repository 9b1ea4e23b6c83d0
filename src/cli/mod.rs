//! Command-line interface for atarefa
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::guard::MembershipGuard;
use crate::identity::{CurrentUser, IdentityResolver};
use crate::invite::InvitationEngine;
use crate::notify::{notifier_from_config, PeopleDirectory};
use crate::people::PersonStore;
use crate::storage::{Partition, Storage};
use crate::task::TaskStore;
use crate::team::{Team, TeamStore};

mod calendar;
mod invite;
mod person;
mod session;
mod task;
mod team;

/// atarefa - team task tracking
///
/// Register people, form teams, invite members and track task due dates
/// on a calendar, all in a local store.
#[derive(Parser, Debug)]
#[command(name = "atarefa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "ATAREFA_STORE")]
    pub store: Option<PathBuf>,

    /// Session user id (overrides the cached login)
    #[arg(long, global = true, env = "ATAREFA_USER")]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Person registry
    #[command(subcommand)]
    Person(PersonCommands),

    /// Teams, selection and membership
    #[command(subcommand)]
    Team(TeamCommands),

    /// Team invitations
    #[command(subcommand)]
    Invite(InviteCommands),

    /// Tasks of a team (or the legacy ungrouped list)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Calendar view of task due dates
    #[command(subcommand)]
    Calendar(CalendarCommands),

    /// Cache a user id as the logged-in user
    Login {
        /// User (person) id
        id: String,

        /// E-mail of the user
        #[arg(long)]
        email: Option<String>,
    },

    /// Forget the logged-in user and the selected team
    Logout,

    /// Show the resolved current user
    Whoami,
}

#[derive(Subcommand, Debug)]
pub enum PersonCommands {
    /// Register or edit a person
    Add {
        /// Full name
        #[arg(long)]
        name: String,

        /// E-mail address
        #[arg(long)]
        email: String,

        /// National id (11 digits by default; punctuation allowed)
        #[arg(long)]
        national_id: String,

        /// Birth date (YYYY-MM-DD or DD/MM/YYYY)
        #[arg(long)]
        birth_date: String,

        /// Existing person id to edit
        #[arg(long)]
        id: Option<String>,
    },

    /// List people
    Ls,

    /// Delete a person (refused while they own open tasks)
    Rm {
        /// Person id
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TeamCommands {
    /// Create a team and select it
    New {
        /// Team name
        name: String,

        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List teams
    Ls {
        /// Only teams the current user belongs to
        #[arg(long)]
        mine: bool,
    },

    /// Delete a team
    Rm {
        /// Team id
        id: String,
    },

    /// Select the current team
    Use {
        /// Team id
        #[arg(required_unless_present = "clear")]
        id: Option<String>,

        /// Clear the selection instead
        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },

    /// Show the selected team
    Current,

    /// List the members of a team
    Members {
        #[arg(long)]
        team: Option<String>,
    },

    /// Remove a member (refused while they own open tasks in the team)
    Kick {
        /// Person id
        person: String,

        #[arg(long)]
        team: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum InviteCommands {
    /// Invite a registered person by e-mail
    Send {
        /// Invitee e-mail
        email: String,

        #[arg(long)]
        team: Option<String>,
    },

    /// Accept an invitation
    Accept {
        /// Invitation id
        id: String,

        #[arg(long)]
        team: Option<String>,
    },

    /// Decline an invitation
    Decline {
        /// Invitation id
        id: String,

        #[arg(long)]
        team: Option<String>,
    },

    /// Delete an invitation
    Rm {
        /// Invitation id
        id: String,

        #[arg(long)]
        team: Option<String>,
    },

    /// List invitations of a team, or the current user's pending ones
    Ls {
        #[arg(long, conflicts_with = "mine")]
        team: Option<String>,

        /// Pending invitations addressed to the current user
        #[arg(long)]
        mine: bool,
    },
}

/// Which task partition a command works on
#[derive(Args, Debug, Clone, Default)]
pub struct PartitionArgs {
    /// Team id (defaults to the selected team)
    #[arg(long, conflicts_with = "legacy")]
    pub team: Option<String>,

    /// Use the legacy ungrouped task list
    #[arg(long)]
    pub legacy: bool,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    New {
        /// Title
        title: String,

        /// Description
        #[arg(long)]
        description: String,

        /// Due date and time (RFC 3339, "YYYY-MM-DD HH:MM", YYYY-MM-DD or DD/MM/YYYY)
        #[arg(long)]
        due: String,

        /// Responsible person id
        #[arg(long, required_unless_present = "assignee_name")]
        assignee: Option<String>,

        /// Free-text responsible name, for people outside the registry
        #[arg(long, conflicts_with = "assignee")]
        assignee_name: Option<String>,

        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// List tasks (overdue ones are updated on the way)
    Ls {
        /// Only tasks in this status
        #[arg(long)]
        status: Option<String>,

        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Mark a task completed
    Done {
        /// Task id
        id: String,

        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Delete a task
    Rm {
        /// Task id
        id: String,

        #[command(flatten)]
        partition: PartitionArgs,
    },

    /// Keep recomputing overdue tasks on a timer
    Watch {
        /// Seconds between reloads (defaults to tasks.overdue_poll_secs)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many reloads
        #[arg(long)]
        ticks: Option<usize>,

        #[command(flatten)]
        partition: PartitionArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum CalendarCommands {
    /// Status dots per day
    Marks {
        /// Only this team (default: every team of the current user)
        #[arg(long)]
        team: Option<String>,
    },

    /// Tasks due on one day
    Day {
        /// Day (YYYY-MM-DD or DD/MM/YYYY)
        day: String,

        #[arg(long)]
        team: Option<String>,
    },
}

/// Store location and session shared by every command
#[derive(Debug, Clone, Default)]
pub struct StoreArgs {
    pub store: Option<PathBuf>,
    pub user: Option<String>,
}

/// Everything a command needs from the store
pub(crate) struct Context {
    pub config: Config,
    pub people: PersonStore,
    pub teams: TeamStore,
    pub tasks: TaskStore,
    pub identity: IdentityResolver,
    pub session: Option<String>,
}

impl Context {
    pub(crate) fn load(args: &StoreArgs) -> Result<Self> {
        let root = match &args.store {
            Some(root) => root.clone(),
            None => Storage::default_root()?,
        };
        let config = Config::load_from_dir(&root);
        let storage = Storage::new(root).with_lock_timeout(config.storage.lock_timeout_ms);
        storage.init()?;

        Ok(Self {
            people: PersonStore::new(storage.clone(), config.people.clone()),
            teams: TeamStore::new(storage.clone()),
            tasks: TaskStore::new(storage.clone(), config.tasks.clone()),
            identity: IdentityResolver::new(storage, config.identity.clone()),
            session: args.user.clone(),
            config,
        })
    }

    pub(crate) fn guard(&self) -> MembershipGuard {
        MembershipGuard::new(self.tasks.clone(), self.teams.clone(), self.people.clone())
    }

    pub(crate) fn invitations(&self) -> Result<InvitationEngine> {
        let notifier = notifier_from_config(&self.config.invites)?;
        Ok(InvitationEngine::new(
            self.teams.clone(),
            Box::new(PeopleDirectory::new(self.people.clone())),
            notifier,
        ))
    }

    pub(crate) fn current_user(&self) -> Result<Option<CurrentUser>> {
        self.identity.resolve(self.session.as_deref())
    }

    pub(crate) fn require_user(&self) -> Result<CurrentUser> {
        self.current_user()?.ok_or(Error::NoIdentity)
    }

    /// Explicit team, else the selected team, read back from the collection
    pub(crate) fn resolve_team(&self, explicit: Option<&str>) -> Result<Team> {
        if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
            return self.teams.require(id);
        }
        let id = self.teams.current().id()?.ok_or(Error::NoCurrentTeam)?;
        self.teams.require(&id)
    }

    /// Partition for task commands, with its team when there is one
    pub(crate) fn resolve_partition(&self, args: &PartitionArgs) -> Result<(Partition, Option<Team>)> {
        if args.legacy {
            return Ok((Partition::Legacy, None));
        }
        let team = self.resolve_team(args.team.as_deref())?;
        Ok((Partition::team(team.id.as_str()), Some(team)))
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let store = StoreArgs {
            store: self.store,
            user: self.user,
        };
        let json = self.json;
        let quiet = self.quiet;

        match self.command {
            Commands::Person(cmd) => match cmd {
                PersonCommands::Add {
                    name,
                    email,
                    national_id,
                    birth_date,
                    id,
                } => person::run_add(person::AddOptions {
                    name,
                    email,
                    national_id,
                    birth_date,
                    id,
                    store,
                    json,
                    quiet,
                }),
                PersonCommands::Ls => person::run_list(person::ListOptions { store, json, quiet }),
                PersonCommands::Rm { id } => person::run_rm(person::RmOptions {
                    id,
                    store,
                    json,
                    quiet,
                }),
            },
            Commands::Team(cmd) => match cmd {
                TeamCommands::New { name, description } => team::run_new(team::NewOptions {
                    name,
                    description,
                    store,
                    json,
                    quiet,
                }),
                TeamCommands::Ls { mine } => team::run_list(team::ListOptions {
                    mine,
                    store,
                    json,
                    quiet,
                }),
                TeamCommands::Rm { id } => team::run_rm(team::RmOptions {
                    id,
                    store,
                    json,
                    quiet,
                }),
                TeamCommands::Use { id, clear } => team::run_use(team::UseOptions {
                    id: if clear { None } else { id },
                    store,
                    json,
                    quiet,
                }),
                TeamCommands::Current => team::run_current(team::CurrentOptions { store, json, quiet }),
                TeamCommands::Members { team } => team::run_members(team::MembersOptions {
                    team,
                    store,
                    json,
                    quiet,
                }),
                TeamCommands::Kick { person, team } => team::run_kick(team::KickOptions {
                    person,
                    team,
                    store,
                    json,
                    quiet,
                }),
            },
            Commands::Invite(cmd) => match cmd {
                InviteCommands::Send { email, team } => invite::run_send(invite::SendOptions {
                    email,
                    team,
                    store,
                    json,
                    quiet,
                }),
                InviteCommands::Accept { id, team } => invite::run_respond(invite::RespondOptions {
                    action: invite::Response::Accept,
                    id,
                    team,
                    store,
                    json,
                    quiet,
                }),
                InviteCommands::Decline { id, team } => invite::run_respond(invite::RespondOptions {
                    action: invite::Response::Decline,
                    id,
                    team,
                    store,
                    json,
                    quiet,
                }),
                InviteCommands::Rm { id, team } => invite::run_respond(invite::RespondOptions {
                    action: invite::Response::Remove,
                    id,
                    team,
                    store,
                    json,
                    quiet,
                }),
                InviteCommands::Ls { team, mine } => invite::run_list(invite::ListOptions {
                    team,
                    mine,
                    store,
                    json,
                    quiet,
                }),
            },
            Commands::Task(cmd) => match cmd {
                TaskCommands::New {
                    title,
                    description,
                    due,
                    assignee,
                    assignee_name,
                    partition,
                } => task::run_new(task::NewOptions {
                    title,
                    description,
                    due,
                    assignee,
                    assignee_name,
                    partition,
                    store,
                    json,
                    quiet,
                }),
                TaskCommands::Ls { status, partition } => task::run_list(task::ListOptions {
                    status,
                    partition,
                    store,
                    json,
                    quiet,
                }),
                TaskCommands::Done { id, partition } => task::run_done(task::IdOptions {
                    id,
                    partition,
                    store,
                    json,
                    quiet,
                }),
                TaskCommands::Rm { id, partition } => task::run_rm(task::IdOptions {
                    id,
                    partition,
                    store,
                    json,
                    quiet,
                }),
                TaskCommands::Watch {
                    interval,
                    ticks,
                    partition,
                } => task::run_watch(task::WatchOptions {
                    interval,
                    ticks,
                    partition,
                    store,
                    json,
                    quiet,
                }),
            },
            Commands::Calendar(cmd) => match cmd {
                CalendarCommands::Marks { team } => calendar::run_marks(calendar::MarksOptions {
                    team,
                    store,
                    json,
                    quiet,
                }),
                CalendarCommands::Day { day, team } => calendar::run_day(calendar::DayOptions {
                    day,
                    team,
                    store,
                    json,
                    quiet,
                }),
            },
            Commands::Login { id, email } => session::run_login(session::LoginOptions {
                id,
                email,
                store,
                json,
                quiet,
            }),
            Commands::Logout => session::run_logout(session::SessionOptions { store, json, quiet }),
            Commands::Whoami => session::run_whoami(session::SessionOptions { store, json, quiet }),
        }
    }
}
