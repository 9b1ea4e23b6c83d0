//! atarefa login/logout/whoami.

use serde::Serialize;

use crate::cli::{Context, StoreArgs};
use crate::error::Result;
use crate::identity::CurrentUser;
use crate::output::{emit_success, HumanOutput, OutputOptions};

pub struct LoginOptions {
    pub id: String,
    pub email: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct SessionOptions {
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct LogoutOutput {
    removed: usize,
}

pub fn run_login(options: LoginOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let email = match options.email {
        Some(email) => Some(email),
        None => ctx.people.get(options.id.trim())?.map(|person| person.email),
    };
    let user = ctx.identity.login(&options.id, email.as_deref())?;

    let mut human = HumanOutput::new(format!("atarefa login: {}", user.id));
    if let Some(email) = &user.email {
        human.push_summary("email", email.clone());
    }
    if ctx.people.get(&user.id)?.is_none() {
        human.push_warning("this id is not in the person registry");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "login",
        &user,
        Some(&human),
    )
}

pub fn run_logout(options: SessionOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let removed = ctx.identity.logout()?;

    let mut human = HumanOutput::new("atarefa logout");
    human.push_summary("cleared", format!("{removed} cached identities"));

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "logout",
        &LogoutOutput { removed },
        Some(&human),
    )
}

pub fn run_whoami(options: SessionOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let user: CurrentUser = ctx.require_user()?;

    let mut human = HumanOutput::new(format!("atarefa whoami: {}", user.id));
    if let Some(email) = &user.email {
        human.push_summary("email", email.clone());
    }
    if let Some(person) = ctx.people.get(&user.id)? {
        human.push_summary("name", person.name);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "whoami",
        &user,
        Some(&human),
    )
}
