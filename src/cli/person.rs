//! atarefa person command implementations.

use chrono::Local;
use serde::Serialize;

use crate::cli::{Context, StoreArgs};
use crate::dates;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::people::{Person, PersonDraft};

pub struct AddOptions {
    pub name: String,
    pub email: String,
    pub national_id: String,
    pub birth_date: String,
    pub id: Option<String>,
    pub store: StoreArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
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

#[derive(Serialize)]
struct PeopleOutput {
    total: usize,
    people: Vec<Person>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let birth_date = dates::parse_date_str(&options.birth_date).ok_or_else(|| {
        Error::InvalidArgument(format!("invalid birth date '{}'", options.birth_date))
    })?;

    let person = ctx.people.register(
        PersonDraft {
            id: options.id,
            name: options.name,
            email: options.email,
            national_id: options.national_id,
            birth_date: Some(birth_date),
        },
        Local::now().date_naive(),
    )?;

    let mut human = HumanOutput::new(format!("atarefa person add: {}", person.name));
    human.push_summary("id", person.id.clone());
    human.push_summary("email", person.email.clone());
    human.push_summary("birth date", person.birth_date.format("%Y-%m-%d").to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "person add",
        &person,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let people = ctx.people.list()?;

    let mut human = HumanOutput::new(format!("atarefa person ls: {} people", people.len()));
    for person in &people {
        human.push_detail(format!("{} <{}> {}", person.name, person.email, person.id));
    }
    if people.is_empty() {
        human.push_next_step("atarefa person add --name <name> --email <email> ...");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "person ls",
        &PeopleOutput {
            total: people.len(),
            people,
        },
        Some(&human),
    )
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = Context::load(&options.store)?;
    let removed = ctx.guard().delete_person(&options.id)?;

    let mut human = HumanOutput::new(format!("atarefa person rm: {}", removed.name));
    human.push_summary("id", removed.id.clone());
    human.push_warning("team membership lists still reference this id");

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "person rm",
        &removed,
        Some(&human),
    )
}
