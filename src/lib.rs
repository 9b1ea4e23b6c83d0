//! atarefa - team task tracking library
//!
//! Core of the `atarefa` CLI: a person registry, teams formed through
//! invitations, per-team task lists with overdue detection, and a calendar
//! projection of due dates. Everything lives in a local JSON store.
//!
//! # Core Concepts
//!
//! - **Teams**: named groups of people with a selected "current" team
//! - **Invitations**: pending/accepted/declined requests to join a team
//! - **Tasks**: per-team lists whose pending tasks turn overdue once due
//! - **Membership guard**: nobody with open tasks is removed or deleted
//! - **Calendar**: status dots per day, scoped to one team or all of them
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `atarefa.toml`
//! - `error`: Error types, exit codes and result aliases
//! - `storage`: Keyed JSON collections in the store directory
//! - `lock`: File locking and atomic writes
//! - `identity`: Current-user resolution and the login cache
//! - `people`: Person registry and registration rules
//! - `team`: Teams, invitations data and the current-team pointer
//! - `task`: Task lists, overdue recompute and display order
//! - `invite`: Invitation lifecycle
//! - `notify`: Invitation e-mail sender and person directory
//! - `guard`: Open-task checks before removal
//! - `calendar`: Day marks and scoped calendar views
//! - `watch`: Timer-driven overdue recompute

pub mod calendar;
pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod guard;
pub mod identity;
pub mod invite;
pub mod lock;
pub mod notify;
pub mod output;
pub mod people;
pub mod storage;
pub mod task;
pub mod team;
pub mod watch;

pub use error::{Error, Result};
