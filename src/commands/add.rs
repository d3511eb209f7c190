//! Add command - invite users from a username list into a group
//!
//! One invite per unit, 60 seconds apart, stopping at the daily limit.

use std::path::PathBuf;

use crate::chat::{input_channel, resolve_group, GroupRef};
use crate::config::{Config, ADD_PROGRESS_EVERY};
use crate::console::{ask_existing_file, ask_group, Prompter};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::paginator::{
    Pacer, PaginatorConfig, PaginatorOutcome, RateLimitedPaginator, TokioPacer, UnitWorker,
};
use crate::report::add_summary;
use crate::session::{get_client, SessionLock};
use crate::telegram::GroupInviter;
use crate::usernames::load_usernames;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub user_file: PathBuf,
    pub group: GroupRef,
}

pub fn collect_request<P: Prompter>(prompter: &mut P) -> Result<AddRequest> {
    let user_file = ask_existing_file(prompter, "\n📄 Enter path to username file: ")?;
    let group = ask_group(prompter, "\n🔗 Enter target group link or ID: ")?;
    Ok(AddRequest { user_file, group })
}

pub fn paginator_config(config: &Config) -> PaginatorConfig {
    // no pagination here: every unit is its own "page"
    PaginatorConfig::new("add", usize::MAX, config.limits.add_delay)
        .with_cap(config.limits.daily_add_limit)
        .with_progress_every(ADD_PROGRESS_EVERY)
}

/// Invite every user in order. No console input.
pub async fn execute<W, P>(
    users: &[String],
    worker: &mut W,
    paginator: &mut RateLimitedPaginator<P>,
) -> PaginatorOutcome<String>
where
    W: UnitWorker<String>,
    P: Pacer,
{
    paginator.run_units(users, worker).await
}

/// Main entry point for the add command
pub async fn run(
    config: &Config,
    creds: &Credentials,
    request: AddRequest,
) -> Result<PaginatorOutcome<String>> {
    let users = load_usernames(&request.user_file)?;
    if users.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "No valid usernames in {}",
            request.user_file.display()
        )));
    }

    let _lock = SessionLock::acquire(&config.lock_file)?;
    let client = get_client(config, creds).await?;

    let peer = resolve_group(&client, &request.group).await?;
    let channel = input_channel(&peer).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} is a basic group; invites need a channel or supergroup",
            request.group
        ))
    })?;

    let paginator_config = paginator_config(config);
    println!("\n🚀 Starting to add {} users...", users.len());
    println!("⏳ This process will take time due to Telegram's rate limits.");
    if let Some(cap) = paginator_config.cap {
        println!("📈 Maximum daily limit: {} users\n", cap);
    }

    let mut inviter = GroupInviter::new(&client, channel);
    let mut paginator = RateLimitedPaginator::new(paginator_config, TokioPacer)
        .with_error_log(ErrorLog::new(&config.error_log));

    let outcome = execute(&users, &mut inviter, &mut paginator).await;
    println!("\n{}", add_summary(&outcome.tally, &outcome.stop));

    Ok(outcome)
}
