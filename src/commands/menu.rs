//! Interactive main menu
//!
//! Collects input for one flow, runs it, reports any failure and comes back.

use std::path::Path;

use tracing::error;

use crate::commands::{add, login, logout, post, scrape, until_cancelled};
use crate::config::Config;
use crate::console::{ask_menu_choice, ask_non_empty, render_menu, MenuChoice, Prompter};
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::session::check_session_exists;

/// What the user sees when a flow fails.
pub fn failure_message(err: &Error) -> String {
    match err {
        Error::Cancelled => "\n⛔ Operation cancelled.".to_string(),
        Error::SessionNotFound(_) | Error::AuthorizationRequired => {
            "\n❌ Please login first!".to_string()
        }
        Error::SessionLocked => "\n❌ Another telety process is using the session.".to_string(),
        other => format!("\n❌ Error: {}", other),
    }
}

fn bot_token<P: Prompter>(config: &Config, prompter: &mut P) -> Result<String> {
    if !config.bot_token.trim().is_empty() {
        return Ok(config.bot_token.trim().to_string());
    }
    ask_non_empty(prompter, "\n🤖 Enter your bot token from @BotFather: ")
}

/// Run one menu entry to completion.
pub async fn run_choice<P: Prompter>(
    config: &Config,
    choice: MenuChoice,
    prompter: &mut P,
) -> Result<()> {
    match choice {
        MenuChoice::Login => login::run(config, prompter).await.map(|_| ()),
        MenuChoice::Scrape => {
            check_session_exists(config)?;
            let creds = login::resolve_credentials(config, prompter)?;
            let request = scrape::collect_request(prompter)?;
            until_cancelled(scrape::run(config, &creds, request))
                .await
                .map(|_| ())
        }
        MenuChoice::Add => {
            check_session_exists(config)?;
            let creds = login::resolve_credentials(config, prompter)?;
            let request = add::collect_request(prompter)?;
            until_cancelled(add::run(config, &creds, request))
                .await
                .map(|_| ())
        }
        MenuChoice::Post => {
            let token = bot_token(config, prompter)?;
            post::run(config, &token).await
        }
        MenuChoice::Logout => logout::run(Path::new("."), prompter).map(|_| ()),
        MenuChoice::Exit => Ok(()),
    }
}

/// Log a failed flow to the error log and tell the user.
pub fn report_failure<P: Prompter>(config: &Config, choice: MenuChoice, err: &Error, prompter: &mut P) {
    if !matches!(err, Error::Cancelled) {
        error!("{} failed: {}", choice.title(), err);
        if let Err(e) = ErrorLog::new(&config.error_log).record(&format!("{}: {}", choice.title(), err)) {
            error!("Failed to write error log: {}", e);
        }
    }
    prompter.say(&failure_message(err));
}

/// Main entry point for the menu
pub async fn run<P: Prompter>(config: &Config, prompter: &mut P) -> Result<()> {
    prompter.say("\n📱 telety - Telegram scrape, add & post toolkit");

    loop {
        prompter.say(&render_menu());
        let choice = match ask_menu_choice(prompter) {
            Ok(choice) => choice,
            // end of input
            Err(Error::Cancelled) => return Ok(()),
            Err(e) => return Err(e),
        };

        if choice == MenuChoice::Exit {
            prompter.say("\n👋 Goodbye!");
            return Ok(());
        }

        if let Err(err) = run_choice(config, choice, prompter).await {
            report_failure(config, choice, &err, prompter);
        }
    }
}
