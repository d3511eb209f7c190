//! Scrape command - collect member usernames of a group
//!
//! Pages through `channels.getParticipants` and writes every username found
//! to `users_<group>_<timestamp>.txt`.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::chat::{input_channel, peer_label, resolve_group, GroupRef};
use crate::config::{Config, SCRAPE_PROGRESS_EVERY};
use crate::console::{ask_group, Prompter};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::error_log::ErrorLog;
use crate::paginator::{
    BatchSource, Pacer, PaginatorConfig, PaginatorOutcome, RateLimitedPaginator, StopReason,
    TokioPacer,
};
use crate::report::{describe_abort, scrape_summary, write_scrape_result};
use crate::session::{get_client, SessionLock};
use crate::telegram::ParticipantPages;

/// Everything the scrape needs from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub group: GroupRef,
}

#[derive(Debug)]
pub struct ScrapeReport {
    pub group_label: String,
    pub outcome: PaginatorOutcome<String>,
    pub saved_to: Option<PathBuf>,
}

pub fn collect_request<P: Prompter>(prompter: &mut P) -> Result<ScrapeRequest> {
    let group = ask_group(prompter, "\n🔗 Enter group/channel link or ID: ")?;
    Ok(ScrapeRequest { group })
}

pub fn paginator_config(config: &Config) -> PaginatorConfig {
    PaginatorConfig::new(
        "scrape",
        config.limits.page_size,
        config.limits.scrape_delay,
    )
    .with_progress_every(SCRAPE_PROGRESS_EVERY)
}

/// Run the pagination and persist the result. No console input.
pub async fn execute<S, P>(
    source: &mut S,
    paginator: &mut RateLimitedPaginator<P>,
    group_label: &str,
    output_dir: &Path,
) -> ScrapeReport
where
    S: BatchSource<String>,
    P: Pacer,
{
    let outcome = paginator.run_pages(source).await;

    let saved_to = if outcome.items.is_empty() {
        None
    } else {
        match write_scrape_result(output_dir, group_label, &outcome.items, Local::now()) {
            Ok(path) => {
                info!("Saved {} usernames to {}", outcome.items.len(), path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Error saving results to file: {}", e);
                None
            }
        }
    };

    ScrapeReport {
        group_label: group_label.to_string(),
        outcome,
        saved_to,
    }
}

pub fn print_report(report: &ScrapeReport) {
    let outcome = &report.outcome;

    if let StopReason::Aborted(reason) = &outcome.stop {
        println!("\n❌ Error: {}", describe_abort(reason));
    }

    if outcome.items.is_empty() {
        println!("\n❌ No users found or unable to scrape users from this group");
        return;
    }

    println!(
        "\n\n{}",
        scrape_summary(
            outcome.items.len(),
            &outcome.tally,
            report.saved_to.as_deref()
        )
    );

    if report.saved_to.is_none() {
        println!("\n❌ Error saving results to file");
        println!("\n👥 Users found:");
        for user in &outcome.items {
            println!("{}", user);
        }
    }
}

/// Main entry point for the scrape command
pub async fn run(config: &Config, creds: &Credentials, request: ScrapeRequest) -> Result<ScrapeReport> {
    let _lock = SessionLock::acquire(&config.lock_file)?;

    println!("\n🔄 Starting Telegram session...");
    let client = get_client(config, creds).await?;
    println!("✅ Successfully connected to Telegram!");

    let peer = resolve_group(&client, &request.group).await?;
    let channel = input_channel(&peer).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "{} is a basic group; only channels and supergroups expose their member list",
            request.group
        ))
    })?;
    let label = peer_label(&peer);

    let mut source = ParticipantPages::new(&client, channel, config.limits.page_size);
    let mut paginator = RateLimitedPaginator::new(paginator_config(config), TokioPacer)
        .with_error_log(ErrorLog::new(&config.error_log));

    println!("\n🔍 Scraping users from {}...", request.group);
    let report = execute(&mut source, &mut paginator, &label, &config.output_dir).await;
    print_report(&report);

    Ok(report)
}
