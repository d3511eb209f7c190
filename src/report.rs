//! Result files and end-of-run summaries

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::paginator::{StopReason, Tally};

/// `users_<group>_<YYYYmmdd_HHMMSS>.txt`
pub fn scrape_file_name(group_label: &str, at: DateTime<Local>) -> String {
    let safe: String = group_label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("users_{}_{}.txt", safe, at.format("%Y%m%d_%H%M%S"))
}

/// Write usernames one per line in sorted order. Returns the written path.
pub fn write_scrape_result(
    dir: &Path,
    group_label: &str,
    users: &BTreeSet<String>,
    at: DateTime<Local>,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(scrape_file_name(group_label, at));
    let mut content = String::with_capacity(users.iter().map(|u| u.len() + 1).sum());
    for user in users {
        content.push_str(user);
        content.push('\n');
    }
    fs::write(&path, content)?;
    Ok(path)
}

pub fn scrape_summary(unique_users: usize, tally: &Tally, saved_to: Option<&Path>) -> String {
    let mut lines = vec![
        "✅ Scraping completed!".to_string(),
        format!("👥 Total unique users found: {}", unique_users),
        format!("🔄 Total batches attempted: {}", tally.attempted),
        format!("❌ Failed attempts: {}", tally.failed),
    ];
    if tally.completed() > 0 {
        lines.push(format!("📊 Success rate: {:.2}%", tally.success_rate()));
    }
    if let Some(path) = saved_to {
        lines.push(format!("💾 Results saved to: {}", path.display()));
    }
    lines.join("\n")
}

/// Human wording for the permission errors that stop an operation.
pub fn describe_abort(reason: &str) -> String {
    let text = match reason {
        "CHAT_ADMIN_REQUIRED" => "Admin privileges required for this group",
        "CHANNEL_PRIVATE" => "This is a private channel/group",
        "CHAT_WRITE_FORBIDDEN" | "CHAT_FORBIDDEN" => "You cannot write to this group",
        "USER_BANNED_IN_CHANNEL" => "Your account is banned in this group",
        "PEER_FLOOD" => "Account limited by Telegram for spam, try again later",
        "AUTH_KEY_UNREGISTERED" => "Session is no longer valid, please login again",
        other => return other.to_string(),
    };
    format!("{} ({})", text, reason)
}

pub fn add_summary(tally: &Tally, stop: &StopReason) -> String {
    let mut lines = Vec::new();
    match stop {
        StopReason::CapReached => {
            lines.push("⏸️ Daily limit reached. Please try again tomorrow.".to_string())
        }
        StopReason::Aborted(reason) => {
            lines.push(format!("❌ Stopped: {}", describe_abort(reason)))
        }
        StopReason::Cancelled => lines.push("🚫 Cancelled.".to_string()),
        StopReason::EndOfData | StopReason::Exhausted => {}
    }
    lines.push("Operation completed!".to_string());
    lines.push(format!("Total processed: {}", tally.completed()));
    lines.push(format!("Successfully added: {}", tally.succeeded));
    lines.push(format!("Failed: {}", tally.failed));
    lines.push(format!("Success rate: {:.2}%", tally.success_rate()));
    lines.join("\n")
}

pub fn post_summary(tally: &Tally, stop: &StopReason) -> String {
    let mut report = format!(
        "📊 Posting Complete!\n\n✅ Success: {} groups\n❌ Failed: {} groups\n📈 Success Rate: {:.1}%",
        tally.succeeded,
        tally.failed,
        tally.success_rate()
    );
    match stop {
        StopReason::Aborted(reason) => {
            report.push_str(&format!("\n\n⛔ Stopped early: {}", reason))
        }
        StopReason::Cancelled => report.push_str("\n\n🚫 Cancelled with /cancel"),
        _ => {}
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 14, 3, 9).unwrap()
    }

    #[test]
    fn file_name_has_group_and_timestamp() {
        assert_eq!(
            scrape_file_name("rustlang", at()),
            "users_rustlang_20240517_140309.txt"
        );
        assert_eq!(
            scrape_file_name("weird/name", at()),
            "users_weird_name_20240517_140309.txt"
        );
    }

    #[test]
    fn writes_sorted_usernames() {
        let dir = tempfile::tempdir().unwrap();
        let users: BTreeSet<String> = ["zed_user", "alice", "Mike_1"]
            .into_iter()
            .map(String::from)
            .collect();

        let path = write_scrape_result(dir.path(), "123", &users, at()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Mike_1\nalice\nzed_user\n");
        assert!(path.ends_with("users_123_20240517_140309.txt"));
    }

    #[test]
    fn scrape_summary_includes_rate_and_path() {
        let tally = Tally {
            attempted: 4,
            succeeded: 3,
            failed: 1,
        };
        let summary = scrape_summary(420, &tally, Some(Path::new("users_x.txt")));
        assert!(summary.contains("420"));
        assert!(summary.contains("75.00%"));
        assert!(summary.contains("users_x.txt"));
    }

    #[test]
    fn add_summary_mentions_limit() {
        let tally = Tally {
            attempted: 52,
            succeeded: 50,
            failed: 2,
        };
        let summary = add_summary(&tally, &StopReason::CapReached);
        assert!(summary.contains("Daily limit reached"));
        assert!(summary.contains("Successfully added: 50"));
        assert!(summary.contains("Total processed: 52"));

        let summary = add_summary(&tally, &StopReason::Exhausted);
        assert!(!summary.contains("Daily limit"));
    }

    #[test]
    fn abort_reasons_get_readable_text() {
        assert_eq!(
            describe_abort("CHANNEL_PRIVATE"),
            "This is a private channel/group (CHANNEL_PRIVATE)"
        );
        assert_eq!(describe_abort("cancelled"), "cancelled");
    }

    #[test]
    fn post_summary_reports_counts() {
        let tally = Tally {
            attempted: 4,
            succeeded: 3,
            failed: 1,
        };
        let report = post_summary(&tally, &StopReason::Exhausted);
        assert!(report.contains("Success: 3 groups"));
        assert!(report.contains("Failed: 1 groups"));
        assert!(report.contains("75.0%"));

        let report = post_summary(&tally, &StopReason::Aborted("invalid token".into()));
        assert!(report.contains("invalid token"));

        let report = post_summary(&tally, &StopReason::Cancelled);
        assert!(report.contains("Cancelled with /cancel"));
        assert!(!report.contains("Stopped early"));
    }
}
