//! Tests for the add command

use std::time::Duration;

use telety::commands::add;
use telety::usernames::load_usernames;
use telety::{Config, PaginatorConfig, RateLimitedPaginator, StopReason};

use super::{FakeWorker, RecordingPacer};

#[tokio::test]
async fn test_add_from_file_respects_daily_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.txt");
    let mut content = String::from("# exported list\n\n");
    for i in 0..80 {
        content.push_str(&format!("@candidate_{i:03}\n"));
    }
    content.push_str("@candidate_000\nab\nhas space\n");
    std::fs::write(&path, content).unwrap();

    let users = load_usernames(&path).unwrap();
    assert_eq!(users.len(), 80);

    let mut config = Config::default();
    config.limits.add_delay = Duration::from_secs(60);
    config.limits.daily_add_limit = 50;
    let mut worker = FakeWorker::default();
    let mut paginator = RateLimitedPaginator::new(add::paginator_config(&config), RecordingPacer::default());

    let outcome = add::execute(&users, &mut worker, &mut paginator).await;

    assert_eq!(outcome.stop, StopReason::CapReached);
    assert_eq!(outcome.tally.succeeded, 50);
    assert_eq!(worker.done.first().map(String::as_str), Some("candidate_000"));
    assert_eq!(worker.done.last().map(String::as_str), Some("candidate_049"));
    assert_eq!(paginator.pacer().pauses.len(), 49);
}

#[tokio::test]
async fn test_add_skips_refused_users() {
    let users: Vec<String> = ["alpha_user", "bravo_user", "charlie_user"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut worker = FakeWorker {
        refuse: vec!["bravo_user".into()],
        ..Default::default()
    };
    let mut paginator = RateLimitedPaginator::new(
        PaginatorConfig::new("add", usize::MAX, Duration::from_secs(60)).with_cap(50),
        RecordingPacer::default(),
    );

    let outcome = add::execute(&users, &mut worker, &mut paginator).await;

    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(worker.done, vec!["alpha_user", "charlie_user"]);
    assert_eq!(outcome.tally.failed, 1);
    assert!((outcome.tally.success_rate() - 66.666).abs() < 0.01);
}
