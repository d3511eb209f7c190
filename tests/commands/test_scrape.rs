//! Tests for the scrape command

use std::time::Duration;

use telety::commands::scrape;
use telety::{PaginatorConfig, ProviderError, RateLimitedPaginator, StopReason};

use super::{FakeMembers, RecordingPacer};

fn members(n: usize) -> Vec<Option<String>> {
    (0..n)
        .map(|i| {
            if i % 10 == 9 {
                None
            } else {
                Some(format!("member_{i:05}"))
            }
        })
        .collect()
}

fn paginator(page_size: usize) -> RateLimitedPaginator<RecordingPacer> {
    RateLimitedPaginator::new(
        PaginatorConfig::new("scrape", page_size, Duration::from_secs(2)),
        RecordingPacer::default(),
    )
}

#[tokio::test]
async fn test_scrape_walks_every_page_and_skips_members_without_username() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeMembers::new(members(450), 200);
    let mut paginator = paginator(200);

    let report = scrape::execute(&mut source, &mut paginator, "bigroup", dir.path()).await;

    assert_eq!(source.offsets, vec![0, 200, 400]);
    assert_eq!(report.outcome.stop, StopReason::EndOfData);
    assert_eq!(report.outcome.items.len(), 405);
    assert_eq!(report.outcome.tally.attempted, 3);

    let path = report.saved_to.unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("users_bigroup_"));
    assert!(name.ends_with(".txt"));
    let lines = std::fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines, 405);
    assert_eq!(paginator.pacer().pauses, vec![Duration::from_secs(2); 2]);
}

#[tokio::test]
async fn test_scrape_waits_out_flood_and_refetches_same_offset() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeMembers::new(members(250), 200);
    source.failures.push_back(ProviderError::backoff_secs(30));
    let mut paginator = paginator(200);

    let report = scrape::execute(&mut source, &mut paginator, "flooded", dir.path()).await;

    assert_eq!(source.offsets, vec![0, 0, 200]);
    assert_eq!(report.outcome.tally.failed, 1);
    assert_eq!(report.outcome.tally.succeeded, 2);
    assert_eq!(paginator.pacer().pauses[0], Duration::from_secs(30));
}

#[tokio::test]
async fn test_scrape_private_group_aborts_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeMembers::new(members(10), 200);
    source
        .failures
        .push_back(ProviderError::Permission("CHANNEL_PRIVATE".into()));

    let report = scrape::execute(&mut source, &mut paginator(200), "private", dir.path()).await;

    assert_eq!(report.outcome.stop, StopReason::Aborted("CHANNEL_PRIVATE".into()));
    assert!(report.saved_to.is_none());
}
