//! Tests for the broadcast bot state

use std::time::Duration;

use telety::commands::post::{BotCommand, BroadcastSession, PostRefusal, StoredMessage};
use telety::registry::GroupRegistry;
use telety::{PaginatorConfig, RateLimitedPaginator, StopReason};
use teloxide::types::{ChatId, MessageId};

use super::{FakeWorker, RecordingPacer};

#[test]
fn test_bot_commands() {
    assert_eq!(BotCommand::parse("/help"), Some(BotCommand::Help));
    assert_eq!(BotCommand::parse("/groups@some_bot"), Some(BotCommand::Groups));
    assert_eq!(BotCommand::parse("/cancel"), Some(BotCommand::Cancel));
    assert_eq!(BotCommand::parse("post"), None);
}

#[tokio::test]
async fn test_broadcast_to_registered_groups() {
    let dir = tempfile::tempdir().unwrap();
    let groups_file = dir.path().join("bot_groups.json");
    {
        let mut registry = GroupRegistry::load(&groups_file);
        registry.add(-1001, "Alpha").unwrap();
        registry.add(-1002, "Beta").unwrap();
        registry.add(-1003, "Gamma").unwrap();
    }

    // a restart sees the same groups
    let mut session = BroadcastSession::new(GroupRegistry::load(&groups_file));
    assert_eq!(session.registry().len(), 3);

    session.store(StoredMessage {
        chat_id: ChatId(99),
        message_id: MessageId(5),
    });
    let job = session.begin_post().unwrap();
    assert_eq!(session.begin_post().unwrap_err(), PostRefusal::AlreadyPosting);

    let mut worker = FakeWorker {
        refuse: vec!["Beta (-1002)".into()],
        ..Default::default()
    };
    let mut paginator = RateLimitedPaginator::new(
        PaginatorConfig::new("post", usize::MAX, Duration::from_secs(2)),
        RecordingPacer::default(),
    );
    let outcome = paginator.run_units(&job.targets, &mut worker).await;
    session.finish_post();

    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert_eq!(outcome.tally.succeeded, 2);
    assert_eq!(outcome.tally.failed, 1);
    assert_eq!(paginator.pacer().pauses, vec![Duration::from_secs(2); 2]);
    assert!(!session.is_posting());
    assert_eq!(session.begin_post().unwrap_err(), PostRefusal::NothingStored);
}
