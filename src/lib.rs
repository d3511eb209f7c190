//! telety - Telegram group toolkit
//!
//! This library provides tools to:
//! - Scrape the usernames of a group's members into a file
//! - Invite users from a username list into a group under a daily limit
//! - Broadcast one message to many groups through a Bot API bot
//!
//! Every remote loop goes through [`paginator::RateLimitedPaginator`], which
//! paces calls, honours flood waits and stops on permission errors.

pub mod chat;
pub mod config;
pub mod console;
pub mod credentials;
pub mod error;
pub mod error_log;
pub mod paginator;
pub mod registry;
pub mod report;
pub mod session;
pub mod telegram;
pub mod usernames;

// Re-export common types
pub use config::{Config, Limits};
pub use error::{Error, ProviderError, Result};
pub use paginator::{
    Batch, BatchCursor, BatchSource, Pacer, PaginatorConfig, PaginatorOutcome,
    RateLimitedPaginator, StopReason, Tally, TokioPacer, UnitWorker,
};
pub use session::{check_session_exists, get_client, SessionLock};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
