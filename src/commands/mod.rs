//! Command implementations
//!
//! Each module corresponds to a menu entry and a subcommand in the CLI.
//! Input is collected first, then `run` executes the flow.

use std::future::Future;

use crate::error::{Error, Result};

pub mod add;
pub mod login;
pub mod logout;
pub mod menu;
pub mod post;
pub mod scrape;

pub use add::{run as add_run, AddRequest};
pub use menu::run as menu_run;
pub use post::run as post_run;
pub use scrape::{run as scrape_run, ScrapeRequest};

/// Race an operation against Ctrl+C. The losing future is dropped, which
/// drops its client and session lock.
pub async fn until_cancelled<F, T>(operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        result = operation => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n⛔ Cancelling...");
            Err(Error::Cancelled)
        }
    }
}
