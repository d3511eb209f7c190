//! Logout command - remove session files from a directory

use std::path::Path;

use tracing::info;

use crate::console::{confirm, Prompter};
use crate::error::Result;
use crate::session;

pub fn run<P: Prompter>(dir: &Path, prompter: &mut P) -> Result<Vec<String>> {
    if !confirm(prompter, "\n⚠️ This removes all session files. Continue? (y/n): ")? {
        prompter.say("\nℹ️ Logout cancelled.");
        return Ok(Vec::new());
    }

    let removed = session::logout(dir)?;
    if removed.is_empty() {
        prompter.say("\nℹ️ No session files found.");
    } else {
        for name in &removed {
            info!("Removed session file {}", name);
            prompter.say(&format!("🗑️ Removed: {}", name));
        }
        prompter.say("\n✅ Logged out. Use Login to sign in again.");
    }
    Ok(removed)
}
