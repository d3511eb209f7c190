//! Cached API credentials (`telety_config.json`)
//!
//! Holds the numeric application id and the API hash obtained from
//! my.telegram.org. Read at startup, written once when the user types new values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::console::Prompter;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl Credentials {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: api_hash.into(),
        }
    }

    fn is_complete(&self) -> bool {
        self.api_id != 0 && !self.api_hash.trim().is_empty()
    }
}

/// On-disk shape. Fields are optional so a half-filled file reads as "nothing saved".
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    api_id: Option<i32>,
    api_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved credentials, or `None` when the file is missing, unreadable or incomplete.
    pub fn load_credentials(&self) -> Option<Credentials> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No credentials at {}: {}", self.path.display(), e);
                return None;
            }
        };

        let stored: StoredCredentials = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring malformed {}: {}", self.path.display(), e);
                return None;
            }
        };

        let creds = Credentials {
            api_id: stored.api_id?,
            api_hash: stored.api_hash?,
        };
        creds.is_complete().then_some(creds)
    }

    pub fn save_credentials(&self, creds: &Credentials) -> Result<()> {
        let stored = StoredCredentials {
            api_id: Some(creds.api_id),
            api_hash: Some(creds.api_hash.clone()),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Parse a typed API id. Only positive integers are accepted.
pub fn parse_api_id(input: &str) -> Option<i32> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<i32>().ok().filter(|&id| id > 0)
}

/// Reuse saved credentials, or ask for them and persist the answer.
pub fn obtain_credentials<P: Prompter>(
    store: &CredentialStore,
    prompter: &mut P,
) -> Result<Credentials> {
    if let Some(saved) = store.load_credentials() {
        prompter.say("\n🔄 Using saved credentials...");
        return Ok(saved);
    }

    prompter.say("\n🔑 Enter your Telegram API credentials:");
    let api_id = loop {
        let raw = prompter.ask("📱 API ID: ")?;
        match parse_api_id(&raw) {
            Some(id) => break id,
            None => prompter.say("❌ API ID must be a number"),
        }
    };
    let api_hash = loop {
        let raw = prompter.ask("🔒 API Hash: ")?;
        if !raw.trim().is_empty() {
            break raw.trim().to_string();
        }
        prompter.say("❌ API Hash cannot be empty");
    };

    let creds = Credentials::new(api_id, api_hash);
    store.save_credentials(&creds)?;
    Ok(creds)
}
