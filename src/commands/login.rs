//! Login command - create an authorized session file

use crate::config::Config;
use crate::console::Prompter;
use crate::credentials::{obtain_credentials, CredentialStore, Credentials};
use crate::error::Result;
use crate::session;

/// API credentials from config/env when both are set, otherwise from the
/// credential store (prompting and saving on first use).
pub fn resolve_credentials<P: Prompter>(config: &Config, prompter: &mut P) -> Result<Credentials> {
    if config.api_id > 0 && !config.api_hash.trim().is_empty() {
        return Ok(Credentials::new(config.api_id, config.api_hash.trim()));
    }
    let store = CredentialStore::new(&config.credentials_file);
    obtain_credentials(&store, prompter)
}

/// Main entry point for the login command
pub async fn run<P: Prompter>(config: &Config, prompter: &mut P) -> Result<Credentials> {
    let creds = resolve_credentials(config, prompter)?;
    let _lock = session::SessionLock::acquire(&config.lock_file)?;
    session::login(config, &creds, prompter).await?;
    Ok(creds)
}
