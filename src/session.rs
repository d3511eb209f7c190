//! Session management for the Telegram user client
//!
//! Provides:
//! - File-based session locking to prevent parallel execution
//! - Session file validation and removal (logout)
//! - Client creation and interactive sign-in

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::client::updates::UpdatesLike;
use grammers_client::{Client, SignInError};
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::console::Prompter;
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock on the session.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                eprintln!(
                    "\n⚠️  The Telegram session is already in use by another telety process.\n\
                     Wait for it to finish and try again.\n"
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Check if the session file exists.
pub fn check_session_exists(config: &Config) -> Result<()> {
    let session_file = config.session_file();
    if !Path::new(&session_file).exists() {
        return Err(Error::SessionNotFound(session_file));
    }
    Ok(())
}

/// Open (or create) the SQLite session storage.
pub fn open_session(config: &Config) -> Result<Arc<SqliteSession>> {
    let session_file = config.session_file();
    let session = SqliteSession::open(&session_file)
        .map_err(|e| Error::SessionNotFound(format!("Failed to open session: {}", e)))?;
    Ok(Arc::new(session))
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    pub handle: SenderPoolHandle,
    _updates: mpsc::UnboundedReceiver<UpdatesLike>,
    runner_handle: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Create a new TelegramClient from session
    pub async fn connect(session: Arc<SqliteSession>, api_id: i32) -> Result<Self> {
        let pool = SenderPool::new(session, api_id);
        let client = Client::new(&pool);

        let SenderPool {
            runner,
            updates,
            handle,
        } = pool;

        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle,
            _updates: updates,
            runner_handle,
        })
    }
}

impl Drop for TelegramClient {
    fn drop(&mut self) {
        self.runner_handle.abort();
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Connect with the existing session and make sure it is signed in.
pub async fn get_client(config: &Config, creds: &Credentials) -> Result<TelegramClient> {
    check_session_exists(config)?;
    let session = open_session(config)?;
    let client = TelegramClient::connect(session, creds.api_id).await?;

    if !client.is_authorized().await? {
        return Err(Error::AuthorizationRequired);
    }
    Ok(client)
}

/// Sign in interactively (phone, code, optional 2FA password) and keep the session.
pub async fn login<P: Prompter>(
    config: &Config,
    creds: &Credentials,
    prompter: &mut P,
) -> Result<()> {
    let session = open_session(config)?;
    let client = TelegramClient::connect(session, creds.api_id).await?;

    if client.is_authorized().await? {
        prompter.say("\n✅ Already logged in!");
        return Ok(());
    }

    let phone = if config.phone.trim().is_empty() {
        crate::console::ask_non_empty(prompter, "📞 Phone number (international format): ")?
    } else {
        config.phone.clone()
    };

    let token = client
        .request_login_code(&phone, &creds.api_hash)
        .await
        .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))?;

    let code = crate::console::ask_non_empty(prompter, "🔢 Code from Telegram: ")?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password =
                crate::console::ask_non_empty(prompter, &format!("🔐 2FA password (hint: {}): ", hint))?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::TelegramError(format!("Failed to check password: {}", e)))?
        }
        Err(e) => return Err(Error::TelegramError(format!("Failed to sign in: {}", e))),
    };

    info!("Signed in as {}", user.full_name());
    prompter.say(&format!(
        "\n✅ Successfully logged in as {} (@{})",
        user.full_name(),
        user.username().unwrap_or("no username")
    ));
    Ok(())
}

/// Session files in `dir`: `*.session` and `*.session-journal`.
pub fn find_session_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.ends_with(".session") || name.ends_with(".session-journal") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Remove every session file in `dir`. Returns the removed file names.
pub fn logout(dir: &Path) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for path in find_session_files(dir)? {
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
            Err(e) => warn!("Error removing {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{LazyLock, Mutex};
    use tempfile::tempdir;

    static WORKDIR_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    struct DirGuard {
        original: PathBuf,
    }

    impl DirGuard {
        fn change_to(path: &Path) -> Self {
            let original = env::current_dir().expect("current dir");
            env::set_current_dir(path).expect("set current dir");
            Self { original }
        }
    }

    impl Drop for DirGuard {
        fn drop(&mut self) {
            let _ = env::set_current_dir(&self.original);
        }
    }

    #[test]
    fn release_removes_lock_file() {
        let temp = tempdir().expect("tempdir");
        let lock_path = temp.path().join("telety_session.lock");

        let mut lock = SessionLock::acquire(&lock_path).expect("lock");
        assert!(lock_path.exists());
        lock.release();
        assert!(!lock_path.exists());
    }

    #[test]
    fn lock_dropped_releases_automatically() {
        let temp = tempdir().expect("tempdir");
        let lock_path = temp.path().join("telety_session.lock");

        {
            let _lock = SessionLock::acquire(&lock_path).expect("lock");
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn double_release_is_safe() {
        let temp = tempdir().expect("tempdir");
        let mut lock = SessionLock::acquire(temp.path().join("x.lock")).expect("lock");
        lock.release();
        lock.release();
    }

    #[test]
    fn reacquire_after_release() {
        let temp = tempdir().expect("tempdir");
        let lock_path = temp.path().join("x.lock");

        let first = SessionLock::acquire(&lock_path).expect("first");
        drop(first);
        let second = SessionLock::acquire(&lock_path);
        assert!(second.is_ok());
    }

    #[test]
    fn check_session_exists_reports_missing_and_success() {
        let _lock = WORKDIR_LOCK.lock().unwrap();
        let temp = tempdir().expect("tempdir");
        let _guard = DirGuard::change_to(temp.path());

        let config = Config::default();
        let err = check_session_exists(&config).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));

        File::create(config.session_file()).expect("create session file");
        check_session_exists(&config).expect("session should exist");
    }

    #[test]
    fn logout_removes_only_session_files() {
        let temp = tempdir().expect("tempdir");
        for name in [
            "telety_session.session",
            "scraper.session",
            "scraper.session-journal",
            "users_abc.txt",
            "telety_config.json",
        ] {
            File::create(temp.path().join(name)).expect("create");
        }

        let removed = logout(temp.path()).expect("logout");

        assert_eq!(
            removed,
            vec![
                "scraper.session",
                "scraper.session-journal",
                "telety_session.session"
            ]
        );
        assert!(temp.path().join("users_abc.txt").exists());
        assert!(temp.path().join("telety_config.json").exists());
    }

    #[test]
    fn logout_with_nothing_to_remove() {
        let temp = tempdir().expect("tempdir");
        assert!(logout(temp.path()).expect("logout").is_empty());
    }
}
