//! Configuration for telety
//!
//! Loads configuration from config.yml file, with environment overrides.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const SESSION_NAME: &str = "telety_session";
pub const LOCK_FILE: &str = "telety_session.lock";
pub const CREDENTIALS_FILE: &str = "telety_config.json";
pub const GROUPS_FILE: &str = "bot_groups.json";
pub const ERROR_LOG_FILE: &str = "errors.txt";

pub const PAGE_SIZE: usize = 200;
pub const SCRAPE_DELAY_SECS: u64 = 2;
pub const ADD_DELAY_SECS: u64 = 60;
pub const POST_DELAY_SECS: u64 = 2;
pub const DAILY_ADD_LIMIT: usize = 50;
pub const SCRAPE_PROGRESS_EVERY: usize = 5;
pub const ADD_PROGRESS_EVERY: usize = 10;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramConfig>,
    bot: Option<BotConfig>,
    limits: Option<LimitsConfig>,
    files: Option<FilesConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramConfig {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    phone: Option<String>,
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotConfig {
    token: Option<String>,
    groups_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsConfig {
    page_size: Option<usize>,
    scrape_delay_secs: Option<u64>,
    add_delay_secs: Option<u64>,
    post_delay_secs: Option<u64>,
    daily_add_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FilesConfig {
    credentials: Option<String>,
    error_log: Option<String>,
    output_dir: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Pacing knobs shared by the scrape, add and post flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub page_size: usize,
    pub scrape_delay: Duration,
    pub add_delay: Duration,
    pub post_delay: Duration,
    pub daily_add_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            scrape_delay: Duration::from_secs(SCRAPE_DELAY_SECS),
            add_delay: Duration::from_secs(ADD_DELAY_SECS),
            post_delay: Duration::from_secs(POST_DELAY_SECS),
            daily_add_limit: DAILY_ADD_LIMIT,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    /// API id from config/env. Zero means "ask the credential store".
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    pub session_name: String,
    pub lock_file: String,
    pub bot_token: String,
    pub groups_file: PathBuf,
    pub credentials_file: PathBuf,
    pub error_log: PathBuf,
    pub output_dir: PathBuf,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                if let Ok(env_val) = std::env::var(var_name) {
                    return env_val;
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        match value {
            Some(v) if v.starts_with("${") => String::new(),
            Some(v) => v,
            None => String::new(),
        }
    }

    /// Resolve an integer value from string config or env var
    fn resolve_env_i32(value: Option<String>, env_key: &str) -> i32 {
        Self::resolve_env_string(value, env_key)
            .trim()
            .parse::<i32>()
            .unwrap_or(0)
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)?;
        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let telegram = yaml.telegram.unwrap_or_default();
        let bot = yaml.bot.unwrap_or_default();
        let limits = yaml.limits.unwrap_or_default();
        let files = yaml.files.unwrap_or_default();

        let session_name = telegram
            .session_name
            .unwrap_or_else(|| SESSION_NAME.to_string());
        let lock_file = if session_name == SESSION_NAME {
            LOCK_FILE.to_string()
        } else {
            format!("{}.lock", session_name)
        };

        let defaults = Limits::default();

        Self {
            api_id: Self::resolve_env_i32(telegram.api_id, "TELEGRAM_API_ID"),
            api_hash: Self::resolve_env_string(telegram.api_hash, "TELEGRAM_API_HASH"),
            phone: Self::resolve_env_string(telegram.phone, "TELEGRAM_PHONE"),
            session_name,
            lock_file,
            bot_token: Self::resolve_env_string(bot.token, "TELETY_BOT_TOKEN"),
            groups_file: PathBuf::from(bot.groups_file.unwrap_or_else(|| GROUPS_FILE.into())),
            credentials_file: PathBuf::from(
                files.credentials.unwrap_or_else(|| CREDENTIALS_FILE.into()),
            ),
            error_log: PathBuf::from(files.error_log.unwrap_or_else(|| ERROR_LOG_FILE.into())),
            output_dir: PathBuf::from(files.output_dir.unwrap_or_else(|| ".".into())),
            limits: Limits {
                // with a zero page size no batch is ever short, so paging never ends
                page_size: limits.page_size.filter(|&n| n > 0).unwrap_or(defaults.page_size),
                scrape_delay: limits
                    .scrape_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.scrape_delay),
                add_delay: limits
                    .add_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.add_delay),
                post_delay: limits
                    .post_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.post_delay),
                daily_add_limit: limits.daily_add_limit.unwrap_or(defaults.daily_add_limit),
            },
        }
    }

    /// Session file name as written by the SQLite session storage.
    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }
}
