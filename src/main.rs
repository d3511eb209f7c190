//! telety CLI - main entry point
//!
//! Without a subcommand the interactive menu starts. Subcommands run a single
//! flow directly; missing arguments are still asked for on the console.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use telety::chat::GroupRef;
use telety::commands::{self, add, login, logout, post, scrape, AddRequest, ScrapeRequest};
use telety::console::{ask_existing_file, ask_group, ask_non_empty, StdinPrompter};
use telety::session::check_session_exists;
use telety::Config;

#[derive(Parser)]
#[command(name = "telety")]
#[command(about = "Telegram group toolkit: scrape members, add members, broadcast posts", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml (defaults to ./config.yml, then ../config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Sign in and create the session file
    Login,

    /// Save the usernames of a group's members to a file
    Scrape {
        /// Group link, @username or numeric ID
        group: Option<String>,
    },

    /// Invite users from a username file into a group
    Add {
        /// File with one username per line
        #[arg(short, long)]
        users: Option<PathBuf>,

        /// Target group link, @username or numeric ID
        group: Option<String>,
    },

    /// Run the broadcast bot
    Post {
        /// Bot token from @BotFather
        #[arg(long, env = "TELETY_BOT_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Remove session files from the current directory
    Logout,
}

fn parse_group(raw: &str) -> anyhow::Result<GroupRef> {
    GroupRef::parse(raw).with_context(|| format!("Not a valid group link, @username or ID: {raw}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("telety=warn".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::new(),
    };

    execute_command(&config, cli.command.unwrap_or(Commands::Menu)).await
}

async fn execute_command(config: &Config, command: Commands) -> anyhow::Result<()> {
    let mut prompter = StdinPrompter;

    match command {
        Commands::Menu => {
            commands::menu::run(config, &mut prompter).await?;
        }
        Commands::Login => {
            login::run(config, &mut prompter).await?;
        }
        Commands::Scrape { group } => {
            check_session_exists(config).context("Please login first")?;
            let creds = login::resolve_credentials(config, &mut prompter)?;
            let group = match group {
                Some(raw) => parse_group(&raw)?,
                None => ask_group(&mut prompter, "\n🔗 Enter group/channel link or ID: ")?,
            };
            commands::until_cancelled(scrape::run(config, &creds, ScrapeRequest { group })).await?;
        }
        Commands::Add { users, group } => {
            check_session_exists(config).context("Please login first")?;
            let creds = login::resolve_credentials(config, &mut prompter)?;
            let user_file = match users {
                Some(path) => path,
                None => ask_existing_file(&mut prompter, "\n📄 Enter path to username file: ")?,
            };
            let group = match group {
                Some(raw) => parse_group(&raw)?,
                None => ask_group(&mut prompter, "\n🔗 Enter target group link or ID: ")?,
            };
            commands::until_cancelled(add::run(config, &creds, AddRequest { user_file, group }))
                .await?;
        }
        Commands::Post { token } => {
            let token = match token.filter(|t| !t.trim().is_empty()) {
                Some(token) => token,
                None if !config.bot_token.is_empty() => config.bot_token.clone(),
                None => ask_non_empty(&mut prompter, "\n🤖 Enter your bot token from @BotFather: ")?,
            };
            post::run(config, &token).await?;
        }
        Commands::Logout => {
            logout::run(Path::new("."), &mut prompter)?;
        }
    }

    Ok(())
}
