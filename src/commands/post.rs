//! Post command - broadcast bot
//!
//! A Bot API bot that stores the last message sent to it in private and
//! copies it into every registered group on `/post`. Groups register
//! themselves with `/addgroup` (the bot must be an admin there).

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{MessageId, UserId};
use teloxide::{ApiError, RequestError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{ProviderError, Result};
use crate::error_log::ErrorLog;
use crate::paginator::{PaginatorConfig, RateLimitedPaginator, TokioPacer, UnitWorker};
use crate::registry::{GroupRegistry, GroupTarget};
use crate::report::post_summary;

const HELP_TEXT: &str = "🤖 Broadcast bot\n\n\
1. Add me to your groups as an admin\n\
2. Send /addgroup in each group\n\
3. Send me the message you want to post\n\
4. Send /post to copy it to every group\n\n\
Commands:\n\
/post - post the stored message\n\
/groups - list registered groups\n\
/addgroup - register this group (send in the group)\n\
/removegroup - unregister this group (send in the group)\n\
/cancel - drop the stored message or stop a running post";

/// Commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Post,
    Groups,
    AddGroup,
    RemoveGroup,
    Cancel,
}

impl BotCommand {
    /// Parse the first word of a message, accepting the `/cmd@botname` form.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(BotCommand::Start),
            "help" => Some(BotCommand::Help),
            "post" => Some(BotCommand::Post),
            "groups" => Some(BotCommand::Groups),
            "addgroup" => Some(BotCommand::AddGroup),
            "removegroup" => Some(BotCommand::RemoveGroup),
            "cancel" => Some(BotCommand::Cancel),
            _ => None,
        }
    }
}

/// Pointer to the message waiting to be broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRefusal {
    AlreadyPosting,
    NothingStored,
    NoGroups,
}

impl PostRefusal {
    pub fn reply(self) -> &'static str {
        match self {
            PostRefusal::AlreadyPosting => "⚠️ Already posting. Please wait.",
            PostRefusal::NothingStored => "❌ Send me the message to post first.",
            PostRefusal::NoGroups => "❌ No groups registered. Use /addgroup in your groups.",
        }
    }
}

/// A broadcast that has been started and must be finished with
/// [`BroadcastSession::finish_post`].
#[derive(Debug)]
pub struct PostJob {
    pub message: StoredMessage,
    pub targets: Vec<GroupTarget>,
    cancel: Arc<AtomicBool>,
}

/// Bot state shared between updates.
#[derive(Debug)]
pub struct BroadcastSession {
    stored: Option<StoredMessage>,
    posting: bool,
    cancel: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    registry: GroupRegistry,
}

pub type SharedSession = Arc<Mutex<BroadcastSession>>;

impl BroadcastSession {
    pub fn new(registry: GroupRegistry) -> Self {
        Self {
            stored: None,
            posting: false,
            cancel: Arc::new(AtomicBool::new(false)),
            task: None,
            registry,
        }
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut GroupRegistry {
        &mut self.registry
    }

    pub fn stored(&self) -> Option<StoredMessage> {
        self.stored
    }

    pub fn is_posting(&self) -> bool {
        self.posting
    }

    /// Remember a message for the next `/post`. Refused while a post runs.
    pub fn store(&mut self, message: StoredMessage) -> bool {
        if self.posting {
            return false;
        }
        self.stored = Some(message);
        true
    }

    pub fn begin_post(&mut self) -> std::result::Result<PostJob, PostRefusal> {
        if self.posting {
            return Err(PostRefusal::AlreadyPosting);
        }
        let message = self.stored.ok_or(PostRefusal::NothingStored)?;
        let targets = self.registry.targets();
        if targets.is_empty() {
            return Err(PostRefusal::NoGroups);
        }

        self.posting = true;
        self.cancel.store(false, Ordering::SeqCst);
        Ok(PostJob {
            message,
            targets,
            cancel: Arc::clone(&self.cancel),
        })
    }

    /// Keep the handle of the task running the current post.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    pub fn finish_post(&mut self) {
        self.posting = false;
        self.stored = None;
        self.task = None;
    }

    /// Drop the stored message and ask a running post to stop before its
    /// next group. Returns false when there was nothing to cancel.
    pub fn cancel(&mut self) -> bool {
        let had_work = self.posting || self.stored.is_some();
        if self.posting {
            self.cancel.store(true, Ordering::SeqCst);
        }
        self.stored = None;
        had_work
    }
}

/// Map a Bot API failure onto the paginator's outcome tags.
pub fn classify_request_error(err: &RequestError) -> ProviderError {
    match err {
        RequestError::RetryAfter(wait) => ProviderError::Backoff(*wait),
        // the Bot API answers 404 Not Found to an unknown token
        RequestError::Api(ApiError::NotFound) => {
            ProviderError::Permission("invalid bot token".to_string())
        }
        other => ProviderError::Transient(other.to_string()),
    }
}

/// Copies the stored message into one group per unit.
pub struct BotDelivery {
    bot: Bot,
    message: StoredMessage,
}

impl BotDelivery {
    pub fn new(bot: Bot, message: StoredMessage) -> Self {
        Self { bot, message }
    }
}

impl UnitWorker<GroupTarget> for BotDelivery {
    fn process(
        &mut self,
        target: &GroupTarget,
    ) -> impl Future<Output = std::result::Result<(), ProviderError>> + Send {
        let bot = self.bot.clone();
        let message = self.message;
        let chat = ChatId(target.id);

        async move {
            bot.copy_message(chat, message.chat_id, message.message_id)
                .await
                .map(|_| ())
                .map_err(|e| classify_request_error(&e))
        }
    }
}

/// Runtime settings handed to every update handler.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub bot_id: UserId,
    pub delay: Duration,
    pub error_log: ErrorLog,
}

async fn bot_is_admin(
    bot: &Bot,
    chat: ChatId,
    bot_id: UserId,
) -> std::result::Result<bool, RequestError> {
    let member = bot.get_chat_member(chat, bot_id).await?;
    Ok(member.kind.is_privileged())
}

/// Drop registered groups where the bot is gone or no longer an admin.
/// Network failures keep the group.
pub async fn prune_groups(bot: &Bot, bot_id: UserId, session: &SharedSession) -> Result<usize> {
    let targets = session.lock().await.registry().targets();

    let mut stale = Vec::new();
    for target in &targets {
        match bot_is_admin(bot, ChatId(target.id), bot_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Not an admin in {}, removing", target);
                stale.push(target.id);
            }
            Err(RequestError::Api(e)) => {
                info!("Cannot access {} ({}), removing", target, e);
                stale.push(target.id);
            }
            Err(e) => warn!("Could not check {}: {}", target, e),
        }
    }

    session.lock().await.registry_mut().remove_all(&stale)
}

async fn broadcast(
    bot: Bot,
    reply_to: ChatId,
    job: PostJob,
    session: SharedSession,
    settings: Arc<BroadcastSettings>,
) {
    let mut delivery = BotDelivery::new(bot.clone(), job.message);
    let mut paginator = RateLimitedPaginator::new(
        PaginatorConfig::new("post", usize::MAX, settings.delay),
        TokioPacer,
    )
    .with_error_log(settings.error_log.clone())
    .with_cancel_flag(Arc::clone(&job.cancel));

    let outcome = paginator.run_units(&job.targets, &mut delivery).await;
    session.lock().await.finish_post();

    let summary = post_summary(&outcome.tally, &outcome.stop);
    println!("\n{}", summary);
    if let Err(e) = bot.send_message(reply_to, summary).await {
        warn!("Failed to send post summary: {}", e);
    }
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    command: BotCommand,
    session: &SharedSession,
    settings: &Arc<BroadcastSettings>,
) -> Result<()> {
    let chat = msg.chat.id;
    let in_group = !msg.chat.is_private();

    let reply = match command {
        BotCommand::Start | BotCommand::Help => HELP_TEXT.to_string(),
        BotCommand::Post => {
            // locked until attached; the task calls finish_post
            let mut guard = session.lock().await;
            match guard.begin_post() {
                Err(refusal) => refusal.reply().to_string(),
                Ok(job) => {
                    let count = job.targets.len();
                    let task = tokio::spawn(broadcast(
                        bot.clone(),
                        chat,
                        job,
                        Arc::clone(session),
                        Arc::clone(settings),
                    ));
                    guard.attach(task);
                    format!("📤 Posting to {} groups...", count)
                }
            }
        }
        BotCommand::Groups => {
            let guard = session.lock().await;
            if guard.registry().is_empty() {
                "📝 No groups registered yet.".to_string()
            } else {
                let mut text = format!("📋 Registered groups ({}):\n", guard.registry().len());
                for title in guard.registry().titles() {
                    text.push_str(&format!("• {}\n", title));
                }
                text
            }
        }
        BotCommand::AddGroup if !in_group => "❌ Send /addgroup inside the group.".to_string(),
        BotCommand::AddGroup => {
            if bot_is_admin(bot, chat, settings.bot_id).await? {
                let title = msg.chat.title().unwrap_or("Unknown Group").to_string();
                session.lock().await.registry_mut().add(chat.0, title.clone())?;
                info!("Registered group {} ({})", title, chat.0);
                format!("✅ Group added: {}", title)
            } else {
                "❌ Make me an admin here first.".to_string()
            }
        }
        BotCommand::RemoveGroup if !in_group => {
            "❌ Send /removegroup inside the group.".to_string()
        }
        BotCommand::RemoveGroup => {
            if session.lock().await.registry_mut().remove(chat.0)? {
                "✅ Group removed.".to_string()
            } else {
                "ℹ️ This group was not registered.".to_string()
            }
        }
        BotCommand::Cancel => {
            if session.lock().await.cancel() {
                "🚫 Cancelled.".to_string()
            } else {
                "ℹ️ Nothing to cancel.".to_string()
            }
        }
    };

    bot.send_message(chat, reply).await?;
    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    session: SharedSession,
    settings: Arc<BroadcastSettings>,
) -> Result<()> {
    if let Some(command) = msg.text().and_then(BotCommand::parse) {
        return handle_command(&bot, &msg, command, &session, &settings).await;
    }

    // anything else sent in private becomes the message to post
    let is_command = msg.text().is_some_and(|t| t.starts_with('/'));
    if !msg.chat.is_private() || is_command {
        return Ok(());
    }

    let stored = session.lock().await.store(StoredMessage {
        chat_id: msg.chat.id,
        message_id: msg.id,
    });
    let reply = if stored {
        "✅ Message stored. Send /post to broadcast it."
    } else {
        "⚠️ Already posting. Please wait."
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Stop a running broadcast and wait for its task to end. Returns false when
/// no broadcast was running.
pub async fn stop_broadcast(session: &SharedSession) -> bool {
    let task = {
        let mut guard = session.lock().await;
        guard.cancel();
        guard.task.take()
    };
    let Some(task) = task else {
        return false;
    };

    task.abort();
    if let Err(e) = task.await {
        if !e.is_cancelled() {
            warn!("Broadcast task failed: {}", e);
        }
    }
    session.lock().await.finish_post();
    true
}

/// Main entry point for the post command. Runs until Ctrl+C.
pub async fn run(config: &Config, token: &str) -> Result<()> {
    let bot = Bot::new(token);
    let me = bot.get_me().await?;
    info!("Bot authorized as @{}", me.username());

    let session: SharedSession = Arc::new(Mutex::new(BroadcastSession::new(
        GroupRegistry::load(&config.groups_file),
    )));

    let removed = prune_groups(&bot, me.user.id, &session).await?;
    if removed > 0 {
        println!("🧹 Removed {} groups where the bot is no longer an admin", removed);
    }
    println!(
        "\n🤖 @{} is running with {} groups. Press Ctrl+C to stop.",
        me.username(),
        session.lock().await.registry().len()
    );

    let settings = Arc::new(BroadcastSettings {
        bot_id: me.user.id,
        delay: config.limits.post_delay,
        error_log: ErrorLog::new(&config.error_log),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        move |bot: Bot, msg: Message, session: SharedSession, settings: Arc<BroadcastSettings>| async move {
            if let Err(err) = handle_message(bot, msg, session, settings).await {
                error!("Handler error: {err:?}");
            }
            Ok::<_, RequestError>(())
        }
    }));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![Arc::clone(&session), settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    if stop_broadcast(&session).await {
        println!("🚫 Broadcast stopped on shutdown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginator::{Pacer, StopReason};

    fn registry_with(groups: &[(i64, &str)]) -> (tempfile::TempDir, GroupRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = GroupRegistry::load(dir.path().join("bot_groups.json"));
        for (id, title) in groups {
            registry.add(*id, *title).unwrap();
        }
        (dir, registry)
    }

    fn message(id: i32) -> StoredMessage {
        StoredMessage {
            chat_id: ChatId(42),
            message_id: MessageId(id),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/post@telety_bot"), Some(BotCommand::Post));
        assert_eq!(BotCommand::parse("  /AddGroup now"), Some(BotCommand::AddGroup));
        assert_eq!(BotCommand::parse("/removegroup"), Some(BotCommand::RemoveGroup));
        assert_eq!(BotCommand::parse("/unknown"), None);
        assert_eq!(BotCommand::parse("hello /post"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn post_needs_message_and_groups() {
        let (_dir, registry) = registry_with(&[]);
        let mut session = BroadcastSession::new(registry);
        assert_eq!(session.begin_post().unwrap_err(), PostRefusal::NothingStored);

        assert!(session.store(message(1)));
        assert_eq!(session.begin_post().unwrap_err(), PostRefusal::NoGroups);
    }

    #[test]
    fn post_lifecycle() {
        let (_dir, registry) = registry_with(&[(-1001, "Alpha"), (-1002, "Beta")]);
        let mut session = BroadcastSession::new(registry);
        session.store(message(7));

        let job = session.begin_post().unwrap();
        assert_eq!(job.message, message(7));
        assert_eq!(job.targets.len(), 2);
        assert!(session.is_posting());

        assert_eq!(session.begin_post().unwrap_err(), PostRefusal::AlreadyPosting);
        assert!(!session.store(message(8)));

        session.finish_post();
        assert!(!session.is_posting());
        assert_eq!(session.stored(), None);
    }

    #[test]
    fn cancel_stops_running_post() {
        let (_dir, registry) = registry_with(&[(-1001, "Alpha")]);
        let mut session = BroadcastSession::new(registry);
        assert!(!session.cancel());

        session.store(message(3));
        let job = session.begin_post().unwrap();
        assert!(!job.cancel.load(Ordering::SeqCst));

        assert!(session.cancel());
        assert!(job.cancel.load(Ordering::SeqCst));
        // still posting until the loop notices
        assert!(session.is_posting());
        assert_eq!(session.stored(), None);
    }

    #[test]
    fn classifies_bot_api_errors() {
        let retry = RequestError::RetryAfter(Duration::from_secs(12));
        assert_eq!(
            classify_request_error(&retry),
            ProviderError::Backoff(Duration::from_secs(12))
        );

        let token = RequestError::Api(ApiError::NotFound);
        assert_eq!(
            classify_request_error(&token),
            ProviderError::Permission("invalid bot token".to_string())
        );

        let kicked = RequestError::Api(ApiError::BotKicked);
        assert!(matches!(
            classify_request_error(&kicked),
            ProviderError::Transient(_)
        ));
    }

    struct NoSleep;

    impl Pacer for NoSleep {
        fn pause(&mut self, _duration: Duration) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn cancelled_post_stops_without_logging() {
        let (dir, registry) = registry_with(&[(-1001, "Alpha"), (-1002, "Beta")]);
        let mut session = BroadcastSession::new(registry);
        session.store(message(5));
        let job = session.begin_post().unwrap();
        session.cancel();

        let log = ErrorLog::new(dir.path().join("errors.txt"));
        let mut delivery = BotDelivery::new(Bot::new("123:test"), job.message);
        let mut paginator = RateLimitedPaginator::new(
            PaginatorConfig::new("post", usize::MAX, Duration::from_secs(3)),
            NoSleep,
        )
        .with_error_log(log.clone())
        .with_cancel_flag(Arc::clone(&job.cancel));

        let outcome = paginator.run_units(&job.targets, &mut delivery).await;

        assert_eq!(outcome.stop, StopReason::Cancelled);
        assert_eq!(outcome.tally.attempted, 0);
        assert!(!log.path().exists());
        assert!(post_summary(&outcome.tally, &outcome.stop).contains("Cancelled"));
    }

    /// Sets its flag when dropped, i.e. when the owning task is torn down.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stop_broadcast_ends_running_task() {
        let (_dir, registry) = registry_with(&[(-1001, "Alpha")]);
        let session: SharedSession = Arc::new(Mutex::new(BroadcastSession::new(registry)));
        assert!(!stop_broadcast(&session).await);

        let dropped = Arc::new(AtomicBool::new(false));
        {
            let mut guard = session.lock().await;
            guard.store(message(9));
            guard.begin_post().unwrap();
            let flag = DropFlag(Arc::clone(&dropped));
            guard.attach(tokio::spawn(async move {
                let _flag = flag;
                std::future::pending::<()>().await;
            }));
        }

        assert!(stop_broadcast(&session).await);
        assert!(dropped.load(Ordering::SeqCst));

        let guard = session.lock().await;
        assert!(!guard.is_posting());
        assert!(guard.task.is_none());
    }
}
