//! MTProto adapters for the paginator
//!
//! Wraps grammers calls as [`BatchSource`] / [`UnitWorker`] implementations
//! and turns `InvocationError`s into [`ProviderError`]s.

use std::future::Future;

use grammers_client::types::peer::Peer;
use grammers_client::{Client, InvocationError};
use grammers_tl_types as tl;

use crate::error::{parse_flood_wait_seconds, ProviderError};
use crate::paginator::{Batch, BatchCursor, BatchSource, UnitWorker};

/// RPC errors that end the whole operation.
const FATAL_RPC_ERRORS: &[&str] = &[
    "CHAT_ADMIN_REQUIRED",
    "CHANNEL_PRIVATE",
    "CHAT_WRITE_FORBIDDEN",
    "CHAT_FORBIDDEN",
    "USER_BANNED_IN_CHANNEL",
    "PEER_FLOOD",
    "AUTH_KEY_UNREGISTERED",
];

/// RPC error name prefixes that carry a wait time in seconds.
const BACKOFF_RPC_PREFIXES: &[&str] = &["FLOOD_WAIT", "FLOOD_PREMIUM_WAIT", "SLOWMODE_WAIT"];

/// Wait used when a flood error carries no usable wait time.
const FALLBACK_FLOOD_WAIT_SECS: u64 = 30;

/// Backoff of at least one second, or the fallback when the wait is unknown.
fn flood_backoff(secs: Option<u64>) -> ProviderError {
    let secs = secs.map_or(FALLBACK_FLOOD_WAIT_SECS, |s| s.max(1));
    ProviderError::backoff_secs(secs)
}

/// Classify an RPC error by name and its numeric value.
pub fn classify_rpc(name: &str, value: Option<u32>) -> ProviderError {
    if BACKOFF_RPC_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return flood_backoff(value.map(u64::from).or_else(|| parse_flood_wait_seconds(name)));
    }
    if FATAL_RPC_ERRORS.contains(&name) {
        return ProviderError::Permission(name.to_string());
    }
    ProviderError::Transient(name.to_string())
}

pub fn classify(err: &InvocationError) -> ProviderError {
    match err {
        InvocationError::Rpc(rpc) => classify_rpc(&rpc.name, rpc.value),
        other => {
            let text = other.to_string();
            match parse_flood_wait_seconds(&text) {
                Some(secs) => flood_backoff(Some(secs)),
                None => ProviderError::Transient(text),
            }
        }
    }
}

/// Input handle for a user peer.
pub fn input_user(peer: &Peer) -> Option<tl::enums::InputUser> {
    match peer {
        Peer::User(user) => match &user.raw {
            tl::enums::User::User(u) => Some(tl::enums::InputUser::User(tl::types::InputUser {
                user_id: u.id,
                access_hash: u.access_hash.unwrap_or(0),
            })),
            tl::enums::User::Empty(_) => None,
        },
        _ => None,
    }
}

/// Usernames from a participants page. Members without one are dropped.
pub fn usernames_from_users(users: &[tl::enums::User]) -> Vec<String> {
    users
        .iter()
        .filter_map(|user| match user {
            tl::enums::User::User(u) => u.username.clone(),
            tl::enums::User::Empty(_) => None,
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Turn one `channels.getParticipants` response into a batch.
pub fn participants_batch(response: tl::enums::channels::ChannelParticipants) -> Batch<String> {
    match response {
        tl::enums::channels::ChannelParticipants::Participants(page) => {
            Batch::new(page.participants.len(), usernames_from_users(&page.users))
        }
        tl::enums::channels::ChannelParticipants::NotModified => Batch::new(0, Vec::new()),
    }
}

/// Pages through the member list of a channel or supergroup.
pub struct ParticipantPages<'a> {
    client: &'a Client,
    channel: tl::enums::InputChannel,
    page_size: usize,
}

impl<'a> ParticipantPages<'a> {
    pub fn new(client: &'a Client, channel: tl::enums::InputChannel, page_size: usize) -> Self {
        Self {
            client,
            channel,
            page_size,
        }
    }
}

impl BatchSource<String> for ParticipantPages<'_> {
    fn fetch(
        &mut self,
        cursor: BatchCursor,
    ) -> impl Future<Output = Result<Batch<String>, ProviderError>> + Send {
        let client = self.client;
        let request = tl::functions::channels::GetParticipants {
            channel: self.channel.clone(),
            filter: tl::enums::ChannelParticipantsFilter::ChannelParticipantsSearch(
                tl::types::ChannelParticipantsSearch { q: String::new() },
            ),
            offset: i32::try_from(cursor.offset()).unwrap_or(i32::MAX),
            limit: i32::try_from(self.page_size).unwrap_or(i32::MAX),
            hash: 0,
        };

        async move {
            client
                .invoke(&request)
                .await
                .map(participants_batch)
                .map_err(|e| classify(&e))
        }
    }
}

/// Resolves a username and invites it to a channel.
pub struct GroupInviter<'a> {
    client: &'a Client,
    channel: tl::enums::InputChannel,
}

impl<'a> GroupInviter<'a> {
    pub fn new(client: &'a Client, channel: tl::enums::InputChannel) -> Self {
        Self { client, channel }
    }
}

impl UnitWorker<String> for GroupInviter<'_> {
    fn process(&mut self, username: &String) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let client = self.client;
        let channel = self.channel.clone();
        let username = username.clone();

        async move {
            let peer = client
                .resolve_username(&username)
                .await
                .map_err(|e| classify(&e))?
                .ok_or_else(|| ProviderError::Transient(format!("@{} not found", username)))?;
            let user = input_user(&peer)
                .ok_or_else(|| ProviderError::Transient(format!("@{} is not a user", username)))?;

            client
                .invoke(&tl::functions::channels::InviteToChannel {
                    channel,
                    users: vec![user],
                })
                .await
                .map_err(|e| classify(&e))?;
            Ok(())
        }
    }
}
