//! Group references and entity resolution

use std::fmt;

use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;

use crate::error::{Error, Result};
use crate::usernames::is_valid_username;

/// How the user pointed at a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRef {
    /// Public username (without @), also extracted from t.me links.
    Username(String),
    /// Bare numeric id, with any `-100` / `-` marker removed.
    Id(i64),
}

impl GroupRef {
    /// Parse `@name`, `name`, `https://t.me/name`, `-1001234` or `1234`.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(id) = parse_marked_id(trimmed) {
            return Some(GroupRef::Id(id));
        }

        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let path = ["t.me/", "telegram.me/", "www.t.me/"]
            .iter()
            .find_map(|host| without_scheme.strip_prefix(host))
            .unwrap_or(without_scheme);
        let first_segment = path.split(['/', '?']).next().unwrap_or_default();
        // invite links cannot be resolved by username
        if first_segment.eq_ignore_ascii_case("joinchat") {
            return None;
        }
        let name = first_segment.strip_prefix('@').unwrap_or(first_segment);

        is_valid_username(name).then(|| GroupRef::Username(name.to_string()))
    }
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRef::Username(name) => write!(f, "@{}", name),
            GroupRef::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Digits a `-100` channel marker is followed by (`-100` + id padded to 10).
const CHANNEL_ID_DIGITS: usize = 10;

fn parse_marked_id(input: &str) -> Option<i64> {
    // -1001234567890 is channel 1234567890, -1001 is basic group 1001
    let digits = match input.strip_prefix("-100") {
        Some(rest) if rest.len() >= CHANNEL_ID_DIGITS => rest,
        _ => input.strip_prefix('-').unwrap_or(input),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().filter(|&id| id > 0)
}

/// Get ID from Peer
pub fn peer_id(peer: &Peer) -> i64 {
    match peer {
        Peer::User(u) => u.raw.id(),
        Peer::Group(g) => match &g.raw {
            tl::enums::Chat::Empty(c) => c.id,
            tl::enums::Chat::Chat(c) => c.id,
            tl::enums::Chat::Forbidden(c) => c.id,
            tl::enums::Chat::Channel(c) => c.id,
            tl::enums::Chat::ChannelForbidden(c) => c.id,
        },
        Peer::Channel(c) => c.raw.id,
    }
}

/// Public username of a chat, if it has one
pub fn peer_username(peer: &Peer) -> Option<String> {
    match peer {
        Peer::User(user) => user.username().map(|u| u.to_string()),
        Peer::Channel(channel) => channel.username().map(|u| u.to_string()),
        Peer::Group(group) => group.username().map(|u| u.to_string()),
    }
}

/// Username when available, otherwise the numeric id.
pub fn peer_label(peer: &Peer) -> String {
    peer_username(peer).unwrap_or_else(|| peer_id(peer).to_string())
}

/// Channel-level input handle needed by `channels.*` requests.
///
/// Basic groups have no channel handle and yield `None`.
pub fn input_channel(peer: &Peer) -> Option<tl::enums::InputChannel> {
    let (channel_id, access_hash) = match peer {
        Peer::Channel(c) => (c.raw.id, c.raw.access_hash),
        Peer::Group(g) => match &g.raw {
            tl::enums::Chat::Channel(c) => (c.id, c.access_hash),
            _ => return None,
        },
        Peer::User(_) => return None,
    };

    Some(tl::enums::InputChannel::Channel(tl::types::InputChannel {
        channel_id,
        access_hash: access_hash.unwrap_or(0),
    }))
}

/// Resolve a GroupRef to an actual Peer
pub async fn resolve_group(client: &Client, group: &GroupRef) -> Result<Peer> {
    match group {
        GroupRef::Username(username) => client
            .resolve_username(username)
            .await
            .map_err(|e| Error::TelegramError(e.to_string()))?
            .ok_or_else(|| Error::ChatNotFound(format!("Username @{} not found", username))),
        GroupRef::Id(target_id) => {
            // Numeric ids only resolve for chats already in our dialogs
            let mut dialogs = client.iter_dialogs();

            while let Some(dialog) = dialogs
                .next()
                .await
                .map_err(|e| Error::TelegramError(e.to_string()))?
            {
                let is_group_like = matches!(&dialog.peer, Peer::Channel(_) | Peer::Group(_));
                if is_group_like && peer_id(&dialog.peer) == *target_id {
                    return Ok(dialog.peer);
                }
            }

            Err(Error::ChatNotFound(format!(
                "Group {} not found in dialogs",
                target_id
            )))
        }
    }
}
