//! One-to-one conversation store with optimistic local echo.
//!
//! Sends are appended locally as `Pending` before any server round trip,
//! then reconciled against the server's echo: the echo's correlation key
//! picks out the pending entry, which becomes `Confirmed` under the
//! server's authoritative timestamp. The log keeps one invariant at all
//! times: confirmed messages form a prefix sorted by server timestamp
//! (ties keep insertion order), and pending messages follow in insertion
//! order.

use std::collections::HashMap;

use banter_proto::{Attachment, ChatId, ClientEvent, Member, UserId};

/// Who authored a message, relative to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Sent by this client.
    Local,
    /// Sent by the peer.
    Remote,
}

/// Delivery state of a message in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Optimistically appended; not yet acknowledged by the server.
    Pending,
    /// Acknowledged; `server_ts` is authoritative.
    Confirmed,
}

/// One entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Correlation key for echo matching. `Some` only for local sends.
    pub client_id: Option<u64>,

    /// Body text. `None` for attachment-only messages.
    pub body: Option<String>,

    /// Attachment, if any.
    pub attachment: Option<Attachment>,

    /// Author, relative to this client.
    pub origin: Origin,

    /// Delivery state.
    pub delivery: Delivery,

    /// Local-issue timestamp (client clock, unix milliseconds).
    pub local_ts: u64,

    /// Server-assigned timestamp. `Some` exactly when confirmed.
    pub server_ts: Option<u64>,
}

impl Message {
    /// Timestamp used for display ordering: the authoritative server
    /// timestamp when confirmed, the local-issue timestamp until then.
    pub fn display_ts(&self) -> u64 {
        self.server_ts.unwrap_or(self.local_ts)
    }
}

/// A server-confirmed message fetched from the history collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Author's user ID.
    pub sender_id: UserId,
    /// Body text.
    pub text: Option<String>,
    /// Attachment, if any.
    pub attachment: Option<Attachment>,
    /// Server-assigned timestamp.
    pub timestamp: u64,
}

/// State of one conversation with a peer.
#[derive(Debug, Clone, Default)]
struct Conversation {
    chat_id: Option<ChatId>,
    peer: Option<Member>,
    log: Vec<Message>,
}

/// What an inbound `receiveMessage` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundApplied {
    /// A pending local send was confirmed in this peer's log.
    Confirmed {
        /// The conversation that changed.
        peer_id: UserId,
    },

    /// A remote message was appended to this peer's log.
    Appended {
        /// The conversation that changed.
        peer_id: UserId,
    },

    /// A self-echo matched no pending entry and was dropped.
    Unmatched,
}

/// All one-to-one conversations for a session, keyed by peer.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    self_id: UserId,
    conversations: HashMap<UserId, Conversation>,
    active: Option<UserId>,
}

impl ConversationStore {
    /// Create an empty store for the given identity.
    pub fn new(self_id: UserId) -> Self {
        Self { self_id, conversations: HashMap::new(), active: None }
    }

    /// The currently selected peer, if any.
    pub fn active(&self) -> Option<UserId> {
        self.active
    }

    /// The log for a peer. `None` if no conversation exists yet.
    pub fn log(&self, peer_id: UserId) -> Option<&[Message]> {
        self.conversations.get(&peer_id).map(|c| c.log.as_slice())
    }

    /// Server-confirmed channel ID for a peer, once known.
    pub fn chat_id(&self, peer_id: UserId) -> Option<ChatId> {
        self.conversations.get(&peer_id).and_then(|c| c.chat_id)
    }

    /// Cached profile of a peer, if one has been recorded.
    pub fn peer_profile(&self, peer_id: UserId) -> Option<&Member> {
        self.conversations.get(&peer_id).and_then(|c| c.peer.as_ref())
    }

    /// Record a peer's profile (from the contact list collaborator).
    pub fn update_peer_profile(&mut self, profile: Member) {
        let user_id = profile.user_id;
        self.conversations.entry(user_id).or_default().peer = Some(profile);
    }

    /// Select a peer's conversation, creating it if needed.
    ///
    /// Returns the wire events to emit: `startChat` to ensure the channel
    /// exists server-side, and `markMessagesAsRead` since selecting a
    /// conversation brings its backlog on screen.
    pub fn select(&mut self, peer_id: UserId) -> Vec<ClientEvent> {
        self.conversations.entry(peer_id).or_default();
        self.active = Some(peer_id);

        vec![
            ClientEvent::StartChat { sender_id: self.self_id, receiver_id: peer_id },
            ClientEvent::MarkMessagesAsRead { sender_id: peer_id, receiver_id: self.self_id },
        ]
    }

    /// Optimistically append a local send and produce its wire event.
    ///
    /// The message enters the log as `Pending` immediately; confirmation
    /// arrives later via [`Self::apply_inbound`].
    pub fn send(
        &mut self,
        peer_id: UserId,
        body: Option<String>,
        attachment: Option<Attachment>,
        local_ts: u64,
        client_id: u64,
    ) -> ClientEvent {
        let conversation = self.conversations.entry(peer_id).or_default();
        conversation.log.push(Message {
            client_id: Some(client_id),
            body: body.clone(),
            attachment: attachment.clone(),
            origin: Origin::Local,
            delivery: Delivery::Pending,
            local_ts,
            server_ts: None,
        });

        ClientEvent::SendMessage {
            sender_id: self.self_id,
            receiver_id: peer_id,
            text: body,
            attachment,
            timestamp: local_ts,
            chat_id: conversation.chat_id,
            client_id,
        }
    }

    /// Record the server-confirmed channel ID for the active conversation.
    ///
    /// `chatCreated` answers the `startChat` emitted on selection, so it
    /// binds to whichever conversation is active when it arrives.
    pub fn confirm_chat(&mut self, chat_id: ChatId) {
        let Some(conversation) = self.active.and_then(|p| self.conversations.get_mut(&p)) else {
            tracing::warn!(chat_id, "chatCreated with no active conversation, dropping");
            return;
        };
        conversation.chat_id = Some(chat_id);
    }

    /// Apply an inbound `receiveMessage`.
    ///
    /// A message from our own ID is the echo of an optimistic send: the
    /// matching pending entry (by correlation key, falling back to
    /// local-issue timestamp equality for servers that do not reflect the
    /// key) is confirmed under the echo's timestamp, never duplicated.
    /// Anything else is appended to the sender's log as a confirmed
    /// remote message.
    pub fn apply_inbound(
        &mut self,
        sender_id: UserId,
        text: Option<String>,
        attachment: Option<Attachment>,
        timestamp: u64,
        client_id: Option<u64>,
    ) -> InboundApplied {
        if sender_id == self.self_id {
            return self.confirm_echo(timestamp, client_id);
        }

        let conversation = self.conversations.entry(sender_id).or_default();
        let message = Message {
            client_id: None,
            body: text,
            attachment,
            origin: Origin::Remote,
            delivery: Delivery::Confirmed,
            local_ts: timestamp,
            server_ts: Some(timestamp),
        };
        let at = confirmed_insert_index(&conversation.log, timestamp);
        conversation.log.insert(at, message);

        InboundApplied::Appended { peer_id: sender_id }
    }

    /// Replace a conversation's confirmed history wholesale.
    ///
    /// The new log is the fetched entries in server order, followed by the
    /// still-pending local sends (they survive the splice and reconcile
    /// against their echoes as usual).
    pub fn load_history(&mut self, peer_id: UserId, entries: Vec<HistoryEntry>) {
        let self_id = self.self_id;
        let conversation = self.conversations.entry(peer_id).or_default();

        let pending: Vec<Message> = conversation
            .log
            .iter()
            .filter(|m| m.delivery == Delivery::Pending)
            .cloned()
            .collect();

        conversation.log = entries
            .into_iter()
            .map(|e| Message {
                client_id: None,
                body: e.text,
                attachment: e.attachment,
                origin: if e.sender_id == self_id { Origin::Local } else { Origin::Remote },
                delivery: Delivery::Confirmed,
                local_ts: e.timestamp,
                server_ts: Some(e.timestamp),
            })
            .collect();
        conversation.log.extend(pending);
    }

    fn confirm_echo(&mut self, timestamp: u64, client_id: Option<u64>) -> InboundApplied {
        for (&peer_id, conversation) in &mut self.conversations {
            let matched = conversation.log.iter().position(|m| {
                m.delivery == Delivery::Pending
                    && match client_id {
                        Some(key) => m.client_id == Some(key),
                        None => m.local_ts == timestamp,
                    }
            });

            if let Some(index) = matched {
                let mut message = conversation.log.remove(index);
                message.delivery = Delivery::Confirmed;
                message.server_ts = Some(timestamp);
                let at = confirmed_insert_index(&conversation.log, timestamp);
                conversation.log.insert(at, message);
                return InboundApplied::Confirmed { peer_id };
            }
        }

        tracing::warn!(timestamp, ?client_id, "self-echo matched no pending send, dropping");
        InboundApplied::Unmatched
    }
}

/// Insertion index for a confirmed message with the given server
/// timestamp: after every confirmed message with an equal-or-earlier
/// timestamp, before the pending tail.
fn confirmed_insert_index(log: &[Message], server_ts: u64) -> usize {
    log.iter()
        .position(|m| {
            m.delivery == Delivery::Pending
                || m.server_ts.is_some_and(|ts| ts > server_ts)
        })
        .unwrap_or(log.len())
}
