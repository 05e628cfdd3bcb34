//! Typed forms of the bidirectional event surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Attachment, ChatId, Member, RoomId, UserId};

/// Events the client emits to the server.
///
/// Each variant corresponds to one wire event name; the payload shapes are
/// authoritative for interop (see [`crate::Envelope`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Associate this connection with an identity so the server can attach
    /// unread/presence state. Emitted once per connection, on open.
    Join {
        /// Authenticated user ID.
        user_id: UserId,
    },

    /// Open or ensure a one-to-one channel with a peer.
    StartChat {
        /// Our user ID.
        sender_id: UserId,
        /// The peer's user ID.
        receiver_id: UserId,
    },

    /// Send a direct message, optionally with an attachment.
    SendMessage {
        /// Our user ID.
        sender_id: UserId,
        /// The peer's user ID.
        receiver_id: UserId,
        /// Body text. `None` when the message is attachment-only.
        text: Option<String>,
        /// Attachment payload. `None` for plain text messages.
        attachment: Option<Attachment>,
        /// Local-issue timestamp (unix milliseconds, client clock).
        timestamp: u64,
        /// Channel ID, if the server has confirmed one for this peer.
        chat_id: Option<ChatId>,
        /// Client-generated correlation key for echo matching.
        client_id: u64,
    },

    /// Clear unread state for a peer on the server.
    MarkMessagesAsRead {
        /// The peer whose messages were read.
        sender_id: UserId,
        /// Our user ID.
        receiver_id: UserId,
    },

    /// Create a new room.
    CreateRoom {
        /// Our user ID (becomes the room creator).
        created_by: UserId,
        /// Public rooms are listable; private rooms are join-by-name.
        is_public: bool,
        /// Free-form room description.
        room_description: String,
    },

    /// Join an existing room.
    JoinRoom {
        /// Server-assigned room ID.
        room_id: RoomId,
        /// Our user ID.
        user_id: UserId,
    },

    /// Send a message to the active room.
    SendRoomMessage {
        /// Target room.
        room_id: RoomId,
        /// Our user ID.
        user_id: UserId,
        /// Message text.
        message: String,
    },

    /// Leave a room (non-creator members).
    LeaveRoom {
        /// Room to leave.
        room_id: RoomId,
        /// Our user ID.
        user_id: UserId,
    },

    /// End a room for all participants (creator only).
    DeleteRoom {
        /// Room to end.
        room_id: RoomId,
        /// Our user ID.
        user_id: UserId,
    },
}

/// Acknowledgment payload for leave/delete room requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAck {
    /// Whether the server applied the operation.
    pub success: bool,

    /// Server-provided reason on failure. `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Events the server pushes to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Confirms the channel ID for a one-to-one chat after `startChat`.
    ChatCreated {
        /// Server-assigned channel ID.
        chat_id: ChatId,
    },

    /// Inbound direct message. Includes the echo of our own sends.
    ReceiveMessage {
        /// Sender's user ID. Equal to our own ID for self-echoes.
        sender_id: UserId,
        /// Body text. `None` for attachment-only messages.
        text: Option<String>,
        /// Attachment payload, if any.
        attachment: Option<Attachment>,
        /// Authoritative server-assigned timestamp (unix milliseconds).
        timestamp: u64,
        /// Correlation key reflected from `sendMessage`, when the server
        /// supports it. `None` otherwise.
        client_id: Option<u64>,
    },

    /// Authoritative unread snapshot, keyed by peer ID.
    UpdateUnreadCounts(HashMap<UserId, u32>),

    /// Room created or joined; supplies the room ID, metadata, and initial
    /// roster.
    RoomCreated {
        /// Server-assigned room ID.
        room_id: RoomId,
        /// Room display name.
        room_name: String,
        /// Room description.
        description: String,
        /// Creator's user ID.
        created_by: UserId,
        /// Initial member roster.
        members: Vec<Member>,
    },

    /// Room metadata refresh.
    RoomInfo {
        /// Room display name.
        name: String,
        /// Room description.
        description: String,
    },

    /// Roster replacement after a member joined.
    JoinedRoomMembers(Vec<Member>),

    /// Roster replacement after a member left.
    LeftRoomMembers(Vec<Member>),

    /// Inbound room message.
    ReceiveRoomMessage {
        /// Sender's user ID.
        user_id: UserId,
        /// Sender's display name at send time.
        username: String,
        /// Message text.
        message: String,
        /// Authoritative timestamp (unix milliseconds).
        timestamp: u64,
    },

    /// Acknowledgment of a `leaveRoom` request.
    LeftRoomResponse(RoomAck),

    /// Acknowledgment of a `deleteRoom` request. Broadcast to every
    /// participant of the ended room, which makes it the forced-end signal
    /// for members that did not initiate the delete.
    DeleteRoomResponse(RoomAck),

    /// Room creation/join failure reason.
    RoomError(String),
}

/// Inbound event names, used as dispatcher routing and subscription keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// `chatCreated`
    ChatCreated,
    /// `receiveMessage`
    ReceiveMessage,
    /// `updateUnreadCounts`
    UpdateUnreadCounts,
    /// `roomCreated`
    RoomCreated,
    /// `roomInfo`
    RoomInfo,
    /// `joinedRoomMembers`
    JoinedRoomMembers,
    /// `leftRoomMembers`
    LeftRoomMembers,
    /// `receiveRoomMessage`
    ReceiveRoomMessage,
    /// `leftRoomResponse`
    LeftRoomResponse,
    /// `deleteRoomResponse`
    DeleteRoomResponse,
    /// `roomError`
    RoomError,
}

impl EventName {
    /// Wire spelling of this event name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatCreated => "chatCreated",
            Self::ReceiveMessage => "receiveMessage",
            Self::UpdateUnreadCounts => "updateUnreadCounts",
            Self::RoomCreated => "roomCreated",
            Self::RoomInfo => "roomInfo",
            Self::JoinedRoomMembers => "joinedRoomMembers",
            Self::LeftRoomMembers => "leftRoomMembers",
            Self::ReceiveRoomMessage => "receiveRoomMessage",
            Self::LeftRoomResponse => "leftRoomResponse",
            Self::DeleteRoomResponse => "deleteRoomResponse",
            Self::RoomError => "roomError",
        }
    }

    /// Parse a wire event name. `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "chatCreated" => Some(Self::ChatCreated),
            "receiveMessage" => Some(Self::ReceiveMessage),
            "updateUnreadCounts" => Some(Self::UpdateUnreadCounts),
            "roomCreated" => Some(Self::RoomCreated),
            "roomInfo" => Some(Self::RoomInfo),
            "joinedRoomMembers" => Some(Self::JoinedRoomMembers),
            "leftRoomMembers" => Some(Self::LeftRoomMembers),
            "receiveRoomMessage" => Some(Self::ReceiveRoomMessage),
            "leftRoomResponse" => Some(Self::LeftRoomResponse),
            "deleteRoomResponse" => Some(Self::DeleteRoomResponse),
            "roomError" => Some(Self::RoomError),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ServerEvent {
    /// Event name this inbound event arrived under.
    pub fn name(&self) -> EventName {
        match self {
            Self::ChatCreated { .. } => EventName::ChatCreated,
            Self::ReceiveMessage { .. } => EventName::ReceiveMessage,
            Self::UpdateUnreadCounts(_) => EventName::UpdateUnreadCounts,
            Self::RoomCreated { .. } => EventName::RoomCreated,
            Self::RoomInfo { .. } => EventName::RoomInfo,
            Self::JoinedRoomMembers(_) => EventName::JoinedRoomMembers,
            Self::LeftRoomMembers(_) => EventName::LeftRoomMembers,
            Self::ReceiveRoomMessage { .. } => EventName::ReceiveRoomMessage,
            Self::LeftRoomResponse(_) => EventName::LeftRoomResponse,
            Self::DeleteRoomResponse(_) => EventName::DeleteRoomResponse,
            Self::RoomError(_) => EventName::RoomError,
        }
    }
}

impl ClientEvent {
    /// Wire event name for this outbound event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::StartChat { .. } => "startChat",
            Self::SendMessage { .. } => "sendMessage",
            Self::MarkMessagesAsRead { .. } => "markMessagesAsRead",
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::SendRoomMessage { .. } => "sendRoomMessage",
            Self::LeaveRoom { .. } => "leaveRoom",
            Self::DeleteRoom { .. } => "deleteRoom",
        }
    }
}
