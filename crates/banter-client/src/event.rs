//! Engine input events and output actions.

use banter_proto::{Attachment, ClientEvent, RoomId, ServerEvent, UserId};

use crate::conversation::HistoryEntry;

/// Inputs to [`crate::SyncEngine::handle`].
///
/// Local intents come from the view layer; `TransportUp`/`TransportDown`
/// and `Server` come from the transport driver.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Begin establishing the transport.
    Connect,

    /// Tear the transport down.
    Disconnect,

    /// The driver established the transport.
    TransportUp,

    /// The transport failed to open or dropped.
    TransportDown {
        /// Human-readable failure reason, for logging.
        reason: String,
    },

    /// Make a peer's conversation the active one.
    SelectConversation {
        /// The peer to converse with.
        peer_id: UserId,
    },

    /// Send a direct message to a peer.
    SendMessage {
        /// Recipient.
        peer_id: UserId,
        /// Body text. May be `None` when an attachment is present.
        body: Option<String>,
        /// Attachment, if any.
        attachment: Option<Attachment>,
    },

    /// Server-confirmed history fetched out of band, to splice under the
    /// pending tail of a conversation.
    HistoryLoaded {
        /// The conversation's peer.
        peer_id: UserId,
        /// Confirmed messages in server order.
        messages: Vec<HistoryEntry>,
    },

    /// Create a new room and enter it.
    CreateRoom {
        /// Public rooms are listable; private rooms are join-by-name.
        is_public: bool,
        /// Free-form room description.
        description: String,
    },

    /// Join an existing room.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },

    /// Send a message to the active room.
    SendRoomMessage {
        /// Message text.
        text: String,
    },

    /// Leave the active room (non-creator members).
    LeaveRoom,

    /// End the active room for all participants (creator only).
    EndRoom,

    /// The room view is being torn down. Runs session cleanup: leave or
    /// end the room as appropriate, deferring if creation is in flight.
    CloseRoomView,

    /// An inbound event decoded off the transport.
    Server(ServerEvent),
}

/// Outputs of [`crate::SyncEngine::handle`], executed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Establish the transport connection.
    Open,

    /// Serialize and send this event to the server.
    Emit(ClientEvent),

    /// Close the transport.
    Close,

    /// A conversation's log or metadata changed; repaint it.
    ConversationChanged {
        /// The conversation's peer.
        peer_id: UserId,
    },

    /// A peer's unread count changed.
    UnreadChanged {
        /// The peer the count belongs to.
        peer_id: UserId,
        /// The new count.
        count: u32,
    },

    /// The room session's lifecycle, roster, metadata, or log changed.
    RoomChanged,

    /// A user-facing failure notice from the server.
    Notify {
        /// Display text.
        message: String,
    },
}
