//! Engine error taxonomy.
//!
//! Only caller mistakes surface as `Err`: operations that are invalid in
//! the current state. Server-reported failures arrive asynchronously and
//! are delivered as [`crate::EngineAction::Notify`] actions instead, and
//! transport loss is absorbed by the connection state machine (messages
//! stay pending, sends are dropped).

use thiserror::Error;

use crate::room::RoomLifecycle;

/// Errors returned by [`crate::SyncEngine::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A message with neither text nor attachment was submitted.
    #[error("message has neither text nor attachment")]
    EmptyMessage,

    /// A room operation was issued with no room session in progress.
    #[error("no active room session")]
    NoActiveRoom,

    /// A room operation is not valid in the session's current lifecycle
    /// state.
    #[error("cannot {operation} while room session is {state:?}")]
    InvalidRoomState {
        /// Lifecycle state the session was in.
        state: RoomLifecycle,
        /// The rejected operation.
        operation: &'static str,
    },

    /// A create or join was issued while a session is already live.
    #[error("a room session is already in progress")]
    RoomSessionActive,

    /// Only the creator may end a room for everyone.
    #[error("only the room creator may end the room")]
    NotRoomCreator,

    /// The creator must end the room rather than leave it.
    #[error("the room creator cannot leave; end the room instead")]
    CreatorCannotLeave,
}
