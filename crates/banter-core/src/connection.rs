//! Connection lifecycle state machine.
//!
//! Owns the single transport connection's state and is the only channel
//! through which outbound events leave the engine. Uses the action pattern:
//! methods return [`ConnectionAction`]s for the driver to execute, keeping
//! the state machine pure (no I/O).
//!
//! # State machine
//!
//! ```text
//! ┌──────────────┐ connect  ┌────────────┐ transport_opened ┌───────────┐
//! │ Disconnected │─────────>│ Connecting │─────────────────>│ Connected │
//! └──────────────┘          └────────────┘                  └───────────┘
//!        ↑                        │ transport_failed              │
//!        └────────────────────────┴── disconnect ─────────────────┘
//! ```
//!
//! Transport-level failures never surface as errors to the caller: the state
//! returns to `Disconnected`, the failure is logged, and retry is the
//! caller's responsibility.

use banter_proto::{ClientEvent, UserId};

/// Transport state of the single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not connected to the server.
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport established and identity announced.
    Connected,
}

/// Actions returned by the connection state machine.
///
/// The driver (transport task or test harness) executes these:
/// - `Open`: establish the transport
/// - `Emit`: serialize and send the event over the transport
/// - `Close`: tear the transport down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Establish the transport connection.
    Open,

    /// Send this event to the server.
    Emit(ClientEvent),

    /// Close the transport.
    Close,
}

/// Connection lifecycle state machine.
///
/// One instance per user session, constructed explicitly and passed by
/// reference to every store — there is no global connection.
#[derive(Debug, Clone)]
pub struct Connection {
    state: TransportState,
    user_id: UserId,
}

impl Connection {
    /// Create a disconnected connection for the given identity.
    pub fn new(user_id: UserId) -> Self {
        Self { state: TransportState::Disconnected, user_id }
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Identity this connection announces to the server.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Begin establishing the transport.
    ///
    /// No-op while already Connecting or Connected.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.state != TransportState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored, transport already up");
            return Vec::new();
        }

        self.state = TransportState::Connecting;
        vec![ConnectionAction::Open]
    }

    /// The driver established the transport.
    ///
    /// Emits the `join` announcement so the server can associate this
    /// connection with unread/presence state.
    pub fn transport_opened(&mut self) -> Vec<ConnectionAction> {
        self.state = TransportState::Connected;
        vec![ConnectionAction::Emit(ClientEvent::Join { user_id: self.user_id })]
    }

    /// The transport failed to open or dropped.
    ///
    /// Fails silently: state returns to Disconnected and the reason is
    /// logged. Retry is the caller's responsibility.
    pub fn transport_failed(&mut self, reason: &str) {
        tracing::warn!(%reason, "transport failed, now disconnected");
        self.state = TransportState::Disconnected;
    }

    /// Tear down the transport.
    ///
    /// Idempotent: while already Disconnected this is a no-op with no side
    /// effect.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        if self.state == TransportState::Disconnected {
            return Vec::new();
        }

        self.state = TransportState::Disconnected;
        vec![ConnectionAction::Close]
    }

    /// Send an event, fire-and-forget.
    ///
    /// There is no delivery guarantee while the transport is not Connected:
    /// the event is dropped and logged, never queued.
    pub fn send(&self, event: ClientEvent) -> Vec<ConnectionAction> {
        if self.state != TransportState::Connected {
            tracing::debug!(event = event.name(), state = ?self.state, "dropping send, not connected");
            return Vec::new();
        }

        vec![ConnectionAction::Emit(event)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_opens_then_join_announces_identity() {
        let mut conn = Connection::new(7);
        assert_eq!(conn.state(), TransportState::Disconnected);

        let actions = conn.connect();
        assert_eq!(actions, vec![ConnectionAction::Open]);
        assert_eq!(conn.state(), TransportState::Connecting);

        let actions = conn.transport_opened();
        assert_eq!(actions, vec![ConnectionAction::Emit(ClientEvent::Join { user_id: 7 })]);
        assert_eq!(conn.state(), TransportState::Connected);
    }

    #[test]
    fn connect_while_up_is_a_no_op() {
        let mut conn = Connection::new(7);
        let _ = conn.connect();
        let _ = conn.transport_opened();

        assert!(conn.connect().is_empty());
        assert_eq!(conn.state(), TransportState::Connected);
    }

    #[test]
    fn transport_failure_returns_to_disconnected_without_error() {
        let mut conn = Connection::new(7);
        let _ = conn.connect();

        conn.transport_failed("connection refused");
        assert_eq!(conn.state(), TransportState::Disconnected);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut conn = Connection::new(7);
        let _ = conn.connect();
        let _ = conn.transport_opened();

        let first = conn.disconnect();
        assert_eq!(first, vec![ConnectionAction::Close]);
        assert_eq!(conn.state(), TransportState::Disconnected);

        // Second call: still Disconnected, no side effect.
        let second = conn.disconnect();
        assert!(second.is_empty());
        assert_eq!(conn.state(), TransportState::Disconnected);
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let conn = Connection::new(7);
        let actions = conn.send(ClientEvent::StartChat { sender_id: 7, receiver_id: 2 });
        assert!(actions.is_empty());
    }

    #[test]
    fn send_while_connected_emits() {
        let mut conn = Connection::new(7);
        let _ = conn.connect();
        let _ = conn.transport_opened();

        let event = ClientEvent::StartChat { sender_id: 7, receiver_id: 2 };
        let actions = conn.send(event.clone());
        assert_eq!(actions, vec![ConnectionAction::Emit(event)]);
    }
}
