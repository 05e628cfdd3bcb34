//! Group room session state machine.
//!
//! One session covers one visit to one room, from the create/join request
//! until the room ends or this client leaves. Re-entering a room is a new
//! session.
//!
//! ```text
//!          create/join          roomCreated
//! ┌──────┐────────────>┌──────────┐────────>┌────────┐
//! │ Idle │             │ Creating │         │ Active │
//! └──────┘<────────────└──────────┘         └────────┘
//!             roomError                      │        │
//!                     deleteRoomResponse ok  │        │ leftRoomResponse ok
//!                                            v        v
//!                                       ┌───────┐  ┌──────┐
//!                                       │ Ended │  │ Left │
//!                                       └───────┘  └──────┘
//! ```
//!
//! `deleteRoomResponse { success: true }` reaches every participant of the
//! ended room, so it doubles as the forced-end signal for members that did
//! not initiate the delete. A close requested while creation is in flight
//! is deferred and executed when the acknowledgment lands, so the server
//! never accumulates a membership nobody observes.

use banter_proto::{ClientEvent, Member, RoomAck, RoomId, UserId};

use crate::error::EngineError;

/// Lifecycle state of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomLifecycle {
    /// Constructed, no request in flight.
    Idle,
    /// Create or join request awaiting acknowledgment.
    Creating,
    /// In the room: messages and roster updates flow.
    Active,
    /// The room was ended for everyone. Terminal.
    Ended,
    /// This client left the room. Terminal.
    Left,
}

/// Room visibility, chosen at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Listable by anyone.
    Public,
    /// Join-by-invitation only.
    Private,
}

/// One message in the room's transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMessage {
    /// Author's user ID.
    pub user_id: UserId,
    /// Author's display name at send time.
    pub username: String,
    /// Message text.
    pub text: String,
    /// Authoritative timestamp (unix milliseconds).
    pub timestamp: u64,
}

/// State for one visit to one room.
#[derive(Debug, Clone)]
pub struct RoomSession {
    self_id: UserId,
    lifecycle: RoomLifecycle,
    room_id: Option<RoomId>,
    name: Option<String>,
    description: Option<String>,
    created_by: Option<UserId>,
    visibility: Option<Visibility>,
    members: Vec<Member>,
    log: Vec<RoomMessage>,
    close_requested: bool,
}

impl RoomSession {
    /// Create an idle session for the given identity.
    pub fn new(self_id: UserId) -> Self {
        Self {
            self_id,
            lifecycle: RoomLifecycle::Idle,
            room_id: None,
            name: None,
            description: None,
            created_by: None,
            visibility: None,
            members: Vec::new(),
            log: Vec::new(),
            close_requested: false,
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> RoomLifecycle {
        self.lifecycle
    }

    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.lifecycle, RoomLifecycle::Ended | RoomLifecycle::Left)
    }

    /// Server-assigned room ID, once known.
    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    /// Room display name, once known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Room description, once known.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Room visibility. Known only for sessions this client created; the
    /// join acknowledgment does not carry it.
    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility
    }

    /// Whether this client created the room.
    pub fn is_creator(&self) -> bool {
        self.created_by == Some(self.self_id)
    }

    /// Current member roster.
    pub fn roster(&self) -> &[Member] {
        &self.members
    }

    /// The room transcript so far.
    pub fn log(&self) -> &[RoomMessage] {
        &self.log
    }

    /// Request room creation. Valid only while Idle.
    pub fn create(
        &mut self,
        is_public: bool,
        description: String,
    ) -> Result<Vec<ClientEvent>, EngineError> {
        self.require_state(RoomLifecycle::Idle, "create a room")?;
        self.lifecycle = RoomLifecycle::Creating;
        self.visibility =
            Some(if is_public { Visibility::Public } else { Visibility::Private });

        Ok(vec![ClientEvent::CreateRoom {
            created_by: self.self_id,
            is_public,
            room_description: description,
        }])
    }

    /// Request to join an existing room. Valid only while Idle.
    pub fn join(&mut self, room_id: RoomId) -> Result<Vec<ClientEvent>, EngineError> {
        self.require_state(RoomLifecycle::Idle, "join a room")?;
        self.lifecycle = RoomLifecycle::Creating;
        self.room_id = Some(room_id);

        Ok(vec![ClientEvent::JoinRoom { room_id, user_id: self.self_id }])
    }

    /// Send a message to the room. Valid only while Active.
    pub fn send_message(&mut self, text: String) -> Result<Vec<ClientEvent>, EngineError> {
        self.require_state(RoomLifecycle::Active, "send a room message")?;
        let Some(room_id) = self.room_id else {
            return Err(EngineError::NoActiveRoom);
        };

        Ok(vec![ClientEvent::SendRoomMessage { room_id, user_id: self.self_id, message: text }])
    }

    /// Leave the room. Valid only while Active, and only for non-creators.
    pub fn leave(&mut self) -> Result<Vec<ClientEvent>, EngineError> {
        self.require_state(RoomLifecycle::Active, "leave the room")?;
        if self.is_creator() {
            return Err(EngineError::CreatorCannotLeave);
        }
        let Some(room_id) = self.room_id else {
            return Err(EngineError::NoActiveRoom);
        };

        Ok(vec![ClientEvent::LeaveRoom { room_id, user_id: self.self_id }])
    }

    /// End the room for everyone. Valid only while Active, creator only.
    pub fn end(&mut self) -> Result<Vec<ClientEvent>, EngineError> {
        self.require_state(RoomLifecycle::Active, "end the room")?;
        if !self.is_creator() {
            return Err(EngineError::NotRoomCreator);
        }
        let Some(room_id) = self.room_id else {
            return Err(EngineError::NoActiveRoom);
        };

        Ok(vec![ClientEvent::DeleteRoom { room_id, user_id: self.self_id }])
    }

    /// The room view is going away; release the membership.
    ///
    /// While Active this emits the leave (or delete, for the creator)
    /// immediately. While Creating it only marks the close as requested;
    /// the cleanup runs when the pending acknowledgment arrives. In
    /// terminal states and Idle there is nothing to release.
    pub fn close_view(&mut self) -> Vec<ClientEvent> {
        match self.lifecycle {
            RoomLifecycle::Active => self.cleanup_events(),
            RoomLifecycle::Creating => {
                tracing::debug!("close requested mid-creation, deferring cleanup");
                self.close_requested = true;
                Vec::new()
            }
            RoomLifecycle::Idle | RoomLifecycle::Ended | RoomLifecycle::Left => Vec::new(),
        }
    }

    /// Creation or join acknowledged; the session goes Active.
    ///
    /// If a close was requested while the request was in flight, the
    /// deferred cleanup is emitted now.
    pub fn on_room_created(
        &mut self,
        room_id: RoomId,
        room_name: String,
        description: String,
        created_by: UserId,
        members: Vec<Member>,
    ) -> Vec<ClientEvent> {
        if self.lifecycle != RoomLifecycle::Creating {
            tracing::debug!(room_id, state = ?self.lifecycle, "roomCreated outside Creating, ignoring");
            return Vec::new();
        }

        self.lifecycle = RoomLifecycle::Active;
        self.room_id = Some(room_id);
        self.name = Some(room_name);
        self.description = Some(description);
        self.created_by = Some(created_by);
        self.members = members;

        if self.close_requested {
            self.close_requested = false;
            return self.cleanup_events();
        }
        Vec::new()
    }

    /// Creation or join failed; the session returns to Idle for retry.
    pub fn on_room_error(&mut self, reason: &str) {
        tracing::warn!(%reason, "room create/join rejected");
        self.lifecycle = RoomLifecycle::Idle;
        self.room_id = None;
        self.close_requested = false;
    }

    /// Metadata refresh.
    pub fn on_room_info(&mut self, name: String, description: String) {
        self.name = Some(name);
        self.description = Some(description);
    }

    /// Roster replacement (after any member joined or left).
    pub fn replace_roster(&mut self, members: Vec<Member>) {
        if self.lifecycle != RoomLifecycle::Active {
            return;
        }
        self.members = members;
    }

    /// Append an inbound room message to the transcript.
    pub fn on_room_message(&mut self, message: RoomMessage) {
        if self.lifecycle != RoomLifecycle::Active {
            tracing::debug!(state = ?self.lifecycle, "room message outside Active, ignoring");
            return;
        }
        self.log.push(message);
    }

    /// Acknowledgment of our leave request.
    ///
    /// Returns `true` on transition to the terminal Left state; `false`
    /// when the server refused (the session stays Active).
    pub fn on_left_response(&mut self, ack: &RoomAck) -> bool {
        if self.lifecycle != RoomLifecycle::Active || !ack.success {
            return false;
        }
        self.lifecycle = RoomLifecycle::Left;
        true
    }

    /// The room was deleted.
    ///
    /// Successful deletes broadcast to every participant, so this ends the
    /// session whether or not we initiated it. Returns `true` on
    /// transition to the terminal Ended state.
    pub fn on_delete_response(&mut self, ack: &RoomAck) -> bool {
        if self.lifecycle != RoomLifecycle::Active || !ack.success {
            return false;
        }
        self.lifecycle = RoomLifecycle::Ended;
        true
    }

    fn cleanup_events(&self) -> Vec<ClientEvent> {
        let Some(room_id) = self.room_id else {
            return Vec::new();
        };
        if self.is_creator() {
            vec![ClientEvent::DeleteRoom { room_id, user_id: self.self_id }]
        } else {
            vec![ClientEvent::LeaveRoom { room_id, user_id: self.self_id }]
        }
    }

    fn require_state(
        &self,
        expected: RoomLifecycle,
        operation: &'static str,
    ) -> Result<(), EngineError> {
        if self.lifecycle == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidRoomState { state: self.lifecycle, operation })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn member(user_id: UserId, username: &str) -> Member {
        Member { user_id, username: username.into(), profile_photo: None }
    }

    fn active_session(self_id: UserId, created_by: UserId) -> RoomSession {
        let mut session = RoomSession::new(self_id);
        if self_id == created_by {
            let _ = session.create(true, "test room".into()).unwrap();
        } else {
            let _ = session.join(9).unwrap();
        }
        let _ = session.on_room_created(
            9,
            "general".into(),
            "test room".into(),
            created_by,
            vec![member(created_by, "creator")],
        );
        session
    }

    #[test]
    fn create_then_ack_goes_active() {
        let mut session = RoomSession::new(1);
        let events = session.create(true, "a room".into()).unwrap();
        assert_eq!(
            events,
            vec![ClientEvent::CreateRoom {
                created_by: 1,
                is_public: true,
                room_description: "a room".into(),
            }]
        );
        assert_eq!(session.lifecycle(), RoomLifecycle::Creating);

        let deferred = session.on_room_created(
            9,
            "general".into(),
            "a room".into(),
            1,
            vec![member(1, "alice")],
        );
        assert!(deferred.is_empty());
        assert_eq!(session.lifecycle(), RoomLifecycle::Active);
        assert_eq!(session.room_id(), Some(9));
        assert_eq!(session.visibility(), Some(Visibility::Public));
        assert!(session.is_creator());
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn create_while_not_idle_is_rejected() {
        let mut session = RoomSession::new(1);
        let _ = session.create(true, "a room".into()).unwrap();

        let err = session.create(true, "again".into()).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidRoomState {
                state: RoomLifecycle::Creating,
                operation: "create a room",
            }
        );
    }

    #[test]
    fn room_error_returns_to_idle_for_retry() {
        let mut session = RoomSession::new(1);
        let _ = session.join(9).unwrap();
        session.on_room_error("room is full");

        assert_eq!(session.lifecycle(), RoomLifecycle::Idle);
        assert!(session.join(10).is_ok());
    }

    #[test]
    fn messages_flow_only_while_active() {
        let mut session = RoomSession::new(2);
        assert!(session.send_message("too early".into()).is_err());

        let mut session = active_session(2, 1);
        let events = session.send_message("hello".into()).unwrap();
        assert_eq!(
            events,
            vec![ClientEvent::SendRoomMessage { room_id: 9, user_id: 2, message: "hello".into() }]
        );

        session.on_room_message(RoomMessage {
            user_id: 1,
            username: "creator".into(),
            text: "welcome".into(),
            timestamp: 1_000,
        });
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn creator_ends_member_leaves() {
        let mut creator = active_session(1, 1);
        assert_eq!(creator.leave().unwrap_err(), EngineError::CreatorCannotLeave);
        let events = creator.end().unwrap();
        assert_eq!(events, vec![ClientEvent::DeleteRoom { room_id: 9, user_id: 1 }]);

        let mut m = active_session(2, 1);
        assert_eq!(m.end().unwrap_err(), EngineError::NotRoomCreator);
        let events = m.leave().unwrap();
        assert_eq!(events, vec![ClientEvent::LeaveRoom { room_id: 9, user_id: 2 }]);
    }

    #[test]
    fn successful_leave_ack_is_terminal() {
        let mut session = active_session(2, 1);
        let _ = session.leave().unwrap();

        let done = session.on_left_response(&RoomAck { success: true, message: None });
        assert!(done);
        assert_eq!(session.lifecycle(), RoomLifecycle::Left);
        assert!(session.is_terminal());

        // Terminal: no further operations.
        assert!(session.send_message("late".into()).is_err());
    }

    #[test]
    fn failed_leave_ack_stays_active() {
        let mut session = active_session(2, 1);
        let done = session
            .on_left_response(&RoomAck { success: false, message: Some("nope".into()) });
        assert!(!done);
        assert_eq!(session.lifecycle(), RoomLifecycle::Active);
    }

    #[test]
    fn delete_broadcast_force_ends_members() {
        // A member that never asked to leave still ends when the creator
        // deletes the room.
        let mut session = active_session(2, 1);
        let done = session.on_delete_response(&RoomAck { success: true, message: None });
        assert!(done);
        assert_eq!(session.lifecycle(), RoomLifecycle::Ended);
    }

    #[test]
    fn roster_is_replaced_wholesale() {
        let mut session = active_session(2, 1);
        session.replace_roster(vec![member(1, "creator"), member(2, "bob"), member(3, "carol")]);
        assert_eq!(session.roster().len(), 3);

        session.replace_roster(vec![member(1, "creator")]);
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn close_during_creation_defers_cleanup() {
        let mut session = RoomSession::new(2);
        let _ = session.join(9).unwrap();

        // View torn down while the join is still in flight.
        let immediate = session.close_view();
        assert!(immediate.is_empty());

        // The ack lands afterwards: the deferred leave fires.
        let deferred = session.on_room_created(
            9,
            "general".into(),
            String::new(),
            1,
            vec![member(1, "creator"), member(2, "bob")],
        );
        assert_eq!(deferred, vec![ClientEvent::LeaveRoom { room_id: 9, user_id: 2 }]);
    }

    #[test]
    fn close_while_active_cleans_up_immediately() {
        let mut creator = active_session(1, 1);
        assert_eq!(creator.close_view(), vec![ClientEvent::DeleteRoom { room_id: 9, user_id: 1 }]);

        let mut m = active_session(2, 1);
        assert_eq!(m.close_view(), vec![ClientEvent::LeaveRoom { room_id: 9, user_id: 2 }]);
    }

    #[test]
    fn close_after_terminal_is_a_no_op() {
        let mut session = active_session(2, 1);
        let _ = session.on_delete_response(&RoomAck { success: true, message: None });
        assert!(session.close_view().is_empty());
    }
}
