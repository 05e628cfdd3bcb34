//! Top-level synchronization engine.
//!
//! [`SyncEngine`] owns the connection state machine and the three stores
//! (conversations, room session, unread counts) and is the single entry
//! point for both local intents and inbound server events. Like every
//! state machine in this workspace it is Sans-IO: `handle` mutates state
//! and returns the actions the caller must execute.

use banter_core::{Connection, ConnectionAction, Environment, TransportState};
use banter_proto::{ClientEvent, Member, ServerEvent, UserId};

use crate::conversation::{ConversationStore, InboundApplied};
use crate::dispatcher::Route;
use crate::error::EngineError;
use crate::event::{EngineAction, EngineEvent};
use crate::room::{RoomLifecycle, RoomMessage, RoomSession};
use crate::unread::UnreadTracker;

/// The client-resident synchronization engine for one user session.
#[derive(Debug, Clone)]
pub struct SyncEngine<E: Environment> {
    env: E,
    connection: Connection,
    conversations: ConversationStore,
    room: Option<RoomSession>,
    unread: UnreadTracker,
}

impl<E: Environment> SyncEngine<E> {
    /// Create an engine for the given identity, disconnected.
    pub fn new(env: E, user_id: UserId) -> Self {
        Self {
            env,
            connection: Connection::new(user_id),
            conversations: ConversationStore::new(user_id),
            room: None,
            unread: UnreadTracker::new(),
        }
    }

    /// The connection state machine (read-only).
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The conversation store (read-only).
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// The current room session, if one exists.
    pub fn room(&self) -> Option<&RoomSession> {
        self.room.as_ref()
    }

    /// True while the transport is established.
    pub fn is_connected(&self) -> bool {
        self.connection.state() == TransportState::Connected
    }

    /// The unread tracker (read-only).
    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    /// Record a peer's profile from the contact list collaborator.
    pub fn record_peer_profile(&mut self, profile: Member) {
        self.conversations.update_peer_profile(profile);
    }

    /// Process one event and return the actions to execute.
    ///
    /// `Err` means the event was invalid in the current state and nothing
    /// changed; the engine remains usable.
    pub fn handle(&mut self, event: EngineEvent) -> Result<Vec<EngineAction>, EngineError> {
        match event {
            EngineEvent::Connect => Ok(lift(self.connection.connect())),
            EngineEvent::Disconnect => Ok(lift(self.connection.disconnect())),
            EngineEvent::TransportUp => Ok(lift(self.connection.transport_opened())),
            EngineEvent::TransportDown { reason } => {
                self.connection.transport_failed(&reason);
                Ok(Vec::new())
            }
            EngineEvent::SelectConversation { peer_id } => Ok(self.select_conversation(peer_id)),
            EngineEvent::SendMessage { peer_id, body, attachment } => {
                self.send_message(peer_id, body, attachment)
            }
            EngineEvent::HistoryLoaded { peer_id, messages } => {
                self.conversations.load_history(peer_id, messages);
                Ok(vec![EngineAction::ConversationChanged { peer_id }])
            }
            EngineEvent::CreateRoom { is_public, description } => {
                self.start_room_session(|session| session.create(is_public, description))
            }
            EngineEvent::JoinRoom { room_id } => {
                self.start_room_session(|session| session.join(room_id))
            }
            EngineEvent::SendRoomMessage { text } => {
                let session = self.room.as_mut().ok_or(EngineError::NoActiveRoom)?;
                let events = session.send_message(text)?;
                Ok(self.emit_all(events))
            }
            EngineEvent::LeaveRoom => {
                let session = self.room.as_mut().ok_or(EngineError::NoActiveRoom)?;
                let events = session.leave()?;
                Ok(self.emit_all(events))
            }
            EngineEvent::EndRoom => {
                let session = self.room.as_mut().ok_or(EngineError::NoActiveRoom)?;
                let events = session.end()?;
                Ok(self.emit_all(events))
            }
            EngineEvent::CloseRoomView => Ok(self.close_room_view()),
            EngineEvent::Server(event) => Ok(self.handle_server(event)),
        }
    }

    fn select_conversation(&mut self, peer_id: UserId) -> Vec<EngineAction> {
        let events = self.conversations.select(peer_id);
        self.unread.mark_read(peer_id);

        let mut actions = self.emit_all(events);
        actions.push(EngineAction::UnreadChanged { peer_id, count: 0 });
        actions.push(EngineAction::ConversationChanged { peer_id });
        actions
    }

    fn send_message(
        &mut self,
        peer_id: UserId,
        body: Option<String>,
        attachment: Option<banter_proto::Attachment>,
    ) -> Result<Vec<EngineAction>, EngineError> {
        let body = body.filter(|b| !b.trim().is_empty());
        if body.is_none() && attachment.is_none() {
            return Err(EngineError::EmptyMessage);
        }

        let local_ts = self.env.now_millis();
        let client_id = self.env.random_u64();
        let event = self.conversations.send(peer_id, body, attachment, local_ts, client_id);

        // While disconnected the emit is dropped and the message simply
        // stays pending in the log.
        let mut actions = self.emit_all(vec![event]);
        actions.push(EngineAction::ConversationChanged { peer_id });
        Ok(actions)
    }

    fn start_room_session<F>(&mut self, request: F) -> Result<Vec<EngineAction>, EngineError>
    where
        F: FnOnce(&mut RoomSession) -> Result<Vec<ClientEvent>, EngineError>,
    {
        if let Some(existing) = &self.room
            && matches!(existing.lifecycle(), RoomLifecycle::Creating | RoomLifecycle::Active)
        {
            return Err(EngineError::RoomSessionActive);
        }

        let mut session = RoomSession::new(self.connection.user_id());
        let events = request(&mut session)?;
        self.room = Some(session);

        let mut actions = self.emit_all(events);
        actions.push(EngineAction::RoomChanged);
        Ok(actions)
    }

    fn close_room_view(&mut self) -> Vec<EngineAction> {
        let Some(session) = &mut self.room else {
            return Vec::new();
        };

        let events = session.close_view();
        if session.is_terminal() || session.lifecycle() == RoomLifecycle::Idle {
            self.room = None;
        }
        self.emit_all(events)
    }

    fn handle_server(&mut self, event: ServerEvent) -> Vec<EngineAction> {
        match Route::of(&event) {
            Route::Conversation => self.on_conversation_event(event),
            Route::Unread => self.on_unread_event(event),
            Route::Room => self.on_room_event(event),
        }
    }

    fn on_conversation_event(&mut self, event: ServerEvent) -> Vec<EngineAction> {
        match event {
            ServerEvent::ChatCreated { chat_id } => {
                self.conversations.confirm_chat(chat_id);
                self.conversations
                    .active()
                    .map(|peer_id| EngineAction::ConversationChanged { peer_id })
                    .into_iter()
                    .collect()
            }
            ServerEvent::ReceiveMessage { sender_id, text, attachment, timestamp, client_id } => {
                let applied =
                    self.conversations.apply_inbound(sender_id, text, attachment, timestamp, client_id);
                self.after_inbound_message(applied)
            }
            other => misrouted(&other),
        }
    }

    fn after_inbound_message(&mut self, applied: InboundApplied) -> Vec<EngineAction> {
        match applied {
            InboundApplied::Confirmed { peer_id } => {
                vec![EngineAction::ConversationChanged { peer_id }]
            }
            InboundApplied::Appended { peer_id } => {
                if self.conversations.active() == Some(peer_id) {
                    // On screen: keep the server's count at zero instead
                    // of accumulating unread for a visible message.
                    let mark = ClientEvent::MarkMessagesAsRead {
                        sender_id: peer_id,
                        receiver_id: self.connection.user_id(),
                    };
                    let mut actions = self.emit_all(vec![mark]);
                    actions.push(EngineAction::ConversationChanged { peer_id });
                    actions
                } else {
                    let count = self.unread.record_inbound(peer_id);
                    vec![
                        EngineAction::UnreadChanged { peer_id, count },
                        EngineAction::ConversationChanged { peer_id },
                    ]
                }
            }
            InboundApplied::Unmatched => Vec::new(),
        }
    }

    fn on_unread_event(&mut self, event: ServerEvent) -> Vec<EngineAction> {
        match event {
            ServerEvent::UpdateUnreadCounts(snapshot) => {
                // Report every peer whose count may have moved, including
                // those the snapshot cleared.
                let mut touched: std::collections::BTreeSet<UserId> =
                    self.unread.counts().map(|(peer, _)| peer).collect();
                touched.extend(snapshot.keys().copied());

                self.unread.apply_snapshot(snapshot);
                touched
                    .into_iter()
                    .map(|peer_id| EngineAction::UnreadChanged {
                        peer_id,
                        count: self.unread.count(peer_id),
                    })
                    .collect()
            }
            other => misrouted(&other),
        }
    }

    fn on_room_event(&mut self, event: ServerEvent) -> Vec<EngineAction> {
        let Some(session) = &mut self.room else {
            tracing::debug!(event = %event.name(), "room event with no session, dropping");
            return Vec::new();
        };

        match event {
            ServerEvent::RoomCreated { room_id, room_name, description, created_by, members } => {
                let deferred =
                    session.on_room_created(room_id, room_name, description, created_by, members);
                let mut actions = self.emit_all(deferred);
                actions.push(EngineAction::RoomChanged);
                actions
            }
            ServerEvent::RoomInfo { name, description } => {
                session.on_room_info(name, description);
                vec![EngineAction::RoomChanged]
            }
            ServerEvent::JoinedRoomMembers(members) | ServerEvent::LeftRoomMembers(members) => {
                session.replace_roster(members);
                vec![EngineAction::RoomChanged]
            }
            ServerEvent::ReceiveRoomMessage { user_id, username, message, timestamp } => {
                session.on_room_message(RoomMessage { user_id, username, text: message, timestamp });
                vec![EngineAction::RoomChanged]
            }
            ServerEvent::LeftRoomResponse(ack) => {
                if session.on_left_response(&ack) {
                    vec![EngineAction::RoomChanged]
                } else if ack.success {
                    Vec::new()
                } else {
                    vec![notify_failure("Couldn't leave the room", ack.message)]
                }
            }
            ServerEvent::DeleteRoomResponse(ack) => {
                if session.on_delete_response(&ack) {
                    vec![EngineAction::RoomChanged]
                } else if ack.success {
                    Vec::new()
                } else {
                    vec![notify_failure("Couldn't end the room", ack.message)]
                }
            }
            ServerEvent::RoomError(reason) => {
                session.on_room_error(&reason);
                vec![EngineAction::Notify { message: reason }, EngineAction::RoomChanged]
            }
            other => misrouted(&other),
        }
    }

    fn emit_all(&self, events: Vec<ClientEvent>) -> Vec<EngineAction> {
        events.into_iter().flat_map(|e| lift(self.connection.send(e))).collect()
    }
}

fn lift(actions: Vec<ConnectionAction>) -> Vec<EngineAction> {
    actions
        .into_iter()
        .map(|action| match action {
            ConnectionAction::Open => EngineAction::Open,
            ConnectionAction::Emit(event) => EngineAction::Emit(event),
            ConnectionAction::Close => EngineAction::Close,
        })
        .collect()
}

fn misrouted(event: &ServerEvent) -> Vec<EngineAction> {
    tracing::error!(event = %event.name(), "event routed to a store that does not own it");
    Vec::new()
}

fn notify_failure(prefix: &str, detail: Option<String>) -> EngineAction {
    let message = match detail {
        Some(detail) => format!("{prefix}: {detail}"),
        None => prefix.to_owned(),
    };
    EngineAction::Notify { message }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use banter_core::env::test_utils::MockEnv;
    use banter_proto::RoomAck;

    use super::*;
    use crate::conversation::Delivery;

    fn connected_engine(user_id: UserId) -> SyncEngine<MockEnv> {
        let mut engine = SyncEngine::new(MockEnv::new(), user_id);
        let _ = engine.handle(EngineEvent::Connect).unwrap();
        let _ = engine.handle(EngineEvent::TransportUp).unwrap();
        engine
    }

    fn emitted(actions: &[EngineAction]) -> Vec<&ClientEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                EngineAction::Emit(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connect_sequence_announces_identity() {
        let mut engine = SyncEngine::new(MockEnv::new(), 42);

        let actions = engine.handle(EngineEvent::Connect).unwrap();
        assert_eq!(actions, vec![EngineAction::Open]);

        let actions = engine.handle(EngineEvent::TransportUp).unwrap();
        assert_eq!(actions, vec![EngineAction::Emit(ClientEvent::Join { user_id: 42 })]);
        assert!(engine.is_connected());
    }

    #[test]
    fn send_while_disconnected_stays_pending_without_emit() {
        let mut engine = SyncEngine::new(MockEnv::new(), 1);

        let actions = engine
            .handle(EngineEvent::SendMessage {
                peer_id: 2,
                body: Some("offline".into()),
                attachment: None,
            })
            .unwrap();

        assert!(emitted(&actions).is_empty());
        let log = engine.conversations().log(2).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].delivery, Delivery::Pending);
    }

    #[test]
    fn empty_message_is_rejected() {
        let mut engine = connected_engine(1);
        let err = engine
            .handle(EngineEvent::SendMessage { peer_id: 2, body: Some("   ".into()), attachment: None })
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyMessage);
        assert!(engine.conversations().log(2).is_none());
    }

    #[test]
    fn inbound_for_active_peer_re_marks_read() {
        let mut engine = connected_engine(1);
        let _ = engine.handle(EngineEvent::SelectConversation { peer_id: 2 }).unwrap();

        let actions = engine
            .handle(EngineEvent::Server(ServerEvent::ReceiveMessage {
                sender_id: 2,
                text: Some("hi".into()),
                attachment: None,
                timestamp: 1_000,
                client_id: None,
            }))
            .unwrap();

        assert_eq!(
            emitted(&actions),
            vec![&ClientEvent::MarkMessagesAsRead { sender_id: 2, receiver_id: 1 }]
        );
        assert_eq!(engine.unread().count(2), 0);
    }

    #[test]
    fn inbound_for_background_peer_increments_unread() {
        let mut engine = connected_engine(1);
        let _ = engine.handle(EngineEvent::SelectConversation { peer_id: 2 }).unwrap();

        let actions = engine
            .handle(EngineEvent::Server(ServerEvent::ReceiveMessage {
                sender_id: 3,
                text: Some("psst".into()),
                attachment: None,
                timestamp: 1_000,
                client_id: None,
            }))
            .unwrap();

        assert!(actions.contains(&EngineAction::UnreadChanged { peer_id: 3, count: 1 }));
        assert_eq!(engine.unread().count(3), 1);
    }

    #[test]
    fn unread_snapshot_reports_cleared_peers() {
        let mut engine = connected_engine(1);
        let _ = engine.handle(EngineEvent::Server(ServerEvent::ReceiveMessage {
            sender_id: 3,
            text: Some("one".into()),
            attachment: None,
            timestamp: 1_000,
            client_id: None,
        }));

        let snapshot = std::collections::HashMap::from([(4, 2)]);
        let actions = engine
            .handle(EngineEvent::Server(ServerEvent::UpdateUnreadCounts(snapshot)))
            .unwrap();

        assert!(actions.contains(&EngineAction::UnreadChanged { peer_id: 3, count: 0 }));
        assert!(actions.contains(&EngineAction::UnreadChanged { peer_id: 4, count: 2 }));
    }

    #[test]
    fn second_room_session_is_rejected_while_live() {
        let mut engine = connected_engine(1);
        let _ = engine
            .handle(EngineEvent::CreateRoom { is_public: true, description: "first".into() })
            .unwrap();

        let err = engine.handle(EngineEvent::JoinRoom { room_id: 5 }).unwrap_err();
        assert_eq!(err, EngineError::RoomSessionActive);
    }

    #[test]
    fn room_error_notifies_and_allows_retry() {
        let mut engine = connected_engine(1);
        let _ = engine.handle(EngineEvent::JoinRoom { room_id: 5 }).unwrap();

        let actions = engine
            .handle(EngineEvent::Server(ServerEvent::RoomError("room is full".into())))
            .unwrap();
        assert!(actions.contains(&EngineAction::Notify { message: "room is full".into() }));

        // Back to Idle: a new attempt is accepted.
        assert!(engine.handle(EngineEvent::JoinRoom { room_id: 6 }).is_ok());
    }

    #[test]
    fn room_event_without_session_is_dropped() {
        let mut engine = connected_engine(1);
        let actions = engine
            .handle(EngineEvent::Server(ServerEvent::DeleteRoomResponse(RoomAck {
                success: true,
                message: None,
            })))
            .unwrap();
        assert!(actions.is_empty());
    }

    #[test]
    fn close_room_view_drops_terminal_session() {
        let mut engine = connected_engine(2);
        let _ = engine.handle(EngineEvent::JoinRoom { room_id: 9 }).unwrap();
        let _ = engine
            .handle(EngineEvent::Server(ServerEvent::RoomCreated {
                room_id: 9,
                room_name: "general".into(),
                description: String::new(),
                created_by: 1,
                members: Vec::new(),
            }))
            .unwrap();
        let _ = engine
            .handle(EngineEvent::Server(ServerEvent::DeleteRoomResponse(RoomAck {
                success: true,
                message: None,
            })))
            .unwrap();
        assert_eq!(engine.room().map(RoomSession::lifecycle), Some(RoomLifecycle::Ended));

        let _ = engine.handle(EngineEvent::CloseRoomView).unwrap();
        assert!(engine.room().is_none());
    }
}
