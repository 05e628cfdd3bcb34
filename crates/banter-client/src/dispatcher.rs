//! Inbound event fan-out.
//!
//! Two concerns live here. [`Route`] is the stateless classification the
//! engine uses to hand each inbound event to the store that owns it.
//! [`Dispatcher`] is the subscription registry for view-layer observers:
//! handlers are keyed by `(event name, subscriber)`, so a view
//! re-subscribing to an event it already observes replaces its old handler
//! instead of stacking a duplicate, and disposal removes exactly one
//! handler without touching other subscribers of the same event.

use std::collections::HashMap;

use banter_proto::{EventName, ServerEvent};

/// Which store owns an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// One-to-one conversation events.
    Conversation,
    /// Unread count snapshots.
    Unread,
    /// Room session events.
    Room,
}

impl Route {
    /// Classify an inbound event by the store that owns it.
    pub fn of(event: &ServerEvent) -> Self {
        match event.name() {
            EventName::ChatCreated | EventName::ReceiveMessage => Self::Conversation,
            EventName::UpdateUnreadCounts => Self::Unread,
            EventName::RoomCreated
            | EventName::RoomInfo
            | EventName::JoinedRoomMembers
            | EventName::LeftRoomMembers
            | EventName::ReceiveRoomMessage
            | EventName::LeftRoomResponse
            | EventName::DeleteRoomResponse
            | EventName::RoomError => Self::Room,
        }
    }
}

/// Opaque identifier for a subscribing component (a view, usually).
pub type SubscriberId = u64;

/// Handle to one registered handler.
///
/// Disposal is explicit: views drop their subscriptions during teardown
/// via [`Subscription::dispose`], so no handler outlives the view that
/// registered it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an undisposed subscription keeps its handler registered"]
pub struct Subscription {
    event: EventName,
    subscriber: SubscriberId,
}

impl Subscription {
    /// Remove this subscription's handler from the dispatcher.
    pub fn dispose(self, dispatcher: &mut Dispatcher) {
        dispatcher.handlers.remove(&(self.event, self.subscriber));
    }
}

type Handler = Box<dyn FnMut(&ServerEvent) + Send>;

/// Subscription registry for inbound events.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<(EventName, SubscriberId), Handler>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event name.
    ///
    /// If this subscriber already has a handler for the event, the new
    /// handler replaces it.
    pub fn subscribe<F>(
        &mut self,
        event: EventName,
        subscriber: SubscriberId,
        handler: F,
    ) -> Subscription
    where
        F: FnMut(&ServerEvent) + Send + 'static,
    {
        if self.handlers.insert((event, subscriber), Box::new(handler)).is_some() {
            tracing::debug!(%event, subscriber, "replacing existing subscription");
        }
        Subscription { event, subscriber }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler subscribed to this event's name.
    ///
    /// Returns the number of handlers invoked. Zero is normal when no
    /// view currently observes the event.
    pub fn dispatch(&mut self, event: &ServerEvent) -> usize {
        let name = event.name();
        let mut invoked = 0;
        for ((registered, _), handler) in &mut self.handlers {
            if *registered == name {
                handler(event);
                invoked += 1;
            }
        }
        invoked
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("handlers", &self.handlers.len()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use banter_proto::RoomAck;

    use super::*;

    fn counter_handler(counter: &Arc<AtomicU32>) -> impl FnMut(&ServerEvent) + Send + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dispatch_reaches_only_matching_subscribers() {
        let mut dispatcher = Dispatcher::new();
        let chat_hits = Arc::new(AtomicU32::new(0));
        let room_hits = Arc::new(AtomicU32::new(0));

        let _chat = dispatcher.subscribe(EventName::ChatCreated, 1, counter_handler(&chat_hits));
        let _room = dispatcher.subscribe(EventName::RoomError, 2, counter_handler(&room_hits));

        let invoked = dispatcher.dispatch(&ServerEvent::ChatCreated { chat_id: 5 });
        assert_eq!(invoked, 1);
        assert_eq!(chat_hits.load(Ordering::SeqCst), 1);
        assert_eq!(room_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn resubscribe_replaces_instead_of_stacking() {
        let mut dispatcher = Dispatcher::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let _a = dispatcher.subscribe(EventName::ReceiveMessage, 1, counter_handler(&first));
        let _b = dispatcher.subscribe(EventName::ReceiveMessage, 1, counter_handler(&second));
        assert_eq!(dispatcher.len(), 1);

        let event = ServerEvent::ReceiveMessage {
            sender_id: 2,
            text: Some("hi".into()),
            attachment: None,
            timestamp: 1_000,
            client_id: None,
        };
        let invoked = dispatcher.dispatch(&event);
        assert_eq!(invoked, 1);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_subscribers_both_observe() {
        let mut dispatcher = Dispatcher::new();
        let sidebar = Arc::new(AtomicU32::new(0));
        let banner = Arc::new(AtomicU32::new(0));

        let _a = dispatcher.subscribe(EventName::RoomError, 10, counter_handler(&sidebar));
        let _b = dispatcher.subscribe(EventName::RoomError, 20, counter_handler(&banner));

        let invoked = dispatcher.dispatch(&ServerEvent::RoomError("full".into()));
        assert_eq!(invoked, 2);
        assert_eq!(sidebar.load(Ordering::SeqCst), 1);
        assert_eq!(banner.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_removes_exactly_one_handler() {
        let mut dispatcher = Dispatcher::new();
        let kept = Arc::new(AtomicU32::new(0));
        let dropped = Arc::new(AtomicU32::new(0));

        let _keep = dispatcher.subscribe(EventName::RoomError, 1, counter_handler(&kept));
        let gone = dispatcher.subscribe(EventName::RoomError, 2, counter_handler(&dropped));
        gone.dispose(&mut dispatcher);

        let invoked = dispatcher.dispatch(&ServerEvent::RoomError("full".into()));
        assert_eq!(invoked, 1);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispatch_with_no_subscribers_is_zero() {
        let mut dispatcher = Dispatcher::new();
        let ack = RoomAck { success: true, message: None };
        assert_eq!(dispatcher.dispatch(&ServerEvent::DeleteRoomResponse(ack)), 0);
    }

    #[test]
    fn routes_cover_every_inbound_event() {
        assert_eq!(Route::of(&ServerEvent::ChatCreated { chat_id: 1 }), Route::Conversation);
        assert_eq!(
            Route::of(&ServerEvent::UpdateUnreadCounts(std::collections::HashMap::new())),
            Route::Unread
        );
        assert_eq!(Route::of(&ServerEvent::RoomError("x".into())), Route::Room);
        assert_eq!(
            Route::of(&ServerEvent::LeftRoomResponse(RoomAck { success: true, message: None })),
            Route::Room
        );
    }
}
