//! Client-resident synchronization engine for the Banter chat protocol.
//!
//! The engine keeps a client's mutable chat state consistent with the
//! server across one socket connection: one-to-one conversations with
//! optimistic local echo, a single group-room session, and per-peer unread
//! counts. It is written Sans-IO in the action pattern: callers feed
//! [`EngineEvent`]s into [`SyncEngine::handle`] and execute the returned
//! [`EngineAction`]s (open/close the transport, emit wire events, repaint
//! views).
//!
//! ```no_run
//! use banter_client::{EngineEvent, SyncEngine};
//! use banter_core::env::SystemEnv;
//!
//! # fn main() -> Result<(), banter_client::EngineError> {
//! let mut engine = SyncEngine::new(SystemEnv, 42);
//! let actions = engine.handle(EngineEvent::Connect)?;
//! // execute actions: open the transport, then feed TransportUp back in
//! # let _ = actions;
//! # Ok(())
//! # }
//! ```
//!
//! The optional `transport` feature provides a tokio/WebSocket driver that
//! executes `Open`/`Emit`/`Close` actions against a real server.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod conversation;
pub mod dispatcher;
pub mod engine;
mod error;
mod event;
pub mod room;
#[cfg(feature = "transport")]
pub mod transport;
pub mod unread;

pub use conversation::{ConversationStore, Delivery, HistoryEntry, Message, Origin};
pub use dispatcher::{Dispatcher, Route, Subscription};
pub use engine::SyncEngine;
pub use error::EngineError;
pub use event::{EngineAction, EngineEvent};
pub use room::{RoomLifecycle, RoomMessage, RoomSession, Visibility};
pub use unread::UnreadTracker;
