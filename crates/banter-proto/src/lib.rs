//! Wire event surface for the Banter protocol.
//!
//! The server speaks a name-plus-JSON event protocol over a single
//! bidirectional connection: every message is an [`Envelope`] carrying an
//! event name and a JSON payload whose shape depends on the name. This crate
//! defines the typed forms of both directions ([`ClientEvent`] outbound,
//! [`ServerEvent`] inbound) and the codec between them and the envelope.
//!
//! Field names on the wire are authoritative for interop and are preserved
//! exactly, including the server's mixed camelCase/lowercase conventions
//! (`senderId` but `roomid`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod event;
mod types;

pub use codec::{DecodeError, Envelope};
pub use event::{ClientEvent, EventName, RoomAck, ServerEvent};
pub use types::{Attachment, ChatId, Member, MimeCategory, RoomId, UserId};
