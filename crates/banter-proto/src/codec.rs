//! JSON envelope codec.
//!
//! Every transport message is an [`Envelope`]: an event name plus a JSON
//! payload whose shape depends on the name. Object payloads keep the
//! server's original field spellings; the room membership operations
//! (`joinRoom`, `sendRoomMessage`, `leaveRoom`, `deleteRoom`) carry
//! positional arguments and are encoded as JSON arrays.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    event::{ClientEvent, EventName, RoomAck, ServerEvent},
    types::{Attachment, ChatId, MimeCategory, UserId},
};

/// Decode failures for inbound envelopes.
///
/// These are per-event failures: the engine logs them and drops the event,
/// it never tears down the session over one bad payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message was not a valid envelope at all.
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// The event name is not part of the inbound surface.
    #[error("unknown event: {name}")]
    UnknownEvent {
        /// Event name as received.
        name: String,
    },

    /// The payload did not match the shape this event requires.
    #[error("bad payload for {event}: {reason}")]
    Payload {
        /// Event the payload arrived under.
        event: EventName,
        /// What was wrong with it.
        reason: String,
    },
}

impl DecodeError {
    fn payload(event: EventName, reason: impl std::fmt::Display) -> Self {
        Self::Payload { event, reason: reason.to_string() }
    }
}

/// One transport message: event name plus JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire event name.
    pub event: String,

    /// Event payload. Shape depends on `event`.
    pub data: Value,
}

impl Envelope {
    /// Serialize to the JSON text sent over the transport.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an envelope from transport JSON text.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Wire shape shared by `sendMessage` and `receiveMessage`.
///
/// `receiverId`, `chatId`, and `clientId` are only present outbound (or when
/// the server reflects them); attachment fields are present when `isFile`.
#[derive(Debug, Serialize, Deserialize)]
struct DirectMessageWire {
    #[serde(rename = "senderId")]
    sender_id: UserId,
    #[serde(rename = "receiverId", default, skip_serializing_if = "Option::is_none")]
    receiver_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "isFile", default)]
    is_file: bool,
    #[serde(rename = "fileData", default, skip_serializing_if = "Option::is_none")]
    file_data: Option<String>,
    #[serde(rename = "fileType", default, skip_serializing_if = "Option::is_none")]
    file_type: Option<MimeCategory>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    timestamp: u64,
    #[serde(rename = "chatId", default, skip_serializing_if = "Option::is_none")]
    chat_id: Option<ChatId>,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    client_id: Option<u64>,
}

impl DirectMessageWire {
    fn attachment(&self, event: EventName) -> Result<Option<Attachment>, DecodeError> {
        if !self.is_file {
            return Ok(None);
        }

        let encoded = self
            .file_data
            .as_deref()
            .ok_or_else(|| DecodeError::payload(event, "isFile set without fileData"))?;
        let data = BASE64.decode(encoded).map_err(|e| DecodeError::payload(event, e))?;
        let mime = self
            .file_type
            .ok_or_else(|| DecodeError::payload(event, "isFile set without fileType"))?;
        let file_name = self.file_name.clone().unwrap_or_else(|| "download.bin".to_string());

        Ok(Some(Attachment { data, mime, file_name }))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCreatedWire {
    #[serde(rename = "chatId")]
    chat_id: ChatId,
}

#[derive(Debug, Deserialize)]
struct RoomCreatedWire {
    #[serde(rename = "roomid")]
    room_id: u64,
    #[serde(rename = "roomName")]
    room_name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "createdBy")]
    created_by: UserId,
    #[serde(default)]
    members: Vec<crate::types::Member>,
}

#[derive(Debug, Deserialize)]
struct RoomInfoWire {
    #[serde(rename = "chatroomname")]
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RoomMessageWire {
    #[serde(rename = "userid")]
    user_id: UserId,
    username: String,
    message: String,
    timestamp: u64,
}

impl ClientEvent {
    /// Encode this event into its transport envelope.
    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            Self::Join { user_id } => json!(user_id),
            Self::StartChat { sender_id, receiver_id } => {
                json!({ "senderId": sender_id, "receiverId": receiver_id })
            },
            Self::SendMessage {
                sender_id,
                receiver_id,
                text,
                attachment,
                timestamp,
                chat_id,
                client_id,
            } => {
                let wire = DirectMessageWire {
                    sender_id: *sender_id,
                    receiver_id: Some(*receiver_id),
                    text: text.clone(),
                    is_file: attachment.is_some(),
                    file_data: attachment.as_ref().map(|a| BASE64.encode(&a.data)),
                    file_type: attachment.as_ref().map(|a| a.mime),
                    file_name: attachment.as_ref().map(|a| a.file_name.clone()),
                    timestamp: *timestamp,
                    chat_id: *chat_id,
                    client_id: Some(*client_id),
                };
                // Serializing a plain struct of JSON-safe fields cannot fail.
                serde_json::to_value(wire).unwrap_or(Value::Null)
            },
            Self::MarkMessagesAsRead { sender_id, receiver_id } => {
                json!({ "senderId": sender_id, "receiverId": receiver_id })
            },
            Self::CreateRoom { created_by, is_public, room_description } => json!({
                "createdBy": created_by,
                "isPublic": is_public,
                "roomDescription": room_description,
            }),
            Self::JoinRoom { room_id, user_id } => json!([room_id, user_id]),
            Self::SendRoomMessage { room_id, user_id, message } => {
                json!([room_id, user_id, message])
            },
            Self::LeaveRoom { room_id, user_id } => json!([room_id, user_id]),
            Self::DeleteRoom { room_id, user_id } => json!([room_id, user_id]),
        };

        Envelope { event: self.name().to_string(), data }
    }
}

impl ServerEvent {
    /// Decode an inbound envelope into its typed form.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, DecodeError> {
        let name = EventName::parse(&envelope.event)
            .ok_or(DecodeError::UnknownEvent { name: envelope.event.clone() })?;
        let data = envelope.data;

        let parse = |e: serde_json::Error| DecodeError::payload(name, e);

        match name {
            EventName::ChatCreated => {
                let wire: ChatCreatedWire = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::ChatCreated { chat_id: wire.chat_id })
            },
            EventName::ReceiveMessage => {
                let wire: DirectMessageWire = serde_json::from_value(data).map_err(parse)?;
                let attachment = wire.attachment(name)?;
                Ok(Self::ReceiveMessage {
                    sender_id: wire.sender_id,
                    text: wire.text,
                    attachment,
                    timestamp: wire.timestamp,
                    client_id: wire.client_id,
                })
            },
            EventName::UpdateUnreadCounts => {
                let counts = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::UpdateUnreadCounts(counts))
            },
            EventName::RoomCreated => {
                let wire: RoomCreatedWire = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::RoomCreated {
                    room_id: wire.room_id,
                    room_name: wire.room_name,
                    description: wire.description,
                    created_by: wire.created_by,
                    members: wire.members,
                })
            },
            EventName::RoomInfo => {
                let wire: RoomInfoWire = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::RoomInfo { name: wire.name, description: wire.description })
            },
            EventName::JoinedRoomMembers => {
                Ok(Self::JoinedRoomMembers(serde_json::from_value(data).map_err(parse)?))
            },
            EventName::LeftRoomMembers => {
                Ok(Self::LeftRoomMembers(serde_json::from_value(data).map_err(parse)?))
            },
            EventName::ReceiveRoomMessage => {
                let wire: RoomMessageWire = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::ReceiveRoomMessage {
                    user_id: wire.user_id,
                    username: wire.username,
                    message: wire.message,
                    timestamp: wire.timestamp,
                })
            },
            EventName::LeftRoomResponse => {
                let ack: RoomAck = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::LeftRoomResponse(ack))
            },
            EventName::DeleteRoomResponse => {
                let ack: RoomAck = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::DeleteRoomResponse(ack))
            },
            EventName::RoomError => {
                let reason: String = serde_json::from_value(data).map_err(parse)?;
                Ok(Self::RoomError(reason))
            },
        }
    }
}
