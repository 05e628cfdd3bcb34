//! Shared wire types.

use serde::{Deserialize, Serialize};

/// Stable user identifier assigned by the account service.
pub type UserId = u64;

/// Room identifier assigned by the server on room creation.
pub type RoomId = u64;

/// One-to-one channel identifier assigned by the server, used by the
/// history collaborator to look up past messages.
pub type ChatId = u64;

/// Room-scoped snapshot of a user.
///
/// Non-owning: the roster is replaced wholesale on every roster-changed
/// event, so there is no identity to preserve across updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable user ID.
    #[serde(rename = "userid")]
    pub user_id: UserId,

    /// Display name.
    pub username: String,

    /// Avatar reference (URL or data reference). `None` if the user has no
    /// avatar set.
    #[serde(rename = "profilephoto", skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

/// Declared category of an attachment payload.
///
/// The engine treats attachment bytes as opaque; the category is carried so
/// receivers can decide how to present the payload without sniffing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    /// Still image formats.
    Image,
    /// Video formats.
    Video,
    /// Office documents and PDFs.
    Document,
    /// Zip and other archive formats.
    Archive,
    /// Executable formats.
    Executable,
}

/// Opaque attachment carried inside a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Raw payload bytes. Base64-encoded on the wire.
    pub data: Vec<u8>,

    /// Declared mime category.
    pub mime: MimeCategory,

    /// Original file name, used as the message body stand-in when the
    /// message has no text.
    pub file_name: String,
}
