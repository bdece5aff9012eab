use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a `message_attachments` row sits inside its message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentType {
    Attachment,
    LongMessage,
    Quote,
    Preview,
    Contact,
    Sticker,
}

impl AttachmentType {
    pub const ALL: [AttachmentType; 6] = [
        AttachmentType::Attachment,
        AttachmentType::LongMessage,
        AttachmentType::Quote,
        AttachmentType::Preview,
        AttachmentType::Contact,
        AttachmentType::Sticker,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AttachmentType::Attachment => "attachment",
            AttachmentType::LongMessage => "long-message",
            AttachmentType::Quote => "quote",
            AttachmentType::Preview => "preview",
            AttachmentType::Contact => "contact",
            AttachmentType::Sticker => "sticker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

/// Edit-history index used for the current revision of a message.
pub const ROOT_EDIT_HISTORY_INDEX: i64 = -1;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentThumbnail {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Public attachment shape. Every field is optional; absent values are left
/// out of the serialized form rather than written as `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_cdn_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<AttachmentThumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<AttachmentThumbnail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_from_backup: Option<AttachmentThumbnail>,

    /// Story text attachments are kept as an opaque JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_attachment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_backup_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_too_big: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_corrupted: Option<bool>,
    /// Set on quote thumbnails copied from the quoted message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
}

impl Attachment {
    pub fn is_visual_media(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/") || t.starts_with("video/"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Attachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub attachments: Vec<QuotedAttachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreview {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Attachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactAvatar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Attachment>,
    #[serde(default)]
    pub is_profile: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<ContactAvatar>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sticker {
    #[serde(default)]
    pub pack_id: String,
    #[serde(default)]
    pub sticker_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Attachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
