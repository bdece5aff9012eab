use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::attachment::{Attachment, EmbeddedContact, LinkPreview, Quote, Sticker};

/// Mutable view over the attachment-bearing fields shared by a message and
/// each of its edit-history revisions.
pub struct SlotsMut<'a> {
    pub attachments: &'a mut Option<Vec<Attachment>>,
    pub body_attachment: &'a mut Option<Attachment>,
    pub preview: &'a mut Option<Vec<LinkPreview>>,
    pub quote: &'a mut Option<Quote>,
    pub contact: &'a mut Option<Vec<EmbeddedContact>>,
    pub sticker: &'a mut Option<Sticker>,
}

/// Read-only counterpart of [`SlotsMut`].
#[derive(Clone, Copy)]
pub struct Slots<'a> {
    pub attachments: Option<&'a Vec<Attachment>>,
    pub body_attachment: Option<&'a Attachment>,
    pub preview: Option<&'a Vec<LinkPreview>>,
    pub quote: Option<&'a Quote>,
    pub contact: Option<&'a Vec<EmbeddedContact>>,
    pub sticker: Option<&'a Sticker>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHistoryEntry {
    pub timestamp: i64,
    #[serde(rename = "received_at", default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<i64>,
    #[serde(rename = "received_at_ms", default, skip_serializing_if = "Option::is_none")]
    pub received_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Vec<LinkPreview>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<EmbeddedContact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<Sticker>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EditHistoryEntry {
    pub fn slots(&self) -> Slots<'_> {
        Slots {
            attachments: self.attachments.as_ref(),
            body_attachment: self.body_attachment.as_ref(),
            preview: self.preview.as_ref(),
            quote: self.quote.as_ref(),
            contact: self.contact.as_ref(),
            sticker: self.sticker.as_ref(),
        }
    }

    pub fn slots_mut(&mut self) -> SlotsMut<'_> {
        SlotsMut {
            attachments: &mut self.attachments,
            body_attachment: &mut self.body_attachment,
            preview: &mut self.preview,
            quote: &mut self.quote,
            contact: &mut self.contact,
            sticker: &mut self.sticker,
        }
    }
}

/// The message document as callers see it. Fields that have a column of
/// their own are named; everything else rides along in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttributes {
    pub id: String,
    pub conversation_id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(rename = "sent_at")]
    pub sent_at: i64,
    #[serde(rename = "received_at")]
    pub received_at: i64,
    #[serde(rename = "received_at_ms", default, skip_serializing_if = "Option::is_none")]
    pub received_at_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_view_once: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_erased: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_timer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_start_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_attachment: Option<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Vec<LinkPreview>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<Quote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<EmbeddedContact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticker: Option<Sticker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_history: Option<Vec<EditHistoryEntry>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageAttributes {
    pub fn slots(&self) -> Slots<'_> {
        Slots {
            attachments: self.attachments.as_ref(),
            body_attachment: self.body_attachment.as_ref(),
            preview: self.preview.as_ref(),
            quote: self.quote.as_ref(),
            contact: self.contact.as_ref(),
            sticker: self.sticker.as_ref(),
        }
    }

    pub fn slots_mut(&mut self) -> SlotsMut<'_> {
        SlotsMut {
            attachments: &mut self.attachments,
            body_attachment: &mut self.body_attachment,
            preview: &mut self.preview,
            quote: &mut self.quote,
            contact: &mut self.contact,
            sticker: &mut self.sticker,
        }
    }

    pub fn has_attachments(&self) -> bool {
        self.attachments.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn has_visual_media_attachments(&self) -> bool {
        self.attachments
            .as_ref()
            .is_some_and(|a| a.iter().any(Attachment::is_visual_media))
    }

    pub fn has_file_attachments(&self) -> bool {
        self.attachments
            .as_ref()
            .is_some_and(|a| a.iter().any(|att| !att.is_visual_media()))
    }

    /// Copy with every attachment payload removed but every slot kept, so
    /// list positions survive until hydration puts the payloads back.
    pub fn without_attachment_payloads(&self) -> MessageAttributes {
        let mut stripped = self.clone();
        strip_slots(stripped.slots_mut());
        if let Some(history) = stripped.edit_history.as_mut() {
            for entry in history.iter_mut() {
                strip_slots(entry.slots_mut());
            }
        }
        stripped
    }
}

fn strip_slots(slots: SlotsMut<'_>) {
    if let Some(attachments) = slots.attachments.as_mut() {
        attachments.clear();
    }
    *slots.body_attachment = None;
    for preview in slots.preview.iter_mut().flatten() {
        preview.image = None;
    }
    if let Some(quote) = slots.quote.as_mut() {
        for quoted in quote.attachments.iter_mut() {
            quoted.thumbnail = None;
        }
    }
    for contact in slots.contact.iter_mut().flatten() {
        if let Some(avatar) = contact.avatar.as_mut() {
            avatar.avatar = None;
        }
    }
    if let Some(sticker) = slots.sticker.as_mut() {
        sticker.data = None;
    }
}

/// The promoted-column projection of a message: what the `messages` table
/// stores outside of its `json` document.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageRow {
    pub id: String,
    pub json: String,
    pub conversation_id: String,
    pub message_type: String,
    pub sent_at: i64,
    pub received_at: i64,
    pub body: Option<String>,
    pub read_status: Option<i64>,
    pub is_view_once: Option<bool>,
    pub is_erased: Option<bool>,
    pub expire_timer: Option<i64>,
    pub expiration_start_timestamp: Option<i64>,
    pub source: Option<String>,
    pub source_uuid: Option<String>,
    pub source_device: Option<i64>,
    pub server_guid: Option<String>,
    pub schema_version: Option<i64>,
    pub has_attachments: bool,
    pub has_file_attachments: bool,
    pub has_visual_media_attachments: bool,
}

impl MessageRow {
    /// Projects `message` into its row. The stored `json` carries no
    /// attachment payloads.
    pub fn from_attributes(message: &MessageAttributes) -> serde_json::Result<Self> {
        let json = serde_json::to_string(&message.without_attachment_payloads())?;
        Ok(Self {
            id: message.id.clone(),
            json,
            conversation_id: message.conversation_id.clone(),
            message_type: message.message_type.clone(),
            sent_at: message.sent_at,
            received_at: message.received_at,
            body: message.body.clone(),
            read_status: message.read_status,
            is_view_once: message.is_view_once,
            is_erased: message.is_erased,
            expire_timer: message.expire_timer,
            expiration_start_timestamp: message.expiration_start_timestamp,
            source: message.source.clone(),
            source_uuid: message.source_uuid.clone(),
            source_device: message.source_device,
            server_guid: message.server_guid.clone(),
            schema_version: message.schema_version,
            has_attachments: message.has_attachments(),
            has_file_attachments: message.has_file_attachments(),
            has_visual_media_attachments: message.has_visual_media_attachments(),
        })
    }

    pub fn to_attributes(&self) -> serde_json::Result<MessageAttributes> {
        serde_json::from_str(&self.json)
    }
}
