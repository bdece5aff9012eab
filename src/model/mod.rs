//! Document types stored in and hydrated from the database.

mod attachment;
mod message;

pub use attachment::{
    Attachment, AttachmentThumbnail, AttachmentType, ContactAvatar, EmbeddedContact, LinkPreview,
    Quote, QuotedAttachment, Sticker, ROOT_EDIT_HISTORY_INDEX,
};
pub use message::{EditHistoryEntry, MessageAttributes, MessageRow, Slots, SlotsMut};

#[cfg(test)]
mod model_tests;
