use super::*;
use crate::model::{EditHistoryEntry, LinkPreview, Quote, QuotedAttachment, Sticker};

fn open_test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = open(dir.path(), None, &StoreConfig::for_test()).expect("open");
    (dir, conn)
}

fn file(path: &str) -> Attachment {
    Attachment {
        content_type: Some("image/jpeg".to_string()),
        path: Some(path.to_string()),
        size: Some(100),
        ..Attachment::default()
    }
}

fn base_message() -> MessageAttributes {
    MessageAttributes {
        id: "m1".to_string(),
        conversation_id: "c1".to_string(),
        message_type: "outgoing".to_string(),
        sent_at: 100,
        received_at: 200,
        received_at_ms: Some(200_000),
        ..MessageAttributes::default()
    }
}

#[test]
fn references_cover_every_slot_and_skip_empty_ones() {
    let mut message = base_message();
    message.attachments = Some(vec![file("a0"), file("a1")]);
    message.preview = Some(vec![
        LinkPreview {
            url: "https://no-image.example".to_string(),
            ..LinkPreview::default()
        },
        LinkPreview {
            url: "https://image.example".to_string(),
            image: Some(file("p1")),
            ..LinkPreview::default()
        },
    ]);
    message.quote = Some(Quote {
        attachments: vec![QuotedAttachment {
            content_type: Some("image/jpeg".to_string()),
            thumbnail: Some(file("q0")),
            ..QuotedAttachment::default()
        }],
        ..Quote::default()
    });
    message.edit_history = Some(vec![EditHistoryEntry {
        timestamp: 150,
        received_at: Some(250),
        attachments: Some(vec![file("e0")]),
        ..EditHistoryEntry::default()
    }]);

    let refs = attachment_references(&message);
    let summary: Vec<(i64, AttachmentType, i64, Option<&str>)> = refs
        .iter()
        .map(|r| {
            (
                r.edit_history_index,
                r.attachment_type,
                r.order_in_message,
                r.attachment.path.as_deref(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (-1, AttachmentType::Attachment, 0, Some("a0")),
            (-1, AttachmentType::Attachment, 1, Some("a1")),
            (-1, AttachmentType::Preview, 1, Some("p1")),
            (-1, AttachmentType::Quote, 0, Some("q0")),
            (0, AttachmentType::Attachment, 0, Some("e0")),
        ]
    );

    let edit = &refs[4];
    assert_eq!(edit.sent_at, 150);
    assert_eq!(edit.received_at, 250);
    assert_eq!(edit.received_at_ms, Some(200_000));
}

#[test]
fn flags_and_thumbnails_survive_the_row_form() {
    let (_dir, conn) = open_test_db();
    let mut message = base_message();
    message.is_view_once = Some(true);
    message.attachments = Some(vec![Attachment {
        error: Some(true),
        pending: Some(false),
        cdn_key: Some("cdn-key".to_string()),
        cdn_number: Some(3),
        chunk_size: Some(4096),
        thumbnail: Some(AttachmentThumbnail {
            path: "thumbs/1".to_string(),
            size: Some(12),
            ..AttachmentThumbnail::default()
        }),
        text_attachment: Some(serde_json::json!({"text": "story"})),
        ..file("a0")
    }]);
    save_message(&conn, &message).expect("save");

    let refs = get_attachment_references_for_messages(&conn, &["m1".to_string()]).expect("refs");
    assert_eq!(refs.len(), 1);
    let stored = &refs[0];
    assert!(stored.is_view_once);
    assert_eq!(stored.attachment.error, Some(true));
    assert_eq!(stored.attachment.pending, Some(false));
    assert_eq!(stored.attachment.was_too_big, None);
    assert_eq!(stored.attachment.cdn_key.as_deref(), Some("cdn-key"));
    assert_eq!(stored.attachment.chunk_size, Some(4096));
    assert_eq!(
        stored.attachment.thumbnail.as_ref().map(|t| t.path.as_str()),
        Some("thumbs/1")
    );
    assert_eq!(stored.attachment.screenshot, None);
    assert_eq!(
        stored.attachment.text_attachment,
        Some(serde_json::json!({"text": "story"}))
    );
}

#[test]
fn json_column_holds_no_payloads() {
    let (_dir, conn) = open_test_db();
    let mut message = base_message();
    message.attachments = Some(vec![file("a0")]);
    message.sticker = Some(Sticker {
        pack_id: "pack".to_string(),
        sticker_id: 7,
        data: Some(file("s0")),
        ..Sticker::default()
    });
    save_message(&conn, &message).expect("save");

    let json: String = conn
        .query_row("SELECT json FROM messages WHERE id = 'm1'", [], |row| row.get(0))
        .expect("json");
    assert!(!json.contains("a0"));
    assert!(!json.contains("s0"));

    let hydrated = get_message_by_id(&conn, "m1").expect("get").expect("exists");
    assert_eq!(hydrated, message);
}

#[test]
fn rows_without_a_slot_are_ignored() {
    let (_dir, conn) = open_test_db();
    let mut message = base_message();
    message.preview = Some(vec![LinkPreview {
        url: "https://example.org".to_string(),
        image: Some(file("p0")),
        ..LinkPreview::default()
    }]);
    save_message(&conn, &message).expect("save");
    conn.execute(
        "UPDATE message_attachments SET orderInMessage = 5 WHERE attachmentType = 'preview'",
        [],
    )
    .expect("move row");

    let hydrated = get_message_by_id(&conn, "m1").expect("get").expect("exists");
    let preview = hydrated.preview.expect("preview slot");
    assert_eq!(preview.len(), 1);
    assert_eq!(preview[0].image, None);
}

#[test]
fn resave_replaces_attachment_rows() {
    let (_dir, conn) = open_test_db();
    let mut message = base_message();
    message.attachments = Some(vec![file("a0"), file("a1")]);
    save_message(&conn, &message).expect("save");

    message.attachments = Some(vec![file("b0")]);
    save_message(&conn, &message).expect("resave");

    let refs = get_attachment_references_for_messages(&conn, &["m1".to_string()]).expect("refs");
    let paths: Vec<Option<&str>> = refs.iter().map(|r| r.attachment.path.as_deref()).collect();
    assert_eq!(paths, vec![Some("b0")]);
}
