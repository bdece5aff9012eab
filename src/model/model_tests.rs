use serde_json::json;

use super::*;

#[test]
fn unknown_fields_survive_a_document_round_trip() {
    let raw = json!({
        "id": "m1",
        "conversationId": "c1",
        "type": "incoming",
        "sent_at": 10,
        "received_at": 11,
        "body": "hi",
        "reactions": [{"emoji": "x"}],
        "preview": [{"url": "https://example.org", "image": {"contentType": "image/png"}, "date": 5}]
    });

    let message: MessageAttributes = serde_json::from_value(raw.clone()).expect("parse");
    assert_eq!(message.message_type, "incoming");
    assert!(message.extra.contains_key("reactions"));
    let preview = message.preview.as_ref().expect("preview");
    assert_eq!(preview[0].extra.get("date"), Some(&json!(5)));

    let back = serde_json::to_value(&message).expect("serialize");
    assert_eq!(back, raw);
}

#[test]
fn stored_document_keeps_slots_without_payloads() {
    let mut message = MessageAttributes {
        id: "m1".to_string(),
        conversation_id: "c1".to_string(),
        message_type: "outgoing".to_string(),
        attachments: Some(vec![Attachment {
            content_type: Some("image/jpeg".to_string()),
            ..Attachment::default()
        }]),
        preview: Some(vec![LinkPreview {
            url: "https://example.org".to_string(),
            image: Some(Attachment::default()),
            ..LinkPreview::default()
        }]),
        sticker: Some(Sticker {
            pack_id: "p".to_string(),
            sticker_id: 3,
            data: Some(Attachment::default()),
            ..Sticker::default()
        }),
        ..MessageAttributes::default()
    };
    message.body_attachment = Some(Attachment::default());

    let row = MessageRow::from_attributes(&message).expect("row");
    assert!(row.has_attachments);
    assert!(row.has_visual_media_attachments);
    assert!(!row.has_file_attachments);

    let stored = row.to_attributes().expect("stored");
    assert_eq!(stored.attachments, Some(vec![]));
    assert_eq!(stored.body_attachment, None);
    let preview = stored.preview.expect("preview slot kept");
    assert_eq!(preview[0].url, "https://example.org");
    assert_eq!(preview[0].image, None);
    let sticker = stored.sticker.expect("sticker slot kept");
    assert_eq!(sticker.sticker_id, 3);
    assert_eq!(sticker.data, None);
}

#[test]
fn attachment_type_names_round_trip() {
    for t in AttachmentType::ALL {
        assert_eq!(AttachmentType::parse(t.as_str()), Some(t));
    }
    assert_eq!(AttachmentType::parse("avatar"), None);
}
