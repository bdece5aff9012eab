use msgstore::config::StoreConfig;
use msgstore::model::{
    Attachment, ContactAvatar, EditHistoryEntry, EmbeddedContact, LinkPreview, MessageAttributes,
    Quote, QuotedAttachment, Sticker,
};
use msgstore::store::Store;

fn file(path: &str, content_type: &str) -> Attachment {
    Attachment {
        content_type: Some(content_type.to_string()),
        path: Some(path.to_string()),
        size: Some(128),
        ..Attachment::default()
    }
}

fn preview(url: &str, image: Option<Attachment>) -> LinkPreview {
    LinkPreview {
        url: url.to_string(),
        image,
        ..LinkPreview::default()
    }
}

fn quote(thumbnails: Vec<Option<Attachment>>) -> Quote {
    Quote {
        attachments: thumbnails
            .into_iter()
            .map(|thumbnail| QuotedAttachment {
                content_type: Some("image/jpeg".to_string()),
                thumbnail,
                ..QuotedAttachment::default()
            })
            .collect(),
        ..Quote::default()
    }
}

fn contact(avatar: &str) -> EmbeddedContact {
    EmbeddedContact {
        avatar: Some(ContactAvatar {
            avatar: Some(file(avatar, "image/png")),
            is_profile: true,
        }),
        ..EmbeddedContact::default()
    }
}

fn fully_loaded_message() -> MessageAttributes {
    MessageAttributes {
        id: "m1".to_string(),
        conversation_id: "c1".to_string(),
        message_type: "outgoing".to_string(),
        sent_at: 1_000,
        received_at: 1_001,
        received_at_ms: Some(1_001_000),
        body: Some("final text".to_string()),
        attachments: Some(vec![
            file("a0", "image/jpeg"),
            file("a1", "video/mp4"),
            file("a2", "application/pdf"),
        ]),
        body_attachment: Some(file("long", "text/x-signal-plain")),
        preview: Some(vec![
            preview("https://one.example", None),
            preview("https://two.example", Some(file("p1", "image/png"))),
        ]),
        quote: Some(quote(vec![Some(file("q0", "image/jpeg")), None, Some(file("q2", "image/jpeg"))])),
        contact: Some(vec![contact("c0"), contact("c1")]),
        sticker: Some(Sticker {
            pack_id: "pack".to_string(),
            sticker_id: 4,
            data: Some(file("s0", "image/webp")),
            ..Sticker::default()
        }),
        edit_history: Some(vec![
            EditHistoryEntry {
                timestamp: 1_000,
                body: Some("final text".to_string()),
                attachments: Some(vec![file("a0", "image/jpeg"), file("e0-1", "image/jpeg")]),
                ..EditHistoryEntry::default()
            },
            EditHistoryEntry {
                timestamp: 900,
                received_at: Some(901),
                body: Some("first text".to_string()),
                attachments: Some(vec![file("e1-0", "image/gif")]),
                preview: Some(vec![preview("https://old.example", Some(file("e1-p0", "image/png")))]),
                quote: Some(quote(vec![Some(file("e1-q0", "image/jpeg"))])),
                ..EditHistoryEntry::default()
            },
        ]),
        ..MessageAttributes::default()
    }
}

#[tokio::test]
async fn hydration_restores_every_slot_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = Store::initialize(temp.path(), "pw", StoreConfig::for_test())
        .await
        .expect("initialize");

    let original = fully_loaded_message();
    let plain = MessageAttributes {
        id: "m2".to_string(),
        conversation_id: "c1".to_string(),
        message_type: "incoming".to_string(),
        sent_at: 500,
        received_at: 501,
        body: Some("no attachments".to_string()),
        ..MessageAttributes::default()
    };
    store
        .save_messages(vec![original.clone(), plain.clone()])
        .await
        .expect("save");

    let page = store
        .get_messages_by_conversation("c1", 10, None)
        .await
        .expect("page");
    assert_eq!(page, vec![original.clone(), plain]);

    let references = store
        .get_attachment_references_for_messages(vec!["m1".to_string(), "m2".to_string()])
        .await
        .expect("references");
    // 3 attachments + long message + 1 preview + 2 quote thumbnails + 2
    // contacts + sticker at the root, 2 + 3 in the revisions.
    assert_eq!(references.len(), 15);
    assert!(references.iter().all(|r| r.message_id == "m1"));

    store.close().await.expect("close");
}
