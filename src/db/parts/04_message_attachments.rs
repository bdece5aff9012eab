/// One `message_attachments` row: an attachment plus where it sits.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentReference {
    pub message_id: String,
    pub message_type: String,
    pub conversation_id: String,
    pub edit_history_index: i64,
    pub attachment_type: AttachmentType,
    pub order_in_message: i64,
    pub sent_at: i64,
    pub received_at: i64,
    pub received_at_ms: Option<i64>,
    pub is_view_once: bool,
    pub attachment: Attachment,
}

const THUMBNAIL_COLUMNS: [&str; 5] = [
    "thumbnailPath",
    "thumbnailSize",
    "thumbnailContentType",
    "thumbnailLocalKey",
    "thumbnailVersion",
];
const SCREENSHOT_COLUMNS: [&str; 5] = [
    "screenshotPath",
    "screenshotSize",
    "screenshotContentType",
    "screenshotLocalKey",
    "screenshotVersion",
];
const BACKUP_THUMBNAIL_COLUMNS: [&str; 5] = [
    "backupThumbnailPath",
    "backupThumbnailSize",
    "backupThumbnailContentType",
    "backupThumbnailLocalKey",
    "backupThumbnailVersion",
];

/// Every attachment carried by one revision, with its slot type and index.
/// Slots without a payload produce nothing.
fn slot_attachments(slots: Slots<'_>) -> Vec<(AttachmentType, i64, &Attachment)> {
    let mut out = Vec::new();
    let indexed = |i: usize| i64::try_from(i).unwrap_or(i64::MAX);

    for (i, attachment) in slots.attachments.into_iter().flatten().enumerate() {
        out.push((AttachmentType::Attachment, indexed(i), attachment));
    }
    if let Some(attachment) = slots.body_attachment {
        out.push((AttachmentType::LongMessage, 0, attachment));
    }
    for (i, preview) in slots.preview.into_iter().flatten().enumerate() {
        if let Some(image) = preview.image.as_ref() {
            out.push((AttachmentType::Preview, indexed(i), image));
        }
    }
    if let Some(quote) = slots.quote {
        for (i, quoted) in quote.attachments.iter().enumerate() {
            if let Some(thumbnail) = quoted.thumbnail.as_ref() {
                out.push((AttachmentType::Quote, indexed(i), thumbnail));
            }
        }
    }
    for (i, contact) in slots.contact.into_iter().flatten().enumerate() {
        if let Some(avatar) = contact.avatar.as_ref().and_then(|a| a.avatar.as_ref()) {
            out.push((AttachmentType::Contact, indexed(i), avatar));
        }
    }
    if let Some(data) = slots.sticker.and_then(|s| s.data.as_ref()) {
        out.push((AttachmentType::Sticker, 0, data));
    }
    out
}

/// Explodes a message and each of its edit revisions into attachment rows.
pub fn attachment_references(message: &MessageAttributes) -> Vec<AttachmentReference> {
    let is_view_once = message.is_view_once.unwrap_or(false);
    let reference = |edit_history_index: i64,
                     sent_at: i64,
                     received_at: i64,
                     received_at_ms: Option<i64>,
                     (attachment_type, order_in_message, attachment): (
        AttachmentType,
        i64,
        &Attachment,
    )| AttachmentReference {
        message_id: message.id.clone(),
        message_type: message.message_type.clone(),
        conversation_id: message.conversation_id.clone(),
        edit_history_index,
        attachment_type,
        order_in_message,
        sent_at,
        received_at,
        received_at_ms,
        is_view_once,
        attachment: attachment.clone(),
    };

    let mut out: Vec<AttachmentReference> = slot_attachments(message.slots())
        .into_iter()
        .map(|slot| {
            reference(
                ROOT_EDIT_HISTORY_INDEX,
                message.sent_at,
                message.received_at,
                message.received_at_ms,
                slot,
            )
        })
        .collect();

    for (i, entry) in message.edit_history.iter().flatten().enumerate() {
        let index = i64::try_from(i).unwrap_or(i64::MAX);
        let received_at = entry.received_at.unwrap_or(message.received_at);
        let received_at_ms = entry.received_at_ms.or(message.received_at_ms);
        out.extend(
            slot_attachments(entry.slots())
                .into_iter()
                .map(|slot| reference(index, entry.timestamp, received_at, received_at_ms, slot)),
        );
    }
    out
}

fn push_thumbnail(
    values: &mut Vec<(&'static str, SqlValue)>,
    columns: [&'static str; 5],
    thumbnail: Option<&AttachmentThumbnail>,
) {
    let [path, size, content_type, local_key, version] = columns;
    values.push((path, thumbnail.map(|t| t.path.clone()).into_sql_value()));
    values.push((size, thumbnail.and_then(|t| t.size).into_sql_value()));
    values.push((
        content_type,
        thumbnail.and_then(|t| t.content_type.clone()).into_sql_value(),
    ));
    values.push((local_key, thumbnail.and_then(|t| t.local_key.clone()).into_sql_value()));
    values.push((version, thumbnail.and_then(|t| t.version).into_sql_value()));
}

fn reference_values(reference: &AttachmentReference) -> Vec<(&'static str, SqlValue)> {
    let a = &reference.attachment;
    let mut values: Vec<(&'static str, SqlValue)> = vec![
        ("messageId", reference.message_id.clone().into_sql_value()),
        ("messageType", reference.message_type.clone().into_sql_value()),
        ("editHistoryIndex", reference.edit_history_index.into_sql_value()),
        ("attachmentType", reference.attachment_type.as_str().into_sql_value()),
        ("orderInMessage", reference.order_in_message.into_sql_value()),
        ("conversationId", reference.conversation_id.clone().into_sql_value()),
        ("sentAt", reference.sent_at.into_sql_value()),
        ("receivedAt", reference.received_at.into_sql_value()),
        ("receivedAtMs", reference.received_at_ms.into_sql_value()),
        ("clientUuid", a.client_uuid.clone().into_sql_value()),
        ("size", a.size.into_sql_value()),
        ("duration", a.duration.into_sql_value()),
        ("contentType", a.content_type.clone().into_sql_value()),
        ("path", a.path.clone().into_sql_value()),
        ("localKey", a.local_key.clone().into_sql_value()),
        ("plaintextHash", a.plaintext_hash.clone().into_sql_value()),
        ("caption", a.caption.clone().into_sql_value()),
        ("blurHash", a.blur_hash.clone().into_sql_value()),
        ("height", a.height.into_sql_value()),
        ("width", a.width.into_sql_value()),
        ("digest", a.digest.clone().into_sql_value()),
        ("key", a.key.clone().into_sql_value()),
        ("fileName", a.file_name.clone().into_sql_value()),
        ("downloadPath", a.download_path.clone().into_sql_value()),
        ("transitCdnKey", a.cdn_key.clone().into_sql_value()),
        ("transitCdnNumber", a.cdn_number.into_sql_value()),
        ("transitCdnUploadTimestamp", a.upload_timestamp.into_sql_value()),
        ("backupCdnNumber", a.backup_cdn_number.into_sql_value()),
        ("incrementalMac", a.incremental_mac.clone().into_sql_value()),
        ("incrementalMacChunkSize", a.chunk_size.into_sql_value()),
    ];
    push_thumbnail(&mut values, THUMBNAIL_COLUMNS, a.thumbnail.as_ref());
    push_thumbnail(&mut values, SCREENSHOT_COLUMNS, a.screenshot.as_ref());
    push_thumbnail(&mut values, BACKUP_THUMBNAIL_COLUMNS, a.thumbnail_from_backup.as_ref());
    values.extend([
        (
            "storyTextAttachmentJson",
            a.text_attachment.as_ref().map(Value::to_string).into_sql_value(),
        ),
        ("localBackupPath", a.local_backup_path.clone().into_sql_value()),
        ("flags", a.flags.into_sql_value()),
        ("error", a.error.into_sql_value()),
        ("wasTooBig", a.was_too_big.into_sql_value()),
        ("backfillError", a.backfill_error.into_sql_value()),
        ("isCorrupted", a.is_corrupted.into_sql_value()),
        ("isViewOnce", reference.is_view_once.into_sql_value()),
        ("copiedFromQuotedAttachment", a.copied.into_sql_value()),
        ("version", a.version.into_sql_value()),
        ("pending", a.pending.into_sql_value()),
    ]);
    values
}

pub fn save_attachment_reference(conn: &Connection, reference: &AttachmentReference) -> Result<()> {
    let values = reference_values(reference);
    let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = format!(
        "INSERT OR REPLACE INTO message_attachments ({}) VALUES ({placeholders})",
        columns.join(", ")
    );
    conn.prepare_cached(&sql)?
        .execute(params_from_iter(values.into_iter().map(|(_, value)| value)))?;
    Ok(())
}

/// Replaces every attachment row of `message`. Called inside the message
/// save transaction.
pub fn save_message_attachments(conn: &Connection, message: &MessageAttributes) -> Result<()> {
    conn.execute(
        "DELETE FROM message_attachments WHERE messageId = ?1",
        params![message.id],
    )?;
    for reference in attachment_references(message) {
        save_attachment_reference(conn, &reference)?;
    }
    Ok(())
}

fn thumbnail_from_row(
    row: &Row<'_>,
    columns: [&'static str; 5],
) -> rusqlite::Result<Option<AttachmentThumbnail>> {
    let [path, size, content_type, local_key, version] = columns;
    let Some(path) = row.get::<_, Option<String>>(path)? else {
        return Ok(None);
    };
    Ok(Some(AttachmentThumbnail {
        path,
        size: row.get(size)?,
        content_type: row.get(content_type)?,
        local_key: row.get(local_key)?,
        version: row.get(version)?,
    }))
}

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    let flag = |name: &str| -> rusqlite::Result<Option<bool>> {
        Ok(row.get::<_, Option<i64>>(name)?.map(|v| v != 0))
    };
    let text_attachment = row
        .get::<_, Option<String>>("storyTextAttachmentJson")?
        .and_then(|json| serde_json::from_str(&json).ok());

    Ok(Attachment {
        client_uuid: row.get("clientUuid")?,
        size: row.get("size")?,
        duration: row.get("duration")?,
        content_type: row.get("contentType")?,
        path: row.get("path")?,
        local_key: row.get("localKey")?,
        plaintext_hash: row.get("plaintextHash")?,
        caption: row.get("caption")?,
        blur_hash: row.get("blurHash")?,
        height: row.get("height")?,
        width: row.get("width")?,
        digest: row.get("digest")?,
        key: row.get("key")?,
        file_name: row.get("fileName")?,
        download_path: row.get("downloadPath")?,
        cdn_key: row.get("transitCdnKey")?,
        cdn_number: row.get("transitCdnNumber")?,
        upload_timestamp: row.get("transitCdnUploadTimestamp")?,
        backup_cdn_number: row.get("backupCdnNumber")?,
        incremental_mac: row.get("incrementalMac")?,
        chunk_size: row.get("incrementalMacChunkSize")?,
        thumbnail: thumbnail_from_row(row, THUMBNAIL_COLUMNS)?,
        screenshot: thumbnail_from_row(row, SCREENSHOT_COLUMNS)?,
        thumbnail_from_backup: thumbnail_from_row(row, BACKUP_THUMBNAIL_COLUMNS)?,
        text_attachment,
        local_backup_path: row.get("localBackupPath")?,
        flags: row.get("flags")?,
        error: flag("error")?,
        was_too_big: flag("wasTooBig")?,
        backfill_error: flag("backfillError")?,
        is_corrupted: flag("isCorrupted")?,
        copied: flag("copiedFromQuotedAttachment")?,
        version: row.get("version")?,
        pending: flag("pending")?,
    })
}

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<Option<AttachmentReference>> {
    let message_id: String = row.get("messageId")?;
    let raw_type: String = row.get("attachmentType")?;
    let Some(attachment_type) = AttachmentType::parse(&raw_type) else {
        tracing::warn!(message_id = %message_id, attachment_type = %raw_type, "unknown attachment type");
        return Ok(None);
    };
    Ok(Some(AttachmentReference {
        message_id,
        message_type: row.get("messageType")?,
        conversation_id: row.get("conversationId")?,
        edit_history_index: row.get("editHistoryIndex")?,
        attachment_type,
        order_in_message: row.get("orderInMessage")?,
        sent_at: row.get("sentAt")?,
        received_at: row.get("receivedAt")?,
        received_at_ms: row.get("receivedAtMs")?,
        is_view_once: row.get::<_, Option<i64>>("isViewOnce")?.unwrap_or(0) != 0,
        attachment: attachment_from_row(row)?,
    }))
}

pub fn get_attachment_references_for_messages(
    conn: &Connection,
    message_ids: &[String],
) -> Result<Vec<AttachmentReference>> {
    let references = batch_multi_var_query(message_ids, MAX_VARIABLE_COUNT, |batch| {
        crate::sql!(
            "SELECT * FROM message_attachments WHERE messageId IN (",
            sql_join(batch),
            ") ORDER BY messageId, editHistoryIndex, attachmentType, orderInMessage"
        )
        .query_map(conn, reference_from_row)
    })?;
    Ok(references.into_iter().flatten().collect())
}

/// Puts attachment payloads back into messages read from the `json` column.
pub fn hydrate_messages(
    conn: &Connection,
    mut messages: Vec<MessageAttributes>,
) -> Result<Vec<MessageAttributes>> {
    if messages.is_empty() {
        return Ok(messages);
    }
    let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
    let references = get_attachment_references_for_messages(conn, &ids)?;

    let mut by_message: HashMap<&str, BTreeMap<i64, Vec<&AttachmentReference>>> = HashMap::new();
    for reference in &references {
        by_message
            .entry(reference.message_id.as_str())
            .or_default()
            .entry(reference.edit_history_index)
            .or_default()
            .push(reference);
    }

    for message in messages.iter_mut() {
        let Some(revisions) = by_message.get(message.id.as_str()) else {
            continue;
        };
        let message_id = message.id.clone();
        for (&index, references) in revisions {
            if index == ROOT_EDIT_HISTORY_INDEX {
                apply_references(&message_id, index, message.slots_mut(), references);
                continue;
            }
            let entry = usize::try_from(index)
                .ok()
                .and_then(|i| message.edit_history.as_mut()?.get_mut(i));
            match entry {
                Some(entry) => apply_references(&message_id, index, entry.slots_mut(), references),
                None => tracing::warn!(
                    message_id = %message_id,
                    edit_history_index = index,
                    "attachment rows for a missing edit revision"
                ),
            }
        }
    }
    Ok(messages)
}

fn slot_at<T>(list: Option<&mut Vec<T>>, order: i64) -> Option<&mut T> {
    let idx = usize::try_from(order).ok()?;
    list?.get_mut(idx)
}

fn apply_references(
    message_id: &str,
    edit_history_index: i64,
    slots: SlotsMut<'_>,
    references: &[&AttachmentReference],
) {
    let mut attachments: Vec<(i64, Attachment)> = Vec::new();
    for reference in references {
        let order = reference.order_in_message;
        let attachment = reference.attachment.clone();
        let placed = match reference.attachment_type {
            AttachmentType::Attachment => {
                attachments.push((order, attachment));
                true
            }
            AttachmentType::LongMessage => {
                *slots.body_attachment = Some(attachment);
                true
            }
            AttachmentType::Preview => slot_at(slots.preview.as_mut(), order)
                .map(|preview| preview.image = Some(attachment))
                .is_some(),
            AttachmentType::Quote => slot_at(
                slots.quote.as_mut().map(|quote| &mut quote.attachments),
                order,
            )
            .map(|quoted| quoted.thumbnail = Some(attachment))
            .is_some(),
            AttachmentType::Contact => slot_at(slots.contact.as_mut(), order)
                .map(|contact| {
                    contact
                        .avatar
                        .get_or_insert_with(ContactAvatar::default)
                        .avatar = Some(attachment)
                })
                .is_some(),
            AttachmentType::Sticker => slots
                .sticker
                .as_mut()
                .map(|sticker| sticker.data = Some(attachment))
                .is_some(),
        };
        if !placed {
            tracing::warn!(
                message_id = %message_id,
                edit_history_index,
                attachment_type = reference.attachment_type.as_str(),
                order,
                "attachment row has no slot in the message"
            );
        }
    }

    if !attachments.is_empty() {
        attachments.sort_by_key(|(order, _)| *order);
        *slots.attachments = Some(attachments.into_iter().map(|(_, a)| a).collect());
    }
}
