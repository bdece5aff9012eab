const UPSERT_MESSAGE: &str = r#"
INSERT INTO messages (
  id, json, conversationId, type, sent_at, received_at, body, readStatus,
  isViewOnce, isErased, expireTimer, expirationStartTimestamp, source,
  sourceUuid, sourceDevice, serverGuid, schemaVersion, hasAttachments,
  hasFileAttachments, hasVisualMediaAttachments
) VALUES (
  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
  ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20
)
ON CONFLICT(id) DO UPDATE SET
  json = excluded.json,
  conversationId = excluded.conversationId,
  type = excluded.type,
  sent_at = excluded.sent_at,
  received_at = excluded.received_at,
  body = excluded.body,
  readStatus = excluded.readStatus,
  isViewOnce = excluded.isViewOnce,
  isErased = excluded.isErased,
  expireTimer = excluded.expireTimer,
  expirationStartTimestamp = excluded.expirationStartTimestamp,
  source = excluded.source,
  sourceUuid = excluded.sourceUuid,
  sourceDevice = excluded.sourceDevice,
  serverGuid = excluded.serverGuid,
  schemaVersion = excluded.schemaVersion,
  hasAttachments = excluded.hasAttachments,
  hasFileAttachments = excluded.hasFileAttachments,
  hasVisualMediaAttachments = excluded.hasVisualMediaAttachments
"#;

/// Inserts or updates `message` together with its attachment rows. A message
/// without an id gets a fresh one; the id actually used is returned.
pub fn save_message(conn: &Connection, message: &MessageAttributes) -> Result<String> {
    in_transaction(conn, |conn| save_message_in_transaction(conn, message))
}

pub fn save_messages(conn: &Connection, messages: &[MessageAttributes]) -> Result<Vec<String>> {
    in_transaction(conn, |conn| {
        messages
            .iter()
            .map(|message| save_message_in_transaction(conn, message))
            .collect()
    })
}

fn save_message_in_transaction(conn: &Connection, message: &MessageAttributes) -> Result<String> {
    let message = if message.id.is_empty() {
        std::borrow::Cow::Owned(MessageAttributes {
            id: uuid::Uuid::new_v4().to_string(),
            ..message.clone()
        })
    } else {
        std::borrow::Cow::Borrowed(message)
    };

    let row = MessageRow::from_attributes(&message)?;
    // An upsert rather than REPLACE: REPLACE deletes first, which would
    // cascade into message_attachments and attachment_downloads.
    conn.prepare_cached(UPSERT_MESSAGE)?.execute(params![
        row.id,
        row.json,
        row.conversation_id,
        row.message_type,
        row.sent_at,
        row.received_at,
        row.body,
        row.read_status,
        row.is_view_once,
        row.is_erased,
        row.expire_timer,
        row.expiration_start_timestamp,
        row.source,
        row.source_uuid,
        row.source_device,
        row.server_guid,
        row.schema_version,
        row.has_attachments,
        row.has_file_attachments,
        row.has_visual_media_attachments,
    ])?;

    save_message_attachments(conn, &message)?;
    Ok(row.id)
}

fn parse_message_documents(documents: Vec<(String, Option<String>)>) -> Vec<MessageAttributes> {
    let mut messages = Vec::with_capacity(documents.len());
    for (id, json) in documents {
        let parsed = json
            .as_deref()
            .map(serde_json::from_str::<MessageAttributes>);
        match parsed {
            Some(Ok(mut message)) => {
                if message.id.is_empty() {
                    message.id = id;
                }
                messages.push(message);
            }
            Some(Err(e)) => tracing::warn!(message_id = %id, error = %e, "unreadable message json"),
            None => tracing::warn!(message_id = %id, "message has no json"),
        }
    }
    messages
}

fn query_message_documents(
    conn: &Connection,
    query: crate::sql::Query,
) -> Result<Vec<MessageAttributes>> {
    let documents = query.query_map(conn, |row| Ok((row.get(0)?, row.get(1)?)))?;
    hydrate_messages(conn, parse_message_documents(documents))
}

pub fn get_message_by_id(conn: &Connection, id: &str) -> Result<Option<MessageAttributes>> {
    let messages = query_message_documents(
        conn,
        crate::sql!("SELECT CAST(id AS TEXT), json FROM messages WHERE id = ", bind(id)),
    )?;
    Ok(messages.into_iter().next())
}

pub fn get_messages_by_id(conn: &Connection, ids: &[String]) -> Result<Vec<MessageAttributes>> {
    let documents = batch_multi_var_query(ids, MAX_VARIABLE_COUNT, |batch| {
        crate::sql!(
            "SELECT CAST(id AS TEXT), json FROM messages WHERE id IN (",
            sql_join(batch),
            ")"
        )
        .query_map(conn, |row| Ok((row.get(0)?, row.get(1)?)))
    })?;
    hydrate_messages(conn, parse_message_documents(documents))
}

/// Newest first. `before_received_at` pages backwards through older messages.
pub fn get_messages_by_conversation(
    conn: &Connection,
    conversation_id: &str,
    limit: usize,
    before_received_at: Option<i64>,
) -> Result<Vec<MessageAttributes>> {
    let older_than = match before_received_at {
        Some(received_at) => crate::sql_fragment!(" AND received_at < ", bind(received_at)),
        None => crate::sql::SqlFragment::empty(),
    };
    query_message_documents(
        conn,
        crate::sql!(
            "SELECT CAST(id AS TEXT), json FROM messages WHERE conversationId = ",
            bind(conversation_id),
            older_than,
            " ORDER BY received_at DESC, sent_at DESC LIMIT ",
            bind(limit)
        ),
    )
}

pub fn get_message_count(conn: &Connection, conversation_id: Option<&str>) -> Result<i64> {
    let query = match conversation_id {
        Some(id) => crate::sql!(
            "SELECT count(*) FROM messages WHERE conversationId = ",
            bind(id)
        ),
        None => crate::sql!("SELECT count(*) FROM messages"),
    };
    query.query_row(conn, |row| row.get(0))
}

/// Full-text search over message bodies, newest first.
pub fn search_messages(
    conn: &Connection,
    text: &str,
    conversation_id: Option<&str>,
    limit: usize,
) -> Result<Vec<MessageAttributes>> {
    let Some(match_expr) = fts_match_expression(text) else {
        return Ok(Vec::new());
    };
    let in_conversation = match conversation_id {
        Some(id) => crate::sql_fragment!(" AND messages.conversationId = ", bind(id)),
        None => crate::sql::SqlFragment::empty(),
    };
    query_message_documents(
        conn,
        crate::sql!(
            "SELECT CAST(messages.id AS TEXT), messages.json
             FROM messages_fts
             INNER JOIN messages ON messages.rowid = messages_fts.rowid
             WHERE messages_fts MATCH ",
            bind(match_expr),
            in_conversation,
            " ORDER BY messages.received_at DESC, messages.sent_at DESC LIMIT ",
            bind(limit)
        ),
    )
}

/// Turns free text into prefix terms, each quoted so FTS5 operators in the
/// input are matched literally.
fn fts_match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|term| format!("\"{}\"*", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Attachment rows and download jobs go with the message through
/// `ON DELETE CASCADE`.
pub fn remove_message(conn: &Connection, id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?)
}

pub fn remove_messages(conn: &Connection, ids: &[String]) -> Result<usize> {
    in_transaction(conn, |conn| {
        let counts = batch_multi_var_query(ids, MAX_VARIABLE_COUNT, |batch| {
            let removed = crate::sql!("DELETE FROM messages WHERE id IN (", sql_join(batch), ")")
                .execute(conn)?;
            Ok(vec![removed])
        })?;
        Ok(counts.into_iter().sum())
    })
}
