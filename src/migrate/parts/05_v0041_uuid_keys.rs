// v41: the signal-protocol tables are re-keyed by our own account UUID so a
// single store can hold key material for more than one local identity.

#[derive(Clone, Debug, Default)]
struct ConversationKeyInfo {
    uuid: Option<String>,
    e164: Option<String>,
    active_at: Option<i64>,
}

impl ConversationKeyInfo {
    /// Ranks duplicate candidates: rows whose conversation knows both its
    /// phone number and its UUID win, then the most recently active one.
    fn rank(&self) -> (bool, i64) {
        (
            self.uuid.is_some() && self.e164.is_some(),
            self.active_at.unwrap_or(0),
        )
    }
}

fn v41_uuid_keys(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    conn.execute_batch(
        "ALTER TABLE sessions ADD COLUMN ourUuid STRING;
         ALTER TABLE sessions ADD COLUMN uuid STRING;",
    )?;

    let Some(our_uuid) = v41_our_uuid(conn)? else {
        // Without an account UUID none of the key material can be re-keyed.
        tracing::warn!("no account uuid found; clearing protocol key material");
        conn.execute_batch(
            "DELETE FROM senderKeys;
             DELETE FROM sessions;
             DELETE FROM signedPreKeys;
             DELETE FROM preKeys;
             DELETE FROM items WHERE id IN ('identityKey', 'registrationId');",
        )?;
        return Ok(StepOutcome::Done);
    };

    let conversations = v41_load_conversations(conn)?;

    v41_prefix_pre_keys(conn, "preKeys", &our_uuid)?;
    v41_prefix_pre_keys(conn, "signedPreKeys", &our_uuid)?;
    v41_sender_keys(conn, &our_uuid, &conversations)?;
    v41_sessions(conn, &our_uuid, &conversations)?;
    v41_identity_items(conn, &our_uuid)?;
    v41_identity_keys(conn, &conversations)?;

    Ok(StepOutcome::Done)
}

/// The `uuid_id` item stores `<uuid>.<deviceId>`.
fn v41_our_uuid(conn: &Connection) -> Result<Option<String>> {
    let json: Option<String> = conn
        .query_row("SELECT json FROM items WHERE id = 'uuid_id'", [], |row| row.get(0))
        .optional()?
        .flatten();
    Ok(parse_json_object(json.as_deref())
        .and_then(|item| item.get("value").and_then(json_scalar_text))
        .and_then(|value| value.split('.').next().map(str::to_string))
        .filter(|uuid| !uuid.is_empty()))
}

fn v41_load_conversations(conn: &Connection) -> Result<HashMap<String, ConversationKeyInfo>> {
    let mut out = HashMap::new();
    let mut stmt = conn.prepare("SELECT id, uuid, e164, active_at FROM conversations")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let Some(id) = column_text(row, 0)? else {
            continue;
        };
        out.insert(
            id,
            ConversationKeyInfo {
                uuid: row.get(1)?,
                e164: row.get(2)?,
                active_at: row.get(3)?,
            },
        );
    }
    Ok(out)
}

/// Numeric pre-key ids become `<ourUuid>:<keyId>`; the old id moves to `keyId`.
fn v41_prefix_pre_keys(conn: &Connection, table: &str, our_uuid: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "ALTER TABLE {table} RENAME TO old_{table};
         CREATE TABLE {table}(
           id STRING PRIMARY KEY ASC,
           json TEXT
         );"
    ))?;
    conn.execute(
        &format!(
            "INSERT INTO {table} (id, json)
             SELECT
               ?1 || ':' || id,
               json_set(json, '$.id', ?1 || ':' || id, '$.keyId', id, '$.ourUuid', ?1)
             FROM old_{table}"
        ),
        params![our_uuid],
    )?;
    conn.execute_batch(&format!("DROP TABLE old_{table};"))?;
    Ok(())
}

/// Splits a legacy `<conversationId>.<deviceId>` address.
fn split_address(address: &str) -> Option<(&str, &str)> {
    let (conversation, device) = address.rsplit_once('.')?;
    if conversation.is_empty() || device.is_empty() {
        return None;
    }
    Some((conversation, device))
}

struct SenderKeyRow {
    id: String,
    sender_id: String,
    distribution_id: String,
    data: Vec<u8>,
    last_updated: i64,
    rank: (bool, i64),
}

fn v41_sender_keys(
    conn: &Connection,
    our_uuid: &str,
    conversations: &HashMap<String, ConversationKeyInfo>,
) -> Result<()> {
    let mut rows_in = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, senderId, distributionId, data, lastUpdatedDate FROM senderKeys",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let sender_id: String = row.get(1)?;
            let distribution_id: String = row.get(2)?;
            let data: Vec<u8> = row.get(3)?;
            let last_updated: f64 = row.get(4)?;
            rows_in.push((sender_id, distribution_id, data, last_updated as i64));
        }
    }

    let total = rows_in.len();
    let mut by_id: BTreeMap<String, SenderKeyRow> = BTreeMap::new();
    for (sender_id, distribution_id, data, last_updated) in rows_in {
        let Some((conversation_id, device_id)) = split_address(&sender_id) else {
            continue;
        };
        let Some(conversation) = conversations.get(conversation_id) else {
            continue;
        };
        let Some(uuid) = conversation.uuid.as_deref() else {
            continue;
        };
        let new_sender_id = format!("{uuid}.{device_id}");
        let candidate = SenderKeyRow {
            id: format!("{our_uuid}:{new_sender_id}--{distribution_id}"),
            sender_id: new_sender_id,
            distribution_id,
            data,
            last_updated,
            rank: conversation.rank(),
        };
        let replace = match by_id.get(&candidate.id) {
            None => true,
            Some(existing) => {
                (candidate.last_updated, candidate.rank) > (existing.last_updated, existing.rank)
            }
        };
        if replace {
            by_id.insert(candidate.id.clone(), candidate);
        }
    }

    conn.execute("DELETE FROM senderKeys", [])?;
    let mut insert = conn.prepare(
        "INSERT INTO senderKeys (id, senderId, distributionId, data, lastUpdatedDate)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in by_id.values() {
        insert.execute(params![
            row.id,
            row.sender_id,
            row.distribution_id,
            row.data,
            row.last_updated
        ])?;
    }
    tracing::info!(before = total, after = by_id.len(), "migrated sender keys");
    Ok(())
}

fn v41_sessions(
    conn: &Connection,
    our_uuid: &str,
    conversations: &HashMap<String, ConversationKeyInfo>,
) -> Result<()> {
    let mut rows_in = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT id, conversationId, json FROM sessions")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            rows_in.push((column_text(row, 0)?, column_text(row, 1)?, row.get::<_, Option<String>>(2)?));
        }
    }

    let total = rows_in.len();
    let mut by_id: BTreeMap<String, ((bool, i64), String, String, Map<String, Value>)> =
        BTreeMap::new();
    for (old_id, conversation_id, json_text) in rows_in {
        let mut session = parse_json_object(json_text.as_deref()).unwrap_or_default();
        let conversation_id = conversation_id
            .or_else(|| session.get("conversationId").and_then(json_scalar_text));
        let device_id = session
            .get("deviceId")
            .and_then(json_scalar_text)
            .or_else(|| {
                old_id
                    .as_deref()
                    .and_then(split_address)
                    .map(|(_, device)| device.to_string())
            });
        let (Some(conversation_id), Some(device_id)) = (conversation_id, device_id) else {
            continue;
        };
        let Some(conversation) = conversations.get(&conversation_id) else {
            continue;
        };
        let Some(uuid) = conversation.uuid.clone() else {
            continue;
        };

        let id = format!("{our_uuid}:{uuid}.{device_id}");
        session.insert("id".to_string(), json!(id));
        session.insert("uuid".to_string(), json!(uuid));
        session.insert("ourUuid".to_string(), json!(our_uuid));

        let rank = conversation.rank();
        if by_id.get(&id).is_some_and(|(existing, ..)| *existing >= rank) {
            continue;
        }
        by_id.insert(id, (rank, conversation_id, uuid, session));
    }

    conn.execute("DELETE FROM sessions", [])?;
    let mut insert = conn.prepare(
        "INSERT INTO sessions (id, conversationId, ourUuid, uuid, json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (id, (_, conversation_id, uuid, session)) in by_id.iter() {
        insert.execute(params![
            id,
            conversation_id,
            our_uuid,
            uuid,
            Value::Object(session.clone()).to_string()
        ])?;
    }
    tracing::info!(before = total, after = by_id.len(), "migrated sessions");
    Ok(())
}

/// Single-identity items become maps keyed by our UUID.
fn v41_identity_items(conn: &Connection, our_uuid: &str) -> Result<()> {
    for (old_key, new_key) in [
        ("identityKey", "identityKeyMap"),
        ("registrationId", "registrationIdMap"),
    ] {
        let json: Option<String> = conn
            .query_row("SELECT json FROM items WHERE id = ?1", params![old_key], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        let Some(item) = parse_json_object(json.as_deref()) else {
            continue;
        };
        let value = item.get("value").cloned().unwrap_or(Value::Null);
        let migrated = json!({
            "id": new_key,
            "value": { our_uuid: value },
        });
        conn.execute(
            "INSERT OR REPLACE INTO items (id, json) VALUES (?1, ?2)",
            params![new_key, migrated.to_string()],
        )?;
        conn.execute("DELETE FROM items WHERE id = ?1", params![old_key])?;
    }
    Ok(())
}

fn v41_identity_keys(
    conn: &Connection,
    conversations: &HashMap<String, ConversationKeyInfo>,
) -> Result<()> {
    let mut rows_in = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT id, json FROM identityKeys")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if let Some(id) = column_text(row, 0)? {
                rows_in.push((id, row.get::<_, Option<String>>(1)?));
            }
        }
    }

    conn.execute("DELETE FROM identityKeys", [])?;
    let mut insert =
        conn.prepare("INSERT OR REPLACE INTO identityKeys (id, json) VALUES (?1, ?2)")?;
    for (old_id, json_text) in rows_in {
        let new_id = conversations
            .get(&old_id)
            .and_then(|c| c.uuid.clone())
            .unwrap_or_else(|| format!("conversation:{old_id}"));
        let mut key = parse_json_object(json_text.as_deref()).unwrap_or_default();
        key.insert("id".to_string(), json!(new_id));
        insert.execute(params![new_id, Value::Object(key).to_string()])?;
    }
    Ok(())
}
