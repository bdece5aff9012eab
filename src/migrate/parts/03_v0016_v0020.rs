const V16_MESSAGE_TIMER: &str = r#"
ALTER TABLE messages ADD COLUMN messageTimer INTEGER;
ALTER TABLE messages ADD COLUMN messageTimerStart INTEGER;
ALTER TABLE messages ADD COLUMN messageTimerExpiresAt INTEGER;
ALTER TABLE messages ADD COLUMN isErased INTEGER;

CREATE INDEX messages_message_timer ON messages (
  messageTimer,
  messageTimerStart,
  messageTimerExpiresAt,
  isErased
) WHERE messageTimer IS NOT NULL;

DROP TRIGGER messages_on_insert;
DROP TRIGGER messages_on_delete;
DROP TRIGGER messages_on_update;

CREATE TRIGGER messages_on_insert AFTER INSERT ON messages
WHEN new.messageTimer IS NULL
BEGIN
  INSERT INTO messages_fts (id, body) VALUES (new.id, new.body);
END;
CREATE TRIGGER messages_on_delete AFTER DELETE ON messages BEGIN
  DELETE FROM messages_fts WHERE id = old.id;
END;
CREATE TRIGGER messages_on_update AFTER UPDATE ON messages
WHEN new.messageTimer IS NULL
BEGIN
  DELETE FROM messages_fts WHERE id = old.id;
  INSERT INTO messages_fts(id, body) VALUES (new.id, new.body);
END;
"#;

const V17_VIEW_ONCE_TRIGGERS: &str = r#"
DROP INDEX IF EXISTS messages_view_once;
CREATE INDEX messages_view_once ON messages (isErased) WHERE isViewOnce = 1;

DROP TRIGGER messages_on_insert;
DROP TRIGGER messages_on_update;

CREATE TRIGGER messages_on_insert AFTER INSERT ON messages
WHEN new.isViewOnce != 1
BEGIN
  INSERT INTO messages_fts (id, body) VALUES (new.id, new.body);
END;
CREATE TRIGGER messages_on_update AFTER UPDATE ON messages
WHEN new.isViewOnce != 1
BEGIN
  DELETE FROM messages_fts WHERE id = old.id;
  INSERT INTO messages_fts(id, body) VALUES (new.id, new.body);
END;
"#;

// Some stores picked up isViewOnce from a pre-release build.
fn v17_view_once(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    if column_exists(conn, "messages", "isViewOnce")? {
        tracing::info!("messages table already had isViewOnce column");
    } else {
        conn.execute_batch(
            "ALTER TABLE messages ADD COLUMN isViewOnce INTEGER;
             DROP INDEX IF EXISTS messages_message_timer;",
        )?;
    }
    conn.execute_batch(V17_VIEW_ONCE_TRIGGERS)?;
    Ok(StepOutcome::Done)
}

const V18_REBUILD_FTS: &str = r#"
DELETE FROM messages_fts;
INSERT INTO messages_fts(messages_fts) VALUES('rebuild');

INSERT INTO messages_fts(id, body)
  SELECT id, body FROM messages WHERE isViewOnce IS NULL OR isViewOnce != 1;

DROP TRIGGER messages_on_insert;
DROP TRIGGER messages_on_update;

CREATE TRIGGER messages_on_insert AFTER INSERT ON messages
WHEN new.isViewOnce IS NULL OR new.isViewOnce != 1
BEGIN
  INSERT INTO messages_fts (id, body) VALUES (new.id, new.body);
END;
CREATE TRIGGER messages_on_update AFTER UPDATE ON messages
WHEN new.isViewOnce IS NULL OR new.isViewOnce != 1
BEGIN
  DELETE FROM messages_fts WHERE id = old.id;
  INSERT INTO messages_fts(id, body) VALUES (new.id, new.body);
END;
"#;

const V19_PROFILE_NAMES: &str = r#"
ALTER TABLE conversations ADD COLUMN profileFamilyName TEXT;
ALTER TABLE conversations ADD COLUMN profileFullName TEXT;

UPDATE conversations SET profileFullName = profileName;
"#;

const V20_COLUMNS: &str = r#"
ALTER TABLE conversations ADD COLUMN e164 TEXT;
ALTER TABLE conversations ADD COLUMN uuid TEXT;
ALTER TABLE conversations ADD COLUMN groupId TEXT;
ALTER TABLE messages ADD COLUMN sourceUuid TEXT;
ALTER TABLE sessions RENAME COLUMN number TO conversationId;
CREATE INDEX conversations_e164 ON conversations(e164);
CREATE INDEX conversations_uuid ON conversations(uuid);
CREATE INDEX conversations_groupId ON conversations(groupId);
CREATE INDEX messages_sourceUuid on messages(sourceUuid);

UPDATE conversations SET e164 = '+' || id WHERE type = 'private';
UPDATE conversations SET groupId = id WHERE type = 'group';
"#;

/// Phone-number and group-id keyed conversations get random UUID ids, and
/// every table that referenced the old id is rewritten.
fn v20_conversation_ids(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    // The FTS triggers make the bulk rewrite very slow; put them back at the end.
    let mut triggers: Vec<(String, String)> = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT name, sql FROM sqlite_master WHERE type = 'trigger' AND tbl_name = 'messages'",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            triggers.push((row.get(0)?, row.get(1)?));
        }
    }
    for (name, _) in &triggers {
        conn.execute_batch(&format!("DROP TRIGGER {name};"))?;
    }

    conn.execute_batch(V20_COLUMNS)?;

    let mut invalid_groups = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, json FROM conversations WHERE type = 'group' AND members IS NULL",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id = column_text(row, 0)?;
            let json: Option<String> = row.get(1)?;
            let has_members = parse_json_object(json.as_deref())
                .and_then(|o| o.get("members").and_then(Value::as_array).map(|a| !a.is_empty()))
                .unwrap_or(false);
            if let (Some(id), false) = (id, has_members) {
                invalid_groups.push(id);
            }
        }
    }
    for id in &invalid_groups {
        tracing::warn!(group_id = %id, "dropping group without members");
        conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM messages WHERE conversationId = ?1", params![id])?;
    }

    let mut conversations: Vec<(String, Option<String>)> = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT id, type FROM conversations")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if let Some(id) = column_text(row, 0)? {
                conversations.push((id, row.get(1)?));
            }
        }
    }

    let mut new_id_by_old: HashMap<String, String> = HashMap::new();
    for (old_id, kind) in &conversations {
        let new_id = uuid::Uuid::new_v4().to_string();
        let mut patch = json!({ "id": new_id });
        match kind.as_deref() {
            Some("private") => patch["e164"] = json!(format!("+{old_id}")),
            Some("group") => patch["groupId"] = json!(old_id),
            _ => {}
        }
        conn.execute(
            "UPDATE conversations SET id = ?1, json = json_patch(json, ?2) WHERE id = ?3",
            params![new_id, patch.to_string(), old_id],
        )?;
        conn.execute(
            "UPDATE messages SET conversationId = ?1, json = json_patch(json, ?2)
             WHERE conversationId = ?3",
            params![new_id, json!({ "conversationId": new_id }).to_string(), old_id],
        )?;
        new_id_by_old.insert(old_id.clone(), new_id);
    }

    let mut groups: Vec<(String, Option<String>, Option<String>)> = Vec::new();
    {
        let mut stmt =
            conn.prepare("SELECT id, members, json FROM conversations WHERE type = 'group'")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            groups.push((row.get(0)?, row.get(1)?, row.get(2)?));
        }
    }

    for (group_id, members, json_text) in groups {
        let mut group_json = parse_json_object(json_text.as_deref()).unwrap_or_default();
        let old_members: Vec<String> = match members {
            Some(members) => split_legacy_members(&members),
            None => group_json
                .get("members")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(json_scalar_text).collect())
                .unwrap_or_default(),
        };

        let mut new_members = Vec::with_capacity(old_members.len());
        for member in old_members {
            let number = member.trim_start_matches('+').to_string();
            if let Some(id) = new_id_by_old.get(&number) {
                new_members.push(id.clone());
                continue;
            }
            // No private conversation existed for this member yet.
            let id = uuid::Uuid::new_v4().to_string();
            let e164 = format!("+{number}");
            let conversation = json!({
                "id": id,
                "e164": e164,
                "type": "private",
                "version": 2,
                "unreadCount": 0,
                "verified": 0,
                "inbox_position": 0,
                "isPinned": false,
                "lastMessageDeletedForEveryone": false,
                "markedUnread": false,
                "messageCount": 0,
                "sentMessageCount": 0,
                "profileSharing": false,
            });
            conn.execute(
                "INSERT INTO conversations (id, json, type, e164) VALUES (?1, ?2, 'private', ?3)",
                params![id, conversation.to_string(), e164],
            )?;
            new_id_by_old.insert(number, id.clone());
            new_members.push(id);
        }

        group_json.insert("members".to_string(), json!(new_members));
        conn.execute(
            "UPDATE conversations SET members = ?1, json = ?2 WHERE id = ?3",
            params![
                new_members.join(" "),
                Value::Object(group_json).to_string(),
                group_id
            ],
        )?;
    }

    let mut sessions: Vec<(String, Option<String>)> = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT id, json FROM sessions")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if let Some(id) = column_text(row, 0)? {
                sessions.push((id, row.get(1)?));
            }
        }
    }
    for (old_id, json_text) in sessions {
        let mut session = parse_json_object(json_text.as_deref()).unwrap_or_default();
        let number = session
            .get("number")
            .and_then(json_scalar_text)
            .map(|n| n.trim_start_matches('+').to_string());
        let mut new_id = session
            .get("id")
            .and_then(json_scalar_text)
            .unwrap_or_else(|| old_id.clone());
        let mut conversation_id = None;
        if let Some(conversation) = number.as_ref().and_then(|n| new_id_by_old.get(n)) {
            let device_id = session
                .get("deviceId")
                .and_then(json_scalar_text)
                .unwrap_or_default();
            new_id = format!("{conversation}.{device_id}");
            session.insert("conversationId".to_string(), json!(conversation));
            session.insert("id".to_string(), json!(new_id));
            conversation_id = Some(conversation.clone());
        }
        session.remove("number");
        conn.execute(
            "UPDATE sessions SET id = ?1, json = ?2, conversationId = ?3 WHERE id = ?4",
            params![new_id, Value::Object(session).to_string(), conversation_id, old_id],
        )?;
    }

    let mut identity_keys: Vec<(String, Option<String>)> = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT id, json FROM identityKeys")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if let Some(id) = column_text(row, 0)? {
                identity_keys.push((id, row.get(1)?));
            }
        }
    }
    for (old_id, json_text) in identity_keys {
        let Some(new_id) = new_id_by_old.get(&old_id) else {
            continue;
        };
        let mut key = parse_json_object(json_text.as_deref()).unwrap_or_default();
        key.insert("id".to_string(), json!(new_id));
        conn.execute(
            "UPDATE identityKeys SET id = ?1, json = ?2 WHERE id = ?3",
            params![new_id, Value::Object(key).to_string(), old_id],
        )?;
    }

    for (_, sql) in &triggers {
        conn.execute_batch(sql)?;
    }

    Ok(StepOutcome::Done)
}

/// Legacy member lists look like `+15551230001 +15551230002`.
fn split_legacy_members(members: &str) -> Vec<String> {
    members
        .split('+')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
