const MESSAGE_INSERT_TRIGGERS_DISABLED: &str = "messageInsertTriggersDisabled";

/// Returns the stored `{ "id": .., "value": .. }` document for `id`.
pub fn get_item_by_id(conn: &Connection, id: &str) -> Result<Option<Value>> {
    let json: Option<String> = conn
        .query_row("SELECT json FROM items WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    let Some(json) = json else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_str(&json)?))
}

pub fn create_or_update_item(conn: &Connection, id: &str, value: Value) -> Result<()> {
    let json = json!({ "id": id, "value": value }).to_string();
    conn.execute(
        "INSERT OR REPLACE INTO items (id, json) VALUES (?1, ?2)",
        params![id, json],
    )?;
    Ok(())
}

pub fn remove_item_by_id(conn: &Connection, id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM items WHERE id = ?1", params![id])?)
}

fn item_flag(conn: &Connection, id: &str) -> Result<bool> {
    Ok(get_item_by_id(conn, id)?
        .and_then(|item| item.get("value").and_then(Value::as_bool))
        .unwrap_or(false))
}

fn trigger_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'trigger' AND name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Drops the FTS insert trigger for a bulk import. The flag makes the next
/// startup restore it even if the import never finishes.
pub fn disable_message_insert_triggers(conn: &Connection) -> Result<()> {
    in_transaction(conn, |conn| {
        create_or_update_item(conn, MESSAGE_INSERT_TRIGGERS_DISABLED, Value::Bool(true))?;
        conn.execute_batch("DROP TRIGGER IF EXISTS messages_on_insert;")?;
        Ok(())
    })
}

/// Recreates the FTS insert trigger if a bulk import left it disabled, and
/// indexes whatever was inserted while it was gone.
pub fn ensure_message_insert_triggers_are_enabled(conn: &Connection) -> Result<()> {
    in_transaction(conn, |conn| {
        let disabled = item_flag(conn, MESSAGE_INSERT_TRIGGERS_DISABLED)?;
        if !disabled && trigger_exists(conn, "messages_on_insert")? {
            return Ok(());
        }

        tracing::info!(disabled, "enabling message insert triggers");
        conn.execute_batch(
            r#"
DROP TRIGGER IF EXISTS messages_on_insert;
CREATE TRIGGER messages_on_insert AFTER INSERT ON messages
WHEN new.isViewOnce IS NOT 1
BEGIN
  INSERT INTO messages_fts (rowid, body) VALUES (new.rowid, new.body);
END;
"#,
        )?;
        let indexed = conn.execute(
            r#"
INSERT INTO messages_fts (rowid, body)
SELECT rowid, body FROM messages
WHERE isViewOnce IS NOT 1
  AND body IS NOT NULL
  AND rowid NOT IN (SELECT rowid FROM messages_fts)
"#,
            [],
        )?;
        tracing::info!(indexed, "backfilled message search index");

        create_or_update_item(conn, MESSAGE_INSERT_TRIGGERS_DISABLED, Value::Bool(false))?;
        Ok(())
    })
}

/// Turns on FTS5 `secure-delete` so removed message bodies do not linger in
/// the index pages.
pub fn enable_fts5_secure_delete(conn: &Connection) -> Result<()> {
    let current: Option<i64> = conn
        .query_row(
            "SELECT v FROM messages_fts_config WHERE k IS 'secure-delete'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if current == Some(1) {
        return Ok(());
    }

    tracing::info!("enabling fts5 secure delete");
    conn.execute(
        "INSERT INTO messages_fts(messages_fts, rank) VALUES ('secure-delete', 1)",
        [],
    )?;
    Ok(())
}
