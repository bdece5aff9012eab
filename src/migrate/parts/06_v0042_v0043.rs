const V42_STALE_REACTIONS: &str = r#"
DELETE FROM reactions WHERE messageId NOT IN (SELECT id FROM messages);

DROP TRIGGER IF EXISTS messages_on_delete;
CREATE TRIGGER messages_on_delete AFTER DELETE ON messages BEGIN
  DELETE FROM messages_fts WHERE rowid = old.rowid;
  DELETE FROM sendLogPayloads WHERE id IN (
    SELECT payloadId FROM sendLogMessageIds WHERE messageId = old.id
  );
  DELETE FROM reactions WHERE rowid IN (
    SELECT rowid FROM reactions WHERE messageId = old.id
  );
END;
"#;

/// Maps legacy conversation ids embedded in group JSON onto member UUIDs.
struct MemberResolver {
    uuid_by_conversation: HashMap<String, Option<String>>,
}

impl MemberResolver {
    fn load(conn: &Connection) -> Result<Self> {
        let mut uuid_by_conversation = HashMap::new();
        let mut stmt = conn.prepare("SELECT id, uuid FROM conversations")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if let Some(id) = column_text(row, 0)? {
                uuid_by_conversation.insert(id, row.get::<_, Option<String>>(1)?);
            }
        }
        Ok(Self { uuid_by_conversation })
    }

    /// A known conversation resolves to its UUID (if it has one). An unknown
    /// id that already is a UUID passes through unchanged.
    fn resolve(&self, id: &str) -> Option<String> {
        match self.uuid_by_conversation.get(id) {
            Some(uuid) => uuid.clone(),
            None if uuid::Uuid::parse_str(id).is_ok() => Some(id.to_string()),
            None => None,
        }
    }

    fn resolve_value(&self, value: Option<&Value>) -> Option<String> {
        value.and_then(Value::as_str).and_then(|id| self.resolve(id))
    }

    /// Replaces `conversationId` with `uuid`; `None` when it cannot be resolved.
    fn rekey_member(&self, member: &Value) -> Option<Value> {
        let mut member = member.as_object()?.clone();
        let uuid = self.resolve_value(member.remove("conversationId").as_ref())?;
        member.insert("uuid".to_string(), json!(uuid));
        if let Some(added_by) = member.get("addedByUserId").cloned() {
            match self.resolve_value(Some(&added_by)) {
                Some(uuid) => member.insert("addedByUserId".to_string(), json!(uuid)),
                None => member.remove("addedByUserId"),
            };
        }
        Some(Value::Object(member))
    }

    fn rekey_members(&self, members: Option<&Value>) -> Option<Vec<Value>> {
        let members = members?.as_array()?;
        Some(members.iter().filter_map(|m| self.rekey_member(m)).collect())
    }
}

fn v43_group_v2_uuids(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    let resolver = MemberResolver::load(conn)?;

    let mut groups = Vec::new();
    {
        let mut stmt =
            conn.prepare("SELECT id, json FROM conversations WHERE type = 'group'")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            groups.push((column_text(row, 0)?, row.get::<_, Option<String>>(1)?));
        }
    }

    let mut updated_groups = 0usize;
    for (id, json_text) in groups {
        let (Some(id), Some(mut group)) = (id, parse_json_object(json_text.as_deref())) else {
            continue;
        };
        let Some(members) = resolver.rekey_members(group.get("membersV2")) else {
            continue;
        };
        let member_uuids: Vec<String> = members
            .iter()
            .filter_map(|m| m.get("uuid").and_then(Value::as_str).map(str::to_string))
            .collect();
        group.insert("membersV2".to_string(), Value::Array(members));
        for key in ["pendingMembersV2", "pendingAdminApprovalV2"] {
            if let Some(rekeyed) = resolver.rekey_members(group.get(key)) {
                group.insert(key.to_string(), Value::Array(rekeyed));
            }
        }
        conn.execute(
            "UPDATE conversations SET json = ?1, members = ?2 WHERE id = ?3",
            params![Value::Object(group).to_string(), member_uuids.join(" "), id],
        )?;
        updated_groups += 1;
    }

    let mut messages = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT rowid, json FROM messages
             WHERE type = 'group-v2-change' OR json LIKE '%invitedGV2Members%'",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            messages.push((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?));
        }
    }

    let mut updated_messages = 0usize;
    for (rowid, json_text) in messages {
        let Some(mut message) = parse_json_object(json_text.as_deref()) else {
            continue;
        };
        let mut changed = false;

        if let Some(Value::Object(change)) = message.get_mut("groupV2Change") {
            match resolver.resolve_value(change.get("from")) {
                Some(uuid) => change.insert("from".to_string(), json!(uuid)),
                None => change.remove("from"),
            };
            if let Some(Value::Array(details)) = change.get_mut("details") {
                for detail in details.iter_mut().filter_map(Value::as_object_mut) {
                    if let Some(old) = detail.remove("conversationId") {
                        if let Some(uuid) = resolver.resolve_value(Some(&old)) {
                            detail.insert("uuid".to_string(), json!(uuid));
                        }
                    }
                    if let Some(inviter) = detail.get("inviter").cloned() {
                        match resolver.resolve_value(Some(&inviter)) {
                            Some(uuid) => detail.insert("inviter".to_string(), json!(uuid)),
                            None => detail.remove("inviter"),
                        };
                    }
                }
            }
            changed = true;
        }

        if let Some(rekeyed) = resolver.rekey_members(message.get("invitedGV2Members")) {
            message.insert("invitedGV2Members".to_string(), Value::Array(rekeyed));
            changed = true;
        }

        let source_uuid = resolver.resolve_value(message.get("sourceUuid"));
        if let Some(uuid) = &source_uuid {
            message.insert("sourceUuid".to_string(), json!(uuid));
            changed = true;
        }

        if changed {
            conn.execute(
                "UPDATE messages SET json = ?1, sourceUuid = COALESCE(?2, sourceUuid)
                 WHERE rowid = ?3",
                params![Value::Object(message).to_string(), source_uuid, rowid],
            )?;
            updated_messages += 1;
        }
    }

    tracing::info!(
        groups = updated_groups,
        messages = updated_messages,
        "migrated group v2 member ids"
    );
    Ok(StepOutcome::Done)
}
