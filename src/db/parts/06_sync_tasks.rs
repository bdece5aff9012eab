/// Upper bound on tasks handed out by a single dequeue.
pub const SYNC_TASK_DEQUEUE_LIMIT: usize = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub struct SyncTask {
    pub id: String,
    pub task_type: String,
    pub data: Value,
    pub attempts: i64,
    pub created_at: i64,
    pub envelope_id: String,
    pub sent_at: i64,
}

/// Tasks that have failed `max_attempts` times and are older than
/// `retention_ms` are expired: never dequeued, and removed by
/// [`delete_expired_sync_tasks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncTaskExpiry {
    pub max_attempts: i64,
    pub retention_ms: i64,
}

impl SyncTaskExpiry {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            max_attempts: config.max_sync_task_attempts,
            retention_ms: config.sync_task_retention_ms,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DequeueSyncTasks {
    /// Cursor from the previous call; only tasks inserted after it are read.
    pub after_row_id: Option<i64>,
    pub increment_attempts: bool,
    /// Empty means every type.
    pub types: Vec<String>,
}

impl Default for DequeueSyncTasks {
    fn default() -> Self {
        Self {
            after_row_id: None,
            increment_attempts: true,
            types: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DequeuedSyncTasks {
    pub tasks: Vec<SyncTask>,
    /// Pass back as `after_row_id` to continue; `None` when nothing was read.
    pub last_row_id: Option<i64>,
}

fn sync_task_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, SyncTask)> {
    let id: String = row.get(1)?;
    let data: String = row.get(4)?;
    let data = serde_json::from_str(&data).unwrap_or_else(|e| {
        tracing::warn!(task_id = %id, error = %e, "sync task data is not json");
        Value::Null
    });
    Ok((
        row.get(0)?,
        SyncTask {
            id,
            attempts: row.get(2)?,
            created_at: row.get(3)?,
            data,
            envelope_id: row.get(5)?,
            sent_at: row.get(6)?,
            task_type: row.get(7)?,
        },
    ))
}

pub fn save_sync_task(conn: &Connection, task: &SyncTask) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO syncTasks (id, attempts, createdAt, data, envelopeId, sentAt, type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?
    .execute(params![
        task.id,
        task.attempts,
        task.created_at,
        task.data.to_string(),
        task.envelope_id,
        task.sent_at,
        task.task_type,
    ])?;
    Ok(())
}

pub fn save_sync_tasks(conn: &Connection, tasks: &[SyncTask]) -> Result<()> {
    in_transaction(conn, |conn| {
        for task in tasks {
            save_sync_task(conn, task)?;
        }
        Ok(())
    })
}

fn not_expired(now: i64, expiry: &SyncTaskExpiry) -> crate::sql::SqlFragment {
    crate::sql_fragment!(
        "NOT (attempts >= ",
        bind(expiry.max_attempts),
        " AND createdAt < ",
        bind(now - expiry.retention_ms),
        ")"
    )
}

fn sync_task_types(types: &[String]) -> crate::sql::SqlFragment {
    if types.is_empty() {
        crate::sql_fragment!("1")
    } else {
        crate::sql_fragment!("type IN (", sql_join(types), ")")
    }
}

/// Reads the oldest tasks after the cursor in insertion order and, unless
/// told otherwise, counts this read as an attempt for each of them.
pub fn dequeue_oldest_sync_tasks(
    conn: &Connection,
    options: &DequeueSyncTasks,
    now: i64,
    expiry: &SyncTaskExpiry,
) -> Result<DequeuedSyncTasks> {
    in_transaction(conn, |conn| {
        let rows = crate::sql!(
            "SELECT rowid, id, attempts, createdAt, data, envelopeId, sentAt, type
             FROM syncTasks
             WHERE rowid > ",
            bind(options.after_row_id.unwrap_or(0)),
            " AND ",
            not_expired(now, expiry),
            " AND ",
            sync_task_types(&options.types),
            " ORDER BY rowid ASC LIMIT ",
            bind(SYNC_TASK_DEQUEUE_LIMIT)
        )
        .query_map(conn, sync_task_from_row)?;

        let (Some((first, _)), Some((last, _))) = (rows.first(), rows.last()) else {
            return Ok(DequeuedSyncTasks::default());
        };
        let (first, last) = (*first, *last);
        let mut tasks: Vec<SyncTask> = rows.into_iter().map(|(_, task)| task).collect();

        if options.increment_attempts {
            let updated: HashMap<String, i64> = crate::sql!(
                "UPDATE syncTasks SET attempts = attempts + 1
                 WHERE rowid >= ",
                bind(first),
                " AND rowid <= ",
                bind(last),
                " AND ",
                not_expired(now, expiry),
                " AND ",
                sync_task_types(&options.types),
                " RETURNING id, attempts"
            )
            .query_map(conn, |row| Ok((row.get(0)?, row.get(1)?)))?
            .into_iter()
            .collect();
            for task in tasks.iter_mut() {
                if let Some(&attempts) = updated.get(&task.id) {
                    task.attempts = attempts;
                }
            }
        }

        Ok(DequeuedSyncTasks {
            tasks,
            last_row_id: Some(last),
        })
    })
}

pub fn get_all_sync_tasks(conn: &Connection) -> Result<Vec<SyncTask>> {
    let rows = crate::sql!(
        "SELECT rowid, id, attempts, createdAt, data, envelopeId, sentAt, type
         FROM syncTasks ORDER BY rowid ASC"
    )
    .query_map(conn, sync_task_from_row)?;
    Ok(rows.into_iter().map(|(_, task)| task).collect())
}

pub fn remove_sync_task_by_id(conn: &Connection, id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM syncTasks WHERE id = ?1", params![id])?)
}

pub fn remove_sync_tasks(conn: &Connection, ids: &[String]) -> Result<usize> {
    in_transaction(conn, |conn| {
        let counts = batch_multi_var_query(ids, MAX_VARIABLE_COUNT, |batch| {
            let removed = crate::sql!("DELETE FROM syncTasks WHERE id IN (", sql_join(batch), ")")
                .execute(conn)?;
            Ok(vec![removed])
        })?;
        Ok(counts.into_iter().sum())
    })
}

pub fn increment_all_sync_task_attempts(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("UPDATE syncTasks SET attempts = attempts + 1", [])?)
}

pub fn delete_expired_sync_tasks(
    conn: &Connection,
    now: i64,
    expiry: &SyncTaskExpiry,
) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM syncTasks WHERE attempts >= ?1 AND createdAt < ?2",
        params![expiry.max_attempts, now - expiry.retention_ms],
    )?;
    if removed > 0 {
        tracing::warn!(removed, "deleted expired sync tasks");
    }
    Ok(removed)
}
