pub const DB_FILE_NAME: &str = "db.sqlite";

pub fn db_path(store_dir: &Path) -> PathBuf {
    store_dir.join("sql").join(DB_FILE_NAME)
}

pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

/// Opens (creating if needed) the store under `store_dir` and upgrades it to
/// the newest schema.
pub fn open(store_dir: &Path, key: Option<&[u8; 32]>, config: &StoreConfig) -> Result<Connection> {
    let path = db_path(store_dir);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(&path)?;
    configure(&conn, key, config)?;
    crate::migrate::upgrade(&conn)?;
    Ok(conn)
}

/// Applies the key and connection pragmas. Fails with
/// [`StoreError::InvalidKey`] when the file cannot be read with `key`.
pub fn configure(conn: &Connection, key: Option<&[u8; 32]>, config: &StoreConfig) -> Result<()> {
    if let Some(key) = key {
        apply_key(conn, key)?;
    }
    match conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    }) {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::NotADatabase =>
        {
            return Err(StoreError::InvalidKey.into());
        }
        Err(e) => return Err(e.into()),
    }

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update(None, "journal_mode", config.journal_mode.as_str())?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

#[cfg(feature = "sqlcipher")]
fn apply_key(conn: &Connection, key: &[u8; 32]) -> Result<()> {
    // Raw-key form skips SQLCipher's own KDF; the key is already derived.
    conn.execute_batch(&format!(
        "PRAGMA key = \"x'{}'\";",
        crate::crypto::to_hex(key)
    ))?;
    Ok(())
}

#[cfg(not(feature = "sqlcipher"))]
fn apply_key(_conn: &Connection, _key: &[u8; 32]) -> Result<()> {
    Ok(())
}

/// Runs `f` inside `BEGIN IMMEDIATE` .. `COMMIT`, rolling back on error.
/// When a transaction is already open, `f` joins it instead.
pub fn in_transaction<T, F>(conn: &Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    if !conn.is_autocommit() {
        return f(conn);
    }

    conn.execute_batch("BEGIN IMMEDIATE;")?;
    match f(conn) {
        Ok(value) => {
            if let Err(e) = conn.execute_batch("COMMIT;") {
                let _ = conn.execute_batch("ROLLBACK;");
                return Err(e.into());
            }
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

pub fn user_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

pub fn set_user_version(conn: &Connection, version: i64) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA schema_version", [], |row| row.get(0))?)
}

pub fn sqlite_version(conn: &Connection) -> Result<String> {
    Ok(conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?)
}
