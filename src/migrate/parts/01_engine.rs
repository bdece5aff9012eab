/// Passed to every step. `starting_version` is the version the store had when
/// the upgrade began, not the version reached so far.
#[derive(Clone, Copy, Debug)]
pub struct StepContext {
    pub starting_version: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Commit, then run `VACUUM` before the next step.
    NeedsVacuum,
}

pub type StepFn = fn(&Connection, &StepContext) -> Result<StepOutcome>;

#[derive(Clone, Copy)]
pub enum Apply {
    Sql(&'static str),
    Code(StepFn),
}

#[derive(Clone, Copy)]
pub struct MigrationStep {
    pub version: i64,
    pub name: &'static str,
    pub apply: Apply,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish()
    }
}

impl MigrationStep {
    pub const fn sql(version: i64, name: &'static str, sql: &'static str) -> Self {
        Self {
            version,
            name,
            apply: Apply::Sql(sql),
        }
    }

    pub const fn code(version: i64, name: &'static str, f: StepFn) -> Self {
        Self {
            version,
            name,
            apply: Apply::Code(f),
        }
    }

    pub fn is_applied(&self, current_version: i64) -> bool {
        current_version >= self.version
    }

    /// Runs the step body unless `ctx` says it is already applied. The caller
    /// owns the transaction and the version bump.
    pub fn run(&self, conn: &Connection, ctx: &StepContext) -> Result<Option<StepOutcome>> {
        if self.is_applied(ctx.starting_version) {
            return Ok(None);
        }
        let outcome = match self.apply {
            Apply::Sql(sql) => {
                conn.execute_batch(sql)?;
                StepOutcome::Done
            }
            Apply::Code(f) => f(conn, ctx)?,
        };
        Ok(Some(outcome))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeReport {
    pub starting_version: i64,
    pub final_version: i64,
    pub applied: Vec<i64>,
}

pub fn max_version() -> i64 {
    catalogue_max_version(SCHEMA_VERSIONS)
}

fn catalogue_max_version(steps: &[MigrationStep]) -> i64 {
    steps.last().map(|s| s.version).unwrap_or(0)
}

pub fn check_monotonic(steps: &[MigrationStep]) -> Result<()> {
    for pair in steps.windows(2) {
        let (prev, next) = (pair[0].version, pair[1].version);
        if prev >= next {
            return Err(StoreError::NonMonotonicCatalogue { prev, next }.into());
        }
    }
    Ok(())
}

/// Brings the store up to the newest schema this build knows about.
pub fn upgrade(conn: &Connection) -> Result<UpgradeReport> {
    upgrade_with(conn, SCHEMA_VERSIONS)
}

pub fn upgrade_with(conn: &Connection, steps: &[MigrationStep]) -> Result<UpgradeReport> {
    check_monotonic(steps)?;

    let max = catalogue_max_version(steps);
    let starting_version = user_version(conn)?;
    tracing::info!(
        user_version = starting_version,
        max_version = max,
        sqlite_version = %sqlite_version(conn).unwrap_or_default(),
        schema_version = schema_version(conn).unwrap_or_default(),
        "upgrade schema"
    );

    if starting_version > max {
        return Err(StoreError::VersionFromFuture {
            current: starting_version,
            max,
        }
        .into());
    }

    let applied = run_steps(conn, steps, starting_version, None)?;

    ensure_message_insert_triggers_are_enabled(conn)?;
    enable_fts5_secure_delete(conn)?;

    if starting_version != max {
        let start = Instant::now();
        conn.execute_batch("PRAGMA optimize;")?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "optimize done");
    }

    Ok(UpgradeReport {
        starting_version,
        final_version: user_version(conn)?,
        applied,
    })
}

/// Applies catalogue steps up to and including `target`, without the
/// finalization passes. Lets callers stage a store at a historical version.
pub fn upgrade_to(conn: &Connection, target: i64) -> Result<Vec<i64>> {
    upgrade_to_with(conn, SCHEMA_VERSIONS, target)
}

pub fn upgrade_to_with(conn: &Connection, steps: &[MigrationStep], target: i64) -> Result<Vec<i64>> {
    check_monotonic(steps)?;
    let starting_version = user_version(conn)?;
    if starting_version > target {
        return Err(anyhow!(
            "cannot downgrade from version {starting_version} to {target}"
        ));
    }
    run_steps(conn, steps, starting_version, Some(target))
}

fn run_steps(
    conn: &Connection,
    steps: &[MigrationStep],
    starting_version: i64,
    target: Option<i64>,
) -> Result<Vec<i64>> {
    let ctx = StepContext { starting_version };
    let mut applied = Vec::new();

    for step in steps {
        if target.is_some_and(|t| step.version > t) {
            break;
        }
        if step.is_applied(ctx.starting_version) {
            continue;
        }
        let span = tracing::info_span!("migration", version = step.version, name = step.name);
        let _entered = span.enter();
        tracing::info!("starting");

        let outcome = in_transaction(conn, |conn| {
            let outcome = step.run(conn, &ctx)?;
            if outcome.is_some() {
                set_user_version(conn, step.version)?;
            }
            Ok(outcome)
        })?;

        match outcome {
            None => continue,
            Some(StepOutcome::Done) => tracing::info!("success"),
            Some(StepOutcome::NeedsVacuum) => {
                tracing::info!("success, needs vacuum");
                conn.execute_batch("VACUUM;")?;
                tracing::info!("done running vacuum");
            }
        }
        applied.push(step.version);
    }

    Ok(applied)
}

// Row and JSON helpers shared by the code steps.

/// Reads a column that may hold text or a number coerced by `STRING` affinity.
fn column_text(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    use rusqlite::types::ValueRef;
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(v) | ValueRef::Blob(v) => Some(String::from_utf8_lossy(v).into_owned()),
    })
}

fn parse_json_object(text: Option<&str>) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text?) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// String form of a JSON scalar without surrounding quotes.
fn json_scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
