//! Parameterized SQL composition.
//!
//! A [`SqlFragment`] is SQL text plus the positional values bound to its `?`
//! placeholders. Fragments nest into other fragments; [`SqlFragment::finish`]
//! turns one into a [`Query`], which can be executed but never embedded in
//! another fragment.
//!
//! Only `&'static str` is accepted as raw text by [`sql_fragment!`], so
//! runtime strings have to go through [`bind`] (a placeholder) or
//! [`sql_constant`] (an escaped literal, for places where SQLite does not
//! accept a placeholder).
//!
//! ```ignore
//! let types = ["a", "b"];
//! let predicate = sql_fragment!("type IN (", sql_join(types), ")");
//! let query = sql!("SELECT id FROM syncTasks WHERE rowid > ", bind(0i64), " AND ", predicate);
//! ```

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

/// Default SQLite `SQLITE_MAX_VARIABLE_NUMBER` for older builds; batching
/// under it keeps IN-list queries valid on every engine we link against.
pub const MAX_VARIABLE_COUNT: usize = 999;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlFragment {
    text: String,
    params: Vec<Value>,
}

impl SqlFragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn push_text(mut self, text: &'static str) -> Self {
        self.text.push_str(text);
        self
    }

    pub fn push_bind(mut self, value: Value) -> Self {
        self.text.push('?');
        self.params.push(value);
        self
    }

    pub fn push_fragment(mut self, other: SqlFragment) -> Self {
        self.text.push_str(&other.text);
        self.params.extend(other.params);
        self
    }

    pub fn finish(self) -> Query {
        Query {
            text: self.text,
            params: self.params,
        }
    }
}

/// A finished statement. Deliberately has no conversion back into a fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    text: String,
    params: Vec<Value>,
}

impl Query {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn execute(&self, conn: &Connection) -> Result<usize> {
        let mut stmt = conn.prepare_cached(&self.text)?;
        Ok(stmt.execute(params_from_iter(self.params.iter()))?)
    }

    pub fn query_row<T, F>(&self, conn: &Connection, f: F) -> Result<T>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = conn.prepare_cached(&self.text)?;
        Ok(stmt.query_row(params_from_iter(self.params.iter()), f)?)
    }

    pub fn query_optional<T, F>(&self, conn: &Connection, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = conn.prepare_cached(&self.text)?;
        Ok(stmt
            .query_row(params_from_iter(self.params.iter()), f)
            .optional()?)
    }

    pub fn query_map<T, F>(&self, conn: &Connection, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = conn.prepare_cached(&self.text)?;
        let mut rows = stmt.query(params_from_iter(self.params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            result.push(f(row)?);
        }
        Ok(result)
    }
}

/// Anything that can be spliced into [`sql_fragment!`].
pub trait SqlPart {
    fn append_to(self, fragment: SqlFragment) -> SqlFragment;
}

impl SqlPart for &'static str {
    fn append_to(self, fragment: SqlFragment) -> SqlFragment {
        fragment.push_text(self)
    }
}

impl SqlPart for SqlFragment {
    fn append_to(self, fragment: SqlFragment) -> SqlFragment {
        fragment.push_fragment(self)
    }
}

/// A single bound value; renders as `?`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bind(Value);

impl SqlPart for Bind {
    fn append_to(self, fragment: SqlFragment) -> SqlFragment {
        fragment.push_bind(self.0)
    }
}

pub trait IntoSqlValue {
    fn into_sql_value(self) -> Value;
}

impl IntoSqlValue for Value {
    fn into_sql_value(self) -> Value {
        self
    }
}

impl IntoSqlValue for &str {
    fn into_sql_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoSqlValue for String {
    fn into_sql_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoSqlValue for &String {
    fn into_sql_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoSqlValue for i64 {
    fn into_sql_value(self) -> Value {
        Value::Integer(self)
    }
}

impl IntoSqlValue for &i64 {
    fn into_sql_value(self) -> Value {
        Value::Integer(*self)
    }
}

impl IntoSqlValue for i32 {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for u32 {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for usize {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::try_from(self).unwrap_or(i64::MAX))
    }
}

impl IntoSqlValue for bool {
    fn into_sql_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoSqlValue for f64 {
    fn into_sql_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoSqlValue for Vec<u8> {
    fn into_sql_value(self) -> Value {
        Value::Blob(self)
    }
}

impl<T: IntoSqlValue> IntoSqlValue for Option<T> {
    fn into_sql_value(self) -> Value {
        match self {
            Some(v) => v.into_sql_value(),
            None => Value::Null,
        }
    }
}

pub fn bind(value: impl IntoSqlValue) -> Bind {
    Bind(value.into_sql_value())
}

/// `?, ?, ?` with one bound value per item.
pub fn sql_join<I>(values: I) -> SqlFragment
where
    I: IntoIterator,
    I::Item: IntoSqlValue,
{
    let mut fragment = SqlFragment::empty();
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            fragment = fragment.push_text(", ");
        }
        fragment = fragment.push_bind(value.into_sql_value());
    }
    fragment
}

pub fn sql_join_fragments<I>(fragments: I, separator: &'static str) -> SqlFragment
where
    I: IntoIterator<Item = SqlFragment>,
{
    let mut out = SqlFragment::empty();
    for (i, fragment) in fragments.into_iter().enumerate() {
        if i > 0 {
            out = out.push_text(separator);
        }
        out = out.push_fragment(fragment);
    }
    out
}

/// Literal values that may be inlined into statement text.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlConstant {
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl From<i64> for SqlConstant {
    fn from(v: i64) -> Self {
        SqlConstant::Integer(v)
    }
}

impl From<i32> for SqlConstant {
    fn from(v: i32) -> Self {
        SqlConstant::Integer(i64::from(v))
    }
}

impl From<f64> for SqlConstant {
    fn from(v: f64) -> Self {
        SqlConstant::Real(v)
    }
}

impl From<bool> for SqlConstant {
    fn from(v: bool) -> Self {
        SqlConstant::Bool(v)
    }
}

impl From<&str> for SqlConstant {
    fn from(v: &str) -> Self {
        SqlConstant::Text(v.to_string())
    }
}

/// Renders a value directly into the statement text. For DDL and other
/// positions where SQLite rejects bound parameters (index definitions,
/// generated columns, `INDEXED BY` companions, partial-index predicates).
pub fn sql_constant(value: impl Into<SqlConstant>) -> SqlFragment {
    let text = match value.into() {
        SqlConstant::Integer(v) => v.to_string(),
        SqlConstant::Real(v) if v.is_finite() => format!("{v:?}"),
        SqlConstant::Real(_) | SqlConstant::Null => "NULL".to_string(),
        SqlConstant::Bool(v) => if v { "1" } else { "0" }.to_string(),
        SqlConstant::Text(v) => format!("'{}'", v.replace('\'', "''")),
    };
    SqlFragment {
        text,
        params: Vec::new(),
    }
}

/// Splits `items` into chunks that fit in one statement and concatenates the
/// per-chunk results.
pub fn batch_multi_var_query<T, R, F>(items: &[T], max_per_batch: usize, mut f: F) -> Result<Vec<R>>
where
    F: FnMut(&[T]) -> Result<Vec<R>>,
{
    let chunk = max_per_batch.max(1);
    let mut out = Vec::new();
    for batch in items.chunks(chunk) {
        out.extend(f(batch)?);
    }
    Ok(out)
}

/// Builds a [`SqlFragment`] from string literals, [`bind`] values and nested
/// fragments.
#[macro_export]
macro_rules! sql_fragment {
    ($($part:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fragment = $crate::sql::SqlFragment::empty();
        $( fragment = $crate::sql::SqlPart::append_to($part, fragment); )*
        fragment
    }};
}

/// Like [`sql_fragment!`] but produces a finished [`Query`].
#[macro_export]
macro_rules! sql {
    ($($part:expr),* $(,)?) => {
        $crate::sql_fragment!($($part),*).finish()
    };
}

#[cfg(test)]
mod sql_tests;
