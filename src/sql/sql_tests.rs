use rusqlite::types::Value;
use rusqlite::Connection;

use super::*;
use crate::{sql, sql_fragment};

#[test]
fn fragments_nest_and_concatenate_params_in_order() {
    let inner = sql_fragment!("b = ", bind(2i64));
    let query = sql!(
        "SELECT * FROM t WHERE a = ",
        bind("x"),
        " AND ",
        inner,
        " AND c IN (",
        sql_join([3i64, 4]),
        ")"
    );

    assert_eq!(
        query.text(),
        "SELECT * FROM t WHERE a = ? AND b = ? AND c IN (?, ?)"
    );
    assert_eq!(
        query.params(),
        &[
            Value::Text("x".into()),
            Value::Integer(2),
            Value::Integer(3),
            Value::Integer(4)
        ]
    );
}

#[test]
fn constants_are_inlined_and_escaped() {
    let frag = sql_fragment!(
        "CREATE INDEX i ON t (a) WHERE kind = ",
        sql_constant("it's"),
        " AND n > ",
        sql_constant(5i64),
        " AND flag = ",
        sql_constant(true)
    );
    assert_eq!(
        frag.text(),
        "CREATE INDEX i ON t (a) WHERE kind = 'it''s' AND n > 5 AND flag = 1"
    );
    assert!(frag.params().is_empty());
}

#[test]
fn join_fragments_uses_separator() {
    let joined = sql_join_fragments(
        vec![
            sql_fragment!("a = ", bind(1i64)),
            sql_fragment!("b = ", bind(2i64)),
        ],
        " OR ",
    );
    assert_eq!(joined.text(), "a = ? OR b = ?");
    assert_eq!(joined.params().len(), 2);
}

#[test]
fn optional_values_bind_as_null() {
    let none: Option<i64> = None;
    let q = sql!("SELECT ", bind(none), " IS NULL");
    assert_eq!(q.params(), &[Value::Null]);

    let conn = Connection::open_in_memory().expect("open");
    let is_null: i64 = q.query_row(&conn, |row| row.get(0)).expect("query");
    assert_eq!(is_null, 1);
}

#[test]
fn bound_text_is_never_interpreted_as_sql() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute_batch("CREATE TABLE t (name TEXT); INSERT INTO t VALUES ('a');")
        .expect("setup");

    let hostile = "a'; DROP TABLE t; --";
    let rows = sql!("SELECT name FROM t WHERE name = ", bind(hostile))
        .query_map(&conn, |row| row.get::<_, String>(0))
        .expect("query");
    assert!(rows.is_empty());

    let count: i64 = sql!("SELECT COUNT(*) FROM t")
        .query_row(&conn, |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}

#[test]
fn batching_splits_under_limit() {
    let items: Vec<i64> = (0..25).collect();
    let mut sizes = Vec::new();
    let out = batch_multi_var_query(&items, 10, |batch| {
        sizes.push(batch.len());
        Ok(batch.to_vec())
    })
    .expect("batch");
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(out, items);
}

#[test]
fn query_optional_returns_none_for_no_rows() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute_batch("CREATE TABLE t (id INTEGER);").expect("setup");
    let found = sql!("SELECT id FROM t WHERE id = ", bind(1i64))
        .query_optional(&conn, |row| row.get::<_, i64>(0))
        .expect("query");
    assert_eq!(found, None);
}
