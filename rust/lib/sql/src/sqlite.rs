use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::{ToSql, ValueRef};
use rusqlite::Connection;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// A single connection guarded by a mutex: every call runs to completion
/// before the next one starts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path).map_err(|e| SQLError::Connection(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn as_sql(v: &Value) -> &dyn ToSql {
    match v {
        Value::Null => &rusqlite::types::Null,
        Value::Integer(i) => i,
        Value::Real(f) => f,
        Value::Text(s) => s,
        Value::Blob(b) => b,
    }
}

fn bind_params(params: &[Value]) -> Vec<&dyn ToSql> {
    params.iter().map(as_sql).collect()
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut stmt = conn.prepare(sql).map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let bound = bind_params(params);
        let rows = stmt
            .query_map(bound.as_slice(), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let bound = bind_params(params);
        let affected = conn.execute(sql, bound.as_slice())?;
        Ok(affected as u64)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let db = SqliteStore::open_in_memory().unwrap();
        db.exec_batch(
            "CREATE TABLE items (id TEXT PRIMARY KEY, name TEXT UNIQUE, qty INTEGER, price REAL);
             CREATE INDEX idx_items_qty ON items(qty);",
        )
        .unwrap();
        db
    }

    #[test]
    fn insert_and_query_typed_columns() {
        let db = store();
        db.exec(
            "INSERT INTO items (id, name, qty, price) VALUES (?1, ?2, ?3, ?4)",
            &["a".into(), "widget".into(), 3i64.into(), Value::Real(1.5)],
        )
        .unwrap();

        let rows = db
            .query("SELECT * FROM items WHERE id = ?1", &["a".into()])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("name"), Some("widget"));
        assert_eq!(rows[0].get_i64("qty"), Some(3));
        assert_eq!(rows[0].get_f64("price"), Some(1.5));
    }

    #[test]
    fn unique_violation_is_constraint() {
        let db = store();
        let sql = "INSERT INTO items (id, name) VALUES (?1, ?2)";
        db.exec(sql, &["a".into(), "dup".into()]).unwrap();
        let err = db.exec(sql, &["b".into(), "dup".into()]).unwrap_err();
        assert!(err.is_constraint(), "got {err}");
    }

    #[test]
    fn exec_reports_affected_rows() {
        let db = store();
        db.exec("INSERT INTO items (id, qty) VALUES ('a', 1)", &[]).unwrap();
        let n = db
            .exec("UPDATE items SET qty = 2 WHERE id = 'a' AND qty = 1", &[])
            .unwrap();
        assert_eq!(n, 1);
        let n = db
            .exec("UPDATE items SET qty = 3 WHERE id = 'a' AND qty = 1", &[])
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn null_and_option_params() {
        let db = store();
        let none: Option<String> = None;
        db.exec(
            "INSERT INTO items (id, name) VALUES (?1, ?2)",
            &["a".into(), none.into()],
        )
        .unwrap();
        let rows = db.query("SELECT name FROM items", &[]).unwrap();
        assert_eq!(rows[0].get("name"), Some(&Value::Null));
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.sqlite");
        {
            let db = SqliteStore::open(&path).unwrap();
            db.exec_batch("CREATE TABLE t (v INTEGER)").unwrap();
            db.exec("INSERT INTO t (v) VALUES (7)", &[]).unwrap();
        }
        let db = SqliteStore::open(&path).unwrap();
        let rows = db.query("SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_i64("v"), Some(7));
    }
}
