use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use docket_core::ServiceError;
use docket_sql::{Row, SQLError, SQLStore, Value};

/// Record tables. Every table stores the full record as JSON in `data`;
/// other columns exist only for lookups, ordering and uniqueness.
pub mod table {
    pub const SERVICES: &str = "services";
    pub const FORM_FIELDS: &str = "form_fields";
    pub const OPTION_LISTS: &str = "option_lists";
    pub const OPTION_LIST_ENTRIES: &str = "option_list_entries";
    pub const AUTHORIZATION_STEPS: &str = "authorization_steps";
    pub const SUBZONES: &str = "subzones";
    pub const SERVICE_CONFIGS: &str = "service_configs";
    pub const FORM_AVAILABILITY: &str = "form_availability";
    pub const SUBMISSIONS: &str = "submissions";
    pub const USERS: &str = "users";
    pub const SESSIONS: &str = "sessions";
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS services (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS form_fields (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    service_id  TEXT NOT NULL,
    field_name  TEXT NOT NULL,
    position    INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (service_id, field_name)
);
CREATE INDEX IF NOT EXISTS idx_form_fields_service ON form_fields(service_id, position);

CREATE TABLE IF NOT EXISTS option_lists (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    name        TEXT NOT NULL UNIQUE,
    version     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS option_list_entries (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    list_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_option_list_entries_list ON option_list_entries(list_id);

CREATE TABLE IF NOT EXISTS authorization_steps (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    service_id  TEXT NOT NULL,
    stage       INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_authorization_steps_service ON authorization_steps(service_id);

CREATE TABLE IF NOT EXISTS subzones (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    zone_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS service_configs (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    service_id  TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS form_availability (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    service_id  TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_form_availability_service ON form_availability(service_id);

CREATE TABLE IF NOT EXISTS submissions (
    id              TEXT PRIMARY KEY,
    data            TEXT NOT NULL,
    service_id      TEXT NOT NULL,
    submitted_by    TEXT NOT NULL,
    status          TEXT NOT NULL,
    payment_status  TEXT NOT NULL,
    version         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_submissions_service ON submissions(service_id);
CREATE INDEX IF NOT EXISTS idx_submissions_submitted_by ON submissions(submitted_by);
CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions(status);

CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    email       TEXT NOT NULL UNIQUE,
    phone       TEXT UNIQUE,
    role        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    revoked     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
";

/// Default ordering for listings: newest first, insertion order breaking ties.
pub const NEWEST_FIRST: &str = "created_at DESC, rowid DESC";

fn storage(e: SQLError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

/// Persistent storage for every docket record, backed by SQLStore (SQLite).
pub struct DocketStore {
    db: Arc<dyn SQLStore>,
}

impl DocketStore {
    /// Create the store and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        db.exec_batch(SCHEMA)
            .map_err(|e| ServiceError::Storage(format!("docket schema init: {e}")))?;
        Ok(Self { db })
    }

    /// Insert a record as JSON with its indexed columns.
    ///
    /// A UNIQUE violation becomes [`ServiceError::Conflict`] with `what` in the message.
    pub fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
        what: &str,
    ) -> Result<(), ServiceError> {
        let json = serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            cols.push(col);
            placeholders.push(format!("?{}", i + 3));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );

        self.db.exec(&sql, &params).map_err(|e| {
            if e.is_constraint() {
                ServiceError::Conflict(format!("{what} already exists"))
            } else {
                storage(e)
            }
        })?;
        Ok(())
    }

    /// Get a record by id.
    pub fn get_record<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<T, ServiceError> {
        self.find_record(table, &[("id", Value::Text(id.to_string()))])?
            .ok_or_else(|| ServiceError::NotFound(format!("{} '{}' not found", singular(table), id)))
    }

    /// First record matching all `filters`, newest first.
    pub fn find_record<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
    ) -> Result<Option<T>, ServiceError> {
        let (where_sql, params) = where_clause(filters);
        let sql = format!("SELECT data FROM {table}{where_sql} ORDER BY {NEWEST_FIRST} LIMIT 1");
        let rows = self.db.query(&sql, &params).map_err(storage)?;
        rows.first().map(row_to_record).transpose()
    }

    /// Replace a record's JSON and indexed columns.
    pub fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), ServiceError> {
        let affected = self.write_record(table, id, None, record, indexes)?;
        if affected == 0 {
            return Err(ServiceError::NotFound(format!("{} '{}' not found", singular(table), id)));
        }
        Ok(())
    }

    /// Replace a record only if its `version` column still equals `expected`.
    ///
    /// The caller bumps the version inside `record` and passes it in `indexes`.
    /// Returns `false` when another writer got there first (or the id is gone).
    pub fn update_record_cas<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        expected: i64,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<bool, ServiceError> {
        Ok(self.write_record(table, id, Some(expected), record, indexes)? > 0)
    }

    fn write_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        expected_version: Option<i64>,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<u64, ServiceError> {
        let json = serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];
        for (col, val) in indexes {
            params.push(val.clone());
            sets.push(format!("{} = ?{}", col, params.len()));
        }

        params.push(Value::Text(id.to_string()));
        let mut sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            params.len(),
        );
        if let Some(v) = expected_version {
            params.push(Value::Integer(v));
            sql.push_str(&format!(" AND version = ?{}", params.len()));
        }

        self.db.exec(&sql, &params).map_err(|e| {
            if e.is_constraint() {
                ServiceError::Conflict(e.to_string())
            } else {
                storage(e)
            }
        })
    }

    /// Page through records matching `filters`, newest first.
    pub fn list_records<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<T>, usize), ServiceError> {
        let (where_sql, mut params) = where_clause(filters);

        let count_sql = format!("SELECT COUNT(*) AS cnt FROM {table}{where_sql}");
        let total = self
            .db
            .query(&count_sql, &params)
            .map_err(storage)?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        params.push(Value::Integer(limit as i64));
        let limit_idx = params.len();
        params.push(Value::Integer(offset as i64));
        let offset_idx = params.len();

        let sql = format!(
            "SELECT data FROM {table}{where_sql} ORDER BY {NEWEST_FIRST} LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        );
        let rows = self.db.query(&sql, &params).map_err(storage)?;
        let items = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    /// Every record matching `filters` in the given `ORDER BY` order.
    pub fn all_records<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        order_by: &str,
    ) -> Result<Vec<T>, ServiceError> {
        let (where_sql, params) = where_clause(filters);
        let sql = format!("SELECT data FROM {table}{where_sql} ORDER BY {order_by}");
        let rows = self.db.query(&sql, &params).map_err(storage)?;
        rows.iter().map(row_to_record).collect()
    }

    /// Count records matching `filters`.
    pub fn count(&self, table: &str, filters: &[(&str, Value)]) -> Result<usize, ServiceError> {
        let (where_sql, params) = where_clause(filters);
        let sql = format!("SELECT COUNT(*) AS cnt FROM {table}{where_sql}");
        Ok(self
            .db
            .query(&sql, &params)
            .map_err(storage)?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize)
    }

    /// Largest value of an integer column among matching records.
    pub fn max_i64(
        &self,
        table: &str,
        column: &str,
        filters: &[(&str, Value)],
    ) -> Result<Option<i64>, ServiceError> {
        let (where_sql, params) = where_clause(filters);
        let sql = format!("SELECT MAX({column}) AS m FROM {table}{where_sql}");
        Ok(self
            .db
            .query(&sql, &params)
            .map_err(storage)?
            .first()
            .and_then(|r| r.get_i64("m")))
    }
}

fn where_clause(filters: &[(&str, Value)]) -> (String, Vec<Value>) {
    if filters.is_empty() {
        return (String::new(), Vec::new());
    }
    let clauses: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, (col, _))| format!("{} = ?{}", col, i + 1))
        .collect();
    let params = filters.iter().map(|(_, v)| v.clone()).collect();
    (format!(" WHERE {}", clauses.join(" AND ")), params)
}

/// Deserialize a record from a row's `data` JSON column.
fn row_to_record<T: DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let json = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Storage("missing data column".into()))?;
    serde_json::from_str(json).map_err(|e| ServiceError::Storage(format!("bad record json: {e}")))
}

fn singular(table: &str) -> &str {
    match table {
        table::SERVICES => "service",
        table::FORM_FIELDS => "form field",
        table::OPTION_LISTS => "option list",
        table::OPTION_LIST_ENTRIES => "option list entry",
        table::AUTHORIZATION_STEPS => "authorization step",
        table::SUBZONES => "subzone",
        table::SERVICE_CONFIGS => "service config",
        table::FORM_AVAILABILITY => "form availability",
        table::SUBMISSIONS => "submission",
        table::USERS => "user",
        table::SESSIONS => "session",
        other => other,
    }
}
