use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use serde_json::{Number, Value};
use std::path::Path;

use crate::error::{Result, SabimError};
use crate::record::Record;

/// Bibliography columns of the relational store, with their SQLite types.
///
/// `id` is the auto-incrementing primary key; the citation key lives in `bibkey`.
pub const BIBTEX_COLUMNS: [(&str, &str); 17] = [
    ("bibkey", "TEXT"),
    ("title", "TEXT"),
    ("shorttitle", "TEXT"),
    ("author", "TEXT"),
    ("year", "INTEGER"),
    ("month", "TEXT"),
    ("journal", "TEXT"),
    ("volume", "INTEGER"),
    ("number", "INTEGER"),
    ("pages", "TEXT"),
    ("publisher", "TEXT"),
    ("issn", "TEXT"),
    ("doi", "TEXT"),
    ("urldate", "TEXT"),
    ("abstract", "TEXT"),
    ("keywords", "TEXT"),
    ("file", "TEXT"),
];

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex pattern")
});

/// One row of the bibliography table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Auto-assigned primary key.
    pub id: i64,
    /// The row's columns, with `bibkey` as the record id.
    pub record: Record,
}

/// Bibliography table in a SQLite database with plain CRUD access.
pub struct SqliteTable {
    conn: Connection,
    table: String,
}

impl SqliteTable {
    /// Open an existing database file.
    pub fn open(path: &Path, table: &str) -> Result<Self> {
        if !path.exists() {
            return Err(SabimError::NotFound(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        Self::with_connection(conn, table)
    }

    /// Open a database file, creating it if needed.
    pub fn create(path: &Path, table: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        if !IDENTIFIER_REGEX.is_match(table) {
            return Err(SabimError::InvalidInput(format!("invalid table name '{}'", table)));
        }
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// Create the table if it does not exist yet.
    pub fn init(&self) -> Result<()> {
        let column_defs = BIBTEX_COLUMNS
            .iter()
            .map(|(name, sql_type)| format!("\"{}\" {}", name, sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
                self.table, column_defs
            ),
            [],
        )?;
        info!("Initialised table {}", self.table);
        Ok(())
    }

    /// Read every row, ordered by primary key.
    pub fn read(&self) -> Result<Vec<TableRow>> {
        let columns = column_list();
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, {} FROM {} ORDER BY id", columns, self.table))?;

        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let mut record = Record::new(String::new());
            for (index, (name, _)) in BIBTEX_COLUMNS.iter().enumerate() {
                let value = sql_to_json(row.get_ref(index + 1)?);
                if *name == "bibkey" {
                    record.id = value.as_str().unwrap_or_default().to_string();
                } else {
                    record.set(*name, value);
                }
            }
            Ok(TableRow { id, record })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        debug!("Read {} rows from {}", result.len(), self.table);
        Ok(result)
    }

    /// Insert a record and return its primary key.
    ///
    /// Fields outside [`BIBTEX_COLUMNS`] are not stored.
    pub fn create_row(&self, record: &Record) -> Result<i64> {
        let (names, values) = known_columns(record);
        let placeholders = vec!["?"; names.len()].join(", ");
        let quoted: Vec<String> = names.iter().map(|name| format!("\"{}\"", name)).collect();
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                quoted.join(", "),
                placeholders
            ),
            params_from_iter(values),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Append a record as a new row; alias of [`SqliteTable::create_row`].
    pub fn append(&self, record: &Record) -> Result<i64> {
        self.create_row(record)
    }

    /// Overwrite the row with primary key `id`. Returns the number of rows changed.
    pub fn write(&self, id: i64, record: &Record) -> Result<usize> {
        let (names, mut values) = known_columns(record);
        let assignments = set_clause(&names);
        values.push(SqlValue::Integer(id));
        let changed = self.conn.execute(
            &format!("UPDATE {} SET {} WHERE id = ?", self.table, assignments),
            params_from_iter(values),
        )?;
        Ok(changed)
    }

    /// Update every row whose `condition_column` equals the record's value for
    /// that column (`bibkey` matches the record id).
    pub fn update(&self, record: &Record, condition_column: &str) -> Result<usize> {
        check_column(condition_column)?;
        let (names, mut values) = known_columns(record);
        let condition_value = names
            .iter()
            .position(|name| *name == condition_column)
            .map(|position| values[position].clone())
            .ok_or_else(|| {
                SabimError::InvalidInput(format!(
                    "record '{}' has no value for condition column '{}'",
                    record.id, condition_column
                ))
            })?;
        values.push(condition_value);

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET {} WHERE \"{}\" = ?",
                self.table,
                set_clause(&names),
                condition_column
            ),
            params_from_iter(values),
        )?;
        Ok(changed)
    }

    /// Delete rows where `column` equals `value`. Returns the number of rows removed.
    pub fn remove(&self, column: &str, value: &Value) -> Result<usize> {
        if column != "id" {
            check_column(column)?;
        }
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE \"{}\" = ?", self.table, column),
            params![json_to_sql(value)],
        )?;
        Ok(removed)
    }
}

fn column_list() -> String {
    BIBTEX_COLUMNS
        .iter()
        .map(|(name, _)| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn set_clause(names: &[&'static str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}\" = ?", name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_column(column: &str) -> Result<()> {
    if BIBTEX_COLUMNS.iter().any(|(name, _)| *name == column) {
        Ok(())
    } else {
        Err(SabimError::InvalidInput(format!("unknown column '{}'", column)))
    }
}

/// Column names and values of the record that the table can hold.
fn known_columns(record: &Record) -> (Vec<&'static str>, Vec<SqlValue>) {
    let mut names = vec!["bibkey"];
    let mut values = vec![SqlValue::Text(record.id.clone())];
    for (name, _) in BIBTEX_COLUMNS.iter().skip(1) {
        if let Some(value) = record.get(name) {
            names.push(*name);
            values.push(json_to_sql(value));
        }
    }
    (names, values)
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SqliteTable {
        let table = SqliteTable::open_in_memory("articles").unwrap();
        table.init().unwrap();
        table
    }

    #[test]
    fn create_and_read_back() {
        let table = table();
        let id = table
            .create_row(&Record::new("keyA").field("title", "Graphene").field("year", "2004").field("url", "x"))
            .unwrap();

        let rows = table.read().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].record.id, "keyA");
        assert_eq!(rows[0].record.get_str("title"), Some("Graphene"));
        // INTEGER affinity turns the numeric string into a number
        assert_eq!(rows[0].record.get("year"), Some(&Value::from(2004)));
        assert!(rows[0].record.get("url").is_none());
    }

    #[test]
    fn update_by_column_and_remove() {
        let table = table();
        table.create_row(&Record::new("keyA").field("title", "Old")).unwrap();
        table.create_row(&Record::new("keyB").field("title", "Other")).unwrap();

        let changed = table
            .update(&Record::new("keyA").field("title", "New"), "bibkey")
            .unwrap();
        assert_eq!(changed, 1);

        let rows = table.read().unwrap();
        assert_eq!(rows[0].record.get_str("title"), Some("New"));
        assert_eq!(rows[1].record.get_str("title"), Some("Other"));

        let removed = table.remove("bibkey", &Value::from("keyB")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(table.read().unwrap().len(), 1);
    }

    #[test]
    fn write_by_primary_key() {
        let table = table();
        let id = table.append(&Record::new("keyA").field("journal", "Nature")).unwrap();
        table.write(id, &Record::new("keyA").field("journal", "Science")).unwrap();
        assert_eq!(table.read().unwrap()[0].record.get_str("journal"), Some("Science"));
    }

    #[test]
    fn open_missing_database_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("articles.db");
        assert!(matches!(
            SqliteTable::open(&missing, "articles"),
            Err(SabimError::NotFound(path)) if path == missing
        ));
        assert!(!missing.exists());

        SqliteTable::create(&missing, "articles").unwrap().init().unwrap();
        assert!(SqliteTable::open(&missing, "articles").is_ok());
    }

    #[test]
    fn rejects_unknown_columns_and_bad_table_names() {
        let table = table();
        assert!(matches!(
            table.remove("title; DROP TABLE articles", &Value::from("x")),
            Err(SabimError::InvalidInput(_))
        ));
        assert!(matches!(
            SqliteTable::open_in_memory("bad name"),
            Err(SabimError::InvalidInput(_))
        ));
    }
}
