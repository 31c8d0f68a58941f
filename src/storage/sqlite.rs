//! SQLite mirror store.
//!
//! Mirror tables have no declared keys. Each table is created from the
//! column list of the first batch written to it, and refreshed either
//! wholesale ([`SqliteStorage::replace`]) or by partition
//! ([`SqliteStorage::replace_partitions`]).

use crate::error::{Error, Result};
use crate::projection::{Cell, ColumnKind, ColumnSpec, RowBatch, temporal};
use crate::storage::schema::apply_schema;
use chrono::SecondsFormat;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Keys bound per `DELETE ... IN (...)` statement, under SQLite's 999 limit.
const DELETE_CHUNK: usize = 500;

/// How long a write waits on a locked database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based mirror store.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(n) => ToSqlOutput::Owned(Value::Integer(*n)),
            Self::Real(n) => ToSqlOutput::Owned(Value::Real(*n)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
        })
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies the bookkeeping schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a write inside an IMMEDIATE transaction; rolled back on error.
    fn write<F, R>(&mut self, op: &str, table: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, table, "Mirror write committed");
        Ok(result)
    }

    // ==================
    // Mirror Operations
    // ==================

    /// Check whether a table exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog query fails.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
            .exists([table])?;
        Ok(exists)
    }

    /// Drop and rewrite a table's full contents in one transaction.
    ///
    /// An empty batch is a no-op: the existing table is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid identifiers or if any statement fails;
    /// the previous contents survive a failed replace.
    pub fn replace(&mut self, table: &str, batch: &RowBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let create = create_table_sql(table, &batch.columns, false)?;
        let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table)?);

        self.write("replace", table, |tx| {
            tx.execute(&drop_sql, [])?;
            tx.execute(&create, [])?;
            insert_rows(tx, table, batch)
        })
    }

    /// Insert rows without touching existing contents.
    ///
    /// Creates the table from the batch's columns if it does not exist yet.
    /// An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid identifiers, or when the existing table's
    /// columns do not accept the batch.
    pub fn append(&mut self, table: &str, batch: &RowBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let create = create_table_sql(table, &batch.columns, true)?;

        self.write("append", table, |tx| {
            tx.execute(&create, [])?;
            insert_rows(tx, table, batch)
        })
    }

    /// Delete rows whose `key_column` value is in `keys`.
    ///
    /// A missing table or an empty key set deletes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid identifiers or if the delete fails.
    pub fn delete_where<K: ToSql>(
        &mut self,
        table: &str,
        key_column: &str,
        keys: &[K],
    ) -> Result<usize> {
        if keys.is_empty() || !self.table_exists(table)? {
            return Ok(0);
        }
        let table_q = quote_ident(table)?;
        let column_q = quote_ident(key_column)?;

        self.write("delete_where", table, |tx| {
            delete_keys(tx, &table_q, &column_q, keys)
        })
    }

    /// Swap the rows of the partitions named by `keys` for `batch`.
    ///
    /// The delete and the insert share one transaction, so a rejected
    /// insert leaves the old partitions in place. Creates the table from the
    /// batch's columns if needed. Returns `(deleted, written)`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid identifiers or if any statement fails.
    pub fn replace_partitions<K: ToSql>(
        &mut self,
        table: &str,
        key_column: &str,
        keys: &[K],
        batch: &RowBatch,
    ) -> Result<(usize, usize)> {
        if keys.is_empty() && batch.is_empty() {
            return Ok((0, 0));
        }
        let exists = self.table_exists(table)?;
        let create = if batch.is_empty() {
            None
        } else {
            Some(create_table_sql(table, &batch.columns, true)?)
        };
        let table_q = quote_ident(table)?;
        let column_q = quote_ident(key_column)?;

        self.write("replace_partitions", table, |tx| {
            let deleted = if exists {
                delete_keys(tx, &table_q, &column_q, keys)?
            } else {
                0
            };
            let written = match &create {
                Some(create) => {
                    tx.execute(create, [])?;
                    insert_rows(tx, table, batch)?
                }
                None => 0,
            };
            Ok((deleted, written))
        })
    }

    /// Read a whole table back, with column kinds recovered from the
    /// declared column types. `None` if the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn read_table(&self, table: &str) -> Result<Option<RowBatch>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let columns = self.table_columns(table)?;
        let select = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let sql = format!("SELECT {select} FROM {} ORDER BY rowid", quote_ident(table)?);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| row.get_ref(i).map(|v| read_cell(v, col.kind)))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(RowBatch { columns, rows }))
    }

    /// Distinct non-null values of one column, rendered as keys.
    ///
    /// An absent table yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid identifiers or if the query fails.
    pub fn read_column_keys(&self, table: &str, column: &str) -> Result<BTreeSet<String>> {
        if !self.table_exists(table)? {
            return Ok(BTreeSet::new());
        }
        let sql = format!(
            "SELECT DISTINCT {col} FROM {tbl} WHERE {col} IS NOT NULL",
            col = quote_ident(column)?,
            tbl = quote_ident(table)?
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let keys = stmt
            .query_map([], |row| {
                Ok(read_cell(row.get_ref(0)?, ColumnKind::Text).to_key())
            })?
            .filter_map(|k| k.transpose())
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(keys)
    }

    /// Number of rows in a table, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn row_count(&self, table: &str) -> Result<Option<u64>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(Some(u64::try_from(count).unwrap_or(0)))
    }

    fn table_columns(&self, table: &str) -> Result<Vec<ColumnSpec>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table], |row| {
                let name: String = row.get(0)?;
                let declared: String = row.get(1)?;
                Ok(ColumnSpec::new(name, ColumnKind::from_sql_type(&declared)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }
}

fn delete_keys<K: ToSql>(
    tx: &Transaction,
    table_q: &str,
    column_q: &str,
    keys: &[K],
) -> Result<usize> {
    let mut deleted = 0;
    for chunk in keys.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("DELETE FROM {table_q} WHERE {column_q} IN ({placeholders})");
        deleted += tx.execute(&sql, rusqlite::params_from_iter(chunk.iter()))?;
    }
    Ok(deleted)
}

fn insert_rows(tx: &Transaction, table: &str, batch: &RowBatch) -> Result<usize> {
    let names = batch
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let placeholders = (1..=batch.columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_ident(table)?
    );

    let mut stmt = tx.prepare(&sql)?;
    for row in &batch.rows {
        if row.len() != batch.columns.len() {
            return Err(Error::Projection(format!(
                "row has {} values for {} columns in {table}",
                row.len(),
                batch.columns.len()
            )));
        }
        stmt.execute(rusqlite::params_from_iter(row.iter()))?;
    }
    Ok(batch.rows.len())
}

fn create_table_sql(table: &str, columns: &[ColumnSpec], if_not_exists: bool) -> Result<String> {
    if columns.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "cannot create table {table} without columns"
        )));
    }
    let defs = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.kind.sql_type())))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
    Ok(format!("CREATE TABLE {guard}{} ({defs})", quote_ident(table)?))
}

/// Validate and double-quote an SQL identifier.
fn quote_ident(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::InvalidArgument(format!("invalid identifier: {name:?}")));
    }
    Ok(format!("\"{name}\""))
}

fn read_cell(value: ValueRef<'_>, kind: ColumnKind) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(n) => match kind {
            #[allow(clippy::cast_precision_loss)]
            ColumnKind::Real => Cell::Real(n as f64),
            ColumnKind::Text => Cell::Text(n.to_string()),
            _ => Cell::Integer(n),
        },
        ValueRef::Real(n) => Cell::Real(n),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match kind {
                ColumnKind::Timestamp => {
                    temporal::parse_utc(&text).map_or(Cell::Text(text), Cell::Timestamp)
                }
                ColumnKind::Integer => text.parse().map_or(Cell::Text(text), Cell::Integer),
                _ => Cell::Text(text),
            }
        }
    }
}
