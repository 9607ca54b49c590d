//! Generic SQL access layer over one SQLite file: statement execution,
//! schema introspection, and the schema-mutation primitives the engine
//! has no native support for (insert-at-position, delete, rename, retype),
//! synthesized through whole-table recreation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::schema::{quote_identifier, ColumnDefinition, ColumnTuple, ColumnTuplesWithWhere, SqlType};

/// Rows per transaction when batching inserts/updates. Bounds the
/// durability-sync overhead on tables with hundreds of thousands of rows.
pub const ROWS_PER_TRANSACTION: usize = 50_000;

#[derive(Debug)]
pub struct SqlDatabase {
    conn: Connection,
    path: PathBuf,
}

impl SqlDatabase {
    /// Open an existing database file and validate its integrity.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileCorrupt(path.to_path_buf()));
        }
        let conn = Connection::open(path)?;
        // Pragmas fail outright on a file that is not a database.
        configure(&conn).map_err(|_| Error::FileCorrupt(path.to_path_buf()))?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.validate()?;
        Ok(db)
    }

    /// Create a new database file, making parent directories as needed.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        configure(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn validate(&self) -> Result<()> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|_| Error::FileCorrupt(self.path.clone()))?;
        if verdict != "ok" {
            return Err(Error::FileCorrupt(self.path.clone()));
        }
        Ok(())
    }

    // ── Tables ───────────────────────────────────────────────────────

    pub fn table_exists(&self, table: &str) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .is_ok()
    }

    /// Create a table from the definition list. Destructive: any
    /// pre-existing table of the same name is dropped first.
    pub fn create_table(&self, table: &str, columns: &[ColumnDefinition]) -> Result<()> {
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)), [])?;
        self.conn.execute(&create_table_sql(table, columns), [])?;
        Ok(())
    }

    pub fn drop_table(&self, table: &str) -> Result<()> {
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)), [])?;
        Ok(())
    }

    pub fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        self.conn.execute(
            &format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_identifier(from),
                quote_identifier(to)
            ),
            [],
        )?;
        Ok(())
    }

    // ── Indexes ──────────────────────────────────────────────────────

    /// Idempotent: creating an index that already exists is a no-op.
    pub fn index_create(&self, name: &str, table: &str, columns: &[&str]) -> Result<()> {
        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({column_list})",
                quote_identifier(name),
                quote_identifier(table)
            ),
            [],
        )?;
        Ok(())
    }

    /// Idempotent: dropping a missing index is a no-op.
    pub fn index_drop(&self, name: &str) -> Result<()> {
        self.conn
            .execute(&format!("DROP INDEX IF EXISTS {}", quote_identifier(name)), [])?;
        Ok(())
    }

    // ── Batched row CRUD ─────────────────────────────────────────────

    /// Insert rows one statement each, grouped into transactions of
    /// `ROWS_PER_TRANSACTION`. A failure rolls back its chunk; the error
    /// reports how many rows earlier chunks had already committed.
    pub fn insert(&mut self, table: &str, rows: &[Vec<ColumnTuple>]) -> Result<usize> {
        let total = rows.len();
        let mut committed = 0usize;

        for chunk in rows.chunks(ROWS_PER_TRANSACTION) {
            let tx = self.conn.transaction()?;
            let mut in_chunk = 0usize;
            for row in chunk {
                if row.is_empty() {
                    continue;
                }
                let names = row
                    .iter()
                    .map(|t| quote_identifier(&t.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                let placeholders = (1..=row.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "INSERT INTO {} ({names}) VALUES ({placeholders})",
                    quote_identifier(table)
                );
                let params: Vec<&dyn rusqlite::types::ToSql> =
                    row.iter().map(|t| &t.value as &dyn rusqlite::types::ToSql).collect();
                tx.execute(&sql, params.as_slice()).map_err(|source| {
                    Error::TransactionFailure {
                        applied: committed,
                        total,
                        source,
                    }
                })?;
                in_chunk += 1;
            }
            tx.commit()?;
            committed += in_chunk;
        }
        Ok(committed)
    }

    /// Apply row mutations one UPDATE each, transaction-chunked like
    /// `insert`. Mutations with no columns are skipped.
    pub fn update(&mut self, table: &str, mutations: &[ColumnTuplesWithWhere]) -> Result<usize> {
        let total = mutations.len();
        let mut committed = 0usize;

        for chunk in mutations.chunks(ROWS_PER_TRANSACTION) {
            let tx = self.conn.transaction()?;
            let mut in_chunk = 0usize;
            for mutation in chunk {
                if mutation.columns.is_empty() {
                    continue;
                }
                let sets = mutation
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("{} = ?{}", quote_identifier(&t.name), i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!("UPDATE {} SET {sets}", quote_identifier(table));
                if let Some(wher) = &mutation.wher {
                    sql.push_str(" WHERE ");
                    sql.push_str(wher);
                }
                let params: Vec<&dyn rusqlite::types::ToSql> = mutation
                    .columns
                    .iter()
                    .map(|t| &t.value as &dyn rusqlite::types::ToSql)
                    .collect();
                tx.execute(&sql, params.as_slice()).map_err(|source| {
                    Error::TransactionFailure {
                        applied: committed,
                        total,
                        source,
                    }
                })?;
                in_chunk += 1;
            }
            tx.commit()?;
            committed += in_chunk;
        }
        Ok(committed)
    }

    /// Delete rows matching the filter, or every row when absent.
    /// Returns the number of rows removed.
    pub fn delete_rows(&self, table: &str, wher: Option<&str>) -> Result<usize> {
        let mut sql = format!("DELETE FROM {}", quote_identifier(table));
        if let Some(wher) = wher {
            sql.push_str(" WHERE ");
            sql.push_str(wher);
        }
        Ok(self.conn.execute(&sql, [])?)
    }

    pub fn count_rows(&self, table: &str, wher: Option<&str>) -> Result<i64> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        if let Some(wher) = wher {
            sql.push_str(" WHERE ");
            sql.push_str(wher);
        }
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Read the named columns of every matching row, with each cell
    /// rendered to its string form (NULL stays `None`).
    pub fn select_rows(
        &self,
        table: &str,
        columns: &[&str],
        wher: Option<&str>,
    ) -> Result<Vec<Vec<Option<String>>>> {
        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {column_list} FROM {}", quote_identifier(table));
        if let Some(wher) = wher {
            sql.push_str(" WHERE ");
            sql.push_str(wher);
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let mut cells = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    cells.push(value_to_string(row.get::<_, Value>(i)?));
                }
                Ok(cells)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Read a single cell, `None` when no row matches or the cell is NULL.
    pub fn scalar_string(&self, table: &str, column: &str, wher: Option<&str>) -> Option<String> {
        let mut sql = format!(
            "SELECT {} FROM {} LIMIT 1",
            quote_identifier(column),
            quote_identifier(table)
        );
        if let Some(wher) = wher {
            sql = format!(
                "SELECT {} FROM {} WHERE {wher} LIMIT 1",
                quote_identifier(column),
                quote_identifier(table)
            );
        }
        self.conn
            .query_row(&sql, [], |row| row.get::<_, Value>(0))
            .ok()
            .and_then(value_to_string)
    }

    /// Execute an ad-hoc statement, returning the affected row count.
    pub fn execute(&self, sql: &str) -> Result<usize> {
        Ok(self.conn.execute(sql, [])?)
    }

    // ── Schema introspection ─────────────────────────────────────────
    //
    // Introspection collapses errors to false/empty: callers treat
    // "missing" and "unreadable" identically and never create from it.

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.column_names(table).iter().any(|name| name == column)
    }

    pub fn column_names(&self, table: &str) -> Vec<String> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let Ok(mut stmt) = self.conn.prepare(&sql) else {
            return Vec::new();
        };
        stmt.query_map([], |row| row.get::<_, String>(1))
            .and_then(|rows| rows.collect())
            .unwrap_or_default()
    }

    pub fn columns_and_defaults(&self, table: &str) -> HashMap<String, Option<String>> {
        self.column_definitions(table)
            .map(|defs| {
                defs.into_iter()
                    .map(|def| (def.name, def.default_value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The full ordered definition list, reconstructed from
    /// `pragma_table_info`. Mutation primitives build on this.
    pub fn column_definitions(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
        let sql = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let defs = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get(2)?;
                let default: Option<String> = row.get(4)?;
                Ok((name, declared, default))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if defs.is_empty() {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: "table does not exist".to_string(),
            });
        }
        Ok(defs
            .into_iter()
            .map(|(name, declared, default)| ColumnDefinition {
                name,
                sql_type: SqlType::from_declared(&declared),
                default_value: default.map(|d| strip_literal_quotes(&d)),
            })
            .collect())
    }

    // ── Schema mutation ──────────────────────────────────────────────

    /// Fast path: the engine's native ADD COLUMN, which can only append.
    pub fn add_column_at_end(&self, table: &str, definition: &ColumnDefinition) -> Result<()> {
        if self.column_exists(table, &definition.name) {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: format!("column {} already exists", definition.name),
            });
        }
        self.conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(table),
                definition.as_create_fragment()
            ),
            [],
        )?;
        Ok(())
    }

    /// Insert a column at an arbitrary ordinal position. The engine has
    /// no native support for this, so the table is recreated with the
    /// spliced schema and all rows copied across; existing rows take the
    /// new column's declared default.
    pub fn add_column_at(
        &mut self,
        table: &str,
        position: usize,
        definition: &ColumnDefinition,
    ) -> Result<()> {
        let mut defs = self.column_definitions(table)?;
        if defs.iter().any(|d| d.name == definition.name) {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: format!("column {} already exists", definition.name),
            });
        }
        let keep: Vec<(String, String)> = defs
            .iter()
            .map(|d| (d.name.clone(), d.name.clone()))
            .collect();
        defs.insert(position.min(defs.len()), definition.clone());
        self.recreate_table(table, &defs, &keep)
    }

    pub fn delete_column(&mut self, table: &str, column: &str) -> Result<()> {
        let defs = self.column_definitions(table)?;
        if !defs.iter().any(|d| d.name == column) {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: format!("column {column} does not exist"),
            });
        }
        let remaining: Vec<ColumnDefinition> =
            defs.into_iter().filter(|d| d.name != column).collect();
        let keep: Vec<(String, String)> = remaining
            .iter()
            .map(|d| (d.name.clone(), d.name.clone()))
            .collect();
        self.recreate_table(table, &remaining, &keep)
    }

    pub fn rename_column(&mut self, table: &str, from: &str, to: &str) -> Result<()> {
        let mut defs = self.column_definitions(table)?;
        if !defs.iter().any(|d| d.name == from) {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: format!("column {from} does not exist"),
            });
        }
        if defs.iter().any(|d| d.name == to) {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: format!("column {to} already exists"),
            });
        }
        let keep: Vec<(String, String)> = defs
            .iter()
            .map(|d| {
                if d.name == from {
                    (to.to_string(), from.to_string())
                } else {
                    (d.name.clone(), d.name.clone())
                }
            })
            .collect();
        for def in &mut defs {
            if def.name == from {
                def.name = to.to_string();
            }
        }
        self.recreate_table(table, &defs, &keep)
    }

    /// Change a column's declared type and default in place. Values are
    /// carried across unchanged (SQLite stores them dynamically).
    pub fn retype_column(
        &mut self,
        table: &str,
        column: &str,
        sql_type: SqlType,
        default_value: Option<&str>,
    ) -> Result<()> {
        let mut defs = self.column_definitions(table)?;
        if !defs.iter().any(|d| d.name == column) {
            return Err(Error::SchemaConflict {
                table: table.to_string(),
                message: format!("column {column} does not exist"),
            });
        }
        for def in &mut defs {
            if def.name == column {
                def.sql_type = sql_type;
                def.default_value = default_value.map(|d| d.to_string());
            }
        }
        let keep: Vec<(String, String)> = defs
            .iter()
            .map(|d| (d.name.clone(), d.name.clone()))
            .collect();
        self.recreate_table(table, &defs, &keep)
    }

    /// The create-copy-drop-rename pattern behind every synthesized
    /// schema change. Runs as a single transaction so a crash mid-way
    /// cannot lose the original table. Foreign-key enforcement is
    /// suspended across the drop (it must be toggled outside the
    /// transaction; SQLite ignores the pragma inside one) and restored
    /// afterwards.
    fn recreate_table(
        &mut self,
        table: &str,
        new_definitions: &[ColumnDefinition],
        copy: &[(String, String)],
    ) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "OFF")?;
        let outcome = self.recreate_table_inner(table, new_definitions, copy);
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        outcome
    }

    fn recreate_table_inner(
        &mut self,
        table: &str,
        new_definitions: &[ColumnDefinition],
        copy: &[(String, String)],
    ) -> Result<()> {
        let temp = format!("{table}_recreated");
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_identifier(&temp)), [])?;
        tx.execute(&create_table_sql(&temp, new_definitions), [])?;

        let dst = copy
            .iter()
            .map(|(d, _)| quote_identifier(d))
            .collect::<Vec<_>>()
            .join(", ");
        let src = copy
            .iter()
            .map(|(_, s)| quote_identifier(s))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute(
            &format!(
                "INSERT INTO {} ({dst}) SELECT {src} FROM {}",
                quote_identifier(&temp),
                quote_identifier(table)
            ),
            [],
        )?;
        tx.execute(&format!("DROP TABLE {}", quote_identifier(table)), [])?;
        tx.execute(
            &format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_identifier(&temp),
                quote_identifier(table)
            ),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// A leading `Id INTEGER` column renders as the rowid primary key.
fn create_table_sql(table: &str, columns: &[ColumnDefinition]) -> String {
    let fragments = columns
        .iter()
        .enumerate()
        .map(|(i, def)| {
            if i == 0 && def.name == "Id" && def.sql_type == SqlType::Integer {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_identifier(&def.name))
            } else {
                def.as_create_fragment()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({fragments})", quote_identifier(table))
}

/// `pragma_table_info` reports text defaults with their quotes attached;
/// strip them so definitions round-trip through recreation.
fn strip_literal_quotes(default: &str) -> String {
    let trimmed = default.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].replace("''", "'")
    } else {
        trimmed.to_string()
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(t) => Some(t),
        Value::Blob(_) => None,
    }
}
