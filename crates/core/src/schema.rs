//! Declarative schema descriptors: column definitions, cell values, and
//! row mutations. These are pure values; rendering them to SQL fragments
//! is their only behavior.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The column types the data model uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Text,
    Real,
    Integer,
    DateTime,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Real => "REAL",
            SqlType::Integer => "INTEGER",
            SqlType::DateTime => "DATETIME",
        }
    }

    /// Map a declared type from `pragma_table_info` back to a descriptor.
    pub fn from_declared(declared: &str) -> SqlType {
        let upper = declared.to_uppercase();
        if upper.contains("DATETIME") {
            SqlType::DateTime
        } else if upper.contains("INT") {
            SqlType::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SqlType::Real
        } else {
            SqlType::Text
        }
    }
}

/// Quote an identifier for embedding in a statement.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a literal value for embedding in a DEFAULT clause.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One column of a table: name, type, and optional default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: SqlType,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: &str, sql_type: SqlType) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::InvalidColumn("column name is empty".to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            sql_type,
            default_value: None,
        })
    }

    pub fn with_default(name: &str, sql_type: SqlType, default_value: &str) -> Result<Self> {
        let mut def = Self::new(name, sql_type)?;
        def.default_value = Some(default_value.to_string());
        Ok(def)
    }

    /// Render as a fragment of a CREATE TABLE statement.
    pub fn as_create_fragment(&self) -> String {
        match &self.default_value {
            Some(default) => format!(
                "{} {} DEFAULT {}",
                quote_identifier(&self.name),
                self.sql_type.as_sql(),
                quote_literal(default)
            ),
            None => format!("{} {}", quote_identifier(&self.name), self.sql_type.as_sql()),
        }
    }
}

/// One cell to write: column name and value. `None` renders as SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTuple {
    pub name: String,
    pub value: Option<String>,
}

impl ColumnTuple {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    pub fn null(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }
}

/// One UPDATE statement's SET clause plus an optional WHERE clause.
/// An empty column list is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ColumnTuplesWithWhere {
    pub columns: Vec<ColumnTuple>,
    pub wher: Option<String>,
}

impl ColumnTuplesWithWhere {
    pub fn new(columns: Vec<ColumnTuple>) -> Self {
        Self {
            columns,
            wher: None,
        }
    }

    pub fn with_where(columns: Vec<ColumnTuple>, wher: &str) -> Self {
        Self {
            columns,
            wher: Some(wher.to_string()),
        }
    }

    /// Convenience for the common "update the row with this Id" case.
    pub fn for_id(columns: Vec<ColumnTuple>, id: i64) -> Self {
        Self::with_where(columns, &format!("Id = {id}"))
    }
}
