//! Core bookkeeping logic: tables, records, validation, the summary view and
//! credential checks.

pub mod auth;
pub mod schema;
pub mod store;
pub mod summary;
pub mod validation;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::cloud_adapters::SpreadsheetError;

pub use auth::{CredentialColumns, login, normalize_credential};
pub use store::RecordStore;
pub use summary::{CurrencyTotals, Summary};
pub use validation::{missing_fields, required_fields, validate};

/// Errors surfaced by the bookkeeping core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A request parameter was absent or blank.
    MissingParameter(&'static str),
    /// A record payload could not be parsed.
    InvalidFormat(String),
    /// The named table does not exist.
    NotFound(String),
    /// Required fields were absent or blank.
    ValidationFailed {
        table: Table,
        missing: Vec<&'static str>,
    },
    /// A delete index outside the table's data rows.
    OutOfRange { index: i64, len: usize },
    /// The table cannot be mutated (or read) by clients.
    Forbidden(Table),
    /// Credentials did not match any user.
    AuthFailed,
    /// The backing store failed unexpectedly.
    Internal(String),
}

impl LedgerError {
    /// Message safe to show to a client. Internal faults are not echoed.
    pub fn public_message(&self) -> String {
        match self {
            LedgerError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::MissingParameter(name) => write!(f, "Missing '{name}' parameter"),
            LedgerError::InvalidFormat(msg) => write!(f, "Invalid data format: {msg}"),
            LedgerError::NotFound(name) => write!(f, "Sheet not found: {name}"),
            LedgerError::ValidationFailed { table, missing } => write!(
                f,
                "Missing required fields for {table}: {}",
                missing.join(", ")
            ),
            LedgerError::OutOfRange { index, len } => {
                write!(f, "Row {index} is out of range (table has {len} rows)")
            }
            LedgerError::Forbidden(table) => write!(f, "Sheet {table} is protected"),
            LedgerError::AuthFailed => write!(f, "Invalid credentials"),
            LedgerError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<SpreadsheetError> for LedgerError {
    fn from(err: SpreadsheetError) -> Self {
        LedgerError::Internal(err.to_string())
    }
}

/// The tables of the bookkeeping workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Income,
    Expenses,
    Workers,
    Returns,
    Summary,
    Users,
}

impl Table {
    /// Every table, in workbook order.
    pub const ALL: [Table; 6] = [
        Table::Income,
        Table::Expenses,
        Table::Workers,
        Table::Returns,
        Table::Summary,
        Table::Users,
    ];

    /// Tables served by the `all` action. Users is never exposed.
    pub const READABLE: [Table; 5] = [
        Table::Income,
        Table::Expenses,
        Table::Workers,
        Table::Returns,
        Table::Summary,
    ];

    /// Name of the backing sheet.
    pub fn sheet_name(self) -> &'static str {
        match self {
            Table::Income => "Income",
            Table::Expenses => "Expenses",
            Table::Workers => "Workers",
            Table::Returns => "Returns",
            Table::Summary => "Summary",
            Table::Users => "Users",
        }
    }

    /// Whether clients may append to and delete from this table.
    pub fn is_transactional(self) -> bool {
        !matches!(self, Table::Summary | Table::Users)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sheet_name())
    }
}

impl FromStr for Table {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.sheet_name() == s)
            .ok_or_else(|| LedgerError::NotFound(s.to_string()))
    }
}

/// One row of a table: field name to cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a JSON object of scalar values. Numbers and booleans are kept
    /// as their text form and `null` becomes an empty cell.
    pub fn from_json(input: &str) -> Result<Self, LedgerError> {
        let value: Value =
            serde_json::from_str(input).map_err(|e| LedgerError::InvalidFormat(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(LedgerError::InvalidFormat(
                "record must be a JSON object".into(),
            ));
        };
        let mut record = Record::new();
        for (field, value) in map {
            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(LedgerError::InvalidFormat(format!(
                        "field '{field}' must be a scalar"
                    )));
                }
            };
            record.insert(field, text);
        }
        Ok(record)
    }

    /// Lays the record out in `columns` order. Absent fields become empty
    /// cells and fields outside `columns` are dropped.
    pub fn to_row(&self, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .map(|c| self.get(c).unwrap_or_default().to_string())
            .collect()
    }

    /// Reads a sheet row through its header row. Short rows are padded with
    /// empty cells; blank header cells are skipped.
    pub fn from_row(header: &[String], row: &[String]) -> Self {
        let mut record = Record::new();
        for (i, name) in header.iter().enumerate() {
            if name.trim().is_empty() {
                continue;
            }
            record.insert(name.clone(), row.get(i).cloned().unwrap_or_default());
        }
        record
    }
}
