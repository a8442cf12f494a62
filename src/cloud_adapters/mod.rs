//! Adapters for interacting with spreadsheet-style tabular stores.
//!
//! A backend holds one workbook made of named sheets. Every sheet is an
//! ordered list of rows and every row is a list of text cells. Row `0` is
//! conventionally the header row, but adapters do not interpret it.

pub mod file;
pub mod google_sheets4;
pub mod retry;

use std::collections::HashMap;

pub use file::FileAdapter;
pub use google_sheets4::GoogleSheets4Adapter;
pub use retry::RetryingService;

/// Represents errors that can occur when interacting with a spreadsheet
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetError {
    /// The requested sheet does not exist.
    SheetNotFound,
    /// The requested row does not exist.
    RowNotFound,
    /// A temporary failure that may succeed when retried.
    Transient(String),
    /// A failure that will not go away by retrying.
    Permanent(String),
}

impl SpreadsheetError {
    /// Returns `true` when the operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpreadsheetError::Transient(_))
    }
}

impl std::fmt::Display for SpreadsheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpreadsheetError::SheetNotFound => write!(f, "sheet not found"),
            SpreadsheetError::RowNotFound => write!(f, "row not found"),
            SpreadsheetError::Transient(msg) => write!(f, "transient error: {msg}"),
            SpreadsheetError::Permanent(msg) => write!(f, "permanent error: {msg}"),
        }
    }
}

impl std::error::Error for SpreadsheetError {}

/// Abstraction over spreadsheet services.
pub trait CloudSpreadsheetService {
    /// Creates the named sheet unless it already exists.
    fn create_sheet(&mut self, title: &str) -> Result<(), SpreadsheetError>;
    /// Appends a row of data to the given sheet.
    fn append_row(&mut self, sheet: &str, values: Vec<String>) -> Result<(), SpreadsheetError>;
    /// Appends several rows in order.
    fn append_rows(&mut self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SpreadsheetError> {
        for row in rows {
            self.append_row(sheet, row)?;
        }
        Ok(())
    }
    /// Lists all rows of the sheet, header included.
    fn list_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SpreadsheetError>;
    /// Removes the row at `index`, shifting later rows up by one.
    fn delete_row(&mut self, sheet: &str, index: usize) -> Result<(), SpreadsheetError>;
    /// Drops every row from `start` onwards and writes `rows` in their place.
    fn replace_rows_from(
        &mut self,
        sheet: &str,
        start: usize,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SpreadsheetError>;
}

impl<T: CloudSpreadsheetService + ?Sized> CloudSpreadsheetService for Box<T> {
    fn create_sheet(&mut self, title: &str) -> Result<(), SpreadsheetError> {
        (**self).create_sheet(title)
    }

    fn append_row(&mut self, sheet: &str, values: Vec<String>) -> Result<(), SpreadsheetError> {
        (**self).append_row(sheet, values)
    }

    fn append_rows(&mut self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SpreadsheetError> {
        (**self).append_rows(sheet, rows)
    }

    fn list_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        (**self).list_rows(sheet)
    }

    fn delete_row(&mut self, sheet: &str, index: usize) -> Result<(), SpreadsheetError> {
        (**self).delete_row(sheet, index)
    }

    fn replace_rows_from(
        &mut self,
        sheet: &str,
        start: usize,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SpreadsheetError> {
        (**self).replace_rows_from(sheet, start, rows)
    }
}

/// In-memory workbook, used by tests and the `memory` storage backend.
#[derive(Debug, Default, Clone)]
pub struct MemorySheetsAdapter {
    sheets: HashMap<String, Vec<Vec<String>>>,
}

impl MemorySheetsAdapter {
    /// Creates an empty workbook.
    pub fn new() -> Self {
        Self {
            sheets: HashMap::new(),
        }
    }

    fn sheet_mut(&mut self, sheet: &str) -> Result<&mut Vec<Vec<String>>, SpreadsheetError> {
        self.sheets
            .get_mut(sheet)
            .ok_or(SpreadsheetError::SheetNotFound)
    }
}

impl CloudSpreadsheetService for MemorySheetsAdapter {
    fn create_sheet(&mut self, title: &str) -> Result<(), SpreadsheetError> {
        self.sheets.entry(title.to_string()).or_default();
        Ok(())
    }

    fn append_row(&mut self, sheet: &str, values: Vec<String>) -> Result<(), SpreadsheetError> {
        self.sheet_mut(sheet)?.push(values);
        Ok(())
    }

    fn list_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        match self.sheets.get(sheet) {
            Some(rows) => Ok(rows.clone()),
            None => Err(SpreadsheetError::SheetNotFound),
        }
    }

    fn delete_row(&mut self, sheet: &str, index: usize) -> Result<(), SpreadsheetError> {
        let rows = self.sheet_mut(sheet)?;
        if index >= rows.len() {
            return Err(SpreadsheetError::RowNotFound);
        }
        rows.remove(index);
        Ok(())
    }

    fn replace_rows_from(
        &mut self,
        sheet: &str,
        start: usize,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SpreadsheetError> {
        let existing = self.sheet_mut(sheet)?;
        existing.truncate(start);
        existing.extend(rows);
        Ok(())
    }
}
