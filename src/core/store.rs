use tracing::{debug, info, warn};

use crate::cloud_adapters::{CloudSpreadsheetService, SpreadsheetError};

use super::auth::normalize_credential;
use super::schema;
use super::summary::Summary;
use super::validation;
use super::{CredentialColumns, LedgerError, Record, Table};

/// Typed tables on top of a spreadsheet backend.
///
/// Row `0` of every sheet is the header; record indices count data rows
/// only. Every successful append or delete on a transactional table rebuilds
/// the Summary sheet before returning, so a caller that sees `Ok` can read a
/// summary that already includes its change.
///
/// The store takes `&mut self` for writes. Callers sharing it between
/// requests wrap it in a mutex, which also keeps readers from observing a
/// half-written summary.
pub struct RecordStore<S> {
    service: S,
}

impl<S: CloudSpreadsheetService> RecordStore<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Access the backing service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Creates missing sheets and writes the header row into empty ones.
    pub fn setup(&mut self) -> Result<(), LedgerError> {
        for table in Table::ALL {
            let sheet = table.sheet_name();
            self.service.create_sheet(sheet)?;
            if self.service.list_rows(sheet)?.is_empty() {
                self.service.append_row(sheet, schema::header_row(table))?;
                info!(sheet, "Wrote header row");
            }
        }
        self.recompute_summary();
        Ok(())
    }

    /// All rows of `table`, header included.
    pub(crate) fn raw_rows(&self, table: Table) -> Result<Vec<Vec<String>>, LedgerError> {
        self.service
            .list_rows(table.sheet_name())
            .map_err(|e| match e {
                SpreadsheetError::SheetNotFound => LedgerError::NotFound(table.to_string()),
                other => other.into(),
            })
    }

    /// Every data row of `table`, mapped through the sheet's header row.
    pub fn read(&self, table: Table) -> Result<Vec<Record>, LedgerError> {
        let rows = self.raw_rows(table)?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        Ok(data.iter().map(|row| Record::from_row(header, row)).collect())
    }

    /// Reads a table by sheet name.
    pub fn read_named(&self, sheet: &str) -> Result<Vec<Record>, LedgerError> {
        self.read(sheet.parse()?)
    }

    /// Every client-visible table, in workbook order.
    pub fn read_all(&self) -> Result<Vec<(Table, Vec<Record>)>, LedgerError> {
        Table::READABLE
            .into_iter()
            .map(|t| self.read(t).map(|records| (t, records)))
            .collect()
    }

    /// Validates `record` and appends it to `table`. Returns the row as
    /// written, in column order.
    pub fn append(&mut self, table: Table, record: &Record) -> Result<Vec<String>, LedgerError> {
        if !table.is_transactional() {
            return Err(LedgerError::Forbidden(table));
        }
        validation::check(table, record)?;
        let row = record.to_row(schema::columns(table));
        let sheet = table.sheet_name();
        if self.raw_rows(table)?.is_empty() {
            self.service.append_row(sheet, schema::header_row(table))?;
        }
        self.service.append_row(sheet, row.clone())?;
        info!(sheet, "Appended row");
        self.recompute_summary();
        Ok(row)
    }

    /// Removes the data row at `index`.
    pub fn delete_at(&mut self, table: Table, index: i64) -> Result<(), LedgerError> {
        if !table.is_transactional() {
            return Err(LedgerError::Forbidden(table));
        }
        let len = self.raw_rows(table)?.len().saturating_sub(1);
        let position = usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(LedgerError::OutOfRange { index, len })?;
        let sheet = table.sheet_name();
        self.service
            .delete_row(sheet, position + 1)
            .map_err(|e| match e {
                SpreadsheetError::RowNotFound => LedgerError::OutOfRange { index, len },
                other => other.into(),
            })?;
        info!(sheet, index, "Deleted row");
        self.recompute_summary();
        Ok(())
    }

    /// Rebuilds the Summary sheet from Income and Expenses.
    ///
    /// Never fails: an unreadable source table counts as empty and a failed
    /// write is logged, since the mutation that triggered the pass has
    /// already been stored.
    pub fn recompute_summary(&mut self) -> Summary {
        let income = self.source_records(Table::Income);
        let expenses = self.source_records(Table::Expenses);
        let summary = Summary::compute(&income, &expenses);

        let mut rows = vec![schema::header_row(Table::Summary)];
        rows.extend(summary.to_rows());
        let sheet = Table::Summary.sheet_name();
        let written = self
            .service
            .create_sheet(sheet)
            .and_then(|_| self.service.replace_rows_from(sheet, 0, rows));
        match written {
            Ok(()) => debug!(
                income = income.len(),
                expenses = expenses.len(),
                "Summary recomputed"
            ),
            Err(e) => warn!(error = %e, "Failed to write summary"),
        }
        summary
    }

    fn source_records(&self, table: Table) -> Vec<Record> {
        self.read(table).unwrap_or_else(|e| {
            warn!(table = %table, error = %e, "Treating unreadable table as empty for summary");
            Vec::new()
        })
    }

    /// Adds a login, unless one with the same normalized phone exists.
    /// Returns whether a row was written.
    pub fn add_user(&mut self, phone: &str, password: &str) -> Result<bool, LedgerError> {
        if normalize_credential(phone).is_empty() {
            return Err(LedgerError::MissingParameter("phone"));
        }
        if normalize_credential(password).is_empty() {
            return Err(LedgerError::MissingParameter("password"));
        }
        let sheet = Table::Users.sheet_name();
        self.service.create_sheet(sheet)?;
        let mut rows = self.raw_rows(Table::Users)?;
        if rows.is_empty() {
            let header = schema::header_row(Table::Users);
            self.service.append_row(sheet, header.clone())?;
            rows.push(header);
        }
        let cols = CredentialColumns::locate(&rows[0]);
        let wanted = normalize_credential(phone);
        let exists = rows[1..].iter().any(|row| {
            normalize_credential(row.get(cols.phone).map(String::as_str).unwrap_or_default())
                == wanted
        });
        if exists {
            info!("User already exists");
            return Ok(false);
        }
        let width = rows[0].len().max(cols.password.max(cols.phone) + 1);
        let mut row = vec![String::new(); width];
        row[cols.password] = password.trim().to_string();
        row[cols.phone] = phone.trim().to_string();
        self.service.append_row(sheet, row)?;
        info!("Added user");
        Ok(true)
    }
}
