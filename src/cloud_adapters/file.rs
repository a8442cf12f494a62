use crate::cloud_adapters::{CloudSpreadsheetService, SpreadsheetError};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::PathBuf;
use tracing::debug;

/// Adapter that stores every sheet as a CSV file inside `base_dir`.
///
/// Appends write to the end of the file. Deletes and replacements rewrite the
/// whole sheet into a sibling temporary file that is then renamed over the
/// original, so a concurrent reader sees either the old or the new content.
pub struct FileAdapter {
    base_dir: PathBuf,
}

impl FileAdapter {
    /// Create a new adapter rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.base_dir.join(format!("{sheet}.csv"))
    }

    fn existing_path(&self, sheet: &str) -> Result<PathBuf, SpreadsheetError> {
        let path = self.sheet_path(sheet);
        if path.exists() {
            Ok(path)
        } else {
            Err(SpreadsheetError::SheetNotFound)
        }
    }

    fn rewrite(&self, sheet: &str, rows: &[Vec<String>]) -> Result<(), SpreadsheetError> {
        let path = self.existing_path(sheet)?;
        let tmp = self.base_dir.join(format!(".{sheet}.csv.tmp"));
        {
            let mut wtr = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&tmp)
                .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
            for row in rows {
                wtr.write_record(row)
                    .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
            }
            wtr.flush()
                .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        }
        std::fs::rename(&tmp, &path).map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        debug!(sheet, rows = rows.len(), "Rewrote sheet file");
        Ok(())
    }
}

impl Default for FileAdapter {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl CloudSpreadsheetService for FileAdapter {
    fn create_sheet(&mut self, title: &str) -> Result<(), SpreadsheetError> {
        let path = self.sheet_path(title);
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        std::fs::File::create(&path).map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        debug!(sheet = title, path = %path.display(), "Created sheet file");
        Ok(())
    }

    fn append_row(&mut self, sheet: &str, values: Vec<String>) -> Result<(), SpreadsheetError> {
        self.append_rows(sheet, vec![values])
    }

    fn append_rows(&mut self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SpreadsheetError> {
        let path = self.existing_path(sheet)?;
        let file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        for row in rows {
            wtr.write_record(row)
                .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        }
        wtr.flush()
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))
    }

    fn list_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        let path = self.existing_path(sheet)?;
        let file =
            std::fs::File::open(&path).map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut rows = Vec::new();
        for record in rdr.records() {
            let rec = record.map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
            rows.push(rec.iter().map(|s| s.to_string()).collect());
        }
        Ok(rows)
    }

    fn delete_row(&mut self, sheet: &str, index: usize) -> Result<(), SpreadsheetError> {
        let mut rows = self.list_rows(sheet)?;
        if index >= rows.len() {
            return Err(SpreadsheetError::RowNotFound);
        }
        rows.remove(index);
        self.rewrite(sheet, &rows)
    }

    fn replace_rows_from(
        &mut self,
        sheet: &str,
        start: usize,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SpreadsheetError> {
        let mut existing = self.list_rows(sheet)?;
        existing.truncate(start);
        existing.extend(rows);
        self.rewrite(sheet, &existing)
    }
}
