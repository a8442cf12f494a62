use std::thread::sleep;
use std::time::Duration;

use tracing::warn;

use super::{CloudSpreadsheetService, SpreadsheetError};

/// Wrapper that retries idempotent operations with exponential backoff.
///
/// Transient errors from `list_rows` and `create_sheet` are retried until
/// `max_retries` is reached. The delay starts at `base_delay` and doubles after
/// each failed attempt. Appends, deletes and replacements are passed through
/// exactly once: repeating an append whose response was lost would write the
/// row twice.
pub struct RetryingService<S> {
    inner: S,
    max_retries: u32,
    base_delay: Duration,
}

impl<S> RetryingService<S> {
    /// Create a new `RetryingService` wrapping `inner`.
    pub fn new(inner: S, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    fn backoff(&self, attempt: u32, err: &SpreadsheetError) {
        let factor = 2f64.powi(attempt as i32);
        let delay = self.base_delay.mul_f64(factor);
        warn!(attempt, ?delay, error = %err, "Retrying spreadsheet read");
        sleep(delay);
    }

    fn with_retry<T, F>(&self, op: F) -> Result<T, SpreadsheetError>
    where
        F: Fn(&S) -> Result<T, SpreadsheetError>,
    {
        let mut attempt = 0;
        loop {
            match op(&self.inner) {
                Ok(val) => return Ok(val),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    self.backoff(attempt, &e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn with_retry_mut<T, F>(&mut self, mut op: F) -> Result<T, SpreadsheetError>
    where
        F: FnMut(&mut S) -> Result<T, SpreadsheetError>,
    {
        let mut attempt = 0;
        loop {
            match op(&mut self.inner) {
                Ok(val) => return Ok(val),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    self.backoff(attempt, &e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: CloudSpreadsheetService> CloudSpreadsheetService for RetryingService<S> {
    fn create_sheet(&mut self, title: &str) -> Result<(), SpreadsheetError> {
        self.with_retry_mut(|inner| inner.create_sheet(title))
    }

    fn append_row(&mut self, sheet: &str, values: Vec<String>) -> Result<(), SpreadsheetError> {
        self.inner.append_row(sheet, values)
    }

    fn append_rows(&mut self, sheet: &str, rows: Vec<Vec<String>>) -> Result<(), SpreadsheetError> {
        self.inner.append_rows(sheet, rows)
    }

    fn list_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        self.with_retry(|inner| inner.list_rows(sheet))
    }

    fn delete_row(&mut self, sheet: &str, index: usize) -> Result<(), SpreadsheetError> {
        self.inner.delete_row(sheet, index)
    }

    fn replace_rows_from(
        &mut self,
        sheet: &str,
        start: usize,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SpreadsheetError> {
        self.inner.replace_rows_from(sheet, start, rows)
    }
}
