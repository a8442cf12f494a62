//! Phone and password checks against the Users table.
//!
//! Both the stored cells and the submitted values go through
//! [`normalize_credential`] before comparison, so `" 0123 "`, `"01 23"` and
//! `"٠١٢٣"` all match a stored `0123`. Comparison is otherwise exact: case
//! matters and leading zeros are kept.
//!
//! Credential columns are found by header name (`phone`, `password`). When
//! the header does not name both, the fixed layout is used instead: column 0
//! holds the password and column 1 the phone.

use tracing::{debug, warn};

use super::schema::{USER_PASSWORD, USER_PHONE};
use super::{RecordStore, Table};
use crate::cloud_adapters::CloudSpreadsheetService;

/// Maps Arabic-Indic (U+0660..U+0669) and Extended Arabic-Indic
/// (U+06F0..U+06F9) digits to ASCII digits, leaving everything else as is.
pub fn latin_digits(input: &str) -> String {
    input
        .chars()
        .map(|ch| match ch {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (ch as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (ch as u32 - 0x06F0) as u8),
            other => other,
        })
        .collect()
}

/// Trims, converts digits to Latin and strips all remaining whitespace.
pub fn normalize_credential(value: &str) -> String {
    latin_digits(value.trim())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Positions of the credential cells within a Users row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialColumns {
    pub password: usize,
    pub phone: usize,
}

impl Default for CredentialColumns {
    fn default() -> Self {
        Self {
            password: 0,
            phone: 1,
        }
    }
}

impl CredentialColumns {
    /// Finds the columns named `phone` and `password` in `header`, falling
    /// back to the fixed layout unless both are present.
    pub fn locate(header: &[String]) -> Self {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        match (find(USER_PASSWORD), find(USER_PHONE)) {
            (Some(password), Some(phone)) => Self { password, phone },
            _ => Self::default(),
        }
    }
}

/// Checks the credentials against raw Users rows, header row first.
pub fn credentials_match(rows: &[Vec<String>], phone: &str, password: &str) -> bool {
    let Some((header, users)) = rows.split_first() else {
        return false;
    };
    let phone = normalize_credential(phone);
    let password = normalize_credential(password);
    if phone.is_empty() || password.is_empty() {
        return false;
    }
    let cols = CredentialColumns::locate(header);
    let cell = |row: &Vec<String>, idx: usize| {
        normalize_credential(row.get(idx).map(String::as_str).unwrap_or_default())
    };
    users
        .iter()
        .any(|row| cell(row, cols.phone) == phone && cell(row, cols.password) == password)
}

/// Returns `true` when some Users row matches. A missing or unreadable Users
/// table is treated as having no users.
pub fn login<S: CloudSpreadsheetService>(
    store: &RecordStore<S>,
    phone: &str,
    password: &str,
) -> bool {
    let rows = match store.raw_rows(Table::Users) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "Users table unavailable, rejecting login");
            return false;
        }
    };
    let ok = credentials_match(&rows, phone, password);
    debug!(ok, users = rows.len().saturating_sub(1), "Login checked");
    ok
}
