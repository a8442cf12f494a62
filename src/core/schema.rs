//! Column layout of every table. The order here is the order cells are
//! written in, and the first row of each sheet carries these names.

use super::Table;

pub const DATE: &str = "Date";
pub const SOURCE: &str = "Source";
pub const WORKER_NAME: &str = "Worker Name";
pub const AMOUNT: &str = "Amount";
pub const CURRENCY: &str = "Currency";
pub const PAYMENT_METHOD: &str = "Payment Method";
pub const NOTES: &str = "Notes";
pub const USER: &str = "User";

pub const SUMMARY_ITEM: &str = "Item";

pub const USER_PASSWORD: &str = "password";
pub const USER_PHONE: &str = "phone";

const SOURCE_COLUMNS: [&str; 7] = [DATE, SOURCE, AMOUNT, CURRENCY, PAYMENT_METHOD, NOTES, USER];
const WORKER_COLUMNS: [&str; 7] = [
    DATE,
    WORKER_NAME,
    AMOUNT,
    CURRENCY,
    PAYMENT_METHOD,
    NOTES,
    USER,
];
const SUMMARY_COLUMNS: [&str; 3] = [SUMMARY_ITEM, "EGP", "USD"];
const USER_COLUMNS: [&str; 2] = [USER_PASSWORD, USER_PHONE];

/// Ordered column names of `table`.
pub fn columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Income | Table::Expenses | Table::Returns => &SOURCE_COLUMNS,
        Table::Workers => &WORKER_COLUMNS,
        Table::Summary => &SUMMARY_COLUMNS,
        Table::Users => &USER_COLUMNS,
    }
}

/// The header row as written to a fresh sheet.
pub fn header_row(table: Table) -> Vec<String> {
    columns(table).iter().map(|c| c.to_string()).collect()
}
