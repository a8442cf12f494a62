//! Required-field checks applied before a record is accepted.

use super::schema::{AMOUNT, CURRENCY, DATE, PAYMENT_METHOD, SOURCE, USER, WORKER_NAME};
use super::{LedgerError, Record, Table};

const SOURCE_REQUIRED: [&str; 6] = [DATE, SOURCE, AMOUNT, CURRENCY, PAYMENT_METHOD, USER];
const WORKER_REQUIRED: [&str; 6] = [DATE, WORKER_NAME, AMOUNT, CURRENCY, PAYMENT_METHOD, USER];

/// Fields that must be present and non-blank, or `None` when the table is
/// not checked at all.
pub fn required_fields(table: Table) -> Option<&'static [&'static str]> {
    match table {
        Table::Income | Table::Expenses | Table::Returns => Some(&SOURCE_REQUIRED),
        Table::Workers => Some(&WORKER_REQUIRED),
        Table::Summary | Table::Users => None,
    }
}

/// Required fields of `table` that `record` lacks or leaves blank, in
/// schema order.
pub fn missing_fields(table: Table, record: &Record) -> Vec<&'static str> {
    required_fields(table)
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(|field| record.get(field).is_none_or(|v| v.trim().is_empty()))
        .collect()
}

/// `true` when every required field of `table` is present and non-blank.
pub fn validate(table: Table, record: &Record) -> bool {
    missing_fields(table, record).is_empty()
}

/// Like [`validate`], reporting the missing fields as an error.
pub fn check(table: Table, record: &Record) -> Result<(), LedgerError> {
    let missing = missing_fields(table, record);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::ValidationFailed { table, missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn income() -> Record {
        Record::new()
            .with(DATE, "2024-01-01")
            .with(SOURCE, "shop")
            .with(AMOUNT, "100")
            .with(CURRENCY, "EGP")
            .with(PAYMENT_METHOD, "cash")
            .with(USER, "admin")
    }

    #[test]
    fn complete_record_passes() {
        assert!(validate(Table::Income, &income()));
        assert!(check(Table::Expenses, &income()).is_ok());
    }

    #[test]
    fn blank_field_fails() {
        let rec = income().with(SOURCE, "   ");
        assert!(!validate(Table::Income, &rec));
        assert_eq!(missing_fields(Table::Income, &rec), vec![SOURCE]);
    }

    #[test]
    fn absent_fields_are_listed_in_order() {
        let rec = Record::new().with(AMOUNT, "1");
        assert_eq!(
            check(Table::Workers, &rec).unwrap_err(),
            LedgerError::ValidationFailed {
                table: Table::Workers,
                missing: vec![DATE, WORKER_NAME, CURRENCY, PAYMENT_METHOD, USER],
            }
        );
    }

    #[test]
    fn workers_need_worker_name_not_source() {
        let rec = income();
        assert_eq!(missing_fields(Table::Workers, &rec), vec![WORKER_NAME]);
    }

    #[test]
    fn notes_are_optional() {
        assert!(validate(Table::Returns, &income()));
    }

    #[test]
    fn amount_is_checked_for_presence_only() {
        assert!(validate(Table::Income, &income().with(AMOUNT, "abc")));
    }

    #[test]
    fn unchecked_tables_always_pass() {
        assert!(validate(Table::Summary, &Record::new()));
        assert!(validate(Table::Users, &Record::new()));
    }
}
