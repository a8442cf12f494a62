use cashbook::cloud_adapters::{CloudSpreadsheetService, MemorySheetsAdapter};
use cashbook::core::schema::{self, AMOUNT, CURRENCY, DATE, PAYMENT_METHOD, SOURCE, USER};
use cashbook::core::{LedgerError, Record, RecordStore, Table};

fn store() -> RecordStore<MemorySheetsAdapter> {
    let mut store = RecordStore::new(MemorySheetsAdapter::new());
    store.setup().unwrap();
    store
}

fn entry(amount: &str, currency: &str) -> Record {
    Record::new()
        .with(DATE, "2024-01-01")
        .with(SOURCE, "shop")
        .with(AMOUNT, amount)
        .with(CURRENCY, currency)
        .with(PAYMENT_METHOD, "cash")
        .with(USER, "admin")
}

fn summary_rows(store: &RecordStore<MemorySheetsAdapter>) -> Vec<Vec<String>> {
    store.service().list_rows("Summary").unwrap()
}

#[test]
fn setup_writes_headers_once() {
    let mut store = store();
    store.setup().unwrap();
    for table in Table::ALL {
        let rows = store.service().list_rows(table.sheet_name()).unwrap();
        assert_eq!(rows[0], schema::header_row(table), "{table}");
    }
    assert_eq!(store.service().list_rows("Income").unwrap().len(), 1);
}

#[test]
fn empty_tables_give_zero_summary() {
    let mut store = store();
    store.recompute_summary();
    assert_eq!(
        summary_rows(&store),
        vec![
            vec!["Item", "EGP", "USD"],
            vec!["Total Income", "0", "0"],
            vec!["Total Expenses", "0", "0"],
            vec!["Net Profit", "0", "0"],
        ]
    );
}

#[test]
fn income_only_net_profit() {
    let mut store = store();
    store.append(Table::Income, &entry("100", "EGP")).unwrap();
    store.append(Table::Income, &entry("50", "USD")).unwrap();
    assert_eq!(summary_rows(&store)[3], vec!["Net Profit", "100", "50"]);
}

#[test]
fn summary_follows_every_mutation() {
    let mut store = store();
    store.append(Table::Income, &entry("200", "EGP")).unwrap();
    store.append(Table::Expenses, &entry("75", "EGP")).unwrap();
    assert_eq!(summary_rows(&store)[3], vec!["Net Profit", "125", "0"]);

    store.delete_at(Table::Expenses, 0).unwrap();
    assert_eq!(summary_rows(&store)[2], vec!["Total Expenses", "0", "0"]);
    assert_eq!(summary_rows(&store)[3], vec!["Net Profit", "200", "0"]);
}

#[test]
fn workers_and_returns_do_not_affect_summary() {
    let mut store = store();
    let worker = entry("40", "EGP").with(schema::WORKER_NAME, "Omar");
    store.append(Table::Workers, &worker).unwrap();
    store.append(Table::Returns, &entry("10", "EGP")).unwrap();
    assert_eq!(summary_rows(&store)[3], vec!["Net Profit", "0", "0"]);
}

#[test]
fn non_numeric_amount_is_stored_and_counted_as_zero() {
    let mut store = store();
    let row = store.append(Table::Income, &entry("abc", "EGP")).unwrap();
    assert_eq!(row[2], "abc");
    assert_eq!(store.read(Table::Income).unwrap()[0].get(AMOUNT), Some("abc"));
    assert_eq!(summary_rows(&store)[1], vec!["Total Income", "0", "0"]);
}

#[test]
fn append_returns_row_in_column_order() {
    let mut store = store();
    let row = store
        .append(Table::Income, &entry("5", "USD").with("Unknown", "x"))
        .unwrap();
    assert_eq!(
        row,
        vec!["2024-01-01", "shop", "5", "USD", "cash", "", "admin"]
    );
}

#[test]
fn invalid_record_leaves_table_unchanged() {
    let mut store = store();
    let err = store
        .append(Table::Income, &entry("5", "USD").with(USER, ""))
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::ValidationFailed {
            table: Table::Income,
            missing: vec![USER]
        }
    );
    assert!(store.read(Table::Income).unwrap().is_empty());
}

#[test]
fn delete_shifts_later_rows() {
    let mut store = store();
    for amount in ["1", "2", "3"] {
        store.append(Table::Expenses, &entry(amount, "EGP")).unwrap();
    }
    store.delete_at(Table::Expenses, 1).unwrap();
    let amounts: Vec<_> = store
        .read(Table::Expenses)
        .unwrap()
        .iter()
        .map(|r| r.get(AMOUNT).unwrap().to_string())
        .collect();
    assert_eq!(amounts, vec!["1", "3"]);
}

#[test]
fn delete_out_of_range_is_rejected() {
    let mut store = store();
    store.append(Table::Income, &entry("1", "EGP")).unwrap();
    assert_eq!(
        store.delete_at(Table::Income, 1).unwrap_err(),
        LedgerError::OutOfRange { index: 1, len: 1 }
    );
    assert_eq!(
        store.delete_at(Table::Income, -1).unwrap_err(),
        LedgerError::OutOfRange { index: -1, len: 1 }
    );
    assert_eq!(store.read(Table::Income).unwrap().len(), 1);
}

#[test]
fn derived_and_credential_tables_are_protected() {
    let mut store = store();
    let before = summary_rows(&store);
    assert_eq!(
        store.delete_at(Table::Summary, 0).unwrap_err(),
        LedgerError::Forbidden(Table::Summary)
    );
    assert_eq!(summary_rows(&store), before);
    assert_eq!(
        store.append(Table::Users, &Record::new()).unwrap_err(),
        LedgerError::Forbidden(Table::Users)
    );
}

#[test]
fn unknown_sheet_is_not_found() {
    let store = store();
    assert_eq!(
        store.read_named("Salaries").unwrap_err(),
        LedgerError::NotFound("Salaries".into())
    );
}

#[test]
fn missing_sheet_reads_as_not_found() {
    let store = RecordStore::new(MemorySheetsAdapter::new());
    assert_eq!(
        store.read(Table::Income).unwrap_err(),
        LedgerError::NotFound("Income".into())
    );
}

#[test]
fn read_all_skips_users() {
    let mut store = store();
    store.add_user("0100", "pw").unwrap();
    let tables: Vec<_> = store.read_all().unwrap().into_iter().map(|(t, _)| t).collect();
    assert_eq!(tables, Table::READABLE.to_vec());
}

#[test]
fn add_user_ignores_duplicate_phone() {
    let mut store = store();
    assert!(store.add_user(" 0100 ", "pw").unwrap());
    assert!(!store.add_user("٠١٠٠", "other").unwrap());
    assert_eq!(store.service().list_rows("Users").unwrap().len(), 2);
    assert_eq!(
        store.add_user("  ", "pw").unwrap_err(),
        LedgerError::MissingParameter("phone")
    );
}

#[test]
fn login_uses_stored_users() {
    let mut store = store();
    store.add_user("01001234567", "secret").unwrap();
    assert!(cashbook::core::login(&store, "٠١٠٠١٢٣٤٥٦٧", "secret"));
    assert!(!cashbook::core::login(&store, "01001234567", "Secret"));
}

#[test]
fn login_without_users_table_fails() {
    let store = RecordStore::new(MemorySheetsAdapter::new());
    assert!(!cashbook::core::login(&store, "1", "1"));
}

#[test]
fn appended_record_is_read_back_last() {
    let mut store = store();
    store.append(Table::Returns, &entry("1", "EGP")).unwrap();
    let record = entry("9", "USD").with(schema::NOTES, "refund");
    store.append(Table::Returns, &record).unwrap();
    let records = store.read(Table::Returns).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records.last(), Some(&record));
}

#[test]
fn recompute_is_idempotent() {
    let mut store = store();
    store.append(Table::Income, &entry("12.5", "USD")).unwrap();
    let first = store.recompute_summary();
    let rows = summary_rows(&store);
    assert_eq!(store.recompute_summary(), first);
    assert_eq!(summary_rows(&store), rows);
}
