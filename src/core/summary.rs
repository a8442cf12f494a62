//! Derived Summary table: income, expenses and net profit per currency.
//!
//! The summary is rebuilt from scratch on every mutation of a source table.
//! No running counters are kept, so it cannot drift from the rows it
//! describes.

use iso_currency::Currency;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::Record;
use super::auth::latin_digits;
use super::schema::{AMOUNT, CURRENCY};

/// Currencies materialised in the Summary table, in column order. Rows in
/// any other currency are kept in their source table but not summed.
pub const BUCKETS: [Currency; 2] = [Currency::EGP, Currency::USD];

pub const TOTAL_INCOME: &str = "Total Income";
pub const TOTAL_EXPENSES: &str = "Total Expenses";
pub const NET_PROFIT: &str = "Net Profit";

/// One value per entry of [`BUCKETS`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurrencyTotals {
    values: [f64; BUCKETS.len()],
}

impl CurrencyTotals {
    /// Sums the amounts of `records` per bucket.
    pub fn from_records(records: &[Record]) -> Self {
        let mut totals = Self::default();
        for record in records {
            let Some(idx) = bucket_index(record.get(CURRENCY).unwrap_or_default()) else {
                continue;
            };
            totals.values[idx] += parse_amount(record.get(AMOUNT).unwrap_or_default());
        }
        totals
    }

    /// Total for `currency`, zero for currencies outside [`BUCKETS`].
    pub fn get(&self, currency: Currency) -> f64 {
        BUCKETS
            .iter()
            .position(|c| *c == currency)
            .map(|i| self.values[i])
            .unwrap_or(0.0)
    }

    /// Per-bucket `self - other`.
    pub fn minus(&self, other: &CurrencyTotals) -> CurrencyTotals {
        let mut values = self.values;
        for (v, o) in values.iter_mut().zip(other.values) {
            *v -= o;
        }
        CurrencyTotals { values }
    }

    fn row(&self, label: &str) -> Vec<String> {
        std::iter::once(label.to_string())
            .chain(self.values.iter().map(|v| v.to_string()))
            .collect()
    }
}

impl Serialize for CurrencyTotals {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(BUCKETS.len()))?;
        for (currency, value) in BUCKETS.iter().zip(self.values) {
            map.serialize_entry(currency.code(), &value)?;
        }
        map.end()
    }
}

/// Income and expense totals; net profit is derived.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct Summary {
    pub income: CurrencyTotals,
    pub expenses: CurrencyTotals,
}

impl Summary {
    pub fn compute(income: &[Record], expenses: &[Record]) -> Self {
        Self {
            income: CurrencyTotals::from_records(income),
            expenses: CurrencyTotals::from_records(expenses),
        }
    }

    pub fn net(&self) -> CurrencyTotals {
        self.income.minus(&self.expenses)
    }

    /// The three data rows of the Summary sheet.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        vec![
            self.income.row(TOTAL_INCOME),
            self.expenses.row(TOTAL_EXPENSES),
            self.net().row(NET_PROFIT),
        ]
    }
}

fn bucket_index(code: &str) -> Option<usize> {
    BUCKETS.iter().position(|c| c.code() == code)
}

/// Numeric value of an Amount cell. Never fails: anything that is not a
/// finite number counts as zero. Arabic-Indic digits are accepted.
pub fn parse_amount(raw: &str) -> f64 {
    let text = latin_digits(raw.trim()).replace('\u{066B}', ".");
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(amount: &str, currency: &str) -> Record {
        Record::new().with(AMOUNT, amount).with(CURRENCY, currency)
    }

    #[test]
    fn empty_tables_give_zero_rows() {
        let summary = Summary::compute(&[], &[]);
        assert_eq!(
            summary.to_rows(),
            vec![
                vec!["Total Income", "0", "0"],
                vec!["Total Expenses", "0", "0"],
                vec!["Net Profit", "0", "0"],
            ]
        );
    }

    #[test]
    fn net_is_income_minus_expenses() {
        let income = [entry("100", "EGP"), entry("50", "USD"), entry("20.5", "EGP")];
        let expenses = [entry("30", "EGP"), entry("60", "USD")];
        let summary = Summary::compute(&income, &expenses);
        assert_eq!(summary.income.get(Currency::EGP), 120.5);
        assert_eq!(summary.net().get(Currency::EGP), 90.5);
        assert_eq!(summary.net().get(Currency::USD), -10.0);
    }

    #[test]
    fn unparsable_amounts_count_as_zero() {
        let income = [entry("abc", "EGP"), entry("", "EGP"), entry("inf", "EGP"), entry("7", "EGP")];
        assert_eq!(CurrencyTotals::from_records(&income).get(Currency::EGP), 7.0);
        assert_eq!(CurrencyTotals::from_records(&[Record::new()]), CurrencyTotals::default());
    }

    #[test]
    fn amount_with_trailing_text_counts_as_zero() {
        assert_eq!(parse_amount("100 EGP"), 0.0);
        assert_eq!(parse_amount(" 100 "), 100.0);
    }

    #[test]
    fn other_currencies_are_ignored() {
        let income = [entry("10", "EUR"), entry("10", "egp"), entry("1", "USD")];
        let totals = CurrencyTotals::from_records(&income);
        assert_eq!(totals.get(Currency::EGP), 0.0);
        assert_eq!(totals.get(Currency::USD), 1.0);
        assert_eq!(totals.get(Currency::EUR), 0.0);
    }

    #[test]
    fn arabic_indic_amounts_are_parsed() {
        assert_eq!(parse_amount("١٢٣"), 123.0);
        assert_eq!(parse_amount(" ۴۵ "), 45.0);
        assert_eq!(parse_amount("١٫٥"), 1.5);
    }

    #[test]
    fn totals_serialize_by_currency_code() {
        let totals = CurrencyTotals::from_records(&[entry("100", "EGP")]);
        assert_eq!(
            serde_json::to_value(totals).unwrap(),
            serde_json::json!({"EGP": 100.0, "USD": 0.0})
        );
    }
}
