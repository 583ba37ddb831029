use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Raw spreadsheet cell as produced by ingestion, before display formatting.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Spreadsheet "truthiness": empty cells, blank text, numeric zero and
    /// `false` all count as absent.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Bool(b) => *b,
        }
    }

    /// Display text of the cell, or an empty string for falsy cells.
    pub fn to_text(&self) -> String {
        if !self.is_truthy() {
            return String::new();
        }
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

/// A cell as it appears in statement JSON: exports carry amounts and
/// serials as numbers, everything else as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCell {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<Option<JsonCell>> for CellValue {
    fn from(cell: Option<JsonCell>) -> Self {
        match cell {
            Some(JsonCell::Text(s)) => CellValue::Text(s),
            Some(JsonCell::Number(n)) => CellValue::Number(n),
            Some(JsonCell::Bool(b)) => CellValue::Bool(b),
            None => CellValue::Empty,
        }
    }
}

/// Text of a JSON cell; null, zero and `false` read as empty.
fn cell_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let cell = Option::<JsonCell>::deserialize(deserializer)?;
    Ok(CellValue::from(cell).to_text())
}

/// Shortest round-trip text for a spreadsheet number: `1000.0` → "1000",
/// `12.5` → "12.5".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountField {
    #[serde(rename = "Branch")]
    Branch,
    #[serde(rename = "Statement Period")]
    StatementPeriod,
    #[serde(rename = "Account Title")]
    AccountTitle,
    #[serde(rename = "Account No")]
    AccountNo,
    #[serde(rename = "IBAN")]
    Iban,
    #[serde(rename = "Currency")]
    Currency,
    #[serde(rename = "Product Type")]
    ProductType,
    #[serde(rename = "Balance")]
    Balance,
    #[serde(rename = "As of")]
    AsOf,
    #[serde(rename = "Address")]
    Address,
    #[serde(rename = "Reg Cell No")]
    RegCellNo,
}

impl AccountField {
    /// Ingestion order. Labels are matched by substring, so a later field
    /// overwrites an earlier one when a spreadsheet label contains both.
    pub const ALL: [AccountField; 11] = [
        AccountField::Branch,
        AccountField::StatementPeriod,
        AccountField::AccountTitle,
        AccountField::AccountNo,
        AccountField::Iban,
        AccountField::Currency,
        AccountField::ProductType,
        AccountField::Balance,
        AccountField::AsOf,
        AccountField::Address,
        AccountField::RegCellNo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AccountField::Branch => "Branch",
            AccountField::StatementPeriod => "Statement Period",
            AccountField::AccountTitle => "Account Title",
            AccountField::AccountNo => "Account No",
            AccountField::Iban => "IBAN",
            AccountField::Currency => "Currency",
            AccountField::ProductType => "Product Type",
            AccountField::Balance => "Balance",
            AccountField::AsOf => "As of",
            AccountField::Address => "Address",
            AccountField::RegCellNo => "Reg Cell No",
        }
    }
}

pub const NOT_AVAILABLE: &str = "N/A";

/// Labeled account metadata printed in the page headers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AccountInfo {
    fields: BTreeMap<AccountField, String>,
}

impl<'de> Deserialize<'de> for AccountInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<AccountField, Option<JsonCell>>::deserialize(deserializer)?;
        Ok(AccountInfo {
            fields: raw
                .into_iter()
                .map(|(field, cell)| (field, CellValue::from(cell).to_text()))
                .collect(),
        })
    }
}

impl AccountInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: AccountField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn with(mut self, field: AccountField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: AccountField) -> Option<&str> {
        self.fields
            .get(&field)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Value for display; missing fields render as "N/A".
    pub fn display(&self, field: AccountField) -> &str {
        self.get(field).unwrap_or(NOT_AVAILABLE)
    }

    /// Number of fields carrying a value.
    pub fn len(&self) -> usize {
        self.fields.values().filter(|v| !v.trim().is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// The six fixed ledger columns, in document order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Date,
    Particulars,
    InstrumentNo,
    Debit,
    Credit,
    Balance,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Date,
        Column::Particulars,
        Column::InstrumentNo,
        Column::Debit,
        Column::Credit,
        Column::Balance,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Particulars => "Particulars",
            Column::InstrumentNo => "Inst No.",
            Column::Debit => "Debit",
            Column::Credit => "Credit",
            Column::Balance => "Balance",
        }
    }

    pub fn is_amount(self) -> bool {
        matches!(self, Column::Debit | Column::Credit | Column::Balance)
    }

    pub fn alignment(self) -> Alignment {
        match self {
            Column::Date => Alignment::Center,
            Column::Particulars => Alignment::Left,
            _ => Alignment::Right,
        }
    }
}

/// One ledger row. Dates arrive pre-formatted from ingestion; amounts are
/// raw numeric text formatted at render time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "Date", default, deserialize_with = "cell_text")]
    pub date: String,
    #[serde(rename = "Particulars", default, deserialize_with = "cell_text")]
    pub particulars: String,
    #[serde(rename = "Inst No.", default, deserialize_with = "cell_text")]
    pub instrument_no: String,
    #[serde(rename = "Debit", default, deserialize_with = "cell_text")]
    pub debit: String,
    #[serde(rename = "Credit", default, deserialize_with = "cell_text")]
    pub credit: String,
    #[serde(rename = "Balance", default, deserialize_with = "cell_text")]
    pub balance: String,
}

impl Transaction {
    pub fn value(&self, column: Column) -> &str {
        match column {
            Column::Date => &self.date,
            Column::Particulars => &self.particulars,
            Column::InstrumentNo => &self.instrument_no,
            Column::Debit => &self.debit,
            Column::Credit => &self.credit,
            Column::Balance => &self.balance,
        }
    }

    /// At least one key field carries data.
    pub fn has_content(&self) -> bool {
        [&self.date, &self.particulars, &self.debit, &self.credit]
            .iter()
            .any(|v| !v.trim().is_empty())
    }

    /// A repeated column-header row that ingestion picked up as data.
    pub fn is_header_artifact(&self) -> bool {
        self.date == Column::Date.label() || self.particulars == Column::Particulars.label()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "accountInfo", default)]
    pub account: AccountInfo,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Statement {
    /// Rows that will be rendered, in ledger order.
    pub fn sanitized_transactions(&self) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.has_content() && !t.is_header_artifact())
            .collect()
    }
}
