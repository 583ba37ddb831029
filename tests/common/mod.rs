#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;

use statement_pdf::{AccountField, AccountInfo, LayoutConfig, Statement, Transaction};

/// Layout with built-in fonts only, so output does not depend on the host.
pub fn config() -> LayoutConfig {
    let mut config = LayoutConfig::default();
    config.fonts.system_lookup = false;
    config
}

pub fn account() -> AccountInfo {
    AccountInfo::new()
        .with(AccountField::Branch, "Main Street Branch")
        .with(AccountField::AccountTitle, "Jane Doe")
        .with(AccountField::AccountNo, "0012345678")
        .with(AccountField::StatementPeriod, "01 Mar 2024 - 31 Mar 2024")
        .with(AccountField::Currency, "PKR")
}

pub fn transaction(i: usize) -> Transaction {
    Transaction {
        date: format!("{:02} Mar 2024", i % 28 + 1),
        particulars: format!("Transfer {i}"),
        instrument_no: String::new(),
        debit: if i % 2 == 0 { format!("{}", i * 10) } else { String::new() },
        credit: if i % 2 == 1 { format!("{}.5", i * 100) } else { String::new() },
        balance: format!("{}", 100_000 + i),
    }
}

pub fn statement(rows: usize) -> Statement {
    Statement {
        account: account(),
        transactions: (0..rows).map(transaction).collect(),
    }
}

/// Scratch directory under tests/output, emptied per test.
pub fn output_dir(test: &str) -> PathBuf {
    let dir = PathBuf::from("tests/output").join(test);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

/// Minimal single-sheet workbook. `rows` are written as inline strings,
/// except cells that parse as numbers.
pub fn xlsx(rows: &[&[&str]]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let reference = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                sheet.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
            } else {
                sheet.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let files = [
        (
            "xl/workbook.xml",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/worksheets/sheet1.xml", sheet),
    ];
    for (name, body) in files {
        zip.start_file(name, zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Worksheet layout used by the statement exports: labeled metadata rows,
/// then the ledger header and `rows` transactions (Excel date serials).
pub fn statement_xlsx(rows: usize) -> Vec<u8> {
    let mut sheet: Vec<Vec<String>> = vec![
        vec!["Branch".into(), "Main Street Branch".into()],
        vec!["Account Title".into(), "Jane Doe".into()],
        vec!["Account No".into(), "12345678".into()],
        vec!["As of".into(), "45382".into()],
        vec![],
        ["Date", "Particulars", "Inst No.", "Debit", "Credit", "Balance"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    ];
    for i in 0..rows {
        sheet.push(vec![
            (45352 + i % 28).to_string(),
            format!("Payment {i}"),
            String::new(),
            format!("{}", 10 + i),
            String::new(),
            format!("{}", 5000 - i),
        ]);
    }
    let borrowed: Vec<Vec<&str>> = sheet
        .iter()
        .map(|r| r.iter().map(String::as_str).collect())
        .collect();
    let rows: Vec<&[&str]> = borrowed.iter().map(Vec::as_slice).collect();
    xlsx(&rows)
}
