//! Spreadsheet ingestion: reads the first worksheet of an .xlsx workbook
//! and turns its rows into a [`Statement`].

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use crate::error::Error;
use crate::format::format_date;
use crate::model::{AccountField, AccountInfo, CellValue, Statement, Transaction};

/// One worksheet row; missing cells are [`CellValue::Empty`]. Trailing
/// empty cells are not stored.
pub type Row = Vec<CellValue>;

const FALLBACK_SHEET: &str = "xl/worksheets/sheet1.xml";
/// Minimum number of cells in the row that starts the ledger.
const LEDGER_HEADER_MIN_CELLS: usize = 4;

pub fn parse(path: &Path) -> Result<Statement, Error> {
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
        ),
        _ => Error::Io(e),
    })?;
    let zip = zip::ZipArchive::new(file)
        .map_err(|_| Error::InvalidXlsx("file is not a ZIP archive".into()))?;
    parse_archive(zip)
}

pub fn parse_bytes(data: &[u8]) -> Result<Statement, Error> {
    let zip = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|_| Error::InvalidXlsx("data is not a ZIP archive".into()))?;
    parse_archive(zip)
}

fn parse_archive<R: Read + Seek>(mut zip: zip::ZipArchive<R>) -> Result<Statement, Error> {
    let rows = read_first_sheet(&mut zip)?;
    let statement = extract_statement(&rows);
    log::debug!(
        "Read {} worksheet rows: {} account fields, {} transactions",
        rows.len(),
        statement.account.len(),
        statement.transactions.len()
    );
    Ok(statement)
}

fn read_zip_text<R: Read + Seek>(zip: &mut zip::ZipArchive<R>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Path of the first sheet listed in the workbook, resolved through the
/// workbook relationships.
fn first_sheet_path<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> Result<String, Error> {
    let workbook = read_zip_text(zip, "xl/workbook.xml")
        .ok_or_else(|| Error::InvalidXlsx("missing xl/workbook.xml (is this an XLSX file?)".into()))?;
    let xml = roxmltree::Document::parse(&workbook)?;
    let rel_id = xml
        .descendants()
        .find(|n| n.tag_name().name() == "sheet")
        .and_then(|n| n.attributes().find(|a| a.name() == "id").map(|a| a.value().to_string()));

    let Some(rel_id) = rel_id else {
        return Err(Error::InvalidXlsx("workbook contains no worksheets".into()));
    };
    let rels = read_zip_text(zip, "xl/_rels/workbook.xml.rels")
        .map(|xml| parse_rels_xml(&xml))
        .transpose()?
        .unwrap_or_default();
    Ok(match rels.get(&rel_id) {
        Some(target) => resolve_target(target),
        None => {
            log::debug!("No relationship for sheet {rel_id}, trying {FALLBACK_SHEET}");
            FALLBACK_SHEET.to_string()
        }
    })
}

fn parse_rels_xml(xml_content: &str) -> Result<HashMap<String, String>, Error> {
    let xml = roxmltree::Document::parse(xml_content)?;
    Ok(xml
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect())
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn read_shared_strings<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> Result<Vec<String>, Error> {
    let Some(content) = read_zip_text(zip, "xl/sharedStrings.xml") else {
        return Ok(Vec::new());
    };
    let xml = roxmltree::Document::parse(&content)?;
    Ok(xml
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "si")
        .map(rich_text)
        .collect())
}

/// Concatenated `<t>` runs of a string item, skipping phonetic hints.
fn rich_text(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.tag_name().name() == "t")
        .filter(|n| !n.ancestors().any(|a| a.tag_name().name() == "rPh"))
        .filter_map(|n| n.text())
        .collect()
}

/// Widest sheet SpreadsheetML allows (column XFD).
const MAX_COLUMNS: usize = 16_384;

/// Zero-based column of a cell reference such as "AB12". References past
/// column XFD are rejected.
fn column_index(reference: &str) -> Option<usize> {
    let letters = reference.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 3 {
        return None;
    }
    let n = reference[..letters]
        .bytes()
        .fold(0usize, |acc, c| acc * 26 + usize::from(c.to_ascii_uppercase() - b'A' + 1));
    (n <= MAX_COLUMNS).then(|| n - 1)
}

fn cell_value(cell: roxmltree::Node, shared: &[String]) -> CellValue {
    let raw = cell
        .children()
        .find(|n| n.tag_name().name() == "v")
        .and_then(|v| v.text());
    match cell.attribute("t").unwrap_or("n") {
        "s" => raw
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|i| shared.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or(CellValue::Empty),
        "inlineStr" => cell
            .children()
            .find(|n| n.tag_name().name() == "is")
            .map(|is| CellValue::Text(rich_text(is)))
            .unwrap_or(CellValue::Empty),
        "b" => raw.map(|v| CellValue::Bool(v.trim() == "1")).unwrap_or(CellValue::Empty),
        "e" => CellValue::Empty,
        "str" | "d" => raw.map(|v| CellValue::Text(v.to_string())).unwrap_or(CellValue::Empty),
        _ => match raw.map(|v| v.trim().parse::<f64>()) {
            Some(Ok(n)) => CellValue::Number(n),
            Some(Err(_)) => {
                log::warn!("Non-numeric value in numeric cell {:?}", cell.attribute("r"));
                raw.map(|v| CellValue::Text(v.to_string())).unwrap_or(CellValue::Empty)
            }
            None => CellValue::Empty,
        },
    }
}

/// Rows of the first worksheet as a dense grid. Columns are counted from
/// the leftmost used column, so a sheet starting at column B reads the
/// same as one starting at A.
fn read_first_sheet<R: Read + Seek>(zip: &mut zip::ZipArchive<R>) -> Result<Vec<Row>, Error> {
    let shared = read_shared_strings(zip)?;
    let sheet_path = first_sheet_path(zip)?;
    let content = read_zip_text(zip, &sheet_path)
        .ok_or_else(|| Error::InvalidXlsx(format!("missing worksheet {sheet_path}")))?;
    let xml = roxmltree::Document::parse(&content)?;

    let Some(sheet_data) = xml.descendants().find(|n| n.tag_name().name() == "sheetData") else {
        return Ok(Vec::new());
    };

    let mut sparse: Vec<Vec<(usize, CellValue)>> = Vec::new();
    for row in sheet_data.children().filter(|n| n.tag_name().name() == "row") {
        let mut cells = Vec::new();
        let mut next_col = 0usize;
        for cell in row.children().filter(|n| n.tag_name().name() == "c") {
            let col = match cell.attribute("r") {
                Some(reference) => column_index(reference).ok_or_else(|| {
                    Error::InvalidXlsx(format!("bad cell reference {reference:?}"))
                })?,
                None => next_col,
            };
            next_col = col + 1;
            let value = cell_value(cell, &shared);
            if value != CellValue::Empty {
                cells.push((col, value));
            }
        }
        sparse.push(cells);
    }

    let origin = sparse.iter().flatten().map(|(col, _)| *col).min().unwrap_or(0);
    Ok(sparse
        .into_iter()
        .filter(|cells| !cells.is_empty())
        .map(|cells| {
            let mut row = Vec::new();
            for (col, value) in cells {
                let col = col - origin;
                if row.len() <= col {
                    row.resize(col + 1, CellValue::Empty);
                }
                row[col] = value;
            }
            row
        })
        .collect())
}

fn cell(row: &Row, index: usize) -> &CellValue {
    row.get(index).unwrap_or(&CellValue::Empty)
}

fn is_ledger_header(row: &Row) -> bool {
    let label = cell(row, 0).to_text();
    label.to_lowercase().contains("date") && row.len() >= LEDGER_HEADER_MIN_CELLS
}

/// Split worksheet rows into account metadata and ledger rows.
///
/// Metadata is read from label/value pairs above the ledger header; every
/// known field whose label occurs in the row label takes the value. Ledger
/// rows keep their first six cells and are dropped when Date, Particulars,
/// Debit and Credit are all empty.
pub fn extract_statement(rows: &[Row]) -> Statement {
    let mut account = AccountInfo::new();
    let mut transactions = Vec::new();
    let mut in_ledger = false;

    for row in rows {
        if !in_ledger {
            if is_ledger_header(row) {
                in_ledger = true;
                continue;
            }
            let label = cell(row, 0).to_text();
            let label = label.trim();
            let value = cell(row, 1);
            if label.is_empty() || !value.is_truthy() {
                continue;
            }
            for field in AccountField::ALL {
                if label.contains(field.label()) {
                    let text = match field {
                        AccountField::AsOf => format_date(value),
                        _ => value.to_text(),
                    };
                    account.set(field, text);
                }
            }
            continue;
        }

        let tx = Transaction {
            date: format_date(cell(row, 0)),
            particulars: cell(row, 1).to_text(),
            instrument_no: cell(row, 2).to_text(),
            debit: cell(row, 3).to_text(),
            credit: cell(row, 4).to_text(),
            balance: cell(row, 5).to_text(),
        };
        if tx.has_content() {
            transactions.push(tx);
        }
    }

    if !in_ledger {
        log::warn!("No ledger header row (a \"Date\" column) found in worksheet");
    }
    Statement {
        account,
        transactions,
    }
}
