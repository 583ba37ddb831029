pub mod assets;
pub mod config;
mod error;
pub mod fonts;
pub mod format;
pub mod geometry;
pub mod model;
mod pdf;
pub mod xlsx;

pub use assets::{AssetSlot, DecorAssets, DecorImage};
pub use config::LayoutConfig;
pub use error::Error;
pub use fonts::{FontRole, FontSet};
pub use model::{AccountField, AccountInfo, CellValue, Statement, Transaction};
pub use pdf::{DisplayList, DrawOp, PageDecorator, Pagination, PlacedRow, StatementRenderer};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Render a statement to PDF bytes.
pub fn render_statement(statement: &Statement, config: &LayoutConfig) -> Result<Vec<u8>, Error> {
    StatementRenderer::new(config.clone())?.render(statement)
}

/// Pagination plan for a statement without drawing anything.
pub fn paginate_statement(statement: &Statement, config: &LayoutConfig) -> Result<Pagination, Error> {
    StatementRenderer::new(config.clone())?.paginate(statement)
}

pub fn convert_xlsx_to_pdf(input: &Path, output: &Path, config: &LayoutConfig) -> Result<(), Error> {
    convert(|| xlsx::parse(input), output, config)
}

pub fn convert_xlsx_bytes_to_pdf(input: &[u8], output: &Path, config: &LayoutConfig) -> Result<(), Error> {
    convert(|| xlsx::parse_bytes(input), output, config)
}

/// Convert a statement stored as JSON (`{"accountInfo": .., "transactions": [..]}`).
pub fn convert_json_to_pdf(input: &Path, output: &Path, config: &LayoutConfig) -> Result<(), Error> {
    convert(
        || {
            let text = std::fs::read_to_string(input).map_err(|e| {
                Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, input.display())))
            })?;
            Ok(serde_json::from_str(&text)?)
        },
        output,
        config,
    )
}

fn convert(
    parse: impl FnOnce() -> Result<Statement, Error>,
    output: &Path,
    config: &LayoutConfig,
) -> Result<(), Error> {
    let t0 = Instant::now();

    let statement = parse()?;
    let t_parse = t0.elapsed();

    let bytes = render_statement(&statement, config)?;
    let t_render = t0.elapsed();

    write_atomically(output, &bytes)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        ms(t_parse),
        ms(t_render - t_parse),
        ms(t_total - t_render),
        ms(t_total),
        bytes.len(),
    );

    Ok(())
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique per call, so concurrent writes to one output never share a
/// temporary file.
fn temp_sibling(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "statement.pdf".into());
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    output.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

/// Write through a temporary file next to `output` and rename it into
/// place, so a failed write never leaves a truncated PDF behind.
fn write_atomically(output: &Path, bytes: &[u8]) -> Result<(), Error> {
    let tmp = temp_sibling(output);
    let result = std::fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, output));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", e, output.display()),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_sits_next_to_output() {
        let tmp = temp_sibling(Path::new("/out/dir/report.pdf"));
        assert_eq!(tmp.parent(), Some(Path::new("/out/dir")));
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".report.pdf."));
        assert!(name.ends_with(".tmp"));
        assert_ne!(tmp, temp_sibling(Path::new("/out/dir/report.pdf")));
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = std::env::temp_dir().join(format!("statement-pdf-missing-{}", std::process::id()));
        let output = dir.join("nested").join("out.pdf");
        assert!(matches!(write_atomically(&output, b"%PDF-"), Err(Error::Io(_))));
        assert!(!output.exists());
        assert!(!dir.exists());
    }
}
