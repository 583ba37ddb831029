use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid spreadsheet: {0}")]
    InvalidXlsx(String),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("statement has no transactions to render")]
    EmptyLedger,

    #[error("statement has no account information")]
    MissingAccountInfo,

    #[error("invalid layout configuration: {0}")]
    InvalidLayout(String),

    #[error("failed to load asset {}: {reason}", path.display())]
    Asset { path: PathBuf, reason: String },

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

impl Error {
    pub(crate) fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Asset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
