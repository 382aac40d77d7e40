//! `--json` documents.
//!
//! On success a command prints its own result document; on failure `main`
//! prints [`error_document`] instead of the human `Error:` line. Either way
//! stdout carries exactly one pretty-printed JSON value.

use anyhow::{Context, Result};
use bootchain_common::{DescriptionError, StoreError};
use serde::Serialize;

use crate::domain::{AppError, GraphError};

#[derive(Serialize)]
struct ErrorDocument<'a> {
    error: bool,
    message: &'a str,
    code: &'static str,
}

/// Stable machine-readable code for the outermost typed error in `err`'s chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.is::<GraphError>() {
            return "INVALID_GRAPH";
        }
        if cause.is::<DescriptionError>() {
            return "INVALID_DESCRIPTION";
        }
        if let Some(app) = cause.downcast_ref::<AppError>() {
            return match app {
                AppError::NotDeployed(_) => "NOT_DEPLOYED",
                AppError::MissingImage(_) => "MISSING_IMAGE",
                AppError::StillRunning { .. } => "STILL_RUNNING",
            };
        }
        if cause.is::<StoreError>() {
            return "STORE_ERROR";
        }
    }
    "COMMAND_FAILED"
}

/// `{"error": true, "message": "...", "code": "..."}` for a failed command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn error_document(err: &anyhow::Error) -> Result<String> {
    let message = format!("{err:#}");
    format_value(&ErrorDocument {
        error: true,
        message: &message,
        code: error_code(err),
    })
}

/// Pretty-print any serializable result.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_value(value: &impl Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}
