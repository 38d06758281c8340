//! Refresh-token file handling.
//!
//! The file holds a single token string. It is re-written whenever the
//! identity provider rotates the token, so a stale copy never survives a run.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::AppError;

/// Read the refresh token, trimming surrounding whitespace.
pub fn read_refresh_token(path: &Path) -> Result<String, AppError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::usage(format!(
            "Failed to read refresh token file '{}': {e}\n{}",
            path.display(),
            remediation(path)
        ))
    })?;

    let token = raw.trim();
    if token.is_empty() {
        return Err(AppError::usage(format!(
            "Refresh token file '{}' is empty.\n{}",
            path.display(),
            remediation(path)
        )));
    }
    Ok(token.to_string())
}

/// Persist a rotated refresh token.
pub fn save_refresh_token(path: &Path, token: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::usage(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    fs::write(path, format!("{}\n", token.trim())).map_err(|e| {
        AppError::usage(format!("Failed to write refresh token file '{}': {e}", path.display()))
    })?;
    info!("Saved rotated refresh token to {}", path.display());
    Ok(())
}

/// Instructions printed when the stored token is missing or rejected.
pub fn remediation(path: &Path) -> String {
    format!(
        "Log in to the WattiVahti portal in a browser, copy the refresh token \
         from the B2C token response and save it to '{}'.",
        path.display()
    )
}
