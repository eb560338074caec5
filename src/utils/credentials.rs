//! API keys stored in plain files, one key per file

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not read credential file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {0} is empty")]
    Empty(PathBuf),
}

/// Read the secret on the first line of `path`
pub fn read_secret(path: &Path) -> Result<String, CredentialError> {
    let content = fs::read_to_string(path).map_err(|source| CredentialError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let secret = content.lines().next().unwrap_or_default().trim();
    if secret.is_empty() {
        return Err(CredentialError::Empty(path.to_path_buf()));
    }

    Ok(secret.to_string())
}
