//! Central storage root.
//!
//! Review documents live outside the repositories they describe, under
//! `$REVIEW_ENGINE_HOME` (or `~/.review-engine/`):
//!
//! ```text
//! ~/.review-engine/
//!   repos/
//!     <16-char-hex-hash>/       # sha256 of the canonical repo path
//!       reviews/
//!         <comparison-key>.json # ReviewState
//!       current                 # key of the active comparison
//! ```

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CentralError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not determine home directory")]
    Home,
}

/// `$REVIEW_ENGINE_HOME` if set, otherwise `~/.review-engine`.
pub fn central_root() -> Result<PathBuf, CentralError> {
    if let Ok(home) = std::env::var("REVIEW_ENGINE_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().ok_or(CentralError::Home)?;
    Ok(home.join(".review-engine"))
}

/// 16 hex chars identifying a repository by its canonical path.
pub fn repo_id(repo_path: &Path) -> String {
    let canonical = repo_path
        .canonicalize()
        .unwrap_or_else(|_| repo_path.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Storage directory for one repository.
pub fn repo_storage_dir(repo_path: &Path) -> Result<PathBuf, CentralError> {
    Ok(central_root()?.join("repos").join(repo_id(repo_path)))
}
