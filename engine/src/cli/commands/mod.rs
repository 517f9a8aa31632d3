pub mod compare;
pub mod decide;
pub mod list;
pub mod notes;
pub mod status;
pub mod trust;

use crate::review::state::ReviewState;
use crate::review::storage::{CentralStore, StateBackend, StorageError};
use std::path::PathBuf;

/// Open the central store for a repo and load the active comparison's state.
pub(crate) fn load_current(repo: &str) -> Result<(CentralStore, ReviewState), String> {
    let store = CentralStore::new(PathBuf::from(repo));
    let comparison = store
        .current_comparison()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| {
            "No active comparison. Use 'compare <base>..<head>' to set one.".to_owned()
        })?;
    let state = store
        .load(&comparison)
        .map_err(|e| e.to_string())?
        .unwrap_or_else(|| ReviewState::new(comparison));
    Ok((store, state))
}

/// Save, resolving one version conflict by adopting the on-disk version.
/// The CLI is a short-lived external writer, so last-writer-wins is fine.
pub(crate) fn save(store: &CentralStore, state: &mut ReviewState) -> Result<u64, String> {
    match store.save(state) {
        Ok(version) => Ok(version),
        Err(StorageError::VersionConflict { found, .. }) => {
            state.version = found;
            store.save(state).map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

pub(crate) fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize: {e}"))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::traits::Comparison;

    #[test]
    fn test_missing_comparison_is_a_clear_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let home = tempfile::TempDir::new().unwrap();
        let _lock = crate::review::central::tests::ENV_LOCK.lock().unwrap();
        std::env::set_var("REVIEW_ENGINE_HOME", home.path());
        let result = load_current(tmp.path().to_str().unwrap());
        std::env::remove_var("REVIEW_ENGINE_HOME");
        assert!(result.unwrap_err().contains("No active comparison"));
    }

    #[test]
    fn test_save_recovers_from_one_conflict() {
        let tmp = tempfile::TempDir::new().unwrap();
        let home = tempfile::TempDir::new().unwrap();
        let _lock = crate::review::central::tests::ENV_LOCK.lock().unwrap();
        std::env::set_var("REVIEW_ENGINE_HOME", home.path());

        let store = CentralStore::new(tmp.path());
        let comparison = Comparison::new("main", "HEAD");
        store.save(&ReviewState::new(comparison.clone())).unwrap();

        // Stale writer: version 0 against version 1 on disk.
        let mut stale = ReviewState::new(comparison);
        stale.notes = "cli edit".to_owned();
        let version = save(&store, &mut stale).unwrap();
        std::env::remove_var("REVIEW_ENGINE_HOME");
        assert_eq!(version, 2);
    }
}
