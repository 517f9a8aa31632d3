use crate::cli::OutputFormat;
use crate::review::state::ReviewState;
use crate::review::storage::{CentralStore, StateBackend};
use crate::sources::traits::Comparison;
use colored::Colorize;
use std::path::PathBuf;

pub fn run(repo: &str, key: &str, format: OutputFormat) -> Result<(), String> {
    if !key.contains("..") {
        return Err(format!(
            "Invalid comparison '{key}'. Expected '<base>..<head>' (append '+' to include the working tree)."
        ));
    }

    let comparison = Comparison::parse_key(key);
    let store = CentralStore::new(PathBuf::from(repo));
    store
        .set_current_comparison(&comparison)
        .map_err(|e| e.to_string())?;

    // Make the review visible on disk immediately, without clobbering an
    // existing document.
    let exists = store
        .load(&comparison)
        .map_err(|e| e.to_string())?
        .is_some();
    if !exists {
        store
            .save(&ReviewState::new(comparison.clone()))
            .map_err(|e| e.to_string())?;
    }

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "comparison": comparison,
            "created": !exists,
        })),
        OutputFormat::Text => {
            println!("{} Active comparison set to {}", "✓".green(), key.cyan());
            if comparison.working_tree {
                println!("  (working-tree changes included)");
            }
            Ok(())
        }
    }
}
