use crate::cli::OutputFormat;
use colored::Colorize;

pub fn run(repo: &str, format: OutputFormat) -> Result<(), String> {
    let (_store, state) = super::load_current(repo)?;

    let hunk_ids: Vec<String> = state.hunks.keys().cloned().collect();
    let progress = state.progress(&hunk_ids);

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "comparison": state.comparison,
            "version": state.version,
            "totalDiffHunks": state.total_diff_hunks,
            "progress": progress,
            "trustList": state.trust_list,
            "updatedAt": state.updated_at,
        })),
        OutputFormat::Text => {
            println!("Review: {}", state.comparison.key.cyan());
            println!(
                "  {} approved, {} rejected, {} saved for later, {} trusted",
                progress.approved.to_string().green(),
                progress.rejected.to_string().red(),
                progress.saved_for_later,
                progress.trusted,
            );
            println!(
                "  {} of {} tracked hunks reviewed (diff has {} hunks)",
                progress.reviewed, progress.total, state.total_diff_hunks
            );
            if !state.trust_list.is_empty() {
                println!("  trusted patterns: {}", state.trust_list.join(", "));
            }
            if !state.notes.is_empty() {
                println!("  notes: {}", state.notes);
            }
            Ok(())
        }
    }
}
