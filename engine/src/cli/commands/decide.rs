use crate::cli::OutputFormat;
use crate::review::state::ReviewStatus;
use colored::Colorize;

/// Shared implementation for `approve` and `reject`.
pub fn run(
    repo: &str,
    hunk_ids: &[String],
    status: ReviewStatus,
    format: OutputFormat,
) -> Result<(), String> {
    if hunk_ids.is_empty() {
        return Err("No hunk ids given. Expected one or more '<path>:<hash>' ids.".to_owned());
    }
    for id in hunk_ids {
        if !id.contains(':') {
            return Err(format!("Invalid hunk id '{id}'. Expected '<path>:<hash>'."));
        }
    }

    let (store, mut state) = super::load_current(repo)?;
    let mut changed = 0;
    for id in hunk_ids {
        let hunk = state.hunk_mut(id);
        if hunk.status != Some(status) {
            hunk.status = Some(status);
            changed += 1;
        }
    }
    state.updated_at = crate::time::now_iso8601();
    let version = super::save(&store, &mut state)?;

    let verb = match status {
        ReviewStatus::Approved => "approved",
        ReviewStatus::Rejected => "rejected",
        ReviewStatus::SavedForLater => "saved for later",
    };

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "status": verb,
            "hunks": hunk_ids,
            "changed": changed,
            "version": version,
        })),
        OutputFormat::Text => {
            println!(
                "{} {} hunk(s) {verb} ({} already were)",
                "✓".green(),
                changed,
                hunk_ids.len() - changed,
            );
            Ok(())
        }
    }
}
