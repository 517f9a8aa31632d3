use crate::cli::OutputFormat;
use crate::trust::matching::evaluate_trust;
use crate::trust::patterns::load_taxonomy;
use colored::Colorize;

pub fn run(repo: &str, pattern: &str, add: bool, format: OutputFormat) -> Result<(), String> {
    if add && !pattern.contains(':') {
        return Err(format!(
            "Invalid pattern '{pattern}'. Expected 'category:label' or 'category:*'."
        ));
    }

    let (store, mut state) = super::load_current(repo)?;

    if add {
        let category = pattern.split(':').next().unwrap_or(pattern);
        let known_category = load_taxonomy().iter().any(|c| c.id == category);
        if !known_category && format == OutputFormat::Text {
            eprintln!(
                "{} Category '{}' is not in the taxonomy (pattern added anyway)",
                "Warning:".yellow(),
                category
            );
        }

        if state.trust_list.iter().any(|p| p == pattern) {
            if format == OutputFormat::Json {
                return super::print_json(&serde_json::json!({
                    "message": "Pattern already trusted",
                    "pattern": pattern,
                }));
            }
            println!("Pattern '{}' is already trusted", pattern.cyan());
            return Ok(());
        }
        state.trust_list.push(pattern.to_owned());
    } else {
        let before = state.trust_list.len();
        state.trust_list.retain(|p| p != pattern);
        if state.trust_list.len() == before {
            if format == OutputFormat::Json {
                return super::print_json(&serde_json::json!({
                    "message": "Pattern not in trust list",
                    "pattern": pattern,
                }));
            }
            println!("Pattern '{}' was not in the trust list", pattern.cyan());
            return Ok(());
        }
    }

    // How many undecided hunks this leaves auto-approved.
    let trusted_now = state
        .hunks
        .values()
        .filter(|h| h.status.is_none() && evaluate_trust(&h.label, &state.trust_list).all_trusted)
        .count();

    state.updated_at = crate::time::now_iso8601();
    let version = super::save(&store, &mut state)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "pattern": pattern,
            "added": add,
            "trustList": state.trust_list,
            "hunksTrusted": trusted_now,
            "version": version,
        })),
        OutputFormat::Text => {
            let action = if add { "Added" } else { "Removed" };
            println!(
                "{} {action} '{}' — {} hunk(s) now auto-approved by trust",
                "✓".green(),
                pattern.cyan(),
                trusted_now,
            );
            Ok(())
        }
    }
}
