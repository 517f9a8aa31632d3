use crate::cli::OutputFormat;
use colored::Colorize;

pub fn run(repo: &str, text: &str, format: OutputFormat) -> Result<(), String> {
    let (store, mut state) = super::load_current(repo)?;
    state.notes = text.to_owned();
    state.updated_at = crate::time::now_iso8601();
    let version = super::save(&store, &mut state)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "notes": state.notes,
            "version": version,
        })),
        OutputFormat::Text => {
            println!("{} Notes updated", "✓".green());
            Ok(())
        }
    }
}
