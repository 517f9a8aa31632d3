use crate::cli::OutputFormat;
use crate::review::storage::CentralStore;
use colored::Colorize;
use std::path::PathBuf;

pub fn run(repo: &str, format: OutputFormat) -> Result<(), String> {
    let store = CentralStore::new(PathBuf::from(repo));
    let reviews = store.list_reviews().map_err(|e| e.to_string())?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "reviews": reviews })),
        OutputFormat::Text => {
            if reviews.is_empty() {
                println!("No saved reviews.");
                return Ok(());
            }
            for review in reviews {
                println!(
                    "{}  {}/{} hunks  updated {}",
                    review.key.cyan(),
                    review.reviewed_hunks,
                    review.total_diff_hunks,
                    review.updated_at,
                );
            }
            Ok(())
        }
    }
}
