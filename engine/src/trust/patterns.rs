//! The bundled label taxonomy.
//!
//! Every classification label — static or AI — must be one of the pattern
//! ids defined here. The taxonomy ships as JSON so front-ends can render
//! names and descriptions; a hardcoded fallback covers a corrupted bundle.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustPattern {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub patterns: Vec<TrustPattern>,
}

#[derive(Deserialize)]
struct TaxonomyFile {
    categories: Vec<TrustCategory>,
}

/// Load the bundled taxonomy, falling back to a minimal hardcoded set if the
/// bundled JSON fails to parse.
pub fn load_taxonomy() -> Vec<TrustCategory> {
    let bundled = include_str!("../../resources/taxonomy.json");
    match serde_json::from_str::<TaxonomyFile>(bundled) {
        Ok(file) => file.categories,
        Err(e) => {
            log::error!("[taxonomy] Failed to parse bundled taxonomy: {e}");
            fallback_taxonomy()
        }
    }
}

/// Valid pattern ids, computed once.
fn valid_label_ids() -> &'static HashSet<String> {
    static IDS: OnceLock<HashSet<String>> = OnceLock::new();
    IDS.get_or_init(|| {
        load_taxonomy()
            .into_iter()
            .flat_map(|cat| cat.patterns.into_iter().map(|p| p.id))
            .collect()
    })
}

/// Check whether `label` is a pattern id defined in the taxonomy.
pub fn is_valid_label(label: &str) -> bool {
    valid_label_ids().contains(label)
}

fn fallback_taxonomy() -> Vec<TrustCategory> {
    let pattern = |id: &str, name: &str, description: &str| TrustPattern {
        id: id.to_owned(),
        name: name.to_owned(),
        description: description.to_owned(),
    };

    vec![
        TrustCategory {
            id: "imports".to_owned(),
            name: "Imports".to_owned(),
            description: "Changes to import statements".to_owned(),
            patterns: vec![
                pattern("imports:added", "Added", "New import statements added"),
                pattern("imports:removed", "Removed", "Import statements removed"),
            ],
        },
        TrustCategory {
            id: "formatting".to_owned(),
            name: "Formatting".to_owned(),
            description: "Code style and formatting changes".to_owned(),
            patterns: vec![pattern(
                "formatting:whitespace",
                "Whitespace",
                "Whitespace-only changes",
            )],
        },
    ]
}
