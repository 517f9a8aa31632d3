pub mod matching;
pub mod patterns;

pub use matching::{evaluate_trust, matches_any_pattern, matches_pattern, TrustEvaluation};
pub use patterns::{is_valid_label, load_taxonomy, TrustCategory, TrustPattern};
