//! Deterministic, rule-based hunk labeling.
//!
//! Runs before any AI call and never touches the network. All rules are
//! conservative: a hunk is labeled only when the entire change matches one
//! pattern; anything uncertain returns `None` and falls through to the AI.

use crate::classify::{ClassificationResult, ClassifyResponse};
use crate::diff::parser::{Hunk, HunkLine, LineKind};
use std::collections::HashMap;

/// Upper bound on changed lines for an AI-classifiable hunk. Larger hunks
/// essentially never match a single trivial label.
const MAX_CHANGED_LINES_FOR_AI: usize = 80;

/// Label every hunk a rule confidently matches; mark hunks the AI should
/// not bother with.
pub fn classify_hunks_static(hunks: &[Hunk]) -> ClassifyResponse {
    let mut classifications = HashMap::new();
    let mut skipped_hunk_ids = Vec::new();

    for hunk in hunks {
        if let Some(result) = classify_hunk(hunk) {
            classifications.insert(hunk.id.clone(), result);
        } else if should_skip_ai(hunk).is_some() {
            skipped_hunk_ids.push(hunk.id.clone());
        }
    }

    ClassifyResponse {
        classifications,
        skipped_hunk_ids,
    }
}

/// First matching rule wins; cheapest checks first.
fn classify_hunk(hunk: &Hunk) -> Option<ClassificationResult> {
    rule_moved(hunk)
        .or_else(|| rule_lockfile(hunk))
        .or_else(|| rule_empty_file(hunk))
        .or_else(|| rule_whitespace(hunk))
        .or_else(|| rule_line_length(hunk))
        .or_else(|| rule_style(hunk))
        .or_else(|| rule_comments(hunk))
        .or_else(|| rule_imports(hunk))
}

/// Reason the AI phase should skip this hunk, if any.
pub fn should_skip_ai(hunk: &Hunk) -> Option<&'static str> {
    let changed = changed_lines(hunk);
    if changed.len() > MAX_CHANGED_LINES_FOR_AI {
        return Some("too many changed lines for a single-label match");
    }
    if is_generated_path(&hunk.file_path) {
        return Some("generated or minified file");
    }
    // Pure deletions: removal labels are fully covered by the static rules,
    // so an unlabeled deletion hunk has nothing left for the AI to find.
    if !changed.is_empty() && changed.iter().all(|l| l.kind == LineKind::Removed) {
        return Some("deletions only");
    }
    None
}

fn is_generated_path(path: &str) -> bool {
    let lowered = path.to_lowercase();
    lowered.ends_with(".min.js")
        || lowered.ends_with(".min.css")
        || lowered.ends_with(".map")
        || lowered.contains("/dist/")
        || lowered.contains("/node_modules/")
        || lowered.contains("/__generated__/")
}

fn label(id: &str, reasoning: &str) -> ClassificationResult {
    ClassificationResult {
        label: vec![id.to_owned()],
        reasoning: reasoning.to_owned(),
    }
}

fn changed_lines(hunk: &Hunk) -> Vec<&HunkLine> {
    hunk.lines
        .iter()
        .filter(|l| l.kind != LineKind::Context)
        .collect()
}

fn split_changed<'a>(changed: &[&'a HunkLine]) -> (Vec<&'a str>, Vec<&'a str>) {
    let removed = changed
        .iter()
        .filter(|l| l.kind == LineKind::Removed)
        .map(|l| l.content.as_str())
        .collect();
    let added = changed
        .iter()
        .filter(|l| l.kind == LineKind::Added)
        .map(|l| l.content.as_str())
        .collect();
    (removed, added)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- Move pairs (single field check) ---

fn rule_moved(hunk: &Hunk) -> Option<ClassificationResult> {
    hunk.move_pair_id.as_ref()?;
    Some(label(
        "move:code",
        "Hunk is half of a move pair (identical content relocated between files)",
    ))
}

// --- Lockfiles (path-based) ---

const LOCKFILE_NAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "go.sum",
    "composer.lock",
    "Pipfile.lock",
    "bun.lock",
    "bun.lockb",
    "flake.lock",
    "uv.lock",
];

fn rule_lockfile(hunk: &Hunk) -> Option<ClassificationResult> {
    let filename = hunk.file_path.rsplit('/').next().unwrap_or(&hunk.file_path);
    if LOCKFILE_NAMES.contains(&filename) {
        Some(label("generated:lockfile", "File is a package manager lockfile"))
    } else {
        None
    }
}

// --- New empty files ---

fn rule_empty_file(hunk: &Hunk) -> Option<ClassificationResult> {
    if hunk.old_count != 0 {
        return None;
    }
    let only_added = hunk.lines.iter().all(|l| l.kind == LineKind::Added);
    let all_blank = hunk.lines.iter().all(|l| l.content.trim().is_empty());
    if only_added && all_blank {
        Some(label(
            "file:added-empty",
            "New empty file (no content or whitespace only)",
        ))
    } else {
        None
    }
}

// --- Whitespace-only changes ---

fn rule_whitespace(hunk: &Hunk) -> Option<ClassificationResult> {
    let changed = changed_lines(hunk);
    if changed.is_empty() {
        return None;
    }
    if changed.iter().all(|l| l.content.trim().is_empty()) {
        Some(label(
            "formatting:whitespace",
            "All changed lines are empty or whitespace-only",
        ))
    } else {
        None
    }
}

// --- Line rewrapping ---

fn rule_line_length(hunk: &Hunk) -> Option<ClassificationResult> {
    let changed = changed_lines(hunk);
    let (removed, added) = split_changed(&changed);
    if removed.is_empty() || added.is_empty() {
        return None;
    }

    let removed_flat = collapse_whitespace(&removed.join(" "));
    let added_flat = collapse_whitespace(&added.join(" "));
    if !removed_flat.is_empty() && removed_flat == added_flat {
        Some(label(
            "formatting:line-length",
            "Content is identical after joining wrapped lines",
        ))
    } else {
        None
    }
}

// --- Punctuation-only style changes ---

fn rule_style(hunk: &Hunk) -> Option<ClassificationResult> {
    let changed = changed_lines(hunk);
    let (removed, added) = split_changed(&changed);
    if removed.is_empty() || removed.len() != added.len() {
        return None;
    }

    let normalize = |line: &str| {
        let stripped = line.trim().trim_end_matches(';').trim_end_matches(',');
        collapse_whitespace(&stripped.replace('\'', "\""))
    };

    let all_match = removed.iter().zip(&added).all(|(r, a)| {
        let rn = normalize(r);
        !rn.is_empty() && rn == normalize(a)
    });

    if all_match {
        Some(label(
            "formatting:style",
            "Only punctuation changed (semicolons, quote style, or trailing commas)",
        ))
    } else {
        None
    }
}

// --- Comment-only changes ---

fn line_comment_prefixes(ext: &str) -> Option<&'static [&'static str]> {
    match ext {
        "rs" | "go" | "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" | "java" | "kt" | "swift"
        | "c" | "cc" | "cpp" | "h" | "hpp" | "cs" | "scala" | "dart" | "zig" | "css" => {
            Some(&["//"])
        }
        "py" | "rb" | "sh" | "bash" | "zsh" | "yml" | "yaml" | "toml" | "tf" | "mk" | "r" => {
            Some(&["#"])
        }
        "lua" | "hs" | "sql" => Some(&["--"]),
        _ => None,
    }
}

fn block_comment_delims(ext: &str) -> Option<(&'static str, &'static str)> {
    match ext {
        "rs" | "go" | "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" | "java" | "kt" | "swift"
        | "c" | "cc" | "cpp" | "h" | "hpp" | "cs" | "scala" | "dart" | "css" => Some(("/*", "*/")),
        "html" | "xml" | "svg" => Some(("<!--", "-->")),
        _ => None,
    }
}

fn rule_comments(hunk: &Hunk) -> Option<ClassificationResult> {
    let ext = hunk.file_path.rsplit('.').next()?;
    let prefixes = line_comment_prefixes(ext);
    let block = block_comment_delims(ext);
    if prefixes.is_none() && block.is_none() {
        return None;
    }

    let changed = changed_lines(hunk);
    if changed.is_empty() {
        return None;
    }

    // Block-comment state tracked per side: removed lines describe the old
    // text, added lines the new.
    let mut in_block_added = false;
    let mut in_block_removed = false;

    for line in &changed {
        let trimmed = line.content.trim();
        if trimmed.is_empty() {
            continue;
        }
        if prefixes.is_some_and(|p| p.iter().any(|pre| trimmed.starts_with(pre))) {
            continue;
        }
        let Some((open, close)) = block else {
            return None;
        };
        let in_block = if line.kind == LineKind::Added {
            &mut in_block_added
        } else {
            &mut in_block_removed
        };
        if *in_block {
            if let Some(pos) = trimmed.find(close) {
                // Trailing code after the close means this is a mixed line.
                if !trimmed[pos + close.len()..].trim().is_empty() {
                    return None;
                }
                *in_block = false;
            }
        } else if trimmed.starts_with(open) {
            match trimmed.find(close) {
                Some(pos) if trimmed[pos + close.len()..].trim().is_empty() => {}
                Some(_) => return None,
                None => *in_block = true,
            }
        } else {
            return None;
        }
    }

    let has_added = changed.iter().any(|l| l.kind == LineKind::Added);
    let has_removed = changed.iter().any(|l| l.kind == LineKind::Removed);
    let id = match (has_added, has_removed) {
        (true, false) => "comments:added",
        (false, true) => "comments:removed",
        (true, true) => "comments:modified",
        (false, false) => return None,
    };
    Some(label(id, "All changed lines are comments"))
}

// --- Import-only changes ---

/// Import prefixes plus the bracket opening a multi-line form ('\0' when the
/// language has no multi-line imports).
fn import_config(ext: &str) -> Option<(&'static [&'static str], char)> {
    match ext {
        "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Some((&["import ", "import{"], '{')),
        "py" => Some((&["import ", "from "], '(')),
        "go" => Some((&["import "], '(')),
        "rs" => Some((&["use "], '{')),
        "java" | "kt" | "scala" => Some((&["import "], '\0')),
        "c" | "cc" | "cpp" | "h" | "hpp" => Some((&["#include"], '\0')),
        "rb" => Some((&["require ", "require_relative "], '\0')),
        "cs" => Some((&["using "], '\0')),
        "swift" | "dart" => Some((&["import "], '\0')),
        _ => None,
    }
}

fn closing_bracket(open: char) -> char {
    match open {
        '(' => ')',
        '{' => '}',
        _ => '\0',
    }
}

fn all_import_lines(lines: &[&HunkLine], prefixes: &[&str], bracket: char) -> bool {
    let close = closing_bracket(bracket);
    let mut depth = 0i32;

    for line in lines {
        let trimmed = line.content.trim();
        if trimmed.is_empty() {
            continue;
        }

        let starts_import = prefixes.iter().any(|p| trimmed.starts_with(p));
        if starts_import {
            if bracket != '\0' {
                depth += count_char(trimmed, bracket) - count_char(trimmed, close);
            }
        } else if bracket != '\0' && depth > 0 {
            // Continuation of a multi-line import: identifiers, strings, or
            // the closing bracket itself.
            let plausible = matches!(
                trimmed.chars().next(),
                Some('a'..='z' | 'A'..='Z' | '_' | '"' | '\'')
            ) || trimmed.starts_with(close);
            if !plausible {
                return false;
            }
            depth += count_char(trimmed, bracket) - count_char(trimmed, close);
        } else {
            return false;
        }
    }

    true
}

fn count_char(s: &str, c: char) -> i32 {
    s.chars().filter(|&ch| ch == c).count() as i32
}

fn rule_imports(hunk: &Hunk) -> Option<ClassificationResult> {
    let ext = hunk.file_path.rsplit('.').next()?;
    let (prefixes, bracket) = import_config(ext)?;

    let changed = changed_lines(hunk);
    if changed.is_empty() || !all_import_lines(&changed, prefixes, bracket) {
        return None;
    }

    let has_added = changed.iter().any(|l| l.kind == LineKind::Added);
    let has_removed = changed.iter().any(|l| l.kind == LineKind::Removed);

    match (has_added, has_removed) {
        (true, false) => Some(label(
            "imports:added",
            "All changed lines are import statements (additions only)",
        )),
        (false, true) => Some(label(
            "imports:removed",
            "All changed lines are import statements (removals only)",
        )),
        (true, true) => {
            if is_import_reorder(&changed, prefixes) {
                Some(label(
                    "imports:reordered",
                    "Import statements reordered (same set of imports)",
                ))
            } else {
                Some(label(
                    "imports:modified",
                    "All changed lines are import statements (modified)",
                ))
            }
        }
        (false, false) => None,
    }
}

/// Same normalized import set on both sides means a pure reorder.
fn is_import_reorder(changed: &[&HunkLine], prefixes: &[&str]) -> bool {
    let side = |kind: LineKind| -> Vec<String> {
        let mut lines: Vec<String> = changed
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.content.trim())
            .filter(|t| !t.is_empty() && prefixes.iter().any(|p| t.starts_with(p)))
            .map(collapse_whitespace)
            .collect();
        lines.sort();
        lines
    };

    let added = side(LineKind::Added);
    let removed = side(LineKind::Removed);
    !added.is_empty() && added == removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parser::parse_file_diff;

    fn hunk(path: &str, body: &str) -> Hunk {
        let counted = body.lines().count() as u32;
        let diff = format!("@@ -1,{counted} +1,{counted} @@\n{body}");
        parse_file_diff(&diff, path).remove(0)
    }

    #[test]
    fn test_move_pair_takes_priority() {
        let mut h = hunk("Cargo.lock", "+[[package]]");
        h.move_pair_id = Some("other.rs:abcd1234".to_owned());
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["move:code"]);
    }

    #[test]
    fn test_lockfile() {
        let h = hunk("some/dir/yarn.lock", "+resolved");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["generated:lockfile"]);
        let h = hunk("src/main.rs", "+fn main() {}");
        assert!(rule_lockfile(&h).is_none());
    }

    #[test]
    fn test_empty_file() {
        let mut h = hunk("pkg/__init__.py", "+\n+   ");
        h.old_count = 0;
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["file:added-empty"]);

        let mut h = hunk("pkg/__init__.py", "+# not empty");
        h.old_count = 0;
        assert!(rule_empty_file(&h).is_none());
    }

    #[test]
    fn test_whitespace_only() {
        let h = hunk("src/main.rs", "+\n-   \n+  ");
        assert_eq!(
            classify_hunk(&h).unwrap().label,
            vec!["formatting:whitespace"]
        );
        let h = hunk("src/main.rs", "+\n+let x = 1;");
        assert!(rule_whitespace(&h).is_none());
    }

    #[test]
    fn test_line_length_rewrap() {
        let h = hunk(
            "src/app.ts",
            "-const r = foo(bar, baz);\n+const r =\n+  foo(bar, baz);",
        );
        assert_eq!(
            classify_hunk(&h).unwrap().label,
            vec!["formatting:line-length"]
        );

        let h = hunk(
            "src/app.ts",
            "-const r = foo(bar, baz);\n+const r = foo(bar, qux);",
        );
        assert!(rule_line_length(&h).is_none());
    }

    #[test]
    fn test_style_punctuation() {
        let h = hunk("src/app.ts", "-const x = 1\n+const x = 1;");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["formatting:style"]);

        let h = hunk("src/app.js", "-const s = 'hi'\n+const s = \"hi\"");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["formatting:style"]);

        let h = hunk("src/app.ts", "-const x = 1;\n+const x = 2;");
        assert!(rule_style(&h).is_none());
    }

    #[test]
    fn test_comments_line_style() {
        let h = hunk("src/main.rs", "+// one\n+// two");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["comments:added"]);

        let h = hunk("script.py", "-# gone");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["comments:removed"]);

        let h = hunk("app.js", "-// old\n+// new");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["comments:modified"]);

        let h = hunk("app.js", "+// comment\n+const x = 1;");
        assert!(rule_comments(&h).is_none());

        let h = hunk("file.xyz", "+// comment");
        assert!(rule_comments(&h).is_none());
    }

    #[test]
    fn test_comments_block_style() {
        let h = hunk("app.js", "+/* start\n+   middle\n+   end */");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["comments:added"]);

        let h = hunk("index.html", "+<!-- note -->");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["comments:added"]);

        let h = hunk("app.js", "+/* closed */ const x = 1;");
        assert!(rule_comments(&h).is_none());
    }

    #[test]
    fn test_imports_single_line() {
        let h = hunk("src/lib.rs", "+use std::collections::HashMap;");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["imports:added"]);

        let h = hunk("main.py", "-import os\n-from sys import argv");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["imports:removed"]);

        let h = hunk("main.c", "+#include <stdio.h>");
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["imports:added"]);
    }

    #[test]
    fn test_imports_multiline() {
        let h = hunk(
            "src/lib.rs",
            "+use std::collections::{\n+    HashMap,\n+    HashSet,\n+};",
        );
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["imports:added"]);

        let h = hunk(
            "main.py",
            "+from models import (\n+    query,\n+    sql,\n+)\n+x = query.run()",
        );
        assert!(rule_imports(&h).is_none());
    }

    #[test]
    fn test_imports_reorder_vs_modify() {
        let h = hunk(
            "index.js",
            "-import { b } from './b';\n-import { a } from './a';\n+import { a } from './a';\n+import { b } from './b';",
        );
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["imports:reordered"]);

        let h = hunk(
            "index.js",
            "-import { a } from './a';\n+import { b } from './b';",
        );
        assert_eq!(classify_hunk(&h).unwrap().label, vec!["imports:modified"]);
    }

    #[test]
    fn test_import_mixed_with_code_unclassified() {
        let h = hunk("app.ts", "+import { Foo } from './foo';\n+const x = new Foo();");
        assert!(classify_hunk(&h).is_none());
    }

    #[test]
    fn test_skip_heuristics() {
        let big: String = (0..100).map(|i| format!("+line {i}\n")).collect();
        let h = hunk("src/main.rs", big.trim_end());
        assert!(should_skip_ai(&h).is_some());

        let h = hunk("dist/bundle.min.js", "+var a=1;");
        assert!(should_skip_ai(&h).is_some());

        let h = hunk("src/logic.rs", "-let gone = true;");
        assert!(should_skip_ai(&h).is_some());

        let h = hunk("src/logic.rs", "+let fresh = true;");
        assert!(should_skip_ai(&h).is_none());
    }

    #[test]
    fn test_batch_classification() {
        let hunks = vec![
            hunk("Cargo.lock", "+[[package]]"),
            hunk("src/main.rs", "+fn main() { run(); }"),
            hunk("src/lib.rs", "+use std::io;"),
        ];
        let response = classify_hunks_static(&hunks);
        assert_eq!(response.classifications.len(), 2);
        assert!(response.classifications.contains_key(&hunks[0].id));
        assert!(response.classifications.contains_key(&hunks[2].id));
        assert!(!response.classifications.contains_key(&hunks[1].id));
    }

    #[test]
    fn test_context_only_hunk_unclassified() {
        let h = parse_file_diff("@@ -1,1 +1,1 @@\n unchanged", "src/main.rs").remove(0);
        assert!(classify_hunk(&h).is_none());
    }
}
