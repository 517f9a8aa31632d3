//! Hunk identity: parsing unified diff text into content-addressed hunks.
//!
//! A hunk's hash covers its diff lines only — never the `@@` header — so a
//! change elsewhere in the file that shifts line numbers does not change the
//! hunk's identity. Identical changed content anywhere in the comparison
//! produces identical hashes; that is intentional and callers track it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A contiguous changed region of one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    /// `filePath:hash` — the persistence key for this hunk.
    pub id: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "oldStart")]
    pub old_start: u32,
    #[serde(rename = "oldCount")]
    pub old_count: u32,
    #[serde(rename = "newStart")]
    pub new_start: u32,
    #[serde(rename = "newCount")]
    pub new_count: u32,
    /// The `@@` header line this hunk was parsed from (empty for synthesized hunks).
    pub header: String,
    /// Sign-prefixed diff body, one line per diff line.
    pub content: String,
    pub lines: Vec<HunkLine>,
    /// First 8 hex chars of a digest over the diff lines (header excluded).
    pub hash: String,
    /// Partner hunk id when this hunk is half of a detected move.
    #[serde(rename = "movePairId", skip_serializing_if = "Option::is_none")]
    pub move_pair_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunkLine {
    pub kind: LineKind,
    pub content: String,
    #[serde(rename = "oldLine")]
    pub old_line: Option<u32>,
    #[serde(rename = "newLine")]
    pub new_line: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

impl LineKind {
    fn sign(self) -> char {
        match self {
            Self::Context => ' ',
            Self::Added => '+',
            Self::Removed => '-',
        }
    }
}

/// First 8 hex chars of SHA-256 over `input`.
pub(crate) fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

/// Parse the unified diff text for a single file into hunks.
///
/// Malformed input never fails: hunks with parseable `@@` boundaries are
/// returned, and if the text has changes but no boundary at all, a single
/// whole-file fallback hunk is synthesized.
pub fn parse_file_diff(diff: &str, file_path: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut open: Option<PendingHunk> = None;

    for line in diff.lines() {
        if line.starts_with("@@") {
            if let Some(pending) = open.take() {
                hunks.push(pending.seal(file_path));
            }
            if let Some(bounds) = parse_hunk_header(line) {
                open = Some(PendingHunk::new(line, bounds));
            }
            continue;
        }

        let Some(pending) = open.as_mut() else {
            continue;
        };
        if let Some(rest) = line.strip_prefix('+') {
            if !line.starts_with("+++") {
                pending.push(LineKind::Added, rest);
            }
        } else if let Some(rest) = line.strip_prefix('-') {
            if !line.starts_with("---") {
                pending.push(LineKind::Removed, rest);
            }
        } else if let Some(rest) = line.strip_prefix(' ') {
            pending.push(LineKind::Context, rest);
        } else if line.is_empty() {
            pending.push(LineKind::Context, "");
        }
        // Anything else ("\ No newline at end of file", stray headers) is skipped.
    }

    if let Some(pending) = open.take() {
        hunks.push(pending.seal(file_path));
    }

    if hunks.is_empty() && !diff.trim().is_empty() {
        hunks.push(whole_file_fallback(diff, file_path));
    }

    hunks
}

/// One whole-file hunk for diffs without parseable boundaries (binary-like
/// output, exotic formats).
fn whole_file_fallback(diff: &str, file_path: &str) -> Hunk {
    let hash = short_digest(diff);
    Hunk {
        id: format!("{file_path}:{hash}"),
        file_path: file_path.to_owned(),
        old_start: 0,
        old_count: 0,
        new_start: 1,
        new_count: 1,
        header: String::new(),
        content: diff.to_owned(),
        lines: Vec::new(),
        hash,
        move_pair_id: None,
    }
}

/// Synthesize the single hunk for an untracked (new) file.
///
/// The hash covers a sentinel plus the path, so distinct untracked files get
/// distinct identities even though no diff content exists yet.
pub fn untracked_file_hunk(file_path: &str) -> Hunk {
    let hash = short_digest(&format!("untracked:{file_path}"));
    Hunk {
        id: format!("{file_path}:{hash}"),
        file_path: file_path.to_owned(),
        old_start: 0,
        old_count: 0,
        new_start: 1,
        new_count: 1,
        header: String::new(),
        content: "+(untracked file)\n".to_owned(),
        lines: vec![HunkLine {
            kind: LineKind::Added,
            content: "(untracked file)".to_owned(),
            old_line: None,
            new_line: Some(1),
        }],
        hash,
        move_pair_id: None,
    }
}

struct PendingHunk {
    header: String,
    old_start: u32,
    old_count: u32,
    new_start: u32,
    new_count: u32,
    next_old: u32,
    next_new: u32,
    body: String,
    lines: Vec<HunkLine>,
}

impl PendingHunk {
    fn new(header: &str, (old_start, old_count, new_start, new_count): (u32, u32, u32, u32)) -> Self {
        Self {
            header: header.to_owned(),
            old_start,
            old_count,
            new_start,
            new_count,
            next_old: old_start,
            next_new: new_start,
            body: String::new(),
            lines: Vec::new(),
        }
    }

    fn push(&mut self, kind: LineKind, content: &str) {
        let (old_line, new_line) = match kind {
            LineKind::Added => {
                let n = self.next_new;
                self.next_new += 1;
                (None, Some(n))
            }
            LineKind::Removed => {
                let o = self.next_old;
                self.next_old += 1;
                (Some(o), None)
            }
            LineKind::Context => {
                let (o, n) = (self.next_old, self.next_new);
                self.next_old += 1;
                self.next_new += 1;
                (Some(o), Some(n))
            }
        };

        self.body.push(kind.sign());
        self.body.push_str(content);
        self.body.push('\n');
        self.lines.push(HunkLine {
            kind,
            content: content.to_owned(),
            old_line,
            new_line,
        });
    }

    fn seal(self, file_path: &str) -> Hunk {
        let hash = short_digest(&self.body);
        Hunk {
            id: format!("{file_path}:{hash}"),
            file_path: file_path.to_owned(),
            old_start: self.old_start,
            old_count: self.old_count,
            new_start: self.new_start,
            new_count: self.new_count,
            header: self.header,
            content: self.body,
            lines: self.lines,
            hash,
            move_pair_id: None,
        }
    }
}

/// Parse `@@ -old_start,old_count +new_start,new_count @@ ...`.
/// A missing count means 1 (`@@ -5 +5 @@`).
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let mut parts = line.trim_start_matches("@@ ").split(' ');
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Some((old_start, old_count, new_start, new_count))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hunk_header() {
        assert_eq!(parse_hunk_header("@@ -1,5 +1,7 @@"), Some((1, 5, 1, 7)));
        assert_eq!(
            parse_hunk_header("@@ -10,3 +12,5 @@ fn main()"),
            Some((10, 3, 12, 5))
        );
        assert_eq!(parse_hunk_header("@@ -5 +5 @@"), Some((5, 1, 5, 1)));
        assert_eq!(parse_hunk_header("@@ -1,0 +1,5 @@"), Some((1, 0, 1, 5)));
        assert_eq!(parse_hunk_header("@@ garbage"), None);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_file_diff("", "a.rs").is_empty());
    }

    #[test]
    fn test_parse_single_hunk() {
        let diff = "@@ -1,3 +1,4 @@\n ctx\n+added\n ctx2\n ctx3";
        let hunks = parse_file_diff(diff, "a.rs");
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        assert_eq!((h.old_start, h.old_count, h.new_start, h.new_count), (1, 3, 1, 4));
        assert_eq!(h.lines.len(), 4);
        assert_eq!(h.lines[1].kind, LineKind::Added);
        assert_eq!(h.header, "@@ -1,3 +1,4 @@");
        assert_eq!(h.id, format!("a.rs:{}", h.hash));
    }

    #[test]
    fn test_line_numbers() {
        let diff = "@@ -5,3 +5,4 @@\n ctx\n+new\n ctx2\n ctx3";
        let lines = &parse_file_diff(diff, "a.rs")[0].lines;
        assert_eq!((lines[0].old_line, lines[0].new_line), (Some(5), Some(5)));
        assert_eq!((lines[1].old_line, lines[1].new_line), (None, Some(6)));
        assert_eq!((lines[2].old_line, lines[2].new_line), (Some(6), Some(7)));
    }

    #[test]
    fn test_multiple_hunks() {
        let diff = "@@ -1,2 +1,2 @@\n a\n+b\n@@ -9,2 +9,2 @@\n c\n+d";
        let hunks = parse_file_diff(diff, "a.rs");
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].old_start, 9);
    }

    #[test]
    fn test_hash_ignores_line_numbers() {
        // Same change at different positions in the file: same hash.
        let at_top = parse_file_diff("@@ -1,2 +1,2 @@\n ctx\n-old\n+new", "a.rs");
        let at_bottom = parse_file_diff("@@ -90,2 +95,2 @@\n ctx\n-old\n+new", "a.rs");
        assert_eq!(at_top[0].hash, at_bottom[0].hash);
    }

    #[test]
    fn test_hash_distinguishes_add_from_remove() {
        let added = parse_file_diff("@@ -1,1 +1,2 @@\n ctx\n+line", "a.rs");
        let removed = parse_file_diff("@@ -1,2 +1,1 @@\n ctx\n-line", "a.rs");
        assert_ne!(added[0].hash, removed[0].hash);
    }

    #[test]
    fn test_identical_content_across_files_shares_hash() {
        let diff = "@@ -1,1 +1,1 @@\n-old\n+new";
        let a = parse_file_diff(diff, "a.rs");
        let b = parse_file_diff(diff, "b.rs");
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn test_file_headers_and_eof_marker_ignored() {
        let diff = "--- a/x.rs\n+++ b/x.rs\n@@ -1,1 +1,1 @@\n-old\n+new\n\\ No newline at end of file";
        let hunks = parse_file_diff(diff, "x.rs");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines.len(), 2);
    }

    #[test]
    fn test_malformed_diff_falls_back_to_whole_file_hunk() {
        let diff = "Binary files a/img.png and b/img.png differ";
        let hunks = parse_file_diff(diff, "img.png");
        assert_eq!(hunks.len(), 1);
        assert!(hunks[0].lines.is_empty());
        assert_eq!(hunks[0].id, format!("img.png:{}", hunks[0].hash));
    }

    #[test]
    fn test_untracked_hunks_differ_per_path() {
        let a = untracked_file_hunk("src/a.rs");
        let b = untracked_file_hunk("src/b.rs");
        assert_ne!(a.hash, b.hash);
        assert!(a.id.starts_with("src/a.rs:"));
        assert_eq!(a.lines.len(), 1);
    }
}
