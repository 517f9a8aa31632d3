//! Claude CLI adapter.
//!
//! Reference implementation of the engine's AI service traits over the
//! `claude` executable. The prompt is piped through stdin (argument lists
//! hit ARG_MAX on large reviews) and responses are parsed out of whatever
//! surrounding prose or markdown fences the model produces.

pub mod classify;
pub mod guide;

pub use classify::ClaudeClassifier;
pub use guide::ClaudeGuide;

use crate::classify::ClassifyError;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Find the claude executable, or `None` if it is not installed.
pub fn find_claude_executable() -> Option<String> {
    let which = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };
    if let Ok(output) = Command::new(which).arg("claude").output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_owned();
            if !path.is_empty() {
                return Some(path);
            }
        }
    }

    // GUI-launched hosts get a minimal PATH; check the standard install
    // location directly.
    #[cfg(not(target_os = "windows"))]
    if let Some(home) = std::env::var_os("HOME") {
        let fallback = std::path::PathBuf::from(home).join(".local/bin/claude");
        if fallback.is_file() {
            return Some(fallback.to_string_lossy().into_owned());
        }
    }

    None
}

/// Run the claude CLI with `prompt` on stdin and return its stdout.
pub(crate) fn run_claude(prompt: &str, cwd: &Path, model: &str) -> Result<String, ClassifyError> {
    let claude = find_claude_executable()
        .ok_or_else(|| ClassifyError::Unavailable("claude CLI not found in PATH".to_owned()))?;

    let mut child = Command::new(claude)
        .args([
            "--print",
            "--model",
            model,
            "--setting-sources",
            "",
            "--disable-slash-commands",
            "--strict-mcp-config",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(cwd)
        .env_remove("CLAUDECODE")
        .spawn()
        .map_err(|e| ClassifyError::Failed(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .map_err(|e| ClassifyError::Failed(format!("failed to write prompt: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| ClassifyError::Failed(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let detail = if stderr.is_empty() {
            format!("exit status {}", output.status)
        } else {
            stderr
        };
        return Err(ClassifyError::Failed(detail));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(ClassifyError::EmptyResponse);
    }
    Ok(stdout)
}

/// Extract the JSON payload from model output, tolerating markdown fences
/// and surrounding prose.
pub(crate) fn extract_json_str(output: &str) -> Result<&str, ClassifyError> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        return Ok(after.find("```").map_or(after, |end| &after[..end]).trim());
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.find('\n').map_or(after, |i| &after[i + 1..]);
        return Ok(after.find("```").map_or(after, |end| &after[..end]).trim());
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                return Ok(&trimmed[start..=end]);
            }
        }
    }

    Err(ClassifyError::Parse(format!(
        "no JSON found in output: {}",
        &trimmed[..trimmed.len().min(200)]
    )))
}

/// Parse extracted JSON, keeping a slice of the offending input in the error.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, ClassifyError> {
    serde_json::from_str(json).map_err(|e| {
        ClassifyError::Parse(format!(
            "{e}; input: {}",
            &json[..json.len().min(500)]
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_json_fence() {
        let output = "Here you go:\n\n```json\n{\"a\": 1}\n```\n\nDone.";
        assert_eq!(extract_json_str(output).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_from_bare_fence() {
        let output = "```\n[1, 2]\n```";
        assert_eq!(extract_json_str(output).unwrap(), "[1, 2]");
    }

    #[test]
    fn test_extract_plain_json() {
        assert_eq!(extract_json_str("  {\"a\": 1}  ").unwrap(), "{\"a\": 1}");
        assert_eq!(extract_json_str("[]").unwrap(), "[]");
    }

    #[test]
    fn test_extract_embedded_object() {
        let output = "The result is {\"a\": 1} as requested.";
        assert_eq!(extract_json_str(output).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_no_json_errors() {
        assert!(extract_json_str("no structured data here").is_err());
    }

    #[test]
    fn test_parse_json_error_carries_input() {
        let err = parse_json::<Vec<u32>>("{broken").unwrap_err();
        assert!(err.to_string().contains("{broken"));
    }
}
