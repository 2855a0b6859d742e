//! Export sinks: files written by `generate`, `collection --export`, and
//! friends.

use anyhow::{Context, Result};
use containertree_core::error::ErrorCode;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::output::{CliError, OutputMode, render_error};

/// Serialize `value` as pretty JSON into `path`, creating parent dirs.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize export")?;
    write_text(path, &text)
}

/// One entry per line.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    write_text(path, &text)
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file =
        fs::File::create(path).with_context(|| format!("Failed to write {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "export written");
    Ok(())
}

/// Surface a failed write as `E5003` before propagating it.
pub fn reported(result: Result<()>, output: OutputMode) -> Result<()> {
    if let Err(err) = &result {
        render_error(
            output,
            &CliError::coded(format!("{err:#}"), ErrorCode::ExportWriteFailed),
        )?;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sink_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/out/data.json");
        write_json(&path, &serde_json::json!({"key": "/"})).expect("write");
        let back: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(back["key"], "/");
    }

    #[test]
    fn line_sink_terminates_each_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("paths.txt");
        write_lines(&path, &["/a", "/a/b"]).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "/a\n/a/b\n");
    }

    #[test]
    fn write_under_a_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").expect("write");
        let result = write_text(&blocker.join("data.json"), "{}");
        assert!(reported(result, OutputMode::Text).is_err());
    }
}
