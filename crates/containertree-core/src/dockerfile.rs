//! Base-image extraction from Dockerfiles.
//!
//! Only the first `FROM` instruction matters to the provenance graph. Its
//! `--platform=...` flags are skipped and a multi-stage `AS <name>` suffix is
//! reported so the caller can refuse it.

use std::path::Path;

use crate::error::ErrorCode;

/// The image named by a `FROM` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromLine {
    pub image: String,
    /// Build-stage name from `FROM <image> AS <stage>`.
    pub stage: Option<String>,
}

impl FromLine {
    #[must_use]
    pub const fn is_multi_stage(&self) -> bool {
        self.stage.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DockerfileError {
    #[error("failed to read Dockerfile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DockerfileError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InputUnavailable
    }
}

/// `true` when the final path component names a Dockerfile
/// (`Dockerfile`, `Dockerfile.dev`, `api.Dockerfile`).
#[must_use]
pub fn is_dockerfile_path(reference: &str) -> bool {
    let file_name = reference.rsplit(['/', '\\']).next().unwrap_or(reference);
    file_name.contains("Dockerfile")
}

/// First `FROM` instruction in `text`, keyword stripped.
#[must_use]
pub fn from_line(text: &str) -> Option<FromLine> {
    text.lines().find_map(parse_instruction)
}

fn parse_instruction(line: &str) -> Option<FromLine> {
    let mut words = line.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("FROM") {
        return None;
    }

    let mut words = words.skip_while(|w| w.starts_with("--"));
    let image = words.next()?.to_string();
    let stage = match (words.next(), words.next()) {
        (Some(kw), Some(name)) if kw.eq_ignore_ascii_case("AS") => Some(name.to_string()),
        _ => None,
    };
    Some(FromLine { image, stage })
}

/// Read a Dockerfile and return its first `FROM`.
///
/// # Errors
///
/// Returns [`DockerfileError::Read`] if the file cannot be read.
pub fn read_from(path: &Path) -> Result<Option<FromLine>, DockerfileError> {
    let text = std::fs::read_to_string(path).map_err(|source| DockerfileError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(from_line(&text))
}
