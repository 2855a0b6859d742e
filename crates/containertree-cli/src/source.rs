//! Record sources: where a tree's JSON payload comes from.
//!
//! A reference is resolved in order: an `http(s)://` URL is fetched, an
//! existing `*.json` file is read, anything else is treated as an image and
//! analysed with `container-diff`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use containertree_core::AnalyzeType;
use containertree_core::error::ErrorCode;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the external layer-analysis tool.
pub const ANALYZER: &str = "container-diff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    File(PathBuf),
    Image(String),
}

impl Source {
    #[must_use]
    pub fn classify(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Self::Url(reference.to_string());
        }
        let path = Path::new(reference);
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            Self::File(path.to_path_buf())
        } else {
            Self::Image(reference.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{origin} is not valid JSON: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{ANALYZER} is not installed or not on PATH")]
    AnalyzerMissing,

    #[error("{ANALYZER} failed for {image}: {reason}")]
    Analyzer { image: String, reason: String },
}

impl SourceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::AnalyzerMissing => ErrorCode::AnalyzerMissing,
            Self::Fetch { .. } | Self::Read { .. } | Self::Parse { .. } | Self::Analyzer { .. } => {
                ErrorCode::InputUnavailable
            }
        }
    }
}

/// Load the JSON payload behind `reference`. `analyze` picks the
/// `container-diff --type` when the reference is an image; the plain file
/// flavour analyses with `file`.
///
/// # Errors
///
/// Returns a [`SourceError`] when the payload cannot be fetched, read,
/// produced, or parsed.
pub fn load(reference: &str, analyze: Option<AnalyzeType>) -> Result<Value, SourceError> {
    match Source::classify(reference) {
        Source::Url(url) => fetch(&url),
        Source::File(path) => read_json(&path),
        Source::Image(image) => analyze_image(&image, analyze.unwrap_or(AnalyzeType::File)),
    }
}

fn fetch(url: &str) -> Result<Value, SourceError> {
    debug!(url, "fetching payload");
    let response = ureq::get(url)
        .set("Accept", "application/json")
        .set("User-Agent", "containertree")
        .call()
        .map_err(|err| SourceError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
    response.into_json::<Value>().map_err(|err| SourceError::Fetch {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

pub fn read_json(path: &Path) -> Result<Value, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SourceError::Parse {
        origin: path.display().to_string(),
        source,
    })
}

fn analyze_image(image: &str, analyze: AnalyzeType) -> Result<Value, SourceError> {
    let failed = |reason: String| SourceError::Analyzer {
        image: image.to_string(),
        reason,
    };
    let output = tempfile::Builder::new()
        .prefix("containertree-")
        .suffix(".json")
        .tempfile()
        .map_err(|err| failed(err.to_string()))?;

    info!(image, kind = analyze.cli_type(), "running {ANALYZER}");
    let status = Command::new(ANALYZER)
        .arg("analyze")
        .arg(image)
        .arg(format!("--type={}", analyze.cli_type()))
        .arg("--json")
        .arg("--output")
        .arg(output.path())
        .status()
        .map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                SourceError::AnalyzerMissing
            } else {
                failed(err.to_string())
            }
        })?;
    if !status.success() {
        return Err(failed(format!("exited with {status}")));
    }
    read_json(output.path())
}

/// Fill a missing `Size` from local file metadata for every file record
/// whose path exists on this machine. Bare-string records become objects
/// when filled. Returns how many records gained a size.
pub fn fill_sizes(payload: &mut Value, analyze: Option<AnalyzeType>) -> usize {
    let list = match analyze {
        None => payload.as_array_mut(),
        Some(kind) => analysis_mut(payload, kind),
    };
    let Some(list) = list else {
        return 0;
    };

    let mut filled = 0;
    for entry in list.iter_mut() {
        let name = match entry {
            Value::String(name) => name.clone(),
            Value::Object(map) if !has_key(map, "size") => match lookup(map, "name") {
                Some(Value::String(name)) => name.clone(),
                _ => continue,
            },
            _ => continue,
        };
        let Ok(meta) = std::fs::metadata(&name) else {
            continue;
        };
        let map = match entry {
            Value::Object(map) => map,
            other => {
                *other = Value::Object(Map::from_iter([("Name".to_string(), Value::String(name))]));
                match other.as_object_mut() {
                    Some(map) => map,
                    None => continue,
                }
            }
        };
        map.insert("Size".to_string(), Value::from(meta.len()));
        filled += 1;
    }
    filled
}

fn analysis_mut(payload: &mut Value, kind: AnalyzeType) -> Option<&mut Vec<Value>> {
    payload
        .as_array_mut()?
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|section| {
            lookup(section, "analyzetype")
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(kind.as_str()))
        })
        .and_then(|section| {
            let key = section
                .keys()
                .find(|k| k.eq_ignore_ascii_case("analysis"))?
                .clone();
            section.get_mut(&key)?.as_array_mut()
        })
}

fn has_key(map: &Map<String, Value>, key: &str) -> bool {
    map.keys().any(|k| k.eq_ignore_ascii_case(key))
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_references() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("export.json");
        std::fs::write(&file, "[]").expect("write");

        assert_eq!(
            Source::classify("https://example.com/tree.json"),
            Source::Url("https://example.com/tree.json".into())
        );
        assert_eq!(
            Source::classify(file.to_str().expect("utf8")),
            Source::File(file.clone())
        );
        assert_eq!(
            Source::classify("missing.json"),
            Source::Image("missing.json".into())
        );
        assert_eq!(
            Source::classify("vanessa/salad"),
            Source::Image("vanessa/salad".into())
        );
    }

    #[test]
    fn read_json_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("bad.json");
        std::fs::write(&file, "{not json").expect("write");

        let err = read_json(&file).expect_err("invalid");
        assert!(matches!(err, SourceError::Parse { .. }));
        assert_eq!(err.code(), ErrorCode::InputUnavailable);

        let err = read_json(&dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn sizes_filled_from_local_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("data.bin");
        std::fs::write(&file, [0_u8; 42]).expect("write");
        let name = file.to_str().expect("utf8").to_string();

        let mut payload = json!([
            name.clone(),
            {"Name": name.clone(), "Size": 7},
            {"name": name.clone()},
            {"Name": "/definitely/not/here"}
        ]);
        assert_eq!(fill_sizes(&mut payload, None), 2);
        assert_eq!(payload[0]["Size"], 42);
        assert_eq!(payload[1]["Size"], 7);
        assert_eq!(payload[2]["Size"], 42);
        assert!(payload[3].get("Size").is_none());
    }

    #[test]
    fn sizes_filled_inside_analysis_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("f");
        std::fs::write(&file, b"abc").expect("write");
        let name = file.to_str().expect("utf8").to_string();

        let mut payload = json!([
            {"AnalyzeType": "Pip", "Analysis": []},
            {"AnalyzeType": "File", "Analysis": [{"Name": name}]}
        ]);
        assert_eq!(fill_sizes(&mut payload, Some(AnalyzeType::File)), 1);
        assert_eq!(payload[1]["Analysis"][0]["Size"], 3);
    }
}
