//! Input records and the analyzer-payload selector.
//!
//! A payload is whatever a record source produced: a plain JSON list of
//! records, or a `container-diff` export (a list of
//! `{"AnalyzeType": "...", "Analysis": [...]}` entries). Tree flavours differ
//! only in which [`AnalyzeType`] they pull out of it; everything downstream of
//! [`extract`] is shared.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::warn;

use crate::attrs::{Attributes, Scalar};

/// Sections of a `container-diff analyze` export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzeType {
    File,
    Pip,
    Apt,
}

impl AnalyzeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Pip => "Pip",
            Self::Apt => "Apt",
        }
    }

    /// Value of `container-diff analyze --type=`.
    #[must_use]
    pub const fn cli_type(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Pip => "pip",
            Self::Apt => "apt",
        }
    }
}

impl fmt::Display for AnalyzeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyzeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "pip" => Ok(Self::Pip),
            "apt" => Ok(Self::Apt),
            other => Err(format!("unknown analyze type '{other}'")),
        }
    }
}

/// One named record with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub attrs: Attributes,
}

impl Record {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            attrs: Attributes::named(name.clone()),
            name,
        }
    }

    /// Interpret a JSON value as a record. A bare string is shorthand for
    /// `{"Name": <string>}`; an object needs a (case-insensitive) `name` key.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) if !name.is_empty() => Some(Self::new(name.as_str())),
            Value::Object(map) => {
                let attrs = Attributes::from_json_map(map);
                let name = attrs.name()?.to_string();
                if name.is_empty() {
                    return None;
                }
                Some(Self { name, attrs })
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.attrs.version()
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.attrs.set(key, value.into());
        self
    }
}

/// Turn a list of JSON values into records, skipping (and logging) entries
/// without a name.
#[must_use]
pub fn records_from_list(values: &[Value]) -> Vec<Record> {
    values
        .iter()
        .filter_map(|value| {
            let record = Record::from_json(value);
            if record.is_none() {
                warn!(entry = %value, "skipping record with no Name");
            }
            record
        })
        .collect()
}

/// Field of a JSON object, with the key compared case-insensitively.
fn field<'a>(entry: &'a Value, key: &str) -> Option<&'a Value> {
    entry
        .as_object()?
        .iter()
        .find_map(|(k, v)| k.eq_ignore_ascii_case(key).then_some(v))
}

/// `true` when the payload is a `container-diff` export rather than a plain
/// list of records.
#[must_use]
pub fn is_diff_export(payload: &Value) -> bool {
    payload
        .as_array()
        .and_then(|list| list.first())
        .is_some_and(|entry| field(entry, "AnalyzeType").is_some())
}

/// The `Analysis` list of the first entry whose `AnalyzeType` matches.
/// Keys and the type value are matched case-insensitively.
///
/// Returns `None` when the payload is not a list or carries no such entry.
#[must_use]
pub fn select_analysis(payload: &Value, analyze_type: AnalyzeType) -> Option<&[Value]> {
    let Value::Array(entries) = payload else {
        warn!(%analyze_type, "container-diff payload must be a list");
        return None;
    };
    if entries.is_empty() {
        warn!(%analyze_type, "container-diff analysis list is empty");
        return None;
    }

    let analysis = entries.iter().find_map(|entry| {
        let kind = field(entry, "AnalyzeType")?.as_str()?;
        kind.eq_ignore_ascii_case(analyze_type.as_str())
            .then(|| field(entry, "Analysis"))?
    });

    match analysis {
        Some(Value::Array(list)) => {
            if list.is_empty() {
                warn!(%analyze_type, "no data found in analysis");
            }
            Some(list.as_slice())
        }
        Some(_) => {
            warn!(%analyze_type, "no data found in analysis");
            Some(&[])
        }
        None => {
            warn!(%analyze_type, "analysis key missing, is this a container-diff export?");
            None
        }
    }
}

/// Extract the records a tree flavour folds.
///
/// With no analyze type the payload must already be a list of records;
/// otherwise the matching `container-diff` section is selected first.
#[must_use]
pub fn extract(payload: &Value, analyze_type: Option<AnalyzeType>) -> Vec<Record> {
    match analyze_type {
        Some(kind) => select_analysis(payload, kind)
            .map(records_from_list)
            .unwrap_or_default(),
        None => match payload {
            Value::Array(list) => records_from_list(list),
            other => {
                warn!(payload = %other, "expected a list of records");
                Vec::new()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diff_export() -> Value {
        json!([
            {"AnalyzeType": "Pip", "Analysis": [
                {"Name": "pip", "Version": "9.0.1", "Size": 100},
                {"Name": "six", "Version": "1.11.0"}
            ]},
            {"AnalyzeType": "File", "Analysis": [
                {"Name": "/etc", "Size": 4096},
                {"Name": "/etc/ssl", "Size": 4096}
            ]},
            {"AnalyzeType": "Apt", "Analysis": []}
        ])
    }

    #[test]
    fn bare_string_becomes_named_record() {
        let record = Record::from_json(&json!("/etc/hosts")).expect("record");
        assert_eq!(record.name, "/etc/hosts");
        assert_eq!(record.attrs.name(), Some("/etc/hosts"));
    }

    #[test]
    fn object_name_is_case_insensitive() {
        let record = Record::from_json(&json!({"NAME": "/usr", "size": 3})).expect("record");
        assert_eq!(record.name, "/usr");
        assert_eq!(record.attrs.size(), Some(3));
    }

    #[test]
    fn nameless_entries_are_skipped() {
        let records = records_from_list(&[json!({"Size": 1}), json!("/bin"), json!(7), json!("")]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "/bin");
    }

    #[test]
    fn selects_matching_section() {
        let payload = diff_export();
        let pip = extract(&payload, Some(AnalyzeType::Pip));
        assert_eq!(pip.len(), 2);
        assert_eq!(pip[0].version(), Some("9.0.1"));

        let files = extract(&payload, Some(AnalyzeType::File));
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn empty_section_yields_nothing() {
        let payload = diff_export();
        assert_eq!(select_analysis(&payload, AnalyzeType::Apt).map(<[Value]>::len), Some(0));
        assert!(extract(&payload, Some(AnalyzeType::Apt)).is_empty());
    }

    #[test]
    fn missing_section_or_wrong_shape() {
        let payload = json!([{"AnalyzeType": "History", "Analysis": []}]);
        assert!(select_analysis(&payload, AnalyzeType::Pip).is_none());
        assert!(select_analysis(&json!({"Name": "x"}), AnalyzeType::Pip).is_none());
        assert!(select_analysis(&json!([]), AnalyzeType::Pip).is_none());
    }

    #[test]
    fn lower_cased_export_keys_are_read() {
        let payload = json!([
            {"analyzetype": "file", "analysis": [{"Name": "/etc", "Size": 1}]}
        ]);
        assert!(is_diff_export(&payload));
        let section = select_analysis(&payload, AnalyzeType::File).expect("section");
        assert_eq!(section.len(), 1);
        assert_eq!(extract(&payload, Some(AnalyzeType::File))[0].name, "/etc");
        assert!(!is_diff_export(&json!([{"Name": "/etc"}])));
    }

    #[test]
    fn plain_list_without_analyze_type() {
        let payload = json!(["/etc", {"Name": "/etc/ssl"}]);
        assert_eq!(extract(&payload, None).len(), 2);
        assert!(extract(&json!({"Name": "/etc"}), None).is_empty());
    }

    #[test]
    fn analyze_type_parsing() {
        assert_eq!("PIP".parse::<AnalyzeType>(), Ok(AnalyzeType::Pip));
        assert_eq!(AnalyzeType::Apt.cli_type(), "apt");
        assert!("history".parse::<AnalyzeType>().is_err());
    }
}
