//! Container image references.
//!
//! `[registry/][namespace/]repo[:tag][@version]`. A first component containing
//! `.` or `:` is a registry (`quay.io`, `localhost:5000`); a missing namespace
//! defaults to `library` and a missing tag to `latest`. The trees only ever
//! key on [`ImageRef::node_uri`] (`namespace/repo`) and the tag; registry and
//! digest ride along for display.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::ErrorCode;

pub const DEFAULT_NAMESPACE: &str = "library";
pub const DEFAULT_TAG: &str = "latest";

/// Tried in order; the first that matches wins.
const PATTERNS: [&str; 3] = [
    // registry + any number of namespace components
    r"^(?:(?P<registry>[^/@]+[.:][^/@]*)/)?(?P<namespace>(?:[^:@/]+/)+)?(?P<repo>[^:@/]+)(?::(?P<tag>[^:@]+))?(?:@(?P<version>.+))?$",
    // bare repository, optionally behind a registry
    r"^(?:(?P<registry>[^/@]+[.:][^/@]*)/)?(?P<repo>[^:@/]+)(?::(?P<tag>[^:@]+))?(?:@(?P<version>.+))?$",
    // registry without a dot or port
    r"^(?:(?P<registry>[^/@]+)/)?(?P<namespace>(?:[^:@/]+/)+)(?P<repo>[^:@/]+)(?::(?P<tag>[^:@]+))?(?:@(?P<version>.+))?$",
];

static GRAMMAR: LazyLock<Vec<Regex>> =
    LazyLock::new(|| PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect());

/// Characters that mark an unresolved shell or template expression.
const TEMPLATE_CHARS: [char; 5] = ['$', '{', '}', '\'', '"'];

/// Why a reference could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("empty image reference")]
    Empty,

    #[error("image reference '{0}' contains template or shell syntax")]
    Templated(String),

    #[error("image reference '{0}' contains whitespace")]
    Whitespace(String),

    #[error("image reference '{0}' has an upper-case namespace or repository")]
    Casing(String),

    #[error("image reference '{0}' does not match [registry/][namespace/]repo[:tag][@version]")]
    NoMatch(String),
}

impl UriError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::UnparseableReference
    }
}

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageRef {
    pub registry: Option<String>,
    pub namespace: String,
    pub repo_name: String,
    pub repo_tag: String,
    pub version: Option<String>,
}

impl ImageRef {
    /// Parse with the default namespace and tag.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] when the text is not a plain image reference.
    pub fn parse(text: &str) -> Result<Self, UriError> {
        Self::parse_with(text, DEFAULT_NAMESPACE, DEFAULT_TAG)
    }

    /// Parse, filling a missing namespace or tag from the given defaults.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] when the text is empty, carries template syntax
    /// or whitespace, matches none of the reference forms, or names an
    /// upper-case namespace or repository.
    pub fn parse_with(
        text: &str,
        default_namespace: &str,
        default_tag: &str,
    ) -> Result<Self, UriError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(UriError::Empty);
        }
        if text.contains(TEMPLATE_CHARS) {
            return Err(UriError::Templated(text.to_string()));
        }
        if text.contains(char::is_whitespace) {
            return Err(UriError::Whitespace(text.to_string()));
        }

        let Some(caps) = GRAMMAR.iter().find_map(|re| re.captures(text)) else {
            debug!(reference = text, "image reference did not match");
            return Err(UriError::NoMatch(text.to_string()));
        };

        let group = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        };

        let namespace = group("namespace")
            .map(|ns| ns.trim_end_matches('/').to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| default_namespace.to_string());
        let repo_name = group("repo").ok_or_else(|| UriError::NoMatch(text.to_string()))?;

        if namespace.chars().any(char::is_uppercase) || repo_name.chars().any(char::is_uppercase) {
            return Err(UriError::Casing(text.to_string()));
        }

        Ok(Self {
            registry: group("registry"),
            namespace,
            repo_name,
            repo_tag: group("tag").unwrap_or_else(|| default_tag.to_string()),
            version: group("version"),
        })
    }

    /// `namespace/repo`, the label of the image's node.
    #[must_use]
    pub fn node_uri(&self) -> String {
        format!("{}/{}", self.namespace, self.repo_name)
    }

    /// `namespace/repo:tag[@version]`, registry omitted.
    #[must_use]
    pub fn full_uri(&self) -> String {
        let mut uri = format!("{}:{}", self.node_uri(), self.repo_tag);
        if let Some(version) = &self.version {
            uri.push('@');
            uri.push_str(version);
        }
        uri
    }

    /// `true` for the `scratch` pseudo-image.
    #[must_use]
    pub fn is_scratch(&self) -> bool {
        self.repo_name == "scratch" && self.namespace == DEFAULT_NAMESPACE
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        f.write_str(&self.full_uri())
    }
}

impl std::str::FromStr for ImageRef {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_repo_gets_defaults() {
        let image = ImageRef::parse("ubuntu").expect("parse");
        assert_eq!(image.namespace, "library");
        assert_eq!(image.repo_name, "ubuntu");
        assert_eq!(image.repo_tag, "latest");
        assert_eq!(image.registry, None);
        assert_eq!(image.version, None);
        assert_eq!(image.node_uri(), "library/ubuntu");
        assert_eq!(image.full_uri(), "library/ubuntu:latest");
    }

    #[test]
    fn registry_is_recognised_by_dot() {
        let image = ImageRef::parse("registry.io/ubuntu:custom-tag").expect("parse");
        assert_eq!(image.registry.as_deref(), Some("registry.io"));
        assert_eq!(image.node_uri(), "library/ubuntu");
        assert_eq!(image.repo_tag, "custom-tag");
    }

    #[test]
    fn registry_with_port_and_namespace() {
        let image = ImageRef::parse("localhost:5000/vanessa/salad:1.0").expect("parse");
        assert_eq!(image.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(image.namespace, "vanessa");
        assert_eq!(image.repo_name, "salad");
        assert_eq!(image.repo_tag, "1.0");
        assert_eq!(image.to_string(), "localhost:5000/vanessa/salad:1.0");
    }

    #[test]
    fn version_after_at_sign() {
        let image = ImageRef::parse("ubuntu@version").expect("parse");
        assert_eq!(image.version.as_deref(), Some("version"));
        assert_eq!(image.full_uri(), "library/ubuntu:latest@version");

        let digest = ImageRef::parse("continuumio/miniconda3:4.5@sha256:abc123").expect("parse");
        assert_eq!(digest.repo_tag, "4.5");
        assert_eq!(digest.version.as_deref(), Some("sha256:abc123"));
    }

    #[test]
    fn namespaced_reference() {
        let image = ImageRef::parse("continuumio/miniconda3:1.0").expect("parse");
        assert_eq!(image.node_uri(), "continuumio/miniconda3");
        assert_eq!(image.repo_tag, "1.0");
    }

    #[test]
    fn custom_defaults_apply() {
        let image = ImageRef::parse_with("salad", "vanessa", "stable").expect("parse");
        assert_eq!(image.full_uri(), "vanessa/salad:stable");
    }

    #[test]
    fn rejects_template_syntax() {
        for text in ["${BASE}", "ubuntu:$TAG", "{{ image }}", "'ubuntu'", "\"ubuntu\""] {
            assert!(
                matches!(ImageRef::parse(text), Err(UriError::Templated(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_upper_case_repository() {
        assert!(matches!(ImageRef::parse("Vanessa/Salad"), Err(UriError::Casing(_))));
        // Tags may carry upper case.
        assert!(ImageRef::parse("ubuntu:Bionic").is_ok());
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert_eq!(ImageRef::parse("   "), Err(UriError::Empty));
        assert!(matches!(ImageRef::parse("ubuntu 18.04"), Err(UriError::Whitespace(_))));
        assert!(matches!(ImageRef::parse("ubuntu::"), Err(UriError::NoMatch(_))));
        assert!(matches!(ImageRef::parse("@sha"), Err(UriError::NoMatch(_))));
    }

    #[test]
    fn scratch_detection() {
        assert!(ImageRef::parse("scratch").expect("parse").is_scratch());
        assert!(!ImageRef::parse("vanessa/scratch").expect("parse").is_scratch());
    }

    #[test]
    fn errors_map_to_code() {
        let err = ImageRef::parse("").expect_err("empty");
        assert_eq!(err.code(), ErrorCode::UnparseableReference);
    }
}
