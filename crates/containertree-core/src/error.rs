use std::fmt;

/// Machine-readable error codes shared by the library and the `ctree` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InputUnavailable,
    AnalyzerMissing,
    UnparseableReference,
    InvalidPairing,
    CycleDetected,
    OrphanedInsert,
    InvalidPattern,
    LockContention,
    LockPoisoned,
    ExportWriteFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InputUnavailable => "E1002",
            Self::AnalyzerMissing => "E1003",
            Self::UnparseableReference => "E2002",
            Self::InvalidPairing => "E2003",
            Self::CycleDetected => "E2004",
            Self::OrphanedInsert => "E2005",
            Self::InvalidPattern => "E2007",
            Self::LockContention => "E5001",
            Self::LockPoisoned => "E5002",
            Self::ExportWriteFailed => "E5003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InputUnavailable => "Input could not be loaded",
            Self::AnalyzerMissing => "container-diff executable not found",
            Self::UnparseableReference => "Image reference is not parseable",
            Self::InvalidPairing => "Image/base pairing is not allowed",
            Self::CycleDetected => "Edge would create a cycle",
            Self::OrphanedInsert => "Pair is not yet reachable from the root",
            Self::InvalidPattern => "Invalid search pattern",
            Self::LockContention => "Lock contention",
            Self::LockPoisoned => "Lock poisoned by a panicked writer",
            Self::ExportWriteFailed => "Export write failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in containertree.toml and retry."),
            Self::InputUnavailable => {
                Some("Pass a JSON file, an http(s) URL, or an image reference.")
            }
            Self::AnalyzerMissing => {
                Some("Install container-diff or pass an exported JSON file instead.")
            }
            Self::UnparseableReference => {
                Some("Use [registry/][namespace/]repo[:tag][@digest] without variables.")
            }
            Self::InvalidPairing => Some("Resolve multi-stage or templated FROM lines first."),
            Self::CycleDetected => Some("An image cannot derive from one of its descendants."),
            Self::OrphanedInsert => Some("Add the base image's ancestors, then retry."),
            Self::InvalidPattern => Some("Check the regular expression syntax."),
            Self::LockContention => Some("Retry after the active writer releases the tree."),
            Self::LockPoisoned => Some("Rebuild the tree from its inputs."),
            Self::ExportWriteFailed => Some("Check disk space and write permissions."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
