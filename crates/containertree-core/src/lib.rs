//! containertree-core library.
//!
//! In-memory tries over container contents: filesystem and package trees
//! ([`path_tree`]) and the image provenance graph ([`provenance`]), both
//! built on the shared traversal primitives in [`engine`].
//!
//! # Conventions
//!
//! - **Errors**: expected misses are `Option`; rejected input is a
//!   `thiserror` enum carrying an [`error::ErrorCode`]; loading code uses
//!   `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod attrs;
pub mod config;
pub mod dockerfile;
pub mod engine;
pub mod error;
pub mod export;
pub mod node;
pub mod path_tree;
pub mod provenance;
pub mod record;
pub mod shared;
pub mod uri;

pub use attrs::{Attributes, Scalar};
pub use engine::{Matcher, NodePath, Similarity};
pub use export::{ExportNode, PathOptions};
pub use node::Node;
pub use path_tree::{Flavour, PathTree, VectorOptions};
pub use provenance::{ProvenanceError, ProvenanceGraph};
pub use record::{AnalyzeType, Record};
pub use shared::{LockError, SharedTree};
pub use uri::ImageRef;
