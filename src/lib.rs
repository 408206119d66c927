//! # Folio
//!
//! A hierarchical, path-addressed namespace of directories and versioned
//! documents over append-only blob storage.
//!
//! ## Core Concepts
//!
//! - **Directories**: Metadata records establishing a path as a container
//! - **Versions**: Every write appends an immutable timestamped version
//!   under a filename key; the latest version is the current state
//! - **Soft delete**: Tombstone versions make a path resolve as absent
//!   without destroying history
//! - **Models**: Resolved entities tagged as directory, file, or notebook
//!
//! ## Example
//!
//! ```ignore
//! use folio::{Model, Namespace, NamespaceConfig};
//!
//! let ns = Namespace::open_or_create(NamespaceConfig {
//!     path: "./my-namespace".into(),
//!     ..Default::default()
//! })?;
//!
//! ns.save(&Model::new_directory(), "projects")?;
//! ns.save(&Model::new_file("hello"), "projects/readme.txt")?;
//!
//! // Latest version wins; directories aggregate their children.
//! let listing = ns.get("projects", true, None)?;
//! ```

pub mod directories;
pub mod error;
pub mod namespace;
pub mod paths;
pub mod types;
pub mod versions;

// Re-exports
pub use directories::DirectoryIndex;
pub use error::{NamespaceError, Result};
pub use namespace::{Namespace, NamespaceConfig};
pub use paths::PathCodec;
pub use types::*;
pub use versions::VersionLog;
