//! Directory metadata index.
//!
//! One record per directory path, unique on the path key. Creation is
//! idempotent and listing a directory's immediate children is a prefix
//! range scan rather than a full-tree walk.

mod index;

pub use index::DirectoryIndex;
