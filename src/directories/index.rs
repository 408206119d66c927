//! Directory index implementation.

use crate::error::{NamespaceError, Result};
use crate::types::{DirectoryRecord, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for the directory index file.
const DIRECTORY_INDEX_MAGIC: &[u8; 4] = b"DIX\0";

/// Current directory index format version.
const DIRECTORY_INDEX_VERSION: u8 = 1;

/// Directory catalog stored on disk.
///
/// Ordered by path so immediate-children queries are range scans from the
/// parent prefix.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct DirectoryCatalog {
    records: BTreeMap<String, DirectoryRecord>,
}

/// Tracks one record per directory path, enforcing path uniqueness.
pub struct DirectoryIndex {
    /// Path to the index file.
    path: PathBuf,

    /// In-memory catalog.
    catalog: RwLock<DirectoryCatalog>,
}

impl DirectoryIndex {
    /// Create a new, empty index.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            catalog: RwLock::new(DirectoryCatalog::default()),
        })
    }

    /// Load the index from its file. A missing file is an empty index.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let index = Self::new(path)?;
        if index.path.exists() {
            index.load_from_file()?;
        }
        Ok(index)
    }

    /// True iff a record with exactly this path exists.
    pub fn exists(&self, path: &str) -> bool {
        self.catalog.read().records.contains_key(path)
    }

    /// Get the record for a path.
    pub fn get(&self, path: &str) -> Option<DirectoryRecord> {
        self.catalog.read().records.get(path).cloned()
    }

    /// Insert a record for a path, stamping both timestamps now.
    ///
    /// A duplicate path is swallowed and logged, making creation idempotent
    /// from the caller's perspective.
    pub fn create(&self, path: &str) -> Result<()> {
        match self.try_insert(path) {
            Err(NamespaceError::DuplicateDirectory(path)) => {
                debug!(path = %path, "tried to create directory which already exists");
                Ok(())
            }
            other => other,
        }
    }

    /// Insert a record, rejecting a duplicate path.
    ///
    /// The occupancy check and the insert happen under one write lock, so a
    /// conflicting concurrent create can never yield two records.
    fn try_insert(&self, path: &str) -> Result<()> {
        let mut catalog = self.catalog.write();
        if catalog.records.contains_key(path) {
            return Err(NamespaceError::DuplicateDirectory(path.to_string()));
        }

        let now = Timestamp::now();
        catalog.records.insert(
            path.to_string(),
            DirectoryRecord {
                path: path.to_string(),
                created: now,
                last_modified: now,
            },
        );

        self.save_catalog(&catalog)
    }

    /// Directories exactly one path segment below `parent`.
    pub fn list_immediate_children(&self, parent: &str) -> Vec<DirectoryRecord> {
        let prefix = child_prefix(parent);
        let catalog = self.catalog.read();

        catalog
            .records
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| {
                let rest = &path[prefix.len()..];
                !rest.is_empty() && !rest.contains('/')
            })
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Number of directory records.
    pub fn len(&self) -> usize {
        self.catalog.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save the catalog to the index file.
    fn save_catalog(&self, catalog: &DirectoryCatalog) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;

        file.write_all(DIRECTORY_INDEX_MAGIC)?;
        file.write_all(&[DIRECTORY_INDEX_VERSION])?;

        let encoded = rmp_serde::to_vec(catalog)?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;

        file.sync_all()?;
        Ok(())
    }

    /// Load the catalog from the index file.
    fn load_from_file(&self) -> Result<()> {
        let mut file = File::open(&self.path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != DIRECTORY_INDEX_MAGIC {
            return Err(NamespaceError::InvalidFormat(
                "Invalid directory index magic".into(),
            ));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != DIRECTORY_INDEX_VERSION {
            return Err(NamespaceError::InvalidFormat(format!(
                "Unsupported directory index version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut encoded = vec![0u8; len];
        file.read_exact(&mut encoded)?;

        *self.catalog.write() = rmp_serde::from_slice(&encoded)?;
        Ok(())
    }
}

/// Prefix under which immediate children of `parent` live.
fn child_prefix(parent: &str) -> String {
    format!("{}/", parent.trim_end_matches('/'))
}
