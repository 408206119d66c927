//! Core types for the namespace.

use crate::error::{NamespaceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Store-wide insertion counter for version entries.
///
/// Breaks ties between versions of one filename that share an upload
/// timestamp, so latest-version resolution is deterministic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

/// Kind of entity a path resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
    Notebook,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
            EntryKind::Notebook => "notebook",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared content format of a document.
///
/// Recorded at save time and echoed back on reads; no coercion between
/// formats is performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Json,
    Text,
    Base64,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Json => "json",
            ContentFormat::Text => "text",
            ContentFormat::Base64 => "base64",
        }
    }
}

/// Metadata entry establishing a path as a container.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Storage path, unique key. No trailing slash except the root itself.
    pub path: String,
    pub created: Timestamp,
    pub last_modified: Timestamp,
}

/// Metadata record carried by every blob version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Basename of the entity.
    pub name: String,
    /// Full storage path.
    pub path: String,
    /// File or Notebook; directories never reach the blob store.
    pub kind: EntryKind,
    pub created: Timestamp,
    pub last_modified: Timestamp,
    pub mimetype: Option<String>,
    pub format: Option<ContentFormat>,
    /// Tombstone flag. A filename whose latest version is deleted
    /// resolves as absent.
    pub deleted: bool,
}

/// One immutable timestamped write under a filename key.
#[derive(Clone, Debug)]
pub struct BlobVersion {
    /// Full storage path; not unique, every write appends a new version.
    pub filename: String,
    /// Store-wide insertion sequence (assigned by the log).
    pub sequence: Sequence,
    /// Upload timestamp (assigned by the log).
    pub uploaded: Timestamp,
    pub metadata: BlobMetadata,
    pub content: Vec<u8>,
}

fn default_true() -> bool {
    true
}

/// Directory model: container metadata plus an optional child listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub created: Option<Timestamp>,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub format: Option<ContentFormat>,
    /// Child models without their own content, sorted by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Model>>,
}

/// Plain file model with decoded text content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub created: Option<Timestamp>,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub format: Option<ContentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Notebook model with a structured JSON document as content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotebookModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub created: Option<Timestamp>,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub format: Option<ContentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

/// A resolved entity, tagged by kind.
///
/// Doubles as the input to [`crate::Namespace::save`]: callers construct a
/// variant with content and optional metadata, and `save` fills in name,
/// path, and timestamps.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Model {
    Directory(DirectoryModel),
    File(FileModel),
    Notebook(NotebookModel),
}

impl Model {
    /// Input model for saving a directory.
    pub fn new_directory() -> Self {
        Model::Directory(DirectoryModel {
            name: String::new(),
            path: String::new(),
            created: None,
            last_modified: None,
            writable: true,
            mimetype: None,
            format: Some(ContentFormat::Json),
            content: None,
        })
    }

    /// Input model for saving a plain file.
    pub fn new_file(content: impl Into<String>) -> Self {
        Model::File(FileModel {
            name: String::new(),
            path: String::new(),
            created: None,
            last_modified: None,
            writable: true,
            mimetype: Some("text/plain".to_string()),
            format: Some(ContentFormat::Text),
            content: Some(content.into()),
        })
    }

    /// Input model for saving a notebook document.
    pub fn new_notebook(content: serde_json::Value) -> Self {
        Model::Notebook(NotebookModel {
            name: String::new(),
            path: String::new(),
            created: None,
            last_modified: None,
            writable: true,
            mimetype: None,
            format: Some(ContentFormat::Json),
            content: Some(content),
        })
    }

    /// Set the mimetype.
    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        let mimetype = Some(mimetype.into());
        match &mut self {
            Model::Directory(m) => m.mimetype = mimetype,
            Model::File(m) => m.mimetype = mimetype,
            Model::Notebook(m) => m.mimetype = mimetype,
        }
        self
    }

    /// Set the declared content format.
    pub fn with_format(mut self, format: ContentFormat) -> Self {
        let format = Some(format);
        match &mut self {
            Model::Directory(m) => m.format = format,
            Model::File(m) => m.format = format,
            Model::Notebook(m) => m.format = format,
        }
        self
    }

    /// Set the creation timestamp. Save preserves it instead of stamping now.
    pub fn with_created(mut self, created: Timestamp) -> Self {
        let created = Some(created);
        match &mut self {
            Model::Directory(m) => m.created = created,
            Model::File(m) => m.created = created,
            Model::Notebook(m) => m.created = created,
        }
        self
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Model::Directory(_) => EntryKind::Directory,
            Model::File(_) => EntryKind::File,
            Model::Notebook(_) => EntryKind::Notebook,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Model::Directory(m) => &m.name,
            Model::File(m) => &m.name,
            Model::Notebook(m) => &m.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Model::Directory(m) => &m.path,
            Model::File(m) => &m.path,
            Model::Notebook(m) => &m.path,
        }
    }

    /// Build a model from a JSON-shaped value, as received over the host's
    /// plugin contract.
    ///
    /// A missing or unrecognized `type` key is a bad request, mirroring the
    /// 400 the surrounding application expects for malformed save bodies.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| NamespaceError::BadRequest("No file type provided".to_string()))?;
        match kind {
            "directory" | "file" | "notebook" => serde_json::from_value(value.clone())
                .map_err(|e| NamespaceError::BadRequest(format!("Malformed model: {}", e))),
            other => Err(NamespaceError::BadRequest(format!(
                "Unsupported entity type: {}",
                other
            ))),
        }
    }

    /// Serialize to the JSON shape the host's plugin contract expects.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Namespace statistics.
#[derive(Clone, Debug, Default)]
pub struct NamespaceStats {
    /// Directory records in the index.
    pub directory_count: u64,
    /// Total version entries in the log, tombstones included.
    pub version_count: u64,
    /// Distinct filenames whose latest version is live.
    pub live_file_count: u64,
}
