//! Namespace resolver tying the stores together.

use crate::directories::DirectoryIndex;
use crate::error::{NamespaceError, Result};
use crate::paths::{basename, PathCodec};
use crate::types::{
    BlobMetadata, BlobVersion, ContentFormat, DirectoryModel, EntryKind, FileModel, Model,
    NamespaceStats, NotebookModel, Timestamp,
};
use crate::versions::VersionLog;
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Namespace configuration.
#[derive(Clone, Debug)]
pub struct NamespaceConfig {
    /// Base path for the store.
    pub path: PathBuf,

    /// File holding the directory index, relative to `path`.
    pub directories_file: String,

    /// File holding the version log, relative to `path`.
    pub versions_file: String,

    /// Storage prefix under which all API paths are resolved.
    pub root_prefix: String,

    /// Version cache size (number of decoded versions).
    pub version_cache_size: usize,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./namespace"),
            directories_file: "directories.idx".to_string(),
            versions_file: "versions.log".to_string(),
            root_prefix: "/".to_string(),
            version_cache_size: 1000,
            create_if_missing: true,
        }
    }
}

/// Magic bytes for the store manifest.
const MANIFEST_MAGIC: &[u8; 4] = b"FOL\0";

/// Current store format version.
const MANIFEST_VERSION: u8 = 1;

/// The namespace resolver.
///
/// Presents a hierarchical, path-addressed namespace of directories and
/// versioned documents over a directory index and an append-only version
/// log. Operations are synchronous and safe to call from any number of
/// threads sharing one instance.
pub struct Namespace {
    /// Namespace configuration.
    config: NamespaceConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// Path translation against the root prefix.
    codec: PathCodec,

    /// Directory metadata index.
    directories: DirectoryIndex,

    /// Versioned blob storage.
    versions: VersionLog,
}

impl Namespace {
    /// Open an existing namespace or create a new one.
    pub fn open_or_create(config: NamespaceConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(NamespaceError::NotInitialized)
        }
    }

    /// Create a new namespace store.
    pub fn create(config: NamespaceConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;

        let codec = PathCodec::new(&config.root_prefix);
        let directories = DirectoryIndex::new(config.path.join(&config.directories_file))?;
        let versions = VersionLog::open(
            config.path.join(&config.versions_file),
            config.version_cache_size,
        )?;

        debug!(path = %config.path.display(), "created namespace store");

        let namespace = Self {
            config,
            _lock_file: lock_file,
            codec,
            directories,
            versions,
        };
        namespace.bootstrap_root()?;
        Ok(namespace)
    }

    /// Open an existing namespace store.
    pub fn open(config: NamespaceConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;

        let codec = PathCodec::new(&config.root_prefix);
        let directories = DirectoryIndex::load(config.path.join(&config.directories_file))?;
        let versions = VersionLog::open(
            config.path.join(&config.versions_file),
            config.version_cache_size,
        )?;

        let namespace = Self {
            config,
            _lock_file: lock_file,
            codec,
            directories,
            versions,
        };
        namespace.bootstrap_root()?;
        Ok(namespace)
    }

    /// The root directory always exists once the namespace is initialized.
    fn bootstrap_root(&self) -> Result<()> {
        if !self.dir_exists("") {
            self.save(&Model::new_directory(), "")?;
        }
        Ok(())
    }

    // --- Resolution ---

    /// Get the model at an API path, or None if nothing exists there.
    ///
    /// With no explicit kind the entity kind is inferred: a directory record
    /// wins, then a live blob version (whose metadata distinguishes files
    /// from notebooks), otherwise the path is absent.
    pub fn get(
        &self,
        path: &str,
        include_content: bool,
        kind: Option<EntryKind>,
    ) -> Result<Option<Model>> {
        let storage_path = self.codec.normalize(path);

        match kind {
            Some(EntryKind::Directory) => self.get_directory(&storage_path, include_content),
            Some(EntryKind::File) => self.get_file(&storage_path, include_content),
            Some(EntryKind::Notebook) => self.get_notebook(&storage_path, include_content, None),
            None => {
                if self.directories.exists(&storage_path) {
                    self.get_directory(&storage_path, include_content)
                } else if self.versions.exists(&storage_path) {
                    self.get_file(&storage_path, include_content)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Save a model at an API path, dispatching on its kind.
    ///
    /// `created` is preserved when the caller supplied one; `last_modified`
    /// is stamped now. Returns the saved model re-fetched without content,
    /// so a save followed by a get observes exactly what was stored.
    pub fn save(&self, model: &Model, path: &str) -> Result<Model> {
        let storage_path = self.codec.normalize(path);

        match model {
            Model::Directory(_) => {
                self.directories.create(&storage_path)?;
            }
            Model::File(m) => {
                let content = m.content.as_deref().ok_or_else(|| {
                    NamespaceError::BadRequest("No file content provided".to_string())
                })?;
                self.save_file(
                    &storage_path,
                    content.as_bytes(),
                    EntryKind::File,
                    m.mimetype.clone(),
                    m.format,
                    m.created,
                )?;
            }
            Model::Notebook(m) => {
                let document = m.content.as_ref().ok_or_else(|| {
                    NamespaceError::BadRequest("No file content provided".to_string())
                })?;
                let bytes = serde_json::to_vec(document)?;
                self.save_file(
                    &storage_path,
                    &bytes,
                    EntryKind::Notebook,
                    m.mimetype.clone(),
                    m.format,
                    m.created,
                )?;
            }
        }

        self.get(path, false, Some(model.kind()))?
            .ok_or_else(|| NamespaceError::NotFound(format!("No file at {}", path)))
    }

    /// Soft-delete the file or notebook at an API path.
    pub fn delete(&self, path: &str) -> Result<()> {
        self.versions.soft_delete(&self.codec.normalize(path))
    }

    /// Move the file or notebook at `old_path` to `new_path`.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old = self.codec.normalize(old_path);
        let new = self.codec.normalize(new_path);
        self.versions.rename(&old, &new, basename(&new))
    }

    /// Does a directory exist at the given API path?
    pub fn dir_exists(&self, path: &str) -> bool {
        self.directories.exists(&self.codec.normalize(path))
    }

    /// Does a file or notebook exist at the given API path?
    pub fn file_exists(&self, path: &str) -> bool {
        self.versions.exists(&self.codec.normalize(path))
    }

    /// Is the final path segment hidden by convention?
    pub fn is_hidden(&self, path: &str) -> bool {
        self.codec.is_hidden(path)
    }

    /// Get namespace statistics.
    pub fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            directory_count: self.directories.len() as u64,
            version_count: self.versions.version_count(),
            live_file_count: self.versions.live_file_count(),
        }
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // --- Kind-specific resolution ---

    fn get_directory(&self, storage_path: &str, include_content: bool) -> Result<Option<Model>> {
        let record = match self.directories.get(storage_path) {
            Some(record) => record,
            None => return Ok(None),
        };

        let mut model = DirectoryModel {
            name: basename(&record.path).to_string(),
            path: self.codec.denormalize(&record.path),
            created: Some(record.created),
            last_modified: Some(record.last_modified),
            writable: true,
            mimetype: None,
            format: Some(ContentFormat::Json),
            content: None,
        };

        if include_content {
            let mut children = Vec::new();

            for sub in self.directories.list_immediate_children(storage_path) {
                children.push(Model::Directory(DirectoryModel {
                    name: basename(&sub.path).to_string(),
                    path: self.codec.denormalize(&sub.path),
                    created: Some(sub.created),
                    last_modified: Some(sub.last_modified),
                    writable: true,
                    mimetype: None,
                    format: Some(ContentFormat::Json),
                    content: None,
                }));
            }

            for version in self.versions.list_latest_under_prefix(storage_path)? {
                children.push(self.version_to_model(&version, false)?);
            }

            children.sort_by(|a, b| a.name().cmp(b.name()));
            model.content = Some(children);
        }

        Ok(Some(Model::Directory(model)))
    }

    fn get_file(&self, storage_path: &str, include_content: bool) -> Result<Option<Model>> {
        let version = match self.versions.latest_version(storage_path, true)? {
            Some(version) => version,
            None => return Ok(None),
        };

        // Kind inference lands notebooks here first; re-dispatch with the
        // version already in hand rather than hitting the store again.
        if version.metadata.kind == EntryKind::Notebook {
            return self.get_notebook(storage_path, include_content, Some(version));
        }

        Ok(Some(self.version_to_model(&version, include_content)?))
    }

    fn get_notebook(
        &self,
        storage_path: &str,
        include_content: bool,
        version: Option<BlobVersion>,
    ) -> Result<Option<Model>> {
        let version = match version {
            Some(version) => version,
            None => match self.versions.latest_version(storage_path, true)? {
                Some(version) => version,
                None => return Ok(None),
            },
        };

        let content = if include_content {
            Some(parse_document(&version.content)?)
        } else {
            None
        };

        Ok(Some(Model::Notebook(NotebookModel {
            name: version.metadata.name.clone(),
            path: self.codec.denormalize(&version.metadata.path),
            created: Some(version.metadata.created),
            last_modified: Some(version.metadata.last_modified),
            writable: true,
            mimetype: version.metadata.mimetype.clone(),
            format: version.metadata.format,
            content,
        })))
    }

    /// Assemble a model from a blob version, honoring its stored kind.
    fn version_to_model(&self, version: &BlobVersion, include_content: bool) -> Result<Model> {
        let metadata = &version.metadata;
        let path = self.codec.denormalize(&metadata.path);

        match metadata.kind {
            EntryKind::Notebook => {
                let content = if include_content {
                    Some(parse_document(&version.content)?)
                } else {
                    None
                };
                Ok(Model::Notebook(NotebookModel {
                    name: metadata.name.clone(),
                    path,
                    created: Some(metadata.created),
                    last_modified: Some(metadata.last_modified),
                    writable: true,
                    mimetype: metadata.mimetype.clone(),
                    format: metadata.format,
                    content,
                }))
            }
            _ => {
                let content = if include_content {
                    Some(decode_text(&version.content)?)
                } else {
                    None
                };
                Ok(Model::File(FileModel {
                    name: metadata.name.clone(),
                    path,
                    created: Some(metadata.created),
                    last_modified: Some(metadata.last_modified),
                    writable: true,
                    mimetype: metadata.mimetype.clone(),
                    format: metadata.format,
                    content,
                }))
            }
        }
    }

    fn save_file(
        &self,
        storage_path: &str,
        content: &[u8],
        kind: EntryKind,
        mimetype: Option<String>,
        format: Option<ContentFormat>,
        created: Option<Timestamp>,
    ) -> Result<()> {
        let now = Timestamp::now();
        let metadata = BlobMetadata {
            name: basename(storage_path).to_string(),
            path: storage_path.to_string(),
            kind,
            created: created.unwrap_or(now),
            last_modified: now,
            mimetype,
            format,
            deleted: false,
        };

        self.versions.append(storage_path, content, metadata)?;
        Ok(())
    }

    // --- Private Helpers ---

    fn write_manifest(path: &Path) -> Result<()> {
        let manifest_path = path.join("MANIFEST");
        let mut file = File::create(manifest_path)?;

        file.write_all(MANIFEST_MAGIC)?;
        file.write_all(&[MANIFEST_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let manifest_path = path.join("MANIFEST");
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != MANIFEST_MAGIC {
            return Err(NamespaceError::InvalidFormat(
                "Invalid namespace magic".into(),
            ));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != MANIFEST_VERSION {
            return Err(NamespaceError::InvalidFormat(format!(
                "Unsupported namespace version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| NamespaceError::Locked)?;

        Ok(lock_file)
    }
}

/// Decode file content as text.
fn decode_text(content: &[u8]) -> Result<String> {
    String::from_utf8(content.to_vec())
        .map_err(|e| NamespaceError::Deserialization(format!("Content is not valid UTF-8: {}", e)))
}

/// Parse notebook content as a structured document.
fn parse_document(content: &[u8]) -> Result<serde_json::Value> {
    serde_json::from_slice(content)
        .map_err(|e| NamespaceError::Deserialization(format!("Content is not a document: {}", e)))
}
