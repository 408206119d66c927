//! Append-only version log.

use crate::error::{NamespaceError, Result};
use crate::types::{BlobMetadata, BlobVersion, Sequence, Timestamp};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Magic bytes for version entries.
const VERSION_MAGIC: &[u8; 4] = b"VER\0";

/// Current version log format version.
const VERSION_LOG_VERSION: u8 = 1;

/// Flag bit marking a tombstone entry.
const FLAG_DELETED: u8 = 0b0000_0001;

/// Location and resolution keys of one version entry.
#[derive(Clone, Copy, Debug)]
struct VersionPointer {
    sequence: Sequence,
    uploaded: Timestamp,
    offset: u64,
    deleted: bool,
}

impl VersionPointer {
    /// Resolution key: upload timestamp, ties broken by insertion sequence.
    fn sort_key(&self) -> (Timestamp, Sequence) {
        (self.uploaded, self.sequence)
    }
}

/// Append-only store of immutable content versions keyed by filename.
pub struct VersionLog {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: RwLock<File>,

    /// Filename to version pointers, in append order per filename.
    /// Ordered by filename so prefix listings are range scans.
    index: RwLock<BTreeMap<String, Vec<VersionPointer>>>,

    /// Next sequence to assign.
    next_sequence: RwLock<Sequence>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// LRU cache of decoded versions, keyed by sequence.
    cache: Mutex<LruCache<Sequence, BlobVersion>>,
}

impl VersionLog {
    /// Open or create a version log, rebuilding the filename index from the
    /// entries on disk.
    pub fn open(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let (index, next_sequence, end) = Self::scan(&mut file)?;
        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap();

        Ok(Self {
            path,
            file: RwLock::new(file),
            index: RwLock::new(index),
            next_sequence: RwLock::new(next_sequence),
            file_size: RwLock::new(end),
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    /// Write a new immutable version for `filename`.
    ///
    /// The log assigns the upload timestamp and the store-wide sequence; the
    /// new entry becomes the latest for its filename unless an existing
    /// version carries a greater timestamp.
    pub fn append(
        &self,
        filename: &str,
        content: &[u8],
        metadata: BlobMetadata,
    ) -> Result<BlobVersion> {
        let mut file = self.file.write();

        let sequence = *self.next_sequence.read();
        *self.next_sequence.write() = sequence.next();

        let version = BlobVersion {
            filename: filename.to_string(),
            sequence,
            uploaded: Timestamp::now(),
            metadata,
            content: content.to_vec(),
        };

        let offset = *self.file_size.read();
        file.seek(SeekFrom::Start(offset))?;
        write_version(&mut *file, &version)?;
        file.sync_all()?;

        let new_size = file.stream_position()?;
        *self.file_size.write() = new_size;

        self.index
            .write()
            .entry(filename.to_string())
            .or_default()
            .push(VersionPointer {
                sequence,
                uploaded: version.uploaded,
                offset,
                deleted: version.metadata.deleted,
            });

        self.cache.lock().put(sequence, version.clone());

        Ok(version)
    }

    /// The version with the greatest (timestamp, sequence) for `filename`.
    ///
    /// With `ignore_deleted`, a tombstoned latest version reports the
    /// filename as absent.
    pub fn latest_version(
        &self,
        filename: &str,
        ignore_deleted: bool,
    ) -> Result<Option<BlobVersion>> {
        let pointer = match self.latest_pointer(filename) {
            Some(pointer) => pointer,
            None => return Ok(None),
        };
        if ignore_deleted && pointer.deleted {
            return Ok(None);
        }
        Ok(Some(self.read_version(pointer)?))
    }

    /// True iff a live (non-tombstoned) latest version exists.
    pub fn exists(&self, filename: &str) -> bool {
        self.latest_pointer(filename)
            .map(|pointer| !pointer.deleted)
            .unwrap_or(false)
    }

    /// Mark `filename` deleted by appending a tombstone version.
    ///
    /// Fails with `NotFound` if the filename has no live latest version.
    pub fn soft_delete(&self, filename: &str) -> Result<()> {
        let latest = self
            .latest_version(filename, true)?
            .ok_or_else(|| NamespaceError::NotFound(format!("No file at {}", filename)))?;

        let mut metadata = latest.metadata;
        metadata.deleted = true;
        // Tombstones carry no content.
        self.append(filename, &[], metadata)?;
        Ok(())
    }

    /// Move the latest version of `old_filename` to `new_filename`.
    ///
    /// Appends a content copy under the new filename with updated name and
    /// path metadata, then a tombstone under the old one; written entries
    /// are never touched. Fails with `NotFound` if `old_filename` has no
    /// live latest version.
    pub fn rename(&self, old_filename: &str, new_filename: &str, new_name: &str) -> Result<()> {
        let latest = self
            .latest_version(old_filename, true)?
            .ok_or_else(|| NamespaceError::NotFound(format!("No file at {}", old_filename)))?;

        let mut metadata = latest.metadata.clone();
        metadata.name = new_name.to_string();
        metadata.path = new_filename.to_string();
        self.append(new_filename, &latest.content, metadata)?;

        let mut tombstone = latest.metadata;
        tombstone.deleted = true;
        self.append(old_filename, &[], tombstone)?;
        Ok(())
    }

    /// Latest live version of every distinct filename exactly one path
    /// segment below `prefix`, in filename order.
    pub fn list_latest_under_prefix(&self, prefix: &str) -> Result<Vec<BlobVersion>> {
        let child_prefix = format!("{}/", prefix.trim_end_matches('/'));

        let pointers: Vec<VersionPointer> = {
            let index = self.index.read();
            index
                .range(child_prefix.clone()..)
                .take_while(|(name, _)| name.starts_with(&child_prefix))
                .filter(|(name, _)| {
                    let rest = &name[child_prefix.len()..];
                    !rest.is_empty() && !rest.contains('/')
                })
                .filter_map(|(_, versions)| {
                    versions.iter().max_by_key(|p| p.sort_key()).copied()
                })
                .filter(|pointer| !pointer.deleted)
                .collect()
        };

        pointers
            .into_iter()
            .map(|pointer| self.read_version(pointer))
            .collect()
    }

    /// Total version entries, tombstones included.
    pub fn version_count(&self) -> u64 {
        self.index
            .read()
            .values()
            .map(|versions| versions.len() as u64)
            .sum()
    }

    /// Distinct filenames whose latest version is live.
    pub fn live_file_count(&self) -> u64 {
        self.index
            .read()
            .values()
            .filter(|versions| {
                versions
                    .iter()
                    .max_by_key(|p| p.sort_key())
                    .map(|p| !p.deleted)
                    .unwrap_or(false)
            })
            .count() as u64
    }

    /// Latest pointer for a filename, by (timestamp, sequence).
    fn latest_pointer(&self, filename: &str) -> Option<VersionPointer> {
        self.index
            .read()
            .get(filename)?
            .iter()
            .max_by_key(|p| p.sort_key())
            .copied()
    }

    /// Read the version a pointer refers to, through the cache.
    fn read_version(&self, pointer: VersionPointer) -> Result<BlobVersion> {
        if let Some(cached) = self.cache.lock().get(&pointer.sequence).cloned() {
            return Ok(cached);
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(pointer.offset))?;
        let version = read_version(&mut *file)?;
        drop(file);

        self.cache.lock().put(pointer.sequence, version.clone());
        Ok(version)
    }

    /// Scan the log, rebuilding the filename index and the next sequence.
    ///
    /// Stops at the first torn or foreign entry; whatever follows the last
    /// whole entry is overwritten by the next append.
    fn scan(file: &mut File) -> Result<(BTreeMap<String, Vec<VersionPointer>>, Sequence, u64)> {
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;

        let mut index: BTreeMap<String, Vec<VersionPointer>> = BTreeMap::new();
        let mut max_sequence = 0u64;
        let mut end = 0u64;

        while end < file_len {
            match read_entry_header(file, file_len, end) {
                Some((filename, pointer, next)) => {
                    max_sequence = max_sequence.max(pointer.sequence.0);
                    index.entry(filename).or_default().push(pointer);
                    end = next;
                }
                None => break,
            }
        }

        Ok((index, Sequence(max_sequence + 1), end))
    }
}

/// Read one entry's header at `offset`, skipping metadata and content.
///
/// Returns the filename, its pointer, and the offset of the next entry, or
/// None if the bytes at `offset` are not a whole entry.
fn read_entry_header(
    file: &mut File,
    file_len: u64,
    offset: u64,
) -> Option<(String, VersionPointer, u64)> {
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).ok()?;
    if &magic != VERSION_MAGIC {
        return None;
    }

    let mut version = [0u8; 1];
    file.read_exact(&mut version).ok()?;
    if version[0] != VERSION_LOG_VERSION {
        return None;
    }

    let mut flags = [0u8; 1];
    file.read_exact(&mut flags).ok()?;

    let mut seq_bytes = [0u8; 8];
    file.read_exact(&mut seq_bytes).ok()?;
    let sequence = Sequence(u64::from_le_bytes(seq_bytes));

    let mut ts_bytes = [0u8; 8];
    file.read_exact(&mut ts_bytes).ok()?;
    let uploaded = Timestamp(i64::from_le_bytes(ts_bytes));

    let mut name_len_bytes = [0u8; 2];
    file.read_exact(&mut name_len_bytes).ok()?;
    let name_len = u16::from_le_bytes(name_len_bytes) as usize;
    let mut name_bytes = vec![0u8; name_len];
    file.read_exact(&mut name_bytes).ok()?;
    let filename = String::from_utf8(name_bytes).ok()?;

    let mut meta_len_bytes = [0u8; 4];
    file.read_exact(&mut meta_len_bytes).ok()?;
    let meta_len = u32::from_le_bytes(meta_len_bytes) as u64;
    file.seek(SeekFrom::Current(meta_len as i64)).ok()?;

    let mut content_len_bytes = [0u8; 4];
    file.read_exact(&mut content_len_bytes).ok()?;
    let content_len = u32::from_le_bytes(content_len_bytes) as u64;
    file.seek(SeekFrom::Current(content_len as i64 + 4)).ok()?;

    let next = file.stream_position().ok()?;
    if next > file_len {
        return None;
    }

    Some((
        filename,
        VersionPointer {
            sequence,
            uploaded,
            offset,
            deleted: flags[0] & FLAG_DELETED != 0,
        },
        next,
    ))
}

/// Write a version entry at the file's current position.
fn write_version(file: &mut File, version: &BlobVersion) -> Result<()> {
    file.write_all(VERSION_MAGIC)?;
    file.write_all(&[VERSION_LOG_VERSION])?;

    let flags = if version.metadata.deleted {
        FLAG_DELETED
    } else {
        0
    };
    file.write_all(&[flags])?;

    file.write_all(&version.sequence.0.to_le_bytes())?;
    file.write_all(&version.uploaded.0.to_le_bytes())?;

    let name_bytes = version.filename.as_bytes();
    file.write_all(&(name_bytes.len() as u16).to_le_bytes())?;
    file.write_all(name_bytes)?;

    let metadata = rmp_serde::to_vec(&version.metadata)?;
    file.write_all(&(metadata.len() as u32).to_le_bytes())?;
    file.write_all(&metadata)?;

    file.write_all(&(version.content.len() as u32).to_le_bytes())?;
    file.write_all(&version.content)?;

    let checksum = crc32fast::hash(&version.content);
    file.write_all(&checksum.to_le_bytes())?;

    Ok(())
}

/// Read a version entry from the file's current position.
fn read_version(file: &mut File) -> Result<BlobVersion> {
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != VERSION_MAGIC {
        return Err(NamespaceError::InvalidFormat(
            "Invalid version entry magic".into(),
        ));
    }

    let mut version = [0u8; 1];
    file.read_exact(&mut version)?;
    if version[0] != VERSION_LOG_VERSION {
        return Err(NamespaceError::InvalidFormat(format!(
            "Unsupported version log version: {}",
            version[0]
        )));
    }

    let mut _flags = [0u8; 1];
    file.read_exact(&mut _flags)?;

    let mut seq_bytes = [0u8; 8];
    file.read_exact(&mut seq_bytes)?;
    let sequence = Sequence(u64::from_le_bytes(seq_bytes));

    let mut ts_bytes = [0u8; 8];
    file.read_exact(&mut ts_bytes)?;
    let uploaded = Timestamp(i64::from_le_bytes(ts_bytes));

    let mut name_len_bytes = [0u8; 2];
    file.read_exact(&mut name_len_bytes)?;
    let name_len = u16::from_le_bytes(name_len_bytes) as usize;
    let mut name_bytes = vec![0u8; name_len];
    file.read_exact(&mut name_bytes)?;
    let filename = String::from_utf8_lossy(&name_bytes).into_owned();

    let mut meta_len_bytes = [0u8; 4];
    file.read_exact(&mut meta_len_bytes)?;
    let meta_len = u32::from_le_bytes(meta_len_bytes) as usize;
    let mut meta_bytes = vec![0u8; meta_len];
    file.read_exact(&mut meta_bytes)?;
    let metadata: BlobMetadata = rmp_serde::from_slice(&meta_bytes)?;

    let mut content_len_bytes = [0u8; 4];
    file.read_exact(&mut content_len_bytes)?;
    let content_len = u32::from_le_bytes(content_len_bytes) as usize;
    let mut content = vec![0u8; content_len];
    file.read_exact(&mut content)?;

    let mut checksum_bytes = [0u8; 4];
    file.read_exact(&mut checksum_bytes)?;
    let stored_checksum = u32::from_le_bytes(checksum_bytes);
    let computed_checksum = crc32fast::hash(&content);

    if stored_checksum != computed_checksum {
        return Err(NamespaceError::ChecksumMismatch {
            expected: stored_checksum,
            got: computed_checksum,
        });
    }

    Ok(BlobVersion {
        filename,
        sequence,
        uploaded,
        metadata,
        content,
    })
}
