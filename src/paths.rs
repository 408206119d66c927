//! Path normalization against the configured root prefix.
//!
//! API paths are `/`-separated and relative to the namespace root; storage
//! paths are absolute, rooted at the configured prefix, with no trailing
//! slash except the root itself.

/// Translates between API-relative and storage paths.
#[derive(Clone, Debug)]
pub struct PathCodec {
    /// Absolute storage prefix, no trailing slash except bare "/".
    root_prefix: String,
}

impl PathCodec {
    /// Create a codec for the given root prefix.
    ///
    /// The prefix is brought to canonical form: leading slash, trailing
    /// slash stripped unless it is the root itself.
    pub fn new(root_prefix: &str) -> Self {
        let trimmed = root_prefix.trim_matches('/');
        let root_prefix = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", trimmed)
        };
        Self { root_prefix }
    }

    /// The canonical storage path of the namespace root.
    pub fn root(&self) -> &str {
        &self.root_prefix
    }

    /// Join an API path onto the root prefix, collapsing empty and `.`
    /// segments. The empty API path maps to the root itself.
    pub fn normalize(&self, api_path: &str) -> String {
        let mut storage = self.root_prefix.clone();
        for segment in api_path.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if !storage.ends_with('/') {
                storage.push('/');
            }
            storage.push_str(segment);
        }
        storage
    }

    /// Strip the root prefix, producing the path the caller should see.
    ///
    /// The inverse of [`normalize`](Self::normalize) for canonical storage
    /// paths; the root itself maps to the empty API path.
    pub fn denormalize(&self, storage_path: &str) -> String {
        let rest = storage_path
            .strip_prefix(&self.root_prefix)
            .unwrap_or(storage_path);
        rest.trim_start_matches('/').to_string()
    }

    /// True if the final path segment starts with `.` or `__`.
    pub fn is_hidden(&self, path: &str) -> bool {
        let name = basename(path);
        name.starts_with('.') || name.starts_with("__")
    }
}

/// Final segment of a `/`-separated path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything up to the final segment. The parent of a top-level path is
/// "/", and the root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => path,
    }
}
