//! Error handling and edge case tests.

use folio::{EntryKind, Model, Namespace, NamespaceConfig, NamespaceError};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn test_namespace(dir: &TempDir) -> Namespace {
    Namespace::create(NamespaceConfig {
        path: dir.path().join("namespace"),
        ..Default::default()
    })
    .unwrap()
}

// --- Absent paths ---

#[test]
fn test_get_missing_path_is_none() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    // Absent is a value, not an error.
    assert!(ns.get("nothing-here", true, None).unwrap().is_none());
    assert!(ns.get("nothing-here", true, Some(EntryKind::File)).unwrap().is_none());
    assert!(ns
        .get("nothing-here", true, Some(EntryKind::Directory))
        .unwrap()
        .is_none());
    assert!(ns
        .get("nothing-here", true, Some(EntryKind::Notebook))
        .unwrap()
        .is_none());
}

#[test]
fn test_get_file_as_directory_is_none() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("hello"), "foo.txt").unwrap();
    assert!(ns
        .get("foo.txt", true, Some(EntryKind::Directory))
        .unwrap()
        .is_none());
}

// --- Bad requests ---

#[test]
fn test_save_file_without_content() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let model = Model::from_value(&json!({"type": "file"})).unwrap();
    let result = ns.save(&model, "foo.txt");
    assert!(matches!(result, Err(NamespaceError::BadRequest(_))));

    let model = Model::from_value(&json!({"type": "notebook"})).unwrap();
    let result = ns.save(&model, "nb.ipynb");
    assert!(matches!(result, Err(NamespaceError::BadRequest(_))));
}

#[test]
fn test_model_without_type_is_bad_request() {
    let result = Model::from_value(&json!({"content": "hello"}));
    assert!(matches!(result, Err(NamespaceError::BadRequest(_))));
}

// --- Not found ---

#[test]
fn test_delete_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let result = ns.delete("missing.txt");
    assert!(matches!(result, Err(NamespaceError::NotFound(_))));
}

#[test]
fn test_double_delete_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("hello"), "foo.txt").unwrap();
    ns.delete("foo.txt").unwrap();

    let result = ns.delete("foo.txt");
    assert!(matches!(result, Err(NamespaceError::NotFound(_))));
}

#[test]
fn test_rename_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let result = ns.rename("missing.txt", "other.txt");
    assert!(matches!(result, Err(NamespaceError::NotFound(_))));
}

#[test]
fn test_rename_directory_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    // Only files are renamed; directories never reach the version log.
    ns.save(&Model::new_directory(), "foo").unwrap();
    let result = ns.rename("foo", "spam");
    assert!(matches!(result, Err(NamespaceError::NotFound(_))));
}

// --- Content decoding ---

#[test]
fn test_plain_text_as_notebook_fails_to_parse() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("not a document"), "foo.txt").unwrap();

    let result = ns.get("foo.txt", true, Some(EntryKind::Notebook));
    assert!(matches!(result, Err(NamespaceError::Deserialization(_))));

    // Without content the metadata alone resolves fine.
    assert!(ns
        .get("foo.txt", false, Some(EntryKind::Notebook))
        .unwrap()
        .is_some());
}

// --- Store lifecycle ---

#[test]
fn test_second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let config = NamespaceConfig {
        path: dir.path().join("namespace"),
        ..Default::default()
    };

    let _ns = Namespace::create(config.clone()).unwrap();

    let result = Namespace::open(config);
    assert!(matches!(result, Err(NamespaceError::Locked)));
}

#[test]
fn test_open_missing_without_create() {
    let dir = TempDir::new().unwrap();

    let result = Namespace::open_or_create(NamespaceConfig {
        path: dir.path().join("missing"),
        create_if_missing: false,
        ..Default::default()
    });
    assert!(matches!(result, Err(NamespaceError::NotInitialized)));
}

#[test]
fn test_corrupt_manifest_is_invalid_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("namespace");

    {
        let _ns = Namespace::create(NamespaceConfig {
            path: path.clone(),
            ..Default::default()
        })
        .unwrap();
    }

    fs::write(path.join("MANIFEST"), b"JNK\0\x01").unwrap();

    let result = Namespace::open(NamespaceConfig {
        path,
        ..Default::default()
    });
    assert!(matches!(result, Err(NamespaceError::InvalidFormat(_))));
}
