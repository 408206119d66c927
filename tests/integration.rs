//! Integration tests for the namespace.

use folio::{ContentFormat, EntryKind, Model, Namespace, NamespaceConfig, Timestamp};
use serde_json::json;
use tempfile::TempDir;

fn test_namespace(dir: &TempDir) -> Namespace {
    Namespace::create(NamespaceConfig {
        path: dir.path().join("namespace"),
        ..Default::default()
    })
    .unwrap()
}

fn notebook_fixture() -> serde_json::Value {
    json!({
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 0,
        "cells": [
            {
                "cell_type": "markdown",
                "metadata": {},
                "source": "Some **Markdown**",
            },
        ],
    })
}

// --- Files ---

#[test]
fn test_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let saved = ns.save(&Model::new_file("hello"), "foo.txt").unwrap();

    // Save returns the stored model without content.
    match &saved {
        Model::File(m) => {
            assert_eq!(m.name, "foo.txt");
            assert_eq!(m.path, "foo.txt");
            assert!(m.content.is_none());
        }
        other => panic!("expected file model, got {:?}", other),
    }

    let fetched = ns.get("foo.txt", true, Some(EntryKind::File)).unwrap().unwrap();
    match fetched {
        Model::File(m) => assert_eq!(m.content.as_deref(), Some("hello")),
        other => panic!("expected file model, got {:?}", other),
    }
}

#[test]
fn test_overwrite_keeps_latest() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("first"), "foo.txt").unwrap();
    ns.save(&Model::new_file("second"), "foo.txt").unwrap();

    let fetched = ns.get("foo.txt", true, None).unwrap().unwrap();
    match fetched {
        Model::File(m) => assert_eq!(m.content.as_deref(), Some("second")),
        other => panic!("expected file model, got {:?}", other),
    }

    // Both versions remain in the log.
    assert_eq!(ns.stats().version_count, 2);
    assert_eq!(ns.stats().live_file_count, 1);
}

#[test]
fn test_save_preserves_supplied_created() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let created = Timestamp(1_000_000);
    ns.save(
        &Model::new_file("hello").with_created(created),
        "foo.txt",
    )
    .unwrap();

    let fetched = ns.get("foo.txt", false, None).unwrap().unwrap();
    match fetched {
        Model::File(m) => {
            assert_eq!(m.created, Some(created));
            assert!(m.last_modified.unwrap() > created);
        }
        other => panic!("expected file model, got {:?}", other),
    }
}

#[test]
fn test_delete() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("hello"), "foo.txt").unwrap();
    assert!(ns.get("foo.txt", true, None).unwrap().is_some());

    ns.delete("foo.txt").unwrap();
    assert!(ns.get("foo.txt", true, None).unwrap().is_none());
    assert!(!ns.file_exists("foo.txt"));
}

#[test]
fn test_rename_preserves_content() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("hello"), "foo.txt").unwrap();
    ns.rename("foo.txt", "bar.txt").unwrap();

    assert!(ns.get("foo.txt", true, None).unwrap().is_none());

    let fetched = ns.get("bar.txt", true, None).unwrap().unwrap();
    match fetched {
        Model::File(m) => {
            assert_eq!(m.content.as_deref(), Some("hello"));
            assert_eq!(m.name, "bar.txt");
            assert_eq!(m.path, "bar.txt");
        }
        other => panic!("expected file model, got {:?}", other),
    }
}

// --- Directories ---

#[test]
fn test_directory_model_fields() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_directory(), "foo").unwrap();

    let model = ns.get("foo", true, Some(EntryKind::Directory)).unwrap().unwrap();
    match model {
        Model::Directory(m) => {
            assert_eq!(m.name, "foo");
            assert_eq!(m.path, "foo");
            assert_eq!(m.format, Some(ContentFormat::Json));
            assert!(m.mimetype.is_none());
            assert!(m.writable);
            assert!(m.created.is_some());
            assert_eq!(m.content.unwrap().len(), 0);
        }
        other => panic!("expected directory model, got {:?}", other),
    }
}

#[test]
fn test_directory_double_save_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_directory(), "foo").unwrap();
    ns.save(&Model::new_directory(), "foo").unwrap();

    assert!(ns.dir_exists("foo"));
    // Root plus the one created directory.
    assert_eq!(ns.stats().directory_count, 2);
}

#[test]
fn test_nested_directory_listing_cardinality() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    for path in ["foo", "foo/bar", "foo/bar/spam", "foo/bar/spam/eggs"] {
        ns.save(&Model::new_directory(), path).unwrap();
        assert!(ns.dir_exists(path));
    }

    let children = |path: &str| -> usize {
        match ns.get(path, true, Some(EntryKind::Directory)).unwrap().unwrap() {
            Model::Directory(m) => m.content.unwrap().len(),
            other => panic!("expected directory model, got {:?}", other),
        }
    };

    assert_eq!(children("foo"), 1);
    assert_eq!(children("foo/bar"), 1);
    assert_eq!(children("foo/bar/spam"), 1);
    assert_eq!(children("foo/bar/spam/eggs"), 0);
}

#[test]
fn test_directory_without_explicit_kind() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_directory(), "foo").unwrap();

    let model = ns.get("foo", true, None).unwrap().unwrap();
    assert_eq!(model.kind(), EntryKind::Directory);
}

#[test]
fn test_mixed_listing_sorted_by_name() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_directory(), "mydir").unwrap();
    ns.save(&Model::new_file("hello"), "mydir/foo.txt").unwrap();

    let listing = |ns: &Namespace| -> Vec<(String, EntryKind)> {
        match ns.get("mydir", true, None).unwrap().unwrap() {
            Model::Directory(m) => m
                .content
                .unwrap()
                .into_iter()
                .map(|child| (child.name().to_string(), child.kind()))
                .collect(),
            other => panic!("expected directory model, got {:?}", other),
        }
    };

    assert_eq!(
        listing(&ns),
        vec![("foo.txt".to_string(), EntryKind::File)]
    );

    ns.save(&Model::new_directory(), "mydir/foo").unwrap();
    assert_eq!(
        listing(&ns),
        vec![
            ("foo".to_string(), EntryKind::Directory),
            ("foo.txt".to_string(), EntryKind::File),
        ]
    );
}

#[test]
fn test_deleted_files_are_excluded_from_listing() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_directory(), "mydir").unwrap();
    ns.save(&Model::new_file("a"), "mydir/a.txt").unwrap();
    ns.save(&Model::new_file("b"), "mydir/b.txt").unwrap();
    ns.delete("mydir/a.txt").unwrap();

    match ns.get("mydir", true, None).unwrap().unwrap() {
        Model::Directory(m) => {
            let names: Vec<_> = m
                .content
                .unwrap()
                .iter()
                .map(|child| child.name().to_string())
                .collect();
            assert_eq!(names, vec!["b.txt"]);
        }
        other => panic!("expected directory model, got {:?}", other),
    }
}

// --- Notebooks ---

#[test]
fn test_notebook_round_trip() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let document = notebook_fixture();
    ns.save(&Model::new_notebook(document.clone()), "nb.ipynb")
        .unwrap();

    let fetched = ns.get("nb.ipynb", true, Some(EntryKind::Notebook)).unwrap().unwrap();
    match fetched {
        Model::Notebook(m) => assert_eq!(m.content.unwrap(), document),
        other => panic!("expected notebook model, got {:?}", other),
    }
}

#[test]
fn test_notebook_inference_redirects_from_file() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let document = notebook_fixture();
    ns.save(&Model::new_notebook(document.clone()), "nb.ipynb")
        .unwrap();

    // Asking for a file, or not saying, must still produce the structured
    // document rather than raw bytes.
    for kind in [Some(EntryKind::File), None] {
        let fetched = ns.get("nb.ipynb", true, kind).unwrap().unwrap();
        match fetched {
            Model::Notebook(m) => assert_eq!(m.content.as_ref().unwrap(), &document),
            other => panic!("expected notebook model, got {:?}", other),
        }
    }
}

#[test]
fn test_notebook_in_directory_listing() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_directory(), "mydir").unwrap();
    ns.save(&Model::new_notebook(notebook_fixture()), "mydir/nb.ipynb")
        .unwrap();

    match ns.get("mydir", true, None).unwrap().unwrap() {
        Model::Directory(m) => {
            let children = m.content.unwrap();
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].kind(), EntryKind::Notebook);
            // Child models carry no content of their own.
            match &children[0] {
                Model::Notebook(nb) => assert!(nb.content.is_none()),
                other => panic!("expected notebook model, got {:?}", other),
            }
        }
        other => panic!("expected directory model, got {:?}", other),
    }
}

#[test]
fn test_notebook_rename_and_delete() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let document = notebook_fixture();
    ns.save(&Model::new_notebook(document.clone()), "nb.ipynb")
        .unwrap();

    ns.rename("nb.ipynb", "renamed.ipynb").unwrap();
    assert!(ns.get("nb.ipynb", true, None).unwrap().is_none());

    match ns.get("renamed.ipynb", true, None).unwrap().unwrap() {
        Model::Notebook(m) => assert_eq!(m.content.unwrap(), document),
        other => panic!("expected notebook model, got {:?}", other),
    }

    ns.delete("renamed.ipynb").unwrap();
    assert!(ns.get("renamed.ipynb", true, None).unwrap().is_none());
}

// --- Root and bootstrap ---

#[test]
fn test_root_bootstrap() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    assert!(ns.dir_exists(""));
    assert!(ns.get("", true, None).unwrap().is_some());
}

#[test]
fn test_files_at_root_are_listed() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    ns.save(&Model::new_file("hello"), "foo.txt").unwrap();
    ns.save(&Model::new_directory(), "sub").unwrap();

    match ns.get("", true, None).unwrap().unwrap() {
        Model::Directory(m) => {
            let names: Vec<_> = m
                .content
                .unwrap()
                .iter()
                .map(|child| child.name().to_string())
                .collect();
            assert_eq!(names, vec!["foo.txt", "sub"]);
        }
        other => panic!("expected directory model, got {:?}", other),
    }
}

// --- Root prefix ---

#[test]
fn test_nested_root_prefix() {
    let dir = TempDir::new().unwrap();
    let ns = Namespace::create(NamespaceConfig {
        path: dir.path().join("namespace"),
        root_prefix: "/notebooks".to_string(),
        ..Default::default()
    })
    .unwrap();

    assert!(ns.dir_exists(""));
    ns.save(&Model::new_file("hello"), "foo.txt").unwrap();

    // Paths the caller sees stay API-relative.
    let fetched = ns.get("foo.txt", true, None).unwrap().unwrap();
    match fetched {
        Model::File(m) => {
            assert_eq!(m.path, "foo.txt");
            assert_eq!(m.content.as_deref(), Some("hello"));
        }
        other => panic!("expected file model, got {:?}", other),
    }
}

// --- Hidden paths ---

#[test]
fn test_is_hidden() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    assert!(ns.is_hidden(".hidden"));
    assert!(ns.is_hidden("foo/__pycache__"));
    assert!(!ns.is_hidden("foo/visible.txt"));
}

// --- Persistence ---

#[test]
fn test_reopen_preserves_namespace() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("namespace");

    {
        let ns = Namespace::create(NamespaceConfig {
            path: path.clone(),
            ..Default::default()
        })
        .unwrap();
        ns.save(&Model::new_directory(), "mydir").unwrap();
        ns.save(&Model::new_file("hello"), "mydir/foo.txt").unwrap();
        ns.save(&Model::new_notebook(notebook_fixture()), "nb.ipynb")
            .unwrap();
        ns.delete("nb.ipynb").unwrap();
    }

    let ns = Namespace::open_or_create(NamespaceConfig {
        path,
        ..Default::default()
    })
    .unwrap();

    assert!(ns.dir_exists("mydir"));
    assert!(ns.get("nb.ipynb", true, None).unwrap().is_none());

    match ns.get("mydir/foo.txt", true, None).unwrap().unwrap() {
        Model::File(m) => assert_eq!(m.content.as_deref(), Some("hello")),
        other => panic!("expected file model, got {:?}", other),
    }

    // Tombstones survive the reopen too.
    let stats = ns.stats();
    assert_eq!(stats.version_count, 3);
    assert_eq!(stats.live_file_count, 1);
}

// --- JSON boundary ---

#[test]
fn test_save_from_json_value() {
    let dir = TempDir::new().unwrap();
    let ns = test_namespace(&dir);

    let model = Model::from_value(&json!({
        "type": "file",
        "content": "from the wire",
        "format": "text",
        "mimetype": "text/plain",
    }))
    .unwrap();

    ns.save(&model, "wire.txt").unwrap();

    let fetched = ns.get("wire.txt", true, None).unwrap().unwrap();
    let value = fetched.to_value().unwrap();
    assert_eq!(value["type"], "file");
    assert_eq!(value["content"], "from the wire");
    assert_eq!(value["name"], "wire.txt");
}
