//! CLI integration tests for the `tagmap` binary.
//!
//! Every command runs against a snapshot file so no server is needed.

use std::path::Path;
use std::process::{Command, Output};

use tagmap::utils::write_snapshot;
use tagmap::{EntryId, EntryRecord, Snapshot, TagId, TagRecord};
use tempfile::TempDir;
use time::macros::datetime;

fn snapshot() -> Snapshot {
    let mut main = TagRecord::new(TagId::new(1), "main");
    main.children = vec![TagId::new(3), TagId::new(2)];
    let at = datetime!(2024-05-01 08:30:00 UTC);
    Snapshot {
        tags: vec![
            main,
            TagRecord::new(TagId::new(2), "rust"),
            TagRecord::new(TagId::new(3), "other"),
        ],
        entries: vec![
            EntryRecord {
                id: EntryId::new(7),
                title: "Lifetimes".to_string(),
                content: "elision rules".to_string(),
                created_at: at,
                modified_at: at,
                category: TagId::new(2),
            },
            EntryRecord {
                id: EntryId::new(8),
                title: "Life admin".to_string(),
                content: "renew passport".to_string(),
                created_at: at,
                modified_at: at,
                category: TagId::new(3),
            },
        ],
    }
}

fn snapshot_file() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("snapshot.json");
    write_snapshot(&path, &snapshot()).expect("failed to write snapshot");
    (dir, path)
}

fn tagmap(snapshot: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tagmap"))
        .arg("--snapshot")
        .arg(snapshot)
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("failed to run tagmap")
}

#[test]
fn tree_prints_hierarchy_with_totals() {
    let (_dir, path) = snapshot_file();

    let output = tagmap(&path, &["tree"]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "main (2)\n  rust (1)\n  other (1)\n"
    );
}

#[test]
fn search_lists_prefix_matches() {
    let (_dir, path) = snapshot_file();

    let output = tagmap(&path, &["search", "lif"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains("Lifetimes"));
    assert!(stdout.contains("Life admin"));
}

#[test]
fn search_respects_tag_and_limit() {
    let (_dir, path) = snapshot_file();

    let scoped = tagmap(&path, &["search", "lif", "--tag", "rust"]);
    let limited = tagmap(&path, &["search", "lif", "--limit", "1"]);

    assert_eq!(String::from_utf8_lossy(&scoped.stdout).lines().count(), 1);
    assert!(String::from_utf8_lossy(&scoped.stdout).contains("[rust]"));
    assert_eq!(String::from_utf8_lossy(&limited.stdout).lines().count(), 1);
}

#[test]
fn empty_query_is_a_user_error() {
    let (_dir, path) = snapshot_file();

    let output = tagmap(&path, &["search", "   "]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot be empty"));
}

#[test]
fn unknown_tag_is_a_user_error() {
    let (_dir, path) = snapshot_file();

    let output = tagmap(&path, &["search", "lif", "--tag", "nope"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_snapshot_is_an_internal_error() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let output = tagmap(&dir.path().join("absent.json"), &["tree"]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn layout_prints_positions_as_json() {
    let (_dir, path) = snapshot_file();

    let output = tagmap(&path, &["layout", "--ticks", "20", "--seed", "4"]);

    assert!(output.status.success());
    let positions: Vec<serde_json::Value> =
        serde_json::from_slice(&output.stdout).expect("layout output should be JSON");
    assert_eq!(positions.len(), 3);
    assert_eq!(positions[0]["name"], "main");
    assert_eq!(positions[0]["x"], 4000.0);
    assert!(positions.iter().all(|p| p["y"].is_f64()));
}

#[test]
fn layout_is_reproducible_with_a_seed() {
    let (_dir, path) = snapshot_file();

    let first = tagmap(&path, &["layout", "--ticks", "10", "--seed", "9"]);
    let second = tagmap(&path, &["layout", "--ticks", "10", "--seed", "9"]);

    assert_eq!(first.stdout, second.stdout);
}
