use chrono::Utc;
use drivesync_sync::plan::{creation_cmp, sort_for_creation, sort_for_deletion};
use drivesync_sync::{ChangeSet, Direction, LocalEntry, PullPlan, PushPlan, RemoteEntry, RemoteNode};
use drivesync_types::{NodeId, RelPath};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

fn local(path: &str, is_dir: bool) -> LocalEntry {
    LocalEntry {
        abs_path: PathBuf::from(path),
        rel_path: RelPath::parse(path).unwrap(),
        is_dir,
        size: 0,
        modified_at: Utc::now(),
    }
}

fn remote(path: &str, is_dir: bool) -> RemoteEntry {
    let rel_path = RelPath::parse(path).unwrap();
    RemoteEntry {
        node: RemoteNode {
            id: NodeId::new(format!("id-{path}")),
            name: rel_path.name().unwrap_or_default().to_string(),
            parents: vec![NodeId::from("root")],
            checksum: None,
            is_dir,
            size: 0,
            modified_at: None,
            properties: BTreeMap::new(),
        },
        rel_path,
    }
}

fn rel(path: &str) -> RelPath {
    RelPath::parse(path).unwrap()
}

fn local_paths(entries: &[LocalEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.rel_path.as_str()).collect()
}

fn remote_paths(entries: &[RemoteEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.rel_path.as_str()).collect()
}

// ── Ordering ────────────────────────────────────────────────────

#[test]
fn shallower_paths_come_first() {
    assert_eq!(creation_cmp(&rel("z"), &rel("a/b")), Ordering::Less);
    assert_eq!(creation_cmp(&rel("a/b"), &rel("a")), Ordering::Greater);
    assert_eq!(creation_cmp(&rel("a"), &rel("b")), Ordering::Less);
    assert_eq!(creation_cmp(&rel("a"), &rel("a")), Ordering::Equal);
}

#[test]
fn nested_dirs_are_created_parents_first() {
    let mut dirs = vec![local("a/b/c", true), local("a", true), local("a/b", true)];
    sort_for_creation(&mut dirs);
    assert_eq!(local_paths(&dirs), vec!["a", "a/b", "a/b/c"]);
}

#[test]
fn deletion_is_reverse_of_creation() {
    let mut entries = vec![
        remote("x", true),
        remote("x/y", true),
        remote("x/y/z.txt", false),
        remote("w.txt", false),
    ];
    sort_for_deletion(&mut entries);
    assert_eq!(remote_paths(&entries), vec!["x/y/z.txt", "x/y", "x", "w.txt"]);
}

// ── Plans ───────────────────────────────────────────────────────

#[test]
fn push_plan_takes_remote_side_changes() {
    let changes = ChangeSet {
        missing_remote_dirs: vec![local("empty", true), local("docs", true)],
        missing_remote_files: vec![local("docs/a.txt", false)],
        extraneous_local: vec![local("empty", true), local("docs", true), local("docs/a.txt", false)],
        extraneous_remote: vec![remote("old", true), remote("old/x", false)],
        ..Default::default()
    };

    let plan = PushPlan::push(changes.clone(), false);
    assert_eq!(plan.direction, Direction::Push);
    assert_eq!(local_paths(&plan.create_dirs), vec!["docs", "empty"]);
    assert_eq!(local_paths(&plan.create_files), vec!["docs/a.txt"]);
    assert!(plan.delete.is_empty());
    assert_eq!(plan.len(), 3);

    let plan = PushPlan::push(changes, true);
    assert_eq!(remote_paths(&plan.delete), vec!["old/x", "old"]);
    assert_eq!(plan.len(), 5);
}

#[test]
fn pull_plan_takes_local_side_changes() {
    let changes = ChangeSet {
        missing_local_dirs: vec![remote("d", true)],
        missing_local_files: vec![remote("d/f", false)],
        extraneous_remote: vec![remote("d", true), remote("d/f", false)],
        extraneous_local: vec![local("gone.txt", false)],
        ..Default::default()
    };

    let plan = PullPlan::pull(changes, true);
    assert_eq!(plan.direction, Direction::Pull);
    assert_eq!(remote_paths(&plan.create_dirs), vec!["d"]);
    assert_eq!(remote_paths(&plan.create_files), vec!["d/f"]);
    assert_eq!(local_paths(&plan.delete), vec!["gone.txt"]);
}

#[test]
fn empty_changes_give_empty_plan() {
    let plan = PushPlan::push(ChangeSet::default(), true);
    assert!(plan.is_empty());
    assert_eq!(Direction::Push.to_string(), "push");
    assert_eq!(Direction::Pull.to_string(), "pull");
}

// ── Property tests ──────────────────────────────────────────────

fn arb_path() -> impl Strategy<Value = RelPath> {
    prop::collection::vec("[a-c]{1,2}", 1..4)
        .prop_map(|parts| RelPath::from_components(parts).unwrap())
}

proptest! {
    #[test]
    fn every_parent_precedes_its_children(paths in prop::collection::btree_set(arb_path(), 0..24)) {
        // Close the set under parents, as a real tree would be.
        let mut all = std::collections::BTreeSet::new();
        for path in paths {
            let mut current = Some(path);
            while let Some(p) = current {
                if p.is_root() {
                    break;
                }
                current = p.parent();
                all.insert(p);
            }
        }

        let mut entries: Vec<LocalEntry> = all.iter().map(|p| local(p.as_str(), true)).collect();
        sort_for_creation(&mut entries);
        let position: BTreeMap<&RelPath, usize> =
            entries.iter().enumerate().map(|(i, e)| (&e.rel_path, i)).collect();
        for entry in &entries {
            if let Some(parent) = entry.rel_path.parent().filter(|p| !p.is_root()) {
                prop_assert!(position[&parent] < position[&entry.rel_path]);
            }
        }

        let mut reversed = entries.clone();
        sort_for_deletion(&mut reversed);
        reversed.reverse();
        prop_assert_eq!(local_paths(&entries), local_paths(&reversed));
    }
}
