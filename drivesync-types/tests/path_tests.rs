use drivesync_types::RelPath;
use proptest::prelude::*;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn root_is_dot() {
    let root = RelPath::root();
    assert!(root.is_root());
    assert_eq!(root.as_str(), ".");
    assert_eq!(root.depth(), 0);
    assert_eq!(root.parent(), None);
    assert_eq!(root.name(), None);
    assert_eq!(root.components().count(), 0);
}

#[test]
fn join_from_root_has_no_prefix() {
    let path = RelPath::root().join("docs").unwrap();
    assert_eq!(path.as_str(), "docs");
    assert_eq!(path.depth(), 1);
}

#[test]
fn join_nested() {
    let path = RelPath::root()
        .join("a")
        .and_then(|p| p.join("b"))
        .and_then(|p| p.join("c.txt"))
        .unwrap();
    assert_eq!(path.as_str(), "a/b/c.txt");
    assert_eq!(path.depth(), 3);
    assert_eq!(path.name(), Some("c.txt"));
    assert_eq!(path.parent().unwrap().as_str(), "a/b");
}

#[test]
fn join_rejects_bad_components() {
    let root = RelPath::root();
    assert!(root.join("").is_err());
    assert!(root.join(".").is_err());
    assert!(root.join("..").is_err());
    assert!(root.join("a/b").is_err());
}

#[test]
fn parent_of_top_level_is_root() {
    let path = RelPath::parse("readme.txt").unwrap();
    assert!(path.parent().unwrap().is_root());
}

#[test]
fn parse_root_spellings() {
    assert!(RelPath::parse(".").unwrap().is_root());
    assert!(RelPath::parse("").unwrap().is_root());
}

#[test]
fn parse_rejects_empty_segments() {
    assert!(RelPath::parse("a//b").is_err());
    assert!(RelPath::parse("/a").is_err());
    assert!(RelPath::parse("a/../b").is_err());
}

#[test]
fn names_keep_their_case() {
    let upper = RelPath::parse("Docs").unwrap();
    let lower = RelPath::parse("docs").unwrap();
    assert_ne!(upper, lower);
}

#[test]
fn serde_roundtrip_validates() {
    let path = RelPath::parse("a/b").unwrap();
    let json = serde_json::to_string(&path).unwrap();
    assert_eq!(json, "\"a/b\"");
    let back: RelPath = serde_json::from_str(&json).unwrap();
    assert_eq!(back, path);
    assert!(serde_json::from_str::<RelPath>("\"a//b\"").is_err());
}

// ── Properties ───────────────────────────────────────────────────

fn component_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ .-]{1,12}".prop_filter("not a dot component", |s| s != "." && s != "..")
}

proptest! {
    /// Components survive a from_components/components round trip.
    #[test]
    fn components_roundtrip(parts in prop::collection::vec(component_strategy(), 0..6)) {
        let path = RelPath::from_components(&parts).unwrap();
        let back: Vec<&str> = path.components().collect();
        prop_assert_eq!(back, parts.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(path.depth(), parts.len());
    }

    /// Walking parents from any path reaches the root after `depth` steps.
    #[test]
    fn parent_chain_reaches_root(parts in prop::collection::vec(component_strategy(), 1..6)) {
        let mut path = RelPath::from_components(&parts).unwrap();
        let mut steps = 0;
        while let Some(parent) = path.parent() {
            path = parent;
            steps += 1;
        }
        prop_assert!(path.is_root());
        prop_assert_eq!(steps, parts.len());
    }
}
