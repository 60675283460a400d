//! Last-write-wins merge tests.

use serde_json::json;

use pose_sync::document::{Document, PoseSet};
use pose_sync::sync::{merge_documents, merge_with_report};

fn doc(sets: Vec<PoseSet>) -> Document {
    Document::new(sets)
}

fn ids(doc: &Document) -> Vec<&str> {
    doc.sets.iter().map(|s| s.id.as_str()).collect()
}

#[test]
fn merging_a_document_with_itself_is_a_no_op() {
    let d = doc(vec![
        PoseSet::new("a", "A").with_updated_at(10).with_tag("legs"),
        PoseSet::new("b", "B").with_field("cover", json!("b.jpg")),
    ]);
    assert_eq!(merge_documents(&d, &d), d);
}

#[test]
fn disjoint_documents_union_in_remote_then_local_order() {
    let local = doc(vec![
        PoseSet::new("l1", "L1").with_updated_at(1),
        PoseSet::new("l2", "L2").with_updated_at(1),
    ]);
    let remote = doc(vec![
        PoseSet::new("r1", "R1").with_updated_at(1),
        PoseSet::new("r2", "R2").with_updated_at(1),
    ]);

    let report = merge_with_report(&local, &remote);
    assert_eq!(ids(&report.document), vec!["r1", "r2", "l1", "l2"]);
    assert_eq!(report.local_only, 2);
    assert_eq!(report.remote_only, 2);
}

#[test]
fn newer_timestamp_wins_on_either_side() {
    let local = doc(vec![
        PoseSet::new("a", "local a").with_updated_at(200),
        PoseSet::new("b", "local b").with_updated_at(100),
    ]);
    let remote = doc(vec![
        PoseSet::new("a", "remote a").with_updated_at(150),
        PoseSet::new("b", "remote b").with_updated_at(300),
    ]);

    let report = merge_with_report(&local, &remote);
    let merged = &report.document;
    assert_eq!(merged.get("a").unwrap().name, "local a");
    assert_eq!(merged.get("b").unwrap().name, "remote b");
    assert_eq!(report.kept_local, 1);
    assert_eq!(report.kept_remote, 1);
}

#[test]
fn winner_replaces_the_whole_set() {
    let local = doc(vec![PoseSet::new("a", "local")
        .with_updated_at(200)
        .with_tag("mine")]);
    let remote = doc(vec![PoseSet::new("a", "remote")
        .with_updated_at(100)
        .with_tag("theirs")
        .with_field("folderId", json!("f-1"))]);

    let merged = merge_documents(&local, &remote);
    let a = merged.get("a").unwrap();
    assert_eq!(a.tags.iter().collect::<Vec<_>>(), vec!["mine"]);
    assert!(!a.extra.contains_key("folderId"));
}

#[test]
fn tie_prefers_local_fields_and_keeps_remote_extras() {
    let local = doc(vec![PoseSet::new("a", "local")
        .with_updated_at(100)
        .with_field("cover", json!("l.jpg"))]);
    let remote = doc(vec![PoseSet::new("a", "remote")
        .with_updated_at(100)
        .with_field("cover", json!("r.jpg"))
        .with_field("folderId", json!("f-1"))]);

    let report = merge_with_report(&local, &remote);
    let a = report.document.get("a").unwrap();
    assert_eq!(report.unioned, 1);
    assert_eq!(a.name, "local");
    assert_eq!(a.extra["cover"], json!("l.jpg"));
    assert_eq!(a.extra["folderId"], json!("f-1"));
}

#[test]
fn missing_timestamp_loses_to_any_stamped_edit() {
    let local = doc(vec![PoseSet::new("a", "unstamped")]);
    let remote = doc(vec![PoseSet::new("a", "stamped").with_updated_at(1)]);

    assert_eq!(merge_documents(&local, &remote).get("a").unwrap().name, "stamped");
    assert_eq!(merge_documents(&remote, &local).get("a").unwrap().name, "stamped");
}

#[test]
fn merge_picks_the_same_winners_in_both_directions() {
    let x = doc(vec![
        PoseSet::new("a", "x a").with_updated_at(5),
        PoseSet::new("b", "x b").with_updated_at(1),
        PoseSet::new("c", "x c").with_updated_at(1),
    ]);
    let y = doc(vec![
        PoseSet::new("b", "y b").with_updated_at(9),
        PoseSet::new("a", "y a").with_updated_at(2),
        PoseSet::new("d", "y d").with_updated_at(1),
    ]);

    let xy = merge_documents(&x, &y);
    let yx = merge_documents(&y, &x);
    for id in ["a", "b", "c", "d"] {
        assert_eq!(xy.get(id), yx.get(id), "set {id}");
    }
    assert_eq!(xy.len(), 4);
}
