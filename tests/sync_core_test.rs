// Path translation and mirror synchronization across the two trees

use structured_editor_wasm::location::{self, Path, PathTarget};
use structured_editor_wasm::mirror::MirrorUpdater;
use structured_editor_wasm::models::Snapshot;
use structured_editor_wasm::mutator::Mutator;

fn sense_doc() -> Mutator {
    // <entry><sense><def>water</def></sense><sense/></entry>
    Mutator::from_snapshot(
        &Snapshot::element("entry")
            .with_child(
                Snapshot::element("sense")
                    .with_attr("n", "1")
                    .with_child(Snapshot::element("def").with_child(Snapshot::text("water"))),
            )
            .with_child(Snapshot::element("sense").with_attr("n", "2")),
    )
}

#[test]
fn test_path_round_trip_on_semantic_tree() {
    let m = sense_doc();
    let tree = m.tree();
    let root = m.root();

    for node in tree.descendants(root) {
        let path = location::node_to_path(tree, root, node)
            .expect("every semantic node should have a path");
        let resolved = location::path_to_node(tree, root, &path)
            .expect("path should resolve")
            .expect("path should address an existing node");
        assert_eq!(resolved, PathTarget::Node(node), "round trip for {}", path);
    }
}

#[test]
fn test_same_path_addresses_both_trees() {
    let m = sense_doc();
    let mirror = MirrorUpdater::new(m.tree(), m.root());

    let path: Path = "0/0/0".parse().unwrap();
    let Some(PathTarget::Node(sem)) =
        location::path_to_node(m.tree(), m.root(), &path).unwrap()
    else {
        panic!("semantic path should resolve");
    };
    let Some(PathTarget::Node(pres)) =
        location::path_to_node(mirror.tree(), mirror.root(), &path).unwrap()
    else {
        panic!("presentation path should resolve");
    };
    assert_eq!(m.tree().value(sem), "water");
    assert_eq!(mirror.tree().value(pres), "water");
    assert_eq!(mirror.counterpart_of(sem), Some(pres));
}

#[test]
fn test_paths_skip_decorative_structure() {
    let m = sense_doc();
    let mut mirror = MirrorUpdater::new(m.tree(), m.root());
    let pres_root = mirror.root();

    // a phantom heading before everything, and a wrapper around the
    // first real sense
    mirror.insert_phantom(
        pres_root,
        0,
        &Snapshot::element("heading").with_child(Snapshot::text("Entry")),
    );
    let first_sense = mirror.tree().children(pres_root)[1];
    mirror.wrap_child(first_sense, "collapsible").unwrap();

    // the same ordinals still address the real nodes
    let path: Path = "0/0/0".parse().unwrap();
    let Some(PathTarget::Node(pres)) =
        location::path_to_node(mirror.tree(), mirror.root(), &path).unwrap()
    else {
        panic!("path should still resolve through the wrapper");
    };
    assert_eq!(mirror.tree().value(pres), "water");

    // and computing the path back ignores the phantoms
    let back = location::node_to_path(mirror.tree(), mirror.root(), pres).unwrap();
    assert_eq!(back.to_string(), "0/0/0");
}

#[test]
fn test_mirror_stays_isomorphic_through_edit_sequence() {
    let mut m = sense_doc();
    let mut mirror = MirrorUpdater::new(m.tree(), m.root());
    let root = m.root();

    // grow, edit, shrink
    let sense1 = m.tree().children(root)[0];
    let def = m.tree().children(sense1)[0];
    let text = m.tree().children(def)[0];

    m.insert_text(text, 5, "!", &mut mirror).unwrap();
    assert_eq!(mirror.real_projection(), m.tree().snapshot(root));

    m.set_attribute(sense1, None, "rev", Some("2024"), &mut mirror)
        .unwrap();
    assert_eq!(mirror.real_projection(), m.tree().snapshot(root));

    let gloss = m.build(&Snapshot::element("gloss").with_child(Snapshot::text("H2O")));
    m.insert_node_at(sense1, 1, gloss, &mut mirror).unwrap();
    assert_eq!(mirror.real_projection(), m.tree().snapshot(root));

    let (left, right) = m.split_at(sense1, text, 3, &mut mirror).unwrap();
    assert_eq!(mirror.real_projection(), m.tree().snapshot(root));
    assert_eq!(m.tree().children(root)[0], left);
    assert_eq!(m.tree().children(root)[1], right);

    m.delete_node(right, &mut mirror).unwrap();
    assert_eq!(mirror.real_projection(), m.tree().snapshot(root));
}

#[test]
fn test_attribute_paths() {
    let m = sense_doc();
    let tree = m.tree();
    let root = m.root();

    let path: Path = "0/@n".parse().unwrap();
    let target = location::path_to_node(tree, root, &path)
        .unwrap()
        .expect("attribute should resolve");
    let PathTarget::Attribute(node, name) = target else {
        panic!("expected an attribute target");
    };
    assert_eq!(name, "n");
    assert_eq!(tree.attribute(node, None, "n"), Some("1"));

    // absent attribute is an error, not a silent miss
    let missing: Path = "0/@zzz".parse().unwrap();
    assert!(location::path_to_node(tree, root, &missing).is_err());
}

#[test]
fn test_absent_path_is_none_not_error() {
    let m = sense_doc();
    let path: Path = "5/2".parse().unwrap();
    assert_eq!(m.path_to_node(&path).unwrap(), None);

    // but a malformed string never parses
    assert!("a/b".parse::<Path>().is_err());
    assert!("@x/1".parse::<Path>().is_err());
}
