// Refresh gate, listener coalescing and the document-event stream

use std::sync::{Arc, Mutex};

use structured_editor_wasm::editor::{DocumentEvent, Editor};
use structured_editor_wasm::errors::{EditorError, FatalError};
use structured_editor_wasm::listener::EventKind;
use structured_editor_wasm::models::Snapshot;
use structured_editor_wasm::serializer::{from_xml, to_xml};

fn body_editor() -> Editor {
    Editor::new(
        &Snapshot::element("doc")
            .with_child(Snapshot::element("p").with_child(Snapshot::text("one")))
            .with_child(Snapshot::element("p").with_child(Snapshot::text("two"))),
    )
}

#[test]
fn test_immediate_events_fire_inside_the_edit() {
    let mut ed = body_editor();
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&log);
    let sel = ed.listener_mut().selector("p");
    ed.listener_mut().add_handler(
        EventKind::AddedElement,
        sel,
        Box::new(move |_tree, _ev, _q| seen.lock().unwrap().push("added p".to_string())),
    );

    let root = ed.root();
    ed.insert_at(root, 2, &[Snapshot::element("p")]).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["added p"]);
}

#[test]
fn test_triggers_defer_until_refresh() {
    let mut ed = body_editor();
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    // every new p raises a renumber trigger; renumbering runs once per
    // refresh, not once per insertion
    let sel = ed.listener_mut().selector("p");
    ed.listener_mut().add_handler(
        EventKind::AddedElement,
        sel,
        Box::new(move |_tree, _ev, q| q.trigger("renumber")),
    );
    let seen = Arc::clone(&log);
    ed.listener_mut().add_trigger_handler(
        "renumber",
        Box::new(move |_tree, _q| seen.lock().unwrap().push("renumber".to_string())),
    );

    let root = ed.root();
    ed.suspend_refresh();
    ed.insert_at(root, 2, &[Snapshot::element("p")]).unwrap();
    ed.insert_at(root, 3, &[Snapshot::element("p")]).unwrap();
    assert!(log.lock().unwrap().is_empty(), "trigger must not run yet");

    ed.resume_refresh().unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["renumber"],
        "two insertions coalesce into one trigger pass"
    );
}

#[test]
fn test_unbalanced_resume_is_fatal() {
    let mut ed = body_editor();
    ed.suspend_refresh();
    ed.suspend_refresh();
    assert!(ed.resume_refresh().is_ok());
    assert!(ed.resume_refresh().is_ok());

    let err = ed.resume_refresh().unwrap_err();
    assert_eq!(err, EditorError::Fatal(FatalError::ImbalancedSuspendResume));
    assert!(ed.is_inconsistent());

    // all structural work is refused afterwards
    let root = ed.root();
    assert!(ed.insert_at(root, 0, &[Snapshot::element("p")]).is_err());
    assert!(ed.undo().is_err());
}

#[test]
fn test_document_event_stream() {
    let mut ed = body_editor();
    let log: Arc<Mutex<Vec<DocumentEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);
    ed.subscribe(Box::new(move |ev| seen.lock().unwrap().push(ev.clone())));

    let text = ed.resolve("0/0").unwrap();
    ed.set_text(text, "uno").unwrap();
    assert!(ed.has_unsaved_changes());

    ed.mark_saved();
    assert!(!ed.has_unsaved_changes());
    ed.mark_save_failed("offline");

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            DocumentEvent::Changed,
            DocumentEvent::Saved,
            DocumentEvent::Failed {
                reason: "offline".to_string()
            },
        ]
    );
}

#[test]
fn test_split_and_merge_round_trip() {
    let mut ed = body_editor();
    let p = ed.resolve("0").unwrap();
    let text = ed.resolve("0/0").unwrap();

    ed.split_at(p, text, 2).unwrap();
    assert_eq!(
        to_xml(ed.tree(), ed.root()).unwrap(),
        "<doc><p>on</p><p>e</p><p>two</p></doc>"
    );

    ed.undo().unwrap();
    assert_eq!(
        to_xml(ed.tree(), ed.root()).unwrap(),
        "<doc><p>one</p><p>two</p></doc>"
    );
}

#[test]
fn test_merge_after_removal() {
    let mut ed = Editor::new(
        &Snapshot::element("doc").with_child(
            Snapshot::element("p")
                .with_child(Snapshot::text("ab"))
                .with_child(Snapshot::element("hi"))
                .with_child(Snapshot::text("cd")),
        ),
    );
    let marker = ed.resolve("0/1").unwrap();
    ed.remove_nodes(&[marker]).unwrap();

    assert_eq!(
        to_xml(ed.tree(), ed.root()).unwrap(),
        "<doc><p>abcd</p></doc>",
        "text around the removed element must merge"
    );
}

#[test]
fn test_serializer_round_trip_through_editor() {
    let xml = r#"<dictionary xmlns:x="ns"><entry x:id="a1"><form>word</form></entry></dictionary>"#;
    let snapshot = from_xml(xml).unwrap();
    let ed = Editor::new(&snapshot);
    let out = to_xml(ed.tree(), ed.root()).unwrap();
    assert_eq!(out, xml, "load then export must reproduce the document");
}

#[test]
fn test_caret_survives_undo_via_paths() {
    let mut ed = body_editor();
    let text = ed.resolve("0/0").unwrap();
    ed.set_caret(text, 3).unwrap();

    ed.start_group("typing");
    ed.insert_text(text, 3, "!!").unwrap();
    ed.set_caret(text, 5).unwrap();
    ed.end_group();

    ed.undo().unwrap();
    assert_eq!(ed.caret(), Some((text, 3)));
    ed.redo().unwrap();
    assert_eq!(ed.caret(), Some((text, 5)));
}
