use boxgraph_core::{
    Address, GraphError, HubEventKind, IntegrityError, PointerHubEvent, Propagation, Update,
};
use boxgraph_test_utils::{
    audio_file, create_audio_file, create_marker, create_region, create_root, create_track,
    fixed_uuid, init_tracing, marker, new_graph, project, region, track, FILE, MARKER,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn hub_recorder() -> (Rc<RefCell<Vec<PointerHubEvent>>>, impl FnMut(&PointerHubEvent)) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    (events, move |event: &PointerHubEvent| sink.borrow_mut().push(event.clone()))
}

#[test]
fn test_staging_emits_new_with_constructed_state() {
    init_tracing();
    let mut graph = new_graph();
    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&updates);
    graph.subscribe_to_all_updates(move |update| sink.borrow_mut().push(update.clone()));

    graph.begin_transaction();
    let root = create_root(&mut graph, fixed_uuid(1));
    let track_uuid = create_track(&mut graph, root, 3);
    graph.end_transaction();

    let updates = updates.borrow();
    assert_eq!(updates.len(), 2, "constructor writes are folded into New");
    let Update::New { uuid, name, .. } = &updates[1] else {
        panic!("expected New update");
    };
    assert_eq!(*uuid, track_uuid);
    assert_eq!(name, "Track");
    assert_eq!(
        graph.primitive(&Address::new(track_uuid, [track::INDEX])).and_then(|value| value.as_i32()),
        Some(3)
    );
}

#[test]
fn test_creation_index_increases() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let root_index = graph.find_box(project.root).unwrap().creation_index();
    let marker_index = graph.find_box(project.markers[1]).unwrap().creation_index();
    assert!(root_index < marker_index);
}

#[test]
#[should_panic(expected = "outside of a transaction")]
fn test_create_outside_transaction_panics() {
    let mut graph = new_graph();
    let _ = graph.create_box("Root", fixed_uuid(1), |_| {});
}

#[test]
#[should_panic(expected = "no primitive field")]
fn test_unknown_field_write_panics() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    graph.begin_transaction();
    graph.set_primitive(&Address::new(project.track, [99]), 1);
}

#[test]
#[should_panic(expected = "holds int32")]
fn test_primitive_kind_mismatch_panics() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    graph.begin_transaction();
    graph.set_primitive(&Address::new(project.track, [track::INDEX]), "three");
}

#[test]
#[should_panic(expected = "does not accept")]
fn test_pointer_to_rejecting_vertex_panics_on_flush() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    graph.begin_transaction();
    // a marker pointer aimed at the region box, which only accepts selections
    graph.set_pointer(
        &Address::new(project.markers[0], [marker::FILE]),
        Some(Address::of_box(project.region)),
    );
    graph.end_transaction();
}

#[test]
fn test_hub_notifications_are_deferred_and_net() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let markers_vertex = Address::new(project.file, [audio_file::MARKERS]);
    let (events, callback) = hub_recorder();
    graph.subscribe_pointer_hub(markers_vertex.clone(), Some(MARKER), callback);

    graph.begin_transaction();
    let added = create_marker(&mut graph, project.file, 30);
    assert!(events.borrow().is_empty(), "nothing before the transaction ends");
    graph.end_transaction();
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].kind, HubEventKind::Added);
    assert_eq!(events.borrow()[0].pointer, Address::new(added, [marker::FILE]));

    // detach and re-attach within one transaction: no net change
    let pointer = Address::new(added, [marker::FILE]);
    graph.begin_transaction();
    graph.set_pointer(&pointer, None);
    graph.set_pointer(&pointer, Some(markers_vertex.clone()));
    graph.end_transaction();
    assert_eq!(events.borrow().len(), 1);

    graph.begin_transaction();
    graph.unstage_box(added).unwrap();
    graph.end_transaction();
    assert_eq!(events.borrow().len(), 2);
    assert_eq!(events.borrow()[1].kind, HubEventKind::Removed);
}

#[test]
fn test_catchup_replays_existing_pointers_once() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let (events, callback) = hub_recorder();

    graph.begin_transaction();
    let second = create_region(&mut graph, project.track, project.file, 100);
    // subscribing mid-transaction replays the new region's pointer too
    graph.catchup_and_subscribe_pointer_hub(Address::of_box(project.file), Some(FILE), callback);
    assert_eq!(events.borrow().len(), 2);
    graph.end_transaction();

    let pointers: Vec<_> = events.borrow().iter().map(|event| event.pointer.clone()).collect();
    assert_eq!(pointers.len(), 2, "deferred notification is deduplicated");
    assert!(pointers.contains(&Address::new(second, [region::FILE])));
}

#[test]
fn test_vertex_subscriptions_respect_propagation() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let exact = Rc::new(RefCell::new(0));
    let children = Rc::new(RefCell::new(0));
    let exact_sink = Rc::clone(&exact);
    let children_sink = Rc::clone(&children);
    graph.subscribe_vertex_updates(
        Propagation::This,
        Address::of_box(project.track),
        move |_| *exact_sink.borrow_mut() += 1,
    );
    graph.subscribe_vertex_updates(
        Propagation::Children,
        Address::of_box(project.track),
        move |_| *children_sink.borrow_mut() += 1,
    );

    graph.begin_transaction();
    graph.set_primitive(&Address::new(project.track, [track::NAME]), "Drums");
    graph.set_primitive(&Address::new(project.track, [track::COLORS, 1]), 255);
    graph.end_transaction();

    assert_eq!(*exact.borrow(), 0);
    assert_eq!(*children.borrow(), 2);
}

#[test]
fn test_deletion_listener_fires_once() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let deleted = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&deleted);
    graph.subscribe_deletion(project.markers[0], move |uuid| sink.borrow_mut().push(uuid));

    graph.begin_transaction();
    graph.delete_box(project.markers[0]).unwrap();
    graph.end_transaction();
    assert_eq!(*deleted.borrow(), vec![project.markers[0]]);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let subscription = graph.subscribe_to_all_updates(move |_| *sink.borrow_mut() += 1);
    assert!(graph.unsubscribe(subscription));
    assert!(!graph.unsubscribe(subscription));

    graph.begin_transaction();
    graph.set_primitive(&Address::new(project.track, [track::MUTE]), true);
    graph.end_transaction();
    assert_eq!(*count.borrow(), 0);
}

#[test]
fn test_validation_reports_missing_requirements() {
    let mut graph = new_graph();
    graph.begin_transaction();
    let file = create_audio_file(&mut graph, fixed_uuid(2), "unused.wav");
    graph.end_transaction();
    assert_eq!(
        graph.validate_requirements(),
        Err(IntegrityError::MissingIncomingPointer {
            vertex: Address::of_box(file)
        })
    );
    assert!(!graph.is_box_valid(file));
}

#[test]
fn test_unstage_without_cascade_leaves_dangling_pointer() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    graph.begin_transaction();
    graph.unstage_box(project.file).unwrap();
    graph.end_transaction();

    let result = graph.verify_pointers();
    assert!(matches!(result, Err(IntegrityError::DanglingPointer { .. })));
    assert!(GraphError::from(result.unwrap_err()).is_integrity_violation());
}

#[test]
fn test_debug_path_names_nested_fields() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    let path = graph
        .find_address_to_debug_path(&Address::new(project.track, [track::COLORS, 2]))
        .unwrap();
    assert_eq!(path, format!("Track:{}/colors/blue", project.track));
}

#[test]
fn test_boxes_of_kind_and_edge_queries() {
    let mut graph = new_graph();
    let project = project(&mut graph);
    assert_eq!(graph.boxes_of_kind("Marker").len(), 2);
    assert_eq!(graph.incoming_edges_of_box(project.file).len(), 3);
    assert_eq!(
        graph.incoming_edges_of(&Address::new(project.file, [audio_file::MARKERS])).len(),
        2
    );
    assert_eq!(graph.outgoing_edges_of(project.region).len(), 2);
}
