use boxgraph_core::{Address, BoxGraph, DecodeError, GraphError, PrimitiveValue};
use boxgraph_test_utils::{
    audio_file, create_audio_file, create_bus, create_region, create_root, create_send,
    create_track, fixed_uuid, init_tracing, new_graph, project, root, track,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::Value;

fn rich_graph() -> BoxGraph {
    let mut graph = new_graph();
    let project = project(&mut graph);
    graph.begin_transaction();
    graph.set_primitive(&Address::new(project.root, [root::TITLE]), "Demo ✓");
    graph.set_primitive(&Address::new(project.track, [track::NAME]), "Drums");
    graph.set_primitive(&Address::new(project.track, [track::VOLUME]), 0.75_f32);
    graph.set_primitive(&Address::new(project.track, [track::MUTE]), true);
    graph.set_primitive(&Address::new(project.track, [track::COLORS, 0]), 200);
    graph.set_primitive(&Address::new(project.file, [audio_file::DIGEST]), vec![0xde_u8, 0xad, 0xbe, 0xef]);
    let bus = create_bus(&mut graph, "reverb");
    create_send(&mut graph, project.track, bus);
    graph.end_transaction();
    graph
}

#[test]
fn test_binary_round_trip_is_byte_identical() {
    init_tracing();
    let graph = rich_graph();
    let bytes = graph.to_bytes();

    let mut restored = new_graph();
    restored.load_bytes(&bytes).unwrap();
    assert_eq!(restored.to_bytes(), bytes);
    assert_eq!(restored.checksum(), graph.checksum());
    assert_eq!(restored.len(), graph.len());
    assert!(restored.validate_requirements().is_ok());
    assert!(restored.verify_pointers().is_ok());
}

#[test]
fn test_loaded_graph_restores_edges_and_indices() {
    let graph = rich_graph();
    let mut restored = new_graph();
    restored.load_bytes(&graph.to_bytes()).unwrap();

    for original in graph.boxes() {
        let loaded = restored.find_box(original.uuid()).unwrap();
        assert_eq!(loaded.creation_index(), original.creation_index());
        assert_eq!(
            restored.outgoing_edges_of(original.uuid()),
            graph.outgoing_edges_of(original.uuid())
        );
    }

    // new boxes continue after the highest loaded index
    let highest = graph.boxes().map(|graph_box| graph_box.creation_index()).max().unwrap();
    restored.begin_transaction();
    let root = graph.boxes_of_kind("Root")[0].uuid();
    let added = create_track(&mut restored, root, 1);
    restored.end_transaction();
    assert!(restored.find_box(added).unwrap().creation_index() > highest);
}

#[test]
fn test_json_round_trip_matches_binary() {
    let graph = rich_graph();
    let text = serde_json::to_string_pretty(&graph.to_json()).unwrap();
    let document: Value = serde_json::from_str(&text).unwrap();

    let mut restored = new_graph();
    restored.load_json(&document).unwrap();
    assert_eq!(restored.to_json(), graph.to_json());
    assert_eq!(restored.to_bytes(), graph.to_bytes());
}

#[test]
fn test_json_round_trip_keeps_non_finite_floats() {
    for volume in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
        let mut graph = new_graph();
        let project = project(&mut graph);
        let address = Address::new(project.track, [track::VOLUME]);
        graph.begin_transaction();
        graph.set_primitive(&address, volume);
        graph.end_transaction();

        let document = graph.to_json();
        assert!(document[project.track.to_string()]["fields"][track::VOLUME.to_string()].is_string());

        let mut restored = new_graph();
        restored.load_json(&document).unwrap();
        let loaded = restored.primitive(&address).and_then(PrimitiveValue::as_f32).unwrap();
        assert_eq!(loaded.to_bits(), volume.to_bits());
        assert_eq!(restored.to_bytes(), graph.to_bytes());
    }
}

#[test]
fn test_json_document_shape() {
    let mut graph = new_graph();
    graph.begin_transaction();
    create_root(&mut graph, fixed_uuid(1));
    graph.end_transaction();

    let document = graph.to_json();
    let entry = &document[fixed_uuid(1).to_string()];
    assert_eq!(entry["name"], "Root");
    assert_eq!(entry["index"], 0);
    assert!(entry["fields"].is_object());
}

#[test]
fn test_checksum_ignores_creation_order() {
    let mut forward = new_graph();
    forward.begin_transaction();
    create_root(&mut forward, fixed_uuid(1));
    create_audio_file(&mut forward, fixed_uuid(2), "a.wav");
    forward.end_transaction();

    let mut backward = new_graph();
    backward.begin_transaction();
    create_audio_file(&mut backward, fixed_uuid(2), "a.wav");
    create_root(&mut backward, fixed_uuid(1));
    backward.end_transaction();

    assert_eq!(forward.checksum(), backward.checksum());
    assert_ne!(forward.to_bytes(), backward.to_bytes());

    backward.begin_transaction();
    backward.set_primitive(&Address::new(fixed_uuid(2), [audio_file::NAME]), "b.wav");
    backward.end_transaction();
    assert_ne!(forward.checksum(), backward.checksum());
}

#[test]
fn test_truncated_input_leaves_graph_empty() {
    let bytes = rich_graph().to_bytes();
    let mut restored = new_graph();
    let result = restored.load_bytes(&bytes[..bytes.len() - 3]);
    assert!(matches!(result, Err(GraphError::Decode(DecodeError::UnexpectedEof { .. }))));
    assert!(restored.is_empty());
}

#[test]
fn test_unknown_kind_in_json_is_rejected() {
    let mut document = rich_graph().to_json();
    let first = document.as_object_mut().unwrap().values_mut().next().unwrap();
    first["name"] = Value::from("Ghost");

    let mut restored = new_graph();
    let result = restored.load_json(&document);
    assert!(matches!(result, Err(GraphError::UnknownBoxKind(name)) if name == "Ghost"));
    assert!(restored.is_empty());
}

#[test]
fn test_loading_twice_reports_clash() {
    let bytes = rich_graph().to_bytes();
    let mut restored = new_graph();
    restored.load_bytes(&bytes).unwrap();
    let before = restored.len();
    assert!(matches!(restored.load_bytes(&bytes), Err(GraphError::DuplicateBox(_))));
    assert_eq!(restored.len(), before);
}

proptest! {
    #[test]
    fn prop_random_documents_round_trip(
        tracks in proptest::collection::vec(("[ -~]{0,12}", any::<bool>(), -1.0f32..2.0, 0..4usize), 1..6),
    ) {
        let mut graph = new_graph();
        graph.begin_transaction();
        let root = create_root(&mut graph, fixed_uuid(1));
        let file = create_audio_file(&mut graph, fixed_uuid(2), "shared.wav");
        for (index, (name, mute, volume, regions)) in tracks.iter().enumerate() {
            let track_uuid = create_track(&mut graph, root, index as i32);
            graph.set_primitive(&Address::new(track_uuid, [track::NAME]), name.as_str());
            graph.set_primitive(&Address::new(track_uuid, [track::MUTE]), *mute);
            graph.set_primitive(&Address::new(track_uuid, [track::VOLUME]), *volume);
            for position in 0..*regions {
                create_region(&mut graph, track_uuid, file, position as i32 * 100);
            }
        }
        graph.end_transaction();

        let bytes = graph.to_bytes();
        let mut from_bytes = new_graph();
        from_bytes.load_bytes(&bytes).unwrap();
        prop_assert_eq!(from_bytes.to_bytes(), bytes);

        let mut from_json = new_graph();
        from_json.load_json(&graph.to_json()).unwrap();
        prop_assert_eq!(from_json.checksum(), graph.checksum());
    }
}
