use boxgraph_core::{Address, BoxEditing, Checksum, EditingConfig};
use boxgraph_test_utils::{
    audio_file, create_audio_file, create_marker, create_region, create_root, create_track,
    fixed_uuid, init_tracing, new_graph, project, track,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use uuid::Uuid;

fn name_of(editing: &BoxEditing, track_uuid: Uuid) -> String {
    editing
        .graph()
        .primitive(&Address::new(track_uuid, [track::NAME]))
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_owned()
}

struct Scene {
    track: Uuid,
    region: Uuid,
}

fn build_scene(editing: &mut BoxEditing) -> Scene {
    editing
        .modify(|graph| {
            let root = create_root(graph, fixed_uuid(1));
            let track = create_track(graph, root, 0);
            let file = create_audio_file(graph, fixed_uuid(2), "kick.wav");
            let region = create_region(graph, track, file, 0);
            create_marker(graph, file, 10);
            Scene { track, region }
        })
        .unwrap()
}

#[test]
fn test_undo_redo_walks_history() {
    init_tracing();
    let mut editing = BoxEditing::new(new_graph());
    let empty = editing.graph().checksum();

    let scene = build_scene(&mut editing);
    let built = editing.graph().checksum();
    editing
        .modify(|graph| graph.set_primitive(&Address::new(scene.track, [track::NAME]), "Bass"))
        .unwrap();
    let renamed = editing.graph().checksum();
    editing.modify(|graph| graph.delete_box(scene.region)).unwrap().unwrap();
    let deleted = editing.graph().checksum();
    assert_eq!(editing.graph().len(), 2);
    assert_eq!(editing.history_len(), 3);

    assert!(editing.undo().unwrap());
    assert_eq!(editing.graph().checksum(), renamed);
    assert_eq!(editing.graph().len(), 5);
    assert!(editing.undo().unwrap());
    assert_eq!(editing.graph().checksum(), built);
    assert_eq!(name_of(&editing, scene.track), "");
    assert!(editing.undo().unwrap());
    assert_eq!(editing.graph().checksum(), empty);
    assert!(editing.graph().is_empty());
    assert!(!editing.undo().unwrap());

    assert!(editing.redo().unwrap());
    assert_eq!(editing.graph().checksum(), built);
    assert!(editing.redo().unwrap());
    assert_eq!(name_of(&editing, scene.track), "Bass");
    assert!(editing.redo().unwrap());
    assert_eq!(editing.graph().checksum(), deleted);
    assert!(!editing.redo().unwrap());
    assert!(editing.graph().validate_requirements().is_ok());
}

#[test]
fn test_created_then_deleted_box_leaves_no_history() {
    let mut editing = BoxEditing::new(new_graph());
    editing.modify(|graph| create_root(graph, fixed_uuid(1))).unwrap();
    let before = editing.history_len();

    editing
        .modify(|graph| {
            let file = create_audio_file(graph, Uuid::new_v4(), "scratch.wav");
            create_marker(graph, file, 5);
            graph.delete_box(file)
        })
        .unwrap()
        .unwrap();
    assert_eq!(editing.history_len(), before);
    assert_eq!(editing.graph().len(), 1);
}

#[test]
fn test_round_trip_writes_are_not_recorded() {
    let mut editing = BoxEditing::new(new_graph());
    let scene = build_scene(&mut editing);
    let name = Address::new(scene.track, [track::NAME]);
    editing
        .modify(|graph| {
            graph.set_primitive(&name, "temporary");
            graph.set_primitive(&name, "");
        })
        .unwrap();
    assert_eq!(editing.history_len(), 1);
}

#[test]
fn test_modify_reports_integrity_violation_but_keeps_history() {
    let mut editing = BoxEditing::new(new_graph());
    let result = editing.modify(|graph| create_audio_file(graph, fixed_uuid(2), "lonely.wav"));
    assert!(result.unwrap_err().is_integrity_violation());
    assert!(editing.can_undo());
    assert!(editing.undo().unwrap());
    assert!(editing.graph().is_empty());
}

#[test]
fn test_saved_state_tracking() {
    let mut editing = BoxEditing::new(new_graph());
    assert!(!editing.has_unsaved_changes());

    let scene = build_scene(&mut editing);
    assert!(editing.has_unsaved_changes());
    editing.mark_saved();
    assert!(!editing.has_unsaved_changes());

    editing.undo().unwrap();
    assert!(editing.has_unsaved_changes());
    editing.redo().unwrap();
    assert!(!editing.has_unsaved_changes());

    // branching off below the saved entry splices it out of history
    editing.undo().unwrap();
    editing
        .modify(|graph| create_root(graph, fixed_uuid(1)))
        .unwrap();
    assert_eq!(editing.saved_index(), None);
    editing.undo().unwrap();
    assert!(editing.has_unsaved_changes(), "saved state is gone for good");
    assert!(!editing.graph().contains(scene.track));

    editing.mark_saved();
    assert!(!editing.has_unsaved_changes());
}

#[test]
fn test_pending_modifications_group_into_one_entry() {
    let mut editing = BoxEditing::new(new_graph());
    let scene = build_scene(&mut editing);
    let name = Address::new(scene.track, [track::NAME]);
    for label in ["a", "b", "c"] {
        editing
            .modify_unmarked(|graph| graph.set_primitive(&name, label))
            .unwrap();
    }
    assert!(editing.has_unsaved_changes());
    assert!(!editing.can_redo());
    editing.mark();
    assert_eq!(editing.history_len(), 2);

    assert!(editing.undo().unwrap());
    assert_eq!(name_of(&editing, scene.track), "");
}

#[test]
fn test_approve_commits_streamed_changes() {
    let mut editing = BoxEditing::new(new_graph());
    let scene = build_scene(&mut editing);
    let volume = Address::new(scene.track, [track::VOLUME]);

    editing.begin_modification();
    assert!(editing.is_modifying());
    for step in 1..=9 {
        editing.graph_mut().set_primitive(&volume, step as f32 / 10.0);
    }
    editing.approve().unwrap();
    assert!(!editing.is_modifying());
    assert_eq!(editing.history_len(), 2);

    editing.undo().unwrap();
    let restored = editing.graph().primitive(&volume).and_then(|value| value.as_f32());
    assert_eq!(restored, Some(1.0));
}

#[test]
fn test_revert_rolls_back_without_history() {
    let mut editing = BoxEditing::new(new_graph());
    let scene = build_scene(&mut editing);
    let before = editing.graph().checksum();

    editing.begin_modification();
    editing
        .graph_mut()
        .set_primitive(&Address::new(scene.track, [track::NAME]), "draft");
    let file = fixed_uuid(2);
    create_marker(editing.graph_mut(), file, 99);
    editing.revert().unwrap();

    assert_eq!(editing.graph().checksum(), before);
    assert_eq!(editing.history_len(), 1);
    assert!(!editing.can_redo());
    assert_eq!(
        editing
            .graph()
            .incoming_edges_of(&Address::new(file, [audio_file::MARKERS]))
            .len(),
        1
    );
}

#[test]
#[should_panic(expected = "cannot modify while a modification is in progress")]
fn test_modify_during_process_panics() {
    let mut editing = BoxEditing::new(new_graph());
    editing.begin_modification();
    let _ = editing.modify(|_| ());
}

#[test]
#[should_panic(expected = "no modification in progress")]
fn test_approve_without_process_panics() {
    let mut editing = BoxEditing::new(new_graph());
    let _ = editing.approve();
}

#[test]
fn test_history_limit_drops_oldest_entries() {
    let config = EditingConfig::new().with_history_limit(2);
    let mut editing = BoxEditing::with_config(new_graph(), config);
    let scene = build_scene(&mut editing);
    let name = Address::new(scene.track, [track::NAME]);
    editing.modify(|graph| graph.set_primitive(&name, "one")).unwrap();
    editing.modify(|graph| graph.set_primitive(&name, "two")).unwrap();
    assert_eq!(editing.history_len(), 2);

    assert!(editing.undo().unwrap());
    assert!(editing.undo().unwrap());
    assert!(!editing.undo().unwrap());
    assert_eq!(editing.graph().len(), 5, "the scene itself fell off the history");
}

#[test]
fn test_disabled_session_records_nothing() {
    let mut editing = BoxEditing::new(new_graph());
    let scene = build_scene(&mut editing);
    editing.disable();
    editing
        .modify(|graph| graph.set_primitive(&Address::new(scene.track, [track::MUTE]), true))
        .unwrap();
    assert!(!editing.undo().unwrap());
    editing.enable();
    assert_eq!(editing.history_len(), 1);
}

#[test]
fn test_clear_history_keeps_graph() {
    let mut editing = BoxEditing::new(new_graph());
    build_scene(&mut editing);
    editing.mark_saved();
    editing.clear_history();
    assert!(!editing.can_undo());
    assert!(!editing.has_unsaved_changes());
    assert_eq!(editing.graph().len(), 5);
}

#[derive(Debug, Clone)]
enum Edit {
    Rename(String),
    Volume(i32),
    AddRegion(i32),
    DeleteRegion,
    AddMarker(i32),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[a-z]{0,6}".prop_map(Edit::Rename),
        (0..100i32).prop_map(Edit::Volume),
        (0..1000i32).prop_map(Edit::AddRegion),
        Just(Edit::DeleteRegion),
        (0..1000i32).prop_map(Edit::AddMarker),
    ]
}

proptest! {
    #[test]
    fn prop_undo_redo_restores_every_state(edits in proptest::collection::vec(edit_strategy(), 1..12)) {
        let mut graph = new_graph();
        let project = project(&mut graph);
        let mut editing = BoxEditing::new(graph);
        let mut states: Vec<Checksum> = vec![editing.graph().checksum()];

        for edit in edits {
            editing
                .modify(|graph| match edit {
                    Edit::Rename(name) => {
                        graph.set_primitive(&Address::new(project.track, [track::NAME]), name);
                    }
                    Edit::Volume(volume) => {
                        graph.set_primitive(&Address::new(project.track, [track::VOLUME]), volume as f32);
                    }
                    Edit::AddRegion(position) if graph.contains(project.file) => {
                        create_region(graph, project.track, project.file, position);
                    }
                    Edit::AddMarker(position) if graph.contains(project.file) => {
                        create_marker(graph, project.file, position);
                    }
                    Edit::DeleteRegion => {
                        let region = graph.boxes_of_kind("Region").first().map(|found| found.uuid());
                        if let Some(region) = region {
                            graph.delete_box(region).unwrap();
                        }
                    }
                    Edit::AddRegion(_) | Edit::AddMarker(_) => {}
                })
                .unwrap();
            if editing.history_index() == states.len() {
                states.push(editing.graph().checksum());
            }
        }

        for expected in states.iter().rev().skip(1) {
            prop_assert!(editing.undo().unwrap());
            prop_assert_eq!(&editing.graph().checksum(), expected);
        }
        prop_assert!(!editing.undo().unwrap());
        for expected in states.iter().skip(1) {
            prop_assert!(editing.redo().unwrap());
            prop_assert_eq!(&editing.graph().checksum(), expected);
        }
        prop_assert!(!editing.can_redo());
    }
}
