//! Testing utilities for the box graph workspace
//!
//! A small document domain used by the engine's integration tests:
//! - `Root` owns tracks through its `tracks` field
//! - `Track` must point at a root; regions and sends hang off its fields
//! - `Region` must point at a track field and at an `AudioFile`
//! - `AudioFile` is a preserved resource that must be referenced; `Marker`s
//!   hang off its `markers` field
//! - `Bus` is a shared resource whose `inputs` field needs a `Send`
//! - `Selection` is ephemeral and must point at a region
//!
//! Plus a tracing initializer for tests.

#![allow(missing_docs)]

use boxgraph_core::{Address, BoxGraph, FieldSpec, GraphBox, PointerRules, PointerType, ResourceKind};
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

pub const TRACK: PointerType = PointerType::new(1);
pub const REGION: PointerType = PointerType::new(2);
pub const FILE: PointerType = PointerType::new(3);
pub const MARKER: PointerType = PointerType::new(4);
pub const BUS: PointerType = PointerType::new(5);
pub const SEND: PointerType = PointerType::new(6);
pub const SELECTION: PointerType = PointerType::new(7);

pub mod root {
    use boxgraph_core::FieldKey;
    pub const TRACKS: FieldKey = 0;
    pub const TITLE: FieldKey = 1;
}

pub mod track {
    use boxgraph_core::FieldKey;
    pub const ROOT: FieldKey = 0;
    pub const INDEX: FieldKey = 1;
    pub const REGIONS: FieldKey = 2;
    pub const SENDS: FieldKey = 3;
    pub const NAME: FieldKey = 4;
    pub const MUTE: FieldKey = 5;
    pub const VOLUME: FieldKey = 6;
    pub const COLORS: FieldKey = 7;
    pub const KIND: FieldKey = 8;
}

pub mod region {
    use boxgraph_core::FieldKey;
    pub const TRACK: FieldKey = 0;
    pub const FILE: FieldKey = 1;
    pub const POSITION: FieldKey = 2;
}

pub mod audio_file {
    use boxgraph_core::FieldKey;
    pub const NAME: FieldKey = 0;
    pub const MARKERS: FieldKey = 1;
    pub const DIGEST: FieldKey = 2;
}

pub mod marker {
    use boxgraph_core::FieldKey;
    pub const FILE: FieldKey = 0;
    pub const POSITION: FieldKey = 1;
}

pub mod bus {
    use boxgraph_core::FieldKey;
    pub const INPUTS: FieldKey = 0;
    pub const LABEL: FieldKey = 1;
}

pub mod send {
    use boxgraph_core::FieldKey;
    pub const TRACK: FieldKey = 0;
    pub const BUS: FieldKey = 1;
    pub const AMOUNT: FieldKey = 2;
}

pub mod selection {
    use boxgraph_core::FieldKey;
    pub const TARGET: FieldKey = 0;
}

/// Box factory of the fixture domain
pub fn factory(name: &str, uuid: Uuid) -> Option<GraphBox> {
    let builder = match name {
        "Root" => GraphBox::builder("Root", uuid)
            .field(
                root::TRACKS,
                FieldSpec::object("tracks", []).with_rules(PointerRules::accepting([TRACK])),
            )
            .field(root::TITLE, FieldSpec::primitive("title", "")),
        "Track" => GraphBox::builder("Track", uuid)
            .field(track::ROOT, FieldSpec::pointer("root", TRACK, true))
            .field(track::INDEX, FieldSpec::primitive("index", 0))
            .field(
                track::REGIONS,
                FieldSpec::object("regions", []).with_rules(PointerRules::accepting([REGION])),
            )
            .field(
                track::SENDS,
                FieldSpec::object("sends", []).with_rules(PointerRules::accepting([SEND])),
            )
            .field(track::NAME, FieldSpec::primitive("name", ""))
            .field(track::MUTE, FieldSpec::primitive("mute", false))
            .field(track::VOLUME, FieldSpec::primitive("volume", 1.0_f32))
            .field(
                track::COLORS,
                FieldSpec::array(
                    "colors",
                    [
                        FieldSpec::primitive("red", 0),
                        FieldSpec::primitive("green", 0),
                        FieldSpec::primitive("blue", 0),
                    ],
                ),
            )
            .field(track::KIND, FieldSpec::primitive("kind", 0)),
        "Region" => GraphBox::builder("Region", uuid)
            .rules(PointerRules::accepting([SELECTION]))
            .field(region::TRACK, FieldSpec::pointer("track", REGION, true))
            .field(region::FILE, FieldSpec::pointer("file", FILE, true))
            .field(region::POSITION, FieldSpec::primitive("position", 0)),
        "AudioFile" => GraphBox::builder("AudioFile", uuid)
            .rules(PointerRules::accepting([FILE]).mandatory())
            .resource(ResourceKind::Preserved)
            .field(audio_file::NAME, FieldSpec::primitive("name", ""))
            .field(
                audio_file::MARKERS,
                FieldSpec::object("markers", []).with_rules(PointerRules::accepting([MARKER])),
            )
            .field(audio_file::DIGEST, FieldSpec::primitive("digest", Vec::<u8>::new())),
        "Marker" => GraphBox::builder("Marker", uuid)
            .field(marker::FILE, FieldSpec::pointer("file", MARKER, true))
            .field(marker::POSITION, FieldSpec::primitive("position", 0)),
        "Bus" => GraphBox::builder("Bus", uuid)
            .resource(ResourceKind::Shared)
            .field(
                bus::INPUTS,
                FieldSpec::object("inputs", []).with_rules(PointerRules::accepting([BUS]).mandatory()),
            )
            .field(bus::LABEL, FieldSpec::primitive("label", "")),
        "Send" => GraphBox::builder("Send", uuid)
            .field(send::TRACK, FieldSpec::pointer("track", SEND, true))
            .field(send::BUS, FieldSpec::pointer("bus", BUS, true))
            .field(send::AMOUNT, FieldSpec::primitive("amount", 0.5_f32)),
        "Selection" => GraphBox::builder("Selection", uuid)
            .ephemeral()
            .field(selection::TARGET, FieldSpec::pointer("target", SELECTION, true)),
        _ => return None,
    };
    Some(builder.build())
}

/// Empty graph over the fixture domain
#[must_use]
pub fn new_graph() -> BoxGraph {
    BoxGraph::new(factory)
}

/// Deterministic UUID
#[must_use]
pub fn fixed_uuid(n: u8) -> Uuid {
    Uuid::from_bytes([n; 16])
}

/// Install a test subscriber driven by `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// Builders below expect an open transaction on `graph`.

pub fn create_root(graph: &mut BoxGraph, uuid: Uuid) -> Uuid {
    graph
        .create_box("Root", uuid, |_| {})
        .expect("root staged")
}

pub fn create_track(graph: &mut BoxGraph, root_uuid: Uuid, index: i32) -> Uuid {
    graph
        .create_box("Track", Uuid::new_v4(), |graph_box| {
            graph_box.set_pointer(&[track::ROOT], Some(Address::new(root_uuid, [root::TRACKS])));
            graph_box.set_primitive(&[track::INDEX], index);
        })
        .expect("track staged")
}

pub fn create_audio_file(graph: &mut BoxGraph, uuid: Uuid, name: &str) -> Uuid {
    graph
        .create_box("AudioFile", uuid, |graph_box| {
            graph_box.set_primitive(&[audio_file::NAME], name);
        })
        .expect("audio file staged")
}

pub fn create_region(graph: &mut BoxGraph, track_uuid: Uuid, file_uuid: Uuid, position: i32) -> Uuid {
    graph
        .create_box("Region", Uuid::new_v4(), |graph_box| {
            graph_box.set_pointer(&[region::TRACK], Some(Address::new(track_uuid, [track::REGIONS])));
            graph_box.set_pointer(&[region::FILE], Some(Address::of_box(file_uuid)));
            graph_box.set_primitive(&[region::POSITION], position);
        })
        .expect("region staged")
}

pub fn create_marker(graph: &mut BoxGraph, file_uuid: Uuid, position: i32) -> Uuid {
    graph
        .create_box("Marker", Uuid::new_v4(), |graph_box| {
            graph_box.set_pointer(&[marker::FILE], Some(Address::new(file_uuid, [audio_file::MARKERS])));
            graph_box.set_primitive(&[marker::POSITION], position);
        })
        .expect("marker staged")
}

pub fn create_bus(graph: &mut BoxGraph, label: &str) -> Uuid {
    graph
        .create_box("Bus", Uuid::new_v4(), |graph_box| {
            graph_box.set_primitive(&[bus::LABEL], label);
        })
        .expect("bus staged")
}

pub fn create_send(graph: &mut BoxGraph, track_uuid: Uuid, bus_uuid: Uuid) -> Uuid {
    graph
        .create_box("Send", Uuid::new_v4(), |graph_box| {
            graph_box.set_pointer(&[send::TRACK], Some(Address::new(track_uuid, [track::SENDS])));
            graph_box.set_pointer(&[send::BUS], Some(Address::new(bus_uuid, [bus::INPUTS])));
        })
        .expect("send staged")
}

pub fn create_selection(graph: &mut BoxGraph, target: Uuid) -> Uuid {
    graph
        .create_box("Selection", Uuid::new_v4(), |graph_box| {
            graph_box.set_pointer(&[selection::TARGET], Some(Address::of_box(target)));
        })
        .expect("selection staged")
}

/// A project with one track holding one region on an audio file with two
/// markers
#[derive(Debug, Clone, Copy)]
pub struct Project {
    pub root: Uuid,
    pub track: Uuid,
    pub file: Uuid,
    pub region: Uuid,
    pub markers: [Uuid; 2],
}

/// Build a [`Project`] in its own transaction
pub fn project(graph: &mut BoxGraph) -> Project {
    graph.begin_transaction();
    let root = create_root(graph, fixed_uuid(1));
    let track = create_track(graph, root, 0);
    let file = create_audio_file(graph, fixed_uuid(2), "kick.wav");
    let region = create_region(graph, track, file, 0);
    let markers = [create_marker(graph, file, 10), create_marker(graph, file, 20)];
    graph.end_transaction();
    Project {
        root,
        track,
        file,
        region,
        markers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_knows_every_kind() {
        for name in ["Root", "Track", "Region", "AudioFile", "Marker", "Bus", "Send", "Selection"] {
            let graph_box = factory(name, fixed_uuid(9)).unwrap();
            assert_eq!(graph_box.name(), name);
        }
        assert!(factory("Unknown", fixed_uuid(9)).is_none());
    }

    #[test]
    fn project_is_valid() {
        init_tracing();
        let mut graph = new_graph();
        let project = project(&mut graph);
        assert_eq!(graph.len(), 6);
        assert!(graph.validate_requirements().is_ok());
        assert!(graph.is_box_valid(project.region));
    }
}
