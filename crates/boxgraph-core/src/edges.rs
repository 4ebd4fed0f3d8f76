//! Edge index for pointer connections
//!
//! Provides [`GraphEdges`], the single source of truth for which pointer
//! targets which vertex. Lookups by box use ordered range scans, so a box
//! and all its fields are found without walking the whole index.

use crate::address::Address;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Bidirectional pointer index
///
/// Keeps two views in sync:
/// - Outgoing: pointer address -> target address
/// - Incoming: target address -> pointer addresses
///
/// It also remembers the vertices whose incoming-pointer rules need to be
/// checked by the requirement sweep.
#[derive(Debug, Default, Clone)]
pub struct GraphEdges {
    /// Pointer -> target
    outgoing: BTreeMap<Address, Address>,

    /// Target -> pointers
    incoming: BTreeMap<Address, BTreeSet<Address>>,

    /// Vertices with mandatory or exclusive rules
    watched: BTreeSet<Address>,
}

impl GraphEdges {
    /// Create an empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connected pointers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    /// Whether no pointer is connected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// Connect `pointer` to `target`, replacing any previous connection
    pub fn connect(&mut self, pointer: Address, target: Address) {
        self.disconnect(&pointer);
        self.incoming
            .entry(target.clone())
            .or_default()
            .insert(pointer.clone());
        self.outgoing.insert(pointer, target);
    }

    /// Disconnect `pointer`, returning its former target
    pub fn disconnect(&mut self, pointer: &Address) -> Option<Address> {
        let target = self.outgoing.remove(pointer)?;
        if let Some(pointers) = self.incoming.get_mut(&target) {
            pointers.remove(pointer);
            if pointers.is_empty() {
                self.incoming.remove(&target);
            }
        }
        Some(target)
    }

    /// Current target of `pointer`
    #[inline]
    #[must_use]
    pub fn target_of(&self, pointer: &Address) -> Option<&Address> {
        self.outgoing.get(pointer)
    }

    /// Pointers targeting exactly `vertex`
    #[must_use]
    pub fn incoming_edges_of(&self, vertex: &Address) -> Vec<Address> {
        self.incoming
            .get(vertex)
            .map(|pointers| pointers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of pointers targeting exactly `vertex`
    #[must_use]
    pub fn incoming_count(&self, vertex: &Address) -> usize {
        self.incoming.get(vertex).map_or(0, BTreeSet::len)
    }

    /// Pointers targeting the box or any of its fields, as `(pointer, target)`
    #[must_use]
    pub fn incoming_edges_of_box(&self, uuid: Uuid) -> Vec<(Address, Address)> {
        self.incoming
            .range(Address::of_box(uuid)..)
            .take_while(|(target, _)| target.uuid() == uuid)
            .flat_map(|(target, pointers)| {
                pointers
                    .iter()
                    .map(move |pointer| (pointer.clone(), target.clone()))
            })
            .collect()
    }

    /// Connected pointers owned by the box, as `(pointer, target)`
    #[must_use]
    pub fn outgoing_edges_of(&self, uuid: Uuid) -> Vec<(Address, Address)> {
        self.outgoing
            .range(Address::of_box(uuid)..)
            .take_while(|(pointer, _)| pointer.uuid() == uuid)
            .map(|(pointer, target)| (pointer.clone(), target.clone()))
            .collect()
    }

    /// All connections, ordered by pointer address
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.outgoing.iter()
    }

    /// Register a vertex for the requirement sweep
    pub fn watch_vertex(&mut self, vertex: Address) {
        self.watched.insert(vertex);
    }

    /// Forget all watched vertices of a box
    pub fn unwatch_vertices_of(&mut self, uuid: Uuid) {
        let owned: Vec<Address> = self
            .watched
            .range(Address::of_box(uuid)..)
            .take_while(|vertex| vertex.uuid() == uuid)
            .cloned()
            .collect();
        for vertex in owned {
            self.watched.remove(&vertex);
        }
    }

    /// Vertices registered for the requirement sweep
    pub fn watched(&self) -> impl Iterator<Item = &Address> {
        self.watched.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn connect_updates_both_views() {
        let mut edges = GraphEdges::new();
        let pointer = Address::new(uuid(1), [0]);
        let target = Address::of_box(uuid(2));
        edges.connect(pointer.clone(), target.clone());

        assert_eq!(edges.target_of(&pointer), Some(&target));
        assert_eq!(edges.incoming_edges_of(&target), vec![pointer.clone()]);
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn reconnect_moves_incoming_entry() {
        let mut edges = GraphEdges::new();
        let pointer = Address::new(uuid(1), [0]);
        let first = Address::of_box(uuid(2));
        let second = Address::new(uuid(3), [1]);
        edges.connect(pointer.clone(), first.clone());
        edges.connect(pointer.clone(), second.clone());

        assert!(edges.incoming_edges_of(&first).is_empty());
        assert_eq!(edges.incoming_count(&second), 1);
        assert_eq!(edges.disconnect(&pointer), Some(second.clone()));
        assert!(edges.is_empty());
        assert_eq!(edges.incoming_count(&second), 0);
    }

    #[test]
    fn box_queries_cover_fields_only_of_that_box() {
        let mut edges = GraphEdges::new();
        edges.connect(Address::new(uuid(1), [0]), Address::of_box(uuid(2)));
        edges.connect(Address::new(uuid(1), [1, 0]), Address::new(uuid(2), [4]));
        edges.connect(Address::new(uuid(3), [0]), Address::new(uuid(2), [4]));
        edges.connect(Address::new(uuid(2), [0]), Address::of_box(uuid(3)));

        assert_eq!(edges.outgoing_edges_of(uuid(1)).len(), 2);
        assert_eq!(edges.incoming_edges_of_box(uuid(2)).len(), 3);
        assert_eq!(
            edges.incoming_edges_of_box(uuid(3)),
            vec![(Address::new(uuid(2), [0]), Address::of_box(uuid(3)))]
        );
        assert!(edges.outgoing_edges_of(uuid(4)).is_empty());
    }

    #[test]
    fn unwatch_removes_only_owned_vertices() {
        let mut edges = GraphEdges::new();
        edges.watch_vertex(Address::of_box(uuid(1)));
        edges.watch_vertex(Address::new(uuid(1), [2]));
        edges.watch_vertex(Address::of_box(uuid(2)));
        edges.unwatch_vertices_of(uuid(1));

        let watched: Vec<_> = edges.watched().cloned().collect();
        assert_eq!(watched, vec![Address::of_box(uuid(2))]);
    }
}
