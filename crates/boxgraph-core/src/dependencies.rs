//! Dependency tracing, cascading deletion and orphan detection
//!
//! [`BoxGraph::dependencies_of`] decides which boxes and pointers go away
//! together with a root box. It is not plain reachability:
//! - An outgoing pointer pulls in its target only when the target's rules
//!   are mandatory and no untraced pointer still keeps it alive (or the
//!   caller asks to always follow mandatory targets)
//! - An incoming pointer pulls in its owner when the pointer is mandatory
//! - Resources can act as endpoints; only the owners of mandatory pointers
//!   into their fields are traced
//!
//! The trace is a monotone closure: targets skipped because another pointer
//! still referenced them are re-examined whenever the traced pointer set
//! grows, so the result does not depend on edge iteration order.

use crate::address::Address;
use crate::boxes::{GraphBox, ResourceKind};
use crate::error::GraphError;
use crate::graph::BoxGraph;
use indexmap::IndexSet;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use uuid::Uuid;

/// Predicate pruning candidate boxes from a trace
pub type ExcludeBox<'a> = &'a dyn Fn(&GraphBox) -> bool;

/// Knobs for [`BoxGraph::dependencies_of`]
#[derive(Clone, Copy, Default)]
pub struct DependencyOptions<'a> {
    exclude: Option<ExcludeBox<'a>>,
    always_follow_mandatory: bool,
    stop_at_resources: bool,
}

impl fmt::Debug for DependencyOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyOptions")
            .field("exclude", &self.exclude.is_some())
            .field("always_follow_mandatory", &self.always_follow_mandatory)
            .field("stop_at_resources", &self.stop_at_resources)
            .finish()
    }
}

impl<'a> DependencyOptions<'a> {
    /// Options used by cascading delete
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip boxes matching `exclude` (never the root)
    #[inline]
    #[must_use]
    pub fn with_exclude(mut self, exclude: ExcludeBox<'a>) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Follow mandatory targets even if other pointers keep them alive
    #[inline]
    #[must_use]
    pub fn with_always_follow_mandatory(mut self, follow: bool) -> Self {
        self.always_follow_mandatory = follow;
        self
    }

    /// Treat resources as endpoints
    #[inline]
    #[must_use]
    pub fn with_stop_at_resources(mut self, stop: bool) -> Self {
        self.stop_at_resources = stop;
        self
    }

    fn excludes(&self, graph_box: &GraphBox) -> bool {
        self.exclude.is_some_and(|exclude| exclude(graph_box))
    }
}

/// Result of a dependency trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Boxes to remove with the root, in trace order (root excluded)
    pub boxes: Vec<Uuid>,
    /// Pointers to clear, most recently traced first
    pub pointers: Vec<Address>,
}

impl Dependencies {
    /// Whether nothing besides the root is affected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.pointers.is_empty()
    }
}

struct Trace<'g, 'o> {
    graph: &'g BoxGraph,
    options: &'o DependencyOptions<'o>,
    root: Uuid,
    boxes: IndexSet<Uuid>,
    pointers: IndexSet<Address>,
    /// Mandatory targets still referenced by untraced pointers
    waiting: IndexSet<Address>,
    queue: VecDeque<Uuid>,
}

impl Trace<'_, '_> {
    fn run(mut self) -> Dependencies {
        self.queue.push_back(self.root);
        loop {
            while let Some(uuid) = self.queue.pop_front() {
                self.visit(uuid);
            }
            let released: Vec<Address> = self
                .waiting
                .iter()
                .filter(|target| self.is_released(target))
                .cloned()
                .collect();
            if released.is_empty() {
                break;
            }
            for target in released {
                self.waiting.shift_remove(&target);
                self.queue.push_back(target.uuid());
            }
        }
        let root = self.root;
        Dependencies {
            boxes: self.boxes.into_iter().filter(|uuid| *uuid != root).collect(),
            pointers: self.pointers.into_iter().rev().collect(),
        }
    }

    fn visit(&mut self, uuid: Uuid) {
        if self.boxes.contains(&uuid) {
            return;
        }
        let graph = self.graph;
        let Some(graph_box) = graph.find_box(uuid) else {
            return;
        };
        let is_root = uuid == self.root;
        if !is_root && self.options.excludes(graph_box) {
            return;
        }
        self.boxes.insert(uuid);
        if !is_root && graph_box.is_ephemeral() {
            return;
        }
        if self.options.stop_at_resources && graph_box.is_resource() {
            self.trace_resource_children(graph_box);
            return;
        }
        for (pointer, target) in graph.outgoing_edges_of(uuid) {
            self.pointers.insert(pointer);
            self.consider_target(target);
        }
        for (pointer, _) in graph.incoming_edges_of_box(uuid) {
            let owner = pointer.uuid();
            let mandatory = graph.is_mandatory_pointer(&pointer);
            self.pointers.insert(pointer);
            if mandatory {
                self.queue.push_back(owner);
            }
        }
    }

    fn trace_resource_children(&mut self, resource: &GraphBox) {
        let shared = resource.resource() == Some(ResourceKind::Shared);
        for (pointer, target) in self.graph.incoming_edges_of_box(resource.uuid()) {
            if target.is_box() || !self.graph.is_mandatory_pointer(&pointer) {
                continue;
            }
            if shared
                && self
                    .graph
                    .find_vertex(&target)
                    .is_some_and(|vertex| vertex.rules().is_mandatory())
            {
                continue;
            }
            let owner = pointer.uuid();
            self.pointers.insert(pointer);
            self.queue.push_back(owner);
        }
    }

    fn consider_target(&mut self, target: Address) {
        let Some(vertex) = self.graph.find_vertex(&target) else {
            return;
        };
        if !vertex.rules().is_mandatory() || self.boxes.contains(&target.uuid()) {
            return;
        }
        if self.options.always_follow_mandatory || self.is_released(&target) {
            self.queue.push_back(target.uuid());
        } else {
            self.waiting.insert(target);
        }
    }

    fn is_released(&self, target: &Address) -> bool {
        self.graph
            .incoming_edges_of(target)
            .iter()
            .all(|pointer| self.pointers.contains(pointer))
    }
}

impl BoxGraph {
    /// Boxes and pointers that go away together with `root`
    ///
    /// Returns an empty result if `root` is not staged.
    #[must_use]
    pub fn dependencies_of(&self, root: Uuid, options: &DependencyOptions<'_>) -> Dependencies {
        Trace {
            graph: self,
            options,
            root,
            boxes: IndexSet::new(),
            pointers: IndexSet::new(),
            waiting: IndexSet::new(),
            queue: VecDeque::new(),
        }
        .run()
    }

    /// Delete a box together with everything that depends on it
    ///
    /// Clears every traced pointer first, then unstages the dependent boxes
    /// and finally the root. Returns what was removed besides the root.
    ///
    /// # Errors
    /// Returns error if the box is not staged
    ///
    /// # Panics
    /// Panics outside a transaction.
    pub fn delete_box(&mut self, uuid: Uuid) -> Result<Dependencies, GraphError> {
        assert!(self.in_transaction(), "modification outside of a transaction");
        if !self.contains(uuid) {
            return Err(GraphError::BoxNotFound(uuid));
        }
        let dependencies = self.dependencies_of(uuid, &DependencyOptions::new());
        tracing::debug!(
            %uuid,
            boxes = dependencies.boxes.len(),
            pointers = dependencies.pointers.len(),
            "cascading delete"
        );
        for pointer in &dependencies.pointers {
            if self.pointer_target(pointer).is_some() {
                self.set_pointer(pointer, None);
            }
        }
        for dependency in &dependencies.boxes {
            self.unstage_box(*dependency)?;
        }
        self.unstage_box(uuid)?;
        Ok(dependencies)
    }

    /// Boxes not reachable from `root` over any pointer edge
    ///
    /// Edges are followed in both directions regardless of their rules.
    /// Returns every box if `root` is not staged.
    #[must_use]
    pub fn find_orphans(&self, root: Uuid) -> Vec<Uuid> {
        let mut reached = HashSet::new();
        let mut queue = VecDeque::new();
        if self.contains(root) {
            reached.insert(root);
            queue.push_back(root);
        }
        while let Some(uuid) = queue.pop_front() {
            let neighbours = self
                .outgoing_edges_of(uuid)
                .into_iter()
                .map(|(_, target)| target.uuid())
                .chain(
                    self.incoming_edges_of_box(uuid)
                        .into_iter()
                        .map(|(pointer, _)| pointer.uuid()),
                );
            for neighbour in neighbours {
                if self.contains(neighbour) && reached.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }
        self.boxes()
            .map(GraphBox::uuid)
            .filter(|uuid| !reached.contains(uuid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldSpec, PointerRules, PointerType};
    use pretty_assertions::assert_eq;

    const OWNS: PointerType = PointerType::new(1);
    const REFERS: PointerType = PointerType::new(2);

    /// `Owner` must be pointed at; `Part` has a mandatory pointer to its owner
    fn factory(name: &str, uuid: Uuid) -> Option<GraphBox> {
        let graph_box = match name {
            "Owner" => GraphBox::builder("Owner", uuid)
                .rules(PointerRules::accepting([OWNS, REFERS]))
                .field(0, FieldSpec::pointer("target", OWNS, false)),
            "Part" => GraphBox::builder("Part", uuid)
                .rules(PointerRules::accepting([OWNS]).mandatory())
                .field(0, FieldSpec::pointer("owner", OWNS, true))
                .field(1, FieldSpec::pointer("reference", REFERS, false)),
            _ => return None,
        };
        Some(graph_box.build())
    }

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    fn graph() -> BoxGraph {
        let mut graph = BoxGraph::new(factory);
        graph.begin_transaction();
        graph.create_box("Owner", uuid(1), |_| {}).unwrap();
        graph.create_box("Owner", uuid(2), |_| {}).unwrap();
        graph
            .create_box("Part", uuid(3), |part| {
                part.set_pointer(&[0], Some(Address::of_box(uuid(1))));
                part.set_pointer(&[1], Some(Address::of_box(uuid(2))));
            })
            .unwrap();
        graph.end_transaction();
        graph
    }

    #[test]
    fn mandatory_incoming_pointer_pulls_in_owner() {
        let graph = graph();
        let dependencies = graph.dependencies_of(uuid(1), &DependencyOptions::new());
        assert_eq!(dependencies.boxes, vec![uuid(3)]);
        assert!(dependencies.pointers.contains(&Address::new(uuid(3), [1])));
    }

    #[test]
    fn optional_incoming_pointer_is_only_cleared() {
        let graph = graph();
        let dependencies = graph.dependencies_of(uuid(2), &DependencyOptions::new());
        assert!(dependencies.boxes.is_empty());
        assert_eq!(dependencies.pointers, vec![Address::new(uuid(3), [1])]);
    }

    #[test]
    fn mandatory_target_kept_alive_by_other_pointer() {
        let mut graph = graph();
        graph.begin_transaction();
        graph.set_pointer(&Address::new(uuid(1), [0]), Some(Address::of_box(uuid(3))));
        graph.set_pointer(&Address::new(uuid(2), [0]), Some(Address::of_box(uuid(3))));
        graph.end_transaction();

        let dependencies = graph.dependencies_of(uuid(2), &DependencyOptions::new());
        assert!(!dependencies.boxes.contains(&uuid(3)));

        let forced = graph.dependencies_of(
            uuid(2),
            &DependencyOptions::new().with_always_follow_mandatory(true),
        );
        assert!(forced.boxes.contains(&uuid(3)));
    }

    #[test]
    fn exclusion_never_applies_to_root() {
        let graph = graph();
        let exclude = |graph_box: &GraphBox| graph_box.name() == "Owner";
        let dependencies =
            graph.dependencies_of(uuid(1), &DependencyOptions::new().with_exclude(&exclude));
        assert_eq!(dependencies.boxes, vec![uuid(3)]);
    }

    #[test]
    fn delete_box_cascades_and_clears_pointers() {
        let mut graph = graph();
        graph.begin_transaction();
        let removed = graph.delete_box(uuid(1)).unwrap();
        graph.end_transaction();

        assert_eq!(removed.boxes, vec![uuid(3)]);
        assert!(!graph.contains(uuid(1)));
        assert!(!graph.contains(uuid(3)));
        assert!(graph.contains(uuid(2)));
        assert!(graph.edges().is_empty());
        assert!(graph.verify_pointers().is_ok());
    }

    #[test]
    fn orphans_ignore_edge_direction() {
        let mut graph = graph();
        graph.begin_transaction();
        graph.create_box("Owner", uuid(4), |_| {}).unwrap();
        graph.end_transaction();
        assert_eq!(graph.find_orphans(uuid(2)), vec![uuid(4)]);
    }
}
