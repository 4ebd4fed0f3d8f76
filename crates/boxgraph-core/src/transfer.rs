//! Sub-graph duplication and cross-graph transfer
//!
//! Transfer runs in two phases so that copying inside one graph works
//! without aliasing it:
//! 1. [`SubGraph::extract`] captures the roots and everything they own as
//!    serialized boxes
//! 2. [`SubGraph::paste_into`] recreates them under remapped UUIDs inside an
//!    open transaction on the target
//!
//! Roots always get fresh UUIDs. Dependencies do too, except preserved
//! resources, which keep theirs so that a resource already present in the
//! target is shared instead of duplicated. Such a resource is skipped, and
//! so is every dependency hanging off its fields through a mandatory
//! pointer.

use crate::address::{Address, FieldKey};
use crate::boxes::{GraphBox, ResourceKind};
use crate::codec::ByteReader;
use crate::dependencies::{DependencyOptions, ExcludeBox};
use crate::error::{DecodeError, GraphError};
use crate::field::{PointerField, PrimitiveValue};
use crate::graph::BoxGraph;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use uuid::Uuid;

/// Re-sequencing of integer index fields after a paste
///
/// All boxes sharing a kind with the pasted roots and holding an `Int32` at
/// `index_field` are renumbered from zero. Existing boxes are ordered by
/// rank, then by their current index; each new root goes directly after
/// the last box of its rank.
#[derive(Clone, Copy)]
pub struct RootOrdering<'a> {
    /// Top-level key of the index field
    pub index_field: FieldKey,
    /// Group rank of a box; lower ranks come first
    pub rank: &'a dyn Fn(&GraphBox) -> i32,
}

impl fmt::Debug for RootOrdering<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootOrdering")
            .field("index_field", &self.index_field)
            .finish_non_exhaustive()
    }
}

/// Knobs for extraction and pasting
#[derive(Clone, Copy, Default)]
pub struct TransferOptions<'a> {
    exclude: Option<ExcludeBox<'a>>,
    include_ephemeral: bool,
    ordering: Option<RootOrdering<'a>>,
}

impl fmt::Debug for TransferOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("exclude", &self.exclude.is_some())
            .field("include_ephemeral", &self.include_ephemeral)
            .field("ordering", &self.ordering)
            .finish()
    }
}

impl<'a> TransferOptions<'a> {
    /// Default options: ephemeral boxes are left behind, no re-sequencing
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also leave behind boxes matching `exclude`
    #[inline]
    #[must_use]
    pub fn with_exclude(mut self, exclude: ExcludeBox<'a>) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Copy ephemeral dependencies too
    #[inline]
    #[must_use]
    pub fn with_ephemeral(mut self, include: bool) -> Self {
        self.include_ephemeral = include;
        self
    }

    /// Re-sequence roots after pasting
    #[inline]
    #[must_use]
    pub fn with_ordering(mut self, ordering: RootOrdering<'a>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    fn excludes(&self, graph_box: &GraphBox) -> bool {
        (!self.include_ephemeral && graph_box.is_ephemeral())
            || self.exclude.is_some_and(|exclude| exclude(graph_box))
    }
}

/// A box captured for transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedBox {
    /// UUID in the source graph
    pub uuid: Uuid,
    /// Kind name
    pub name: String,
    /// Resource classification
    pub resource: Option<ResourceKind>,
    /// Creation index in the source graph
    pub creation_index: u32,
    /// Binary field payload
    pub settings: Vec<u8>,
    /// Boxes whose fields this one hangs off through mandatory pointers
    pub requires: Vec<Uuid>,
}

impl CapturedBox {
    fn capture(graph_box: &GraphBox) -> Self {
        let requires = graph_box
            .pointer_fields()
            .into_iter()
            .filter(|pointer| pointer.is_mandatory())
            .filter_map(PointerField::target)
            .filter(|target| !target.is_box())
            .map(Address::uuid)
            .collect();
        Self {
            uuid: graph_box.uuid(),
            name: graph_box.name().to_owned(),
            resource: graph_box.resource(),
            creation_index: graph_box.creation_index(),
            settings: graph_box.field_bytes(),
            requires,
        }
    }

    fn is_preserved(&self) -> bool {
        self.resource == Some(ResourceKind::Preserved)
    }
}

/// Roots plus everything they own, detached from any graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubGraph {
    roots: Vec<CapturedBox>,
    dependencies: Vec<CapturedBox>,
}

/// Outcome of [`SubGraph::paste_into`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Source UUID -> target UUID for every created box
    pub uuid_map: BTreeMap<Uuid, Uuid>,
    /// New UUIDs of the roots, in extraction order
    pub roots: Vec<Uuid>,
    /// Target UUIDs of all created boxes, in creation order
    pub created: Vec<Uuid>,
    /// Source UUIDs of dependencies not recreated
    pub skipped: Vec<Uuid>,
}

impl SubGraph {
    /// Capture `roots` and their dependencies from `source`
    ///
    /// Dependencies are traced with mandatory targets always followed and
    /// resources as endpoints.
    ///
    /// # Errors
    /// Returns error if a root is not staged
    pub fn extract(source: &BoxGraph, roots: &[Uuid], options: &TransferOptions<'_>) -> Result<Self, GraphError> {
        let root_set: IndexSet<Uuid> = roots.iter().copied().collect();
        let mut captured_roots = Vec::with_capacity(root_set.len());
        for root in &root_set {
            let graph_box = source.find_box(*root).ok_or(GraphError::BoxNotFound(*root))?;
            captured_roots.push(CapturedBox::capture(graph_box));
        }

        let exclude = |graph_box: &GraphBox| options.excludes(graph_box);
        let trace = DependencyOptions::new()
            .with_exclude(&exclude)
            .with_always_follow_mandatory(true)
            .with_stop_at_resources(true);
        let mut dependencies = IndexSet::new();
        for root in &root_set {
            for dependency in source.dependencies_of(*root, &trace).boxes {
                if !root_set.contains(&dependency) {
                    dependencies.insert(dependency);
                }
            }
        }
        let dependencies: Vec<CapturedBox> = dependencies
            .into_iter()
            .filter_map(|uuid| source.find_box(uuid))
            .map(CapturedBox::capture)
            .collect();

        tracing::debug!(
            roots = captured_roots.len(),
            dependencies = dependencies.len(),
            "sub-graph extracted"
        );
        Ok(Self {
            roots: captured_roots,
            dependencies,
        })
    }

    /// Captured roots
    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[CapturedBox] {
        &self.roots
    }

    /// Captured dependencies
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[CapturedBox] {
        &self.dependencies
    }

    /// Number of captured boxes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len() + self.dependencies.len()
    }

    /// Whether nothing was captured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.dependencies.is_empty()
    }

    /// Recreate the captured boxes in `target`
    ///
    /// Pointers into the captured set are rewritten to the new UUIDs;
    /// pointers elsewhere are kept as they are.
    ///
    /// # Errors
    /// Returns error if a kind is unknown to the target, a payload does not
    /// decode, or a new UUID clashes
    ///
    /// # Panics
    /// Panics if no transaction is open on `target`.
    pub fn paste_into(&self, target: &mut BoxGraph, options: &TransferOptions<'_>) -> Result<TransferReport, GraphError> {
        assert!(target.in_transaction(), "transfer outside of a transaction");

        let mut uuid_map = BTreeMap::new();
        for root in &self.roots {
            uuid_map.insert(root.uuid, Uuid::new_v4());
        }
        let mut skipped = BTreeSet::new();
        for dependency in &self.dependencies {
            if dependency.is_preserved() {
                if target.contains(dependency.uuid) {
                    skipped.insert(dependency.uuid);
                } else {
                    uuid_map.insert(dependency.uuid, dependency.uuid);
                }
            } else {
                uuid_map.insert(dependency.uuid, Uuid::new_v4());
            }
        }
        loop {
            let owned: Vec<Uuid> = self
                .dependencies
                .iter()
                .filter(|dependency| !skipped.contains(&dependency.uuid))
                .filter(|dependency| dependency.requires.iter().any(|uuid| skipped.contains(uuid)))
                .map(|dependency| dependency.uuid)
                .collect();
            if owned.is_empty() {
                break;
            }
            skipped.extend(owned);
        }
        for uuid in &skipped {
            uuid_map.remove(uuid);
        }

        let mut pending: Vec<&CapturedBox> = self
            .roots
            .iter()
            .chain(&self.dependencies)
            .filter(|captured| !skipped.contains(&captured.uuid))
            .collect();
        pending.sort_by_key(|captured| captured.creation_index);

        let remap = |address: &Address| {
            uuid_map
                .get(&address.uuid())
                .map_or_else(|| address.clone(), |uuid| address.move_to(*uuid))
        };
        let mut created = Vec::with_capacity(pending.len());
        for captured in pending {
            let uuid = uuid_map
                .get(&captured.uuid)
                .copied()
                .ok_or(GraphError::BoxNotFound(captured.uuid))?;
            let mut graph_box = target.instantiate(&captured.name, uuid)?;
            let mut reader = ByteReader::new(&captured.settings);
            graph_box.read_fields(&mut reader, &remap)?;
            if reader.remaining() > 0 {
                return Err(DecodeError::LengthMismatch {
                    uuid: captured.uuid,
                    declared: captured.settings.len(),
                    consumed: captured.settings.len() - reader.remaining(),
                }
                .into());
            }
            created.push(target.stage_box(graph_box)?);
        }

        let roots: Vec<Uuid> = self
            .roots
            .iter()
            .filter_map(|root| uuid_map.get(&root.uuid).copied())
            .collect();
        if let Some(ordering) = &options.ordering {
            reorder(target, &roots, ordering);
        }

        tracing::debug!(
            created = created.len(),
            skipped = skipped.len(),
            "sub-graph pasted"
        );
        Ok(TransferReport {
            uuid_map,
            roots,
            created,
            skipped: skipped.into_iter().collect(),
        })
    }
}

/// Extract from `source` and paste into `target` in one go
///
/// # Errors
/// Returns error if extraction or pasting fails
///
/// # Panics
/// Panics if no transaction is open on `target`.
pub fn transfer_boxes(
    source: &BoxGraph,
    target: &mut BoxGraph,
    roots: &[Uuid],
    options: &TransferOptions<'_>,
) -> Result<TransferReport, GraphError> {
    SubGraph::extract(source, roots, options)?.paste_into(target, options)
}

fn reorder(target: &mut BoxGraph, new_roots: &[Uuid], ordering: &RootOrdering<'_>) {
    let key = [ordering.index_field];
    let index_of = |graph_box: &GraphBox| graph_box.primitive(&key).and_then(PrimitiveValue::as_i32);
    let fresh: HashSet<Uuid> = new_roots.iter().copied().collect();
    let kinds: HashSet<&'static str> = new_roots
        .iter()
        .filter_map(|uuid| target.find_box(*uuid))
        .map(GraphBox::name)
        .collect();

    let mut existing: Vec<(i32, i32, Uuid)> = target
        .boxes()
        .filter(|graph_box| kinds.contains(graph_box.name()) && !fresh.contains(&graph_box.uuid()))
        .filter_map(|graph_box| {
            index_of(graph_box).map(|index| ((ordering.rank)(graph_box), index, graph_box.uuid()))
        })
        .collect();
    existing.sort_unstable();
    let mut sequence: Vec<(i32, Uuid)> = existing
        .into_iter()
        .map(|(rank, _, uuid)| (rank, uuid))
        .collect();

    for root in new_roots {
        let Some(graph_box) = target.find_box(*root) else {
            continue;
        };
        if index_of(graph_box).is_none() {
            continue;
        }
        let rank = (ordering.rank)(graph_box);
        let position = sequence
            .iter()
            .rposition(|(existing, _)| *existing <= rank)
            .map_or(0, |found| found + 1);
        sequence.insert(position, (rank, *root));
    }

    for (index, (_, uuid)) in sequence.into_iter().enumerate() {
        let index = i32::try_from(index).unwrap_or(i32::MAX);
        target.set_primitive(&Address::new(uuid, key), index);
    }
}
