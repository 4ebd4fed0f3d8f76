//! Recorded graph changes
//!
//! Provides [`Update`], the atomic change record every graph write emits,
//! and [`Modification`], an ordered list of updates that can be replayed
//! forward or backward.

use crate::address::Address;
use crate::codec::ByteReader;
use crate::error::{DecodeError, GraphError};
use crate::field::{keep_address, PrimitiveValue};
use crate::graph::BoxGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Atomic change record
///
/// `New` and `Delete` carry the full field payload so either can be
/// reversed without consulting the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    /// Box was staged
    New {
        /// Box UUID
        uuid: Uuid,
        /// Kind name
        name: String,
        /// Binary field payload at staging time
        settings: Vec<u8>,
    },

    /// Primitive field changed
    Primitive {
        /// Field address
        address: Address,
        /// Previous value
        old: PrimitiveValue,
        /// New value
        new: PrimitiveValue,
    },

    /// Pointer field was re-targeted
    Pointer {
        /// Pointer address
        address: Address,
        /// Previous target
        old: Option<Address>,
        /// New target
        new: Option<Address>,
    },

    /// Box was unstaged
    Delete {
        /// Box UUID
        uuid: Uuid,
        /// Kind name
        name: String,
        /// Binary field payload at unstaging time
        settings: Vec<u8>,
    },
}

impl Update {
    /// UUID of the box the update belongs to
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::New { uuid, .. } | Self::Delete { uuid, .. } => *uuid,
            Self::Primitive { address, .. } | Self::Pointer { address, .. } => address.uuid(),
        }
    }

    /// Address the update applies to (the box address for `New`/`Delete`)
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::New { uuid, .. } | Self::Delete { uuid, .. } => Address::of_box(*uuid),
            Self::Primitive { address, .. } | Self::Pointer { address, .. } => address.clone(),
        }
    }

    /// Whether this is a field write rather than a structural change
    #[inline]
    #[must_use]
    pub fn is_field_update(&self) -> bool {
        matches!(self, Self::Primitive { .. } | Self::Pointer { .. })
    }

    /// The update that undoes this one
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self.clone() {
            Self::New {
                uuid,
                name,
                settings,
            } => Self::Delete {
                uuid,
                name,
                settings,
            },
            Self::Delete {
                uuid,
                name,
                settings,
            } => Self::New {
                uuid,
                name,
                settings,
            },
            Self::Primitive { address, old, new } => Self::Primitive {
                address,
                old: new,
                new: old,
            },
            Self::Pointer { address, old, new } => Self::Pointer {
                address,
                old: new,
                new: old,
            },
        }
    }

    /// Apply the update to `graph`
    ///
    /// Must run inside an open transaction.
    ///
    /// # Errors
    /// Returns error if a box payload cannot be decoded, the kind is unknown,
    /// or the box to delete is missing.
    pub fn apply(&self, graph: &mut BoxGraph) -> Result<(), GraphError> {
        match self {
            Self::New {
                uuid,
                name,
                settings,
            } => {
                let mut graph_box = graph.instantiate(name, *uuid)?;
                let mut reader = ByteReader::new(settings);
                graph_box.read_fields(&mut reader, &keep_address)?;
                if reader.remaining() > 0 {
                    return Err(DecodeError::LengthMismatch {
                        uuid: *uuid,
                        declared: settings.len(),
                        consumed: settings.len() - reader.remaining(),
                    }
                    .into());
                }
                graph.stage_box(graph_box)?;
            }
            Self::Delete { uuid, .. } => {
                graph.unstage_box(*uuid)?;
            }
            Self::Primitive { address, old, new } => {
                if graph.primitive(address) != Some(old) {
                    tracing::warn!(%address, "replaying primitive update over diverged value");
                }
                graph.set_primitive(address, new.clone());
            }
            Self::Pointer { address, old, new } => {
                if graph.pointer_target(address) != old.as_ref() {
                    tracing::warn!(%address, "replaying pointer update over diverged target");
                }
                graph.set_pointer(address, new.clone());
            }
        }
        Ok(())
    }
}

/// Replayable, compacted list of updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    updates: Vec<Update>,
}

impl Modification {
    /// Create a modification, dropping updates with no net effect
    ///
    /// Two kinds of updates are dropped:
    /// - Everything touching a box created and deleted inside the list
    /// - Field writes that end where they started on boxes that were
    ///   neither created nor deleted
    #[must_use]
    pub fn new(updates: Vec<Update>) -> Self {
        Self {
            updates: compact(updates),
        }
    }

    /// Compacted updates in recording order
    #[inline]
    #[must_use]
    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    /// Number of updates
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Whether nothing is left to replay
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Replay in recording order inside one transaction
    ///
    /// # Errors
    /// Returns error if an update cannot be applied
    ///
    /// # Panics
    /// Panics if a transaction is already open.
    pub fn forward(&self, graph: &mut BoxGraph) -> Result<(), GraphError> {
        graph.begin_transaction();
        let result = self.apply_forward(graph);
        graph.end_transaction();
        result
    }

    /// Replay inverted updates in reverse order inside one transaction
    ///
    /// # Errors
    /// Returns error if an update cannot be applied
    ///
    /// # Panics
    /// Panics if a transaction is already open.
    pub fn inverse(&self, graph: &mut BoxGraph) -> Result<(), GraphError> {
        graph.begin_transaction();
        let result = self.apply_inverse(graph);
        graph.end_transaction();
        result
    }

    pub(crate) fn apply_forward(&self, graph: &mut BoxGraph) -> Result<(), GraphError> {
        for update in &self.updates {
            update.apply(graph)?;
        }
        Ok(())
    }

    pub(crate) fn apply_inverse(&self, graph: &mut BoxGraph) -> Result<(), GraphError> {
        for update in self.updates.iter().rev() {
            update.inverse().apply(graph)?;
        }
        Ok(())
    }
}

fn compact(updates: Vec<Update>) -> Vec<Update> {
    // first and last structural event per box
    let mut lifecycle: HashMap<Uuid, (bool, bool)> = HashMap::new();
    for update in &updates {
        let (uuid, is_new) = match update {
            Update::New { uuid, .. } => (*uuid, true),
            Update::Delete { uuid, .. } => (*uuid, false),
            _ => continue,
        };
        lifecycle
            .entry(uuid)
            .and_modify(|(_, last)| *last = is_new)
            .or_insert((is_new, is_new));
    }
    let phantoms: HashSet<Uuid> = lifecycle
        .iter()
        .filter(|(_, (first_new, last_new))| *first_new && !*last_new)
        .map(|(uuid, _)| *uuid)
        .collect();

    // field writes on stable boxes whose net effect is nothing
    let mut first_old: HashMap<Address, &Update> = HashMap::new();
    let mut last_new: HashMap<Address, &Update> = HashMap::new();
    for update in updates.iter().filter(|update| update.is_field_update()) {
        if lifecycle.contains_key(&update.uuid()) {
            continue;
        }
        first_old.entry(update.address()).or_insert(update);
        last_new.insert(update.address(), update);
    }
    let no_ops: HashSet<Address> = first_old
        .iter()
        .filter(|(address, first)| {
            last_new
                .get(*address)
                .is_some_and(|last| is_round_trip(first, last))
        })
        .map(|(address, _)| address.clone())
        .collect();

    updates
        .into_iter()
        .filter(|update| {
            !phantoms.contains(&update.uuid())
                && !(update.is_field_update() && no_ops.contains(&update.address()))
        })
        .collect()
}

fn is_round_trip(first: &Update, last: &Update) -> bool {
    match (first, last) {
        (Update::Primitive { old, .. }, Update::Primitive { new, .. }) => old == new,
        (Update::Pointer { old, .. }, Update::Pointer { new, .. }) => old == new,
        _ => false,
    }
}
