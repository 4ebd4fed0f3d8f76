//! Box Graph Core - transactional object graph
//!
//! The persisted document model of an application:
//! - Boxes with fixed, typed field trees addressed by UUID and field path
//! - Typed pointers between boxes and fields with integrity rules
//! - Transactions with synchronous updates and deferred pointer notifications
//! - Cascading deletion that follows ownership, not mere reachability
//! - Undo/redo over recorded modifications
//! - Byte-exact binary serialization plus a JSON mirror
//! - Sub-graph duplication with UUID remapping and shared resources
//!
//! Box kinds are not defined here; the domain supplies them through a
//! [`BoxFactory`].
//!
//! # Example
//!
//! ```rust,ignore
//! use boxgraph_core::prelude::*;
//!
//! let mut editing = BoxEditing::new(BoxGraph::new(factory));
//! let uuid = editing.modify(|graph| graph.create_box("Item", Uuid::new_v4(), |_| {}))??;
//! editing.modify(|graph| graph.set_primitive(&Address::new(uuid, [0]), 42))?;
//! editing.undo()?;
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod address;
pub mod boxes;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod dependencies;
pub mod edges;
pub mod editing;
pub mod error;
pub mod field;
pub mod graph;
pub mod pointer_hub;
pub mod subscription;
pub mod transfer;
pub mod update;

// Re-exports for convenience
pub use address::{Address, AddressError, FieldKey, FieldPath};
pub use boxes::{BoxBuilder, BoxFactory, GraphBox, ResourceKind, Vertex};
pub use checksum::{Checksum, ChecksumBuilder};
pub use config::{EditingConfig, GraphConfig};
pub use dependencies::{Dependencies, DependencyOptions, ExcludeBox};
pub use edges::GraphEdges;
pub use editing::BoxEditing;
pub use error::{DecodeError, GraphError, IntegrityError};
pub use field::{
    keep_address, ArrayField, Field, FieldSpec, ObjectField, PointerField, PointerRules, PointerType,
    PrimitiveField, PrimitiveValue, Remap,
};
pub use graph::BoxGraph;
pub use pointer_hub::{HubEventKind, PointerHub, PointerHubEvent};
pub use subscription::{Propagation, Subscription, TransactionEvent};
pub use transfer::{transfer_boxes, CapturedBox, RootOrdering, SubGraph, TransferOptions, TransferReport};
pub use update::{Modification, Update};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with box graphs
    pub use crate::{
        Address, BoxEditing, BoxFactory, BoxGraph, FieldSpec, GraphBox, GraphError, PointerRules,
        PointerType, PrimitiveValue, ResourceKind, SubGraph, TransferOptions, Update,
    };
    pub use uuid::Uuid;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
