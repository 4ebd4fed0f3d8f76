//! The box graph: registry, transactions and notifications
//!
//! Provides [`BoxGraph`], the owner of every staged box and of the edge
//! index. All writes happen inside a transaction. Every write emits an
//! [`Update`] synchronously; pointer-hub notifications are deferred until
//! the transaction ends and only reflect the net change of each pointer.
//!
//! # Example
//! ```ignore
//! let mut graph = BoxGraph::new(factory);
//! graph.begin_transaction();
//! let uuid = graph.create_box("Item", Uuid::new_v4(), |_| {})?;
//! graph.set_primitive(&Address::new(uuid, [0]), 7);
//! graph.end_transaction();
//! ```

use crate::address::Address;
use crate::boxes::{BoxFactory, GraphBox, Vertex};
use crate::checksum::{Checksum, ChecksumBuilder};
use crate::codec::{ByteReader, ByteWriter};
use crate::config::GraphConfig;
use crate::edges::GraphEdges;
use crate::error::{DecodeError, GraphError, IntegrityError};
use crate::field::{keep_address, Field, PointerType, PrimitiveValue};
use crate::pointer_hub::{HubEventKind, PointerHub, PointerHubEvent};
use crate::subscription::{Listeners, Propagation, Subscription, TransactionEvent, VertexListener};
use crate::update::Update;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

type DeletionCallback = Box<dyn FnOnce(Uuid)>;
type EndTransactionObserver = Box<dyn FnOnce(&mut BoxGraph)>;

/// First state of a pointer touched in the open transaction
#[derive(Debug, Clone)]
struct TouchedPointer {
    initial: Option<Address>,
    pointer_type: PointerType,
}

/// Transactional registry of boxes
pub struct BoxGraph {
    config: GraphConfig,
    factory: Box<dyn BoxFactory>,

    /// Staged boxes in UUID order
    boxes: BTreeMap<Uuid, GraphBox>,

    /// Pointer connections
    edges: GraphEdges,

    /// Listeners per vertex, created on first subscription
    hubs: BTreeMap<Address, PointerHub>,

    next_creation_index: u32,
    next_subscription: u64,
    in_transaction: bool,

    /// Pointers changed in the open transaction, in first-touched order
    touched: IndexMap<Address, TouchedPointer>,

    update_listeners: Listeners<dyn FnMut(&Update)>,
    vertex_listeners: Vec<VertexListener>,
    transaction_listeners: Listeners<dyn FnMut(TransactionEvent)>,
    deletion_listeners: BTreeMap<Uuid, Vec<(Subscription, DeletionCallback)>>,
    end_transaction_observers: Vec<EndTransactionObserver>,
}

impl fmt::Debug for BoxGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxGraph")
            .field("config", &self.config)
            .field("boxes", &self.boxes.len())
            .field("edges", &self.edges.len())
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl BoxGraph {
    /// Create an empty graph with default configuration
    #[must_use]
    pub fn new(factory: impl BoxFactory + 'static) -> Self {
        Self::with_config(factory, GraphConfig::default())
    }

    /// Create an empty graph
    #[must_use]
    pub fn with_config(factory: impl BoxFactory + 'static, config: GraphConfig) -> Self {
        Self {
            config,
            factory: Box::new(factory),
            boxes: BTreeMap::new(),
            edges: GraphEdges::new(),
            hubs: BTreeMap::new(),
            next_creation_index: 0,
            next_subscription: 0,
            in_transaction: false,
            touched: IndexMap::new(),
            update_listeners: Listeners::default(),
            vertex_listeners: Vec::new(),
            transaction_listeners: Listeners::default(),
            deletion_listeners: BTreeMap::new(),
            end_transaction_observers: Vec::new(),
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Whether a transaction is open
    #[inline]
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Open a transaction
    ///
    /// # Panics
    /// Panics if a transaction is already open.
    pub fn begin_transaction(&mut self) {
        assert!(!self.in_transaction, "transaction already in progress");
        self.in_transaction = true;
        tracing::trace!("transaction begin");
        for listener in self.transaction_listeners.iter_mut() {
            listener(TransactionEvent::Begin);
        }
    }

    /// Close the transaction
    ///
    /// Flushes deferred pointer notifications, then runs observers registered
    /// with [`Self::subscribe_end_transaction`]. Observers may open their own
    /// transactions; observers they register run in the same call.
    ///
    /// # Panics
    /// Panics if no transaction is open, or a flushed pointer targets itself
    /// or a vertex that does not accept its type.
    pub fn end_transaction(&mut self) {
        assert!(self.in_transaction, "no transaction in progress");
        self.flush_pointer_notifications();
        self.in_transaction = false;
        tracing::trace!(boxes = self.boxes.len(), "transaction end");

        if self.config.verify_on_end_transaction {
            if let Err(error) = self.verify_pointers() {
                tracing::error!(%error, "pointer verification failed");
            }
        }
        for listener in self.transaction_listeners.iter_mut() {
            listener(TransactionEvent::End);
        }
        while !self.end_transaction_observers.is_empty() {
            let observers = std::mem::take(&mut self.end_transaction_observers);
            for observer in observers {
                observer(self);
            }
        }
    }

    fn assert_transaction(&self) {
        assert!(self.in_transaction, "modification outside of a transaction");
    }

    fn touch(&mut self, pointer: Address, initial: Option<Address>, pointer_type: PointerType) {
        self.touched.entry(pointer).or_insert(TouchedPointer {
            initial,
            pointer_type,
        });
    }

    fn flush_pointer_notifications(&mut self) {
        let touched = std::mem::take(&mut self.touched);
        for (pointer, TouchedPointer { initial, pointer_type }) in touched {
            let current = self.edges.target_of(&pointer).cloned();
            if initial == current {
                continue;
            }
            if let Some(old) = initial {
                self.notify_hub(&old, HubEventKind::Removed, &pointer, pointer_type);
            }
            if let Some(new) = current {
                if let Some(vertex) = self.find_vertex(&new) {
                    PointerHub::validate(&pointer, pointer_type, &vertex);
                }
                self.notify_hub(&new, HubEventKind::Added, &pointer, pointer_type);
            }
        }
    }

    fn notify_hub(
        &mut self,
        target: &Address,
        kind: HubEventKind,
        pointer: &Address,
        pointer_type: PointerType,
    ) {
        if let Some(hub) = self.hubs.get_mut(target) {
            hub.notify(&PointerHubEvent {
                kind,
                pointer: pointer.clone(),
                pointer_type,
            });
        }
    }

    fn dispatch(&mut self, update: &Update) {
        tracing::trace!(?update, "update");
        for listener in self.update_listeners.iter_mut() {
            listener(update);
        }
        let address = update.address();
        for listener in &mut self.vertex_listeners {
            if listener.propagation.matches(&listener.address, &address) {
                (listener.callback)(update);
            }
        }
    }

    // ------------------------------------------------------------------
    // Staging
    // ------------------------------------------------------------------

    /// Create an unstaged box through the factory
    ///
    /// # Errors
    /// Returns error if the factory does not know `name`
    pub fn instantiate(&self, name: &str, uuid: Uuid) -> Result<GraphBox, GraphError> {
        self.factory
            .create(name, uuid)
            .ok_or_else(|| GraphError::UnknownBoxKind(name.to_owned()))
    }

    /// Instantiate a box, run `constructor` on it and stage it
    ///
    /// # Errors
    /// Returns error if the kind is unknown or the UUID is taken
    ///
    /// # Panics
    /// Panics outside a transaction.
    pub fn create_box(
        &mut self,
        name: &str,
        uuid: Uuid,
        constructor: impl FnOnce(&mut GraphBox),
    ) -> Result<Uuid, GraphError> {
        let graph_box = self.instantiate(name, uuid)?;
        self.stage_box_with(graph_box, constructor)
    }

    /// Stage a box as it is
    ///
    /// # Errors
    /// Returns error if the UUID is taken
    ///
    /// # Panics
    /// Panics outside a transaction.
    pub fn stage_box(&mut self, graph_box: GraphBox) -> Result<Uuid, GraphError> {
        self.stage(graph_box, None)
    }

    /// Run `constructor` on the unstaged box, then stage it
    ///
    /// Writes made by the constructor emit no updates; the staged state is
    /// announced once as [`Update::New`].
    ///
    /// # Errors
    /// Returns error if the UUID is taken
    ///
    /// # Panics
    /// Panics outside a transaction.
    pub fn stage_box_with(
        &mut self,
        mut graph_box: GraphBox,
        constructor: impl FnOnce(&mut GraphBox),
    ) -> Result<Uuid, GraphError> {
        self.assert_transaction();
        constructor(&mut graph_box);
        self.stage(graph_box, None)
    }

    fn stage(&mut self, mut graph_box: GraphBox, creation_index: Option<u32>) -> Result<Uuid, GraphError> {
        self.assert_transaction();
        let uuid = graph_box.uuid();
        if self.boxes.contains_key(&uuid) {
            return Err(GraphError::DuplicateBox(uuid));
        }
        let index = creation_index.unwrap_or(self.next_creation_index);
        self.next_creation_index = self.next_creation_index.max(index.saturating_add(1));
        graph_box.set_creation_index(index);

        let connected: Vec<(Address, Address, PointerType)> = graph_box
            .pointer_fields()
            .into_iter()
            .filter_map(|pointer| {
                pointer
                    .target()
                    .map(|target| (pointer.address().clone(), target.clone(), pointer.pointer_type()))
            })
            .collect();
        for (pointer, target, pointer_type) in connected {
            self.edges.connect(pointer.clone(), target);
            self.touch(pointer, None, pointer_type);
        }
        for vertex in graph_box.vertices() {
            if vertex.rules().is_watched() {
                self.edges.watch_vertex(vertex.address().clone());
            }
        }

        let update = Update::New {
            uuid,
            name: graph_box.name().to_owned(),
            settings: graph_box.field_bytes(),
        };
        tracing::debug!(kind = graph_box.name(), %uuid, index, "box staged");
        self.boxes.insert(uuid, graph_box);
        self.dispatch(&update);
        Ok(uuid)
    }

    /// Remove a single box from the graph
    ///
    /// The box's own pointers are disconnected but keep their values, so the
    /// emitted [`Update::Delete`] can recreate it. Pointers from other boxes
    /// into it are left alone; use [`Self::delete_box`] to cascade.
    ///
    /// # Errors
    /// Returns error if the box is not staged
    ///
    /// # Panics
    /// Panics outside a transaction.
    pub fn unstage_box(&mut self, uuid: Uuid) -> Result<GraphBox, GraphError> {
        self.assert_transaction();
        let graph_box = self.boxes.remove(&uuid).ok_or(GraphError::BoxNotFound(uuid))?;

        for pointer in graph_box.pointer_fields() {
            if let Some(target) = self.edges.disconnect(pointer.address()) {
                self.touch(pointer.address().clone(), Some(target), pointer.pointer_type());
            }
        }
        self.edges.unwatch_vertices_of(uuid);
        self.hubs.retain(|vertex, _| vertex.uuid() != uuid);
        self.vertex_listeners
            .retain(|listener| listener.address.uuid() != uuid);

        let update = Update::Delete {
            uuid,
            name: graph_box.name().to_owned(),
            settings: graph_box.field_bytes(),
        };
        tracing::debug!(kind = graph_box.name(), %uuid, "box unstaged");
        self.dispatch(&update);

        if let Some(callbacks) = self.deletion_listeners.remove(&uuid) {
            for (_, callback) in callbacks {
                callback(uuid);
            }
        }
        Ok(graph_box)
    }

    // ------------------------------------------------------------------
    // Field writes
    // ------------------------------------------------------------------

    /// Write a primitive field
    ///
    /// Writing the current value is a no-op.
    ///
    /// # Panics
    /// Panics outside a transaction, if the box or primitive field does not
    /// exist, or if the value variant differs from the field's.
    pub fn set_primitive(&mut self, address: &Address, value: impl Into<PrimitiveValue>) {
        self.assert_transaction();
        let value = value.into();
        let field = self
            .boxes
            .get_mut(&address.uuid())
            .and_then(|graph_box| graph_box.find_field_mut(address.field_keys()));
        let Some(Field::Primitive(field)) = field else {
            panic!("no primitive field at {address}");
        };
        if let Some(old) = field.replace(value.clone()) {
            self.dispatch(&Update::Primitive {
                address: address.clone(),
                old,
                new: value,
            });
        }
    }

    /// Re-target a pointer field
    ///
    /// Edges change immediately; hub listeners hear about it when the
    /// transaction ends.
    ///
    /// # Panics
    /// Panics outside a transaction or if the box or pointer field does not
    /// exist.
    pub fn set_pointer(&mut self, address: &Address, target: Option<Address>) {
        self.assert_transaction();
        let field = self
            .boxes
            .get_mut(&address.uuid())
            .and_then(|graph_box| graph_box.find_field_mut(address.field_keys()));
        let Some(Field::Pointer(field)) = field else {
            panic!("no pointer field at {address}");
        };
        let pointer_type = field.pointer_type();
        let Some(old) = field.replace(target.clone()) else {
            return;
        };
        self.edges.disconnect(address);
        if let Some(new) = &target {
            self.edges.connect(address.clone(), new.clone());
        }
        self.touch(address.clone(), old.clone(), pointer_type);
        self.dispatch(&Update::Pointer {
            address: address.clone(),
            old,
            new: target,
        });
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Staged box by UUID
    #[inline]
    #[must_use]
    pub fn find_box(&self, uuid: Uuid) -> Option<&GraphBox> {
        self.boxes.get(&uuid)
    }

    /// Box or field at `address`
    #[must_use]
    pub fn find_vertex(&self, address: &Address) -> Option<Vertex<'_>> {
        self.boxes.get(&address.uuid())?.vertex(address.field_keys())
    }

    /// Primitive value at `address`
    #[must_use]
    pub fn primitive(&self, address: &Address) -> Option<&PrimitiveValue> {
        self.boxes.get(&address.uuid())?.primitive(address.field_keys())
    }

    /// Pointer target at `address`
    #[must_use]
    pub fn pointer_target(&self, address: &Address) -> Option<&Address> {
        self.boxes
            .get(&address.uuid())?
            .pointer_target(address.field_keys())
    }

    /// Human-readable path such as `Item:<uuid>/settings/gain`
    #[must_use]
    pub fn find_address_to_debug_path(&self, address: &Address) -> Option<String> {
        let graph_box = self.boxes.get(&address.uuid())?;
        let mut path = format!("{}:{}", graph_box.name(), address.uuid());
        let keys = address.field_keys();
        for end in 1..=keys.len() {
            path.push('/');
            path.push_str(graph_box.find_field(&keys[..end])?.name());
        }
        Some(path)
    }

    /// Staged boxes in UUID order
    pub fn boxes(&self) -> impl Iterator<Item = &GraphBox> {
        self.boxes.values()
    }

    /// Staged boxes of one kind, in UUID order
    #[must_use]
    pub fn boxes_of_kind(&self, name: &str) -> Vec<&GraphBox> {
        self.boxes
            .values()
            .filter(|graph_box| graph_box.name() == name)
            .collect()
    }

    /// Number of staged boxes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether no box is staged
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Whether a box with this UUID is staged
    #[inline]
    #[must_use]
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.boxes.contains_key(&uuid)
    }

    /// Edge index
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &GraphEdges {
        &self.edges
    }

    /// Pointers targeting exactly `address`
    #[must_use]
    pub fn incoming_edges_of(&self, address: &Address) -> Vec<Address> {
        self.edges.incoming_edges_of(address)
    }

    /// Pointers targeting the box or any of its fields, as `(pointer, target)`
    #[must_use]
    pub fn incoming_edges_of_box(&self, uuid: Uuid) -> Vec<(Address, Address)> {
        self.edges.incoming_edges_of_box(uuid)
    }

    /// Connected pointers owned by the box, as `(pointer, target)`
    #[must_use]
    pub fn outgoing_edges_of(&self, uuid: Uuid) -> Vec<(Address, Address)> {
        self.edges.outgoing_edges_of(uuid)
    }

    pub(crate) fn pointer_type_of(&self, pointer: &Address) -> Option<PointerType> {
        self.boxes
            .get(&pointer.uuid())?
            .find_field(pointer.field_keys())?
            .as_pointer()
            .map(|field| field.pointer_type())
    }

    pub(crate) fn is_mandatory_pointer(&self, pointer: &Address) -> bool {
        self.boxes
            .get(&pointer.uuid())
            .and_then(|graph_box| graph_box.find_field(pointer.field_keys()))
            .and_then(Field::as_pointer)
            .is_some_and(|field| field.is_mandatory())
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Whether the box satisfies its own pointer requirements
    ///
    /// A box is valid when every mandatory pointer field is set and every
    /// vertex requiring an incoming pointer has one.
    #[must_use]
    pub fn is_box_valid(&self, uuid: Uuid) -> bool {
        let Some(graph_box) = self.boxes.get(&uuid) else {
            return false;
        };
        !graph_box.has_empty_mandatory_pointer()
            && graph_box.vertices().iter().all(|vertex| {
                !vertex.rules().is_mandatory() || self.edges.incoming_count(vertex.address()) > 0
            })
    }

    /// Sweep all boxes for unsatisfied pointer rules
    ///
    /// # Errors
    /// Returns the first violation found
    pub fn validate_requirements(&self) -> Result<(), IntegrityError> {
        for graph_box in self.boxes.values() {
            if let Some(pointer) = graph_box
                .pointer_fields()
                .into_iter()
                .find(|pointer| pointer.is_mandatory() && pointer.is_empty())
            {
                return Err(IntegrityError::MissingMandatoryPointer {
                    pointer: pointer.address().clone(),
                });
            }
        }
        for vertex in self.edges.watched() {
            let Some(found) = self.find_vertex(vertex) else {
                continue;
            };
            let count = self.edges.incoming_count(vertex);
            let rules = found.rules();
            if rules.is_mandatory() && count == 0 {
                return Err(IntegrityError::MissingIncomingPointer {
                    vertex: vertex.clone(),
                });
            }
            if rules.is_exclusive() && count > 1 {
                return Err(IntegrityError::ExclusiveViolated {
                    vertex: vertex.clone(),
                    count,
                });
            }
        }
        Ok(())
    }

    /// Check that every connected pointer resolves to a staged vertex
    ///
    /// # Errors
    /// Returns the first dangling pointer
    pub fn verify_pointers(&self) -> Result<(), IntegrityError> {
        for (pointer, target) in self.edges.iter() {
            if self.find_vertex(target).is_none() {
                return Err(IntegrityError::DanglingPointer {
                    pointer: pointer.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    fn next_subscription(&mut self) -> Subscription {
        self.next_subscription += 1;
        Subscription::new(self.next_subscription)
    }

    /// Listen to every update
    pub fn subscribe_to_all_updates(&mut self, callback: impl FnMut(&Update) + 'static) -> Subscription {
        let subscription = self.next_subscription();
        self.update_listeners.add(subscription, Box::new(callback));
        subscription
    }

    /// Listen to updates at `address` (and below, with [`Propagation::Children`])
    ///
    /// The subscription ends when the box at `address` is unstaged.
    pub fn subscribe_vertex_updates(
        &mut self,
        propagation: Propagation,
        address: Address,
        callback: impl FnMut(&Update) + 'static,
    ) -> Subscription {
        let subscription = self.next_subscription();
        self.vertex_listeners.push(VertexListener {
            subscription,
            propagation,
            address,
            callback: Box::new(callback),
        });
        subscription
    }

    /// Listen to transaction boundaries
    pub fn subscribe_transaction(
        &mut self,
        callback: impl FnMut(TransactionEvent) + 'static,
    ) -> Subscription {
        let subscription = self.next_subscription();
        self.transaction_listeners.add(subscription, Box::new(callback));
        subscription
    }

    /// Call `callback` once when the box is unstaged
    pub fn subscribe_deletion(&mut self, uuid: Uuid, callback: impl FnOnce(Uuid) + 'static) -> Subscription {
        let subscription = self.next_subscription();
        self.deletion_listeners
            .entry(uuid)
            .or_default()
            .push((subscription, Box::new(callback)));
        subscription
    }

    /// Listen to pointers arriving at or leaving `address`
    ///
    /// Notifications arrive when the transaction that changed the pointer
    /// ends. The subscription ends when the box owning `address` is unstaged.
    pub fn subscribe_pointer_hub(
        &mut self,
        address: Address,
        filter: Option<PointerType>,
        callback: impl FnMut(&PointerHubEvent) + 'static,
    ) -> Subscription {
        let subscription = self.next_subscription();
        self.hubs
            .entry(address)
            .or_default()
            .subscribe(subscription, filter, Box::new(callback));
        subscription
    }

    /// Replay currently connected pointers at `address`, then keep listening
    ///
    /// A pointer is announced at most once even if its deferred notification
    /// from the open transaction arrives after the replay.
    pub fn catchup_and_subscribe_pointer_hub(
        &mut self,
        address: Address,
        filter: Option<PointerType>,
        callback: impl FnMut(&PointerHubEvent) + 'static,
    ) -> Subscription {
        let subscription = self.next_subscription();
        let current = self
            .edges
            .incoming_edges_of(&address)
            .into_iter()
            .filter_map(|pointer| {
                let pointer_type = self.pointer_type_of(&pointer)?;
                Some((pointer, pointer_type))
            })
            .collect();
        self.hubs.entry(address).or_default().catchup_and_subscribe(
            subscription,
            filter,
            current,
            Box::new(callback),
        );
        subscription
    }

    /// Run `observer` once after the current (or next) transaction ends
    ///
    /// The observer gets the graph and may open its own transactions.
    pub fn subscribe_end_transaction(&mut self, observer: impl FnOnce(&mut BoxGraph) + 'static) {
        self.end_transaction_observers.push(Box::new(observer));
    }

    /// Cancel a subscription
    ///
    /// Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        if self.update_listeners.remove(subscription) || self.transaction_listeners.remove(subscription) {
            return true;
        }
        let before = self.vertex_listeners.len();
        self.vertex_listeners
            .retain(|listener| listener.subscription != subscription);
        if before != self.vertex_listeners.len() {
            return true;
        }
        let owner = self.deletion_listeners.iter().find_map(|(uuid, callbacks)| {
            callbacks
                .iter()
                .any(|(entry, _)| *entry == subscription)
                .then_some(*uuid)
        });
        if let Some(uuid) = owner {
            if let Some(callbacks) = self.deletion_listeners.get_mut(&uuid) {
                callbacks.retain(|(entry, _)| *entry != subscription);
                if callbacks.is_empty() {
                    self.deletion_listeners.remove(&uuid);
                }
            }
            return true;
        }
        let removed = self
            .hubs
            .values_mut()
            .any(|hub| hub.unsubscribe(subscription));
        self.hubs.retain(|_, hub| !hub.is_empty());
        removed
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Digest of all boxes, independent of creation order
    ///
    /// Hashes kind, UUID and field payload of every box in UUID order.
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        let mut builder = ChecksumBuilder::new();
        for graph_box in self.boxes.values() {
            builder.add_box(graph_box);
        }
        builder.finish()
    }

    fn boxes_in_creation_order(&self) -> Vec<&GraphBox> {
        let mut ordered: Vec<&GraphBox> = self.boxes.values().collect();
        ordered.sort_by_key(|graph_box| graph_box.creation_index());
        ordered
    }

    /// Binary snapshot of all boxes
    ///
    /// Layout: `[count:i32]` then per box
    /// `[len:i32][creationIndex:i32][name:string][uuid:16][fields]`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_len(self.boxes.len());
        for graph_box in self.boxes_in_creation_order() {
            let mut record = ByteWriter::new();
            record.write_len(graph_box.creation_index() as usize);
            record.write_string(graph_box.name());
            record.write_uuid(&graph_box.uuid());
            graph_box.write_fields(&mut record);
            writer.write_bytes(&record.into_bytes());
        }
        writer.into_bytes()
    }

    /// Load a snapshot written by [`Self::to_bytes`]
    ///
    /// All records are decoded before anything is staged, so a failed load
    /// leaves the graph untouched. Boxes are staged in creation order in a
    /// dedicated transaction.
    ///
    /// # Errors
    /// Returns error on malformed input, unknown kinds or UUID clashes
    ///
    /// # Panics
    /// Panics if a transaction is open.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), GraphError> {
        let mut reader = ByteReader::new(bytes);
        let count = reader.read_len()?;
        let mut records = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            let declared = reader.read_len()?;
            let mut record = ByteReader::new(reader.read_raw(declared)?);
            let creation_index = record.read_len()?;
            let name = record.read_string()?;
            let uuid = record.read_uuid()?;
            let mut graph_box = self.instantiate(&name, uuid)?;
            graph_box.read_fields(&mut record, &keep_address)?;
            if record.remaining() > 0 {
                return Err(DecodeError::LengthMismatch {
                    uuid,
                    declared,
                    consumed: declared - record.remaining(),
                }
                .into());
            }
            let creation_index =
                u32::try_from(creation_index).map_err(|_| DecodeError::InvalidLength(i32::MAX))?;
            records.push((creation_index, graph_box));
        }
        if reader.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()).into());
        }
        self.stage_loaded(records)
    }

    /// JSON mirror of [`Self::to_bytes`]
    ///
    /// `{ "<uuid>": { "name": .., "index": .., "fields": { "<key>": .. } } }`
    #[must_use]
    pub fn to_json(&self) -> Value {
        let entries: Map<String, Value> = self
            .boxes_in_creation_order()
            .into_iter()
            .map(|graph_box| {
                (
                    graph_box.uuid().to_string(),
                    json!({
                        "name": graph_box.name(),
                        "index": graph_box.creation_index(),
                        "fields": graph_box.fields_to_json(),
                    }),
                )
            })
            .collect();
        Value::Object(entries)
    }

    /// Load a document written by [`Self::to_json`]
    ///
    /// # Errors
    /// Returns error on malformed input, unknown kinds or UUID clashes
    ///
    /// # Panics
    /// Panics if a transaction is open.
    pub fn load_json(&mut self, value: &Value) -> Result<(), GraphError> {
        let entries = value
            .as_object()
            .ok_or_else(|| DecodeError::Json("graph document must be an object".into()))?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            let address: Address = key.parse().map_err(DecodeError::from)?;
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| DecodeError::Json(format!("box {key} has no name")))?;
            let creation_index = entry
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|index| u32::try_from(index).ok())
                .ok_or_else(|| DecodeError::Json(format!("box {key} has no valid index")))?;
            let fields = entry
                .get("fields")
                .ok_or_else(|| DecodeError::Json(format!("box {key} has no fields")))?;
            let mut graph_box = self.instantiate(name, address.uuid())?;
            graph_box.read_fields_json(fields, &keep_address)?;
            records.push((creation_index, graph_box));
        }
        self.stage_loaded(records)
    }

    fn stage_loaded(&mut self, mut records: Vec<(u32, GraphBox)>) -> Result<(), GraphError> {
        records.sort_by_key(|(index, _)| *index);
        let mut seen = HashSet::with_capacity(records.len());
        for (_, graph_box) in &records {
            let uuid = graph_box.uuid();
            if self.boxes.contains_key(&uuid) || !seen.insert(uuid) {
                return Err(GraphError::DuplicateBox(uuid));
            }
        }
        tracing::debug!(boxes = records.len(), "loading boxes");
        self.begin_transaction();
        let result = records
            .into_iter()
            .try_for_each(|(index, graph_box)| self.stage(graph_box, Some(index)).map(|_| ()));
        self.end_transaction();
        result
    }
}
