//! Incoming-pointer notifications per vertex
//!
//! The set of pointers targeting a vertex is derived from
//! [`crate::GraphEdges`]; a [`PointerHub`] only keeps the listeners for one
//! vertex and validates every pointer that is about to be announced.

use crate::address::Address;
use crate::boxes::Vertex;
use crate::field::PointerType;
use crate::subscription::Subscription;
use std::collections::HashSet;
use std::fmt;

/// Whether a pointer started or stopped targeting the vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubEventKind {
    /// Pointer now targets the vertex
    Added,
    /// Pointer no longer targets the vertex
    Removed,
}

/// Notification delivered to hub listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerHubEvent {
    /// Added or removed
    pub kind: HubEventKind,
    /// Address of the pointer field
    pub pointer: Address,
    /// Type of the pointer field
    pub pointer_type: PointerType,
}

type HubCallback = Box<dyn FnMut(&PointerHubEvent)>;

struct HubListener {
    subscription: Subscription,
    filter: Option<PointerType>,
    /// Pointers already delivered; only tracked for catch-up listeners
    delivered: Option<HashSet<Address>>,
    callback: HubCallback,
}

impl HubListener {
    fn deliver(&mut self, event: &PointerHubEvent) {
        if self.filter.is_some_and(|filter| filter != event.pointer_type) {
            return;
        }
        if let Some(delivered) = &mut self.delivered {
            let fresh = match event.kind {
                HubEventKind::Added => delivered.insert(event.pointer.clone()),
                HubEventKind::Removed => delivered.remove(&event.pointer),
            };
            if !fresh {
                return;
            }
        }
        (self.callback)(event);
    }
}

/// Listeners for pointers targeting one vertex
#[derive(Default)]
pub struct PointerHub {
    listeners: Vec<HubListener>,
}

impl fmt::Debug for PointerHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerHub")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl PointerHub {
    /// Check that `pointer` may target `target`
    ///
    /// # Panics
    /// Panics if the pointer targets its own address or the target does not
    /// accept the pointer type. Both are programming faults.
    pub fn validate(pointer: &Address, pointer_type: PointerType, target: &Vertex<'_>) {
        assert!(
            pointer != target.address(),
            "pointer {pointer} cannot target itself"
        );
        assert!(
            target.rules().accepts(pointer_type),
            "{} at {} does not accept {pointer_type} from {pointer}",
            target.owner().name(),
            target.address()
        );
    }

    /// Number of listeners
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn subscribe(
        &mut self,
        subscription: Subscription,
        filter: Option<PointerType>,
        callback: HubCallback,
    ) {
        self.listeners.push(HubListener {
            subscription,
            filter,
            delivered: None,
            callback,
        });
    }

    /// Replay `current` pointers, then keep listening
    ///
    /// Pointers replayed here are not announced a second time when their
    /// deferred notification arrives later.
    pub(crate) fn catchup_and_subscribe(
        &mut self,
        subscription: Subscription,
        filter: Option<PointerType>,
        current: Vec<(Address, PointerType)>,
        callback: HubCallback,
    ) {
        let mut listener = HubListener {
            subscription,
            filter,
            delivered: Some(HashSet::new()),
            callback,
        };
        for (pointer, pointer_type) in current {
            listener.deliver(&PointerHubEvent {
                kind: HubEventKind::Added,
                pointer,
                pointer_type,
            });
        }
        self.listeners.push(listener);
    }

    pub(crate) fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|listener| listener.subscription != subscription);
        before != self.listeners.len()
    }

    pub(crate) fn notify(&mut self, event: &PointerHubEvent) {
        for listener in &mut self.listeners {
            listener.deliver(event);
        }
    }
}
