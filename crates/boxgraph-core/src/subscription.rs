//! Subscription handles and listener registries

use crate::address::Address;
use crate::update::Update;

/// Handle returned by every `subscribe_*` call
///
/// Pass it to [`crate::BoxGraph::unsubscribe`] to stop listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(u64);

impl Subscription {
    #[inline]
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric id
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Scope of a vertex subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Updates of exactly the subscribed address
    #[default]
    This,
    /// Updates of the address and everything below it
    Children,
}

impl Propagation {
    /// Check if an update at `changed` reaches a listener at `subscribed`
    #[must_use]
    pub fn matches(self, subscribed: &Address, changed: &Address) -> bool {
        match self {
            Self::This => subscribed == changed,
            Self::Children => changed.starts_with(subscribed),
        }
    }
}

/// Transaction boundary notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    /// A transaction was opened
    Begin,
    /// A transaction was closed and pointer notifications were flushed
    End,
}

/// Ordered registry of boxed callbacks
pub(crate) struct Listeners<F: ?Sized> {
    entries: Vec<(Subscription, Box<F>)>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    pub(crate) fn add(&mut self, subscription: Subscription, callback: Box<F>) {
        self.entries.push((subscription, callback));
    }

    pub(crate) fn remove(&mut self, subscription: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != subscription);
        before != self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<F>> {
        self.entries.iter_mut().map(|(_, callback)| callback)
    }
}

/// Listener bound to an address
pub(crate) struct VertexListener {
    pub(crate) subscription: Subscription,
    pub(crate) propagation: Propagation,
    pub(crate) address: Address,
    pub(crate) callback: Box<dyn FnMut(&Update)>,
}
