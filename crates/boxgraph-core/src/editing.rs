//! Undo/redo over a box graph
//!
//! Provides [`BoxEditing`], a linear history of recorded modifications.
//!
//! # State
//! - `pending`: modifications recorded since the last mark
//! - `marked`: committed history entries, each a group of modifications
//! - `history_index`: cursor into `marked`; entries at or beyond it are redo
//!
//! The saved position is an optional history index. `None` means the saved
//! state was spliced out of history and the session stays dirty until the
//! next save.

use crate::config::EditingConfig;
use crate::error::GraphError;
use crate::graph::BoxGraph;
use crate::subscription::Subscription;
use crate::update::{Modification, Update};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Collects every update emitted while it is active
#[derive(Debug)]
struct Recording {
    updates: Rc<RefCell<Vec<Update>>>,
    subscription: Subscription,
}

impl Recording {
    fn start(graph: &mut BoxGraph) -> Self {
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&updates);
        let subscription =
            graph.subscribe_to_all_updates(move |update| sink.borrow_mut().push(update.clone()));
        Self {
            updates,
            subscription,
        }
    }

    fn finish(self, graph: &mut BoxGraph) -> Modification {
        graph.unsubscribe(self.subscription);
        let updates = std::mem::take(&mut *self.updates.borrow_mut());
        Modification::new(updates)
    }
}

/// Editing session owning a graph
#[derive(Debug)]
pub struct BoxEditing {
    graph: BoxGraph,
    config: EditingConfig,
    pending: Vec<Modification>,
    marked: VecDeque<Vec<Modification>>,
    history_index: usize,
    saved_index: Option<usize>,
    enabled: bool,
    process: Option<Recording>,
}

impl BoxEditing {
    /// Start a session with default configuration
    #[must_use]
    pub fn new(graph: BoxGraph) -> Self {
        Self::with_config(graph, EditingConfig::default())
    }

    /// Start a session; the initial state counts as saved
    #[must_use]
    pub fn with_config(graph: BoxGraph, config: EditingConfig) -> Self {
        Self {
            graph,
            config,
            pending: Vec::new(),
            marked: VecDeque::new(),
            history_index: 0,
            saved_index: Some(0),
            enabled: true,
            process: None,
        }
    }

    /// The edited graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &BoxGraph {
        &self.graph
    }

    /// Mutable access to the graph
    ///
    /// Changes made here outside of [`Self::modify`] or an open
    /// [`Self::begin_modification`] are not recorded.
    #[inline]
    pub fn graph_mut(&mut self) -> &mut BoxGraph {
        &mut self.graph
    }

    /// Give the graph back
    #[inline]
    #[must_use]
    pub fn into_graph(self) -> BoxGraph {
        self.graph
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EditingConfig {
        &self.config
    }

    /// Position of the history cursor
    #[inline]
    #[must_use]
    pub fn history_index(&self) -> usize {
        self.history_index
    }

    /// Number of marked history entries
    #[inline]
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.marked.len()
    }

    /// Saved history position, `None` once it was spliced out
    #[inline]
    #[must_use]
    pub fn saved_index(&self) -> Option<usize> {
        self.saved_index
    }

    /// Run `f` in one recorded transaction and mark the result
    ///
    /// `f` gets the graph directly, so any work it does is part of this one
    /// transaction. The modification is kept even when the requirement
    /// sweep afterwards fails.
    ///
    /// # Errors
    /// Returns the integrity violation found after the transaction
    ///
    /// # Panics
    /// Panics while a [`Self::begin_modification`] process is open.
    pub fn modify<R>(&mut self, f: impl FnOnce(&mut BoxGraph) -> R) -> Result<R, GraphError> {
        self.run_modify(f, true)
    }

    /// Like [`Self::modify`] but leaves the modification pending
    ///
    /// Pending modifications are grouped into one history entry by the next
    /// [`Self::mark`].
    ///
    /// # Errors
    /// Returns the integrity violation found after the transaction
    ///
    /// # Panics
    /// Panics while a [`Self::begin_modification`] process is open.
    pub fn modify_unmarked<R>(&mut self, f: impl FnOnce(&mut BoxGraph) -> R) -> Result<R, GraphError> {
        self.run_modify(f, false)
    }

    fn run_modify<R>(&mut self, f: impl FnOnce(&mut BoxGraph) -> R, mark: bool) -> Result<R, GraphError> {
        assert!(self.process.is_none(), "cannot modify while a modification is in progress");
        let recording = Recording::start(&mut self.graph);
        self.graph.begin_transaction();
        let result = f(&mut self.graph);
        self.graph.end_transaction();
        let modification = recording.finish(&mut self.graph);
        self.record(modification);
        if mark {
            self.mark();
        }
        self.validate()?;
        Ok(result)
    }

    fn record(&mut self, modification: Modification) {
        if self.enabled && !modification.is_empty() {
            tracing::trace!(updates = modification.len(), "modification recorded");
            self.pending.push(modification);
        }
    }

    fn validate(&self) -> Result<(), GraphError> {
        if !self.config.validate_after_replay {
            return Ok(());
        }
        self.graph.validate_requirements().map_err(|error| {
            tracing::error!(%error, "requirement sweep failed");
            GraphError::from(error)
        })
    }

    /// Commit pending modifications as one history entry
    ///
    /// Drops redo entries beyond the cursor. If the saved position was among
    /// them, the session becomes permanently dirty until the next save.
    pub fn mark(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if self.marked.len() > self.history_index {
            if self.saved_index.is_some_and(|saved| saved > self.history_index) {
                self.saved_index = None;
            }
            let dropped = self.marked.len() - self.history_index;
            self.marked.truncate(self.history_index);
            tracing::debug!(dropped, "redo history truncated");
        }
        self.marked.push_back(std::mem::take(&mut self.pending));
        self.history_index += 1;

        if let Some(limit) = self.config.history_limit {
            while self.marked.len() > limit {
                self.marked.pop_front();
                self.history_index -= 1;
                self.saved_index = self.saved_index.and_then(|saved| saved.checked_sub(1));
                tracing::debug!(limit, "oldest history entry dropped");
            }
        }
    }

    /// Whether [`Self::undo`] would do something
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.enabled && (self.history_index > 0 || !self.pending.is_empty())
    }

    /// Whether [`Self::redo`] would do something
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.enabled && self.pending.is_empty() && self.history_index < self.marked.len()
    }

    /// Revert the entry before the cursor
    ///
    /// Pending modifications are marked first. Returns `false` at the start
    /// of history or while disabled.
    ///
    /// # Errors
    /// Returns error if replay fails or the requirement sweep afterwards does
    ///
    /// # Panics
    /// Panics while a [`Self::begin_modification`] process is open.
    pub fn undo(&mut self) -> Result<bool, GraphError> {
        if !self.enabled {
            return Ok(false);
        }
        assert!(self.process.is_none(), "cannot undo while a modification is in progress");
        self.mark();
        if self.history_index == 0 {
            return Ok(false);
        }
        let entry = &self.marked[self.history_index - 1];
        self.graph.begin_transaction();
        let replayed = entry
            .iter()
            .rev()
            .try_for_each(|modification| modification.apply_inverse(&mut self.graph));
        self.graph.end_transaction();
        replayed?;
        self.history_index -= 1;
        tracing::debug!(history_index = self.history_index, "undo");
        self.validate()?;
        Ok(true)
    }

    /// Re-apply the entry at the cursor
    ///
    /// Returns `false` at the end of history or while disabled.
    ///
    /// # Errors
    /// Returns error if replay fails or the requirement sweep afterwards does
    ///
    /// # Panics
    /// Panics while a [`Self::begin_modification`] process is open.
    pub fn redo(&mut self) -> Result<bool, GraphError> {
        if !self.enabled {
            return Ok(false);
        }
        assert!(self.process.is_none(), "cannot redo while a modification is in progress");
        self.mark();
        if self.history_index >= self.marked.len() {
            return Ok(false);
        }
        let entry = &self.marked[self.history_index];
        self.graph.begin_transaction();
        let replayed = entry
            .iter()
            .try_for_each(|modification| modification.apply_forward(&mut self.graph));
        self.graph.end_transaction();
        replayed?;
        self.history_index += 1;
        tracing::debug!(history_index = self.history_index, "redo");
        self.validate()?;
        Ok(true)
    }

    /// Open a long-running modification (e.g. a live drag)
    ///
    /// Keeps a transaction open on the graph; write through
    /// [`Self::graph_mut`] and finish with [`Self::approve`] or
    /// [`Self::revert`].
    ///
    /// # Panics
    /// Panics if a process is already open.
    pub fn begin_modification(&mut self) {
        assert!(self.process.is_none(), "modification already in progress");
        let recording = Recording::start(&mut self.graph);
        self.graph.begin_transaction();
        self.process = Some(recording);
    }

    /// Whether a [`Self::begin_modification`] process is open
    #[inline]
    #[must_use]
    pub fn is_modifying(&self) -> bool {
        self.process.is_some()
    }

    /// Commit the open process as one history entry
    ///
    /// # Errors
    /// Returns the integrity violation found afterwards
    ///
    /// # Panics
    /// Panics if no process is open.
    pub fn approve(&mut self) -> Result<(), GraphError> {
        let Some(recording) = self.process.take() else {
            panic!("no modification in progress");
        };
        self.graph.end_transaction();
        let modification = recording.finish(&mut self.graph);
        self.record(modification);
        self.mark();
        self.validate()
    }

    /// Roll the open process back without touching history
    ///
    /// # Errors
    /// Returns error if the rollback fails or the sweep afterwards does
    ///
    /// # Panics
    /// Panics if no process is open.
    pub fn revert(&mut self) -> Result<(), GraphError> {
        let Some(recording) = self.process.take() else {
            panic!("no modification in progress");
        };
        self.graph.end_transaction();
        let modification = recording.finish(&mut self.graph);
        if !modification.is_empty() {
            modification.inverse(&mut self.graph)?;
        }
        tracing::debug!(updates = modification.len(), "modification reverted");
        self.validate()
    }

    /// Whether the graph differs from the last saved state
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty() || self.saved_index != Some(self.history_index)
    }

    /// Record the current state as saved
    pub fn mark_saved(&mut self) {
        self.mark();
        self.saved_index = Some(self.history_index);
    }

    /// Forget all history, keeping the current graph
    pub fn clear_history(&mut self) {
        let clean = !self.has_unsaved_changes();
        self.pending.clear();
        self.marked.clear();
        self.history_index = 0;
        self.saved_index = clean.then_some(0);
    }

    /// Stop recording; undo and redo become no-ops
    #[inline]
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Resume recording
    #[inline]
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Whether recording is on
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
