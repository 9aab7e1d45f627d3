//! Selection state for the monitoring and session contexts.
//!
//! Two independent selection sets, each synchronized against group
//! membership. Edits accumulate in a *staged* set that only the editor sees;
//! `commit` copies it into the *applied* set that consumers read and emits a
//! [`SelectionChanged`] notification. This models a UI where an operator
//! builds up a selection and then applies it.

use std::collections::BTreeSet;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{FleetError, Result};
use crate::events::{selection_channel, SelectionChanged, SelectionFeed};
use crate::registry::{GroupId, Registry};

/// The purpose a server subset is tracked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionContext {
    /// Hosts to poll for resource metrics.
    Monitoring,
    /// Hosts eligible for session inspection.
    Session,
}

impl SelectionContext {
    /// Returns the display label for this context.
    pub fn label(&self) -> &'static str {
        match self {
            SelectionContext::Monitoring => "monitoring",
            SelectionContext::Session => "session",
        }
    }
}

/// One context's staged and applied address sets.
#[derive(Debug, Default, Clone)]
struct SelectionSet {
    staged: BTreeSet<String>,
    applied: BTreeSet<String>,
}

/// Both selection contexts plus the committed-selection notifier.
pub struct SelectionState {
    monitoring: SelectionSet,
    session: SelectionSet,
    notifier: watch::Sender<SelectionChanged>,
}

impl SelectionState {
    /// Create the selection state and the feed consumers subscribe to.
    pub fn new() -> (Self, SelectionFeed) {
        let (notifier, feed) = selection_channel();
        let state = Self {
            monitoring: SelectionSet::default(),
            session: SelectionSet::default(),
            notifier,
        };
        (state, feed)
    }

    fn set(&self, context: SelectionContext) -> &SelectionSet {
        match context {
            SelectionContext::Monitoring => &self.monitoring,
            SelectionContext::Session => &self.session,
        }
    }

    fn set_mut(&mut self, context: SelectionContext) -> &mut SelectionSet {
        match context {
            SelectionContext::Monitoring => &mut self.monitoring,
            SelectionContext::Session => &mut self.session,
        }
    }

    /// Flip one address's staged membership.
    ///
    /// Fails with [`FleetError::UnknownServer`] if the registry does not
    /// contain the address, so a selection set can never acquire an address
    /// the registry lacks.
    pub fn toggle_server(
        &mut self,
        registry: &Registry,
        context: SelectionContext,
        address: &str,
    ) -> Result<()> {
        if !registry.contains(address) {
            return Err(FleetError::UnknownServer(address.to_string()));
        }
        let staged = &mut self.set_mut(context).staged;
        if !staged.remove(address) {
            staged.insert(address.to_string());
        }
        Ok(())
    }

    /// Toggle a whole group with all-or-nothing semantics.
    ///
    /// The group counts as selected only when 100% of its members are in the
    /// staged set; toggling always moves the group to the opposite of that
    /// exact state. Applying the toggle twice with no intervening change
    /// restores the original per-member selection.
    pub fn toggle_group(
        &mut self,
        registry: &Registry,
        context: SelectionContext,
        group_id: GroupId,
    ) -> Result<()> {
        let members = registry.lookup_group(group_id)?.members.clone();
        let staged = &mut self.set_mut(context).staged;
        let all_selected = members.iter().all(|addr| staged.contains(addr));

        if all_selected {
            for addr in &members {
                staged.remove(addr);
            }
        } else {
            for addr in &members {
                staged.insert(addr.clone());
            }
        }
        Ok(())
    }

    /// Whether every member of a group is currently staged.
    ///
    /// Derived checkbox state for presentation. Pure function of the current
    /// selection and group membership, recomputed on every call - it is never
    /// cached, so it cannot go stale across a `toggle_server`.
    pub fn group_fully_selected(
        &self,
        registry: &Registry,
        context: SelectionContext,
        group_id: GroupId,
    ) -> Result<bool> {
        let group = registry.lookup_group(group_id)?;
        let staged = &self.set(context).staged;
        Ok(group.members.iter().all(|addr| staged.contains(addr)))
    }

    /// Stage every registered address.
    pub fn select_all(&mut self, registry: &Registry, context: SelectionContext) {
        self.set_mut(context).staged = registry.addresses();
    }

    /// Empty the staged set.
    pub fn clear(&mut self, context: SelectionContext) {
        self.set_mut(context).staged.clear();
    }

    /// Check if an address matches a visibility filter.
    ///
    /// Case-insensitive substring match on the address. Pure - used by
    /// presentation to decide visibility, never affects the selection itself.
    pub fn matches_filter(&self, query: &str, address: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        address.to_lowercase().contains(&query.to_lowercase())
    }

    /// Finalize the staged selection into the applied selection and notify
    /// consumers.
    pub fn commit(&mut self, context: SelectionContext) -> SelectionChanged {
        let set = self.set_mut(context);
        set.applied = set.staged.clone();

        let event = SelectionChanged {
            context,
            servers: set.applied.clone(),
        };
        debug!(
            context = context.label(),
            servers = event.servers.len(),
            "selection committed"
        );
        // Consumers may all have gone away; commit still succeeds.
        let _ = self.notifier.send(event.clone());
        event
    }

    /// Drop an address from both staged and applied sets of both contexts.
    ///
    /// Called by the composition root when a server leaves the registry, so
    /// the invariant "no selection contains an unregistered address" holds.
    pub fn purge(&mut self, address: &str) {
        for set in [&mut self.monitoring, &mut self.session] {
            set.staged.remove(address);
            set.applied.remove(address);
        }
    }

    /// The committed selection consumers act on.
    pub fn applied(&self, context: SelectionContext) -> &BTreeSet<String> {
        &self.set(context).applied
    }

    /// The in-progress selection visible only to the editor.
    pub fn staged(&self, context: SelectionContext) -> &BTreeSet<String> {
        &self.set(context).staged
    }
}
