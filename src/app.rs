//! Dashboard composition root.
//!
//! Owns the registry, the selection state, and the client-local address
//! book. No ambient globals: anything needing read access gets an explicit
//! reference. The dashboard is where cross-component rules live - above all
//! the removal cascade, which keeps the selection sets free of unregistered
//! addresses, and address-book persistence on every add/remove.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::error::Result as FleetResult;
use crate::events::{SelectionChanged, SelectionFeed};
use crate::registry::{Group, GroupId, Registry, Server};
use crate::selection::{SelectionContext, SelectionState};
use crate::service::AddressBook;

/// The dashboard core: registry + selection + persistence.
pub struct Dashboard {
    registry: Registry,
    selection: SelectionState,
    book: AddressBook,
}

impl Dashboard {
    /// Create a dashboard over the given address book, registering every
    /// stored address. Returns the dashboard and the committed-selection
    /// feed for consumers.
    pub fn open(book: AddressBook) -> Result<(Self, SelectionFeed)> {
        let (selection, feed) = SelectionState::new();
        let mut dashboard = Self {
            registry: Registry::new(),
            selection,
            book,
        };

        let stored = dashboard.book.load()?;
        for address in &stored {
            // A duplicate in the stored list is a stale artifact; keep going.
            if let Err(err) = dashboard.registry.add_server(address, None, &[]) {
                warn!(address = %address, error = %err, "skipping stored address");
            }
        }
        info!(servers = stored.len(), "address book loaded");
        Ok((dashboard, feed))
    }

    /// Register a server and persist the address list.
    pub fn add_server(
        &mut self,
        address: &str,
        description: Option<String>,
        group_ids: &[GroupId],
    ) -> FleetResult<Server> {
        let server = self.registry.add_server(address, description, group_ids)?.clone();
        self.persist();
        Ok(server)
    }

    /// Remove a server, cascading: unlink from every group, drop from both
    /// selection sets, persist the shrunken list. Idempotent.
    pub fn remove_server(&mut self, address: &str) -> bool {
        let removed = self.registry.remove_server(address);
        if removed {
            self.selection.purge(address);
            self.persist();
        }
        removed
    }

    /// Create a group over registered member addresses.
    pub fn add_group(
        &mut self,
        name: &str,
        description: Option<String>,
        member_addresses: &[String],
    ) -> FleetResult<Group> {
        Ok(self.registry.add_group(name, description, member_addresses)?.clone())
    }

    /// Remove a group. Idempotent; member servers stay registered.
    pub fn remove_group(&mut self, id: GroupId) -> bool {
        self.registry.remove_group(id)
    }

    /// Flip one address in a context's staged selection.
    pub fn toggle_server(&mut self, context: SelectionContext, address: &str) -> FleetResult<()> {
        self.selection.toggle_server(&self.registry, context, address)
    }

    /// Toggle a group all-or-nothing in a context's staged selection.
    pub fn toggle_group(&mut self, context: SelectionContext, group_id: GroupId) -> FleetResult<()> {
        self.selection.toggle_group(&self.registry, context, group_id)
    }

    /// Stage every registered address.
    pub fn select_all(&mut self, context: SelectionContext) {
        self.selection.select_all(&self.registry, context);
    }

    /// Empty a context's staged selection.
    pub fn clear_selection(&mut self, context: SelectionContext) {
        self.selection.clear(context);
    }

    /// Apply the staged selection and notify consumers.
    pub fn commit_selection(&mut self, context: SelectionContext) -> SelectionChanged {
        self.selection.commit(context)
    }

    /// Derived group-checkbox state for presentation.
    pub fn group_fully_selected(
        &self,
        context: SelectionContext,
        group_id: GroupId,
    ) -> FleetResult<bool> {
        self.selection.group_fully_selected(&self.registry, context, group_id)
    }

    /// The committed selection for a context.
    pub fn applied_selection(&self, context: SelectionContext) -> &BTreeSet<String> {
        self.selection.applied(context)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    fn persist(&self) {
        let addresses: Vec<String> = self.registry.addresses().into_iter().collect();
        // Persistence failure must not roll back an in-memory mutation that
        // already happened; surface it and carry on.
        if let Err(err) = self.book.save(&addresses) {
            warn!(error = %err, "failed to persist server list");
        }
    }
}
