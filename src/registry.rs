//! Server and group registry.
//!
//! The registry is the single writer for the many-to-many membership between
//! servers and groups. Membership is denormalized on both sides (a group
//! carries its member addresses, a server carries its group ids); every
//! mutation updates both representations in one logical operation, so the two
//! views can only diverge through a bug, never through valid input.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Opaque identifier for a registered server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(pub u64);

/// Opaque identifier for a server group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A monitored proxy endpoint, identified by a stable address string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub address: String,
    pub description: Option<String>,
    pub group_ids: BTreeSet<GroupId>,
}

/// A named, user-defined collection of server addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub members: BTreeSet<String>,
}

/// The set of known servers and named groups.
///
/// Servers are keyed by address (the unique, stable key); groups by id.
#[derive(Debug, Default)]
pub struct Registry {
    servers: BTreeMap<String, Server>,
    groups: BTreeMap<GroupId, Group>,
    next_server_id: u64,
    next_group_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server, linking it into each named group.
    ///
    /// Fails with [`FleetError::DuplicateServer`] if the address is already
    /// registered (duplicates are rejected, never merged), and with
    /// [`FleetError::NotFound`] if any group id is unknown. On failure
    /// nothing is linked.
    pub fn add_server(
        &mut self,
        address: &str,
        description: Option<String>,
        group_ids: &[GroupId],
    ) -> Result<&Server> {
        if self.servers.contains_key(address) {
            return Err(FleetError::DuplicateServer(address.to_string()));
        }
        for id in group_ids {
            if !self.groups.contains_key(id) {
                return Err(FleetError::group_not_found(*id));
            }
        }

        let id = ServerId(self.next_server_id);
        self.next_server_id += 1;

        let server = Server {
            id,
            address: address.to_string(),
            description,
            group_ids: group_ids.iter().copied().collect(),
        };

        // Reverse edges: each named group gains this address.
        for gid in group_ids {
            if let Some(group) = self.groups.get_mut(gid) {
                group.members.insert(address.to_string());
            }
        }

        self.servers.insert(address.to_string(), server);
        Ok(&self.servers[address])
    }

    /// Remove a server, unlinking it from every group.
    ///
    /// Idempotent: removing an absent address is a no-op returning `false`.
    /// Cascading removal from the selection sets is owned by the composition
    /// root, which calls this and then purges the selection state.
    pub fn remove_server(&mut self, address: &str) -> bool {
        let Some(server) = self.servers.remove(address) else {
            return false;
        };
        for gid in &server.group_ids {
            if let Some(group) = self.groups.get_mut(gid) {
                group.members.remove(address);
            }
        }
        true
    }

    /// Update a server's description and replace its group membership
    /// wholesale, keeping both sides of the membership in sync.
    pub fn update_server(
        &mut self,
        address: &str,
        description: Option<String>,
        group_ids: &[GroupId],
    ) -> Result<&Server> {
        if !self.servers.contains_key(address) {
            return Err(FleetError::NotFound(format!("server {}", address)));
        }
        for id in group_ids {
            if !self.groups.contains_key(id) {
                return Err(FleetError::group_not_found(*id));
            }
        }

        let old_groups = self.servers[address].group_ids.clone();
        for gid in &old_groups {
            if let Some(group) = self.groups.get_mut(gid) {
                group.members.remove(address);
            }
        }
        for gid in group_ids {
            if let Some(group) = self.groups.get_mut(gid) {
                group.members.insert(address.to_string());
            }
        }

        let server = self
            .servers
            .get_mut(address)
            .ok_or_else(|| FleetError::NotFound(format!("server {}", address)))?;
        if description.is_some() {
            server.description = description;
        }
        server.group_ids = group_ids.iter().copied().collect();
        Ok(server)
    }

    /// Create a group containing the named member addresses.
    ///
    /// Fails with [`FleetError::DuplicateGroup`] if the name is taken and
    /// with [`FleetError::UnknownServer`] if any member is not registered.
    pub fn add_group(
        &mut self,
        name: &str,
        description: Option<String>,
        member_addresses: &[String],
    ) -> Result<&Group> {
        if self.groups.values().any(|g| g.name == name) {
            return Err(FleetError::DuplicateGroup(name.to_string()));
        }
        for addr in member_addresses {
            if !self.servers.contains_key(addr) {
                return Err(FleetError::UnknownServer(addr.clone()));
            }
        }

        let id = GroupId(self.next_group_id);
        self.next_group_id += 1;

        let group = Group {
            id,
            name: name.to_string(),
            description,
            members: member_addresses.iter().cloned().collect(),
        };

        for addr in member_addresses {
            if let Some(server) = self.servers.get_mut(addr) {
                server.group_ids.insert(id);
            }
        }

        self.groups.insert(id, group);
        Ok(&self.groups[&id])
    }

    /// Remove a group, unlinking it from every member. Idempotent.
    pub fn remove_group(&mut self, id: GroupId) -> bool {
        let Some(group) = self.groups.remove(&id) else {
            return false;
        };
        for addr in &group.members {
            if let Some(server) = self.servers.get_mut(addr) {
                server.group_ids.remove(&id);
            }
        }
        true
    }

    /// Update a group's description and replace its membership wholesale.
    pub fn update_group(
        &mut self,
        id: GroupId,
        description: Option<String>,
        member_addresses: &[String],
    ) -> Result<&Group> {
        if !self.groups.contains_key(&id) {
            return Err(FleetError::group_not_found(id));
        }
        for addr in member_addresses {
            if !self.servers.contains_key(addr) {
                return Err(FleetError::UnknownServer(addr.clone()));
            }
        }

        let old_members = self.groups[&id].members.clone();
        for addr in &old_members {
            if let Some(server) = self.servers.get_mut(addr) {
                server.group_ids.remove(&id);
            }
        }
        for addr in member_addresses {
            if let Some(server) = self.servers.get_mut(addr) {
                server.group_ids.insert(id);
            }
        }

        let group = self
            .groups
            .get_mut(&id)
            .ok_or_else(|| FleetError::group_not_found(id))?;
        if description.is_some() {
            group.description = description;
        }
        group.members = member_addresses.iter().cloned().collect();
        Ok(group)
    }

    /// Look up a server by address.
    pub fn lookup_server(&self, address: &str) -> Result<&Server> {
        self.servers
            .get(address)
            .ok_or_else(|| FleetError::NotFound(format!("server {}", address)))
    }

    /// Look up a group by id.
    pub fn lookup_group(&self, id: GroupId) -> Result<&Group> {
        self.groups.get(&id).ok_or_else(|| FleetError::group_not_found(id))
    }

    /// Whether an address is registered.
    pub fn contains(&self, address: &str) -> bool {
        self.servers.contains_key(address)
    }

    /// All registered addresses, in key order.
    pub fn addresses(&self) -> BTreeSet<String> {
        self.servers.keys().cloned().collect()
    }

    /// All registered servers.
    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }

    /// All groups.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }
}
