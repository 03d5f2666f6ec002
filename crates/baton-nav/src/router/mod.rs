//! Routers: ordered backstacks bound to a container
//!
//! Two variants share every backstack operation and differ only in how they
//! reach their host:
//! - **Root** routers hold the [`Host`] directly.
//! - **Nested** routers belong to an owner node and forward host requests
//!   through the owner's router, up to the root.

mod backstack;
mod hierarchy;
mod host;

#[cfg(test)]
mod tests;

pub use host::Host;

use std::fmt;
use std::rc::Rc;

use baton_core::prelude::*;

use crate::entry::BackstackEntry;
use crate::transition::ChangeListener;
use crate::view::{ContainerId, ViewId};
use crate::Navigator;

/// Handle to a router owned by a [`Navigator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouterId(pub(crate) u64);

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router#{}", self.0)
    }
}

pub enum RouterKind {
    Root {
        host: Option<Rc<dyn Host>>,
        container_id: ContainerId,
    },
    Nested {
        owner: InstanceId,
        container_id: ContainerId,
        tag: Option<String>,
    },
}

impl fmt::Debug for RouterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterKind::Root { host, container_id } => f
                .debug_struct("Root")
                .field("container_id", container_id)
                .field("has_host", &host.is_some())
                .finish(),
            RouterKind::Nested {
                owner,
                container_id,
                tag,
            } => f
                .debug_struct("Nested")
                .field("owner", owner)
                .field("container_id", container_id)
                .field("tag", tag)
                .finish(),
        }
    }
}

pub struct Router {
    pub(crate) id: RouterId,
    pub(crate) kind: RouterKind,
    pub(crate) container: Option<ViewId>,
    pub(crate) backstack: Vec<BackstackEntry>,
    /// Popped nodes whose views may still be leaving the container
    pub(crate) destroying: Vec<InstanceId>,
    pub(crate) change_listeners: Vec<Rc<dyn ChangeListener>>,
    pub(crate) pops_last_view: bool,
    pub(crate) destroyed: bool,
}

impl Router {
    pub(crate) fn new(id: RouterId, kind: RouterKind, pops_last_view: bool) -> Self {
        Self {
            id,
            kind,
            container: None,
            backstack: Vec::new(),
            destroying: Vec::new(),
            change_listeners: Vec::new(),
            pops_last_view,
            destroyed: false,
        }
    }

    pub fn id(&self) -> RouterId {
        self.id
    }

    pub fn kind(&self) -> &RouterKind {
        &self.kind
    }

    pub fn container(&self) -> Option<ViewId> {
        self.container
    }

    pub fn container_id(&self) -> &ContainerId {
        match &self.kind {
            RouterKind::Root { container_id, .. } | RouterKind::Nested { container_id, .. } => {
                container_id
            }
        }
    }

    /// Owner node of a nested router
    pub fn owner(&self) -> Option<&InstanceId> {
        match &self.kind {
            RouterKind::Nested { owner, .. } => Some(owner),
            RouterKind::Root { .. } => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            RouterKind::Nested { tag, .. } => tag.as_deref(),
            RouterKind::Root { .. } => None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, RouterKind::Root { .. })
    }

    pub fn has_host(&self) -> bool {
        self.container.is_some()
    }

    pub fn backstack(&self) -> &[BackstackEntry] {
        &self.backstack
    }

    pub fn pops_last_view(&self) -> bool {
        self.pops_last_view
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn top(&self) -> Option<&BackstackEntry> {
        self.backstack.last()
    }

    pub(crate) fn contains_node(&self, id: &InstanceId) -> bool {
        self.backstack.iter().any(|e| e.node() == id)
    }

    pub(crate) fn track_destroying(&mut self, id: &InstanceId) {
        if !self.destroying.contains(id) {
            self.destroying.push(id.clone());
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("container", &self.container)
            .field("backstack", &self.backstack)
            .field("destroying", &self.destroying)
            .field("pops_last_view", &self.pops_last_view)
            .finish()
    }
}

impl Navigator {
    pub fn router(&self, id: RouterId) -> Option<&Router> {
        self.routers.get(&id)
    }

    pub(crate) fn router_ref(&self, id: RouterId) -> Result<&Router> {
        self.routers
            .get(&id)
            .ok_or(Error::UnknownRouter { id: id.0 })
    }

    pub(crate) fn router_mut(&mut self, id: RouterId) -> Result<&mut Router> {
        self.routers
            .get_mut(&id)
            .ok_or(Error::UnknownRouter { id: id.0 })
    }

    /// Instance ids on the backstack, bottom first
    pub fn backstack(&self, router: RouterId) -> Vec<InstanceId> {
        self.routers
            .get(&router)
            .map(|r| r.backstack.iter().map(|e| e.node().clone()).collect())
            .unwrap_or_default()
    }

    pub fn backstack_entries(&self, router: RouterId) -> &[BackstackEntry] {
        self.routers
            .get(&router)
            .map(|r| r.backstack.as_slice())
            .unwrap_or_default()
    }

    pub fn backstack_len(&self, router: RouterId) -> usize {
        self.routers.get(&router).map_or(0, |r| r.backstack.len())
    }

    pub fn has_root(&self, router: RouterId) -> bool {
        self.backstack_len(router) > 0
    }

    /// Node of the entry carrying `tag`. Missing tags are not an error.
    pub fn node_with_tag(&self, router: RouterId, tag: &str) -> Option<InstanceId> {
        self.routers
            .get(&router)?
            .backstack
            .iter()
            .find(|e| e.tag() == Some(tag))
            .map(|e| e.node().clone())
    }

    /// Find a node on this router or, recursively, on its nodes' child routers
    pub fn node_with_instance_id(&self, router: RouterId, id: &InstanceId) -> Option<InstanceId> {
        let router = self.routers.get(&router)?;
        for entry in &router.backstack {
            if entry.node() == id {
                return Some(id.clone());
            }
            let Some(node) = self.nodes.get(entry.node()) else {
                continue;
            };
            for child in &node.child_routers {
                if let Some(found) = self.node_with_instance_id(*child, id) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn add_change_listener(&mut self, router: RouterId, listener: Rc<dyn ChangeListener>) -> Result<()> {
        let router = self.router_mut(router)?;
        if !router.change_listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            router.change_listeners.push(listener);
        }
        Ok(())
    }

    pub fn remove_change_listener(
        &mut self,
        router: RouterId,
        listener: &Rc<dyn ChangeListener>,
    ) -> Result<()> {
        self.router_mut(router)?
            .change_listeners
            .retain(|l| !Rc::ptr_eq(l, listener));
        Ok(())
    }

    /// Whether popping the final entry animates it out
    pub fn set_pops_last_view(&mut self, router: RouterId, pops_last_view: bool) -> Result<()> {
        self.router_mut(router)?.pops_last_view = pops_last_view;
        Ok(())
    }
}
