//! Router tree: nested routers, host detach and teardown

use baton_core::prelude::*;

use super::{Router, RouterId, RouterKind};
use crate::entry::BackstackEntry;
use crate::transition::{ChangeHandler, SimpleSwapHandler};
use crate::view::ContainerId;
use crate::Navigator;

impl Navigator {
    /// Child router of `owner` hosted by the container `container_id` inside
    /// the owner's view
    ///
    /// Returns `Ok(None)` when no such router exists and `create` is false. An
    /// existing router that lost its host is re-bound and its visible nodes
    /// re-attached.
    pub fn child_router(
        &mut self,
        owner: &InstanceId,
        container_id: &ContainerId,
        tag: Option<&str>,
        create: bool,
    ) -> Result<Option<RouterId>> {
        let existing = self.find_child_router(owner, container_id, tag);
        if existing.is_none() && !create {
            return Ok(None);
        }

        let node = self.nodes.get(owner).ok_or_else(|| Error::unknown_node(owner))?;
        let view = node
            .view
            .ok_or_else(|| Error::view(format!("{} has no view to host '{}'", owner, container_id)))?;
        let container = self.views.find_container(view, container_id).ok_or_else(|| {
            Error::view(format!("No container '{}' inside the view of {}", container_id, owner))
        })?;

        match existing {
            Some(id) => {
                let router = self.router_mut(id)?;
                if router.container.is_none() {
                    router.container = Some(container);
                    self.rebind_if_needed(id)?;
                }
                Ok(Some(id))
            }
            None => {
                let id = self.next_router_id();
                let kind = RouterKind::Nested {
                    owner: owner.clone(),
                    container_id: container_id.clone(),
                    tag: tag.map(str::to_string),
                };
                let mut router = Router::new(id, kind, self.config.router.pops_last_view);
                router.container = Some(container);
                self.routers.insert(id, router);

                let node = self.node_mut(owner)?;
                node.child_routers.push(id);
                let frozen = node.performing_exit_transition;
                debug!("Created nested {} in '{}' of {}", id, container_id, owner);

                if frozen {
                    self.set_router_detach_frozen(id, true);
                }
                Ok(Some(id))
            }
        }
    }

    /// Existing child router of `owner` matching container id and tag
    pub fn find_child_router(
        &self,
        owner: &InstanceId,
        container_id: &ContainerId,
        tag: Option<&str>,
    ) -> Option<RouterId> {
        self.nodes.get(owner)?.child_routers.iter().copied().find(|id| {
            self.routers
                .get(id)
                .is_some_and(|r| r.container_id() == container_id && r.tag() == tag)
        })
    }

    /// Destroy a child router, animating its top node out
    pub fn remove_child_router(&mut self, owner: &InstanceId, router: RouterId) -> Result<()> {
        let node = self.node_mut(owner)?;
        let before = node.child_routers.len();
        node.child_routers.retain(|id| *id != router);
        if node.child_routers.len() != before {
            self.destroy_router_popping_views(router)?;
            self.pump();
        }
        Ok(())
    }

    /// Top of the router tree containing `router`
    pub fn root_router(&self, router: RouterId) -> Option<RouterId> {
        let mut current = router;
        loop {
            match self.routers.get(&current)?.owner() {
                None => return Some(current),
                Some(owner) => current = self.nodes.get(owner)?.router?,
            }
        }
    }

    /// Routers at the same level as `router`, `router` included
    ///
    /// For a root this is every live root router; for a nested router it is
    /// the owner's child routers followed by the siblings of the owner's router.
    pub fn sibling_routers(&self, router: RouterId) -> Vec<RouterId> {
        let Some(r) = self.routers.get(&router) else {
            return Vec::new();
        };
        match r.owner() {
            None => self
                .root_routers
                .iter()
                .copied()
                .filter(|id| self.routers.get(id).is_some_and(|r| !r.destroyed))
                .collect(),
            Some(owner) => {
                let Some(node) = self.nodes.get(owner) else {
                    return Vec::new();
                };
                let mut out = node.child_routers.clone();
                if let Some(owner_router) = node.router {
                    out.extend(self.sibling_routers(owner_router));
                }
                out
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Freeze and host detach
    // ─────────────────────────────────────────────────────────

    pub(crate) fn set_router_detach_frozen(&mut self, router: RouterId, frozen: bool) {
        for id in self.backstack(router) {
            self.set_node_detach_frozen(&id, frozen);
        }
    }

    /// Settle in-flight pushes and remember which nodes must re-attach
    pub(crate) fn prepare_router_for_host_detach(&mut self, router: RouterId) {
        for id in self.backstack(router) {
            if self.complete_push_immediately(&id) {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.needs_attach = true;
                }
            }
            self.prepare_node_for_host_detach(&id);
        }
    }

    fn prepare_node_for_host_detach(&mut self, id: &InstanceId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.needs_attach = node.needs_attach || node.attached;
        for router in node.child_routers.clone() {
            self.prepare_router_for_host_detach(router);
        }
    }

    /// Release the container without destroying any node
    pub(crate) fn remove_router_host(&mut self, router: RouterId) {
        let Some(r) = self.routers.get(&router) else {
            return;
        };
        let ids: Vec<InstanceId> = r
            .destroying
            .iter()
            .cloned()
            .chain(r.backstack.iter().map(|e| e.node().clone()))
            .collect();

        for id in ids {
            if self.nodes.get(&id).is_some_and(|n| n.view.is_some()) {
                self.detach_node(&id, true);
            }
        }
        if let Some(r) = self.routers.get_mut(&router) {
            r.container = None;
            trace!("{} lost its host", router);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────

    /// Destroy every node without animating anything out
    pub(crate) fn destroy_router(&mut self, router: RouterId) {
        self.drain_router(router);
        if let Some(r) = self.routers.get_mut(&router) {
            r.destroyed = true;
        }
    }

    /// Destroy every node, running the top's pop handler and removing the
    /// rest with a plain swap
    pub(crate) fn destroy_router_popping_views(&mut self, router: RouterId) -> Result<()> {
        let popped = self.drain_router(router);
        if let Some((top, rest)) = popped.split_first() {
            let handler = self.effective_pop_handler(top);
            self.execute_change(router, None, Some(top.node().clone()), false, handler)?;
            for entry in rest.iter().rev() {
                let handler = ChangeHandler::new(SimpleSwapHandler::default());
                self.execute_change(router, None, Some(entry.node().clone()), true, Some(handler))?;
            }
        }
        if let Some(r) = self.routers.get_mut(&router) {
            r.destroyed = true;
        }
        Ok(())
    }

    /// Pop everything (top first) and destroy the popped nodes
    fn drain_router(&mut self, router: RouterId) -> Vec<BackstackEntry> {
        let nested = self.routers.get(&router).is_some_and(|r| !r.is_root());
        if nested {
            self.set_router_detach_frozen(router, false);
        }

        let Some(r) = self.routers.get_mut(&router) else {
            return Vec::new();
        };
        r.pops_last_view = true;
        let popped: Vec<BackstackEntry> = r.backstack.drain(..).rev().collect();
        for entry in &popped {
            r.track_destroying(entry.node());
        }
        debug!("Destroying {} with {} entries", router, popped.len());

        for entry in &popped {
            self.destroy_node(entry.node(), false);
        }
        popped
    }
}
