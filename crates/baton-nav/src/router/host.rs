//! Host binding
//!
//! The host is the external adapter that owns the top-level container and
//! drives the lifecycle. Root routers hold it directly; nested routers reach
//! it through their owner's router.

use std::rc::Rc;

use baton_core::prelude::*;

use super::{Router, RouterId, RouterKind};
use crate::node::lifecycle::HostEvent;
use crate::view::ViewId;
use crate::Navigator;

/// Services the embedding environment provides to routers
pub trait Host {
    fn invalidate_options_menu(&self);
    fn start_activity(&self, intent: &Intent);
    fn start_activity_for_result(&self, node: &InstanceId, intent: &Intent, request_code: i32);
    fn register_for_activity_result(&self, node: &InstanceId, request_code: i32);
    fn unregister_for_activity_results(&self, node: &InstanceId);
    fn request_permissions(&self, node: &InstanceId, permissions: &[String], request_code: i32);
}

impl Navigator {
    /// Bind a root router to `container`, creating it if this container id
    /// has not been seen before
    ///
    /// Saved state held for the container id is restored into a new router.
    /// Nodes that were visible before the host went away are re-attached.
    #[instrument(level = "debug", skip(self, host))]
    pub fn attach_router(&mut self, host: Rc<dyn Host>, container: ViewId) -> Result<RouterId> {
        let container_id = self
            .views
            .container_id(container)
            .cloned()
            .ok_or_else(|| Error::view(format!("{} has no container id", container)))?;

        let existing = self.root_routers.iter().copied().find(|id| {
            self.routers
                .get(id)
                .is_some_and(|r| !r.destroyed && r.container_id() == &container_id)
        });

        let id = match existing {
            Some(id) => {
                if let Some(router) = self.routers.get_mut(&id) {
                    if let RouterKind::Root { host: slot, .. } = &mut router.kind {
                        *slot = Some(host);
                    }
                }
                id
            }
            None => {
                let id = self.next_router_id();
                let kind = RouterKind::Root {
                    host: Some(host),
                    container_id: container_id.clone(),
                };
                let pops_last_view = self.config.router.pops_last_view;
                self.routers.insert(id, Router::new(id, kind, pops_last_view));
                self.root_routers.push(id);
                info!("Created root {} for container '{}'", id, container_id);

                if let Some(state) = self.pending_router_states.remove(&container_id) {
                    self.restore_router(id, state)?;
                }
                id
            }
        };

        self.router_mut(id)?.container = Some(container);
        self.rebind_if_needed(id)?;
        self.pump();
        Ok(id)
    }

    /// Host reachable from `router`, walking up through owner nodes
    pub(crate) fn host_for(&self, router: RouterId) -> Option<Rc<dyn Host>> {
        let mut current = router;
        loop {
            match &self.routers.get(&current)?.kind {
                RouterKind::Root { host, .. } => return host.clone(),
                RouterKind::Nested { owner, .. } => {
                    current = self.nodes.get(owner)?.router?;
                }
            }
        }
    }

    pub(crate) fn invalidate_options_menu(&self, router: RouterId) {
        if let Some(host) = self.host_for(router) {
            host.invalidate_options_menu();
        }
    }

    pub(crate) fn unregister_activity_results(&mut self, id: &InstanceId) {
        self.activity_requests.retain(|_, node| node != id);
        self.permission_requests.retain(|_, node| node != id);
        let host = self
            .nodes
            .get(id)
            .and_then(|n| n.router)
            .and_then(|r| self.host_for(r));
        if let Some(host) = host {
            host.unregister_for_activity_results(id);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Host lifecycle
    // ─────────────────────────────────────────────────────────

    pub fn on_host_started(&mut self) {
        self.prepared_for_host_detach = false;
        self.relay_to_roots(HostEvent::Started);
    }

    pub fn on_host_resumed(&mut self) {
        self.prepared_for_host_detach = false;
        self.relay_to_roots(HostEvent::Resumed);
    }

    pub fn on_host_paused(&mut self) {
        self.relay_to_roots(HostEvent::Paused);
    }

    pub fn on_host_stopped(&mut self) {
        self.prepare_for_host_detach_if_needed();
        self.relay_to_roots(HostEvent::Stopped);
    }

    /// The host is going away. A configuration change keeps every node alive
    /// so a later [`attach_router`](Navigator::attach_router) can rebind them.
    #[instrument(level = "debug", skip(self))]
    pub fn on_host_destroyed(&mut self, is_config_change: bool) {
        if is_config_change {
            self.prepare_for_host_detach_if_needed();
        }

        for root in self.root_routers.clone() {
            self.router_host_destroyed(root, is_config_change);
            if let Some(router) = self.routers.get_mut(&root) {
                if let RouterKind::Root { host, .. } = &mut router.kind {
                    *host = None;
                }
                if !is_config_change {
                    router.backstack.clear();
                    router.destroyed = true;
                }
            }
        }
        self.pump();
    }

    pub(crate) fn prepare_for_host_detach_if_needed(&mut self) {
        if self.prepared_for_host_detach {
            return;
        }
        self.prepared_for_host_detach = true;
        for root in self.root_routers.clone() {
            self.prepare_router_for_host_detach(root);
        }
        self.pump();
    }

    fn relay_to_roots(&mut self, event: HostEvent) {
        for root in self.root_routers.clone() {
            self.relay_router_host_event(root, event);
        }
        self.pump();
    }

    fn relay_router_host_event(&mut self, router: RouterId, event: HostEvent) {
        let Some(r) = self.routers.get(&router) else {
            return;
        };
        let nodes: Vec<InstanceId> = r.backstack.iter().map(|e| e.node().clone()).collect();
        for id in nodes {
            self.relay_host_event(&id, event);
            let children = self
                .nodes
                .get(&id)
                .map(|n| n.child_routers.clone())
                .unwrap_or_default();
            for child in children {
                self.relay_router_host_event(child, event);
            }
        }
    }

    pub(crate) fn router_host_destroyed(&mut self, router: RouterId, is_config_change: bool) {
        let Some(r) = self.routers.get_mut(&router) else {
            return;
        };
        r.change_listeners.clear();
        let nodes: Vec<InstanceId> = r.backstack.iter().map(|e| e.node().clone()).collect();
        let destroying: Vec<InstanceId> = r.destroying.iter().rev().cloned().collect();

        for id in nodes.into_iter().chain(destroying) {
            self.node_host_destroyed(&id, is_config_change);
            let children = self
                .nodes
                .get(&id)
                .map(|n| n.child_routers.clone())
                .unwrap_or_default();
            for child in children {
                self.router_host_destroyed(child, is_config_change);
            }
        }

        let nested = self.routers.get(&router).is_some_and(|r| !r.is_root());
        if nested {
            self.remove_router_host(router);
        }
        if let Some(r) = self.routers.get_mut(&router) {
            r.container = None;
        }
    }

    // ─────────────────────────────────────────────────────────
    // Results
    // ─────────────────────────────────────────────────────────

    /// Route an activity result to the node that registered `request_code`
    pub fn on_activity_result(&mut self, request_code: i32, result_code: i32, data: Option<&Intent>) {
        let Some(id) = self.activity_requests.get(&request_code).cloned() else {
            warn!("No node registered for activity request code {}", request_code);
            return;
        };
        match self.nodes.get_mut(&id) {
            Some(node) => node.screen.on_activity_result(request_code, result_code, data),
            None => warn!("Activity result {} for missing node {}", request_code, id),
        }
    }

    pub fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        grant_results: &[i32],
    ) {
        let Some(id) = self.permission_requests.remove(&request_code) else {
            warn!("No node registered for permission request code {}", request_code);
            return;
        };
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.requested_permissions.retain(|p| !permissions.contains(p));
                node.screen
                    .on_request_permissions_result(request_code, permissions, grant_results);
            }
            None => warn!("Permission result {} for missing node {}", request_code, id),
        }
    }
}
