//! Saving and restoring a navigator
//!
//! Saving first settles every in-flight push, so the snapshot only contains
//! resting states. Restoring is lazy: saved routers wait in the navigator
//! until a host attaches a container with the same [`ContainerId`], and nodes
//! that were attached come back flagged `needs_attach`.

use baton_core::prelude::*;

use crate::config::NavigatorConfig;
use crate::entry::BackstackEntry;
use crate::node::Node;
use crate::registry::Registry;
use crate::router::{Router, RouterId, RouterKind};
use crate::state::{EntryState, HandlerState, NavigatorState, NodeState, RouterState};
use crate::transition::ChangeHandler;
use crate::Navigator;

impl Navigator {
    /// Navigator that restores `state` as hosts attach matching containers
    pub fn with_saved_state(registry: Registry, config: NavigatorConfig, state: NavigatorState) -> Self {
        let mut navigator = Self::new(registry, config);
        for router in state.routers {
            navigator
                .pending_router_states
                .insert(router.container_id.clone(), router);
        }
        navigator.activity_requests = state.activity_requests;
        navigator.permission_requests = state.permission_requests;
        info!(
            "Holding {} saved router(s) until their containers attach",
            navigator.pending_router_states.len()
        );
        navigator
    }

    /// Snapshot every root router along with state not yet claimed by a host
    #[instrument(level = "debug", skip(self))]
    pub fn save_state(&mut self) -> Result<NavigatorState> {
        self.prepare_for_host_detach_if_needed();
        self.pump();

        let mut routers = Vec::new();
        for root in self.root_routers.clone() {
            if self.routers.get(&root).is_some_and(|r| !r.destroyed) {
                routers.push(self.save_router(root)?);
            }
        }
        routers.extend(self.pending_router_states.values().cloned());

        Ok(NavigatorState {
            routers,
            activity_requests: self.activity_requests.clone(),
            permission_requests: self.permission_requests.clone(),
        })
    }

    fn save_router(&mut self, router: RouterId) -> Result<RouterState> {
        let r = self.router_ref(router)?;
        let container_id = r.container_id().clone();
        let tag = r.tag().map(str::to_string);
        let pops_last_view = r.pops_last_view;
        let entries = r.backstack.clone();

        let mut backstack = Vec::with_capacity(entries.len());
        for entry in &entries {
            backstack.push(EntryState {
                node: self.save_node(entry.node())?,
                tag: entry.tag().map(str::to_string),
                push_handler: entry.push_handler().map(ChangeHandler::to_state),
                pop_handler: entry.pop_handler().map(ChangeHandler::to_state),
            });
        }

        Ok(RouterState {
            container_id,
            tag,
            pops_last_view,
            backstack,
        })
    }

    fn save_node(&mut self, id: &InstanceId) -> Result<NodeState> {
        let node = self.nodes.get(id).ok_or_else(|| Error::unknown_node(id))?;
        if !node.has_saved_view_state && node.view.is_some() {
            self.save_view_state(id);
        }

        let node = self.node_mut(id)?;
        let mut saved_state = Bundle::new();
        node.screen.on_save_state(&mut saved_state);
        for listener in node.listener_snapshot() {
            listener.on_save_state(id, &mut saved_state);
        }

        let node = self.nodes.get(id).ok_or_else(|| Error::unknown_node(id))?;
        let child_routers = node.child_routers.clone();
        let mut state = NodeState {
            type_tag: node.type_tag.clone(),
            instance_id: id.clone(),
            args: node.args.clone(),
            view_state: node.view_state.clone(),
            target_instance_id: node.target.clone(),
            requested_permissions: node.requested_permissions.clone(),
            needs_attach: node.needs_attach || node.attached,
            retain_view_mode: node.retain_view_mode,
            has_options_menu: node.has_options_menu,
            options_menu_hidden: node.options_menu_hidden,
            push_handler: node.push_override.as_ref().map(ChangeHandler::to_state),
            pop_handler: node.pop_override.as_ref().map(ChangeHandler::to_state),
            child_routers: Vec::with_capacity(child_routers.len()),
            child_backstack: node.child_backstack.clone(),
            saved_state,
        };

        for router in child_routers {
            state.child_routers.push(self.save_router(router)?);
        }
        Ok(state)
    }

    /// Rebuild `router`'s backstack from saved state
    pub(crate) fn restore_router(&mut self, router: RouterId, state: RouterState) -> Result<()> {
        debug!(
            "Restoring {} entries into {} ('{}')",
            state.backstack.len(),
            router,
            state.container_id
        );
        self.router_mut(router)?.pops_last_view = state.pops_last_view;

        let mut entries = Vec::with_capacity(state.backstack.len());
        for entry in state.backstack {
            let node = self.restore_node(entry.node)?;
            let push = self.restore_handler(entry.push_handler.as_ref())?;
            let pop = self.restore_handler(entry.pop_handler.as_ref())?;
            entries.push(BackstackEntry::from_parts(node, entry.tag, push, pop));
        }

        let ids: Vec<InstanceId> = entries.iter().map(|e| e.node().clone()).collect();
        self.router_mut(router)?.backstack = entries;
        for id in &ids {
            self.set_node_router(router, id);
        }
        Ok(())
    }

    fn restore_node(&mut self, state: NodeState) -> Result<InstanceId> {
        let id = state.instance_id.clone();
        if self.nodes.contains_key(&id) || self.tombstones.contains(&id) {
            return Err(Error::restore(format!("Instance id {} is already in use", id)));
        }

        let screen = self
            .registry
            .create_screen(&state.type_tag, &state.args)
            .with_context(|| format!("Restoring node {}", id))?;
        let mut node = Node::new(id.clone(), state.args, screen);
        node.view_state = state.view_state;
        node.target = state.target_instance_id;
        node.requested_permissions = state.requested_permissions;
        node.needs_attach = state.needs_attach;
        node.retain_view_mode = state.retain_view_mode;
        node.has_options_menu = state.has_options_menu;
        node.options_menu_hidden = state.options_menu_hidden;
        node.push_override = self.restore_handler(state.push_handler.as_ref())?;
        node.pop_override = self.restore_handler(state.pop_handler.as_ref())?;
        node.saved_instance_state = Some(state.saved_state);
        self.nodes.insert(id.clone(), node);

        for child in state.child_routers {
            let router = self.next_router_id();
            let kind = RouterKind::Nested {
                owner: id.clone(),
                container_id: child.container_id.clone(),
                tag: child.tag.clone(),
            };
            self.routers
                .insert(router, Router::new(router, kind, child.pops_last_view));
            self.node_mut(&id)?.child_routers.push(router);
            self.restore_router(router, child)?;
        }

        // Router restore re-adds children in push order; the saved order wins
        let child_backstack: Vec<InstanceId> = state
            .child_backstack
            .into_iter()
            .filter(|child| self.nodes.contains_key(child))
            .collect();
        self.node_mut(&id)?.child_backstack = child_backstack;

        trace!("Restored node {} ({})", id, state.type_tag);
        Ok(id)
    }

    fn restore_handler(&self, state: Option<&HandlerState>) -> Result<Option<ChangeHandler>> {
        state
            .map(|state| self.registry.restore_handler(state))
            .transpose()
    }
}
