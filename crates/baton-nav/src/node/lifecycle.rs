//! Node state machine
//!
//! `Initialized -> ViewCreated -> Attached <-> Detached -> ViewDestroyed ->
//! BeingDestroyed -> Destroyed`. A node may create and release views many
//! times; once `being_destroyed` is set, any detach also releases the view and
//! the final destroy runs exactly once.

use baton_core::prelude::*;

use super::RetainViewMode;
use crate::router::RouterId;
use crate::state::SavedViewState;
use crate::transition::{ChangeHandler, ChangeType};
use crate::view::{ViewEvent, ViewId};
use crate::Navigator;

/// Host lifecycle step relayed down the router tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostEvent {
    Started,
    Resumed,
    Paused,
    Stopped,
}

impl Navigator {
    // ─────────────────────────────────────────────────────────
    // View observation
    // ─────────────────────────────────────────────────────────

    pub(crate) fn dispatch_view_event(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::Attached(view) => {
                let Some(id) = self.view_owners.get(&view).cloned() else {
                    return;
                };
                trace!("{} of {} attached to window", view, id);
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.view_is_attached = true;
                    node.view_was_detached = false;
                }
                self.attach_node(&id);
            }
            ViewEvent::Detached(view) => {
                let Some(id) = self.view_owners.get(&view).cloned() else {
                    return;
                };
                trace!("{} of {} detached from window", view, id);
                let frozen = match self.nodes.get_mut(&id) {
                    Some(node) => {
                        node.view_is_attached = false;
                        node.view_was_detached = true;
                        node.detach_frozen
                    }
                    None => return,
                };
                if !frozen {
                    self.detach_node(&id, false);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // View creation and release
    // ─────────────────────────────────────────────────────────

    /// Make sure the node has a view suitable for `container` and return it
    pub(crate) fn inflate(&mut self, id: &InstanceId, container: ViewId) -> Result<ViewId> {
        let existing = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::unknown_node(id))?
            .view;

        // Parented to some other container: tear the old view down first
        if let Some(view) = existing {
            if self.views.parent(view).is_some_and(|parent| parent != container) {
                self.detach_node(id, true);
            }
        }

        let node = self.nodes.get_mut(id).ok_or_else(|| Error::unknown_node(id))?;
        if let Some(view) = node.view {
            if node.retain_view_mode == RetainViewMode::RetainOnDetach {
                self.restore_child_router_hosts(id)?;
            }
            return Ok(view);
        }

        let listeners = node.listener_snapshot();
        for listener in &listeners {
            listener.pre_create_view(id);
        }

        let view = node.screen.create_view(&mut self.views, container)?;
        if view == container {
            return Err(Error::ViewIsContainer { id: id.clone() });
        }
        node.view = Some(view);
        self.view_owners.insert(view, id.clone());
        debug!("Created {} for {}", view, id);

        for listener in &listeners {
            listener.post_create_view(id, view);
        }

        self.restore_view_state(id);
        self.views.observe(view);
        self.restore_child_router_hosts(id)?;
        Ok(view)
    }

    pub(crate) fn save_view_state(&mut self, id: &InstanceId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(view) = node.view else {
            return;
        };

        let mut bundle = Bundle::new();
        node.screen.on_save_view_state(&self.views, view, &mut bundle);
        let saved = SavedViewState {
            hierarchy: self.views.save_hierarchy_state(view),
            bundle,
        };
        node.has_saved_view_state = true;
        node.view_state = Some(saved.clone());

        for listener in node.listener_snapshot() {
            listener.on_save_view_state(id, &saved);
        }
    }

    fn restore_view_state(&mut self, id: &InstanceId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let (Some(view), Some(saved)) = (node.view, node.view_state.clone()) else {
            return;
        };

        self.views.restore_hierarchy_state(view, &saved.hierarchy);
        node.screen.on_restore_view_state(&mut self.views, view, &saved.bundle);

        for listener in node.listener_snapshot() {
            listener.on_restore_view_state(id, &saved);
        }
    }

    /// Re-bind child routers that lost their host to containers in the current view
    pub(crate) fn restore_child_router_hosts(&mut self, id: &InstanceId) -> Result<()> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        let Some(view) = node.view else {
            return Ok(());
        };

        for router_id in node.child_routers.clone() {
            let Some(router) = self.routers.get(&router_id) else {
                continue;
            };
            if router.container.is_some() {
                continue;
            }
            let container_id = router.container_id().clone();
            if let Some(container) = self.views.find_container(view, &container_id) {
                debug!("Rebinding {} to {} inside {}", router_id, container_id, id);
                if let Some(router) = self.routers.get_mut(&router_id) {
                    router.container = Some(container);
                }
                self.rebind_if_needed(router_id)?;
            }
        }
        Ok(())
    }

    /// Drop the node's view, saving its state first unless the node is going away
    pub(crate) fn release_view(&mut self, id: &InstanceId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };

        if let Some(view) = node.view {
            if !node.being_destroyed && !node.has_saved_view_state {
                self.save_view_state(id);
            }

            let Some(node) = self.nodes.get_mut(id) else {
                return;
            };
            let listeners = node.listener_snapshot();
            for listener in &listeners {
                listener.pre_destroy_view(id, view);
            }

            node.screen.on_destroy_view(view);
            self.views.unobserve(view);
            self.view_owners.remove(&view);
            node.view_is_attached = false;
            if node.being_destroyed {
                node.destroyed_view = Some(view);
            }
            node.view = None;
            let child_routers = node.child_routers.clone();

            for router in child_routers {
                self.remove_router_host(router);
            }
            self.views.release(view);
            debug!("Released {} of {}", view, id);

            for listener in &listeners {
                listener.post_destroy_view(id);
            }
        }

        if self.nodes.get(id).is_some_and(|n| n.being_destroyed) {
            self.perform_destroy(id);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Attach / detach
    // ─────────────────────────────────────────────────────────

    pub(crate) fn attach_node(&mut self, id: &InstanceId) {
        let container = self
            .nodes
            .get(id)
            .and_then(|n| n.router)
            .and_then(|r| self.routers.get(&r))
            .and_then(|r| r.container);

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(view) = node.view else {
            return;
        };

        // Stale attach callbacks during a transition land here
        node.attached_to_unowned_parent =
            container.is_none() || self.views.parent(view) != container;
        if node.attached_to_unowned_parent || node.being_destroyed || node.attached {
            return;
        }

        node.has_saved_view_state = false;
        let listeners = node.listener_snapshot();
        for listener in &listeners {
            listener.pre_attach(id, view);
        }

        node.attached = true;
        node.needs_attach = false;
        node.screen.on_attach(view);
        debug!("Attached {}", id);

        let invalidate = node.has_options_menu && !node.options_menu_hidden;
        let router = node.router;
        if let (true, Some(router)) = (invalidate, router) {
            self.invalidate_options_menu(router);
        }

        for listener in &listeners {
            listener.post_attach(id, view);
        }
    }

    pub(crate) fn detach_node(&mut self, id: &InstanceId, force_view_removal: bool) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.attached_to_unowned_parent {
            for router in node.child_routers.clone() {
                self.prepare_router_for_host_detach(router);
            }
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let remove_view = force_view_removal
            || node.retain_view_mode == RetainViewMode::ReleaseOnDetach
            || node.being_destroyed;

        if let (true, Some(view)) = (node.attached, node.view) {
            let listeners = node.listener_snapshot();
            for listener in &listeners {
                listener.pre_detach(id, view);
            }

            node.attached = false;
            node.screen.on_detach(view);
            debug!("Detached {}", id);

            let invalidate = node.has_options_menu && !node.options_menu_hidden;
            let router = node.router;
            if let (true, Some(router)) = (invalidate, router) {
                self.invalidate_options_menu(router);
            }

            for listener in &listeners {
                listener.post_detach(id, view);
            }
        }

        if remove_view {
            self.release_view(id);
        }
    }

    /// Freeze or thaw detach reactions for this node and everything below it
    pub(crate) fn set_node_detach_frozen(&mut self, id: &InstanceId, frozen: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.detach_frozen == frozen {
            return;
        }
        node.detach_frozen = frozen;
        let replay = !frozen && node.view.is_some() && node.view_was_detached;
        let child_routers = node.child_routers.clone();

        for router in child_routers {
            self.set_router_detach_frozen(router, frozen);
        }
        if replay {
            trace!("Replaying buffered detach of {}", id);
            self.detach_node(id, false);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Destruction
    // ─────────────────────────────────────────────────────────

    pub(crate) fn destroy_node(&mut self, id: &InstanceId, remove_views: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.being_destroyed = true;
        let attached = node.attached;
        let child_routers = node.child_routers.clone();

        self.unregister_activity_results(id);
        for router in child_routers {
            self.destroy_router(router);
        }

        if !attached {
            self.release_view(id);
        } else if remove_views {
            self.detach_node(id, true);
        }
    }

    /// Terminal destroy. Runs once.
    pub(crate) fn perform_destroy(&mut self, id: &InstanceId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.destroyed {
            return;
        }

        let listeners = node.listener_snapshot();
        for listener in &listeners {
            listener.pre_destroy(id);
        }

        node.destroyed = true;
        node.screen.on_destroy();
        let parent = node.parent.take();
        debug!("Destroyed {}", id);

        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.child_backstack.retain(|child| child != id);
        }
        for router in self.routers.values_mut() {
            router.destroying.retain(|node| node != id);
        }

        for listener in &listeners {
            listener.post_destroy(id);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Changes
    // ─────────────────────────────────────────────────────────

    pub(crate) fn change_started(&mut self, id: &InstanceId, handler: &ChangeHandler, change: ChangeType) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !change.is_enter() {
            node.performing_exit_transition = true;
            for router in node.child_routers.clone() {
                self.set_router_detach_frozen(router, true);
            }
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.screen.on_change_started(handler, change);
        for listener in node.listener_snapshot() {
            listener.on_change_start(id, handler, change);
        }
    }

    pub(crate) fn change_ended(
        &mut self,
        id: &InstanceId,
        handler: &ChangeHandler,
        change: ChangeType,
        container: ViewId,
    ) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !change.is_enter() {
            node.performing_exit_transition = false;
            for router in node.child_routers.clone() {
                self.set_router_detach_frozen(router, false);
            }
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.screen.on_change_ended(handler, change);
        for listener in node.listener_snapshot() {
            listener.on_change_end(id, handler, change);
        }

        if node.being_destroyed && !node.view_is_attached && !node.attached {
            if let Some(view) = node.destroyed_view.take() {
                if self.views.parent(view) == Some(container) {
                    self.views.remove_from_parent(view);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Router binding
    // ─────────────────────────────────────────────────────────

    pub(crate) fn set_node_router(&mut self, router: RouterId, id: &InstanceId) {
        let owner = self.routers.get(&router).and_then(|r| r.owner().cloned());
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let changed = node.router != Some(router);
        node.router = Some(router);
        let destroyed = node.destroyed;

        if let Some(owner) = owner {
            node.parent = Some(owner.clone());
            if let Some(owner_node) = self.nodes.get_mut(&owner) {
                if !destroyed && !owner_node.child_backstack.contains(id) {
                    owner_node.child_backstack.push(id.clone());
                }
            }
        }

        self.perform_restore_instance_state(id);
        if changed {
            self.replay_router_actions(id);
        }
    }

    fn perform_restore_instance_state(&mut self, id: &InstanceId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Some(saved) = node.saved_instance_state.take() else {
            return;
        };
        node.screen.on_restore_state(&saved);
        for listener in node.listener_snapshot() {
            listener.on_restore_state(id, &saved);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Host relays
    // ─────────────────────────────────────────────────────────

    pub(crate) fn relay_host_event(&mut self, id: &InstanceId, event: HostEvent) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        match event {
            HostEvent::Started => node.screen.on_host_started(),
            HostEvent::Resumed => {
                if !node.attached && node.view.is_some() && node.view_is_attached {
                    self.attach_node(id);
                } else if node.attached {
                    node.needs_attach = false;
                    node.has_saved_view_state = false;
                }
                if let Some(node) = self.nodes.get_mut(id) {
                    node.screen.on_host_resumed();
                }
            }
            HostEvent::Paused => node.screen.on_host_paused(),
            HostEvent::Stopped => node.screen.on_host_stopped(),
        }
    }

    /// Host teardown. A configuration change keeps the node alive.
    pub(crate) fn node_host_destroyed(&mut self, id: &InstanceId, is_config_change: bool) {
        if is_config_change {
            self.detach_node(id, true);
        } else {
            self.destroy_node(id, true);
        }
    }

    /// Offer back to attached child nodes (most recent first), then the screen
    pub(crate) fn node_handle_back(&mut self, id: &InstanceId) -> Result<bool> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(false);
        };

        for child in node.child_backstack.iter().rev().cloned().collect::<Vec<_>>() {
            let router = match self.nodes.get(&child) {
                Some(child) if child.attached => child.router,
                _ => None,
            };
            if let Some(router) = router {
                if self.handle_back(router)? {
                    return Ok(true);
                }
            }
        }

        Ok(self
            .nodes
            .get_mut(id)
            .is_some_and(|node| node.screen.handle_back()))
    }
}
