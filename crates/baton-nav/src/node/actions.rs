//! Public per-node operations

use std::rc::Rc;

use baton_core::prelude::*;

use super::{LifecycleListener, Node, RetainViewMode, RouterAction};
use crate::transition::ChangeHandler;
use crate::Navigator;

impl Navigator {
    /// Create a node from a registered screen type
    ///
    /// Unregistered type tags are fatal so that every live node can be
    /// re-created on restore.
    pub fn create_node(&mut self, type_tag: &str, args: Bundle) -> Result<InstanceId> {
        let screen = self.registry.create_screen(type_tag, &args)?;
        let id = InstanceId::generate();
        debug!("Created node {} ({})", id, type_tag);
        self.nodes.insert(id.clone(), Node::new(id.clone(), args, screen));
        Ok(id)
    }

    pub(crate) fn node_mut(&mut self, id: &InstanceId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or_else(|| Error::unknown_node(id))
    }

    /// Set the node this one reports results to. May only be set once.
    pub fn set_target(&mut self, id: &InstanceId, target: &InstanceId) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.target.is_some() {
            return Err(Error::TargetAlreadySet { id: id.clone() });
        }
        node.target = Some(target.clone());
        Ok(())
    }

    /// Resolve the node's target through its root router tree, then the
    /// root's siblings
    pub fn target_node(&self, id: &InstanceId) -> Option<InstanceId> {
        let node = self.nodes.get(id)?;
        let target = node.target.as_ref()?;
        let root = self.root_router(node.router?)?;

        if let Some(found) = self.node_with_instance_id(root, target) {
            return Some(found);
        }
        self.sibling_routers(root)
            .into_iter()
            .find_map(|router| self.node_with_instance_id(router, target))
    }

    pub fn set_retain_view_mode(&mut self, id: &InstanceId, mode: RetainViewMode) -> Result<()> {
        let node = self.node_mut(id)?;
        node.retain_view_mode = mode;
        let release = mode == RetainViewMode::ReleaseOnDetach && !node.attached;
        if release {
            self.release_view(id);
        }
        Ok(())
    }

    /// Push handler used for this node regardless of the entry's own
    pub fn override_push_handler(
        &mut self,
        id: &InstanceId,
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        if let Some(handler) = &handler {
            self.registry.ensure_handler(handler)?;
        }
        self.node_mut(id)?.push_override = handler;
        Ok(())
    }

    pub fn override_pop_handler(
        &mut self,
        id: &InstanceId,
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        if let Some(handler) = &handler {
            self.registry.ensure_handler(handler)?;
        }
        self.node_mut(id)?.pop_override = handler;
        Ok(())
    }

    pub fn add_lifecycle_listener(
        &mut self,
        id: &InstanceId,
        listener: Rc<dyn LifecycleListener>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        if !node.listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            node.listeners.push(listener);
        }
        Ok(())
    }

    pub fn remove_lifecycle_listener(
        &mut self,
        id: &InstanceId,
        listener: &Rc<dyn LifecycleListener>,
    ) -> Result<()> {
        self.node_mut(id)?
            .listeners
            .retain(|l| !Rc::ptr_eq(l, listener));
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Options menu
    // ─────────────────────────────────────────────────────────

    pub fn set_has_options_menu(&mut self, id: &InstanceId, has_menu: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        let invalidate =
            node.attached && !node.options_menu_hidden && node.has_options_menu != has_menu;
        node.has_options_menu = has_menu;
        if let (true, Some(router)) = (invalidate, node.router) {
            self.invalidate_options_menu(router);
        }
        Ok(())
    }

    pub fn set_options_menu_hidden(&mut self, id: &InstanceId, hidden: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        let invalidate =
            node.attached && node.has_options_menu && node.options_menu_hidden != hidden;
        node.options_menu_hidden = hidden;
        if let (true, Some(router)) = (invalidate, node.router) {
            self.invalidate_options_menu(router);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Host requests (deferred until the node has a router)
    // ─────────────────────────────────────────────────────────

    pub fn start_activity(&mut self, id: &InstanceId, intent: Intent) -> Result<()> {
        self.with_router(id, RouterAction::StartActivity(intent))
    }

    pub fn start_activity_for_result(
        &mut self,
        id: &InstanceId,
        intent: Intent,
        request_code: i32,
    ) -> Result<()> {
        self.with_router(
            id,
            RouterAction::StartActivityForResult {
                intent,
                request_code,
            },
        )
    }

    pub fn register_for_activity_result(&mut self, id: &InstanceId, request_code: i32) -> Result<()> {
        self.with_router(id, RouterAction::RegisterForActivityResult { request_code })
    }

    pub fn request_permissions(
        &mut self,
        id: &InstanceId,
        permissions: &[String],
        request_code: i32,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        for permission in permissions {
            if !node.requested_permissions.contains(permission) {
                node.requested_permissions.push(permission.clone());
            }
        }
        self.with_router(
            id,
            RouterAction::RequestPermissions {
                permissions: permissions.to_vec(),
                request_code,
            },
        )
    }

    pub fn did_request_permission(&self, id: &InstanceId, permission: &str) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|n| n.did_request_permission(permission))
    }

    pub fn should_show_request_permission_rationale(&self, id: &InstanceId, permission: &str) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|n| n.screen.should_show_request_permission_rationale(permission))
    }

    fn with_router(&mut self, id: &InstanceId, action: RouterAction) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.router.is_none() {
            debug!("Deferring {:?} for {} until it has a router", action, id);
            node.pending_actions.push(action);
        } else {
            self.run_router_action(id, action);
        }
        Ok(())
    }

    pub(crate) fn replay_router_actions(&mut self, id: &InstanceId) {
        let actions = match self.nodes.get_mut(id) {
            Some(node) => std::mem::take(&mut node.pending_actions),
            None => return,
        };
        for action in actions {
            self.run_router_action(id, action);
        }
    }

    fn run_router_action(&mut self, id: &InstanceId, action: RouterAction) {
        let Some(router) = self.nodes.get(id).and_then(|n| n.router) else {
            return;
        };

        match &action {
            RouterAction::StartActivityForResult { request_code, .. }
            | RouterAction::RegisterForActivityResult { request_code } => {
                self.activity_requests.insert(*request_code, id.clone());
            }
            RouterAction::RequestPermissions { request_code, .. } => {
                self.permission_requests.insert(*request_code, id.clone());
            }
            RouterAction::StartActivity(_) => {}
        }

        let Some(host) = self.host_for(router) else {
            warn!("No host bound for {}, dropping {:?}", router, action);
            return;
        };
        match action {
            RouterAction::StartActivity(intent) => host.start_activity(&intent),
            RouterAction::StartActivityForResult {
                intent,
                request_code,
            } => host.start_activity_for_result(id, &intent, request_code),
            RouterAction::RegisterForActivityResult { request_code } => {
                host.register_for_activity_result(id, request_code)
            }
            RouterAction::RequestPermissions {
                permissions,
                request_code,
            } => host.request_permissions(id, &permissions, request_code),
        }
    }
}
