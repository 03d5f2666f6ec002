//! Nodes: navigable units with their own view and lifecycle
//!
//! A [`Node`] wraps a concrete [`Screen`] and carries everything the engine
//! tracks about it: lifecycle flags, its current view, saved state, child
//! routers and back-references to its router and parent (as plain ids).

mod actions;
pub(crate) mod lifecycle;
mod listener;

pub use listener::LifecycleListener;

use std::rc::Rc;

use baton_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::router::RouterId;
use crate::state::SavedViewState;
use crate::transition::{ChangeHandler, ChangeType};
use crate::view::{ViewId, ViewTree};

/// When a detached node gives up its view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainViewMode {
    /// Release the view as soon as the node detaches
    #[default]
    ReleaseOnDetach,
    /// Keep the view across detach; released on destroy or host teardown
    RetainOnDetach,
}

/// The concrete behaviour of a node
///
/// Only [`type_tag`](Screen::type_tag) and [`create_view`](Screen::create_view)
/// are required; every other hook defaults to doing nothing.
pub trait Screen {
    /// Registry tag used to re-create this screen on restore
    fn type_tag(&self) -> &str;

    /// Build this screen's view. Must not return `container` itself.
    fn create_view(&mut self, views: &mut ViewTree, container: ViewId) -> Result<ViewId>;

    fn on_attach(&mut self, _view: ViewId) {}
    fn on_detach(&mut self, _view: ViewId) {}
    fn on_destroy_view(&mut self, _view: ViewId) {}
    fn on_destroy(&mut self) {}

    fn on_change_started(&mut self, _handler: &ChangeHandler, _change: ChangeType) {}
    fn on_change_ended(&mut self, _handler: &ChangeHandler, _change: ChangeType) {}

    fn on_host_started(&mut self) {}
    fn on_host_resumed(&mut self) {}
    fn on_host_paused(&mut self) {}
    fn on_host_stopped(&mut self) {}

    fn on_save_view_state(&mut self, _views: &ViewTree, _view: ViewId, _out: &mut Bundle) {}
    fn on_restore_view_state(&mut self, _views: &mut ViewTree, _view: ViewId, _saved: &Bundle) {}
    fn on_save_state(&mut self, _out: &mut Bundle) {}
    fn on_restore_state(&mut self, _saved: &Bundle) {}

    fn on_activity_result(&mut self, _request_code: i32, _result_code: i32, _data: Option<&Intent>) {}
    fn on_request_permissions_result(
        &mut self,
        _request_code: i32,
        _permissions: &[String],
        _grant_results: &[i32],
    ) {
    }
    fn should_show_request_permission_rationale(&self, _permission: &str) -> bool {
        false
    }

    /// Consume a back press. Child routers get the first chance.
    fn handle_back(&mut self) -> bool {
        false
    }
}

/// Something a node asked of its host before it had a router
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RouterAction {
    StartActivity(Intent),
    StartActivityForResult { intent: Intent, request_code: i32 },
    RegisterForActivityResult { request_code: i32 },
    RequestPermissions { permissions: Vec<String>, request_code: i32 },
}

/// A navigable unit
pub struct Node {
    pub(crate) id: InstanceId,
    pub(crate) type_tag: String,
    pub(crate) args: Bundle,
    pub(crate) screen: Box<dyn Screen>,

    pub(crate) router: Option<RouterId>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) target: Option<InstanceId>,

    pub(crate) view: Option<ViewId>,
    pub(crate) destroyed_view: Option<ViewId>,
    pub(crate) view_state: Option<SavedViewState>,
    pub(crate) saved_instance_state: Option<Bundle>,

    pub(crate) attached: bool,
    pub(crate) being_destroyed: bool,
    pub(crate) destroyed: bool,
    pub(crate) needs_attach: bool,
    pub(crate) detach_frozen: bool,
    pub(crate) performing_exit_transition: bool,
    pub(crate) view_is_attached: bool,
    pub(crate) view_was_detached: bool,
    pub(crate) attached_to_unowned_parent: bool,
    pub(crate) has_saved_view_state: bool,
    pub(crate) has_options_menu: bool,
    pub(crate) options_menu_hidden: bool,

    pub(crate) retain_view_mode: RetainViewMode,
    pub(crate) push_override: Option<ChangeHandler>,
    pub(crate) pop_override: Option<ChangeHandler>,

    pub(crate) child_routers: Vec<RouterId>,
    pub(crate) child_backstack: Vec<InstanceId>,
    pub(crate) listeners: Vec<Rc<dyn LifecycleListener>>,
    pub(crate) requested_permissions: Vec<String>,
    pub(crate) pending_actions: Vec<RouterAction>,
}

impl Node {
    pub(crate) fn new(id: InstanceId, args: Bundle, screen: Box<dyn Screen>) -> Self {
        Self {
            id,
            type_tag: screen.type_tag().to_string(),
            args,
            screen,
            router: None,
            parent: None,
            target: None,
            view: None,
            destroyed_view: None,
            view_state: None,
            saved_instance_state: None,
            attached: false,
            being_destroyed: false,
            destroyed: false,
            needs_attach: false,
            detach_frozen: false,
            performing_exit_transition: false,
            view_is_attached: false,
            view_was_detached: false,
            attached_to_unowned_parent: false,
            has_saved_view_state: false,
            has_options_menu: false,
            options_menu_hidden: false,
            retain_view_mode: RetainViewMode::default(),
            push_override: None,
            pop_override: None,
            child_routers: Vec::new(),
            child_backstack: Vec::new(),
            listeners: Vec::new(),
            requested_permissions: Vec::new(),
            pending_actions: Vec::new(),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.id
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn args(&self) -> &Bundle {
        &self.args
    }

    pub fn view(&self) -> Option<ViewId> {
        self.view
    }

    pub fn router(&self) -> Option<RouterId> {
        self.router
    }

    pub fn parent(&self) -> Option<&InstanceId> {
        self.parent.as_ref()
    }

    pub fn target_instance_id(&self) -> Option<&InstanceId> {
        self.target.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_being_destroyed(&self) -> bool {
        self.being_destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn needs_attach(&self) -> bool {
        self.needs_attach
    }

    pub fn retain_view_mode(&self) -> RetainViewMode {
        self.retain_view_mode
    }

    pub fn has_options_menu(&self) -> bool {
        self.has_options_menu
    }

    pub fn options_menu_hidden(&self) -> bool {
        self.options_menu_hidden
    }

    pub fn overridden_push_handler(&self) -> Option<&ChangeHandler> {
        self.push_override.as_ref()
    }

    pub fn overridden_pop_handler(&self) -> Option<&ChangeHandler> {
        self.pop_override.as_ref()
    }

    pub fn child_routers(&self) -> &[RouterId] {
        &self.child_routers
    }

    /// Nodes pushed into this node's child routers, oldest first
    pub fn child_backstack(&self) -> &[InstanceId] {
        &self.child_backstack
    }

    pub fn requested_permissions(&self) -> &[String] {
        &self.requested_permissions
    }

    pub fn did_request_permission(&self, permission: &str) -> bool {
        self.requested_permissions.iter().any(|p| p == permission)
    }

    /// Snapshot of the listener list, safe to iterate while listeners change
    pub(crate) fn listener_snapshot(&self) -> Vec<Rc<dyn LifecycleListener>> {
        self.listeners.clone()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type_tag", &self.type_tag)
            .field("view", &self.view)
            .field("router", &self.router)
            .field("attached", &self.attached)
            .field("being_destroyed", &self.being_destroyed)
            .field("destroyed", &self.destroyed)
            .field("needs_attach", &self.needs_attach)
            .finish()
    }
}
