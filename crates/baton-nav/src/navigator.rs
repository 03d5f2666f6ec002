//! The hierarchy root
//!
//! A [`Navigator`] owns every view, node and router of one hierarchy along
//! with the in-progress push table and the completion channel. All work is
//! single-threaded: queued view events and reported completions are drained by
//! [`pump`](Navigator::pump), which every public operation calls before
//! returning.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use baton_core::prelude::*;

use crate::config::NavigatorConfig;
use crate::node::Node;
use crate::registry::Registry;
use crate::router::{Router, RouterId};
use crate::state::RouterState;
use crate::transition::execute::InFlightChange;
use crate::transition::{ChangeHandler, ChangeToken};
use crate::view::{ContainerId, ViewId, ViewTree};

pub struct Navigator {
    pub(crate) views: ViewTree,
    pub(crate) nodes: HashMap<InstanceId, Node>,
    pub(crate) routers: HashMap<RouterId, Router>,
    pub(crate) root_routers: Vec<RouterId>,
    pub(crate) registry: Registry,
    pub(crate) config: NavigatorConfig,
    next_router_id: u64,

    /// Pushes whose transition has not settled, keyed by the incoming node
    pub(crate) in_progress_pushes: HashMap<InstanceId, ChangeHandler>,
    pub(crate) in_flight: BTreeMap<ChangeToken, InFlightChange>,
    pub(crate) next_token: u64,
    pub(crate) completion_tx: Sender<ChangeToken>,
    completion_rx: Receiver<ChangeToken>,

    pub(crate) view_owners: HashMap<ViewId, InstanceId>,
    pub(crate) tombstones: HashSet<InstanceId>,

    /// Saved routers waiting for a host to attach their container
    pub(crate) pending_router_states: BTreeMap<ContainerId, RouterState>,
    pub(crate) activity_requests: BTreeMap<i32, InstanceId>,
    pub(crate) permission_requests: BTreeMap<i32, InstanceId>,

    pub(crate) prepared_for_host_detach: bool,
    pumping: bool,
}

impl Navigator {
    pub fn new(registry: Registry, config: NavigatorConfig) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            views: ViewTree::new(),
            nodes: HashMap::new(),
            routers: HashMap::new(),
            root_routers: Vec::new(),
            registry,
            config,
            next_router_id: 0,
            in_progress_pushes: HashMap::new(),
            in_flight: BTreeMap::new(),
            next_token: 0,
            completion_tx,
            completion_rx,
            view_owners: HashMap::new(),
            tombstones: HashSet::new(),
            pending_router_states: BTreeMap::new(),
            activity_requests: BTreeMap::new(),
            permission_requests: BTreeMap::new(),
            prepared_for_host_detach: false,
            pumping: false,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────

    pub fn views(&self) -> &ViewTree {
        &self.views
    }

    /// Mutable view tree, for hosts building windows and containers.
    ///
    /// Call [`pump`](Navigator::pump) after changing it so attach events reach
    /// the nodes.
    pub fn views_mut(&mut self) -> &mut ViewTree {
        &mut self.views
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Live node, or `None` once it has been destroyed and purged
    pub fn node(&self, id: &InstanceId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn is_destroyed(&self, id: &InstanceId) -> bool {
        self.tombstones.contains(id) || self.nodes.get(id).is_some_and(|n| n.destroyed)
    }

    pub fn is_attached(&self, id: &InstanceId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.attached)
    }

    pub fn root_routers(&self) -> &[RouterId] {
        &self.root_routers
    }

    /// Whether any transition is still waiting to complete
    pub fn has_pending_changes(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub(crate) fn next_router_id(&mut self) -> RouterId {
        self.next_router_id += 1;
        RouterId(self.next_router_id)
    }

    // ─────────────────────────────────────────────────────────
    // Event loop
    // ─────────────────────────────────────────────────────────

    /// Dispatch queued view events and completions until both queues are empty
    pub fn pump(&mut self) {
        if self.pumping {
            return;
        }
        self.pumping = true;

        loop {
            if let Some(event) = self.views.next_event() {
                self.dispatch_view_event(event);
                continue;
            }
            match self.completion_rx.try_recv() {
                Ok(token) => self.finish_change(token),
                Err(_) => break,
            }
        }

        self.purge_destroyed();
        self.pumping = false;
    }

    /// Drive frame-based transitions forward by `elapsed`
    pub fn advance_frame(&mut self, elapsed: Duration) {
        let mut handlers: Vec<ChangeHandler> = Vec::new();
        for change in self.in_flight.values() {
            if !handlers.iter().any(|h| h.ptr_eq(&change.handler)) {
                handlers.push(change.handler.clone());
            }
        }

        for handler in handlers {
            handler.on_frame(&mut self.views, elapsed);
        }
        self.pump();
    }

    /// Drop destroyed nodes and emptied routers no running change still needs
    fn purge_destroyed(&mut self) {
        let referenced = |id: &InstanceId, in_flight: &BTreeMap<ChangeToken, InFlightChange>| {
            in_flight.values().any(|change| change.references(id))
        };

        let dead: Vec<InstanceId> = self
            .nodes
            .iter()
            .filter(|(id, node)| node.destroyed && !referenced(id, &self.in_flight))
            .map(|(id, _)| id.clone())
            .collect();
        for id in dead {
            self.nodes.remove(&id);
            self.in_progress_pushes.remove(&id);
            trace!("Purged {}", id);
            self.tombstones.insert(id);
        }

        let dead_routers: Vec<RouterId> = self
            .routers
            .values()
            .filter(|r| {
                r.destroyed
                    && r.backstack.is_empty()
                    && r.destroying.is_empty()
                    && !self.in_flight.values().any(|change| change.router == r.id())
            })
            .map(Router::id)
            .collect();
        for id in dead_routers {
            if let Some(router) = self.routers.remove(&id) {
                if let Some(owner) = router.owner().and_then(|o| self.nodes.get_mut(o)) {
                    owner.child_routers.retain(|r| *r != id);
                }
                trace!("Purged {}", id);
            }
            self.root_routers.retain(|r| *r != id);
        }
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("nodes", &self.nodes.len())
            .field("routers", &self.root_routers)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
