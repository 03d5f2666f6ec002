//! Minimal retained view hierarchy
//!
//! This is not a rendering engine. It tracks just enough structure for the
//! navigation engine to work: parent/child links, which views are attached
//! to a window, container ids used to re-resolve child routers, opaque
//! per-view state and the two visual properties animated transitions touch.
//!
//! Window attachment changes of observed views are queued as [`ViewEvent`]s
//! and dispatched cooperatively by the navigator.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use baton_core::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Handle to a view in a [`ViewTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Stable identifier of a container view, preserved across view recreation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Window attachment change of an observed view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    Attached(ViewId),
    Detached(ViewId),
}

#[derive(Debug)]
struct ViewRecord {
    parent: Option<ViewId>,
    children: Vec<ViewId>,
    container_id: Option<ContainerId>,
    window_root: bool,
    observed: bool,
    released: bool,
    state: Bundle,
    alpha: f32,
    offset: (f32, f32),
}

impl ViewRecord {
    fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            container_id: None,
            window_root: false,
            observed: false,
            released: false,
            state: Bundle::new(),
            alpha: 1.0,
            offset: (0.0, 0.0),
        }
    }
}

/// Arena of views
#[derive(Debug, Default)]
pub struct ViewTree {
    views: HashMap<ViewId, ViewRecord>,
    next_id: u64,
    events: VecDeque<ViewEvent>,
}

impl ViewTree {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────

    /// Create a detached view
    pub fn create_view(&mut self) -> ViewId {
        self.next_id += 1;
        let id = ViewId(self.next_id);
        self.views.insert(id, ViewRecord::new());
        id
    }

    /// Create a view that can host a router
    pub fn create_container(&mut self, container_id: impl Into<ContainerId>) -> ViewId {
        let id = self.create_view();
        if let Some(record) = self.views.get_mut(&id) {
            record.container_id = Some(container_id.into());
        }
        id
    }

    /// Create the root of a window. Everything parented under it is attached.
    pub fn create_window_root(&mut self) -> ViewId {
        let id = self.create_view();
        if let Some(record) = self.views.get_mut(&id) {
            record.window_root = true;
        }
        id
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.views.contains_key(&view)
    }

    // ─────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────

    pub fn parent(&self, view: ViewId) -> Option<ViewId> {
        self.views.get(&view).and_then(|r| r.parent)
    }

    pub fn children(&self, view: ViewId) -> &[ViewId] {
        self.views
            .get(&view)
            .map(|r| r.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_of(&self, parent: ViewId, child: ViewId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    pub fn container_id(&self, view: ViewId) -> Option<&ContainerId> {
        self.views.get(&view).and_then(|r| r.container_id.as_ref())
    }

    /// Whether the view is currently part of a window
    pub fn is_attached_to_window(&self, view: ViewId) -> bool {
        let mut current = Some(view);
        while let Some(id) = current {
            match self.views.get(&id) {
                Some(record) if record.window_root => return true,
                Some(record) => current = record.parent,
                None => return false,
            }
        }
        false
    }

    /// Append `child` as the last child of `parent`
    pub fn add_child(&mut self, parent: ViewId, child: ViewId) -> Result<()> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Insert `child` under `parent` at `index`, reparenting it if needed
    pub fn insert_child(&mut self, parent: ViewId, index: usize, child: ViewId) -> Result<()> {
        if parent == child {
            return Err(Error::view(format!("{} cannot be its own parent", child)));
        }
        if !self.views.contains_key(&parent) || !self.views.contains_key(&child) {
            return Err(Error::view(format!(
                "cannot add {} to {}: unknown view",
                child, parent
            )));
        }
        if self.is_descendant(parent, child) {
            return Err(Error::view(format!(
                "cannot add {} to its own descendant {}",
                child, parent
            )));
        }

        if self.parent(child).is_some() {
            self.remove_from_parent(child);
        }

        if let Some(record) = self.views.get_mut(&parent) {
            let index = index.min(record.children.len());
            record.children.insert(index, child);
        }
        if let Some(record) = self.views.get_mut(&child) {
            record.parent = Some(parent);
        }

        if self.is_attached_to_window(parent) {
            self.queue_subtree_events(child, true);
        }
        trace!("Added {} under {}", child, parent);
        Ok(())
    }

    /// Detach `view` from its parent. Released views are dropped from the tree.
    pub fn remove_from_parent(&mut self, view: ViewId) -> bool {
        let Some(parent) = self.parent(view) else {
            return false;
        };
        let was_attached = self.is_attached_to_window(view);

        if let Some(record) = self.views.get_mut(&parent) {
            record.children.retain(|c| *c != view);
        }
        if let Some(record) = self.views.get_mut(&view) {
            record.parent = None;
        }

        if was_attached {
            self.queue_subtree_events(view, false);
        }
        trace!("Removed {} from {}", view, parent);

        if self.views.get(&view).is_some_and(|r| r.released) {
            self.drop_subtree(view);
        }
        true
    }

    /// Depth-first search for a container view, `root` included
    pub fn find_container(&self, root: ViewId, container_id: &ContainerId) -> Option<ViewId> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let record = self.views.get(&id)?;
            if record.container_id.as_ref() == Some(container_id) {
                return Some(id);
            }
            stack.extend(record.children.iter().rev().copied());
        }
        None
    }

    fn is_descendant(&self, view: ViewId, ancestor: ViewId) -> bool {
        let mut current = self.parent(view);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn subtree(&self, root: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(record) = self.views.get(&id) {
                out.push(id);
                stack.extend(record.children.iter().rev().copied());
            }
        }
        out
    }

    fn queue_subtree_events(&mut self, root: ViewId, attached: bool) {
        for id in self.subtree(root) {
            if self.views.get(&id).is_some_and(|r| r.observed) {
                self.events.push_back(if attached {
                    ViewEvent::Attached(id)
                } else {
                    ViewEvent::Detached(id)
                });
            }
        }
    }

    fn drop_subtree(&mut self, root: ViewId) {
        for id in self.subtree(root) {
            self.views.remove(&id);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────

    /// Start reporting window attach/detach of `view`.
    ///
    /// A view that is already in a window reports `Attached` right away.
    pub fn observe(&mut self, view: ViewId) {
        let attached = self.is_attached_to_window(view);
        if let Some(record) = self.views.get_mut(&view) {
            record.observed = true;
            if attached {
                self.events.push_back(ViewEvent::Attached(view));
            }
        }
    }

    pub fn unobserve(&mut self, view: ViewId) {
        if let Some(record) = self.views.get_mut(&view) {
            record.observed = false;
        }
        self.events.retain(|e| match e {
            ViewEvent::Attached(v) | ViewEvent::Detached(v) => *v != view,
        });
    }

    pub fn next_event(&mut self) -> Option<ViewEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Mark `view` as no longer owned by anyone.
    ///
    /// Unparented views are dropped immediately; parented ones stay until
    /// they are removed from their parent.
    pub fn release(&mut self, view: ViewId) {
        let parented = match self.views.get_mut(&view) {
            Some(record) => {
                record.released = true;
                record.observed = false;
                record.parent.is_some()
            }
            None => return,
        };
        if !parented {
            self.drop_subtree(view);
        }
    }

    // ─────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────

    pub fn state(&self, view: ViewId) -> Option<&Bundle> {
        self.views.get(&view).map(|r| &r.state)
    }

    pub fn state_mut(&mut self, view: ViewId) -> Option<&mut Bundle> {
        self.views.get_mut(&view).map(|r| &mut r.state)
    }

    /// Snapshot the state of `view` and its descendants
    pub fn save_hierarchy_state(&self, view: ViewId) -> Bundle {
        let mut out = Bundle::new();
        if let Some(record) = self.views.get(&view) {
            out.insert("state".into(), Value::Object(record.state.clone()));
            let children: Vec<Value> = record
                .children
                .iter()
                .map(|c| Value::Object(self.save_hierarchy_state(*c)))
                .collect();
            out.insert("children".into(), Value::Array(children));
        }
        out
    }

    /// Apply a snapshot taken by [`save_hierarchy_state`](Self::save_hierarchy_state).
    /// Children are matched by position; extra entries on either side are ignored.
    pub fn restore_hierarchy_state(&mut self, view: ViewId, saved: &Bundle) {
        if let Some(Value::Object(state)) = saved.get("state") {
            if let Some(record) = self.views.get_mut(&view) {
                record.state = state.clone();
            }
        }
        let children = self.children(view).to_vec();
        if let Some(Value::Array(saved_children)) = saved.get("children") {
            for (child, saved_child) in children.iter().zip(saved_children) {
                if let Value::Object(saved_child) = saved_child {
                    self.restore_hierarchy_state(*child, saved_child);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Visual properties
    // ─────────────────────────────────────────────────────────

    pub fn alpha(&self, view: ViewId) -> f32 {
        self.views.get(&view).map(|r| r.alpha).unwrap_or(1.0)
    }

    pub fn set_alpha(&mut self, view: ViewId, alpha: f32) {
        if let Some(record) = self.views.get_mut(&view) {
            record.alpha = alpha.clamp(0.0, 1.0);
        }
    }

    pub fn offset(&self, view: ViewId) -> (f32, f32) {
        self.views.get(&view).map(|r| r.offset).unwrap_or((0.0, 0.0))
    }

    pub fn set_offset(&mut self, view: ViewId, offset: (f32, f32)) {
        if let Some(record) = self.views.get_mut(&view) {
            record.offset = offset;
        }
    }

    /// Human readable dump, used by the script runner
    pub fn describe(&self, view: ViewId) -> Value {
        match self.views.get(&view) {
            Some(record) => json!({
                "id": view.0,
                "container": record.container_id.as_ref().map(|c| c.as_str()),
                "children": record.children.iter().map(|c| self.describe(*c)).collect::<Vec<_>>(),
            }),
            None => Value::Null,
        }
    }
}
