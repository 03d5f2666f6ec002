//! Backstack operations and reconciliation
//!
//! The backstack list is always updated before any transition runs, so reads
//! during a transition see the new logical state. Node `attached` flags only
//! flip once the transition reports completion.

use baton_core::prelude::*;

use super::RouterId;
use crate::entry::BackstackEntry;
use crate::transition::{ChangeHandler, NoOpHandler, SimpleSwapHandler};
use crate::Navigator;

impl Navigator {
    // ─────────────────────────────────────────────────────────
    // Public operations
    // ─────────────────────────────────────────────────────────

    /// Replace the whole backstack with a single entry
    #[instrument(level = "debug", skip(self, entry), fields(node = %entry.node()))]
    pub fn set_root(&mut self, router: RouterId, entry: BackstackEntry) -> Result<()> {
        let handler = self.effective_push_handler(&entry);
        self.set_backstack(router, vec![entry], handler)
    }

    #[instrument(level = "debug", skip(self, entry), fields(node = %entry.node()))]
    pub fn push(&mut self, router: RouterId, entry: BackstackEntry) -> Result<()> {
        self.validate_new_entry(router, &entry)?;

        let handler = self.effective_push_handler(&entry);
        let to = entry.node().clone();
        let r = self.router_mut(router)?;
        let from = r.top().map(|e| e.node().clone());
        r.backstack.push(entry);

        self.perform_entry_change(router, Some(to), from, true, handler)
    }

    /// Pop the top entry. Returns whether anything is left to show.
    pub fn pop_current(&mut self, router: RouterId) -> Result<bool> {
        let top = self
            .router_ref(router)?
            .top()
            .map(|e| e.node().clone())
            .ok_or(Error::EmptyBackstack)?;
        self.pop_node(router, &top)
    }

    /// Remove `id` from the backstack
    ///
    /// Only the visible top runs its pop handler; a covered node is removed
    /// through reconciliation and destroyed without animation.
    #[instrument(level = "debug", skip(self))]
    pub fn pop_node(&mut self, router: RouterId, id: &InstanceId) -> Result<bool> {
        let r = self.router_ref(router)?;
        let had_top = r.top().is_some();
        let popping_top = r.top().is_some_and(|e| e.node() == id);

        if popping_top {
            let r = self.router_mut(router)?;
            let popped = r.backstack.pop();
            let new_top = r.top().map(|e| e.node().clone());
            if let Some(popped) = popped {
                self.track_destroying(router, id);
                self.destroy_node(id, false);
                let handler = self.effective_pop_handler(&popped);
                self.perform_entry_change(router, new_top, Some(id.clone()), false, handler)?;
            }
        } else if r.contains_node(id) {
            let remaining: Vec<BackstackEntry> = r
                .backstack
                .iter()
                .filter(|e| e.node() != id)
                .cloned()
                .collect();
            self.set_backstack(router, remaining, None)?;
        }

        let r = self.router_ref(router)?;
        Ok(if r.pops_last_view {
            had_top
        } else {
            !r.backstack.is_empty()
        })
    }

    /// Pop everything above the entry tagged `tag`. Returns false if no entry
    /// carries the tag.
    pub fn pop_to_tag(
        &mut self,
        router: RouterId,
        tag: &str,
        handler: Option<ChangeHandler>,
    ) -> Result<bool> {
        let r = self.router_ref(router)?;
        let Some(index) = r.backstack.iter().position(|e| e.tag() == Some(tag)) else {
            return Ok(false);
        };
        self.pop_to_index(router, index, handler)?;
        Ok(true)
    }

    /// Pop everything above the root. Returns false if there was nothing to pop.
    pub fn pop_to_root(&mut self, router: RouterId, handler: Option<ChangeHandler>) -> Result<bool> {
        if self.backstack_len(router) <= 1 {
            return Ok(false);
        }
        self.pop_to_index(router, 0, handler)?;
        Ok(true)
    }

    fn pop_to_index(
        &mut self,
        router: RouterId,
        index: usize,
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        let r = self.router_ref(router)?;
        let kept = r.backstack[..=index].to_vec();
        let handler = match handler {
            Some(handler) => Some(handler),
            None => r.top().and_then(|top| self.effective_pop_handler(top)),
        };
        self.set_backstack(router, kept, handler)
    }

    /// Swap the top entry for `entry` in one step
    ///
    /// The old top stays in the container until the new top's view is in, so
    /// the container is never left empty.
    #[instrument(level = "debug", skip(self, entry), fields(node = %entry.node()))]
    pub fn replace_top(&mut self, router: RouterId, entry: BackstackEntry) -> Result<()> {
        let r = self.router_ref(router)?;
        let old_top = r.top().cloned();

        // The outgoing top may share the incoming tag
        let mut candidate = r.backstack.clone();
        candidate.pop();
        candidate.push(entry.clone());
        self.validate_backstack(router, &candidate)?;

        let handler = self.effective_push_handler(&entry);

        if let Some(old_top) = &old_top {
            self.router_mut(router)?.backstack.pop();
            self.track_destroying(router, old_top.node());
            self.destroy_node(old_top.node(), false);

            let old_removed_views = self
                .effective_push_handler(old_top)
                .map_or(true, |h| h.removes_from_view_on_push());
            let new_removes_views = handler.as_ref().map_or(true, |h| h.removes_from_view_on_push());
            if !old_removed_views && new_removes_views {
                let remaining = self.router_ref(router)?.backstack.clone();
                for visible in self.visible_entries(&remaining) {
                    self.perform_entry_change(
                        router,
                        None,
                        Some(visible.node().clone()),
                        true,
                        handler.clone(),
                    )?;
                }
            }
        }

        let to = entry.node().clone();
        self.router_mut(router)?.backstack.push(entry);
        if let Some(handler) = &handler {
            handler.set_force_remove_view_on_push(true);
        }
        self.perform_entry_change(
            router,
            Some(to),
            old_top.map(|e| e.node().clone()),
            true,
            handler,
        )
    }

    /// Offer back to the top node, then pop if there is something to go back to
    pub fn handle_back(&mut self, router: RouterId) -> Result<bool> {
        let r = self.router_ref(router)?;
        let Some(top) = r.top().map(|e| e.node().clone()) else {
            return Ok(false);
        };
        let can_pop = r.backstack.len() > 1 || r.pops_last_view;

        if self.node_handle_back(&top)? {
            return Ok(true);
        }
        if can_pop && self.pop_current(router)? {
            return Ok(true);
        }
        Ok(false)
    }

    /// Reconcile the backstack with `entries`
    ///
    /// Nodes present in both lists survive untouched. Only the visible
    /// boundary changes; removed nodes are destroyed once their transitions
    /// have been started.
    #[instrument(level = "debug", skip(self, entries, handler), fields(len = entries.len()))]
    pub fn set_backstack(
        &mut self,
        router: RouterId,
        entries: Vec<BackstackEntry>,
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        self.validate_backstack(router, &entries)?;
        if let Some(handler) = &handler {
            self.registry.ensure_handler(handler)?;
        }

        let old_entries = self.router_ref(router)?.backstack.clone();
        let old_visible = self.visible_entries(&old_entries);
        self.router_mut(router)?.backstack = entries.clone();

        let removed: Vec<BackstackEntry> = old_entries
            .iter()
            .filter(|old| !entries.iter().any(|e| e.same_node(old)))
            .cloned()
            .collect();
        for entry in &removed {
            if let Some(node) = self.nodes.get_mut(entry.node()) {
                node.being_destroyed = true;
            }
        }

        for entry in &entries {
            self.set_node_router(router, entry.node());
        }

        if !entries.is_empty() {
            let new_visible = self.visible_entries(&entries);
            if !same_nodes(&new_visible, &old_visible) {
                self.reconcile_visible(router, &old_entries, &old_visible, &new_visible, handler)?;
            }
        } else {
            for old in old_visible.iter().rev() {
                let local = self.local_handler(handler.as_ref())?;
                self.complete_push_immediately(old.node());
                self.perform_entry_change(router, None, Some(old.node().clone()), false, Some(local))?;
            }
        }

        for entry in &removed {
            self.track_destroying(router, entry.node());
            self.destroy_node(entry.node(), false);
            self.remove_stranded_view(router, entry.node());
        }
        self.pump();
        Ok(())
    }

    fn reconcile_visible(
        &mut self,
        router: RouterId,
        old_entries: &[BackstackEntry],
        old_visible: &[BackstackEntry],
        new_visible: &[BackstackEntry],
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        let old_root = old_visible.first();
        let new_root = &new_visible[0];

        if old_root.map_or(true, |old| !old.same_node(new_root)) {
            let requires_push = !old_entries.iter().any(|e| e.same_node(new_root));
            if let Some(old_root) = old_root {
                self.complete_push_immediately(old_root.node());
            }
            let root_handler = match &handler {
                Some(handler) => Some(handler.clone()),
                None if requires_push => self.effective_push_handler(new_root),
                None => old_entries
                    .last()
                    .and_then(|top| self.effective_pop_handler(top)),
            };
            self.perform_entry_change(
                router,
                Some(new_root.node().clone()),
                old_root.map(|e| e.node().clone()),
                requires_push,
                root_handler,
            )?;
        }

        // Previously visible nodes that are no longer shown leave with a forced removal
        for old in old_visible.iter().skip(1).rev() {
            if new_visible.iter().any(|e| e.same_node(old)) {
                continue;
            }
            let local = self.local_handler(handler.as_ref())?;
            local.set_force_remove_view_on_push(true);
            self.complete_push_immediately(old.node());
            self.perform_entry_change(router, None, Some(old.node().clone()), true, Some(local))?;
        }

        // Newly visible nodes stack on top of the one below them
        for pair in new_visible.windows(2) {
            let (below, entry) = (&pair[0], &pair[1]);
            if old_visible.iter().any(|e| e.same_node(entry)) {
                continue;
            }
            let push_handler = self.effective_push_handler(entry);
            self.perform_entry_change(
                router,
                Some(entry.node().clone()),
                Some(below.node().clone()),
                true,
                push_handler,
            )?;
        }
        Ok(())
    }

    /// Re-attach nodes flagged `needs_attach`, bottom to top
    pub(crate) fn rebind_if_needed(&mut self, router: RouterId) -> Result<()> {
        for entry in self.backstack_entries(router).to_vec() {
            let needs_attach = self
                .nodes
                .get(entry.node())
                .is_some_and(|n| n.needs_attach);
            if needs_attach {
                let handler = ChangeHandler::new(SimpleSwapHandler::new(false));
                self.perform_entry_change(router, Some(entry.node().clone()), None, true, Some(handler))?;
            } else {
                self.set_node_router(router, entry.node());
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────

    /// Entries whose views are on screen, bottom first
    ///
    /// Walks down from the top and stops below the first entry whose push
    /// handler removes the view underneath it.
    pub(crate) fn visible_entries(&self, entries: &[BackstackEntry]) -> Vec<BackstackEntry> {
        let mut visible = Vec::new();
        for entry in entries.iter().rev() {
            visible.push(entry.clone());
            let keeps_below = self
                .effective_push_handler(entry)
                .is_some_and(|h| !h.removes_from_view_on_push());
            if !keeps_below {
                break;
            }
        }
        visible.reverse();
        visible
    }

    pub(crate) fn effective_push_handler(&self, entry: &BackstackEntry) -> Option<ChangeHandler> {
        self.nodes
            .get(entry.node())
            .and_then(|n| n.push_override.clone())
            .or_else(|| entry.push_handler().cloned())
    }

    pub(crate) fn effective_pop_handler(&self, entry: &BackstackEntry) -> Option<ChangeHandler> {
        self.nodes
            .get(entry.node())
            .and_then(|n| n.pop_override.clone())
            .or_else(|| entry.pop_handler().cloned())
    }

    fn local_handler(&self, handler: Option<&ChangeHandler>) -> Result<ChangeHandler> {
        match handler {
            Some(handler) => handler.copy(&self.registry),
            None => Ok(ChangeHandler::new(SimpleSwapHandler::default())),
        }
    }

    /// Take down the view of a removed node that an earlier non-removing push
    /// left in the container and that no running change is moving
    fn remove_stranded_view(&mut self, router: RouterId, id: &InstanceId) {
        if self.in_flight.values().any(|change| change.references(id)) {
            return;
        }
        let container = self.routers.get(&router).and_then(|r| r.container);
        let view = self.nodes.get(id).and_then(|n| n.view);
        if let (Some(container), Some(view)) = (container, view) {
            if self.views.parent(view) == Some(container) {
                trace!("Removing stranded {} of {}", view, id);
                self.views.remove_from_parent(view);
            }
        }
    }

    pub(crate) fn track_destroying(&mut self, router: RouterId, id: &InstanceId) {
        if self.is_destroyed(id) {
            return;
        }
        if let Some(r) = self.routers.get_mut(&router) {
            r.track_destroying(id);
        }
    }

    /// Run a change on behalf of the router
    ///
    /// Binds `to` to the router first. Emptying the backstack without
    /// `pops_last_view` swaps in a no-op handler and force-detaches `from`.
    pub(crate) fn perform_entry_change(
        &mut self,
        router: RouterId,
        to: Option<InstanceId>,
        from: Option<InstanceId>,
        is_push: bool,
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        let mut handler = handler;
        let mut force_detach = false;

        match &to {
            Some(to) => self.set_node_router(router, to),
            None => {
                let r = self.router_ref(router)?;
                if r.backstack.is_empty() && !r.pops_last_view {
                    handler = Some(ChangeHandler::new(NoOpHandler));
                    force_detach = true;
                }
            }
        }

        self.execute_change(router, to, from.clone(), is_push, handler)?;

        if let (true, Some(from)) = (force_detach, from) {
            if self.nodes.get(&from).is_some_and(|n| n.view.is_some()) {
                self.detach_node(&from, true);
                self.pump();
            }
        }
        Ok(())
    }

    fn validate_new_entry(&self, router: RouterId, entry: &BackstackEntry) -> Result<()> {
        let r = self.router_ref(router)?;
        self.validate_node(entry)?;
        if r.contains_node(entry.node()) {
            return Err(Error::DuplicateNode {
                id: entry.node().clone(),
            });
        }
        if let Some(tag) = entry.tag() {
            if r.backstack.iter().any(|e| e.tag() == Some(tag)) {
                return Err(Error::duplicate_tag(tag));
            }
        }
        Ok(())
    }

    /// Every node live and unique, every tag unique, every handler restorable
    fn validate_backstack(&self, router: RouterId, entries: &[BackstackEntry]) -> Result<()> {
        self.router_ref(router)?;
        for (i, entry) in entries.iter().enumerate() {
            self.validate_node(entry)?;
            let earlier = &entries[..i];
            if earlier.iter().any(|e| e.same_node(entry)) {
                return Err(Error::DuplicateNode {
                    id: entry.node().clone(),
                });
            }
            if let Some(tag) = entry.tag() {
                if earlier.iter().any(|e| e.tag() == Some(tag)) {
                    return Err(Error::duplicate_tag(tag));
                }
            }
        }
        Ok(())
    }

    fn validate_node(&self, entry: &BackstackEntry) -> Result<()> {
        let id = entry.node();
        match self.nodes.get(id) {
            Some(node) if node.destroyed => return Err(Error::node_destroyed(id)),
            Some(_) => {}
            None if self.tombstones.contains(id) => return Err(Error::node_destroyed(id)),
            None => return Err(Error::unknown_node(id)),
        }
        for handler in entry.push_handler().into_iter().chain(entry.pop_handler()) {
            self.registry.ensure_handler(handler)?;
        }
        Ok(())
    }
}

fn same_nodes(a: &[BackstackEntry], b: &[BackstackEntry]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_node(y))
}
