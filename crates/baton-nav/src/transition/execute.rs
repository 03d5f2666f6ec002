//! Running a change and arbitrating overlapping ones
//!
//! Only one transition may own a container at a time. A newer request never
//! queues behind an older one: a push force-completes the push that brought
//! its `from` node in, and a pop aborts the push of the node being popped.

use std::rc::Rc;

use baton_core::prelude::*;

use super::{
    Change, ChangeEvent, ChangeHandler, ChangeListener, ChangeToken, ChangeType, Completer,
    SimpleSwapHandler,
};
use crate::router::RouterId;
use crate::view::ViewId;
use crate::Navigator;

/// A change whose handler has not reported completion yet
pub(crate) struct InFlightChange {
    pub(crate) router: RouterId,
    pub(crate) to: Option<InstanceId>,
    pub(crate) from: Option<InstanceId>,
    pub(crate) from_view: Option<ViewId>,
    pub(crate) container: ViewId,
    pub(crate) is_push: bool,
    pub(crate) handler: ChangeHandler,
    pub(crate) listeners: Vec<Rc<dyn ChangeListener>>,
}

impl InFlightChange {
    fn event(&self) -> ChangeEvent {
        ChangeEvent {
            to: self.to.clone(),
            from: self.from.clone(),
            is_push: self.is_push,
            container: self.container,
            handler: self.handler.clone(),
        }
    }

    pub(crate) fn references(&self, id: &InstanceId) -> bool {
        self.to.as_ref() == Some(id) || self.from.as_ref() == Some(id)
    }
}

impl Navigator {
    /// Swap `from` for `to` in the router's container
    ///
    /// Without a container nothing visual happens: `to` is flagged
    /// `needs_attach` and replayed when a host attaches.
    pub(crate) fn execute_change(
        &mut self,
        router: RouterId,
        to: Option<InstanceId>,
        from: Option<InstanceId>,
        is_push: bool,
        handler: Option<ChangeHandler>,
    ) -> Result<()> {
        if let (true, Some(to)) = (is_push, &to) {
            if self.is_destroyed(to) {
                return Err(Error::node_destroyed(to));
            }
        }

        let r = self.router_ref(router)?;
        let Some(container) = r.container else {
            trace!("{} has no container, deferring change to {:?}", router, to);
            let removes = handler.as_ref().map_or(true, |h| h.removes_from_view_on_push());
            if let Some(node) = to.as_ref().and_then(|id| self.nodes.get_mut(id)) {
                node.needs_attach = true;
            }
            if removes || !is_push {
                if let Some(node) = from.as_ref().and_then(|id| self.nodes.get_mut(id)) {
                    node.needs_attach = false;
                }
            }
            return Ok(());
        };
        let listeners = r.change_listeners.clone();

        let handler = match handler {
            None => ChangeHandler::new(SimpleSwapHandler::default()),
            Some(handler) if handler.has_been_used() && !handler.is_reusable() => {
                let copy = handler.copy(&self.registry)?;
                copy.set_force_remove_view_on_push(handler.force_remove_view_on_push());
                copy
            }
            Some(handler) => handler,
        };
        handler.mark_used();

        match (&to, &from) {
            (Some(to), from) if is_push => {
                self.in_progress_pushes.insert(to.clone(), handler.clone());
                if let Some(from) = from {
                    if self.complete_push_immediately(from) {
                        self.pump();
                    }
                }
            }
            (to, Some(from)) if !is_push => {
                if self.abort_push(from, to.as_ref()) {
                    self.pump();
                }
            }
            _ => {}
        }

        let event = ChangeEvent {
            to: to.clone(),
            from: from.clone(),
            is_push,
            container,
            handler: handler.clone(),
        };
        for listener in &listeners {
            listener.on_change_started(&event);
        }

        let (to_type, from_type) = ChangeType::for_change(is_push);
        let to_view = match &to {
            Some(id) => {
                let view = match self.inflate(id, container) {
                    Ok(view) => view,
                    Err(e) => {
                        self.in_progress_pushes.remove(id);
                        return Err(e);
                    }
                };
                self.change_started(id, &handler, to_type);
                Some(view)
            }
            None => None,
        };

        let from_view = from.as_ref().and_then(|id| self.nodes.get(id)).and_then(|n| n.view);
        if let Some(id) = &from {
            self.change_started(id, &handler, from_type);
        }

        let token = ChangeToken(self.next_token);
        self.next_token += 1;
        debug!(
            "{:?} {} {:?} -> {:?} with {}",
            token,
            if is_push { "push" } else { "pop" },
            from,
            to,
            handler.type_tag()
        );
        self.in_flight.insert(
            token,
            InFlightChange {
                router,
                to,
                from,
                from_view,
                container,
                is_push,
                handler: handler.clone(),
                listeners,
            },
        );

        let completer = Completer::new(token, self.completion_tx.clone());
        let mut change = Change::new(&mut self.views, container, from_view, to_view, is_push, completer);
        handler.perform_change(&mut change);

        self.pump();
        Ok(())
    }

    /// Apply a reported completion
    pub(crate) fn finish_change(&mut self, token: ChangeToken) {
        let Some(change) = self.in_flight.remove(&token) else {
            warn!("Ignoring completion of unknown or finished change {:?}", token);
            return;
        };
        let (to_type, from_type) = ChangeType::for_change(change.is_push);

        if let Some(from) = &change.from {
            self.change_ended(from, &change.handler, from_type, change.container);
        }
        if let Some(to) = &change.to {
            let owns_entry = self
                .in_progress_pushes
                .get(to)
                .is_some_and(|h| h.ptr_eq(&change.handler));
            if owns_entry {
                self.in_progress_pushes.remove(to);
            }
            self.change_ended(to, &change.handler, to_type, change.container);
        }

        let event = change.event();
        for listener in &change.listeners {
            listener.on_change_completed(&event);
        }

        if change.handler.force_remove_view_on_push() {
            if let Some(view) = change.from_view {
                if self.views.parent(view).is_some() {
                    self.views.remove_from_parent(view);
                }
            }
        }
        debug!("{:?} completed on {}", token, change.router);
    }

    /// Force the push that brought `id` in to its end state
    pub(crate) fn complete_push_immediately(&mut self, id: &InstanceId) -> bool {
        match self.in_progress_pushes.remove(id) {
            Some(handler) => {
                debug!("Completing push of {} immediately", id);
                handler.complete_immediately(&mut self.views);
                true
            }
            None => false,
        }
    }

    /// `id` is being popped while its push is still running
    fn abort_push(&mut self, id: &InstanceId, new_top: Option<&InstanceId>) -> bool {
        match self.in_progress_pushes.remove(id) {
            Some(handler) => {
                debug!("Aborting push of {}", id);
                handler.on_abort_push(&mut self.views, new_top);
                true
            }
            None => false,
        }
    }
}
