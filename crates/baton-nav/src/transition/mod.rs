//! Transition protocol
//!
//! A [`TransitionHandler`] swaps the views of two nodes inside a container and
//! reports completion exactly once through a [`Completer`]. Completion may be
//! synchronous (inside `perform_change`) or arrive later, after any number of
//! frames. Handlers are shared through [`ChangeHandler`], which also carries the
//! per-handle `used` and `force_remove_view_on_push` flags.

mod animated;
pub(crate) mod execute;
mod simple;

pub use animated::{AnimatedHandler, Easing, Effect};
pub use simple::{NoOpHandler, SimpleSwapHandler};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use baton_core::prelude::*;

use crate::registry::Registry;
use crate::state::HandlerState;
use crate::view::{ViewId, ViewTree};

/// Identifies one in-flight change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeToken(pub(crate) u64);

/// One-shot completion signal for a change.
///
/// Consumed by [`complete`](Completer::complete), so it can fire at most once.
#[derive(Debug)]
pub struct Completer {
    token: ChangeToken,
    tx: Sender<ChangeToken>,
}

impl Completer {
    pub(crate) fn new(token: ChangeToken, tx: Sender<ChangeToken>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> ChangeToken {
        self.token
    }

    /// Report that the change has finished
    pub fn complete(self) {
        if self.tx.send(self.token).is_err() {
            warn!("Change {:?} completed after its navigator was dropped", self.token);
        }
    }
}

/// Everything a handler needs to perform one change
pub struct Change<'a> {
    pub views: &'a mut ViewTree,
    pub container: ViewId,
    pub from: Option<ViewId>,
    pub to: Option<ViewId>,
    pub is_push: bool,
    completer: Option<Completer>,
}

impl<'a> Change<'a> {
    pub(crate) fn new(
        views: &'a mut ViewTree,
        container: ViewId,
        from: Option<ViewId>,
        to: Option<ViewId>,
        is_push: bool,
        completer: Completer,
    ) -> Self {
        Self {
            views,
            container,
            from,
            to,
            is_push,
            completer: Some(completer),
        }
    }

    /// Complete synchronously
    pub fn complete(&mut self) {
        if let Some(completer) = self.completer.take() {
            completer.complete();
        }
    }

    /// Take the completer to finish the change later (e.g. after an animation)
    pub fn take_completer(&mut self) -> Option<Completer> {
        self.completer.take()
    }
}

/// Strategy performing the visual swap between two nodes' views
pub trait TransitionHandler {
    /// Stable tag used to re-create the handler from saved state
    fn type_tag(&self) -> &str;

    /// Swap `change.from` for `change.to` and eventually complete the change
    fn perform_change(&mut self, change: &mut Change<'_>);

    /// The push this handler is running will never finish; stop and complete
    fn on_abort_push(&mut self, _views: &mut ViewTree, _new_top: Option<&InstanceId>) {}

    /// Jump to the end state and complete right away
    fn complete_immediately(&mut self, _views: &mut ViewTree) {}

    /// Advance any running animation
    fn on_frame(&mut self, _views: &mut ViewTree, _elapsed: Duration) {}

    fn removes_from_view_on_push(&self) -> bool {
        true
    }

    /// Reusable handlers carry no per-use state and are never copied
    fn is_reusable(&self) -> bool {
        false
    }

    fn save_state(&self, _out: &mut Bundle) {}

    fn restore_state(&mut self, _saved: &Bundle) -> Result<()> {
        Ok(())
    }

    /// Fresh copy of this handler. `None` falls back to a save/restore round-trip.
    fn copy(&self) -> Option<Box<dyn TransitionHandler>> {
        None
    }
}

struct HandlerCell {
    inner: RefCell<Box<dyn TransitionHandler>>,
    used: Cell<bool>,
    force_remove_view_on_push: Cell<bool>,
}

/// Shared handle to a transition handler
#[derive(Clone)]
pub struct ChangeHandler(Rc<HandlerCell>);

impl ChangeHandler {
    pub fn new(handler: impl TransitionHandler + 'static) -> Self {
        Self::from_boxed(Box::new(handler))
    }

    pub fn from_boxed(handler: Box<dyn TransitionHandler>) -> Self {
        Self(Rc::new(HandlerCell {
            inner: RefCell::new(handler),
            used: Cell::new(false),
            force_remove_view_on_push: Cell::new(false),
        }))
    }

    pub fn type_tag(&self) -> String {
        self.0.inner.borrow().type_tag().to_string()
    }

    pub fn removes_from_view_on_push(&self) -> bool {
        self.0.inner.borrow().removes_from_view_on_push()
    }

    pub fn is_reusable(&self) -> bool {
        self.0.inner.borrow().is_reusable()
    }

    pub fn force_remove_view_on_push(&self) -> bool {
        self.0.force_remove_view_on_push.get()
    }

    pub fn set_force_remove_view_on_push(&self, force: bool) {
        self.0.force_remove_view_on_push.set(force);
    }

    pub fn has_been_used(&self) -> bool {
        self.0.used.get()
    }

    pub(crate) fn mark_used(&self) {
        self.0.used.set(true);
    }

    pub fn ptr_eq(&self, other: &ChangeHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn perform_change(&self, change: &mut Change<'_>) {
        self.0.inner.borrow_mut().perform_change(change);
    }

    pub(crate) fn on_abort_push(&self, views: &mut ViewTree, new_top: Option<&InstanceId>) {
        self.0.inner.borrow_mut().on_abort_push(views, new_top);
    }

    pub(crate) fn complete_immediately(&self, views: &mut ViewTree) {
        self.0.inner.borrow_mut().complete_immediately(views);
    }

    pub(crate) fn on_frame(&self, views: &mut ViewTree, elapsed: Duration) {
        self.0.inner.borrow_mut().on_frame(views, elapsed);
    }

    /// Persistable form: type tag plus opaque state
    pub fn to_state(&self) -> HandlerState {
        let inner = self.0.inner.borrow();
        let mut state = Bundle::new();
        inner.save_state(&mut state);
        HandlerState {
            type_tag: inner.type_tag().to_string(),
            state,
        }
    }

    /// A fresh, unused handle to an equivalent handler
    pub fn copy(&self, registry: &Registry) -> Result<ChangeHandler> {
        let copied = self.0.inner.borrow().copy();
        match copied {
            Some(handler) => Ok(ChangeHandler::from_boxed(handler)),
            None => registry.restore_handler(&self.to_state()),
        }
    }
}

impl<H: TransitionHandler + 'static> From<H> for ChangeHandler {
    fn from(handler: H) -> Self {
        ChangeHandler::new(handler)
    }
}

impl fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandler")
            .field("type_tag", &self.type_tag())
            .field("used", &self.has_been_used())
            .field("force_remove_view_on_push", &self.force_remove_view_on_push())
            .finish()
    }
}

/// Which side of a change a node is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    PushEnter,
    PushExit,
    PopEnter,
    PopExit,
}

impl ChangeType {
    pub fn is_push(&self) -> bool {
        matches!(self, ChangeType::PushEnter | ChangeType::PushExit)
    }

    pub fn is_enter(&self) -> bool {
        matches!(self, ChangeType::PushEnter | ChangeType::PopEnter)
    }

    pub(crate) fn for_change(is_push: bool) -> (ChangeType, ChangeType) {
        if is_push {
            (ChangeType::PushEnter, ChangeType::PushExit)
        } else {
            (ChangeType::PopEnter, ChangeType::PopExit)
        }
    }
}

/// Snapshot describing a change, delivered to [`ChangeListener`]s
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub to: Option<InstanceId>,
    pub from: Option<InstanceId>,
    pub is_push: bool,
    pub container: ViewId,
    pub handler: ChangeHandler,
}

/// Observer of a router's changes
pub trait ChangeListener {
    fn on_change_started(&self, _event: &ChangeEvent) {}
    fn on_change_completed(&self, _event: &ChangeEvent) {}
}
