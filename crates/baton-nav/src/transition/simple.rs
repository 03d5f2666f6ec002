//! Immediate, non-animated handlers

use baton_core::prelude::*;
use serde_json::Value;

use super::{Change, TransitionHandler};
use crate::view::ViewTree;

const KEY_REMOVES_FROM_VIEW_ON_PUSH: &str = "removes_from_view_on_push";

/// Adds the new view, then removes the old one. Completes synchronously.
#[derive(Debug, Clone)]
pub struct SimpleSwapHandler {
    removes_from_view_on_push: bool,
    canceled: bool,
}

impl Default for SimpleSwapHandler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SimpleSwapHandler {
    pub const TYPE_TAG: &'static str = "simple_swap";

    pub fn new(removes_from_view_on_push: bool) -> Self {
        Self {
            removes_from_view_on_push,
            canceled: false,
        }
    }
}

impl TransitionHandler for SimpleSwapHandler {
    fn type_tag(&self) -> &str {
        Self::TYPE_TAG
    }

    fn perform_change(&mut self, change: &mut Change<'_>) {
        if !self.canceled {
            let container = change.container;

            if let Some(to) = change.to {
                if change.views.parent(to) != Some(container) {
                    // Popping puts the revealed view where the old one was.
                    let index = match change.from {
                        Some(from) if !change.is_push => change.views.index_of(container, from),
                        _ => None,
                    };
                    let added = match index {
                        Some(index) => change.views.insert_child(container, index, to),
                        None => change.views.add_child(container, to),
                    };
                    if let Err(e) = added {
                        warn!("Simple swap could not add {}: {}", to, e);
                    }
                }
            }

            if let Some(from) = change.from {
                let removes = !change.is_push || self.removes_from_view_on_push;
                if removes && change.views.parent(from) == Some(container) {
                    change.views.remove_from_parent(from);
                }
            }
        }

        change.complete();
    }

    fn on_abort_push(&mut self, _views: &mut ViewTree, _new_top: Option<&InstanceId>) {
        self.canceled = true;
    }

    fn removes_from_view_on_push(&self) -> bool {
        self.removes_from_view_on_push
    }

    fn is_reusable(&self) -> bool {
        true
    }

    fn save_state(&self, out: &mut Bundle) {
        out.insert(
            KEY_REMOVES_FROM_VIEW_ON_PUSH.into(),
            Value::Bool(self.removes_from_view_on_push),
        );
    }

    fn restore_state(&mut self, saved: &Bundle) -> Result<()> {
        if let Some(value) = saved.get(KEY_REMOVES_FROM_VIEW_ON_PUSH) {
            self.removes_from_view_on_push = value
                .as_bool()
                .ok_or_else(|| Error::handler_state("removes_from_view_on_push must be a bool"))?;
        }
        Ok(())
    }

    fn copy(&self) -> Option<Box<dyn TransitionHandler>> {
        Some(Box::new(Self::new(self.removes_from_view_on_push)))
    }
}

/// Completes without touching any view
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHandler;

impl NoOpHandler {
    pub const TYPE_TAG: &'static str = "no_op";
}

impl TransitionHandler for NoOpHandler {
    fn type_tag(&self) -> &str {
        Self::TYPE_TAG
    }

    fn perform_change(&mut self, change: &mut Change<'_>) {
        change.complete();
    }

    fn is_reusable(&self) -> bool {
        true
    }

    fn copy(&self) -> Option<Box<dyn TransitionHandler>> {
        Some(Box::new(NoOpHandler))
    }
}
