//! Backstack entries

use baton_core::InstanceId;

use crate::transition::ChangeHandler;

/// A node on a router's backstack plus the handlers that move it.
///
/// Built with the `with_*` methods before being handed to a router; entries
/// are compared by node identity.
#[derive(Debug, Clone)]
pub struct BackstackEntry {
    node: InstanceId,
    tag: Option<String>,
    push_handler: Option<ChangeHandler>,
    pop_handler: Option<ChangeHandler>,
}

impl BackstackEntry {
    pub fn with(node: InstanceId) -> Self {
        Self {
            node,
            tag: None,
            push_handler: None,
            pop_handler: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_push_handler(mut self, handler: impl Into<ChangeHandler>) -> Self {
        self.push_handler = Some(handler.into());
        self
    }

    pub fn with_pop_handler(mut self, handler: impl Into<ChangeHandler>) -> Self {
        self.pop_handler = Some(handler.into());
        self
    }

    pub(crate) fn from_parts(
        node: InstanceId,
        tag: Option<String>,
        push_handler: Option<ChangeHandler>,
        pop_handler: Option<ChangeHandler>,
    ) -> Self {
        Self {
            node,
            tag,
            push_handler,
            pop_handler,
        }
    }

    pub fn node(&self) -> &InstanceId {
        &self.node
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The entry's own push handler (a node override takes precedence when used)
    pub fn push_handler(&self) -> Option<&ChangeHandler> {
        self.push_handler.as_ref()
    }

    pub fn pop_handler(&self) -> Option<&ChangeHandler> {
        self.pop_handler.as_ref()
    }

    pub fn same_node(&self, other: &BackstackEntry) -> bool {
        self.node == other.node
    }
}
