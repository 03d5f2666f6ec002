//! Persisted navigation state
//!
//! JSON (via `serde_json`) is the canonical encoding. Screens and handlers are
//! recorded by type tag and re-created through the [`Registry`](crate::Registry).

use std::collections::BTreeMap;

use baton_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::node::RetainViewMode;
use crate::view::ContainerId;

/// A transition handler: type tag plus opaque state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerState {
    pub type_tag: String,
    #[serde(default)]
    pub state: Bundle,
}

/// A node's view state: the view hierarchy plus what the screen saved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedViewState {
    #[serde(default)]
    pub hierarchy: Bundle,
    #[serde(default)]
    pub bundle: Bundle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub type_tag: String,
    pub instance_id: InstanceId,
    #[serde(default)]
    pub args: Bundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_state: Option<SavedViewState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_instance_id: Option<InstanceId>,
    #[serde(default)]
    pub requested_permissions: Vec<String>,
    #[serde(default)]
    pub needs_attach: bool,
    #[serde(default)]
    pub retain_view_mode: RetainViewMode,
    #[serde(default)]
    pub has_options_menu: bool,
    #[serde(default)]
    pub options_menu_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_handler: Option<HandlerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_handler: Option<HandlerState>,
    #[serde(default)]
    pub child_routers: Vec<RouterState>,
    #[serde(default)]
    pub child_backstack: Vec<InstanceId>,
    #[serde(default)]
    pub saved_state: Bundle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryState {
    pub node: NodeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_handler: Option<HandlerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_handler: Option<HandlerState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterState {
    pub container_id: ContainerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub pops_last_view: bool,
    #[serde(default)]
    pub backstack: Vec<EntryState>,
}

/// Everything needed to rebuild a navigator after process death
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigatorState {
    #[serde(default)]
    pub routers: Vec<RouterState>,
    #[serde(default)]
    pub activity_requests: BTreeMap<i32, InstanceId>,
    #[serde(default)]
    pub permission_requests: BTreeMap<i32, InstanceId>,
}

impl NavigatorState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::restore(e.to_string()))
    }
}
