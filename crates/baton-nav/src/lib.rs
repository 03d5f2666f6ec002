//! # baton-nav - Navigation Engine
//!
//! Routers, the node lifecycle state machine and the transition protocol.
//!
//! Depends on [`baton_core`] for errors, identity and payload bundles.
//!
//! ## Public API
//!
//! ### Hierarchy
//! - [`Navigator`] - Owns every view, node and router of one hierarchy
//! - [`ViewTree`] - Minimal retained view hierarchy the engine manipulates
//!
//! ### Nodes
//! - [`Screen`] - Concrete node behaviour (view creation and lifecycle hooks)
//! - [`Node`] - Engine-side record of a node
//! - [`LifecycleListener`] - Observer of one node's lifecycle
//!
//! ### Routers
//! - [`RouterId`], [`Router`], [`RouterKind`] - Root and nested routers
//! - [`BackstackEntry`] - A node plus its push/pop handlers and tag
//! - [`Host`] - Services the embedding environment provides
//!
//! ### Transitions
//! - [`TransitionHandler`] - Strategy swapping two views in a container
//! - [`ChangeHandler`] - Shared handle to a handler
//! - [`SimpleSwapHandler`], [`NoOpHandler`], [`AnimatedHandler`] - Built-ins
//!
//! ### Persistence and Configuration
//! - [`NavigatorState`] - Serializable snapshot of a navigator
//! - [`Registry`] - Type tag to factory maps used to re-create screens and handlers
//! - [`NavigatorConfig`], [`load_config()`], [`save_config()`]

pub mod config;
pub mod entry;
mod navigator;
pub mod node;
mod persist;
pub mod registry;
pub mod router;
pub mod state;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod transition;
pub mod view;

pub use config::{init_config, load_config, save_config, AnimationSettings, NavigatorConfig, RouterSettings};
pub use entry::BackstackEntry;
pub use navigator::Navigator;
pub use node::{LifecycleListener, Node, RetainViewMode, Screen};
pub use registry::Registry;
pub use router::{Host, Router, RouterId, RouterKind};
pub use state::{EntryState, HandlerState, NavigatorState, NodeState, RouterState, SavedViewState};
pub use transition::{
    AnimatedHandler, Change, ChangeEvent, ChangeHandler, ChangeListener, ChangeToken, ChangeType,
    Completer, Easing, Effect, NoOpHandler, SimpleSwapHandler, TransitionHandler,
};
pub use view::{ContainerId, ViewEvent, ViewId, ViewTree};
