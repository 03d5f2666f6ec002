//! baton Library
//!
//! Backstack navigation for tree-structured UI nodes. The engine lives in
//! [`baton_nav`] and its foundation types in [`baton_core`]; this crate adds
//! the headless script runner behind the `baton` binary.

// Module declarations
pub mod headless;
pub mod script;

pub use baton_core;
pub use baton_nav;

// Re-export main entry points
pub use headless::host::HeadlessHost;
pub use headless::runner::{run_script, ScriptRunner};
pub use headless::HeadlessEvent;
pub use script::{EntrySpec, HandlerKind, Script, Step};
