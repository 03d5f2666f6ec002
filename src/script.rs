//! Navigation scripts
//!
//! A script is a TOML file with an ordered list of steps:
//!
//! ```toml
//! [[steps]]
//! action = "push"
//! name = "home"
//! tag = "home"
//!
//! [[steps]]
//! action = "push"
//! name = "details"
//! handler = "animated"
//!
//! [[steps]]
//! action = "frame"
//! ms = 400
//!
//! [[steps]]
//! action = "back"
//! ```
//!
//! Nodes are referred to by name. A name is bound to a fresh node the first
//! time it is used and reused until that node is destroyed.

use std::path::Path;

use baton_core::prelude::*;
use serde::Deserialize;

/// Parsed script
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid script: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let script = Self::parse(&content)?;
        debug!("Loaded {} step(s) from {:?}", script.steps.len(), path);
        Ok(script)
    }
}

/// One navigation operation against the root router
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Push(EntrySpec),
    Pop,
    PopToTag {
        tag: String,
    },
    PopToRoot,
    ReplaceTop(EntrySpec),
    SetBackstack {
        entries: Vec<EntrySpec>,
        #[serde(default)]
        handler: Option<HandlerKind>,
    },
    Back,
    /// Save to JSON, tear the host down and restore into a fresh navigator
    SaveRestore,
    Frame {
        #[serde(default = "default_frame_ms")]
        ms: u64,
    },
}

fn default_frame_ms() -> u64 {
    16
}

impl Step {
    /// Short label for output, e.g. `push details`
    pub fn label(&self) -> String {
        match self {
            Step::Push(entry) => format!("push {}", entry.name),
            Step::Pop => "pop".to_string(),
            Step::PopToTag { tag } => format!("pop_to_tag {}", tag),
            Step::PopToRoot => "pop_to_root".to_string(),
            Step::ReplaceTop(entry) => format!("replace_top {}", entry.name),
            Step::SetBackstack { entries, .. } => {
                let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
                format!("set_backstack [{}]", names.join(", "))
            }
            Step::Back => "back".to_string(),
            Step::SaveRestore => "save_restore".to_string(),
            Step::Frame { ms } => format!("frame {}ms", ms),
        }
    }
}

/// A backstack entry described by node name
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntrySpec {
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub handler: Option<HandlerKind>,
    #[serde(default)]
    pub pop_handler: Option<HandlerKind>,
}

/// Built-in handler selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    SimpleSwap,
    /// Simple swap that leaves the covered view in place
    Overlay,
    NoOp,
    /// Animated handler built from the `[animation]` config
    Animated,
}
