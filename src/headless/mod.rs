//! Headless mode - JSON event output for script runs
//!
//! Each step of a script produces one event describing the backstack of every
//! root router afterwards. Events are written as NDJSON (one JSON object per
//! line) so runs can be diffed and parsed by other tools.
//!
//! # Example Output
//!
//! ```json
//! {"event":"started","steps":2}
//! {"event":"step","index":0,"action":"push home","pending":false,"routers":[{"router":"router#1","container":"content","entries":[{"name":"home","tag":null,"attached":true}]}]}
//! {"event":"finished","steps":2}
//! ```

pub mod host;
pub mod runner;
pub mod screen;

use std::io::Write;

use serde::Serialize;
use tracing::error;

/// Events emitted while replaying a script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Script loaded, about to run
    Started { steps: usize },

    /// A step ran successfully
    Step {
        index: usize,
        action: String,
        pending: bool,
        routers: Vec<RouterSnapshot>,
    },

    /// A step failed
    Error {
        index: usize,
        action: String,
        message: String,
        fatal: bool,
    },

    /// All steps ran
    Finished { steps: usize },
}

/// Backstack of one root router, bottom first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterSnapshot {
    pub router: String,
    pub container: String,
    pub entries: Vec<EntrySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySnapshot {
    pub name: String,
    pub tag: Option<String>,
    pub attached: bool,
}

impl HeadlessEvent {
    /// Write this event as one JSON line
    pub fn emit_to<W: Write>(&self, out: &mut W) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        if let Err(e) = writeln!(out, "{}", json) {
            error!("Failed to write headless event: {}", e);
            return;
        }

        if let Err(e) = out.flush() {
            error!("Failed to flush headless output: {}", e);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn started(steps: usize) -> Self {
        Self::Started { steps }
    }

    pub fn step(index: usize, action: String, pending: bool, routers: Vec<RouterSnapshot>) -> Self {
        Self::Step {
            index,
            action,
            pending,
            routers,
        }
    }

    pub fn error(index: usize, action: String, message: String, fatal: bool) -> Self {
        Self::Error {
            index,
            action,
            message,
            fatal,
        }
    }

    pub fn finished(steps: usize) -> Self {
        Self::Finished { steps }
    }
}
