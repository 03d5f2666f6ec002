//! Headless script runner
//!
//! Replays a [`Script`] against a navigator bound to a [`HeadlessHost`] and
//! reports the backstacks after every step.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use baton_core::prelude::*;
use baton_nav::{
    AnimatedHandler, BackstackEntry, ChangeHandler, Navigator, NavigatorConfig, NavigatorState,
    NoOpHandler, RouterId, SimpleSwapHandler,
};
use serde_json::Value;

use super::host::HeadlessHost;
use super::screen::{script_registry, ScriptScreen, SCRIPT_SCREEN};
use super::{EntrySnapshot, HeadlessEvent, RouterSnapshot};
use crate::script::{EntrySpec, HandlerKind, Script, Step};

/// Container id of the headless window's content area
pub const CONTENT: &str = "content";

/// Length of one frame when settling transitions
pub const FRAME: Duration = Duration::from_millis(16);

/// Run every step of `script`, writing one event per step to `out`
///
/// Recoverable failures are reported and the run continues. Anything else
/// stops the run and is returned. Returns the number of steps that ran.
pub fn run_script<W: Write>(
    script: &Script,
    config: NavigatorConfig,
    frames: u32,
    out: &mut W,
) -> Result<usize> {
    info!("Running script with {} step(s)", script.steps.len());
    let mut runner = ScriptRunner::new(config, frames)?;
    HeadlessEvent::started(script.steps.len()).emit_to(out);

    for (index, step) in script.steps.iter().enumerate() {
        match runner.run_step(step) {
            Ok(()) => {
                HeadlessEvent::step(
                    index,
                    step.label(),
                    runner.navigator().has_pending_changes(),
                    runner.snapshot(),
                )
                .emit_to(out);
            }
            Err(e) if e.is_recoverable() => {
                warn!("Step {} ({}) failed: {}", index, step.label(), e);
                HeadlessEvent::error(index, step.label(), e.to_string(), false).emit_to(out);
            }
            Err(e) => {
                error!("Step {} ({}) failed: {}", index, step.label(), e);
                HeadlessEvent::error(index, step.label(), e.to_string(), true).emit_to(out);
                return Err(e);
            }
        }
    }

    HeadlessEvent::finished(script.steps.len()).emit_to(out);
    Ok(script.steps.len())
}

/// A navigator with one window and a root router on its content container
pub struct ScriptRunner {
    nav: Navigator,
    host: Rc<HeadlessHost>,
    router: RouterId,
    names: HashMap<String, InstanceId>,
    frames: u32,
}

impl ScriptRunner {
    /// `frames` is how many frames are advanced after each step
    pub fn new(config: NavigatorConfig, frames: u32) -> Result<Self> {
        let mut nav = Navigator::new(script_registry(), config);
        let host = Rc::new(HeadlessHost::new());
        let router = bind_window(&mut nav, &host)?;
        Ok(Self {
            nav,
            host,
            router,
            names: HashMap::new(),
            frames,
        })
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.nav
    }

    pub fn host(&self) -> &HeadlessHost {
        &self.host
    }

    pub fn router(&self) -> RouterId {
        self.router
    }

    /// Live node currently bound to `name`
    pub fn node(&self, name: &str) -> Option<&InstanceId> {
        self.names.get(name).filter(|id| !self.nav.is_destroyed(id))
    }

    pub fn run_step(&mut self, step: &Step) -> Result<()> {
        debug!("Step: {}", step.label());
        match step {
            Step::Push(spec) => {
                let entry = self.entry(spec)?;
                self.nav.push(self.router, entry)?;
            }
            Step::Pop => {
                self.nav.pop_current(self.router)?;
            }
            Step::PopToTag { tag } => {
                if !self.nav.pop_to_tag(self.router, tag, None)? {
                    warn!("No entry tagged '{}'", tag);
                }
            }
            Step::PopToRoot => {
                self.nav.pop_to_root(self.router, None)?;
            }
            Step::ReplaceTop(spec) => {
                let entry = self.entry(spec)?;
                self.nav.replace_top(self.router, entry)?;
            }
            Step::SetBackstack { entries, handler } => {
                let entries = entries
                    .iter()
                    .map(|spec| self.entry(spec))
                    .collect::<Result<Vec<_>>>()?;
                let handler = (*handler).map(|kind| self.handler(kind));
                self.nav.set_backstack(self.router, entries, handler)?;
            }
            Step::Back => {
                if !self.nav.handle_back(self.router)? {
                    info!("Back was not handled");
                }
            }
            Step::SaveRestore => self.save_restore()?,
            Step::Frame { ms } => self.nav.advance_frame(Duration::from_millis(*ms)),
        }

        for _ in 0..self.frames {
            if !self.nav.has_pending_changes() {
                break;
            }
            self.nav.advance_frame(FRAME);
        }
        Ok(())
    }

    /// Save, tear the host down and restore into a fresh navigator
    ///
    /// Names keep pointing at the same nodes since instance ids survive.
    fn save_restore(&mut self) -> Result<()> {
        let json = self.nav.save_state()?.to_json()?;
        debug!("Saved navigator state ({} bytes)", json.len());

        self.nav.on_host_destroyed(false);

        let state = NavigatorState::from_json(&json)?;
        let config = self.nav.config().clone();
        let mut nav = Navigator::with_saved_state(script_registry(), config, state);
        let host = Rc::new(HeadlessHost::new());
        self.router = bind_window(&mut nav, &host)?;
        self.nav = nav;
        self.host = host;
        Ok(())
    }

    /// Backstack of every root router
    pub fn snapshot(&self) -> Vec<RouterSnapshot> {
        self.nav
            .root_routers()
            .iter()
            .map(|&router| RouterSnapshot {
                router: router.to_string(),
                container: self
                    .nav
                    .router(router)
                    .map(|r| r.container_id().to_string())
                    .unwrap_or_default(),
                entries: self
                    .nav
                    .backstack_entries(router)
                    .iter()
                    .map(|entry| EntrySnapshot {
                        name: self.name_of(entry.node()),
                        tag: entry.tag().map(str::to_string),
                        attached: self.nav.is_attached(entry.node()),
                    })
                    .collect(),
            })
            .collect()
    }

    fn name_of(&self, id: &InstanceId) -> String {
        self.nav
            .node(id)
            .and_then(|node| node.args().get("name"))
            .and_then(Value::as_str)
            .map_or_else(|| id.to_string(), str::to_string)
    }

    /// Node for `name`, created on first use or after the old one was destroyed
    fn node_for(&mut self, name: &str) -> Result<InstanceId> {
        if let Some(id) = self.node(name) {
            return Ok(id.clone());
        }
        let id = self
            .nav
            .create_node(SCRIPT_SCREEN, ScriptScreen::args(name))?;
        self.names.insert(name.to_string(), id.clone());
        Ok(id)
    }

    fn entry(&mut self, spec: &EntrySpec) -> Result<BackstackEntry> {
        let mut entry = BackstackEntry::with(self.node_for(&spec.name)?);
        if let Some(tag) = &spec.tag {
            entry = entry.with_tag(tag.clone());
        }
        if let Some(kind) = spec.handler {
            entry = entry.with_push_handler(self.handler(kind));
        }
        if let Some(kind) = spec.pop_handler {
            entry = entry.with_pop_handler(self.handler(kind));
        }
        Ok(entry)
    }

    fn handler(&self, kind: HandlerKind) -> ChangeHandler {
        match kind {
            HandlerKind::SimpleSwap => ChangeHandler::new(SimpleSwapHandler::default()),
            HandlerKind::Overlay => ChangeHandler::new(SimpleSwapHandler::new(false)),
            HandlerKind::NoOp => ChangeHandler::new(NoOpHandler),
            HandlerKind::Animated => {
                ChangeHandler::new(AnimatedHandler::from_settings(&self.nav.config().animation))
            }
        }
    }
}

/// Build a window with a content container and bind a root router to it
fn bind_window(nav: &mut Navigator, host: &Rc<HeadlessHost>) -> Result<RouterId> {
    let views = nav.views_mut();
    let window = views.create_window_root();
    let container = views.create_container(CONTENT);
    views.add_child(window, container)?;
    nav.pump();
    nav.attach_router(host.clone(), container)
}
