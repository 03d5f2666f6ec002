//! Test doubles for the navigation engine
//!
//! Everything here records into a shared [`Log`] so tests can assert on the
//! exact order of lifecycle callbacks and handler calls.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use baton_core::prelude::*;
use serde_json::Value;

use crate::config::NavigatorConfig;
use crate::entry::BackstackEntry;
use crate::navigator::Navigator;
use crate::node::{LifecycleListener, Screen};
use crate::registry::Registry;
use crate::router::{Host, RouterId};
use crate::state::{NavigatorState, SavedViewState};
use crate::transition::{
    Change, ChangeEvent, ChangeHandler, ChangeListener, ChangeType, Completer, TransitionHandler,
};
use crate::view::{ViewId, ViewTree};

/// Shared, ordered record of calls
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Entries of `log` starting with `prefix`
pub fn entries_for(log: &Log, prefix: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}

/// Position of the first entry equal to `entry`
pub fn position(log: &Log, entry: &str) -> Option<usize> {
    log.borrow().iter().position(|e| e == entry)
}

// ─────────────────────────────────────────────────────────────────
// Screen
// ─────────────────────────────────────────────────────────────────

pub const TEST_SCREEN: &str = "test";

/// Screen configured through its args:
/// - `name`: label used in log entries
/// - `containers`: ids of container views created inside its view
/// - `consume_back`: whether `handle_back` returns true
pub struct TestScreen {
    name: String,
    containers: Vec<String>,
    consume_back: bool,
    log: Log,
}

impl TestScreen {
    pub fn new(args: &Bundle, log: Log) -> Self {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unnamed")
            .to_string();
        let containers = args
            .get("containers")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let consume_back = args
            .get("consume_back")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            name,
            containers,
            consume_back,
            log,
        }
    }

    fn record(&self, event: impl AsRef<str>) {
        self.log
            .borrow_mut()
            .push(format!("{}:{}", self.name, event.as_ref()));
    }
}

impl Screen for TestScreen {
    fn type_tag(&self) -> &str {
        TEST_SCREEN
    }

    fn create_view(&mut self, views: &mut ViewTree, _container: ViewId) -> Result<ViewId> {
        let view = views.create_view();
        for id in &self.containers {
            let container = views.create_container(id.as_str());
            views.add_child(view, container)?;
        }
        self.record("create_view");
        Ok(view)
    }

    fn on_attach(&mut self, _view: ViewId) {
        self.record("attach");
    }

    fn on_detach(&mut self, _view: ViewId) {
        self.record("detach");
    }

    fn on_destroy_view(&mut self, _view: ViewId) {
        self.record("destroy_view");
    }

    fn on_destroy(&mut self) {
        self.record("destroy");
    }

    fn on_change_started(&mut self, _handler: &ChangeHandler, change: ChangeType) {
        self.record(format!("change_started {:?}", change));
    }

    fn on_change_ended(&mut self, _handler: &ChangeHandler, change: ChangeType) {
        self.record(format!("change_ended {:?}", change));
    }

    fn on_host_resumed(&mut self) {
        self.record("host_resumed");
    }

    fn on_host_stopped(&mut self) {
        self.record("host_stopped");
    }

    fn on_save_view_state(&mut self, _views: &ViewTree, _view: ViewId, out: &mut Bundle) {
        out.insert("name".into(), Value::from(self.name.clone()));
    }

    fn on_restore_view_state(&mut self, _views: &mut ViewTree, _view: ViewId, _saved: &Bundle) {
        self.record("restore_view_state");
    }

    fn on_save_state(&mut self, out: &mut Bundle) {
        out.insert("name".into(), Value::from(self.name.clone()));
    }

    fn on_restore_state(&mut self, saved: &Bundle) {
        let name = saved.get("name").and_then(Value::as_str).unwrap_or("?");
        self.record(format!("restore_state {}", name));
    }

    fn on_activity_result(&mut self, request_code: i32, result_code: i32, _data: Option<&Intent>) {
        self.record(format!("activity_result {} {}", request_code, result_code));
    }

    fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        permissions: &[String],
        _grant_results: &[i32],
    ) {
        self.record(format!("permissions_result {} {}", request_code, permissions.join(",")));
    }

    fn handle_back(&mut self) -> bool {
        self.record("handle_back");
        self.consume_back
    }
}

// ─────────────────────────────────────────────────────────────────
// Transition handler
// ─────────────────────────────────────────────────────────────────

struct PendingChange {
    completer: Completer,
    container: ViewId,
    from: Option<ViewId>,
    removes_from: bool,
}

/// Handler that adds the incoming view right away and removes the outgoing
/// one on completion.
///
/// An instant handler completes inside `perform_change`. A slow one waits for
/// the next frame, `complete_immediately` or an abort.
pub struct MockHandler {
    name: String,
    removes_from_view_on_push: bool,
    instant: bool,
    removes_early: bool,
    log: Log,
    pending: Option<PendingChange>,
}

impl MockHandler {
    pub const TYPE_TAG: &'static str = "mock";

    pub fn instant(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_string(),
            removes_from_view_on_push: true,
            instant: true,
            removes_early: false,
            log: log.clone(),
            pending: None,
        }
    }

    pub fn slow(name: &str, log: &Log) -> Self {
        Self {
            instant: false,
            ..Self::instant(name, log)
        }
    }

    /// Keep the covered view in the container on push
    pub fn keeping_views(mut self) -> Self {
        self.removes_from_view_on_push = false;
        self
    }

    /// Take the outgoing view out of the container when the change starts
    /// instead of when it completes
    pub fn removing_early(mut self) -> Self {
        self.removes_early = true;
        self
    }

    fn record(&self, event: impl AsRef<str>) {
        self.log
            .borrow_mut()
            .push(format!("{}:{}", self.name, event.as_ref()));
    }

    fn finish(&mut self, views: &mut ViewTree) {
        if let Some(pending) = self.pending.take() {
            if let Some(from) = pending.from {
                if pending.removes_from && views.parent(from) == Some(pending.container) {
                    views.remove_from_parent(from);
                }
            }
            pending.completer.complete();
        }
    }
}

impl TransitionHandler for MockHandler {
    fn type_tag(&self) -> &str {
        Self::TYPE_TAG
    }

    fn perform_change(&mut self, change: &mut Change<'_>) {
        self.record(format!(
            "perform {} {:?} -> {:?}",
            if change.is_push { "push" } else { "pop" },
            change.from,
            change.to
        ));

        if let Some(to) = change.to {
            if change.views.parent(to) != Some(change.container) {
                let added = change.views.add_child(change.container, to);
                if let Err(e) = added {
                    self.record(format!("add failed: {}", e));
                }
            }
        }

        let removes_from = !change.is_push || self.removes_from_view_on_push;
        if let (true, true, Some(from)) = (self.removes_early, removes_from, change.from) {
            if change.views.parent(from) == Some(change.container) {
                change.views.remove_from_parent(from);
            }
        }

        let Some(completer) = change.take_completer() else {
            return;
        };
        self.pending = Some(PendingChange {
            completer,
            container: change.container,
            from: change.from,
            removes_from,
        });
        if self.instant {
            self.finish(change.views);
        }
    }

    fn on_abort_push(&mut self, _views: &mut ViewTree, _new_top: Option<&InstanceId>) {
        self.record("abort");
        if let Some(pending) = self.pending.take() {
            pending.completer.complete();
        }
    }

    fn complete_immediately(&mut self, views: &mut ViewTree) {
        self.record("complete_immediately");
        self.finish(views);
    }

    fn on_frame(&mut self, views: &mut ViewTree, _elapsed: Duration) {
        if self.pending.is_some() {
            self.record("frame");
            self.finish(views);
        }
    }

    fn removes_from_view_on_push(&self) -> bool {
        self.removes_from_view_on_push
    }

    fn save_state(&self, out: &mut Bundle) {
        out.insert("name".into(), Value::from(self.name.clone()));
        out.insert(
            "removes_from_view_on_push".into(),
            Value::Bool(self.removes_from_view_on_push),
        );
        out.insert("instant".into(), Value::Bool(self.instant));
    }

    fn restore_state(&mut self, saved: &Bundle) -> Result<()> {
        if let Some(name) = saved.get("name").and_then(Value::as_str) {
            self.name = name.to_string();
        }
        if let Some(removes) = saved.get("removes_from_view_on_push").and_then(Value::as_bool) {
            self.removes_from_view_on_push = removes;
        }
        if let Some(instant) = saved.get("instant").and_then(Value::as_bool) {
            self.instant = instant;
        }
        Ok(())
    }

    fn copy(&self) -> Option<Box<dyn TransitionHandler>> {
        Some(Box::new(Self {
            name: self.name.clone(),
            removes_from_view_on_push: self.removes_from_view_on_push,
            instant: self.instant,
            removes_early: self.removes_early,
            log: self.log.clone(),
            pending: None,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// Listeners and host
// ─────────────────────────────────────────────────────────────────

/// Records `started`/`completed` events as `"<prefix>:<phase> <from> -> <to>"`
pub struct RecordingChangeListener {
    prefix: String,
    log: Log,
}

impl RecordingChangeListener {
    pub fn new(prefix: &str, log: &Log) -> Self {
        Self {
            prefix: prefix.to_string(),
            log: log.clone(),
        }
    }

    fn record(&self, phase: &str, event: &ChangeEvent) {
        let name = |id: &Option<InstanceId>| id.as_ref().map_or("none".to_string(), |id| id.to_string());
        self.log.borrow_mut().push(format!(
            "{}:{} {} -> {}",
            self.prefix,
            phase,
            name(&event.from),
            name(&event.to)
        ));
    }
}

impl ChangeListener for RecordingChangeListener {
    fn on_change_started(&self, event: &ChangeEvent) {
        self.record("started", event);
    }

    fn on_change_completed(&self, event: &ChangeEvent) {
        self.record("completed", event);
    }
}

/// Records every lifecycle callback by method name
#[derive(Default)]
pub struct RecordingLifecycleListener {
    pub calls: RefCell<Vec<String>>,
}

impl RecordingLifecycleListener {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }
}

impl LifecycleListener for RecordingLifecycleListener {
    fn on_change_start(&self, _node: &InstanceId, _handler: &ChangeHandler, _change: ChangeType) {
        self.record("on_change_start");
    }

    fn on_change_end(&self, _node: &InstanceId, _handler: &ChangeHandler, _change: ChangeType) {
        self.record("on_change_end");
    }

    fn pre_create_view(&self, _node: &InstanceId) {
        self.record("pre_create_view");
    }

    fn post_create_view(&self, _node: &InstanceId, _view: ViewId) {
        self.record("post_create_view");
    }

    fn pre_attach(&self, _node: &InstanceId, _view: ViewId) {
        self.record("pre_attach");
    }

    fn post_attach(&self, _node: &InstanceId, _view: ViewId) {
        self.record("post_attach");
    }

    fn pre_detach(&self, _node: &InstanceId, _view: ViewId) {
        self.record("pre_detach");
    }

    fn post_detach(&self, _node: &InstanceId, _view: ViewId) {
        self.record("post_detach");
    }

    fn pre_destroy_view(&self, _node: &InstanceId, _view: ViewId) {
        self.record("pre_destroy_view");
    }

    fn post_destroy_view(&self, _node: &InstanceId) {
        self.record("post_destroy_view");
    }

    fn pre_destroy(&self, _node: &InstanceId) {
        self.record("pre_destroy");
    }

    fn post_destroy(&self, _node: &InstanceId) {
        self.record("post_destroy");
    }

    fn on_save_state(&self, _node: &InstanceId, _out: &mut Bundle) {
        self.record("on_save_state");
    }

    fn on_restore_state(&self, _node: &InstanceId, _saved: &Bundle) {
        self.record("on_restore_state");
    }

    fn on_save_view_state(&self, _node: &InstanceId, _state: &SavedViewState) {
        self.record("on_save_view_state");
    }

    fn on_restore_view_state(&self, _node: &InstanceId, _state: &SavedViewState) {
        self.record("on_restore_view_state");
    }
}

/// Host recording every request it receives
#[derive(Default)]
pub struct RecordingHost {
    pub calls: RefCell<Vec<String>>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl Host for RecordingHost {
    fn invalidate_options_menu(&self) {
        self.record("invalidate_options_menu".to_string());
    }

    fn start_activity(&self, intent: &Intent) {
        self.record(format!("start_activity {}", intent.action));
    }

    fn start_activity_for_result(&self, _node: &InstanceId, intent: &Intent, request_code: i32) {
        self.record(format!("start_activity_for_result {} {}", intent.action, request_code));
    }

    fn register_for_activity_result(&self, _node: &InstanceId, request_code: i32) {
        self.record(format!("register_for_activity_result {}", request_code));
    }

    fn unregister_for_activity_results(&self, _node: &InstanceId) {
        self.record("unregister_for_activity_results".to_string());
    }

    fn request_permissions(&self, _node: &InstanceId, permissions: &[String], request_code: i32) {
        self.record(format!("request_permissions {} {}", permissions.join(","), request_code));
    }
}

// ─────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────

/// Registry with [`TestScreen`] and [`MockHandler`] on top of the built-ins
pub fn test_registry(log: &Log) -> Registry {
    let mut registry = Registry::default();
    let screen_log = log.clone();
    registry.register_screen(TEST_SCREEN, move |args| {
        Box::new(TestScreen::new(args, screen_log.clone()))
    });
    let handler_log = log.clone();
    registry.register_handler(MockHandler::TYPE_TAG, move || {
        Box::new(MockHandler::instant("restored", &handler_log))
    });
    registry
}

pub const CONTENT: &str = "content";

/// A navigator with a window holding one `"content"` container bound to a
/// root router
pub struct Harness {
    pub nav: Navigator,
    pub log: Log,
    pub host: Rc<RecordingHost>,
    pub window: ViewId,
    pub container: ViewId,
    pub router: RouterId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(NavigatorConfig::default())
    }

    pub fn with_config(config: NavigatorConfig) -> Self {
        let log = new_log();
        let nav = Navigator::new(test_registry(&log), config);
        Self::attach(nav, log)
    }

    /// Fresh navigator restoring `state` into a new window
    pub fn restored(state: NavigatorState) -> Self {
        let log = new_log();
        let nav = Navigator::with_saved_state(test_registry(&log), NavigatorConfig::default(), state);
        Self::attach(nav, log)
    }

    fn attach(mut nav: Navigator, log: Log) -> Self {
        let host = Rc::new(RecordingHost::default());
        let views = nav.views_mut();
        let window = views.create_window_root();
        let container = views.create_container(CONTENT);
        views
            .add_child(window, container)
            .expect("container fits in window");
        nav.pump();
        let router = nav
            .attach_router(host.clone(), container)
            .expect("router attaches");
        Self {
            nav,
            log,
            host,
            window,
            container,
            router,
        }
    }

    /// Create a test node labelled `name`
    pub fn node(&mut self, name: &str) -> InstanceId {
        self.node_with(name, Bundle::new())
    }

    /// Create a test node labelled `name` with extra args
    pub fn node_with(&mut self, name: &str, mut args: Bundle) -> InstanceId {
        args.insert("name".into(), Value::from(name));
        self.nav
            .create_node(TEST_SCREEN, args)
            .expect("test screen is registered")
    }

    pub fn push(&mut self, id: &InstanceId) {
        self.nav
            .push(self.router, BackstackEntry::with(id.clone()))
            .expect("push succeeds");
    }

    /// Views currently in the root container, bottom first
    pub fn container_children(&self) -> Vec<ViewId> {
        self.nav.views().children(self.container).to_vec()
    }

    pub fn view_of(&self, id: &InstanceId) -> Option<ViewId> {
        self.nav.node(id).and_then(|n| n.view())
    }

    pub fn screen_log(&self, name: &str) -> Vec<String> {
        entries_for(&self.log, &format!("{}:", name))
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
