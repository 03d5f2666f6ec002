//! Engine scenarios driven through a root router bound to a test window

use std::rc::Rc;
use std::time::Duration;

use baton_core::prelude::*;
use serde_json::Value;

use crate::config::NavigatorConfig;
use crate::entry::BackstackEntry;
use crate::navigator::Navigator;
use crate::node::{RetainViewMode, Screen};
use crate::registry::Registry;
use crate::router::RouterId;
use crate::state::NavigatorState;
use crate::test_utils::*;
use crate::transition::{
    AnimatedHandler, Change, ChangeHandler, Easing, Effect, SimpleSwapHandler, TransitionHandler,
};
use crate::view::{ContainerId, ViewId, ViewTree};

fn listen(h: &mut Harness, prefix: &str) {
    let listener = Rc::new(RecordingChangeListener::new(prefix, &h.log));
    h.nav.add_change_listener(h.router, listener).unwrap();
}

fn change(prefix: &str, phase: &str, from: Option<&InstanceId>, to: Option<&InstanceId>) -> String {
    let name = |id: Option<&InstanceId>| id.map_or("none".to_string(), |id| id.to_string());
    format!("{}:{} {} -> {}", prefix, phase, name(from), name(to))
}

fn first_starting_with(log: &Log, prefix: &str) -> Option<usize> {
    log.borrow().iter().position(|e| e.starts_with(prefix))
}

fn keeping_views() -> ChangeHandler {
    ChangeHandler::new(SimpleSwapHandler::new(false))
}

// ─────────────────────────────────────────────────────────
// Push and pop
// ─────────────────────────────────────────────────────────

#[test]
fn test_push_then_pop_restores_previous_top() {
    let mut h = Harness::new();
    let x = h.node("x");
    h.nav
        .push(h.router, BackstackEntry::with(x.clone()).with_tag("root"))
        .unwrap();

    assert_eq!(h.nav.node_with_tag(h.router, "root"), Some(x.clone()));
    assert_eq!(h.nav.backstack_len(h.router), 1);
    assert!(h.nav.is_attached(&x));

    let y = h.node("y");
    h.push(&y);
    assert!(h.nav.is_attached(&y));
    assert!(!h.nav.is_attached(&x));

    assert!(h.nav.pop_current(h.router).unwrap());
    assert_eq!(h.nav.backstack_len(h.router), 1);
    assert_eq!(h.nav.node_with_tag(h.router, "root"), Some(x.clone()));
    assert!(h.nav.is_attached(&x));
    assert!(h.nav.is_destroyed(&y));
    assert_eq!(h.container_children(), vec![h.view_of(&x).unwrap()]);
}

#[test]
fn test_popped_node_lifecycle_order() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node("y");
    h.push(&x);
    h.push(&y);
    h.clear_log();

    h.nav.pop_current(h.router).unwrap();

    assert_eq!(
        h.screen_log("y"),
        vec![
            "y:change_started PopExit",
            "y:detach",
            "y:destroy_view",
            "y:destroy",
            "y:change_ended PopExit",
        ]
    );
    assert_eq!(
        h.screen_log("x"),
        vec![
            "x:create_view",
            "x:restore_view_state",
            "x:change_started PopEnter",
            "x:attach",
            "x:change_ended PopEnter",
        ]
    );
}

#[test]
fn test_lifecycle_listener_sees_push() {
    let mut h = Harness::new();
    let x = h.node("x");
    let listener = Rc::new(RecordingLifecycleListener::default());
    h.nav.add_lifecycle_listener(&x, listener.clone()).unwrap();
    // Same listener twice is kept once
    h.nav.add_lifecycle_listener(&x, listener.clone()).unwrap();

    h.push(&x);

    assert_eq!(
        listener.calls(),
        vec![
            "pre_create_view",
            "post_create_view",
            "on_change_start",
            "pre_attach",
            "post_attach",
            "on_change_end",
        ]
    );
}

#[test]
fn test_set_root_replaces_everything() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);
    h.push(&b);

    let root = h.node("root");
    h.nav.set_root(h.router, BackstackEntry::with(root.clone())).unwrap();

    assert_eq!(h.nav.backstack(h.router), vec![root.clone()]);
    assert!(h.nav.is_attached(&root));
    assert!(h.nav.is_destroyed(&a));
    assert!(h.nav.is_destroyed(&b));
    assert_eq!(h.container_children(), vec![h.view_of(&root).unwrap()]);
}

#[test]
fn test_pop_to_tag() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    let c = h.node("c");
    h.nav
        .push(h.router, BackstackEntry::with(a.clone()).with_tag("a"))
        .unwrap();
    h.push(&b);
    h.push(&c);

    assert!(!h.nav.pop_to_tag(h.router, "missing", None).unwrap());
    assert_eq!(h.nav.backstack_len(h.router), 3);

    assert!(h.nav.pop_to_tag(h.router, "a", None).unwrap());
    assert_eq!(h.nav.backstack(h.router), vec![a.clone()]);
    assert!(h.nav.is_attached(&a));
    assert!(h.nav.is_destroyed(&b));
    assert!(h.nav.is_destroyed(&c));
}

#[test]
fn test_pop_to_root() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.push(&a);
    assert!(!h.nav.pop_to_root(h.router, None).unwrap());

    let b = h.node("b");
    let c = h.node("c");
    h.push(&b);
    h.push(&c);

    assert!(h.nav.pop_to_root(h.router, None).unwrap());
    assert_eq!(h.nav.backstack(h.router), vec![a.clone()]);
    assert!(h.nav.is_attached(&a));
    assert!(h.nav.is_destroyed(&c));
}

#[test]
fn test_pop_covered_node_skips_transition() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    let c = h.node("c");
    h.push(&a);
    h.push(&b);
    h.push(&c);
    listen(&mut h, "r");

    assert!(h.nav.pop_node(h.router, &b).unwrap());

    assert_eq!(h.nav.backstack(h.router), vec![a, c.clone()]);
    assert!(h.nav.is_destroyed(&b));
    assert!(h.nav.is_attached(&c));
    assert!(entries_for(&h.log, "r:").is_empty());
}

#[test]
fn test_pop_empty_backstack_is_error() {
    let mut h = Harness::new();
    let err = h.nav.pop_current(h.router).unwrap_err();
    assert!(matches!(err, Error::EmptyBackstack));
}

#[test]
fn test_pop_last_view_without_pops_last_view() {
    let mut h = Harness::new();
    let x = h.node("x");
    h.push(&x);
    let view = h.view_of(&x).unwrap();

    assert!(!h.nav.pop_current(h.router).unwrap());

    assert!(h.nav.is_destroyed(&x));
    assert!(!h.nav.has_root(h.router));
    // The no-op handler leaves the last view where it was
    assert_eq!(h.container_children(), vec![view]);
}

#[test]
fn test_pop_last_view_with_pops_last_view() {
    let mut h = Harness::new();
    h.nav.set_pops_last_view(h.router, true).unwrap();
    let x = h.node("x");
    h.push(&x);

    assert!(h.nav.pop_current(h.router).unwrap());

    assert!(h.nav.is_destroyed(&x));
    assert!(h.container_children().is_empty());
}

#[test]
fn test_pops_last_view_from_config() {
    let mut config = NavigatorConfig::default();
    config.router.pops_last_view = true;
    let h = Harness::with_config(config);
    assert!(h.nav.router(h.router).unwrap().pops_last_view());
}

// ─────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────

#[test]
fn test_duplicate_push_rejected() {
    let mut h = Harness::new();
    let x = h.node("x");
    h.push(&x);

    let err = h
        .nav
        .push(h.router, BackstackEntry::with(x.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateNode { .. }));
    assert!(err.is_fatal());
    assert_eq!(h.nav.backstack_len(h.router), 1);
}

#[test]
fn test_duplicate_tag_rejected() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node("y");
    h.nav
        .push(h.router, BackstackEntry::with(x).with_tag("t"))
        .unwrap();

    let err = h
        .nav
        .push(h.router, BackstackEntry::with(y.clone()).with_tag("t"))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateTag { .. }));
    assert!(err.is_recoverable());
    assert!(!h.nav.is_attached(&y));
}

#[test]
fn test_pushing_destroyed_node_is_fatal() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node("y");
    h.push(&x);
    h.push(&y);
    h.nav.pop_current(h.router).unwrap();

    let err = h.nav.push(h.router, BackstackEntry::with(y)).unwrap_err();
    assert!(matches!(err, Error::NodeDestroyed { .. }));
    assert!(err.is_fatal());
}

struct UnregisteredHandler;

impl TransitionHandler for UnregisteredHandler {
    fn type_tag(&self) -> &str {
        "unregistered"
    }

    fn perform_change(&mut self, change: &mut Change<'_>) {
        change.complete();
    }
}

#[test]
fn test_unregistered_handler_rejected_up_front() {
    let mut h = Harness::new();
    let x = h.node("x");
    let entry = BackstackEntry::with(x.clone()).with_push_handler(UnregisteredHandler);

    let err = h.nav.push(h.router, entry).unwrap_err();
    assert!(matches!(err, Error::UnregisteredHandler { .. }));
    assert!(!h.nav.has_root(h.router));
}

#[test]
fn test_unregistered_screen_rejected() {
    let mut h = Harness::new();
    let err = h.nav.create_node("nope", Bundle::new()).unwrap_err();
    assert!(matches!(err, Error::UnregisteredScreen { .. }));
}

struct ContainerScreen;

impl Screen for ContainerScreen {
    fn type_tag(&self) -> &str {
        "container_screen"
    }

    fn create_view(&mut self, _views: &mut ViewTree, container: ViewId) -> Result<ViewId> {
        Ok(container)
    }
}

#[test]
fn test_view_is_container_is_fatal() {
    let log = new_log();
    let mut registry = test_registry(&log);
    registry.register_screen("container_screen", |_| Box::new(ContainerScreen));
    let mut nav = Navigator::new(registry, NavigatorConfig::default());
    let window = nav.views_mut().create_window_root();
    let container = nav.views_mut().create_container(CONTENT);
    nav.views_mut().add_child(window, container).unwrap();
    let router = nav
        .attach_router(Rc::new(RecordingHost::default()), container)
        .unwrap();

    let id = nav.create_node("container_screen", Bundle::new()).unwrap();
    let err = nav.push(router, BackstackEntry::with(id)).unwrap_err();
    assert!(matches!(err, Error::ViewIsContainer { .. }));
    assert!(err.is_fatal());
}

// ─────────────────────────────────────────────────────────
// Backstack reconciliation
// ─────────────────────────────────────────────────────────

#[test]
fn test_set_backstack_keeps_shared_prefix() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    let c = h.node("c");
    let d = h.node("d");
    let e = h.node("e");
    let entries = |ids: &[&InstanceId]| {
        ids.iter()
            .map(|id| BackstackEntry::with((*id).clone()))
            .collect::<Vec<_>>()
    };

    h.nav.set_backstack(h.router, entries(&[&a, &b, &c]), None).unwrap();
    listen(&mut h, "r");

    h.nav.set_backstack(h.router, entries(&[&a, &b, &d]), None).unwrap();
    h.nav.set_backstack(h.router, entries(&[&a, &b, &e]), None).unwrap();

    assert_eq!(h.nav.backstack(h.router), vec![a.clone(), b.clone(), e.clone()]);
    for id in [&a, &b] {
        assert!(!h.nav.is_destroyed(id));
    }
    assert!(h.screen_log("a").iter().all(|e| !e.ends_with(":destroy")));
    assert_eq!(
        h.screen_log("b")
            .iter()
            .filter(|e| e.ends_with(":create_view"))
            .count(),
        0
    );
    assert!(h.nav.is_destroyed(&c));
    assert!(h.nav.is_destroyed(&d));
    assert!(h.nav.is_attached(&e));

    // Only the top swapped each time
    assert_eq!(
        entries_for(&h.log, "r:started"),
        vec![
            change("r", "started", Some(&c), Some(&d)),
            change("r", "started", Some(&d), Some(&e)),
        ]
    );
}

#[test]
fn test_set_backstack_to_fresh_list_with_covering_entries() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node("y");
    h.push(&x);
    h.nav
        .push(
            h.router,
            BackstackEntry::with(y.clone()).with_push_handler(keeping_views()),
        )
        .unwrap();
    assert!(h.nav.is_attached(&x));
    assert!(h.nav.is_attached(&y));
    listen(&mut h, "r");

    let a = h.node("a");
    let b = h.node("b");
    let fresh = ChangeHandler::new(MockHandler::instant("fresh", &h.log));
    h.nav
        .set_backstack(
            h.router,
            vec![BackstackEntry::with(a.clone()), BackstackEntry::with(b.clone())],
            Some(fresh),
        )
        .unwrap();

    // The old root hands over to the new visible top; the covering entry
    // leaves with nothing in its place. A is never shown.
    assert_eq!(
        entries_for(&h.log, "r:started"),
        vec![
            change("r", "started", Some(&x), Some(&b)),
            change("r", "started", Some(&y), None),
        ]
    );
    assert!(!h.nav.is_attached(&a));
    assert!(h.view_of(&a).is_none());
    assert!(h.nav.is_attached(&b));
    assert!(h.nav.is_destroyed(&x));
    assert!(h.nav.is_destroyed(&y));
    assert_eq!(h.nav.backstack(h.router), vec![a, b.clone()]);
    assert_eq!(h.container_children(), vec![h.view_of(&b).unwrap()]);
}

#[test]
fn test_set_backstack_with_two_visible_entries() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node("y");
    h.push(&x);
    h.nav
        .push(
            h.router,
            BackstackEntry::with(y.clone()).with_push_handler(keeping_views()),
        )
        .unwrap();
    listen(&mut h, "r");

    let a = h.node("a");
    let b = h.node("b");
    let fresh = ChangeHandler::new(MockHandler::instant("fresh", &h.log));
    h.nav
        .set_backstack(
            h.router,
            vec![
                BackstackEntry::with(a.clone()),
                BackstackEntry::with(b.clone()).with_push_handler(keeping_views()),
            ],
            Some(fresh),
        )
        .unwrap();

    assert_eq!(
        entries_for(&h.log, "r:started"),
        vec![
            change("r", "started", Some(&x), Some(&a)),
            change("r", "started", Some(&y), None),
            change("r", "started", Some(&a), Some(&b)),
        ]
    );
    assert!(h.nav.is_attached(&a));
    assert!(h.nav.is_attached(&b));
    assert_eq!(
        h.container_children(),
        vec![h.view_of(&a).unwrap(), h.view_of(&b).unwrap()]
    );
}

#[test]
fn test_set_backstack_stacks_non_removing_entries() {
    let mut h = Harness::new();
    let old_root = h.node("old_root");
    let old_top = h.node("old_top");
    h.push(&old_root);
    h.nav
        .push(
            h.router,
            BackstackEntry::with(old_top.clone()).with_push_handler(keeping_views()),
        )
        .unwrap();

    let root = h.node("root");
    let middle = h.node("middle");
    let top = h.node("top");
    h.nav
        .set_backstack(
            h.router,
            vec![
                BackstackEntry::with(root.clone()),
                BackstackEntry::with(middle.clone()).with_push_handler(keeping_views()),
                BackstackEntry::with(top.clone()).with_push_handler(keeping_views()),
            ],
            None,
        )
        .unwrap();

    assert!(!h.nav.is_attached(&old_root));
    assert!(!h.nav.is_attached(&old_top));
    for id in [&root, &middle, &top] {
        assert!(h.nav.is_attached(id));
    }
    assert_eq!(h.container_children().len(), 3);
}

/// Three views stacked by non-removing pushes. Trimming the list removes
/// exactly the entries that left it, top first, and keeps the z-order of the
/// rest.
#[test]
fn test_trimming_stack_of_covered_views() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    let c = h.node("c");
    h.push(&a);
    for id in [&b, &c] {
        h.nav
            .push(
                h.router,
                BackstackEntry::with(id.clone()).with_push_handler(keeping_views()),
            )
            .unwrap();
    }
    let (va, vb, vc) = (
        h.view_of(&a).unwrap(),
        h.view_of(&b).unwrap(),
        h.view_of(&c).unwrap(),
    );
    assert_eq!(h.container_children(), vec![va, vb, vc]);

    let kept = h.nav.backstack_entries(h.router)[..2].to_vec();
    h.nav.set_backstack(h.router, kept, None).unwrap();
    assert_eq!(h.container_children(), vec![va, vb]);
    assert!(h.nav.is_destroyed(&c));
    assert!(h.nav.is_attached(&a));
    assert!(h.nav.is_attached(&b));

    let kept = h.nav.backstack_entries(h.router)[..1].to_vec();
    h.nav.set_backstack(h.router, kept, None).unwrap();
    assert_eq!(h.container_children(), vec![va]);
    assert!(h.nav.is_destroyed(&b));
}

// ─────────────────────────────────────────────────────────
// Replace top
// ─────────────────────────────────────────────────────────

#[test]
fn test_replace_top_keeps_container_filled() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);
    let old_view = h.view_of(&a).unwrap();

    let slow = MockHandler::slow("replace", &h.log);
    h.nav
        .replace_top(h.router, BackstackEntry::with(b.clone()).with_push_handler(slow))
        .unwrap();

    // Mid-transition both views are present
    let new_view = h.view_of(&b).unwrap();
    assert_eq!(h.container_children(), vec![old_view, new_view]);
    assert_eq!(h.nav.backstack(h.router), vec![b.clone()]);
    assert!(h.nav.has_pending_changes());

    h.nav.advance_frame(Duration::from_millis(16));

    assert_eq!(h.container_children(), vec![new_view]);
    assert!(h.nav.is_destroyed(&a));
    assert!(h.nav.is_attached(&b));
    assert!(!h.nav.has_pending_changes());
}

#[test]
fn test_replace_top_over_non_removing_entry() {
    let mut h = Harness::new();
    let root = h.node("root");
    let top = h.node("top");
    h.nav
        .set_backstack(
            h.router,
            vec![
                BackstackEntry::with(root.clone()),
                BackstackEntry::with(top.clone()).with_push_handler(keeping_views()),
            ],
            None,
        )
        .unwrap();
    assert!(h.nav.is_attached(&root));
    assert!(h.nav.is_attached(&top));

    let new_top = h.node("new_top");
    h.nav
        .replace_top(
            h.router,
            BackstackEntry::with(new_top.clone()).with_push_handler(keeping_views()),
        )
        .unwrap();

    assert_eq!(h.nav.backstack(h.router), vec![root.clone(), new_top.clone()]);
    assert!(h.nav.is_attached(&root));
    assert!(!h.nav.is_attached(&top));
    assert!(h.nav.is_attached(&new_top));
}

#[test]
fn test_replace_top_reuses_outgoing_tag() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.nav
        .push(h.router, BackstackEntry::with(a).with_tag("top"))
        .unwrap();

    h.nav
        .replace_top(h.router, BackstackEntry::with(b.clone()).with_tag("top"))
        .unwrap();
    assert_eq!(h.nav.node_with_tag(h.router, "top"), Some(b));
}

// ─────────────────────────────────────────────────────────
// Interrupted transitions
// ─────────────────────────────────────────────────────────

#[test]
fn test_push_completes_previous_push_first() {
    let mut h = Harness::new();
    listen(&mut h, "r");
    let x = h.node("x");
    h.push(&x);

    let p = h.node("p");
    h.nav
        .push(
            h.router,
            BackstackEntry::with(p.clone()).with_push_handler(MockHandler::slow("p_handler", &h.log)),
        )
        .unwrap();
    assert!(h.nav.has_pending_changes());
    let p_view = h.view_of(&p).unwrap();

    let q = h.node("q");
    h.nav
        .push(
            h.router,
            BackstackEntry::with(q.clone()).with_push_handler(MockHandler::instant("q_handler", &h.log)),
        )
        .unwrap();

    let completed_now = position(&h.log, "p_handler:complete_immediately").unwrap();
    let p_settled = position(&h.log, &change("r", "completed", Some(&x), Some(&p))).unwrap();
    let q_started = position(&h.log, &change("r", "started", Some(&p), Some(&q))).unwrap();
    let q_performed = first_starting_with(&h.log, "q_handler:perform").unwrap();
    assert!(completed_now < p_settled);
    assert!(p_settled < q_started);
    assert!(q_started < q_performed);
    assert!(position(&h.log, "p:change_ended PushEnter").unwrap() < q_performed);

    assert!(!h.nav.is_attached(&p));
    assert!(h.view_of(&p).is_none());
    assert!(!h.container_children().contains(&p_view));
    assert!(h.nav.is_attached(&q));
    assert!(!h.nav.has_pending_changes());
}

#[test]
fn test_pop_aborts_running_push() {
    let mut h = Harness::new();
    let x = h.node("x");
    h.push(&x);
    let x_view = h.view_of(&x).unwrap();

    let p = h.node("p");
    h.nav
        .push(
            h.router,
            BackstackEntry::with(p.clone()).with_push_handler(MockHandler::slow("p_handler", &h.log)),
        )
        .unwrap();

    h.nav.pop_current(h.router).unwrap();

    assert!(position(&h.log, "p_handler:abort").is_some());
    assert!(position(&h.log, "p_handler:complete_immediately").is_none());
    assert!(h.nav.is_destroyed(&p));
    assert!(h.nav.is_attached(&x));
    // The covered view never left
    assert_eq!(h.view_of(&x), Some(x_view));
    assert_eq!(h.container_children(), vec![x_view]);
    assert!(!h.nav.has_pending_changes());
}

#[test]
fn test_animated_push_runs_across_frames() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);

    let fade = AnimatedHandler::new(Duration::from_millis(100), Easing::Linear, Effect::Fade);
    h.nav
        .push(h.router, BackstackEntry::with(b.clone()).with_push_handler(fade))
        .unwrap();
    assert!(h.nav.has_pending_changes());
    assert!(h.nav.is_attached(&a));
    assert!(h.nav.is_attached(&b));

    h.nav.advance_frame(Duration::from_millis(50));
    assert!(h.nav.has_pending_changes());

    h.nav.advance_frame(Duration::from_millis(60));
    assert!(!h.nav.has_pending_changes());
    assert!(!h.nav.is_attached(&a));
    assert_eq!(h.container_children(), vec![h.view_of(&b).unwrap()]);
}

#[test]
fn test_used_handler_is_copied_on_reuse() {
    let mut h = Harness::new();
    let shared = ChangeHandler::new(MockHandler::instant("shared", &h.log));
    let a = h.node("a");
    let b = h.node("b");
    h.nav
        .push(h.router, BackstackEntry::with(a).with_push_handler(shared.clone()))
        .unwrap();
    assert!(shared.has_been_used());

    h.nav
        .push(h.router, BackstackEntry::with(b.clone()).with_push_handler(shared.clone()))
        .unwrap();
    assert!(h.nav.is_attached(&b));
    assert_eq!(entries_for(&h.log, "shared:perform").len(), 2);
}

// ─────────────────────────────────────────────────────────
// Back handling
// ─────────────────────────────────────────────────────────

#[test]
fn test_handle_back_pops_until_root() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node("y");
    h.push(&x);

    assert!(!h.nav.handle_back(h.router).unwrap());
    assert_eq!(h.screen_log("x").last().map(String::as_str), Some("x:handle_back"));

    h.push(&y);
    assert!(h.nav.handle_back(h.router).unwrap());
    assert!(h.nav.is_destroyed(&y));
    assert_eq!(h.nav.backstack(h.router), vec![x]);
}

#[test]
fn test_screen_can_consume_back() {
    let mut h = Harness::new();
    let x = h.node("x");
    let y = h.node_with("y", baton_core::bundle([("consume_back", true)]));
    h.push(&x);
    h.push(&y);

    assert!(h.nav.handle_back(h.router).unwrap());
    assert!(h.nav.is_attached(&y));
    assert_eq!(h.nav.backstack_len(h.router), 2);
}

// ─────────────────────────────────────────────────────────
// Child routers
// ─────────────────────────────────────────────────────────

fn parent_with_child_router(h: &mut Harness) -> (InstanceId, RouterId) {
    let parent = h.node_with(
        "parent",
        baton_core::bundle([("containers", Value::from(vec!["child"]))]),
    );
    h.push(&parent);
    let child = h
        .nav
        .child_router(&parent, &ContainerId::from("child"), None, true)
        .unwrap()
        .unwrap();
    (parent, child)
}

#[test]
fn test_child_router_lookup() {
    let mut h = Harness::new();
    let (parent, child) = parent_with_child_router(&mut h);

    let again = h
        .nav
        .child_router(&parent, &ContainerId::from("child"), None, true)
        .unwrap();
    assert_eq!(again, Some(child));
    assert_eq!(
        h.nav.find_child_router(&parent, &ContainerId::from("child"), None),
        Some(child)
    );
    assert_eq!(
        h.nav
            .child_router(&parent, &ContainerId::from("other"), None, false)
            .unwrap(),
        None
    );
    assert_eq!(h.nav.root_router(child), Some(h.router));
    assert_eq!(h.nav.sibling_routers(h.router), vec![h.router]);
    assert!(h.nav.sibling_routers(child).contains(&child));
    assert_eq!(h.nav.node(&parent).unwrap().child_routers(), &[child]);
}

#[test]
fn test_back_is_delegated_to_child_router() {
    let mut h = Harness::new();
    let (parent, child) = parent_with_child_router(&mut h);
    let c1 = h.node("c1");
    let c2 = h.node("c2");
    h.nav.push(child, BackstackEntry::with(c1.clone())).unwrap();
    h.nav.push(child, BackstackEntry::with(c2.clone())).unwrap();
    assert!(h.nav.is_attached(&c2));
    assert_eq!(
        h.nav.node(&parent).unwrap().child_backstack(),
        &[c1.clone(), c2.clone()]
    );

    assert!(h.nav.handle_back(h.router).unwrap());

    assert_eq!(h.nav.backstack(child), vec![c1.clone()]);
    assert!(h.nav.is_destroyed(&c2));
    assert!(h.nav.is_attached(&c1));
    assert_eq!(h.nav.backstack(h.router), vec![parent.clone()]);
    assert_eq!(h.nav.node(&parent).unwrap().child_backstack(), &[c1]);
}

#[test]
fn test_child_router_rebinds_after_parent_returns() {
    let mut h = Harness::new();
    let (parent, child) = parent_with_child_router(&mut h);
    let c1 = h.node("c1");
    h.nav.push(child, BackstackEntry::with(c1.clone())).unwrap();

    let cover = h.node("cover");
    h.push(&cover);
    assert!(!h.nav.is_attached(&parent));
    assert!(!h.nav.is_attached(&c1));
    assert!(h.nav.node(&c1).unwrap().needs_attach());
    assert!(h.nav.router(child).unwrap().container().is_none());

    h.nav.pop_current(h.router).unwrap();

    assert!(h.nav.is_attached(&parent));
    assert!(h.nav.is_attached(&c1));
    assert!(!h.nav.is_destroyed(&c1));
    assert_eq!(h.nav.backstack(child), vec![c1]);
    assert!(h.nav.router(child).unwrap().container().is_some());
}

#[test]
fn test_push_into_unbound_child_router_replays_on_rebind() {
    let mut h = Harness::new();
    let (_parent, child) = parent_with_child_router(&mut h);
    let c1 = h.node("c1");
    h.nav.push(child, BackstackEntry::with(c1.clone())).unwrap();

    let cover = h.node("cover");
    h.push(&cover);
    assert!(h.nav.router(child).unwrap().container().is_none());

    let c2 = h.node("c2");
    h.nav.push(child, BackstackEntry::with(c2.clone())).unwrap();
    assert_eq!(h.nav.backstack(child), vec![c1.clone(), c2.clone()]);
    assert!(!h.nav.is_attached(&c2));
    assert!(h.nav.node(&c2).unwrap().needs_attach());

    h.nav.pop_current(h.router).unwrap();

    let container = h.nav.router(child).unwrap().container().unwrap();
    assert!(h.nav.is_attached(&c2));
    assert!(!h.nav.is_attached(&c1));
    assert!(!h.nav.is_destroyed(&c1));
    assert_eq!(
        h.nav.views().children(container).to_vec(),
        vec![h.view_of(&c2).unwrap()]
    );
}

#[test]
fn test_exit_transition_freezes_child_detach() {
    let mut h = Harness::new();
    let parent = h.node_with(
        "parent",
        baton_core::bundle([("containers", Value::from(vec!["child"]))]),
    );
    h.nav
        .set_retain_view_mode(&parent, RetainViewMode::RetainOnDetach)
        .unwrap();
    h.push(&parent);
    let child = h
        .nav
        .child_router(&parent, &ContainerId::from("child"), None, true)
        .unwrap()
        .unwrap();
    let c1 = h.node("c1");
    h.nav.push(child, BackstackEntry::with(c1.clone())).unwrap();
    assert!(h.nav.is_attached(&c1));

    let cover = h.node("cover");
    let handler = ChangeHandler::new(MockHandler::slow("cover", &h.log).removing_early());
    h.nav
        .push(
            h.router,
            BackstackEntry::with(cover.clone()).with_push_handler(handler),
        )
        .unwrap();

    // The parent is off screen but its exit is still running
    assert!(h.nav.has_pending_changes());
    assert!(!h.nav.is_attached(&parent));
    assert!(h.nav.is_attached(&c1));

    h.nav.advance_frame(Duration::from_millis(16));

    assert!(!h.nav.has_pending_changes());
    assert!(h.nav.is_attached(&cover));
    assert!(!h.nav.is_attached(&c1));
    assert!(!h.nav.is_destroyed(&c1));
    assert!(h.view_of(&parent).is_some());
}

#[test]
fn test_remove_child_router_destroys_its_nodes() {
    let mut h = Harness::new();
    let (parent, child) = parent_with_child_router(&mut h);
    let c1 = h.node("c1");
    h.nav.push(child, BackstackEntry::with(c1.clone())).unwrap();

    h.nav.remove_child_router(&parent, child).unwrap();

    assert!(h.nav.is_destroyed(&c1));
    assert!(h.nav.router(child).is_none());
    assert!(h.nav.node(&parent).unwrap().child_routers().is_empty());
    assert!(h.nav.node(&parent).unwrap().child_backstack().is_empty());
}

#[test]
fn test_destroying_parent_destroys_children() {
    let mut h = Harness::new();
    let root = h.node("root");
    h.push(&root);
    let (parent, child) = parent_with_child_router(&mut h);
    let c1 = h.node("c1");
    h.nav.push(child, BackstackEntry::with(c1.clone())).unwrap();

    h.nav.pop_current(h.router).unwrap();

    assert!(h.nav.is_destroyed(&parent));
    assert!(h.nav.is_destroyed(&c1));
    assert!(h.nav.router(child).is_none());
    assert!(h.nav.is_attached(&root));
}

// ─────────────────────────────────────────────────────────
// Retained views
// ─────────────────────────────────────────────────────────

#[test]
fn test_retained_view_survives_detach() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.nav
        .set_retain_view_mode(&a, RetainViewMode::RetainOnDetach)
        .unwrap();
    h.push(&a);
    let view = h.view_of(&a).unwrap();

    let b = h.node("b");
    h.push(&b);
    assert!(!h.nav.is_attached(&a));
    assert_eq!(h.view_of(&a), Some(view));

    h.nav.pop_current(h.router).unwrap();
    assert!(h.nav.is_attached(&a));
    assert_eq!(h.view_of(&a), Some(view));
    assert_eq!(
        h.screen_log("a")
            .iter()
            .filter(|e| e.as_str() == "a:create_view")
            .count(),
        1
    );
}

#[test]
fn test_switching_to_release_drops_detached_view() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.nav
        .set_retain_view_mode(&a, RetainViewMode::RetainOnDetach)
        .unwrap();
    h.push(&a);
    let b = h.node("b");
    h.push(&b);
    assert!(h.view_of(&a).is_some());

    h.nav
        .set_retain_view_mode(&a, RetainViewMode::ReleaseOnDetach)
        .unwrap();
    assert!(h.view_of(&a).is_none());
    assert!(!h.nav.is_destroyed(&a));
}

// ─────────────────────────────────────────────────────────
// Host lifecycle
// ─────────────────────────────────────────────────────────

#[test]
fn test_config_change_rebinds_same_router() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);
    h.push(&b);

    h.nav.on_host_destroyed(true);
    assert!(!h.nav.is_attached(&b));
    assert!(h.nav.node(&b).unwrap().needs_attach());
    assert!(!h.nav.router(h.router).unwrap().has_host());

    let window = h.nav.views_mut().create_window_root();
    let container = h.nav.views_mut().create_container(CONTENT);
    h.nav.views_mut().add_child(window, container).unwrap();
    let router = h
        .nav
        .attach_router(Rc::new(RecordingHost::default()), container)
        .unwrap();

    assert_eq!(router, h.router);
    assert!(h.nav.is_attached(&b));
    assert!(!h.nav.is_attached(&a));
    assert!(!h.nav.is_destroyed(&a));
    assert_eq!(
        h.nav.views().children(container),
        &[h.view_of(&b).unwrap()]
    );
}

#[test]
fn test_host_destroyed_tears_everything_down() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);
    h.push(&b);

    h.nav.on_host_destroyed(false);

    assert!(h.nav.is_destroyed(&a));
    assert!(h.nav.is_destroyed(&b));
    assert!(h.nav.root_routers().is_empty());
}

#[test]
fn test_host_events_reach_backstack() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);
    h.push(&b);
    h.clear_log();

    h.nav.on_host_resumed();
    h.nav.on_host_stopped();

    assert_eq!(
        h.log.borrow().as_slice(),
        ["a:host_resumed", "b:host_resumed", "a:host_stopped", "b:host_stopped"]
    );
}

#[test]
fn test_stop_settles_running_push() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.nav
        .push(
            h.router,
            BackstackEntry::with(a.clone()).with_push_handler(MockHandler::slow("slow", &h.log)),
        )
        .unwrap();
    assert!(h.nav.has_pending_changes());

    h.nav.on_host_stopped();

    assert!(!h.nav.has_pending_changes());
    assert!(h.nav.node(&a).unwrap().needs_attach());
}

// ─────────────────────────────────────────────────────────
// Host requests
// ─────────────────────────────────────────────────────────

#[test]
fn test_requests_before_router_are_replayed() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.nav.start_activity(&a, Intent::new("open_url")).unwrap();
    h.nav.register_for_activity_result(&a, 7).unwrap();
    assert!(h.host.calls().is_empty());

    h.push(&a);

    assert_eq!(
        h.host.calls(),
        vec!["start_activity open_url", "register_for_activity_result 7"]
    );
}

#[test]
fn test_results_routed_by_request_code() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.push(&a);
    h.nav
        .start_activity_for_result(&a, Intent::new("pick_file"), 3)
        .unwrap();
    h.nav
        .request_permissions(&a, &["camera".to_string()], 4)
        .unwrap();
    assert!(h.nav.did_request_permission(&a, "camera"));
    assert!(!h.nav.should_show_request_permission_rationale(&a, "camera"));

    h.nav.on_activity_result(3, 1, None);
    h.nav.on_request_permissions_result(4, &["camera".to_string()], &[0]);
    // Unknown codes are ignored
    h.nav.on_activity_result(99, 1, None);

    assert_eq!(
        h.screen_log("a")
            .into_iter()
            .filter(|e| e.contains("result"))
            .collect::<Vec<_>>(),
        vec!["a:activity_result 3 1", "a:permissions_result 4 camera"]
    );
    assert!(!h.nav.did_request_permission(&a, "camera"));
    assert_eq!(
        h.host.calls(),
        vec!["start_activity_for_result pick_file 3", "request_permissions camera 4"]
    );
}

#[test]
fn test_options_menu_invalidates_host_while_attached() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.nav.set_has_options_menu(&a, true).unwrap();
    assert!(h.host.calls().is_empty());

    h.push(&a);
    assert_eq!(h.host.calls(), vec!["invalidate_options_menu"]);

    h.nav.set_options_menu_hidden(&a, true).unwrap();
    assert_eq!(h.host.calls().len(), 2);
    h.nav.set_has_options_menu(&a, false).unwrap();
    assert_eq!(h.host.calls().len(), 2);
}

#[test]
fn test_target_can_only_be_set_once() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.push(&a);
    h.push(&b);

    h.nav.set_target(&b, &a).unwrap();
    assert_eq!(h.nav.target_node(&b), Some(a.clone()));

    let err = h.nav.set_target(&b, &a).unwrap_err();
    assert!(matches!(err, Error::TargetAlreadySet { .. }));
}

// ─────────────────────────────────────────────────────────
// Save and restore
// ─────────────────────────────────────────────────────────

fn snapshot(state: &NavigatorState) -> Vec<(String, Option<String>, bool)> {
    state.routers[0]
        .backstack
        .iter()
        .map(|e| (e.node.instance_id.to_string(), e.tag.clone(), e.node.needs_attach))
        .collect()
}

#[test]
fn test_save_restore_round_trip() {
    let mut h = Harness::new();
    let a = h.node("a");
    let b = h.node("b");
    h.nav
        .push(h.router, BackstackEntry::with(a.clone()).with_tag("a"))
        .unwrap();
    h.nav
        .push(
            h.router,
            BackstackEntry::with(b.clone())
                .with_tag("b")
                .with_pop_handler(SimpleSwapHandler::new(false)),
        )
        .unwrap();
    h.nav.register_for_activity_result(&a, 7).unwrap();

    let state = h.nav.save_state().unwrap();
    let json = state.to_json().unwrap();
    drop(h);

    let mut restored = Harness::restored(NavigatorState::from_json(&json).unwrap());

    assert_eq!(restored.nav.backstack(restored.router), vec![a.clone(), b.clone()]);
    assert_eq!(restored.nav.node_with_tag(restored.router, "a"), Some(a.clone()));
    assert_eq!(restored.nav.node_with_tag(restored.router, "b"), Some(b.clone()));
    assert!(restored.nav.is_attached(&b));
    assert!(!restored.nav.is_attached(&a));

    let entry = &restored.nav.backstack_entries(restored.router)[1];
    let pop = entry.pop_handler().unwrap();
    assert_eq!(pop.type_tag(), SimpleSwapHandler::TYPE_TAG);
    assert!(!pop.removes_from_view_on_push());

    assert!(position(&restored.log, "a:restore_state a").is_some());
    assert!(position(&restored.log, "b:restore_state b").is_some());
    assert!(position(&restored.log, "b:restore_view_state").is_some());

    let again = restored.nav.save_state().unwrap();
    assert_eq!(snapshot(&again), snapshot(&state));

    restored.nav.on_activity_result(7, 2, None);
    assert!(position(&restored.log, "a:activity_result 7 2").is_some());
}

#[test]
fn test_restore_child_routers() {
    let mut h = Harness::new();
    let (parent, child) = parent_with_child_router(&mut h);
    let c1 = h.node("c1");
    h.nav
        .push(child, BackstackEntry::with(c1.clone()).with_tag("inner"))
        .unwrap();

    let state = h.nav.save_state().unwrap();
    let child_state = &state.routers[0].backstack[0].node.child_routers[0];
    assert_eq!(child_state.container_id.as_str(), "child");
    drop(h);

    let restored = Harness::restored(state);
    let node = restored.nav.node(&parent).unwrap();
    assert_eq!(node.child_backstack(), &[c1.clone()]);
    let child = node.child_routers()[0];
    assert_eq!(restored.nav.node_with_tag(child, "inner"), Some(c1.clone()));
    assert!(restored.nav.is_attached(&parent));
    assert!(restored.nav.is_attached(&c1));
}

#[test]
fn test_restore_waits_for_matching_container() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.push(&a);
    let state = h.nav.save_state().unwrap();
    drop(h);

    let log = new_log();
    let mut nav = Navigator::with_saved_state(test_registry(&log), NavigatorConfig::default(), state);
    // Unclaimed state is carried into the next save
    let resaved = nav.save_state().unwrap();
    assert_eq!(resaved.routers.len(), 1);
    assert!(nav.node(&a).is_none());

    let window = nav.views_mut().create_window_root();
    let other = nav.views_mut().create_container("other");
    nav.views_mut().add_child(window, other).unwrap();
    let router = nav
        .attach_router(Rc::new(RecordingHost::default()), other)
        .unwrap();
    assert!(!nav.has_root(router));

    let content = nav.views_mut().create_container(CONTENT);
    nav.views_mut().add_child(window, content).unwrap();
    let router = nav
        .attach_router(Rc::new(RecordingHost::default()), content)
        .unwrap();
    assert_eq!(nav.backstack(router), vec![a.clone()]);
    assert!(nav.is_attached(&a));
}

#[test]
fn test_restore_with_unregistered_screen_fails() {
    let mut h = Harness::new();
    let a = h.node("a");
    h.push(&a);
    let state = h.nav.save_state().unwrap();

    let mut nav = Navigator::with_saved_state(Registry::default(), NavigatorConfig::default(), state);
    let window = nav.views_mut().create_window_root();
    let container = nav.views_mut().create_container(CONTENT);
    nav.views_mut().add_child(window, container).unwrap();

    let err = nav
        .attach_router(Rc::new(RecordingHost::default()), container)
        .unwrap_err();
    assert!(matches!(err, Error::UnregisteredScreen { .. }));
}
