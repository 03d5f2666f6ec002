use baton_core::{Bundle, InstanceId};

use crate::state::SavedViewState;
use crate::transition::{ChangeHandler, ChangeType};
use crate::view::ViewId;

/// Observer of a single node's lifecycle. Every method defaults to a no-op.
///
/// Listeners are held as `Rc<dyn LifecycleListener>` and compared by pointer,
/// so the same listener is never registered twice on one node.
pub trait LifecycleListener {
    fn on_change_start(&self, _node: &InstanceId, _handler: &ChangeHandler, _change: ChangeType) {}
    fn on_change_end(&self, _node: &InstanceId, _handler: &ChangeHandler, _change: ChangeType) {}

    fn pre_create_view(&self, _node: &InstanceId) {}
    fn post_create_view(&self, _node: &InstanceId, _view: ViewId) {}

    fn pre_attach(&self, _node: &InstanceId, _view: ViewId) {}
    fn post_attach(&self, _node: &InstanceId, _view: ViewId) {}

    fn pre_detach(&self, _node: &InstanceId, _view: ViewId) {}
    fn post_detach(&self, _node: &InstanceId, _view: ViewId) {}

    fn pre_destroy_view(&self, _node: &InstanceId, _view: ViewId) {}
    fn post_destroy_view(&self, _node: &InstanceId) {}

    fn pre_destroy(&self, _node: &InstanceId) {}
    fn post_destroy(&self, _node: &InstanceId) {}

    fn on_save_state(&self, _node: &InstanceId, _out: &mut Bundle) {}
    fn on_restore_state(&self, _node: &InstanceId, _saved: &Bundle) {}

    fn on_save_view_state(&self, _node: &InstanceId, _state: &SavedViewState) {}
    fn on_restore_view_state(&self, _node: &InstanceId, _state: &SavedViewState) {}
}
