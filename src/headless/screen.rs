//! The screen every script node is built from

use baton_core::prelude::*;
use baton_nav::{Registry, Screen, ViewId, ViewTree};
use serde_json::Value;

pub const SCRIPT_SCREEN: &str = "script";

const KEY_NAME: &str = "name";
const KEY_VISITS: &str = "visits";

/// Plain screen labelled by its `name` arg
///
/// Counts how many times it was attached; the count survives save/restore.
#[derive(Debug)]
pub struct ScriptScreen {
    name: String,
    visits: u64,
}

impl ScriptScreen {
    pub fn new(args: &Bundle) -> Self {
        let name = args
            .get(KEY_NAME)
            .and_then(Value::as_str)
            .unwrap_or("unnamed")
            .to_string();
        Self { name, visits: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// Args for a node of this screen
    pub fn args(name: &str) -> Bundle {
        baton_core::bundle([(KEY_NAME, name)])
    }
}

impl Screen for ScriptScreen {
    fn type_tag(&self) -> &str {
        SCRIPT_SCREEN
    }

    fn create_view(&mut self, views: &mut ViewTree, _container: ViewId) -> Result<ViewId> {
        let view = views.create_view();
        trace!("{} created {}", self.name, view);
        Ok(view)
    }

    fn on_attach(&mut self, _view: ViewId) {
        self.visits += 1;
        debug!("{} attached (visit {})", self.name, self.visits);
    }

    fn on_detach(&mut self, _view: ViewId) {
        debug!("{} detached", self.name);
    }

    fn on_destroy(&mut self) {
        debug!("{} destroyed", self.name);
    }

    fn on_save_state(&mut self, out: &mut Bundle) {
        out.insert(KEY_VISITS.into(), Value::from(self.visits));
    }

    fn on_restore_state(&mut self, saved: &Bundle) {
        self.visits = saved.get(KEY_VISITS).and_then(Value::as_u64).unwrap_or(0);
    }
}

/// Built-in handlers plus [`ScriptScreen`]
pub fn script_registry() -> Registry {
    let mut registry = Registry::default();
    registry.register_screen(SCRIPT_SCREEN, |args| Box::new(ScriptScreen::new(args)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_args() {
        let screen = ScriptScreen::new(&ScriptScreen::args("home"));
        assert_eq!(screen.name(), "home");
        assert_eq!(ScriptScreen::new(&Bundle::new()).name(), "unnamed");
    }

    #[test]
    fn test_visits_survive_state_round_trip() {
        let mut screen = ScriptScreen::new(&ScriptScreen::args("home"));
        let mut views = ViewTree::new();
        let container = views.create_container("content");
        let view = screen.create_view(&mut views, container).unwrap();
        screen.on_attach(view);
        screen.on_attach(view);

        let mut saved = Bundle::new();
        screen.on_save_state(&mut saved);
        let mut restored = ScriptScreen::new(&ScriptScreen::args("home"));
        restored.on_restore_state(&saved);
        assert_eq!(restored.visits(), 2);
    }

    #[test]
    fn test_registry_knows_script_screen() {
        let registry = script_registry();
        assert!(registry.has_screen(SCRIPT_SCREEN));
        assert!(registry.create_screen("missing", &Bundle::new()).is_err());
    }
}
