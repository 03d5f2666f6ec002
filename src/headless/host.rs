//! Host adapter with no real window system behind it

use std::cell::RefCell;

use baton_core::prelude::*;
use baton_nav::Host;

/// Logs every request and keeps a record of them
#[derive(Debug, Default)]
pub struct HeadlessHost {
    requests: RefCell<Vec<String>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn record(&self, request: String) {
        info!("Host request: {}", request);
        self.requests.borrow_mut().push(request);
    }
}

impl Host for HeadlessHost {
    fn invalidate_options_menu(&self) {
        self.record("invalidate_options_menu".to_string());
    }

    fn start_activity(&self, intent: &Intent) {
        self.record(format!("start_activity {}", intent.action));
    }

    fn start_activity_for_result(&self, node: &InstanceId, intent: &Intent, request_code: i32) {
        self.record(format!(
            "start_activity_for_result {} {} from {}",
            intent.action, request_code, node
        ));
    }

    fn register_for_activity_result(&self, node: &InstanceId, request_code: i32) {
        self.record(format!("register_for_activity_result {} from {}", request_code, node));
    }

    fn unregister_for_activity_results(&self, node: &InstanceId) {
        trace!("Unregistering activity results of {}", node);
    }

    fn request_permissions(&self, node: &InstanceId, permissions: &[String], request_code: i32) {
        self.record(format!(
            "request_permissions {} {} from {}",
            permissions.join(","),
            request_code,
            node
        ));
    }
}
