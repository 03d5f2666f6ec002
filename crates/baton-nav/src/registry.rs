//! Type-tag registries for screens and transition handlers
//!
//! Every node and handler that can be saved must be re-creatable from its
//! recorded type tag. Factories are registered once at startup.

use std::collections::HashMap;

use baton_core::prelude::*;

use crate::node::Screen;
use crate::state::HandlerState;
use crate::transition::{
    AnimatedHandler, ChangeHandler, NoOpHandler, SimpleSwapHandler, TransitionHandler,
};

pub type ScreenFactory = Box<dyn Fn(&Bundle) -> Box<dyn Screen>>;
pub type HandlerFactory = Box<dyn Fn() -> Box<dyn TransitionHandler>>;

/// Maps stable type tags to factories
pub struct Registry {
    screens: HashMap<String, ScreenFactory>,
    handlers: HashMap<String, HandlerFactory>,
}

impl Default for Registry {
    /// Registry with the built-in handlers and no screens
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_handler(SimpleSwapHandler::TYPE_TAG, || {
            Box::new(SimpleSwapHandler::default())
        });
        registry.register_handler(NoOpHandler::TYPE_TAG, || Box::new(NoOpHandler));
        registry.register_handler(AnimatedHandler::TYPE_TAG, || {
            Box::new(AnimatedHandler::default())
        });
        registry
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            screens: HashMap::new(),
            handlers: HashMap::new(),
        }
    }

    pub fn register_screen<F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Bundle) -> Box<dyn Screen> + 'static,
    {
        self.screens.insert(type_tag.into(), Box::new(factory));
        self
    }

    pub fn register_handler<F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn TransitionHandler> + 'static,
    {
        self.handlers.insert(type_tag.into(), Box::new(factory));
        self
    }

    pub fn has_screen(&self, type_tag: &str) -> bool {
        self.screens.contains_key(type_tag)
    }

    pub fn has_handler(&self, type_tag: &str) -> bool {
        self.handlers.contains_key(type_tag)
    }

    pub fn create_screen(&self, type_tag: &str, args: &Bundle) -> Result<Box<dyn Screen>> {
        let factory = self
            .screens
            .get(type_tag)
            .ok_or_else(|| Error::unregistered_screen(type_tag))?;
        Ok(factory(args))
    }

    pub fn create_handler(&self, type_tag: &str) -> Result<Box<dyn TransitionHandler>> {
        let factory = self
            .handlers
            .get(type_tag)
            .ok_or_else(|| Error::unregistered_handler(type_tag))?;
        Ok(factory())
    }

    /// Re-create a handler from its saved form
    pub fn restore_handler(&self, state: &HandlerState) -> Result<ChangeHandler> {
        let mut handler = self.create_handler(&state.type_tag)?;
        handler.restore_state(&state.state)?;
        Ok(ChangeHandler::from_boxed(handler))
    }

    /// Fail fast if a handler could not be restored later
    pub fn ensure_handler(&self, handler: &ChangeHandler) -> Result<()> {
        let type_tag = handler.type_tag();
        if self.has_handler(&type_tag) {
            Ok(())
        } else {
            Err(Error::unregistered_handler(type_tag))
        }
    }
}
