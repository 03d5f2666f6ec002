//! Frame-driven animated transitions
//!
//! [`AnimatedHandler`] is a small composition of duration, easing curve and
//! visual effect. It does not own a clock: the navigator feeds it elapsed time
//! through [`Navigator::advance_frame`](crate::Navigator::advance_frame).

use std::time::Duration;

use baton_core::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Change, Completer, TransitionHandler};
use crate::config::AnimationSettings;
use crate::view::{ViewId, ViewTree};

const KEY_DURATION_MS: &str = "duration_ms";
const KEY_EASING: &str = "easing";
const KEY_EFFECT: &str = "effect";
const KEY_REMOVES_FROM_VIEW_ON_PUSH: &str = "removes_from_view_on_push";

/// Easing curve applied to linear progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
}

impl Easing {
    /// Map linear progress in `[0, 1]` onto the curve
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// Visual effect of the transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    Fade,
    SlideHorizontal,
    SlideVertical,
}

#[derive(Debug)]
struct Running {
    container: ViewId,
    from: Option<ViewId>,
    to: Option<ViewId>,
    is_push: bool,
    elapsed: Duration,
    completer: Option<Completer>,
}

/// Animated swap between two views
#[derive(Debug)]
pub struct AnimatedHandler {
    duration: Duration,
    easing: Easing,
    effect: Effect,
    removes_from_view_on_push: bool,
    canceled: bool,
    needs_immediate_completion: bool,
    running: Option<Running>,
}

impl Default for AnimatedHandler {
    fn default() -> Self {
        Self::from_settings(&AnimationSettings::default())
    }
}

impl AnimatedHandler {
    pub const TYPE_TAG: &'static str = "animated";

    pub fn new(duration: Duration, easing: Easing, effect: Effect) -> Self {
        Self {
            duration,
            easing,
            effect,
            removes_from_view_on_push: true,
            canceled: false,
            needs_immediate_completion: false,
            running: None,
        }
    }

    pub fn from_settings(settings: &AnimationSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.duration_ms),
            settings.easing,
            settings.effect,
        )
        .with_removes_from_view_on_push(settings.removes_from_view_on_push)
    }

    pub fn with_removes_from_view_on_push(mut self, removes: bool) -> Self {
        self.removes_from_view_on_push = removes;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn removes_from(&self, is_push: bool) -> bool {
        !is_push || self.removes_from_view_on_push
    }

    /// Set visual properties for eased progress `p`
    fn apply(&self, views: &mut ViewTree, run: &Running, p: f32) {
        let removes_from = self.removes_from(run.is_push);
        match self.effect {
            Effect::Fade => {
                if let Some(to) = run.to {
                    views.set_alpha(to, p);
                }
                if let Some(from) = run.from.filter(|_| removes_from) {
                    views.set_alpha(from, 1.0 - p);
                }
            }
            Effect::SlideHorizontal => {
                let dir = if run.is_push { 1.0 } else { -1.0 };
                if let Some(to) = run.to {
                    views.set_offset(to, (dir * (1.0 - p), 0.0));
                }
                if let Some(from) = run.from.filter(|_| removes_from) {
                    views.set_offset(from, (-dir * p, 0.0));
                }
            }
            Effect::SlideVertical => {
                if run.is_push {
                    if let Some(to) = run.to {
                        views.set_offset(to, (0.0, 1.0 - p));
                    }
                } else if let Some(from) = run.from {
                    views.set_offset(from, (0.0, p));
                }
            }
        }
    }

    fn reset(views: &mut ViewTree, view: Option<ViewId>) {
        if let Some(view) = view {
            views.set_alpha(view, 1.0);
            views.set_offset(view, (0.0, 0.0));
        }
    }

    /// Animation reached its end: settle views and complete
    fn end(&mut self, views: &mut ViewTree) {
        let Some(mut run) = self.running.take() else {
            return;
        };
        if let Some(from) = run.from {
            if self.removes_from(run.is_push) && views.parent(from) == Some(run.container) {
                views.remove_from_parent(from);
            }
        }
        Self::reset(views, run.to);
        if run.is_push {
            Self::reset(views, run.from);
        }
        if let Some(completer) = run.completer.take() {
            completer.complete();
        }
    }

    /// Animation canceled before reaching its end
    fn cancel(&mut self, views: &mut ViewTree) {
        let Some(mut run) = self.running.take() else {
            return;
        };
        Self::reset(views, run.from);
        if let Some(from) = run.from {
            if self.removes_from(run.is_push)
                && self.needs_immediate_completion
                && views.parent(from) == Some(run.container)
            {
                views.remove_from_parent(from);
            }
        }
        if let Some(completer) = run.completer.take() {
            completer.complete();
        }
    }
}

impl TransitionHandler for AnimatedHandler {
    fn type_tag(&self) -> &str {
        Self::TYPE_TAG
    }

    fn perform_change(&mut self, change: &mut Change<'_>) {
        let container = change.container;

        if let Some(to) = change.to {
            if change.views.parent(to).is_none() {
                let index = match change.from {
                    Some(from) if !change.is_push => change.views.index_of(container, from),
                    _ => None,
                };
                let added = match index {
                    Some(index) => change.views.insert_child(container, index, to),
                    None => change.views.add_child(container, to),
                };
                if let Err(e) = added {
                    warn!("Animated handler could not add {}: {}", to, e);
                }
            }
        }

        if self.canceled {
            change.complete();
            return;
        }

        let run = Running {
            container,
            from: change.from,
            to: change.to,
            is_push: change.is_push,
            elapsed: Duration::ZERO,
            completer: change.take_completer(),
        };
        self.apply(change.views, &run, 0.0);
        self.running = Some(run);

        if self.duration.is_zero() || self.needs_immediate_completion {
            self.end(change.views);
        }
    }

    fn on_abort_push(&mut self, views: &mut ViewTree, _new_top: Option<&InstanceId>) {
        self.canceled = true;
        self.cancel(views);
    }

    fn complete_immediately(&mut self, views: &mut ViewTree) {
        self.needs_immediate_completion = true;
        if let Some(run) = &self.running {
            self.apply(views, run, 1.0);
        }
        self.end(views);
    }

    fn on_frame(&mut self, views: &mut ViewTree, elapsed: Duration) {
        let Some(run) = self.running.as_mut() else {
            return;
        };
        run.elapsed += elapsed;
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (run.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        };

        if progress >= 1.0 {
            self.end(views);
        } else if let Some(run) = self.running.as_ref() {
            self.apply(views, run, self.easing.apply(progress));
        }
    }

    fn removes_from_view_on_push(&self) -> bool {
        self.removes_from_view_on_push
    }

    fn save_state(&self, out: &mut Bundle) {
        out.insert(
            KEY_DURATION_MS.into(),
            Value::from(self.duration.as_millis() as u64),
        );
        out.insert(
            KEY_EASING.into(),
            serde_json::to_value(self.easing).unwrap_or(Value::Null),
        );
        out.insert(
            KEY_EFFECT.into(),
            serde_json::to_value(self.effect).unwrap_or(Value::Null),
        );
        out.insert(
            KEY_REMOVES_FROM_VIEW_ON_PUSH.into(),
            Value::Bool(self.removes_from_view_on_push),
        );
    }

    fn restore_state(&mut self, saved: &Bundle) -> Result<()> {
        if let Some(ms) = saved.get(KEY_DURATION_MS) {
            let ms = ms
                .as_u64()
                .ok_or_else(|| Error::handler_state("duration_ms must be an integer"))?;
            self.duration = Duration::from_millis(ms);
        }
        if let Some(easing) = saved.get(KEY_EASING) {
            self.easing = serde_json::from_value(easing.clone())?;
        }
        if let Some(effect) = saved.get(KEY_EFFECT) {
            self.effect = serde_json::from_value(effect.clone())?;
        }
        if let Some(removes) = saved.get(KEY_REMOVES_FROM_VIEW_ON_PUSH) {
            self.removes_from_view_on_push = removes
                .as_bool()
                .ok_or_else(|| Error::handler_state("removes_from_view_on_push must be a bool"))?;
        }
        Ok(())
    }

    fn copy(&self) -> Option<Box<dyn TransitionHandler>> {
        Some(Box::new(
            Self::new(self.duration, self.easing, self.effect)
                .with_removes_from_view_on_push(self.removes_from_view_on_push),
        ))
    }
}
