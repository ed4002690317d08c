//! Step-by-step navigation over a generated guide.

use std::{
    cmp::Ordering,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::{
    domain::BarrierId,
    protocol::{Guide, NavigationStep},
};
use tracing::{debug, info};

use crate::{error::OrchestratorError, keyboard::TourKey};

/// Tour handle shared between the orchestrator, the key listener and views.
pub type SharedTour = Arc<Mutex<TourController>>;

/// Locks a shared tour. A panic inside a completion hook does not leave
/// the tour unusable.
pub fn lock_tour(tour: &SharedTour) -> MutexGuard<'_, TourController> {
    tour.lock().unwrap_or_else(PoisonError::into_inner)
}

type CompletionHook = Box<dyn FnMut() + Send>;

pub struct TourController {
    guide: Guide,
    current: usize,
    direction: i8,
    alerts_visible: bool,
    selected: Option<BarrierId>,
    on_complete: Option<CompletionHook>,
}

impl std::fmt::Debug for TourController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourController")
            .field("guide", &self.guide.id)
            .field("current", &self.current)
            .field("total", &self.total_steps())
            .field("direction", &self.direction)
            .field("alerts_visible", &self.alerts_visible)
            .field("selected", &self.selected)
            .finish()
    }
}

impl TourController {
    /// A tour needs at least one step.
    pub fn new(guide: Guide) -> Result<Self, OrchestratorError> {
        if guide.navigation_steps.is_empty() {
            return Err(OrchestratorError::EmptyGuide);
        }
        Ok(Self {
            guide,
            current: 0,
            direction: 0,
            alerts_visible: true,
            selected: None,
            on_complete: None,
        })
    }

    pub fn with_completion(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.set_completion(hook);
        self
    }

    /// Called every time `next()` is invoked on the last step.
    pub fn set_completion(&mut self, hook: impl FnMut() + Send + 'static) {
        self.on_complete = Some(Box::new(hook));
    }

    pub fn into_shared(self) -> SharedTour {
        Arc::new(Mutex::new(self))
    }

    pub fn guide(&self) -> &Guide {
        &self.guide
    }

    pub fn steps(&self) -> &[NavigationStep] {
        &self.guide.navigation_steps
    }

    pub fn total_steps(&self) -> usize {
        self.guide.navigation_steps.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &NavigationStep {
        &self.guide.navigation_steps[self.current]
    }

    /// -1 after moving back, 1 after moving forward, 0 initially.
    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.total_steps()
    }

    pub fn progress_percent(&self) -> f64 {
        (self.current + 1) as f64 / self.total_steps() as f64 * 100.0
    }

    pub fn alerts_visible(&self) -> bool {
        self.alerts_visible
    }

    /// Alerts for the current step, empty while alerts are hidden.
    pub fn visible_alerts(&self) -> &[String] {
        if self.alerts_visible {
            &self.current_step().alerts
        } else {
            &[]
        }
    }

    pub fn selected_barrier(&self) -> Option<BarrierId> {
        self.selected
    }

    /// Jumps to `index`. Out-of-range indexes are ignored. Returns whether
    /// the current step changed.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index >= self.total_steps() {
            debug!(index, total = self.total_steps(), "ignoring out-of-range step");
            return false;
        }
        self.direction = match index.cmp(&self.current) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };
        if index == self.current {
            return false;
        }
        self.current = index;
        self.clear_selection();
        debug!(step = index + 1, total = self.total_steps(), "tour step changed");
        true
    }

    /// Advances one step, or fires the completion hook on the last step.
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            info!(guide = %self.guide.id, "tour finished");
            if let Some(hook) = self.on_complete.as_mut() {
                hook();
            }
            return false;
        }
        self.go_to(self.current + 1)
    }

    pub fn prev(&mut self) -> bool {
        match self.current.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    pub fn toggle_alerts(&mut self) {
        self.alerts_visible = !self.alerts_visible;
    }

    /// Selects `id`, or clears the selection if it is already selected.
    pub fn select_barrier(&mut self, id: BarrierId) {
        self.selected = if self.selected == Some(id) { None } else { Some(id) };
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Returns `true` when the key is bound to a tour action.
    pub fn handle_key(&mut self, key: TourKey) -> bool {
        match key {
            TourKey::ArrowRight | TourKey::Space => {
                self.next();
                true
            }
            TourKey::ArrowLeft => {
                self.prev();
                true
            }
            TourKey::Other => false,
        }
    }
}
