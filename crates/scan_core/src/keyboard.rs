//! Key bindings scoped to an active tour view.
//!
//! [`KeyboardHub`] is the process-wide key source. Listeners only exist
//! while the [`KeyboardBinding`] returned from [`KeyboardHub::attach`] is
//! alive; dropping it detaches the listener before `drop` returns.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError, Weak,
};

use tracing::debug;

use crate::tour::{lock_tour, SharedTour};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourKey {
    ArrowRight,
    ArrowLeft,
    Space,
    Other,
}

impl TourKey {
    /// Maps a key name as reported by a UI toolkit (`"ArrowRight"`, `" "`).
    pub fn from_name(name: &str) -> Self {
        match name {
            "ArrowRight" | "Right" => TourKey::ArrowRight,
            "ArrowLeft" | "Left" => TourKey::ArrowLeft,
            " " | "Space" | "Spacebar" => TourKey::Space,
            _ => TourKey::Other,
        }
    }
}

type Listener = Arc<dyn Fn(TourKey) + Send + Sync>;

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl HubInner {
    fn listeners(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct KeyboardHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for KeyboardHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl KeyboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, listener: impl Fn(TourKey) + Send + Sync + 'static) -> KeyboardBinding {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners().push((id, Arc::new(listener)));
        debug!(listener = id, "key listener attached");
        KeyboardBinding {
            hub: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Delivers `key` to every attached listener and returns how many
    /// received it. Listeners may attach or detach from inside the call.
    pub fn dispatch(&self, key: TourKey) -> usize {
        let snapshot: Vec<Listener> = self
            .inner
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &snapshot {
            listener(key);
        }
        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}

/// Attached listener; detached on drop.
#[must_use = "the listener is detached as soon as the binding is dropped"]
pub struct KeyboardBinding {
    hub: Weak<HubInner>,
    id: u64,
}

impl std::fmt::Debug for KeyboardBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardBinding").field("id", &self.id).finish()
    }
}

impl Drop for KeyboardBinding {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.listeners().retain(|(id, _)| *id != self.id);
            debug!(listener = self.id, "key listener detached");
        }
    }
}

/// An active tour view. Arrow and space keys drive the tour for as long as
/// this value lives.
pub struct TourView {
    tour: SharedTour,
    _binding: KeyboardBinding,
}

impl std::fmt::Debug for TourView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TourView")
            .field("binding", &self._binding)
            .finish()
    }
}

impl TourView {
    pub fn activate(tour: SharedTour, hub: &KeyboardHub) -> Self {
        let target = Arc::downgrade(&tour);
        let binding = hub.attach(move |key| {
            if let Some(tour) = target.upgrade() {
                lock_tour(&tour).handle_key(key);
            }
        });
        Self {
            tour,
            _binding: binding,
        }
    }

    pub fn tour(&self) -> &SharedTour {
        &self.tour
    }
}
