//! Cross-coordinator activation exclusivity.
//!
//! One embedding application may run several coordinators (one per
//! text-input context). At most one of them may have composition UI on
//! screen; the registry names the last one to activate and lets the next
//! activation hide the previous one's windows without reaching into the
//! owning coordinator.
//!
//! The registry is an explicit service object handed to every coordinator
//! at construction, not a hidden static. Single-threaded interior
//! mutability only.

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::SharedEngine;
use crate::surface::CompositionSurface;

/// Identity of a coordinator, allocated by [`ActivationRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinatorId(u64);

/// Clone handles to everything a coordinator can have on screen.
pub struct ActiveWindows {
    engine: Option<SharedEngine>,
    surface: Option<CompositionSurface>,
}

impl ActiveWindows {
    pub fn new(engine: Option<SharedEngine>, surface: Option<CompositionSurface>) -> Self {
        Self { engine, surface }
    }

    fn hide_all(&mut self) {
        if let Some(engine) = &self.engine {
            engine.borrow_mut().hide_windows();
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.hide();
        }
    }
}

struct ActivationEntry {
    coordinator: CoordinatorId,
    windows: ActiveWindows,
}

#[derive(Default)]
struct ActivationState {
    next_id: u64,
    last: Option<ActivationEntry>,
}

/// Last-activated-coordinator record shared by all coordinators of one
/// embedding application.
#[derive(Default)]
pub struct ActivationRegistry {
    inner: RefCell<ActivationState>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> CoordinatorId {
        let mut state = self.inner.borrow_mut();
        let id = CoordinatorId(state.next_id);
        state.next_id += 1;
        id
    }

    /// Record `coordinator` as last active, replacing any previous entry.
    pub fn record(&self, coordinator: CoordinatorId, windows: ActiveWindows) {
        self.inner.borrow_mut().last = Some(ActivationEntry {
            coordinator,
            windows,
        });
    }

    pub fn last_active(&self) -> Option<CoordinatorId> {
        self.inner.borrow().last.as_ref().map(|e| e.coordinator)
    }

    /// Hide the last-active coordinator's windows if it is not `current`.
    /// Returns whether anything was hidden.
    pub fn hide_other(&self, current: CoordinatorId) -> bool {
        let mut state = self.inner.borrow_mut();
        match state.last.as_mut() {
            Some(entry) if entry.coordinator != current => {
                entry.windows.hide_all();
                true
            }
            _ => false,
        }
    }

    /// Drop the entry if `coordinator` owns it; another coordinator's
    /// entry is left alone.
    pub fn clear(&self, coordinator: CoordinatorId) {
        let mut state = self.inner.borrow_mut();
        if state.last.as_ref().map(|e| e.coordinator) == Some(coordinator) {
            state.last = None;
        }
    }
}

pub type SharedActivation = Rc<ActivationRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::EngineContext;
    use crate::engine::InputMethodEngine;
    use std::cell::RefCell;

    struct HidingEngine {
        hidden: Rc<RefCell<u32>>,
    }

    impl InputMethodEngine for HidingEngine {
        fn activate(&mut self) {}
        fn deactivate(&mut self, _temporary: bool) {}
        fn set_locale(&mut self, _locale: &str) -> bool {
            false
        }
        fn end_composition(&mut self, _ctx: &mut EngineContext) {}
        fn hide_windows(&mut self) {
            *self.hidden.borrow_mut() += 1;
        }
    }

    #[test]
    fn register_allocates_distinct_ids() {
        let registry = ActivationRegistry::new();
        assert_ne!(registry.register(), registry.register());
    }

    #[test]
    fn record_and_query_last_active() {
        let registry = ActivationRegistry::new();
        let id = registry.register();
        assert!(registry.last_active().is_none());
        registry.record(id, ActiveWindows::new(None, None));
        assert_eq!(registry.last_active(), Some(id));
    }

    #[test]
    fn hide_other_skips_own_entry() {
        let registry = ActivationRegistry::new();
        let id = registry.register();
        let hidden = Rc::new(RefCell::new(0));
        let engine: SharedEngine = Rc::new(RefCell::new(HidingEngine {
            hidden: hidden.clone(),
        }));
        registry.record(id, ActiveWindows::new(Some(engine), None));

        assert!(!registry.hide_other(id));
        assert_eq!(*hidden.borrow(), 0);

        let other = registry.register();
        assert!(registry.hide_other(other));
        assert_eq!(*hidden.borrow(), 1);
        // The entry still names the previous coordinator until `other`
        // actually activates.
        assert_eq!(registry.last_active(), Some(id));
    }

    #[test]
    fn clear_is_owner_checked() {
        let registry = ActivationRegistry::new();
        let id = registry.register();
        let other = registry.register();
        registry.record(id, ActiveWindows::new(None, None));

        registry.clear(other);
        assert_eq!(registry.last_active(), Some(id));
        registry.clear(id);
        assert!(registry.last_active().is_none());
    }
}
