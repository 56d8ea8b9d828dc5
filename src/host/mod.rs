//! The windowing-layer boundary.
//!
//! The coordinator never talks to a toolkit directly; it goes through
//! [`HostWindowing`]. Focus transfer is a posted command rather than a
//! synchronous call: the host queues the request and services it later as a
//! fresh top-level focus event, which is what makes the deferred-handoff
//! bounce observable as two dispatches instead of a nested call.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::events::CompositionUpdate;
use crate::geometry::Rect;

/// Opaque handle to a focusable component owned by the host toolkit.
///
/// Handles may go stale; every lookup through the host returns `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub u64);

/// Opaque handle to a host window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// Capability answering text queries on behalf of a client.
///
/// Active clients expose their own implementation; passive clients are
/// served by the composition surface's surrogate.
pub trait ClientRequests {
    /// Location of the insertion caret, in host cell coordinates.
    fn text_location(&self) -> Option<Rect>;
    /// Text already committed through this capability.
    fn committed_text(&self) -> String;
}

/// A focus grant serviced from the host's transfer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTransfer {
    pub from: Option<ComponentId>,
    pub to: ComponentId,
}

pub trait HostWindowing {
    fn focused_component(&self) -> Option<ComponentId>;

    /// Post a focus-transfer request. Must not move focus synchronously.
    fn request_focus(&mut self, component: ComponentId);

    /// Service one queued focus-transfer request, if any.
    ///
    /// Queue-backed hosts pop the oldest request, move focus, and return the
    /// transfer; event-driven hosts that deliver real focus events leave the
    /// default no-op in place.
    fn grant_next_focus(&mut self) -> Option<FocusTransfer> {
        None
    }

    fn owning_window(&self, component: ComponentId) -> Option<WindowId>;
    fn window_bounds(&self, window: WindowId) -> Option<Rect>;

    /// The client's native input-method-request capability, if it has one.
    fn client_requests(&mut self, component: ComponentId) -> Option<Rc<dyn ClientRequests>>;

    /// Deliver a composition update to a client's document.
    fn deliver_composition(&mut self, component: ComponentId, update: &CompositionUpdate);

    fn create_window(&mut self, bounds: Rect) -> WindowId;
    fn move_window(&mut self, window: WindowId, bounds: Rect);
    fn set_window_content(&mut self, window: WindowId, content: String);
    fn show_window(&mut self, window: WindowId);
    fn hide_window(&mut self, window: WindowId);
    fn destroy_window(&mut self, window: WindowId);
}

pub type SharedHost = Rc<RefCell<dyn HostWindowing>>;

struct ScriptedComponent {
    window: WindowId,
    requests: Option<Rc<dyn ClientRequests>>,
}

struct ScriptedWindow {
    bounds: Rect,
    visible: bool,
    content: String,
}

/// In-memory [`HostWindowing`] implementation driving everything from
/// tables and a focus-grant queue, for tests and benches.
#[derive(Default)]
pub struct ScriptedHost {
    components: HashMap<ComponentId, ScriptedComponent>,
    windows: HashMap<WindowId, ScriptedWindow>,
    focused: Option<ComponentId>,
    pending_focus: VecDeque<ComponentId>,
    deliveries: Vec<(ComponentId, CompositionUpdate)>,
    probes: Vec<ComponentId>,
    next_window: u64,
    next_component: u64,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a toolkit window (as opposed to one the coordinator creates).
    pub fn add_window(&mut self, bounds: Rect) -> WindowId {
        let id = WindowId(self.next_window);
        self.next_window += 1;
        self.windows.insert(
            id,
            ScriptedWindow {
                bounds,
                visible: true,
                content: String::new(),
            },
        );
        id
    }

    pub fn add_component(&mut self, window: WindowId) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        self.components.insert(
            id,
            ScriptedComponent {
                window,
                requests: None,
            },
        );
        id
    }

    /// Give a component a native request capability.
    pub fn install_requests(&mut self, component: ComponentId, requests: Rc<dyn ClientRequests>) {
        if let Some(entry) = self.components.get_mut(&component) {
            entry.requests = Some(requests);
        }
    }

    pub fn set_focused(&mut self, component: Option<ComponentId>) {
        self.focused = component;
    }

    pub fn peek_focus_request(&self) -> Option<ComponentId> {
        self.pending_focus.front().copied()
    }

    pub fn deliveries(&self) -> &[(ComponentId, CompositionUpdate)] {
        &self.deliveries
    }

    /// Components whose request capability was looked up (pre-warm probes included).
    pub fn probes(&self) -> &[ComponentId] {
        &self.probes
    }

    pub fn window_visible(&self, window: WindowId) -> Option<bool> {
        self.windows.get(&window).map(|w| w.visible)
    }

    pub fn window_content(&self, window: WindowId) -> Option<&str> {
        self.windows.get(&window).map(|w| w.content.as_str())
    }

    pub fn window_exists(&self, window: WindowId) -> bool {
        self.windows.contains_key(&window)
    }
}

impl HostWindowing for ScriptedHost {
    fn focused_component(&self) -> Option<ComponentId> {
        self.focused
    }

    fn request_focus(&mut self, component: ComponentId) {
        self.pending_focus.push_back(component);
    }

    fn grant_next_focus(&mut self) -> Option<FocusTransfer> {
        let to = self.pending_focus.pop_front()?;
        let from = self.focused.replace(to);
        Some(FocusTransfer { from, to })
    }

    fn owning_window(&self, component: ComponentId) -> Option<WindowId> {
        self.components.get(&component).map(|c| c.window)
    }

    fn window_bounds(&self, window: WindowId) -> Option<Rect> {
        self.windows.get(&window).map(|w| w.bounds)
    }

    fn client_requests(&mut self, component: ComponentId) -> Option<Rc<dyn ClientRequests>> {
        self.probes.push(component);
        self.components
            .get(&component)
            .and_then(|c| c.requests.clone())
    }

    fn deliver_composition(&mut self, component: ComponentId, update: &CompositionUpdate) {
        self.deliveries.push((component, update.clone()));
    }

    fn create_window(&mut self, bounds: Rect) -> WindowId {
        let id = WindowId(self.next_window);
        self.next_window += 1;
        self.windows.insert(
            id,
            ScriptedWindow {
                bounds,
                visible: false,
                content: String::new(),
            },
        );
        id
    }

    fn move_window(&mut self, window: WindowId, bounds: Rect) {
        if let Some(entry) = self.windows.get_mut(&window) {
            entry.bounds = bounds;
        }
    }

    fn set_window_content(&mut self, window: WindowId, content: String) {
        if let Some(entry) = self.windows.get_mut(&window) {
            entry.content = content;
        }
    }

    fn show_window(&mut self, window: WindowId) {
        if let Some(entry) = self.windows.get_mut(&window) {
            entry.visible = true;
        }
    }

    fn hide_window(&mut self, window: WindowId) {
        if let Some(entry) = self.windows.get_mut(&window) {
            entry.visible = false;
        }
    }

    fn destroy_window(&mut self, window: WindowId) {
        self.windows.remove(&window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_grants_are_fifo() {
        let mut host = ScriptedHost::new();
        let window = host.add_window(Rect::new(0, 0, 40, 10));
        let a = host.add_component(window);
        let b = host.add_component(window);

        host.request_focus(a);
        host.request_focus(b);

        let first = host.grant_next_focus().unwrap();
        assert_eq!(first.to, a);
        assert_eq!(first.from, None);
        assert_eq!(host.focused_component(), Some(a));

        let second = host.grant_next_focus().unwrap();
        assert_eq!(second.from, Some(a));
        assert_eq!(second.to, b);
        assert!(host.grant_next_focus().is_none());
    }

    #[test]
    fn created_windows_start_hidden() {
        let mut host = ScriptedHost::new();
        let window = host.create_window(Rect::new(2, 3, 10, 1));
        assert_eq!(host.window_visible(window), Some(false));
        host.show_window(window);
        assert_eq!(host.window_visible(window), Some(true));
        host.destroy_window(window);
        assert!(!host.window_exists(window));
    }

    #[test]
    fn request_lookups_are_recorded() {
        let mut host = ScriptedHost::new();
        let window = host.add_window(Rect::new(0, 0, 20, 5));
        let c = host.add_component(window);
        assert!(host.client_requests(c).is_none());
        assert_eq!(host.probes(), &[c]);
    }
}
