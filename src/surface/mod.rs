//! The composition surface: an auxiliary window rendering provisional text
//! for clients that cannot render it themselves.

use std::cell::RefCell;
use std::rc::Rc;

use crate::events::CompositionUpdate;
use crate::geometry::Rect;
use crate::host::{ClientRequests, ComponentId, SharedHost, WindowId};
use crate::width::display_width;

struct SurfaceState {
    window: WindowId,
    client: Option<ComponentId>,
    text: String,
    caret: Option<usize>,
    committed: String,
    visible: bool,
    hash: Option<blake3::Hash>,
}

/// Cheap-clone handle over shared surface state.
///
/// The coordinator owns the surface; the activation registry holds a clone
/// so another coordinator's activation can hide it without reaching into
/// the owner.
#[derive(Clone)]
pub struct CompositionSurface {
    host: SharedHost,
    state: Rc<RefCell<SurfaceState>>,
}

impl CompositionSurface {
    /// Create the backing window, initially hidden and one cell high.
    pub(crate) fn create(host: SharedHost) -> Self {
        let window = host.borrow_mut().create_window(Rect::new(0, 0, 1, 1));
        Self {
            host,
            state: Rc::new(RefCell::new(SurfaceState {
                window,
                client: None,
                text: String::new(),
                caret: None,
                committed: String::new(),
                visible: false,
                hash: None,
            })),
        }
    }

    pub fn window(&self) -> WindowId {
        self.state.borrow().window
    }

    /// Rebind to a new client without destroying composition state.
    pub fn bind_client(&mut self, component: ComponentId) {
        self.state.borrow_mut().client = Some(component);
        self.reposition();
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().text.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    pub fn show(&mut self) {
        let window = {
            let mut state = self.state.borrow_mut();
            if state.visible {
                return;
            }
            state.visible = true;
            state.window
        };
        self.host.borrow_mut().show_window(window);
    }

    pub fn hide(&mut self) {
        let window = {
            let mut state = self.state.borrow_mut();
            if !state.visible {
                return;
            }
            state.visible = false;
            state.window
        };
        self.host.borrow_mut().hide_window(window);
    }

    /// The active-client delegate: absorb a composition update, returning
    /// the newly committed prefix (if any) for delivery to the real client.
    ///
    /// Content is pushed to the host only when the uncommitted text hash
    /// changes, so repeated caret-only updates stay cheap.
    pub fn apply(&mut self, update: &CompositionUpdate) -> Option<String> {
        let committed = update.committed_prefix().to_string();
        let suffix = update.uncommitted_suffix().to_string();

        let (window, changed) = {
            let mut state = self.state.borrow_mut();
            state.caret = update.caret;
            if !committed.is_empty() {
                state.committed = committed.clone();
            }
            let new_hash = blake3::hash(suffix.as_bytes());
            let changed = state.hash.map(|h| h != new_hash).unwrap_or(true);
            if changed {
                state.text = suffix.clone();
                state.hash = Some(new_hash);
            }
            (state.window, changed)
        };

        if changed {
            self.host.borrow_mut().set_window_content(window, suffix);
            self.reposition();
        }

        if committed.is_empty() { None } else { Some(committed) }
    }

    /// Surrogate request capability for clients without a native one.
    pub fn requests(&self) -> Rc<dyn ClientRequests> {
        Rc::new(SurfaceRequests {
            host: self.host.clone(),
            state: self.state.clone(),
        })
    }

    pub(crate) fn dispose(&mut self) {
        let window = self.state.borrow().window;
        self.host.borrow_mut().destroy_window(window);
    }

    /// Place the window directly beneath the client's owning window, sized
    /// to the preedit's display width.
    fn reposition(&self) {
        let (window, client, width) = {
            let state = self.state.borrow();
            let width = display_width(&state.text).max(1) as u16;
            (state.window, state.client, width)
        };
        let Some(client) = client else { return };
        let anchor = {
            let host = self.host.borrow();
            host.owning_window(client).and_then(|w| host.window_bounds(w))
        };
        if let Some(bounds) = anchor {
            self.host
                .borrow_mut()
                .move_window(window, Rect::new(bounds.x, bounds.bottom(), width, 1));
        }
    }
}

/// Answers text queries from the surface's state: the caret sits at the
/// surface window, and committed text is whatever last committed through
/// the surface.
struct SurfaceRequests {
    host: SharedHost,
    state: Rc<RefCell<SurfaceState>>,
}

impl ClientRequests for SurfaceRequests {
    fn text_location(&self) -> Option<Rect> {
        let (window, caret_offset) = {
            let state = self.state.borrow();
            let offset = match state.caret {
                Some(caret) => {
                    let prefix: String = state.text.chars().take(caret).collect();
                    display_width(&prefix) as u16
                }
                None => 0,
            };
            (state.window, offset)
        };
        self.host.borrow().window_bounds(window).map(|bounds| {
            Rect::new(
                bounds.x.saturating_add(caret_offset),
                bounds.y,
                bounds.width,
                bounds.height,
            )
        })
    }

    fn committed_text(&self) -> String {
        self.state.borrow().committed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostWindowing, ScriptedHost};

    fn scripted() -> (Rc<RefCell<ScriptedHost>>, SharedHost) {
        let host = Rc::new(RefCell::new(ScriptedHost::new()));
        let shared: SharedHost = host.clone();
        (host, shared)
    }

    #[test]
    fn bind_places_surface_under_client_window() {
        let (host, shared) = scripted();
        let (window, client) = {
            let mut h = host.borrow_mut();
            let w = h.add_window(Rect::new(5, 2, 40, 6));
            (w, h.add_component(w))
        };
        let _ = window;

        let mut surface = CompositionSurface::create(shared);
        surface.bind_client(client);

        let bounds = host.borrow().window_bounds(surface.window()).unwrap();
        assert_eq!((bounds.x, bounds.y), (5, 8));
        assert_eq!(bounds.height, 1);
    }

    #[test]
    fn apply_renders_only_on_content_change() {
        let (host, shared) = scripted();
        let client = {
            let mut h = host.borrow_mut();
            let w = h.add_window(Rect::new(0, 0, 40, 4));
            h.add_component(w)
        };

        let mut surface = CompositionSurface::create(shared);
        surface.bind_client(client);

        assert!(surface.apply(&CompositionUpdate::preedit("かな", Some(2))).is_none());
        assert_eq!(host.borrow().window_content(surface.window()), Some("かな"));
        assert!(!surface.is_empty());

        // Same text, new caret: no re-render, caret tracked.
        let before = host.borrow().window_content(surface.window()).unwrap().to_string();
        surface.apply(&CompositionUpdate::preedit("かな", Some(0)));
        assert_eq!(
            host.borrow().window_content(surface.window()),
            Some(before.as_str())
        );
    }

    #[test]
    fn commit_clears_and_reports_prefix() {
        let (host, shared) = scripted();
        let client = {
            let mut h = host.borrow_mut();
            let w = h.add_window(Rect::new(0, 0, 40, 4));
            h.add_component(w)
        };

        let mut surface = CompositionSurface::create(shared);
        surface.bind_client(client);
        surface.apply(&CompositionUpdate::preedit("すい", None));

        let committed = surface.apply(&CompositionUpdate::commit("水")).unwrap();
        assert_eq!(committed, "水");
        assert!(surface.is_empty());
        assert_eq!(host.borrow().window_content(surface.window()), Some(""));
    }

    #[test]
    fn surrogate_answers_location_and_committed_text() {
        let (host, shared) = scripted();
        let client = {
            let mut h = host.borrow_mut();
            let w = h.add_window(Rect::new(3, 1, 20, 2));
            h.add_component(w)
        };

        let mut surface = CompositionSurface::create(shared);
        surface.bind_client(client);
        surface.apply(&CompositionUpdate::commit("水"));

        let requests = surface.requests();
        let location = requests.text_location().unwrap();
        assert_eq!((location.x, location.y), (3, 3));
        assert_eq!(requests.committed_text(), "水");

        // A live preedit shifts the reported location to the caret cell.
        surface.apply(&CompositionUpdate::preedit("かな", Some(1)));
        let location = requests.text_location().unwrap();
        assert_eq!((location.x, location.y), (5, 3));
    }

    #[test]
    fn dispose_destroys_backing_window() {
        let (host, shared) = scripted();
        let mut surface = CompositionSurface::create(shared);
        let window = surface.window();
        assert!(host.borrow().window_exists(window));
        surface.dispose();
        assert!(!host.borrow().window_exists(window));
    }
}
