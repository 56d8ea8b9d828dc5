//! The engine-selection UI collaborator.
//!
//! The menu sees every key press before it reaches the active engine and
//! may answer with a queued [`MenuAction`]. The coordinator applies the
//! action after the engine forwarding completes, so the menu never holds a
//! live borrow of the coordinator during its own callback.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::engine::DescriptorId;
use crate::error::ImeError;
use crate::registry::EngineRegistry;

/// Mutation requested by a menu, applied after the triggering key event
/// finishes propagating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Select {
        descriptor: DescriptorId,
        locale: String,
    },
}

pub trait SelectionMenu {
    fn name(&self) -> &str {
        "selection_menu"
    }

    /// Inspect a key press; `Some` requests an explicit engine selection.
    fn on_key(&mut self, key: &KeyEvent, registry: &EngineRegistry) -> Option<MenuAction>;

    /// An explicit selection this menu requested failed to start.
    fn selection_failed(&mut self, _error: &ImeError) {}
}

/// Minimal shipped menu: a single key chord cycles through the registered
/// descriptors, selecting each one's first declared locale.
pub struct HotkeyMenu {
    code: KeyCode,
    modifiers: KeyModifiers,
    cursor: usize,
    last_error: Option<String>,
}

impl HotkeyMenu {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self {
            code,
            modifiers,
            cursor: 0,
            last_error: None,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl SelectionMenu for HotkeyMenu {
    fn name(&self) -> &str {
        "hotkey_menu"
    }

    fn on_key(&mut self, key: &KeyEvent, registry: &EngineRegistry) -> Option<MenuAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code != self.code || key.modifiers != self.modifiers {
            return None;
        }
        if registry.is_empty() {
            return None;
        }

        let idx = self.cursor % registry.len();
        self.cursor = self.cursor.wrapping_add(1);
        let (descriptor, entry) = registry.descriptors().nth(idx)?;
        let locale = entry.locales().first()?.clone();
        Some(MenuAction::Select { descriptor, locale })
    }

    fn selection_failed(&mut self, error: &ImeError) {
        self.last_error = Some(error.to_string());
    }
}
