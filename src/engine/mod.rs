//! The input-method engine capability and its descriptors.

use std::cell::RefCell;
use std::rc::Rc;

use crate::coordinator::EngineContext;
use crate::error::Result;
use crate::events::{EventFlow, InputEvent};
use crate::geometry::Rect;

/// Engines are single-threaded objects shared between the coordinator
/// (which drives the active one) and the registry arena (which keeps
/// instances alive across deactivations so state survives re-selection).
pub type SharedEngine = Rc<RefCell<dyn InputMethodEngine>>;

/// Factory producing a fresh engine instance. The registry caches the
/// result, so a factory runs at most once per coordinator.
pub type EngineFactory = Rc<dyn Fn() -> Result<SharedEngine>>;

/// Marker returned by optional engine operations the implementation does
/// not support. Callers probe with `Capability` results instead of
/// exception-style control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported;

pub type Capability<T> = std::result::Result<T, Unsupported>;

/// Named inclusive range of characters an engine may be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterSubset {
    pub name: &'static str,
    pub first: char,
    pub last: char,
}

impl CharacterSubset {
    pub const fn new(name: &'static str, first: char, last: char) -> Self {
        Self { name, first, last }
    }

    pub fn contains(&self, ch: char) -> bool {
        (self.first..=self.last).contains(&ch)
    }
}

/// Identity of a registered descriptor; arena index into the registry.
/// Doubles as engine identity everywhere (instance cache, notification
/// subscriptions, locale memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub(crate) usize);

impl DescriptorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Immutable description of an installable engine: display name, the
/// locales it claims (exact-match strings), and a factory.
pub struct EngineDescriptor {
    name: String,
    locales: Vec<String>,
    factory: EngineFactory,
}

impl EngineDescriptor {
    pub fn new(name: impl Into<String>, factory: EngineFactory) -> Self {
        Self {
            name: name.into(),
            locales: Vec::new(),
            factory,
        }
    }

    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Exact match only; locale inheritance is the caller's concern.
    pub fn supports_locale(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l == locale)
    }

    pub(crate) fn instantiate(&self) -> Result<SharedEngine> {
        (self.factory)()
    }
}

/// Contract implemented by input-method engines.
///
/// Engines never call back into the coordinator; emissions and
/// subscription requests go through the [`EngineContext`] handed to
/// `handle_event`/`end_composition` and are applied after the call
/// returns.
pub trait InputMethodEngine {
    fn name(&self) -> &str {
        "input_method_engine"
    }

    fn activate(&mut self);

    fn deactivate(&mut self, temporary: bool);

    fn dispose(&mut self) {}

    /// Attempt to serve `locale` without replacement; `true` on acceptance.
    fn set_locale(&mut self, locale: &str) -> bool;

    fn locale(&self) -> Option<String> {
        None
    }

    /// Restrict output to the given subsets; `None` clears the restriction.
    fn set_character_subsets(&mut self, _subsets: Option<&[CharacterSubset]>) {}

    fn composition_enabled(&self) -> Capability<bool> {
        Err(Unsupported)
    }

    fn set_composition_enabled(&mut self, _enabled: bool) -> Capability<()> {
        Err(Unsupported)
    }

    /// Flush pending composition: emit whatever is uncommitted as committed
    /// text through the context.
    fn end_composition(&mut self, _ctx: &mut EngineContext) {}

    fn handle_event(&mut self, _ctx: &mut EngineContext, _event: &InputEvent) -> EventFlow {
        EventFlow::Continue
    }

    /// Hide any windows the engine owns (candidate lists, status windows).
    fn hide_windows(&mut self) {}

    /// The current client's window bounds changed; `None` means unknown.
    fn notify_client_window_change(&mut self, _bounds: Option<Rect>) {}

    /// Whether this engine fronts the host's native IME. Managed engines
    /// keep the native IME disabled while active; the adapter does not.
    fn is_native_adapter(&self) -> bool {
        false
    }
}
