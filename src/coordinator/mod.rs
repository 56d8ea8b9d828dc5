//! The input-method coordinator: the state machine arbitrating between the
//! focused client, the active engine, and the composition surface.
//!
//! Everything runs synchronously on the host's event-dispatch thread.
//! Reentrancy, not concurrency, is the hazard: a focus-transfer request is
//! posted to the host's queue and serviced later as a fresh top-level
//! dispatch, so mid-transition state (`deferred_client`) persists across
//! the gap.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use serde_json::{Value, json};

use crate::engine::{DescriptorId, EngineDescriptor, SharedEngine};
use crate::error::Result;
use crate::events::{CompositionUpdate, EventFlow, InputEvent, InputStyle};
use crate::host::{ClientRequests, ComponentId, SharedHost, WindowId};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::CoordinatorMetrics;
use crate::registry::EngineRegistry;
use crate::surface::CompositionSurface;

pub mod activation;
pub mod audit;
pub mod menu;

use activation::{ActiveWindows, CoordinatorId, SharedActivation};
use audit::{AuditEventBuilder, AuditStage, CoordinatorAudit, NullCoordinatorAudit};
use menu::{MenuAction, SelectionMenu};

/// Host-native input method editor that must stay disabled while a managed
/// engine is active.
pub trait NativeIme {
    fn disable(&mut self);
}

/// Configuration knobs for a coordinator.
#[derive(Clone)]
pub struct CoordinatorConfig {
    /// Where provisional text renders when the client could render it.
    pub input_style: InputStyle,
    /// Optional structured logger.
    pub logger: Option<Logger>,
    /// Metrics accumulator shared with the embedding application.
    pub metrics: Option<Rc<RefCell<CoordinatorMetrics>>>,
    /// Target field used when emitting metric snapshots.
    pub metrics_target: String,
    /// Lifecycle audit sink.
    pub audit: Rc<dyn CoordinatorAudit>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            input_style: InputStyle::default(),
            logger: None,
            metrics: None,
            metrics_target: "switchboard::coordinator.metrics".to_string(),
            audit: Rc::new(NullCoordinatorAudit),
        }
    }
}

impl CoordinatorConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Rc::new(RefCell::new(CoordinatorMetrics::new())));
        }
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Rc<RefCell<CoordinatorMetrics>>> {
        self.metrics.as_ref().map(Rc::clone)
    }
}

/// Context handed to engine calls so engines can interact with the
/// coordinator safely. Mutations are queued and applied after the engine
/// call returns.
pub struct EngineContext {
    client: Option<ComponentId>,
    emissions: Vec<CompositionUpdate>,
    notify: Option<bool>,
    declared_windows: Vec<WindowId>,
}

impl EngineContext {
    fn new(client: Option<ComponentId>) -> Self {
        Self {
            client,
            emissions: Vec::new(),
            notify: None,
            declared_windows: Vec::new(),
        }
    }

    /// The component currently treated as the client, if any.
    pub fn client(&self) -> Option<ComponentId> {
        self.client
    }

    /// Queue a composition update for routing to the client or surface.
    pub fn emit(&mut self, update: CompositionUpdate) {
        self.emissions.push(update);
    }

    /// Subscribe or unsubscribe this engine from client-window-bounds
    /// notifications.
    pub fn set_client_notify(&mut self, enabled: bool) {
        self.notify = Some(enabled);
    }

    /// Declare a window the engine created so its focus events are not
    /// mistaken for client switches.
    pub fn declare_owned_window(&mut self, window: WindowId) {
        self.declared_windows.push(window);
    }

    fn into_outcome(self) -> EngineOutcome {
        EngineOutcome {
            emissions: self.emissions,
            notify: self.notify,
            declared_windows: self.declared_windows,
        }
    }
}

struct EngineOutcome {
    emissions: Vec<CompositionUpdate>,
    notify: Option<bool>,
    declared_windows: Vec<WindowId>,
}

pub struct Coordinator {
    id: CoordinatorId,
    host: SharedHost,
    registry: EngineRegistry,
    activation: SharedActivation,
    config: CoordinatorConfig,
    active_engine: Option<(DescriptorId, SharedEngine)>,
    client: Option<ComponentId>,
    deferred_client: Option<ComponentId>,
    pending_client_notify: bool,
    locale_memory: HashMap<String, (DescriptorId, SharedEngine)>,
    notify_subscribers: HashSet<DescriptorId>,
    owned_windows: HashSet<WindowId>,
    surface: Option<CompositionSurface>,
    menu: Option<Box<dyn SelectionMenu>>,
    native_ime: Option<Box<dyn NativeIme>>,
    started: Instant,
    disposed: bool,
}

impl Coordinator {
    pub fn new(host: SharedHost, activation: SharedActivation) -> Self {
        Self::with_config(host, activation, CoordinatorConfig::default())
    }

    pub fn with_config(
        host: SharedHost,
        activation: SharedActivation,
        config: CoordinatorConfig,
    ) -> Self {
        let id = activation.register();
        let coordinator = Self {
            id,
            host,
            registry: EngineRegistry::new(),
            activation,
            config,
            active_engine: None,
            client: None,
            deferred_client: None,
            pending_client_notify: false,
            locale_memory: HashMap::new(),
            notify_subscribers: HashSet::new(),
            owned_windows: HashSet::new(),
            surface: None,
            menu: None,
            native_ime: None,
            started: Instant::now(),
            disposed: false,
        };
        coordinator.record_audit(AuditStage::CoordinatorConstructed, Vec::new());
        coordinator.log(LogLevel::Info, "coordinator_constructed", std::iter::empty());
        coordinator
    }

    pub fn id(&self) -> CoordinatorId {
        self.id
    }

    pub fn config_mut(&mut self) -> &mut CoordinatorConfig {
        &mut self.config
    }

    pub fn register_engine(&mut self, descriptor: EngineDescriptor) -> DescriptorId {
        self.registry.register(descriptor)
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn set_selection_menu<M>(&mut self, menu: M)
    where
        M: SelectionMenu + 'static,
    {
        self.menu = Some(Box::new(menu));
    }

    pub fn set_native_ime<N>(&mut self, ime: N)
    where
        N: NativeIme + 'static,
    {
        self.native_ime = Some(Box::new(ime));
    }

    /// Declare a window as coordinator-owned so focus events originating
    /// from it are filtered out.
    pub fn declare_owned_window(&mut self, window: WindowId) {
        self.owned_windows.insert(window);
    }

    pub fn client(&self) -> Option<ComponentId> {
        self.client
    }

    pub fn deferred_client(&self) -> Option<ComponentId> {
        self.deferred_client
    }

    pub fn active_engine(&self) -> Option<DescriptorId> {
        self.active_engine.as_ref().map(|(id, _)| *id)
    }

    /// Deliver one event from the windowing layer.
    pub fn dispatch(&mut self, event: InputEvent) -> EventFlow {
        self.record_metric(|m| m.record_event());
        self.log(
            LogLevel::Debug,
            "event_dispatched",
            [json_kv("event", json!(event.describe()))],
        );
        match event {
            InputEvent::FocusGained(_) | InputEvent::FocusLost { .. } => {
                self.handle_focus(&event);
                EventFlow::Continue
            }
            InputEvent::Key(key) => {
                let action = match self.menu.as_mut() {
                    Some(menu) => menu.on_key(&key, &self.registry),
                    None => None,
                };
                let flow = self.forward_to_engine(&InputEvent::Key(key));
                if let Some(MenuAction::Select { descriptor, locale }) = action {
                    if let Err(err) = self.select_descriptor(descriptor, &locale) {
                        self.log(
                            LogLevel::Warn,
                            "explicit_selection_failed",
                            [json_kv("error", json!(err.to_string()))],
                        );
                        if let Some(menu) = self.menu.as_mut() {
                            menu.selection_failed(&err);
                        }
                    }
                }
                flow
            }
            other => self.forward_to_engine(&other),
        }
    }

    /// Feed a scripted event sequence, draining queued focus transfers
    /// after each event so the deferred-handoff bounce resolves
    /// deterministically.
    pub fn run_scripted<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = InputEvent>,
    {
        for event in events {
            self.dispatch(event);
            self.pump_focus_transfers();
        }
    }

    /// Service queued focus-transfer requests until none remain. Each grant
    /// produces a fresh FOCUS_LOST/FOCUS_GAINED dispatch pair, which is how
    /// the two-hop handoff re-enters the state machine.
    pub fn pump_focus_transfers(&mut self) {
        loop {
            let transfer = self.host.borrow_mut().grant_next_focus();
            let Some(transfer) = transfer else { break };
            if let Some(from) = transfer.from {
                self.dispatch(InputEvent::FocusLost {
                    component: from,
                    temporary: false,
                });
            }
            self.dispatch(InputEvent::FocusGained(transfer.to));
        }
    }

    /// Primary engine-selection entry point. Returns `false` when no engine
    /// can serve `locale`; state is untouched in that case.
    pub fn select_locale(&mut self, locale: &str) -> bool {
        if let Some((_, engine)) = self.active_engine.clone() {
            if engine.borrow_mut().set_locale(locale) {
                self.log(
                    LogLevel::Debug,
                    "locale_accepted",
                    [json_kv("locale", json!(locale))],
                );
                return true;
            }
        }
        let candidate = self
            .locale_memory
            .get(locale)
            .cloned()
            .or_else(|| self.registry.find_for_locale(locale));
        let switched = self.switch_to(locale, candidate);
        if !switched {
            self.log(
                LogLevel::Debug,
                "no_engine_for_locale",
                [json_kv("locale", json!(locale))],
            );
        }
        switched
    }

    /// User-driven selection from a picker UI. Instantiation failures
    /// propagate; the active engine and client are untouched on error.
    pub fn select_descriptor(&mut self, descriptor: DescriptorId, locale: &str) -> Result<()> {
        let engine = self.registry.get_or_create(descriptor)?;
        self.switch_to(locale, Some((descriptor, engine)));
        Ok(())
    }

    /// Subscribe or unsubscribe an engine from client-window-bounds
    /// notifications. Subscribing with a live client flushes one
    /// notification immediately; without one, the flush is parked until
    /// the next focus gain.
    pub fn enable_client_notify(&mut self, engine: DescriptorId, enabled: bool) {
        if !enabled {
            self.notify_subscribers.remove(&engine);
            return;
        }
        self.notify_subscribers.insert(engine);
        match self.client {
            Some(client) => self.flush_notification(engine, client),
            None => self.pending_client_notify = true,
        }
    }

    /// The current client's window moved or resized; flush fresh bounds to
    /// every subscribed engine.
    pub fn client_window_changed(&mut self) {
        let Some(client) = self.client else { return };
        let subscribers: Vec<_> = self.notify_subscribers.iter().copied().collect();
        for engine in subscribers {
            self.flush_notification(engine, client);
        }
    }

    /// The request capability serving the active engine's text queries:
    /// the client's native capability when it has one, else the surface
    /// surrogate.
    pub fn requests(&mut self) -> Rc<dyn ClientRequests> {
        if let Some(client) = self.client {
            let native = self.host.borrow_mut().client_requests(client);
            if let Some(native) = native {
                return native;
            }
        }
        self.ensure_surface().requests()
    }

    /// Style-aware variant: below-the-spot always answers from the surface
    /// surrogate regardless of client capability.
    pub fn style_requests(&mut self) -> Rc<dyn ClientRequests> {
        if self.config.input_style == InputStyle::BelowTheSpot {
            return self.ensure_surface().requests();
        }
        self.requests()
    }

    /// Emit a metrics snapshot through the configured logger.
    pub fn emit_metrics(&self) {
        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            let snapshot = metrics.borrow().snapshot(self.started.elapsed());
            let _ = logger.log_event(snapshot.to_log_event(&self.config.metrics_target));
        }
    }

    /// Tear down and dispose every engine this coordinator created, destroy
    /// the composition surface, and release the activation entry.
    /// Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(entry) = self.active_engine.take() {
            self.teardown_engine(&entry);
        }
        for instance in self.registry.drain_instances() {
            instance.borrow_mut().dispose();
        }
        self.locale_memory.clear();
        self.notify_subscribers.clear();
        self.pending_client_notify = false;

        if let Some(mut surface) = self.surface.take() {
            surface.dispose();
        }
        self.activation.clear(self.id);
        self.record_audit(AuditStage::CoordinatorDisposed, Vec::new());
        self.log(LogLevel::Info, "coordinator_disposed", std::iter::empty());
    }

    fn handle_focus(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::FocusLost {
                component,
                temporary,
            } => {
                // The client reference survives focus loss; the component
                // may regain focus without a real switch.
                if self.client == Some(component) {
                    if let Some((_, engine)) = self.active_engine.clone() {
                        engine.borrow_mut().deactivate(temporary);
                        self.record_audit(
                            AuditStage::EngineDeactivated,
                            vec![("temporary".into(), json!(temporary))],
                        );
                    }
                }
            }
            InputEvent::FocusGained(component) => self.handle_focus_gained(component),
            _ => {}
        }
    }

    fn handle_focus_gained(&mut self, component: ComponentId) {
        // A focus event from one of our own windows is not a client switch.
        if self.is_owned(component) {
            return;
        }

        // Window exclusivity across coordinators: whoever was last active
        // elsewhere gets its composition UI off the screen now.
        self.activation.hide_other(self.id);

        if self.active_engine.is_some() {
            self.activate_engine();
            if let Some(surface) = self.surface.as_mut() {
                if !surface.is_empty() {
                    surface.show();
                }
            }
        }

        let surface_visible = self
            .surface
            .as_ref()
            .map(|s| s.is_visible())
            .unwrap_or(false);

        match (self.client, self.deferred_client) {
            (Some(current), Some(next)) if current == component => {
                // The old client got its focus back; flush composition,
                // then hand focus to the component that originally asked
                // for it.
                self.deferred_client = None;
                self.end_active_composition();
                self.client = Some(next);
                if let Some(surface) = self.surface.as_mut() {
                    surface.bind_client(next);
                }
                self.host.borrow_mut().request_focus(next);
                self.record_audit(AuditStage::HandoffCompleted, Vec::new());
                self.log(LogLevel::Debug, "handoff_completed", std::iter::empty());
            }
            (Some(current), _) if current != component && surface_visible => {
                // Composition is on screen for the current client; park
                // the newcomer and bounce focus back so composition can
                // end cleanly first.
                self.deferred_client = Some(component);
                self.host.borrow_mut().request_focus(current);
                self.record_metric(|m| m.record_deferral());
                self.record_audit(AuditStage::HandoffDeferred, Vec::new());
                self.log(LogLevel::Debug, "handoff_deferred", std::iter::empty());
            }
            _ => {
                if self.client != Some(component) {
                    self.record_audit(AuditStage::ClientChanged, Vec::new());
                }
                self.client = Some(component);
                if let Some(surface) = self.surface.as_mut() {
                    surface.bind_client(component);
                }
            }
        }

        if self.pending_client_notify {
            self.pending_client_notify = false;
            if let Some(id) = self.active_engine() {
                if self.notify_subscribers.contains(&id) {
                    self.flush_notification(id, component);
                }
            }
        }
    }

    /// Activate the active engine: the engine call itself, native-IME
    /// mutual exclusion, the last-active record, and the client
    /// request-capability pre-warm.
    fn activate_engine(&mut self) {
        let Some((_, engine)) = self.active_engine.clone() else {
            return;
        };
        engine.borrow_mut().activate();

        let managed = !engine.borrow().is_native_adapter();
        if managed {
            if let Some(native) = self.native_ime.as_mut() {
                native.disable();
            }
        }

        self.activation.record(
            self.id,
            ActiveWindows::new(Some(engine.clone()), self.surface.clone()),
        );

        if let Some(client) = self.client {
            // Pre-warm only; the capability is re-resolved on use.
            let _ = self.host.borrow_mut().client_requests(client);
        }

        self.record_metric(|m| m.record_activation());
        self.record_audit(
            AuditStage::EngineActivated,
            vec![("engine".into(), json!(engine.borrow().name()))],
        );
    }

    /// Replace the active engine with `candidate` for `locale`.
    fn switch_to(
        &mut self,
        locale: &str,
        candidate: Option<(DescriptorId, SharedEngine)>,
    ) -> bool {
        let Some((id, engine)) = candidate else {
            return false;
        };

        let previous = self.active_engine.take();
        // The composition flag carries across the switch; capture it before
        // teardown flushes anything.
        let carry_composition = previous
            .as_ref()
            .map(|(_, prev)| prev.borrow().composition_enabled().unwrap_or(true))
            .unwrap_or(true);
        if let Some(prev) = previous.as_ref() {
            self.teardown_engine(prev);
        }

        // Whoever owns focus at switch time becomes the client.
        self.client = self.host.borrow().focused_component();
        if let Some(client) = self.client {
            let _ = self.host.borrow_mut().client_requests(client);
            if let Some(surface) = self.surface.as_mut() {
                surface.bind_client(client);
            }
        }

        {
            let mut guard = engine.borrow_mut();
            guard.set_locale(locale);
            guard.set_character_subsets(None);
        }
        self.active_engine = Some((id, engine.clone()));
        self.activate_engine();
        // An engine without toggle support keeps its own default.
        let _ = engine.borrow_mut().set_composition_enabled(carry_composition);

        self.locale_memory
            .insert(locale.to_string(), (id, engine.clone()));

        self.record_metric(|m| m.record_switch());
        self.record_audit(
            AuditStage::EngineSwitched,
            vec![
                ("locale".into(), json!(locale)),
                ("engine".into(), json!(engine.borrow().name())),
            ],
        );
        self.log(
            LogLevel::Info,
            "engine_switched",
            [
                json_kv("locale", json!(locale)),
                json_kv("engine", json!(engine.borrow().name())),
            ],
        );
        true
    }

    /// Ordered teardown: flush composition, deactivate, hide windows.
    fn teardown_engine(&mut self, entry: &(DescriptorId, SharedEngine)) {
        let (id, engine) = entry;
        // An `Unsupported` probe counts as "maybe composing": provisional
        // text is never silently discarded, so the flush still runs.
        let composing = engine.borrow().composition_enabled().unwrap_or(true);
        if composing {
            let mut ctx = EngineContext::new(self.client);
            engine.borrow_mut().end_composition(&mut ctx);
            self.apply_engine_outcome(*id, ctx.into_outcome());
            self.record_audit(AuditStage::CompositionEnded, Vec::new());
        }
        engine.borrow_mut().deactivate(true);
        engine.borrow_mut().hide_windows();
        self.record_audit(AuditStage::EngineWindowsHidden, Vec::new());
    }

    /// Flush composition on the active engine and route whatever it emits.
    fn end_active_composition(&mut self) {
        let Some((id, engine)) = self.active_engine.clone() else {
            return;
        };
        let mut ctx = EngineContext::new(self.client);
        engine.borrow_mut().end_composition(&mut ctx);
        self.apply_engine_outcome(id, ctx.into_outcome());
        self.record_audit(AuditStage::CompositionEnded, Vec::new());
    }

    fn forward_to_engine(&mut self, event: &InputEvent) -> EventFlow {
        let Some((id, engine)) = self.active_engine.clone() else {
            return EventFlow::Continue;
        };
        let mut ctx = EngineContext::new(self.client);
        let flow = engine.borrow_mut().handle_event(&mut ctx, event);
        self.apply_engine_outcome(id, ctx.into_outcome());
        flow
    }

    fn apply_engine_outcome(&mut self, engine: DescriptorId, outcome: EngineOutcome) {
        for window in outcome.declared_windows {
            self.owned_windows.insert(window);
        }
        for update in outcome.emissions {
            self.route_update(update);
        }
        if let Some(enabled) = outcome.notify {
            self.enable_client_notify(engine, enabled);
        }
    }

    /// Route an engine emission to the client or the surface delegate.
    fn route_update(&mut self, update: CompositionUpdate) {
        let native = match self.client {
            Some(client) => self.host.borrow_mut().client_requests(client),
            None => None,
        };

        if native.is_some() && self.config.input_style != InputStyle::BelowTheSpot {
            if let Some(client) = self.client {
                self.host.borrow_mut().deliver_composition(client, &update);
            }
            return;
        }

        let mut surface = self.ensure_surface();
        let committed = surface.apply(&update);
        if update.is_fully_committed() {
            surface.hide();
        } else {
            surface.show();
        }
        self.record_metric(|m| m.record_surface_update());

        // Committed text still belongs in the client's document even when
        // the surface rendered the composition.
        if let Some(text) = committed {
            if let Some(client) = self.client {
                let relay = CompositionUpdate::commit(text);
                self.host.borrow_mut().deliver_composition(client, &relay);
            }
        }
    }

    fn flush_notification(&mut self, engine: DescriptorId, component: ComponentId) {
        let bounds = {
            let host = self.host.borrow();
            host.owning_window(component)
                .and_then(|w| host.window_bounds(w))
        };
        if let Some(instance) = self.registry.instance(engine) {
            instance.borrow_mut().notify_client_window_change(bounds);
            self.record_metric(|m| m.record_notification());
            self.record_audit(AuditStage::NotificationFlushed, Vec::new());
        }
    }

    /// The surface, created on first need and bound to the current client.
    fn ensure_surface(&mut self) -> CompositionSurface {
        if let Some(surface) = &self.surface {
            return surface.clone();
        }
        let mut surface = CompositionSurface::create(self.host.clone());
        self.owned_windows.insert(surface.window());
        if let Some(client) = self.client {
            surface.bind_client(client);
        }
        self.surface = Some(surface.clone());
        // Keep the exclusivity entry aware of the new window.
        if self.activation.last_active() == Some(self.id) {
            self.activation.record(
                self.id,
                ActiveWindows::new(
                    self.active_engine.as_ref().map(|(_, e)| e.clone()),
                    self.surface.clone(),
                ),
            );
        }
        surface
    }

    fn is_owned(&self, component: ComponentId) -> bool {
        self.host
            .borrow()
            .owning_window(component)
            .map(|w| self.owned_windows.contains(&w))
            .unwrap_or(false)
    }

    fn record_metric<F>(&self, record: F)
    where
        F: FnOnce(&mut CoordinatorMetrics),
    {
        if let Some(metrics) = self.config.metrics.as_ref() {
            record(&mut metrics.borrow_mut());
        }
    }

    fn record_audit(&self, stage: AuditStage, details: Vec<(String, Value)>) {
        let mut builder = AuditEventBuilder::new(stage);
        for (key, value) in details {
            builder.detail(key, value);
        }
        self.config.audit.record(builder.finish());
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, "switchboard::coordinator", message, fields);
            let _ = logger.log_event(event);
        }
    }
}
