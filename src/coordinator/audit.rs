//! Coordinator lifecycle audit hooks.
//!
//! Lightweight instrumentation so callers can observe the major state
//! transitions without contorting the core dispatch path. Records carry a
//! stage identifier plus structured metadata; sinks can log, buffer, or
//! assert on them.

use std::time::SystemTime;

use serde_json::Value;

/// Distinct lifecycle checkpoints emitted by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStage {
    /// A new coordinator was constructed and registered.
    CoordinatorConstructed,
    /// The active engine was activated on focus gain or switch.
    EngineActivated,
    /// The active engine was deactivated on focus loss or teardown.
    EngineDeactivated,
    /// Pending composition was flushed.
    CompositionEnded,
    /// An engine's windows were hidden during teardown.
    EngineWindowsHidden,
    /// A different engine became active.
    EngineSwitched,
    /// A focus change was parked behind live composition.
    HandoffDeferred,
    /// A parked focus change completed.
    HandoffCompleted,
    /// The current client changed without deferral.
    ClientChanged,
    /// A client-window-bounds notification reached an engine.
    NotificationFlushed,
    /// The coordinator was disposed.
    CoordinatorDisposed,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub timestamp: SystemTime,
    pub stage: AuditStage,
    pub details: Vec<(String, Value)>,
}

impl AuditEvent {
    fn new(stage: AuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }
}

/// Builder helper to append fields ergonomically.
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(stage: AuditStage) -> Self {
        Self {
            event: AuditEvent::new(stage),
        }
    }

    pub fn detail(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> AuditEvent {
        self.event
    }
}

/// Trait implemented by any audit sink.
pub trait CoordinatorAudit {
    fn record(&self, event: AuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullCoordinatorAudit;

impl CoordinatorAudit for NullCoordinatorAudit {
    fn record(&self, _event: AuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_details() {
        let mut builder = AuditEventBuilder::new(AuditStage::EngineSwitched);
        builder.detail("locale", json!("ja"));
        builder.detail("engine", json!("kana"));
        let event = builder.finish();
        assert_eq!(event.stage, AuditStage::EngineSwitched);
        assert_eq!(event.details.len(), 2);
        assert_eq!(event.details[0].0, "locale");
    }
}
