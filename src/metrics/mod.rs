use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Saturating counters for the coordinator's observable transitions.
#[derive(Debug, Default, Clone)]
pub struct CoordinatorMetrics {
    events: u64,
    activations: u64,
    engine_switches: u64,
    deferred_handoffs: u64,
    notifications: u64,
    surface_updates: u64,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self) {
        self.events = self.events.saturating_add(1);
    }

    pub fn record_activation(&mut self) {
        self.activations = self.activations.saturating_add(1);
    }

    pub fn record_switch(&mut self) {
        self.engine_switches = self.engine_switches.saturating_add(1);
    }

    pub fn record_deferral(&mut self) {
        self.deferred_handoffs = self.deferred_handoffs.saturating_add(1);
    }

    pub fn record_notification(&mut self) {
        self.notifications = self.notifications.saturating_add(1);
    }

    pub fn record_surface_update(&mut self) {
        self.surface_updates = self.surface_updates.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            events: self.events,
            activations: self.activations,
            engine_switches: self.engine_switches,
            deferred_handoffs: self.deferred_handoffs,
            notifications: self.notifications,
            surface_updates: self.surface_updates,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub events: u64,
    pub activations: u64,
    pub engine_switches: u64,
    pub deferred_handoffs: u64,
    pub notifications: u64,
    pub surface_updates: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        let mut fields = LogFields::new();
        fields.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        fields.insert("events".to_string(), json!(self.events));
        fields.insert("activations".to_string(), json!(self.activations));
        fields.insert("engine_switches".to_string(), json!(self.engine_switches));
        fields.insert(
            "deferred_handoffs".to_string(),
            json!(self.deferred_handoffs),
        );
        fields.insert("notifications".to_string(), json!(self.notifications));
        fields.insert("surface_updates".to_string(), json!(self.surface_updates));
        LogEvent::with_fields(LogLevel::Info, target, "coordinator_metrics", fields)
    }
}
