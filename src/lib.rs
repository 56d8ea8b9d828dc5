//! Input-method coordination engine.
//!
//! `switchboard` arbitrates between a focused text client, a set of
//! pluggable input-method engines (one active at a time, selectable by
//! locale), and an auxiliary composition surface that renders provisional
//! text for clients that cannot. The host toolkit stays behind the
//! [`host::HostWindowing`] trait, so the coordinator can be embedded in any
//! single-threaded windowing layer and driven deterministically in tests.

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod surface;
pub mod width;

pub use coordinator::activation::{
    ActivationRegistry, ActiveWindows, CoordinatorId, SharedActivation,
};
pub use coordinator::audit::{
    AuditEvent, AuditEventBuilder, AuditStage, CoordinatorAudit, NullCoordinatorAudit,
};
pub use coordinator::menu::{HotkeyMenu, MenuAction, SelectionMenu};
pub use coordinator::{Coordinator, CoordinatorConfig, EngineContext, NativeIme};
pub use engine::{
    Capability, CharacterSubset, DescriptorId, EngineDescriptor, EngineFactory,
    InputMethodEngine, SharedEngine, Unsupported,
};
pub use error::{ImeError, Result};
pub use events::{CompositionUpdate, EventFlow, ImeEventKind, InputEvent, InputStyle};
pub use geometry::Rect;
pub use host::{
    ClientRequests, ComponentId, FocusTransfer, HostWindowing, ScriptedHost, SharedHost, WindowId,
};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{CoordinatorMetrics, MetricSnapshot};
pub use registry::EngineRegistry;
pub use surface::CompositionSurface;
pub use width::display_width;
