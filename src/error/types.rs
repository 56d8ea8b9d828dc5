use thiserror::Error;

/// Unified result type for the switchboard crate.
pub type Result<T> = std::result::Result<T, ImeError>;

/// Errors surfaced by engine selection and instantiation.
///
/// A locale with no matching engine is a `false` return from selection, not
/// an error; capability probes use [`crate::engine::Capability`] instead of
/// this enum.
#[derive(Debug, Error)]
pub enum ImeError {
    #[error("engine `{name}` failed to start: {reason}")]
    EngineStart { name: String, reason: String },
    #[error("engine descriptor {0} is not registered")]
    UnknownDescriptor(usize),
}
