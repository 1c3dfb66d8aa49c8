//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`LuftujError`]
//! via `#[from]`. Transient transport failures ([`ConnectionError`],
//! [`ProtocolError`]) are expected to be logged and swallowed by periodic
//! loops; [`ConfigurationError`] and [`ValidationError`] go back to the
//! immediate caller.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum LuftujError {
    #[error("connection error")]
    Connection(#[from] ConnectionError),

    #[error("protocol error")]
    Protocol(#[from] ProtocolError),

    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    #[error("script error")]
    Script(#[from] ScriptError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] BoxError),
}

impl LuftujError {
    /// Whether the failure is a transient transport problem that the next
    /// cycle may recover from.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_))
    }
}

/// Transport-level failure talking to the HRU or the broker.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("failed to connect to {endpoint}")]
    Connect {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("connection attempt to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("connection to {endpoint} lost")]
    Transport {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("not connected")]
    NotConnected,
}

/// The device answered, but not with something usable.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("device rejected {function} at address {address}: {code}")]
    Exception {
        function: &'static str,
        address: u16,
        code: String,
    },

    #[error("expected {expected} registers at address {address}, got {actual}")]
    ShortResponse {
        address: u16,
        expected: usize,
        actual: usize,
    },
}

/// Something the device definition or the stored configuration does not
/// support.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{field} is read-only on this unit")]
    UnsupportedWrite { field: &'static str },

    #[error("unknown mode `{0}`")]
    UnknownMode(String),

    #[error("unknown unit definition `{0}`")]
    UnknownUnit(String),

    #[error("no HRU unit configured")]
    MissingUnit,
}

/// Failures raised while evaluating a command script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("{function} expects at least {expected} arguments, got {actual}")]
    MissingArgument {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{function}: value {value} does not fit a 16-bit register")]
    ValueOutOfRange { function: &'static str, value: f64 },

    #[error("invalid script document")]
    Parse(#[source] serde_json::Error),
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("unknown valve `{0}`")]
    UnknownValve(String),

    #[error("aperture {0} is outside 0..=100")]
    ApertureOutOfRange(f64),

    #[error("start time {0} is outside 0..=1439")]
    StartTimeOutOfRange(u16),

    #[error("day of week {0} is outside 0..=6")]
    DayOutOfRange(u8),

    #[error("priority {0} is outside 0..=100")]
    PriorityOutOfRange(u8),

    #[error("boost duration must be between 1 and 1440 minutes, got {0}")]
    BoostDurationOutOfRange(u32),

    #[error("value {0} does not fit a 16-bit register")]
    RegisterValueOutOfRange(f64),
}

/// A lookup by identifier returned nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
