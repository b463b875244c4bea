//! Error types for fanout-audio.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`AudioError`]): reject a configuration or device at
//!   open time, before any audio flows
//! - **Recoverable errors** ([`SinkError`]): per-sink failures absorbed by the
//!   engine so one dark sink cannot stop audio to the others

/// Fatal errors returned from device and stream construction.
///
/// These are rejected synchronously at configuration time. Runtime issues
/// (a sink refusing to open, a failed write) are handled per sink via
/// [`SinkError`] and never propagate past the engine.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The requested sample format is not supported by this device.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// The requested sample rate is outside the supported range.
    #[error("sample rate {requested}Hz not supported (supported: {min}..={max}Hz)")]
    UnsupportedSampleRate {
        /// The requested sample rate.
        requested: u32,
        /// Lowest supported rate.
        min: u32,
        /// Highest supported rate.
        max: u32,
    },

    /// The requested channel count is not supported.
    #[error("unsupported channel count: {requested} (only {supported} supported)")]
    UnsupportedChannelCount {
        /// The requested channel count.
        requested: u16,
        /// The channel count this device supports.
        supported: u16,
    },

    /// No sink drivers were registered before opening the device.
    #[error("no sinks registered - add at least one sink driver")]
    NoSinksRegistered,

    /// A period/threshold combination that cannot work.
    #[error("invalid period configuration: {reason}")]
    InvalidPeriodConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
}

/// Errors produced by a [`SinkDriver`](crate::sink::SinkDriver) or
/// [`SinkHandle`](crate::sink::SinkHandle) implementation.
///
/// Sink errors are recoverable: the engine logs them, emits a
/// [`StreamEvent`](crate::StreamEvent), and keeps feeding the remaining
/// sinks. A failed sink stays unavailable until the next reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink device could not be opened.
    #[error("open failed: {reason}")]
    OpenFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// A write to the sink device failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The hardware play pointer could not be queried.
    #[error("play pointer unavailable: {reason}")]
    PointerUnavailable {
        /// Description of what went wrong.
        reason: String,
    },

    /// The sink does not implement the requested capability.
    #[error("operation not supported by this sink")]
    Unsupported,

    /// Custom error for user-implemented drivers.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates an open-failed error with the given reason.
    pub fn open_failed(reason: impl Into<String>) -> Self {
        Self::OpenFailed {
            reason: reason.into(),
        }
    }

    /// Creates a write-failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a pointer-unavailable error with the given reason.
    pub fn pointer_unavailable(reason: impl Into<String>) -> Self {
        Self::PointerUnavailable {
            reason: reason.into(),
        }
    }
}

/// Errors from the configuration-flag store.
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    /// A flag could not be registered with the store.
    ///
    /// Fatal to the enablement monitor thread only; the rest of the process
    /// continues with every sink defaulting to enabled.
    #[error("failed to register flag '{name}': {reason}")]
    RegistrationFailed {
        /// Name of the flag.
        name: String,
        /// Why registration failed.
        reason: String,
    },
}
