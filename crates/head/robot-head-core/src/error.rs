//! Error types for the robot head core.
//!
//! The actuator and playback paths never fail: out-of-range values are
//! clamped. Errors only exist at the parsing and I/O boundaries.

use std::path::PathBuf;

/// Failure to parse a wire command back into an axis value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown command prefix in {command:?}")]
    UnknownPrefix { command: String },

    #[error("command {command:?} is missing the '!' terminator")]
    MissingTerminator { command: String },

    #[error("command {command:?} carries a non-integer payload")]
    InvalidPayload { command: String },

    #[error("value {value} is out of range [{min}, {max}] for {axis}")]
    OutOfRange {
        axis: &'static str,
        value: i64,
        min: u8,
        max: u8,
    },
}

/// Failure reported by a transport.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("transport '{label}' is closed")]
    Closed { label: String },

    #[error("transport '{label}' I/O error: {source}")]
    Io {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to load an expression sequence from an external producer.
#[derive(thiserror::Error, Debug)]
pub enum SequenceError {
    #[error("failed to read sequence {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sequence JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sequence CSV parse error at line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported sequence format for {path}")]
    UnknownFormat { path: PathBuf },
}

/// Failure to load the head configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Aggregate error for consumers that touch several boundaries.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum HeadError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HeadError {
    /// Error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Codec(_) => "codec",
            Self::Transport(_) => "transport",
            Self::Sequence(_) => "sequence",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_source() {
        let err: HeadError = TransportError::Closed {
            label: "mock".into(),
        }
        .into();
        assert_eq!(err.category(), "transport");
        assert_eq!(err.to_string(), "transport 'mock' is closed");

        let err: HeadError = CodecError::UnknownPrefix {
            command: "?x".into(),
        }
        .into();
        assert_eq!(err.category(), "codec");
    }

    #[test]
    fn out_of_range_message_names_axis() {
        let err = CodecError::OutOfRange {
            axis: "mouth",
            value: 9,
            min: 1,
            max: 5,
        };
        assert_eq!(err.to_string(), "value 9 is out of range [1, 5] for mouth");
    }
}
