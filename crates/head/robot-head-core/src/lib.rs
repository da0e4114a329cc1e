//! robot-head-core
//!
//! Translates face-tracking blendshapes and recorded/predicted expression
//! sequences into the text command protocol of a three-axis robot head
//! (mouth aperture, eye gaze, eyelid), and plays timed sequences back
//! through an owned transport.
//!
//! Data flow: [`mapper`] or a [`sequence`] source → [`actuator::ActuatorState`]
//! (clamps + tracks) → [`codec`] (encodes) → [`transport::Transport`].

pub mod actuator;
pub mod codec;
pub mod config;
pub mod error;
pub mod mapper;
pub mod player;
pub mod sequence;
pub mod speech;
pub mod transport;

// Re-exports for consumers (CLI, host integrations)
pub use actuator::{ActuatorState, HeadState};
pub use codec::{decode, encode, AxisKind, Command, EyelidState, MouthLevel, EYE_CENTER};
pub use config::{HeadConfig, PlaybackConfig, TransportConfig};
pub use error::{CodecError, ConfigError, HeadError, SequenceError, TransportError};
pub use mapper::{map, map_with, BlendshapeInput, BlendshapeMapper, GazeRounding, MapperConfig};
pub use player::{PlaybackReport, PlaybackState, SequencePlayer, StopHandle, StopSignal};
pub use sequence::{Cue, ExpressionFrame, ExpressionSequence};
pub use speech::{SpeechTiming, VoiceRoutine};
pub use transport::{
    open_transport, LoggingTransport, RecordingTransport, SerialTransport, Transport,
};

/// Crate result type.
pub type Result<T> = core::result::Result<T, HeadError>;
