//! Command codec: axis values ↔ wire commands.
//!
//! Wire format (ASCII, no newline, each command parseable on its own):
//!
//! | Axis         | Format        | Range |
//! |--------------|---------------|-------|
//! | Mouth        | `#DGM:<int>!` | 1–5   |
//! | Eye position | `$DGB:<int>!` | 1–21  |
//! | Eyelid       | `$DGL:<int>!` | 1–4   |
//!
//! Plus two stateless markers, `?speak_start` and `?stop`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Eye position id the head rests at, looking straight ahead.
pub const EYE_CENTER: u8 = 11;

/// Side length of the conceptual gaze grid (rows and columns, 1-based).
pub const GAZE_GRID: i64 = 5;

const SPEECH_START: &str = "?speak_start";
const STOP: &str = "?stop";

/// One of the three independently controlled actuators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Mouth,
    EyePosition,
    Eyelid,
}

impl AxisKind {
    /// Every axis, in the order frames are applied.
    pub const ALL: [AxisKind; 3] = [AxisKind::Mouth, AxisKind::EyePosition, AxisKind::Eyelid];

    #[inline]
    pub const fn min(self) -> u8 {
        1
    }

    #[inline]
    pub const fn max(self) -> u8 {
        match self {
            AxisKind::Mouth => 5,
            AxisKind::EyePosition => 21,
            AxisKind::Eyelid => 4,
        }
    }

    /// Value the head powers up with.
    #[inline]
    pub const fn initial(self) -> u8 {
        match self {
            AxisKind::Mouth => MouthLevel::Closed as u8,
            AxisKind::EyePosition => EYE_CENTER,
            AxisKind::Eyelid => EyelidState::Normal as u8,
        }
    }

    /// Saturating clamp into the axis' closed range.
    #[inline]
    pub fn clamp(self, value: i64) -> u8 {
        value.clamp(self.min() as i64, self.max() as i64) as u8
    }

    #[inline]
    pub fn contains(self, value: i64) -> bool {
        (self.min() as i64..=self.max() as i64).contains(&value)
    }

    /// Wire prefix, including the sigil.
    #[inline]
    pub const fn prefix(self) -> &'static str {
        match self {
            AxisKind::Mouth => "#DGM",
            AxisKind::EyePosition => "$DGB",
            AxisKind::Eyelid => "$DGL",
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            AxisKind::Mouth => "mouth",
            AxisKind::EyePosition => "eye_position",
            AxisKind::Eyelid => "eyelid",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.prefix() == prefix)
    }
}

impl fmt::Display for AxisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named mouth apertures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MouthLevel {
    Closed = 1,
    Slight = 2,
    Half = 3,
    Open = 4,
    Wide = 5,
}

/// Named eyelid states.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EyelidState {
    Normal = 1,
    Squint = 2,
    Closed = 3,
    Wide = 4,
}

/// An encoded wire command. Two commands are equal iff their text is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }

    /// Marker that brackets the start of a speaking animation.
    pub fn speech_start() -> Self {
        Command(SPEECH_START.to_string())
    }

    /// Generic stop marker.
    pub fn stop() -> Self {
        Command(STOP.to_string())
    }

    #[inline]
    pub fn is_marker(&self) -> bool {
        self.0 == SPEECH_START || self.0 == STOP
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode an axis value. Re-clamps, so encoding is total.
pub fn encode(axis: AxisKind, value: i64) -> Command {
    Command(format!("{}:{}!", axis.prefix(), axis.clamp(value)))
}

/// Parse an axis command back into `(axis, value)`.
///
/// Strict where [`encode`] is lenient: out-of-range payloads are rejected,
/// and markers are not axis commands.
pub fn decode(command: &str) -> Result<(AxisKind, u8), CodecError> {
    let body = command
        .strip_suffix('!')
        .ok_or_else(|| CodecError::MissingTerminator {
            command: command.to_string(),
        })?;
    let (prefix, payload) = body
        .split_once(':')
        .ok_or_else(|| CodecError::UnknownPrefix {
            command: command.to_string(),
        })?;
    let axis = AxisKind::from_prefix(prefix).ok_or_else(|| CodecError::UnknownPrefix {
        command: command.to_string(),
    })?;
    let value: i64 = payload.parse().map_err(|_| CodecError::InvalidPayload {
        command: command.to_string(),
    })?;
    if !axis.contains(value) {
        return Err(CodecError::OutOfRange {
            axis: axis.name(),
            value,
            min: axis.min(),
            max: axis.max(),
        });
    }
    Ok((axis, value as u8))
}

/// Eye position id for a 1-based (row, col) cell of the gaze grid, clamped to the eye range.
#[inline]
pub fn eye_grid_id(row: i64, col: i64) -> u8 {
    AxisKind::EyePosition.clamp((row - 1) * GAZE_GRID + (col - 1) + 1)
}

/// 1-based (row, col) cell of an eye position id.
#[inline]
pub fn eye_grid_cell(id: u8) -> (u8, u8) {
    let idx = AxisKind::EyePosition.clamp(id as i64) - 1;
    (idx / GAZE_GRID as u8 + 1, idx % GAZE_GRID as u8 + 1)
}
