//! Blendshape mapper: face-tracking signals → discrete head pose.
//!
//! Pure and total. Unknown signal names are ignored, missing ones read as 0.0.
//! Weights and thresholds are `f64`, so averages that land exactly on a
//! threshold stay on the lower tier. Non-finite or out-of-range weights
//! saturate to the nearest valid pose.
//!
//! - Mouth: `1 + floor(jawOpen * 4)`.
//! - Eyelid: average of both blinks; `> 0.7` closed, `> 0.3` squint, else normal.
//! - Eye: start at the center of a 5×5 grid (row 3, col 3). Look-up, then
//!   look-down, adjust the row; look-out, then look-in, adjust the column.
//!   Later rules overwrite earlier ones. The cell becomes
//!   `(row-1)*5 + (col-1) + 1`, clamped to 1..=21. The neutral cell (3, 3)
//!   therefore encodes as 13, not the power-on id 11.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::actuator::HeadState;
use crate::codec::{eye_grid_id, AxisKind, EyelidState, GAZE_GRID};

pub const JAW_OPEN: &str = "jawOpen";
pub const EYE_BLINK_LEFT: &str = "eyeBlinkLeft";
pub const EYE_BLINK_RIGHT: &str = "eyeBlinkRight";
pub const EYE_LOOK_UP_LEFT: &str = "eyeLookUpLeft";
pub const EYE_LOOK_DOWN_LEFT: &str = "eyeLookDownLeft";
pub const EYE_LOOK_OUT_LEFT: &str = "eyeLookOutLeft";
pub const EYE_LOOK_IN_LEFT: &str = "eyeLookInLeft";

/// Sparse map of blendshape name → weight in [0, 1].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlendshapeInput(HashMap<String, f64>);

impl BlendshapeInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of a signal, 0.0 when absent.
    #[inline]
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn with(mut self, name: impl Into<String>, weight: f64) -> Self {
        self.0.insert(name.into(), weight);
        self
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for BlendshapeInput {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// How gaze weights are quantised into grid steps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeRounding {
    /// Round to nearest, half away from zero.
    #[default]
    Round,
    /// Drop the fractional part.
    Truncate,
}

impl GazeRounding {
    /// Whole grid steps for `x`, bounded to the grid size.
    #[inline]
    fn apply(self, x: f64) -> i64 {
        let steps = match self {
            GazeRounding::Round => x.round(),
            GazeRounding::Truncate => x.trunc(),
        };
        // NaN casts to 0 steps.
        steps.clamp(-(GAZE_GRID as f64), GAZE_GRID as f64) as i64
    }
}

/// Mapper thresholds and gains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Average blink strictly above this closes the eyelid.
    pub blink_closed_above: f64,
    /// Average blink strictly above this squints.
    pub blink_squint_above: f64,
    /// A gaze weight must be strictly above this to move the eye.
    pub gaze_threshold: f64,
    /// Grid steps per unit of gaze weight.
    pub gaze_gain: f64,
    pub gaze_rounding: GazeRounding,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            blink_closed_above: 0.7,
            blink_squint_above: 0.3,
            gaze_threshold: 0.3,
            gaze_gain: 2.0,
            gaze_rounding: GazeRounding::Round,
        }
    }
}

/// Map with the default thresholds.
pub fn map(input: &BlendshapeInput) -> HeadState {
    map_with(input, &MapperConfig::default())
}

pub fn map_with(input: &BlendshapeInput, cfg: &MapperConfig) -> HeadState {
    HeadState {
        mouth: mouth_level(input.get(JAW_OPEN)),
        eye_pos: eye_position(input, cfg),
        eyelid: eyelid_state(input, cfg),
    }
}

fn mouth_level(jaw_open: f64) -> u8 {
    let max_steps = AxisKind::Mouth.max() as f64;
    // NaN casts to 0 and lands on the closed level.
    let steps = (jaw_open * 4.0).floor().clamp(-1.0, max_steps) as i64;
    AxisKind::Mouth.clamp(1 + steps)
}

fn eyelid_state(input: &BlendshapeInput, cfg: &MapperConfig) -> u8 {
    let avg = (input.get(EYE_BLINK_LEFT) + input.get(EYE_BLINK_RIGHT)) / 2.0;
    let state = if avg > cfg.blink_closed_above {
        EyelidState::Closed
    } else if avg > cfg.blink_squint_above {
        EyelidState::Squint
    } else {
        EyelidState::Normal
    };
    state as u8
}

fn eye_position(input: &BlendshapeInput, cfg: &MapperConfig) -> u8 {
    let center = GAZE_GRID / 2 + 1;
    let steps = |w: f64| cfg.gaze_rounding.apply(w * cfg.gaze_gain);
    let active = |w: f64| w > cfg.gaze_threshold;

    let (up, down) = (input.get(EYE_LOOK_UP_LEFT), input.get(EYE_LOOK_DOWN_LEFT));
    let (out, inward) = (input.get(EYE_LOOK_OUT_LEFT), input.get(EYE_LOOK_IN_LEFT));

    let mut row = center;
    let mut col = center;
    if active(up) {
        row = (center - steps(up)).max(1);
    }
    if active(down) {
        row = (center + steps(down)).min(GAZE_GRID);
    }
    if active(out) {
        col = (center - steps(out)).max(1);
    }
    if active(inward) {
        col = (center + steps(inward)).min(GAZE_GRID);
    }
    eye_grid_id(row, col)
}

/// Mapper bound to one configuration, for call sites that map a stream.
#[derive(Clone, Debug, Default)]
pub struct BlendshapeMapper {
    cfg: MapperConfig,
}

impl BlendshapeMapper {
    pub fn new(cfg: MapperConfig) -> Self {
        Self { cfg }
    }

    #[inline]
    pub fn config(&self) -> &MapperConfig {
        &self.cfg
    }

    #[inline]
    pub fn map(&self, input: &BlendshapeInput) -> HeadState {
        map_with(input, &self.cfg)
    }
}
