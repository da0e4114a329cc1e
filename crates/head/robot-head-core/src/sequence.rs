//! Expression frames and the files external producers hand us.
//!
//! Two producer formats are accepted:
//!
//! - Prediction JSON: an array of `{char, mouth, eye, lid, duration?, note?}`
//!   rows, `duration` in milliseconds.
//! - Expression CSV: header `char,mouth,eye,lid` plus an optional
//!   `duration` column (milliseconds). Unknown columns are ignored.
//!
//! Axis values may be written as integers or floats (`3` or `3.0`);
//! floats are truncated toward zero. They are not range-checked here; the
//! actuator clamps them.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actuator::HeadState;
use crate::error::SequenceError;
use crate::mapper::{map_with, BlendshapeInput, MapperConfig};

/// Stateless marker written before a frame's axis commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    SpeechStart,
    Stop,
}

/// One timed pose in a playback sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionFrame {
    /// Display label (the character being voiced, for model output).
    pub label: String,
    pub mouth: i64,
    pub eye: i64,
    pub lid: i64,
    /// Pause after this frame is applied.
    pub delay: Duration,
    pub cue: Option<Cue>,
}

impl ExpressionFrame {
    pub fn new(label: impl Into<String>, mouth: i64, eye: i64, lid: i64, delay: Duration) -> Self {
        Self {
            label: label.into(),
            mouth,
            eye,
            lid,
            delay,
            cue: None,
        }
    }

    pub fn from_pose(label: impl Into<String>, pose: HeadState, delay: Duration) -> Self {
        Self::new(
            label,
            pose.mouth as i64,
            pose.eye_pos as i64,
            pose.eyelid as i64,
            delay,
        )
    }

    pub fn with_cue(mut self, cue: Cue) -> Self {
        self.cue = Some(cue);
        self
    }

    /// The pose this frame commands, after clamping.
    #[inline]
    pub fn pose(&self) -> HeadState {
        HeadState::clamped(self.mouth, self.eye, self.lid)
    }
}

/// An ordered, finite list of frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionSequence {
    pub frames: Vec<ExpressionFrame>,
}

impl ExpressionSequence {
    pub fn new(frames: Vec<ExpressionFrame>) -> Self {
        Self { frames }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExpressionFrame> {
        self.frames.iter()
    }

    pub fn push(&mut self, frame: ExpressionFrame) {
        self.frames.push(frame);
    }

    /// Sum of all frame delays.
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }

    /// Build a sequence from sampled blendshapes, one frame per sample.
    pub fn from_blendshapes<'a, I>(samples: I, cfg: &MapperConfig, delay: Duration) -> Self
    where
        I: IntoIterator<Item = &'a BlendshapeInput>,
    {
        let frames = samples
            .into_iter()
            .enumerate()
            .map(|(i, input)| ExpressionFrame::from_pose(i.to_string(), map_with(input, cfg), delay))
            .collect();
        Self { frames }
    }
}

impl<'a> IntoIterator for &'a ExpressionSequence {
    type Item = &'a ExpressionFrame;
    type IntoIter = std::slice::Iter<'a, ExpressionFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl FromIterator<ExpressionFrame> for ExpressionSequence {
    fn from_iter<I: IntoIterator<Item = ExpressionFrame>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Parse the model-prediction JSON contract.
pub fn parse_prediction_json(
    s: &str,
    default_delay: Duration,
) -> Result<ExpressionSequence, SequenceError> {
    let rows: Vec<SequenceRow> = serde_json::from_str(s)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_frame(default_delay))
        .collect())
}

/// Parse an expression CSV from any reader.
pub fn load_sequence_csv<R: Read>(
    reader: R,
    default_delay: Duration,
) -> Result<ExpressionSequence, SequenceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut frames = Vec::new();
    for (line_num, result) in csv_reader.deserialize().enumerate() {
        let row: SequenceRow = result.map_err(|source| SequenceError::Csv {
            line: line_num + 2,
            source,
        })?;
        frames.push(row.into_frame(default_delay));
    }
    Ok(ExpressionSequence::new(frames))
}

pub fn parse_prediction_json_file(
    path: impl AsRef<Path>,
    default_delay: Duration,
) -> Result<ExpressionSequence, SequenceError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SequenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_prediction_json(&text, default_delay)
}

pub fn load_sequence_csv_file(
    path: impl AsRef<Path>,
    default_delay: Duration,
) -> Result<ExpressionSequence, SequenceError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SequenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_sequence_csv(file, default_delay)
}

/// Load a sequence file, choosing the parser from its extension.
pub fn load_sequence_file(
    path: impl AsRef<Path>,
    default_delay: Duration,
) -> Result<ExpressionSequence, SequenceError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => parse_prediction_json_file(path, default_delay),
        Some("csv") => load_sequence_csv_file(path, default_delay),
        _ => Err(SequenceError::UnknownFormat {
            path: path.to_path_buf(),
        }),
    }
}

// ----- producer row schema (serde) -----

#[derive(Debug, Deserialize)]
struct SequenceRow {
    #[serde(rename = "char", default)]
    label: String,
    #[serde(deserialize_with = "axis_value")]
    mouth: i64,
    #[serde(deserialize_with = "axis_value")]
    eye: i64,
    #[serde(deserialize_with = "axis_value")]
    lid: i64,
    /// milliseconds
    #[serde(default)]
    duration: Option<u64>,
}

/// Accepts any number and truncates it toward zero, saturating at the
/// `i64` bounds (NaN reads as 0).
fn axis_value<'de, D: serde::Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    f64::deserialize(d).map(|v| v.trunc() as i64)
}

impl SequenceRow {
    fn into_frame(self, default_delay: Duration) -> ExpressionFrame {
        let delay = self
            .duration
            .map(Duration::from_millis)
            .unwrap_or(default_delay);
        ExpressionFrame::new(self.label, self.mouth, self.eye, self.lid, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_millis(300);

    #[test]
    fn parses_prediction_rows_with_and_without_duration() {
        let seq = parse_prediction_json(
            r#"[
                {"char": "你", "mouth": 3, "eye": 11, "lid": 1, "duration": 250, "note": "Model Prediction"},
                {"char": "好", "mouth": 0, "eye": 30, "lid": 2}
            ]"#,
            DEFAULT,
        )
        .unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frames[0].label, "你");
        assert_eq!(seq.frames[0].delay, Duration::from_millis(250));
        assert_eq!(seq.frames[1].delay, DEFAULT);
        // Out-of-range values survive parsing and are clamped on use.
        assert_eq!(seq.frames[1].mouth, 0);
        assert_eq!(seq.frames[1].pose(), HeadState::clamped(1, 21, 2));
        assert_eq!(seq.total_duration(), Duration::from_millis(550));
    }

    #[test]
    fn rejects_rows_missing_axes() {
        let err = parse_prediction_json(r#"[{"char": "a", "mouth": 1}]"#, DEFAULT).unwrap_err();
        assert!(matches!(err, SequenceError::Json(_)));
    }

    #[test]
    fn parses_csv_with_optional_duration_and_extra_columns() {
        let csv = "char,mouth,eye,lid,emotion\n h ,2,11,1,neutral\ni,4,3,4,surprise\n";
        let seq = load_sequence_csv(csv.as_bytes(), DEFAULT).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frames[0].label, "h");
        assert_eq!(seq.frames[1].pose(), HeadState::clamped(4, 3, 4));
        assert!(seq.iter().all(|f| f.delay == DEFAULT));

        let timed = "char,mouth,eye,lid,duration\na,1,11,1,120\n";
        let seq = load_sequence_csv(timed.as_bytes(), DEFAULT).unwrap();
        assert_eq!(seq.frames[0].delay, Duration::from_millis(120));
    }

    #[test]
    fn float_axis_values_are_truncated() {
        let csv = "char,mouth,eye,lid\na,3.0,11.0,1.0\nb,4.9,2.5,-1.5\n";
        let seq = load_sequence_csv(csv.as_bytes(), DEFAULT).unwrap();
        assert_eq!((seq.frames[0].mouth, seq.frames[0].eye, seq.frames[0].lid), (3, 11, 1));
        assert_eq!((seq.frames[1].mouth, seq.frames[1].eye, seq.frames[1].lid), (4, 2, -1));

        let seq = parse_prediction_json(
            r#"[{"char": "a", "mouth": 2.0, "eye": 11, "lid": 1.0}]"#,
            DEFAULT,
        )
        .unwrap();
        assert_eq!(seq.frames[0].pose(), HeadState::clamped(2, 11, 1));
    }

    #[test]
    fn csv_errors_carry_line_numbers() {
        let csv = "char,mouth,eye,lid\na,1,11,1\nb,x,11,1\n";
        match load_sequence_csv(csv.as_bytes(), DEFAULT) {
            Err(SequenceError::Csv { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected csv error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_sequence_file("frames.yaml", DEFAULT).unwrap_err();
        assert!(matches!(err, SequenceError::UnknownFormat { .. }));
    }

    #[test]
    fn blendshape_stream_becomes_frames() {
        let samples = vec![
            BlendshapeInput::new().with("jawOpen", 1.0),
            BlendshapeInput::new().with("eyeBlinkLeft", 1.0).with("eyeBlinkRight", 1.0),
        ];
        let seq = ExpressionSequence::from_blendshapes(&samples, &MapperConfig::default(), DEFAULT);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.frames[0].mouth, 5);
        assert_eq!(seq.frames[1].lid, 3);
        assert_eq!(seq.frames[1].label, "1");
    }

    #[test]
    fn cue_is_opt_in() {
        let frame = ExpressionFrame::new("a", 1, 11, 1, DEFAULT);
        assert_eq!(frame.cue, None);
        assert_eq!(frame.with_cue(Cue::SpeechStart).cue, Some(Cue::SpeechStart));
    }
}
