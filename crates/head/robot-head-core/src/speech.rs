//! Voice-interaction routines expressed as expression sequences.
//!
//! A conversation turn shows three phases on the head: listening (eyes
//! forward, lids relaxed), thinking (gaze up, squint) and speaking (one mouth
//! open/close pair per word, bracketed by the speech markers).
//!
//! Each phase only changes some axes: listening and thinking move the eye
//! and eyelid, speaking re-centres them once and then moves the mouth.
//! Frames are still complete poses, so the untouched axes are restated.
//! Within [`VoiceRoutine::interaction`] those restated values equal what is
//! already on the head; only the listening frame's closed mouth can differ
//! from the pose before the turn.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{AxisKind, EyelidState, MouthLevel, EYE_CENTER};
use crate::sequence::{Cue, ExpressionFrame, ExpressionSequence};

/// Eye position used while thinking: top row, center column.
pub const THINKING_EYE: u8 = 3;

/// Timings for the speaking animation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechTiming {
    /// Hold per open-mouth frame.
    #[serde(with = "millis")]
    pub open: Duration,
    /// Hold per closed-mouth frame between words.
    #[serde(with = "millis")]
    pub close: Duration,
    /// Hold for the listening and thinking poses.
    #[serde(with = "millis")]
    pub phase: Duration,
}

impl Default for SpeechTiming {
    fn default() -> Self {
        Self {
            open: Duration::from_millis(150),
            close: Duration::from_millis(100),
            phase: Duration::from_millis(500),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Builds listening / thinking / speaking sequences.
#[derive(Clone, Debug, Default)]
pub struct VoiceRoutine {
    timing: SpeechTiming,
}

impl VoiceRoutine {
    pub fn new(timing: SpeechTiming) -> Self {
        Self { timing }
    }

    #[inline]
    pub fn timing(&self) -> &SpeechTiming {
        &self.timing
    }

    pub fn listening(&self) -> ExpressionFrame {
        ExpressionFrame::new(
            "listening",
            MouthLevel::Closed as i64,
            EYE_CENTER as i64,
            EyelidState::Normal as i64,
            self.timing.phase,
        )
    }

    pub fn thinking(&self) -> ExpressionFrame {
        ExpressionFrame::new(
            "thinking",
            MouthLevel::Closed as i64,
            THINKING_EYE as i64,
            EyelidState::Squint as i64,
            self.timing.phase,
        )
    }

    /// Mouth animation for `text`. Empty when the text has no words.
    ///
    /// The first frame carries the speech-start marker, and a trailing
    /// closed-mouth frame carries the stop marker.
    pub fn speaking(&self, text: &str) -> ExpressionSequence {
        let mut seq = ExpressionSequence::default();
        for word in text.split_whitespace() {
            let open = ExpressionFrame::new(
                word,
                mouth_for_word(word),
                EYE_CENTER as i64,
                EyelidState::Normal as i64,
                self.timing.open,
            );
            let open = if seq.is_empty() {
                open.with_cue(Cue::SpeechStart)
            } else {
                open
            };
            seq.push(open);
            seq.push(self.rest("", self.timing.close));
        }
        if !seq.is_empty() {
            seq.push(self.rest("done", Duration::ZERO).with_cue(Cue::Stop));
        }
        seq
    }

    /// Full turn: listening, thinking, then speaking `reply`.
    pub fn interaction(&self, reply: &str) -> ExpressionSequence {
        let mut seq = ExpressionSequence::new(vec![self.listening(), self.thinking()]);
        for frame in &self.speaking(reply) {
            seq.push(frame.clone());
        }
        seq
    }

    fn rest(&self, label: &str, delay: Duration) -> ExpressionFrame {
        ExpressionFrame::new(
            label,
            MouthLevel::Closed as i64,
            EYE_CENTER as i64,
            EyelidState::Normal as i64,
            delay,
        )
    }
}

/// Longer words open the mouth wider: `min(5, 2 + chars / 3)`.
pub fn mouth_for_word(word: &str) -> i64 {
    let chars = word.chars().count() as i64;
    (2 + chars / 3).min(AxisKind::Mouth.max() as i64)
}
