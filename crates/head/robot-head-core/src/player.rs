//! Sequence player: drives an [`ActuatorState`] through a finite list of
//! frames, pausing between them to pace playback in real time.
//!
//! State machine: `Idle → Playing → Finished` (terminal). Each frame writes
//! its optional cue, then mouth, eye and eyelid, then sleeps for the frame's
//! delay. The sleep is a tokio timer, so it only suspends the playback task.
//!
//! On reaching `Finished` the actuator is closed exactly once, including for
//! an empty sequence, a stop request, or a dropped playback future.
//!
//! Cancellation aborts immediately: the remaining delay of the current frame
//! and every later frame are skipped.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::actuator::{ActuatorState, HeadState};
use crate::sequence::{Cue, ExpressionFrame, ExpressionSequence};
use crate::transport::Transport;

/// Playback state of a [`SequencePlayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Finished,
}

impl PlaybackState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Outcome of one `play` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub frames_played: usize,
    pub cancelled: bool,
    pub final_state: HeadState,
    pub elapsed: Duration,
}

/// Requests a stop of the playback holding the paired [`StopSignal`].
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of a stop request.
#[derive(Clone, Debug)]
pub struct StopSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl StopSignal {
    /// A connected handle/signal pair.
    pub fn pair() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (StopHandle { tx: Arc::new(tx) }, StopSignal { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_stopped(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once a stop has been requested. Never resolves if every
    /// handle was dropped without stopping.
    pub async fn stopped(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return pending().await;
            }
        }
    }
}

/// Plays expression sequences through an owned actuator session.
#[derive(Debug)]
pub struct SequencePlayer<T: Transport> {
    actuator: ActuatorState<T>,
    state: PlaybackState,
    frames_played: usize,
}

impl<T: Transport> SequencePlayer<T> {
    pub fn new(actuator: ActuatorState<T>) -> Self {
        Self {
            actuator,
            state: PlaybackState::Idle,
            frames_played: 0,
        }
    }

    pub fn from_transport(transport: T) -> Self {
        Self::new(ActuatorState::new(transport))
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Frames applied over the player's lifetime.
    #[inline]
    pub fn frames_played(&self) -> usize {
        self.frames_played
    }

    #[inline]
    pub fn actuator(&self) -> &ActuatorState<T> {
        &self.actuator
    }

    /// Play every frame, then close the actuator.
    pub async fn play(&mut self, sequence: &ExpressionSequence) -> PlaybackReport {
        self.play_until(sequence, StopSignal::never()).await
    }

    /// Play until the sequence ends or `stop` fires, then close the actuator.
    ///
    /// A finished player ignores further calls and reports zero frames.
    pub async fn play_until(
        &mut self,
        sequence: &ExpressionSequence,
        mut stop: StopSignal,
    ) -> PlaybackReport {
        let started = Instant::now();
        if self.state.is_terminal() {
            log::debug!("play requested on a finished player; ignoring");
            return self.report(0, false, started);
        }

        self.state = PlaybackState::Playing;
        log::info!(
            "playback started: {} frames, {:?} scheduled",
            sequence.len(),
            sequence.total_duration()
        );

        let guard = FinishGuard { player: &mut *self };
        let (played, cancelled) = guard.player.run(sequence, &mut stop).await;
        drop(guard);

        let report = self.report(played, cancelled, started);
        if cancelled {
            log::info!(
                "playback stopped after {}/{} frames",
                played,
                sequence.len()
            );
        } else {
            log::info!("playback finished in {:?}", report.elapsed);
        }
        report
    }

    async fn run(&mut self, sequence: &ExpressionSequence, stop: &mut StopSignal) -> (usize, bool) {
        let mut played = 0;
        for (idx, frame) in sequence.iter().enumerate() {
            if stop.is_stopped() {
                return (played, true);
            }
            self.apply(idx, frame);
            played += 1;

            if frame.delay.is_zero() {
                continue;
            }
            tokio::select! {
                biased;
                _ = stop.stopped() => return (played, true),
                _ = tokio::time::sleep(frame.delay) => {}
            }
        }
        (played, false)
    }

    fn apply(&mut self, idx: usize, frame: &ExpressionFrame) {
        log::debug!(
            "frame {idx} '{}': mouth={} eye={} lid={} hold={:?}",
            frame.label,
            frame.mouth,
            frame.eye,
            frame.lid,
            frame.delay
        );
        match frame.cue {
            Some(Cue::SpeechStart) => self.actuator.speak_start(),
            Some(Cue::Stop) => self.actuator.speak_stop(),
            None => {}
        }
        self.actuator.set_mouth(frame.mouth);
        self.actuator.set_eye_position(frame.eye);
        self.actuator.set_eyelid(frame.lid);
        self.frames_played += 1;
    }

    fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = PlaybackState::Finished;
        self.actuator.close();
    }

    fn report(&self, frames_played: usize, cancelled: bool, started: Instant) -> PlaybackReport {
        PlaybackReport {
            frames_played,
            cancelled,
            final_state: self.actuator.get_state(),
            elapsed: started.elapsed(),
        }
    }
}

/// Moves the player to `Finished` when playback leaves scope by any path,
/// including the playback future being dropped mid-sleep.
struct FinishGuard<'a, T: Transport> {
    player: &'a mut SequencePlayer<T>,
}

impl<T: Transport> Drop for FinishGuard<'_, T> {
    fn drop(&mut self) {
        self.player.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    fn frame(mouth: i64, eye: i64, lid: i64, ms: u64) -> ExpressionFrame {
        ExpressionFrame::new("x", mouth, eye, lid, Duration::from_millis(ms))
    }

    #[test]
    fn state_names() {
        assert_eq!(PlaybackState::Idle.name(), "idle");
        assert!(PlaybackState::Finished.is_terminal());
        assert!(!PlaybackState::Playing.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_sequence_finishes_and_closes_once() {
        let sink = RecordingTransport::new();
        let mut player = SequencePlayer::from_transport(sink.clone());
        assert_eq!(player.state(), PlaybackState::Idle);

        let report = player.play(&ExpressionSequence::default()).await;
        assert_eq!(player.state(), PlaybackState::Finished);
        assert_eq!(report.frames_played, 0);
        assert!(!report.cancelled);
        assert!(sink.commands().is_empty());
        assert_eq!(sink.close_count(), 1);

        drop(player);
        assert_eq!(sink.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_apply_in_axis_order_with_cues_first() {
        let sink = RecordingTransport::new();
        let mut player = SequencePlayer::from_transport(sink.clone());
        let seq = ExpressionSequence::new(vec![
            frame(3, 11, 1, 10).with_cue(Cue::SpeechStart),
            frame(9, 0, 2, 0).with_cue(Cue::Stop),
        ]);
        let report = player.play(&seq).await;
        assert_eq!(
            sink.commands(),
            vec![
                "?speak_start",
                "#DGM:3!",
                "$DGB:11!",
                "$DGL:1!",
                "?stop",
                "#DGM:5!",
                "$DGB:1!",
                "$DGL:2!",
            ]
        );
        assert_eq!(report.final_state, HeadState::clamped(5, 1, 2));
        assert_eq!(player.frames_played(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn second_play_is_ignored() {
        let sink = RecordingTransport::new();
        let mut player = SequencePlayer::from_transport(sink.clone());
        let seq = ExpressionSequence::new(vec![frame(2, 11, 1, 5)]);
        player.play(&seq).await;
        let again = player.play(&seq).await;
        assert_eq!(again.frames_played, 0);
        assert_eq!(sink.commands().len(), 3);
        assert_eq!(sink.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_plays_nothing() {
        let sink = RecordingTransport::new();
        let mut player = SequencePlayer::from_transport(sink.clone());
        let (handle, signal) = StopSignal::pair();
        handle.stop();
        assert!(handle.is_stopped());

        let report = player
            .play_until(&ExpressionSequence::new(vec![frame(2, 11, 1, 50)]), signal)
            .await;
        assert!(report.cancelled);
        assert_eq!(report.frames_played, 0);
        assert_eq!(player.state(), PlaybackState::Finished);
        assert_eq!(sink.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_never_cancels() {
        let sink = RecordingTransport::new();
        let mut player = SequencePlayer::from_transport(sink.clone());
        let (handle, signal) = StopSignal::pair();
        drop(handle);

        let seq = ExpressionSequence::new(vec![frame(2, 11, 1, 20), frame(3, 11, 1, 20)]);
        let report = player.play_until(&seq, signal).await;
        assert!(!report.cancelled);
        assert_eq!(report.frames_played, 2);
    }
}
