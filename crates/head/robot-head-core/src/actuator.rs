//! Actuator state: the last commanded value per axis, and the sole writer to
//! the session's transport.
//!
//! Setters never fail. Inputs are clamped into the axis range, stored, encoded
//! and written. Repeated identical values are forwarded every time (idle
//! refresh relies on it).

use serde::{Deserialize, Serialize};

use crate::codec::{encode, AxisKind, Command};
use crate::transport::Transport;

/// Snapshot of the three axes. Every field is always in range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeadState {
    pub mouth: u8,
    pub eye_pos: u8,
    pub eyelid: u8,
}

impl HeadState {
    /// Build a snapshot from arbitrary integers, clamping each axis.
    pub fn clamped(mouth: i64, eye_pos: i64, eyelid: i64) -> Self {
        Self {
            mouth: AxisKind::Mouth.clamp(mouth),
            eye_pos: AxisKind::EyePosition.clamp(eye_pos),
            eyelid: AxisKind::Eyelid.clamp(eyelid),
        }
    }

    #[inline]
    pub fn get(&self, axis: AxisKind) -> u8 {
        match axis {
            AxisKind::Mouth => self.mouth,
            AxisKind::EyePosition => self.eye_pos,
            AxisKind::Eyelid => self.eyelid,
        }
    }

    /// The three commands for this pose, in application order.
    pub fn commands(&self) -> [Command; 3] {
        AxisKind::ALL.map(|axis| encode(axis, self.get(axis) as i64))
    }
}

impl Default for HeadState {
    fn default() -> Self {
        Self {
            mouth: AxisKind::Mouth.initial(),
            eye_pos: AxisKind::EyePosition.initial(),
            eyelid: AxisKind::Eyelid.initial(),
        }
    }
}

/// Owns a transport for the duration of a session.
///
/// Dropping the state closes the transport if [`close`](Self::close) was not
/// called, so every exit path of the owner releases it exactly once.
#[derive(Debug)]
pub struct ActuatorState<T: Transport> {
    transport: T,
    state: HeadState,
    commands_sent: usize,
    closed: bool,
}

impl<T: Transport> ActuatorState<T> {
    pub fn new(transport: T) -> Self {
        log::info!("[{}] actuator session opened", transport.label());
        Self {
            transport,
            state: HeadState::default(),
            commands_sent: 0,
            closed: false,
        }
    }

    /// Mouth aperture, 1 (closed) to 5 (wide).
    pub fn set_mouth(&mut self, level: i64) {
        self.set_axis(AxisKind::Mouth, level);
    }

    /// Gaze position id on the 5×5 grid, 1 to 21 (11 is center).
    pub fn set_eye_position(&mut self, pos: i64) {
        self.set_axis(AxisKind::EyePosition, pos);
    }

    /// Eyelid: 1 normal, 2 squint, 3 closed, 4 wide.
    pub fn set_eyelid(&mut self, state: i64) {
        self.set_axis(AxisKind::Eyelid, state);
    }

    pub fn set_axis(&mut self, axis: AxisKind, value: i64) {
        let v = axis.clamp(value);
        match axis {
            AxisKind::Mouth => self.state.mouth = v,
            AxisKind::EyePosition => self.state.eye_pos = v,
            AxisKind::Eyelid => self.state.eyelid = v,
        }
        self.send(encode(axis, v as i64));
    }

    /// Apply a whole pose: mouth, eye, eyelid.
    pub fn apply(&mut self, pose: HeadState) {
        self.set_mouth(pose.mouth as i64);
        self.set_eye_position(pose.eye_pos as i64);
        self.set_eyelid(pose.eyelid as i64);
    }

    pub fn speak_start(&mut self) {
        self.send(Command::speech_start());
    }

    pub fn speak_stop(&mut self) {
        self.send(Command::stop());
    }

    /// Read-only snapshot.
    #[inline]
    pub fn get_state(&self) -> HeadState {
        self.state
    }

    /// Commands handed to the transport so far (including failed writes).
    #[inline]
    pub fn commands_sent(&self) -> usize {
        self.commands_sent
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the transport. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.close() {
            log::warn!("[{}] close failed: {e}", self.transport.label());
        }
        log::info!(
            "[{}] actuator session closed after {} commands",
            self.transport.label(),
            self.commands_sent
        );
    }

    fn send(&mut self, command: Command) {
        if self.closed {
            log::warn!(
                "[{}] dropping {command} after close",
                self.transport.label()
            );
            return;
        }
        log::debug!("[{}] {command}", self.transport.label());
        self.commands_sent += 1;
        if let Err(e) = self.transport.write(command.as_bytes()) {
            log::warn!("[{}] write {command} failed: {e}", self.transport.label());
        }
    }
}

impl<T: Transport> Drop for ActuatorState<T> {
    fn drop(&mut self) {
        self.close();
    }
}
