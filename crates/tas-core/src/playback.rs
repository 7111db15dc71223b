use crate::greenzone::Snapshot;
use crate::session::EditingSession;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("jump target {target} is outside the timeline ({frames} frames)")]
    TargetOutOfRange { target: usize, frames: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Seeking { target: usize, turbo: bool },
}

#[derive(Debug, PartialEq, Eq)]
pub enum JumpOutcome {
    /// The cursor is already parked on the target frame.
    Arrived,
    /// The target is far off; ticks will carry the cursor there.
    SeekStarted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    /// Playback advanced; the cursor now sits on this frame.
    Advanced(usize),
    /// A seek reached its target this tick.
    SeekFinished(usize),
}

/// The playback cursor and its state machine.
///
/// The cursor always points at a frame inside the timeline; the state
/// decides what the next host tick does with it. Seeking is multi-tick by
/// construction — the session advances at most one turbo batch per tick and
/// yields back to the host loop.
#[derive(Debug)]
pub struct Playback {
    cursor: usize,
    state: PlaybackState,
    lost_position: Option<usize>,
    pub must_find_current_marker: bool,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new()
    }
}

impl Playback {
    pub fn new() -> Playback {
        Playback {
            cursor: 0,
            state: PlaybackState::Stopped,
            lost_position: None,
            must_find_current_marker: false,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_seeking(&self) -> bool {
        matches!(self.state, PlaybackState::Seeking { .. })
    }

    pub fn seek_target(&self) -> Option<usize> {
        match self.state {
            PlaybackState::Seeking { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Where an interrupted seek was headed, if one was ever cancelled.
    pub fn lost_position(&self) -> Option<usize> {
        self.lost_position
    }

    /// Drops an in-flight seek target, remembering it as the lost position.
    /// Called for every timeline edit and for explicit stops.
    pub fn cancel_seek(&mut self) {
        if let PlaybackState::Seeking { target, .. } = self.state {
            self.lost_position = Some(target);
            self.state = PlaybackState::Stopped;
        }
    }

    pub(crate) fn set_cursor(&mut self, frame: usize) {
        self.cursor = frame;
    }

    pub(crate) fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }
}

impl EditingSession {
    /// Moves the cursor to `target`, restoring the nearest snapshot at or
    /// before it and replaying the recorded input forward.
    ///
    /// A short hop replays inside this call and returns `Arrived` with the
    /// cursor on `target`. A long one switches to the Seeking state and
    /// returns `SeekStarted`; ticks finish the travel. When no snapshot is
    /// reconstructible the engine cold-powers-on and replays from frame 0 —
    /// never an error.
    pub fn jump(&mut self, target: usize) -> Result<JumpOutcome, PlaybackError> {
        if target >= self.timeline.len() {
            return Err(PlaybackError::TargetOutOfRange {
                target,
                frames: self.timeline.len(),
            });
        }
        self.playback.cancel_seek();

        self.restore_nearest(target);

        let cursor = self.playback.cursor();
        if target.saturating_sub(cursor) <= self.config.seek_threshold {
            while self.playback.cursor() < target {
                if !self.step_one() {
                    break;
                }
            }
            self.playback.set_state(PlaybackState::Stopped);
            Ok(JumpOutcome::Arrived)
        } else {
            let turbo = target > self.greenzone.green_count() + self.config.seek_threshold;
            self.playback.set_state(PlaybackState::Seeking { target, turbo });
            Ok(JumpOutcome::SeekStarted)
        }
    }

    /// Restores the best snapshot <= `target` into the engine, probing
    /// earlier rungs of the ladder when a blob turns out stale, and falling
    /// back to a cold power-on at frame 0 when none restores.
    fn restore_nearest(&mut self, target: usize) {
        let mut probe = target;
        while let Some(frame) = self.greenzone.nearest_at_or_before(probe) {
            // snapshot() is Some by the nearest_at_or_before contract
            let blob = self
                .greenzone
                .snapshot(frame)
                .map(|snap| snap.state.clone())
                .unwrap_or_default();
            match self.engine.restore_state(&blob) {
                Ok(()) => {
                    self.playback.set_cursor(frame);
                    return;
                }
                Err(err) => {
                    log::warn!("snapshot at frame {frame} failed to restore: {err}");
                    self.greenzone.invalidate_from(frame);
                }
            }
            if frame == 0 {
                break;
            }
            probe = frame - 1;
        }
        self.engine.cold_power_on();
        self.playback.set_cursor(0);
        self.greenzone
            .capture(0, Snapshot::capture(&*self.engine, false));
    }

    /// One host tick: advances playback by one step, or one turbo batch
    /// while seeking. Never blocks.
    pub fn tick(&mut self) -> TickOutcome {
        match self.playback.state() {
            PlaybackState::Stopped => TickOutcome::Idle,
            PlaybackState::Playing => {
                if self.step_one() {
                    TickOutcome::Advanced(self.playback.cursor())
                } else {
                    self.playback.set_state(PlaybackState::Stopped);
                    TickOutcome::Idle
                }
            }
            PlaybackState::Seeking { target, turbo } => {
                let batch = if turbo { self.config.turbo_batch } else { 1 };
                for _ in 0..batch {
                    if self.playback.cursor() >= target || !self.step_one() {
                        break;
                    }
                }
                if self.playback.cursor() >= target {
                    self.playback.set_state(PlaybackState::Stopped);
                    TickOutcome::SeekFinished(self.playback.cursor())
                } else {
                    TickOutcome::Advanced(self.playback.cursor())
                }
            }
        }
    }

    pub fn play(&mut self) {
        self.playback.cancel_seek();
        self.playback.set_state(PlaybackState::Playing);
    }

    pub fn pause(&mut self) {
        self.playback.cancel_seek();
        self.playback.set_state(PlaybackState::Stopped);
    }

    /// Explicit user stop of an in-progress seek.
    pub fn stop_seeking(&mut self) {
        self.playback.cancel_seek();
    }

    /// Steps the engine over the cursor's frame and captures the resulting
    /// state. Returns false at the end of the timeline.
    fn step_one(&mut self) -> bool {
        let cursor = self.playback.cursor();
        if cursor + 1 >= self.timeline.len() {
            return false;
        }
        let Some(record) = self.timeline.record(cursor).copied() else {
            return false;
        };
        let lagged = self.engine.step_frame(&record);
        self.greenzone
            .capture(cursor + 1, Snapshot::capture(&*self.engine, lagged));
        self.playback.set_cursor(cursor + 1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::test_utils::ReferenceEngine;
    use crate::timeline::{InputKind, JoypadButtons};

    fn session(frames: usize) -> EditingSession {
        EditingSession::new(
            Box::new(ReferenceEngine::new()),
            InputKind::TwoPlayers,
            frames,
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_jump_out_of_range_fails_without_state_change() {
        let mut s = session(100);
        let err = s.jump(250).unwrap_err();
        assert_eq!(
            err,
            PlaybackError::TargetOutOfRange {
                target: 250,
                frames: 100
            }
        );
        assert_eq!(s.playback().cursor(), 0);
        assert_eq!(s.playback().state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_jump_within_threshold_arrives_synchronously() {
        let mut s = session(100);
        assert_eq!(s.jump(40), Ok(JumpOutcome::Arrived));
        assert_eq!(s.playback().cursor(), 40);
        assert_eq!(s.greenzone().green_count(), 41);
    }

    #[test]
    fn test_jump_with_no_snapshots_cold_replays() {
        let mut s = session(100);
        s.jump(40).unwrap();
        // wipe the ladder entirely
        s.greenzone.invalidate_from(0);
        // 99 frames from a cold boot is beyond the threshold, so the jump
        // restarts at frame 0 and seeks the rest of the way
        assert_eq!(s.jump(99), Ok(JumpOutcome::SeekStarted));
        assert_eq!(s.playback().cursor(), 0);
        for _ in 0..100 {
            if let TickOutcome::SeekFinished(_) = s.tick() {
                break;
            }
        }
        assert_eq!(s.playback().cursor(), 99);
    }

    #[test]
    fn test_jump_backward_restores_snapshot() {
        let mut s = session(100);
        s.jump(50).unwrap();
        assert_eq!(s.jump(10), Ok(JumpOutcome::Arrived));
        assert_eq!(s.playback().cursor(), 10);
        // jumping back never shrinks the computed region
        assert_eq!(s.greenzone().green_count(), 51);
    }

    #[test]
    fn test_long_jump_seeks_over_multiple_ticks() {
        let mut s = session(600);
        assert_eq!(s.jump(500), Ok(JumpOutcome::SeekStarted));
        assert!(s.playback().is_seeking());

        let mut finished = None;
        for _ in 0..1000 {
            match s.tick() {
                TickOutcome::SeekFinished(frame) => {
                    finished = Some(frame);
                    break;
                }
                TickOutcome::Advanced(_) => {}
                TickOutcome::Idle => panic!("seek went idle before finishing"),
            }
        }
        assert_eq!(finished, Some(500));
        assert_eq!(s.playback().cursor(), 500);
        assert_eq!(s.playback().state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_stop_seeking_records_lost_position() {
        let mut s = session(600);
        s.jump(500).unwrap();
        s.tick();
        s.stop_seeking();
        assert!(!s.playback().is_seeking());
        assert_eq!(s.playback().lost_position(), Some(500));
        // subsequent ticks are idle
        assert_eq!(s.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_playing_pauses_at_timeline_end() {
        let mut s = session(5);
        s.play();
        let mut advanced = 0;
        for _ in 0..10 {
            if let TickOutcome::Advanced(_) = s.tick() {
                advanced += 1;
            }
        }
        assert_eq!(advanced, 4);
        assert_eq!(s.playback().cursor(), 4);
        assert_eq!(s.playback().state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_snapshot_restore_matches_cold_replay() {
        let mut s = session(120);
        // varied input so engine state actually diverges per frame
        for frame in (0..100).step_by(3) {
            s.toggle_input(frame, 0, JoypadButtons::BUTTON_A, None).unwrap();
        }
        for frame in (1..100).step_by(7) {
            s.toggle_input(frame, 1, JoypadButtons::LEFT, None).unwrap();
        }
        s.jump(100).unwrap();
        let via_ladder = s.greenzone().snapshot(100).unwrap().state.clone();

        // cold replay of the same prefix on a fresh engine
        let mut cold = ReferenceEngine::new();
        cold.cold_power_on();
        for frame in 0..100 {
            cold.step_frame(s.timeline().record(frame).unwrap());
        }
        assert_eq!(cold.serialize_state(), via_ladder);

        // restoring a mid-way snapshot and replaying the tail agrees too
        let mid = s.greenzone().snapshot(60).unwrap().state.clone();
        let mut warm = ReferenceEngine::new();
        warm.restore_state(&mid).unwrap();
        for frame in 60..100 {
            warm.step_frame(s.timeline().record(frame).unwrap());
        }
        assert_eq!(warm.serialize_state(), via_ladder);
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_cold_replay() {
        let mut s = session(100);
        s.jump(30).unwrap();
        // poison every stored snapshot blob
        let poisoned: Vec<usize> = (0..s.greenzone().green_count())
            .filter(|&f| s.greenzone().snapshot(f).is_some())
            .collect();
        for frame in poisoned {
            let snap = Snapshot {
                state: vec![0xFF; 3],
                lagged: false,
                thumbnail: Vec::new(),
            };
            s.greenzone.capture(frame, snap);
        }
        assert_eq!(s.jump(35), Ok(JumpOutcome::Arrived));
        assert_eq!(s.playback().cursor(), 35);
    }
}
