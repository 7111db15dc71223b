use crate::batch::PendingEdit;
use crate::engine::EmulationEngine;
use crate::greenzone::{Greenzone, Snapshot};
use crate::history::{Change, History, Modification, RegisterOutcome};
use crate::markers::Markers;
use crate::playback::Playback;
use crate::selection::Selection;
use crate::timeline::{CommandFlags, InputKind, JoypadButtons, Timeline, TimelineError};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Shift markers in lockstep with structural timeline edits.
    pub bind_markers: bool,
    pub undo_levels: usize,
    pub greenzone_capacity: usize,
    pub greenzone_retention: usize,
    /// A jump farther than this many frames goes through the multi-tick
    /// Seeking state instead of replaying inside the call.
    pub seek_threshold: usize,
    /// Frames advanced per tick while turbo-seeking.
    pub turbo_batch: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            bind_markers: true,
            undo_levels: crate::history::DEFAULT_UNDO_LEVELS,
            greenzone_capacity: crate::greenzone::DEFAULT_CAPACITY,
            greenzone_retention: crate::greenzone::DEFAULT_RETENTION,
            seek_threshold: 60,
            turbo_batch: 16,
        }
    }
}

/// One editing session: the timeline and every manager attached to it, plus
/// exclusive ownership of the emulation engine.
///
/// All mutation funnels through `register_change`, which records history,
/// computes the earliest stale frame, shrinks the greenzone and keeps the
/// playback cursor inside the recoverable region.
pub struct EditingSession {
    pub config: SessionConfig,
    pub(crate) timeline: Timeline,
    pub(crate) greenzone: Greenzone,
    pub(crate) history: History,
    pub(crate) markers: Markers,
    pub selection: Selection,
    pub(crate) playback: Playback,
    pub(crate) engine: Box<dyn EmulationEngine>,
    pub(crate) pending: Vec<PendingEdit>,
    pub(crate) dirty: bool,
    next_drag_id: u64,
}

impl EditingSession {
    pub fn new(
        mut engine: Box<dyn EmulationEngine>,
        kind: InputKind,
        frames: usize,
        config: SessionConfig,
    ) -> EditingSession {
        let timeline = Timeline::new(kind, frames);
        let mut markers = Markers::new();
        markers.set_size(timeline.len());
        let history = History::new(config.undo_levels, &timeline, &markers);

        let mut greenzone = Greenzone::new(config.greenzone_capacity, config.greenzone_retention);
        engine.cold_power_on();
        greenzone.capture(0, Snapshot::capture(&*engine, false));

        EditingSession {
            config,
            timeline,
            greenzone,
            history,
            markers,
            selection: Selection::new(),
            playback: Playback::new(),
            engine,
            pending: Vec::new(),
            dirty: false,
            next_drag_id: 1,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn greenzone(&self) -> &Greenzone {
        &self.greenzone
    }

    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag after the project was written out.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.history.undo_description()
    }

    /// Allocates a coalesce key for one continuous input-drawing stroke.
    pub fn begin_drag(&mut self) -> u64 {
        let id = self.next_drag_id;
        self.next_drag_id += 1;
        id
    }

    /// Records the mutation that was just applied to timeline/markers.
    /// No-op edits vanish here; real ones dirty the project, cancel any
    /// in-flight seek and shrink the greenzone.
    pub(crate) fn register_change(&mut self, change: Change) -> RegisterOutcome {
        let structural = change.kind.is_structural();
        let outcome = self
            .history
            .register(change, &self.timeline, &self.markers);
        if let RegisterOutcome::Applied { invalidate_from } = outcome {
            self.dirty = true;
            self.playback.cancel_seek();
            if structural {
                self.selection.must_find_current_marker = true;
                self.playback.must_find_current_marker = true;
                self.selection.clamp_to(self.timeline.len());
            }
            if let Some(frame) = invalidate_from {
                self.invalidate_from(frame);
            }
        }
        outcome
    }

    pub(crate) fn invalidate_from(&mut self, frame: usize) {
        self.greenzone.invalidate_from(frame);
        self.ensure_cursor_recoverable();
    }

    /// Pulls the playback cursor back inside the recoverable region after
    /// the greenzone shrank or the timeline got shorter.
    pub(crate) fn ensure_cursor_recoverable(&mut self) {
        let last = self.timeline.len() - 1;
        let cursor = self.playback.cursor();
        let target = if cursor > last {
            last.min(self.greenzone.green_count().saturating_sub(1))
        } else if cursor >= self.greenzone.green_count() {
            self.greenzone.green_count().saturating_sub(1).min(last)
        } else {
            return;
        };
        if let Err(err) = self.jump(target) {
            log::warn!("cursor rescue jump to {target} failed: {err}");
        }
    }

    // ------------------------------------------------------------------
    // Input editing

    /// Toggles one button of one frame. `drag` ties consecutive strokes of
    /// a mouse drag into a single undoable entry.
    pub fn toggle_input(
        &mut self,
        frame: usize,
        pad: usize,
        button: JoypadButtons,
        drag: Option<u64>,
    ) -> Result<(), TimelineError> {
        let changed = self.timeline.toggle_bit(frame, pad, button)?;
        let pressed = self
            .timeline
            .record(frame)
            .is_some_and(|r| r.check_button(pad, button));
        let kind = if pressed {
            Modification::Set
        } else {
            Modification::Unset
        };
        let mut change = Change::new(kind, changed, changed);
        if let Some(key) = drag {
            change = change.coalescing(key);
        }
        self.register_change(change);
        Ok(())
    }

    pub fn set_input(
        &mut self,
        frame: usize,
        pad: usize,
        button: JoypadButtons,
        pressed: bool,
        drag: Option<u64>,
    ) -> Result<(), TimelineError> {
        if self.timeline.set_bit(frame, pad, button, pressed)?.is_none() {
            return Ok(());
        }
        let kind = if pressed {
            Modification::Set
        } else {
            Modification::Unset
        };
        let mut change = Change::new(kind, frame, frame);
        if let Some(key) = drag {
            change = change.coalescing(key);
        }
        self.register_change(change);
        Ok(())
    }

    pub fn set_commands(
        &mut self,
        frame: usize,
        flags: CommandFlags,
    ) -> Result<(), TimelineError> {
        if self.timeline.set_commands(frame, flags)?.is_some() {
            self.register_change(Change::new(Modification::Set, frame, frame));
        }
        Ok(())
    }

    /// Inserts `count` blank frames before `at`.
    pub fn insert_frames_at(&mut self, at: usize, count: usize) {
        if count == 0 {
            return;
        }
        let at = self.timeline.insert_empty(at, count);
        if self.config.bind_markers {
            self.markers.insert_shift(at, count);
        }
        self.sync_marker_size();
        self.register_change(Change::new(Modification::Insert, at, at + count - 1));
    }

    /// Discards everything from `at` onward.
    pub fn truncate_at(&mut self, at: usize) -> Result<(), TimelineError> {
        let Some(changed) = self.timeline.truncate(at)? else {
            return Ok(());
        };
        if self.config.bind_markers {
            self.markers.set_size(at);
        }
        self.register_change(Change::new(Modification::Truncate, changed, changed));
        Ok(())
    }

    /// Drops snapshots before `frame` to reclaim memory.
    pub fn lock_greenzone(&mut self, frame: usize) {
        self.greenzone.lock_before(frame);
    }

    pub(crate) fn sync_marker_size(&mut self) {
        if self.config.bind_markers && self.markers.len() < self.timeline.len() {
            self.markers.set_size(self.timeline.len());
        }
    }

    // ------------------------------------------------------------------
    // Markers

    pub fn set_marker(&mut self, frame: usize) -> u32 {
        let id = self.markers.set_marker(frame);
        self.register_change(Change::new(Modification::MarkerSet, frame, frame));
        id
    }

    pub fn remove_marker(&mut self, frame: usize) {
        if self.markers.clear_marker(frame) {
            self.register_change(Change::new(Modification::MarkerRemove, frame, frame));
        }
    }

    pub fn set_note(&mut self, id: u32, text: &str) {
        if self.markers.set_note(id, text) {
            let frame = self.markers.marker_frame(id).unwrap_or(0);
            self.register_change(Change::new(Modification::MarkerRename, frame, frame));
        }
    }

    pub fn swap_markers(&mut self, a: usize, b: usize) {
        if self.markers.swap_markers(a, b) {
            self.register_change(Change::new(Modification::MarkerSwap, a.min(b), a.max(b)));
        }
    }

    pub fn drag_marker(&mut self, from: usize, to: usize) {
        if self.markers.drag_marker(from, to) {
            self.register_change(Change::new(Modification::MarkerDrag, from.min(to), from.max(to)));
        }
    }

    // ------------------------------------------------------------------
    // Undo / redo

    /// Rolls back one history entry. Returns its description.
    pub fn undo(&mut self) -> Option<String> {
        let restore = self.history.undo()?;
        self.install_restore(restore)
    }

    pub fn redo(&mut self) -> Option<String> {
        let restore = self.history.redo()?;
        self.install_restore(restore)
    }

    fn install_restore(&mut self, restore: crate::history::RestorePoint) -> Option<String> {
        self.timeline = restore.timeline;
        self.markers = restore.markers;
        self.dirty = true;
        self.playback.cancel_seek();
        self.selection.clamp_to(self.timeline.len());
        self.selection.must_find_current_marker = true;
        self.playback.must_find_current_marker = true;
        if let Some(frame) = restore.invalidate_from {
            self.invalidate_from(frame);
        }
        Some(restore.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::JumpOutcome;
    use crate::test_utils::ReferenceEngine;

    fn session(frames: usize) -> EditingSession {
        EditingSession::new(
            Box::new(ReferenceEngine::new()),
            InputKind::TwoPlayers,
            frames,
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_new_session_has_frame_zero_green() {
        let s = session(50);
        assert_eq!(s.greenzone().green_count(), 1);
        assert!(s.greenzone().snapshot(0).is_some());
        assert!(!s.is_dirty());
    }

    #[test]
    fn test_toggle_input_dirties_and_invalidates() {
        let mut s = session(50);
        s.jump(20).unwrap();
        assert_eq!(s.greenzone().green_count(), 21);

        s.toggle_input(10, 0, JoypadButtons::BUTTON_A, None).unwrap();
        assert!(s.is_dirty());
        assert_eq!(s.greenzone().green_count(), 10);
        // cursor was at 20, past the shrunk green region, so it was rescued
        assert!(s.playback().cursor() < 20);
    }

    #[test]
    fn test_toggle_twice_keeps_both_entries() {
        let mut s = session(10);
        s.toggle_input(3, 0, JoypadButtons::BUTTON_A, None).unwrap();
        s.toggle_input(3, 0, JoypadButtons::BUTTON_A, None).unwrap();
        // set then unset are distinct entries, both undoable
        assert_eq!(s.undo_description(), Some("Unset".into()));
        s.undo().unwrap();
        assert_eq!(s.undo_description(), Some("Set".into()));
    }

    #[test]
    fn test_insert_frames_shifts_markers_under_bind_policy() {
        let mut s = session(30);
        s.toggle_input(20, 1, JoypadButtons::START, None).unwrap();
        let id = s.set_marker(20);

        s.insert_frames_at(10, 3);
        assert_eq!(s.timeline().len(), 33);
        assert_eq!(s.markers().get_marker(23), id);
        assert!(s.timeline().record(23).unwrap().check_button(1, JoypadButtons::START));
    }

    #[test]
    fn test_insert_without_bind_leaves_markers_pinned() {
        let mut s = session(30);
        s.config.bind_markers = false;
        let id = s.set_marker(20);
        s.insert_frames_at(10, 3);
        assert_eq!(s.markers().get_marker(20), id);
    }

    #[test]
    fn test_undo_structural_edit_restores_everything() {
        let mut s = session(30);
        s.toggle_input(12, 0, JoypadButtons::BUTTON_B, None).unwrap();
        let id = s.set_marker(12);
        s.jump(25).unwrap();
        let green_before = s.greenzone().green_count();

        s.insert_frames_at(10, 3);
        assert_eq!(s.markers().get_marker(15), id);
        assert!(s.greenzone().green_count() < green_before);

        let undone = s.undo().expect("insert is undoable");
        assert_eq!(undone, "Insert");
        assert_eq!(s.timeline().len(), 30);
        assert_eq!(s.markers().get_marker(12), id);
        // the cursor-validity window shrank to before the restored content
        assert!(s.greenzone().green_count() <= 12 + 1);
        assert!(s.playback().cursor() <= 12);
    }

    #[test]
    fn test_marker_rename_invalidates_nothing() {
        let mut s = session(20);
        s.jump(15).unwrap();
        let id = s.set_marker(5);
        let green = s.greenzone().green_count();
        s.set_note(id, "entry point");
        assert_eq!(s.greenzone().green_count(), green);
        assert_eq!(s.playback().cursor(), 15);
        assert!(s.is_dirty());
    }

    #[test]
    fn test_truncate_rejected_at_zero() {
        let mut s = session(20);
        assert!(s.truncate_at(0).is_err());
        assert_eq!(s.timeline().len(), 20);
    }

    #[test]
    fn test_truncate_pulls_cursor_back() {
        let mut s = session(100);
        s.jump(50).unwrap();
        s.truncate_at(30).unwrap();
        assert_eq!(s.timeline().len(), 30);
        assert!(s.playback().cursor() < 30);
    }

    #[test]
    fn test_edit_cancels_seek_and_records_lost_position() {
        let mut s = session(500);
        let outcome = s.jump(400).unwrap();
        assert_eq!(outcome, JumpOutcome::SeekStarted);
        assert_eq!(s.playback().seek_target(), Some(400));

        s.toggle_input(2, 0, JoypadButtons::BUTTON_A, None).unwrap();
        assert_eq!(s.playback().seek_target(), None);
        assert_eq!(s.playback().lost_position(), Some(400));
    }

    #[test]
    fn test_drag_stroke_is_one_undo() {
        let mut s = session(50);
        let drag = s.begin_drag();
        for frame in 10..20 {
            s.set_input(frame, 0, JoypadButtons::RIGHT, true, Some(drag)).unwrap();
        }
        s.undo().unwrap();
        for frame in 10..20 {
            assert!(
                !s.timeline().record(frame).unwrap().check_button(0, JoypadButtons::RIGHT),
                "frame {frame} should be rolled back with the stroke"
            );
        }
        assert!(!s.can_undo());
    }
}
