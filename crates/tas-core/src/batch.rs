use crate::history::{Change, Modification};
use crate::session::EditingSession;
use crate::timeline::CommandFlags;

/// Which byte of a record a scripted input change targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EditTarget {
    Commands,
    Joypad(usize),
}

/// One externally submitted edit, applied verbatim against whatever the
/// timeline indices are at apply time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PendingEdit {
    InputChange {
        frame: usize,
        target: EditTarget,
        bits: u8,
    },
    InsertFrames {
        frame: usize,
        count: usize,
    },
    DeleteFrames {
        frame: usize,
        count: usize,
    },
}

impl EditingSession {
    pub fn submit_input_change(&mut self, frame: usize, target: EditTarget, bits: u8) {
        if let EditTarget::Joypad(pad) = target
            && pad >= self.timeline.input_kind().joypad_count()
        {
            log::warn!("submitted input change for dead port {pad}, ignored");
            return;
        }
        self.pending.push(PendingEdit::InputChange {
            frame,
            target,
            bits,
        });
    }

    pub fn submit_insert_frames(&mut self, frame: usize, count: usize) {
        if count > 0 {
            self.pending.push(PendingEdit::InsertFrames { frame, count });
        }
    }

    pub fn submit_delete_frames(&mut self, frame: usize, count: usize) {
        if count > 0 {
            self.pending.push(PendingEdit::DeleteFrames { frame, count });
        }
    }

    pub fn clear_input_changes(&mut self) {
        self.pending.clear();
    }

    pub fn pending_edit_count(&self) -> usize {
        self.pending.len()
    }

    /// Applies the queued edits in submission order as one atomic batch:
    /// exactly one history entry, so one undo reverts the whole script.
    ///
    /// Edits referencing frames past the current end grow the timeline
    /// first. Returns the earliest invalidated frame, or `None` when the
    /// queue was empty or the batch changed nothing.
    pub fn apply_input_changes(&mut self, name: &str) -> Option<usize> {
        if self.pending.is_empty() {
            return None;
        }
        let edits = std::mem::take(&mut self.pending);
        let mut start = self.timeline.len() - 1;
        let mut structural = false;

        for edit in &edits {
            let frame = match edit {
                PendingEdit::InputChange { frame, .. }
                | PendingEdit::InsertFrames { frame, .. }
                | PendingEdit::DeleteFrames { frame, .. } => *frame,
            };
            start = start.min(frame);
            if frame >= self.timeline.len() {
                self.timeline.append_empty(frame + 1 - self.timeline.len());
                self.sync_marker_size();
                structural = true;
            }

            match *edit {
                PendingEdit::InputChange {
                    frame,
                    target,
                    bits,
                } => {
                    let result = match target {
                        EditTarget::Commands => self
                            .timeline
                            .set_commands(frame, CommandFlags::from_bits_truncate(bits)),
                        EditTarget::Joypad(pad) => self.timeline.set_joypad(frame, pad, bits),
                    };
                    if let Err(err) = result {
                        log::warn!("scripted input change at frame {frame} failed: {err}");
                    }
                }
                PendingEdit::InsertFrames { frame, count } => {
                    structural = true;
                    self.timeline.insert_empty(frame, count);
                    if self.config.bind_markers {
                        self.markers.insert_shift(frame, count);
                    }
                    self.sync_marker_size();
                }
                PendingEdit::DeleteFrames { frame, count } => {
                    structural = true;
                    for _ in 0..count {
                        match self.timeline.erase(frame) {
                            Ok(_) => {
                                if self.config.bind_markers {
                                    self.markers.erase_shift(frame, 1);
                                }
                            }
                            Err(err) => {
                                log::warn!(
                                    "scripted delete at frame {frame} stopped: {err}"
                                );
                                break;
                            }
                        }
                    }
                }
            }
        }

        let end = self.timeline.len() - 1;
        let change = Change::new(
            Modification::Batch {
                name: name.to_owned(),
                structural,
            },
            start.min(end),
            end,
        );
        match self.register_change(change) {
            crate::history::RegisterOutcome::Applied { invalidate_from } => invalidate_from,
            crate::history::RegisterOutcome::NoOp => None,
        }
    }
}
