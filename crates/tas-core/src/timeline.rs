// See: https://fceux.com/web/FM2.html for the button/command layout

use bitflags::bitflags;
use thiserror::Error;

pub const MAX_JOYPADS: usize = 4;
pub const NUM_JOYPAD_BUTTONS: usize = 8;

/// Button mnemonics in bit order, as used by the clipboard text format.
pub const BUTTON_MNEMONICS: [char; NUM_JOYPAD_BUTTONS] = ['A', 'B', 'S', 'T', 'U', 'D', 'L', 'R'];

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct JoypadButtons: u8 {
        const BUTTON_A = 0b0000_0001;
        const BUTTON_B = 0b0000_0010;
        const SELECT   = 0b0000_0100;
        const START    = 0b0000_1000;
        const UP       = 0b0001_0000;
        const DOWN     = 0b0010_0000;
        const LEFT     = 0b0100_0000;
        const RIGHT    = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        const RESET = 0b0000_0001;
        const POWER = 0b0000_0010;
    }
}

impl JoypadButtons {
    pub fn from_mnemonic(c: char) -> Option<JoypadButtons> {
        let bit = BUTTON_MNEMONICS.iter().position(|&m| m == c)?;
        JoypadButtons::from_bits(1 << bit)
    }
}

/// How many controller ports a timeline records.
///
/// Fixed for the lifetime of the timeline: every record carries the same
/// number of live joypad bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
    OnePlayer,
    TwoPlayers,
    FourScore,
}

impl InputKind {
    pub fn joypad_count(&self) -> usize {
        match self {
            InputKind::OnePlayer => 1,
            InputKind::TwoPlayers => 2,
            InputKind::FourScore => 4,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            InputKind::OnePlayer => 0,
            InputKind::TwoPlayers => 1,
            InputKind::FourScore => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<InputKind> {
        match value {
            0 => Some(InputKind::OnePlayer),
            1 => Some(InputKind::TwoPlayers),
            2 => Some(InputKind::FourScore),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("operation would leave the timeline with zero frames")]
    WouldEmptyTimeline,

    #[error("frame {0} is out of range (timeline has {1} frames)")]
    FrameOutOfRange(usize, usize),
}

/// One frame of recorded input: command flags plus one button byte per port.
///
/// All four joypad slots are always present; `InputKind` governs how many of
/// them are live.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    pub commands: CommandFlags,
    pub joypads: [u8; MAX_JOYPADS],
}

impl FrameRecord {
    pub fn blank() -> FrameRecord {
        FrameRecord {
            commands: CommandFlags::empty(),
            joypads: [0; MAX_JOYPADS],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.commands.is_empty() && self.joypads == [0; MAX_JOYPADS]
    }

    pub fn check_button(&self, pad: usize, button: JoypadButtons) -> bool {
        self.joypads[pad] & button.bits() != 0
    }

    pub fn set_button(&mut self, pad: usize, button: JoypadButtons, pressed: bool) {
        if pressed {
            self.joypads[pad] |= button.bits();
        } else {
            self.joypads[pad] &= !button.bits();
        }
    }

    pub fn toggle_button(&mut self, pad: usize, button: JoypadButtons) {
        self.joypads[pad] ^= button.bits();
    }
}

/// The input log: an ordered sequence of frame records, index = frame number.
///
/// Never empty — operations that would remove the last record are rejected
/// with `TimelineError::WouldEmptyTimeline` and leave the log untouched.
/// Every mutator reports the lowest frame index whose content changed, which
/// callers use to invalidate downstream snapshots. A pure append reports the
/// old length, so invalidating from it is a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeline {
    kind: InputKind,
    records: Vec<FrameRecord>,
}

impl Timeline {
    pub fn new(kind: InputKind, frames: usize) -> Timeline {
        Timeline {
            kind,
            records: vec![FrameRecord::blank(); frames.max(1)],
        }
    }

    pub fn from_records(kind: InputKind, records: Vec<FrameRecord>) -> Timeline {
        let mut timeline = Timeline { kind, records };
        if timeline.records.is_empty() {
            timeline.records.push(FrameRecord::blank());
        }
        timeline
    }

    pub fn input_kind(&self) -> InputKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        // Invariant: never true
        self.records.is_empty()
    }

    pub fn record(&self, frame: usize) -> Option<&FrameRecord> {
        self.records.get(frame)
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    fn check_frame(&self, frame: usize) -> Result<(), TimelineError> {
        if frame < self.records.len() {
            Ok(())
        } else {
            Err(TimelineError::FrameOutOfRange(frame, self.records.len()))
        }
    }

    /// Inserts `count` blank records before `at`. `at == len()` appends.
    /// Returns the lowest changed frame (`at`).
    pub fn insert_empty(&mut self, at: usize, count: usize) -> usize {
        let at = at.min(self.records.len());
        self.records
            .splice(at..at, std::iter::repeat_n(FrameRecord::blank(), count));
        at
    }

    /// Appends `count` blank records, reporting the old length so the caller
    /// sees there is nothing downstream to invalidate.
    pub fn append_empty(&mut self, count: usize) -> usize {
        self.insert_empty(self.records.len(), count)
    }

    pub fn erase(&mut self, at: usize) -> Result<usize, TimelineError> {
        self.erase_range(at, 1)
    }

    /// Removes `count` records starting at `at`.
    pub fn erase_range(&mut self, at: usize, count: usize) -> Result<usize, TimelineError> {
        self.check_frame(at)?;
        let count = count.min(self.records.len() - at);
        if count >= self.records.len() {
            return Err(TimelineError::WouldEmptyTimeline);
        }
        self.records.drain(at..at + count);
        Ok(at)
    }

    /// Discards all records from `at` onward. Returns `Ok(None)` when there
    /// was nothing to discard.
    pub fn truncate(&mut self, at: usize) -> Result<Option<usize>, TimelineError> {
        if at == 0 {
            return Err(TimelineError::WouldEmptyTimeline);
        }
        if at >= self.records.len() {
            return Ok(None);
        }
        self.records.truncate(at);
        Ok(Some(at))
    }

    /// Duplicates the `count` records ending at `at - 1` and inserts the copy
    /// before `at`. Returns the lowest changed frame (`at`).
    pub fn clone_region(&mut self, at: usize, count: usize) -> usize {
        let at = at.min(self.records.len());
        let count = count.min(at);
        let copy: Vec<FrameRecord> = self.records[at - count..at].to_vec();
        self.records.splice(at..at, copy);
        at
    }

    /// Sets one button of one record. Returns the changed frame, or `None`
    /// when the bit already had the requested value.
    pub fn set_bit(
        &mut self,
        frame: usize,
        pad: usize,
        button: JoypadButtons,
        pressed: bool,
    ) -> Result<Option<usize>, TimelineError> {
        self.check_frame(frame)?;
        let record = &mut self.records[frame];
        if record.check_button(pad, button) == pressed {
            return Ok(None);
        }
        record.set_button(pad, button, pressed);
        Ok(Some(frame))
    }

    pub fn toggle_bit(
        &mut self,
        frame: usize,
        pad: usize,
        button: JoypadButtons,
    ) -> Result<usize, TimelineError> {
        self.check_frame(frame)?;
        self.records[frame].toggle_button(pad, button);
        Ok(frame)
    }

    /// Replaces a record's whole joypad byte. `None` when nothing changed.
    pub fn set_joypad(
        &mut self,
        frame: usize,
        pad: usize,
        bits: u8,
    ) -> Result<Option<usize>, TimelineError> {
        self.check_frame(frame)?;
        if self.records[frame].joypads[pad] == bits {
            return Ok(None);
        }
        self.records[frame].joypads[pad] = bits;
        Ok(Some(frame))
    }

    pub fn set_commands(
        &mut self,
        frame: usize,
        flags: CommandFlags,
    ) -> Result<Option<usize>, TimelineError> {
        self.check_frame(frame)?;
        if self.records[frame].commands == flags {
            return Ok(None);
        }
        self.records[frame].commands = flags;
        Ok(Some(frame))
    }

    /// Clears one record back to blank. `None` when it already was.
    pub fn clear_record(&mut self, frame: usize) -> Result<Option<usize>, TimelineError> {
        self.check_frame(frame)?;
        if self.records[frame].is_blank() {
            return Ok(None);
        }
        self.records[frame] = FrameRecord::blank();
        Ok(Some(frame))
    }

    /// First frame where two timelines differ; `None` when they match.
    /// A pure length difference reports the shorter length.
    pub fn first_difference(&self, other: &Timeline) -> Option<usize> {
        let common = self.records.len().min(other.records.len());
        for frame in 0..common {
            if self.records[frame] != other.records[frame] {
                return Some(frame);
            }
        }
        if self.records.len() != other.records.len() {
            Some(common)
        } else {
            None
        }
    }
}
