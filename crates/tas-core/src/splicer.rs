use crate::history::{Change, Modification};
use crate::selection::Strobe;
use crate::session::EditingSession;
use crate::timeline::{
    BUTTON_MNEMONICS, JoypadButtons, MAX_JOYPADS, Timeline, TimelineError,
};
use std::fmt::Write as _;
use thiserror::Error;

/// Tag opening the text interchange format.
const CLIP_TAG: &str = "TAS";

#[derive(Debug, Error)]
pub enum SplicerError {
    #[error("clipboard is empty or unavailable")]
    ClipboardUnavailable,

    #[error("clipboard text is not TAS input data")]
    NotTasData,

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Narrow seam over the host clipboard so the text-format logic stays
/// testable without an OS.
pub trait ClipboardPort {
    fn write_text(&mut self, text: &str) -> Result<(), SplicerError>;
    fn read_text(&mut self) -> Result<String, SplicerError>;
}

/// In-process clipboard, used by tests and the headless shell.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> MemoryClipboard {
        MemoryClipboard::default()
    }
}

impl ClipboardPort for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), SplicerError> {
        self.text = Some(text.to_owned());
        Ok(())
    }

    fn read_text(&mut self) -> Result<String, SplicerError> {
        self.text.clone().ok_or(SplicerError::ClipboardUnavailable)
    }
}

/// Decoded clipboard payload: row offsets are relative to the paste base.
#[derive(Debug, PartialEq, Eq)]
pub struct PastedInput {
    pub range: usize,
    pub rows: Vec<(usize, [u8; MAX_JOYPADS])>,
}

/// Renders the strobed frames as interchange text.
///
/// Line 1 is `TAS <rangeLength>`; one line per selected frame follows, a
/// `'+'<gap>'|'` prefix standing in for unselected frames, then the button
/// mnemonics of each joypad with `'|'` separating pads. Trailing pads
/// without input are omitted, matching the historical format.
pub fn encode_selection(timeline: &Timeline, strobe: &Strobe) -> Option<String> {
    let first = strobe.first()?;
    let last = strobe.last()?;
    let pads = timeline.input_kind().joypad_count();
    let mut text = String::new();
    let _ = writeln!(text, "{CLIP_TAG} {}", last - first + 1);

    let mut prev = first as i64 - 1;
    for frame in strobe.iter() {
        if frame as i64 > prev + 1 {
            let _ = write!(text, "+{}|", frame as i64 - prev);
        }
        prev = frame as i64;

        let record = timeline.record(frame)?;
        let mut written_pads = 0;
        for pad in 0..pads {
            let bits = record.joypads[pad];
            while bits != 0 && written_pads < pad {
                text.push('|');
                written_pads += 1;
            }
            for (bit, &mnemonic) in BUTTON_MNEMONICS.iter().enumerate() {
                if bits & (1 << bit) != 0 {
                    text.push(mnemonic);
                }
            }
        }
        text.push('\n');
    }
    Some(text)
}

/// Parses interchange text back into row offsets and joypad bytes.
///
/// A declared range smaller than the actual row spread is widened, so a
/// damaged header can never make paste write outside the region it grew.
pub fn decode_clip_text(text: &str) -> Result<PastedInput, SplicerError> {
    let mut lines = text.lines();
    let header = lines.next().ok_or(SplicerError::NotTasData)?;
    let declared = header
        .strip_prefix(CLIP_TAG)
        .and_then(|rest| rest.trim().parse::<usize>().ok())
        .ok_or(SplicerError::NotTasData)?;

    let mut rows = Vec::new();
    let mut pos: i64 = -1;
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.is_empty() && rows.is_empty() {
            continue;
        }
        let content = if let Some(rest) = line.strip_prefix('+') {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            let gap: i64 = digits.parse().map_err(|_| SplicerError::NotTasData)?;
            pos += gap;
            match rest[digits.len()..].strip_prefix('|') {
                Some(content) => content,
                None => &rest[digits.len()..],
            }
        } else {
            pos += 1;
            line
        };

        let mut pad = 0usize;
        let mut joypads = [0u8; MAX_JOYPADS];
        for c in content.chars() {
            if c == '|' {
                pad = (pad + 1).min(MAX_JOYPADS - 1);
            } else if let Some(button) = JoypadButtons::from_mnemonic(c) {
                joypads[pad] |= button.bits();
            }
        }
        rows.push((pos.max(0) as usize, joypads));
    }

    let spread = rows.last().map(|(offset, _)| offset + 1).unwrap_or(0);
    Ok(PastedInput {
        range: declared.max(spread),
        rows,
    })
}

impl EditingSession {
    /// Copies the selected frames to the clipboard. Returns false when the
    /// selection is empty.
    pub fn copy(&self, clipboard: &mut dyn ClipboardPort) -> Result<bool, SplicerError> {
        let strobe = self.selection.strobe();
        let Some(text) = encode_selection(&self.timeline, &strobe) else {
            return Ok(false);
        };
        clipboard.write_text(&text)?;
        Ok(true)
    }

    /// Copies the selection, then blanks it out.
    pub fn cut(&mut self, clipboard: &mut dyn ClipboardPort) -> Result<bool, SplicerError> {
        let strobe = self.selection.strobe();
        if strobe.is_empty() {
            return Ok(false);
        }
        if !self.copy(clipboard)? {
            return Ok(false);
        }
        self.clear_strobe(&strobe, Modification::Cut);
        Ok(true)
    }

    /// Blanks the selected frames without touching the clipboard.
    pub fn clear_frames(&mut self) {
        let strobe = self.selection.strobe();
        if strobe.is_empty() {
            return;
        }
        self.clear_strobe(&strobe, Modification::Clear);
    }

    fn clear_strobe(&mut self, strobe: &Strobe, kind: Modification) {
        for frame in strobe.iter() {
            if frame < self.timeline.len() {
                let _ = self.timeline.clear_record(frame);
            }
        }
        let (Some(first), Some(last)) = (strobe.first(), strobe.last()) else {
            return;
        };
        self.register_change(Change::new(kind, first, last));
    }

    /// Overwrites input starting at the selection head with the clipboard
    /// content, growing the timeline when the pasted range runs past its
    /// end. Skipped rows inside the pasted block stay untouched.
    pub fn paste(&mut self, clipboard: &mut dyn ClipboardPort) -> Result<bool, SplicerError> {
        let strobe = self.selection.strobe();
        let Some(base) = strobe.first() else {
            return Ok(false);
        };
        let data = decode_clip_text(&clipboard.read_text()?)?;
        if data.rows.is_empty() {
            return Ok(false);
        }

        if self.timeline.len() < base + data.range {
            self.timeline.append_empty(base + data.range - self.timeline.len());
            self.sync_marker_size();
        }
        for (offset, joypads) in &data.rows {
            let frame = base + offset;
            for (pad, &bits) in joypads.iter().enumerate() {
                self.timeline.set_joypad(frame, pad, bits)?;
            }
        }
        self.register_change(Change::new(Modification::Paste, base, base + data.range - 1));
        Ok(true)
    }

    /// Inserts the clipboard rows as new frames at the selection head,
    /// pushing existing content down. Gaps leave the corresponding existing
    /// frames in place between the inserted ones.
    pub fn paste_insert(
        &mut self,
        clipboard: &mut dyn ClipboardPort,
    ) -> Result<bool, SplicerError> {
        let strobe = self.selection.strobe();
        let Some(base) = strobe.first() else {
            return Ok(false);
        };
        let data = decode_clip_text(&clipboard.read_text()?)?;
        if data.rows.is_empty() {
            return Ok(false);
        }

        let mut end = base;
        for (offset, joypads) in &data.rows {
            let frame = base + offset;
            if frame > self.timeline.len() {
                let grow = frame - self.timeline.len();
                self.timeline.append_empty(grow);
            }
            self.timeline.insert_empty(frame, 1);
            if self.config.bind_markers {
                self.markers.insert_shift(frame, 1);
            }
            for (pad, &bits) in joypads.iter().enumerate() {
                self.timeline.set_joypad(frame, pad, bits)?;
            }
            end = frame;
        }
        self.sync_marker_size();
        self.register_change(Change::new(Modification::PasteInsert, base, end));
        Ok(true)
    }

    /// Duplicates each run of consecutive selected frames, placing the copy
    /// right after the run.
    pub fn clone_frames(&mut self) {
        let strobe = self.selection.strobe();
        let (Some(first), Some(last)) = (strobe.first(), strobe.last()) else {
            return;
        };
        for (start, len) in strobe.regions_rev() {
            self.timeline.clone_region(start + len, len);
            if self.config.bind_markers {
                self.markers.insert_shift(start, len);
            }
        }
        self.sync_marker_size();
        self.register_change(Change::new(Modification::Clone, first, last));
    }

    /// Inserts one blank frame before each run of consecutive selected
    /// frames.
    pub fn insert_frames(&mut self) {
        let strobe = self.selection.strobe();
        let (Some(first), Some(last)) = (strobe.first(), strobe.last()) else {
            return;
        };
        for (start, len) in strobe.regions_rev() {
            self.timeline.insert_empty(start, len);
            if self.config.bind_markers {
                self.markers.insert_shift(start, len);
            }
        }
        self.sync_marker_size();
        self.register_change(Change::new(Modification::Insert, first, last));
    }

    /// Inserts `count` blank frames at the selection head (or the playback
    /// cursor when nothing is selected) and selects the new rows.
    pub fn insert_num_frames(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let at = self
            .selection
            .first()
            .unwrap_or_else(|| self.playback.cursor());
        self.selection.clear();
        self.insert_frames_at(at, count);
        self.selection.set_region(at, at + count - 1);
    }

    /// Deletes every selected frame. Rejected outright when it would empty
    /// the timeline.
    pub fn delete_frames(&mut self) -> Result<(), TimelineError> {
        let strobe = self.selection.strobe();
        let Some(first) = strobe.first() else {
            return Ok(());
        };
        if strobe.len() >= self.timeline.len() {
            return Err(TimelineError::WouldEmptyTimeline);
        }
        for frame in strobe.iter_rev() {
            self.timeline.erase(frame)?;
            if self.config.bind_markers {
                self.markers.erase_shift(frame, 1);
            }
        }
        self.selection.clear();
        self.register_change(Change::new(Modification::Delete, first, first));
        Ok(())
    }

    /// Truncates after the selection head (or the cursor's frame).
    pub fn truncate_selection(&mut self) -> Result<(), TimelineError> {
        let frame = self
            .selection
            .first()
            .unwrap_or_else(|| self.playback.cursor());
        self.selection.clear();
        self.truncate_at(frame + 1)
    }

    /// Sets or clears one button column across the selection: all unset
    /// selects, all set clears, a mix selects.
    pub fn column_set(&mut self, pad: usize, button: JoypadButtons) {
        let strobe = self.selection.strobe();
        let (Some(first), Some(last)) = (strobe.first(), strobe.last()) else {
            return;
        };
        let set = strobe
            .iter()
            .filter(|&f| {
                self.timeline
                    .record(f)
                    .is_some_and(|r| r.check_button(pad, button))
            })
            .count();
        let unset = strobe.len() - set;
        let new_value = unset != 0;
        for frame in strobe.iter() {
            if frame < self.timeline.len() {
                let _ = self.timeline.set_bit(frame, pad, button, new_value);
            }
        }
        let kind = if new_value {
            Modification::Set
        } else {
            Modification::Unset
        };
        self.register_change(Change::new(kind, first, last));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::test_utils::ReferenceEngine;
    use crate::timeline::InputKind;

    fn session(frames: usize) -> EditingSession {
        EditingSession::new(
            Box::new(ReferenceEngine::new()),
            InputKind::TwoPlayers,
            frames,
            SessionConfig::default(),
        )
    }

    /// The interchange vector from the format definition: frames {5,6,9},
    /// "A" on pad 0 of frame 5, "B" on pad 1 of frame 6, frame 9 blank.
    fn sample_session() -> EditingSession {
        let mut s = session(30);
        s.toggle_input(5, 0, JoypadButtons::BUTTON_A, None).unwrap();
        s.toggle_input(6, 1, JoypadButtons::BUTTON_B, None).unwrap();
        s.selection.select_row(5);
        s.selection.select_row(6);
        s.selection.select_row(9);
        s
    }

    #[test]
    fn test_encode_reference_vector() {
        let s = sample_session();
        let text = encode_selection(s.timeline(), &s.selection.strobe()).unwrap();
        assert_eq!(text, "TAS 5\nA\n|B\n+3|\n");
    }

    #[test]
    fn test_decode_reference_vector() {
        let data = decode_clip_text("TAS 5\nA\n|B\n+3|\n").unwrap();
        assert_eq!(data.range, 5);
        assert_eq!(
            data.rows,
            vec![
                (0, [0x01, 0, 0, 0]),
                (1, [0, 0x02, 0, 0]),
                (4, [0, 0, 0, 0]),
            ]
        );
    }

    #[test]
    fn test_copy_paste_round_trip_with_gaps() {
        let mut s = sample_session();
        let mut clipboard = MemoryClipboard::new();
        assert!(s.copy(&mut clipboard).unwrap());

        // poison the middle of the target region to prove gaps skip it
        s.toggle_input(22, 0, JoypadButtons::START, None).unwrap();

        s.selection.clear();
        s.selection.select_row(20);
        assert!(s.paste(&mut clipboard).unwrap());

        assert!(s.timeline().record(20).unwrap().check_button(0, JoypadButtons::BUTTON_A));
        assert!(s.timeline().record(21).unwrap().check_button(1, JoypadButtons::BUTTON_B));
        assert!(s.timeline().record(24).unwrap().is_blank());
        // skipped frames keep their content
        assert!(s.timeline().record(22).unwrap().check_button(0, JoypadButtons::START));
        assert!(s.timeline().record(23).unwrap().is_blank());
    }

    #[test]
    fn test_paste_extends_timeline_when_needed() {
        let mut s = sample_session();
        let mut clipboard = MemoryClipboard::new();
        s.copy(&mut clipboard).unwrap();

        s.selection.clear();
        s.selection.select_row(28);
        assert!(s.paste(&mut clipboard).unwrap());
        // range 5 pasted at 28 needs frames through 32
        assert_eq!(s.timeline().len(), 33);
        assert!(s.timeline().record(28).unwrap().check_button(0, JoypadButtons::BUTTON_A));
    }

    #[test]
    fn test_paste_without_tag_aborts_untouched(){
        let mut s = session(10);
        s.toggle_input(3, 0, JoypadButtons::UP, None).unwrap();
        let before = s.timeline().clone();

        let mut clipboard = MemoryClipboard::new();
        clipboard.write_text("not movie data at all").unwrap();
        s.selection.select_row(0);
        let err = s.paste(&mut clipboard).unwrap_err();
        assert!(matches!(err, SplicerError::NotTasData));
        assert_eq!(s.timeline(), &before);
    }

    #[test]
    fn test_paste_with_empty_clipboard_fails() {
        let mut s = session(10);
        s.selection.select_row(0);
        let mut clipboard = MemoryClipboard::new();
        assert!(matches!(
            s.paste(&mut clipboard),
            Err(SplicerError::ClipboardUnavailable)
        ));
    }

    #[test]
    fn test_cut_blanks_selection_and_copies() {
        let mut s = sample_session();
        let mut clipboard = MemoryClipboard::new();
        assert!(s.cut(&mut clipboard).unwrap());
        assert!(s.timeline().record(5).unwrap().is_blank());
        assert!(s.timeline().record(6).unwrap().is_blank());
        assert_eq!(s.undo_description(), Some("Cut".into()));
        // the cut content is on the clipboard
        assert!(clipboard.read_text().unwrap().starts_with("TAS 5\n"));
    }

    #[test]
    fn test_paste_insert_pushes_existing_frames_down() {
        let mut s = sample_session();
        let mut clipboard = MemoryClipboard::new();
        s.copy(&mut clipboard).unwrap();

        s.toggle_input(20, 0, JoypadButtons::SELECT, None).unwrap();
        s.selection.clear();
        s.selection.select_row(20);
        assert!(s.paste_insert(&mut clipboard).unwrap());

        // three rows inserted at 20, 21 and 24
        assert!(s.timeline().record(20).unwrap().check_button(0, JoypadButtons::BUTTON_A));
        assert!(s.timeline().record(21).unwrap().check_button(1, JoypadButtons::BUTTON_B));
        assert!(s.timeline().record(24).unwrap().is_blank());
        // the old frame 20 slid behind the first two inserted rows
        assert!(s.timeline().record(22).unwrap().check_button(0, JoypadButtons::SELECT));
        assert_eq!(s.timeline().len(), 33);
    }

    #[test]
    fn test_clone_frames_duplicates_regions() {
        let mut s = session(20);
        s.toggle_input(4, 0, JoypadButtons::BUTTON_A, None).unwrap();
        s.toggle_input(5, 0, JoypadButtons::BUTTON_B, None).unwrap();
        s.selection.set_region(4, 5);
        s.clone_frames();
        assert_eq!(s.timeline().len(), 22);
        for frame in [4, 6] {
            assert!(s.timeline().record(frame).unwrap().check_button(0, JoypadButtons::BUTTON_A));
            assert!(s.timeline().record(frame + 1).unwrap().check_button(0, JoypadButtons::BUTTON_B));
        }
        assert_eq!(s.undo_description(), Some("Clone".into()));
    }

    #[test]
    fn test_delete_frames_guards_empty_timeline() {
        let mut s = session(3);
        s.selection.select_all(3);
        assert_eq!(s.delete_frames(), Err(TimelineError::WouldEmptyTimeline));
        assert_eq!(s.timeline().len(), 3);

        s.selection.clear();
        s.selection.set_region(0, 1);
        assert_eq!(s.delete_frames(), Ok(()));
        assert_eq!(s.timeline().len(), 1);
        assert!(s.selection.is_empty());
    }

    #[test]
    fn test_column_set_tristate() {
        let mut s = session(10);
        s.selection.set_region(2, 4);

        // mixed -> set all
        s.toggle_input(2, 0, JoypadButtons::BUTTON_A, None).unwrap();
        s.column_set(0, JoypadButtons::BUTTON_A);
        for frame in 2..=4 {
            assert!(s.timeline().record(frame).unwrap().check_button(0, JoypadButtons::BUTTON_A));
        }

        // all set -> unset all
        s.column_set(0, JoypadButtons::BUTTON_A);
        for frame in 2..=4 {
            assert!(!s.timeline().record(frame).unwrap().check_button(0, JoypadButtons::BUTTON_A));
        }

        // all unset -> set all
        s.column_set(0, JoypadButtons::BUTTON_A);
        assert!(s.timeline().record(3).unwrap().check_button(0, JoypadButtons::BUTTON_A));
    }

    #[test]
    fn test_fourscore_encoding_uses_double_separators() {
        let mut s = EditingSession::new(
            Box::new(ReferenceEngine::new()),
            InputKind::FourScore,
            10,
            SessionConfig::default(),
        );
        s.toggle_input(2, 2, JoypadButtons::UP, None).unwrap();
        s.selection.select_row(2);
        let text = encode_selection(s.timeline(), &s.selection.strobe()).unwrap();
        assert_eq!(text, "TAS 1\n||U\n");

        let data = decode_clip_text(&text).unwrap();
        assert_eq!(data.rows, vec![(0, [0, 0, 0x10, 0])]);
    }

    #[test]
    fn test_insert_num_frames_selects_inserted_rows() {
        let mut s = session(10);
        s.selection.select_row(4);
        s.insert_num_frames(3);
        assert_eq!(s.timeline().len(), 13);
        assert_eq!(s.selection.strobe().iter().collect::<Vec<_>>(), vec![4, 5, 6]);
    }
}
