use crate::greenzone::{Greenzone, Snapshot};
use crate::history::History;
use crate::markers::Markers;
use crate::playback::Playback;
use crate::session::EditingSession;
use crate::timeline::{CommandFlags, FrameRecord, InputKind, Timeline};
use thiserror::Error;

const PROJECT_MAGIC: &[u8; 4] = b"TAS\x1A";
const PROJECT_VERSION: u8 = 1;

/// Slot markers in the snapshot table. `SLOT_SKIP` means "no data here",
/// which is not the same thing as a present snapshot whose engine blob
/// happens to be zero bytes long.
const SLOT_SKIP: u8 = 0x00;
const SLOT_PRESENT: u8 = 0x01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("not a TAS project file")]
    BadMagic,

    #[error("unsupported project version: v{0}")]
    UnsupportedVersion(u8),

    #[error("project file is truncated")]
    Truncated,

    #[error("unknown input type: {0}")]
    BadInputKind(u8),

    #[error("marker note is not valid UTF-8")]
    BadNoteText,

    #[error("corrupt snapshot table")]
    BadSnapshotTable,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProjectError> {
        let end = self.pos.checked_add(n).ok_or(ProjectError::Truncated)?;
        if end > self.bytes.len() {
            return Err(ProjectError::Truncated);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ProjectError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ProjectError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    push_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

/// Everything a project file holds.
#[derive(Debug)]
pub struct ProjectData {
    pub timeline: Timeline,
    pub markers: Markers,
    pub green_count: usize,
    pub slots: Vec<Option<Snapshot>>,
}

pub fn encode_project(timeline: &Timeline, markers: &Markers, greenzone: &Greenzone) -> Vec<u8> {
    let pads = timeline.input_kind().joypad_count();
    let mut out = Vec::new();
    out.extend_from_slice(PROJECT_MAGIC);
    out.push(PROJECT_VERSION);
    out.push(timeline.input_kind().to_u8());

    push_u32(&mut out, timeline.len() as u32);
    for record in timeline.records() {
        out.push(record.commands.bits());
        out.extend_from_slice(&record.joypads[..pads]);
    }

    push_u32(&mut out, markers.len() as u32);
    for &slot in markers.slots() {
        push_u32(&mut out, slot);
    }
    push_u32(&mut out, markers.notes().len() as u32);
    for note in markers.notes() {
        push_bytes(&mut out, note.as_bytes());
    }

    push_u32(&mut out, greenzone.green_count() as u32);
    for slot in greenzone.window() {
        match slot {
            None => out.push(SLOT_SKIP),
            Some(snapshot) => {
                out.push(SLOT_PRESENT);
                out.push(u8::from(snapshot.lagged));
                push_bytes(&mut out, &snapshot.state);
                push_bytes(&mut out, &snapshot.thumbnail);
            }
        }
    }
    out
}

/// Parses a project file. The timeline and marker sections are strict; a
/// damaged snapshot table degrades to an empty greenzone so the caller can
/// still open the project and reseek from frame 0.
pub fn decode_project(bytes: &[u8]) -> Result<ProjectData, ProjectError> {
    let mut reader = Reader::new(bytes);
    if reader.take(4)? != PROJECT_MAGIC {
        return Err(ProjectError::BadMagic);
    }
    let version = reader.u8()?;
    if version != PROJECT_VERSION {
        return Err(ProjectError::UnsupportedVersion(version));
    }
    let kind_byte = reader.u8()?;
    let kind = InputKind::from_u8(kind_byte).ok_or(ProjectError::BadInputKind(kind_byte))?;
    let pads = kind.joypad_count();

    let frames = reader.u32()? as usize;
    let mut records = Vec::with_capacity(frames.min(1 << 20));
    for _ in 0..frames {
        let mut record = FrameRecord::blank();
        record.commands = CommandFlags::from_bits_truncate(reader.u8()?);
        let pad_bytes = reader.take(pads)?;
        record.joypads[..pads].copy_from_slice(pad_bytes);
        records.push(record);
    }
    let timeline = Timeline::from_records(kind, records);

    let slot_count = reader.u32()? as usize;
    let mut marker_slots = Vec::with_capacity(slot_count.min(1 << 20));
    for _ in 0..slot_count {
        marker_slots.push(reader.u32()?);
    }
    let note_count = reader.u32()? as usize;
    let mut notes = Vec::with_capacity(note_count.min(1 << 16));
    for _ in 0..note_count {
        let len = reader.u32()? as usize;
        let text = String::from_utf8(reader.take(len)?.to_vec())
            .map_err(|_| ProjectError::BadNoteText)?;
        notes.push(text);
    }
    let markers = Markers::from_parts(marker_slots, notes);

    let (green_count, slots) = match decode_snapshot_table(&mut reader) {
        Ok(table) => table,
        Err(err) => {
            log::warn!("snapshot table unreadable ({err}), project opens at frame 0");
            (0, Vec::new())
        }
    };

    Ok(ProjectData {
        timeline,
        markers,
        green_count,
        slots,
    })
}

fn decode_snapshot_table(
    reader: &mut Reader<'_>,
) -> Result<(usize, Vec<Option<Snapshot>>), ProjectError> {
    let green_count = reader.u32()? as usize;
    let mut slots = Vec::with_capacity(green_count.min(1 << 20));
    for _ in 0..green_count {
        match reader.u8()? {
            SLOT_SKIP => slots.push(None),
            SLOT_PRESENT => {
                let lagged = reader.u8()? != 0;
                let state_len = reader.u32()? as usize;
                let state = reader.take(state_len)?.to_vec();
                let thumb_len = reader.u32()? as usize;
                let thumbnail = reader.take(thumb_len)?.to_vec();
                slots.push(Some(Snapshot {
                    state,
                    lagged,
                    thumbnail,
                }));
            }
            _ => return Err(ProjectError::BadSnapshotTable),
        }
    }
    Ok((green_count, slots))
}

impl EditingSession {
    /// Serializes timeline, markers and the greenzone window.
    pub fn serialize_project(&self) -> Vec<u8> {
        encode_project(&self.timeline, &self.markers, &self.greenzone)
    }

    /// Replaces the session content with a parsed project file. On any parse
    /// error the session is left exactly as it was. History restarts with
    /// the loaded state as its anchor and the cursor reseeks to frame 0.
    pub fn load_project(&mut self, bytes: &[u8]) -> Result<(), ProjectError> {
        let data = decode_project(bytes)?;

        self.timeline = data.timeline;
        self.markers = data.markers;
        self.greenzone = Greenzone::from_parts(data.green_count, data.slots);
        self.history = History::new(self.config.undo_levels, &self.timeline, &self.markers);
        self.selection.clear();
        self.pending.clear();
        self.playback = Playback::new();
        if let Err(err) = self.jump(0) {
            log::warn!("reseek to frame 0 after load failed: {err}");
        }
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::test_utils::ReferenceEngine;
    use crate::timeline::JoypadButtons;

    fn session(frames: usize) -> EditingSession {
        EditingSession::new(
            Box::new(ReferenceEngine::new()),
            InputKind::TwoPlayers,
            frames,
            SessionConfig::default(),
        )
    }

    fn populated_session() -> EditingSession {
        let mut s = session(40);
        s.toggle_input(3, 0, JoypadButtons::BUTTON_A, None).unwrap();
        s.toggle_input(17, 1, JoypadButtons::DOWN, None).unwrap();
        let id = s.set_marker(17);
        s.set_note(id, "checkpoint");
        s.jump(25).unwrap();
        s
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let mut original = populated_session();
        original.lock_greenzone(10);
        let bytes = original.serialize_project();

        let mut loaded = session(1);
        loaded.load_project(&bytes).unwrap();

        assert_eq!(loaded.timeline(), original.timeline());
        assert_eq!(loaded.markers(), original.markers());
        assert_eq!(
            loaded.greenzone().green_count(),
            original.greenzone().green_count()
        );
        // the locked gap stays a gap, the surviving rungs survive
        assert!(loaded.greenzone().snapshot(5).is_none());
        assert!(loaded.greenzone().snapshot(12).is_some());
        assert_eq!(loaded.playback().cursor(), 0);
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn test_skip_sentinel_differs_from_empty_snapshot() {
        let mut zone = Greenzone::default();
        zone.capture(
            0,
            Snapshot {
                state: Vec::new(),
                lagged: false,
                thumbnail: Vec::new(),
            },
        );
        zone.capture(2, Snapshot {
            state: vec![1, 2, 3],
            lagged: true,
            thumbnail: Vec::new(),
        });
        let timeline = Timeline::new(InputKind::OnePlayer, 3);
        let markers = Markers::new();
        let bytes = encode_project(&timeline, &markers, &zone);

        let data = decode_project(&bytes).unwrap();
        assert_eq!(data.green_count, 3);
        // frame 0: present with a zero-length blob
        assert_eq!(data.slots[0].as_ref().unwrap().state, Vec::<u8>::new());
        // frame 1: skipped entirely
        assert!(data.slots[1].is_none());
        assert!(data.slots[2].as_ref().unwrap().lagged);
    }

    #[test]
    fn test_bad_magic_leaves_session_untouched() {
        let mut s = populated_session();
        let cursor = s.playback().cursor();
        let err = s.load_project(b"garbage").unwrap_err();
        assert_eq!(err, ProjectError::BadMagic);
        assert_eq!(s.playback().cursor(), cursor);
        assert_eq!(s.timeline().len(), 40);
    }

    #[test]
    fn test_truncated_timeline_is_an_error() {
        let original = populated_session();
        let bytes = original.serialize_project();
        let err = decode_project(&bytes[..20]).unwrap_err();
        assert_eq!(err, ProjectError::Truncated);
    }

    #[test]
    fn test_corrupt_snapshot_table_degrades_to_frame_zero() {
        let original = populated_session();
        let mut bytes = original.serialize_project();
        // the snapshot table sits at the tail; chop into it
        bytes.truncate(bytes.len() - 7);

        let mut loaded = session(1);
        loaded.load_project(&bytes).unwrap();
        assert_eq!(loaded.timeline(), original.timeline());
        // greenzone fell back to a cold boot at frame 0
        assert_eq!(loaded.playback().cursor(), 0);
        assert!(loaded.greenzone().green_count() <= 1);
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let mut s = session(10);
        assert!(!s.is_dirty());
        s.toggle_input(2, 0, JoypadButtons::BUTTON_A, None).unwrap();
        assert!(s.is_dirty());

        let bytes = s.serialize_project();
        s.mark_saved();
        assert!(!s.is_dirty());

        s.undo().unwrap();
        assert!(s.is_dirty(), "undo makes the project differ from disk");

        s.load_project(&bytes).unwrap();
        assert!(!s.is_dirty());
    }
}
