use tas_core::batch::EditTarget;
use tas_core::timeline::JoypadButtons;

/// Everything the shell can ask the editing runtime to do.
pub enum EditorCommand {
    // input editing
    ToggleInput {
        frame: usize,
        pad: usize,
        button: JoypadButtons,
        drag: Option<u64>,
    },
    ColumnSet {
        pad: usize,
        button: JoypadButtons,
    },

    // selection
    SelectRow(usize),
    ToggleRow(usize),
    SetRegion {
        start: usize,
        end: usize,
    },
    SetRegionStride {
        start: usize,
        end: usize,
        stride: usize,
    },
    SelectAll,
    ClearSelection,

    // splicing
    Copy,
    Cut,
    Paste,
    PasteInsert,
    CloneFrames,
    InsertFrames,
    InsertNumFrames(usize),
    DeleteFrames,
    ClearFrames,
    Truncate,

    // playback
    Jump(usize),
    Play,
    Pause,
    StopSeeking,

    // history
    Undo,
    Redo,

    // markers
    SetMarker(usize),
    RemoveMarker(usize),
    SetNote {
        id: u32,
        text: String,
    },

    // scripted batch edits
    SubmitInputChange {
        frame: usize,
        target: EditTarget,
        bits: u8,
    },
    SubmitInsertFrames {
        frame: usize,
        count: usize,
    },
    SubmitDeleteFrames {
        frame: usize,
        count: usize,
    },
    ApplyInputChanges(String),
    ClearInputChanges,

    // housekeeping
    LockGreenzone(usize),
    SaveProject,
    LoadProject(Vec<u8>),
}
