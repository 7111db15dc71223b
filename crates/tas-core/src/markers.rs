/// Sparse named annotations bound to frames.
///
/// `slots[frame]` holds a marker id, 0 meaning "no marker". Note text lives
/// in an id-indexed table so it survives the marker being dragged between
/// frames. Under the bind-markers policy the session mirrors structural
/// timeline edits into `insert_shift` / `erase_shift`; with the policy off,
/// markers stay frame-pinned and may end up orphaned past the timeline end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markers {
    slots: Vec<u32>,
    notes: Vec<String>,
}

pub const MAX_NOTE_LEN: usize = 100;

impl Markers {
    pub fn new() -> Markers {
        Markers {
            slots: Vec::new(),
            // id 0 is reserved for "no marker"
            notes: vec![String::new()],
        }
    }

    pub fn from_parts(slots: Vec<u32>, mut notes: Vec<String>) -> Markers {
        if notes.is_empty() {
            notes.push(String::new());
        }
        Markers { slots, notes }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn marker_count(&self) -> usize {
        self.slots.iter().filter(|&&id| id != 0).count()
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Grows or shrinks the frame-indexed slot array. Shrinking drops
    /// markers past the new size.
    pub fn set_size(&mut self, frames: usize) {
        self.slots.resize(frames, 0);
    }

    pub fn get_marker(&self, frame: usize) -> u32 {
        self.slots.get(frame).copied().unwrap_or(0)
    }

    /// Places a marker at `frame`, returning its id. Placing on an already
    /// marked frame returns the existing id.
    pub fn set_marker(&mut self, frame: usize) -> u32 {
        if self.slots.len() <= frame {
            self.slots.resize(frame + 1, 0);
        }
        if self.slots[frame] != 0 {
            return self.slots[frame];
        }
        let id = self.notes.len() as u32;
        self.notes.push(String::new());
        self.slots[frame] = id;
        id
    }

    /// Removes the marker at `frame`, if any. The note text stays in the
    /// table so undo can bring the marker back intact.
    pub fn clear_marker(&mut self, frame: usize) -> bool {
        match self.slots.get_mut(frame) {
            Some(slot) if *slot != 0 => {
                *slot = 0;
                true
            }
            _ => false,
        }
    }

    /// Frame currently holding marker `id`, if it is placed anywhere.
    pub fn marker_frame(&self, id: u32) -> Option<usize> {
        if id == 0 {
            return None;
        }
        self.slots.iter().position(|&slot| slot == id)
    }

    pub fn note(&self, id: u32) -> &str {
        self.notes
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Replaces a marker's note, truncated to `MAX_NOTE_LEN`. Returns false
    /// when the text did not change.
    pub fn set_note(&mut self, id: u32, text: &str) -> bool {
        let Some(slot) = self.notes.get_mut(id as usize) else {
            return false;
        };
        let mut text = text.to_owned();
        if text.len() > MAX_NOTE_LEN {
            let mut cut = MAX_NOTE_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        if *slot == text {
            return false;
        }
        *slot = text;
        true
    }

    /// Mirrors a structural timeline insert: shifts markers at or after `at`
    /// up by `count` frames.
    pub fn insert_shift(&mut self, at: usize, count: usize) {
        if at >= self.slots.len() {
            return;
        }
        self.slots.splice(at..at, std::iter::repeat_n(0, count));
    }

    /// Mirrors a structural timeline erase: markers inside the erased range
    /// are dropped, later ones shift down.
    pub fn erase_shift(&mut self, at: usize, count: usize) {
        if at >= self.slots.len() {
            return;
        }
        let end = (at + count).min(self.slots.len());
        self.slots.drain(at..end);
    }

    /// Swaps the markers of two frames (marker drag-and-drop).
    pub fn swap_markers(&mut self, a: usize, b: usize) -> bool {
        let len = self.slots.len();
        if a >= len || b >= len || a == b {
            return false;
        }
        if self.slots[a] == 0 && self.slots[b] == 0 {
            return false;
        }
        self.slots.swap(a, b);
        true
    }

    /// Moves the marker at `from` onto `to`, replacing whatever was there.
    pub fn drag_marker(&mut self, from: usize, to: usize) -> bool {
        if from == to || self.get_marker(from) == 0 {
            return false;
        }
        if self.slots.len() <= to {
            self.slots.resize(to + 1, 0);
        }
        self.slots[to] = self.slots[from];
        self.slots[from] = 0;
        true
    }
}
