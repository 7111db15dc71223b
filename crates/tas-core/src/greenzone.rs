use crate::engine::EmulationEngine;

/// Default ceiling on retained snapshots before thinning kicks in.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Snapshots within this many frames of the green edge are never thinned.
pub const DEFAULT_RETENTION: usize = 600;

/// One frame's worth of recoverable emulation state.
///
/// `state` is the opaque engine blob; it may legitimately be empty for an
/// engine with no state, which is why stored-vs-missing is tracked by the
/// `Option` slot (and a dedicated sentinel in the project file), never by
/// blob length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub state: Vec<u8>,
    pub lagged: bool,
    pub thumbnail: Vec<u8>,
}

impl Snapshot {
    /// Captures the engine state at the start of a frame.
    pub fn capture(engine: &dyn EmulationEngine, lagged: bool) -> Snapshot {
        Snapshot {
            state: engine.serialize_state(),
            lagged,
            thumbnail: engine.display_capture(),
        }
    }
}

/// Sparse ladder of savestates, one optional slot per frame.
///
/// Slot `i` holds the engine state at the start of frame `i`, i.e. before the
/// input of frame `i` is applied. `green_count` is the exclusive upper bound
/// of frames that may have a snapshot: a snapshot at `i < green_count` was
/// taken while the timeline held exactly the current prefix `[0, i)`, so any
/// input change at frame `f` forces `invalidate_from(f)`.
///
/// Re-running from frame 0 is always the correctness-preserving fallback;
/// the ladder only bounds replay cost to the gap between retained snapshots.
#[derive(Debug)]
pub struct Greenzone {
    slots: Vec<Option<Snapshot>>,
    green_count: usize,
    capacity: usize,
    retention: usize,
    thin_stride: usize,
}

impl Default for Greenzone {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RETENTION)
    }
}

impl Greenzone {
    pub fn new(capacity: usize, retention: usize) -> Greenzone {
        Greenzone {
            slots: Vec::new(),
            green_count: 0,
            capacity: capacity.max(1),
            retention,
            thin_stride: 1,
        }
    }

    /// Rebuilds a greenzone from persisted slots.
    pub fn from_parts(green_count: usize, slots: Vec<Option<Snapshot>>) -> Greenzone {
        let mut zone = Greenzone::default();
        zone.slots = slots;
        zone.slots.resize(green_count.max(zone.slots.len()), None);
        zone.green_count = green_count;
        zone
    }

    pub fn green_count(&self) -> usize {
        self.green_count
    }

    pub fn snapshot(&self, frame: usize) -> Option<&Snapshot> {
        self.slots.get(frame)?.as_ref()
    }

    pub fn was_lagged(&self, frame: usize) -> Option<bool> {
        Some(self.snapshot(frame)?.lagged)
    }

    pub fn stored_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Stores a snapshot for `frame` and extends the green region over it.
    pub fn capture(&mut self, frame: usize, snapshot: Snapshot) {
        if self.slots.len() <= frame {
            self.slots.resize(frame + 1, None);
        }
        self.slots[frame] = Some(snapshot);
        self.green_count = self.green_count.max(frame + 1);
        if self.stored_count() > self.capacity {
            self.thin();
        }
    }

    /// Clears every snapshot at index >= `frame` and clamps the green region.
    pub fn invalidate_from(&mut self, frame: usize) {
        for slot in self.slots.iter_mut().skip(frame) {
            *slot = None;
        }
        self.green_count = self.green_count.min(frame);
    }

    /// Drops all snapshots strictly before `frame` to reclaim memory.
    /// Frame 0 stays recoverable through a cold power-on.
    pub fn lock_before(&mut self, frame: usize) {
        let end = frame.min(self.slots.len());
        for slot in self.slots.iter_mut().take(end) {
            *slot = None;
        }
    }

    /// Highest frame <= `frame` holding a snapshot, or `None` when playback
    /// must fall back to a cold power-on.
    pub fn nearest_at_or_before(&self, frame: usize) -> Option<usize> {
        let start = frame.min(self.green_count.checked_sub(1)?);
        (0..=start).rev().find(|&f| self.snapshot(f).is_some())
    }

    /// Lowest frame >= `from` holding a snapshot inside the green region.
    pub fn first_green(&self, from: usize) -> Option<usize> {
        (from..self.green_count).find(|&f| self.snapshot(f).is_some())
    }

    /// Thins old snapshots by doubling the retained stride each pass. The
    /// most recent `retention` frames keep full density.
    fn thin(&mut self) {
        while self.stored_count() > self.capacity {
            self.thin_stride *= 2;
            let protected = self.green_count.saturating_sub(self.retention);
            let mut dropped = 0;
            for frame in 0..protected.min(self.slots.len()) {
                if frame % self.thin_stride != 0 && self.slots[frame].is_some() {
                    self.slots[frame] = None;
                    dropped += 1;
                }
            }
            log::debug!(
                "greenzone thinned: stride {}, dropped {}, {} retained",
                self.thin_stride,
                dropped,
                self.stored_count()
            );
            if dropped == 0 {
                // Everything left is inside the protected window
                break;
            }
        }
    }

    /// Snapshot slots for persistence: one entry per frame below the green
    /// edge, `None` marking thinned or invalidated slots.
    pub fn window(&self) -> impl Iterator<Item = Option<&Snapshot>> {
        self.slots.iter().take(self.green_count).map(|s| s.as_ref())
    }
}
