use crate::markers::Markers;
use crate::timeline::Timeline;
use std::time::SystemTime;

pub const DEFAULT_UNDO_LEVELS: usize = 100;

/// Everything a single undoable change can be.
///
/// Pure kinds touch input bytes only; structural kinds change the timeline
/// length and shift every downstream frame, marker and snapshot slot.
/// Marker kinds touch no timeline bytes at all, so registering one reports
/// no frame to invalidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modification {
    Set,
    Unset,
    Clear,
    Cut,
    Paste,
    PasteInsert,
    Insert,
    Delete,
    Clone,
    Truncate,
    MarkerSet,
    MarkerRemove,
    MarkerRename,
    MarkerSwap,
    MarkerDrag,
    Batch { name: String, structural: bool },
}

impl Modification {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Modification::PasteInsert
                | Modification::Insert
                | Modification::Delete
                | Modification::Clone
                | Modification::Truncate
                | Modification::Batch {
                    structural: true,
                    ..
                }
        )
    }

    pub fn is_marker_only(&self) -> bool {
        matches!(
            self,
            Modification::MarkerSet
                | Modification::MarkerRemove
                | Modification::MarkerRename
                | Modification::MarkerSwap
                | Modification::MarkerDrag
        )
    }

    pub fn description(&self) -> String {
        match self {
            Modification::Set => "Set".into(),
            Modification::Unset => "Unset".into(),
            Modification::Clear => "Clear".into(),
            Modification::Cut => "Cut".into(),
            Modification::Paste => "Paste".into(),
            Modification::PasteInsert => "Paste-Insert".into(),
            Modification::Insert => "Insert".into(),
            Modification::Delete => "Delete".into(),
            Modification::Clone => "Clone".into(),
            Modification::Truncate => "Truncate".into(),
            Modification::MarkerSet => "Marker Set".into(),
            Modification::MarkerRemove => "Marker Remove".into(),
            Modification::MarkerRename => "Marker Rename".into(),
            Modification::MarkerSwap => "Marker Swap".into(),
            Modification::MarkerDrag => "Marker Drag".into(),
            Modification::Batch { name, .. } => format!("Batch: {name}"),
        }
    }
}

/// A change about to be registered: the kind, the frame range it claims to
/// touch, and an optional coalesce key identifying a continuous edit session
/// (one mouse drag of input drawing).
#[derive(Clone, Debug)]
pub struct Change {
    pub kind: Modification,
    pub start: usize,
    pub end: usize,
    pub coalesce: Option<u64>,
}

impl Change {
    pub fn new(kind: Modification, start: usize, end: usize) -> Change {
        Change {
            kind,
            start,
            end,
            coalesce: None,
        }
    }

    pub fn coalescing(mut self, key: u64) -> Change {
        self.coalesce = Some(key);
        self
    }
}

struct HistoryEntry {
    kind: Modification,
    start: usize,
    end: usize,
    coalesce: Option<u64>,
    #[allow(dead_code)]
    created_at: SystemTime,
    // Full captures of the post-change state. Undo/redo restore these
    // wholesale and diff neighbouring entries to find the earliest stale
    // frame.
    log: Timeline,
    markers: Markers,
}

impl HistoryEntry {
    fn capture(change: Change, timeline: &Timeline, markers: &Markers) -> HistoryEntry {
        HistoryEntry {
            kind: change.kind,
            start: change.start,
            end: change.end,
            coalesce: change.coalesce,
            created_at: SystemTime::now(),
            log: timeline.clone(),
            markers: markers.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The change was recorded. `invalidate_from` is the earliest stale
    /// frame, or `None` for changes touching no timeline bytes.
    Applied { invalidate_from: Option<usize> },
    /// The edit changed nothing; nothing was recorded.
    NoOp,
}

/// State handed back by undo/redo for the session to install.
pub struct RestorePoint {
    pub timeline: Timeline,
    pub markers: Markers,
    /// Earliest frame whose input differs from the replaced state, `None`
    /// for marker-only traversal.
    pub invalidate_from: Option<usize>,
    /// Human-readable name of the traversed entry.
    pub description: String,
}

/// Undo stack with a cursor.
///
/// Entry 0 is the anchor capture of the session's initial state and is never
/// popped. Registering while the cursor sits below the top discards the redo
/// tail, except that a change sharing the top entry's coalesce key and
/// touching an adjacent range folds into it in place.
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    limit: usize,
}

impl History {
    pub fn new(limit: usize, timeline: &Timeline, markers: &Markers) -> History {
        let anchor = HistoryEntry::capture(
            Change::new(Modification::Clear, 0, 0),
            timeline,
            markers,
        );
        History {
            entries: vec![anchor],
            cursor: 0,
            limit: limit.max(2),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn depth(&self) -> usize {
        self.entries.len() - 1
    }

    /// Description of the entry undo would traverse, if any.
    pub fn undo_description(&self) -> Option<String> {
        if self.can_undo() {
            Some(self.entries[self.cursor].kind.description())
        } else {
            None
        }
    }

    pub fn redo_description(&self) -> Option<String> {
        if self.can_redo() {
            Some(self.entries[self.cursor + 1].kind.description())
        } else {
            None
        }
    }

    /// Records the state reached after a mutation. Compares against the
    /// current entry: a change that altered zero bytes and zero markers is
    /// dropped so it never pollutes the stack.
    pub fn register(
        &mut self,
        change: Change,
        timeline: &Timeline,
        markers: &Markers,
    ) -> RegisterOutcome {
        let current = &self.entries[self.cursor];
        let input_change = timeline.first_difference(&current.log);
        let markers_changed = *markers != current.markers;
        if input_change.is_none() && !markers_changed {
            log::debug!("history: {} changed nothing, skipped", change.kind.description());
            return RegisterOutcome::NoOp;
        }

        if self.try_coalesce(&change, timeline, markers) {
            return RegisterOutcome::Applied {
                invalidate_from: input_change,
            };
        }

        // Discard the redo tail, append at the cursor
        self.entries.truncate(self.cursor + 1);
        self.entries
            .push(HistoryEntry::capture(change, timeline, markers));
        self.cursor += 1;

        // Keep the anchor, drop the oldest real entry when over the limit
        if self.entries.len() > self.limit {
            self.entries.remove(1);
            self.cursor -= 1;
        }

        RegisterOutcome::Applied {
            invalidate_from: input_change,
        }
    }

    fn try_coalesce(&mut self, change: &Change, timeline: &Timeline, markers: &Markers) -> bool {
        let Some(key) = change.coalesce else {
            return false;
        };
        // Only the live top of the stack can absorb a continuation
        if self.cursor == 0 || self.cursor + 1 != self.entries.len() {
            return false;
        }
        let top = &mut self.entries[self.cursor];
        if top.coalesce != Some(key) || top.kind != change.kind {
            return false;
        }
        let adjacent = change.start <= top.end + 1 && top.start <= change.end + 1;
        if !adjacent {
            return false;
        }
        top.start = top.start.min(change.start);
        top.end = top.end.max(change.end);
        top.log = timeline.clone();
        top.markers = markers.clone();
        true
    }

    pub fn undo(&mut self) -> Option<RestorePoint> {
        if !self.can_undo() {
            return None;
        }
        let undone = &self.entries[self.cursor];
        let target = &self.entries[self.cursor - 1];
        let invalidate_from = undone.log.first_difference(&target.log);
        let description = undone.kind.description();
        self.cursor -= 1;
        let target = &self.entries[self.cursor];
        Some(RestorePoint {
            timeline: target.log.clone(),
            markers: target.markers.clone(),
            invalidate_from,
            description,
        })
    }

    pub fn redo(&mut self) -> Option<RestorePoint> {
        if !self.can_redo() {
            return None;
        }
        let current = &self.entries[self.cursor];
        let target = &self.entries[self.cursor + 1];
        let invalidate_from = current.log.first_difference(&target.log);
        self.cursor += 1;
        let target = &self.entries[self.cursor];
        Some(RestorePoint {
            timeline: target.log.clone(),
            markers: target.markers.clone(),
            invalidate_from,
            description: target.kind.description(),
        })
    }
}
