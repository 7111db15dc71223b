//! Convenient imports for consumers of tas-core
//!
//! Pull in everything commonly needed in one line:
//! ```rust
//! use tas_core::prelude::*;
//! ```

// Main editing session API
pub use crate::session::{EditingSession, SessionConfig};

// The engine boundary
pub use crate::engine::{EmulationEngine, EngineError};

// Timeline types
pub use crate::timeline::{
    CommandFlags, FrameRecord, InputKind, JoypadButtons, Timeline, TimelineError,
};

// Managers reachable through the session
pub use crate::greenzone::{Greenzone, Snapshot};
pub use crate::history::{Change, Modification, RegisterOutcome};
pub use crate::markers::Markers;
pub use crate::playback::{JumpOutcome, Playback, PlaybackError, PlaybackState, TickOutcome};
pub use crate::selection::{Selection, Strobe};

// Splicing and scripted edits
pub use crate::batch::{EditTarget, PendingEdit};
pub use crate::splicer::{ClipboardPort, MemoryClipboard, SplicerError};

// Persistence
pub use crate::project::{ProjectData, ProjectError};

// Conditional testing utilities
#[cfg(any(test, feature = "testing-utils"))]
pub use crate::test_utils::*;
