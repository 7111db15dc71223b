// TAS editing core modules
pub mod batch;
pub mod engine;
pub mod greenzone;
pub mod history;
pub mod markers;
pub mod playback;
pub mod project;
pub mod selection;
pub mod session;
pub mod splicer;
pub mod timeline;

#[cfg(any(test, feature = "testing-utils"))]
pub mod test_utils;

pub mod prelude;

// Re-exports
pub use session::{EditingSession, SessionConfig};

pub use engine::{EmulationEngine, EngineError};
pub use timeline::{FrameRecord, InputKind, JoypadButtons, Timeline, TimelineError};
