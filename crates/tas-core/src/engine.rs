use crate::timeline::FrameRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state blob rejected by the emulation engine: {0}")]
    BadStateBlob(String),
}

/// Boundary to the emulation core.
///
/// The editing session owns exactly one engine and re-enters it serially;
/// capture, restore and stepping are never interleaved. The engine reads
/// input records but never owns the timeline.
pub trait EmulationEngine {
    /// Resets the engine to its power-on state (frame 0, before any input).
    fn cold_power_on(&mut self);

    /// Serializes the full engine state into an opaque blob.
    fn serialize_state(&self) -> Vec<u8>;

    /// Restores a state previously produced by `serialize_state`.
    fn restore_state(&mut self, blob: &[u8]) -> Result<(), EngineError>;

    /// Runs one frame with the given input record.
    ///
    /// Returns `true` if the emulated game did not poll input this frame
    /// (a lag frame).
    fn step_frame(&mut self, record: &FrameRecord) -> bool;

    /// Small fixed-size capture of the current display, kept alongside
    /// snapshots for bookmark thumbnails. May be empty if the engine has no
    /// video output.
    fn display_capture(&self) -> Vec<u8>;
}
