//! Deterministic stand-ins for the emulation core, for tests and the
//! headless shell.

use crate::engine::{EmulationEngine, EngineError};
use crate::timeline::FrameRecord;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A tiny deterministic "console": its whole state is a frame counter and a
/// running hash of every input byte ever fed in. Two replays of the same
/// input prefix always land in the same state, which is exactly the
/// property the snapshot ladder relies on.
pub struct ReferenceEngine {
    frame: u64,
    acc: u64,
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceEngine {
    pub fn new() -> ReferenceEngine {
        ReferenceEngine {
            frame: 0,
            acc: FNV_OFFSET,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl EmulationEngine for ReferenceEngine {
    fn cold_power_on(&mut self) {
        self.frame = 0;
        self.acc = FNV_OFFSET;
    }

    fn serialize_state(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(16);
        blob.extend_from_slice(&self.frame.to_le_bytes());
        blob.extend_from_slice(&self.acc.to_le_bytes());
        blob
    }

    fn restore_state(&mut self, blob: &[u8]) -> Result<(), EngineError> {
        if blob.len() != 16 {
            return Err(EngineError::BadStateBlob(format!(
                "expected 16 bytes, got {}",
                blob.len()
            )));
        }
        self.frame = u64::from_le_bytes(blob[0..8].try_into().unwrap_or_default());
        self.acc = u64::from_le_bytes(blob[8..16].try_into().unwrap_or_default());
        Ok(())
    }

    fn step_frame(&mut self, record: &FrameRecord) -> bool {
        let mut acc = self.acc;
        acc = (acc ^ u64::from(record.commands.bits())).wrapping_mul(FNV_PRIME);
        for &pad in &record.joypads {
            acc = (acc ^ u64::from(pad)).wrapping_mul(FNV_PRIME);
        }
        acc = (acc ^ self.frame).wrapping_mul(FNV_PRIME);
        self.acc = acc;
        self.frame += 1;
        // a fixed pseudo-pattern of lag frames
        self.acc % 5 == 0
    }

    fn display_capture(&self) -> Vec<u8> {
        self.acc.to_le_bytes().to_vec()
    }
}
