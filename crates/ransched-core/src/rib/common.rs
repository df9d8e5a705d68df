//! Shared constants and frame/subframe arithmetic.

use serde::{Deserialize, Serialize};

/// Radio network temporary identifier of a terminal.
pub type Rnti = u16;

/// Maximum number of component carriers (cells) per terminal.
pub const MAX_NUM_CC: usize = 2;
/// Maximum number of downlink HARQ processes per cell.
pub const MAX_NUM_HARQ: usize = 8;
/// Maximum number of logical channels per terminal.
pub const MAX_NUM_LC: usize = 11;
/// Resource-block-groups in the widest (100 RB) cell.
pub const N_RBG_MAX: usize = 25;
/// Maximum number of terminals per base station.
pub const MAX_NUM_UE: usize = 1024;

pub const SUBFRAMES_PER_FRAME: u8 = 10;
/// Subframes in one hyperframe (1024 frames of 10 subframes).
pub const HYPERFRAME_SUBFRAMES: u32 = 10_240;

/// Logical channel ids carrying signaling (CCCH, DCCH, DCCH1).
pub const SIGNALING_LCIDS: [u8; 3] = [0, 1, 2];

/// Pending MAC control element flags, as reported by the base station.
pub mod mac_ce {
    pub const TIMING_ADVANCE: u32 = 1 << 0;
}

/// A (frame, subframe) pair on the 10240-subframe hyperframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SfnSf {
    pub frame: u16,
    pub subframe: u8,
}

impl SfnSf {
    /// Build a pair, wrapping out-of-range values onto the hyperframe.
    pub fn new(frame: u16, subframe: u8) -> Self {
        Self::from_index(frame as u32 * SUBFRAMES_PER_FRAME as u32 + subframe as u32)
    }

    pub fn from_index(index: u32) -> Self {
        let index = index % HYPERFRAME_SUBFRAMES;
        Self {
            frame: (index / SUBFRAMES_PER_FRAME as u32) as u16,
            subframe: (index % SUBFRAMES_PER_FRAME as u32) as u8,
        }
    }

    /// Position on the hyperframe, `0..10240`. Out-of-range fields carry
    /// over the same way [`SfnSf::new`] does.
    #[inline]
    pub fn index(&self) -> u32 {
        (self.frame as u32 * SUBFRAMES_PER_FRAME as u32 + self.subframe as u32) % HYPERFRAME_SUBFRAMES
    }

    /// The pair `subframes` later, wrapping subframe, frame and hyperframe.
    pub fn advance(&self, subframes: u32) -> Self {
        Self::from_index(self.index() + subframes % HYPERFRAME_SUBFRAMES)
    }

    /// Forward distance in subframes from `earlier` to `self`, modulo the hyperframe.
    #[inline]
    pub fn distance_from(&self, earlier: SfnSf) -> u32 {
        (self.index() + HYPERFRAME_SUBFRAMES - earlier.index()) % HYPERFRAME_SUBFRAMES
    }
}

impl std::fmt::Display for SfnSf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.frame, self.subframe)
    }
}
