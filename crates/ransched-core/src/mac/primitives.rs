//! # Resource Allocation Primitives
//!
//! Stateless translations between LTE downlink quantities: allocation
//! granularity, resource-block-groups, transport block sizes, PDCCH
//! capacity and aggregation levels.
//!
//! Out-of-range inputs yield `None` (or a zero size for
//! [`transport_block_size`]); callers decide what a missing value means.
//!
//! ```rust
//! use ransched_core::mac::primitives::{min_rb_unit, num_rbgs, transport_block_size};
//! use ransched_core::rib::CellConfig;
//!
//! let cell = CellConfig { dl_bandwidth: 50, ..Default::default() };
//! assert_eq!(min_rb_unit(&cell), Some(3));
//! assert_eq!(num_rbgs(&cell), Some(17));
//! assert!(transport_block_size(10, 6) > 0);
//! assert_eq!(transport_block_size(29, 6), 0);
//! ```

use serde::{Deserialize, Serialize};

use super::tbs;
use crate::rib::common::N_RBG_MAX;
use crate::rib::{CellConfig, DuplexMode, PhichResource, Rnti};

/// Highest downlink MCS index carrying data.
pub const MAX_MCS: u8 = 28;

/// Widest PDCCH region in CCEs the occupancy mask can track.
pub const MAX_NUM_CCE: usize = 128;

/// Wideband CQI to downlink MCS.
const CQI_TO_MCS: [u8; 16] = [0, 0, 1, 2, 4, 6, 8, 11, 13, 16, 18, 20, 23, 25, 27, 28];

// ----------------------------------------------------------------------------
// Resource-block-groups
// ----------------------------------------------------------------------------

const _: () = assert!(N_RBG_MAX <= 32);

/// Fixed-size bitset with one bit per resource-block-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct RbgMap(u32);

impl RbgMap {
    pub const EMPTY: RbgMap = RbgMap(0);

    #[inline]
    pub fn is_set(&self, rbg: usize) -> bool {
        rbg < N_RBG_MAX && self.0 & (1 << rbg) != 0
    }

    #[inline]
    pub fn set(&mut self, rbg: usize) {
        if rbg < N_RBG_MAX {
            self.0 |= 1 << rbg;
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn intersects(&self, other: RbgMap) -> bool {
        self.0 & other.0 != 0
    }

    /// Indices of set groups, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N_RBG_MAX).filter(move |&i| self.is_set(i))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for RbgMap {
    type Output = RbgMap;

    fn bitor(self, rhs: RbgMap) -> RbgMap {
        RbgMap(self.0 | rhs.0)
    }
}

/// Resource blocks per resource-block-group (TS 36.213 table 7.1.6.1-1).
pub fn min_rb_unit(cell: &CellConfig) -> Option<u8> {
    match cell.dl_bandwidth {
        6 => Some(1),
        15 | 25 => Some(2),
        50 => Some(3),
        75 | 100 => Some(4),
        _ => None,
    }
}

/// Number of resource-block-groups in the cell.
pub fn num_rbgs(cell: &CellConfig) -> Option<usize> {
    match cell.dl_bandwidth {
        6 => Some(6),
        15 => Some(8),
        25 => Some(13),
        50 => Some(17),
        75 => Some(19),
        100 => Some(25),
        _ => None,
    }
}

/// Resource blocks in group `rbg`; the last group of 15/25/50/75 RB cells is
/// one block short. Zero when `rbg` is out of range.
pub fn rbg_size(cell: &CellConfig, rbg: usize) -> usize {
    let (Some(unit), Some(n_rbg)) = (min_rb_unit(cell), num_rbgs(cell)) else {
        return 0;
    };
    let unit = unit as usize;
    if rbg + 1 < n_rbg {
        unit
    } else if rbg + 1 == n_rbg {
        cell.dl_bandwidth as usize - (n_rbg - 1) * unit
    } else {
        0
    }
}

/// Resource blocks covered by the set groups of `map`.
pub fn rbs_in(cell: &CellConfig, map: RbgMap) -> usize {
    map.iter().map(|rbg| rbg_size(cell, rbg)).sum()
}

/// Final DCI resource allocation (type 0) for `rb_count` blocks taken from
/// `map`, most significant bit first.
///
/// Walks the selected groups in index order, charging each group's actual
/// size, so an allocation that reaches the short last group of a 25 or 50 RB
/// cell consumes one block less from it.
pub fn expand_to_physical_resource_blocks(
    rb_count: usize,
    map: RbgMap,
    cell: &CellConfig,
) -> u32 {
    let Some(n_rbg) = num_rbgs(cell) else {
        return 0;
    };

    let mut remaining = rb_count;
    let mut bitmap = 0u32;
    for rbg in 0..n_rbg {
        if remaining == 0 {
            break;
        }
        if map.is_set(rbg) {
            bitmap |= 1 << (n_rbg - 1 - rbg);
            remaining = remaining.saturating_sub(rbg_size(cell, rbg));
        }
    }
    bitmap
}

// ----------------------------------------------------------------------------
// MCS and transport block size
// ----------------------------------------------------------------------------

pub fn cqi_to_mcs(cqi: u8) -> u8 {
    CQI_TO_MCS[cqi.min(15) as usize]
}

/// `I_TBS` for a downlink MCS (TS 36.213 table 7.1.7.1-1).
pub fn itbs_from_mcs(mcs: u8) -> Option<usize> {
    match mcs {
        0..=9 => Some(mcs as usize),
        10..=16 => Some(mcs as usize - 1),
        17..=MAX_MCS => Some(mcs as usize - 2),
        _ => None,
    }
}

/// Transport block size in bytes; 0 when `mcs` or `rb_count` is invalid.
pub fn transport_block_size(mcs: u8, rb_count: usize) -> u32 {
    itbs_from_mcs(mcs)
        .and_then(|itbs| tbs::tbs_bits(itbs, rb_count))
        .map(|bits| bits >> 3)
        .unwrap_or(0)
}

// ----------------------------------------------------------------------------
// PDCCH
// ----------------------------------------------------------------------------

/// DCI formats that select an aggregation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DciFormat {
    Format0,
    Format1,
    Format1A,
    Format1B,
    Format1C,
    Format1D,
    Format2,
    Format2A,
}

/// Number of consecutive CCEs a DCI occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AggregationLevel {
    L1,
    L2,
    L4,
    L8,
}

impl AggregationLevel {
    pub fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(AggregationLevel::L1),
            1 => Some(AggregationLevel::L2),
            2 => Some(AggregationLevel::L4),
            3 => Some(AggregationLevel::L8),
            _ => None,
        }
    }

    /// Exponent sent in the DCI (`cces == 1 << index`).
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn cces(self) -> usize {
        1 << self.index()
    }

    /// PDCCH candidates in the UE-specific search space (TS 36.213 table 9.1.1-1).
    pub fn ue_candidates(self) -> usize {
        match self {
            AggregationLevel::L1 | AggregationLevel::L2 => 6,
            AggregationLevel::L4 | AggregationLevel::L8 => 2,
        }
    }
}

// Aggregation index by [bandwidth class][wideband CQI].
const CQI_TO_AGG_FMT0: [[u8; 16]; 4] = [
    [3, 3, 3, 2, 2, 2, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0],
];

const CQI_TO_AGG_FMT1X: [[u8; 16]; 4] = [
    [3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0],
];

const CQI_TO_AGG_FMT2X: [[u8; 16]; 4] = [
    [3, 3, 3, 2, 2, 2, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0, 0],
    [3, 3, 3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0],
    [3, 3, 3, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0, 0, 0, 0],
];

/// Bandwidth class used by the aggregation tables.
pub fn bandwidth_index(n_rb: u8) -> Option<usize> {
    match n_rb {
        6 => Some(0),
        15 | 25 => Some(1),
        50 => Some(2),
        75 | 100 => Some(3),
        _ => None,
    }
}

/// Aggregation level for a DCI given the cell's bandwidth class and CQI.
pub fn aggregation_level(bw_index: usize, cqi: u8, format: DciFormat) -> Option<AggregationLevel> {
    let table = match format {
        DciFormat::Format0 => &CQI_TO_AGG_FMT0,
        DciFormat::Format2 | DciFormat::Format2A => &CQI_TO_AGG_FMT2X,
        DciFormat::Format1
        | DciFormat::Format1A
        | DciFormat::Format1B
        | DciFormat::Format1C
        | DciFormat::Format1D => &CQI_TO_AGG_FMT1X,
    };
    let idx = *table.get(bw_index)?.get(cqi as usize)?;
    AggregationLevel::from_index(idx)
}

/// PHICH groups for the cell (TS 36.211 6.9), before the TDD `m_i` factor.
pub fn phich_groups(cell: &CellConfig) -> usize {
    let n_rb = cell.dl_bandwidth as usize;
    // Ng * N_RB / 8, rounded up
    let groups = match cell.phich_resource {
        PhichResource::OneSixth => n_rb.div_ceil(48),
        PhichResource::Half => n_rb.div_ceil(16),
        PhichResource::One => n_rb.div_ceil(8),
        PhichResource::Two => n_rb.div_ceil(4),
    };
    if cell.extended_cp {
        groups * 2
    } else {
        groups
    }
}

/// PHICH group multiplier `m_i` for TDD configurations (TS 36.211 table 6.9-1).
const TDD_MI: [[u8; 10]; 7] = [
    [2, 1, 0, 0, 0, 2, 1, 0, 0, 0],
    [0, 1, 0, 0, 1, 0, 1, 0, 0, 1],
    [0, 0, 0, 1, 0, 0, 0, 0, 1, 0],
    [1, 0, 0, 0, 0, 0, 0, 0, 1, 1],
    [0, 0, 0, 0, 0, 0, 0, 0, 1, 1],
    [0, 0, 0, 0, 0, 0, 0, 0, 1, 0],
    [1, 1, 0, 0, 0, 1, 1, 0, 0, 1],
];

pub fn mi_factor(cell: &CellConfig, subframe: u8) -> usize {
    match cell.duplex_mode {
        DuplexMode::Fdd => 1,
        DuplexMode::Tdd => TDD_MI
            .get(cell.tdd_config as usize)
            .and_then(|row| row.get(subframe as usize))
            .copied()
            .unwrap_or(0) as usize,
    }
}

/// Resource element groups left for PDCCH after PCFICH and PHICH.
pub fn available_reg_quadruplets(pdcch_symbols: u8, cell: &CellConfig, subframe: u8) -> usize {
    let n_rb = cell.dl_bandwidth as usize;
    let mut regs = 0;
    for symbol in 0..pdcch_symbols.min(3) {
        regs += match symbol {
            // cell-specific reference signals of ports 0/1
            0 => 2 * n_rb,
            1 if cell.antenna_ports >= 4 => 2 * n_rb,
            _ => 3 * n_rb,
        };
    }
    let pcfich = 4;
    let phich = 3 * phich_groups(cell) * mi_factor(cell, subframe);
    regs.saturating_sub(pcfich + phich)
}

/// Control-channel elements available in `subframe`. MBSFN subframes carry at
/// most two PDCCH symbols.
pub fn cce_budget(pdcch_symbols: u8, cell: &CellConfig, subframe: u8) -> usize {
    let symbols = if cell.is_mbsfn_subframe(subframe) {
        pdcch_symbols.min(2)
    } else {
        pdcch_symbols
    };
    (available_reg_quadruplets(symbols, cell, subframe) / 9).min(MAX_NUM_CCE)
}

/// First free PDCCH candidate of the terminal's UE-specific search space.
///
/// `occupied` has bit `n` set for every CCE already in use this subframe.
/// Returns the index of the first CCE of the candidate.
pub fn cce_offset(
    level: AggregationLevel,
    n_cce: usize,
    occupied: u128,
    rnti: Rnti,
    subframe: u8,
) -> Option<usize> {
    const A: u64 = 39_827;
    const D: u64 = 65_537;

    let l = level.cces();
    let positions = n_cce.min(MAX_NUM_CCE) / l;
    if positions == 0 {
        return None;
    }

    let mut yk = rnti as u64;
    for _ in 0..=subframe {
        yk = (A * yk) % D;
    }

    let mask = (1u128 << l) - 1;
    (0..level.ue_candidates()).find_map(|m| {
        let start = l * ((yk as usize + m) % positions);
        (occupied & (mask << start) == 0).then_some(start)
    })
}
