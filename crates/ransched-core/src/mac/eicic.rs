//! # Almost-Blank-Subframe Coordination
//!
//! A macro base station and the pico base stations under its footprint
//! share the spectrum. The macro only transmits in subframes marked in the
//! ABS pattern, and yields even those when a pico has traffic waiting.
//!
//! ```text
//! pattern  [0, 1, 0, 1, 0, 0, 0, 1, 0, 1]   indexed by target subframe
//!
//!  round with permission:
//!    no pico traffic  ──▶ empty DlMacConfig to the macro
//!    pico traffic     ──▶ empty DlMacConfig to every pico
//! ```
//!
//! The messages carry no grants; they open the subframe for the recipient's
//! own scheduler.

use std::collections::BTreeMap;

use tracing::debug;

use super::cell_state::CellContext;
use super::message::DlMacConfig;
use super::policy::{DlScheduler, RoundOutput};
use crate::rib::common::SUBFRAMES_PER_FRAME;
use crate::rib::Rib;

pub const EICIC_LOOK_AHEAD: u32 = 1;

pub const DEFAULT_ABS_PATTERN: [u8; SUBFRAMES_PER_FRAME as usize] = [0, 1, 0, 1, 0, 0, 0, 1, 0, 1];

#[derive(Debug, Clone)]
pub struct EicicScheduler {
    macro_bs_id: u64,
    abs_pattern: [u8; SUBFRAMES_PER_FRAME as usize],
    // due-check state per base station
    cells: BTreeMap<u64, CellContext>,
}

impl Default for EicicScheduler {
    fn default() -> Self {
        Self::new(0, DEFAULT_ABS_PATTERN)
    }
}

impl EicicScheduler {
    pub fn new(macro_bs_id: u64, abs_pattern: [u8; SUBFRAMES_PER_FRAME as usize]) -> Self {
        Self {
            macro_bs_id,
            abs_pattern,
            cells: BTreeMap::new(),
        }
    }

    pub fn macro_bs_id(&self) -> u64 {
        self.macro_bs_id
    }

    pub fn abs_pattern(&self) -> &[u8; SUBFRAMES_PER_FRAME as usize] {
        &self.abs_pattern
    }
}

impl DlScheduler for EicicScheduler {
    fn name(&self) -> &'static str {
        "eicic"
    }

    fn run_round(&mut self, rib: &Rib) -> RoundOutput {
        let mut out = RoundOutput::default();
        let mut permission = false;
        let mut macro_turn = true;

        self.cells.retain(|id, _| rib.get(*id).is_some());
        for bs in rib.base_stations() {
            let cell = self.cells.entry(bs.id).or_default();
            if !cell.is_due(bs.current) {
                out.stats.cells_not_due += 1;
                continue;
            }
            let target = bs.current.advance(EICIC_LOOK_AHEAD);
            cell.mark_scheduled(bs.current, target);
            out.stats.cells_scheduled += 1;

            if self.abs_pattern[target.subframe as usize] != 0 {
                permission = true;
            }
            if bs.id != self.macro_bs_id && bs.has_pending_dl_data() {
                macro_turn = false;
            }
        }

        if !permission {
            return out;
        }

        for bs in rib.base_stations() {
            let is_macro = bs.id == self.macro_bs_id;
            if is_macro == macro_turn {
                let target = bs.current.advance(EICIC_LOOK_AHEAD);
                out.messages.push(DlMacConfig::new(bs.id, target));
            }
        }
        debug!(macro_turn, recipients = out.messages.len(), "almost blank subframe");
        out
    }
}
