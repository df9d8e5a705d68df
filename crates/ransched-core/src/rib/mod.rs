//! # Repository Snapshot
//!
//! Read-only view of the controller's state repository as consumed by the
//! downlink scheduler: base stations, their cells, attached terminals,
//! measurement reports and HARQ feedback.
//!
//! The repository is mutated by a sibling task (the updater) that applies
//! inbound agent messages. The scheduler only ever reads it, inside the
//! execution window granted by the cooperative cycle (see [`crate::rt`]).
//!
//! ```text
//! Rib
//!  └── BaseStation (id, current frame/subframe)
//!       ├── CellConfig[]        bandwidth, PHICH, PDCCH, band
//!       ├── UeConfig[]          rnti, primary cell, transmission mode
//!       ├── UeMacInfo{rnti}     CQI, RLC buffers, MAC CEs, PUCCH power, HARQ
//!       └── CellStats[cell]     nominal PUCCH power
//! ```

pub mod common;
mod enb;
mod ue;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeMap;

pub use common::{mac_ce, Rnti, SfnSf};
pub use enb::{BaseStation, CellConfig, CellStats, DuplexMode, PhichResource, UeConfig};
pub use ue::{
    DlCqiReport, HarqProcessStatus, HarqStatus, PucchPower, RlcReport, UeMacInfo, UeStatsReport,
};

/// The set of base stations known to the controller.
///
/// Iteration is ordered by base station id, which gives the scheduler a
/// stable processing order from one cycle to the next.
#[derive(Debug, Clone, Default)]
pub struct Rib {
    base_stations: BTreeMap<u64, BaseStation>,
}

impl Rib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a base station.
    pub fn insert(&mut self, bs: BaseStation) {
        self.base_stations.insert(bs.id, bs);
    }

    pub fn remove(&mut self, bs_id: u64) -> Option<BaseStation> {
        self.base_stations.remove(&bs_id)
    }

    pub fn get(&self, bs_id: u64) -> Option<&BaseStation> {
        self.base_stations.get(&bs_id)
    }

    pub fn get_mut(&mut self, bs_id: u64) -> Option<&mut BaseStation> {
        self.base_stations.get_mut(&bs_id)
    }

    pub fn base_stations(&self) -> impl Iterator<Item = &BaseStation> {
        self.base_stations.values()
    }

    pub fn base_stations_mut(&mut self) -> impl Iterator<Item = &mut BaseStation> {
        self.base_stations.values_mut()
    }

    pub fn len(&self) -> usize {
        self.base_stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base_stations.is_empty()
    }
}
