//! Base station and cell configuration as held by the repository.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::common::{Rnti, SfnSf, MAX_NUM_CC};
use super::ue::UeMacInfo;
use crate::band::{self, BandError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplexMode {
    #[default]
    Fdd,
    Tdd,
}

/// PHICH resource factor `Ng` broadcast in the MIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhichResource {
    OneSixth,
    #[default]
    Half,
    One,
    Two,
}

/// Static configuration of one managed cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    pub cell_id: u16,
    /// Downlink bandwidth in resource blocks
    pub dl_bandwidth: u8,
    /// Uplink bandwidth in resource blocks
    pub ul_bandwidth: u8,
    pub antenna_ports: u8,
    pub duplex_mode: DuplexMode,
    /// TDD uplink/downlink configuration, 0..=6
    pub tdd_config: u8,
    pub phich_resource: PhichResource,
    pub extended_cp: bool,
    /// PDCCH OFDM symbols configured for the cell
    pub pdcch_symbols: u8,
    /// Bit `n` set when subframe `n` is an MBSFN subframe
    pub mbsfn_subframes: u16,
    pub eutra_band: u8,
    pub dl_freq_hz: u64,
    pub ul_freq_hz: u64,
}

impl Default for CellConfig {
    fn default() -> Self {
        Self {
            cell_id: 0,
            dl_bandwidth: 25,
            ul_bandwidth: 25,
            antenna_ports: 1,
            duplex_mode: DuplexMode::Fdd,
            tdd_config: 0,
            phich_resource: PhichResource::Half,
            extended_cp: false,
            pdcch_symbols: 3,
            mbsfn_subframes: 0,
            eutra_band: 7,
            dl_freq_hz: 2_680_000_000,
            ul_freq_hz: 2_560_000_000,
        }
    }
}

impl CellConfig {
    pub fn is_mbsfn_subframe(&self, subframe: u8) -> bool {
        subframe < 10 && self.mbsfn_subframes & (1 << subframe) != 0
    }

    /// Check band, carrier frequencies and bandwidth against the E-UTRA band table.
    pub fn validate(&self) -> Result<(), BandError> {
        band::check_eutra_band(
            self.eutra_band,
            self.ul_freq_hz,
            self.dl_freq_hz,
            Some(self.dl_bandwidth),
        )
    }
}

/// Per-terminal configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UeConfig {
    pub rnti: Rnti,
    /// Index of the primary serving cell within the base station
    pub pcell_carrier_index: u8,
    pub transmission_mode: u8,
}

/// Cell-level statistics reported by the base station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellStats {
    /// Nominal PUCCH power in dBm
    pub p0_nominal_pucch: i32,
}

/// Everything the repository knows about one base station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStation {
    pub id: u64,
    pub current: SfnSf,
    pub cells: Vec<CellConfig>,
    pub ues: Vec<UeConfig>,
    pub ue_mac: HashMap<Rnti, UeMacInfo>,
    pub cell_stats: [CellStats; MAX_NUM_CC],
}

impl BaseStation {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            current: SfnSf::default(),
            cells: Vec::new(),
            ues: Vec::new(),
            ue_mac: HashMap::new(),
            cell_stats: [CellStats::default(); MAX_NUM_CC],
        }
    }

    pub fn cell(&self, index: usize) -> Option<&CellConfig> {
        self.cells.get(index)
    }

    pub fn ue_mac_info(&self, rnti: Rnti) -> Option<&UeMacInfo> {
        self.ue_mac.get(&rnti)
    }

    /// Terminals whose primary cell is `cell`, in configuration order.
    pub fn ues_on_cell(&self, cell: usize) -> impl Iterator<Item = &UeConfig> {
        self.ues
            .iter()
            .filter(move |ue| ue.pcell_carrier_index as usize == cell)
    }

    /// True when any attached terminal reports pending downlink bytes.
    pub fn has_pending_dl_data(&self) -> bool {
        self.ue_mac.values().any(|ue| ue.stats.total_bytes() > 0)
    }
}
