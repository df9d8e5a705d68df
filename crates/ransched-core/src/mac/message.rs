//! Outbound downlink configuration
//!
//! One [`DlMacConfig`] per base station per round, carrying every committed
//! grant for the target subframe. Messages are handed to a [`MessageSink`]
//! and never acknowledged.

use std::io::Write;
use std::sync::mpsc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::primitives::{AggregationLevel, DciFormat};
use crate::rib::{Rnti, SfnSf};

/// Downlink configuration for one base station and target subframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlMacConfig {
    pub bs_id: u64,
    /// Subframe the grants apply to
    pub sfn_sf: SfnSf,
    #[serde(default)]
    pub dl_ue_data: Vec<DlData>,
}

impl DlMacConfig {
    pub fn new(bs_id: u64, sfn_sf: SfnSf) -> Self {
        Self {
            bs_id,
            sfn_sf,
            dl_ue_data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dl_ue_data.is_empty()
    }

    pub fn grant(&self, rnti: Rnti) -> Option<&DlData> {
        self.dl_ue_data.iter().find(|d| d.rnti == rnti)
    }
}

/// One terminal's downlink grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlData {
    pub rnti: Rnti,
    pub serv_cell_index: u8,
    /// Resource blocks granted
    pub nb_rb: usize,
    /// MAC control elements carried, per transport block
    pub ce_bitmap: [u32; 2],
    /// Empty for retransmissions
    #[serde(default)]
    pub rlc_pdus: Vec<RlcPduGrant>,
    pub dci: DlDci,
}

/// Bytes granted to one logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RlcPduGrant {
    pub lcid: u8,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VrbFormat {
    #[default]
    Localized,
    Distributed,
}

/// Downlink control information of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlDci {
    pub rnti: Rnti,
    pub harq_process: u8,
    pub aggregation: AggregationLevel,
    /// First CCE of the PDCCH candidate
    pub cce_index: u8,
    /// Resource allocation type
    pub res_alloc: u8,
    pub vrb_format: VrbFormat,
    pub format: DciFormat,
    pub rb_shift: u8,
    pub ndi: bool,
    /// Redundancy version, `round % 4`
    pub rv: u8,
    /// TPC field value, 0 decrease / 1 hold / 2 increase
    pub tpc: u8,
    pub mcs: u8,
    /// Transport block size in bytes
    pub tbs_size: u32,
    /// Type 0 allocation, most significant RBG first
    pub rb_bitmap: u32,
}

/// Fire-and-forget hand-off of outbound messages.
pub trait MessageSink: Send {
    fn send(&mut self, msg: DlMacConfig);
}

impl MessageSink for mpsc::Sender<DlMacConfig> {
    fn send(&mut self, msg: DlMacConfig) {
        let bs_id = msg.bs_id;
        if mpsc::Sender::send(self, msg).is_err() {
            debug!(bs_id, "transport gone, message dropped");
        }
    }
}

impl MessageSink for Vec<DlMacConfig> {
    fn send(&mut self, msg: DlMacConfig) {
        self.push(msg);
    }
}

/// Writes each message as one line of JSON.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> MessageSink for JsonLinesSink<W> {
    fn send(&mut self, msg: DlMacConfig) {
        let res = serde_json::to_writer(&mut self.writer, &msg)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = res {
            warn!(bs_id = msg.bs_id, error = %e, "failed to write message");
        }
    }
}
