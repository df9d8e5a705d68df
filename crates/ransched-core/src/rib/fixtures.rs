//! Repository builders shared by the scheduler tests.

use super::common::SfnSf;
use super::{BaseStation, CellConfig, DlCqiReport, PucchPower, Rib, RlcReport, UeConfig, UeMacInfo};

pub(crate) fn cell(n_rb: u8) -> CellConfig {
    CellConfig {
        dl_bandwidth: n_rb,
        ul_bandwidth: n_rb,
        ..Default::default()
    }
}

/// A base station with a single cell of `n_rb` resource blocks.
pub(crate) fn base_station(id: u64, n_rb: u8) -> BaseStation {
    let mut bs = BaseStation::new(id);
    bs.cells.push(cell(n_rb));
    bs.current = SfnSf::new(100, 1);
    bs
}

/// Attach a terminal on cell 0 with a CQI and `(lcid, bytes)` buffers.
pub(crate) fn add_ue(bs: &mut BaseStation, rnti: u16, cqi: u8, buffers: &[(u8, u32)]) {
    bs.ues.push(UeConfig {
        rnti,
        pcell_carrier_index: 0,
        transmission_mode: 1,
    });
    let mut info = UeMacInfo::new(rnti);
    info.stats.dl_cqi.push(DlCqiReport { serv_cell_index: 0, wb_cqi: cqi });
    for &(lc_id, bytes) in buffers {
        info.stats.rlc_reports.push(RlcReport {
            lc_id,
            tx_queue_size: bytes,
            tx_queue_hol_delay: 0,
        });
    }
    info.stats.pucch_power.push(PucchPower {
        serv_cell_index: 0,
        p0_pucch_dbm: None,
        p0_pucch_updated: false,
    });
    bs.ue_mac.insert(rnti, info);
}

pub(crate) fn rib_with(bs: BaseStation) -> Rib {
    let mut rib = Rib::new();
    rib.insert(bs);
    rib
}
