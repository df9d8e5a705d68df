//! # Downlink MAC Scheduler
//!
//! Per-TTI resource decisions for every managed cell.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DlScheduler                           │
//! │     CentralScheduler │ DelegatedScheduler │ EicicScheduler   │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ run_round(&Rib) -> RoundOutput
//!   ┌────────────┴─────────────┬──────────────────────┐
//!   ▼                          ▼                      ▼
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ preprocessor │   │ cell_state       │   │ message          │
//! │ sort, RBGs   │   │ ue_state (HARQ,  │   │ DlMacConfig,     │
//! │              │   │ TA, TPC)         │   │ MessageSink      │
//! └──────┬───────┘   └──────────────────┘   └──────────────────┘
//!        ▼
//! ┌──────────────────────────────────────┐
//! │ primitives, tbs                      │
//! │ RBG geometry, TBS, CCE, aggregation  │
//! └──────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use ransched_core::mac::{CentralScheduler, DlScheduler};
//! use ransched_core::rib::{
//!     BaseStation, CellConfig, DlCqiReport, Rib, RlcReport, SfnSf, UeConfig, UeMacInfo,
//! };
//!
//! let mut bs = BaseStation::new(1);
//! bs.current = SfnSf::new(10, 2);
//! bs.cells.push(CellConfig::default());
//! bs.ues.push(UeConfig { rnti: 0x4601, pcell_carrier_index: 0, transmission_mode: 1 });
//! let mut ue = UeMacInfo::new(0x4601);
//! ue.stats.dl_cqi.push(DlCqiReport { serv_cell_index: 0, wb_cqi: 9 });
//! ue.stats.rlc_reports.push(RlcReport { lc_id: 3, tx_queue_size: 500, tx_queue_hol_delay: 4 });
//! bs.ue_mac.insert(0x4601, ue);
//!
//! let mut rib = Rib::new();
//! rib.insert(bs);
//!
//! let mut scheduler = CentralScheduler::new(0);
//! let out = scheduler.run_round(&rib);
//! assert_eq!(out.messages.len(), 1);
//! assert!(out.messages[0].grant(0x4601).is_some());
//! ```

pub mod cell_state;
pub mod central;
pub mod delegated;
pub mod eicic;
pub mod message;
pub mod policy;
pub mod preprocessor;
pub mod primitives;
pub mod tbs;
pub mod ue_state;

pub use cell_state::{CellContext, EnbSchedulingContext};
pub use central::CentralScheduler;
pub use delegated::DelegatedScheduler;
pub use eicic::EicicScheduler;
pub use message::{DlData, DlDci, DlMacConfig, JsonLinesSink, MessageSink, RlcPduGrant};
pub use policy::{build_scheduler, DlScheduler, RoundOutput, RoundStats, SkipReason};
pub use ue_state::{TpcCommand, UeSchedulingState};
