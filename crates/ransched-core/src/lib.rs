//! # Downlink MAC Scheduler
//!
//! This crate implements the controller-side downlink MAC scheduler of a
//! disaggregated RAN: once per TTI it reads a snapshot of the base
//! stations, cells and terminals known to the controller and emits, per
//! base station, the downlink configuration for a target subframe.
//!
//! ## Overview
//!
//! - **Repository snapshot** ([`rib`]): cells, terminals, CQI, RLC buffers,
//!   HARQ feedback and frame/subframe arithmetic
//! - **Scheduling** ([`mac`]): TBS tables, RBG and CCE primitives, the
//!   pre-allocation pass, and the central, delegated and eICIC policies
//! - **Execution** ([`rt`]): the scheduler task on a real-time thread,
//!   phase-separated from repository updates by a barrier
//! - **Ambient**: YAML [`config`], [`observe`] (tracing and metrics) and
//!   E-UTRA [`band`] checks
//!
//! ## Round Flow
//!
//! ```text
//! Rib ─▶ due check ─▶ pre-allocation ─▶ per-UE grants ─▶ DlMacConfig ─▶ MessageSink
//!        (per cell)   (sort, RBG split)  (HARQ, CCE, MCS)   (per base station)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use ransched_core::config::Config;
//! use ransched_core::mac::build_scheduler;
//! use ransched_core::rib::Rib;
//!
//! let config = Config::load().unwrap();
//! let mut scheduler = build_scheduler(&config.scheduler);
//!
//! let rib = Rib::new();
//! let out = scheduler.run_round(&rib);
//! for msg in out.messages {
//!     println!("{}: {} grants", msg.bs_id, msg.dl_ue_data.len());
//! }
//! ```

pub mod band;
pub mod config;
pub mod mac;
pub mod observe;
pub mod rib;
pub mod rt;

pub use config::{Config, ConfigError};
pub use mac::{build_scheduler, DlMacConfig, DlScheduler, MessageSink, RoundOutput, RoundStats};
pub use observe::SchedulerMetrics;
pub use rib::{Rib, SfnSf};
