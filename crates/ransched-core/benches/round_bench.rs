//! Scheduling Round Benchmark
//!
//! A round has to finish well inside one TTI (1 ms). Run with:
//!
//! ```bash
//! cargo bench -p ransched-core --bench round_bench
//! ```
//!
//! This benchmark measures:
//! - A full central round for one base station over several bandwidths and
//!   terminal counts
//! - Transport block size lookup
//! - CCE budget computation

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::time::Duration;

use ransched_core::mac::primitives::{cce_budget, transport_block_size};
use ransched_core::mac::{CentralScheduler, DlScheduler};
use ransched_core::rib::{
    BaseStation, CellConfig, DlCqiReport, PucchPower, Rib, RlcReport, SfnSf, UeConfig, UeMacInfo,
};

fn rib_with_ues(n_rb: u8, n_ues: u16) -> Rib {
    let mut bs = BaseStation::new(1);
    bs.current = SfnSf::new(100, 2);
    bs.cells.push(CellConfig {
        dl_bandwidth: n_rb,
        ul_bandwidth: n_rb,
        ..Default::default()
    });

    for rnti in 1..=n_ues {
        bs.ues.push(UeConfig {
            rnti,
            pcell_carrier_index: 0,
            transmission_mode: 1,
        });
        let mut info = UeMacInfo::new(rnti);
        info.stats.dl_cqi.push(DlCqiReport {
            serv_cell_index: 0,
            wb_cqi: (rnti % 15 + 1) as u8,
        });
        info.stats.rlc_reports.push(RlcReport {
            lc_id: 3,
            tx_queue_size: 100 + 37 * rnti as u32,
            tx_queue_hol_delay: (rnti % 7) as u32,
        });
        info.stats.pucch_power.push(PucchPower {
            serv_cell_index: 0,
            p0_pucch_dbm: Some(-100),
            p0_pucch_updated: true,
        });
        bs.ue_mac.insert(rnti, info);
    }

    let mut rib = Rib::new();
    rib.insert(bs);
    rib
}

// ============================================================================
// Full Round
// ============================================================================

fn bench_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("round/central");
    group.measurement_time(Duration::from_secs(5));

    for n_rb in [25u8, 50, 100] {
        for n_ues in [4u16, 16, 64] {
            let rib = rib_with_ues(n_rb, n_ues);
            let id = format!("{}rb/{}ue", n_rb, n_ues);
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter_batched(
                    CentralScheduler::default,
                    |mut scheduler| black_box(scheduler.run_round(&rib)),
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

// ============================================================================
// Primitives
// ============================================================================

fn bench_tbs_lookup(c: &mut Criterion) {
    c.bench_function("primitives/tbs_lookup", |b| {
        b.iter(|| {
            let mut total = 0u32;
            for mcs in 0..=28u8 {
                for nb_rb in (1..=100usize).step_by(7) {
                    total = total.wrapping_add(transport_block_size(black_box(mcs), nb_rb));
                }
            }
            total
        });
    });
}

fn bench_cce_budget(c: &mut Criterion) {
    let cell = CellConfig {
        dl_bandwidth: 100,
        ul_bandwidth: 100,
        ..Default::default()
    };
    c.bench_function("primitives/cce_budget", |b| {
        b.iter(|| {
            (0..10u8)
                .map(|sf| cce_budget(black_box(3), &cell, sf))
                .sum::<usize>()
        });
    });
}

criterion_group!(benches, bench_round, bench_tbs_lookup, bench_cce_budget);
criterion_main!(benches);
