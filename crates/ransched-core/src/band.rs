//! # E-UTRA Band Validation
//!
//! Operating band table of TS 36.101 (tables 5.5-1 and 5.6.1-1) and the
//! checks applied to a cell's band, carrier frequencies and bandwidth before
//! the scheduler accepts it.
//!
//! ```rust
//! use ransched_core::band::{check_eutra_band, eutra_bandwidth_index};
//!
//! assert_eq!(eutra_bandwidth_index(50), Some(3));
//! assert!(check_eutra_band(7, 2_560_000_000, 2_680_000_000, Some(50)).is_ok());
//! assert!(check_eutra_band(7, 2_560_000_000, 2_690_000_000, None).is_err());
//! ```

use thiserror::Error;

use crate::rib::DuplexMode;

/// Reasons a cell's radio parameters are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BandError {
    #[error("illegal E-UTRA band {0}")]
    UnknownBand(u8),

    #[error("illegal E-UTRA bandwidth {0}, must be in (6, 15, 25, 50, 75, 100)")]
    IllegalBandwidth(u8),

    #[error("E-UTRA bandwidth of {n_rb} not allowed for E-UTRA band {band}")]
    BandwidthNotAllowed { band: u8, n_rb: u8 },

    #[error("illegal {link} frequency {freq_hz}, must be within [{low_hz},{high_hz}) for E-UTRA band {band}")]
    FrequencyOutOfRange {
        band: u8,
        link: &'static str,
        freq_hz: u64,
        low_hz: u64,
        high_hz: u64,
    },

    #[error("offset of ul and dl frequency must be {offset_hz} for E-UTRA band {band}")]
    DuplexOffset { band: u8, offset_hz: i64 },
}

/// One row of the operating band table.
#[derive(Debug, Clone, Copy)]
pub struct EutraBand {
    pub number: u8,
    pub ul_low_hz: u64,
    pub ul_high_hz: u64,
    pub dl_low_hz: u64,
    pub dl_high_hz: u64,
    /// `dl - ul` carrier spacing; negative for reversed-duplex bands
    pub offset_hz: i64,
    pub mode: DuplexMode,
    /// Allowed channel bandwidths: 1.4, 3, 5, 10, 15, 20 MHz
    pub bw_allowed: [bool; 6],
}

const MHZ: u64 = 1_000_000;
const HZ_100K: u64 = 100_000;

const fn fdd(
    number: u8,
    ul: (u64, u64),
    dl: (u64, u64),
    offset_hz: i64,
    bw_allowed: [bool; 6],
) -> EutraBand {
    EutraBand {
        number,
        ul_low_hz: ul.0,
        ul_high_hz: ul.1,
        dl_low_hz: dl.0,
        dl_high_hz: dl.1,
        offset_hz,
        mode: DuplexMode::Fdd,
        bw_allowed,
    }
}

const fn tdd(number: u8, range: (u64, u64), bw_allowed: [bool; 6]) -> EutraBand {
    EutraBand {
        number,
        ul_low_hz: range.0,
        ul_high_hz: range.1,
        dl_low_hz: range.0,
        dl_high_hz: range.1,
        offset_hz: 0,
        mode: DuplexMode::Tdd,
        bw_allowed,
    }
}

const T: bool = true;
const F: bool = false;

/// Operating bands, TS 36.101 v14.5.
pub static EUTRA_BANDS: &[EutraBand] = &[
    fdd(1, (1920 * MHZ, 1980 * MHZ), (2110 * MHZ, 2170 * MHZ), 190_000_000, [F, F, T, T, T, T]),
    fdd(2, (1850 * MHZ, 1910 * MHZ), (1930 * MHZ, 1990 * MHZ), 80_000_000, [T, T, T, T, T, T]),
    fdd(3, (1710 * MHZ, 1785 * MHZ), (1805 * MHZ, 1880 * MHZ), 95_000_000, [T, T, T, T, T, T]),
    fdd(4, (1710 * MHZ, 1755 * MHZ), (2110 * MHZ, 2155 * MHZ), 400_000_000, [T, T, T, T, T, T]),
    fdd(5, (824 * MHZ, 849 * MHZ), (869 * MHZ, 894 * MHZ), 45_000_000, [T, T, T, T, F, F]),
    fdd(6, (830 * MHZ, 840 * MHZ), (875 * MHZ, 885 * MHZ), 45_000_000, [F, F, T, T, F, F]),
    fdd(7, (2500 * MHZ, 2570 * MHZ), (2620 * MHZ, 2690 * MHZ), 120_000_000, [F, F, T, T, T, T]),
    fdd(8, (880 * MHZ, 915 * MHZ), (925 * MHZ, 960 * MHZ), 45_000_000, [T, T, T, T, F, F]),
    fdd(9, (17499 * HZ_100K, 17849 * HZ_100K), (18449 * HZ_100K, 18799 * HZ_100K), 95_000_000, [F, F, T, T, T, T]),
    fdd(10, (1710 * MHZ, 1770 * MHZ), (2110 * MHZ, 2170 * MHZ), 400_000_000, [F, F, T, T, T, T]),
    fdd(11, (14279 * HZ_100K, 14479 * HZ_100K), (14759 * HZ_100K, 14959 * HZ_100K), 48_000_000, [F, F, T, T, F, F]),
    fdd(12, (699 * MHZ, 716 * MHZ), (729 * MHZ, 746 * MHZ), 30_000_000, [T, T, T, T, F, F]),
    fdd(13, (777 * MHZ, 787 * MHZ), (746 * MHZ, 756 * MHZ), -31_000_000, [F, F, T, T, F, F]),
    fdd(14, (788 * MHZ, 798 * MHZ), (758 * MHZ, 768 * MHZ), -30_000_000, [F, F, T, T, F, F]),
    fdd(17, (704 * MHZ, 716 * MHZ), (734 * MHZ, 746 * MHZ), 30_000_000, [F, F, T, T, F, F]),
    fdd(18, (815 * MHZ, 830 * MHZ), (860 * MHZ, 875 * MHZ), 45_000_000, [F, F, T, T, T, F]),
    fdd(19, (830 * MHZ, 845 * MHZ), (875 * MHZ, 890 * MHZ), 45_000_000, [F, F, T, T, T, F]),
    fdd(20, (832 * MHZ, 862 * MHZ), (791 * MHZ, 821 * MHZ), -41_000_000, [F, F, T, T, T, T]),
    fdd(21, (14479 * HZ_100K, 14629 * HZ_100K), (14959 * HZ_100K, 15109 * HZ_100K), 48_000_000, [F, F, T, T, T, F]),
    fdd(22, (3410 * MHZ, 3490 * MHZ), (3510 * MHZ, 3590 * MHZ), 100_000_000, [F, F, T, T, T, T]),
    fdd(23, (2000 * MHZ, 2020 * MHZ), (2180 * MHZ, 2200 * MHZ), 180_000_000, [T, T, T, T, T, T]),
    fdd(24, (16265 * HZ_100K, 16605 * HZ_100K), (1525 * MHZ, 1559 * MHZ), -101_500_000, [F, F, T, T, F, F]),
    fdd(25, (1850 * MHZ, 1915 * MHZ), (1930 * MHZ, 1995 * MHZ), 80_000_000, [T, T, T, T, T, T]),
    fdd(26, (814 * MHZ, 849 * MHZ), (859 * MHZ, 894 * MHZ), 45_000_000, [T, T, T, T, T, F]),
    fdd(27, (807 * MHZ, 824 * MHZ), (852 * MHZ, 869 * MHZ), 45_000_000, [T, T, T, T, F, F]),
    fdd(28, (703 * MHZ, 748 * MHZ), (758 * MHZ, 803 * MHZ), 55_000_000, [F, T, T, T, T, T]),
    fdd(30, (2305 * MHZ, 2315 * MHZ), (2350 * MHZ, 2360 * MHZ), 45_000_000, [F, F, T, T, F, F]),
    fdd(31, (4525 * HZ_100K, 4575 * HZ_100K), (4625 * HZ_100K, 4675 * HZ_100K), 10_000_000, [T, T, T, F, F, F]),
    tdd(33, (1900 * MHZ, 1920 * MHZ), [F, F, T, T, T, T]),
    tdd(34, (2010 * MHZ, 2025 * MHZ), [F, F, T, T, T, F]),
    tdd(35, (1850 * MHZ, 1910 * MHZ), [T, T, T, T, T, T]),
    tdd(36, (1930 * MHZ, 1990 * MHZ), [T, T, T, T, T, T]),
    tdd(37, (1910 * MHZ, 1930 * MHZ), [F, F, T, T, T, T]),
    tdd(38, (2570 * MHZ, 2620 * MHZ), [F, F, T, T, T, T]),
    tdd(39, (1880 * MHZ, 1920 * MHZ), [F, F, T, T, T, T]),
    tdd(40, (2300 * MHZ, 2400 * MHZ), [F, F, T, T, T, T]),
    tdd(41, (2496 * MHZ, 2690 * MHZ), [F, F, T, T, T, T]),
    tdd(42, (3400 * MHZ, 3600 * MHZ), [F, F, T, T, T, T]),
    tdd(43, (3600 * MHZ, 3800 * MHZ), [F, F, T, T, T, T]),
    tdd(44, (703 * MHZ, 803 * MHZ), [F, T, T, T, T, T]),
    tdd(45, (1447 * MHZ, 1467 * MHZ), [F, F, T, T, T, T]),
    tdd(46, (5150 * MHZ, 5925 * MHZ), [F, F, F, T, F, T]),
    tdd(47, (5855 * MHZ, 5925 * MHZ), [F, F, F, T, F, T]),
    tdd(48, (3550 * MHZ, 3700 * MHZ), [F, F, T, T, T, T]),
    fdd(65, (1920 * MHZ, 2010 * MHZ), (2110 * MHZ, 2200 * MHZ), 190_000_000, [T, T, T, T, T, T]),
    // DL 2180-2200 MHz reserved for DL CA
    fdd(66, (1710 * MHZ, 1780 * MHZ), (2110 * MHZ, 2200 * MHZ), 400_000_000, [T, T, T, T, T, T]),
    fdd(68, (698 * MHZ, 728 * MHZ), (753 * MHZ, 783 * MHZ), 55_000_000, [F, F, T, T, T, F]),
    fdd(70, (1695 * MHZ, 1710 * MHZ), (1995 * MHZ, 2020 * MHZ), 300_000_000, [F, F, T, T, T, T]),
];

/// Index into [`EutraBand::bw_allowed`] for a bandwidth in resource blocks.
pub fn eutra_bandwidth_index(n_rb: u8) -> Option<usize> {
    match n_rb {
        6 => Some(0),
        15 => Some(1),
        25 => Some(2),
        50 => Some(3),
        75 => Some(4),
        100 => Some(5),
        _ => None,
    }
}

pub fn eutra_band(number: u8) -> Option<&'static EutraBand> {
    EUTRA_BANDS.iter().find(|b| b.number == number)
}

pub fn check_eutra_bandwidth(n_rb: u8) -> Result<(), BandError> {
    eutra_bandwidth_index(n_rb)
        .map(|_| ())
        .ok_or(BandError::IllegalBandwidth(n_rb))
}

/// Validate carrier frequencies against a band, and optionally the bandwidth.
///
/// Carrier frequencies must fall in the half-open band ranges and be spaced
/// by exactly the band's duplex offset, `dl - ul`, sign included.
pub fn check_eutra_band(
    band: u8,
    ul_freq_hz: u64,
    dl_freq_hz: u64,
    n_rb: Option<u8>,
) -> Result<(), BandError> {
    let b = eutra_band(band).ok_or(BandError::UnknownBand(band))?;

    if !(b.ul_low_hz..b.ul_high_hz).contains(&ul_freq_hz) {
        return Err(BandError::FrequencyOutOfRange {
            band,
            link: "ul",
            freq_hz: ul_freq_hz,
            low_hz: b.ul_low_hz,
            high_hz: b.ul_high_hz,
        });
    }
    if !(b.dl_low_hz..b.dl_high_hz).contains(&dl_freq_hz) {
        return Err(BandError::FrequencyOutOfRange {
            band,
            link: "dl",
            freq_hz: dl_freq_hz,
            low_hz: b.dl_low_hz,
            high_hz: b.dl_high_hz,
        });
    }

    // signed: bands 13, 14 and 24 have the downlink below the uplink
    if dl_freq_hz as i64 - ul_freq_hz as i64 != b.offset_hz {
        return Err(BandError::DuplexOffset {
            band,
            offset_hz: b.offset_hz,
        });
    }

    if let Some(n_rb) = n_rb {
        let idx = eutra_bandwidth_index(n_rb).ok_or(BandError::IllegalBandwidth(n_rb))?;
        if !b.bw_allowed[idx] {
            return Err(BandError::BandwidthNotAllowed { band, n_rb });
        }
    }

    Ok(())
}
