//! Delegated scheduling: the central algorithm run ahead of time.
//!
//! Grants are computed [`DELEGATED_LOOK_AHEAD`] subframes before they apply
//! to absorb backhaul latency. Once delegation is enabled the base stations
//! schedule themselves and the controller stays silent.

use tracing::info;

use super::central::CentralScheduler;
use super::cell_state::EnbSchedulingContext;
use super::policy::{DlScheduler, RoundOutput};
use crate::rib::Rib;

/// Subframes between the current subframe and the scheduled one.
pub const DELEGATED_LOOK_AHEAD: u32 = 4;

#[derive(Debug, Clone)]
pub struct DelegatedScheduler {
    inner: CentralScheduler,
    delegation_enabled: bool,
}

impl Default for DelegatedScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DelegatedScheduler {
    pub fn new() -> Self {
        Self {
            inner: CentralScheduler::new(DELEGATED_LOOK_AHEAD),
            delegation_enabled: false,
        }
    }

    /// Hand scheduling over to the base stations, or take it back.
    pub fn set_delegation(&mut self, enabled: bool) {
        if self.delegation_enabled != enabled {
            info!(enabled, "delegated scheduling switched");
        }
        self.delegation_enabled = enabled;
    }

    pub fn delegation_enabled(&self) -> bool {
        self.delegation_enabled
    }

    pub fn context(&self, bs_id: u64) -> Option<&EnbSchedulingContext> {
        self.inner.context(bs_id)
    }
}

impl DlScheduler for DelegatedScheduler {
    fn name(&self) -> &'static str {
        "delegated"
    }

    fn run_round(&mut self, rib: &Rib) -> RoundOutput {
        if self.delegation_enabled {
            return RoundOutput::default();
        }
        self.inner.run_round(rib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::fixtures::{add_ue, base_station, rib_with};
    use crate::rib::SfnSf;

    #[test]
    fn test_grants_target_four_subframes_ahead() {
        let mut bs = base_station(3, 25);
        bs.current = SfnSf::new(40, 7);
        add_ue(&mut bs, 1, 9, &[(3, 500)]);
        let rib = rib_with(bs);

        let mut s = DelegatedScheduler::new();
        let out = s.run_round(&rib);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].sfn_sf, SfnSf::new(41, 1));
        assert_eq!(s.context(3).and_then(|c| c.cell(0).last_target()), Some(SfnSf::new(41, 1)));
    }

    #[test]
    fn test_reserved_target_subframe() {
        let mut bs = base_station(3, 25);
        bs.current = SfnSf::new(40, 1);
        add_ue(&mut bs, 1, 9, &[(3, 500)]);
        let rib = rib_with(bs);

        let mut s = DelegatedScheduler::new();
        let out = s.run_round(&rib);
        assert!(out.messages.is_empty());
        assert_eq!(out.stats.reserved_subframes, 1);
    }

    #[test]
    fn test_delegation_silences_controller() {
        let mut bs = base_station(3, 25);
        bs.current = SfnSf::new(40, 7);
        add_ue(&mut bs, 1, 9, &[(3, 500)]);
        let rib = rib_with(bs);

        let mut s = DelegatedScheduler::new();
        s.set_delegation(true);
        assert!(s.run_round(&rib).messages.is_empty());
        assert!(s.context(3).is_none());
        s.set_delegation(false);
        assert_eq!(s.run_round(&rib).messages.len(), 1);
    }

    #[test]
    fn test_inherited_retransmission_does_not_starve_terminal() {
        let mut bs = base_station(3, 25);
        bs.current = SfnSf::new(40, 7);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        if let Some(ue) = bs.ue_mac.get_mut(&1) {
            ue.harq[0][0].round = 1;
            ue.harq[0][0].feedback_seq = 1;
        }
        let mut rib = rib_with(bs);

        let mut s = DelegatedScheduler::new();
        s.set_delegation(true);
        s.set_delegation(false);

        let mut grants = 0;
        for step in 0..20 {
            if let Some(bs) = rib.get_mut(3) {
                bs.current = SfnSf::new(40, 7).advance(step);
            }
            grants += s.run_round(&rib).stats.new_grants;
        }
        // every process is busy after eight grants without feedback
        assert_eq!(grants, 8);
    }
}
