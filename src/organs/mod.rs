// ============================================================================
// Organs — Leaf, stem, stolon and root as chains of tissue cohorts
//
// Each organ is an ordered chain: the first cohort receives new growth,
// every cohort turns over into the next, and the last cohort is dead
// material whose outflow leaves the plant (detachment).
//
//   shoot organs:  emerging → developing → mature → dead → (detached)
//   roots:         live → dead → (detached)
//
// All daily movements are booked as transfers and applied by `commit()`,
// which also verifies the DM and N balance of the organ.
// ============================================================================

pub mod distribution;
pub mod root;
pub mod tissue;

pub use root::RootOrgan;
pub use tissue::{LayeredMass, RemovedMass, TissueCohort};

use serde::{Deserialize, Serialize};

use crate::common::{divide, nearly_equal, EPSILON, MASS_BALANCE_TOLERANCE};
use crate::config::{DigestibilityParams, NConcentration, OrganRemovalFractions};
use crate::error::{PastureError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganKind {
    Leaf,
    Stem,
    Stolon,
    Root,
}

impl OrganKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganKind::Leaf => "leaf",
            OrganKind::Stem => "stem",
            OrganKind::Stolon => "stolon",
            OrganKind::Root => "root",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organ {
    pub kind: OrganKind,
    pub tissues: Vec<TissueCohort>,
    pub n_conc: NConcentration,
    /// Live DM below which turnover is held back [kg/ha]
    pub minimum_live_dm: f64,
    /// Share of the organ standing and reachable by animals [0-1]
    pub fraction_standing: f64,
    /// Senescing DM kept back from the dead cohort today, as DM [kg/ha]
    pub dm_carbon_remobilised: f64,
}

impl Organ {
    /// Builds an organ with `n_tissues` cohorts (the last one dead).
    ///
    /// `luxury` holds the luxury-N remobilisation fraction of each live cohort.
    pub fn new(
        kind: OrganKind,
        n_tissues: usize,
        n_conc: NConcentration,
        minimum_live_dm: f64,
        digestibility: &DigestibilityParams,
        luxury: &[f64],
    ) -> Self {
        let last = n_tissues - 1;
        let tissues = (0..n_tissues)
            .map(|t| {
                // a two-cohort chain maps onto the first and the dead shoot cohorts
                let age = if t == last { digestibility.cell_wall.len() - 1 } else { t };
                let mut cohort = TissueCohort::new(digestibility.cell_wall[age], digestibility.protein);
                if t < last {
                    cohort.fraction_luxury_remobilisable = luxury.get(t).copied().unwrap_or(0.0);
                }
                if t == 0 {
                    cohort.sugar_fraction_new_growth = digestibility.sugar_fraction_new_growth;
                }
                cohort
            })
            .collect();
        Self {
            kind,
            tissues,
            n_conc,
            minimum_live_dm,
            fraction_standing: 1.0,
            dm_carbon_remobilised: 0.0,
        }
    }

    fn dead_index(&self) -> usize {
        self.tissues.len() - 1
    }

    pub fn dead(&self) -> &TissueCohort {
        &self.tissues[self.dead_index()]
    }

    pub fn dead_mut(&mut self) -> &mut TissueCohort {
        let last = self.dead_index();
        &mut self.tissues[last]
    }

    pub fn live(&self) -> &[TissueCohort] {
        &self.tissues[..self.dead_index()]
    }

    // --- Aggregates ---

    pub fn dm_live(&self) -> f64 {
        self.live().iter().map(|t| t.dm).sum()
    }

    pub fn dm_dead(&self) -> f64 {
        self.dead().dm
    }

    pub fn dm_total(&self) -> f64 {
        self.tissues.iter().map(|t| t.dm).sum()
    }

    pub fn n_live(&self) -> f64 {
        self.live().iter().map(|t| t.n).sum()
    }

    pub fn n_dead(&self) -> f64 {
        self.dead().n
    }

    pub fn n_total(&self) -> f64 {
        self.tissues.iter().map(|t| t.n).sum()
    }

    pub fn n_conc_live(&self) -> f64 {
        divide(self.n_live(), self.dm_live(), 0.0)
    }

    pub fn n_conc_dead(&self) -> f64 {
        divide(self.n_dead(), self.dm_dead(), 0.0)
    }

    /// Live DM that can be removed without breaching the minimum [kg/ha].
    pub fn dm_live_harvestable(&self) -> f64 {
        let live = self.dm_live();
        (live - self.minimum_live_dm).min(live * self.fraction_standing).max(0.0)
    }

    pub fn dm_dead_harvestable(&self) -> f64 {
        self.dm_dead() * self.fraction_standing
    }

    pub fn dm_harvestable(&self) -> f64 {
        self.dm_live_harvestable() + self.dm_dead_harvestable()
    }

    pub fn dm_standing(&self) -> f64 {
        self.dm_total() * self.fraction_standing
    }

    // --- Today's fluxes ---

    pub fn dm_growth(&self) -> f64 {
        self.tissues[0].dm_in
    }

    pub fn n_growth(&self) -> f64 {
        self.tissues[0].n_in
    }

    pub fn dm_senescing(&self) -> f64 {
        self.tissues[self.dead_index() - 1].dm_out
    }

    pub fn dm_detached(&self) -> f64 {
        self.dead().dm_out
    }

    pub fn n_detached(&self) -> f64 {
        self.dead().n_out
    }

    pub fn n_senesced_remobilisable(&self) -> f64 {
        self.dead().n_remobilisable
    }

    pub fn n_senesced_remobilised(&self) -> f64 {
        self.dead().n_remobilised
    }

    pub fn n_luxury_remobilisable(&self) -> f64 {
        self.live().iter().map(|t| t.n_remobilisable).sum()
    }

    pub fn n_luxury_remobilised(&self) -> f64 {
        self.live().iter().map(|t| t.n_remobilised).sum()
    }

    pub fn n_remobilised(&self) -> f64 {
        self.tissues.iter().map(|t| t.n_remobilised).sum()
    }

    // --- Digestibility ---

    pub fn digestibility_live(&self, params: &DigestibilityParams) -> f64 {
        let digestible: f64 = self.live().iter().map(|t| t.digestibility(params) * t.dm).sum();
        divide(digestible, self.dm_live(), 0.0)
    }

    pub fn digestibility_dead(&self, params: &DigestibilityParams) -> f64 {
        self.dead().digestibility(params)
    }

    pub fn digestibility_total(&self, params: &DigestibilityParams) -> f64 {
        let digestible: f64 = self.tissues.iter().map(|t| t.digestibility(params) * t.dm).sum();
        divide(digestible, self.dm_total(), 0.0)
    }

    // --- Operations ---

    pub fn clear_daily_transfers(&mut self) {
        self.tissues.iter_mut().for_each(TissueCohort::clear_daily_transfers);
        self.dm_carbon_remobilised = 0.0;
    }

    /// Drops today's N remobilisation from every cohort.
    pub fn cancel_n_remobilisation(&mut self) {
        self.tissues.iter_mut().for_each(|t| t.n_remobilised = 0.0);
    }

    /// Zeroes every cohort.
    pub fn reset(&mut self) {
        for t in self.tissues.iter_mut() {
            t.set_amounts(0.0, 0.0, None);
            if let Some(layers) = t.layers.as_mut() {
                layers.dm.iter_mut().for_each(|v| *v = 0.0);
                layers.n.iter_mut().for_each(|v| *v = 0.0);
            }
        }
        self.clear_daily_transfers();
    }

    /// Books today's turnover: cohort `t` passes `rates[t]` of its DM and N to
    /// cohort `t + 1`; the dead cohort's share is detached.
    ///
    /// `fraction_carbon` of the DM senescing into the dead cohort is withheld
    /// as remobilisable carbon. Remobilisable N is evaluated here too: luxury
    /// N above the optimum in live cohorts, and N above the minimum
    /// concentration in material that has just died.
    pub fn do_tissue_turnover(&mut self, rates: &[f64], fraction_carbon: f64) {
        let last = self.dead_index();

        for t in 0..last {
            let rate = rates[t];
            if rate <= 0.0 {
                continue;
            }
            let dm_moving = self.tissues[t].dm * rate;
            let n_moving = self.tissues[t].n * rate;
            let layer_shares = self.tissues[t]
                .layers
                .as_ref()
                .map(|l| (l.dm_fractions(), l.n_fractions()));

            self.tissues[t].dm_out += dm_moving;
            self.tissues[t].n_out += n_moving;

            let withheld = if t + 1 == last { dm_moving * fraction_carbon } else { 0.0 };
            let dm_arriving = dm_moving - withheld;
            self.dm_carbon_remobilised += withheld;

            let next = &mut self.tissues[t + 1];
            next.dm_in += dm_arriving;
            next.n_in += n_moving;
            if let (Some(layers), Some((dm_share, n_share))) = (next.layers.as_mut(), layer_shares) {
                for l in 0..layers.len() {
                    layers.dm_in[l] += dm_arriving * dm_share[l];
                    layers.n_in[l] += n_moving * n_share[l];
                }
            }
            if t + 1 == last {
                next.n_remobilisable += (n_moving - dm_moving * self.n_conc.minimum).max(0.0);
            }
        }

        // --- Detachment ---
        let rate = rates[last];
        let dead = &mut self.tissues[last];
        if rate > 0.0 {
            dead.dm_out += dead.dm * rate;
            dead.n_out += dead.n * rate;
        }
        dead.n_remobilisable = dead.n_remobilisable.min(dead.n_after_transfers().max(0.0));

        // --- Luxury N in live cohorts ---
        let optimum = self.n_conc.optimum;
        for t in self.tissues[..last].iter_mut() {
            let luxury = t.n_after_transfers() - t.dm_after_transfers() * optimum;
            t.n_remobilisable = luxury.max(0.0) * t.fraction_luxury_remobilisable;
        }
    }

    /// Moves `fraction` of every live cohort into the dead cohort, at once.
    pub fn kill(&mut self, fraction: f64) {
        let f = fraction.clamp(0.0, 1.0);
        if f <= 0.0 {
            return;
        }
        let last = self.dead_index();
        let (live, dead) = self.tissues.split_at_mut(last);
        let dead = &mut dead[0];
        for t in live.iter_mut() {
            dead.dm += t.dm * f;
            dead.n += t.n * f;
            if let (Some(from), Some(to)) = (t.layers.as_ref(), dead.layers.as_mut()) {
                for l in 0..from.len() {
                    to.dm[l] += from.dm[l] * f;
                    to.n[l] += from.n[l] * f;
                }
            }
            t.scale(1.0 - f);
        }
    }

    /// Removes biomass at once. Fractions refer to the whole live and dead pools.
    pub fn remove_biomass(&mut self, fractions: &OrganRemovalFractions) -> RemovedMass {
        let last = self.dead_index();
        let mut removed = RemovedMass::default();
        for (t, tissue) in self.tissues.iter_mut().enumerate() {
            let out = if t < last {
                tissue.remove(fractions.live_to_remove, fractions.live_to_residue)
            } else {
                tissue.remove(fractions.dead_to_remove, fractions.dead_to_residue)
            };
            removed.accumulate(out);
        }
        removed
    }

    /// Applies today's transfers and checks the organ's DM and N balance.
    pub fn commit(&mut self) -> Result<()> {
        let previous_dm = self.dm_total();
        let previous_n = self.n_total();
        let dm_growth = self.dm_growth();
        let n_growth = self.n_growth();
        let dm_detached = self.dm_detached();
        let n_detached = self.n_detached();
        let n_remobilised = self.n_remobilised();

        self.tissues.iter_mut().for_each(TissueCohort::commit);

        let expected_dm = previous_dm + dm_growth - dm_detached - self.dm_carbon_remobilised;
        let actual_dm = self.dm_total();
        if !nearly_equal(expected_dm, actual_dm, MASS_BALANCE_TOLERANCE) {
            return Err(PastureError::MassBalance {
                organ: self.kind.as_str().to_string(),
                quantity: "DM",
                expected: expected_dm,
                actual: actual_dm,
            });
        }
        let expected_n = previous_n + n_growth - n_remobilised - n_detached;
        let actual_n = self.n_total();
        if !nearly_equal(expected_n, actual_n, MASS_BALANCE_TOLERANCE) {
            return Err(PastureError::MassBalance {
                organ: self.kind.as_str().to_string(),
                quantity: "N",
                expected: expected_n,
                actual: actual_n,
            });
        }
        debug_assert!(self.tissues.iter().all(|t| t.dm >= 0.0 && t.n >= 0.0));
        Ok(())
    }

    /// True when the organ holds no biomass at all.
    pub fn is_empty(&self) -> bool {
        self.dm_total() <= EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SHOOT_TISSUES;

    fn leaf() -> Organ {
        let mut organ = Organ::new(
            OrganKind::Leaf,
            SHOOT_TISSUES,
            NConcentration::new(0.04, 0.012, 0.05),
            80.0,
            &DigestibilityParams::default(),
            &[0.0, 0.1, 0.1],
        );
        for (t, dm) in [400.0, 600.0, 500.0, 300.0].iter().enumerate() {
            let conc = if t == 3 { 0.015 } else { 0.045 };
            organ.tissues[t].set_amounts(*dm, dm * conc, None);
        }
        organ
    }

    #[test]
    fn test_aggregates() {
        let organ = leaf();
        assert!((organ.dm_live() - 1500.0).abs() < 1e-9);
        assert!((organ.dm_dead() - 300.0).abs() < 1e-9);
        assert!((organ.dm_total() - 1800.0).abs() < 1e-9);
        assert!((organ.dm_live_harvestable() - 1420.0).abs() < 1e-9);
    }

    #[test]
    fn test_turnover_and_commit_conserve_mass() {
        let mut organ = leaf();
        organ.clear_daily_transfers();
        organ.do_tissue_turnover(&[0.1, 0.05, 0.05, 0.08], 0.0);
        organ.tissues[0].dm_in += 30.0;
        organ.tissues[0].n_in += 1.2;
        organ.dead_mut().remobilise_n(0.5);
        let before = organ.dm_total();
        let detached = organ.dm_detached();
        organ.commit().expect("balance holds");
        assert!((organ.dm_total() - (before + 30.0 - detached)).abs() < 1e-9);
    }

    #[test]
    fn test_senesced_n_above_minimum_is_remobilisable() {
        let mut organ = leaf();
        organ.clear_daily_transfers();
        organ.do_tissue_turnover(&[0.0, 0.0, 0.1, 0.0], 0.0);
        // 50 kg DM at 0.045 dies: 2.25 N, of which 50 × 0.012 stays structural
        let expected = 50.0 * (0.045 - 0.012);
        assert!((organ.n_senesced_remobilisable() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_luxury_uses_each_cohort_fraction() {
        let mut organ = leaf();
        organ.clear_daily_transfers();
        organ.do_tissue_turnover(&[0.0, 0.0, 0.0, 0.0], 0.0);
        // emerging cohort has fraction 0, the older two 0.1
        assert_eq!(organ.tissues[0].n_remobilisable, 0.0);
        let expected = 600.0 * (0.045 - 0.04) * 0.1;
        assert!((organ.tissues[1].n_remobilisable - expected).abs() < 1e-9);
    }

    #[test]
    fn test_carbon_remobilisation_withholds_senescing_dm() {
        let mut organ = leaf();
        organ.clear_daily_transfers();
        organ.do_tissue_turnover(&[0.0, 0.0, 0.1, 0.0], 0.2);
        assert!((organ.dm_carbon_remobilised - 10.0).abs() < 1e-9);
        assert!((organ.dead().dm_in - 40.0).abs() < 1e-9);
        organ.commit().expect("balance includes remobilised carbon");
        assert!((organ.dm_total() - 1790.0).abs() < 1e-9);
    }

    #[test]
    fn test_kill_moves_live_to_dead() {
        let mut organ = leaf();
        let total = organ.dm_total();
        organ.kill(0.5);
        assert!((organ.dm_live() - 750.0).abs() < 1e-9);
        assert!((organ.dm_total() - total).abs() < 1e-9);
    }

    #[test]
    fn test_remove_biomass_reports_amounts() {
        let mut organ = leaf();
        let out = organ.remove_biomass(&OrganRemovalFractions {
            live_to_remove: 0.2,
            dead_to_remove: 0.0,
            live_to_residue: 0.1,
            dead_to_residue: 0.5,
        });
        assert!((out.dm_removed - 300.0).abs() < 1e-9);
        assert!((out.dm_to_residue - (150.0 + 150.0)).abs() < 1e-9);
        assert!((organ.dm_total() - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_commit_detects_lost_mass() {
        let mut organ = leaf();
        organ.clear_daily_transfers();
        // an outflow with no matching inflow breaks the chain
        organ.tissues[1].dm_out = 10.0;
        let err = organ.commit().unwrap_err();
        assert!(matches!(err, PastureError::MassBalance { quantity: "DM", .. }));
    }
}
