// ============================================================================
// Tissue Cohort — One age class of an organ's biomass
//
// A cohort holds DM and N plus the transfers booked against it during the
// current day. Nothing moves until `commit()`: turnover, growth and
// remobilisation only accumulate into the `*_in` / `*_out` fields, which
// keeps the order of the daily steps irrelevant for the final balance.
//
// Root cohorts additionally carry a per-layer breakdown (`LayeredMass`).
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::common::{bound, divide, CARBON_FRACTION_IN_DM, EPSILON};
use crate::config::DigestibilityParams;

/// Per-soil-layer DM and N of a root cohort, with today's layer inflows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayeredMass {
    pub dm: Vec<f64>,
    pub n: Vec<f64>,
    pub dm_in: Vec<f64>,
    pub n_in: Vec<f64>,
}

impl LayeredMass {
    pub fn new(n_layers: usize) -> Self {
        Self {
            dm: vec![0.0; n_layers],
            n: vec![0.0; n_layers],
            dm_in: vec![0.0; n_layers],
            n_in: vec![0.0; n_layers],
        }
    }

    pub fn len(&self) -> usize {
        self.dm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dm.is_empty()
    }

    /// Fraction of the cohort DM in each layer (all zero when empty).
    pub fn dm_fractions(&self) -> Vec<f64> {
        proportions(&self.dm)
    }

    pub fn n_fractions(&self) -> Vec<f64> {
        proportions(&self.n)
    }

    fn clear_inflows(&mut self) {
        self.dm_in.iter_mut().for_each(|v| *v = 0.0);
        self.n_in.iter_mut().for_each(|v| *v = 0.0);
    }
}

fn proportions(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > EPSILON {
        values.iter().map(|v| v / total).collect()
    } else {
        vec![0.0; values.len()]
    }
}

/// Amounts taken out of a cohort by a removal event [kg/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovedMass {
    pub dm_removed: f64,
    pub n_removed: f64,
    pub dm_to_residue: f64,
    pub n_to_residue: f64,
}

impl RemovedMass {
    pub fn accumulate(&mut self, other: RemovedMass) {
        self.dm_removed += other.dm_removed;
        self.n_removed += other.n_removed;
        self.dm_to_residue += other.dm_to_residue;
        self.n_to_residue += other.n_to_residue;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TissueCohort {
    /// Dry matter [kg/ha]
    pub dm: f64,
    /// Nitrogen [kg/ha]
    pub n: f64,
    /// DM entering today (growth or turnover from the younger cohort) [kg/ha]
    pub dm_in: f64,
    /// DM leaving today (turnover to the older cohort, or detachment) [kg/ha]
    pub dm_out: f64,
    pub n_in: f64,
    pub n_out: f64,
    /// N that may be remobilised today [kg/ha]
    pub n_remobilisable: f64,
    /// N actually remobilised today [kg/ha]
    pub n_remobilised: f64,
    /// Share of luxury N that can be remobilised per day [0-1]
    pub fraction_luxury_remobilisable: f64,
    /// Share of new growth that is soluble sugar [0-1]
    pub sugar_fraction_new_growth: f64,
    pub digestibility_cell_wall: f64,
    pub digestibility_protein: f64,
    pub layers: Option<LayeredMass>,
}

impl TissueCohort {
    pub fn new(digestibility_cell_wall: f64, digestibility_protein: f64) -> Self {
        Self {
            dm: 0.0,
            n: 0.0,
            dm_in: 0.0,
            dm_out: 0.0,
            n_in: 0.0,
            n_out: 0.0,
            n_remobilisable: 0.0,
            n_remobilised: 0.0,
            fraction_luxury_remobilisable: 0.0,
            sugar_fraction_new_growth: 0.0,
            digestibility_cell_wall,
            digestibility_protein,
            layers: None,
        }
    }

    pub fn with_layers(mut self, n_layers: usize) -> Self {
        self.layers = Some(LayeredMass::new(n_layers));
        self
    }

    pub fn n_conc(&self) -> f64 {
        divide(self.n, self.dm, 0.0)
    }

    pub fn clear_daily_transfers(&mut self) {
        self.dm_in = 0.0;
        self.dm_out = 0.0;
        self.n_in = 0.0;
        self.n_out = 0.0;
        self.n_remobilisable = 0.0;
        self.n_remobilised = 0.0;
        if let Some(layers) = self.layers.as_mut() {
            layers.clear_inflows();
        }
    }

    /// Sets DM and N outright, spreading them over layers by `layer_fractions`.
    pub fn set_amounts(&mut self, dm: f64, n: f64, layer_fractions: Option<&[f64]>) {
        self.dm = dm.max(0.0);
        self.n = n.max(0.0);
        if let (Some(layers), Some(fractions)) = (self.layers.as_mut(), layer_fractions) {
            for (l, f) in fractions.iter().enumerate().take(layers.len()) {
                layers.dm[l] = self.dm * f;
                layers.n[l] = self.n * f;
            }
        }
    }

    /// Books the remobilisation of `fraction` of today's remobilisable N.
    pub fn remobilise_n(&mut self, fraction: f64) {
        self.n_remobilised = self.n_remobilisable * bound(fraction, 0.0, 1.0);
    }

    /// N left in the cohort once today's turnover transfers are applied.
    pub fn n_after_transfers(&self) -> f64 {
        self.n + self.n_in - self.n_out
    }

    pub fn dm_after_transfers(&self) -> f64 {
        self.dm + self.dm_in - self.dm_out
    }

    /// Makes today's transfers effective.
    pub fn commit(&mut self) {
        match self.layers.as_mut() {
            Some(layers) => {
                let dm_share = layers.dm_fractions();
                let n_share = layers.n_fractions();
                for l in 0..layers.len() {
                    layers.dm[l] += layers.dm_in[l] - self.dm_out * dm_share[l];
                    layers.n[l] += layers.n_in[l] - self.n_out * n_share[l];
                }
                // remobilised N is drawn from what is there after the transfers
                if self.n_remobilised > 0.0 {
                    let remaining = layers.n_fractions();
                    for l in 0..layers.len() {
                        layers.n[l] -= self.n_remobilised * remaining[l];
                    }
                }
                for l in 0..layers.len() {
                    layers.dm[l] = snap_to_zero(layers.dm[l]);
                    layers.n[l] = snap_to_zero(layers.n[l]);
                }
                self.dm = layers.dm.iter().sum();
                self.n = layers.n.iter().sum();
            }
            None => {
                self.dm += self.dm_in - self.dm_out;
                self.n += self.n_in - (self.n_out + self.n_remobilised);
                self.dm = snap_to_zero(self.dm);
                self.n = snap_to_zero(self.n);
            }
        }
    }

    /// Removes `fraction_remove` (to animals) and `fraction_residue` (to litter)
    /// of the current DM and N. Acts immediately, outside the daily transfers.
    pub fn remove(&mut self, fraction_remove: f64, fraction_residue: f64) -> RemovedMass {
        let f_remove = bound(fraction_remove, 0.0, 1.0);
        let f_residue = bound(fraction_residue, 0.0, 1.0 - f_remove);
        let removed = RemovedMass {
            dm_removed: self.dm * f_remove,
            n_removed: self.n * f_remove,
            dm_to_residue: self.dm * f_residue,
            n_to_residue: self.n * f_residue,
        };
        let keep = 1.0 - f_remove - f_residue;
        self.scale(keep);
        removed
    }

    /// Multiplies all pools (and layers) by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.dm *= factor;
        self.n *= factor;
        if let Some(layers) = self.layers.as_mut() {
            layers.dm.iter_mut().for_each(|v| *v *= factor);
            layers.n.iter_mut().for_each(|v| *v *= factor);
        }
    }

    /// Digestibility of the cohort from its sugar, protein and cell wall make-up.
    ///
    /// Protein is inferred from the cohort C:N ratio relative to those of pure
    /// cell wall and pure protein; sugar is the soluble share of today's growth.
    pub fn digestibility(&self, params: &DigestibilityParams) -> f64 {
        if self.dm <= EPSILON {
            return 0.0;
        }
        let f_sugar = bound(divide(self.dm_in * self.sugar_fraction_new_growth, self.dm, 0.0), 0.0, 1.0);
        let f_protein = if self.n > EPSILON {
            let cn_tissue = self.dm * CARBON_FRACTION_IN_DM / self.n;
            let ratio_tissue = params.cn_ratio_cell_wall / cn_tissue;
            let ratio_protein = params.cn_ratio_cell_wall / params.cn_ratio_protein;
            let f = divide(ratio_tissue - (1.0 - f_sugar), ratio_protein - 1.0, 0.0);
            bound(f, 0.0, 1.0 - f_sugar)
        } else {
            0.0
        };
        let f_cell_wall = 1.0 - f_sugar - f_protein;
        f_sugar + f_protein * self.digestibility_protein + f_cell_wall * self.digestibility_cell_wall
    }
}

/// Removes round-off residue left by subtracting equal quantities.
fn snap_to_zero(value: f64) -> f64 {
    if value.abs() < 1e-12 || (value < 0.0 && value > -EPSILON) {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort(dm: f64, n: f64) -> TissueCohort {
        let mut t = TissueCohort::new(0.6, 1.0);
        t.dm = dm;
        t.n = n;
        t
    }

    #[test]
    fn test_commit_applies_transfers() {
        let mut t = cohort(100.0, 4.0);
        t.dm_in = 10.0;
        t.n_in = 0.5;
        t.dm_out = 20.0;
        t.n_out = 0.8;
        t.n_remobilisable = 0.4;
        t.remobilise_n(0.5);
        t.commit();
        assert!((t.dm - 90.0).abs() < 1e-12);
        assert!((t.n - (4.0 + 0.5 - 0.8 - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_layered_commit_tracks_layers() {
        let mut t = TissueCohort::new(0.6, 1.0).with_layers(3);
        t.set_amounts(100.0, 2.0, Some(&[0.5, 0.3, 0.2]));
        t.dm_out = 10.0;
        t.n_out = 0.2;
        t.dm_in = 6.0;
        t.n_in = 0.12;
        if let Some(layers) = t.layers.as_mut() {
            layers.dm_in[0] = 3.0;
            layers.dm_in[2] = 3.0;
            layers.n_in[0] = 0.06;
            layers.n_in[2] = 0.06;
        }
        t.commit();
        assert!((t.dm - 96.0).abs() < 1e-9, "layer sums drive total DM: {}", t.dm);
        assert!((t.n - 1.92).abs() < 1e-9);
        let layers = t.layers.as_ref().unwrap();
        assert!((layers.dm[0] - (50.0 - 5.0 + 3.0)).abs() < 1e-9);
        assert!((layers.dm[1] - (30.0 - 3.0)).abs() < 1e-9);
        assert!(layers.n.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_remove_splits_to_animal_and_residue() {
        let mut t = cohort(200.0, 6.0);
        let out = t.remove(0.5, 0.25);
        assert!((out.dm_removed - 100.0).abs() < 1e-12);
        assert!((out.dm_to_residue - 50.0).abs() < 1e-12);
        assert!((t.dm - 50.0).abs() < 1e-12);
        assert!((t.n - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_remove_never_exceeds_whole_cohort() {
        let mut t = cohort(200.0, 6.0);
        let out = t.remove(0.8, 0.8);
        assert!((out.dm_removed + out.dm_to_residue - 200.0).abs() < 1e-9);
        assert!(t.dm.abs() < 1e-9);
    }

    #[test]
    fn test_digestibility_of_leafy_tissue() {
        // N conc 0.04: C:N = 10, protein fraction ~0.326
        let t = cohort(100.0, 4.0);
        let d = t.digestibility(&DigestibilityParams::default());
        let f_protein = (10.0 - 1.0) / (100.0 / 3.5 - 1.0);
        let expected = f_protein + (1.0 - f_protein) * 0.6;
        assert!((d - expected).abs() < 1e-9, "got {}", d);
    }

    #[test]
    fn test_digestibility_without_nitrogen_is_cell_wall_only() {
        let t = cohort(100.0, 0.0);
        let d = t.digestibility(&DigestibilityParams::default());
        assert!((d - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_digestibility_of_empty_cohort_is_zero() {
        let t = cohort(0.0, 0.0);
        assert_eq!(t.digestibility(&DigestibilityParams::default()), 0.0);
    }
}
