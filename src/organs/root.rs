// ============================================================================
// Root Organ — Root tissues of one soil zone
//
// A plant has one root organ per soil zone it explores. Besides the live and
// dead cohorts (both tracked per soil layer), the root carries its rooting
// depth and the target distribution used to place new growth.
// ============================================================================

use serde::{Deserialize, Serialize};

use super::distribution::{bottom_layer, current_target, fraction_layer_with_roots, target_distribution};
use super::{LayeredMass, Organ, OrganKind};
use crate::common::{EPSILON, ROOT_TISSUES};
use crate::config::{DigestibilityParams, NConcentration, RootParams};
use crate::error::{PastureError, Result};
use crate::soil::SoilProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootOrgan {
    /// Name of the soil zone these roots live in
    pub zone: String,
    pub organ: Organ,
    /// Rooting depth [mm]
    pub depth: f64,
    /// Thickness of the zone's soil layers [mm]
    pub thickness: Vec<f64>,
    /// Unnormalised target distribution over all layers
    pub target: Vec<f64>,
    /// Specific root length [m/g]
    pub specific_root_length: f64,
}

impl RootOrgan {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        zone: impl Into<String>,
        profile: &SoilProfile,
        params: &RootParams,
        n_conc: NConcentration,
        minimum_live_dm: f64,
        digestibility: &DigestibilityParams,
        luxury: &[f64],
        initial_dm: f64,
        initial_depth: f64,
    ) -> Result<Self> {
        let zone = zone.into();
        profile.validate(&zone)?;
        if initial_depth > params.depth_maximum {
            return Err(PastureError::RootDepthExceedsMaximum {
                depth: initial_depth,
                maximum: params.depth_maximum,
            });
        }

        let n_layers = profile.n_layers();
        let mut organ = Organ::new(OrganKind::Root, ROOT_TISSUES, n_conc, minimum_live_dm, digestibility, luxury);
        for tissue in organ.tissues.iter_mut() {
            tissue.layers = Some(LayeredMass::new(n_layers));
        }

        let mut root = Self {
            zone,
            organ,
            depth: initial_depth,
            thickness: profile.thickness.clone(),
            target: target_distribution(&profile.thickness, &profile.xf, params),
            specific_root_length: params.specific_root_length,
        };
        root.set_live(initial_dm, initial_depth);
        Ok(root)
    }

    /// Replaces the root system by `dm` of live roots at optimum N down to `depth`.
    pub fn set_live(&mut self, dm: f64, depth: f64) {
        self.depth = depth;
        self.organ.reset();
        let fractions = self.current_target_distribution();
        let n = dm * self.organ.n_conc.optimum;
        self.organ.tissues[0].set_amounts(dm, n, Some(&fractions));
    }

    pub fn n_layers(&self) -> usize {
        self.thickness.len()
    }

    pub fn bottom_layer(&self) -> usize {
        bottom_layer(&self.thickness, self.depth)
    }

    pub fn fraction_layer_with_roots(&self, layer: usize) -> f64 {
        fraction_layer_with_roots(&self.thickness, self.depth, layer)
    }

    pub fn current_target_distribution(&self) -> Vec<f64> {
        current_target(&self.thickness, &self.target, self.depth)
    }

    /// Present distribution of live root DM over the layers.
    pub fn live_fractions(&self) -> Vec<f64> {
        self.organ.tissues[0]
            .layers
            .as_ref()
            .map(|l| l.dm_fractions())
            .unwrap_or_else(|| vec![0.0; self.n_layers()])
    }

    /// Root length density per layer [mm/mm³].
    pub fn root_length_density(&self) -> Vec<f64> {
        // m/m² → mm/mm²
        let total_length = self.organ.tissues[0].dm * self.specific_root_length * 1e-7;
        self.live_fractions()
            .iter()
            .zip(&self.thickness)
            .map(|(f, dz)| f * total_length / dz)
            .collect()
    }

    /// Deepens the roots when there is net root growth. Depth never decreases.
    ///
    /// Returns the depth increment [mm].
    pub fn evaluate_elongation(
        &mut self,
        root_growth: f64,
        root_detached: f64,
        temperature_factor: f64,
        params: &RootParams,
    ) -> f64 {
        if root_growth - root_detached <= EPSILON || self.depth >= params.depth_maximum {
            return 0.0;
        }
        let previous = self.depth;
        let deeper = self.depth + params.elongation_rate * temperature_factor;
        self.depth = deeper.max(params.depth_minimum).min(params.depth_maximum);
        self.depth - previous
    }

    /// Books new root growth, spread over the layers between the present
    /// distribution and the target for the current depth.
    pub fn allocate_growth(&mut self, dm: f64, n: f64) {
        if dm <= EPSILON && n <= EPSILON {
            return;
        }
        let current = self.live_fractions();
        let target = self.current_target_distribution();
        let bottom = self.bottom_layer();

        let mut shares = vec![0.0; self.n_layers()];
        for layer in 0..=bottom {
            shares[layer] = 0.5 * (current[layer] + target[layer]);
        }
        let total: f64 = shares.iter().sum();
        if total > EPSILON {
            shares.iter_mut().for_each(|s| *s /= total);
        } else {
            shares[0] = 1.0;
        }

        let live = &mut self.organ.tissues[0];
        live.dm_in += dm;
        live.n_in += n;
        if let Some(layers) = live.layers.as_mut() {
            for (layer, share) in shares.iter().enumerate() {
                layers.dm_in[layer] += dm * share;
                layers.n_in[layer] += n * share;
            }
        }
    }

    /// DM and N detached today, per layer, as destined for soil organic matter.
    pub fn detached_by_layer(&self) -> (Vec<f64>, Vec<f64>) {
        let dead = self.organ.dead();
        match dead.layers.as_ref() {
            Some(layers) => {
                let dm = layers.dm_fractions().iter().map(|f| f * dead.dm_out).collect();
                let n = layers.n_fractions().iter().map(|f| f * dead.n_out).collect();
                (dm, n)
            }
            None => (vec![0.0; self.n_layers()], vec![0.0; self.n_layers()]),
        }
    }

    /// Whole root system per layer (live and dead), used when the crop ends.
    pub fn total_by_layer(&self) -> (Vec<f64>, Vec<f64>) {
        let mut dm = vec![0.0; self.n_layers()];
        let mut n = vec![0.0; self.n_layers()];
        for tissue in &self.organ.tissues {
            if let Some(layers) = tissue.layers.as_ref() {
                for l in 0..layers.len() {
                    dm[l] += layers.dm[l];
                    n[l] += layers.n[l];
                }
            }
        }
        (dm, n)
    }
}
