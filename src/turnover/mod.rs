// ============================================================================
// Tissue Turnover — Daily rates of ageing, senescence and detachment
//
// Four rates are evaluated every day:
//
//   shoot       leaf and stem cohorts move one age class on
//   stolon      as shoot, plus a defoliation pulse (legumes only)
//   root        live roots die
//   detachment  dead shoot material leaves the plant
//
// Rates outside [0, 1] are rejected before the annual and minimum-DM
// adjustments are applied.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::common::{bound, divide, CARBON_FRACTION_IN_DM};
use crate::config::TurnoverParams;
use crate::error::{PastureError, Result};
use crate::phenology::PhenologyStage;
use crate::response::{moisture_effect_on_detachment, moisture_effect_on_turnover, turnover_temperature_factor};

/// Memory of recent defoliations, released as extra stolon and root
/// turnover over the following days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefoliationMemory {
    /// Defoliation effect still to be released [-]
    pub cumulative: f64,
    /// Fraction of standing herbage removed since the last turnover [0-1]
    pub pending_fraction: f64,
}

impl DefoliationMemory {
    pub fn record(&mut self, fraction_removed: f64) {
        self.pending_fraction += fraction_removed.max(0.0);
    }

    /// Releases today's share of the accumulated effect.
    ///
    /// Each day the remaining effect decays as a power of itself, so one
    /// grazing spreads over several days and the released shares add up to
    /// the whole pulse.
    pub fn release(&mut self, params: &TurnoverParams) -> f64 {
        self.cumulative += self.pending_fraction;
        self.pending_fraction = 0.0;
        if self.cumulative <= 0.0 {
            return 0.0;
        }
        let exponent = params.defoliation_coefficient + 1.0;
        let remaining = self.cumulative.powf(exponent) / exponent;
        if self.cumulative - remaining < params.defoliation_effect_min {
            let effect = self.cumulative;
            self.cumulative = 0.0;
            effect
        } else {
            let effect = self.cumulative - remaining;
            self.cumulative = remaining;
            effect
        }
    }
}

/// Conditions driving today's turnover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnoverDrivers {
    /// Mean air temperature [°C]
    pub t_mean: f64,
    /// Yesterday's water supply factor [0-1]
    pub glf_water_supply: f64,
    /// Yesterday's water logging factor [0-1]
    pub glf_water_logging: f64,
    /// DM-weighted digestibility of dead leaves and stems [0-1]
    pub digestibility_dead: f64,
    /// Defoliation effect released today [-]
    pub defoliation_effect: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnoverRates {
    /// Live leaf and stem turnover [1/day]
    pub shoot: f64,
    /// Live stolon turnover [1/day]
    pub stolon: f64,
    /// Live root turnover [1/day]
    pub root: f64,
    /// Detachment of dead shoot material [1/day]
    pub detachment: f64,
    /// Temperature factor used, for reporting [0-1]
    pub temperature_factor: f64,
}

impl TurnoverRates {
    pub fn evaluate(drivers: &TurnoverDrivers, params: &TurnoverParams, is_legume: bool) -> Result<Self> {
        let temperature_factor = turnover_temperature_factor(drivers.t_mean, params);
        let water = drivers.glf_water_supply.min(drivers.glf_water_logging);
        let moisture_shoot = moisture_effect_on_turnover(water, params);
        let moisture_litter = moisture_effect_on_detachment(drivers.glf_water_supply, params);
        let moisture_root = 2.0 - water;
        // three live age classes per tiller
        let leaf_number = 3.0 / params.live_leaves_per_tiller;
        let defoliation = drivers.defoliation_effect;

        let shoot = params.rate_shoot * temperature_factor * moisture_shoot * leaf_number;
        let stolon = if is_legume { shoot + defoliation * (1.0 - shoot) } else { 0.0 };
        let mut root = params.rate_root * temperature_factor * moisture_root;
        root += params.defoliation_root_effect * defoliation * (1.0 - root);
        let detachment = params.detachment_rate_shoot * moisture_litter * drivers.digestibility_dead / CARBON_FRACTION_IN_DM;

        for (organ, rate) in [("shoot", shoot), ("stolon", stolon), ("root", root), ("detachment", detachment)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(PastureError::TurnoverRateOutOfRange { organ, rate });
            }
        }
        Ok(Self { shoot, stolon, root, detachment, temperature_factor })
    }

    /// Annuals: turnover starts slow after emergence and accelerates to
    /// completion at maturity.
    pub fn adjust_for_annual(&mut self, stage: PhenologyStage, pheno_factor: f64) {
        match stage {
            PhenologyStage::Vegetative => {
                self.shoot *= pheno_factor.powf(0.5);
                self.root *= pheno_factor.powi(2);
                self.detachment *= pheno_factor.powi(2);
            }
            PhenologyStage::Reproductive => {
                self.shoot += (1.0 - self.shoot) * pheno_factor.powi(2);
                self.root += (1.0 - self.root) * pheno_factor.powi(3);
                self.detachment += (1.0 - self.detachment) * pheno_factor.powi(3);
            }
            _ => {}
        }
    }

    /// Holds back shoot turnover so live leaves and stems stay above
    /// `minimum`; stolon and root turnover ease by half as much.
    pub fn limit_to_minimum_green(&mut self, green_dm: f64, mature_dm: f64, minimum: f64) {
        if self.shoot <= 0.0 {
            return;
        }
        if green_dm - mature_dm * self.shoot < minimum {
            let base = self.shoot;
            self.shoot = divide(green_dm - minimum, mature_dm, 0.0).max(0.0);
            let factor = 0.5 * (base + self.shoot) / base;
            self.stolon *= factor;
            self.root *= factor;
        }
    }

    /// Root turnover for one root system, holding its live DM at `minimum`.
    pub fn root_rate_for(&self, root_live: f64, minimum: f64) -> f64 {
        let rate = if root_live * (1.0 - self.root) < minimum {
            if root_live <= minimum {
                0.0
            } else {
                divide(root_live - minimum, root_live, 0.0)
            }
        } else {
            self.root
        };
        bound(rate, 0.0, 1.0)
    }

    pub fn bounded(mut self) -> Self {
        self.shoot = bound(self.shoot, 0.0, 1.0);
        self.stolon = bound(self.stolon, 0.0, 1.0);
        self.root = bound(self.root, 0.0, 1.0);
        self.detachment = bound(self.detachment, 0.0, 1.0);
        self
    }

    /// Per-cohort rates for leaves and stems.
    pub fn shoot_cohort_rates(&self, relative_emerging: f64) -> [f64; 4] {
        [bound(self.shoot * relative_emerging, 0.0, 1.0), self.shoot, self.shoot, self.detachment]
    }

    /// Per-cohort rates for stolons; dead stolons detach at once.
    pub fn stolon_cohort_rates(&self, relative_emerging: f64) -> [f64; 4] {
        [bound(self.stolon * relative_emerging, 0.0, 1.0), self.stolon, self.stolon, 1.0]
    }
}
