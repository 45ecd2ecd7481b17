// ============================================================================
// Stress Memory — Heat, cold and water-logging factors that persist
//
// Unlike the other responses these are path dependent: a hot day leaves
// stress behind that only fades as favourable degree-days accumulate, and a
// saturated profile keeps hurting growth until it has drained for a while.
// The structs hold the carried state and are serialised with the plant.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::common::{bound, divide, weighted_mean_temperature, EPSILON};
use crate::config::{ColdStressParams, HeatStressParams, WaterStressParams};
use crate::organs::RootOrgan;
use crate::soil::ZoneSoilState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatStress {
    /// Factor carried from yesterday [0-1]
    pub factor: f64,
    /// Recovery degree-days accumulated since the last hot day [°C·day]
    pub cumulative_degree_days: f64,
}

impl Default for HeatStress {
    fn default() -> Self {
        Self { factor: 1.0, cumulative_degree_days: 0.0 }
    }
}

impl HeatStress {
    /// Advances the memory by one day and returns today's factor.
    pub fn update(&mut self, max_t: f64, min_t: f64, params: &HeatStressParams) -> f64 {
        if !params.enabled {
            return 1.0;
        }
        let onset = params.onset_temperature;
        let full = params.full_temperature;

        let today = if max_t > full {
            self.cumulative_degree_days = 0.0;
            0.0
        } else if max_t > onset {
            // compounds with what is left from earlier events
            self.cumulative_degree_days = 0.0;
            self.factor * (full - max_t) / (full - onset)
        } else {
            self.factor
        };

        let recovery = if max_t <= onset {
            (1.0 - today) * divide(self.cumulative_degree_days, params.recovery_degree_days, 1.0)
        } else {
            0.0
        };

        let t_mean = weighted_mean_temperature(max_t, min_t, 0.5);
        self.cumulative_degree_days += (params.recovery_reference - t_mean).max(0.0);
        self.factor = (today + recovery).min(1.0);
        self.factor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdStress {
    /// Factor carried from yesterday [0-1]
    pub factor: f64,
    /// Recovery degree-days accumulated since the last cold day [°C·day]
    pub cumulative_degree_days: f64,
}

impl Default for ColdStress {
    fn default() -> Self {
        Self { factor: 1.0, cumulative_degree_days: 0.0 }
    }
}

impl ColdStress {
    pub fn update(&mut self, max_t: f64, min_t: f64, params: &ColdStressParams) -> f64 {
        if !params.enabled {
            return 1.0;
        }
        let onset = params.onset_temperature;
        let full = params.full_temperature;

        let today = if min_t < full {
            self.cumulative_degree_days = 0.0;
            0.0
        } else if min_t < onset {
            self.cumulative_degree_days = 0.0;
            self.factor * (min_t - full) / (onset - full)
        } else {
            self.factor
        };

        let recovery = if min_t >= onset {
            (1.0 - today) * divide(self.cumulative_degree_days, params.recovery_degree_days, 1.0)
        } else {
            0.0
        };

        let t_mean = weighted_mean_temperature(max_t, min_t, 0.5);
        self.cumulative_degree_days += (t_mean - params.recovery_reference).max(0.0);
        self.factor = (today + recovery).min(1.0);
        self.factor
    }
}

/// Water status of the rooted part of a profile [mm].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RootZoneWater {
    pub water: f64,
    pub saturation: f64,
    /// Water content above which the soil counts as water logged
    pub threshold: f64,
}

impl RootZoneWater {
    pub fn accumulate(&mut self, other: RootZoneWater) {
        self.water += other.water;
        self.saturation += other.saturation;
        self.threshold += other.threshold;
    }
}

/// Sums water, saturation and the logging threshold over the rooted layers.
pub fn root_zone_water(zone: &ZoneSoilState, root: &RootOrgan, params: &WaterStressParams) -> RootZoneWater {
    let p = &zone.profile;
    let mut status = RootZoneWater::default();
    for layer in 0..=root.bottom_layer().min(zone.n_layers().saturating_sub(1)) {
        let explored = root.fraction_layer_with_roots(layer);
        status.water += zone.water[layer] * explored;
        status.saturation += p.sat_mm(layer) * explored;
        status.threshold += if params.minimum_water_free_porosity <= -EPSILON {
            p.dul_mm(layer) * explored
        } else {
            p.sat_mm(layer) * (1.0 - params.minimum_water_free_porosity) * explored
        };
    }
    status
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterLogging {
    /// Cumulative water-logging effect [0-1]
    pub cumulative: f64,
}

impl WaterLogging {
    /// Advances the memory by one day and returns the growth factor (1 − cumulative).
    pub fn update(&mut self, status: RootZoneWater, params: &WaterStressParams) -> f64 {
        let range = status.saturation - status.threshold;
        let today = if status.water > status.threshold && range > EPSILON {
            let excess = params.saturation_effect_max * (status.water - status.threshold) / range;
            let drained = (status.saturation - status.water).max(0.0) / range;
            excess - params.saturation_recovery_factor * drained * self.cumulative
        } else {
            -params.saturation_recovery_factor
        };
        self.cumulative = bound(self.cumulative + today, 0.0, 1.0);
        1.0 - self.cumulative
    }
}
