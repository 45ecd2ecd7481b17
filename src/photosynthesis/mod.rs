// ============================================================================
// Photosynthesis & Respiration — Daily carbon budget of the canopy
//
// Gross assimilation integrates a non-rectangular hyperbola leaf response
// at two points of the day:
//
//   dawn/dusk  : half the midday PAR, Pmax at the mean temperature
//   midday     : full PAR, Pmax at the 3/4-weighted temperature
//
// The leaf rate is scaled to the canopy through the effective green cover,
// which reproduces the interception reported by the canopy energy model.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::common::{divide, weighted_mean_temperature, CARBON_FRACTION_IN_DM, EPSILON};
use crate::config::{SpeciesConfig, PhotosynthesisParams, RespirationParams};
use crate::response::{
    co2_effect_on_photosynthesis, n_conc_effect_on_photosynthesis, n_optimum_variation_due_to_co2,
    temperature_effect_on_respiration, temperature_limiting_factor,
};

/// mg CO2/m² → kg C/ha
const MG_CO2_PER_M2_TO_KG_C_PER_HA: f64 = 0.001 * (12.0 / 44.0) * 10.0;

/// Cover that, with the green LAI, intercepts what the canopy model says was
/// intercepted out of the radiation at the top of the canopy.
pub fn effective_green_cover(radiation_top: f64, intercepted: f64, green_lai: f64) -> f64 {
    if radiation_top <= 0.0 {
        return 0.0;
    }
    let log_transmitted = if intercepted < radiation_top { (1.0 - intercepted / radiation_top).ln() } else { 0.0 };
    let k_effective = divide(-log_transmitted, green_lai, 0.0);
    if k_effective * green_lai > EPSILON {
        1.0 - (-k_effective * green_lai).exp()
    } else {
        0.0
    }
}

/// Single leaf photosynthetic rate [mg CO2/m² leaf/s] for irradiance `il` [J/m² leaf/s].
pub fn single_leaf_photosynthesis(il: f64, p_max: f64, params: &PhotosynthesisParams) -> f64 {
    let theta = params.curvature;
    let alpha_i = params.efficiency * il;
    let sum = alpha_i + p_max;
    let root = (sum * sum - 4.0 * theta * alpha_i * p_max).max(0.0).sqrt();
    (0.5 / theta) * (sum - root)
}

/// Weather and canopy drivers of today's photosynthesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotosynthesisDrivers {
    pub max_t: f64,
    pub min_t: f64,
    /// Atmospheric CO2 [ppm]
    pub co2: f64,
    /// Day length [hours]
    pub day_length: f64,
    /// Solar radiation on top of the canopy [MJ/m²/day]
    pub radiation_top: f64,
    pub effective_green_cover: f64,
    /// N concentration of live leaves [kg N/kg DM]
    pub leaf_n_conc: f64,
}

/// Gross potential photosynthesis before stress and phenology reductions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GrossPhotosynthesis {
    /// [kg C/ha/day]
    pub carbon: f64,
    pub glf_co2: f64,
    pub glf_n_conc: f64,
    /// Temperature factor, for reporting [0-1]
    pub glf_temperature: f64,
    /// Radiation factor, for reporting [0-1]
    pub glf_radiation: f64,
}

pub fn potential_photosynthesis(drivers: &PhotosynthesisDrivers, config: &SpeciesConfig) -> GrossPhotosynthesis {
    let params = &config.photosynthesis;
    let glf_co2 = co2_effect_on_photosynthesis(drivers.co2, &config.co2);
    let co2_n = n_optimum_variation_due_to_co2(drivers.co2, &config.co2);
    let glf_n_conc = n_conc_effect_on_photosynthesis(drivers.leaf_n_conc, &config.nitrogen.leaf, co2_n);

    let t1 = weighted_mean_temperature(drivers.max_t, drivers.min_t, 0.5);
    let t2 = weighted_mean_temperature(drivers.max_t, drivers.min_t, 0.75);
    let temp1 = temperature_limiting_factor(t1, &config.temperature, config.pathway);
    let temp2 = temperature_limiting_factor(t2, &config.temperature, config.pathway);

    let p_max1 = params.reference_rate * temp1 * glf_co2 * glf_n_conc;
    let p_max2 = params.reference_rate * temp2 * glf_co2 * glf_n_conc;

    // --- Midday PAR on leaves [J/m² leaf/s] ---
    let day_seconds = 3600.0 * drivers.day_length;
    let par = divide(params.fraction_par * drivers.radiation_top * 1e6, day_seconds, 0.0)
        * params.light_extinction_coefficient
        * (4.0 / 3.0);

    let pl1 = single_leaf_photosynthesis(0.5 * par, p_max1, params);
    let pl2 = single_leaf_photosynthesis(par, p_max2, params);
    let pl_daily = day_seconds * (pl1 + pl2) * 0.5;

    let canopy = pl_daily * drivers.effective_green_cover / params.light_extinction_coefficient;

    GrossPhotosynthesis {
        carbon: canopy * MG_CO2_PER_M2_TO_KG_C_PER_HA,
        glf_co2,
        glf_n_conc,
        glf_temperature: 0.25 * temp1 + 0.75 * temp2,
        glf_radiation: divide(0.25 * pl1 + 0.75 * pl2, 0.25 * p_max1 + 0.75 * p_max2, 1.0),
    }
}

/// Maintenance respiration [kg C/ha/day] of `live_dm` kg/ha of live tissue.
pub fn maintenance_respiration(live_dm: f64, t_mean: f64, glf_n_conc: f64, params: &RespirationParams) -> f64 {
    let live_carbon = live_dm * CARBON_FRACTION_IN_DM;
    let result = live_carbon * params.maintenance_coefficient * temperature_effect_on_respiration(t_mean, params) * glf_n_conc;
    result.max(0.0)
}

pub fn growth_respiration(gross: f64, params: &RespirationParams) -> f64 {
    gross * params.growth_coefficient
}

/// Net potential growth [kg DM/ha/day].
pub fn net_potential_growth(gross: f64, growth_resp: f64, maintenance_resp: f64, remobilised_carbon: f64) -> f64 {
    (gross - growth_resp + remobilised_carbon - maintenance_resp).max(0.0) / CARBON_FRACTION_IN_DM
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn summer_day(cover: f64) -> PhotosynthesisDrivers {
        PhotosynthesisDrivers {
            max_t: 24.0,
            min_t: 12.0,
            co2: 380.0,
            day_length: 14.0,
            radiation_top: 22.0,
            effective_green_cover: cover,
            leaf_n_conc: 0.045,
        }
    }

    #[test]
    fn test_single_leaf_saturates_at_pmax() {
        let params = PhotosynthesisParams::default();
        assert_eq!(single_leaf_photosynthesis(0.0, 1.0, &params), 0.0);
        let bright = single_leaf_photosynthesis(1e6, 1.0, &params);
        assert!(bright < 1.0 && bright > 0.99, "{}", bright);
        let dim = single_leaf_photosynthesis(10.0, 1.0, &params);
        assert!(dim < 0.1);
    }

    #[test]
    fn test_effective_cover_matches_interception() {
        // reproduces the intercepted fraction regardless of LAI
        let cover = effective_green_cover(20.0, 15.0, 3.0);
        assert_relative_eq!(cover, 0.75, epsilon = 1e-12);
        assert_eq!(effective_green_cover(0.0, 0.0, 3.0), 0.0);
        assert_eq!(effective_green_cover(20.0, 15.0, 0.0), 0.0);
    }

    #[test]
    fn test_no_cover_no_photosynthesis() {
        let cfg = SpeciesConfig::default();
        let gross = potential_photosynthesis(&summer_day(0.0), &cfg);
        assert_eq!(gross.carbon, 0.0);
    }

    #[test]
    fn test_summer_day_is_in_realistic_range() {
        let cfg = SpeciesConfig::default();
        let gross = potential_photosynthesis(&summer_day(0.9), &cfg);
        // tens of kg C/ha/day for a dense sward in summer
        assert!(gross.carbon > 20.0 && gross.carbon < 200.0, "gross = {}", gross.carbon);
        assert_eq!(gross.glf_co2, 1.0);
        assert_eq!(gross.glf_n_conc, 1.0);
        assert!(gross.glf_radiation > 0.0 && gross.glf_radiation <= 1.0);
    }

    #[test]
    fn test_low_leaf_n_reduces_photosynthesis() {
        let cfg = SpeciesConfig::default();
        let full = potential_photosynthesis(&summer_day(0.9), &cfg);
        let starved = potential_photosynthesis(&PhotosynthesisDrivers { leaf_n_conc: 0.02, ..summer_day(0.9) }, &cfg);
        assert!(starved.carbon < full.carbon);
        assert!(starved.glf_n_conc < 1.0);
    }

    #[test]
    fn test_respiration_and_net_growth() {
        let params = RespirationParams::default();
        // 2500 kg/ha live at reference temperature: 1000 kg C × 0.03
        assert_relative_eq!(maintenance_respiration(2500.0, 20.0, 1.0, &params), 30.0, epsilon = 1e-9);
        assert_relative_eq!(growth_respiration(100.0, &params), 25.0);
        assert_relative_eq!(net_potential_growth(100.0, 25.0, 30.0, 0.0), 112.5, epsilon = 1e-9);
        assert_eq!(net_potential_growth(10.0, 2.5, 30.0, 0.0), 0.0);
        assert_relative_eq!(net_potential_growth(10.0, 2.5, 30.0, 40.0), 43.75, epsilon = 1e-9);
    }
}
