// ============================================================================
// Environmental Responses — Multipliers applied to growth and turnover
//
// Pure functions of today's conditions. Unless stated otherwise each one
// returns a factor in [0, 1]. Responses that carry memory between days
// (heat, cold, water logging) live in `stress`.
// ============================================================================

pub mod stress;

pub use stress::{root_zone_water, ColdStress, HeatStress, RootZoneWater, WaterLogging};

use crate::common::{bound, divide};
use crate::config::{Co2Params, GrowthTemperatureParams, NConcentration, PhotosynthesisPathway, RespirationParams, TurnoverParams};

/// Effect of temperature on photosynthesis [0-1].
///
/// Asymmetric bell curve peaking at the optimum. C4 plants hold the peak
/// above the optimum; C3 plants decline to zero at the derived maximum.
pub fn temperature_limiting_factor(
    temperature: f64,
    params: &GrowthTemperatureParams,
    pathway: PhotosynthesisPathway,
) -> f64 {
    let t_min = params.minimum;
    let t_opt = params.optimum;
    let t_max = params.maximum();
    let q = params.exponent;

    let t = match pathway {
        PhotosynthesisPathway::C3 if temperature >= t_max => return 0.0,
        PhotosynthesisPathway::C3 => temperature,
        PhotosynthesisPathway::C4 => temperature.min(t_opt),
    };
    if t <= t_min {
        return 0.0;
    }
    let value = (t - t_min).powf(q) * (t_max - t);
    let peak = (t_opt - t_min).powf(q) * (t_max - t_opt);
    bound(value / peak, 0.0, 1.0)
}

/// Effect of temperature on maintenance respiration.
///
/// Equals 1 at the reference temperature and keeps rising above it.
pub fn temperature_effect_on_respiration(temperature: f64, params: &RespirationParams) -> f64 {
    if temperature <= 0.0 {
        return 0.0;
    }
    let scale = 1.0 - (-1.0f64).exp();
    let base = 1.0 - (-(temperature / params.reference_temperature).powf(params.exponent)).exp();
    base / scale
}

/// Effect of atmospheric CO2 on photosynthesis; 1 at the reference
/// concentration, above 1 for richer air.
pub fn co2_effect_on_photosynthesis(co2: f64, params: &Co2Params) -> f64 {
    if (co2 - params.reference).abs() < 0.01 {
        return 1.0;
    }
    let reference = params.reference;
    let scale = params.scale_factor;
    (co2 / (co2 + scale)) * ((reference + scale) / reference)
}

/// Relative change of the optimum N concentration under elevated CO2.
pub fn n_optimum_variation_due_to_co2(co2: f64, params: &Co2Params) -> f64 {
    if (co2 - params.reference).abs() < 0.01 {
        return 1.0;
    }
    let factor = ((params.offset_factor - params.reference) / (co2 - params.reference)).powf(params.exponent);
    if !factor.is_finite() {
        return 1.0;
    }
    (params.minimum + factor) / (1.0 + factor)
}

/// Effect of leaf N concentration on photosynthesis.
///
/// Zero at the minimum concentration, linear up to the CO2-adjusted optimum.
pub fn n_conc_effect_on_photosynthesis(leaf_n_conc: f64, leaf: &NConcentration, co2_variation: f64) -> f64 {
    let optimum = leaf.optimum * co2_variation;
    let effect = if leaf_n_conc <= leaf.minimum {
        0.0
    } else if leaf_n_conc < optimum {
        divide(leaf_n_conc - leaf.minimum, optimum - leaf.minimum, 1.0)
    } else {
        1.0
    };
    bound(effect, 0.0, 1.0)
}

/// Effect of temperature on tissue turnover.
pub fn turnover_temperature_factor(temperature: f64, params: &TurnoverParams) -> f64 {
    let t_min = params.temperature_minimum;
    let t_ref = params.temperature_reference;
    if temperature <= t_min {
        0.0
    } else if temperature <= t_ref {
        ((temperature - t_min) / (t_ref - t_min)).powf(params.temperature_exponent)
    } else {
        1.0
    }
}

/// Effect of soil moisture on tissue turnover; at least 1.
///
/// `water_factor` is the more limiting of the water supply and water
/// logging factors.
pub fn moisture_effect_on_turnover(water_factor: f64, params: &TurnoverParams) -> f64 {
    let threshold = params.drought_threshold;
    if water_factor < threshold {
        let severity = (threshold - water_factor) / threshold;
        1.0 + params.drought_effect_max * severity
    } else {
        1.0
    }
}

/// Effect of drought on the detachment of dead material.
pub fn moisture_effect_on_detachment(water_supply_factor: f64, params: &TurnoverParams) -> f64 {
    let minimum = params.detachment_drought_effect_min;
    let effect = water_supply_factor.max(0.0).powf(params.detachment_drought_coefficient);
    minimum + effect * (1.0 - minimum).max(0.0)
}

/// Ratio of actual to demanded water uptake [0-1].
pub fn water_deficit_factor(uptake: f64, demand: f64) -> f64 {
    bound(divide(uptake, demand, 1.0), 0.0, 1.0)
}

/// Fraction of ground covered by a canopy of `lai`, Beer's law.
pub fn plant_cover(lai: f64, extinction_coefficient: f64) -> f64 {
    if lai <= crate::common::EPSILON {
        return 0.0;
    }
    1.0 - (-extinction_coefficient * lai).exp()
}
