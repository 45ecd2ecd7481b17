// ============================================================================
// Canopy — Leaf area, cover and height derived from the organ pools
//
//   green LAI  leaves + a share of stolons (+ stems of sparse non-legumes)
//   dead  LAI  dead leaves
//   cover      Beer's law on LAI with the light extinction coefficient
//   height     power curve of harvestable DM between minimum and maximum
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::config::CanopyParams;
use crate::response::plant_cover;

/// Pools the canopy is derived from [kg/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CanopyPools {
    pub leaf_live: f64,
    pub leaf_dead: f64,
    pub stem_live: f64,
    pub stolon_live: f64,
    pub above_ground_live: f64,
    pub harvestable: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanopyState {
    pub lai_green: f64,
    pub lai_dead: f64,
    /// [mm]
    pub height: f64,
    pub cover_green: f64,
    pub cover_dead: f64,
    pub cover_total: f64,
}

impl CanopyState {
    pub fn evaluate(pools: &CanopyPools, is_alive: bool, is_legume: bool, params: &CanopyParams, k: f64) -> Self {
        if !is_alive {
            return Self::default();
        }
        let lai_green = green_lai(pools, is_legume, params);
        let lai_dead = dead_lai(pools.leaf_dead, params);
        Self {
            lai_green,
            lai_dead,
            height: plant_height(pools.harvestable, is_alive, params),
            cover_green: plant_cover(lai_green, k),
            cover_dead: plant_cover(lai_dead, k),
            cover_total: plant_cover(lai_green + lai_dead, k),
        }
    }
}

/// Green leaf area index [m²/m²].
pub fn green_lai(pools: &CanopyPools, is_legume: bool, params: &CanopyParams) -> f64 {
    // kg/ha → kg/m² × m²/kg
    let mut green = pools.leaf_live / 10_000.0;
    green += pools.stolon_live * params.stolon_effect_on_lai / 10_000.0;

    // sparse swards: stems add photosynthetic area
    if !is_legume && pools.above_ground_live < params.shoot_max_effect_on_lai {
        let sparse = (1.0 - pools.above_ground_live / params.shoot_max_effect_on_lai).sqrt();
        green += pools.stem_live * params.max_stem_effect_on_lai * sparse / 10_000.0;
    }
    (green * params.specific_leaf_area).max(0.0)
}

pub fn dead_lai(leaf_dead: f64, params: &CanopyParams) -> f64 {
    (leaf_dead / 10_000.0 * params.specific_leaf_area).max(0.0)
}

/// Canopy height [mm].
pub fn plant_height(harvestable: f64, is_alive: bool, params: &CanopyParams) -> f64 {
    if !is_alive {
        return 0.0;
    }
    if harvestable > params.height_mass_for_max {
        return params.height_maximum;
    }
    let e = params.height_exponent;
    let r = (harvestable / params.height_mass_for_max).max(0.0);
    let f = (e - e * r + r) * r.powf(e - 1.0);
    (params.height_maximum * f).max(params.height_minimum)
}
