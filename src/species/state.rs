//! Daily fluxes, persisted growth limiting factors and the read-only snapshot.

use serde::{Deserialize, Serialize};

use crate::allocation::OrganSplit;
use crate::phenology::PhenologyStage;
use crate::turnover::TurnoverRates;

/// Growth limiting factors [0-1].
///
/// The soil-related factors are carried to the next day, where they steer
/// turnover and the shoot:root allocation before being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthLimits {
    pub water_supply: f64,
    pub water_logging: f64,
    /// Ratio of N supplied to the optimum demand
    pub n_supply: f64,
    /// `n_supply` after the dilution exponent
    pub nitrogen: f64,
    pub heat: f64,
    pub cold: f64,
    pub temperature: f64,
    pub co2: f64,
    pub n_concentration: f64,
    pub radiation: f64,
}

impl Default for GrowthLimits {
    fn default() -> Self {
        Self {
            water_supply:    1.0,
            water_logging:   1.0,
            n_supply:        1.0,
            nitrogen:        1.0,
            heat:            1.0,
            cold:            1.0,
            temperature:     1.0,
            co2:             1.0,
            n_concentration: 1.0,
            radiation:       1.0,
        }
    }
}

impl GrowthLimits {
    /// Most limiting of the soil factors, used by the shoot:root allocation.
    pub fn soil(&self) -> f64 {
        self.water_supply.min(self.water_logging).min(self.n_supply)
    }
}

/// Today's fluxes. Zeroed at the start of each day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyFluxes {
    // --- Carbon [kg C/ha] ---
    pub gross_photosynthesis: f64,
    pub respiration_maintenance: f64,
    pub respiration_growth: f64,
    pub carbon_remobilised: f64,

    // --- DM [kg/ha] ---
    pub dm_potential: f64,
    pub dm_after_water: f64,
    pub dm_actual: f64,
    pub dm_shoot_growth: f64,
    pub dm_root_growth: f64,
    pub dm_senesced: f64,
    pub dm_shoot_detached: f64,
    pub dm_root_detached: f64,

    // --- N [kg N/ha] ---
    pub n_demand_optimum: f64,
    pub n_demand_luxury: f64,
    pub n_fixed: f64,
    pub n_senesced_remobilised: f64,
    pub n_luxury_remobilised: f64,
    pub n_soil_demand: f64,
    pub n_soil_available: f64,
    pub n_uptake: f64,
    pub n_new_growth: f64,
    pub n_shoot_detached: f64,
    pub n_root_detached: f64,

    // --- Water [mm] ---
    pub water_demand: f64,
    pub water_supply: f64,
    pub water_uptake: f64,

    // --- Allocation and turnover ---
    pub fraction_to_shoot: f64,
    pub fraction_to_leaf: f64,
    pub shares: OrganSplit,
    pub turnover: TurnoverRates,
    /// Rooting depth gained today, deepest zone [mm]
    pub root_elongation: f64,
}

/// Whole-plant snapshot produced once per day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesState {
    pub name: String,
    pub is_alive: bool,
    pub stage: PhenologyStage,
    pub days_since_emergence: u32,

    // --- DM [kg/ha] ---
    pub dm_leaf_live: f64,
    pub dm_leaf_dead: f64,
    pub dm_stem_live: f64,
    pub dm_stem_dead: f64,
    pub dm_stolon_live: f64,
    pub dm_stolon_dead: f64,
    pub dm_root_live: f64,
    pub dm_root_dead: f64,
    pub dm_above_ground: f64,
    pub dm_below_ground: f64,
    pub dm_total: f64,
    pub dm_standing: f64,
    pub dm_harvestable: f64,

    // --- N [kg N/ha] ---
    pub n_above_ground: f64,
    pub n_below_ground: f64,
    pub n_total: f64,
    /// N concentration of standing herbage [kg N/kg DM]
    pub herbage_n_conc: f64,

    // --- Canopy ---
    pub lai_green: f64,
    pub lai_dead: f64,
    /// [mm]
    pub height: f64,
    pub cover_green: f64,
    pub cover_total: f64,
    /// Deepest rooting depth over all zones [mm]
    pub root_depth: f64,

    // --- Digestibility [0-1] ---
    pub digestibility_live: f64,
    pub digestibility_dead: f64,
    pub digestibility_herbage: f64,

    // --- Memory ---
    pub heat_factor: f64,
    pub cold_factor: f64,
    pub water_logging_cumulative: f64,
    pub defoliation_cumulative: f64,

    pub limits: GrowthLimits,
    pub fluxes: DailyFluxes,
}
