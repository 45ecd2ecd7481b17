// ============================================================================
// Collaborator Interfaces — What the engine reads and what it hands back
//
//   caller ──DailyInputs──────────────▶ PastureSpecies::advance_one_day
//          weather, canopy exchange,            │
//          one ZoneSoilState per zone           │ potential uptake per zone
//                                               ▼
//                                        SoilArbitrator ──actual uptake──┐
//                                                                        │
//          ResidueSink ◀──detached shoot / roots by layer────────────────┘
//
// The engine owns none of these. Two stock collaborators are provided: an
// arbitrator that grants every request as asked, and a ledger that keeps
// totals of everything returned to the soil surface and profile.
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::common::weighted_mean_temperature;
use crate::config::PlantFamily;
use crate::soil::{AvailableNitrogen, ZoneSoilState};

/// One day of weather.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    /// [°C]
    pub max_t: f64,
    /// [°C]
    pub min_t: f64,
    /// Solar radiation [MJ/m²/day]
    pub radiation: f64,
    /// Atmospheric CO2 [ppm]
    pub co2: f64,
    /// [hours]
    pub day_length: f64,
    /// [hPa]
    pub vapour_pressure: f64,
    /// [degrees, negative south]
    pub latitude: f64,
    pub day_of_year: u32,
    pub year_length: u32,
}

impl DailyWeather {
    pub fn mean_temperature(&self) -> f64 {
        weighted_mean_temperature(self.max_t, self.min_t, 0.5)
    }
}

impl Default for DailyWeather {
    fn default() -> Self {
        Self {
            max_t:           20.0,
            min_t:           10.0,
            radiation:       15.0,
            co2:             380.0,
            day_length:      12.0,
            vapour_pressure: 12.0,
            latitude:        -41.0,
            day_of_year:     1,
            year_length:     365,
        }
    }
}

/// Results of the canopy energy balance for this species.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CanopyExchange {
    /// Radiation intercepted by the green canopy [MJ/m²/day]
    pub intercepted_radiation: f64,
    /// Potential transpiration [mm/day]
    pub water_demand: f64,
}

/// Everything the engine needs from outside for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInputs {
    pub weather: DailyWeather,
    pub canopy: CanopyExchange,
    /// Soil state of every zone the roots explore
    pub zones: Vec<ZoneSoilState>,
}

/// Water the plant would take from one zone, per layer [mm].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneWaterRequest {
    pub zone: String,
    pub potential: Vec<f64>,
}

/// Mineral N the plant would take from one zone, per layer [kg N/ha].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneNitrogenRequest {
    pub zone: String,
    pub potential: AvailableNitrogen,
}

/// Decides the actual soil uptake when plants compete for water and N.
///
/// Answers come back in request order, with one value per layer.
pub trait SoilArbitrator {
    fn water_uptake(&mut self, requests: &[ZoneWaterRequest]) -> Vec<Vec<f64>>;

    fn nitrogen_uptake(&mut self, requests: &[ZoneNitrogenRequest]) -> Vec<AvailableNitrogen>;
}

/// Grants every request in full.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughArbitrator;

impl SoilArbitrator for PassThroughArbitrator {
    fn water_uptake(&mut self, requests: &[ZoneWaterRequest]) -> Vec<Vec<f64>> {
        requests.iter().map(|r| r.potential.clone()).collect()
    }

    fn nitrogen_uptake(&mut self, requests: &[ZoneNitrogenRequest]) -> Vec<AvailableNitrogen> {
        requests.iter().map(|r| r.potential.clone()).collect()
    }
}

/// Shoot material leaving the plant for the soil surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetachedShoot {
    /// [kg/ha]
    pub dm: f64,
    /// [kg N/ha]
    pub n: f64,
    pub material: PlantFamily,
}

/// Receives detached and returned plant material.
pub trait ResidueSink {
    fn add_surface_residue(&mut self, residue: &DetachedShoot);

    /// Root material incorporated into the soil organic matter of `zone`.
    fn add_soil_fom(&mut self, zone: &str, dm_by_layer: &[f64], n_by_layer: &[f64]);
}

/// Running totals of everything returned to the soil.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidueLedger {
    pub surface_dm: f64,
    pub surface_n: f64,
    pub soil_dm: BTreeMap<String, Vec<f64>>,
    pub soil_n: BTreeMap<String, Vec<f64>>,
}

impl ResidueLedger {
    pub fn soil_dm_total(&self) -> f64 {
        self.soil_dm.values().flatten().sum()
    }

    pub fn soil_n_total(&self) -> f64 {
        self.soil_n.values().flatten().sum()
    }
}

fn accumulate_layers(into: &mut Vec<f64>, values: &[f64]) {
    if into.len() < values.len() {
        into.resize(values.len(), 0.0);
    }
    into.iter_mut().zip(values).for_each(|(a, v)| *a += v);
}

impl ResidueSink for ResidueLedger {
    fn add_surface_residue(&mut self, residue: &DetachedShoot) {
        self.surface_dm += residue.dm;
        self.surface_n += residue.n;
    }

    fn add_soil_fom(&mut self, zone: &str, dm_by_layer: &[f64], n_by_layer: &[f64]) {
        trace!(zone, dm = dm_by_layer.iter().sum::<f64>(), "root material to soil");
        accumulate_layers(self.soil_dm.entry(zone.to_string()).or_default(), dm_by_layer);
        accumulate_layers(self.soil_n.entry(zone.to_string()).or_default(), n_by_layer);
    }
}
