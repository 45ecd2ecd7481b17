//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use pasture_growth::{
    CanopyExchange, DailyInputs, DailyWeather, PastureSpecies, SoilProfile, SpeciesConfig, ZoneSoilState,
};
use rand::rngs::StdRng;
use rand::Rng;

pub const HOME: &str = "paddock";

pub fn profile() -> SoilProfile {
    SoilProfile::silt_loam(10, 100.0)
}

pub fn species(config: SpeciesConfig) -> PastureSpecies {
    PastureSpecies::new(config, HOME, &profile(), -41.0).expect("valid species")
}

pub fn grass(shoot_dm: f64) -> PastureSpecies {
    let mut config = SpeciesConfig::default();
    config.initial.shoot_dm = shoot_dm;
    species(config)
}

pub fn wet_zone(nh4: f64, no3: f64) -> ZoneSoilState {
    ZoneSoilState::at_field_capacity(HOME, profile(), nh4, no3)
}

pub fn mild_weather() -> DailyWeather {
    DailyWeather { max_t: 20.0, min_t: 20.0, radiation: 20.0, ..DailyWeather::default() }
}

/// Canopy exchange as a host model would hand it over: intercepted
/// radiation from today's cover and a demand proportional to it.
pub fn inputs_for(species: &PastureSpecies, weather: DailyWeather, zones: Vec<ZoneSoilState>) -> DailyInputs {
    let cover = species.canopy.cover_green;
    DailyInputs {
        canopy: CanopyExchange {
            intercepted_radiation: weather.radiation * cover,
            water_demand: 0.3 * weather.radiation * cover,
        },
        weather,
        zones,
    }
}

pub fn random_weather(rng: &mut StdRng, day_of_year: u32) -> DailyWeather {
    let max_t = rng.gen_range(2.0..36.0);
    DailyWeather {
        max_t,
        min_t: max_t - rng.gen_range(2.0..14.0),
        radiation: rng.gen_range(0.0..30.0),
        co2: rng.gen_range(350.0..700.0),
        day_length: rng.gen_range(9.0..15.0),
        vapour_pressure: rng.gen_range(5.0..20.0),
        latitude: -41.0,
        day_of_year,
        year_length: 365,
    }
}

/// A zone somewhere between dry and saturated, with patchy mineral N.
pub fn random_zone(rng: &mut StdRng) -> ZoneSoilState {
    let mut zone = wet_zone(0.0, 0.0);
    for layer in 0..zone.n_layers() {
        let ll = zone.profile.ll_mm(layer);
        let sat = zone.profile.sat_mm(layer);
        zone.water[layer] = ll + rng.gen_range(0.0..1.0) * (sat - ll);
        zone.nh4[layer] = rng.gen_range(0.0..3.0);
        zone.no3[layer] = rng.gen_range(0.0..10.0);
    }
    zone
}

/// Every live cohort of any size holds N between its organ's minimum and
/// maximum concentration; no cohort holds negative N.
pub fn assert_n_concentrations_in_range(plant: &PastureSpecies, day: u32) {
    let organs = [&plant.leaf, &plant.stem, &plant.stolon]
        .into_iter()
        .chain(plant.roots.iter().map(|r| &r.organ));
    for organ in organs {
        let dead = organ.tissues.len() - 1;
        let bounds = &organ.n_conc;
        for (t, tissue) in organ.tissues.iter().enumerate() {
            assert!(tissue.n >= 0.0, "{:?} cohort {t} holds {} kg N on day {day}", organ.kind, tissue.n);
            if t == dead || tissue.dm < 1.0 {
                continue;
            }
            let conc = tissue.n / tissue.dm;
            assert!(
                conc <= bounds.maximum * (1.0 + 1e-6),
                "{:?} cohort {t} at {conc} above maximum {} on day {day}",
                organ.kind,
                bounds.maximum
            );
            assert!(
                conc >= bounds.minimum * (1.0 - 1e-6),
                "{:?} cohort {t} at {conc} below minimum {} on day {day}",
                organ.kind,
                bounds.minimum
            );
        }
    }
}
