//! Whole-plant DM and N conservation, and tissue N concentrations, over
//! long runs of random days.

mod common;

use approx::assert_relative_eq;
use pasture_growth::common::CARBON_FRACTION_IN_DM;
use pasture_growth::{PassThroughArbitrator, PastureSpecies, RemovalMode, ResidueLedger, SpeciesConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{assert_n_concentrations_in_range, inputs_for, random_weather, random_zone};

fn run_and_check(mut plant: PastureSpecies, seed: u64, days: u32) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ledger = ResidueLedger::default();
    let start = plant.state();
    let mut dm_expected = start.dm_total;
    let mut n_expected = start.n_total;
    let mut shoot_detached = 0.0;
    let mut root_detached = 0.0;

    for day in 1..=days {
        let weather = random_weather(&mut rng, day);
        let inputs = inputs_for(&plant, weather, vec![random_zone(&mut rng)]);
        let state = plant
            .advance_one_day(&inputs, &mut PassThroughArbitrator, &mut ledger)
            .unwrap_or_else(|e| panic!("day {day} failed: {e}"));
        let f = &state.fluxes;

        for value in [
            state.dm_leaf_live,
            state.dm_leaf_dead,
            state.dm_stem_live,
            state.dm_stem_dead,
            state.dm_stolon_live,
            state.dm_stolon_dead,
            state.dm_root_live,
            state.dm_root_dead,
            state.n_total,
            f.dm_actual,
            f.n_uptake,
            f.n_fixed,
        ] {
            assert!(value >= 0.0, "negative pool or flux on day {day}: {value}");
        }
        for rate in [f.turnover.shoot, f.turnover.stolon, f.turnover.root, f.turnover.detachment] {
            assert!((0.0..=1.0).contains(&rate), "turnover rate {rate} on day {day}");
        }
        if f.dm_actual > 0.0 {
            assert_relative_eq!(f.shares.total(), 1.0, epsilon = 1e-9);
        }
        assert!((0.0..=1.0).contains(&state.limits.nitrogen));
        assert!((0.0..=1.0).contains(&state.limits.water_supply));

        dm_expected += f.dm_actual - f.dm_shoot_detached - f.dm_root_detached - f.carbon_remobilised / CARBON_FRACTION_IN_DM;
        n_expected += f.n_fixed + f.n_uptake - f.n_shoot_detached - f.n_root_detached;
        shoot_detached += f.dm_shoot_detached;
        root_detached += f.dm_root_detached;

        assert_relative_eq!(state.dm_total, dm_expected, epsilon = 1e-6, max_relative = 1e-9);
        assert_relative_eq!(state.n_total, n_expected, epsilon = 1e-6, max_relative = 1e-9);
        assert_n_concentrations_in_range(&plant, day);

        // an occasional grazing keeps the defoliation path busy
        if day % 30 == 0 {
            let removed = plant.graze(RemovalMode::SetResidueAmount, 1200.0).expect("graze");
            dm_expected -= removed.dm_removed;
            n_expected -= removed.n_removed;
        }
    }

    assert_relative_eq!(ledger.surface_dm, shoot_detached, epsilon = 1e-6);
    assert_relative_eq!(ledger.soil_dm_total(), root_detached, epsilon = 1e-6);
}

#[test]
fn ryegrass_conserves_mass_over_random_days() {
    run_and_check(common::species(SpeciesConfig::default()), 7, 200);
}

#[test]
fn white_clover_conserves_mass_over_random_days() {
    run_and_check(common::species(SpeciesConfig::white_clover()), 11, 200);
}

#[test]
fn remobilising_grass_conserves_mass_over_random_days() {
    let mut config = SpeciesConfig::default();
    config.turnover.fraction_carbon_remobilisable = 0.2;
    config.nitrogen.fraction_luxury_remobilisable = vec![0.1, 0.2, 0.3];
    run_and_check(common::species(config), 23, 150);
}

#[test]
fn sparse_sward_conserves_mass_over_random_days() {
    run_and_check(common::grass(150.0), 42, 120);
}

#[test]
fn infertile_grass_conserves_mass_over_random_days() {
    let mut config = SpeciesConfig::default();
    config.nitrogen.soil_fertility_factor = 0.5;
    config.nitrogen.fraction_luxury_remobilisable = vec![0.2, 0.3, 0.5];
    run_and_check(common::species(config), 5, 150);
}
