// ============================================================================
// Daily Step — One simulated day of growth and turnover
//
//   phenology ─▶ turnover ─▶ photosynthesis ─▶ allocation fractions
//                                                   │
//        ┌──────────────────────────────────────────┘
//        ▼
//   water ─▶ N demand ─▶ fixation ─▶ senesced N ─▶ soil N ─▶ luxury N
//                                                              │
//        ┌─────────────────────────────────────────────────────┘
//        ▼
//   N limitation ─▶ new DM and N to emerging cohorts ─▶ commit ─▶ sinks
//
// Every stage reads what the previous ones booked; none may be moved. A day
// that fails a balance check leaves the species as it was in the morning.
// ============================================================================

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use super::PastureSpecies;
use crate::allocation::{fraction_to_leaf, fraction_to_shoot, split_new_nitrogen, OrganSplit};
use crate::common::{divide, nearly_equal, CARBON_FRACTION_IN_DM, EPSILON, MASS_BALANCE_TOLERANCE};
use crate::config::{NConcentration, UptakeSource};
use crate::diag::trace_daily_budget;
use crate::error::{PastureError, Result};
use crate::interfaces::{DailyInputs, DetachedShoot, ResidueSink, SoilArbitrator, ZoneNitrogenRequest, ZoneWaterRequest};
use crate::nitrogen::{
    fixation, luxury_shortfall, nitrogen_demand, nitrogen_limitation, plan_luxury_remobilisation, soil_nitrogen_demand,
    NitrogenDemand,
};
use crate::organs::Organ;
use crate::phenology::{PhenologyEvent, PhenologyStage};
use crate::photosynthesis::{
    effective_green_cover, growth_respiration, maintenance_respiration, net_potential_growth, potential_photosynthesis,
    PhotosynthesisDrivers,
};
use crate::response::{
    n_optimum_variation_due_to_co2, root_zone_water, temperature_limiting_factor, water_deficit_factor, RootZoneWater,
};
use crate::soil::{plant_available_nitrogen, plant_available_water, AvailableNitrogen, ZoneSoilState};
use crate::turnover::{TurnoverDrivers, TurnoverRates};

use super::state::SpeciesState;

/// Water and N found for today's growth.
struct SoilSupply {
    /// Actual water uptake per zone and layer [mm]
    water_uptake: Vec<Vec<f64>>,
    /// Available mineral N per zone [kg N/ha]
    n_available: Vec<AvailableNitrogen>,
}

impl PastureSpecies {
    /// Advances the species by one day.
    ///
    /// `inputs.zones` must hold a soil state for every zone the roots explore.
    /// Potential uptakes go to `arbitrator` when the uptake source is external;
    /// detached material goes to `sink` once the day balances.
    pub fn advance_one_day(
        &mut self,
        inputs: &DailyInputs,
        arbitrator: &mut dyn SoilArbitrator,
        sink: &mut dyn ResidueSink,
    ) -> Result<SpeciesState> {
        let zones = self.match_zones(&inputs.zones)?;
        let morning = self.clone();
        match self.run_day(inputs, &zones, arbitrator, sink) {
            Ok(state) => Ok(state),
            Err(e) => {
                *self = morning;
                Err(e)
            }
        }
    }

    /// Soil state of each root system's zone, in root order.
    fn match_zones<'a>(&self, zones: &'a [ZoneSoilState]) -> Result<Vec<&'a ZoneSoilState>> {
        self.roots
            .iter()
            .map(|root| {
                let zone = zones
                    .iter()
                    .find(|z| z.zone == root.zone)
                    .ok_or_else(|| PastureError::UnknownZone(root.zone.clone()))?;
                zone.validate()?;
                if zone.n_layers() != root.n_layers() {
                    return Err(PastureError::LayerMismatch {
                        zone: root.zone.clone(),
                        expected: root.n_layers(),
                        found: zone.n_layers(),
                    });
                }
                Ok(zone)
            })
            .collect()
    }

    fn run_day(
        &mut self,
        inputs: &DailyInputs,
        zones: &[&ZoneSoilState],
        arbitrator: &mut dyn SoilArbitrator,
        sink: &mut dyn ResidueSink,
    ) -> Result<SpeciesState> {
        self.clear_daily();
        let weather = &inputs.weather;
        let annual = self.config.is_annual();

        if annual && !self.is_alive && weather.day_of_year == self.config.annual.doy_germination {
            self.sow();
        }
        if !self.is_alive {
            return Ok(self.state());
        }

        // --- Phenology ---
        let t_mean = weather.mean_temperature();
        if annual {
            let event =
                self.phenology
                    .advance_annual(weather.day_of_year, t_mean, self.config.temperature.minimum, &self.config.annual);
            match event {
                PhenologyEvent::GerminationWindow => info!(species = %self.config.name, "germination window opened"),
                PhenologyEvent::Anthesis => info!(species = %self.config.name, day = weather.day_of_year, "anthesis"),
                PhenologyEvent::Maturity => {
                    info!(species = %self.config.name, day = weather.day_of_year, "maturity");
                    self.end_crop(sink);
                    return Ok(self.state());
                }
                PhenologyEvent::None => {}
            }
        } else if self.phenology.stage.has_emerged() {
            self.phenology.days_since_emergence += 1;
        }

        if self.phenology.stage == PhenologyStage::Germinating {
            let progress = self.phenology.germination_progress(
                t_mean,
                self.config.temperature.minimum,
                self.config.germination.degree_days,
            );
            if progress >= 1.0 {
                self.set_emergence_state();
                info!(species = %self.config.name, day = weather.day_of_year, "emerged");
            }
            return Ok(self.state());
        }

        self.grow(inputs, zones, arbitrator, sink)?;
        let state = self.state();
        trace_daily_budget(&state);
        Ok(state)
    }

    fn clear_daily(&mut self) {
        self.leaf.clear_daily_transfers();
        self.stem.clear_daily_transfers();
        self.stolon.clear_daily_transfers();
        for root in self.roots.iter_mut() {
            root.organ.clear_daily_transfers();
        }
        self.fluxes = Default::default();
    }

    /// Area of each zone relative to the home zone.
    fn zone_weights(zones: &[&ZoneSoilState]) -> Vec<f64> {
        let home = zones.first().map(|z| z.area).unwrap_or(1.0);
        zones.iter().map(|z| divide(z.area, home, 1.0)).collect()
    }

    fn grow(
        &mut self,
        inputs: &DailyInputs,
        zones: &[&ZoneSoilState],
        arbitrator: &mut dyn SoilArbitrator,
        sink: &mut dyn ResidueSink,
    ) -> Result<()> {
        let weather = &inputs.weather;
        let t_mean = weather.mean_temperature();
        let weights = Self::zone_weights(zones);

        self.do_turnover(t_mean)?;

        // --- Potential growth ---
        let heat = self.heat_stress.update(weather.max_t, weather.min_t, &self.config.heat_stress);
        let cold = self.cold_stress.update(weather.max_t, weather.min_t, &self.config.cold_stress);
        let drivers = PhotosynthesisDrivers {
            max_t: weather.max_t,
            min_t: weather.min_t,
            co2: weather.co2,
            day_length: weather.day_length,
            radiation_top: weather.radiation,
            effective_green_cover: effective_green_cover(
                weather.radiation,
                inputs.canopy.intercepted_radiation,
                self.canopy.lai_green,
            ),
            leaf_n_conc: self.leaf.n_conc_live(),
        };
        let gross = potential_photosynthesis(&drivers, &self.config);
        let phenology_factor = if self.config.is_annual() {
            self.phenology.annual_growth_factor(&self.config.annual)
        } else {
            1.0
        };
        let carbon =
            gross.carbon * phenology_factor * heat.min(cold) * self.config.photosynthesis.generic_growth_factor;
        let live_dm = self.dm_above_ground_live() + self.dm_root_live();
        let maintenance = maintenance_respiration(live_dm, t_mean, gross.glf_n_conc, &self.config.respiration);
        let growth_resp = growth_respiration(carbon, &self.config.respiration);
        let carbon_remobilised = self.dm_carbon_remobilised() * CARBON_FRACTION_IN_DM;
        let dm_potential = net_potential_growth(carbon, growth_resp, maintenance, carbon_remobilised);

        self.limits.heat = heat;
        self.limits.cold = cold;
        self.limits.temperature = gross.glf_temperature;
        self.limits.co2 = gross.glf_co2;
        self.limits.n_concentration = gross.glf_n_conc;
        self.limits.radiation = gross.glf_radiation;
        self.fluxes.gross_photosynthesis = carbon;
        self.fluxes.respiration_maintenance = maintenance;
        self.fluxes.respiration_growth = growth_resp;
        self.fluxes.carbon_remobilised = carbon_remobilised;
        self.fluxes.dm_potential = dm_potential;

        // --- Allocation fractions ---
        let params = &self.config.allocation;
        let season = if self.config.is_annual() {
            1.0
        } else {
            self.season.factor(weather.day_of_year, weather.year_length)
        };
        let shoot_live = self.dm_above_ground_live();
        let to_shoot = fraction_to_shoot(shoot_live, self.dm_root_live(), self.limits.soil(), season, params);
        let to_leaf = fraction_to_leaf(
            shoot_live,
            self.leaf.dm_live(),
            self.stem.dm_live() + self.stolon.dm_live(),
            params,
        );
        let shares = OrganSplit::from_fractions(to_shoot, to_leaf, params.fraction_to_stolon);
        self.fluxes.fraction_to_shoot = to_shoot;
        self.fluxes.fraction_to_leaf = to_leaf;
        self.fluxes.shares = shares;

        // --- Water ---
        let supply = self.take_up_water(inputs, zones, &weights, arbitrator)?;
        let water_status = self
            .roots
            .iter()
            .zip(zones)
            .fold(RootZoneWater::default(), |mut acc, (root, zone)| {
                acc.accumulate(root_zone_water(zone, root, &self.config.water));
                acc
            });
        let glf_water_logging = self.water_logging.update(water_status, &self.config.water);
        let glf_water_supply = water_deficit_factor(self.fluxes.water_uptake, self.fluxes.water_demand);
        let dm_after_water = dm_potential * glf_water_supply.min(glf_water_logging);
        self.fluxes.dm_after_water = dm_after_water;

        // --- Nitrogen ---
        let (mut new_n, demand) =
            self.supply_nitrogen(dm_after_water, &shares, weather.co2, zones, &weights, &supply, arbitrator)?;
        let nitrogen = &self.config.nitrogen;
        let limitation = nitrogen_limitation(dm_after_water, new_n, demand.optimum, nitrogen.dilution_coefficient);
        let mut dm_actual = dm_after_water * limitation.glf_nitrogen.min(nitrogen.soil_fertility_factor);
        // dilution stops at the minimum N concentration
        if demand.minimum > EPSILON {
            dm_actual = dm_actual.min(dm_after_water * new_n / demand.minimum);
        }
        if dm_actual <= EPSILON {
            dm_actual = 0.0;
            if new_n > 0.0 {
                self.cancel_nitrogen_supply();
                new_n = 0.0;
            }
        }

        self.limits.water_supply = glf_water_supply;
        self.limits.water_logging = glf_water_logging;
        self.limits.n_supply = limitation.glf_supply;
        self.limits.nitrogen = limitation.glf_nitrogen;
        self.fluxes.dm_actual = dm_actual;
        self.fluxes.n_new_growth = new_n;

        // --- New growth ---
        self.allocate_new_growth(dm_actual, new_n, &shares, t_mean)?;
        self.commit_day(dm_actual, new_n, sink)?;
        self.update_canopy();
        Ok(())
    }

    /// Nothing grows today, so no N is taken in or moved out of tissue.
    fn cancel_nitrogen_supply(&mut self) {
        trace!(species = %self.config.name, n = self.fluxes.n_fixed + self.fluxes.n_uptake, "no growth, N supply returned");
        for organ in self.organs_mut() {
            organ.cancel_n_remobilisation();
        }
        self.fluxes.n_fixed = 0.0;
        self.fluxes.n_senesced_remobilised = 0.0;
        self.fluxes.n_uptake = 0.0;
        self.fluxes.n_luxury_remobilised = 0.0;
    }

    fn dm_carbon_remobilised(&self) -> f64 {
        self.shoot_organs().iter().map(|o| o.dm_carbon_remobilised).sum::<f64>()
            + self.roots.iter().map(|r| r.organ.dm_carbon_remobilised).sum::<f64>()
    }

    fn organs_mut(&mut self) -> impl Iterator<Item = &mut Organ> {
        [&mut self.leaf, &mut self.stem, &mut self.stolon]
            .into_iter()
            .chain(self.roots.iter_mut().map(|r| &mut r.organ))
    }

    fn organs(&self) -> impl Iterator<Item = &Organ> {
        self.shoot_organs().into_iter().chain(self.roots.iter().map(|r| &r.organ))
    }

    fn concentrations(&self) -> [&NConcentration; 4] {
        let n = &self.config.nitrogen;
        [&n.leaf, &n.stem, &n.stolon, &n.root]
    }

    // ------------------------------------------------------------------
    // Turnover
    // ------------------------------------------------------------------

    fn do_turnover(&mut self, t_mean: f64) -> Result<()> {
        let params = &self.config.turnover;
        let digestibility = &self.config.digestibility;
        let defoliation_effect = self.defoliation.release(params);

        let dead_dm = self.leaf.dm_dead() + self.stem.dm_dead();
        let dead_digestible = self.leaf.digestibility_dead(digestibility) * self.leaf.dm_dead()
            + self.stem.digestibility_dead(digestibility) * self.stem.dm_dead();
        let drivers = TurnoverDrivers {
            t_mean,
            glf_water_supply: self.limits.water_supply,
            glf_water_logging: self.limits.water_logging,
            digestibility_dead: divide(dead_digestible, dead_dm, 0.0),
            defoliation_effect,
        };

        let mut rates = TurnoverRates::evaluate(&drivers, params, self.config.is_legume())?;
        if self.config.is_annual() {
            rates.adjust_for_annual(self.phenology.stage, self.phenology.pheno_factor);
        }
        let green = self.leaf.dm_live() + self.stem.dm_live();
        let mature = self.leaf.tissues[2].dm + self.stem.tissues[2].dm;
        let minimum = self.leaf.minimum_live_dm + self.stem.minimum_live_dm;
        rates.limit_to_minimum_green(green, mature, minimum);
        let rates = rates.bounded();

        let fraction_carbon = params.fraction_carbon_remobilisable;
        let shoot = rates.shoot_cohort_rates(params.relative_rate_emerging);
        let stolon = rates.stolon_cohort_rates(params.relative_rate_emerging);
        self.leaf.do_tissue_turnover(&shoot, fraction_carbon);
        self.stem.do_tissue_turnover(&shoot, fraction_carbon);
        self.stolon.do_tissue_turnover(&stolon, fraction_carbon);
        for root in self.roots.iter_mut() {
            let rate = rates.root_rate_for(root.organ.dm_live(), root.organ.minimum_live_dm);
            // dead roots go to soil organic matter the day they die
            root.organ.do_tissue_turnover(&[rate, 1.0], fraction_carbon);
        }

        self.fluxes.turnover = rates;
        self.fluxes.dm_senesced = self.organs().map(Organ::dm_senescing).sum();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Water
    // ------------------------------------------------------------------

    fn take_up_water(
        &mut self,
        inputs: &DailyInputs,
        zones: &[&ZoneSoilState],
        weights: &[f64],
        arbitrator: &mut dyn SoilArbitrator,
    ) -> Result<SoilSupply> {
        let uptake_params = &self.config.uptake;
        let available: Vec<Vec<f64>> = self
            .roots
            .par_iter()
            .zip(zones.par_iter())
            .map(|(root, zone)| plant_available_water(zone, root, uptake_params))
            .collect();

        let demand = inputs.canopy.water_demand.max(0.0);
        let supply: f64 = available.iter().zip(weights).map(|(a, w)| w * a.iter().sum::<f64>()).sum();
        let fraction = divide(demand, supply, 0.0).min(1.0);
        let potential: Vec<Vec<f64>> = available
            .iter()
            .map(|layers| layers.iter().map(|a| a * fraction).collect())
            .collect();

        let water_uptake = match uptake_params.water_source {
            UptakeSource::Internal => potential,
            UptakeSource::ExternalArbitrator => {
                let requests: Vec<ZoneWaterRequest> = self
                    .roots
                    .iter()
                    .zip(potential)
                    .map(|(root, potential)| ZoneWaterRequest { zone: root.zone.clone(), potential })
                    .collect();
                let mut granted = arbitrator.water_uptake(&requests).into_iter();
                requests
                    .iter()
                    .map(|r| accept_water_grant(&r.zone, &r.potential, granted.next()))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        for (root, layers) in self.roots.iter().zip(&water_uptake) {
            trace!(zone = %root.zone, uptake = ?layers, "water uptake by layer");
        }

        self.fluxes.water_demand = demand;
        self.fluxes.water_supply = supply;
        self.fluxes.water_uptake = water_uptake
            .iter()
            .zip(weights)
            .map(|(layers, w)| w * layers.iter().sum::<f64>())
            .sum();

        let n_available = self
            .roots
            .par_iter()
            .zip(zones.par_iter())
            .zip(water_uptake.par_iter())
            .map(|((root, zone), water)| plant_available_nitrogen(zone, root, uptake_params, water))
            .collect();
        Ok(SoilSupply { water_uptake, n_available })
    }

    // ------------------------------------------------------------------
    // Nitrogen
    // ------------------------------------------------------------------

    /// Resolves today's N supply in priority order and returns the N
    /// available for new growth [kg N/ha] with the demand it was matched to.
    #[allow(clippy::too_many_arguments)]
    fn supply_nitrogen(
        &mut self,
        dm_after_water: f64,
        shares: &OrganSplit,
        co2: f64,
        zones: &[&ZoneSoilState],
        weights: &[f64],
        supply: &SoilSupply,
        arbitrator: &mut dyn SoilArbitrator,
    ) -> Result<(f64, NitrogenDemand)> {
        let co2_factor = n_optimum_variation_due_to_co2(co2, &self.config.co2);
        let demand = nitrogen_demand(dm_after_water, shares, self.concentrations(), co2_factor);
        let params = &self.config.nitrogen;
        let fertility = params.soil_fertility_factor;

        let soil_available: f64 = supply.n_available.iter().zip(weights).map(|(a, w)| w * a.total()).sum();

        // --- Fixation ---
        let fixed = if self.config.is_legume() {
            fixation(demand.optimum, fertility, soil_available, params)
        } else {
            0.0
        };

        // --- Senesced N ---
        let remobilisable: f64 = self.organs().map(Organ::n_senesced_remobilisable).sum();
        let soil = soil_nitrogen_demand(demand.luxury, fertility, fixed, remobilisable);
        if soil.fraction_senesced_remobilised > EPSILON {
            for organ in self.organs_mut() {
                organ.dead_mut().remobilise_n(soil.fraction_senesced_remobilised);
            }
        }
        let senesced: f64 = self.organs().map(Organ::n_senesced_remobilised).sum();

        // --- Soil uptake ---
        let wanted = soil.soil_demand.min(soil_available);
        let fraction = divide(wanted, soil_available, 0.0).min(1.0);
        let potential: Vec<AvailableNitrogen> = supply
            .n_available
            .iter()
            .map(|a| {
                let mut p = a.clone();
                p.scale(fraction);
                p
            })
            .collect();
        let granted = match self.config.uptake.nitrogen_source {
            UptakeSource::Internal => potential,
            UptakeSource::ExternalArbitrator => {
                let requests: Vec<ZoneNitrogenRequest> = zones
                    .iter()
                    .zip(potential)
                    .map(|(zone, potential)| ZoneNitrogenRequest { zone: zone.zone.clone(), potential })
                    .collect();
                let mut answer = arbitrator.nitrogen_uptake(&requests).into_iter();
                requests
                    .iter()
                    .map(|r| accept_nitrogen_grant(&r.zone, &r.potential, answer.next()))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        let uptake: f64 = granted.iter().zip(weights).map(|(g, w)| w * g.total()).sum();

        // --- Luxury N, mature cohorts first ---
        let missing = luxury_shortfall(demand.optimum, fertility, fixed + senesced + uptake);
        let mut luxury_available = [0.0; 3];
        for (t, available) in luxury_available.iter_mut().enumerate() {
            *available = self.shoot_organs().iter().map(|o| o.tissues[t].n_remobilisable).sum();
            if t == 0 {
                *available += self.roots.iter().map(|r| r.organ.tissues[0].n_remobilisable).sum::<f64>();
            }
        }
        let plan = plan_luxury_remobilisation(missing, luxury_available);
        for (t, &fraction) in plan.fractions.iter().enumerate() {
            if fraction <= 0.0 {
                continue;
            }
            for organ in [&mut self.leaf, &mut self.stem, &mut self.stolon] {
                organ.tissues[t].remobilise_n(fraction);
            }
            if t == 0 {
                for root in self.roots.iter_mut() {
                    root.organ.tissues[0].remobilise_n(fraction);
                }
            }
        }
        let luxury: f64 = self.organs().map(Organ::n_luxury_remobilised).sum();

        self.fluxes.n_demand_optimum = demand.optimum;
        self.fluxes.n_demand_luxury = demand.luxury;
        self.fluxes.n_fixed = fixed;
        self.fluxes.n_senesced_remobilised = senesced;
        self.fluxes.n_soil_demand = soil.soil_demand;
        self.fluxes.n_soil_available = soil_available;
        self.fluxes.n_uptake = uptake;
        self.fluxes.n_luxury_remobilised = luxury;
        debug!(
            species = %self.config.name,
            demand = demand.optimum,
            fixed,
            senesced,
            uptake,
            luxury,
            "nitrogen supply"
        );
        Ok((fixed + senesced + uptake + luxury, demand))
    }

    // ------------------------------------------------------------------
    // Allocation and commit
    // ------------------------------------------------------------------

    fn allocate_new_growth(&mut self, dm_actual: f64, new_n: f64, shares: &OrganSplit, t_mean: f64) -> Result<()> {
        let n_split = if dm_actual > EPSILON {
            split_new_nitrogen(dm_actual, new_n, shares, self.concentrations())?
        } else {
            OrganSplit::default()
        };
        let dm = shares.scaled(dm_actual);

        for (organ, dm, n) in [
            (&mut self.leaf, dm.leaf, n_split.leaf),
            (&mut self.stem, dm.stem, n_split.stem),
            (&mut self.stolon, dm.stolon, n_split.stolon),
        ] {
            organ.tissues[0].dm_in += dm;
            organ.tissues[0].n_in += n;
        }

        // --- Roots: split by live DM across zones, then deepen and spread ---
        let live: Vec<f64> = self.roots.iter().map(|r| r.organ.dm_live()).collect();
        let total_live: f64 = live.iter().sum();
        let even = 1.0 / self.roots.len().max(1) as f64;
        let temperature_factor = temperature_limiting_factor(t_mean, &self.config.temperature, self.config.pathway);
        let mut elongation: f64 = 0.0;
        for (root, live) in self.roots.iter_mut().zip(live) {
            let share = divide(live, total_live, even);
            let root_dm = dm.root * share;
            let detached = root.organ.dm_detached();
            elongation = elongation.max(root.evaluate_elongation(root_dm, detached, temperature_factor, &self.config.root));
            root.allocate_growth(root_dm, n_split.root * share);
        }

        self.fluxes.dm_shoot_growth = dm.shoot();
        self.fluxes.dm_root_growth = dm.root;
        self.fluxes.root_elongation = elongation;
        Ok(())
    }

    fn commit_day(&mut self, dm_actual: f64, new_n: f64, sink: &mut dyn ResidueSink) -> Result<()> {
        let dm_before = self.dm_total();
        let n_before = self.n_total();
        let dm_detached: f64 = self.organs().map(Organ::dm_detached).sum();
        let n_detached: f64 = self.organs().map(Organ::n_detached).sum();
        let n_remobilised: f64 = self.organs().map(Organ::n_remobilised).sum();
        let dm_carbon = self.dm_carbon_remobilised();

        let shoot = DetachedShoot {
            dm: self.shoot_organs().iter().map(|o| o.dm_detached()).sum(),
            n: self.shoot_organs().iter().map(|o| o.n_detached()).sum(),
            material: self.config.family,
        };
        // layer shares change on commit
        let roots_detached: Vec<(String, Vec<f64>, Vec<f64>)> = self
            .roots
            .iter()
            .map(|r| {
                let (dm, n) = r.detached_by_layer();
                (r.zone.clone(), dm, n)
            })
            .collect();

        for organ in self.organs_mut() {
            organ.commit()?;
        }

        let expected_dm = dm_before + dm_actual - dm_detached - dm_carbon;
        check_plant_balance("DM", expected_dm, self.dm_total())?;
        let expected_n = n_before + new_n - n_remobilised - n_detached;
        check_plant_balance("N", expected_n, self.n_total())?;

        if shoot.dm > EPSILON {
            sink.add_surface_residue(&shoot);
        }
        for (zone, dm, n) in &roots_detached {
            if dm.iter().sum::<f64>() > EPSILON {
                sink.add_soil_fom(zone, dm, n);
            }
        }

        self.fluxes.dm_shoot_detached = shoot.dm;
        self.fluxes.n_shoot_detached = shoot.n;
        self.fluxes.dm_root_detached = dm_detached - shoot.dm;
        self.fluxes.n_root_detached = n_detached - shoot.n;
        Ok(())
    }
}

/// Water granted for one zone, no more than requested and never negative.
/// A zone missing from the answer gets nothing.
fn accept_water_grant(zone: &str, requested: &[f64], granted: Option<Vec<f64>>) -> Result<Vec<f64>> {
    let granted = match granted {
        Some(granted) => granted,
        None => return Ok(vec![0.0; requested.len()]),
    };
    check_grant_layers(zone, requested.len(), granted.len())?;
    Ok(clamp_grant(zone, requested, &granted))
}

fn accept_nitrogen_grant(
    zone: &str,
    requested: &AvailableNitrogen,
    granted: Option<AvailableNitrogen>,
) -> Result<AvailableNitrogen> {
    let granted = match granted {
        Some(granted) => granted,
        None => return Ok(AvailableNitrogen::zeros(requested.nh4.len())),
    };
    check_grant_layers(zone, requested.nh4.len(), granted.nh4.len())?;
    check_grant_layers(zone, requested.no3.len(), granted.no3.len())?;
    Ok(AvailableNitrogen {
        nh4: clamp_grant(zone, &requested.nh4, &granted.nh4),
        no3: clamp_grant(zone, &requested.no3, &granted.no3),
    })
}

fn check_grant_layers(zone: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(PastureError::LayerMismatch { zone: zone.to_string(), expected, found })
    }
}

fn clamp_grant(zone: &str, requested: &[f64], granted: &[f64]) -> Vec<f64> {
    requested
        .iter()
        .zip(granted)
        .map(|(&r, &g)| {
            let accepted = g.max(0.0).min(r.max(0.0));
            if !nearly_equal(accepted, g, MASS_BALANCE_TOLERANCE) {
                warn!(zone, requested = r, granted = g, "arbitrator grant out of range, clamped");
            }
            accepted
        })
        .collect()
}

fn check_plant_balance(quantity: &'static str, expected: f64, actual: f64) -> Result<()> {
    if nearly_equal(expected, actual, MASS_BALANCE_TOLERANCE) {
        Ok(())
    } else {
        Err(PastureError::MassBalance { organ: "plant".to_string(), quantity, expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeciesConfig;
    use crate::interfaces::{CanopyExchange, DailyWeather, PassThroughArbitrator, ResidueLedger};
    use crate::soil::SoilProfile;
    use approx::assert_relative_eq;

    fn profile() -> SoilProfile {
        SoilProfile::silt_loam(10, 100.0)
    }

    fn inputs(zones: Vec<ZoneSoilState>) -> DailyInputs {
        DailyInputs {
            weather: DailyWeather::default(),
            canopy: CanopyExchange { intercepted_radiation: 10.0, water_demand: 3.0 },
            zones,
        }
    }

    fn species(config: SpeciesConfig) -> PastureSpecies {
        PastureSpecies::new(config, "home", &profile(), -41.0).unwrap()
    }

    fn arbitrated(mut config: SpeciesConfig) -> SpeciesConfig {
        config.uptake.water_source = UptakeSource::ExternalArbitrator;
        config.uptake.nitrogen_source = UptakeSource::ExternalArbitrator;
        config
    }

    /// Asks for more than was offered, and for negative N.
    struct Greedy;

    impl SoilArbitrator for Greedy {
        fn water_uptake(&mut self, requests: &[ZoneWaterRequest]) -> Vec<Vec<f64>> {
            requests.iter().map(|r| r.potential.iter().map(|w| 2.0 * w + 1.0).collect()).collect()
        }

        fn nitrogen_uptake(&mut self, requests: &[ZoneNitrogenRequest]) -> Vec<AvailableNitrogen> {
            requests
                .iter()
                .map(|r| AvailableNitrogen {
                    nh4: vec![-1.0; r.potential.nh4.len()],
                    no3: r.potential.no3.iter().map(|n| 3.0 * n).collect(),
                })
                .collect()
        }
    }

    /// Answers with one layer too few.
    struct Truncating;

    impl SoilArbitrator for Truncating {
        fn water_uptake(&mut self, requests: &[ZoneWaterRequest]) -> Vec<Vec<f64>> {
            requests.iter().map(|r| r.potential[1..].to_vec()).collect()
        }

        fn nitrogen_uptake(&mut self, requests: &[ZoneNitrogenRequest]) -> Vec<AvailableNitrogen> {
            requests.iter().map(|r| r.potential.clone()).collect()
        }
    }

    #[test]
    fn test_day_balances_and_reports() {
        let mut plant = species(SpeciesConfig::default());
        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 2.0, 5.0)]);
        let mut ledger = ResidueLedger::default();
        let state = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ledger).unwrap();
        let f = state.fluxes;
        assert!(f.gross_photosynthesis > 0.0);
        assert!(f.dm_actual > 0.0);
        assert!(f.dm_actual <= f.dm_potential + 1e-9);
        assert_relative_eq!(f.shares.total(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.surface_dm, f.dm_shoot_detached, epsilon = 1e-9);
        assert_relative_eq!(ledger.soil_dm_total(), f.dm_root_detached, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_zone_is_rejected() {
        let mut plant = species(SpeciesConfig::default());
        let day = inputs(vec![ZoneSoilState::at_field_capacity("elsewhere", profile(), 2.0, 5.0)]);
        let result = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ResidueLedger::default());
        assert!(matches!(result, Err(PastureError::UnknownZone(z)) if z == "home"));
    }

    #[test]
    fn test_layer_count_must_match() {
        let mut plant = species(SpeciesConfig::default());
        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", SoilProfile::silt_loam(6, 100.0), 2.0, 5.0)]);
        let result = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ResidueLedger::default());
        assert!(matches!(result, Err(PastureError::LayerMismatch { expected: 10, found: 6, .. })));
    }

    #[test]
    fn test_no_water_demand_no_uptake() {
        let mut plant = species(SpeciesConfig::default());
        let mut day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 2.0, 5.0)]);
        day.canopy.water_demand = 0.0;
        let state = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ResidueLedger::default()).unwrap();
        assert_eq!(state.fluxes.water_uptake, 0.0);
        // nothing asked, nothing short
        assert_eq!(state.limits.water_supply, 1.0);
    }

    #[test]
    fn test_dry_soil_limits_growth() {
        let mut plant = species(SpeciesConfig::default());
        let mut zone = ZoneSoilState::at_field_capacity("home", profile(), 2.0, 5.0);
        for l in 0..zone.n_layers() {
            zone.water[l] = zone.profile.ll_mm(l);
        }
        let state = plant
            .advance_one_day(&inputs(vec![zone]), &mut PassThroughArbitrator, &mut ResidueLedger::default())
            .unwrap();
        assert_eq!(state.limits.water_supply, 0.0);
        assert_eq!(state.fluxes.dm_actual, 0.0);
    }

    #[test]
    fn test_germination_then_emergence() {
        let mut config = SpeciesConfig::default();
        config.initial.shoot_dm = 0.0;
        config.germination.degree_days = 25.0;
        let mut plant = species(config);
        assert_eq!(plant.phenology.stage, PhenologyStage::Germinating);
        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 2.0, 5.0)]);
        let mut ledger = ResidueLedger::default();
        let mut days = 0;
        while plant.phenology.stage == PhenologyStage::Germinating {
            let state = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ledger).unwrap();
            assert_eq!(state.fluxes.dm_actual, 0.0);
            days += 1;
            assert!(days < 20);
        }
        assert_relative_eq!(plant.dm_above_ground(), plant.config.minimum_green.weight, epsilon = 1e-9);
    }

    #[test]
    fn test_arbitrator_grants_are_clamped_to_requests() {
        let mut plant = species(arbitrated(SpeciesConfig::default()));
        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 2.0, 5.0)]);
        let state = plant.advance_one_day(&day, &mut Greedy, &mut ResidueLedger::default()).unwrap();
        let f = state.fluxes;
        assert!(f.water_uptake <= f.water_demand + 1e-9);
        assert!(f.water_uptake <= f.water_supply + 1e-9);
        assert!(f.n_uptake >= 0.0);
        assert!(f.n_uptake <= f.n_soil_demand.min(f.n_soil_available) + 1e-9);
    }

    #[test]
    fn test_arbitrator_layer_count_is_checked() {
        let mut plant = species(arbitrated(SpeciesConfig::default()));
        let dm_before = plant.dm_total();
        let n_before = plant.n_total();
        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 2.0, 5.0)]);
        let result = plant.advance_one_day(&day, &mut Truncating, &mut ResidueLedger::default());
        assert!(matches!(
            result,
            Err(PastureError::LayerMismatch { ref zone, expected: 10, found: 9 }) if zone == "home"
        ));
        // the day is rolled back
        assert_eq!(plant.dm_total(), dm_before);
        assert_eq!(plant.n_total(), n_before);
    }

    #[test]
    fn test_luxury_remobilisation_respects_fertility() {
        let mut config = SpeciesConfig::default();
        config.nitrogen.soil_fertility_factor = 0.5;
        config.nitrogen.fraction_luxury_remobilisable = vec![0.5, 0.5, 0.5];
        let mut plant = species(config);
        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 0.0, 0.0)]);
        for _ in 0..5 {
            let state = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ResidueLedger::default()).unwrap();
            let f = state.fluxes;
            let target = f.n_demand_optimum * 0.5 - (f.n_fixed + f.n_senesced_remobilised + f.n_uptake);
            assert!(f.n_luxury_remobilised <= target.max(0.0) + 1e-9);
        }
    }

    #[test]
    fn test_no_growth_takes_no_nitrogen() {
        let mut config = SpeciesConfig::default();
        // tissue N fixed at one level leaves nothing to remobilise
        let flat = NConcentration::new(0.03, 0.03, 0.03);
        config.nitrogen.leaf = flat;
        config.nitrogen.stem = flat;
        config.nitrogen.stolon = flat;
        config.nitrogen.root = flat;
        // a trace of soil N dilutes growth to nothing
        config.nitrogen.dilution_coefficient = 60.0;
        let mut plant = species(config);
        let n_before = plant.n_total();

        let day = inputs(vec![ZoneSoilState::at_field_capacity("home", profile(), 0.001, 0.001)]);
        let state = plant.advance_one_day(&day, &mut PassThroughArbitrator, &mut ResidueLedger::default()).unwrap();
        let f = state.fluxes;
        assert!(f.dm_after_water > 0.0);
        assert!(state.limits.n_supply > 0.0);
        assert_eq!(f.dm_actual, 0.0);
        assert_eq!(f.n_new_growth, 0.0);
        assert_eq!(f.n_uptake, 0.0);
        assert_eq!(f.n_luxury_remobilised, 0.0);
        assert_eq!(plant.leaf.tissues[0].n_remobilised, 0.0);
        assert_relative_eq!(plant.n_total(), n_before - f.n_shoot_detached - f.n_root_detached, epsilon = 1e-9);
    }
}
