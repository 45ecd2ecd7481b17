// ============================================================================
// Pasture Species — One plant population and its daily life
//
// The species owns its organs outright:
//
//   PastureSpecies
//     ├── leaf, stem, stolon      Organ (4 cohorts each)
//     ├── roots[]                 RootOrgan, one per soil zone
//     ├── phenology               PhenologyClock
//     ├── heat, cold, logging     stress memory
//     ├── defoliation             DefoliationMemory
//     └── limits, fluxes, canopy  persisted factors, today's fluxes, derived canopy
//
// Collaborators (weather, soil, residues) are handed in per call; nothing is
// looked up at run time. The whole struct serialises, so a checkpoint is
// simply the serialised species.
// ============================================================================

pub mod canopy;
mod daily;
mod harvest;
pub mod state;

pub use canopy::{CanopyPools, CanopyState};
pub use harvest::BiomassRemoved;
pub use state::{DailyFluxes, GrowthLimits, SpeciesState};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allocation::ReproductiveSeason;
use crate::common::{divide, EPSILON, SHOOT_TISSUES};
use crate::config::{NConcentration, SpeciesConfig};
use crate::error::{PastureError, Result};
use crate::interfaces::{DetachedShoot, ResidueSink};
use crate::organs::{Organ, OrganKind, RootOrgan};
use crate::phenology::PhenologyClock;
use crate::response::{ColdStress, HeatStress, WaterLogging};
use crate::soil::SoilProfile;
use crate::turnover::DefoliationMemory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PastureSpecies {
    pub config: SpeciesConfig,
    pub leaf: Organ,
    pub stem: Organ,
    pub stolon: Organ,
    /// Root systems; the first one lives in the home zone
    pub roots: Vec<RootOrgan>,
    pub phenology: PhenologyClock,
    pub heat_stress: HeatStress,
    pub cold_stress: ColdStress,
    pub water_logging: WaterLogging,
    pub defoliation: DefoliationMemory,
    pub season: ReproductiveSeason,
    pub limits: GrowthLimits,
    pub fluxes: DailyFluxes,
    pub canopy: CanopyState,
    pub is_alive: bool,
}

impl PastureSpecies {
    /// Builds the species in its configured initial state, rooted in `zone`.
    pub fn new(config: SpeciesConfig, zone: &str, profile: &SoilProfile, latitude: f64) -> Result<Self> {
        config.validate()?;
        let minimum = &config.minimum_green;
        let n = &config.nitrogen;

        let leaf = shoot_organ(&config, OrganKind::Leaf, n.leaf, minimum.weight * minimum.leaf_proportion);
        let stem = shoot_organ(&config, OrganKind::Stem, n.stem, minimum.weight * (1.0 - minimum.leaf_proportion));
        let mut stolon = shoot_organ(&config, OrganKind::Stolon, n.stolon, 0.0);
        stolon.fraction_standing = config.removal.stolon_fraction_standing;

        let root = RootOrgan::new(
            zone,
            profile,
            &config.root,
            n.root,
            minimum.weight * minimum.root_proportion,
            &config.digestibility,
            &n.fraction_luxury_remobilisable,
            0.0,
            config.initial.root_depth,
        )?;

        let mut species = Self {
            season: ReproductiveSeason::new(latitude, &config.reproductive_season),
            phenology: PhenologyClock::from_initial_shoot(config.initial.shoot_dm),
            leaf,
            stem,
            stolon,
            roots: vec![root],
            heat_stress: HeatStress::default(),
            cold_stress: ColdStress::default(),
            water_logging: WaterLogging::default(),
            defoliation: DefoliationMemory::default(),
            limits: GrowthLimits::default(),
            fluxes: DailyFluxes::default(),
            canopy: CanopyState::default(),
            is_alive: false,
            config,
        };
        species.set_initial_state();
        Ok(species)
    }

    /// Extends the root system into another soil zone.
    pub fn add_root_zone(&mut self, zone: &str, profile: &SoilProfile, depth: f64, dm: f64) -> Result<()> {
        if self.roots.iter().any(|r| r.zone == zone) {
            return Err(PastureError::InvalidParameter {
                name: "zone",
                reason: format!("species already has roots in zone `{zone}`"),
            });
        }
        let home = &self.roots[0].organ;
        let root = RootOrgan::new(
            zone,
            profile,
            &self.config.root,
            home.n_conc,
            home.minimum_live_dm,
            &self.config.digestibility,
            &self.config.nitrogen.fraction_luxury_remobilisable,
            dm.max(0.0),
            depth,
        )?;
        info!(species = %self.config.name, zone, dm, depth, "root zone added");
        self.roots.push(root);
        Ok(())
    }

    // --- Aggregates [kg/ha] ---

    pub fn shoot_organs(&self) -> [&Organ; 3] {
        [&self.leaf, &self.stem, &self.stolon]
    }

    pub fn dm_above_ground(&self) -> f64 {
        self.shoot_organs().iter().map(|o| o.dm_total()).sum()
    }

    pub fn dm_above_ground_live(&self) -> f64 {
        self.shoot_organs().iter().map(|o| o.dm_live()).sum()
    }

    pub fn dm_below_ground(&self) -> f64 {
        self.roots.iter().map(|r| r.organ.dm_total()).sum()
    }

    pub fn dm_root_live(&self) -> f64 {
        self.roots.iter().map(|r| r.organ.dm_live()).sum()
    }

    pub fn dm_total(&self) -> f64 {
        self.dm_above_ground() + self.dm_below_ground()
    }

    pub fn n_above_ground(&self) -> f64 {
        self.shoot_organs().iter().map(|o| o.n_total()).sum()
    }

    pub fn n_below_ground(&self) -> f64 {
        self.roots.iter().map(|r| r.organ.n_total()).sum()
    }

    pub fn n_total(&self) -> f64 {
        self.n_above_ground() + self.n_below_ground()
    }

    pub fn dm_standing(&self) -> f64 {
        self.shoot_organs().iter().map(|o| o.dm_standing()).sum()
    }

    pub fn dm_harvestable(&self) -> f64 {
        self.shoot_organs().iter().map(|o| o.dm_harvestable()).sum()
    }

    pub fn root_depth(&self) -> f64 {
        self.roots.iter().map(|r| r.depth).fold(0.0, f64::max)
    }

    // --- Digestibility [0-1] ---

    pub fn digestibility_live(&self) -> f64 {
        let params = &self.config.digestibility;
        let digestible: f64 = self.shoot_organs().iter().map(|o| o.digestibility_live(params) * o.dm_live()).sum();
        divide(digestible, self.dm_above_ground_live(), 0.0)
    }

    pub fn digestibility_dead(&self) -> f64 {
        let params = &self.config.digestibility;
        let dead: f64 = self.shoot_organs().iter().map(|o| o.dm_dead()).sum();
        let digestible: f64 = self.shoot_organs().iter().map(|o| o.digestibility_dead(params) * o.dm_dead()).sum();
        divide(digestible, dead, 0.0)
    }

    /// Digestibility of the standing herbage.
    pub fn digestibility_herbage(&self) -> f64 {
        let params = &self.config.digestibility;
        let digestible: f64 = self
            .shoot_organs()
            .iter()
            .map(|o| o.digestibility_total(params) * o.dm_standing())
            .sum();
        divide(digestible, self.dm_standing(), 0.0)
    }

    pub fn herbage_n_conc(&self) -> f64 {
        let n: f64 = self.shoot_organs().iter().map(|o| o.n_total() * o.fraction_standing).sum();
        divide(n, self.dm_standing(), 0.0)
    }

    // --- Lifecycle ---

    /// Sets every pool from the configured initial DM and partition.
    pub fn set_initial_state(&mut self) {
        let shoot_dm = self.config.initial.shoot_dm;
        self.phenology = PhenologyClock::from_initial_shoot(shoot_dm);
        self.is_alive = self.phenology.stage.code() >= 0;

        let fractions = self.config.initial_dm_fractions();
        let dm = shoot_dm.max(0.0);
        self.fill_shoot(&fractions, dm);

        let (root_dm, depth) = if shoot_dm > 0.0 {
            (self.config.initial.root_dm.max(0.0), self.config.initial.root_depth)
        } else {
            (0.0, self.config.root.depth_minimum)
        };
        for root in self.roots.iter_mut() {
            root.set_live(root_dm, depth);
        }
        self.update_canopy();
    }

    /// Pools right after germination: a small seedling at the minimum green DM.
    pub fn set_emergence_state(&mut self) {
        let fractions = self.config.germination.emergence_fractions.clone();
        let dm = self.config.minimum_green.weight;
        self.fill_shoot(&fractions, dm);
        let depth = self.config.root.depth_minimum;
        for root in self.roots.iter_mut() {
            let minimum = root.organ.minimum_live_dm;
            root.set_live(minimum, depth);
        }
        self.phenology.emerge();
        self.update_canopy();
    }

    /// Spreads `dm` over the shoot cohorts by an 11-value partition
    /// (leaf ×4, stem ×4, stolon ×3); live N at optimum, dead at minimum.
    fn fill_shoot(&mut self, fractions: &[f64], dm: f64) {
        for (organ, offset, cohorts) in [
            (&mut self.leaf, 0, SHOOT_TISSUES),
            (&mut self.stem, SHOOT_TISSUES, SHOOT_TISSUES),
            (&mut self.stolon, 2 * SHOOT_TISSUES, SHOOT_TISSUES - 1),
        ] {
            organ.reset();
            let conc = organ.n_conc;
            let last = organ.tissues.len() - 1;
            for t in 0..cohorts {
                let tissue_dm = dm * fractions.get(offset + t).copied().unwrap_or(0.0);
                let n_conc = if t == last { conc.minimum } else { conc.optimum };
                organ.tissues[t].set_amounts(tissue_dm, tissue_dm * n_conc, None);
            }
        }
    }

    pub fn sow(&mut self) {
        if self.is_alive {
            warn!(species = %self.config.name, "already growing, sowing skipped");
            return;
        }
        self.is_alive = true;
        self.phenology.sow();
        info!(species = %self.config.name, "sown");
    }

    /// Ends the crop: shoots go to the surface residue, roots to soil organic matter.
    pub fn end_crop(&mut self, sink: &mut dyn ResidueSink) {
        let dm = self.dm_above_ground();
        let n = self.n_above_ground();
        if dm > EPSILON {
            sink.add_surface_residue(&DetachedShoot { dm, n, material: self.config.family });
        }
        for root in &self.roots {
            let (dm, n) = root.total_by_layer();
            if dm.iter().sum::<f64>() > EPSILON {
                sink.add_soil_fom(&root.zone, &dm, &n);
            }
        }

        self.leaf.reset();
        self.stem.reset();
        self.stolon.reset();
        for root in self.roots.iter_mut() {
            root.organ.reset();
        }
        self.canopy = CanopyState::default();
        self.is_alive = false;
        self.phenology.end();
        info!(species = %self.config.name, shoot_dm = dm, "crop ended");
    }

    /// Kills `fraction` of all live tissue; a fraction of one ends the crop.
    pub fn kill(&mut self, fraction: f64, sink: &mut dyn ResidueSink) {
        if !self.is_alive {
            warn!(species = %self.config.name, "nothing alive to kill");
            return;
        }
        if fraction >= 1.0 {
            self.end_crop(sink);
            return;
        }
        self.leaf.kill(fraction);
        self.stem.kill(fraction);
        self.stolon.kill(fraction);
        for root in self.roots.iter_mut() {
            root.organ.kill(fraction);
        }
        self.update_canopy();
        info!(species = %self.config.name, fraction, "plants killed");
    }

    /// Back to the configured initial state, with all stress memory cleared.
    pub fn reset(&mut self) {
        self.heat_stress = HeatStress::default();
        self.cold_stress = ColdStress::default();
        self.water_logging = WaterLogging::default();
        self.defoliation = DefoliationMemory::default();
        self.limits = GrowthLimits::default();
        self.fluxes = DailyFluxes::default();
        self.set_initial_state();
    }

    // --- Derived state ---

    pub(crate) fn update_canopy(&mut self) {
        let pools = CanopyPools {
            leaf_live: self.leaf.dm_live(),
            leaf_dead: self.leaf.dm_dead(),
            stem_live: self.stem.dm_live(),
            stolon_live: self.stolon.dm_live(),
            above_ground_live: self.dm_above_ground_live(),
            harvestable: self.dm_harvestable(),
        };
        self.canopy = CanopyState::evaluate(
            &pools,
            self.is_alive,
            self.config.is_legume(),
            &self.config.canopy,
            self.config.photosynthesis.light_extinction_coefficient,
        );
    }

    /// Snapshot of the present state.
    pub fn state(&self) -> SpeciesState {
        let dm_root_dead: f64 = self.roots.iter().map(|r| r.organ.dm_dead()).sum();
        SpeciesState {
            name: self.config.name.clone(),
            is_alive: self.is_alive,
            stage: self.phenology.stage,
            days_since_emergence: self.phenology.days_since_emergence,
            dm_leaf_live: self.leaf.dm_live(),
            dm_leaf_dead: self.leaf.dm_dead(),
            dm_stem_live: self.stem.dm_live(),
            dm_stem_dead: self.stem.dm_dead(),
            dm_stolon_live: self.stolon.dm_live(),
            dm_stolon_dead: self.stolon.dm_dead(),
            dm_root_live: self.dm_root_live(),
            dm_root_dead,
            dm_above_ground: self.dm_above_ground(),
            dm_below_ground: self.dm_below_ground(),
            dm_total: self.dm_total(),
            dm_standing: self.dm_standing(),
            dm_harvestable: self.dm_harvestable(),
            n_above_ground: self.n_above_ground(),
            n_below_ground: self.n_below_ground(),
            n_total: self.n_total(),
            herbage_n_conc: self.herbage_n_conc(),
            lai_green: self.canopy.lai_green,
            lai_dead: self.canopy.lai_dead,
            height: self.canopy.height,
            cover_green: self.canopy.cover_green,
            cover_total: self.canopy.cover_total,
            root_depth: self.root_depth(),
            digestibility_live: self.digestibility_live(),
            digestibility_dead: self.digestibility_dead(),
            digestibility_herbage: self.digestibility_herbage(),
            heat_factor: self.heat_stress.factor,
            cold_factor: self.cold_stress.factor,
            water_logging_cumulative: self.water_logging.cumulative,
            defoliation_cumulative: self.defoliation.cumulative,
            limits: self.limits,
            fluxes: self.fluxes,
        }
    }

    /// Root length density per layer in `zone` [mm/mm³].
    pub fn root_length_density(&self, zone: &str) -> Result<Vec<f64>> {
        self.roots
            .iter()
            .find(|r| r.zone == zone)
            .map(RootOrgan::root_length_density)
            .ok_or_else(|| PastureError::UnknownZone(zone.to_string()))
    }
}

fn shoot_organ(config: &SpeciesConfig, kind: OrganKind, n_conc: NConcentration, minimum_live_dm: f64) -> Organ {
    Organ::new(
        kind,
        SHOOT_TISSUES,
        n_conc,
        minimum_live_dm,
        &config.digestibility,
        &config.nitrogen.fraction_luxury_remobilisable,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::ResidueLedger;
    use crate::phenology::PhenologyStage;
    use approx::assert_relative_eq;

    fn ryegrass() -> PastureSpecies {
        PastureSpecies::new(SpeciesConfig::default(), "home", &SoilProfile::silt_loam(10, 100.0), -41.0)
            .expect("valid species")
    }

    #[test]
    fn test_initial_state_follows_partition() {
        let species = ryegrass();
        assert!(species.is_alive);
        assert_eq!(species.phenology.stage, PhenologyStage::Vegetative);
        assert_relative_eq!(species.dm_above_ground(), 2000.0, epsilon = 1e-9);
        assert_relative_eq!(species.leaf.dm_live(), 2000.0 * 0.65, epsilon = 1e-9);
        assert_relative_eq!(species.dm_below_ground(), 500.0, epsilon = 1e-9);
        assert_eq!(species.stolon.dm_total(), 0.0);
        // live leaves at optimum N, dead at minimum
        assert_relative_eq!(species.leaf.tissues[0].n, 300.0 * 0.04, epsilon = 1e-9);
        assert_relative_eq!(species.leaf.dead().n, 100.0 * 0.012, epsilon = 1e-9);
        assert!(species.canopy.lai_green > 0.0);
    }

    #[test]
    fn test_negative_initial_shoot_is_not_sown() {
        let mut config = SpeciesConfig::default();
        config.initial.shoot_dm = -1.0;
        let mut species = PastureSpecies::new(config, "home", &SoilProfile::silt_loam(10, 100.0), -41.0).unwrap();
        assert!(!species.is_alive);
        assert_eq!(species.dm_total(), 0.0);
        species.sow();
        assert!(species.is_alive);
        assert_eq!(species.phenology.stage, PhenologyStage::Germinating);
    }

    #[test]
    fn test_emergence_state() {
        let mut species = ryegrass();
        species.set_emergence_state();
        // 100 kg: 60 emerging leaf, 25 developing leaf, 15 emerging stem
        assert_relative_eq!(species.dm_above_ground(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(species.leaf.tissues[1].dm, 25.0, epsilon = 1e-9);
        assert_relative_eq!(species.dm_root_live(), 50.0, epsilon = 1e-9);
        assert_eq!(species.roots[0].depth, species.config.root.depth_minimum);
        assert_eq!(species.phenology.stage, PhenologyStage::Vegetative);
    }

    #[test]
    fn test_end_crop_returns_everything() {
        let mut species = ryegrass();
        let shoot = species.dm_above_ground();
        let roots = species.dm_below_ground();
        let mut ledger = ResidueLedger::default();
        species.end_crop(&mut ledger);
        assert_relative_eq!(ledger.surface_dm, shoot, epsilon = 1e-9);
        assert_relative_eq!(ledger.soil_dm_total(), roots, epsilon = 1e-9);
        assert!(!species.is_alive);
        assert_eq!(species.dm_total(), 0.0);
        assert_eq!(species.canopy.lai_green, 0.0);
        assert_eq!(species.phenology.stage, PhenologyStage::NotSown);
    }

    #[test]
    fn test_partial_kill_moves_live_to_dead() {
        let mut species = ryegrass();
        let total = species.dm_total();
        let live = species.dm_above_ground_live();
        let mut ledger = ResidueLedger::default();
        species.kill(0.4, &mut ledger);
        assert_relative_eq!(species.dm_total(), total, epsilon = 1e-9);
        assert_relative_eq!(species.dm_above_ground_live(), live * 0.6, epsilon = 1e-9);
        assert_eq!(ledger.surface_dm, 0.0);
        assert!(species.is_alive);
    }

    #[test]
    fn test_sowing_live_plant_is_skipped() {
        let mut species = ryegrass();
        let before = species.dm_total();
        species.sow();
        assert_eq!(species.phenology.stage, PhenologyStage::Vegetative);
        assert_eq!(species.dm_total(), before);
    }

    #[test]
    fn test_second_root_zone() {
        let mut species = ryegrass();
        species.add_root_zone("gully", &SoilProfile::silt_loam(6, 100.0), 300.0, 200.0).unwrap();
        assert_relative_eq!(species.dm_root_live(), 700.0, epsilon = 1e-9);
        assert!(species.add_root_zone("gully", &SoilProfile::silt_loam(6, 100.0), 300.0, 200.0).is_err());
        assert_eq!(species.root_length_density("gully").unwrap().len(), 6);
        assert!(matches!(species.root_length_density("ridge"), Err(PastureError::UnknownZone(_))));
    }
}
