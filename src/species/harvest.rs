//! Grazing, cutting and explicit biomass removal.
//!
//! All removals act at once, outside the daily transfers, and feed the
//! defoliation memory that drives extra stolon and root turnover.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::PastureSpecies;
use crate::common::{divide, nearly_equal, EPSILON, MASS_BALANCE_TOLERANCE};
use crate::config::OrganRemovalFractions;
use crate::error::{PastureError, Result};
use crate::interfaces::{DetachedShoot, ResidueSink};
use crate::organs::{OrganKind, RemovedMass};
use crate::removal::{removal_shares, HarvestablePools, RemovalMode};

/// What a removal took away [kg/ha, kg N/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomassRemoved {
    pub dm_removed: f64,
    pub n_removed: f64,
    pub dm_to_residue: f64,
    pub n_to_residue: f64,
    /// Digestibility of the removed material [0-1]
    pub digestibility: f64,
}

impl BiomassRemoved {
    fn from_mass(mass: RemovedMass, digestibility: f64) -> Self {
        Self {
            dm_removed: mass.dm_removed,
            n_removed: mass.n_removed,
            dm_to_residue: mass.dm_to_residue,
            n_to_residue: mass.n_to_residue,
            digestibility,
        }
    }
}

impl PastureSpecies {
    fn harvestable_pools(&self) -> HarvestablePools {
        HarvestablePools([
            self.leaf.dm_live_harvestable(),
            self.stem.dm_live_harvestable(),
            self.stolon.dm_live_harvestable(),
            self.leaf.dm_dead_harvestable(),
            self.stem.dm_dead_harvestable(),
            self.stolon.dm_dead_harvestable(),
        ])
    }

    /// Grazes the sward, taking green before dead and leaf before stem as the
    /// preference weights dictate.
    pub fn graze(&mut self, mode: RemovalMode, amount: f64) -> Result<BiomassRemoved> {
        if !self.is_alive {
            warn!(species = %self.config.name, "cannot graze, plant is not alive");
            return Ok(BiomassRemoved::default());
        }
        let pools = self.harvestable_pools();
        let standing = self.dm_standing();
        let required = mode.amount_required(amount, standing);
        let to_remove = required.min(pools.total());
        if to_remove <= EPSILON {
            if required > EPSILON {
                warn!(species = %self.config.name, required, "nothing harvestable, grazing skipped");
            }
            return Ok(BiomassRemoved::default());
        }

        let shares = removal_shares(to_remove, &pools, &self.config.removal);
        let digestibility_params = &self.config.digestibility;
        // organs are only replaced once the removal balances
        let mut grazed = [self.leaf.clone(), self.stem.clone(), self.stolon.clone()];
        let mut removed = RemovedMass::default();
        let mut digestible = 0.0;
        for (i, organ) in grazed.iter_mut().enumerate() {
            let live = to_remove * shares[i];
            let dead = to_remove * shares[i + 3];
            digestible += live * organ.digestibility_live(digestibility_params)
                + dead * organ.digestibility_dead(digestibility_params);
            let fractions = OrganRemovalFractions {
                live_to_remove: divide(live, organ.dm_live(), 0.0),
                dead_to_remove: divide(dead, organ.dm_dead(), 0.0),
                live_to_residue: 0.0,
                dead_to_residue: 0.0,
            };
            removed.accumulate(organ.remove_biomass(&fractions));
        }

        let expected = to_remove * shares.iter().sum::<f64>();
        if !nearly_equal(expected, removed.dm_removed, MASS_BALANCE_TOLERANCE) {
            return Err(PastureError::MassBalance {
                organ: "grazed herbage".to_string(),
                quantity: "DM",
                expected,
                actual: removed.dm_removed,
            });
        }
        let [leaf, stem, stolon] = grazed;
        self.leaf = leaf;
        self.stem = stem;
        self.stolon = stolon;

        self.defoliation.record(divide(removed.dm_removed, standing, 0.0));
        self.update_canopy();
        info!(
            species = %self.config.name,
            removed = removed.dm_removed,
            residual = self.dm_standing(),
            "grazed"
        );
        Ok(BiomassRemoved::from_mass(removed, divide(digestible, removed.dm_removed, 0.0)))
    }

    /// Cuts the sward down to `residue_dm` of standing herbage.
    pub fn harvest(&mut self, residue_dm: f64) -> Result<BiomassRemoved> {
        self.graze(RemovalMode::SetResidueAmount, residue_dm)
    }

    /// Removes set fractions of one shoot organ's live and dead pools; the
    /// share returned to residue goes to the surface.
    pub fn remove_biomass(
        &mut self,
        kind: OrganKind,
        fractions: &OrganRemovalFractions,
        sink: &mut dyn ResidueSink,
    ) -> Result<BiomassRemoved> {
        check_fractions(fractions)?;
        let standing = self.dm_standing();
        let digestibility_params = self.config.digestibility.clone();
        let organ = match kind {
            OrganKind::Leaf => &mut self.leaf,
            OrganKind::Stem => &mut self.stem,
            OrganKind::Stolon => &mut self.stolon,
            OrganKind::Root => {
                return Err(PastureError::InvalidParameter {
                    name: "organ",
                    reason: "roots cannot be removed as biomass".to_string(),
                })
            }
        };
        let digestible = organ.dm_live() * fractions.live_to_remove * organ.digestibility_live(&digestibility_params)
            + organ.dm_dead() * fractions.dead_to_remove * organ.digestibility_dead(&digestibility_params);
        let removed = organ.remove_biomass(fractions);

        if removed.dm_to_residue > EPSILON {
            sink.add_surface_residue(&DetachedShoot {
                dm: removed.dm_to_residue,
                n: removed.n_to_residue,
                material: self.config.family,
            });
        }
        self.defoliation
            .record(divide(removed.dm_removed + removed.dm_to_residue, standing, 0.0));
        self.update_canopy();
        info!(
            species = %self.config.name,
            organ = kind.as_str(),
            removed = removed.dm_removed,
            to_residue = removed.dm_to_residue,
            "biomass removed"
        );
        Ok(BiomassRemoved::from_mass(removed, divide(digestible, removed.dm_removed, 0.0)))
    }

    /// Applies the configured removal fractions to every shoot organ.
    pub fn remove_with_defaults(&mut self, sink: &mut dyn ResidueSink) -> Result<BiomassRemoved> {
        let params = self.config.removal.clone();
        let mut total = BiomassRemoved::default();
        let mut digestible = 0.0;
        for (kind, fractions) in [
            (OrganKind::Leaf, &params.leaf),
            (OrganKind::Stem, &params.stem),
            (OrganKind::Stolon, &params.stolon),
        ] {
            let removed = self.remove_biomass(kind, fractions, sink)?;
            digestible += removed.digestibility * removed.dm_removed;
            total.dm_removed += removed.dm_removed;
            total.n_removed += removed.n_removed;
            total.dm_to_residue += removed.dm_to_residue;
            total.n_to_residue += removed.n_to_residue;
        }
        total.digestibility = divide(digestible, total.dm_removed, 0.0);
        Ok(total)
    }
}

fn check_fractions(fractions: &OrganRemovalFractions) -> Result<()> {
    let live = fractions.live_to_remove + fractions.live_to_residue;
    let dead = fractions.dead_to_remove + fractions.dead_to_residue;
    let all = [
        fractions.live_to_remove,
        fractions.live_to_residue,
        fractions.dead_to_remove,
        fractions.dead_to_residue,
    ];
    if all.iter().any(|f| !(0.0..=1.0).contains(f)) || live > 1.0 + EPSILON || dead > 1.0 + EPSILON {
        return Err(PastureError::InvalidParameter {
            name: "removal fractions",
            reason: format!("live {live} and dead {dead} must each be within [0, 1]"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeciesConfig;
    use crate::interfaces::ResidueLedger;
    use crate::soil::SoilProfile;
    use approx::assert_relative_eq;

    fn sward(shoot_dm: f64) -> PastureSpecies {
        let mut config = SpeciesConfig::default();
        config.initial.shoot_dm = shoot_dm;
        PastureSpecies::new(config, "home", &SoilProfile::silt_loam(10, 100.0), -41.0).unwrap()
    }

    #[test]
    fn test_graze_to_residue() {
        let mut plant = sward(3000.0);
        assert_relative_eq!(plant.dm_standing(), 3000.0, epsilon = 1e-9);
        let removed = plant.graze(RemovalMode::SetResidueAmount, 1500.0).unwrap();
        assert_relative_eq!(removed.dm_removed, 1500.0, epsilon = 1e-6);
        assert_relative_eq!(plant.dm_standing(), 1500.0, epsilon = 1e-6);
        assert!(removed.digestibility > 0.0 && removed.digestibility <= 1.0);
        assert!(removed.n_removed > 0.0);
        assert_relative_eq!(plant.defoliation.pending_fraction, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_graze_amount_keeps_minimum_green() {
        let mut plant = sward(3000.0);
        let removed = plant.graze(RemovalMode::SetRemoveAmount, 10_000.0).unwrap();
        assert!(removed.dm_removed < 3000.0);
        assert!(plant.leaf.dm_live() >= plant.leaf.minimum_live_dm - 1e-6);
        assert!(plant.stem.dm_live() >= plant.stem.minimum_live_dm - 1e-6);
    }

    #[test]
    fn test_graze_dead_plant_is_skipped() {
        let mut plant = sward(3000.0);
        plant.end_crop(&mut ResidueLedger::default());
        let removed = plant.graze(RemovalMode::SetRemoveAmount, 100.0).unwrap();
        assert_eq!(removed, BiomassRemoved::default());
    }

    #[test]
    fn test_unbalanced_graze_leaves_sward_untouched() {
        let mut plant = sward(3000.0);
        // more dead leaf offered than the organ holds
        plant.leaf.fraction_standing = 2.0;
        let leaf = plant.leaf.clone();
        let stem = plant.stem.clone();
        let pending = plant.defoliation.pending_fraction;

        let result = plant.graze(RemovalMode::SetResidueAmount, 0.0);
        assert!(matches!(result, Err(PastureError::MassBalance { quantity: "DM", .. })));
        assert_eq!(plant.leaf, leaf);
        assert_eq!(plant.stem, stem);
        assert_eq!(plant.defoliation.pending_fraction, pending);
    }

    #[test]
    fn test_remove_biomass_to_residue() {
        let mut plant = sward(2000.0);
        let leaf_live = plant.leaf.dm_live();
        let leaf_dead = plant.leaf.dm_dead();
        let mut ledger = ResidueLedger::default();
        let fractions = OrganRemovalFractions {
            live_to_remove: 0.5,
            dead_to_remove: 0.0,
            live_to_residue: 0.1,
            dead_to_residue: 1.0,
        };
        let removed = plant.remove_biomass(OrganKind::Leaf, &fractions, &mut ledger).unwrap();
        assert_relative_eq!(removed.dm_removed, 0.5 * leaf_live, epsilon = 1e-9);
        assert_relative_eq!(ledger.surface_dm, 0.1 * leaf_live + leaf_dead, epsilon = 1e-9);
        assert_relative_eq!(plant.leaf.dm_live(), 0.4 * leaf_live, epsilon = 1e-9);
        assert_eq!(plant.leaf.dm_dead(), 0.0);
    }

    #[test]
    fn test_remove_with_defaults_takes_half_the_shoot() {
        let mut plant = sward(2000.0);
        let mut ledger = ResidueLedger::default();
        let shoot_live = plant.leaf.dm_live() + plant.stem.dm_live();
        let removed = plant.remove_with_defaults(&mut ledger).unwrap();
        // leaf and stem lose half their live DM, nothing goes back to residue
        assert_relative_eq!(removed.dm_removed, 0.5 * shoot_live + 0.5 * 200.0, epsilon = 1e-6);
        assert_eq!(ledger.surface_dm, 0.0);
        assert!(removed.digestibility > 0.0);
    }

    #[test]
    fn test_remove_biomass_rejects_bad_input() {
        let mut plant = sward(2000.0);
        let mut ledger = ResidueLedger::default();
        let too_much = OrganRemovalFractions { live_to_remove: 0.8, live_to_residue: 0.4, ..Default::default() };
        assert!(plant.remove_biomass(OrganKind::Stem, &too_much, &mut ledger).is_err());
        let fine = OrganRemovalFractions::removing(0.5, 0.5);
        assert!(matches!(
            plant.remove_biomass(OrganKind::Root, &fine, &mut ledger),
            Err(PastureError::InvalidParameter { .. })
        ));
    }
}
