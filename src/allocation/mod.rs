// ============================================================================
// Allocation — Partitioning of new growth between organs
//
// Two self-correcting ratios drive the split:
//
//   shoot:root   target (stress- and season-adjusted)² / current
//   leaf:stem    target (declining with shoot mass)²    / current
//
// A sward that is short of roots after a dry spell, or of leaves after a
// grazing, therefore puts more of today's growth where it is lacking.
// ============================================================================

pub mod reproductive;

pub use reproductive::ReproductiveSeason;

use serde::{Deserialize, Serialize};

use crate::common::{divide, EPSILON};
use crate::config::{AllocationParams, NConcentration};
use crate::error::{PastureError, Result};

/// A quantity split between the four organs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganSplit {
    pub leaf: f64,
    pub stem: f64,
    pub stolon: f64,
    pub root: f64,
}

impl OrganSplit {
    pub fn total(&self) -> f64 {
        self.leaf + self.stem + self.stolon + self.root
    }

    pub fn shoot(&self) -> f64 {
        self.leaf + self.stem + self.stolon
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            leaf: self.leaf * factor,
            stem: self.stem * factor,
            stolon: self.stolon * factor,
            root: self.root * factor,
        }
    }

    /// Weighted sum with one value per organ (e.g. N concentrations).
    pub fn dot(&self, leaf: f64, stem: f64, stolon: f64, root: f64) -> f64 {
        self.leaf * leaf + self.stem * stem + self.stolon * stolon + self.root * root
    }

    /// Organ shares of new growth from the shoot fraction and the leaf
    /// fraction of the shoot. Shares sum to one.
    pub fn from_fractions(to_shoot: f64, to_leaf: f64, to_stolon: f64) -> Self {
        Self {
            leaf: to_shoot * to_leaf,
            stem: to_shoot * (1.0 - to_stolon - to_leaf).max(0.0),
            stolon: to_shoot * to_stolon,
            root: 1.0 - to_shoot,
        }
    }
}

/// Fraction of new growth allocated to the shoot [0-1].
///
/// `glf_soil` is the most limiting of yesterday's water supply, water
/// logging and N supply factors; `season_factor` the reproductive season
/// multiplier of perennials.
pub fn fraction_to_shoot(
    shoot_live: f64,
    root_live: f64,
    glf_soil: f64,
    season_factor: f64,
    params: &AllocationParams,
) -> f64 {
    let mut to_shoot = if root_live > EPSILON {
        let sensitivity = params.shoot_root_glf_factor;
        let glf_factor = if sensitivity > EPSILON {
            1.0 - sensitivity * (1.0 - glf_soil.max(0.0).powf(1.0 / sensitivity))
        } else {
            1.0
        };
        let current = divide(shoot_live, root_live, f64::MAX);
        let target = params.target_shoot_root_ratio * season_factor;
        let growth_sr = divide(target * glf_factor * target, current, f64::MAX);
        if growth_sr.is_finite() && growth_sr < f64::MAX {
            growth_sr / (1.0 + growth_sr)
        } else {
            1.0
        }
    } else {
        1.0
    };

    if 1.0 - to_shoot > params.max_root_allocation {
        to_shoot = 1.0 - params.max_root_allocation;
    }
    to_shoot.clamp(0.0, 1.0)
}

/// Fraction of new shoot growth allocated to leaves [0-1].
pub fn fraction_to_leaf(shoot_live: f64, leaf_live: f64, stem_and_stolon_live: f64, params: &AllocationParams) -> f64 {
    let max = params.fraction_leaf_maximum;
    let min = params.fraction_leaf_minimum;

    let mut target = max;
    if min < max && shoot_live > params.fraction_leaf_dm_threshold {
        let relative = (shoot_live - params.fraction_leaf_dm_threshold)
            / (params.fraction_leaf_dm_factor - params.fraction_leaf_dm_threshold);
        target = min + (max - min) / (1.0 + relative.powf(params.fraction_leaf_exponent));
    }

    let to_leaf = if leaf_live > 0.0 && target < 1.0 {
        let current = divide(leaf_live, stem_and_stolon_live, f64::MAX);
        let target_ls = target / (1.0 - target);
        let new_ls = divide(target_ls * target_ls, current, f64::MAX);
        if new_ls < f64::MAX {
            new_ls / (1.0 + new_ls)
        } else {
            1.0
        }
    } else {
        max
    };
    // stems cannot receive a negative share
    to_leaf.clamp(0.0, 1.0 - params.fraction_to_stolon)
}

/// Splits today's new N between the organs.
///
/// Each organ first gets its new DM at the optimum concentration. N beyond
/// that is shared by each organ's room between optimum and maximum. When
/// there is not enough for the optimum, each organ is first brought to its
/// minimum concentration and the rest is shared by the room up to optimum.
pub fn split_new_nitrogen(new_dm: f64, new_n: f64, shares: &OrganSplit, conc: [&NConcentration; 4]) -> Result<OrganSplit> {
    let dm = shares.scaled(new_dm);
    let optimum = OrganSplit {
        leaf: dm.leaf * conc[0].optimum,
        stem: dm.stem * conc[1].optimum,
        stolon: dm.stolon * conc[2].optimum,
        root: dm.root * conc[3].optimum,
    };

    if new_n > optimum.total() + EPSILON {
        let room = OrganSplit {
            leaf: shares.leaf * (conc[0].maximum - conc[0].optimum),
            stem: shares.stem * (conc[1].maximum - conc[1].optimum),
            stolon: shares.stolon * (conc[2].maximum - conc[2].optimum),
            root: shares.root * (conc[3].maximum - conc[3].optimum),
        };
        let sum = room.total();
        if sum <= EPSILON {
            return Err(PastureError::AllocationFailed);
        }
        let extra = room.scaled((new_n - optimum.total()) / sum);
        Ok(OrganSplit {
            leaf: optimum.leaf + extra.leaf,
            stem: optimum.stem + extra.stem,
            stolon: optimum.stolon + extra.stolon,
            root: optimum.root + extra.root,
        })
    } else {
        if optimum.total() <= EPSILON {
            return Err(PastureError::AllocationFailed);
        }
        let minimum = OrganSplit {
            leaf: dm.leaf * conc[0].minimum,
            stem: dm.stem * conc[1].minimum,
            stolon: dm.stolon * conc[2].minimum,
            root: dm.root * conc[3].minimum,
        };
        let room = OrganSplit {
            leaf: optimum.leaf - minimum.leaf,
            stem: optimum.stem - minimum.stem,
            stolon: optimum.stolon - minimum.stolon,
            root: optimum.root - minimum.root,
        };
        let above_minimum = new_n - minimum.total();
        if above_minimum <= 0.0 || room.total() <= EPSILON {
            let weights = if minimum.total() > EPSILON { minimum } else { optimum };
            return Ok(weights.scaled(new_n / weights.total()));
        }
        let extra = room.scaled(above_minimum / room.total());
        Ok(OrganSplit {
            leaf: minimum.leaf + extra.leaf,
            stem: minimum.stem + extra.stem,
            stolon: minimum.stolon + extra.stolon,
            root: minimum.root + extra.root,
        })
    }
}
