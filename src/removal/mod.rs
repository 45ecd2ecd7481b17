// ============================================================================
// Biomass Removal — How a grazing or cut is shared among the pools
//
// Six harvestable pools take part: live and dead leaf, stem and stolon.
// Animals prefer green over dead and leaf over stem; the preference weights
// give a first split, which is then capped at what each pool holds and
// renormalised until the shares add up to one again.
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::common::{divide, EPSILON};
use crate::config::RemovalParams;

const MAX_ITERATIONS: usize = 1000;

/// How the amount passed to a graze is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Remove everything above this standing herbage [kg/ha]
    SetResidueAmount,
    /// Remove this amount [kg/ha]
    SetRemoveAmount,
}

impl RemovalMode {
    /// DM wanted by the command, before checking what is harvestable.
    pub fn amount_required(&self, amount: f64, standing: f64) -> f64 {
        match self {
            RemovalMode::SetResidueAmount => (standing - amount).max(0.0),
            RemovalMode::SetRemoveAmount => amount.max(0.0),
        }
    }
}

/// Harvestable DM per pool [kg/ha]: live leaf, stem and stolon first,
/// then the dead ones in the same organ order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HarvestablePools(pub [f64; 6]);

impl HarvestablePools {
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

/// Share of the removed amount taken from each pool; the shares sum to one.
pub fn removal_shares(amount: f64, pools: &HarvestablePools, params: &RemovalParams) -> [f64; 6] {
    let available = pools.total();
    let mut shares = [0.0; 6];
    if amount <= EPSILON || available <= EPSILON {
        return shares;
    }

    if amount - available > -EPSILON {
        for (share, pool) in shares.iter_mut().zip(pools.0.iter()) {
            *share = divide(*pool, available, 0.0);
        }
        return shares;
    }

    let green = params.preference_green_over_dead;
    let leafy = params.preference_leaf_over_stem;
    let p = &pools.0;
    shares = [p[0] * green * leafy, p[1] * green, p[2] * green, p[3] * leafy, p[4], p[5]];
    let removable: Vec<f64> = p.iter().map(|h| h / amount).collect();

    let mut total: f64 = shares.iter().sum();
    let mut iterations = 0;
    loop {
        for (share, cap) in shares.iter_mut().zip(&removable) {
            *share = cap.min(divide(*share, total, 0.0));
        }
        total = shares.iter().sum();
        iterations += 1;
        if 1.0 - total <= EPSILON {
            break;
        }
        if iterations >= MAX_ITERATIONS || total <= EPSILON {
            warn!(
                iterations,
                shortfall = 1.0 - total,
                "could not remove all the DM required, removing what was reachable"
            );
            break;
        }
    }
    shares
}
