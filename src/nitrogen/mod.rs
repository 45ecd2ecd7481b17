// ============================================================================
// Nitrogen Balance — Where the N for today's growth comes from
//
// Sources are drawn in strict priority, each one only covering what the
// previous ones left short:
//
//   1. biological fixation (legumes)
//   2. N remobilised from tissue that senesced today
//   3. mineral N taken up from the soil
//   4. luxury N stored in live tissue, oldest cohort first
//
// Steps 1-3 aim at the luxury demand, step 4 only at the optimum demand.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::allocation::OrganSplit;
use crate::common::{divide, EPSILON};
use crate::config::{NConcentration, NitrogenParams};

/// N needed by today's growth [kg N/ha].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NitrogenDemand {
    /// At optimum N concentration
    pub optimum: f64,
    /// At maximum N concentration
    pub luxury: f64,
    /// At minimum N concentration, not adjusted for CO2
    pub minimum: f64,
}

/// Demand of `new_dm` split by `shares`, with the CO2 adjustment of the N
/// requirement applied to the optimum and luxury levels.
pub fn nitrogen_demand(new_dm: f64, shares: &OrganSplit, conc: [&NConcentration; 4], co2_factor: f64) -> NitrogenDemand {
    let dm = shares.scaled(new_dm);
    let optimum = dm.dot(conc[0].optimum, conc[1].optimum, conc[2].optimum, conc[3].optimum);
    let luxury = dm.dot(conc[0].maximum, conc[1].maximum, conc[2].maximum, conc[3].maximum);
    let minimum = dm.dot(conc[0].minimum, conc[1].minimum, conc[2].minimum, conc[3].minimum);
    NitrogenDemand { optimum: optimum * co2_factor, luxury: luxury * co2_factor, minimum }
}

/// N fixed today [kg N/ha].
///
/// Starts at the minimum fixation share of the demand and rises toward the
/// maximum as soil N becomes scarce relative to what is still missing.
pub fn fixation(demand_optimum: f64, soil_fertility: f64, soil_available_n: f64, params: &NitrogenParams) -> f64 {
    let adjusted = demand_optimum * soil_fertility;
    if adjusted <= EPSILON {
        return 0.0;
    }
    let mut fixed = params.minimum_fixation * adjusted;
    let n_stress = divide(soil_available_n, adjusted - fixed, 1.0).max(0.0);
    if n_stress < 0.99 {
        fixed += (params.maximum_fixation - params.minimum_fixation) * (1.0 - n_stress) * adjusted;
    }
    fixed
}

/// Outcome of matching the demand against fixation and senesced N.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilNitrogenDemand {
    /// N still wanted from the soil [kg N/ha]
    pub soil_demand: f64,
    /// Senesced N used [kg N/ha]
    pub senesced_remobilised: f64,
    /// Share of the remobilisable senesced N used [0-1]
    pub fraction_senesced_remobilised: f64,
}

pub fn soil_nitrogen_demand(
    demand_luxury: f64,
    soil_fertility: f64,
    fixed: f64,
    remobilisable_senesced: f64,
) -> SoilNitrogenDemand {
    let adjusted = demand_luxury * soil_fertility;
    if adjusted - fixed < EPSILON {
        SoilNitrogenDemand::default()
    } else if adjusted - (fixed + remobilisable_senesced) < EPSILON {
        let used = (adjusted - fixed).max(0.0);
        SoilNitrogenDemand {
            soil_demand: 0.0,
            senesced_remobilised: used,
            fraction_senesced_remobilised: divide(used, remobilisable_senesced, 0.0).min(1.0),
        }
    } else {
        SoilNitrogenDemand {
            soil_demand: adjusted - (fixed + remobilisable_senesced),
            senesced_remobilised: remobilisable_senesced,
            fraction_senesced_remobilised: 1.0,
        }
    }
}

/// N still short of the fertility-adjusted optimum once fixation, senesced
/// N and soil uptake are counted [kg N/ha]. Negative when there is surplus.
pub fn luxury_shortfall(demand_optimum: f64, soil_fertility: f64, supplied: f64) -> f64 {
    demand_optimum * soil_fertility - supplied
}

/// Luxury N to draw from each live cohort index (0 emerging .. 2 mature).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LuxuryRemobilisation {
    pub fractions: [f64; 3],
    /// [kg N/ha]
    pub total: f64,
}

/// Plans luxury remobilisation to cover `missing` N.
///
/// `available[t]` is the remobilisable luxury N at cohort index `t`, summed
/// over every organ that has such a cohort. Mature tissue is drawn first.
pub fn plan_luxury_remobilisation(missing: f64, available: [f64; 3]) -> LuxuryRemobilisation {
    let total_available: f64 = available.iter().sum();
    let mut plan = LuxuryRemobilisation::default();
    if missing <= EPSILON || total_available <= EPSILON {
        return plan;
    }
    if missing >= total_available {
        plan.fractions = [1.0; 3];
        plan.total = total_available;
        return plan;
    }

    let mut still_missing = missing;
    for t in (0..3).rev() {
        let used = available[t].min(still_missing);
        plan.fractions[t] = divide(used, available[t], 0.0);
        plan.total += used;
        still_missing -= used;
        if still_missing <= EPSILON {
            break;
        }
    }
    plan
}

/// Growth limiting factors from today's N supply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NitrogenLimitation {
    /// Ratio of N supplied to the optimum demand [0-1]
    pub glf_supply: f64,
    /// Supply factor after the dilution exponent [0-1]
    pub glf_nitrogen: f64,
}

pub fn nitrogen_limitation(growth_after_water: f64, new_n: f64, demand_optimum: f64, dilution: f64) -> NitrogenLimitation {
    if growth_after_water <= EPSILON {
        return NitrogenLimitation { glf_supply: 1.0, glf_nitrogen: 1.0 };
    }
    if new_n <= EPSILON {
        return NitrogenLimitation { glf_supply: 0.0, glf_nitrogen: 0.0 };
    }
    let supply = divide(new_n, demand_optimum, 1.0).clamp(0.0, 1.0);
    NitrogenLimitation { glf_supply: supply, glf_nitrogen: supply.powf(dilution) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn concentrations() -> [NConcentration; 4] {
        [
            NConcentration::new(0.04, 0.012, 0.05),
            NConcentration::new(0.02, 0.006, 0.025),
            NConcentration::new(0.02, 0.006, 0.025),
            NConcentration::new(0.02, 0.006, 0.025),
        ]
    }

    #[test]
    fn test_demand_levels() {
        let c = concentrations();
        let shares = OrganSplit::from_fractions(0.8, 0.7, 0.0);
        let demand = nitrogen_demand(100.0, &shares, [&c[0], &c[1], &c[2], &c[3]], 1.0);
        // 56 leaf × 0.04 + 24 stem × 0.02 + 20 root × 0.02
        assert_relative_eq!(demand.optimum, 3.12, epsilon = 1e-12);
        assert_relative_eq!(demand.luxury, 2.8 + 0.6 + 0.5, epsilon = 1e-12);
        let high_co2 = nitrogen_demand(100.0, &shares, [&c[0], &c[1], &c[2], &c[3]], 0.8);
        assert_relative_eq!(high_co2.optimum, 3.12 * 0.8, epsilon = 1e-12);
        // minimum is the plain concentration floor
        assert_relative_eq!(high_co2.minimum, 56.0 * 0.012 + 44.0 * 0.006, epsilon = 1e-12);
    }

    #[test]
    fn test_fixation_rises_under_n_stress() {
        let params = NitrogenParams { minimum_fixation: 0.5, maximum_fixation: 0.9, ..NitrogenParams::default() };
        // plenty of soil N: minimum fixation only
        assert_relative_eq!(fixation(4.0, 1.0, 50.0, &params), 2.0, epsilon = 1e-12);
        // no soil N: maximum fixation
        assert_relative_eq!(fixation(4.0, 1.0, 0.0, &params), 3.6, epsilon = 1e-12);
        // half of what is missing in the soil
        assert_relative_eq!(fixation(4.0, 1.0, 1.0, &params), 2.0 + 0.4 * 0.5 * 4.0, epsilon = 1e-12);
        assert_eq!(fixation(0.0, 1.0, 0.0, &params), 0.0);
    }

    #[test]
    fn test_grass_fixes_nothing() {
        let params = NitrogenParams::default();
        assert_eq!(fixation(4.0, 1.0, 0.0, &params), 0.0);
    }

    #[test]
    fn test_soil_demand_branches() {
        // fixation covers everything
        let d = soil_nitrogen_demand(3.0, 1.0, 3.5, 1.0);
        assert_eq!(d, SoilNitrogenDemand::default());

        // fixation plus part of the senesced N
        let d = soil_nitrogen_demand(3.0, 1.0, 2.0, 4.0);
        assert_relative_eq!(d.senesced_remobilised, 1.0);
        assert_relative_eq!(d.fraction_senesced_remobilised, 0.25);
        assert_eq!(d.soil_demand, 0.0);

        // soil has to make up the rest
        let d = soil_nitrogen_demand(3.0, 1.0, 0.5, 1.0);
        assert_relative_eq!(d.soil_demand, 1.5);
        assert_eq!(d.fraction_senesced_remobilised, 1.0);
    }

    #[test]
    fn test_luxury_drawn_from_mature_first() {
        let plan = plan_luxury_remobilisation(1.5, [1.0, 1.0, 1.0]);
        assert_eq!(plan.fractions[2], 1.0);
        assert_relative_eq!(plan.fractions[1], 0.5);
        assert_eq!(plan.fractions[0], 0.0);
        assert_relative_eq!(plan.total, 1.5);

        let all = plan_luxury_remobilisation(5.0, [1.0, 0.5, 0.25]);
        assert_eq!(all.fractions, [1.0; 3]);
        assert_relative_eq!(all.total, 1.75);

        assert_eq!(plan_luxury_remobilisation(0.0, [1.0, 1.0, 1.0]).total, 0.0);
    }

    #[test]
    fn test_luxury_tops_up_only_to_fertile_optimum() {
        // optimum 10 at half fertility is 5; 4 already supplied
        let missing = luxury_shortfall(10.0, 0.5, 4.0);
        assert_relative_eq!(missing, 1.0, epsilon = 1e-12);
        let plan = plan_luxury_remobilisation(missing, [0.0, 0.0, 3.0]);
        assert_relative_eq!(plan.total, 1.0, epsilon = 1e-12);
        assert_relative_eq!(plan.fractions[2], 1.0 / 3.0, epsilon = 1e-12);

        // full fertility would have drawn all of it
        let plan = plan_luxury_remobilisation(luxury_shortfall(10.0, 1.0, 4.0), [0.0, 0.0, 3.0]);
        assert_relative_eq!(plan.total, 3.0, epsilon = 1e-12);

        // supply above the reduced optimum draws nothing
        assert!(luxury_shortfall(10.0, 0.3, 4.0) < 0.0);
        assert_eq!(plan_luxury_remobilisation(luxury_shortfall(10.0, 0.3, 4.0), [1.0, 1.0, 1.0]).total, 0.0);
    }

    #[test]
    fn test_nitrogen_limitation_dilution() {
        let lim = nitrogen_limitation(50.0, 1.0, 4.0, 0.5);
        assert_relative_eq!(lim.glf_supply, 0.25);
        assert_relative_eq!(lim.glf_nitrogen, 0.5);
        assert_eq!(nitrogen_limitation(50.0, 0.0, 4.0, 0.5).glf_nitrogen, 0.0);
        assert_eq!(nitrogen_limitation(0.0, 0.0, 0.0, 0.5).glf_supply, 1.0);
        assert_eq!(nitrogen_limitation(50.0, 6.0, 4.0, 0.5).glf_nitrogen, 1.0);
    }
}
