// ============================================================================
// Species Configuration — Parameter set for one pasture species
//
// Every table carries a full default (a generic perennial ryegrass), so a
// TOML file only needs to name the values it changes:
//
//   name = "white clover"
//   family = "legume"
//
//   [nitrogen]
//   minimum_fixation = 0.5
//   maximum_fixation = 0.9
//
// Closed enumerations replace the string switches of older pasture models;
// an unknown variant is a parse error, never a runtime surprise.
// ============================================================================

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::SHOOT_TISSUES;
use crate::error::{PastureError, Result};

/// Number of entries in an initial DM partition (leaf ×4, stem ×4, stolon ×3).
pub const DM_FRACTION_ENTRIES: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlantFamily {
    Grass,
    Legume,
    Forb,
}

impl PlantFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantFamily::Grass => "grass",
            PlantFamily::Legume => "legume",
            PlantFamily::Forb => "forb",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotosynthesisPathway {
    C3,
    C4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Perennial,
    Annual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootDistributionMethod {
    Homogeneous,
    ExpoLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterAvailabilityMethod {
    DefaultKl,
    AlternativeKl,
    AlternativeKs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NitrogenAvailabilityMethod {
    BasicAgPasture,
    DefaultApsim,
    AlternativeRld,
    AlternativeWup,
}

/// Who decides the actual soil uptake of water and N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UptakeSource {
    /// The species takes supply × min(1, demand/supply) on its own.
    Internal,
    /// Potential uptakes go to a `SoilArbitrator`, which returns the actual amounts.
    ExternalArbitrator,
}

// ----------------------------------------------------------------------------
// Parameter tables
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotosynthesisParams {
    /// Leaf photosynthetic rate at reference conditions [mg CO2/m² leaf/s]
    pub reference_rate: f64,
    /// Leaf photosynthetic efficiency α [mg CO2/J]
    pub efficiency: f64,
    /// Curvature θ of the non-rectangular hyperbola [0-1]
    pub curvature: f64,
    /// Fraction of solar radiation that is photosynthetically active [0-1]
    pub fraction_par: f64,
    /// Canopy light extinction coefficient k [-]
    pub light_extinction_coefficient: f64,
    /// Generic growth limiting factor applied to gross photosynthesis [0-1]
    pub generic_growth_factor: f64,
}

impl Default for PhotosynthesisParams {
    fn default() -> Self {
        Self {
            reference_rate:               1.0,
            efficiency:                   0.01,
            curvature:                    0.8,
            fraction_par:                 0.5,
            light_extinction_coefficient: 0.5,
            generic_growth_factor:        1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RespirationParams {
    /// Maintenance respiration per unit live C [kg C/kg C/day]
    pub maintenance_coefficient: f64,
    /// Growth respiration as fraction of gross photosynthesis [0-1]
    pub growth_coefficient: f64,
    /// Reference temperature for the respiration curve [°C]
    pub reference_temperature: f64,
    /// Exponent of the respiration temperature curve [-]
    pub exponent: f64,
}

impl Default for RespirationParams {
    fn default() -> Self {
        Self {
            maintenance_coefficient: 0.03,
            growth_coefficient:      0.25,
            reference_temperature:   20.0,
            exponent:                1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthTemperatureParams {
    /// Minimum temperature for growth [°C]
    pub minimum: f64,
    /// Optimum temperature for growth [°C]
    pub optimum: f64,
    /// Curvature exponent q [-]
    pub exponent: f64,
}

impl Default for GrowthTemperatureParams {
    fn default() -> Self {
        Self { minimum: 1.0, optimum: 20.0, exponent: 1.7 }
    }
}

impl GrowthTemperatureParams {
    /// Upper temperature at which growth stops [°C]
    pub fn maximum(&self) -> f64 {
        self.optimum + (self.optimum - self.minimum) / self.exponent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatStressParams {
    pub enabled: bool,
    /// Max temperature above which stress starts [°C]
    pub onset_temperature: f64,
    /// Max temperature above which growth stops [°C]
    pub full_temperature: f64,
    /// Degree-days needed for full recovery [°C·day]
    pub recovery_degree_days: f64,
    /// Reference temperature for recovery accumulation [°C]
    pub recovery_reference: f64,
}

impl Default for HeatStressParams {
    fn default() -> Self {
        Self {
            enabled:              true,
            onset_temperature:    28.0,
            full_temperature:     35.0,
            recovery_degree_days: 30.0,
            recovery_reference:   25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColdStressParams {
    pub enabled: bool,
    /// Min temperature below which stress starts [°C]
    pub onset_temperature: f64,
    /// Min temperature below which growth stops [°C]
    pub full_temperature: f64,
    /// Degree-days needed for full recovery [°C·day]
    pub recovery_degree_days: f64,
    /// Reference temperature for recovery accumulation [°C]
    pub recovery_reference: f64,
}

impl Default for ColdStressParams {
    fn default() -> Self {
        Self {
            enabled:              true,
            onset_temperature:    1.0,
            full_temperature:     -5.0,
            recovery_degree_days: 25.0,
            recovery_reference:   0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Co2Params {
    /// Reference atmospheric CO2 [ppm]
    pub reference: f64,
    /// Scale of the photosynthesis response hyperbola [ppm]
    pub scale_factor: f64,
    /// CO2 at which the N requirement is halfway to its minimum [ppm]
    pub offset_factor: f64,
    /// Minimum relative N requirement at very high CO2 [0-1]
    pub minimum: f64,
    /// Exponent of the N requirement response [-]
    pub exponent: f64,
}

impl Default for Co2Params {
    fn default() -> Self {
        Self {
            reference:     380.0,
            scale_factor:  700.0,
            offset_factor: 600.0,
            minimum:       0.7,
            exponent:      2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GerminationParams {
    /// Thermal time from sowing to emergence [°C·day]
    pub degree_days: f64,
    /// DM partition set at emergence, multiplied by `MinimumGreenWt` (11 values)
    pub emergence_fractions: Vec<f64>,
}

impl Default for GerminationParams {
    fn default() -> Self {
        Self {
            degree_days: 125.0,
            emergence_fractions: vec![0.60, 0.25, 0.00, 0.00, 0.15, 0.00, 0.00, 0.00, 0.00, 0.00, 0.00],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnualParams {
    /// Day of year when the germination window opens
    pub doy_germination: u32,
    pub days_emergence_to_anthesis: u32,
    pub days_anthesis_to_maturity: u32,
    /// Thermal time from emergence to anthesis [°C·day]
    pub degree_days_to_anthesis: f64,
    /// Thermal time from anthesis to maturity [°C·day]
    pub degree_days_anthesis_to_maturity: f64,
    /// Days after emergence over which early growth is reduced
    pub days_early_growth_reduction: u32,
}

impl Default for AnnualParams {
    fn default() -> Self {
        Self {
            doy_germination:                  275,
            days_emergence_to_anthesis:       120,
            days_anthesis_to_maturity:        85,
            degree_days_to_anthesis:          1100.0,
            degree_days_anthesis_to_maturity: 900.0,
            days_early_growth_reduction:      45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationParams {
    /// Target shoot:root ratio under no stress [-]
    pub target_shoot_root_ratio: f64,
    /// Maximum fraction of new growth allocated to roots [0-1]
    pub max_root_allocation: f64,
    /// Sensitivity of the shoot:root target to soil stress [0-1]
    pub shoot_root_glf_factor: f64,
    /// Fraction of new shoot growth that goes to leaves at low DM [0-1]
    pub fraction_leaf_maximum: f64,
    /// Fraction of new shoot growth that goes to leaves at high DM [0-1]
    pub fraction_leaf_minimum: f64,
    /// Shoot DM above which leaf allocation starts to decline [kg/ha]
    pub fraction_leaf_dm_threshold: f64,
    /// Shoot DM at which leaf allocation is halfway to its minimum [kg/ha]
    pub fraction_leaf_dm_factor: f64,
    pub fraction_leaf_exponent: f64,
    /// Fraction of new shoot growth allocated to stolons [0-1]
    pub fraction_to_stolon: f64,
}

impl Default for AllocationParams {
    fn default() -> Self {
        Self {
            target_shoot_root_ratio:    4.0,
            max_root_allocation:        0.25,
            shoot_root_glf_factor:      0.5,
            fraction_leaf_maximum:      0.7,
            fraction_leaf_minimum:      0.7,
            fraction_leaf_dm_threshold: 500.0,
            fraction_leaf_dm_factor:    2000.0,
            fraction_leaf_exponent:     3.0,
            fraction_to_stolon:         0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproductiveSeasonParams {
    pub enabled: bool,
    /// Latitude at which the logistic timing/allocation curves are centred [degrees]
    pub reference_latitude: f64,
    pub timing_coefficient: f64,
    pub duration_coefficient: f64,
    /// Length of the shoulders relative to the plateau [-]
    pub shoulders_length_factor: f64,
    /// Fraction of the shoulders taken by the onset [0-1]
    pub onset_duration_factor: f64,
    /// Maximum relative increase in shoot allocation [-]
    pub max_allocation_increase: f64,
    pub allocation_coefficient: f64,
}

impl Default for ReproductiveSeasonParams {
    fn default() -> Self {
        Self {
            enabled:                 false,
            reference_latitude:      41.0,
            timing_coefficient:      0.14,
            duration_coefficient:    2.0,
            shoulders_length_factor: 1.0,
            onset_duration_factor:   0.6,
            max_allocation_increase: 0.5,
            allocation_coefficient:  0.1,
        }
    }
}

/// N concentration thresholds of one organ [kg N/kg DM].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NConcentration {
    pub optimum: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl NConcentration {
    pub const fn new(optimum: f64, minimum: f64, maximum: f64) -> Self {
        Self { optimum, minimum, maximum }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NitrogenParams {
    /// Fraction of N demand met by fixation when soil N is plentiful (legumes) [0-1]
    pub minimum_fixation: f64,
    /// Fraction of N demand met by fixation under full N stress (legumes) [0-1]
    pub maximum_fixation: f64,
    /// Fraction of luxury N remobilisable per day, per live tissue (3 values)
    pub fraction_luxury_remobilisable: Vec<f64>,
    /// Exponent applied to the N supply factor to mimic N dilution [-]
    pub dilution_coefficient: f64,
    /// Generic soil fertility limiting factor [0-1]
    pub soil_fertility_factor: f64,
    pub leaf: NConcentration,
    pub stem: NConcentration,
    pub stolon: NConcentration,
    pub root: NConcentration,
}

impl Default for NitrogenParams {
    fn default() -> Self {
        Self {
            leaf:                          NConcentration::new(0.04, 0.012, 0.05),
            stem:                          NConcentration::new(0.02, 0.006, 0.025),
            stolon:                        NConcentration::new(0.02, 0.006, 0.025),
            root:                          NConcentration::new(0.02, 0.006, 0.025),
            minimum_fixation:              0.0,
            maximum_fixation:              0.0,
            fraction_luxury_remobilisable: vec![0.0, 0.0, 0.0],
            dilution_coefficient:          0.5,
            soil_fertility_factor:         1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnoverParams {
    /// Reference turnover rate of leaf and stem tissues [1/day]
    pub rate_shoot: f64,
    /// Reference turnover rate of live roots [1/day]
    pub rate_root: f64,
    /// Turnover of emerging tissue relative to older tissues [-]
    pub relative_rate_emerging: f64,
    /// Reference detachment rate of dead shoot material [1/day]
    pub detachment_rate_shoot: f64,
    pub live_leaves_per_tiller: f64,
    /// Temperature below which turnover stops [°C]
    pub temperature_minimum: f64,
    /// Temperature above which turnover is at its reference rate [°C]
    pub temperature_reference: f64,
    pub temperature_exponent: f64,
    pub drought_effect_max: f64,
    /// Soil water factor below which turnover increases [0-1]
    pub drought_threshold: f64,
    pub detachment_drought_coefficient: f64,
    pub detachment_drought_effect_min: f64,
    pub defoliation_coefficient: f64,
    /// Residual defoliation effect below which the pulse ends [-]
    pub defoliation_effect_min: f64,
    /// Share of the defoliation pulse applied to roots [0-1]
    pub defoliation_root_effect: f64,
    /// Fraction of senescing DM whose carbon is remobilised to new growth [0-1]
    pub fraction_carbon_remobilisable: f64,
}

impl Default for TurnoverParams {
    fn default() -> Self {
        Self {
            rate_shoot:                     0.05,
            rate_root:                      0.02,
            relative_rate_emerging:         2.0,
            detachment_rate_shoot:          0.08,
            live_leaves_per_tiller:         3.0,
            temperature_minimum:            2.0,
            temperature_reference:          20.0,
            temperature_exponent:           1.0,
            drought_effect_max:             1.0,
            drought_threshold:              0.5,
            detachment_drought_coefficient: 3.0,
            detachment_drought_effect_min:  0.1,
            defoliation_coefficient:        0.5,
            defoliation_effect_min:         0.025,
            defoliation_root_effect:        0.1,
            fraction_carbon_remobilisable:  0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RootParams {
    pub distribution: RootDistributionMethod,
    /// Minimum rooting depth, also the depth at emergence [mm]
    pub depth_minimum: f64,
    /// Maximum rooting depth [mm]
    pub depth_maximum: f64,
    /// Daily root elongation at optimum temperature [mm/day]
    pub elongation_rate: f64,
    /// Depth down to which the root proportion is constant [mm]
    pub depth_constant_proportion: f64,
    /// Exponent of the expo-linear decline below the constant layer [-]
    pub distribution_exponent: f64,
    /// Depth, relative to the maximum, where the distribution reaches zero [-]
    pub bottom_distribution_factor: f64,
    /// Specific root length [m/g]
    pub specific_root_length: f64,
}

impl Default for RootParams {
    fn default() -> Self {
        Self {
            distribution:               RootDistributionMethod::ExpoLinear,
            depth_minimum:              50.0,
            depth_maximum:              750.0,
            elongation_rate:            10.0,
            depth_constant_proportion:  90.0,
            distribution_exponent:      3.2,
            bottom_distribution_factor: 1.05,
            specific_root_length:       100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UptakeParams {
    pub water_source: UptakeSource,
    pub nitrogen_source: UptakeSource,
    pub water_method: WaterAvailabilityMethod,
    pub nitrogen_method: NitrogenAvailabilityMethod,
    /// NH4 availability coefficient, default method [-]
    pub k_nh4: f64,
    /// NO3 availability coefficient, default method [-]
    pub k_no3: f64,
    /// Maximum daily N uptake [kg/ha/day]
    pub maximum_n_uptake: f64,
    pub ku_nh4: f64,
    pub ku_no3: f64,
    /// Saturated conductivity at which water uptake is 90% unconstrained [mm/day]
    pub reference_ks: f64,
    /// Root length density at which uptake is unconstrained [mm/mm³]
    pub reference_rld: f64,
    /// Exponent of the soil moisture availability curve [-]
    pub exponent_soil_moisture: f64,
}

impl Default for UptakeParams {
    fn default() -> Self {
        Self {
            water_source:           UptakeSource::ExternalArbitrator,
            nitrogen_source:        UptakeSource::ExternalArbitrator,
            water_method:           WaterAvailabilityMethod::DefaultKl,
            nitrogen_method:        NitrogenAvailabilityMethod::BasicAgPasture,
            k_nh4:                  1.0,
            k_no3:                  1.0,
            maximum_n_uptake:       10.0,
            ku_nh4:                 0.5,
            ku_no3:                 0.95,
            reference_ks:           15.0,
            reference_rld:          5.0,
            exponent_soil_moisture: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterStressParams {
    /// Maximum daily increase of the water-logging effect [0-1]
    pub saturation_effect_max: f64,
    /// Minimum water-free porosity; a negative value uses DUL as threshold [0-1]
    pub minimum_water_free_porosity: f64,
    /// Daily recovery rate of the water-logging effect [0-1]
    pub saturation_recovery_factor: f64,
}

impl Default for WaterStressParams {
    fn default() -> Self {
        Self {
            saturation_effect_max:       0.1,
            minimum_water_free_porosity: -1.0,
            saturation_recovery_factor:  0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyParams {
    /// Specific leaf area [m²/kg DM]
    pub specific_leaf_area: f64,
    /// Stolon contribution to green LAI relative to leaves [0-1]
    pub stolon_effect_on_lai: f64,
    /// Shoot DM above which stems no longer add to LAI [kg/ha]
    pub shoot_max_effect_on_lai: f64,
    /// Maximum stem contribution to green LAI relative to leaves [0-1]
    pub max_stem_effect_on_lai: f64,
    /// Plant height floor [mm]
    pub height_minimum: f64,
    /// Plant height at `height_mass_for_max` [mm]
    pub height_maximum: f64,
    /// Harvestable DM at which maximum height is reached [kg/ha]
    pub height_mass_for_max: f64,
    pub height_exponent: f64,
}

impl Default for CanopyParams {
    fn default() -> Self {
        Self {
            specific_leaf_area:      25.0,
            stolon_effect_on_lai:    0.0,
            shoot_max_effect_on_lai: 1000.0,
            max_stem_effect_on_lai:  1.0,
            height_minimum:          25.0,
            height_maximum:          600.0,
            height_mass_for_max:     10000.0,
            height_exponent:         2.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestibilityParams {
    /// Digestibility of cell wall per tissue: emerging, developing, mature, dead
    pub cell_wall: Vec<f64>,
    /// Digestibility of protein [0-1]
    pub protein: f64,
    /// Fraction of new growth that is soluble sugar [0-1]
    pub sugar_fraction_new_growth: f64,
    /// C:N ratio of cell wall [-]
    pub cn_ratio_cell_wall: f64,
    /// C:N ratio of protein [-]
    pub cn_ratio_protein: f64,
}

impl Default for DigestibilityParams {
    fn default() -> Self {
        Self {
            cell_wall:                 vec![0.6, 0.6, 0.6, 0.2],
            protein:                   1.0,
            sugar_fraction_new_growth: 0.0,
            cn_ratio_cell_wall:        100.0,
            cn_ratio_protein:          3.5,
        }
    }
}

/// Live and dead removal fractions for one organ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganRemovalFractions {
    pub live_to_remove: f64,
    pub dead_to_remove: f64,
    #[serde(default)]
    pub live_to_residue: f64,
    #[serde(default)]
    pub dead_to_residue: f64,
}

impl OrganRemovalFractions {
    pub const fn removing(live: f64, dead: f64) -> Self {
        Self { live_to_remove: live, dead_to_remove: dead, live_to_residue: 0.0, dead_to_residue: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalParams {
    pub preference_green_over_dead: f64,
    pub preference_leaf_over_stem: f64,
    /// Fraction of stolon DM standing and reachable by animals [0-1]
    pub stolon_fraction_standing: f64,
    pub leaf: OrganRemovalFractions,
    pub stem: OrganRemovalFractions,
    pub stolon: OrganRemovalFractions,
}

impl Default for RemovalParams {
    fn default() -> Self {
        Self {
            preference_green_over_dead: 1.0,
            preference_leaf_over_stem:  1.0,
            leaf:                       OrganRemovalFractions::removing(0.5, 0.5),
            stem:                       OrganRemovalFractions::removing(0.5, 0.5),
            stolon:                     OrganRemovalFractions::removing(0.5, 0.0),
            stolon_fraction_standing:   0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimumGreenParams {
    /// Minimum live shoot DM kept by turnover [kg/ha]
    pub weight: f64,
    /// Share of the minimum held by leaves, the rest by stems [0-1]
    pub leaf_proportion: f64,
    /// Minimum live root DM relative to `weight` [-]
    pub root_proportion: f64,
}

impl Default for MinimumGreenParams {
    fn default() -> Self {
        Self { weight: 100.0, leaf_proportion: 0.8, root_proportion: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialStateParams {
    /// Initial shoot DM; negative means not sown, zero means sown but not emerged [kg/ha]
    pub shoot_dm: f64,
    /// Initial root DM [kg/ha]
    pub root_dm: f64,
    /// Initial rooting depth [mm]
    pub root_depth: f64,
    /// Overrides the family default DM partition (11 values)
    pub dm_fractions: Option<Vec<f64>>,
}

impl Default for InitialStateParams {
    fn default() -> Self {
        Self { shoot_dm: 2000.0, root_dm: 500.0, root_depth: 750.0, dm_fractions: None }
    }
}

// ----------------------------------------------------------------------------
// Top-level configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    pub name: String,
    pub family: PlantFamily,
    pub pathway: PhotosynthesisPathway,
    pub lifecycle: Lifecycle,
    pub photosynthesis: PhotosynthesisParams,
    pub respiration: RespirationParams,
    pub temperature: GrowthTemperatureParams,
    pub heat_stress: HeatStressParams,
    pub cold_stress: ColdStressParams,
    pub co2: Co2Params,
    pub germination: GerminationParams,
    pub annual: AnnualParams,
    pub allocation: AllocationParams,
    pub reproductive_season: ReproductiveSeasonParams,
    pub nitrogen: NitrogenParams,
    pub turnover: TurnoverParams,
    pub root: RootParams,
    pub uptake: UptakeParams,
    pub water: WaterStressParams,
    pub canopy: CanopyParams,
    pub digestibility: DigestibilityParams,
    pub removal: RemovalParams,
    pub minimum_green: MinimumGreenParams,
    pub initial: InitialStateParams,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            name:                "ryegrass".to_string(),
            family:              PlantFamily::Grass,
            pathway:             PhotosynthesisPathway::C3,
            lifecycle:           Lifecycle::Perennial,
            photosynthesis:      PhotosynthesisParams::default(),
            respiration:         RespirationParams::default(),
            temperature:         GrowthTemperatureParams::default(),
            heat_stress:         HeatStressParams::default(),
            cold_stress:         ColdStressParams::default(),
            co2:                 Co2Params::default(),
            germination:         GerminationParams::default(),
            annual:              AnnualParams::default(),
            allocation:          AllocationParams::default(),
            reproductive_season: ReproductiveSeasonParams::default(),
            nitrogen:            NitrogenParams::default(),
            turnover:            TurnoverParams::default(),
            root:                RootParams::default(),
            uptake:              UptakeParams::default(),
            water:               WaterStressParams::default(),
            canopy:              CanopyParams::default(),
            digestibility:       DigestibilityParams::default(),
            removal:             RemovalParams::default(),
            minimum_green:       MinimumGreenParams::default(),
            initial:             InitialStateParams::default(),
        }
    }
}

impl SpeciesConfig {
    /// White clover flavoured legume: stolons, fixation, lower shoot:root target.
    pub fn white_clover() -> Self {
        let mut cfg = Self {
            name: "white clover".to_string(),
            family: PlantFamily::Legume,
            ..Self::default()
        };
        cfg.nitrogen.leaf = NConcentration::new(0.045, 0.012, 0.055);
        cfg.nitrogen.minimum_fixation = 0.5;
        cfg.nitrogen.maximum_fixation = 0.9;
        cfg.allocation.target_shoot_root_ratio = 3.0;
        cfg.allocation.fraction_to_stolon = 0.25;
        cfg.canopy.stolon_effect_on_lai = 0.5;
        cfg.removal.stolon_fraction_standing = 0.5;
        cfg.root.depth_maximum = 400.0;
        cfg.initial.root_depth = 400.0;
        cfg
    }

    /// Parses a (possibly partial) TOML document and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: SpeciesConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PastureError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn is_legume(&self) -> bool {
        self.family == PlantFamily::Legume
    }

    pub fn is_annual(&self) -> bool {
        self.lifecycle == Lifecycle::Annual
    }

    /// Initial DM partition for this family, unless overridden.
    pub fn initial_dm_fractions(&self) -> Vec<f64> {
        if let Some(fractions) = &self.initial.dm_fractions {
            return fractions.clone();
        }
        match self.family {
            PlantFamily::Grass => vec![0.15, 0.25, 0.25, 0.05, 0.05, 0.10, 0.10, 0.05, 0.00, 0.00, 0.00],
            PlantFamily::Legume => vec![0.16, 0.23, 0.22, 0.05, 0.03, 0.05, 0.05, 0.01, 0.04, 0.08, 0.08],
            PlantFamily::Forb => vec![0.20, 0.20, 0.15, 0.05, 0.10, 0.15, 0.10, 0.05, 0.00, 0.00, 0.00],
        }
    }

    /// Rejects parameter sets the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        check_len("digestibility.cell_wall", &self.digestibility.cell_wall, SHOOT_TISSUES)?;
        check_len(
            "nitrogen.fraction_luxury_remobilisable",
            &self.nitrogen.fraction_luxury_remobilisable,
            SHOOT_TISSUES - 1,
        )?;
        check_len("germination.emergence_fractions", &self.germination.emergence_fractions, DM_FRACTION_ENTRIES)?;
        if let Some(fractions) = &self.initial.dm_fractions {
            check_len("initial.dm_fractions", fractions, DM_FRACTION_ENTRIES)?;
        }

        if self.initial.root_depth > self.root.depth_maximum {
            return Err(PastureError::RootDepthExceedsMaximum {
                depth: self.initial.root_depth,
                maximum: self.root.depth_maximum,
            });
        }
        if self.root.depth_minimum > self.root.depth_maximum {
            return Err(PastureError::InvalidParameter {
                name: "root.depth_minimum",
                reason: "must not exceed root.depth_maximum".to_string(),
            });
        }

        for (name, n) in [
            ("nitrogen.leaf", &self.nitrogen.leaf),
            ("nitrogen.stem", &self.nitrogen.stem),
            ("nitrogen.stolon", &self.nitrogen.stolon),
            ("nitrogen.root", &self.nitrogen.root),
        ] {
            if !(n.minimum <= n.optimum && n.optimum <= n.maximum) {
                return Err(PastureError::InvalidParameter {
                    name,
                    reason: format!("need minimum <= optimum <= maximum, got {:?}", n),
                });
            }
        }

        for (name, value) in [
            ("nitrogen.minimum_fixation", self.nitrogen.minimum_fixation),
            ("nitrogen.maximum_fixation", self.nitrogen.maximum_fixation),
            ("nitrogen.soil_fertility_factor", self.nitrogen.soil_fertility_factor),
            ("allocation.max_root_allocation", self.allocation.max_root_allocation),
            ("allocation.fraction_leaf_maximum", self.allocation.fraction_leaf_maximum),
            ("allocation.fraction_leaf_minimum", self.allocation.fraction_leaf_minimum),
            ("allocation.fraction_to_stolon", self.allocation.fraction_to_stolon),
            ("turnover.fraction_carbon_remobilisable", self.turnover.fraction_carbon_remobilisable),
            ("removal.stolon_fraction_standing", self.removal.stolon_fraction_standing),
            ("minimum_green.leaf_proportion", self.minimum_green.leaf_proportion),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PastureError::InvalidParameter {
                    name,
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
        }
        if self.nitrogen.minimum_fixation > self.nitrogen.maximum_fixation {
            return Err(PastureError::InvalidParameter {
                name: "nitrogen.minimum_fixation",
                reason: "must not exceed nitrogen.maximum_fixation".to_string(),
            });
        }
        if self.allocation.fraction_leaf_maximum + self.allocation.fraction_to_stolon > 1.0 {
            return Err(PastureError::InvalidParameter {
                name: "allocation.fraction_to_stolon",
                reason: "leaf and stolon fractions exceed the whole shoot".to_string(),
            });
        }

        for (name, value) in [
            ("temperature.exponent", self.temperature.exponent),
            ("germination.degree_days", self.germination.degree_days),
            ("respiration.reference_temperature", self.respiration.reference_temperature),
            ("photosynthesis.light_extinction_coefficient", self.photosynthesis.light_extinction_coefficient),
            ("photosynthesis.curvature", self.photosynthesis.curvature),
            ("turnover.live_leaves_per_tiller", self.turnover.live_leaves_per_tiller),
            ("root.specific_root_length", self.root.specific_root_length),
            ("canopy.height_mass_for_max", self.canopy.height_mass_for_max),
            ("digestibility.cn_ratio_protein", self.digestibility.cn_ratio_protein),
        ] {
            if value <= 0.0 {
                return Err(PastureError::InvalidParameter {
                    name,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.temperature.optimum <= self.temperature.minimum {
            return Err(PastureError::InvalidParameter {
                name: "temperature.optimum",
                reason: "must be above temperature.minimum".to_string(),
            });
        }
        if self.turnover.temperature_reference <= self.turnover.temperature_minimum {
            return Err(PastureError::InvalidParameter {
                name: "turnover.temperature_reference",
                reason: "must be above turnover.temperature_minimum".to_string(),
            });
        }
        Ok(())
    }
}

fn check_len(name: &'static str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(PastureError::ParameterLength { name, expected, found: values.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SpeciesConfig::default().validate().is_ok());
        assert!(SpeciesConfig::white_clover().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overrides_only_named_values() {
        let text = r#"
            name = "kikuyu"
            pathway = "C4"

            [temperature]
            minimum = 8.0
            optimum = 30.0
        "#;
        let cfg = SpeciesConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.name, "kikuyu");
        assert_eq!(cfg.pathway, PhotosynthesisPathway::C4);
        assert_eq!(cfg.temperature.minimum, 8.0);
        // untouched values keep their defaults
        assert_eq!(cfg.temperature.exponent, 1.7);
        assert_eq!(cfg.respiration.growth_coefficient, 0.25);
    }

    #[test]
    fn test_unknown_enum_variant_is_rejected() {
        let err = SpeciesConfig::from_toml_str("family = \"shrub\"").unwrap_err();
        assert!(matches!(err, PastureError::ConfigParse(_)));
    }

    #[test]
    fn test_wrong_array_length_is_config_error() {
        let text = "[digestibility]\ncell_wall = [0.6, 0.6, 0.2]\n";
        match SpeciesConfig::from_toml_str(text) {
            Err(PastureError::ParameterLength { expected, found, .. }) => {
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("expected ParameterLength, got {:?}", other),
        }
    }

    #[test]
    fn test_root_depth_beyond_maximum_rejected() {
        let mut cfg = SpeciesConfig::default();
        cfg.initial.root_depth = 900.0;
        assert!(matches!(
            cfg.validate(),
            Err(PastureError::RootDepthExceedsMaximum { .. })
        ));
    }

    #[test]
    fn test_soil_fertility_must_be_a_fraction() {
        for bad in [-0.1, 1.2] {
            let mut cfg = SpeciesConfig::default();
            cfg.nitrogen.soil_fertility_factor = bad;
            match cfg.validate() {
                Err(PastureError::InvalidParameter { name, .. }) => assert_eq!(name, "nitrogen.soil_fertility_factor"),
                other => panic!("expected InvalidParameter, got {:?}", other),
            }
        }
        let mut cfg = SpeciesConfig::default();
        cfg.nitrogen.soil_fertility_factor = 0.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = SpeciesConfig::white_clover();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back = SpeciesConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.family, PlantFamily::Legume);
        assert_eq!(back.nitrogen.maximum_fixation, 0.9);
        assert_eq!(back.allocation.fraction_to_stolon, 0.25);
    }

    #[test]
    fn test_growth_temperature_maximum() {
        let t = GrowthTemperatureParams::default();
        assert!((t.maximum() - (20.0 + 19.0 / 1.7)).abs() < 1e-12);
    }
}
