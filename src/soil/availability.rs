//! Plant-available soil water and mineral N for one root zone.
//!
//! Only the part of each layer explored by roots counts. Layers below the
//! root front contribute nothing.

use serde::{Deserialize, Serialize};

use super::ZoneSoilState;
use crate::common::{bound, divide};
use crate::config::{NitrogenAvailabilityMethod, UptakeParams, WaterAvailabilityMethod};
use crate::organs::RootOrgan;

/// Mineral N the plant could take up today, per layer [kg N/ha].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailableNitrogen {
    pub nh4: Vec<f64>,
    pub no3: Vec<f64>,
}

impl AvailableNitrogen {
    pub fn zeros(n_layers: usize) -> Self {
        Self { nh4: vec![0.0; n_layers], no3: vec![0.0; n_layers] }
    }

    pub fn total(&self) -> f64 {
        self.nh4.iter().sum::<f64>() + self.no3.iter().sum::<f64>()
    }

    pub fn scale(&mut self, factor: f64) {
        self.nh4.iter_mut().for_each(|v| *v *= factor);
        self.no3.iter_mut().for_each(|v| *v *= factor);
    }
}

/// Relative availability of water between LL15 (0) and DUL (1).
fn soil_moisture_factor(zone: &ZoneSoilState, layer: usize, exponent: f64) -> f64 {
    let p = &zone.profile;
    let water = zone.water[layer];
    let (ll15, dul) = (p.ll15_mm(layer), p.dul_mm(layer));
    if water >= dul {
        1.0
    } else if water <= ll15 {
        0.0
    } else {
        let ratio = bound((water - ll15) / (dul - ll15), 0.0, 1.0);
        1.0 - (1.0 - ratio).powf(exponent)
    }
}

/// Water the roots could extract from each layer today [mm].
pub fn plant_available_water(zone: &ZoneSoilState, root: &RootOrgan, params: &UptakeParams) -> Vec<f64> {
    let p = &zone.profile;
    let bottom = root.bottom_layer();
    let rld = root.root_length_density();

    (0..zone.n_layers())
        .map(|layer| {
            if layer > bottom {
                return 0.0;
            }
            let explored = root.fraction_layer_with_roots(layer);
            let extractable = (zone.water[layer] - p.ll_mm(layer)).max(0.0);
            let factor = match params.water_method {
                WaterAvailabilityMethod::DefaultKl => p.kl[layer],
                WaterAvailabilityMethod::AlternativeKl => {
                    let sw = soil_moisture_factor(zone, layer, params.exponent_soil_moisture);
                    let rld_factor = (rld[layer] / params.reference_rld).min(1.0);
                    (p.kl[layer] * sw * rld_factor).min(1.0)
                }
                WaterAvailabilityMethod::AlternativeKs => {
                    let sw = soil_moisture_factor(zone, layer, params.exponent_soil_moisture);
                    let conductivity = 1.0 - 10f64.powf(-p.ks[layer] / params.reference_ks);
                    let rld_factor = 1.0 - 10f64.powf(-rld[layer] / params.reference_rld);
                    (conductivity * rld_factor * sw).min(1.0)
                }
            };
            extractable * explored * factor
        })
        .collect()
}

/// Mineral N the roots could take up from each layer today.
///
/// `water_uptake` is today's water uptake from this zone [mm], used by the
/// water-uptake based method. The total is capped at `maximum_n_uptake`.
pub fn plant_available_nitrogen(
    zone: &ZoneSoilState,
    root: &RootOrgan,
    params: &UptakeParams,
    water_uptake: &[f64],
) -> AvailableNitrogen {
    let p = &zone.profile;
    let n = zone.n_layers();
    let bottom = root.bottom_layer();
    let rld = root.root_length_density();
    let mut available = AvailableNitrogen::zeros(n);

    for layer in 0..n.min(bottom + 1) {
        let explored = root.fraction_layer_with_roots(layer);
        let nh4 = zone.nh4[layer] * explored;
        let no3 = zone.no3[layer] * explored;

        let (a_nh4, a_no3) = match params.nitrogen_method {
            NitrogenAvailabilityMethod::BasicAgPasture => (nh4, no3),
            NitrogenAvailabilityMethod::DefaultApsim => {
                let sw = soil_moisture_factor(zone, layer, params.exponent_soil_moisture);
                let bd = 100.0 / (p.thickness[layer] * p.bulk_density[layer]);
                (
                    nh4.min(nh4 * nh4 * sw * bd * params.k_nh4),
                    no3.min(no3 * no3 * sw * bd * params.k_no3),
                )
            }
            NitrogenAvailabilityMethod::AlternativeRld => {
                let sw = soil_moisture_factor(zone, layer, params.exponent_soil_moisture);
                let rld_factor = divide(rld[layer], params.reference_rld, 1.0).min(1.0);
                (
                    nh4 * (sw * rld_factor * params.ku_nh4).min(1.0),
                    no3 * (sw * rld_factor * params.ku_no3).min(1.0),
                )
            }
            NitrogenAvailabilityMethod::AlternativeWup => {
                let uptake = water_uptake.get(layer).copied().unwrap_or(0.0);
                let fraction_taken = divide(uptake, zone.water[layer], 0.0);
                (
                    nh4 * (fraction_taken * params.ku_nh4).min(1.0),
                    no3 * (fraction_taken * params.ku_no3).min(1.0),
                )
            }
        };
        available.nh4[layer] = a_nh4.max(0.0);
        available.no3[layer] = a_no3.max(0.0);
    }

    let total = available.total();
    if total > params.maximum_n_uptake {
        available.scale(params.maximum_n_uptake / total);
    }
    available
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DigestibilityParams, NConcentration, RootParams};
    use crate::soil::SoilProfile;

    fn setup(depth: f64) -> (ZoneSoilState, RootOrgan) {
        let profile = SoilProfile::silt_loam(6, 100.0);
        let root = RootOrgan::new(
            "home",
            &profile,
            &RootParams::default(),
            NConcentration::new(0.02, 0.006, 0.025),
            50.0,
            &DigestibilityParams::default(),
            &[0.0, 0.0, 0.0],
            800.0,
            depth,
        )
        .expect("valid root");
        let zone = ZoneSoilState::at_field_capacity("home", profile, 0.5, 1.5);
        (zone, root)
    }

    #[test]
    fn test_default_kl_water() {
        let (zone, root) = setup(250.0);
        let params = UptakeParams::default();
        let water = plant_available_water(&zone, &root, &params);
        // (32 - 12) mm × kl 0.06, half of the third layer explored
        assert!((water[0] - 1.2).abs() < 1e-9);
        assert!((water[2] - 0.6).abs() < 1e-9);
        assert_eq!(water[3], 0.0);
    }

    #[test]
    fn test_dry_soil_offers_no_water() {
        let (mut zone, root) = setup(600.0);
        for layer in 0..zone.n_layers() {
            zone.water[layer] = zone.profile.ll_mm(layer) * 0.9;
        }
        for method in [
            WaterAvailabilityMethod::DefaultKl,
            WaterAvailabilityMethod::AlternativeKl,
            WaterAvailabilityMethod::AlternativeKs,
        ] {
            let params = UptakeParams { water_method: method, ..UptakeParams::default() };
            let total: f64 = plant_available_water(&zone, &root, &params).iter().sum();
            assert_eq!(total, 0.0, "{:?}", method);
        }
    }

    #[test]
    fn test_alternative_kl_never_exceeds_default() {
        let (zone, root) = setup(600.0);
        let default = plant_available_water(&zone, &root, &UptakeParams::default());
        let alt = plant_available_water(
            &zone,
            &root,
            &UptakeParams { water_method: WaterAvailabilityMethod::AlternativeKl, ..UptakeParams::default() },
        );
        for (a, d) in alt.iter().zip(&default) {
            assert!(a <= &(d + 1e-12));
        }
    }

    #[test]
    fn test_basic_nitrogen_counts_explored_layers() {
        let (zone, root) = setup(250.0);
        let n = plant_available_nitrogen(&zone, &root, &UptakeParams::default(), &[]);
        // 2 kg/ha per layer over 2.5 layers
        assert!((n.total() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_nitrogen_capped_at_maximum_uptake() {
        let (mut zone, root) = setup(600.0);
        zone.no3 = vec![20.0; 6];
        let n = plant_available_nitrogen(&zone, &root, &UptakeParams::default(), &[]);
        assert!((n.total() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_water_uptake_method_needs_uptake() {
        let (zone, root) = setup(600.0);
        let params = UptakeParams {
            nitrogen_method: NitrogenAvailabilityMethod::AlternativeWup,
            ..UptakeParams::default()
        };
        let none = plant_available_nitrogen(&zone, &root, &params, &[0.0; 6]);
        assert_eq!(none.total(), 0.0);
        let some = plant_available_nitrogen(&zone, &root, &params, &[3.2; 6]);
        // 10% of the layer water taken: NO3 share 0.095, NH4 0.05
        assert!((some.no3[0] - 1.5 * 0.095).abs() < 1e-9);
        assert!((some.nh4[0] - 0.5 * 0.05).abs() < 1e-9);
    }
}
