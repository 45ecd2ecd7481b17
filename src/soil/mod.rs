// ============================================================================
// Soil Zones — Read-only view of the soil the roots draw from
//
// The growth engine never owns or mutates soil state. Each day the caller
// hands over one `ZoneSoilState` per zone (layer water and mineral N), and
// the engine answers with how much of it the plant could take up.
//
// Layer properties in `SoilProfile` are volumetric [mm/mm]; the water in
// `ZoneSoilState` is an amount per layer [mm].
// ============================================================================

pub mod availability;

pub use availability::{plant_available_nitrogen, plant_available_water, AvailableNitrogen};

use serde::{Deserialize, Serialize};

use crate::error::{PastureError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    /// Layer thickness [mm]
    pub thickness: Vec<f64>,
    /// Bulk density [g/cm³]
    pub bulk_density: Vec<f64>,
    /// Water content at 15 bar [mm/mm]
    pub ll15: Vec<f64>,
    /// Drained upper limit [mm/mm]
    pub dul: Vec<f64>,
    /// Saturation [mm/mm]
    pub sat: Vec<f64>,
    /// Plant lower limit of extractable water [mm/mm]
    pub ll: Vec<f64>,
    /// Daily fraction of available water extractable by roots [0-1]
    pub kl: Vec<f64>,
    /// Saturated hydraulic conductivity [mm/day]
    pub ks: Vec<f64>,
    /// Root exploration factor [0-1]
    pub xf: Vec<f64>,
}

impl SoilProfile {
    /// A uniform silt loam of `n_layers` layers, each `thickness` mm deep.
    pub fn silt_loam(n_layers: usize, thickness: f64) -> Self {
        Self {
            thickness:    vec![thickness; n_layers],
            bulk_density: vec![1.2; n_layers],
            ll15:         vec![0.12; n_layers],
            dul:          vec![0.32; n_layers],
            sat:          vec![0.45; n_layers],
            ll:           vec![0.12; n_layers],
            kl:           vec![0.06; n_layers],
            ks:           vec![100.0; n_layers],
            xf:           vec![1.0; n_layers],
        }
    }

    pub fn n_layers(&self) -> usize {
        self.thickness.len()
    }

    /// Total profile depth [mm]
    pub fn depth(&self) -> f64 {
        self.thickness.iter().sum()
    }

    pub fn ll15_mm(&self, layer: usize) -> f64 {
        self.ll15[layer] * self.thickness[layer]
    }

    pub fn dul_mm(&self, layer: usize) -> f64 {
        self.dul[layer] * self.thickness[layer]
    }

    pub fn sat_mm(&self, layer: usize) -> f64 {
        self.sat[layer] * self.thickness[layer]
    }

    pub fn ll_mm(&self, layer: usize) -> f64 {
        self.ll[layer] * self.thickness[layer]
    }

    /// Checks that every per-layer property has one value per layer.
    pub fn validate(&self, zone: &str) -> Result<()> {
        let expected = self.n_layers();
        for found in [
            self.bulk_density.len(),
            self.ll15.len(),
            self.dul.len(),
            self.sat.len(),
            self.ll.len(),
            self.kl.len(),
            self.ks.len(),
            self.xf.len(),
        ] {
            if found != expected {
                return Err(PastureError::LayerMismatch { zone: zone.to_string(), expected, found });
            }
        }
        if self.thickness.iter().any(|&dz| dz <= 0.0) {
            return Err(PastureError::InvalidParameter {
                name: "soil.thickness",
                reason: format!("zone `{zone}` has a layer with non-positive thickness"),
            });
        }
        Ok(())
    }
}

/// Today's soil state of one zone, as seen by the plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSoilState {
    pub zone: String,
    /// Zone area [ha]
    pub area: f64,
    pub profile: SoilProfile,
    /// Water per layer [mm]
    pub water: Vec<f64>,
    /// Plant-available ammonium per layer [kg N/ha]
    pub nh4: Vec<f64>,
    /// Plant-available nitrate per layer [kg N/ha]
    pub no3: Vec<f64>,
}

impl ZoneSoilState {
    /// A zone at drained upper limit with `nh4`/`no3` kg N/ha in every layer.
    pub fn at_field_capacity(zone: impl Into<String>, profile: SoilProfile, nh4: f64, no3: f64) -> Self {
        let n = profile.n_layers();
        let water = (0..n).map(|l| profile.dul_mm(l)).collect();
        Self {
            zone: zone.into(),
            area: 1.0,
            profile,
            water,
            nh4: vec![nh4; n],
            no3: vec![no3; n],
        }
    }

    pub fn n_layers(&self) -> usize {
        self.profile.n_layers()
    }

    pub fn validate(&self) -> Result<()> {
        self.profile.validate(&self.zone)?;
        let expected = self.n_layers();
        for found in [self.water.len(), self.nh4.len(), self.no3.len()] {
            if found != expected {
                return Err(PastureError::LayerMismatch { zone: self.zone.clone(), expected, found });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silt_loam_is_consistent() {
        let profile = SoilProfile::silt_loam(6, 150.0);
        assert!(profile.validate("field").is_ok());
        assert_eq!(profile.depth(), 900.0);
        assert!((profile.dul_mm(0) - 48.0).abs() < 1e-12);
    }

    #[test]
    fn test_zone_layer_mismatch_is_reported() {
        let mut zone = ZoneSoilState::at_field_capacity("paddock", SoilProfile::silt_loam(4, 100.0), 1.0, 5.0);
        zone.no3.pop();
        match zone.validate() {
            Err(PastureError::LayerMismatch { zone, expected, found }) => {
                assert_eq!(zone, "paddock");
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("expected LayerMismatch, got {:?}", other),
        }
    }
}
