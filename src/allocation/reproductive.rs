//! Reproductive season of perennials.
//!
//! Perennial swards are not taken through a reproductive phase, but in late
//! spring they put proportionally more of their growth into shoots. The
//! season is placed in the year from the latitude alone: later and shorter
//! away from the equator, with a larger shoot bias.

use serde::{Deserialize, Serialize};

use crate::config::ReproductiveSeasonParams;

const YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReproductiveSeason {
    pub enabled: bool,
    /// Day of year the onset begins
    pub doy_start: f64,
    /// Onset, plateau and outset lengths [days]
    pub intervals: [f64; 3],
    /// Relative increase of the shoot:root target on the plateau [-]
    pub allocation_increase: f64,
}

impl ReproductiveSeason {
    pub fn new(latitude: f64, params: &ReproductiveSeasonParams) -> Self {
        let abs_lat = latitude.abs();
        let doy_winter_solstice = if latitude < 0.0 { 172.0 } else { 355.0 };
        let timing = (-params.timing_coefficient * (abs_lat - params.reference_latitude)).exp();
        let doy_plateau = doy_winter_solstice + 0.5 * YEAR / (1.0 + timing);

        // plateau between about two weeks and six months
        let plateau = YEAR / 24.0 + (YEAR * 11.0 / 24.0) * (1.0 - abs_lat / 90.0).powf(params.duration_coefficient);
        let shoulders = (YEAR / 2.0).min(plateau * params.shoulders_length_factor);
        let onset = shoulders * params.onset_duration_factor;
        let outset = shoulders * (1.0 - params.onset_duration_factor);

        let mut doy_start = doy_plateau - onset;
        if doy_start < 0.0 {
            doy_start += YEAR;
        }
        // a start computed past the end of the year wraps to the next one
        if doy_start > YEAR {
            doy_start -= YEAR;
        }

        let allocation = (-params.allocation_coefficient * (abs_lat - params.reference_latitude)).exp();
        Self {
            enabled: params.enabled,
            doy_start,
            intervals: [onset, plateau, outset],
            allocation_increase: params.max_allocation_increase / (1.0 + allocation),
        }
    }

    /// Multiplier [≥ 1] on the shoot:root target for `day_of_year`.
    pub fn factor(&self, day_of_year: u32, year_length: u32) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        let doy = day_of_year as f64;
        let year = year_length as f64;
        let a = self.doy_start;
        let b = a + self.intervals[0];
        let c = b + self.intervals[1];
        let d = c + self.intervals[2];
        let increase = self.allocation_increase;

        let extra = if doy > a {
            if doy <= b {
                increase * (doy - a) / (b - a)
            } else if doy <= c {
                increase
            } else if doy <= d {
                increase * (1.0 - (doy - c) / (d - c))
            } else {
                0.0
            }
        } else if c > year && doy <= c - year {
            increase
        } else if d > year && doy <= d - year {
            increase * (1.0 - (year + doy - c) / (d - c))
        } else {
            0.0
        };
        1.0 + extra
    }
}
