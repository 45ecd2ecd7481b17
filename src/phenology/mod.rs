// ============================================================================
// Phenology — Development stage of the plant
//
//   NotSown ──sow──▶ Germinating ──degree-days──▶ Vegetative
//                                                    │ (annuals only)
//                                                    ▼
//                          NotSown ◀──maturity── Reproductive
//
// Perennials stay vegetative for good. Annuals move on by whichever comes
// first, elapsed days or accumulated degree-days, and end the crop at
// maturity.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::common::divide;
use crate::config::AnnualParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhenologyStage {
    NotSown,
    Germinating,
    Vegetative,
    Reproductive,
}

impl PhenologyStage {
    /// Numeric stage code: -1 not sown, 0 germinating, 1 vegetative, 2 reproductive.
    pub fn code(&self) -> i8 {
        match self {
            PhenologyStage::NotSown => -1,
            PhenologyStage::Germinating => 0,
            PhenologyStage::Vegetative => 1,
            PhenologyStage::Reproductive => 2,
        }
    }

    /// True once the plant has emerged and grows.
    pub fn has_emerged(&self) -> bool {
        matches!(self, PhenologyStage::Vegetative | PhenologyStage::Reproductive)
    }
}

/// Stage change reported by `PhenologyClock::advance_annual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhenologyEvent {
    None,
    GerminationWindow,
    Anthesis,
    Maturity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhenologyClock {
    pub stage: PhenologyStage,
    pub days_since_emergence: u32,
    /// Thermal time since emergence [°C·day]
    pub degree_days_since_emergence: f64,
    /// Thermal time since sowing, while germinating [°C·day]
    pub degree_days_germination: f64,
    /// Progress through the current annual phase [0-1]
    pub pheno_factor: f64,
}

impl PhenologyClock {
    /// Stage implied by the initial shoot DM: negative not sown, zero sown.
    pub fn from_initial_shoot(shoot_dm: f64) -> Self {
        let stage = if shoot_dm > 0.0 {
            PhenologyStage::Vegetative
        } else if shoot_dm == 0.0 {
            PhenologyStage::Germinating
        } else {
            PhenologyStage::NotSown
        };
        Self {
            stage,
            days_since_emergence: 0,
            degree_days_since_emergence: 0.0,
            degree_days_germination: 0.0,
            pheno_factor: 0.0,
        }
    }

    pub fn sow(&mut self) {
        *self = Self::from_initial_shoot(0.0);
    }

    pub fn end(&mut self) {
        *self = Self::from_initial_shoot(-1.0);
    }

    /// Accumulates one day of germination thermal time; returns progress [0-1+].
    pub fn germination_progress(&mut self, t_mean: f64, t_min_growth: f64, degree_days_needed: f64) -> f64 {
        self.degree_days_germination += (t_mean - t_min_growth).max(0.0);
        divide(self.degree_days_germination, degree_days_needed, 1.0)
    }

    pub fn emerge(&mut self) {
        self.stage = PhenologyStage::Vegetative;
        self.days_since_emergence = 0;
        self.degree_days_since_emergence = 0.0;
        self.degree_days_germination = 0.0;
        self.pheno_factor = 0.0;
    }

    /// Advances an annual plant by one day.
    pub fn advance_annual(&mut self, day_of_year: u32, t_mean: f64, t_min_growth: f64, params: &AnnualParams) -> PhenologyEvent {
        let mut event = PhenologyEvent::None;
        if day_of_year == params.doy_germination && self.stage != PhenologyStage::Germinating {
            self.stage = PhenologyStage::Germinating;
            self.degree_days_germination = 0.0;
            event = PhenologyEvent::GerminationWindow;
        }
        if !self.stage.has_emerged() {
            return event;
        }

        self.days_since_emergence += 1;
        self.degree_days_since_emergence += (t_mean - t_min_growth).max(0.0);

        let days = self.days_since_emergence as f64;
        let to_anthesis = params.days_emergence_to_anthesis as f64;
        let to_maturity = params.days_anthesis_to_maturity as f64;
        let dd_anthesis = params.degree_days_to_anthesis;
        let dd_maturity = params.degree_days_anthesis_to_maturity;

        if self.stage == PhenologyStage::Vegetative
            && (days >= to_anthesis || self.degree_days_since_emergence >= dd_anthesis)
        {
            self.stage = PhenologyStage::Reproductive;
            self.degree_days_since_emergence = self.degree_days_since_emergence.max(dd_anthesis);
            event = PhenologyEvent::Anthesis;
        }

        let (by_days, by_degrees) = if self.stage == PhenologyStage::Reproductive {
            if days >= to_anthesis + to_maturity || self.degree_days_since_emergence >= dd_anthesis + dd_maturity {
                self.degree_days_since_emergence = self.degree_days_since_emergence.max(dd_anthesis + dd_maturity);
                event = PhenologyEvent::Maturity;
            }
            (
                divide(days - to_anthesis, to_maturity, 1.0),
                divide(self.degree_days_since_emergence - dd_anthesis, dd_maturity, 1.0),
            )
        } else {
            (divide(days, to_anthesis, 1.0), divide(self.degree_days_since_emergence, dd_anthesis, 1.0))
        };
        self.pheno_factor = by_days.max(by_degrees).clamp(0.0, 1.0);
        event
    }

    /// Reduction of photosynthesis in annuals: early after emergence
    /// (establishment) and through the reproductive phase.
    pub fn annual_growth_factor(&self, params: &AnnualParams) -> f64 {
        let days = self.days_since_emergence as f64;
        let early = params.days_early_growth_reduction as f64;
        let factor = match self.stage {
            PhenologyStage::Vegetative if days < early => 1.0 - 0.5 * (1.0 - days / early),
            PhenologyStage::Reproductive => {
                1.0 - divide(
                    days - params.days_emergence_to_anthesis as f64,
                    params.days_anthesis_to_maturity as f64,
                    1.0,
                )
            }
            _ => 1.0,
        };
        factor.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_initial_stage_follows_shoot_dm() {
        assert_eq!(PhenologyClock::from_initial_shoot(1500.0).stage, PhenologyStage::Vegetative);
        assert_eq!(PhenologyClock::from_initial_shoot(0.0).stage, PhenologyStage::Germinating);
        assert_eq!(PhenologyClock::from_initial_shoot(-1.0).stage.code(), -1);
    }

    #[test]
    fn test_germination_accumulates_thermal_time() {
        let mut clock = PhenologyClock::from_initial_shoot(0.0);
        // mean 11 °C, base 1 °C: 10 °C·day per day, 125 needed
        let mut days = 0;
        while clock.germination_progress(11.0, 1.0, 125.0) < 1.0 {
            days += 1;
        }
        assert_eq!(days + 1, 13);
        // cold days add nothing
        let before = clock.degree_days_germination;
        clock.germination_progress(-2.0, 1.0, 125.0);
        assert_eq!(clock.degree_days_germination, before);
    }

    #[test]
    fn test_annual_reaches_anthesis_by_days_when_cold() {
        let params = AnnualParams::default();
        let mut clock = PhenologyClock::from_initial_shoot(10.0);
        let mut anthesis_day = None;
        for day in 1..=200 {
            // 2 °C·day per day never reaches 1100 in time
            if clock.advance_annual(100, 3.0, 1.0, &params) == PhenologyEvent::Anthesis {
                anthesis_day = Some(day);
                break;
            }
        }
        assert_eq!(anthesis_day, Some(120));
        assert_eq!(clock.stage, PhenologyStage::Reproductive);
        assert_relative_eq!(clock.degree_days_since_emergence, 1100.0);
    }

    #[test]
    fn test_annual_reaches_maturity_by_degree_days_when_warm() {
        let params = AnnualParams::default();
        let mut clock = PhenologyClock::from_initial_shoot(10.0);
        let mut events = Vec::new();
        for _ in 0..150 {
            // 20 °C·day per day: anthesis on day 55, maturity 45 days later
            match clock.advance_annual(100, 21.0, 1.0, &params) {
                PhenologyEvent::None => {}
                e => events.push((clock.days_since_emergence, e)),
            }
            if events.last().map(|e| e.1) == Some(PhenologyEvent::Maturity) {
                break;
            }
        }
        assert_eq!(events, vec![(55, PhenologyEvent::Anthesis), (100, PhenologyEvent::Maturity)]);
        assert_relative_eq!(clock.pheno_factor, 1.0);
    }

    #[test]
    fn test_annual_growth_factor() {
        let params = AnnualParams::default();
        let mut clock = PhenologyClock::from_initial_shoot(10.0);
        clock.emerge();
        assert_relative_eq!(clock.annual_growth_factor(&params), 0.5);
        clock.days_since_emergence = 45;
        assert_eq!(clock.annual_growth_factor(&params), 1.0);
        clock.stage = PhenologyStage::Reproductive;
        clock.days_since_emergence = 120 + 17;
        assert_relative_eq!(clock.annual_growth_factor(&params), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_germination_window_restarts_annual() {
        let params = AnnualParams::default();
        let mut clock = PhenologyClock::from_initial_shoot(10.0);
        let event = clock.advance_annual(params.doy_germination, 15.0, 1.0, &params);
        assert_eq!(event, PhenologyEvent::GerminationWindow);
        assert_eq!(clock.stage, PhenologyStage::Germinating);
    }
}
