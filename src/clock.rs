// ============================================================================
// Simulation Clock — Calendar bookkeeping for the daily driver
//
//   day 1 ──▶ day 2 ──▶ … ──▶ day 365/366 ──▶ (new year) day 1
//
// The growth engine only ever sees a day-of-year and the length of the
// current year; this clock supplies both.
// ============================================================================

use serde::{Deserialize, Serialize};

/// What changed with the last `advance_day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayResult {
    pub new_year: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    pub year: i32,
    /// [1-366]
    pub day_of_year: u32,
    /// Days simulated so far
    pub days_elapsed: u64,
}

impl SimulationClock {
    pub fn new(year: i32, day_of_year: u32) -> Self {
        let length = year_length(year);
        Self {
            year,
            day_of_year: day_of_year.clamp(1, length),
            days_elapsed: 0,
        }
    }

    pub fn year_length(&self) -> u32 {
        year_length(self.year)
    }

    /// Moves on to the next day.
    pub fn advance_day(&mut self) -> DayResult {
        self.days_elapsed += 1;
        self.day_of_year += 1;
        let new_year = self.day_of_year > self.year_length();
        if new_year {
            self.year += 1;
            self.day_of_year = 1;
        }
        DayResult { new_year }
    }

    /// Human-readable date summary
    pub fn summary(&self) -> String {
        format!("Year {} | Day {:3} | {} days simulated", self.year, self.day_of_year, self.days_elapsed)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn year_length(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}
