//! pasture-growth: Daily growth, nitrogen balance and tissue turnover of a pasture species.
//!
//! Architecture:
//! - Cohort pipeline per organ (organs module): emerging → developing → mature → dead → detached
//! - Root systems per soil zone with layered DM and N (organs::root)
//! - Pure environmental response functions plus heat/cold/water-logging memory (response module)
//! - Two-point canopy photosynthesis and respiration (photosynthesis module)
//! - Self-correcting shoot:root and leaf:stem allocation (allocation module)
//! - Priority-ordered N supply: fixation → senesced → soil → luxury (nitrogen module)
//! - Turnover rates with a minimum green floor (turnover module)
//! - Injected collaborators for soil uptake and residues (interfaces module)
//!
//! One call to [`PastureSpecies::advance_one_day`] runs the whole daily sequence
//! and returns an immutable [`SpeciesState`] snapshot.

pub mod allocation;
pub mod clock;
pub mod common;
pub mod config;
pub mod diag;
pub mod error;
pub mod interfaces;
pub mod nitrogen;
pub mod organs;
pub mod phenology;
pub mod photosynthesis;
pub mod removal;
pub mod response;
pub mod soil;
pub mod species;
pub mod turnover;

pub use config::{PlantFamily, SpeciesConfig};
pub use error::{PastureError, Result};
pub use interfaces::{
    CanopyExchange, DailyInputs, DailyWeather, DetachedShoot, PassThroughArbitrator, ResidueLedger, ResidueSink,
    SoilArbitrator,
};
pub use removal::RemovalMode;
pub use soil::{SoilProfile, ZoneSoilState};
pub use species::{BiomassRemoved, PastureSpecies, SpeciesState};

/// Runs `species` through a sequence of days, collecting the daily snapshots.
///
/// Stops at the first day that fails; earlier days stay applied.
pub fn simulate<I>(
    species: &mut PastureSpecies,
    days: I,
    arbitrator: &mut dyn SoilArbitrator,
    sink: &mut dyn ResidueSink,
) -> Result<Vec<SpeciesState>>
where
    I: IntoIterator<Item = DailyInputs>,
{
    days.into_iter()
        .map(|inputs| species.advance_one_day(&inputs, arbitrator, sink))
        .collect()
}
