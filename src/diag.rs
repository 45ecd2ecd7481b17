/// Diagnostic: trace one day's whole-plant DM and N budget.
use tracing::{debug, enabled, Level};

use crate::species::SpeciesState;

pub fn trace_daily_budget(state: &SpeciesState) {
    if !enabled!(Level::DEBUG) {
        return;
    }
    let f = &state.fluxes;
    let l = &state.limits;

    debug!("=== DAILY BUDGET ({}, day {} since emergence) ===", state.name, state.days_since_emergence);
    debug!("  shoot DM:        {:.2} kg/ha  (standing {:.2})", state.dm_above_ground, state.dm_standing);
    debug!("  root DM:         {:.2} kg/ha  (depth {:.0} mm)", state.dm_below_ground, state.root_depth);
    debug!("  LAI:             {:.3} green, {:.3} dead", state.lai_green, state.lai_dead);
    debug!("  --- CARBON [kg C/ha] ---");
    debug!("  gross photosyn:  {:+.4}", f.gross_photosynthesis);
    debug!("  maintenance:     {:+.4}", -f.respiration_maintenance);
    debug!("  growth resp:     {:+.4}", -f.respiration_growth);
    debug!("  remobilised C:   {:+.4}", f.carbon_remobilised);
    debug!("  --- DM [kg/ha] ---");
    debug!("  potential:       {:.4}", f.dm_potential);
    debug!("  after water:     {:.4}  (supply {:.3}, logging {:.3})", f.dm_after_water, l.water_supply, l.water_logging);
    debug!("  actual:          {:+.4}  (N factor {:.3})", f.dm_actual, l.nitrogen);
    debug!("  detached shoot:  {:+.4}", -f.dm_shoot_detached);
    debug!("  detached root:   {:+.4}", -f.dm_root_detached);
    debug!("  --- N [kg N/ha] ---");
    debug!("  demand:          {:.4} optimum, {:.4} luxury", f.n_demand_optimum, f.n_demand_luxury);
    debug!("  fixed:           {:+.4}", f.n_fixed);
    debug!("  uptake:          {:+.4}  (of {:.4} available)", f.n_uptake, f.n_soil_available);
    debug!("  senesced remob:  {:.4}", f.n_senesced_remobilised);
    debug!("  luxury remob:    {:.4}", f.n_luxury_remobilised);
    debug!("  detached:        {:+.4}", -(f.n_shoot_detached + f.n_root_detached));
    debug!("  --- NET ---");
    debug!("  delta DM:        {:+.4} kg/ha", net_dm_change(state));
    debug!("  delta N:         {:+.4} kg N/ha", net_n_change(state));
}

/// Net change of plant DM over the day [kg/ha].
pub fn net_dm_change(state: &SpeciesState) -> f64 {
    let f = &state.fluxes;
    f.dm_actual - f.dm_shoot_detached - f.dm_root_detached - f.carbon_remobilised / crate::common::CARBON_FRACTION_IN_DM
}

/// Net change of plant N over the day [kg N/ha]; remobilised N stays inside.
pub fn net_n_change(state: &SpeciesState) -> f64 {
    let f = &state.fluxes;
    f.n_fixed + f.n_uptake - f.n_shoot_detached - f.n_root_detached
}

/// One-line summary for the driver's output.
pub fn summary(state: &SpeciesState) -> String {
    format!(
        "{}: shoot {:.0} kg/ha, root {:.0} kg/ha, N {:.1} kg/ha, LAI {:.2}, height {:.0} mm, growth {:+.1}",
        state.name,
        state.dm_above_ground,
        state.dm_below_ground,
        state.n_total,
        state.lai_green,
        state.height,
        state.fluxes.dm_actual
    )
}
