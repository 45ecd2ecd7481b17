// ============================================================================
// Root Distribution — How root mass spreads over the soil layers
//
// Two profile shapes are supported:
//
//   Homogeneous  : proportional to layer thickness down to the maximum depth
//   ExpoLinear   : constant down to `depth_constant_proportion`, then a power
//                  decline reaching zero at depth_maximum × bottom factor,
//                  truncated at the maximum rooting depth
//
// Targets are unnormalised layer weights; `current_target` normalises them
// over the layers the roots currently reach.
// ============================================================================

use crate::common::{bound, EPSILON};
use crate::config::{RootDistributionMethod, RootParams};

/// Index of the deepest layer reached by roots at `depth` [mm].
pub fn bottom_layer(thickness: &[f64], depth: f64) -> usize {
    let mut result = 0;
    let mut top = 0.0;
    for (layer, dz) in thickness.iter().enumerate() {
        if depth > top {
            result = layer;
            top += dz;
        } else {
            break;
        }
    }
    result
}

/// Fraction [0-1] of `layer` explored by roots at `depth` [mm].
pub fn fraction_layer_with_roots(thickness: &[f64], depth: f64, layer: usize) -> f64 {
    let bottom = bottom_layer(thickness, depth);
    if layer < bottom {
        1.0
    } else if layer == bottom {
        let top: f64 = thickness[..layer].iter().sum();
        bound((depth - top) / thickness[layer], 0.0, 1.0)
    } else {
        0.0
    }
}

/// Unnormalised target distribution of root mass over the whole profile.
///
/// `xf` is the per-layer root exploration factor (1 = unrestricted).
pub fn target_distribution(thickness: &[f64], xf: &[f64], params: &RootParams) -> Vec<f64> {
    match params.distribution {
        RootDistributionMethod::Homogeneous => {
            let mut top = 0.0;
            thickness
                .iter()
                .zip(xf)
                .map(|(&dz, &x)| {
                    let inside = bound(params.depth_maximum - top, 0.0, dz);
                    top += dz;
                    inside * x
                })
                .collect()
        }
        RootDistributionMethod::ExpoLinear => expo_linear(thickness, xf, params),
    }
}

fn expo_linear(thickness: &[f64], xf: &[f64], params: &RootParams) -> Vec<f64> {
    let depth_max = params.depth_maximum;
    let first_stage = depth_max.min(params.depth_constant_proportion);
    let zero_depth = depth_max * params.bottom_distribution_factor;
    let exponent = params.distribution_exponent;
    let scale = (exponent + 1.0) * (zero_depth - first_stage).powf(exponent);

    let mut result = Vec::with_capacity(thickness.len());
    let mut top = 0.0;
    for (&dz, &x) in thickness.iter().zip(xf) {
        let bottom = top + dz;
        let weight = if top >= depth_max {
            0.0
        } else if bottom <= first_stage {
            dz
        } else {
            // --- Power decline below the constant layer ---
            let upper = zero_depth - top.max(first_stage);
            let lower = zero_depth - bottom.min(depth_max);
            let mut w = (upper.powf(exponent + 1.0) - lower.powf(exponent + 1.0)) / scale;
            if top < first_stage {
                w += first_stage - top;
            }
            w
        };
        result.push(weight * x);
        top = bottom;
    }
    result
}

/// Target distribution normalised over the layers reached at `depth`.
///
/// The bottom layer only counts the part explored by roots.
pub fn current_target(thickness: &[f64], target: &[f64], depth: f64) -> Vec<f64> {
    let bottom = bottom_layer(thickness, depth);
    let bottom_fraction = fraction_layer_with_roots(thickness, depth, bottom);

    let mut result = vec![0.0; target.len()];
    let cumulative: f64 = target[..bottom].iter().sum::<f64>() + target[bottom] * bottom_fraction;
    if cumulative > EPSILON {
        for layer in 0..bottom {
            result[layer] = target[layer] / cumulative;
        }
        result[bottom] = target[bottom] * bottom_fraction / cumulative;
    }
    result
}
