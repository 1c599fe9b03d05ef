//! Least-squares fit of the decay model to a sampled intensity series.
//!
//! The objective (sum of squared residuals) is minimized with a derivative-free
//! Nelder-Mead simplex. Because the problem is not convex the search is
//! restarted a few times from randomly perturbed copies of the best point found
//! so far, and the overall best result is kept.

use crate::decay::DecayModel;
use crate::error::{BleachError, BleachResult};
use crate::sampling::TimeSeries;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Starting value of the decay rate.
pub const INITIAL_RATE: f64 = -1e-4;

/// Absolute floor of the convergence test, relevant only when the residual reaches zero.
const MAX_ABS_ERROR: f64 = 1e-100;

// reflection, expansion, contraction and shrink coefficients
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Iteration policy of the fitter.
///
/// # Fields
/// - `max_iterations`: simplex iterations allowed per run (restarts get their own budget).
/// - `restarts`: number of randomized restarts after the first run.
/// - `error_tolerance`: the run has converged once the residual values across the
///   simplex agree to `10^-error_tolerance` (relative).
/// - `seed`: seed of the restart perturbations, fits are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub max_iterations: usize,
    pub restarts: usize,
    pub error_tolerance: u32,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            max_iterations: 2000,
            restarts: 2,
            error_tolerance: 10,
            seed: 0x5eed,
        }
    }
}

impl FitOptions {
    /// Relative spread of the objective at which a run stops.
    pub fn max_relative_error(&self) -> f64 {
        10f64.powi(-(self.error_tolerance as i32))
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub restarts: usize,
    pub converged: bool,
}

/// Outcome of a decay fit. Quality is reported, not judged.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub model: DecayModel,
    pub residual_sum_squares: f64,
    pub r_squared: f64,
    pub iterations: usize,
    pub restarts: usize,
    pub converged: bool,
    pub n_points: usize,
    pub options: FitOptions,
}

impl FitResult {
    /// Multi-line summary of the fit, in the form written to the log.
    pub fn result_string(&self) -> String {
        let status = if self.converged {
            "converged"
        } else {
            "iteration limit reached"
        };
        format!(
            "Formula: y = a*exp(-bx) + c\n\
             Status: {}\n\
             Number of points: {}\n\
             Number of iterations: {} (max: {})\n\
             Restarts: {} (max: {})\n\
             Sum of residuals squared: {:.6}\n\
             R^2: {:.6}\n\
             Parameters:\n  a = {:.6}\n  b = {:.8}\n  c = {:.6}",
            status,
            self.n_points,
            self.iterations,
            self.options.max_iterations,
            self.restarts,
            self.options.restarts,
            self.residual_sum_squares,
            self.r_squared,
            self.model.a,
            self.model.b,
            self.model.c,
        )
    }
}

/// Objective value with non-finite results mapped to infinity, so that
/// overflowing exponentials are simply rejected by the simplex.
fn evaluate_objective<F: Fn(&[f64]) -> f64>(objective: &F, point: &[f64]) -> f64 {
    let value = objective(point);
    if value.is_finite() {
        value
    } else {
        f64::INFINITY
    }
}

/// One Nelder-Mead run from `start` with an initial simplex spanned by `steps`.
fn nelder_mead<F: Fn(&[f64]) -> f64>(
    objective: &F,
    start: &[f64],
    steps: &[f64],
    max_iterations: usize,
    max_relative_error: f64,
) -> Minimum {
    let n = start.len();
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.to_vec());
    for (i, step) in steps.iter().enumerate() {
        let mut vertex = start.to_vec();
        vertex[i] += step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex
        .iter()
        .map(|v| evaluate_objective(objective, v))
        .collect();

    let mut iterations = 0;
    let mut converged = false;
    loop {
        // best vertex first, worst last
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[n];
        if worst - best <= max_relative_error * best.abs() + MAX_ABS_ERROR {
            converged = true;
            break;
        }
        if iterations >= max_iterations {
            break;
        }
        iterations += 1;

        let mut centroid = vec![0.0; n];
        for vertex in &simplex[..n] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }
        let towards = |from: &[f64], factor: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + factor * (x - c))
                .collect()
        };

        let reflected = towards(&simplex[n], -ALPHA);
        let f_reflected = evaluate_objective(objective, &reflected);

        if f_reflected < values[0] {
            let expanded = towards(&simplex[n], -ALPHA * GAMMA);
            let f_expanded = evaluate_objective(objective, &expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
            continue;
        }
        if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
            continue;
        }

        let (contracted, limit) = if f_reflected < values[n] {
            (towards(&reflected, RHO), f_reflected)
        } else {
            (towards(&simplex[n], RHO), values[n])
        };
        let f_contracted = evaluate_objective(objective, &contracted);
        if f_contracted < limit {
            simplex[n] = contracted;
            values[n] = f_contracted;
            continue;
        }

        // shrink towards the best vertex
        let best_vertex = simplex[0].clone();
        for i in 1..=n {
            simplex[i] = best_vertex
                .iter()
                .zip(&simplex[i])
                .map(|(b, x)| b + SIGMA * (x - b))
                .collect();
            values[i] = evaluate_objective(objective, &simplex[i]);
        }
    }

    Minimum {
        params: simplex.swap_remove(0),
        value: values[0],
        iterations,
        restarts: 0,
        converged,
    }
}

/// Minimizes `objective` starting at `start`.
///
/// `steps` sets the size of the initial simplex along each parameter and the
/// scale of the random perturbation applied before each restart. The returned
/// iteration count is the total over all runs.
pub fn minimize<F: Fn(&[f64]) -> f64>(
    objective: F,
    start: &[f64],
    steps: &[f64],
    options: &FitOptions,
) -> Minimum {
    let max_relative_error = options.max_relative_error();
    let mut best = nelder_mead(
        &objective,
        start,
        steps,
        options.max_iterations,
        max_relative_error,
    );
    let mut total_iterations = best.iterations;
    let mut restarts = 0;

    let mut rng = StdRng::seed_from_u64(options.seed);
    for _ in 0..options.restarts {
        let perturbed: Vec<f64> = best
            .params
            .iter()
            .zip(steps)
            .map(|(p, s)| p + s * rng.random_range(-1.0..1.0))
            .collect();
        let candidate = nelder_mead(
            &objective,
            &perturbed,
            steps,
            options.max_iterations,
            max_relative_error,
        );
        total_iterations += candidate.iterations;
        restarts += 1;

        let agrees = (best.value - candidate.value).abs()
            <= max_relative_error * best.value.abs() + MAX_ABS_ERROR;
        if candidate.value < best.value {
            best = candidate;
        }
        if agrees && best.converged {
            break;
        }
    }

    best.iterations = total_iterations;
    best.restarts = restarts;
    best
}

fn residual_sum_squares(model: &DecayModel, series: &TimeSeries) -> f64 {
    series
        .x
        .iter()
        .zip(&series.y)
        .map(|(&x, &y)| {
            let r = model.evaluate(x) - y;
            r * r
        })
        .sum()
}

/// Fits `I(t) = a * exp(-b * t) + c` to `series`.
///
/// The initial guess takes the drop between the first and the last sample as
/// amplitude and the last sample as offset. A series whose last sample is not
/// below its first one is rejected with [`BleachError::NotDecaying`] before any
/// iteration is run.
pub fn fit_decay(series: &TimeSeries, options: &FitOptions) -> BleachResult<FitResult> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(BleachError::EmptyStack),
    };
    let guess_a = first - last;
    if guess_a <= 0.0 || !guess_a.is_finite() {
        log::error!("this sequence seems to be not decaying");
        return Err(BleachError::NotDecaying { first, last });
    }
    let guess_c = last;

    let span = match (series.x.first(), series.x.last()) {
        (Some(x0), Some(x1)) => (x1 - x0).abs().max(1.0),
        _ => 1.0,
    };
    let start = DecayModel::new(guess_a, INITIAL_RATE, guess_c).to_array();
    let steps = [
        0.1 * guess_a,
        1.0 / span,
        0.1 * guess_a.max(guess_c.abs()),
    ];

    let minimum = minimize(
        |p: &[f64]| residual_sum_squares(&DecayModel::from_slice(p), series),
        &start,
        &steps,
        options,
    );

    let model = DecayModel::from_slice(&minimum.params);
    let ssr = residual_sum_squares(&model, series);
    let mean = series.y.iter().sum::<f64>() / series.len() as f64;
    let total: f64 = series.y.iter().map(|y| (y - mean) * (y - mean)).sum();
    let r_squared = if total > 0.0 {
        1.0 - ssr / total
    } else if ssr == 0.0 {
        1.0
    } else {
        0.0
    };

    let result = FitResult {
        model,
        residual_sum_squares: ssr,
        r_squared,
        iterations: minimum.iterations,
        restarts: minimum.restarts,
        converged: minimum.converged,
        n_points: series.len(),
        options: *options,
    };
    log::info!("{}", result.result_string());
    if !result.converged {
        log::warn!(
            "decay fit stopped at the iteration limit, SSR = {:.6}",
            result.residual_sum_squares
        );
    }
    Ok(result)
}
