use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::potential::{calculate_potential_difference, par_calculate_potential_difference};
use crate::config::SolverConfig;
use crate::error::FlowError;
use crate::network::{FlowMatrix, Network};

const SHRINK_TARGET: f64 = 0.8;
const GROWTH_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Serialize)]
pub struct IterationInfo {
    pub iteration: usize,
    /// Step coefficient carried into the next iteration.
    pub beta: f64,
    pub omega: f64,
    pub shrinks: usize,
    pub max_potential_difference: f64,
    pub elapsed_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    Converged,
    /// The iteration budget ran out first. A normal outcome, not an error.
    Exhausted,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Converged => "Converged",
            Termination::Exhausted => "Exhausted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub flow: FlowMatrix,
    /// Iteration at which convergence was detected, or `max_iterations` when exhausted.
    pub iterations: usize,
    pub termination: Termination,
    pub beta: f64,
    pub history: Vec<IterationInfo>,
    /// Wall time of the whole run, final convergence check included.
    pub elapsed_time: Duration,
}

impl Solution {
    pub fn is_converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Accepted flow of one iteration step together with the adapted step coefficient.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub flow: FlowMatrix,
    pub beta: f64,
    pub omega: f64,
    pub shrinks: usize,
}

/// Stability ratio `beta * |pd - pd'| / |f - f'|` between a flow and a candidate.
///
/// Returns `None` when the two flows are identical.
pub fn stability_ratio(
    beta: f64,
    current_flow: ArrayView2<f64>,
    current_potential_difference: ArrayView2<f64>,
    candidate_flow: ArrayView2<f64>,
    candidate_potential_difference: ArrayView2<f64>,
) -> Option<f64> {
    let numerator = Zip::from(current_potential_difference)
        .and(candidate_potential_difference)
        .fold(0.0, |acc, &old, &new| acc + (old - new).powi(2));
    let denominator = Zip::from(current_flow)
        .and(candidate_flow)
        .fold(0.0, |acc, &old, &new| acc + (old - new).powi(2));
    if denominator == 0.0 {
        return None;
    }
    Some(beta * numerator.sqrt() / denominator.sqrt())
}

/// Largest potential difference, or negative infinity when there are no (edge, commodity) pairs.
pub fn max_potential_difference(potential_difference: ArrayView2<f64>) -> f64 {
    potential_difference
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// True iff every potential difference is at most `tolerance`.
/// Large negative values do not block convergence.
pub fn is_converged(
    network: &Network,
    flow: &FlowMatrix,
    tolerance: f64,
) -> Result<bool, FlowError> {
    network.validate_flow(flow)?;
    let potential_difference = calculate_potential_difference(network, flow.view());
    Ok(potential_difference.iter().all(|&pd| pd <= tolerance))
}

fn potential_difference(network: &Network, flow: ArrayView2<f64>, parallel: bool) -> Array2<f64> {
    if parallel {
        par_calculate_potential_difference(network, flow)
    } else {
        calculate_potential_difference(network, flow)
    }
}

fn candidate_flow(
    flow: ArrayView2<f64>,
    potential_difference: ArrayView2<f64>,
    beta: f64,
    parallel: bool,
) -> Array2<f64> {
    let zip = Zip::from(flow).and(potential_difference);
    if parallel {
        zip.par_map_collect(|&f, &pd| (f + beta * pd).max(0.0))
    } else {
        zip.map_collect(|&f, &pd| (f + beta * pd).max(0.0))
    }
}

fn checked_omega(
    beta: f64,
    flow: ArrayView2<f64>,
    potential_difference: ArrayView2<f64>,
    candidate: ArrayView2<f64>,
    candidate_potential_difference: ArrayView2<f64>,
) -> Result<f64, FlowError> {
    match stability_ratio(
        beta,
        flow,
        potential_difference,
        candidate,
        candidate_potential_difference,
    ) {
        // No movement at all: nothing can overshoot.
        None => Ok(0.0),
        Some(omega) if omega.is_finite() => Ok(omega),
        Some(_) => Err(FlowError::NonFiniteStability { beta }),
    }
}

fn step_from_potential(
    network: &Network,
    flow: ArrayView2<f64>,
    current_potential_difference: ArrayView2<f64>,
    beta: f64,
    config: &SolverConfig,
) -> Result<StepResult, FlowError> {
    let shrink_target = if config.nu > SHRINK_TARGET {
        SHRINK_TARGET
    } else {
        SHRINK_TARGET * config.nu
    };

    let mut beta = beta;
    let mut candidate = candidate_flow(flow, current_potential_difference, beta, config.parallel);
    let mut candidate_potential_difference =
        potential_difference(network, candidate.view(), config.parallel);
    let mut omega = checked_omega(
        beta,
        flow,
        current_potential_difference,
        candidate.view(),
        candidate_potential_difference.view(),
    )?;

    let mut shrinks = 0;
    while omega > config.nu {
        if shrinks >= config.max_shrink_attempts {
            return Err(FlowError::StepSizeStalled {
                attempts: shrinks,
                omega,
            });
        }
        beta *= shrink_target / omega;
        shrinks += 1;
        trace!(shrinks, beta, omega, "Shrinking step coefficient");

        candidate = candidate_flow(flow, current_potential_difference, beta, config.parallel);
        candidate_potential_difference =
            potential_difference(network, candidate.view(), config.parallel);
        omega = checked_omega(
            beta,
            flow,
            current_potential_difference,
            candidate.view(),
            candidate_potential_difference.view(),
        )?;
    }

    if omega <= config.mu {
        beta *= GROWTH_FACTOR;
    }

    Ok(StepResult {
        flow: candidate,
        beta,
        omega,
        shrinks,
    })
}

/// A single iteration of the localized multicommodity flow algorithm.
///
/// Moves every (edge, commodity) flow along its potential difference scaled by
/// `beta`, clamped at zero. While the stability ratio exceeds `config.nu` the
/// step coefficient is shrunk and the candidate recomputed; once the ratio is
/// at most `config.mu` the coefficient grows by 1.5 for the next call.
pub fn iterate_localized_mcf(
    network: &Network,
    flow: &FlowMatrix,
    beta: f64,
    config: &SolverConfig,
) -> Result<StepResult, FlowError> {
    network.validate_flow(flow)?;
    let current = potential_difference(network, flow.view(), config.parallel);
    step_from_potential(network, flow.view(), current.view(), beta, config)
}

/// The localized multicommodity flow algorithm.
///
/// Iterates from `initial_flow` until every potential difference is at most
/// `config.tolerance` or `config.max_iterations` steps have been taken.
pub fn localized_mcf(
    network: &Network,
    initial_flow: FlowMatrix,
    config: &SolverConfig,
) -> Result<Solution, FlowError> {
    config.validate()?;
    network.validate_flow(&initial_flow)?;

    let mut flow = initial_flow;
    let mut beta = config.initial_beta;
    let mut history: Vec<IterationInfo> = Vec::new();
    let start_time = Instant::now();

    for iteration in 0..config.max_iterations {
        let current = potential_difference(network, flow.view(), config.parallel);
        let max_pd = max_potential_difference(current.view());

        if current.iter().all(|&pd| pd <= config.tolerance) {
            info!(
                iteration,
                beta,
                elapsed = ?start_time.elapsed(),
                "Localized flow converged"
            );
            return Ok(Solution {
                flow,
                iterations: iteration,
                termination: Termination::Converged,
                beta,
                history,
                elapsed_time: start_time.elapsed(),
            });
        }

        let step = step_from_potential(network, flow.view(), current.view(), beta, config)?;
        let elapsed_time = start_time.elapsed();
        debug!(
            iteration,
            beta = step.beta,
            omega = step.omega,
            shrinks = step.shrinks,
            max_potential_difference = max_pd,
            "Localized flow iteration"
        );
        history.push(IterationInfo {
            iteration,
            beta: step.beta,
            omega: step.omega,
            shrinks: step.shrinks,
            max_potential_difference: max_pd,
            elapsed_time,
        });

        flow = step.flow;
        beta = step.beta;
    }

    warn!(
        max_iterations = config.max_iterations,
        beta,
        elapsed = ?start_time.elapsed(),
        "Localized flow exhausted its iteration budget"
    );
    Ok(Solution {
        flow,
        iterations: config.max_iterations,
        termination: Termination::Exhausted,
        beta,
        history,
        elapsed_time: start_time.elapsed(),
    })
}

/// Runs independent instances on the rayon pool. Results keep the input order.
pub fn par_localized_mcf_batch(
    instances: &[(Network, FlowMatrix)],
    config: &SolverConfig,
) -> Vec<Result<Solution, FlowError>> {
    instances
        .par_iter()
        .map(|(network, flow)| localized_mcf(network, flow.clone(), config))
        .collect()
}
