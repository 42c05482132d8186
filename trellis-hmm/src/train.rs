//! Baum-Welch training: posterior responsibilities and parameter
//! re-estimation.
//!
//! Each iteration runs Forward and Backward on the current model (E-step),
//! converts the lattices into state responsibilities (gamma) and transition
//! responsibilities (xi), then rebuilds the three distributions from those
//! responsibilities alone (M-step). The model is replaced wholesale per
//! iteration; nothing is updated in place.

use trellis_core::{log_sum_exp_slice, Result, Summarizable, TrellisError};

use crate::backward::{backward, backward_log};
use crate::forward::{forward, forward_log};
use crate::model::HmmModel;

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Configuration for Baum-Welch training.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainConfig {
    /// Number of E-step/M-step iterations to run.
    pub iterations: usize,
    /// Opt-in early stop: halt once the relative likelihood improvement
    /// between consecutive iterations falls below this threshold. `None`
    /// always runs the full iteration count, which keeps the trace length
    /// predictable for convergence plots.
    pub tolerance: Option<f64>,
    /// Run the E-step over log-space lattices. Unlike the default
    /// probability-space E-step this survives long sequences, and the
    /// trace then records log-likelihoods.
    pub log_space: bool,
    /// Opt-in pseudo-count added to every M-step numerator cell, with the
    /// row renormalized afterwards. `None` means a zero denominator is a
    /// [`TrellisError::DegenerateModel`] failure.
    pub smoothing: Option<f64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: None,
            log_space: false,
            smoothing: None,
        }
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainOutcome {
    /// The model produced by the final M-step.
    pub model: HmmModel,
    /// Per-iteration scores, each computed from the model *before* that
    /// iteration's update; entry 0 scores the starting model. Plain
    /// likelihoods by default, log-likelihoods when
    /// [`TrainConfig::log_space`] is set.
    pub trace: Vec<f64>,
}

impl Summarizable for TrainOutcome {
    fn summary(&self) -> String {
        let first = self.trace.first().copied().unwrap_or(f64::NAN);
        let last = self.trace.last().copied().unwrap_or(f64::NAN);
        format!(
            "Baum-Welch: {} iterations, score {first:.6e} -> {last:.6e}",
            self.trace.len()
        )
    }
}

/// One E-step's responsibility lattices.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Posteriors {
    /// `gamma[t][i]` — posterior probability of state `i` at time `t` given
    /// the full sequence. Each row sums to 1.
    pub gamma: Vec<Vec<f64>>,
    /// `xi[t]` — flat row-major N×N slice; `xi[t][i*N + j]` is the posterior
    /// probability of the transition `i -> j` at time `t`. Each slice sums
    /// to 1, and there are `T - 1` slices.
    pub xi: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// E-step: gamma and xi
// ---------------------------------------------------------------------------

fn gamma_row(alpha_t: &[f64], beta_t: &[f64], t: usize) -> Result<Vec<f64>> {
    let denom: f64 = alpha_t.iter().zip(beta_t).map(|(a, b)| a * b).sum();
    if !denom.is_finite() || denom <= 0.0 {
        return Err(TrellisError::DegenerateModel(format!(
            "state posterior denominator at time {t} is {denom}"
        )));
    }
    Ok(alpha_t
        .iter()
        .zip(beta_t)
        .map(|(a, b)| a * b / denom)
        .collect())
}

fn compute_gamma(alpha: &[Vec<f64>], beta: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    #[cfg(feature = "parallel")]
    let rows = {
        use rayon::prelude::*;
        (0..alpha.len())
            .into_par_iter()
            .map(|t| gamma_row(&alpha[t], &beta[t], t))
            .collect::<Result<Vec<_>>>()
    };
    #[cfg(not(feature = "parallel"))]
    let rows = (0..alpha.len())
        .map(|t| gamma_row(&alpha[t], &beta[t], t))
        .collect::<Result<Vec<_>>>();
    rows
}

fn xi_slice(
    model: &HmmModel,
    observations: &[usize],
    alpha: &[Vec<f64>],
    beta: &[Vec<f64>],
    t: usize,
) -> Result<Vec<f64>> {
    let n = model.n_states();
    let ot1 = observations[t + 1];
    let mut slice = vec![0.0; n * n];
    let mut denom = 0.0;
    for i in 0..n {
        for j in 0..n {
            let v = alpha[t][i]
                * model.transition_prob(i, j)
                * model.emission_prob(j, ot1)
                * beta[t + 1][j];
            slice[i * n + j] = v;
            denom += v;
        }
    }
    if !denom.is_finite() || denom <= 0.0 {
        return Err(TrellisError::DegenerateModel(format!(
            "transition posterior denominator at time {t} is {denom}"
        )));
    }
    for v in &mut slice {
        *v /= denom;
    }
    Ok(slice)
}

fn compute_xi(
    model: &HmmModel,
    observations: &[usize],
    alpha: &[Vec<f64>],
    beta: &[Vec<f64>],
) -> Result<Vec<Vec<f64>>> {
    let steps = observations.len() - 1;
    #[cfg(feature = "parallel")]
    let slices = {
        use rayon::prelude::*;
        (0..steps)
            .into_par_iter()
            .map(|t| xi_slice(model, observations, alpha, beta, t))
            .collect::<Result<Vec<_>>>()
    };
    #[cfg(not(feature = "parallel"))]
    let slices = (0..steps)
        .map(|t| xi_slice(model, observations, alpha, beta, t))
        .collect::<Result<Vec<_>>>();
    slices
}

fn gamma_row_log(log_alpha_t: &[f64], log_beta_t: &[f64], t: usize) -> Result<Vec<f64>> {
    let terms: Vec<f64> = log_alpha_t
        .iter()
        .zip(log_beta_t)
        .map(|(a, b)| a + b)
        .collect();
    let denom = log_sum_exp_slice(&terms);
    if denom == f64::NEG_INFINITY {
        return Err(TrellisError::DegenerateModel(format!(
            "state posterior denominator at time {t} is zero"
        )));
    }
    Ok(terms.iter().map(|&x| (x - denom).exp()).collect())
}

fn xi_slice_log(
    model: &HmmModel,
    observations: &[usize],
    log_alpha: &[Vec<f64>],
    log_beta: &[Vec<f64>],
    t: usize,
) -> Result<Vec<f64>> {
    let n = model.n_states();
    let ot1 = observations[t + 1];
    let mut slice = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            slice[i * n + j] = log_alpha[t][i]
                + model.transition_prob(i, j).ln()
                + model.emission_prob(j, ot1).ln()
                + log_beta[t + 1][j];
        }
    }
    let denom = log_sum_exp_slice(&slice);
    if denom == f64::NEG_INFINITY {
        return Err(TrellisError::DegenerateModel(format!(
            "transition posterior denominator at time {t} is zero"
        )));
    }
    for v in &mut slice {
        *v = (*v - denom).exp();
    }
    Ok(slice)
}

/// Responsibilities in probability space plus the iteration's score.
fn e_step(model: &HmmModel, observations: &[usize]) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>, f64)> {
    let (alpha, p) = forward(model, observations)?;
    let beta = backward(model, observations)?;
    let gamma = compute_gamma(&alpha, &beta)?;
    let xi = compute_xi(model, observations, &alpha, &beta)?;
    Ok((gamma, xi, p))
}

/// Log-space E-step; responsibilities come back in probability space, the
/// score is the log-likelihood.
fn e_step_log(
    model: &HmmModel,
    observations: &[usize],
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>, f64)> {
    let (log_alpha, ll) = forward_log(model, observations)?;
    let log_beta = backward_log(model, observations)?;
    let gamma = (0..log_alpha.len())
        .map(|t| gamma_row_log(&log_alpha[t], &log_beta[t], t))
        .collect::<Result<Vec<_>>>()?;
    let xi = (0..observations.len() - 1)
        .map(|t| xi_slice_log(model, observations, &log_alpha, &log_beta, t))
        .collect::<Result<Vec<_>>>()?;
    Ok((gamma, xi, ll))
}

/// Compute one E-step's responsibility lattices for the given model.
///
/// This is the smoothed state-occupancy output callers can display or feed
/// into their own estimators; training does not require calling it.
/// Runs in probability space.
///
/// # Errors
///
/// Same conditions as [`forward`], plus
/// [`TrellisError::DegenerateModel`] if a normalization denominator
/// collapses to zero.
pub fn posteriors(model: &HmmModel, observations: &[usize]) -> Result<Posteriors> {
    let (gamma, xi, _) = e_step(model, observations)?;
    Ok(Posteriors { gamma, xi })
}

// ---------------------------------------------------------------------------
// M-step
// ---------------------------------------------------------------------------

fn normalize_row(
    row: &mut [f64],
    denominator: f64,
    smoothing: Option<f64>,
    context: impl FnOnce() -> String,
) -> Result<()> {
    match smoothing {
        None => {
            if !denominator.is_finite() || denominator <= 0.0 {
                return Err(TrellisError::DegenerateModel(context()));
            }
            for v in row.iter_mut() {
                *v /= denominator;
            }
        }
        Some(eps) => {
            for v in row.iter_mut() {
                *v += eps;
            }
            let total: f64 = row.iter().sum();
            for v in row.iter_mut() {
                *v /= total;
            }
        }
    }
    Ok(())
}

/// Rebuild the three distributions from gamma/xi.
fn reestimate(
    model: &HmmModel,
    observations: &[usize],
    gamma: &[Vec<f64>],
    xi: &[Vec<f64>],
    smoothing: Option<f64>,
) -> Result<HmmModel> {
    let n = model.n_states();
    let m = model.n_symbols();
    let t_len = observations.len();

    // pi'[i] = gamma[0][i]
    let initial = gamma[0].clone();

    // A'[i][j] = sum_t xi[t][i][j] / sum_{t <= T-2} gamma[t][i]
    let mut transition = vec![0.0; n * n];
    for i in 0..n {
        let mut row: Vec<f64> = (0..n)
            .map(|j| xi.iter().map(|slice| slice[i * n + j]).sum())
            .collect();
        let occupancy: f64 = gamma[..t_len - 1].iter().map(|g| g[i]).sum();
        normalize_row(&mut row, occupancy, smoothing, || {
            format!("state {i} has zero expected occupancy over transition steps")
        })?;
        transition[i * n..(i + 1) * n].copy_from_slice(&row);
    }

    // B'[s][k] = sum_{t: o_t = k} gamma[t][s] / sum_t gamma[t][s]
    let mut emission = vec![0.0; n * m];
    for s in 0..n {
        let mut row = vec![0.0; m];
        for (t, &o) in observations.iter().enumerate() {
            row[o] += gamma[t][s];
        }
        let occupancy: f64 = gamma.iter().map(|g| g[s]).sum();
        normalize_row(&mut row, occupancy, smoothing, || {
            format!("state {s} has zero expected occupancy")
        })?;
        emission[s * m..(s + 1) * m].copy_from_slice(&row);
    }

    Ok(HmmModel::from_parts(n, m, initial, transition, emission))
}

// ---------------------------------------------------------------------------
// Trainer loop
// ---------------------------------------------------------------------------

/// Train HMM parameters on an observation sequence with Baum-Welch.
///
/// Runs `config.iterations` E-step/M-step rounds starting from `model`,
/// producing a fresh model per round; the starting model is not modified.
/// Returns the final model together with the per-iteration score trace
/// (see [`TrainOutcome::trace`]).
///
/// # Errors
///
/// [`TrellisError::InvalidInput`] for a zero iteration count, a negative
/// tolerance, or a non-positive smoothing value;
/// [`TrellisError::InvalidObservation`] and
/// [`TrellisError::DegenerateModel`] as in [`forward`] and the E/M steps.
pub fn train_baum_welch(
    model: &HmmModel,
    observations: &[usize],
    config: &TrainConfig,
) -> Result<TrainOutcome> {
    model.validate_observations(observations)?;
    if config.iterations == 0 {
        return Err(TrellisError::InvalidInput("iterations must be > 0".into()));
    }
    if let Some(tol) = config.tolerance {
        if !tol.is_finite() || tol < 0.0 {
            return Err(TrellisError::InvalidInput(format!(
                "tolerance must be finite and non-negative, got {tol}"
            )));
        }
    }
    if let Some(eps) = config.smoothing {
        if !eps.is_finite() || eps <= 0.0 {
            return Err(TrellisError::InvalidInput(format!(
                "smoothing must be finite and positive, got {eps}"
            )));
        }
    }

    let mut current = model.clone();
    let mut trace: Vec<f64> = Vec::with_capacity(config.iterations);

    for _ in 0..config.iterations {
        let (gamma, xi, score) = if config.log_space {
            e_step_log(&current, observations)?
        } else {
            e_step(&current, observations)?
        };

        let converged = match (config.tolerance, trace.last()) {
            (Some(tol), Some(&prev)) => (score - prev).abs() <= tol * f64::abs(prev),
            _ => false,
        };
        trace.push(score);
        if converged {
            break;
        }

        current = reestimate(&current, observations, &gamma, &xi, config.smoothing)?;
    }

    Ok(TrainOutcome {
        model: current,
        trace,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::likelihood;

    const TOL: f64 = 1e-9;

    /// Helper: the Rainy/Sunny weather model.
    fn weather_hmm() -> HmmModel {
        HmmModel::new(
            2,
            3,
            vec![0.6, 0.4],
            vec![0.7, 0.3, 0.4, 0.6],
            vec![0.1, 0.4, 0.5, 0.6, 0.3, 0.1],
        )
        .unwrap()
    }

    /// The original ten-day observation record over Walk/Shop/Clean.
    fn weather_obs() -> Vec<usize> {
        vec![0, 1, 2, 0, 0, 1, 2, 0, 1, 2]
    }

    fn assert_stochastic(model: &HmmModel) {
        let pi_sum: f64 = model.initial().iter().sum();
        assert!((pi_sum - 1.0).abs() < TOL, "pi sums to {pi_sum}");
        for i in 0..model.n_states() {
            let a_sum: f64 = (0..model.n_states())
                .map(|j| model.transition_prob(i, j))
                .sum();
            assert!((a_sum - 1.0).abs() < TOL, "A row {i} sums to {a_sum}");
            let b_sum: f64 = (0..model.n_symbols())
                .map(|k| model.emission_prob(i, k))
                .sum();
            assert!((b_sum - 1.0).abs() < TOL, "B row {i} sums to {b_sum}");
        }
    }

    #[test]
    fn posterior_rows_and_slices_sum_to_one() {
        let model = weather_hmm();
        let obs = weather_obs();
        let post = posteriors(&model, &obs).unwrap();

        assert_eq!(post.gamma.len(), obs.len());
        for (t, row) in post.gamma.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < TOL, "gamma row {t} sums to {sum}");
        }

        assert_eq!(post.xi.len(), obs.len() - 1);
        for (t, slice) in post.xi.iter().enumerate() {
            let sum: f64 = slice.iter().sum();
            assert!((sum - 1.0).abs() < TOL, "xi slice {t} sums to {sum}");
        }
    }

    #[test]
    fn gamma_marginalizes_xi() {
        // Summing a xi slice over destination states recovers gamma at t.
        let model = weather_hmm();
        let obs = weather_obs();
        let post = posteriors(&model, &obs).unwrap();
        let n = model.n_states();

        for t in 0..obs.len() - 1 {
            for i in 0..n {
                let from_xi: f64 = (0..n).map(|j| post.xi[t][i * n + j]).sum();
                assert!((from_xi - post.gamma[t][i]).abs() < TOL);
            }
        }
    }

    #[test]
    fn trace_starts_at_initial_likelihood_and_never_decreases() {
        let model = weather_hmm();
        let obs = weather_obs();
        let outcome = train_baum_welch(&model, &obs, &TrainConfig::default()).unwrap();

        assert_eq!(outcome.trace.len(), 10);
        let initial = likelihood(&model, &obs).unwrap();
        assert!((outcome.trace[0] - initial).abs() < TOL);

        for w in outcome.trace.windows(2) {
            assert!(
                w[1] >= w[0] * (1.0 - 1e-9),
                "likelihood decreased: {} -> {}",
                w[0],
                w[1]
            );
        }
        // Ten iterations on this data must actually improve the fit.
        assert!(outcome.trace[9] > outcome.trace[0]);
    }

    #[test]
    fn training_does_not_mutate_the_input_model() {
        let model = weather_hmm();
        let obs = weather_obs();
        let before = model.clone();
        let _ = train_baum_welch(&model, &obs, &TrainConfig::default()).unwrap();
        assert_eq!(model.initial(), before.initial());
        assert_eq!(model.transition(), before.transition());
        assert_eq!(model.emission(), before.emission());
    }

    #[test]
    fn trained_model_stays_stochastic() {
        let model = weather_hmm();
        let outcome = train_baum_welch(&model, &weather_obs(), &TrainConfig::default()).unwrap();
        assert_stochastic(&outcome.model);

        let random = HmmModel::random(3, 4, 2024).unwrap();
        let obs = [0, 2, 1, 3, 3, 0, 1, 2, 2, 0, 3, 1];
        let outcome = train_baum_welch(&random, &obs, &TrainConfig::default()).unwrap();
        assert_stochastic(&outcome.model);
    }

    #[test]
    fn log_space_training_matches_probability_space() {
        let model = weather_hmm();
        let obs = weather_obs();
        let config = TrainConfig {
            iterations: 5,
            ..TrainConfig::default()
        };
        let prob = train_baum_welch(&model, &obs, &config).unwrap();
        let log = train_baum_welch(
            &model,
            &obs,
            &TrainConfig {
                log_space: true,
                ..config
            },
        )
        .unwrap();

        assert_eq!(prob.trace.len(), log.trace.len());
        for (p, ll) in prob.trace.iter().zip(&log.trace) {
            assert!((ll.exp() - p).abs() < 1e-12, "exp({ll}) != {p}");
        }
        for (a, b) in prob
            .model
            .transition()
            .iter()
            .zip(log.model.transition())
        {
            assert!((a - b).abs() < 1e-8);
        }
        for (a, b) in prob.model.emission().iter().zip(log.model.emission()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn early_stop_shortens_the_trace() {
        let model = weather_hmm();
        let obs = weather_obs();
        let config = TrainConfig {
            iterations: 50,
            tolerance: Some(1e9),
            ..TrainConfig::default()
        };
        let outcome = train_baum_welch(&model, &obs, &config).unwrap();
        // An absurdly loose threshold halts as soon as two scores exist.
        assert_eq!(outcome.trace.len(), 2);

        let tight = TrainConfig {
            iterations: 200,
            tolerance: Some(1e-12),
            ..TrainConfig::default()
        };
        let outcome = train_baum_welch(&model, &obs, &tight).unwrap();
        assert!(outcome.trace.len() <= 200);
        assert_stochastic(&outcome.model);
    }

    #[test]
    fn single_observation_training_is_degenerate_by_default() {
        // T = 1 leaves no transition steps, so every A-row denominator is 0.
        let model = weather_hmm();
        let err = train_baum_welch(&model, &[0], &TrainConfig::default()).unwrap_err();
        assert!(matches!(err, TrellisError::DegenerateModel(_)));

        // Smoothing turns the same run into a valid (if uninformative) model.
        let config = TrainConfig {
            smoothing: Some(1e-3),
            ..TrainConfig::default()
        };
        let outcome = train_baum_welch(&model, &[0], &config).unwrap();
        assert_stochastic(&outcome.model);
    }

    #[test]
    fn smoothing_keeps_unseen_symbols_reachable() {
        // Symbol 2 never occurs; the default M-step drives its emission to
        // exactly zero, smoothing keeps it strictly positive.
        let model = weather_hmm();
        let obs = [0, 1, 0, 1, 0, 1];

        let plain = train_baum_welch(&model, &obs, &TrainConfig::default()).unwrap();
        for s in 0..2 {
            assert_eq!(plain.model.emission_prob(s, 2), 0.0);
        }

        let config = TrainConfig {
            smoothing: Some(1e-3),
            ..TrainConfig::default()
        };
        let smoothed = train_baum_welch(&model, &obs, &config).unwrap();
        assert_stochastic(&smoothed.model);
        for s in 0..2 {
            assert!(smoothed.model.emission_prob(s, 2) > 0.0);
        }
    }

    #[test]
    fn error_on_bad_config() {
        let model = weather_hmm();
        let obs = weather_obs();

        let zero_iters = TrainConfig {
            iterations: 0,
            ..TrainConfig::default()
        };
        assert!(matches!(
            train_baum_welch(&model, &obs, &zero_iters).unwrap_err(),
            TrellisError::InvalidInput(_)
        ));

        let bad_tol = TrainConfig {
            tolerance: Some(-1.0),
            ..TrainConfig::default()
        };
        assert!(train_baum_welch(&model, &obs, &bad_tol).is_err());

        let bad_eps = TrainConfig {
            smoothing: Some(0.0),
            ..TrainConfig::default()
        };
        assert!(train_baum_welch(&model, &obs, &bad_eps).is_err());
    }

    #[test]
    fn error_on_invalid_observations() {
        let model = weather_hmm();
        assert!(train_baum_welch(&model, &[], &TrainConfig::default()).is_err());
        assert!(train_baum_welch(&model, &[0, 5], &TrainConfig::default()).is_err());
        assert!(posteriors(&model, &[]).is_err());
    }

    #[test]
    fn summary_reports_trace_endpoints() {
        let model = weather_hmm();
        let outcome = train_baum_welch(&model, &weather_obs(), &TrainConfig::default()).unwrap();
        let s = outcome.summary();
        assert!(s.contains("10 iterations"));
    }
}
