//! Forward algorithm: sequence likelihood and the alpha lattice.

use trellis_core::{log_sum_exp, log_sum_exp_slice, Result, TrellisError};

use crate::model::HmmModel;

/// Run the forward algorithm in probability space.
///
/// Returns `(alpha, likelihood)` where `alpha[t][i]` is the joint
/// probability of observing `o_0..=o_t` and being in state `i` at time `t`,
/// and `likelihood` is the total probability of the sequence under the
/// model.
///
/// Probability-space products underflow on long sequences; use
/// [`forward_log`] there.
///
/// # Errors
///
/// [`TrellisError::InvalidObservation`] for an empty or out-of-range
/// sequence; [`TrellisError::DegenerateModel`] if the likelihood is zero or
/// not finite (every path through the model is impossible).
pub fn forward(model: &HmmModel, observations: &[usize]) -> Result<(Vec<Vec<f64>>, f64)> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let t_len = observations.len();
    let mut alpha = vec![vec![0.0; n]; t_len];

    // Initialization: alpha[0][i] = pi[i] * B[i][o_0]
    let o0 = observations[0];
    for i in 0..n {
        alpha[0][i] = model.initial_prob(i) * model.emission_prob(i, o0);
    }

    // Induction
    for t in 1..t_len {
        let ot = observations[t];
        for j in 0..n {
            let mut total = 0.0;
            for i in 0..n {
                total += alpha[t - 1][i] * model.transition_prob(i, j);
            }
            alpha[t][j] = total * model.emission_prob(j, ot);
        }
    }

    // Termination
    let likelihood: f64 = alpha[t_len - 1].iter().sum();
    if !likelihood.is_finite() || likelihood <= 0.0 {
        return Err(TrellisError::DegenerateModel(format!(
            "observation sequence has likelihood {likelihood} under the model"
        )));
    }

    Ok((alpha, likelihood))
}

/// Run the forward algorithm in log space.
///
/// The same recursion as [`forward`] with products as sums and sums as
/// log-sum-exp. Returns `(log_alpha, log_likelihood)`; impossible
/// prefix/state combinations appear as `f64::NEG_INFINITY` in the lattice.
///
/// # Errors
///
/// Same conditions as [`forward`]; a zero-probability sequence surfaces as
/// a log-likelihood of negative infinity.
pub fn forward_log(model: &HmmModel, observations: &[usize]) -> Result<(Vec<Vec<f64>>, f64)> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let t_len = observations.len();
    let mut alpha = vec![vec![f64::NEG_INFINITY; n]; t_len];

    let o0 = observations[0];
    for i in 0..n {
        alpha[0][i] = model.initial_prob(i).ln() + model.emission_prob(i, o0).ln();
    }

    for t in 1..t_len {
        let ot = observations[t];
        for j in 0..n {
            let mut acc = f64::NEG_INFINITY;
            for i in 0..n {
                acc = log_sum_exp(acc, alpha[t - 1][i] + model.transition_prob(i, j).ln());
            }
            alpha[t][j] = acc + model.emission_prob(j, ot).ln();
        }
    }

    let ll = log_sum_exp_slice(&alpha[t_len - 1]);
    if !ll.is_finite() {
        return Err(TrellisError::DegenerateModel(format!(
            "observation sequence has log-likelihood {ll} under the model"
        )));
    }

    Ok((alpha, ll))
}

/// Compute the likelihood of an observation sequence.
///
/// Convenience wrapper around [`forward`].
pub fn likelihood(model: &HmmModel, observations: &[usize]) -> Result<f64> {
    let (_, p) = forward(model, observations)?;
    Ok(p)
}

/// Compute the log-likelihood of an observation sequence.
///
/// Convenience wrapper around [`forward_log`].
pub fn log_likelihood(model: &HmmModel, observations: &[usize]) -> Result<f64> {
    let (_, ll) = forward_log(model, observations)?;
    Ok(ll)
}

// ===========================================================================
// Tests
// ===========================================================================
