//! Backward algorithm: the beta lattice of suffix probabilities.

use trellis_core::{log_sum_exp, Result};

use crate::model::HmmModel;

/// Run the backward algorithm in probability space.
///
/// Returns `beta` where `beta[t][i]` is the probability of observing
/// `o_{t+1}..o_{T-1}` given state `i` at time `t`. The final row is the
/// sentinel `beta[T-1][i] = 1`, not a true probability.
///
/// # Errors
///
/// [`TrellisError::InvalidObservation`](trellis_core::TrellisError::InvalidObservation)
/// for an empty or out-of-range sequence.
pub fn backward(model: &HmmModel, observations: &[usize]) -> Result<Vec<Vec<f64>>> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let t_len = observations.len();
    let mut beta = vec![vec![1.0; n]; t_len];

    // Induction, backwards from the sentinel row
    for t in (0..t_len - 1).rev() {
        let ot1 = observations[t + 1];
        for i in 0..n {
            let mut total = 0.0;
            for j in 0..n {
                total += model.transition_prob(i, j)
                    * model.emission_prob(j, ot1)
                    * beta[t + 1][j];
            }
            beta[t][i] = total;
        }
    }

    Ok(beta)
}

/// Run the backward algorithm in log space.
///
/// The same recursion as [`backward`] with log-sum-exp accumulation; the
/// sentinel row is `ln(1) = 0`.
pub fn backward_log(model: &HmmModel, observations: &[usize]) -> Result<Vec<Vec<f64>>> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let t_len = observations.len();
    let mut beta = vec![vec![0.0; n]; t_len];

    for t in (0..t_len - 1).rev() {
        let ot1 = observations[t + 1];
        for i in 0..n {
            let mut acc = f64::NEG_INFINITY;
            for j in 0..n {
                acc = log_sum_exp(
                    acc,
                    model.transition_prob(i, j).ln()
                        + model.emission_prob(j, ot1).ln()
                        + beta[t + 1][j],
                );
            }
            beta[t][i] = acc;
        }
    }

    Ok(beta)
}

// ===========================================================================
// Tests
// ===========================================================================
