//! Viterbi decoding: the single most probable hidden-state path.

use trellis_core::{Result, Summarizable};

use crate::model::HmmModel;

/// The decoded state path and its probability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViterbiPath {
    /// Most probable state at each time step, length T.
    pub states: Vec<usize>,
    /// Probability of this path jointly with the observations.
    pub probability: f64,
}

impl Summarizable for ViterbiPath {
    fn summary(&self) -> String {
        format!(
            "Viterbi path: {} steps, probability {:.6e}",
            self.states.len(),
            self.probability
        )
    }
}

/// Find the most likely state sequence for an observation sequence.
///
/// Maintains, per state and time step, the probability of the best path
/// ending in that state (delta) and a back-pointer to its predecessor, then
/// reconstructs the path from the best final state. When several
/// predecessors reach the same maximal probability, the lowest state index
/// wins, so identical inputs always decode to the identical path.
///
/// A path probability of exactly 0 means no state sequence explains the
/// observations; the returned path is then just the tie-break chain and
/// carries no information.
///
/// # Errors
///
/// [`TrellisError::InvalidObservation`](trellis_core::TrellisError::InvalidObservation)
/// for an empty or out-of-range sequence.
pub fn viterbi(model: &HmmModel, observations: &[usize]) -> Result<ViterbiPath> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let t_len = observations.len();

    let mut delta = vec![vec![0.0; n]; t_len];
    let mut psi = vec![vec![0usize; n]; t_len];

    // Initialization
    let o0 = observations[0];
    for i in 0..n {
        delta[0][i] = model.initial_prob(i) * model.emission_prob(i, o0);
    }

    // Recursion; strict > keeps the first (lowest-index) argmax on ties
    for t in 1..t_len {
        let ot = observations[t];
        for j in 0..n {
            let mut best_val = delta[t - 1][0] * model.transition_prob(0, j);
            let mut best_state = 0;
            for i in 1..n {
                let v = delta[t - 1][i] * model.transition_prob(i, j);
                if v > best_val {
                    best_val = v;
                    best_state = i;
                }
            }
            delta[t][j] = best_val * model.emission_prob(j, ot);
            psi[t][j] = best_state;
        }
    }

    // Termination: best final state, same tie-break
    let mut best_final = 0usize;
    let mut best_prob = delta[t_len - 1][0];
    for i in 1..n {
        if delta[t_len - 1][i] > best_prob {
            best_prob = delta[t_len - 1][i];
            best_final = i;
        }
    }

    // Backtrack
    let mut states = vec![0usize; t_len];
    states[t_len - 1] = best_final;
    for t in (0..t_len - 1).rev() {
        states[t] = psi[t + 1][states[t + 1]];
    }

    Ok(ViterbiPath {
        states,
        probability: best_prob,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
