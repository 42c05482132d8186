//! HMM parameters: state/symbol counts and the three distributions.

use trellis_core::{Result, Summarizable, TrellisError};

/// Tolerance for row-stochasticity checks at construction time.
const ROW_SUM_TOL: f64 = 1e-6;

/// A discrete Hidden Markov Model.
///
/// States and observation symbols are dense indices `0..n_states` and
/// `0..n_symbols`; a [`Vocabulary`](crate::Vocabulary) can map symbolic
/// names to these indices at the boundary. Parameter matrices are stored
/// row-major as flat `Vec<f64>`.
///
/// A model is never mutated in place: training produces a fresh value per
/// re-estimation step, so independent callers can share a model freely.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HmmModel {
    /// Number of hidden states.
    n_states: usize,
    /// Number of observable symbols.
    n_symbols: usize,
    /// Initial state probabilities pi[i] (length `n_states`).
    initial: Vec<f64>,
    /// Transition matrix A[i][j] = P(state_j | state_i), size
    /// `n_states * n_states`.
    transition: Vec<f64>,
    /// Emission matrix B[i][k] = P(symbol_k | state_i), size
    /// `n_states * n_symbols`.
    emission: Vec<f64>,
}

fn validate_row(kind: &str, idx: usize, row: &[f64]) -> Result<()> {
    for (k, &p) in row.iter().enumerate() {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(TrellisError::InvalidModel(format!(
                "{kind} row {idx} entry {k} is {p}, expected a probability in [0, 1]"
            )));
        }
    }
    let sum: f64 = row.iter().sum();
    if (sum - 1.0).abs() > ROW_SUM_TOL {
        return Err(TrellisError::InvalidModel(format!(
            "{kind} row {idx} sums to {sum}, expected ~1.0"
        )));
    }
    Ok(())
}

impl HmmModel {
    /// Create a new HMM after validating dimensions and probability
    /// constraints.
    ///
    /// # Errors
    ///
    /// Returns [`TrellisError::InvalidModel`] if:
    /// - `n_states` or `n_symbols` is zero
    /// - vector dimensions do not match the declared sizes
    /// - any entry is outside `[0, 1]` or any row does not sum to
    ///   approximately 1.0
    pub fn new(
        n_states: usize,
        n_symbols: usize,
        initial: Vec<f64>,
        transition: Vec<f64>,
        emission: Vec<f64>,
    ) -> Result<Self> {
        if n_states == 0 {
            return Err(TrellisError::InvalidModel("n_states must be > 0".into()));
        }
        if n_symbols == 0 {
            return Err(TrellisError::InvalidModel("n_symbols must be > 0".into()));
        }
        if initial.len() != n_states {
            return Err(TrellisError::InvalidModel(format!(
                "initial length {} != n_states {}",
                initial.len(),
                n_states
            )));
        }
        if transition.len() != n_states * n_states {
            return Err(TrellisError::InvalidModel(format!(
                "transition length {} != n_states*n_states {}",
                transition.len(),
                n_states * n_states
            )));
        }
        if emission.len() != n_states * n_symbols {
            return Err(TrellisError::InvalidModel(format!(
                "emission length {} != n_states*n_symbols {}",
                emission.len(),
                n_states * n_symbols
            )));
        }

        validate_row("initial", 0, &initial)?;
        for i in 0..n_states {
            validate_row("transition", i, &transition[i * n_states..(i + 1) * n_states])?;
        }
        for i in 0..n_states {
            validate_row("emission", i, &emission[i * n_symbols..(i + 1) * n_symbols])?;
        }

        Ok(Self {
            n_states,
            n_symbols,
            initial,
            transition,
            emission,
        })
    }

    /// Create a model with uniform distributions: every row is `1/n`.
    ///
    /// Note that a fully uniform model is a fixed point of Baum-Welch
    /// re-estimation; use [`random`](Self::random) to break symmetry when
    /// training from scratch.
    pub fn uniform(n_states: usize, n_symbols: usize) -> Result<Self> {
        if n_states == 0 || n_symbols == 0 {
            return Err(TrellisError::InvalidModel(
                "n_states and n_symbols must be > 0".into(),
            ));
        }
        Self::new(
            n_states,
            n_symbols,
            vec![1.0 / n_states as f64; n_states],
            vec![1.0 / n_states as f64; n_states * n_states],
            vec![1.0 / n_symbols as f64; n_states * n_symbols],
        )
    }

    /// Create a model with randomized, normalized rows from a seeded
    /// generator. Identical seeds produce identical models.
    ///
    /// Every cell is strictly positive, so no path starts out impossible.
    pub fn random(n_states: usize, n_symbols: usize, seed: u64) -> Result<Self> {
        if n_states == 0 || n_symbols == 0 {
            return Err(TrellisError::InvalidModel(
                "n_states and n_symbols must be > 0".into(),
            ));
        }
        let mut rng = Xorshift64(seed.max(1));
        let mut draw_row = |len: usize| -> Vec<f64> {
            let mut row: Vec<f64> = (0..len).map(|_| 0.5 + rng.next_f64()).collect();
            let total: f64 = row.iter().sum();
            for p in &mut row {
                *p /= total;
            }
            row
        };

        let initial = draw_row(n_states);
        let mut transition = Vec::with_capacity(n_states * n_states);
        for _ in 0..n_states {
            transition.extend(draw_row(n_states));
        }
        let mut emission = Vec::with_capacity(n_states * n_symbols);
        for _ in 0..n_states {
            emission.extend(draw_row(n_symbols));
        }
        Self::new(n_states, n_symbols, initial, transition, emission)
    }

    /// Assemble a model from rows already known to be stochastic (M-step
    /// output). Skips validation.
    pub(crate) fn from_parts(
        n_states: usize,
        n_symbols: usize,
        initial: Vec<f64>,
        transition: Vec<f64>,
        emission: Vec<f64>,
    ) -> Self {
        Self {
            n_states,
            n_symbols,
            initial,
            transition,
            emission,
        }
    }

    /// Number of hidden states.
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Number of observable symbols.
    pub fn n_symbols(&self) -> usize {
        self.n_symbols
    }

    /// The initial distribution pi, length `n_states`.
    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    /// The flat row-major transition matrix, size `n_states * n_states`.
    pub fn transition(&self) -> &[f64] {
        &self.transition
    }

    /// The flat row-major emission matrix, size `n_states * n_symbols`.
    pub fn emission(&self) -> &[f64] {
        &self.emission
    }

    /// `pi[state]`.
    #[inline]
    pub fn initial_prob(&self, state: usize) -> f64 {
        self.initial[state]
    }

    /// `A[from][to]`.
    #[inline]
    pub fn transition_prob(&self, from: usize, to: usize) -> f64 {
        self.transition[from * self.n_states + to]
    }

    /// `B[state][symbol]`.
    #[inline]
    pub fn emission_prob(&self, state: usize, symbol: usize) -> f64 {
        self.emission[state * self.n_symbols + symbol]
    }

    /// Validate an observation sequence, returning an error if it is empty
    /// or contains out-of-range symbols.
    pub(crate) fn validate_observations(&self, observations: &[usize]) -> Result<()> {
        if observations.is_empty() {
            return Err(TrellisError::InvalidObservation(
                "observation sequence is empty".into(),
            ));
        }
        for (t, &o) in observations.iter().enumerate() {
            if o >= self.n_symbols {
                return Err(TrellisError::InvalidObservation(format!(
                    "observation[{t}] = {o} out of range (n_symbols = {})",
                    self.n_symbols
                )));
            }
        }
        Ok(())
    }
}

impl Summarizable for HmmModel {
    fn summary(&self) -> String {
        format!(
            "HMM: {} states over {} symbols",
            self.n_states, self.n_symbols
        )
    }
}

// ---------------------------------------------------------------------------
// Seeded RNG for random initialization
// ---------------------------------------------------------------------------

struct Xorshift64(u64);

impl Xorshift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
