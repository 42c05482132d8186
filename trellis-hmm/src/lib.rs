//! Discrete Hidden Markov Model inference and learning.
//!
//! `trellis-hmm` implements the classical HMM toolkit over dense,
//! index-based parameter matrices:
//!
//! - **Forward / Backward** — sequence likelihood and the partial-probability
//!   lattices, in probability space or log space
//! - **Viterbi** — the single most probable hidden-state path
//! - **Baum-Welch** — unsupervised parameter re-estimation with a
//!   per-iteration likelihood trace
//! - **Vocabulary** — a symbolic name ↔ dense index layer for the API boundary
//!
//! # Quick start
//!
//! ```
//! use trellis_hmm::{viterbi, HmmModel};
//!
//! // Rainy/Sunny weather model over Walk/Shop/Clean observations.
//! let model = HmmModel::new(
//!     2,
//!     3,
//!     vec![0.6, 0.4],
//!     vec![
//!         0.7, 0.3, // Rainy -> Rainy, Sunny
//!         0.4, 0.6, // Sunny -> Rainy, Sunny
//!     ],
//!     vec![
//!         0.1, 0.4, 0.5, // Rainy: Walk, Shop, Clean
//!         0.6, 0.3, 0.1, // Sunny: Walk, Shop, Clean
//!     ],
//! )
//! .unwrap();
//!
//! let path = viterbi(&model, &[0, 1, 2]).unwrap();
//! assert_eq!(path.states, vec![1, 0, 0]); // Sunny, Rainy, Rainy
//! ```

pub mod backward;
pub mod forward;
pub mod model;
pub mod train;
pub mod viterbi;
pub mod vocab;

pub use backward::{backward, backward_log};
pub use forward::{forward, forward_log, likelihood, log_likelihood};
pub use model::HmmModel;
pub use train::{posteriors, train_baum_welch, Posteriors, TrainConfig, TrainOutcome};
pub use viterbi::{viterbi, ViterbiPath};
pub use vocab::Vocabulary;

pub use trellis_core::{Result, Summarizable, TrellisError};
