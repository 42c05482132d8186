//! Shared primitives for the trellis HMM workspace.
//!
//! `trellis-core` provides the foundation the engine crate builds on:
//!
//! - **Error types** — [`TrellisError`] and [`Result`] for structured error handling
//! - **Log-space arithmetic** — [`log_sum_exp`] and friends for underflow-free accumulation
//! - **Traits** — [`Summarizable`] one-line summaries for display at the boundary

pub mod error;
pub mod prob;
pub mod traits;

pub use error::{Result, TrellisError};
pub use prob::{log_sum_exp, log_sum_exp_slice};
pub use traits::Summarizable;
