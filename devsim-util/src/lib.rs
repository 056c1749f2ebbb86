//! Helper surface for devsim model authors.
//!
//! This crate complements the `devsim` kernel with conveniences that example
//! models and benches tend to need:
//!
//! * the [`random`] module provides seedable factories of random-draw
//!   closures (uniform, uniform integer, Poisson, exponential),
//! * the [`models`] module provides reusable atomic-model factories for
//!   bench assembly.

#![warn(missing_docs, unreachable_pub)]

pub mod models;
pub mod random;
