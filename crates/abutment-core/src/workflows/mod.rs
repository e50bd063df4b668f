//! # Workflows Module
//!
//! Top-level entry points of the abutment engine. Each workflow validates its inputs,
//! drives the engine components in order, reports progress and returns typed results
//! together with any recoverable warnings.
//!
//! ## Architecture
//!
//! - **Planning** ([`plan`]) - `plan_junction` lays out both frames, builds every
//!   junction's shells and orders the optimizations; `run_plan` executes that order.
//! - **Feathering** ([`bands`]) - `resolve_dose_bands` cuts the planned dose into
//!   disjoint bands inside each shell.
//! - **Aggregation** ([`aggregate`]) - `aggregate_dose` sums both frames' doses in the
//!   primary frame.
//!
//! The workflows are meant to run in that order, but each one only depends on the state
//! already held by the frames and the backend, so any of them can be rerun on its own.

pub mod aggregate;
pub mod bands;
pub mod plan;
