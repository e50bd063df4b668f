//! # I/O Module
//!
//! Tabular reports of a computed plan, for review outside the planning system.

pub mod report;
