//! # Core Models Module
//!
//! Plain data structures describing a two-frame abutment plan.
//!
//! ## Key Components
//!
//! - [`frame`] - Patient orientation and the frame that owns a region/point namespace
//! - [`isocenter`] - Field isocenters and their neighbour links
//! - [`junction`] - Junctions, their graduated shells and post-optimization dose bands
//! - [`job`] - Per-field optimization jobs and their status
//! - [`dose`] - Dose handles, voxel dose volumes and cross-frame evaluations
//! - [`ids`] - Arena keys for namespace entries

pub mod dose;
pub mod frame;
pub mod ids;
pub mod isocenter;
pub mod job;
pub mod junction;
