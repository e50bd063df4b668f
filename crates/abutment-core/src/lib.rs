//! # Abutment Core Library
//!
//! Plans long treatment volumes that need several isocenters and two patient setups: the
//! fields of each frame are laid out along the body, their overlaps are sliced into
//! graduated shells, the dose is feathered across those shells, optimizations are run in
//! a chained order, and the two frames' doses are summed in one frame.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (frames, isocenters, junctions,
//!   jobs, doses), geometry (boxes, voxel grids, rigid transforms), the per-frame
//!   region/point namespace, naming conventions and report I/O.
//!
//! - **[`engine`]: The Logic Core.** The planning components, their configuration and
//!   errors, and the traits through which the external structure-algebra engine,
//!   registration service and optimization/dose engine are reached.
//!
//! - **[`workflows`]: The Public API.** Complete procedures (`plan_junction`,
//!   `resolve_dose_bands`, `aggregate_dose`) built from the engine components.
//!
//! [`backends`] carries an in-memory voxel implementation of the collaborator traits.

pub mod backends;
pub mod core;
pub mod engine;
pub mod workflows;
