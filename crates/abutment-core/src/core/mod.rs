//! # Core Module
//!
//! Stateless building blocks of the abutment engine.
//!
//! ## Architecture
//!
//! - **Models** ([`models`]) - Frames, isocenters, junctions, jobs and dose containers
//! - **Geometry** ([`geometry`]) - Boxes, voxel grids and rigid transforms
//! - **Naming** ([`naming`]) - The deterministic region/point naming contract
//! - **Registry** ([`registry`]) - Per-frame name-keyed namespace with get-or-create semantics
//! - **I/O** ([`io`]) - Plan reports
//!
//! Nothing in this module talks to an external collaborator; see `engine::ports` for that.

pub mod geometry;
pub mod io;
pub mod models;
pub mod naming;
pub mod registry;
