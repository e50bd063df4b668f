//! # Geometry Module
//!
//! Coordinate-frame geometry shared by every layer: axis-aligned boxes, the regular voxel
//! lattice that masks and dose values live on, and rigid transforms between frames.
//!
//! All lengths are in centimetres. The longitudinal patient axis is `z`; `x` and `y` are the
//! transverse axes.

pub mod bounds;
pub mod grid;
pub mod rigid;

pub use bounds::Bounds3;
pub use grid::VoxelGrid;
pub use rigid::{RigidTransform, RigidTransformError};
