use super::frame::Orientation;
use crate::core::geometry::VoxelGrid;
use nalgebra::Point3;
use std::fmt;

/// Opaque reference to a dose distribution held by the dose engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DoseHandle(String);

impl DoseHandle {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DoseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dose values in Gy on a voxel grid, indexed like [`VoxelGrid::linear_index`].
#[derive(Debug, Clone, PartialEq)]
pub struct DoseVolume {
    pub grid: VoxelGrid,
    pub values: Vec<f64>,
}

impl DoseVolume {
    pub fn zeros(grid: VoxelGrid) -> Self {
        let values = vec![0.0; grid.voxel_count()];
        Self { grid, values }
    }

    /// Nearest-voxel dose at `p`; zero outside the grid.
    pub fn value_at(&self, p: &Point3<f64>) -> f64 {
        self.grid
            .locate(p)
            .map(|voxel| self.values[self.grid.linear_index(voxel)])
            .unwrap_or(0.0)
    }

    /// Number of voxels holding a computed, non-zero dose.
    pub fn computed_voxels(&self) -> usize {
        self.values
            .iter()
            .filter(|v| v.is_finite() && **v > 0.0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.computed_voxels() == 0
    }

    pub fn max(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }
}

/// A frame's dose evaluated on another frame's grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseEvaluation {
    pub handle: DoseHandle,
    pub source: Orientation,
    pub target: Orientation,
    pub computed_voxels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn computed_voxels_ignores_zero_and_non_finite_values() {
        let grid = VoxelGrid::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0), [2, 2, 1]);
        let mut dose = DoseVolume::zeros(grid);
        dose.values = vec![0.0, 1.5, f64::NAN, 2.0];
        assert_eq!(dose.computed_voxels(), 2);
        assert_eq!(dose.max(), 2.0);
        assert!(!dose.is_empty());
    }

    #[test]
    fn value_at_uses_nearest_voxel_and_zero_outside() {
        let grid = VoxelGrid::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0), [2, 1, 1]);
        let dose = DoseVolume {
            grid,
            values: vec![1.0, 3.0],
        };
        assert_eq!(dose.value_at(&Point3::new(1.5, 0.5, 0.5)), 3.0);
        assert_eq!(dose.value_at(&Point3::new(5.0, 0.5, 0.5)), 0.0);
    }
}
