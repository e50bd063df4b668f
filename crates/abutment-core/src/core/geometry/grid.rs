use super::bounds::Bounds3;
use nalgebra::{Point3, Vector3};

const LATTICE_EPSILON: f64 = 1e-9;

/// Regular voxel lattice: corner of the first voxel, voxel size and voxel counts.
///
/// Both region masks and dose values live on grids of this shape. Voxel `[i, j, k]`
/// covers `corner + voxel_size ⊙ [i, j, k]` up to `corner + voxel_size ⊙ [i+1, j+1, k+1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    pub corner: Point3<f64>,
    pub voxel_size: Vector3<f64>,
    pub counts: [usize; 3],
}

impl VoxelGrid {
    pub fn new(corner: Point3<f64>, voxel_size: Vector3<f64>, counts: [usize; 3]) -> Self {
        Self {
            corner,
            voxel_size,
            counts,
        }
    }

    /// Smallest grid with the given voxel size whose box covers `bounds`.
    pub fn covering(bounds: &Bounds3, voxel_size: Vector3<f64>) -> Self {
        let mut counts = [0usize; 3];
        for axis in 0..3 {
            let n = (bounds.extent(axis) / voxel_size[axis] - LATTICE_EPSILON).ceil();
            counts[axis] = n.max(1.0) as usize;
        }
        Self::new(bounds.min, voxel_size, counts)
    }

    pub fn voxel_count(&self) -> usize {
        self.counts.iter().product()
    }

    /// Volume of a single voxel in cm³ (= cc).
    pub fn voxel_volume(&self) -> f64 {
        self.voxel_size.x * self.voxel_size.y * self.voxel_size.z
    }

    pub fn bounds(&self) -> Bounds3 {
        let far = self.corner
            + Vector3::new(
                self.voxel_size.x * self.counts[0] as f64,
                self.voxel_size.y * self.counts[1] as f64,
                self.voxel_size.z * self.counts[2] as f64,
            );
        Bounds3::new(self.corner, far)
    }

    pub fn linear_index(&self, [i, j, k]: [usize; 3]) -> usize {
        (k * self.counts[1] + j) * self.counts[0] + i
    }

    pub fn voxel_of(&self, linear: usize) -> [usize; 3] {
        let i = linear % self.counts[0];
        let j = (linear / self.counts[0]) % self.counts[1];
        let k = linear / (self.counts[0] * self.counts[1]);
        [i, j, k]
    }

    pub fn voxel_center(&self, [i, j, k]: [usize; 3]) -> Point3<f64> {
        self.corner
            + Vector3::new(
                (i as f64 + 0.5) * self.voxel_size.x,
                (j as f64 + 0.5) * self.voxel_size.y,
                (k as f64 + 0.5) * self.voxel_size.z,
            )
    }

    /// Voxel containing `p`, or `None` if `p` lies outside the grid.
    pub fn locate(&self, p: &Point3<f64>) -> Option<[usize; 3]> {
        let mut index = [0usize; 3];
        for axis in 0..3 {
            let t = (p[axis] - self.corner[axis]) / self.voxel_size[axis];
            if t < 0.0 || t >= self.counts[axis] as f64 {
                return None;
            }
            index[axis] = t.floor() as usize;
        }
        Some(index)
    }

    /// Grows the grid on its own lattice until its box covers `bounds`.
    ///
    /// Voxel size and the positions of existing voxels are preserved, so the result is
    /// always a superset of both the original grid and `bounds`.
    pub fn expanded_to(&self, bounds: &Bounds3) -> VoxelGrid {
        let current = self.bounds();
        let mut corner = self.corner;
        let mut counts = self.counts;
        for axis in 0..3 {
            let size = self.voxel_size[axis];
            let grow_low = ((current.min[axis] - bounds.min[axis]) / size - LATTICE_EPSILON)
                .ceil()
                .max(0.0);
            let grow_high = ((bounds.max[axis] - current.max[axis]) / size - LATTICE_EPSILON)
                .ceil()
                .max(0.0);
            corner[axis] -= grow_low * size;
            counts[axis] += grow_low as usize + grow_high as usize;
        }
        VoxelGrid::new(corner, self.voxel_size, counts)
    }
}
