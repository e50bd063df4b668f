use crate::core::geometry::{Bounds3, VoxelGrid};
use nalgebra::Point3;
use std::collections::VecDeque;

/// Binary voxel mask on a frame's structure grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Mask {
    bits: Vec<bool>,
}

impl Mask {
    pub fn empty(grid: &VoxelGrid) -> Self {
        Self {
            bits: vec![false; grid.voxel_count()],
        }
    }

    /// Marks every voxel whose centre satisfies `inside`.
    pub fn from_centers(grid: &VoxelGrid, inside: impl Fn(&Point3<f64>) -> bool) -> Self {
        let bits = (0..grid.voxel_count())
            .map(|idx| inside(&grid.voxel_center(grid.voxel_of(idx))))
            .collect();
        Self { bits }
    }

    pub fn from_box(grid: &VoxelGrid, bounds: &Bounds3) -> Self {
        Self::from_centers(grid, |p| bounds.contains_point(p))
    }

    pub fn get(&self, idx: usize) -> bool {
        self.bits.get(idx).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn any(&self) -> bool {
        self.bits.iter().any(|b| *b)
    }

    pub fn union(&self, other: &Mask) -> Mask {
        self.zip(other, |a, b| a || b)
    }

    pub fn intersect(&self, other: &Mask) -> Mask {
        self.zip(other, |a, b| a && b)
    }

    pub fn subtract(&self, other: &Mask) -> Mask {
        self.zip(other, |a, b| a && !b)
    }

    fn zip(&self, other: &Mask, op: impl Fn(bool, bool) -> bool) -> Mask {
        Mask {
            bits: self
                .bits
                .iter()
                .zip(&other.bits)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        }
    }

    /// Grows (positive margin) or shrinks (negative margin) the mask with a box kernel
    /// whose half-width per axis is the margin rounded to whole voxels.
    pub fn grown(&self, grid: &VoxelGrid, margin_cm: f64) -> Mask {
        if margin_cm == 0.0 {
            return self.clone();
        }
        let dilate = margin_cm > 0.0;
        let mut bits = self.bits.clone();
        for axis in 0..3 {
            let radius = (margin_cm.abs() / grid.voxel_size[axis]).round() as usize;
            if radius > 0 {
                bits = sweep(&bits, grid, axis, radius, dilate);
            }
        }
        Mask { bits }
    }

    /// Face-connected components, as lists of linear voxel indices.
    pub fn components(&self, grid: &VoxelGrid) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.bits.len()];
        let mut components = Vec::new();
        for start in 0..self.bits.len() {
            if !self.bits[start] || seen[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(idx) = queue.pop_front() {
                component.push(idx);
                for next in face_neighbours(grid, idx) {
                    if self.bits[next] && !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Keeps only the listed voxels.
    pub fn retain_indices(&mut self, keep: &[usize]) {
        let mut bits = vec![false; self.bits.len()];
        for &idx in keep {
            bits[idx] = true;
        }
        self.bits = bits;
    }

    /// Box enclosing every set voxel, voxel extents included.
    pub fn bounds(&self, grid: &VoxelGrid) -> Option<Bounds3> {
        let half = grid.voxel_size / 2.0;
        let mut result: Option<Bounds3> = None;
        for (idx, _) in self.bits.iter().enumerate().filter(|(_, b)| **b) {
            let c = grid.voxel_center(grid.voxel_of(idx));
            let voxel = Bounds3::new(c - half, c + half);
            result = Some(match result {
                Some(b) => b.union(&voxel),
                None => voxel,
            });
        }
        result
    }
}

fn face_neighbours(grid: &VoxelGrid, idx: usize) -> impl Iterator<Item = usize> + '_ {
    let voxel = grid.voxel_of(idx);
    (0..3).flat_map(move |axis| {
        let below = (voxel[axis] > 0).then(|| {
            let mut v = voxel;
            v[axis] -= 1;
            grid.linear_index(v)
        });
        let above = (voxel[axis] + 1 < grid.counts[axis]).then(|| {
            let mut v = voxel;
            v[axis] += 1;
            grid.linear_index(v)
        });
        below.into_iter().chain(above)
    })
}

/// One separable pass of a box dilation or erosion along `axis`.
/// Voxels outside the grid count as unset.
fn sweep(bits: &[bool], grid: &VoxelGrid, axis: usize, radius: usize, dilate: bool) -> Vec<bool> {
    let n = grid.counts[axis];
    (0..bits.len())
        .map(|idx| {
            let voxel = grid.voxel_of(idx);
            let pos = voxel[axis];
            let lo = pos.saturating_sub(radius);
            let hi = pos + radius;
            if !dilate && (pos < radius || hi >= n) {
                return false;
            }
            let mut window = (lo..=hi.min(n - 1)).map(|p| {
                let mut v = voxel;
                v[axis] = p;
                bits[grid.linear_index(v)]
            });
            if dilate {
                window.any(|b| b)
            } else {
                window.all(|b| b)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn grid() -> VoxelGrid {
        VoxelGrid::new(Point3::origin(), Vector3::repeat(1.0), [10, 10, 10])
    }

    fn cube(lo: f64, hi: f64) -> Bounds3 {
        Bounds3::new(Point3::new(lo, lo, lo), Point3::new(hi, hi, hi))
    }

    #[test]
    fn boolean_ops_follow_set_semantics() {
        let g = grid();
        let a = Mask::from_box(&g, &cube(0.0, 4.0));
        let b = Mask::from_box(&g, &cube(2.0, 6.0));
        assert_eq!(a.count(), 64);
        assert_eq!(a.intersect(&b).count(), 8);
        assert_eq!(a.union(&b).count(), 64 + 64 - 8);
        assert_eq!(a.subtract(&b).count(), 56);
    }

    #[test]
    fn margins_grow_and_shrink_by_whole_voxels() {
        let g = grid();
        let a = Mask::from_box(&g, &cube(3.0, 6.0));
        assert_eq!(a.count(), 27);
        assert_eq!(a.grown(&g, 1.0).count(), 125);
        assert_eq!(a.grown(&g, -1.0).count(), 1);
        assert_eq!(a.grown(&g, -2.0).count(), 0);
    }

    #[test]
    fn components_split_disconnected_parts() {
        let g = grid();
        let a = Mask::from_box(&g, &cube(0.0, 2.0)).union(&Mask::from_box(&g, &cube(5.0, 8.0)));
        let mut sizes: Vec<usize> = a.components(&g).iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![8, 27]);
    }

    #[test]
    fn bounds_cover_set_voxels() {
        let g = grid();
        let a = Mask::from_box(&g, &cube(2.0, 4.0));
        let b = a.bounds(&g).unwrap();
        assert_eq!(b.min, Point3::new(2.0, 2.0, 2.0));
        assert_eq!(b.max, Point3::new(4.0, 4.0, 4.0));
        assert!(Mask::empty(&g).bounds(&g).is_none());
    }
}
