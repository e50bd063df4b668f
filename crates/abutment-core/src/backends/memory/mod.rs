//! In-memory voxel case implementing every collaborator port.
//!
//! Regions are binary masks on a per-frame structure grid, doses are [`DoseVolume`]s on a
//! per-frame dose grid, and registrations are plain rigid matrices. The optimizer is a
//! simple longitudinal field model: each field delivers its target dose across its width,
//! ramps linearly to zero over the feather width at both edges, and with a background dose
//! tops the background up to the target instead.

mod algebra;
mod dose;
mod mask;
mod registration;

use crate::core::geometry::{Bounds3, RigidTransform, VoxelGrid};
use crate::core::models::dose::{DoseEvaluation, DoseHandle, DoseVolume};
use crate::core::models::frame::Orientation;
use crate::core::models::job::JobSpec;
use crate::engine::ports::BackendError;
use mask::Mask;
use nalgebra::Matrix4;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct FrameStore {
    grid: VoxelGrid,
    dose_grid: VoxelGrid,
    regions: HashMap<String, Mask>,
}

#[derive(Debug, Clone)]
struct FieldRecord {
    spec: JobSpec,
    dose: Option<DoseHandle>,
    stale: bool,
}

#[derive(Debug, Clone)]
struct DoseRecord {
    frame: Orientation,
    volume: DoseVolume,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCase {
    frames: BTreeMap<Orientation, FrameStore>,
    transforms: HashMap<(Orientation, Orientation), Matrix4<f64>>,
    fields: BTreeMap<String, FieldRecord>,
    doses: HashMap<DoseHandle, DoseRecord>,
    evaluations: Vec<DoseEvaluation>,
    injected_failures: HashMap<String, BackendError>,
    optimization_log: Vec<String>,
    next_handle: u64,
}

impl MemoryCase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frame whose structures and doses both start on `grid`.
    pub fn add_frame(&mut self, orientation: Orientation, grid: VoxelGrid) -> &mut Self {
        self.frames.insert(
            orientation,
            FrameStore {
                dose_grid: grid.clone(),
                grid,
                regions: HashMap::new(),
            },
        );
        self
    }

    /// Inserts (or replaces) a box-shaped region, as an imported contour would be.
    pub fn insert_box_region(
        &mut self,
        frame: Orientation,
        name: &str,
        bounds: &Bounds3,
    ) -> Result<(), BackendError> {
        let store = self.frame_mut(frame)?;
        let mask = Mask::from_box(&store.grid, bounds);
        store.regions.insert(name.to_string(), mask);
        Ok(())
    }

    /// Registers the matrix mapping `from` coordinates to `to` coordinates.
    pub fn register_transform(
        &mut self,
        from: Orientation,
        to: Orientation,
        matrix: Matrix4<f64>,
    ) -> &mut Self {
        self.transforms.insert((from, to), matrix);
        self
    }

    /// Makes every later optimization of `field` fail with `error`.
    pub fn fail_optimization(&mut self, field: &str, error: BackendError) -> &mut Self {
        self.injected_failures.insert(field.to_string(), error);
        self
    }

    pub fn region_names(&self, frame: Orientation) -> Vec<String> {
        let mut names: Vec<String> = self
            .frames
            .get(&frame)
            .map(|store| store.regions.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn region_voxels(&self, frame: Orientation, name: &str) -> Option<usize> {
        let store = self.frames.get(&frame)?;
        store.regions.get(name).map(Mask::count)
    }

    pub fn region_volume_cc(&self, frame: Orientation, name: &str) -> Option<f64> {
        let store = self.frames.get(&frame)?;
        let voxels = store.regions.get(name)?.count();
        Some(voxels as f64 * store.grid.voxel_volume())
    }

    /// Number of voxels shared by two regions of the same frame.
    pub fn overlap_voxels(&self, frame: Orientation, a: &str, b: &str) -> usize {
        let Some(store) = self.frames.get(&frame) else {
            return 0;
        };
        match (store.regions.get(a), store.regions.get(b)) {
            (Some(a), Some(b)) => a.intersect(b).count(),
            _ => 0,
        }
    }

    pub fn dose_volume(&self, handle: &DoseHandle) -> Option<&DoseVolume> {
        self.doses.get(handle).map(|record| &record.volume)
    }

    /// Job submitted by the last optimization of `field`.
    pub fn job_spec(&self, field: &str) -> Option<&JobSpec> {
        self.fields.get(field).map(|record| &record.spec)
    }

    /// Fields in the order their optimizations were requested, failures included.
    pub fn optimization_log(&self) -> &[String] {
        &self.optimization_log
    }

    fn frame(&self, frame: Orientation) -> Result<&FrameStore, BackendError> {
        self.frames
            .get(&frame)
            .ok_or(BackendError::FrameNotFound(frame))
    }

    fn frame_mut(&mut self, frame: Orientation) -> Result<&mut FrameStore, BackendError> {
        self.frames
            .get_mut(&frame)
            .ok_or(BackendError::FrameNotFound(frame))
    }

    /// Registered transform `from → to`, inverting the reverse registration if needed.
    fn rigid(&self, from: Orientation, to: Orientation) -> Result<RigidTransform, BackendError> {
        if from == to {
            return Ok(RigidTransform::identity());
        }
        let invalid = |e: crate::core::geometry::RigidTransformError| {
            BackendError::Invalid(format!("registration {from} -> {to}: {e}"))
        };
        if let Some(matrix) = self.transforms.get(&(from, to)) {
            return RigidTransform::new(*matrix).map_err(invalid);
        }
        if let Some(matrix) = self.transforms.get(&(to, from)) {
            return RigidTransform::new(*matrix)
                .map(|t| t.inverse())
                .map_err(invalid);
        }
        Err(BackendError::NoRegistration { from, to })
    }

    fn store_dose(&mut self, prefix: &str, frame: Orientation, volume: DoseVolume) -> DoseHandle {
        self.next_handle += 1;
        let handle = DoseHandle::new(format!("{prefix}#{}", self.next_handle));
        self.doses.insert(handle.clone(), DoseRecord { frame, volume });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    pub(super) fn case() -> MemoryCase {
        let grid = VoxelGrid::new(
            Point3::new(-10.0, -10.0, 0.0),
            Vector3::new(2.0, 2.0, 1.0),
            [10, 10, 100],
        );
        let mut case = MemoryCase::new();
        case.add_frame(Orientation::HeadFirstSupine, grid.clone())
            .add_frame(Orientation::FeetFirstSupine, grid)
            .register_transform(
                Orientation::HeadFirstSupine,
                Orientation::FeetFirstSupine,
                Matrix4::new_translation(&Vector3::new(0.0, 0.0, 10.0)),
            );
        case
    }

    #[test]
    fn box_regions_are_voxelized_by_centre() {
        let mut case = case();
        case.insert_box_region(
            Orientation::HeadFirstSupine,
            "Body",
            &Bounds3::new(Point3::new(-4.0, -4.0, 10.0), Point3::new(4.0, 4.0, 20.0)),
        )
        .unwrap();
        assert_eq!(
            case.region_voxels(Orientation::HeadFirstSupine, "Body"),
            Some(4 * 4 * 10)
        );
        assert_eq!(
            case.region_volume_cc(Orientation::HeadFirstSupine, "Body"),
            Some(640.0)
        );
    }

    #[test]
    fn unknown_frame_is_reported() {
        let mut case = MemoryCase::new();
        let err = case
            .insert_box_region(
                Orientation::HeadFirstSupine,
                "Body",
                &Bounds3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)),
            )
            .unwrap_err();
        assert_eq!(err, BackendError::FrameNotFound(Orientation::HeadFirstSupine));
    }

    #[test]
    fn reverse_registration_is_inverted() {
        let case = case();
        let t = case
            .rigid(Orientation::FeetFirstSupine, Orientation::HeadFirstSupine)
            .unwrap();
        assert_eq!(t.apply(&Point3::new(0.0, 0.0, 15.0)), Point3::new(0.0, 0.0, 5.0));
    }
}
