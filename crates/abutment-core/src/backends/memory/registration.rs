use super::MemoryCase;
use super::mask::Mask;
use crate::core::models::frame::Orientation;
use crate::engine::ports::{BackendError, RegistrationService};
use nalgebra::{Matrix4, Point3};
use tracing::debug;

impl RegistrationService for MemoryCase {
    fn get_transform(&self, from: Orientation, to: Orientation) -> Option<Matrix4<f64>> {
        self.transforms.get(&(from, to)).copied()
    }

    fn map_points(
        &self,
        points: &[Point3<f64>],
        from: Orientation,
        to: Orientation,
    ) -> Result<Vec<Point3<f64>>, BackendError> {
        let transform = self.rigid(from, to)?;
        Ok(points.iter().map(|p| transform.apply(p)).collect())
    }

    fn map_regions(
        &mut self,
        names: &[String],
        from: Orientation,
        to: Orientation,
    ) -> Result<Vec<bool>, BackendError> {
        // Pull-sampling: every target voxel centre is carried back into the source frame.
        let back = self.rigid(to, from)?;
        let source = self.frame(from)?.clone();
        let target = self.frame_mut(to)?;

        let mut mapped = Vec::with_capacity(names.len());
        for name in names {
            let Some(mask) = source.regions.get(name).filter(|m| m.any()) else {
                debug!(%from, %to, region = %name, "Source region is empty; nothing mapped.");
                mapped.push(false);
                continue;
            };
            let result = Mask::from_centers(&target.grid, |p| {
                source
                    .grid
                    .locate(&back.apply(p))
                    .is_some_and(|voxel| mask.get(source.grid.linear_index(voxel)))
            });
            let produced = result.any();
            target.regions.insert(name.clone(), result);
            mapped.push(produced);
        }
        Ok(mapped)
    }
}
