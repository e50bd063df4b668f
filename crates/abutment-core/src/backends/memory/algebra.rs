use super::mask::Mask;
use super::{FrameStore, MemoryCase};
use crate::core::geometry::Bounds3;
use crate::core::models::dose::DoseVolume;
use crate::core::models::frame::Orientation;
use crate::engine::ports::{
    BackendError, CombineOp, Composition, Operand, ResultOp, StructureAlgebra,
};

impl FrameStore {
    fn operand(&self, frame: Orientation, operand: &Operand) -> Result<Mask, BackendError> {
        let mut sources = operand.sources.iter().map(|name| {
            self.regions
                .get(name)
                .ok_or_else(|| BackendError::RegionNotFound {
                    frame,
                    name: name.clone(),
                })
        });
        let Some(first) = sources.next() else {
            return Ok(Mask::empty(&self.grid));
        };
        let mut combined = first?.clone();
        for mask in sources {
            let mask = mask?;
            combined = match operand.op {
                CombineOp::Union => combined.union(mask),
                CombineOp::Intersection => combined.intersect(mask),
            };
        }
        Ok(combined.grown(&self.grid, operand.margin_cm))
    }

    fn evaluate(&self, frame: Orientation, composition: &Composition) -> Result<Mask, BackendError> {
        let a = self.operand(frame, &composition.a)?;
        let result = match composition.result_op {
            ResultOp::None => a,
            op => {
                let b = self.operand(frame, &composition.b)?;
                match op {
                    ResultOp::Union => a.union(&b),
                    ResultOp::Intersection => a.intersect(&b),
                    _ => a.subtract(&b),
                }
            }
        };
        Ok(result.grown(&self.grid, composition.result_margin_cm))
    }
}

impl StructureAlgebra for MemoryCase {
    fn get_or_create(&mut self, frame: Orientation, name: &str) -> Result<(), BackendError> {
        let store = self.frame_mut(frame)?;
        if !store.regions.contains_key(name) {
            let empty = Mask::empty(&store.grid);
            store.regions.insert(name.to_string(), empty);
        }
        Ok(())
    }

    fn compose(
        &mut self,
        frame: Orientation,
        name: &str,
        composition: &Composition,
    ) -> Result<(), BackendError> {
        let store = self.frame_mut(frame)?;
        let mask = store.evaluate(frame, composition)?;
        store.regions.insert(name.to_string(), mask);
        Ok(())
    }

    fn create_box(
        &mut self,
        frame: Orientation,
        name: &str,
        bounds: &Bounds3,
    ) -> Result<(), BackendError> {
        self.insert_box_region(frame, name, bounds)
    }

    fn create_from_dose(
        &mut self,
        frame: Orientation,
        name: &str,
        dose: &DoseVolume,
        threshold_gy: f64,
    ) -> Result<(), BackendError> {
        let store = self.frame_mut(frame)?;
        let mask = Mask::from_centers(&store.grid, |p| {
            let value = dose.value_at(p);
            value > 0.0 && value >= threshold_gy
        });
        store.regions.insert(name.to_string(), mask);
        Ok(())
    }

    fn delete(&mut self, frame: Orientation, name: &str) -> Result<(), BackendError> {
        self.frame_mut(frame)?.regions.remove(name);
        Ok(())
    }

    fn has_contours(&self, frame: Orientation, name: &str) -> bool {
        self.frames
            .get(&frame)
            .and_then(|store| store.regions.get(name))
            .is_some_and(Mask::any)
    }

    fn volume_threshold(
        &mut self,
        frame: Orientation,
        name: &str,
        min_cc: f64,
        max_cc: f64,
    ) -> Result<(), BackendError> {
        let store = self.frame_mut(frame)?;
        let voxel_cc = store.grid.voxel_volume();
        let grid = store.grid.clone();
        let mask = store
            .regions
            .get_mut(name)
            .ok_or_else(|| BackendError::RegionNotFound {
                frame,
                name: name.to_string(),
            })?;
        let keep: Vec<usize> = mask
            .components(&grid)
            .into_iter()
            .filter(|component| {
                let cc = component.len() as f64 * voxel_cc;
                cc >= min_cc && cc <= max_cc
            })
            .flatten()
            .collect();
        mask.retain_indices(&keep);
        Ok(())
    }

    fn bounding_box(&self, frame: Orientation, name: &str) -> Option<Bounds3> {
        let store = self.frames.get(&frame)?;
        store.regions.get(name)?.bounds(&store.grid)
    }
}
