use super::{FieldRecord, MemoryCase};
use crate::core::geometry::{RigidTransform, VoxelGrid};
use crate::core::models::dose::{DoseEvaluation, DoseHandle, DoseVolume};
use crate::core::models::frame::Orientation;
use crate::core::models::job::JobSpec;
use crate::engine::ports::{BackendError, DoseEngine};
use nalgebra::Point3;
use tracing::debug;

/// Relative longitudinal profile of a field with a linear ramp at both edges.
fn field_profile(offset: f64, half_width: f64, ramp: f64) -> f64 {
    let u = offset.abs();
    if u >= half_width {
        0.0
    } else if ramp <= 0.0 || u <= half_width - ramp {
        1.0
    } else {
        (half_width - u) / ramp
    }
}

/// Samples `volume` at every voxel centre of `grid`, carried through `to_source` first.
fn resample(
    volume: &DoseVolume,
    grid: &VoxelGrid,
    to_source: impl Fn(&Point3<f64>) -> Point3<f64>,
) -> Vec<f64> {
    (0..grid.voxel_count())
        .map(|idx| volume.value_at(&to_source(&grid.voxel_center(grid.voxel_of(idx)))))
        .collect()
}

impl MemoryCase {
    fn field_dose(&self, field: &str) -> Result<(&FieldRecord, &DoseHandle), BackendError> {
        let record = self
            .fields
            .get(field)
            .ok_or_else(|| BackendError::FieldNotFound(field.to_string()))?;
        let handle = record
            .dose
            .as_ref()
            .ok_or_else(|| BackendError::DoseNotFound(field.to_string()))?;
        Ok((record, handle))
    }

    fn model_dose(&self, spec: &JobSpec) -> Result<DoseVolume, BackendError> {
        let grid = self.frame(spec.frame)?.dose_grid.clone();
        let half_width = spec.field_width_cm / 2.0;
        let target = spec.target_dose_gy;
        let iso_z = spec.isocenter.z;

        let background = match &spec.background_field {
            Some(bg) => {
                let (record, handle) = self.field_dose(bg)?;
                let volume = &self
                    .doses
                    .get(handle)
                    .ok_or_else(|| BackendError::DoseNotFound(handle.to_string()))?
                    .volume;
                let to_bg = self.rigid(spec.frame, record.spec.frame)?;
                Some((volume, to_bg))
            }
            None => None,
        };

        let values = (0..grid.voxel_count())
            .map(|idx| {
                let p = grid.voxel_center(grid.voxel_of(idx));
                let offset = p.z - iso_z;
                match &background {
                    Some((volume, to_bg)) if offset.abs() < half_width => {
                        (target - volume.value_at(&to_bg.apply(&p))).clamp(0.0, target)
                    }
                    Some(_) => 0.0,
                    None => target * field_profile(offset, half_width, spec.feather_width_cm),
                }
            })
            .collect();
        Ok(DoseVolume { grid, values })
    }
}

impl DoseEngine for MemoryCase {
    fn run_optimization(&mut self, spec: &JobSpec) -> Result<String, BackendError> {
        self.optimization_log.push(spec.field.clone());
        if let Some(error) = self.injected_failures.get(&spec.field) {
            return Err(error.clone());
        }
        self.frame(spec.frame)?;
        if let Some(bg) = &spec.background_field {
            self.field_dose(bg)?;
        }
        debug!(field = %spec.field, background = ?spec.background_field, "Field optimized.");
        self.fields.insert(
            spec.field.clone(),
            FieldRecord {
                spec: spec.clone(),
                dose: None,
                stale: true,
            },
        );
        Ok(spec.field.clone())
    }

    fn compute_dose(&mut self, field: &str) -> Result<DoseHandle, BackendError> {
        let spec = self
            .fields
            .get(field)
            .map(|record| record.spec.clone())
            .ok_or_else(|| BackendError::FieldNotFound(field.to_string()))?;
        let volume = self.model_dose(&spec)?;
        let handle = self.store_dose(&format!("field:{field}"), spec.frame, volume);
        if let Some(record) = self.fields.get_mut(field) {
            record.dose = Some(handle.clone());
            record.stale = false;
        }
        Ok(handle)
    }

    fn has_valid_dose(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|record| {
            !record.stale
                && record
                    .dose
                    .as_ref()
                    .and_then(|h| self.doses.get(h))
                    .is_some_and(|d| !d.volume.is_empty())
        })
    }

    fn current_dose(&self, field: &str) -> Option<DoseHandle> {
        self.fields
            .get(field)
            .filter(|record| !record.stale)
            .and_then(|record| record.dose.clone())
    }

    fn stale_fields(&self, frame: Orientation) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, record)| record.spec.frame == frame && record.stale)
            .map(|(field, _)| field.clone())
            .collect()
    }

    fn get_dose_values(
        &self,
        dose: &DoseHandle,
        frame: Orientation,
    ) -> Result<DoseVolume, BackendError> {
        let record = self
            .doses
            .get(dose)
            .ok_or_else(|| BackendError::DoseNotFound(dose.to_string()))?;
        if record.frame != frame {
            return Err(BackendError::Invalid(format!(
                "dose {dose} belongs to frame {}, not {frame}",
                record.frame
            )));
        }
        Ok(record.volume.clone())
    }

    fn plan_dose(&mut self, frame: Orientation) -> Result<DoseHandle, BackendError> {
        let grid = self.frame(frame)?.dose_grid.clone();
        let mut total = DoseVolume::zeros(grid.clone());
        for record in self.fields.values().filter(|r| r.spec.frame == frame) {
            let Some(volume) = record.dose.as_ref().and_then(|h| self.doses.get(h)) else {
                continue;
            };
            let sampled = resample(&volume.volume, &grid, |p| *p);
            for (acc, v) in total.values.iter_mut().zip(sampled) {
                *acc += v;
            }
        }
        Ok(self.store_dose(&format!("plan:{}", frame.code()), frame, total))
    }

    fn dose_grid(&self, frame: Orientation) -> Result<VoxelGrid, BackendError> {
        Ok(self.frame(frame)?.dose_grid.clone())
    }

    fn set_dose_grid(&mut self, frame: Orientation, grid: VoxelGrid) -> Result<(), BackendError> {
        let store = self.frame_mut(frame)?;
        if store.dose_grid == grid {
            return Ok(());
        }
        store.dose_grid = grid;
        for record in self.fields.values_mut().filter(|r| r.spec.frame == frame) {
            record.stale = true;
        }
        self.evaluations
            .retain(|e| e.source != frame && e.target != frame);
        Ok(())
    }

    fn dose_evaluations(&self, source: Orientation, target: Orientation) -> Vec<DoseEvaluation> {
        self.evaluations
            .iter()
            .filter(|e| e.source == source && e.target == target)
            .cloned()
            .collect()
    }

    fn evaluate_on(
        &mut self,
        source: Orientation,
        target: Orientation,
        transform: &RigidTransform,
    ) -> Result<DoseHandle, BackendError> {
        let plan = self.plan_dose(source)?;
        let grid = self.frame(target)?.dose_grid.clone();
        let back = transform.inverse();
        let values = {
            let volume = &self
                .doses
                .get(&plan)
                .ok_or_else(|| BackendError::DoseNotFound(plan.to_string()))?
                .volume;
            resample(volume, &grid, |p| back.apply(p))
        };
        let volume = DoseVolume { grid, values };
        let computed_voxels = volume.computed_voxels();
        let handle = self.store_dose(
            &format!("eval:{}->{}", source.code(), target.code()),
            target,
            volume,
        );
        self.evaluations.push(DoseEvaluation {
            handle: handle.clone(),
            source,
            target,
            computed_voxels,
        });
        Ok(handle)
    }

    fn sum_doses(
        &mut self,
        frame: Orientation,
        doses: &[(DoseHandle, f64)],
    ) -> Result<DoseHandle, BackendError> {
        let grid = self.frame(frame)?.dose_grid.clone();
        let mut total = DoseVolume::zeros(grid.clone());
        for (handle, weight) in doses {
            let volume = self.get_dose_values(handle, frame)?;
            let sampled = resample(&volume, &grid, |p| *p);
            for (acc, v) in total.values.iter_mut().zip(sampled) {
                *acc += weight * v;
            }
        }
        Ok(self.store_dose(&format!("sum:{}", frame.code()), frame, total))
    }
}
