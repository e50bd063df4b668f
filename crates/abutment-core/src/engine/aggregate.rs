use super::config::{FrameSettings, Prescription};
use super::error::EngineError;
use super::ports::DoseEngine;
use super::transform::FrameTransform;
use crate::core::geometry::VoxelGrid;
use crate::core::models::dose::{DoseEvaluation, DoseHandle};
use crate::core::models::frame::Orientation;
use tracing::{debug, info};

/// Result of summing both frames' doses on the primary grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedDose {
    pub handle: DoseHandle,
    pub primary_grid: VoxelGrid,
    pub companion_grid: VoxelGrid,
    /// The projection of the companion dose that went into the sum.
    pub evaluation: DoseEvaluation,
    /// Fields whose dose was recomputed after the grids changed.
    pub recomputed: Vec<String>,
}

/// Among the evaluations with computed voxels, the one covering the most voxels.
pub fn select_evaluation(evaluations: Vec<DoseEvaluation>) -> Option<DoseEvaluation> {
    evaluations
        .into_iter()
        .filter(|e| e.computed_voxels > 0)
        .max_by_key(|e| e.computed_voxels)
}

#[derive(Debug, Clone, Copy)]
pub struct DoseAggregator {
    primary: (Orientation, Prescription),
    companion: (Orientation, Prescription),
}

impl DoseAggregator {
    pub fn new(primary: &FrameSettings, companion: &FrameSettings) -> Result<Self, EngineError> {
        primary.prescription.validate()?;
        companion.prescription.validate()?;
        if primary.orientation == companion.orientation {
            return Err(EngineError::Configuration(format!(
                "Cannot aggregate frame {} with itself",
                primary.orientation
            )));
        }
        Ok(Self {
            primary: (primary.orientation, primary.prescription),
            companion: (companion.orientation, companion.prescription),
        })
    }

    /// Expands both dose grids until each covers the other's extent.
    ///
    /// Returns the new `(primary, companion)` grids after installing them.
    pub fn reconcile_grids<D: DoseEngine + ?Sized>(
        &self,
        engine: &mut D,
        transforms: &FrameTransform,
    ) -> Result<(VoxelGrid, VoxelGrid), EngineError> {
        let (primary, _) = self.primary;
        let (companion, _) = self.companion;
        let to_primary = transforms.resolve(companion, primary)?;

        let primary_grid = engine.dose_grid(primary)?;
        let companion_grid = engine.dose_grid(companion)?;

        let union = primary_grid
            .bounds()
            .union(&to_primary.apply_bounds(&companion_grid.bounds()));
        let primary_grid = primary_grid.expanded_to(&union);
        let companion_bounds = to_primary
            .inverse()
            .apply_bounds(&union)
            .union(&companion_grid.bounds());
        let companion_grid = companion_grid.expanded_to(&companion_bounds);

        debug!(
            primary_counts = ?primary_grid.counts,
            companion_counts = ?companion_grid.counts,
            "Dose grids reconciled."
        );
        engine.set_dose_grid(primary, primary_grid.clone())?;
        engine.set_dose_grid(companion, companion_grid.clone())?;
        Ok((primary_grid, companion_grid))
    }

    pub fn aggregate<D: DoseEngine + ?Sized>(
        &self,
        engine: &mut D,
        transforms: &FrameTransform,
    ) -> Result<AggregatedDose, EngineError> {
        let (primary, primary_rx) = self.primary;
        let (companion, companion_rx) = self.companion;

        let (primary_grid, companion_grid) = self.reconcile_grids(engine, transforms)?;

        let mut recomputed = Vec::new();
        let mut companion_changed = false;
        for frame in [primary, companion] {
            for field in engine.stale_fields(frame) {
                engine.compute_dose(&field)?;
                companion_changed |= frame == companion;
                recomputed.push(field);
            }
        }
        if !recomputed.is_empty() {
            info!(fields = recomputed.len(), "Stale doses recomputed.");
        }

        let mut evaluations = engine.dose_evaluations(companion, primary);
        if companion_changed || evaluations.iter().all(|e| e.computed_voxels == 0) {
            let to_primary = transforms.resolve(companion, primary)?;
            engine.evaluate_on(companion, primary, &to_primary)?;
            evaluations = engine.dose_evaluations(companion, primary);
        }
        let candidates = evaluations.len();
        let evaluation = select_evaluation(evaluations).ok_or_else(|| {
            EngineError::DoseUnavailable(format!(
                "none of the {candidates} evaluations of frame {companion} on frame {primary} has computed voxels"
            ))
        })?;

        let primary_dose = engine.plan_dose(primary)?;
        let handle = engine.sum_doses(
            primary,
            &[
                (primary_dose, primary_rx.fractions as f64),
                (evaluation.handle.clone(), companion_rx.fractions as f64),
            ],
        )?;
        info!(dose = %handle, evaluation = %evaluation.handle, "Frame doses aggregated.");

        Ok(AggregatedDose {
            handle,
            primary_grid,
            companion_grid,
            evaluation,
            recomputed,
        })
    }
}
