use super::plan::frame_settings;
use crate::core::models::frame::Frame;
use crate::engine::aggregate::{AggregatedDose, DoseAggregator};
use crate::engine::config::PlanConfig;
use crate::engine::error::EngineError;
use crate::engine::ports::PlanningBackend;
use crate::engine::transform::FrameTransform;
use tracing::{info, instrument};

/// Sums the total dose of both frames in the primary frame.
///
/// Both dose grids are grown to cover each other first; fields whose dose went stale
/// in the process are recomputed before the companion dose is projected and summed.
#[instrument(skip_all, name = "aggregate_dose")]
pub fn aggregate_dose<B: PlanningBackend + ?Sized>(
    primary: &Frame,
    companion: &Frame,
    config: &PlanConfig,
    transforms: &FrameTransform,
    backend: &mut B,
) -> Result<AggregatedDose, EngineError> {
    let (primary_settings, companion_settings) = frame_settings(config, primary, companion)?;
    let aggregator = DoseAggregator::new(primary_settings, companion_settings)?;
    let result = aggregator.aggregate(backend, transforms)?;
    info!(
        dose = %result.handle,
        recomputed = result.recomputed.len(),
        "Total dose available in frame {}.",
        primary.orientation()
    );
    Ok(result)
}
