use crate::core::models::dose::DoseHandle;
use crate::core::models::frame::Frame;
use crate::core::models::junction::{Band, Junction};
use crate::engine::config::{ConfigError, PlanConfig};
use crate::engine::error::{Diagnostics, EngineError};
use crate::engine::feathering::{DoseFeatheringResolver, Thresholds};
use crate::engine::ports::PlanningBackend;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Thresholds `level ± step` for every shell of the given junctions, keyed by shell name.
pub fn default_thresholds(
    junctions: &[Junction],
    step: u32,
) -> Result<BTreeMap<String, Thresholds>, ConfigError> {
    let mut defs = BTreeMap::new();
    for shell in junctions.iter().flat_map(|j| j.shells.iter()) {
        defs.insert(shell.name.clone(), Thresholds::around(shell.level, step)?);
    }
    Ok(defs)
}

/// Cuts the frame's dose into disjoint feathering bands inside each listed shell.
///
/// Bands that stay empty after the fallback, or are rejected by the volume filter, are
/// absent from the result and recorded in `diagnostics`.
#[instrument(skip_all, name = "resolve_dose_bands", fields(frame = %frame.orientation()))]
pub fn resolve_dose_bands<B: PlanningBackend + ?Sized>(
    frame: &mut Frame,
    junction_defs: &BTreeMap<String, Thresholds>,
    dose: &DoseHandle,
    config: &PlanConfig,
    backend: &mut B,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Band>, EngineError> {
    let orientation = frame.orientation();
    let prescription = config.settings_for(orientation).prescription;
    let resolver = DoseFeatheringResolver::new(config.feathering, prescription)?;

    let volume = backend.get_dose_values(dose, orientation)?;
    if volume.is_empty() {
        return Err(EngineError::DoseUnavailable(format!(
            "dose {dose} has no computed voxels in frame {orientation}"
        )));
    }

    let warnings_before = diagnostics.warnings().len();
    let bands = resolver.resolve(frame, backend, &volume, junction_defs, diagnostics)?;
    info!(
        shells = junction_defs.len(),
        bands = bands.len(),
        fallbacks = bands.iter().filter(|b| b.used_fallback()).count(),
        warnings = diagnostics.warnings().len() - warnings_before,
        "Dose bands resolved."
    );
    Ok(bands)
}
