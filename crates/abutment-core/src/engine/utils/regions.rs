use crate::core::geometry::Bounds3;
use crate::core::models::frame::Frame;
use crate::core::registry::RegionKind;
use crate::engine::error::EngineError;
use crate::engine::ports::StructureAlgebra;

/// Get-or-create `name` in both the frame namespace and the structure-algebra engine.
pub fn claim<S: StructureAlgebra + ?Sized>(
    frame: &mut Frame,
    algebra: &mut S,
    name: &str,
    kind: RegionKind,
) -> Result<(), EngineError> {
    let orientation = frame.orientation();
    frame
        .namespace_mut()
        .get_or_create_region(name, kind)
        .map_err(|e| EngineError::from_namespace(orientation, e))?;
    algebra.get_or_create(orientation, name)?;
    Ok(())
}

/// Fails on the first locked name in `names`.
pub fn ensure_unlocked<'a>(
    frame: &Frame,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), EngineError> {
    let namespace = frame.namespace();
    match names.into_iter().find(|name| namespace.is_locked(name)) {
        Some(name) => Err(EngineError::IdempotencyConflict {
            frame: frame.orientation(),
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Deletes `name` from both the namespace and the structure-algebra engine.
pub fn release<S: StructureAlgebra + ?Sized>(
    frame: &mut Frame,
    algebra: &mut S,
    name: &str,
) -> Result<(), EngineError> {
    let orientation = frame.orientation();
    frame
        .namespace_mut()
        .remove_region(name)
        .map_err(|e| EngineError::from_namespace(orientation, e))?;
    algebra.delete(orientation, name)?;
    Ok(())
}

/// Bounding box of a prerequisite region, which must exist and have contours.
pub fn require_region<S: StructureAlgebra + ?Sized>(
    frame: &Frame,
    algebra: &S,
    name: &str,
) -> Result<Bounds3, EngineError> {
    let orientation = frame.orientation();
    if !algebra.has_contours(orientation, name) {
        return Err(EngineError::Configuration(format!(
            "Required region '{name}' is missing or empty in frame {orientation}"
        )));
    }
    algebra.bounding_box(orientation, name).ok_or_else(|| {
        EngineError::Configuration(format!(
            "Required region '{name}' has no extent in frame {orientation}"
        ))
    })
}
