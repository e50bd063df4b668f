use super::error::{Diagnostics, EngineError, Warning};
use super::ports::{RegistrationService, StructureAlgebra};
use super::utils::regions::{claim, release};
use crate::core::geometry::{Bounds3, RigidTransform};
use crate::core::models::frame::{Frame, Orientation};
use crate::core::registry::RegionKind;
use nalgebra::Point3;
use std::collections::HashMap;
use tracing::{debug, info};

/// Rigid transforms between the frames of a session, one per ordered pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTransform {
    transforms: HashMap<(Orientation, Orientation), RigidTransform>,
}

impl FrameTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, from: Orientation, to: Orientation, transform: RigidTransform) {
        self.transforms.insert((from, to), transform);
    }

    /// Collects whatever registrations exist between `a` and `b`, in either direction.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::Configuration`] if neither direction is registered or a
    /// registered matrix is not a rigid motion.
    pub fn from_registration<R: RegistrationService + ?Sized>(
        registration: &R,
        a: Orientation,
        b: Orientation,
    ) -> Result<Self, EngineError> {
        let mut transforms = Self::new();
        for (from, to) in [(a, b), (b, a)] {
            if let Some(matrix) = registration.get_transform(from, to) {
                let transform = RigidTransform::new(matrix).map_err(|e| {
                    EngineError::Configuration(format!(
                        "Registration {from} -> {to} is not a rigid transform: {e}"
                    ))
                })?;
                transforms.register(from, to, transform);
            }
        }
        if transforms.transforms.is_empty() {
            return Err(EngineError::Configuration(format!(
                "No registration between frames {a} and {b}"
            )));
        }
        info!(%a, %b, directions = transforms.transforms.len(), "Frame registration loaded.");
        Ok(transforms)
    }

    /// The `from → to` transform, inverting the opposite direction when only that one is
    /// registered.
    pub fn resolve(&self, from: Orientation, to: Orientation) -> Result<RigidTransform, EngineError> {
        if from == to {
            return Ok(RigidTransform::identity());
        }
        if let Some(transform) = self.transforms.get(&(from, to)) {
            return Ok(*transform);
        }
        if let Some(transform) = self.transforms.get(&(to, from)) {
            debug!(%from, %to, "Using inverse of the opposite registration.");
            return Ok(transform.inverse());
        }
        Err(EngineError::Configuration(format!(
            "No transform registered between frames {from} and {to}"
        )))
    }

    pub fn apply(
        &self,
        point: &Point3<f64>,
        from: Orientation,
        to: Orientation,
    ) -> Result<Point3<f64>, EngineError> {
        Ok(self.resolve(from, to)?.apply(point))
    }

    pub fn apply_bounds(
        &self,
        bounds: &Bounds3,
        from: Orientation,
        to: Orientation,
    ) -> Result<Bounds3, EngineError> {
        Ok(self.resolve(from, to)?.apply_bounds(bounds))
    }

    /// Maps named regions of `source` into `target` under the same names.
    ///
    /// The result is aligned with `names`: `None` marks a region that produced nothing,
    /// either because the source region is empty or because the registration service
    /// could not map it. Neither case is an error.
    pub fn map_regions<B: RegistrationService + StructureAlgebra + ?Sized>(
        &self,
        backend: &mut B,
        source: &Frame,
        target: &mut Frame,
        names: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Option<String>>, EngineError> {
        let from = source.orientation();
        let to = target.orientation();
        self.resolve(from, to)?;

        let mut candidates = Vec::new();
        for name in names {
            if backend.has_contours(from, name) {
                claim(target, backend, name, RegionKind::Mapped)?;
                candidates.push(name.clone());
            } else {
                diagnostics.push(Warning::EmptyResult {
                    frame: from,
                    name: name.clone(),
                });
            }
        }

        let flags = if candidates.is_empty() {
            Vec::new()
        } else {
            backend.map_regions(&candidates, from, to)?
        };
        let mut mapped: HashMap<&str, bool> = HashMap::new();
        for (name, flag) in candidates.iter().zip(flags.iter().copied()) {
            if !flag {
                release(target, backend, name)?;
                diagnostics.push(Warning::EmptyResult {
                    frame: to,
                    name: name.clone(),
                });
            }
            mapped.insert(name.as_str(), flag);
        }

        Ok(names
            .iter()
            .map(|name| {
                mapped
                    .get(name.as_str())
                    .copied()
                    .unwrap_or(false)
                    .then(|| name.clone())
            })
            .collect())
    }

    /// Carries a named point of `source` into `target` through the registration service.
    pub fn carry_point<R: RegistrationService + ?Sized>(
        &self,
        registration: &R,
        source: &Frame,
        target: &mut Frame,
        name: &str,
        target_name: &str,
    ) -> Result<Point3<f64>, EngineError> {
        let from = source.orientation();
        let to = target.orientation();
        self.resolve(from, to)?;
        let position = source
            .namespace()
            .point(name)
            .map(|p| p.position)
            .ok_or_else(|| {
                EngineError::Configuration(format!("Point '{name}' is missing in frame {from}"))
            })?;
        let mapped = registration
            .map_points(&[position], from, to)?
            .first()
            .copied()
            .ok_or_else(|| {
                EngineError::Internal(format!("Registration returned no point for '{name}'"))
            })?;
        target.namespace_mut().set_point(target_name, mapped);
        debug!(%from, %to, point = name, ?mapped, "Point carried across frames.");
        Ok(mapped)
    }
}
