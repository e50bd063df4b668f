use super::config::JunctionConfig;
use super::error::{Diagnostics, EngineError, Warning};
use super::ports::{Composition, StructureAlgebra};
use super::utils::regions::{claim, ensure_unlocked, release, require_region};
use crate::core::geometry::Bounds3;
use crate::core::models::frame::Frame;
use crate::core::models::junction::{Junction, JunctionSite, Shell};
use crate::core::naming;
use crate::core::registry::RegionKind;
use nalgebra::Point3;
use tracing::{debug, info};

/// Where and how wide one junction is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionRequest {
    pub site: JunctionSite,
    /// Centre of the junction; only its longitudinal coordinate matters.
    pub location: Point3<f64>,
    pub width_cm: f64,
    /// Whether levels count down instead of up along increasing z.
    pub reversed: bool,
}

/// Slices a junction into graduated shells clipped to the body outline.
#[derive(Debug, Clone, Copy)]
pub struct JunctionBuilder {
    config: JunctionConfig,
}

impl JunctionBuilder {
    pub fn new(config: JunctionConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn level_count(&self) -> u32 {
        self.config.levels
    }

    /// Percentage of level `k` (0-based): `round(100·(k+1)/(N+1))`.
    pub fn level(&self, k: u32) -> u32 {
        let n = self.config.levels as f64;
        (100.0 * (k as f64 + 1.0) / (n + 1.0)).round() as u32
    }

    /// All levels in ascending order; `10, 20, …, 90` for nine levels.
    pub fn levels(&self) -> Vec<u32> {
        (0..self.config.levels).map(|k| self.level(k)).collect()
    }

    /// Level assigned to slab `i`, counted from the low-z end of the junction.
    pub fn slab_level(&self, i: u32, reversed: bool) -> u32 {
        if reversed {
            self.level(self.config.levels - 1 - i)
        } else {
            self.level(i)
        }
    }

    /// Builds (or rebuilds) every shell of one junction.
    ///
    /// Shells are claimed by name, so a rerun replaces the previous contents. A shell that
    /// ends up outside the body is kept but reported as an empty result.
    pub fn build<S: StructureAlgebra + ?Sized>(
        &self,
        frame: &mut Frame,
        algebra: &mut S,
        request: &JunctionRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<Junction, EngineError> {
        let orientation = frame.orientation();
        let width = request.width_cm;
        if !(width.is_finite() && width > 0.0) {
            return Err(EngineError::GeometricConstraint {
                frame: orientation,
                reason: format!("junction width must be positive, got {width:.3} cm"),
            });
        }

        let body = frame.body().to_string();
        let body_bounds = require_region(frame, algebra, &body)?;
        let cross_section = body_bounds.expanded_transverse(self.config.transverse_margin_cm);

        let n = self.config.levels;
        let thickness = width / n as f64;
        let z0 = request.location.z - width / 2.0;
        debug!(
            %orientation,
            site = ?request.site,
            z0,
            thickness,
            reversed = request.reversed,
            "Slicing junction."
        );

        let names: Vec<(String, String)> = (0..n)
            .map(|i| {
                let name =
                    naming::shell_name(orientation, request.site, self.slab_level(i, request.reversed));
                let slab = naming::slab_name(&name);
                (name, slab)
            })
            .collect();
        ensure_unlocked(
            frame,
            names
                .iter()
                .flat_map(|(name, slab)| [name.as_str(), slab.as_str()]),
        )?;

        let mut shells = Vec::with_capacity(n as usize);
        for (i, (name, slab)) in (0..n).zip(names) {
            let z_start = z0 + thickness * i as f64;
            let z_end = if i + 1 == n {
                z0 + width
            } else {
                z0 + thickness * (i + 1) as f64
            };
            let level = self.slab_level(i, request.reversed);

            let sliced = Self::slice(
                frame,
                algebra,
                &name,
                &slab,
                &body,
                &cross_section.with_z_range(z_start, z_end),
            );
            let released = release(frame, algebra, &slab);
            sliced?;
            released?;

            if !algebra.has_contours(orientation, &name) {
                diagnostics.push(Warning::EmptyResult {
                    frame: orientation,
                    name: name.clone(),
                });
            }
            shells.push(Shell {
                level,
                name,
                z_start,
                z_end,
            });
        }

        info!(%orientation, site = ?request.site, shells = shells.len(), "Junction shells built.");
        Ok(Junction {
            frame: orientation,
            site: request.site,
            location: request.location,
            width,
            reversed: request.reversed,
            shells,
        })
    }

    /// Fills shell `name` with `bounds` clipped to the body, staged through `slab`.
    fn slice<S: StructureAlgebra + ?Sized>(
        frame: &mut Frame,
        algebra: &mut S,
        name: &str,
        slab: &str,
        body: &str,
        bounds: &Bounds3,
    ) -> Result<(), EngineError> {
        let orientation = frame.orientation();
        claim(frame, algebra, slab, RegionKind::Slab)?;
        algebra.create_box(orientation, slab, bounds)?;
        claim(frame, algebra, name, RegionKind::Shell)?;
        algebra.compose(orientation, name, &Composition::intersect(&[slab, body]))?;
        Ok(())
    }
}
