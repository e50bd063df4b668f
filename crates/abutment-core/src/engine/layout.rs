use super::config::LayoutConfig;
use super::error::EngineError;
use crate::core::geometry::Bounds3;
use crate::core::models::frame::Orientation;
use crate::core::models::isocenter::{Isocenter, link_chain};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

const SPACING_TOLERANCE: f64 = 1e-9;

/// Treatable span of one frame: from `anchor` (at the shared junction) along the
/// longitudinal `direction` for `length_cm`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpan {
    pub frame: Orientation,
    pub anchor: Point3<f64>,
    /// `+1.0` or `-1.0`: the sign of z pointing away from the junction.
    pub direction: f64,
    pub length_cm: f64,
}

impl FrameSpan {
    /// Derives the span from the body-outline bounding box and the shared junction point.
    ///
    /// The span starts `half_overlap_cm` beyond the junction point, on the far side from
    /// the treated body part, so the first field reaches across the shared junction; it
    /// ends at the body extreme farther away from the junction.
    pub fn from_body(
        frame: Orientation,
        body: &Bounds3,
        junction: &Point3<f64>,
        half_overlap_cm: f64,
    ) -> Self {
        let to_min = (junction.z - body.min.z).abs();
        let to_max = (body.max.z - junction.z).abs();
        let (direction, extreme) = if to_max >= to_min {
            (1.0, body.max.z)
        } else {
            (-1.0, body.min.z)
        };
        let anchor_z = junction.z - direction * half_overlap_cm;
        let anchor = Point3::new(body.center().x, body.center().y, anchor_z);
        Self {
            frame,
            anchor,
            direction,
            length_cm: (extreme - anchor_z).abs(),
        }
    }

    fn point_at(&self, distance: f64) -> Point3<f64> {
        self.anchor + Vector3::new(0.0, 0.0, self.direction * distance)
    }
}

/// Solved isocenter layout of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub frame: Orientation,
    pub count: u32,
    /// Centre-to-centre distance of adjacent isocenters; zero for a single isocenter.
    pub spacing_cm: f64,
    /// Overlap of adjacent fields, `FW − spacing`; zero for a single isocenter.
    pub junction_width_cm: f64,
    /// Ordered closest-to-junction first.
    pub positions: Vec<Point3<f64>>,
    /// Whether the count had to be incremented to satisfy the spacing bound.
    pub incremented: bool,
}

impl Layout {
    pub fn isocenters(&self) -> Vec<Isocenter> {
        link_chain(self.frame, &self.positions)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IsocenterLayoutSolver {
    config: LayoutConfig,
}

impl IsocenterLayoutSolver {
    pub fn new(config: LayoutConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Upper bound on isocenter spacing, `FW − O`.
    pub fn max_spacing(&self) -> f64 {
        self.config.field_width_cm - self.config.limits.min_overlap_cm
    }

    pub fn solve(&self, span: &FrameSpan) -> Result<Layout, EngineError> {
        let frame = span.frame;
        let length = span.length_cm;
        let field_width = self.config.field_width_cm;

        if !(length.is_finite() && length > 0.0) {
            return Err(EngineError::GeometricConstraint {
                frame,
                reason: format!("treatable length must be positive, got {length:.2} cm"),
            });
        }
        if length > self.config.limits.max_length_cm {
            return Err(EngineError::GeometricConstraint {
                frame,
                reason: format!(
                    "treatable length {:.2} cm exceeds the frame maximum of {:.2} cm",
                    length, self.config.limits.max_length_cm
                ),
            });
        }

        if length <= field_width {
            info!(%frame, length, "Treatable length fits a single field.");
            return Ok(Layout {
                frame,
                count: 1,
                spacing_cm: 0.0,
                junction_width_cm: 0.0,
                positions: vec![span.point_at(length / 2.0)],
                incremented: false,
            });
        }

        let first_candidate = (length / self.max_spacing()).ceil() as u32;
        let (count, spacing, incremented) = self.settle(frame, length, first_candidate)?;

        if count > self.config.limits.max_isocenters {
            return Err(EngineError::GeometricConstraint {
                frame,
                reason: format!(
                    "{count} isocenters needed, frame allows at most {}",
                    self.config.limits.max_isocenters
                ),
            });
        }

        let positions = (0..count)
            .map(|k| span.point_at(field_width / 2.0 + k as f64 * spacing))
            .collect();

        info!(
            %frame,
            count,
            spacing_cm = spacing,
            junction_width_cm = field_width - spacing,
            "Isocenter layout solved."
        );
        Ok(Layout {
            frame,
            count,
            spacing_cm: spacing,
            junction_width_cm: field_width - spacing,
            positions,
            incremented,
        })
    }

    /// Checks the spacing bound for `candidate`, allowing exactly one increment.
    ///
    /// `solve` passes `c = ⌈L/(FW − O)⌉`. Then `(FW − O)(c − 1) ≥ L − (FW − O) ≥ L − FW`,
    /// so its candidate satisfies the bound up to floating-point rounding and the increment
    /// is only reached for smaller candidates.
    fn settle(
        &self,
        frame: Orientation,
        length: f64,
        candidate: u32,
    ) -> Result<(u32, f64, bool), EngineError> {
        let limit = self.max_spacing();
        let count = candidate.max(2);
        let spacing = self.spacing_for(length, count);
        if spacing <= limit + SPACING_TOLERANCE {
            return Ok((count, spacing, false));
        }

        let retry = count + 1;
        let retry_spacing = self.spacing_for(length, retry);
        debug!(
            %frame,
            count,
            spacing,
            retry,
            retry_spacing,
            "Spacing bound violated; retrying with one more isocenter."
        );
        if retry_spacing <= limit + SPACING_TOLERANCE {
            return Ok((retry, retry_spacing, true));
        }
        Err(EngineError::GeometricConstraint {
            frame,
            reason: format!(
                "spacing {retry_spacing:.3} cm with {retry} isocenters still exceeds the limit of {limit:.3} cm"
            ),
        })
    }

    fn spacing_for(&self, length: f64, count: u32) -> f64 {
        (length - self.config.field_width_cm) / (count - 1) as f64
    }
}
