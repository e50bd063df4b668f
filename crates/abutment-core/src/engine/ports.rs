//! Boundaries to the external collaborators: the structure-algebra engine, the
//! registration service and the optimization/dose engine.
//!
//! The engine only ever talks to these traits. Every call is blocking; a single session
//! owns the collaborators for its whole lifetime.

use crate::core::geometry::{Bounds3, RigidTransform, VoxelGrid};
use crate::core::models::dose::{DoseEvaluation, DoseHandle, DoseVolume};
use crate::core::models::frame::Orientation;
use crate::core::models::job::JobSpec;
use nalgebra::{Matrix4, Point3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("Region '{name}' not found in frame {frame}")]
    RegionNotFound { frame: Orientation, name: String },

    #[error("Field '{0}' not found")]
    FieldNotFound(String),

    #[error("Frame {0} is not known to the collaborator")]
    FrameNotFound(Orientation),

    #[error("Dose '{0}' not found")]
    DoseNotFound(String),

    /// A recoverable failure of one optimization.
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// A failure no later job can recover from, such as a missing objective region.
    #[error("Missing prerequisite: {0}")]
    Prerequisite(String),

    #[error("No registration between {from} and {to}")]
    NoRegistration { from: Orientation, to: Orientation },

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// How the sources of one operand are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOp {
    Union,
    Intersection,
}

/// How the two operands of a composition are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOp {
    /// Only operand A is used.
    None,
    Union,
    Intersection,
    Subtraction,
}

/// One side of a composition: sources combined by `op`, then grown by `margin_cm`
/// (negative margins contract).
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub sources: Vec<String>,
    pub op: CombineOp,
    pub margin_cm: f64,
}

impl Operand {
    pub fn union<S: AsRef<str>>(sources: &[S]) -> Self {
        Self {
            sources: sources.iter().map(|s| s.as_ref().to_string()).collect(),
            op: CombineOp::Union,
            margin_cm: 0.0,
        }
    }

    pub fn intersection<S: AsRef<str>>(sources: &[S]) -> Self {
        Self {
            sources: sources.iter().map(|s| s.as_ref().to_string()).collect(),
            op: CombineOp::Intersection,
            margin_cm: 0.0,
        }
    }

    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            op: CombineOp::Union,
            margin_cm: 0.0,
        }
    }

    pub fn with_margin(mut self, margin_cm: f64) -> Self {
        self.margin_cm = margin_cm;
        self
    }
}

/// `result = (A opA marginA) resultOp (B opB marginB)`, then grown by `result_margin_cm`.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub a: Operand,
    pub b: Operand,
    pub result_op: ResultOp,
    pub result_margin_cm: f64,
}

impl Composition {
    pub fn only(a: Operand) -> Self {
        Self {
            a,
            b: Operand::empty(),
            result_op: ResultOp::None,
            result_margin_cm: 0.0,
        }
    }

    pub fn intersect<S: AsRef<str>>(sources: &[S]) -> Self {
        Self::only(Operand::intersection(sources))
    }

    /// `A − B`; falls back to plain `A` when `b` has no sources.
    pub fn subtract(a: Operand, b: Operand) -> Self {
        let result_op = if b.sources.is_empty() {
            ResultOp::None
        } else {
            ResultOp::Subtraction
        };
        Self {
            a,
            b,
            result_op,
            result_margin_cm: 0.0,
        }
    }
}

pub trait StructureAlgebra {
    /// Ensures an (initially empty) region with this name exists.
    fn get_or_create(&mut self, frame: Orientation, name: &str) -> Result<(), BackendError>;

    /// Replaces the contents of `name` with the evaluated composition.
    fn compose(
        &mut self,
        frame: Orientation,
        name: &str,
        composition: &Composition,
    ) -> Result<(), BackendError>;

    /// Replaces the contents of `name` with an axis-aligned box.
    fn create_box(
        &mut self,
        frame: Orientation,
        name: &str,
        bounds: &Bounds3,
    ) -> Result<(), BackendError>;

    /// Replaces the contents of `name` with `{dose ≥ threshold_gy}`.
    fn create_from_dose(
        &mut self,
        frame: Orientation,
        name: &str,
        dose: &DoseVolume,
        threshold_gy: f64,
    ) -> Result<(), BackendError>;

    fn delete(&mut self, frame: Orientation, name: &str) -> Result<(), BackendError>;

    fn has_contours(&self, frame: Orientation, name: &str) -> bool;

    /// Drops the connected parts of `name` whose volume lies outside `[min_cc, max_cc]`.
    fn volume_threshold(
        &mut self,
        frame: Orientation,
        name: &str,
        min_cc: f64,
        max_cc: f64,
    ) -> Result<(), BackendError>;

    /// Per-axis extent of the region, `None` when it has no contours.
    fn bounding_box(&self, frame: Orientation, name: &str) -> Option<Bounds3>;
}

pub trait RegistrationService {
    fn get_transform(&self, from: Orientation, to: Orientation) -> Option<Matrix4<f64>>;

    fn map_points(
        &self,
        points: &[Point3<f64>],
        from: Orientation,
        to: Orientation,
    ) -> Result<Vec<Point3<f64>>, BackendError>;

    /// Maps each named region into the target frame under the same name. The returned
    /// flags are per region; `false` means no target region was produced.
    fn map_regions(
        &mut self,
        names: &[String],
        from: Orientation,
        to: Orientation,
    ) -> Result<Vec<bool>, BackendError>;
}

pub trait DoseEngine {
    /// Optimizes one field and returns its identifier.
    fn run_optimization(&mut self, spec: &JobSpec) -> Result<String, BackendError>;

    fn compute_dose(&mut self, field: &str) -> Result<DoseHandle, BackendError>;

    /// Whether the field already carries a complete, non-empty, up-to-date dose.
    fn has_valid_dose(&self, field: &str) -> bool;

    /// Handle of the field's up-to-date dose, if one exists.
    fn current_dose(&self, field: &str) -> Option<DoseHandle>;

    /// Fields of the frame whose dose no longer matches their plan or grid.
    fn stale_fields(&self, frame: Orientation) -> Vec<String>;

    fn get_dose_values(
        &self,
        dose: &DoseHandle,
        frame: Orientation,
    ) -> Result<DoseVolume, BackendError>;

    /// Summed per-fraction dose of every field planned in the frame.
    fn plan_dose(&mut self, frame: Orientation) -> Result<DoseHandle, BackendError>;

    fn dose_grid(&self, frame: Orientation) -> Result<VoxelGrid, BackendError>;

    /// Replaces the frame's dose grid. Doses computed on the old grid become stale.
    fn set_dose_grid(&mut self, frame: Orientation, grid: VoxelGrid) -> Result<(), BackendError>;

    /// Existing evaluations of `source`'s plan dose on `target`'s grid.
    fn dose_evaluations(&self, source: Orientation, target: Orientation) -> Vec<DoseEvaluation>;

    /// Evaluates `source`'s plan dose on `target`'s grid through `transform` (source → target).
    fn evaluate_on(
        &mut self,
        source: Orientation,
        target: Orientation,
        transform: &RigidTransform,
    ) -> Result<DoseHandle, BackendError>;

    /// Weighted sum of doses on the frame's grid.
    fn sum_doses(
        &mut self,
        frame: Orientation,
        doses: &[(DoseHandle, f64)],
    ) -> Result<DoseHandle, BackendError>;
}

/// Convenience bound for workflows that need every collaborator at once.
pub trait PlanningBackend: StructureAlgebra + RegistrationService + DoseEngine {}

impl<T: StructureAlgebra + RegistrationService + DoseEngine + ?Sized> PlanningBackend for T {}
