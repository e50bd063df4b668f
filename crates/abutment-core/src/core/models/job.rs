use super::dose::DoseHandle;
use super::frame::Orientation;
use nalgebra::Point3;

/// Everything the optimizer needs to plan one field.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub frame: Orientation,
    pub field: String,
    pub isocenter: Point3<f64>,
    pub field_width_cm: f64,
    /// Width of the junctions this field takes part in; the field's dose is feathered
    /// across it.
    pub feather_width_cm: f64,
    /// Target dose per fraction, in Gy.
    pub target_dose_gy: f64,
    /// Field whose committed dose the optimization must account for.
    pub background_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    NotStarted,
    /// The field holds a computed dose. `reused` is set when the job was skipped
    /// because a valid dose already existed.
    Complete { dose: DoseHandle, reused: bool },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationJob {
    /// Global, 1-based position in the optimization order across both frames.
    pub rank: u32,
    pub frame: Orientation,
    /// Index of the isocenter this job plans.
    pub isocenter: u32,
    /// Rank of the job supplying background dose.
    pub background: Option<u32>,
    pub spec: JobSpec,
    pub status: JobStatus,
}

impl OptimizationJob {
    pub fn field(&self) -> &str {
        &self.spec.field
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, JobStatus::Complete { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }

    pub fn dose(&self) -> Option<&DoseHandle> {
        match &self.status {
            JobStatus::Complete { dose, .. } => Some(dose),
            _ => None,
        }
    }
}
