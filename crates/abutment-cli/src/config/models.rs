use abutment::backends::memory::MemoryCase;
use abutment::core::geometry::{Bounds3, RigidTransform, VoxelGrid};
use abutment::core::models::frame::{Frame, Orientation};
use abutment::core::naming;
use abutment::engine::config::PlanConfig;
use abutment::engine::error::EngineError;
use nalgebra::Point3;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSetup {
    pub orientation: Orientation,
    pub body_name: String,
    pub body: Bounds3,
    pub grid: VoxelGrid,
}

/// Geometry of a case, ready to be loaded into the in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseSetup {
    pub primary: FrameSetup,
    pub companion: FrameSetup,
    /// Maps primary-frame coordinates to companion-frame coordinates.
    pub registration: RigidTransform,
    /// Shared junction point in the primary frame.
    pub junction: Point3<f64>,
}

impl CaseSetup {
    /// Builds both frames and a backend holding their body outlines and registration.
    pub fn load(&self) -> Result<(Frame, Frame, MemoryCase), EngineError> {
        let mut case = MemoryCase::new();
        case.add_frame(self.primary.orientation, self.primary.grid.clone())
            .add_frame(self.companion.orientation, self.companion.grid.clone())
            .register_transform(
                self.primary.orientation,
                self.companion.orientation,
                *self.registration.matrix(),
            );
        for setup in [&self.primary, &self.companion] {
            case.insert_box_region(setup.orientation, &setup.body_name, &setup.body)?;
        }

        let mut primary = Frame::new(self.primary.orientation, self.primary.body_name.clone());
        primary.namespace_mut().set_point(
            &naming::junction_point_name(self.primary.orientation),
            self.junction,
        );
        let companion = Frame::new(self.companion.orientation, self.companion.body_name.clone());
        Ok((primary, companion, case))
    }
}

pub struct AppConfig {
    pub plan: PlanConfig,
    /// Distance between a shell level and its band thresholds, in percent.
    pub threshold_step: u32,
    pub case: CaseSetup,
    pub output_dir: PathBuf,
}
