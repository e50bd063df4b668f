use crate::core::models::frame::{Frame, Orientation};
use crate::core::models::isocenter::Isocenter;
use crate::core::models::job::OptimizationJob;
use crate::core::models::junction::{Junction, JunctionSite};
use crate::core::naming;
use crate::engine::config::{FrameSettings, PlanConfig};
use crate::engine::error::{Diagnostics, EngineError};
use crate::engine::junction::{JunctionBuilder, JunctionRequest};
use crate::engine::layout::{FrameSpan, IsocenterLayoutSolver, Layout};
use crate::engine::ports::PlanningBackend;
use crate::engine::progress::ProgressReporter;
use crate::engine::sequencer::{FrameJobs, OptimizationSequencer};
use crate::engine::transform::FrameTransform;
use crate::engine::utils::regions::require_region;
use nalgebra::{Point3, center};
use tracing::{info, instrument};

/// Everything planned for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub frame: Orientation,
    /// The shared junction point in this frame's coordinates.
    pub junction_point: Point3<f64>,
    pub layout: Layout,
    pub isocenters: Vec<Isocenter>,
    /// The frame junction first, then the junctions between adjacent isocenters.
    pub junctions: Vec<Junction>,
    /// Regions of the other frame mapped into this one.
    pub mapped_regions: Vec<String>,
}

impl FramePlan {
    pub fn frame_junction(&self) -> Option<&Junction> {
        self.junctions
            .iter()
            .find(|j| j.site == JunctionSite::Frames)
    }

    pub fn shell_names(&self) -> Vec<String> {
        self.junctions
            .iter()
            .flat_map(|j| j.shells.iter().map(|s| s.name.clone()))
            .collect()
    }

    /// Feather width handed to the optimizer for this frame's fields.
    fn feather_width_cm(&self, config: &PlanConfig) -> f64 {
        if self.layout.count > 1 {
            self.layout.junction_width_cm
        } else {
            config.frame_junction_width_cm
        }
    }
}

#[derive(Debug, Clone)]
pub struct JunctionPlan {
    pub primary: FramePlan,
    pub companion: FramePlan,
    pub sequencer: OptimizationSequencer,
    pub transforms: FrameTransform,
    pub diagnostics: Diagnostics,
}

impl JunctionPlan {
    pub fn jobs(&self) -> &[OptimizationJob] {
        self.sequencer.jobs()
    }

    pub fn frame_plan(&self, orientation: Orientation) -> Option<&FramePlan> {
        [&self.primary, &self.companion]
            .into_iter()
            .find(|plan| plan.frame == orientation)
    }

    pub fn isocenters(&self) -> impl Iterator<Item = &Isocenter> {
        self.primary
            .isocenters
            .iter()
            .chain(self.companion.isocenters.iter())
    }
}

/// Checks that the frames match the configured orientations and returns their settings.
pub(crate) fn frame_settings<'a>(
    config: &'a PlanConfig,
    primary: &Frame,
    companion: &Frame,
) -> Result<(&'a FrameSettings, &'a FrameSettings), EngineError> {
    if primary.orientation() != config.primary.orientation {
        return Err(EngineError::Configuration(format!(
            "Primary frame is {}, configuration expects {}",
            primary.orientation(),
            config.primary.orientation
        )));
    }
    if companion.orientation() != config.companion.orientation {
        return Err(EngineError::Configuration(format!(
            "Companion frame is {}, configuration expects {}",
            companion.orientation(),
            config.companion.orientation
        )));
    }
    config.primary.prescription.validate()?;
    config.companion.prescription.validate()?;
    Ok((&config.primary, &config.companion))
}

/// Lays out both frames, builds every junction's shells and orders the optimizations.
///
/// Nothing is created until the frames, prescriptions, body outlines, shared junction
/// point and registration have all been checked.
#[instrument(skip_all, name = "plan_junction")]
pub fn plan_junction<B: PlanningBackend + ?Sized>(
    primary: &mut Frame,
    companion: &mut Frame,
    config: &PlanConfig,
    backend: &mut B,
    reporter: &ProgressReporter,
) -> Result<JunctionPlan, EngineError> {
    // === Phase 0: Prerequisites ===
    let (primary_settings, companion_settings) = frame_settings(config, primary, companion)?;
    let (transforms, junction_name) = reporter.phase("Checking Prerequisites", || -> Result<_, EngineError> {
        info!("Checking frames, body outlines, junction point and registration.");
        require_region(primary, &*backend, primary.body())?;
        require_region(companion, &*backend, companion.body())?;
        let junction_name = naming::junction_point_name(primary.orientation());
        if primary.namespace().point(&junction_name).is_none() {
            return Err(EngineError::Configuration(format!(
                "Shared junction point '{junction_name}' is missing in frame {}",
                primary.orientation()
            )));
        }
        let transforms =
            FrameTransform::from_registration(&*backend, primary.orientation(), companion.orientation())?;
        Ok((transforms, junction_name))
    })?;
    let mut diagnostics = Diagnostics::new();

    // === Phase 1: Shared junction point ===
    let primary_point = primary
        .namespace()
        .point(&junction_name)
        .map(|p| p.position)
        .ok_or_else(|| EngineError::Internal("junction point vanished".to_string()))?;
    let companion_point = transforms.carry_point(
        &*backend,
        primary,
        companion,
        &junction_name,
        &naming::junction_point_name(companion.orientation()),
    )?;

    // === Phase 2: Isocenter layout ===
    let (primary_layout, companion_layout) = reporter.phase("Isocenter Layout", || -> Result<_, EngineError> {
        let p = lay_out(primary, &*backend, config, primary_settings, &primary_point)?;
        let c = lay_out(companion, &*backend, config, companion_settings, &companion_point)?;
        Ok((p, c))
    })?;

    // === Phase 3: Junction shells ===
    let builder = JunctionBuilder::new(config.junction)?;
    let (primary_plan, mut companion_plan) =
        reporter.phase("Junction Shells", || -> Result<_, EngineError> {
            let p = build_frame_plan(
                primary,
                backend,
                &builder,
                config,
                primary_layout,
                primary_point,
                &mut diagnostics,
            )?;
            let c = build_frame_plan(
                companion,
                backend,
                &builder,
                config,
                companion_layout,
                companion_point,
                &mut diagnostics,
            )?;
            Ok((p, c))
        })?;

    // === Phase 4: Shared frame junction ===
    let shared: Vec<String> = primary_plan
        .frame_junction()
        .map(|j| j.shells.iter().map(|s| s.name.clone()).collect())
        .unwrap_or_default();
    companion_plan.mapped_regions = transforms
        .map_regions(backend, primary, companion, &shared, &mut diagnostics)?
        .into_iter()
        .flatten()
        .collect();

    // === Phase 5: Optimization order ===
    let sequencer = OptimizationSequencer::build(
        FrameJobs {
            frame: primary.orientation(),
            isocenters: &primary_plan.isocenters,
            field_width_cm: config.field_width_cm,
            feather_width_cm: primary_plan.feather_width_cm(config),
            prescription: primary_settings.prescription,
        },
        FrameJobs {
            frame: companion.orientation(),
            isocenters: &companion_plan.isocenters,
            field_width_cm: config.field_width_cm,
            feather_width_cm: companion_plan.feather_width_cm(config),
            prescription: companion_settings.prescription,
        },
    )?;

    info!(
        primary_isocenters = primary_plan.isocenters.len(),
        companion_isocenters = companion_plan.isocenters.len(),
        jobs = sequencer.jobs().len(),
        warnings = diagnostics.warnings().len(),
        "Junction plan complete."
    );
    Ok(JunctionPlan {
        primary: primary_plan,
        companion: companion_plan,
        sequencer,
        transforms,
        diagnostics,
    })
}

/// Runs the plan's optimization jobs against the dose engine.
#[instrument(skip_all, name = "run_plan")]
pub fn run_plan<B: PlanningBackend + ?Sized>(
    plan: &mut JunctionPlan,
    backend: &mut B,
    reporter: &ProgressReporter,
) -> Result<(), EngineError> {
    reporter.phase("Optimization", || {
        plan.sequencer
            .execute(backend, &mut plan.diagnostics, reporter)
    })?;
    let failed = plan.sequencer.failed().count();
    info!(
        jobs = plan.jobs().len(),
        failed, "Optimization sequence finished."
    );
    Ok(())
}

fn lay_out<B: PlanningBackend + ?Sized>(
    frame: &Frame,
    backend: &B,
    config: &PlanConfig,
    settings: &FrameSettings,
    junction_point: &Point3<f64>,
) -> Result<Layout, EngineError> {
    let body = require_region(frame, backend, frame.body())?;
    let span = FrameSpan::from_body(
        frame.orientation(),
        &body,
        junction_point,
        config.frame_junction_width_cm / 2.0,
    );
    IsocenterLayoutSolver::new(config.layout_for(settings.orientation))?.solve(&span)
}

fn build_frame_plan<B: PlanningBackend + ?Sized>(
    frame: &mut Frame,
    backend: &mut B,
    builder: &JunctionBuilder,
    config: &PlanConfig,
    layout: Layout,
    junction_point: Point3<f64>,
    diagnostics: &mut Diagnostics,
) -> Result<FramePlan, EngineError> {
    let orientation = frame.orientation();
    let reversed = orientation.counts_reversed();
    let isocenters = layout.isocenters();
    for iso in &isocenters {
        frame.namespace_mut().set_point(&iso.name, iso.position);
    }

    let mut junctions = Vec::with_capacity(isocenters.len());
    junctions.push(builder.build(
        frame,
        backend,
        &JunctionRequest {
            site: JunctionSite::Frames,
            location: junction_point,
            width_cm: config.frame_junction_width_cm,
            reversed,
        },
        diagnostics,
    )?);
    for pair in isocenters.windows(2) {
        let (inner, outer) = (&pair[0], &pair[1]);
        junctions.push(builder.build(
            frame,
            backend,
            &JunctionRequest {
                site: JunctionSite::Isocenters {
                    inner: inner.index,
                    outer: outer.index,
                },
                location: center(&inner.position, &outer.position),
                width_cm: layout.junction_width_cm,
                reversed,
            },
            diagnostics,
        )?);
    }

    Ok(FramePlan {
        frame: orientation,
        junction_point,
        layout,
        isocenters,
        junctions,
        mapped_regions: Vec::new(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backends::memory::MemoryCase;
    use crate::core::geometry::{Bounds3, VoxelGrid};
    use crate::core::models::job::JobStatus;
    use crate::engine::config::{FrameLimits, PlanConfigBuilder, Prescription};
    use crate::engine::ports::{BackendError, StructureAlgebra};
    use nalgebra::{Matrix4, Vector3};
    use crate::core::registry::RegionKind;
    use crate::engine::progress::Progress;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    const HFS: Orientation = Orientation::HeadFirstSupine;
    const FFS: Orientation = Orientation::FeetFirstSupine;

    pub(crate) fn config() -> PlanConfig {
        let settings = |orientation, fractions| FrameSettings {
            orientation,
            limits: FrameLimits::default(),
            prescription: Prescription::new(2.0 * fractions as f64, fractions).unwrap(),
        };
        PlanConfigBuilder::new()
            .field_width_cm(40.0)
            .frame_junction_width_cm(5.0)
            .junction(Default::default())
            .feathering(Default::default())
            .primary(settings(HFS, 10))
            .companion(settings(FFS, 5))
            .build()
            .unwrap()
    }

    /// Head-first body from z = 0 to 100 with the junction at z = 90; the feet-first
    /// frame sees the same patient shifted by 20 cm and treats the legs beyond it.
    pub(crate) fn case() -> (Frame, Frame, MemoryCase) {
        let grid = VoxelGrid::new(
            Point3::new(-12.0, -12.0, -10.0),
            Vector3::new(2.0, 2.0, 0.5),
            [12, 12, 300],
        );
        let mut case = MemoryCase::new();
        case.add_frame(HFS, grid.clone())
            .add_frame(FFS, grid)
            .register_transform(
                HFS,
                FFS,
                Matrix4::new_translation(&Vector3::new(0.0, 0.0, -80.0)),
            );
        case.insert_box_region(
            HFS,
            "Body",
            &Bounds3::new(Point3::new(-8.0, -8.0, 0.0), Point3::new(8.0, 8.0, 100.0)),
        )
        .unwrap();
        case.insert_box_region(
            FFS,
            "Body",
            &Bounds3::new(Point3::new(-8.0, -8.0, 0.0), Point3::new(8.0, 8.0, 130.0)),
        )
        .unwrap();

        let mut primary = Frame::new(HFS, "Body");
        primary
            .namespace_mut()
            .set_point("HFS_junction", Point3::new(0.0, 0.0, 90.0));
        (primary, Frame::new(FFS, "Body"), case)
    }

    #[test]
    fn plan_lays_out_both_frames_from_the_shared_junction() {
        let (mut primary, mut companion, mut case) = case();
        let plan = plan_junction(
            &mut primary,
            &mut companion,
            &config(),
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap();

        // HFS: junction at 90, span from 92.5 down to 0 → 92.5 cm → 3 isocenters.
        assert_eq!(plan.primary.isocenters.len(), 3);
        assert_eq!(plan.primary.isocenters[0].position.z, 72.5);
        // FFS: junction carried to z = 10, span from 7.5 up to 130 → 122.5 cm → 4 isocenters.
        assert_eq!(plan.companion.junction_point, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(plan.companion.isocenters.len(), 4);
        assert_eq!(plan.companion.isocenters[0].position.z, 27.5);

        assert_eq!(plan.primary.junctions.len(), 3);
        assert_eq!(plan.companion.junctions.len(), 4);
        assert!(plan.primary.frame_junction().is_some());
        assert!(
            primary.namespace().point("HFS_iso3").is_some()
                && companion.namespace().point("FFS_junction").is_some()
        );

        let ranks: HashSet<u32> = plan.jobs().iter().map(|j| j.rank).collect();
        assert_eq!(ranks.len(), 7);
        assert_eq!(plan.jobs()[3].field(), "FFS_field1");
        assert_eq!(plan.jobs()[3].background, Some(1));
    }

    #[test]
    fn frame_junction_shells_follow_frame_orientation() {
        let (mut primary, mut companion, mut case) = case();
        let plan = plan_junction(
            &mut primary,
            &mut companion,
            &config(),
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap();

        let hfs = plan.primary.frame_junction().unwrap();
        let ffs = plan.companion.frame_junction().unwrap();
        assert!(!hfs.reversed && ffs.reversed);
        assert_eq!(hfs.shells[0].level, 10);
        assert_eq!(ffs.shells[0].level, 90);
        assert!(case.has_contours(HFS, "HFS_frame_junction_50"));
        assert!(case.has_contours(FFS, "FFS_frame_junction_50"));
        assert!(
            plan.companion
                .mapped_regions
                .contains(&"HFS_frame_junction_50".to_string())
        );
        assert!(case.has_contours(FFS, "HFS_frame_junction_50"));
    }

    #[test]
    fn replanning_reuses_every_region() {
        let (mut primary, mut companion, mut case) = case();
        let config = config();
        let first = plan_junction(
            &mut primary,
            &mut companion,
            &config,
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap();
        let regions = case.region_names(HFS);
        let second = plan_junction(
            &mut primary,
            &mut companion,
            &config,
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(case.region_names(HFS), regions);
        assert_eq!(first.primary, second.primary);
        assert_eq!(first.sequencer, second.sequencer);
    }

    #[test]
    fn missing_junction_point_fails_before_any_region_is_created() {
        let (_, mut companion, mut case) = case();
        let mut primary = Frame::new(HFS, "Body");
        let err = plan_junction(
            &mut primary,
            &mut companion,
            &config(),
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert_eq!(case.region_names(HFS), vec!["Body".to_string()]);
    }

    #[test]
    fn swapped_frames_are_a_configuration_error() {
        let (mut primary, mut companion, mut case) = case();
        let err = plan_junction(
            &mut companion,
            &mut primary,
            &config(),
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn run_plan_completes_every_job() {
        let (mut primary, mut companion, mut case) = case();
        let mut plan = plan_junction(
            &mut primary,
            &mut companion,
            &config(),
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap();
        run_plan(&mut plan, &mut case, &ProgressReporter::new()).unwrap();

        assert!(plan.jobs().iter().all(|j| matches!(
            j.status,
            JobStatus::Complete { reused: false, .. }
        )));
        assert_eq!(case.optimization_log().len(), 7);
    }

    #[test]
    fn run_plan_surfaces_prerequisite_failures() {
        let (mut primary, mut companion, mut case) = case();
        let mut plan = plan_junction(
            &mut primary,
            &mut companion,
            &config(),
            &mut case,
            &ProgressReporter::new(),
        )
        .unwrap();
        case.fail_optimization(
            "FFS_field1",
            BackendError::Prerequisite("no target in FFS".to_string()),
        );
        let err = run_plan(&mut plan, &mut case, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn companion_shells_are_built_inside_the_shell_phase() {
        let (mut primary, mut companion, mut case) = case();
        companion
            .namespace_mut()
            .register_locked("FFS_frame_junction_50", RegionKind::Shell);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p: Progress| {
            sink.lock().unwrap().push(format!("{p:?}"));
        }));

        let err = plan_junction(&mut primary, &mut companion, &config(), &mut case, &reporter)
            .unwrap_err();
        assert!(matches!(err, EngineError::IdempotencyConflict { .. }));

        // The companion failure leaves the shell phase open.
        let events = events.lock().unwrap();
        assert_eq!(
            events.last().map(String::as_str),
            Some("PhaseStart { name: \"Junction Shells\" }")
        );
    }
}
