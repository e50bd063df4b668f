use super::defaults::DefaultsConfig;
use super::file::{CaseFile, FileFrame, FileGrid, FilePlanConfig};
use super::models::{AppConfig, CaseSetup, FrameSetup};
use crate::cli::CaseArgs;
use crate::error::{CliError, Result};
use abutment::core::geometry::{Bounds3, RigidTransform, VoxelGrid};
use abutment::core::models::frame::{Orientation, ParseOrientationError};
use abutment::engine::config::{
    FeatheringConfig, FrameLimits, FrameSettings, JunctionConfig, PlanConfigBuilder, Prescription,
};
use nalgebra::{Point3, Rotation3, Vector3};
use tracing::debug;

/// Feathering overrides only the `run` subcommand accepts.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeatheringOverrides {
    pub threshold_step: Option<u32>,
    pub min_band_volume: Option<f64>,
}

pub fn build_config(args: &CaseArgs, overrides: FeatheringOverrides) -> Result<AppConfig> {
    let case = CaseFile::from_file(&args.case)?;
    build_from_case(case, args, overrides)
}

/// Merges a parsed case with the command line; CLI values win over `-S` values, which
/// win over the case file, which wins over the defaults.
pub fn build_from_case(
    mut case: CaseFile,
    args: &CaseArgs,
    overrides: FeatheringOverrides,
) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    apply_set_values(&mut case.plan, &args.set_values)?;
    let plan_file = &case.plan;

    let field_width = args
        .field_width
        .or(plan_file.field_width)
        .unwrap_or(defaults.field_width_cm);
    let frame_overlap = args
        .frame_overlap
        .or(plan_file.frame_overlap)
        .unwrap_or(defaults.frame_overlap_cm);
    let threshold_step = overrides
        .threshold_step
        .or(plan_file.threshold_step)
        .unwrap_or(defaults.threshold_step);

    let junction = JunctionConfig {
        levels: args.levels.or(plan_file.levels).unwrap_or(defaults.levels),
        transverse_margin_cm: plan_file
            .transverse_margin
            .unwrap_or(defaults.transverse_margin_cm),
    };
    let feathering = FeatheringConfig {
        min_band_volume_cc: overrides
            .min_band_volume
            .or(plan_file.min_band_volume)
            .unwrap_or(defaults.min_band_volume_cc),
        max_band_volume_cc: plan_file.max_band_volume.unwrap_or(f64::INFINITY),
    };

    let primary = frame_settings(&case.primary, plan_file, args, &defaults)?;
    let companion = frame_settings(&case.companion, plan_file, args, &defaults)?;

    let plan = PlanConfigBuilder::new()
        .field_width_cm(field_width)
        .frame_junction_width_cm(frame_overlap)
        .junction(junction)
        .feathering(feathering)
        .primary(primary)
        .companion(companion)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!(?plan, threshold_step, "Plan configuration assembled.");

    let junction_point = case.primary.junction.ok_or_else(|| {
        CliError::Config("`primary.junction` is required to place the shared junction.".to_string())
    })?;
    let setup = CaseSetup {
        primary: frame_setup(&case.primary, case.grid.as_ref(), primary.orientation)?,
        companion: frame_setup(&case.companion, case.grid.as_ref(), companion.orientation)?,
        registration: registration(&case),
        junction: Point3::from(junction_point),
    };

    Ok(AppConfig {
        plan,
        threshold_step,
        case: setup,
        output_dir: args.output.clone(),
    })
}

fn parse_orientation(frame: &FileFrame) -> Result<Orientation> {
    frame
        .orientation
        .parse()
        .map_err(|e: ParseOrientationError| CliError::Config(e.to_string()))
}

fn frame_settings(
    frame: &FileFrame,
    plan_file: &FilePlanConfig,
    args: &CaseArgs,
    defaults: &DefaultsConfig,
) -> Result<FrameSettings> {
    let orientation = parse_orientation(frame)?;
    let prescription = Prescription::new(frame.total_dose, frame.fractions)
        .map_err(|e| CliError::Config(format!("{orientation}: {e}")))?;
    let limits = FrameLimits {
        min_overlap_cm: args
            .min_overlap
            .or(frame.min_overlap)
            .or(plan_file.min_overlap)
            .unwrap_or(defaults.min_overlap_cm),
        max_length_cm: frame.max_length.unwrap_or(defaults.max_length_cm),
        max_isocenters: frame.max_isocenters.unwrap_or(defaults.max_isocenters),
    };
    Ok(FrameSettings {
        orientation,
        limits,
        prescription,
    })
}

fn frame_setup(
    frame: &FileFrame,
    shared_grid: Option<&FileGrid>,
    orientation: Orientation,
) -> Result<FrameSetup> {
    let grid = frame.grid.as_ref().or(shared_grid).ok_or_else(|| {
        CliError::Config(format!(
            "Frame {orientation} has no dose grid; add a top-level `[grid]` or one for the frame."
        ))
    })?;
    if grid.counts.contains(&0) || grid.voxel_size.iter().any(|s| !(*s > 0.0)) {
        return Err(CliError::Config(format!(
            "Dose grid of frame {orientation} needs positive voxel sizes and counts."
        )));
    }
    Ok(FrameSetup {
        orientation,
        body_name: frame.body.name.clone(),
        body: Bounds3::new(Point3::from(frame.body.min), Point3::from(frame.body.max)),
        grid: VoxelGrid::new(
            Point3::from(grid.corner),
            Vector3::from(grid.voxel_size),
            grid.counts,
        ),
    })
}

fn registration(case: &CaseFile) -> RigidTransform {
    let [rx, ry, rz] = case.registration.rotation.map(f64::to_radians);
    RigidTransform::from_parts(
        Rotation3::from_euler_angles(rx, ry, rz),
        Vector3::from(case.registration.translation),
    )
}

fn apply_set_values(plan: &mut FilePlanConfig, set_values: &[String]) -> Result<()> {
    for kv_pair in set_values {
        let (key, value_str) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;

        let float = || -> Result<f64> {
            value_str.parse().map_err(|_| {
                CliError::Config(format!("Invalid float value for {}: {}", key, value_str))
            })
        };
        let integer = || -> Result<u32> {
            value_str.parse().map_err(|_| {
                CliError::Config(format!("Invalid integer value for {}: {}", key, value_str))
            })
        };

        match key {
            "plan.field-width" => plan.field_width = Some(float()?),
            "plan.min-overlap" => plan.min_overlap = Some(float()?),
            "plan.frame-overlap" => plan.frame_overlap = Some(float()?),
            "plan.levels" => plan.levels = Some(integer()?),
            "plan.transverse-margin" => plan.transverse_margin = Some(float()?),
            "plan.threshold-step" => plan.threshold_step = Some(integer()?),
            "plan.min-band-volume" => plan.min_band_volume = Some(float()?),
            "plan.max-band-volume" => plan.max_band_volume = Some(float()?),
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(())
}
