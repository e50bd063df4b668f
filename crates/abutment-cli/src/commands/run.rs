use super::{BAND_REPORT, print_plan_summary, print_warnings, write_plan_reports};
use crate::cli::RunArgs;
use crate::config::builder::{FeatheringOverrides, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use abutment::core::io::report;
use abutment::engine::error::EngineError;
use abutment::engine::ports::DoseEngine;
use abutment::engine::progress::ProgressReporter;
use abutment::workflows::{aggregate, bands, plan};
use tracing::{info, warn};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Loading case from {:?}", &args.case.case);
    let overrides = FeatheringOverrides {
        threshold_step: args.threshold_step,
        min_band_volume: args.min_band_volume,
    };
    let config = build_config(&args.case, overrides)?;
    let (mut primary, mut companion, mut backend) = config.case.load()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Planning junction between {} and {}...", primary.code(), companion.code());
    let mut junction_plan = plan::plan_junction(
        &mut primary,
        &mut companion,
        &config.plan,
        &mut backend,
        &reporter,
    )?;
    print_plan_summary(&junction_plan);

    println!("Optimizing {} field(s)...", junction_plan.jobs().len());
    plan::run_plan(&mut junction_plan, &mut backend, &reporter)?;
    let failed = junction_plan.sequencer.failed().count();
    if failed > 0 {
        warn!(failed, "Some optimizations failed; their fields carry no dose.");
    }

    println!("Feathering dose across the junction shells...");
    let mut resolved = Vec::new();
    for (frame, frame_plan) in [
        (&mut primary, &junction_plan.primary),
        (&mut companion, &junction_plan.companion),
    ] {
        let defs = bands::default_thresholds(&frame_plan.junctions, config.threshold_step)
            .map_err(|e| CliError::Config(e.to_string()))?;
        let dose = backend
            .plan_dose(frame.orientation())
            .map_err(EngineError::from)?;
        let frame_bands = bands::resolve_dose_bands(
            frame,
            &defs,
            &dose,
            &config.plan,
            &mut backend,
            &mut junction_plan.diagnostics,
        )?;
        println!("  {}: {} band(s)", frame.orientation(), frame_bands.len());
        resolved.extend(frame_bands.into_iter().map(|b| (frame.orientation(), b)));
    }

    println!("Summing both frames in {}...", primary.code());
    let total = aggregate::aggregate_dose(
        &primary,
        &companion,
        &config.plan,
        &junction_plan.transforms,
        &mut backend,
    )?;
    let volume = backend
        .get_dose_values(&total.handle, primary.orientation())
        .map_err(EngineError::from)?;
    println!(
        "✓ Total dose {}: maximum {:.2} Gy over {} computed voxel(s)",
        total.handle,
        volume.max(),
        volume.computed_voxels()
    );

    for path in write_plan_reports(&config.output_dir, &junction_plan)? {
        println!("✓ Report written to: {}", path.display());
    }
    let band_path = config.output_dir.join(BAND_REPORT);
    report::write_bands_to_path(&band_path, &resolved)?;
    println!("✓ Report written to: {}", band_path.display());

    print_warnings(&junction_plan.diagnostics);
    Ok(())
}
