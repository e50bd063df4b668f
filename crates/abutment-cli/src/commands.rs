pub mod plan;
pub mod run;

use crate::error::Result;
use abutment::core::io::report;
use abutment::engine::error::Diagnostics;
use abutment::workflows::plan::JunctionPlan;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ISOCENTER_REPORT: &str = "isocenters.csv";
pub const JOB_REPORT: &str = "jobs.csv";
pub const BAND_REPORT: &str = "bands.csv";

/// Writes the isocenter and job reports of `plan` into `dir`, creating it if needed.
fn write_plan_reports(dir: &Path, plan: &JunctionPlan) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let isocenters: Vec<_> = plan.isocenters().cloned().collect();
    let iso_path = dir.join(ISOCENTER_REPORT);
    report::write_isocenters_to_path(&iso_path, &isocenters)?;
    let job_path = dir.join(JOB_REPORT);
    report::write_jobs_to_path(&job_path, plan.jobs())?;
    info!("Plan reports written to {:?}", dir);
    Ok(vec![iso_path, job_path])
}

fn print_plan_summary(plan: &JunctionPlan) {
    for frame in [&plan.primary, &plan.companion] {
        println!(
            "  {}: {} isocenter(s), spacing {:.2} cm, {} junction(s)",
            frame.frame,
            frame.layout.count,
            frame.layout.spacing_cm,
            frame.junctions.len()
        );
    }
}

fn print_warnings(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    println!("{} warning(s):", diagnostics.warnings().len());
    for warning in diagnostics.warnings() {
        println!("  - {warning}");
    }
}
