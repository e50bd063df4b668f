use super::{print_plan_summary, print_warnings, write_plan_reports};
use crate::cli::CaseArgs;
use crate::config::builder::{FeatheringOverrides, build_config};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use abutment::engine::progress::ProgressReporter;
use abutment::workflows;
use tracing::info;

pub fn run(args: CaseArgs) -> Result<()> {
    info!("Loading case from {:?}", &args.case);
    let config = build_config(&args, FeatheringOverrides::default())?;
    let (mut primary, mut companion, mut backend) = config.case.load()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Planning junction between {} and {}...", primary.code(), companion.code());
    let plan = workflows::plan::plan_junction(
        &mut primary,
        &mut companion,
        &config.plan,
        &mut backend,
        &reporter,
    )?;

    print_plan_summary(&plan);
    let written = write_plan_reports(&config.output_dir, &plan)?;
    for path in written {
        println!("✓ Report written to: {}", path.display());
    }
    print_warnings(&plan.diagnostics);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{ISOCENTER_REPORT, JOB_REPORT};
    use crate::config::file::tests::CASE;
    use std::path::PathBuf;

    fn args(case: PathBuf, output: PathBuf) -> CaseArgs {
        CaseArgs {
            case,
            output,
            field_width: None,
            min_overlap: None,
            frame_overlap: None,
            levels: None,
            set_values: Vec::new(),
        }
    }

    #[test]
    fn plan_writes_isocenter_and_job_reports() {
        let dir = tempfile::tempdir().unwrap();
        let case = dir.path().join("case.toml");
        std::fs::write(&case, CASE).unwrap();
        let output = dir.path().join("reports");

        run(args(case, output.clone())).unwrap();

        let isocenters = std::fs::read_to_string(output.join(ISOCENTER_REPORT)).unwrap();
        assert!(isocenters.contains("HFS,1,HFS_iso1,HFS_field1,0.0,0.0,72.5,,2"));
        assert_eq!(isocenters.lines().count(), 1 + 3 + 4);
        let jobs = std::fs::read_to_string(output.join(JOB_REPORT)).unwrap();
        assert!(jobs.contains("4,FFS,1,FFS_field1,1,not-started,,"));
    }

    #[test]
    fn missing_case_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(args(dir.path().join("absent.toml"), dir.path().to_path_buf()));
        assert!(matches!(result, Err(crate::error::CliError::CaseFile(_))));
    }
}
