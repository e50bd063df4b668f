use super::config::Prescription;
use super::error::{Diagnostics, EngineError, Warning};
use super::ports::{BackendError, DoseEngine};
use super::progress::{JobOutcome, Progress, ProgressReporter};
use crate::core::models::dose::DoseHandle;
use crate::core::models::frame::Orientation;
use crate::core::models::isocenter::Isocenter;
use crate::core::models::job::{JobSpec, JobStatus, OptimizationJob};
use std::collections::HashMap;
use tracing::{info, warn};

/// Per-frame inputs to the job order.
#[derive(Debug, Clone, Copy)]
pub struct FrameJobs<'a> {
    pub frame: Orientation,
    /// Closest to the shared junction first.
    pub isocenters: &'a [Isocenter],
    pub field_width_cm: f64,
    pub feather_width_cm: f64,
    pub prescription: Prescription,
}

/// Ranked, chained optimization jobs across both frames.
///
/// The primary frame's jobs come first, innermost outward; the companion frame's jobs
/// follow and its innermost job takes the primary's innermost field as background.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSequencer {
    jobs: Vec<OptimizationJob>,
}

impl OptimizationSequencer {
    pub fn build(primary: FrameJobs<'_>, companion: FrameJobs<'_>) -> Result<Self, EngineError> {
        if primary.isocenters.is_empty() {
            return Err(EngineError::Configuration(format!(
                "Frame {} has no isocenters to optimize",
                primary.frame
            )));
        }
        if primary.frame == companion.frame {
            return Err(EngineError::Configuration(format!(
                "Primary and companion frames must differ, both are {}",
                primary.frame
            )));
        }

        let mut jobs = Vec::new();
        let mut ranks: HashMap<(Orientation, u32), u32> = HashMap::new();
        for input in [primary, companion] {
            for iso in input.isocenters {
                let rank = jobs.len() as u32 + 1;
                let background = match iso.inward {
                    Some(inward) => ranks.get(&(input.frame, inward)).copied(),
                    None if input.frame == companion.frame => {
                        ranks.get(&(primary.frame, 1)).copied()
                    }
                    None => None,
                };
                ranks.insert((input.frame, iso.index), rank);
                jobs.push(OptimizationJob {
                    rank,
                    frame: input.frame,
                    isocenter: iso.index,
                    background,
                    spec: JobSpec {
                        frame: input.frame,
                        field: iso.field.clone(),
                        isocenter: iso.position,
                        field_width_cm: input.field_width_cm,
                        feather_width_cm: input.feather_width_cm,
                        target_dose_gy: input.prescription.dose_per_fraction_gy(),
                        background_field: None,
                    },
                    status: JobStatus::NotStarted,
                });
            }
        }
        info!(jobs = jobs.len(), "Optimization order built.");
        Ok(Self { jobs })
    }

    pub fn jobs(&self) -> &[OptimizationJob] {
        &self.jobs
    }

    pub fn job(&self, rank: u32) -> Option<&OptimizationJob> {
        self.jobs.iter().find(|job| job.rank == rank)
    }

    pub fn into_jobs(self) -> Vec<OptimizationJob> {
        self.jobs
    }

    pub fn failed(&self) -> impl Iterator<Item = &OptimizationJob> {
        self.jobs.iter().filter(|job| job.is_failed())
    }

    /// Runs every job in rank order.
    ///
    /// A job whose field already carries a valid dose is marked complete without
    /// re-optimizing. A failed job only degrades the jobs chained to it; a missing
    /// prerequisite aborts the whole run.
    pub fn execute<D: DoseEngine + ?Sized>(
        &mut self,
        engine: &mut D,
        diagnostics: &mut Diagnostics,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        reporter.report(Progress::TaskStart {
            total_steps: self.jobs.len() as u64,
        });
        for idx in 0..self.jobs.len() {
            let background_field = self.background_field(idx, diagnostics);
            let job = &mut self.jobs[idx];
            job.spec.background_field = background_field;

            let outcome = if let Some(dose) = engine
                .has_valid_dose(job.field())
                .then(|| engine.current_dose(job.field()))
                .flatten()
            {
                info!(rank = job.rank, field = %job.field(), "Field already has dose; skipping.");
                job.status = JobStatus::Complete { dose, reused: true };
                JobOutcome::Reused
            } else {
                match optimize(engine, &job.spec) {
                    Ok(dose) => {
                        info!(rank = job.rank, field = %job.field(), "Field optimized.");
                        job.status = JobStatus::Complete {
                            dose,
                            reused: false,
                        };
                        JobOutcome::Optimized
                    }
                    Err(BackendError::Prerequisite(reason)) => {
                        job.status = JobStatus::Failed {
                            reason: reason.clone(),
                        };
                        return Err(EngineError::Configuration(format!(
                            "Job {} ({}) is missing a prerequisite: {reason}",
                            job.rank,
                            job.field()
                        )));
                    }
                    Err(e) => {
                        warn!(rank = job.rank, field = %job.field(), error = %e, "Optimization failed.");
                        job.status = JobStatus::Failed {
                            reason: e.to_string(),
                        };
                        JobOutcome::Failed
                    }
                }
            };

            reporter.report(Progress::JobFinished {
                rank: job.rank,
                field: job.field().to_string(),
                outcome,
            });
            reporter.report(Progress::TaskIncrement);
        }
        reporter.report(Progress::TaskFinish);
        Ok(())
    }

    /// Background field for job `idx`, or `None` with a degradation warning when the
    /// background job did not produce a dose.
    fn background_field(&self, idx: usize, diagnostics: &mut Diagnostics) -> Option<String> {
        let job = &self.jobs[idx];
        let background = job.background?;
        let Some(bg_job) = self.job(background) else {
            diagnostics.push(Warning::SequencingDegradation {
                rank: job.rank,
                background,
                reason: "background job does not exist".to_string(),
            });
            return None;
        };
        match &bg_job.status {
            JobStatus::Complete { .. } => Some(bg_job.field().to_string()),
            JobStatus::Failed { reason } => {
                diagnostics.push(Warning::SequencingDegradation {
                    rank: job.rank,
                    background,
                    reason: reason.clone(),
                });
                None
            }
            JobStatus::NotStarted => {
                diagnostics.push(Warning::SequencingDegradation {
                    rank: job.rank,
                    background,
                    reason: "background job has not run".to_string(),
                });
                None
            }
        }
    }
}

fn optimize<D: DoseEngine + ?Sized>(
    engine: &mut D,
    spec: &JobSpec,
) -> Result<DoseHandle, BackendError> {
    let field = engine.run_optimization(spec)?;
    engine.compute_dose(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryCase;
    use crate::core::geometry::VoxelGrid;
    use crate::core::models::isocenter::link_chain;
    use nalgebra::{Matrix4, Point3, Vector3};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    const HFS: Orientation = Orientation::HeadFirstSupine;
    const FFS: Orientation = Orientation::FeetFirstSupine;

    fn chain(frame: Orientation, zs: &[f64]) -> Vec<Isocenter> {
        let positions: Vec<Point3<f64>> = zs.iter().map(|z| Point3::new(0.0, 0.0, *z)).collect();
        link_chain(frame, &positions)
    }

    fn inputs<'a>(frame: Orientation, isocenters: &'a [Isocenter]) -> FrameJobs<'a> {
        FrameJobs {
            frame,
            isocenters,
            field_width_cm: 20.0,
            feather_width_cm: 4.0,
            prescription: Prescription::new(20.0, 10).unwrap(),
        }
    }

    fn sequencer(primary: &[Isocenter], companion: &[Isocenter]) -> OptimizationSequencer {
        OptimizationSequencer::build(inputs(HFS, primary), inputs(FFS, companion)).unwrap()
    }

    fn case() -> MemoryCase {
        let grid = VoxelGrid::new(
            Point3::new(-10.0, -10.0, 0.0),
            Vector3::new(2.0, 2.0, 1.0),
            [10, 10, 120],
        );
        let mut case = MemoryCase::new();
        case.add_frame(HFS, grid.clone())
            .add_frame(FFS, grid)
            .register_transform(HFS, FFS, Matrix4::identity());
        case
    }

    #[test]
    fn ranks_are_unique_and_chained_inward() {
        let primary = chain(HFS, &[20.0, 36.0, 52.0]);
        let companion = chain(FFS, &[10.0, 26.0]);
        let seq = sequencer(&primary, &companion);

        let ranks: Vec<u32> = seq.jobs().iter().map(|j| j.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(ranks.iter().collect::<HashSet<_>>().len(), 5);

        let backgrounds: Vec<Option<u32>> = seq.jobs().iter().map(|j| j.background).collect();
        assert_eq!(backgrounds, vec![None, Some(1), Some(2), Some(1), Some(4)]);
        for job in seq.jobs() {
            if let Some(bg) = job.background {
                assert_ne!(bg, job.rank);
                assert!(bg < job.rank);
            }
        }
        assert_eq!(seq.job(4).unwrap().field(), "FFS_field1");
        assert!((seq.job(4).unwrap().spec.target_dose_gy - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_primary_is_rejected() {
        let companion = chain(FFS, &[10.0]);
        let result = OptimizationSequencer::build(inputs(HFS, &[]), inputs(FFS, &companion));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn every_job_optimizes_against_its_background() {
        let primary = chain(HFS, &[20.0, 36.0]);
        let companion = chain(FFS, &[4.0]);
        let mut seq = sequencer(&primary, &companion);
        let mut case = case();
        let mut diagnostics = Diagnostics::new();

        seq.execute(&mut case, &mut diagnostics, &ProgressReporter::new())
            .unwrap();

        assert!(seq.jobs().iter().all(OptimizationJob::is_complete));
        assert!(diagnostics.is_empty());
        assert_eq!(case.optimization_log(), ["HFS_field1", "HFS_field2", "FFS_field1"]);
        assert_eq!(
            case.job_spec("HFS_field2").unwrap().background_field.as_deref(),
            Some("HFS_field1")
        );
        assert_eq!(
            case.job_spec("FFS_field1").unwrap().background_field.as_deref(),
            Some("HFS_field1")
        );
    }

    #[test]
    fn satisfied_jobs_are_skipped_but_keep_their_linkage() {
        let primary = chain(HFS, &[20.0, 36.0]);
        let companion = chain(FFS, &[4.0]);
        let mut case = case();

        sequencer(&primary, &companion)
            .execute(&mut case, &mut Diagnostics::new(), &ProgressReporter::new())
            .unwrap();
        let log_len = case.optimization_log().len();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p: Progress| {
            if let Progress::JobFinished { outcome, .. } = p {
                sink.lock().unwrap().push(outcome);
            }
        }));
        let mut rerun = sequencer(&primary, &companion);
        rerun
            .execute(&mut case, &mut Diagnostics::new(), &reporter)
            .unwrap();

        assert_eq!(case.optimization_log().len(), log_len);
        assert_eq!(*events.lock().unwrap(), vec![JobOutcome::Reused; 3]);
        let second = rerun.job(2).unwrap();
        assert_eq!(second.background, Some(1));
        assert_eq!(second.spec.background_field.as_deref(), Some("HFS_field1"));
        assert!(matches!(second.status, JobStatus::Complete { reused: true, .. }));
    }

    #[test]
    fn failed_job_degrades_its_dependents_only() {
        let primary = chain(HFS, &[20.0, 36.0, 52.0]);
        let companion = chain(FFS, &[4.0]);
        let mut seq = sequencer(&primary, &companion);
        let mut case = case();
        case.fail_optimization(
            "HFS_field1",
            BackendError::OptimizationFailed("did not converge".to_string()),
        );
        let mut diagnostics = Diagnostics::new();

        seq.execute(&mut case, &mut diagnostics, &ProgressReporter::new())
            .unwrap();

        assert!(seq.job(1).unwrap().is_failed());
        assert!(seq.job(2).unwrap().is_complete());
        assert!(seq.job(3).unwrap().is_complete());
        assert!(seq.job(4).unwrap().is_complete());
        assert_eq!(seq.failed().count(), 1);
        assert_eq!(case.job_spec("HFS_field2").unwrap().background_field, None);
        assert_eq!(
            case.job_spec("HFS_field3").unwrap().background_field.as_deref(),
            Some("HFS_field2")
        );

        let degraded: Vec<(u32, u32)> = diagnostics
            .warnings()
            .iter()
            .filter_map(|w| match w {
                Warning::SequencingDegradation {
                    rank, background, ..
                } => Some((*rank, *background)),
                _ => None,
            })
            .collect();
        assert_eq!(degraded, vec![(2, 1), (4, 1)]);
    }

    #[test]
    fn prerequisite_failure_aborts_the_chain() {
        let primary = chain(HFS, &[20.0, 36.0, 52.0]);
        let companion = chain(FFS, &[4.0]);
        let mut seq = sequencer(&primary, &companion);
        let mut case = case();
        case.fail_optimization(
            "HFS_field2",
            BackendError::Prerequisite("objective region missing".to_string()),
        );

        let err = seq
            .execute(&mut case, &mut Diagnostics::new(), &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert_eq!(case.optimization_log(), ["HFS_field1", "HFS_field2"]);
        assert!(matches!(seq.job(3).unwrap().status, JobStatus::NotStarted));
    }
}
