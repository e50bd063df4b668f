use crate::core::models::frame::Orientation;
use crate::core::models::isocenter::Isocenter;
use crate::core::models::job::{JobStatus, OptimizationJob};
use crate::core::models::junction::Band;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize)]
struct IsocenterRow<'a> {
    frame: &'a str,
    index: u32,
    point: &'a str,
    field: &'a str,
    x_cm: f64,
    y_cm: f64,
    z_cm: f64,
    inward: Option<u32>,
    outward: Option<u32>,
}

#[derive(Debug, Serialize)]
struct JobRow<'a> {
    rank: u32,
    frame: &'a str,
    isocenter: u32,
    field: &'a str,
    background: Option<u32>,
    status: &'static str,
    dose: Option<&'a str>,
    detail: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BandRow<'a> {
    frame: &'a str,
    shell: &'a str,
    band: &'a str,
    requested: u32,
    applied: u32,
}

pub fn write_isocenters<W: Write>(writer: W, isocenters: &[Isocenter]) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for iso in isocenters {
        csv.serialize(IsocenterRow {
            frame: iso.frame.code(),
            index: iso.index,
            point: &iso.name,
            field: &iso.field,
            x_cm: iso.position.x,
            y_cm: iso.position.y,
            z_cm: iso.position.z,
            inward: iso.inward,
            outward: iso.outward,
        })?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_jobs<W: Write>(writer: W, jobs: &[OptimizationJob]) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for job in jobs {
        let (status, dose, detail) = match &job.status {
            JobStatus::NotStarted => ("not-started", None, None),
            JobStatus::Complete { dose, reused } => (
                if *reused { "reused" } else { "complete" },
                Some(dose.as_str()),
                None,
            ),
            JobStatus::Failed { reason } => ("failed", None, Some(reason.as_str())),
        };
        csv.serialize(JobRow {
            rank: job.rank,
            frame: job.frame.code(),
            isocenter: job.isocenter,
            field: job.field(),
            background: job.background,
            status,
            dose,
            detail,
        })?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_bands<W: Write>(
    writer: W,
    bands: &[(Orientation, Band)],
) -> Result<(), ReportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (frame, band) in bands {
        csv.serialize(BandRow {
            frame: frame.code(),
            shell: &band.shell,
            band: &band.name,
            requested: band.requested,
            applied: band.applied,
        })?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_isocenters_to_path(path: &Path, isocenters: &[Isocenter]) -> Result<(), ReportError> {
    let file = create(path)?;
    write_isocenters(file, isocenters)
}

pub fn write_jobs_to_path(path: &Path, jobs: &[OptimizationJob]) -> Result<(), ReportError> {
    let file = create(path)?;
    write_jobs(file, jobs)
}

pub fn write_bands_to_path(
    path: &Path,
    bands: &[(Orientation, Band)],
) -> Result<(), ReportError> {
    let file = create(path)?;
    write_bands(file, bands)
}

fn create(path: &Path) -> Result<std::fs::File, ReportError> {
    std::fs::File::create(path).map_err(|e| ReportError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::dose::DoseHandle;
    use crate::core::models::isocenter::link_chain;
    use crate::core::models::job::JobSpec;
    use nalgebra::Point3;

    fn job(rank: u32, status: JobStatus) -> OptimizationJob {
        OptimizationJob {
            rank,
            frame: Orientation::HeadFirstSupine,
            isocenter: rank,
            background: rank.checked_sub(1).filter(|r| *r > 0),
            spec: JobSpec {
                frame: Orientation::HeadFirstSupine,
                field: format!("HFS_field{rank}"),
                isocenter: Point3::origin(),
                field_width_cm: 40.0,
                feather_width_cm: 9.0,
                target_dose_gy: 2.0,
                background_field: None,
            },
            status,
        }
    }

    #[test]
    fn isocenter_report_has_header_and_one_row_per_isocenter() {
        let isos = link_chain(
            Orientation::HeadFirstSupine,
            &[Point3::new(0.0, 0.0, 20.0), Point3::new(0.0, 0.0, 50.0)],
        );
        let mut buffer = Vec::new();
        write_isocenters(&mut buffer, &isos).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "frame,index,point,field,x_cm,y_cm,z_cm,inward,outward"
        );
        assert_eq!(lines[1], "HFS,1,HFS_iso1,HFS_field1,0.0,0.0,20.0,,2");
    }

    #[test]
    fn job_report_describes_each_status() {
        let jobs = vec![
            job(
                1,
                JobStatus::Complete {
                    dose: DoseHandle::new("dose-1"),
                    reused: true,
                },
            ),
            job(
                2,
                JobStatus::Failed {
                    reason: "no convergence".to_string(),
                },
            ),
            job(3, JobStatus::NotStarted),
        ];
        let mut buffer = Vec::new();
        write_jobs(&mut buffer, &jobs).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("1,HFS,1,HFS_field1,,reused,dose-1,"));
        assert!(text.contains("2,HFS,2,HFS_field2,1,failed,,no convergence"));
        assert!(text.contains("3,HFS,3,HFS_field3,2,not-started,,"));
    }

    #[test]
    fn band_report_marks_fallbacks() {
        let bands = vec![(
            Orientation::FeetFirstSupine,
            Band {
                shell: "FFS_frame_junction_90".to_string(),
                name: "FFS_frame_junction_90_band_95".to_string(),
                requested: 95,
                applied: 90,
            },
        )];
        let mut buffer = Vec::new();
        write_bands(&mut buffer, &bands).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.starts_with("frame,shell,band,requested,applied\n"));
        assert!(text.contains("FFS,FFS_frame_junction_90,FFS_frame_junction_90_band_95,95,90"));
    }

    #[test]
    fn writes_reports_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isocenters.csv");
        let isos = link_chain(Orientation::FeetFirstSupine, &[Point3::origin()]);
        write_isocenters_to_path(&path, &isos).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("FFS_iso1"));
    }
}
