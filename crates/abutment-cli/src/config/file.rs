use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CaseLoadError {
    #[error("Failed to read case file '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse case file '{path}': {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Vec3 = [f64; 3];

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePlanConfig {
    pub field_width: Option<f64>,
    pub min_overlap: Option<f64>,
    pub frame_overlap: Option<f64>,
    pub levels: Option<u32>,
    pub transverse_margin: Option<f64>,
    pub threshold_step: Option<u32>,
    pub min_band_volume: Option<f64>,
    pub max_band_volume: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileGrid {
    pub corner: Vec3,
    pub voxel_size: Vec3,
    pub counts: [usize; 3],
}

/// Rigid registration from the primary frame to the companion frame.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRegistration {
    #[serde(default)]
    pub translation: Vec3,
    /// Rotation about the x, y and z axes, in degrees.
    #[serde(default)]
    pub rotation: Vec3,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileBody {
    #[serde(default = "default_body_name")]
    pub name: String,
    pub min: Vec3,
    pub max: Vec3,
}

fn default_body_name() -> String {
    "External".to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileFrame {
    /// `HFS`, `FFS` or a long form such as `head-first-supine`.
    pub orientation: String,
    pub total_dose: f64,
    pub fractions: u32,
    pub body: FileBody,
    pub grid: Option<FileGrid>,
    pub min_overlap: Option<f64>,
    pub max_length: Option<f64>,
    pub max_isocenters: Option<u32>,
    /// The shared junction point; only read for the primary frame.
    pub junction: Option<Vec3>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct CaseFile {
    #[serde(default)]
    pub plan: FilePlanConfig,
    /// Dose grid shared by frames that do not declare their own.
    pub grid: Option<FileGrid>,
    #[serde(default)]
    pub registration: FileRegistration,
    pub primary: FileFrame,
    pub companion: FileFrame,
}

impl CaseFile {
    pub fn from_file(path: &Path) -> Result<Self, CaseLoadError> {
        debug!("Loading case from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| CaseLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| CaseLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CASE: &str = r#"
        [plan]
        field-width = 40.0
        frame-overlap = 5.0

        [grid]
        corner = [-12.0, -12.0, -10.0]
        voxel-size = [2.0, 2.0, 0.5]
        counts = [12, 12, 300]

        [registration]
        translation = [0.0, 0.0, -80.0]

        [primary]
        orientation = "HFS"
        total-dose = 20.0
        fractions = 10
        junction = [0.0, 0.0, 90.0]
        body = { min = [-8.0, -8.0, 0.0], max = [8.0, 8.0, 100.0] }

        [companion]
        orientation = "feet-first-supine"
        total-dose = 10.0
        fractions = 5
        body = { min = [-8.0, -8.0, 0.0], max = [8.0, 8.0, 130.0] }
    "#;

    #[test]
    fn parses_a_complete_case() {
        let case = CaseFile::from_toml(CASE).unwrap();
        assert_eq!(case.plan.field_width, Some(40.0));
        assert_eq!(case.plan.levels, None);
        assert_eq!(case.registration.translation, [0.0, 0.0, -80.0]);
        assert_eq!(case.registration.rotation, [0.0; 3]);
        assert_eq!(case.primary.body.name, "External");
        assert_eq!(case.primary.junction, Some([0.0, 0.0, 90.0]));
        assert_eq!(case.companion.orientation, "feet-first-supine");
        assert_eq!(case.grid.map(|g| g.counts), Some([12, 12, 300]));
    }

    #[test]
    fn rejects_unknown_keys() {
        let content = CASE.replace("frame-overlap", "frame-overlapp");
        assert!(CaseFile::from_toml(&content).is_err());
    }

    #[test]
    fn fallback_attempts_are_not_configurable() {
        let content = CASE.replace("frame-overlap = 5.0", "frame-overlap = 5.0\n        max-attempts = 4");
        let err = CaseFile::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("max-attempts"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CaseFile::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CaseLoadError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.toml");
        std::fs::write(&path, "[primary]\norientation = 3").unwrap();
        let err = CaseFile::from_file(&path).unwrap_err();
        assert!(matches!(err, CaseLoadError::Parse { .. }));
    }
}
