use super::frame::Orientation;
use nalgebra::Point3;

/// Where a junction sits: between two isocenters of one frame, or at the shared
/// junction between the two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JunctionSite {
    Isocenters { inner: u32, outer: u32 },
    Frames,
}

/// One graduated slab of a junction, clipped to the body outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    /// Dose-matching level in percent of the prescription.
    pub level: u32,
    pub name: String,
    pub z_start: f64,
    pub z_end: f64,
}

impl Shell {
    pub fn thickness(&self) -> f64 {
        self.z_end - self.z_start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    pub frame: Orientation,
    pub site: JunctionSite,
    /// Junction centre in frame coordinates.
    pub location: Point3<f64>,
    pub width: f64,
    pub reversed: bool,
    /// Shells ordered by increasing z.
    pub shells: Vec<Shell>,
}

impl Junction {
    pub fn z_start(&self) -> f64 {
        self.location.z - self.width / 2.0
    }

    pub fn z_end(&self) -> f64 {
        self.location.z + self.width / 2.0
    }

    pub fn total_thickness(&self) -> f64 {
        self.shells.iter().map(Shell::thickness).sum()
    }

    pub fn shell_for_level(&self, level: u32) -> Option<&Shell> {
        self.shells.iter().find(|s| s.level == level)
    }
}

/// A dose-level band carved out of a shell after optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub shell: String,
    pub name: String,
    /// Threshold the band was requested at, in percent.
    pub requested: u32,
    /// Threshold actually used; lower than `requested` after a fallback.
    pub applied: u32,
}

impl Band {
    pub fn used_fallback(&self) -> bool {
        self.applied != self.requested
    }
}
