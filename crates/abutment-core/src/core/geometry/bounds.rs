use nalgebra::Point3;

/// Axis-aligned box given by its minimum and maximum corners, in cm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds3 {
    /// Builds a box from two arbitrary corners, sorting each axis.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Smallest box enclosing every point, or `None` for an empty slice.
    pub fn enclosing(points: &[Point3<f64>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self {
            min: *first,
            max: *first,
        };
        for p in rest {
            bounds.min = bounds.min.inf(p);
            bounds.max = bounds.max.sup(p);
        }
        Some(bounds)
    }

    pub fn union(&self, other: &Bounds3) -> Bounds3 {
        Bounds3 {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns `true` if `other` lies entirely inside `self`, with tolerance `eps`.
    pub fn contains_bounds(&self, other: &Bounds3, eps: f64) -> bool {
        (0..3).all(|axis| {
            self.min[axis] <= other.min[axis] + eps && self.max[axis] >= other.max[axis] - eps
        })
    }

    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// The eight corners, used to carry a box through a rigid transform.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Returns a copy grown by `margin` on every side of the transverse (x, y) axes.
    pub fn expanded_transverse(&self, margin: f64) -> Bounds3 {
        Bounds3 {
            min: Point3::new(self.min.x - margin, self.min.y - margin, self.min.z),
            max: Point3::new(self.max.x + margin, self.max.y + margin, self.max.z),
        }
    }

    /// Returns a copy with the longitudinal (z) range replaced.
    pub fn with_z_range(&self, z_min: f64, z_max: f64) -> Bounds3 {
        Bounds3 {
            min: Point3::new(self.min.x, self.min.y, z_min.min(z_max)),
            max: Point3::new(self.max.x, self.max.y, z_min.max(z_max)),
        }
    }
}
