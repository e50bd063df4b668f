use super::frame::Orientation;
use crate::core::naming;
use nalgebra::Point3;

/// Reference point a treatment field is centered on.
///
/// Indices are 1-based and increase away from the shared junction. `inward` and
/// `outward` hold the indices of the immediate neighbours within the same frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Isocenter {
    pub frame: Orientation,
    pub index: u32,
    pub position: Point3<f64>,
    /// Name of the isocenter point in the frame namespace.
    pub name: String,
    /// Identifier of the field (beam set) planned on this isocenter.
    pub field: String,
    pub inward: Option<u32>,
    pub outward: Option<u32>,
}

impl Isocenter {
    pub fn new(frame: Orientation, index: u32, position: Point3<f64>) -> Self {
        Self {
            frame,
            index,
            position,
            name: naming::isocenter_name(frame, index),
            field: naming::field_name(frame, index),
            inward: None,
            outward: None,
        }
    }

    /// The isocenter adjacent to the shared junction between the two frames.
    pub fn is_innermost(&self) -> bool {
        self.inward.is_none()
    }
}

/// Turns positions ordered closest-to-junction first into linked isocenters.
pub fn link_chain(frame: Orientation, positions: &[Point3<f64>]) -> Vec<Isocenter> {
    let count = positions.len() as u32;
    positions
        .iter()
        .enumerate()
        .map(|(i, position)| {
            let index = i as u32 + 1;
            let mut iso = Isocenter::new(frame, index, *position);
            iso.inward = (index > 1).then(|| index - 1);
            iso.outward = (index < count).then(|| index + 1);
            iso
        })
        .collect()
}
