use crate::core::registry::{Namespace, RegionKind};
use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Patient orientation of an independently acquired frame.
///
/// Exactly two orientations are supported. The orientation doubles as the frame
/// identifier throughout the engine, since a session never holds two frames with the
/// same orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    HeadFirstSupine,
    FeetFirstSupine,
}

static ORIENTATION_CODES: Map<&'static str, Orientation> = phf_map! {
    "HFS" => Orientation::HeadFirstSupine,
    "HEADFIRSTSUPINE" => Orientation::HeadFirstSupine,
    "HEAD-FIRST-SUPINE" => Orientation::HeadFirstSupine,
    "FFS" => Orientation::FeetFirstSupine,
    "FEETFIRSTSUPINE" => Orientation::FeetFirstSupine,
    "FEET-FIRST-SUPINE" => Orientation::FeetFirstSupine,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown frame orientation '{0}'. Expected 'HFS' or 'FFS'.")]
pub struct ParseOrientationError(pub String);

impl Orientation {
    /// Short code used as the frame prefix in every generated region and point name.
    pub fn code(&self) -> &'static str {
        match self {
            Orientation::HeadFirstSupine => "HFS",
            Orientation::FeetFirstSupine => "FFS",
        }
    }

    pub fn companion(&self) -> Orientation {
        match self {
            Orientation::HeadFirstSupine => Orientation::FeetFirstSupine,
            Orientation::FeetFirstSupine => Orientation::HeadFirstSupine,
        }
    }

    /// Whether junction levels count down along increasing z in this frame.
    ///
    /// Head-first frames anchor the lowest level at the inferior (low z) end of a
    /// junction; feet-first frames are scanned the other way round and anchor it at the
    /// high z end.
    pub fn counts_reversed(&self) -> bool {
        matches!(self, Orientation::FeetFirstSupine)
    }
}

impl FromStr for Orientation {
    type Err = ParseOrientationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase().replace('_', "-");
        ORIENTATION_CODES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| ParseOrientationError(s.to_string()))
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One of the two independent patient coordinate systems of a session.
///
/// A frame owns the namespace of every region and point created in its coordinates.
/// The body outline is registered at construction as a locked entry: the engine reads
/// it but never replaces it.
#[derive(Debug, Clone)]
pub struct Frame {
    orientation: Orientation,
    body: String,
    namespace: Namespace,
}

impl Frame {
    pub fn new(orientation: Orientation, body: impl Into<String>) -> Self {
        let body = body.into();
        let mut namespace = Namespace::new();
        namespace.register_locked(&body, RegionKind::Body);
        Self {
            orientation,
            body,
            namespace,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn code(&self) -> &'static str {
        self.orientation.code()
    }

    /// Name of the body-outline region every shell and band is clipped to.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_orientation_codes() {
        assert_eq!(
            "HFS".parse::<Orientation>().unwrap(),
            Orientation::HeadFirstSupine
        );
        assert_eq!(
            " ffs ".parse::<Orientation>().unwrap(),
            Orientation::FeetFirstSupine
        );
        assert_eq!(
            "head_first_supine".parse::<Orientation>().unwrap(),
            Orientation::HeadFirstSupine
        );
        assert_eq!(
            "FeetFirstSupine".parse::<Orientation>().unwrap(),
            Orientation::FeetFirstSupine
        );
    }

    #[test]
    fn rejects_unsupported_orientations() {
        let err = "HFP".parse::<Orientation>().unwrap_err();
        assert_eq!(err, ParseOrientationError("HFP".to_string()));
    }

    #[test]
    fn companion_is_the_other_orientation() {
        assert_eq!(
            Orientation::HeadFirstSupine.companion(),
            Orientation::FeetFirstSupine
        );
        assert_eq!(
            Orientation::FeetFirstSupine.companion(),
            Orientation::HeadFirstSupine
        );
    }

    #[test]
    fn new_frame_registers_locked_body_outline() {
        let frame = Frame::new(Orientation::HeadFirstSupine, "External");
        let entry = frame.namespace().region_by_name("External").unwrap();
        assert_eq!(entry.kind, RegionKind::Body);
        assert!(entry.locked);
        assert_eq!(frame.code(), "HFS");
    }
}
