//! Deterministic names for every region and point the engine creates.
//!
//! These names are the persisted state of a planning session: downstream tooling finds
//! shells, bands and isocenters by name, so the formats below must stay stable.

use super::models::frame::Orientation;
use super::models::junction::JunctionSite;

pub const JUNCTION_MARKER: &str = "junction";
pub const FRAME_SITE_MARKER: &str = "frame";

pub fn isocenter_name(frame: Orientation, index: u32) -> String {
    format!("{}_iso{}", frame.code(), index)
}

pub fn field_name(frame: Orientation, index: u32) -> String {
    format!("{}_field{}", frame.code(), index)
}

/// Point marking the shared junction between the two frames.
pub fn junction_point_name(frame: Orientation) -> String {
    format!("{}_{}", frame.code(), JUNCTION_MARKER)
}

/// `<frame>_iso<i><j>_junction_<level>` or `<frame>_frame_junction_<level>`.
pub fn shell_name(frame: Orientation, site: JunctionSite, level: u32) -> String {
    match site {
        JunctionSite::Isocenters { inner, outer } => format!(
            "{}_iso{}{}_{}_{}",
            frame.code(),
            inner,
            outer,
            JUNCTION_MARKER,
            level
        ),
        JunctionSite::Frames => format!(
            "{}_{}_{}_{}",
            frame.code(),
            FRAME_SITE_MARKER,
            JUNCTION_MARKER,
            level
        ),
    }
}

/// Temporary box a shell is cut from.
pub fn slab_name(shell: &str) -> String {
    format!("{shell}_slab")
}

/// Temporary `{dose ≥ pct}` region used while banding a shell.
pub fn dose_region_name(shell: &str, percent: u32) -> String {
    format!("{shell}_dose_{percent}")
}

pub fn band_name(shell: &str, percent: u32) -> String {
    format!("{shell}_band_{percent}")
}

/// Recovers frame and level from a shell name produced by [`shell_name`].
///
/// Isocenter pairs are only recoverable for single-digit indices, matching the
/// concatenated `iso<i><j>` format; longer chains yield `None` for the site.
pub fn parse_shell_name(name: &str) -> Option<(Orientation, Option<JunctionSite>, u32)> {
    let mut parts = name.split('_');
    let frame: Orientation = parts.next()?.parse().ok()?;
    let site_part = parts.next()?;
    if parts.next()? != JUNCTION_MARKER {
        return None;
    }
    let level: u32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let site = if site_part == FRAME_SITE_MARKER {
        Some(JunctionSite::Frames)
    } else {
        let digits = site_part.strip_prefix("iso")?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if digits.len() == 2 {
            let inner = digits[..1].parse().ok()?;
            let outer = digits[1..].parse().ok()?;
            Some(JunctionSite::Isocenters { inner, outer })
        } else {
            None
        }
    };
    Some((frame, site, level))
}
