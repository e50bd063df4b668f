use super::models::ids::{PointId, RegionId};
use nalgebra::Point3;
use slotmap::SlotMap;
use std::collections::HashMap;
use thiserror::Error;

/// Role a region plays in the planning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Body,
    Slab,
    Shell,
    DoseRegion,
    Band,
    Mapped,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionEntry {
    pub name: String,
    pub kind: RegionKind,
    /// Locked (approved) regions are never replaced or deleted by the engine.
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointEntry {
    pub name: String,
    pub position: Point3<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("Region '{name}' is locked and cannot be modified")]
    Locked { name: String },
}

/// Name-keyed arena of the regions and points belonging to one frame.
///
/// Every write goes through a collision-checked get-or-create, so re-running a
/// pipeline stage reuses the existing entry instead of failing on "already exists".
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Primary storage for region entries.
    regions: SlotMap<RegionId, RegionEntry>,
    /// Primary storage for point entries.
    points: SlotMap<PointId, PointEntry>,
    region_index: HashMap<String, RegionId>,
    point_index: HashMap<String, PointId>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing region with this name or creates it.
    ///
    /// The boolean is `true` when the entry was newly created. An existing entry keeps
    /// its identifier and takes the requested kind.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Locked`] if the name belongs to a locked region.
    pub fn get_or_create_region(
        &mut self,
        name: &str,
        kind: RegionKind,
    ) -> Result<(RegionId, bool), NamespaceError> {
        if let Some(&id) = self.region_index.get(name) {
            let entry = &mut self.regions[id];
            if entry.locked {
                return Err(NamespaceError::Locked {
                    name: name.to_string(),
                });
            }
            entry.kind = kind;
            return Ok((id, false));
        }
        let id = self.regions.insert(RegionEntry {
            name: name.to_string(),
            kind,
            locked: false,
        });
        self.region_index.insert(name.to_string(), id);
        Ok((id, true))
    }

    /// Registers a region that the engine must treat as read-only.
    pub fn register_locked(&mut self, name: &str, kind: RegionKind) -> RegionId {
        if let Some(&id) = self.region_index.get(name) {
            let entry = &mut self.regions[id];
            entry.kind = kind;
            entry.locked = true;
            return id;
        }
        let id = self.regions.insert(RegionEntry {
            name: name.to_string(),
            kind,
            locked: true,
        });
        self.region_index.insert(name.to_string(), id);
        id
    }

    /// Marks an existing region as approved. Returns `false` if no such region exists.
    pub fn lock_region(&mut self, name: &str) -> bool {
        match self.region_index.get(name) {
            Some(&id) => {
                self.regions[id].locked = true;
                true
            }
            None => false,
        }
    }

    pub fn region(&self, id: RegionId) -> Option<&RegionEntry> {
        self.regions.get(id)
    }

    pub fn find_region(&self, name: &str) -> Option<RegionId> {
        self.region_index.get(name).copied()
    }

    pub fn region_by_name(&self, name: &str) -> Option<&RegionEntry> {
        self.find_region(name).and_then(|id| self.regions.get(id))
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.region_by_name(name).is_some_and(|entry| entry.locked)
    }

    /// Removes a region entry. Removing an unknown name is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::Locked`] if the region is locked.
    pub fn remove_region(&mut self, name: &str) -> Result<Option<RegionEntry>, NamespaceError> {
        let Some(&id) = self.region_index.get(name) else {
            return Ok(None);
        };
        if self.regions[id].locked {
            return Err(NamespaceError::Locked {
                name: name.to_string(),
            });
        }
        self.region_index.remove(name);
        Ok(self.regions.remove(id))
    }

    pub fn regions_iter(&self) -> impl Iterator<Item = (RegionId, &RegionEntry)> {
        self.regions.iter()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Creates the named point or moves the existing one to `position`.
    pub fn set_point(&mut self, name: &str, position: Point3<f64>) -> PointId {
        if let Some(&id) = self.point_index.get(name) {
            self.points[id].position = position;
            return id;
        }
        let id = self.points.insert(PointEntry {
            name: name.to_string(),
            position,
        });
        self.point_index.insert(name.to_string(), id);
        id
    }

    pub fn point(&self, name: &str) -> Option<&PointEntry> {
        self.point_index
            .get(name)
            .and_then(|&id| self.points.get(id))
    }

    pub fn points_iter(&self) -> impl Iterator<Item = (PointId, &PointEntry)> {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut ns = Namespace::new();
        let (first, created) = ns.get_or_create_region("HFS_iso12_junction_10", RegionKind::Shell).unwrap();
        assert!(created);
        let (second, created_again) = ns.get_or_create_region("HFS_iso12_junction_10", RegionKind::Shell).unwrap();
        assert!(!created_again);
        assert_eq!(first, second);
        assert_eq!(ns.region_count(), 1);
    }

    #[test]
    fn locked_regions_reject_writes_and_removal() {
        let mut ns = Namespace::new();
        ns.register_locked("External", RegionKind::Body);

        let err = ns.get_or_create_region("External", RegionKind::Other).unwrap_err();
        assert_eq!(
            err,
            NamespaceError::Locked {
                name: "External".to_string()
            }
        );
        assert!(ns.remove_region("External").is_err());
        assert!(ns.is_locked("External"));
    }

    #[test]
    fn lock_region_marks_existing_entries_only() {
        let mut ns = Namespace::new();
        ns.get_or_create_region("band", RegionKind::Band).unwrap();
        assert!(ns.lock_region("band"));
        assert!(!ns.lock_region("missing"));
        assert!(ns.get_or_create_region("band", RegionKind::Band).is_err());
    }

    #[test]
    fn remove_region_frees_the_name() {
        let mut ns = Namespace::new();
        ns.get_or_create_region("tmp", RegionKind::Slab).unwrap();
        let removed = ns.remove_region("tmp").unwrap().unwrap();
        assert_eq!(removed.kind, RegionKind::Slab);
        assert!(ns.find_region("tmp").is_none());
        assert!(ns.remove_region("tmp").unwrap().is_none());
    }

    #[test]
    fn set_point_replaces_position_by_name() {
        let mut ns = Namespace::new();
        let a = ns.set_point("HFS_iso1", Point3::new(0.0, 0.0, 1.0));
        let b = ns.set_point("HFS_iso1", Point3::new(0.0, 0.0, 2.0));
        assert_eq!(a, b);
        assert_eq!(ns.points_iter().count(), 1);
        assert_eq!(ns.point("HFS_iso1").unwrap().position.z, 2.0);
    }
}
