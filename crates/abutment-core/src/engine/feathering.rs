use super::config::{ConfigError, FeatheringConfig, Prescription};
use super::error::{Diagnostics, EngineError, Warning};
use super::ports::{Composition, Operand, StructureAlgebra};
use super::retry::Fallback;
use super::utils::regions::{claim, ensure_unlocked, release};
use crate::core::models::dose::DoseVolume;
use crate::core::models::frame::Frame;
use crate::core::models::junction::Band;
use crate::core::naming;
use crate::core::registry::RegionKind;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Percentage points between a threshold and its single fallback.
pub const FALLBACK_STEP: u32 = 5;
/// The requested threshold and its fallback.
const FALLBACK_ATTEMPTS: u32 = 2;

/// Percentage thresholds of one shell, strictly descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    upper: u32,
    nominal: u32,
    lower: u32,
}

impl Thresholds {
    pub fn new(upper: u32, nominal: u32, lower: u32) -> Result<Self, ConfigError> {
        if !(upper > nominal && nominal > lower && lower > 0) {
            return Err(ConfigError::InvalidParameter {
                name: "thresholds",
                reason: format!(
                    "expected upper > nominal > lower > 0, got ({upper}, {nominal}, {lower})"
                ),
            });
        }
        Ok(Self {
            upper,
            nominal,
            lower,
        })
    }

    /// `(level + step, level, level − step)`, with the lower bound kept positive.
    pub fn around(level: u32, step: u32) -> Result<Self, ConfigError> {
        let lower = level.saturating_sub(step).max(1);
        Self::new(level + step, level, lower)
    }

    pub fn upper(&self) -> u32 {
        self.upper
    }

    pub fn nominal(&self) -> u32 {
        self.nominal
    }

    pub fn lower(&self) -> u32 {
        self.lower
    }

    /// Highest first, the order bands are built in.
    pub fn descending(&self) -> [u32; 3] {
        [self.upper, self.nominal, self.lower]
    }
}

/// Turns shells into disjoint dose bands of a frame's current dose.
#[derive(Debug, Clone, Copy)]
pub struct DoseFeatheringResolver {
    config: FeatheringConfig,
    prescription: Prescription,
}

impl DoseFeatheringResolver {
    pub fn new(config: FeatheringConfig, prescription: Prescription) -> Result<Self, EngineError> {
        config.validate()?;
        prescription.validate()?;
        Ok(Self {
            config,
            prescription,
        })
    }

    pub fn fallback_for(&self, threshold: u32) -> Fallback {
        Fallback::descending(threshold, FALLBACK_STEP, FALLBACK_ATTEMPTS)
    }

    /// Builds the bands of every listed shell against `dose`.
    ///
    /// Within a shell, each band is the dose region of its threshold clipped to the shell
    /// and the body, minus every higher band already kept. Bands that stay empty after the
    /// fallback, or fall outside the volume limits, are removed and reported.
    pub fn resolve<S: StructureAlgebra + ?Sized>(
        &self,
        frame: &mut Frame,
        algebra: &mut S,
        dose: &DoseVolume,
        junction_defs: &BTreeMap<String, Thresholds>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Band>, EngineError> {
        let mut targets = Vec::new();
        for (shell, thresholds) in junction_defs {
            for requested in thresholds.descending() {
                targets.push(naming::band_name(shell, requested));
                targets.extend(
                    self.fallback_for(requested)
                        .levels()
                        .iter()
                        .map(|&level| naming::dose_region_name(shell, level)),
                );
            }
        }
        ensure_unlocked(frame, targets.iter().map(String::as_str))?;

        let mut bands = Vec::new();
        for (shell, thresholds) in junction_defs {
            bands.extend(self.resolve_shell(frame, algebra, dose, shell, thresholds, diagnostics)?);
        }
        info!(
            frame = %frame.orientation(),
            shells = junction_defs.len(),
            bands = bands.len(),
            "Dose bands resolved."
        );
        Ok(bands)
    }

    /// Resolves one shell. Intermediate dose regions are released whether or not it succeeds.
    fn resolve_shell<S: StructureAlgebra + ?Sized>(
        &self,
        frame: &mut Frame,
        algebra: &mut S,
        dose: &DoseVolume,
        shell: &str,
        thresholds: &Thresholds,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Band>, EngineError> {
        let mut intermediates = BTreeSet::new();
        let built = self.build_bands(
            frame,
            algebra,
            dose,
            shell,
            thresholds,
            &mut intermediates,
            diagnostics,
        );
        let released = intermediates
            .iter()
            .try_for_each(|region| release(frame, algebra, region));
        let bands = built?;
        released?;
        Ok(bands)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_bands<S: StructureAlgebra + ?Sized>(
        &self,
        frame: &mut Frame,
        algebra: &mut S,
        dose: &DoseVolume,
        shell: &str,
        thresholds: &Thresholds,
        intermediates: &mut BTreeSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Band>, EngineError> {
        let orientation = frame.orientation();
        let body = frame.body().to_string();
        let mut kept: Vec<Band> = Vec::new();

        for requested in thresholds.descending() {
            let band = naming::band_name(shell, requested);
            claim(frame, algebra, &band, RegionKind::Band)?;
            let higher: Vec<&str> = kept.iter().map(|b| b.name.as_str()).collect();

            let outcome = self.fallback_for(requested).run(|level| {
                let region = naming::dose_region_name(shell, level);
                claim(frame, algebra, &region, RegionKind::DoseRegion)?;
                intermediates.insert(region.clone());
                algebra.create_from_dose(
                    orientation,
                    &region,
                    dose,
                    self.prescription.dose_at_percent(level),
                )?;
                algebra.compose(
                    orientation,
                    &band,
                    &Composition::subtract(
                        Operand::intersection(&[region.as_str(), shell, body.as_str()]),
                        Operand::union(&higher),
                    ),
                )?;
                Ok::<_, EngineError>(algebra.has_contours(orientation, &band).then_some(level))
            })?;

            let Some(applied) = outcome.value else {
                debug!(%orientation, band = %band, attempts = outcome.attempts, "Band stayed empty.");
                self.discard(frame, algebra, band, diagnostics)?;
                continue;
            };

            algebra.volume_threshold(
                orientation,
                &band,
                self.config.min_band_volume_cc,
                self.config.max_band_volume_cc,
            )?;
            if !algebra.has_contours(orientation, &band) {
                debug!(%orientation, band = %band, "Band discarded as degenerate.");
                self.discard(frame, algebra, band, diagnostics)?;
                continue;
            }

            if applied != requested {
                debug!(%orientation, band = %band, requested, applied, "Band built at fallback level.");
            }
            kept.push(Band {
                shell: shell.to_string(),
                name: band,
                requested,
                applied,
            });
        }
        Ok(kept)
    }

    fn discard<S: StructureAlgebra + ?Sized>(
        &self,
        frame: &mut Frame,
        algebra: &mut S,
        band: String,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), EngineError> {
        release(frame, algebra, &band)?;
        diagnostics.push(Warning::EmptyResult {
            frame: frame.orientation(),
            name: band,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryCase;
    use crate::core::geometry::{Bounds3, VoxelGrid};
    use crate::core::models::frame::Orientation;
    use nalgebra::{Point3, Vector3};

    const HFS: Orientation = Orientation::HeadFirstSupine;
    const SHELL: &str = "HFS_iso12_junction_50";

    fn grid() -> VoxelGrid {
        VoxelGrid::new(
            Point3::new(-10.0, -10.0, 0.0),
            Vector3::new(2.0, 2.0, 0.25),
            [10, 10, 240],
        )
    }

    fn setup() -> (Frame, MemoryCase) {
        let mut case = MemoryCase::new();
        case.add_frame(HFS, grid());
        case.insert_box_region(
            HFS,
            "Body",
            &Bounds3::new(Point3::new(-6.0, -6.0, 5.0), Point3::new(6.0, 6.0, 55.0)),
        )
        .unwrap();
        case.insert_box_region(
            HFS,
            SHELL,
            &Bounds3::new(Point3::new(-8.0, -8.0, 20.0), Point3::new(8.0, 8.0, 30.0)),
        )
        .unwrap();
        let mut frame = Frame::new(HFS, "Body");
        frame
            .namespace_mut()
            .get_or_create_region(SHELL, RegionKind::Shell)
            .unwrap();
        (frame, case)
    }

    /// Falls off linearly from 100 % at z = 20 to 0 % at z = 30, capped at `cap` percent.
    fn ramp_dose(cap: f64) -> DoseVolume {
        let grid = grid();
        let values = (0..grid.voxel_count())
            .map(|idx| {
                let z = grid.voxel_center(grid.voxel_of(idx)).z;
                let percent = (100.0 * (30.0 - z) / 10.0).clamp(0.0, cap);
                2.0 * percent / 100.0
            })
            .collect();
        DoseVolume { grid, values }
    }

    fn resolver(min_cc: f64) -> DoseFeatheringResolver {
        DoseFeatheringResolver::new(
            FeatheringConfig {
                min_band_volume_cc: min_cc,
                ..FeatheringConfig::default()
            },
            Prescription::new(2.0, 1).unwrap(),
        )
        .unwrap()
    }

    fn defs(thresholds: Thresholds) -> BTreeMap<String, Thresholds> {
        BTreeMap::from([(SHELL.to_string(), thresholds)])
    }

    #[test]
    fn thresholds_must_be_strictly_descending() {
        assert!(Thresholds::new(60, 50, 40).is_ok());
        assert!(Thresholds::new(50, 50, 40).is_err());
        assert!(Thresholds::new(60, 40, 50).is_err());
        assert!(Thresholds::new(10, 5, 0).is_err());
        assert_eq!(Thresholds::around(10, 5).unwrap().descending(), [15, 10, 5]);
        assert_eq!(Thresholds::around(4, 5).unwrap().descending(), [9, 4, 1]);
    }

    #[test]
    fn bands_are_disjoint_and_ordered() {
        let (mut frame, mut case) = setup();
        let mut diagnostics = Diagnostics::new();
        let bands = resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(100.0),
                &defs(Thresholds::new(60, 40, 20).unwrap()),
                &mut diagnostics,
            )
            .unwrap();

        let names: Vec<&str> = bands.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "HFS_iso12_junction_50_band_60",
                "HFS_iso12_junction_50_band_40",
                "HFS_iso12_junction_50_band_20",
            ]
        );
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_eq!(case.overlap_voxels(HFS, a, b), 0, "{a} overlaps {b}");
            }
        }
        // 6×6 body cross-section of 1 cc voxels: z 20..24, 24..26, 26..28.
        assert_eq!(case.region_voxels(HFS, names[0]), Some(16 * 36));
        assert_eq!(case.region_voxels(HFS, names[1]), Some(8 * 36));
        assert_eq!(case.region_voxels(HFS, names[2]), Some(8 * 36));
        assert!(bands.iter().all(|b| !b.used_fallback()));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn intermediate_dose_regions_are_released() {
        let (mut frame, mut case) = setup();
        resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(100.0),
                &defs(Thresholds::new(60, 40, 20).unwrap()),
                &mut Diagnostics::new(),
            )
            .unwrap();
        assert!(case.region_names(HFS).iter().all(|n| !n.contains("_dose_")));
        assert!(frame
            .namespace()
            .regions_iter()
            .all(|(_, r)| r.kind != RegionKind::DoseRegion));
    }

    #[test]
    fn empty_band_falls_back_once_by_five_points() {
        let (mut frame, mut case) = setup();
        let mut diagnostics = Diagnostics::new();
        let bands = resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(92.0),
                &defs(Thresholds::new(95, 60, 40).unwrap()),
                &mut diagnostics,
            )
            .unwrap();

        let top = &bands[0];
        assert_eq!(top.name, "HFS_iso12_junction_50_band_95");
        assert_eq!(top.requested, 95);
        assert_eq!(top.applied, 90);
        assert!(top.used_fallback());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn band_empty_after_one_fallback_is_accepted_as_empty() {
        let (mut frame, mut case) = setup();
        let mut diagnostics = Diagnostics::new();
        // 99 and 94 are both above the 92 % cap; 89 would not be, but is never tried.
        let bands = resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(92.0),
                &defs(Thresholds::new(99, 60, 40).unwrap()),
                &mut diagnostics,
            )
            .unwrap();

        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].requested, 60);
        let empty: Vec<&str> = diagnostics.empty_results().collect();
        assert_eq!(empty, vec!["HFS_iso12_junction_50_band_99"]);
        assert!(case.region_voxels(HFS, "HFS_iso12_junction_50_band_99").is_none());
    }

    #[test]
    fn degenerate_bands_are_discarded() {
        let (mut frame, mut case) = setup();
        let mut diagnostics = Diagnostics::new();
        // The 35 % band is only half a centimetre thick: 72 cc.
        let bands = resolver(100.0)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(100.0),
                &defs(Thresholds::new(60, 40, 35).unwrap()),
                &mut diagnostics,
            )
            .unwrap();

        let names: Vec<&str> = bands.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["HFS_iso12_junction_50_band_60", "HFS_iso12_junction_50_band_40"]
        );
        assert_eq!(
            diagnostics.empty_results().collect::<Vec<_>>(),
            vec!["HFS_iso12_junction_50_band_35"]
        );
    }

    #[test]
    fn rerun_reproduces_the_same_bands() {
        let (mut frame, mut case) = setup();
        let resolver = resolver(0.1);
        let dose = ramp_dose(100.0);
        let defs = defs(Thresholds::new(60, 40, 20).unwrap());

        let first = resolver
            .resolve(&mut frame, &mut case, &dose, &defs, &mut Diagnostics::new())
            .unwrap();
        let names = case.region_names(HFS);
        let second = resolver
            .resolve(&mut frame, &mut case, &dose, &defs, &mut Diagnostics::new())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(case.region_names(HFS), names);
    }

    #[test]
    fn locked_band_is_an_idempotency_conflict() {
        let (mut frame, mut case) = setup();
        frame
            .namespace_mut()
            .register_locked("HFS_iso12_junction_50_band_40", RegionKind::Band);
        let err = resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(100.0),
                &defs(Thresholds::new(60, 40, 20).unwrap()),
                &mut Diagnostics::new(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::IdempotencyConflict { .. }));

        // The conflict is found before any band or dose region is created.
        assert_eq!(
            case.region_names(HFS),
            vec!["Body".to_string(), SHELL.to_string()]
        );
        assert!(frame
            .namespace()
            .regions_iter()
            .all(|(_, r)| !matches!(r.kind, RegionKind::DoseRegion | RegionKind::Band) || r.locked));
    }

    #[test]
    fn locked_fallback_dose_region_stops_before_any_band() {
        let (mut frame, mut case) = setup();
        frame
            .namespace_mut()
            .register_locked("HFS_iso12_junction_50_dose_15", RegionKind::DoseRegion);
        let err = resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(100.0),
                &defs(Thresholds::new(60, 40, 20).unwrap()),
                &mut Diagnostics::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::IdempotencyConflict { ref name, .. } if name == "HFS_iso12_junction_50_dose_15"
        ));
        assert!(case.region_names(HFS).iter().all(|n| !n.contains("_band_")));
    }

    #[test]
    fn failure_midway_still_releases_dose_regions() {
        let (mut frame, mut case) = setup();
        // Known to the namespace but never contoured, so composing against it fails.
        let missing = "HFS_iso23_junction_50";
        frame
            .namespace_mut()
            .get_or_create_region(missing, RegionKind::Shell)
            .unwrap();
        let mut defs = defs(Thresholds::new(60, 40, 20).unwrap());
        defs.insert(missing.to_string(), Thresholds::new(60, 40, 20).unwrap());

        let err = resolver(0.1)
            .resolve(
                &mut frame,
                &mut case,
                &ramp_dose(100.0),
                &defs,
                &mut Diagnostics::new(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Backend { .. }));
        assert!(case.region_names(HFS).iter().all(|n| !n.contains("_dose_")));
        assert!(frame
            .namespace()
            .regions_iter()
            .all(|(_, r)| r.kind != RegionKind::DoseRegion));
    }

    #[test]
    fn fallback_is_a_single_fixed_step() {
        let resolver = resolver(0.1);
        assert_eq!(resolver.fallback_for(99).levels(), &[99, 94]);
        assert_eq!(resolver.fallback_for(40).levels(), &[40, 35]);
        assert_eq!(resolver.fallback_for(5).levels(), &[5]);
    }
}
