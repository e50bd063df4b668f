use crate::core::models::frame::Orientation;
use thiserror::Error;

pub const STANDARD_JUNCTION_LEVELS: u32 = 9;
pub const STANDARD_THRESHOLD_STEP: u32 = 5;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Target total dose of one frame and the number of fractions it is delivered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prescription {
    pub total_dose_gy: f64,
    pub fractions: u32,
}

impl Prescription {
    pub fn new(total_dose_gy: f64, fractions: u32) -> Result<Self, ConfigError> {
        let rx = Self {
            total_dose_gy,
            fractions,
        };
        rx.validate()?;
        Ok(rx)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.total_dose_gy.is_finite() && self.total_dose_gy > 0.0) {
            return Err(invalid(
                "prescription.total-dose",
                format!("must be a positive dose, got {}", self.total_dose_gy),
            ));
        }
        if self.fractions == 0 {
            return Err(invalid("prescription.fractions", "must be at least 1"));
        }
        Ok(())
    }

    pub fn dose_per_fraction_gy(&self) -> f64 {
        self.total_dose_gy / self.fractions as f64
    }

    /// Per-fraction dose corresponding to `percent` of the prescription.
    pub fn dose_at_percent(&self, percent: u32) -> f64 {
        self.dose_per_fraction_gy() * percent as f64 / 100.0
    }
}

/// Per-frame limits on the isocenter layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLimits {
    /// Minimum overlap between adjacent fields, in cm.
    pub min_overlap_cm: f64,
    /// Absolute maximum treatable length of the frame, in cm.
    pub max_length_cm: f64,
    pub max_isocenters: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            min_overlap_cm: 2.0,
            max_length_cm: 200.0,
            max_isocenters: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub field_width_cm: f64,
    pub limits: FrameLimits,
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.field_width_cm.is_finite() && self.field_width_cm > 0.0) {
            return Err(invalid("field-width", "must be positive"));
        }
        let overlap = self.limits.min_overlap_cm;
        if !(overlap > 0.0 && overlap < self.field_width_cm) {
            return Err(invalid(
                "min-overlap",
                format!(
                    "must lie strictly between 0 and the field width ({} cm), got {}",
                    self.field_width_cm, overlap
                ),
            ));
        }
        if self.limits.max_isocenters == 0 {
            return Err(invalid("max-isocenters", "must be at least 1"));
        }
        if !(self.limits.max_length_cm > 0.0) {
            return Err(invalid("max-length", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionConfig {
    /// Number of graduated shells per junction.
    pub levels: u32,
    /// Transverse margin added around the body bounding box when cutting slabs, in cm.
    pub transverse_margin_cm: f64,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            levels: STANDARD_JUNCTION_LEVELS,
            transverse_margin_cm: 1.0,
        }
    }
}

impl JunctionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels == 0 || self.levels > 99 {
            return Err(invalid("levels", "must lie between 1 and 99"));
        }
        if self.transverse_margin_cm < 0.0 {
            return Err(invalid("transverse-margin", "must not be negative"));
        }
        Ok(())
    }
}

/// Volume limits applied to resolved dose bands.
///
/// The fallback for an empty band is not configurable: one retry at
/// [`FALLBACK_STEP`](super::feathering::FALLBACK_STEP) points lower.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatheringConfig {
    /// Bands smaller than this are discarded as degenerate, in cc.
    pub min_band_volume_cc: f64,
    pub max_band_volume_cc: f64,
}

impl Default for FeatheringConfig {
    fn default() -> Self {
        Self {
            min_band_volume_cc: 0.1,
            max_band_volume_cc: f64::INFINITY,
        }
    }
}

impl FeatheringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_band_volume_cc < 0.0 || self.max_band_volume_cc < self.min_band_volume_cc {
            return Err(invalid(
                "band-volume",
                "requires 0 <= min-band-volume <= max-band-volume",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub orientation: Orientation,
    pub limits: FrameLimits,
    pub prescription: Prescription,
}

/// Static parameters of a two-frame plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
    pub field_width_cm: f64,
    /// Width of the shared junction between the two frames, in cm.
    pub frame_junction_width_cm: f64,
    pub junction: JunctionConfig,
    pub feathering: FeatheringConfig,
    pub primary: FrameSettings,
    pub companion: FrameSettings,
}

impl PlanConfig {
    pub fn layout_for(&self, orientation: Orientation) -> LayoutConfig {
        LayoutConfig {
            field_width_cm: self.field_width_cm,
            limits: self.settings_for(orientation).limits,
        }
    }

    pub fn settings_for(&self, orientation: Orientation) -> &FrameSettings {
        if orientation == self.primary.orientation {
            &self.primary
        } else {
            &self.companion
        }
    }
}

#[derive(Default)]
pub struct PlanConfigBuilder {
    field_width_cm: Option<f64>,
    frame_junction_width_cm: Option<f64>,
    junction: Option<JunctionConfig>,
    feathering: Option<FeatheringConfig>,
    primary: Option<FrameSettings>,
    companion: Option<FrameSettings>,
}

impl PlanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_width_cm(mut self, width: f64) -> Self {
        self.field_width_cm = Some(width);
        self
    }
    pub fn frame_junction_width_cm(mut self, width: f64) -> Self {
        self.frame_junction_width_cm = Some(width);
        self
    }
    pub fn junction(mut self, config: JunctionConfig) -> Self {
        self.junction = Some(config);
        self
    }
    pub fn feathering(mut self, config: FeatheringConfig) -> Self {
        self.feathering = Some(config);
        self
    }
    pub fn primary(mut self, settings: FrameSettings) -> Self {
        self.primary = Some(settings);
        self
    }
    pub fn companion(mut self, settings: FrameSettings) -> Self {
        self.companion = Some(settings);
        self
    }

    pub fn build(self) -> Result<PlanConfig, ConfigError> {
        let config = PlanConfig {
            field_width_cm: self
                .field_width_cm
                .ok_or(ConfigError::MissingParameter("field_width_cm"))?,
            frame_junction_width_cm: self
                .frame_junction_width_cm
                .ok_or(ConfigError::MissingParameter("frame_junction_width_cm"))?,
            junction: self.junction.unwrap_or_default(),
            feathering: self.feathering.unwrap_or_default(),
            primary: self
                .primary
                .ok_or(ConfigError::MissingParameter("primary"))?,
            companion: self
                .companion
                .ok_or(ConfigError::MissingParameter("companion"))?,
        };

        if config.primary.orientation == config.companion.orientation {
            return Err(invalid(
                "companion.orientation",
                "the two frames must have different orientations",
            ));
        }
        for settings in [&config.primary, &config.companion] {
            settings.prescription.validate()?;
            config.layout_for(settings.orientation).validate()?;
        }
        if !(config.frame_junction_width_cm > 0.0
            && config.frame_junction_width_cm < config.field_width_cm)
        {
            return Err(invalid(
                "frame-junction-width",
                "must lie strictly between 0 and the field width",
            ));
        }
        config.junction.validate()?;
        config.feathering.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(orientation: Orientation) -> FrameSettings {
        FrameSettings {
            orientation,
            limits: FrameLimits::default(),
            prescription: Prescription {
                total_dose_gy: 12.0,
                fractions: 6,
            },
        }
    }

    fn builder() -> PlanConfigBuilder {
        PlanConfigBuilder::new()
            .field_width_cm(40.0)
            .frame_junction_width_cm(5.0)
            .primary(settings(Orientation::HeadFirstSupine))
            .companion(settings(Orientation::FeetFirstSupine))
    }

    #[test]
    fn build_applies_defaults_for_optional_sections() {
        let config = builder().build().unwrap();
        assert_eq!(config.junction.levels, STANDARD_JUNCTION_LEVELS);
        assert_eq!(config.feathering, FeatheringConfig::default());
        assert_eq!(
            config.settings_for(Orientation::FeetFirstSupine).orientation,
            Orientation::FeetFirstSupine
        );
    }

    #[test]
    fn build_reports_missing_parameters() {
        let err = PlanConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("field_width_cm"));
    }

    #[test]
    fn build_rejects_identical_orientations() {
        let err = builder()
            .companion(settings(Orientation::HeadFirstSupine))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "companion.orientation", .. }));
    }

    #[test]
    fn build_rejects_invalid_prescription() {
        let mut bad = settings(Orientation::FeetFirstSupine);
        bad.prescription.fractions = 0;
        let err = builder().companion(bad).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "prescription.fractions", .. }));
    }

    #[test]
    fn build_rejects_overlap_not_below_field_width() {
        let mut bad = settings(Orientation::HeadFirstSupine);
        bad.limits.min_overlap_cm = 40.0;
        let err = builder().primary(bad).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "min-overlap", .. }));
    }

    #[test]
    fn prescription_converts_percent_to_fraction_dose() {
        let rx = Prescription::new(12.0, 6).unwrap();
        assert!((rx.dose_per_fraction_gy() - 2.0).abs() < 1e-12);
        assert!((rx.dose_at_percent(30) - 0.6).abs() < 1e-12);
        assert!(Prescription::new(-1.0, 3).is_err());
    }
}
