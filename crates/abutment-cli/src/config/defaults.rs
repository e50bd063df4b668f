use abutment::engine::config::{STANDARD_JUNCTION_LEVELS, STANDARD_THRESHOLD_STEP};

pub struct DefaultsConfig {
    pub field_width_cm: f64,
    pub min_overlap_cm: f64,
    pub frame_overlap_cm: f64,
    pub levels: u32,
    pub transverse_margin_cm: f64,
    pub threshold_step: u32,
    pub min_band_volume_cc: f64,
    pub max_length_cm: f64,
    pub max_isocenters: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            field_width_cm: 40.0,
            min_overlap_cm: 2.0,
            frame_overlap_cm: 5.0,
            levels: STANDARD_JUNCTION_LEVELS,
            transverse_margin_cm: 1.0,
            threshold_step: STANDARD_THRESHOLD_STEP,
            min_band_volume_cc: 0.1,
            max_length_cm: 200.0,
            max_isocenters: 8,
        }
    }
}
