//! Overlay configuration
//!
//! Every field has a default, so a partial JSON object from the browser is
//! enough to override a single setting.

use crate::sanitize::SanitizeOrder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Close to the background of most documents: almost no red, high green/blue
impl Default for RgbColor {
    fn default() -> Self {
        Self::new(0.001, 0.8, 0.8)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayOptions {
    /// Horizontal offset of every line
    pub left_margin: f32,
    /// Distance from the top edge to the first baseline
    pub top_margin: f32,
    pub font_size: f32,
    /// Extra space between consecutive baselines
    pub line_gap: f32,
    pub color: RgbColor,
    /// Fill and stroke alpha of the overlay text
    pub opacity: f32,
    /// One of the standard 14 fonts
    pub font: String,
    pub sanitize_order: SanitizeOrder,
    /// Compress streams before saving
    pub compress: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            left_margin: 50.0,
            top_margin: 50.0,
            font_size: 12.0,
            line_gap: 5.0,
            color: RgbColor::default(),
            opacity: 0.001,
            font: "Helvetica".to_string(),
            sanitize_order: SanitizeOrder::default(),
            compress: true,
        }
    }
}

impl OverlayOptions {
    /// Vertical distance between consecutive baselines
    pub fn line_height(&self) -> f32 {
        self.font_size + self.line_gap
    }

    pub fn clamped_opacity(&self) -> f32 {
        if self.opacity.is_nan() {
            return 0.0;
        }
        self.opacity.clamp(0.0, 1.0)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
