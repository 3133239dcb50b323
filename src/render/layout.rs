use crate::foundation::{
    core::{Canvas, PasteRect, Rgba8},
    error::{KarmaError, KarmaResult},
};

pub const DEFAULT_FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, sans-serif";

/// A line of caption text, horizontally centred on `x` with its baseline at `y`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextAnchor {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

/// Where everything goes on a card.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CardLayout {
    /// Canvas synthesized when no template image is configured.
    pub template_size: Canvas,
    pub template_fill: Rgba8,
    /// Destination of the fetched post image.
    pub image_rect: PasteRect,
    /// Fill of the area around a letterboxed image.
    pub letterbox_fill: Rgba8,
    pub title: TextAnchor,
    pub author: TextAnchor,
    pub karma: TextAnchor,
    pub timestamp: TextAnchor,
    pub font_family: String,
    pub text: Rgba8,
    pub karma_positive: Rgba8,
    pub karma_negative: Rgba8,
    /// Longer titles are cut and end in an ellipsis.
    pub title_max_chars: usize,
    /// `chrono` format string for the creation time.
    pub timestamp_format: String,
    /// Chart height before it is scaled to the template width.
    pub chart_height: u32,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            template_size: Canvas {
                width: 1920,
                height: 1280,
            },
            template_fill: Rgba8([26, 26, 27, 255]),
            image_rect: PasteRect {
                left: 353,
                top: 150,
                right: 1566,
                bottom: 787,
            },
            letterbox_fill: Rgba8::TRANSPARENT,
            title: TextAnchor {
                x: 960.0,
                y: 100.0,
                size: 44.0,
            },
            author: TextAnchor {
                x: 640.0,
                y: 860.0,
                size: 36.0,
            },
            karma: TextAnchor {
                x: 1280.0,
                y: 860.0,
                size: 36.0,
            },
            timestamp: TextAnchor {
                x: 960.0,
                y: 930.0,
                size: 30.0,
            },
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            text: Rgba8([255, 255, 255, 255]),
            karma_positive: Rgba8([255, 139, 96, 255]),
            karma_negative: Rgba8([148, 148, 255, 255]),
            title_max_chars: 90,
            timestamp_format: "%Y-%m-%d %H:%M:%S UTC".to_string(),
            chart_height: 300,
        }
    }
}

impl CardLayout {
    /// Check the layout against the template it will be applied to.
    pub fn validate_for(&self, template: Canvas) -> KarmaResult<()> {
        self.image_rect.validate()?;
        if !self.image_rect.fits_within(template) {
            return Err(KarmaError::validation(format!(
                "image rect ({}, {}, {}, {}) exceeds template {}x{}",
                self.image_rect.left,
                self.image_rect.top,
                self.image_rect.right,
                self.image_rect.bottom,
                template.width,
                template.height
            )));
        }
        if self.chart_height == 0 {
            return Err(KarmaError::validation("chart_height must be > 0"));
        }
        Ok(())
    }
}
