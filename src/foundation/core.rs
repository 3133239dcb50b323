use crate::foundation::error::{KarmaError, KarmaResult};

/// Pixel size of a canvas or image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Destination rectangle in template pixel space, `(left, top)` inclusive and
/// `(right, bottom)` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PasteRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PasteRect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> KarmaResult<Self> {
        let rect = Self {
            left,
            top,
            right,
            bottom,
        };
        rect.validate()?;
        Ok(rect)
    }

    pub fn width(self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn size(self) -> Canvas {
        Canvas {
            width: self.width(),
            height: self.height(),
        }
    }

    pub fn validate(self) -> KarmaResult<()> {
        if self.right <= self.left || self.bottom <= self.top {
            return Err(KarmaError::validation(format!(
                "paste rect must be non-empty, got ({}, {}, {}, {})",
                self.left, self.top, self.right, self.bottom
            )));
        }
        Ok(())
    }

    pub fn fits_within(self, canvas: Canvas) -> bool {
        self.right <= canvas.width && self.bottom <= canvas.height
    }
}

/// Straight-alpha RGBA8 colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);

    pub fn to_pixel(self) -> image::Rgba<u8> {
        image::Rgba(self.0)
    }

    /// `#rrggbb` for SVG fills; alpha is emitted separately as `fill-opacity`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }

    pub fn opacity(self) -> f32 {
        f32::from(self.0[3]) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_size_and_validation() {
        let r = PasteRect::new(10, 20, 110, 70).unwrap();
        assert_eq!(
            r.size(),
            Canvas {
                width: 100,
                height: 50
            }
        );
        assert!(PasteRect::new(10, 10, 10, 20).is_err());
        assert!(PasteRect::new(10, 30, 20, 20).is_err());
    }

    #[test]
    fn rect_fits_within_canvas() {
        let r = PasteRect::new(0, 0, 64, 64).unwrap();
        assert!(r.fits_within(Canvas {
            width: 64,
            height: 64
        }));
        assert!(!r.fits_within(Canvas {
            width: 63,
            height: 64
        }));
    }

    #[test]
    fn colour_hex_and_opacity() {
        let c = Rgba8([255, 139, 96, 255]);
        assert_eq!(c.to_hex(), "#ff8b60");
        assert!((c.opacity() - 1.0).abs() < 1e-6);
        assert_eq!(Rgba8::TRANSPARENT.to_pixel(), image::Rgba([0, 0, 0, 0]));
    }
}
