use std::sync::Arc;

use anyhow::Context as _;
use image::RgbaImage;

use crate::foundation::error::{KarmaError, KarmaResult};

// Avoid pathological allocations. Cards and charts are a few thousand pixels wide at most.
const MAX_DIM: u32 = 16_384;

/// Parses SVG documents against one shared font database and rasterizes them to straight-alpha
/// RGBA8. Loading system fonts is slow, so build one of these per run and share it.
pub struct SvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgRasterizer {
    pub fn with_system_fonts() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system fonts");
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// No fonts: text nodes are dropped, shapes still render.
    pub fn without_fonts() -> Self {
        Self {
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    pub fn parse(&self, svg: &str) -> KarmaResult<usvg::Tree> {
        let opts = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(svg, &opts).context("parse svg tree")?;
        Ok(tree)
    }

    /// Rasterize at the document's intrinsic size.
    pub fn rasterize(&self, svg: &str) -> KarmaResult<RgbaImage> {
        let tree = self.parse(svg)?;
        let size = tree.size();
        let width = to_px(size.width())?;
        let height = to_px(size.height())?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| KarmaError::render("failed to allocate svg pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        // tiny-skia stores premultiplied pixels; the image crate composites straight alpha.
        let mut out = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for px in pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(width, height, out)
            .ok_or_else(|| KarmaError::render("svg raster buffer size mismatch"))
    }
}

fn to_px(v: f32) -> KarmaResult<u32> {
    if !v.is_finite() || v <= 0.0 {
        return Err(KarmaError::render("svg has invalid width/height"));
    }
    let px = (v.ceil() as u32).max(1);
    if px > MAX_DIM {
        return Err(KarmaError::render(format!(
            "svg raster size too large: {px} (max {MAX_DIM})"
        )));
    }
    Ok(px)
}

/// Escape text for use inside SVG element content or attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}
