use std::{fmt::Write as _, sync::Arc};

use image::RgbaImage;

use crate::{
    foundation::{
        core::Rgba8,
        error::{KarmaError, KarmaResult},
    },
    render::svg_raster::{SvgRasterizer, escape_xml},
};

/// Rasterizes a titled horizontal bar chart. `names[0]` is drawn as the bottom bar.
pub trait ChartRasterizer: Sync {
    fn render_chart(&self, title: &str, names: &[String], values: &[i64])
    -> KarmaResult<RgbaImage>;
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub font_family: String,
    pub font_size: f32,
    pub bar: Rgba8,
    pub text: Rgba8,
    /// Bar thickness as a fraction of the per-bar slot.
    pub bar_ratio: f32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 300,
            font_family: crate::render::layout::DEFAULT_FONT_FAMILY.to_string(),
            font_size: 22.0,
            bar: Rgba8([31, 119, 180, 255]),
            text: Rgba8([255, 255, 255, 255]),
            bar_ratio: 0.5,
        }
    }
}

pub struct ChartRenderer {
    raster: Arc<SvgRasterizer>,
    style: ChartStyle,
}

impl ChartRenderer {
    pub fn new(raster: Arc<SvgRasterizer>, style: ChartStyle) -> Self {
        Self { raster, style }
    }
}

impl ChartRasterizer for ChartRenderer {
    fn render_chart(
        &self,
        title: &str,
        names: &[String],
        values: &[i64],
    ) -> KarmaResult<RgbaImage> {
        let svg = chart_svg(&self.style, title, names, values)?;
        self.raster.rasterize(&svg)
    }
}

/// SVG source for the bar chart. The background is left transparent.
pub fn chart_svg(
    style: &ChartStyle,
    title: &str,
    names: &[String],
    values: &[i64],
) -> KarmaResult<String> {
    if names.len() != values.len() {
        return Err(KarmaError::validation(format!(
            "chart has {} names but {} values",
            names.len(),
            values.len()
        )));
    }
    if style.width == 0 || style.height == 0 {
        return Err(KarmaError::validation("chart width/height must be > 0"));
    }

    let w = style.width as f32;
    let h = style.height as f32;
    let fs = style.font_size;
    let title_h = fs * 2.0;
    let pad = fs * 0.5;

    let plot_x0 = (w * 0.15).max(fs * 4.0).min(w * 0.5);
    let plot_x1 = (w - w * 0.08).max(plot_x0 + 1.0);
    let plot_y0 = title_h;
    let plot_y1 = (h - pad).max(plot_y0 + 1.0);

    let lo = values.iter().copied().min().unwrap_or(0).min(0) as f64;
    let mut hi = values.iter().copied().max().unwrap_or(0).max(0) as f64;
    if hi <= lo {
        hi = lo + 1.0;
    }
    let scale = f64::from(plot_x1 - plot_x0) / (hi - lo);
    let x_of = |v: f64| plot_x0 + ((v - lo) * scale) as f32;
    let zero_x = x_of(0.0);

    let text_fill = style.text.to_hex();
    let text_opacity = style.text.opacity();
    let family = escape_xml(&style.font_family);

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    let _ = write!(
        svg,
        r#"<text x="{x}" y="{y}" font-family="{family}" font-size="{fs}" text-anchor="middle" fill="{text_fill}" fill-opacity="{text_opacity}">{t}</text>"#,
        x = w / 2.0,
        y = title_h * 0.7,
        t = escape_xml(title),
    );

    let n = names.len();
    if n > 0 {
        let slot = (plot_y1 - plot_y0) / n as f32;
        let bar_h = slot * style.bar_ratio.clamp(0.05, 1.0);
        for (i, (name, value)) in names.iter().zip(values).enumerate() {
            let cy = plot_y1 - (i as f32 + 0.5) * slot;
            let vx = x_of(*value as f64);
            let (bx, bw) = if vx >= zero_x {
                (zero_x, vx - zero_x)
            } else {
                (vx, zero_x - vx)
            };
            let _ = write!(
                svg,
                r#"<rect x="{bx}" y="{y}" width="{bw}" height="{bar_h}" fill="{fill}" fill-opacity="{op}"/>"#,
                y = cy - bar_h / 2.0,
                fill = style.bar.to_hex(),
                op = style.bar.opacity(),
            );
            let baseline = cy + fs * 0.35;
            let _ = write!(
                svg,
                r#"<text x="{x}" y="{baseline}" font-family="{family}" font-size="{fs}" text-anchor="end" fill="{text_fill}" fill-opacity="{text_opacity}">{label}</text>"#,
                x = plot_x0 - pad,
                label = escape_xml(name),
            );
            let (vx_text, anchor) = if *value < 0 {
                (bx - pad, "end")
            } else {
                (bx + bw + pad, "start")
            };
            let _ = write!(
                svg,
                r#"<text x="{vx_text}" y="{baseline}" font-family="{family}" font-size="{fs}" text-anchor="{anchor}" fill="{text_fill}" fill-opacity="{text_opacity}">{value}</text>"#
            );
        }
    }

    let _ = write!(
        svg,
        r#"<line x1="{zero_x}" y1="{plot_y0}" x2="{zero_x}" y2="{plot_y1}" stroke="{text_fill}" stroke-opacity="{text_opacity}" stroke-width="2"/>"#
    );
    svg.push_str("</svg>");
    Ok(svg)
}
