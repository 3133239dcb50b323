use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use image::{RgbaImage, imageops};

use crate::{
    assets::fetch::{FetchOutcome, ImageFetcher, MediaTransport},
    foundation::{
        core::{Canvas, Rgba8},
        error::{KarmaError, KarmaResult},
    },
    leaderboard::ChartSnapshot,
    render::{
        caption::{CaptionText, caption_svg},
        dispatch::{CardRenderer, RenderOutcome, RenderTask},
        layout::CardLayout,
        svg_raster::SvgRasterizer,
    },
    source::model::Post,
};

/// Downscale `img` to fit inside `bounds`, keeping its aspect ratio. Images that already fit are
/// returned unchanged; nothing is ever enlarged.
pub fn fit_within(img: &RgbaImage, bounds: Canvas) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w <= bounds.width && h <= bounds.height {
        return img.clone();
    }
    let scale = f64::min(
        f64::from(bounds.width) / f64::from(w),
        f64::from(bounds.height) / f64::from(h),
    );
    let nw = ((f64::from(w) * scale).round() as u32).clamp(1, bounds.width);
    let nh = ((f64::from(h) * scale).round() as u32).clamp(1, bounds.height);
    imageops::resize(img, nw, nh, imageops::FilterType::Lanczos3)
}

/// Centre `img` on a `bounds`-sized canvas filled with `fill`. `img` must already fit.
pub fn letterbox(img: &RgbaImage, bounds: Canvas, fill: Rgba8) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(bounds.width, bounds.height, fill.to_pixel());
    let x = i64::from(bounds.width.saturating_sub(img.width()) / 2);
    let y = i64::from(bounds.height.saturating_sub(img.height()) / 2);
    imageops::replace(&mut canvas, img, x, y);
    canvas
}

/// Load the card template, or synthesize a flat one from the layout.
pub fn load_template(path: Option<&Path>, layout: &CardLayout) -> KarmaResult<RgbaImage> {
    let template = match path {
        Some(p) => image::open(p)
            .with_context(|| format!("open template '{}'", p.display()))?
            .to_rgba8(),
        None => RgbaImage::from_pixel(
            layout.template_size.width,
            layout.template_size.height,
            layout.template_fill.to_pixel(),
        ),
    };
    let (width, height) = template.dimensions();
    layout.validate_for(Canvas { width, height })?;
    Ok(template)
}

/// Build one card. Returns `None` when there is no image to show; such posts produce no file.
pub fn compose_card(
    template: &RgbaImage,
    layout: &CardLayout,
    image: Option<&RgbaImage>,
    post: &Post,
    chart: &ChartSnapshot,
    raster: &SvgRasterizer,
) -> KarmaResult<Option<RgbaImage>> {
    let Some(image) = image else {
        return Ok(None);
    };

    let (tw, th) = template.dimensions();
    let canvas_size = Canvas {
        width: tw,
        height: th,
    };
    let rect = layout.image_rect;
    if !rect.fits_within(canvas_size) {
        return Err(KarmaError::validation("image rect exceeds template"));
    }

    let mut card = template.clone();
    let boxed = letterbox(
        &fit_within(image, rect.size()),
        rect.size(),
        layout.letterbox_fill,
    );
    // A straight copy, not a blend: the letterbox fill replaces what the template had there.
    imageops::replace(&mut card, &boxed, i64::from(rect.left), i64::from(rect.top));

    let caption = CaptionText::for_post(post, layout);
    let text_layer = raster.rasterize(&caption_svg(&caption, layout, canvas_size))?;
    imageops::overlay(&mut card, &text_layer, 0, 0);

    let chart_img = chart.image();
    if chart_img.width() > 0 && chart_img.height() > 0 {
        let scaled;
        let chart_img = if chart_img.width() == tw {
            chart_img
        } else {
            let ch = (u64::from(chart_img.height()) * u64::from(tw) / u64::from(chart_img.width()))
                .max(1) as u32;
            scaled = imageops::resize(chart_img, tw, ch, imageops::FilterType::Triangle);
            &scaled
        };
        let y = i64::from(th) - i64::from(chart_img.height());
        imageops::overlay(&mut card, chart_img, 0, y);
    }

    Ok(Some(card))
}

/// Output file name for a global index, zero padded to `width` digits.
pub fn card_file_name(index: u64, width: usize) -> String {
    format!("{index:0width$}.png")
}

/// Fetches each task's image, composes the card and writes it under `out_dir`.
pub struct CompositeRenderer<T> {
    template: RgbaImage,
    layout: CardLayout,
    fetcher: ImageFetcher<T>,
    raster: Arc<SvgRasterizer>,
    out_dir: PathBuf,
    index_width: usize,
}

impl<T: MediaTransport> CompositeRenderer<T> {
    pub fn new(
        template: RgbaImage,
        layout: CardLayout,
        fetcher: ImageFetcher<T>,
        raster: Arc<SvgRasterizer>,
        out_dir: impl Into<PathBuf>,
        index_width: usize,
    ) -> KarmaResult<Self> {
        let (width, height) = template.dimensions();
        layout.validate_for(Canvas { width, height })?;
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("create output dir '{}'", out_dir.display()))?;
        Ok(Self {
            template,
            layout,
            fetcher,
            raster,
            out_dir,
            index_width,
        })
    }

    pub fn output_path(&self, index: u64) -> PathBuf {
        self.out_dir.join(card_file_name(index, self.index_width))
    }
}

impl<T: MediaTransport> CardRenderer for CompositeRenderer<T> {
    fn render(&self, task: &RenderTask) -> KarmaResult<RenderOutcome> {
        let image = match self.fetcher.fetch(&task.post.url) {
            FetchOutcome::Image(img) => img,
            FetchOutcome::NoImage(reason) => return Ok(RenderOutcome::Skipped(reason)),
        };

        let Some(card) = compose_card(
            &self.template,
            &self.layout,
            Some(&image),
            &task.post,
            &task.chart,
            &self.raster,
        )?
        else {
            return Err(KarmaError::render("card composition produced no image"));
        };

        let path = self.output_path(task.global_index);
        card.save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(RenderOutcome::Written(path))
    }
}
