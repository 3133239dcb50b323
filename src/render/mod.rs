pub mod caption;
pub mod chart;
pub mod composite;
pub mod dispatch;
pub mod layout;
pub mod svg_raster;

pub use caption::{CaptionText, caption_svg};
pub use chart::{ChartRasterizer, ChartRenderer, ChartStyle, chart_svg};
pub use composite::{
    CompositeRenderer, card_file_name, compose_card, fit_within, letterbox, load_template,
};
pub use dispatch::{BucketReport, CardRenderer, RenderDispatcher, RenderOutcome, RenderTask};
pub use layout::{CardLayout, TextAnchor};
pub use svg_raster::{SvgRasterizer, escape_xml};
