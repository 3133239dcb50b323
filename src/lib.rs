//! karmaboard renders subreddit posts into leaderboard cards.
//!
//! A run pages a data source through a time window one bucket at a time. Each bucket's posts go
//! through a sequential leaderboard pass (one chart snapshot per post) and then a parallel render
//! pass that writes one numbered PNG per post whose image could be fetched.
#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
mod foundation;
pub mod leaderboard;
pub mod logs;
pub mod pipeline;
pub mod render;
pub mod source;

pub use crate::foundation::core::{Canvas, PasteRect, Rgba8};
pub use crate::foundation::error::{KarmaError, KarmaResult};

pub use crate::assets::{
    AllowList, FetchConfig, FetchOutcome, HttpTransport, ImageFetcher, MediaTransport,
    NoImageReason, RewriteRule, TransportError,
};
pub use crate::config::RunConfig;
pub use crate::leaderboard::{CHART_TITLE, ChartSnapshot, LeaderboardTracker, Standing, TOP_N};
pub use crate::logs::{RunLogs, TextLog};
pub use crate::pipeline::{Pipeline, RunStats, run_window};
pub use crate::render::{
    BucketReport, CardLayout, CardRenderer, ChartRasterizer, ChartRenderer, ChartStyle,
    CompositeRenderer, RenderDispatcher, RenderOutcome, RenderTask, SvgRasterizer, TextAnchor,
};
pub use crate::source::{
    Author, Bucket, Post, PostSource, PushshiftSource, SourceConfig, SourceError, TimeWindow,
    TimeWindowedFetcher, parse_subreddits,
};
