use std::sync::Arc;

use crate::{
    assets::{
        allow_list::AllowList,
        fetch::{HttpTransport, ImageFetcher},
    },
    config::RunConfig,
    foundation::error::KarmaResult,
    leaderboard::LeaderboardTracker,
    logs::{RunLogs, TextLog, audit_line},
    render::{
        chart::{ChartRasterizer, ChartRenderer, ChartStyle},
        composite::{CompositeRenderer, load_template},
        dispatch::{CardRenderer, RenderDispatcher},
        svg_raster::SvgRasterizer,
    },
    source::{
        pushshift::{PostSource, PushshiftSource},
        window::{TimeWindow, TimeWindowedFetcher},
    },
};

/// Totals for a run. `next_index` is the first index a follow-up run should use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub buckets: u32,
    pub posts: u64,
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
    pub charts_rendered: u64,
    pub next_index: u64,
}

/// Drive every bucket of `window` through fetch, the sequential leaderboard pass and the parallel
/// render pass, strictly in chronological order.
pub fn run_window<S, C, R>(
    fetcher: &TimeWindowedFetcher<S>,
    window: &TimeWindow,
    tracker: &mut LeaderboardTracker<C>,
    dispatcher: &mut RenderDispatcher<R>,
    audit: &TextLog,
) -> KarmaResult<RunStats>
where
    S: PostSource,
    C: ChartRasterizer,
    R: CardRenderer,
{
    let total = window.bucket_count();
    let mut stats = RunStats {
        next_index: dispatcher.next_index(),
        ..RunStats::default()
    };
    tracing::info!(
        start = %window.start,
        end = %window.end,
        buckets = total,
        subreddits = ?fetcher.subreddits(),
        "starting run"
    );

    for bucket in window.buckets() {
        let posts = fetcher.fetch_bucket(bucket)?;
        let charts = tracker.observe_all(&posts)?;
        for post in &posts {
            audit.append(&audit_line(post));
        }

        let report = dispatcher.dispatch_bucket(bucket.index, total, &posts, &charts)?;
        stats.buckets += 1;
        stats.posts += report.posts;
        stats.written += report.written;
        stats.skipped += report.skipped;
        stats.failed += report.failed;
        stats.next_index = report.next_index;
    }

    stats.charts_rendered = tracker.charts_rendered();
    tracing::info!(
        posts = stats.posts,
        written = stats.written,
        skipped = stats.skipped,
        failed = stats.failed,
        charts = stats.charts_rendered,
        next_index = stats.next_index,
        "run complete"
    );
    Ok(stats)
}

/// The production wiring: Pushshift source, resvg chart, HTTP media fetch, files on disk.
pub struct Pipeline {
    fetcher: TimeWindowedFetcher<PushshiftSource>,
    tracker: LeaderboardTracker<ChartRenderer>,
    dispatcher: RenderDispatcher<CompositeRenderer<HttpTransport>>,
    logs: RunLogs,
    config: RunConfig,
}

impl Pipeline {
    pub fn from_config(config: RunConfig, subreddits: Vec<String>) -> KarmaResult<Self> {
        config.validate()?;

        let logs = RunLogs::open(&config.log_dir)?;
        let allow = AllowList::load(&config.allow_list)?;
        if allow.is_empty() {
            tracing::warn!(
                path = %config.allow_list.display(),
                "allow list is empty; every post will be skipped"
            );
        }

        let raster = Arc::new(SvgRasterizer::with_system_fonts());
        let template = load_template(config.template.as_deref(), &config.layout)?;
        let chart_style = ChartStyle {
            width: template.width(),
            height: config.layout.chart_height,
            font_family: config.layout.font_family.clone(),
            text: config.layout.text,
            ..ChartStyle::default()
        };

        let fetcher = TimeWindowedFetcher::new(
            PushshiftSource::new(&config.source)?,
            subreddits,
            config.source.size_hint,
            config.retry_backoff(),
        )?;
        let tracker = LeaderboardTracker::new(ChartRenderer::new(Arc::clone(&raster), chart_style));
        let images = ImageFetcher::new(
            allow,
            config.fetch.rewrites.clone(),
            HttpTransport::new(&config.fetch)?,
            Arc::clone(&logs.errors),
        );
        let renderer = CompositeRenderer::new(
            template,
            config.layout.clone(),
            images,
            raster,
            &config.output_dir,
            config.index_width,
        )?;
        let dispatcher = RenderDispatcher::new(renderer, config.workers, config.start_index)?;

        Ok(Self {
            fetcher,
            tracker,
            dispatcher,
            logs,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// First index not yet handed out. After a fatal error this is where a later run resumes.
    pub fn next_index(&self) -> u64 {
        self.dispatcher.next_index()
    }

    pub fn run(&mut self, window: &TimeWindow) -> KarmaResult<RunStats> {
        run_window(
            &self.fetcher,
            window,
            &mut self.tracker,
            &mut self.dispatcher,
            &self.logs.audit,
        )
    }
}
