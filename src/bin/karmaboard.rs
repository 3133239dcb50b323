use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::Parser;

/// Render subreddit posts from a time range into numbered leaderboard cards.
#[derive(Parser, Debug)]
#[command(name = "karmaboard", version)]
struct Cli {
    /// Subreddits to read, comma separated (e.g. `pics,aww`).
    subreddits: String,

    /// Range start: RFC 3339 (`2017-07-14T00:00:00Z`) or unix seconds.
    #[arg(value_parser = parse_instant)]
    start: DateTime<Utc>,

    /// Range end (exclusive): RFC 3339, unix seconds, or `now`.
    #[arg(value_parser = parse_instant, default_value = "now")]
    end: DateTime<Utc>,

    /// JSON run configuration. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for rendered cards.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Render worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Card template image.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Newline-delimited list of trusted media URL prefixes.
    #[arg(long = "allow-list")]
    allow_list: Option<PathBuf>,

    /// Index of the first card (resume point of an earlier run).
    #[arg(long)]
    start_index: Option<u64>,
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| format!("unix time out of range: {secs}"));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected RFC 3339, unix seconds or 'now': {e}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => karmaboard::RunConfig::load(path)?,
        None => karmaboard::RunConfig::default(),
    };
    if let Some(out) = cli.out {
        cfg.output_dir = out;
    }
    if let Some(workers) = cli.workers {
        cfg.workers = workers;
    }
    if let Some(template) = cli.template {
        cfg.template = Some(template);
    }
    if let Some(allow_list) = cli.allow_list {
        cfg.allow_list = allow_list;
    }
    if let Some(start_index) = cli.start_index {
        cfg.start_index = start_index;
    }

    let subreddits = karmaboard::parse_subreddits(&cli.subreddits);
    let window = karmaboard::TimeWindow::new(cli.start, cli.end, cfg.bucket_width())?;
    let mut pipeline = karmaboard::Pipeline::from_config(cfg, subreddits)
        .context("set up render pipeline")?;

    match pipeline.run(&window) {
        Ok(stats) => {
            eprintln!(
                "rendered {} of {} posts ({} skipped, {} failed) into {}; next index {}",
                stats.written,
                stats.posts,
                stats.skipped,
                stats.failed,
                pipeline.config().output_dir.display(),
                stats.next_index
            );
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "run stopped; resume with --start-index {}",
                pipeline.next_index()
            );
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instants_parse_in_all_forms() {
        assert_eq!(parse_instant("0").unwrap().timestamp(), 0);
        assert_eq!(
            parse_instant("2017-07-14T02:40:00Z").unwrap().timestamp(),
            1_500_000_000
        );
        assert!(parse_instant("NOW").is_ok());
        assert!(parse_instant("yesterday").is_err());
    }
}
