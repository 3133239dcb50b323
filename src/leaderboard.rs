use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use image::RgbaImage;

use crate::{foundation::error::KarmaResult, render::chart::ChartRasterizer, source::model::Post};

pub const TOP_N: usize = 3;
pub const CHART_TITLE: &str = "Karma Leaderboard";

/// One author's cumulative score at a point in the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub author: String,
    pub score: i64,
}

/// An immutable rendered chart tied to one top-N ranking. Clones share the same image.
#[derive(Clone, Debug)]
pub struct ChartSnapshot(Arc<SnapshotInner>);

#[derive(Debug)]
struct SnapshotInner {
    standings: Vec<Standing>,
    image: RgbaImage,
}

impl ChartSnapshot {
    pub fn new(standings: Vec<Standing>, image: RgbaImage) -> Self {
        Self(Arc::new(SnapshotInner { standings, image }))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0.image
    }

    /// Ranking and scores as they were when the chart was drawn.
    pub fn standings(&self) -> &[Standing] {
        &self.0.standings
    }

    /// True when both handles refer to the same rendered chart.
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    score: i64,
    first_seen: u64,
}

/// Accumulates karma per author in post arrival order and hands out one chart per post,
/// redrawing only when the ordered top-N author list changes.
///
/// Ranking: higher cumulative score first, ties go to the author seen first. The reported list
/// is ascending (lowest of the top N first), which draws the leader as the top bar.
pub struct LeaderboardTracker<C> {
    chart: C,
    title: String,
    top_n: usize,
    totals: HashMap<String, Entry>,
    seen_authors: u64,
    current: Option<(Vec<String>, ChartSnapshot)>,
    charts_rendered: u64,
}

impl<C: ChartRasterizer> LeaderboardTracker<C> {
    pub fn new(chart: C) -> Self {
        Self::with_top_n(chart, TOP_N)
    }

    pub fn with_top_n(chart: C, top_n: usize) -> Self {
        Self {
            chart,
            title: CHART_TITLE.to_string(),
            top_n: top_n.max(1),
            totals: HashMap::new(),
            seen_authors: 0,
            current: None,
            charts_rendered: 0,
        }
    }

    /// Fold one post into the totals and return the chart to show with it.
    pub fn observe(&mut self, post: &Post) -> KarmaResult<ChartSnapshot> {
        if let Some(name) = post.author.name() {
            let seen = &mut self.seen_authors;
            let entry = self.totals.entry(name.to_string()).or_insert_with(|| {
                *seen += 1;
                Entry {
                    score: 0,
                    first_seen: *seen - 1,
                }
            });
            entry.score += post.score;
        }

        let top = self.top();
        let ranking: Vec<String> = top.iter().map(|s| s.author.clone()).collect();
        if let Some((prev, snapshot)) = &self.current
            && *prev == ranking
        {
            return Ok(snapshot.clone());
        }

        let names = ranking.clone();
        let values: Vec<i64> = top.iter().map(|s| s.score).collect();
        let image = self.chart.render_chart(&self.title, &names, &values)?;
        let snapshot = ChartSnapshot::new(top, image);
        self.charts_rendered += 1;
        tracing::debug!(ranking = ?ranking, "leaderboard changed, chart redrawn");
        self.current = Some((ranking, snapshot.clone()));
        Ok(snapshot)
    }

    /// One snapshot per post, in input order.
    pub fn observe_all(&mut self, posts: &[Post]) -> KarmaResult<Vec<ChartSnapshot>> {
        posts.iter().map(|p| self.observe(p)).collect()
    }

    /// Current top N, ascending by score.
    pub fn top(&self) -> Vec<Standing> {
        let mut ranked: Vec<(&String, &Entry)> = self.totals.iter().collect();
        if ranked.len() > self.top_n {
            ranked.select_nth_unstable_by(self.top_n - 1, rank_order);
        }
        ranked.truncate(self.top_n);
        ranked.sort_by(rank_order);
        ranked
            .into_iter()
            .rev()
            .map(|(author, e)| Standing {
                author: author.clone(),
                score: e.score,
            })
            .collect()
    }

    pub fn score_of(&self, author: &str) -> Option<i64> {
        self.totals.get(author).map(|e| e.score)
    }

    pub fn authors(&self) -> usize {
        self.totals.len()
    }

    pub fn charts_rendered(&self) -> u64 {
        self.charts_rendered
    }
}

// Best first: higher score, then earlier first appearance.
fn rank_order(a: &(&String, &Entry), b: &(&String, &Entry)) -> Ordering {
    b.1.score
        .cmp(&a.1.score)
        .then(a.1.first_seen.cmp(&b.1.first_seen))
}
