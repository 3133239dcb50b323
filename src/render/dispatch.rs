use std::{
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
};

use rayon::prelude::*;

use crate::{
    assets::fetch::NoImageReason,
    foundation::error::{KarmaError, KarmaResult},
    leaderboard::ChartSnapshot,
    source::model::Post,
};

/// Everything one worker needs to render one card. Tasks share no mutable state.
#[derive(Clone, Debug)]
pub struct RenderTask {
    pub post: Post,
    pub global_index: u64,
    pub chart: ChartSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Written(PathBuf),
    /// No image could be fetched; the index is consumed but no file exists for it.
    Skipped(NoImageReason),
}

/// Renders one task. Called concurrently from the worker pool.
pub trait CardRenderer: Sync {
    fn render(&self, task: &RenderTask) -> KarmaResult<RenderOutcome>;
}

/// Counts for one dispatched bucket. Indices `first_index..next_index` belong to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BucketReport {
    pub posts: u64,
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
    pub first_index: u64,
    pub next_index: u64,
}

/// Fans a bucket's render tasks out over a fixed-size pool and owns the global output index.
///
/// The index only moves between buckets, by the bucket's post count, whatever happened to the
/// individual tasks.
pub struct RenderDispatcher<R> {
    renderer: R,
    pool: rayon::ThreadPool,
    next_index: u64,
}

impl<R: CardRenderer> RenderDispatcher<R> {
    pub fn new(renderer: R, workers: usize, start_index: u64) -> KarmaResult<Self> {
        Ok(Self {
            renderer,
            pool: build_thread_pool(workers)?,
            next_index: start_index,
        })
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Pair each post with its chart and an index from this bucket's contiguous range.
    pub fn build_tasks(
        &self,
        posts: &[Post],
        charts: &[ChartSnapshot],
    ) -> KarmaResult<Vec<RenderTask>> {
        if posts.len() != charts.len() {
            return Err(KarmaError::validation(format!(
                "{} posts but {} chart snapshots",
                posts.len(),
                charts.len()
            )));
        }
        Ok(posts
            .iter()
            .zip(charts)
            .enumerate()
            .map(|(i, (post, chart))| RenderTask {
                post: post.clone(),
                global_index: self.next_index + i as u64,
                chart: chart.clone(),
            })
            .collect())
    }

    pub fn dispatch_bucket(
        &mut self,
        bucket_no: u32,
        total_buckets: u32,
        posts: &[Post],
        charts: &[ChartSnapshot],
    ) -> KarmaResult<BucketReport> {
        let tasks = self.build_tasks(posts, charts)?;
        let first_index = self.next_index;
        let total = tasks.len() as u64;
        tracing::info!(
            bucket = bucket_no + 1,
            total_buckets,
            posts = total,
            first_index,
            "rendering bucket"
        );

        let completed = AtomicU64::new(0);
        let renderer = &self.renderer;
        let outcomes: Vec<Option<RenderOutcome>> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let outcome = run_isolated(renderer, task);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::debug!(index = task.global_index, done, total, "render task finished");
                    outcome
                })
                .collect()
        });

        let mut report = BucketReport {
            posts: total,
            first_index,
            next_index: first_index + total,
            ..BucketReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Some(RenderOutcome::Written(_)) => report.written += 1,
                Some(RenderOutcome::Skipped(_)) => report.skipped += 1,
                None => report.failed += 1,
            }
        }

        self.next_index = report.next_index;
        tracing::info!(
            bucket = bucket_no + 1,
            total_buckets,
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            next_index = self.next_index,
            "bucket done"
        );
        Ok(report)
    }
}

/// Run one task so that neither an error nor a panic reaches its siblings.
fn run_isolated<R: CardRenderer>(renderer: &R, task: &RenderTask) -> Option<RenderOutcome> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| renderer.render(task))) {
        Ok(Ok(outcome)) => {
            if let RenderOutcome::Skipped(reason) = &outcome {
                tracing::debug!(index = task.global_index, ?reason, "post skipped");
            }
            Some(outcome)
        }
        Ok(Err(e)) => {
            tracing::error!(
                index = task.global_index,
                post = %task.post.id,
                error = %e,
                "render task failed"
            );
            None
        }
        Err(_) => {
            tracing::error!(
                index = task.global_index,
                post = %task.post.id,
                "render task panicked"
            );
            None
        }
    }
}

fn build_thread_pool(workers: usize) -> KarmaResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(KarmaError::validation("render workers must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("karmaboard-render-{i}"))
        .build()
        .map_err(|e| KarmaError::render(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Mutex};

    use chrono::DateTime;
    use image::RgbaImage;

    use super::*;
    use crate::source::model::Author;

    struct Scripted {
        seen: Mutex<Vec<u64>>,
    }

    impl CardRenderer for Scripted {
        fn render(&self, task: &RenderTask) -> KarmaResult<RenderOutcome> {
            self.seen.lock().unwrap().push(task.global_index);
            match task.post.id.as_str() {
                "skip" => Ok(RenderOutcome::Skipped(NoImageReason::NotAllowed)),
                "fail" => Err(KarmaError::render("boom")),
                "panic" => panic!("worker blew up"),
                _ => Ok(RenderOutcome::Written(PathBuf::from(format!(
                    "{}.png",
                    task.global_index
                )))),
            }
        }
    }

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            url: "https://i.redd.it/x.png".into(),
            title: "t".into(),
            author: Author::Named("a".into()),
            score: 1,
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            permalink: "/x".into(),
        }
    }

    fn charts(n: usize) -> Vec<ChartSnapshot> {
        let c = ChartSnapshot::new(vec![], RgbaImage::new(1, 1));
        vec![c; n]
    }

    fn dispatcher(start: u64) -> RenderDispatcher<Scripted> {
        RenderDispatcher::new(
            Scripted {
                seen: Mutex::new(Vec::new()),
            },
            3,
            start,
        )
        .unwrap()
    }

    #[test]
    fn indices_are_contiguous_across_buckets_including_skips() {
        let mut d = dispatcher(0);
        let b1 = [post("a"), post("skip"), post("b")];
        let b2 = [post("skip"), post("c")];
        let r1 = d.dispatch_bucket(0, 3, &b1, &charts(3)).unwrap();
        let r2 = d.dispatch_bucket(1, 3, &[], &[]).unwrap();
        let r3 = d.dispatch_bucket(2, 3, &b2, &charts(2)).unwrap();

        assert_eq!((r1.first_index, r1.next_index), (0, 3));
        assert_eq!((r1.written, r1.skipped), (2, 1));
        assert_eq!(r2, BucketReport {
            first_index: 3,
            next_index: 3,
            ..BucketReport::default()
        });
        assert_eq!((r3.first_index, r3.next_index), (3, 5));
        assert_eq!(d.next_index(), 5);

        let mut seen = d.renderer().seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn failing_tasks_do_not_abort_siblings() {
        let mut d = dispatcher(10);
        let posts = [post("fail"), post("a"), post("panic"), post("b")];
        let r = d.dispatch_bucket(0, 1, &posts, &charts(4)).unwrap();
        assert_eq!(r.written, 2);
        assert_eq!(r.failed, 2);
        assert_eq!(d.next_index(), 14);
        let seen: HashSet<u64> = d.renderer().seen.lock().unwrap().iter().copied().collect();
        assert_eq!(seen, (10..14).collect());
    }

    #[test]
    fn tasks_carry_their_post_and_chart() {
        let d = dispatcher(7);
        let c = charts(2);
        let tasks = d.build_tasks(&[post("x"), post("y")], &c).unwrap();
        assert_eq!(tasks[1].global_index, 8);
        assert_eq!(tasks[1].post.id, "y");
        assert!(tasks[0].chart.same_snapshot(&c[0]));
    }

    #[test]
    fn mismatched_chart_count_is_rejected() {
        let mut d = dispatcher(0);
        assert!(d.dispatch_bucket(0, 1, &[post("a")], &[]).is_err());
        assert_eq!(d.next_index(), 0);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let s = Scripted {
            seen: Mutex::new(Vec::new()),
        };
        assert!(RenderDispatcher::new(s, 0, 0).is_err());
    }
}
