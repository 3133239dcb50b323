use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    foundation::error::{KarmaError, KarmaResult},
    source::{
        model::Post,
        pushshift::{PostSource, SourceError},
    },
};

/// `[start, end)` split into fixed-width buckets plus a trailing partial bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub width: TimeDelta,
}

/// One half-open page `[start, end)` of a [`TimeWindow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bucket {
    pub index: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Bucket {
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, width: TimeDelta) -> KarmaResult<Self> {
        if width <= TimeDelta::zero() {
            return Err(KarmaError::validation("bucket width must be > 0"));
        }
        if end < start {
            return Err(KarmaError::validation(format!(
                "time window end ({end}) precedes start ({start})"
            )));
        }
        Ok(Self { start, end, width })
    }

    pub fn hourly(start: DateTime<Utc>, end: DateTime<Utc>) -> KarmaResult<Self> {
        Self::new(start, end, TimeDelta::hours(1))
    }

    pub fn full_buckets(&self) -> u32 {
        let span = (self.end - self.start).num_milliseconds();
        let width = self.width.num_milliseconds().max(1);
        u32::try_from(span / width).unwrap_or(u32::MAX)
    }

    pub fn bucket_count(&self) -> u32 {
        let full = self.full_buckets();
        if self.boundary(full) < self.end {
            full.saturating_add(1)
        } else {
            full
        }
    }

    /// Bucket `index`. Indices at or past the last full bucket get their end clamped to the
    /// window end instead of failing.
    pub fn bucket(&self, index: u32) -> Bucket {
        let start = self.boundary(index).min(self.end);
        let end = if index < self.full_buckets() {
            self.boundary(index + 1)
        } else {
            self.end
        };
        Bucket { index, start, end }
    }

    pub fn buckets(&self) -> impl Iterator<Item = Bucket> + '_ {
        (0..self.bucket_count()).map(|i| self.bucket(i))
    }

    fn boundary(&self, index: u32) -> DateTime<Utc> {
        self.width
            .checked_mul(i32::try_from(index).unwrap_or(i32::MAX))
            .and_then(|off| self.start.checked_add_signed(off))
            .unwrap_or(self.end)
    }
}

/// Split a comma-separated subreddit list, dropping blanks.
pub fn parse_subreddits(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pages a [`PostSource`] through a [`TimeWindow`] one bucket at a time.
pub struct TimeWindowedFetcher<S> {
    source: S,
    subreddits: Vec<String>,
    size_hint: u32,
    retry_backoff: Duration,
}

impl<S: PostSource> TimeWindowedFetcher<S> {
    pub fn new(
        source: S,
        subreddits: Vec<String>,
        size_hint: u32,
        retry_backoff: Duration,
    ) -> KarmaResult<Self> {
        if subreddits.is_empty() {
            return Err(KarmaError::validation("at least one subreddit is required"));
        }
        Ok(Self {
            source,
            subreddits,
            size_hint,
            retry_backoff,
        })
    }

    pub fn subreddits(&self) -> &[String] {
        &self.subreddits
    }

    /// All posts of every subreddit in `bucket`, oldest first.
    ///
    /// A connection failure is retried once after the backoff; a second consecutive failure
    /// for the same bucket is returned to the caller.
    #[tracing::instrument(skip(self), fields(index = bucket.index))]
    pub fn fetch_bucket(&self, bucket: Bucket) -> KarmaResult<Vec<Post>> {
        if bucket.is_empty() {
            return Ok(Vec::new());
        }
        match self.query_bucket(bucket) {
            Err(SourceError::Connection(detail)) => {
                tracing::warn!(
                    %detail,
                    backoff_secs = self.retry_backoff.as_secs(),
                    "source unreachable, retrying bucket after backoff"
                );
                std::thread::sleep(self.retry_backoff);
                Ok(self.query_bucket(bucket)?)
            }
            other => Ok(other?),
        }
    }

    fn query_bucket(&self, bucket: Bucket) -> Result<Vec<Post>, SourceError> {
        let mut merged = Vec::new();
        for sub in &self.subreddits {
            let mut posts = self
                .source
                .search(sub, bucket.start, bucket.end, self.size_hint)?;
            merged.append(&mut posts);
        }
        merged.sort_by_key(|p| p.created_at);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::source::model::Author;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn post(id: &str, secs: i64) -> Post {
        Post {
            id: id.to_string(),
            url: format!("https://i.redd.it/{id}.png"),
            title: id.to_string(),
            author: Author::Named("a".into()),
            score: 1,
            created_at: at(secs),
            permalink: format!("/r/x/{id}"),
        }
    }

    #[test]
    fn even_range_has_only_full_buckets() {
        let w = TimeWindow::hourly(at(0), at(3 * 3600)).unwrap();
        assert_eq!(w.full_buckets(), 3);
        assert_eq!(w.bucket_count(), 3);
        let b: Vec<_> = w.buckets().collect();
        assert_eq!(b[1].start, at(3600));
        assert_eq!(b[1].end, at(7200));
        assert_eq!(b[2].end, at(3 * 3600));
    }

    #[test]
    fn uneven_range_gets_trailing_partial_bucket() {
        let w = TimeWindow::hourly(at(0), at(2 * 3600 + 900)).unwrap();
        assert_eq!(w.full_buckets(), 2);
        assert_eq!(w.bucket_count(), 3);
        let last = w.bucket(2);
        assert_eq!(last.start, at(7200));
        assert_eq!(last.end, at(7200 + 900));
    }

    #[test]
    fn out_of_range_index_clamps_to_window_end() {
        let w = TimeWindow::hourly(at(0), at(3600 + 60)).unwrap();
        let b = w.bucket(7);
        assert_eq!(b.end, at(3660));
        assert!(b.is_empty());
    }

    #[test]
    fn empty_and_inverted_windows() {
        let w = TimeWindow::hourly(at(10), at(10)).unwrap();
        assert_eq!(w.bucket_count(), 0);
        assert!(TimeWindow::hourly(at(10), at(0)).is_err());
        assert!(TimeWindow::new(at(0), at(10), TimeDelta::zero()).is_err());
    }

    #[test]
    fn subreddit_list_parsing() {
        assert_eq!(parse_subreddits(" pics, ,aww,"), vec!["pics", "aww"]);
        assert!(parse_subreddits(" , ").is_empty());
    }

    struct Scripted {
        calls: Mutex<Vec<String>>,
        failures: Mutex<u32>,
    }

    impl PostSource for Scripted {
        fn search(
            &self,
            subreddit: &str,
            _after: DateTime<Utc>,
            _before: DateTime<Utc>,
            size_hint: u32,
        ) -> Result<Vec<Post>, SourceError> {
            assert_eq!(size_hint, 5000);
            self.calls.lock().unwrap().push(subreddit.to_string());
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SourceError::Connection("refused".into()));
            }
            Ok(match subreddit {
                "a" => vec![post("a1", 30), post("a2", 10)],
                _ => vec![post("b1", 20)],
            })
        }
    }

    fn fetcher(failures: u32) -> TimeWindowedFetcher<Scripted> {
        TimeWindowedFetcher::new(
            Scripted {
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(failures),
            },
            vec!["a".into(), "b".into()],
            5000,
            Duration::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn merges_sources_and_sorts_by_creation() {
        let f = fetcher(0);
        let w = TimeWindow::hourly(at(0), at(3600)).unwrap();
        let posts = f.fetch_bucket(w.bucket(0)).unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a2", "b1", "a1"]);
    }

    #[test]
    fn one_connection_failure_is_retried() {
        let f = fetcher(1);
        let w = TimeWindow::hourly(at(0), at(3600)).unwrap();
        let posts = f.fetch_bucket(w.bucket(0)).unwrap();
        assert_eq!(posts.len(), 3);
        assert_eq!(*f.source.calls.lock().unwrap(), ["a", "a", "b"]);
    }

    #[test]
    fn second_connection_failure_is_fatal() {
        let f = fetcher(2);
        let w = TimeWindow::hourly(at(0), at(3600)).unwrap();
        let err = f.fetch_bucket(w.bucket(0)).unwrap_err();
        assert!(err.is_source_outage());
        assert_eq!(f.source.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn empty_bucket_skips_the_source() {
        let f = fetcher(0);
        let w = TimeWindow::hourly(at(0), at(0)).unwrap();
        assert!(f.fetch_bucket(w.bucket(0)).unwrap().is_empty());
        assert!(f.source.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn subreddits_are_required() {
        let src = Scripted {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(0),
        };
        assert!(TimeWindowedFetcher::new(src, vec![], 10, Duration::ZERO).is_err());
    }
}
