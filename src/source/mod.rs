pub mod model;
pub mod pushshift;
pub mod window;

pub use model::{Author, DELETED_AUTHOR, Post};
pub use pushshift::{PostSource, PushshiftSource, SourceConfig, SourceError};
pub use window::{Bucket, TimeWindow, TimeWindowedFetcher, parse_subreddits};
