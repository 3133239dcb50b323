pub mod allow_list;
pub mod decode;
pub mod fetch;

pub use allow_list::AllowList;
pub use decode::decode_image;
pub use fetch::{
    FetchConfig, FetchOutcome, HttpTransport, ImageFetcher, MediaTransport, NoImageReason,
    RewriteRule, TransportError, normalize_url,
};
