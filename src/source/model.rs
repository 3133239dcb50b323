use chrono::{DateTime, Utc};
use serde::Deserialize as _;

/// Author name the data source substitutes for removed accounts.
pub const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Author {
    Named(String),
    Deleted,
}

impl Author {
    pub fn parse(raw: &str) -> Self {
        if raw == DELETED_AUTHOR {
            Self::Deleted
        } else {
            Self::Named(raw.to_string())
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(n) => Some(n),
            Self::Deleted => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(DELETED_AUTHOR)
    }
}

impl<'de> serde::Deserialize<'de> for Author {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One submission as returned by the data source. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct Post {
    pub id: String,
    pub url: String,
    pub title: String,
    pub author: Author,
    pub score: i64,
    #[serde(rename = "created_utc", deserialize_with = "de_epoch_seconds")]
    pub created_at: DateTime<Utc>,
    pub permalink: String,
}

fn de_epoch_seconds<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    // Some archives emit fractional timestamps.
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() {
        return Err(D::Error::custom("created_utc must be finite"));
    }
    DateTime::from_timestamp(secs.floor() as i64, 0)
        .ok_or_else(|| D::Error::custom(format!("created_utc out of range: {secs}")))
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) data: Vec<Post>,
}
