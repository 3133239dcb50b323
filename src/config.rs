use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use chrono::TimeDelta;

use crate::{
    assets::fetch::FetchConfig,
    foundation::error::{KarmaError, KarmaResult},
    render::layout::CardLayout,
    source::pushshift::SourceConfig,
};

/// Everything a run needs besides the subreddits and time range. Every field has a default, so a
/// config file only lists what it changes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub allow_list: PathBuf,
    pub template: Option<PathBuf>,
    pub layout: CardLayout,
    pub workers: usize,
    pub bucket_secs: u64,
    pub retry_backoff_secs: u64,
    /// Digits in output file names.
    pub index_width: usize,
    /// First global index of this run.
    pub start_index: u64,
    pub source: SourceConfig,
    pub fetch: FetchConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            log_dir: PathBuf::from("logs"),
            allow_list: PathBuf::from("trusted_providers.txt"),
            template: None,
            layout: CardLayout::default(),
            workers: 4,
            bucket_secs: 3600,
            retry_backoff_secs: 600,
            index_width: 6,
            start_index: 0,
            source: SourceConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> KarmaResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| KarmaError::serde(format!("parse config '{}': {e}", path.display())))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> KarmaResult<()> {
        if self.workers == 0 {
            return Err(KarmaError::validation("workers must be >= 1"));
        }
        if self.bucket_secs == 0 {
            return Err(KarmaError::validation("bucket_secs must be > 0"));
        }
        if self.index_width == 0 {
            return Err(KarmaError::validation("index_width must be > 0"));
        }
        if self.template.is_none() {
            self.layout.validate_for(self.layout.template_size)?;
        } else {
            self.layout.image_rect.validate()?;
        }
        Ok(())
    }

    pub fn bucket_width(&self) -> TimeDelta {
        i64::try_from(self.bucket_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::PasteRect;

    #[test]
    fn defaults_validate() {
        let cfg = RunConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.bucket_width(), TimeDelta::hours(1));
        assert_eq!(cfg.retry_backoff(), Duration::from_secs(600));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = RunConfig {
            workers: 0,
            ..RunConfig::default()
        };
        assert!(cfg.validate().is_err());

        cfg.workers = 2;
        cfg.bucket_secs = 0;
        assert!(cfg.validate().is_err());

        cfg.bucket_secs = 60;
        cfg.layout.image_rect = PasteRect {
            left: 10,
            top: 10,
            right: 5,
            bottom: 20,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_partial_json() {
        let path = std::env::temp_dir().join(format!(
            "karmaboard_cfg_{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"{"workers": 8, "output_dir": "cards", "source": {"size_hint": 500}}"#,
        )
        .unwrap();
        let cfg = RunConfig::load(&path).unwrap();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.output_dir, PathBuf::from("cards"));
        assert_eq!(cfg.source.size_hint, 500);
        assert_eq!(cfg.source.base_url, SourceConfig::default().base_url);
        assert_eq!(cfg.bucket_secs, 3600);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let path = std::env::temp_dir().join(format!(
            "karmaboard_cfg_bad_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ workers: ").unwrap();
        let err = RunConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("serialization error:"));
        std::fs::remove_file(&path).ok();
    }
}
