pub type KarmaResult<T> = Result<T, KarmaError>;

#[derive(thiserror::Error, Debug)]
pub enum KarmaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("source error: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KarmaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// True when the run may be resumed later from the last written index.
    pub fn is_source_outage(&self) -> bool {
        matches!(
            self,
            Self::Source(crate::source::SourceError::Connection(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            KarmaError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(KarmaError::render("x").to_string().contains("render error:"));
        assert!(
            KarmaError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
        assert!(
            KarmaError::from(SourceError::Malformed("x".into()))
                .to_string()
                .contains("source error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = KarmaError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn only_connection_failures_count_as_outage() {
        assert!(KarmaError::from(SourceError::Connection("refused".into())).is_source_outage());
        assert!(!KarmaError::from(SourceError::Http(502)).is_source_outage());
        assert!(!KarmaError::validation("x").is_source_outage());
    }
}
