use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::KarmaResult;

/// Trusted media URL prefixes, one per line in the source file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowList {
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Blank lines are dropped: an empty prefix would admit every URL.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines())
    }

    pub fn load(path: &Path) -> KarmaResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read allow list '{}'", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn allows(&self, url: &str) -> bool {
        self.prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
