//! Maps hostnames to productivity categories. Explicit membership in the
//! user-managed lists always wins, an unknown hostname falls through to a
//! keyword heuristic, and everything else is neutral. Classification is a
//! total function over arbitrary strings.

use std::{fmt::Display, io::ErrorKind, path::Path, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Productive,
    Unproductive,
    Neutral,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Productive => "productive",
            Category::Unproductive => "unproductive",
            Category::Neutral => "neutral",
        }
    }

    /// All categories in report order.
    pub const ALL: [Category; 3] = [
        Category::Productive,
        Category::Unproductive,
        Category::Neutral,
    ];
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "productive" => Ok(Category::Productive),
            "unproductive" => Ok(Category::Unproductive),
            "neutral" => Ok(Category::Neutral),
            other => Err(anyhow!("Unknown category {other}")),
        }
    }
}

/// User-managed classification lists. A hostname is never present in both
/// lists at once, [CategoryConfig::assign] enforces that on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default)]
    pub productive: Vec<String>,
    #[serde(default)]
    pub unproductive: Vec<String>,
}

impl CategoryConfig {
    /// Reads the config from `path`. A missing file means nothing was
    /// assigned yet and yields empty lists.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Puts `hostname` into the list for `category`, removing it from the
    /// opposite list first. Assigning [Category::Neutral] just removes the
    /// hostname from both lists.
    pub fn assign(&mut self, hostname: &str, category: Category) {
        let hostname = hostname.trim().to_ascii_lowercase();
        self.remove(&hostname);
        match category {
            Category::Productive => self.productive.push(hostname),
            Category::Unproductive => self.unproductive.push(hostname),
            Category::Neutral => {}
        }
    }

    /// Removes `hostname` from both lists. Returns whether it was present in
    /// either one.
    pub fn remove(&mut self, hostname: &str) -> bool {
        let hostname = hostname.trim().to_ascii_lowercase();
        let before = self.productive.len() + self.unproductive.len();
        self.productive.retain(|v| v != &hostname);
        self.unproductive.retain(|v| v != &hostname);
        before != self.productive.len() + self.unproductive.len()
    }
}

const PRODUCTIVE_HINTS: &[&str] = &["docs", "learn", "tutorial", "course", "wiki", "research"];

const DISTRACTION_HINTS: &[&str] = &[
    "social",
    "game",
    "video",
    "stream",
    "entertainment",
    "reddit",
];

/// Classifies a hostname. List membership is a substring match so that
/// `mail.google.com` is covered by an entry for `google.com`. The productive
/// list is checked first, which also resolves a hostname that somehow ended
/// up in both lists.
pub fn classify(hostname: &str, config: &CategoryConfig) -> Category {
    let hostname = hostname.to_ascii_lowercase();

    if config.productive.iter().any(|v| hostname.contains(v)) {
        return Category::Productive;
    }
    if config.unproductive.iter().any(|v| hostname.contains(v)) {
        return Category::Unproductive;
    }

    if PRODUCTIVE_HINTS.iter().any(|v| hostname.contains(v)) {
        return Category::Productive;
    }
    if DISTRACTION_HINTS.iter().any(|v| hostname.contains(v)) {
        return Category::Unproductive;
    }

    Category::Neutral
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{classify, Category, CategoryConfig};

    fn config() -> CategoryConfig {
        CategoryConfig {
            productive: vec!["github.com".into(), "rust-lang.org".into()],
            unproductive: vec!["facebook.com".into()],
        }
    }

    #[test]
    fn explicit_membership_wins() {
        let config = config();
        assert_eq!(classify("github.com", &config), Category::Productive);
        assert_eq!(classify("gist.github.com", &config), Category::Productive);
        assert_eq!(classify("facebook.com", &config), Category::Unproductive);
    }

    #[test]
    fn membership_beats_keyword_fallback() {
        let mut config = config();
        // Would be unproductive via the "video" hint without the entry.
        config.assign("video.work.com", Category::Productive);
        assert_eq!(classify("video.work.com", &config), Category::Productive);
    }

    #[test]
    fn hostname_in_both_lists_resolves_productive() {
        let config = CategoryConfig {
            productive: vec!["example.com".into()],
            unproductive: vec!["example.com".into()],
        };
        assert_eq!(classify("example.com", &config), Category::Productive);
    }

    #[test]
    fn keyword_fallback() {
        let config = config();
        assert_eq!(classify("docs.python.org", &config), Category::Productive);
        assert_eq!(classify("mygame.io", &config), Category::Unproductive);
        assert_eq!(classify("weather.example", &config), Category::Neutral);
    }

    #[test]
    fn classification_ignores_case() {
        let config = config();
        assert_eq!(classify("GitHub.com", &config), Category::Productive);
    }

    #[test]
    fn assign_moves_between_lists() {
        let mut config = config();
        config.assign("facebook.com", Category::Productive);
        assert!(config.productive.contains(&"facebook.com".to_string()));
        assert!(config.unproductive.is_empty());

        config.assign("facebook.com", Category::Neutral);
        assert!(!config.productive.contains(&"facebook.com".to_string()));
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("categories.json");

        assert_eq!(CategoryConfig::load(&path).unwrap(), CategoryConfig::default());

        let config = config();
        config.save(&path).unwrap();
        assert_eq!(CategoryConfig::load(&path).unwrap(), config);
    }
}
