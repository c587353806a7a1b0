//! Scenario catalog
//!
//! A catalog is a YAML file listing scenarios, either as a bare sequence or
//! under a top-level `scenarios:` key:
//!
//! ```yaml
//! - tag: login
//!   description: Sign in with valid credentials
//!   prompt: Open ${CONFIG.BASE_URL}/login and sign in as ${CONFIG.USER}
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// One independently executable test unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique identifier within a run
    pub tag: String,
    #[serde(default)]
    pub description: String,
    /// Natural-language template, may contain `${CONFIG.KEY}` placeholders
    #[serde(alias = "promptTemplate", alias = "prompt_template")]
    pub prompt: String,
}

impl Scenario {
    pub fn new(tag: impl Into<String>, description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            description: description.into(),
            prompt: prompt.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<Scenario>),
    Wrapped { scenarios: Vec<Scenario> },
}

/// Validated, ordered list of scenarios
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenarios: Vec<Scenario>,
    path: Option<PathBuf>,
}

impl Catalog {
    /// Load and validate a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let mut catalog = Self::from_yaml(&content, &path.display().to_string())?;
        catalog.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), scenarios = catalog.len(), "Loaded scenario catalog");
        Ok(catalog)
    }

    /// Parse catalog YAML; `origin` only labels errors
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(content).map_err(|e| Error::CatalogParse {
            path: origin.to_string(),
            error: e.to_string(),
        })?;

        let scenarios = match file {
            CatalogFile::List(scenarios) | CatalogFile::Wrapped { scenarios } => scenarios,
        };
        Self::from_scenarios(scenarios)
    }

    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Result<Self> {
        validate(&scenarios)?;
        Ok(Self {
            scenarios,
            path: None,
        })
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn tags(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.tag.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

/// Reject empty tags and empty prompts
///
/// Duplicate tags are allowed (every copy runs) but logged, since their
/// outcomes can only be told apart by position.
pub fn validate(scenarios: &[Scenario]) -> Result<()> {
    for (index, scenario) in scenarios.iter().enumerate() {
        if scenario.tag.trim().is_empty() {
            return Err(Error::Config(format!(
                "Scenario at position {} has an empty tag",
                index + 1
            )));
        }
        if scenario.prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt {
                tag: scenario.tag.clone(),
            });
        }
    }
    for tag in duplicate_tags(scenarios) {
        tracing::warn!(tag = %tag, "Scenario tag appears more than once; every copy will run");
    }
    Ok(())
}

/// Tags used by more than one scenario, in order of first repetition
pub fn duplicate_tags(scenarios: &[Scenario]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for scenario in scenarios {
        if !seen.insert(scenario.tag.as_str()) && !duplicates.contains(&scenario.tag) {
            duplicates.push(scenario.tag.clone());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence() {
        let catalog = Catalog::from_yaml(
            r#"
- tag: login
  description: Sign in
  prompt: Open ${CONFIG.BASE_URL}
- tag: search
  promptTemplate: Search for shoes
"#,
            "inline",
        )
        .unwrap();

        assert_eq!(catalog.tags(), vec!["login", "search"]);
        assert_eq!(catalog.scenarios()[1].description, "");
        assert_eq!(catalog.scenarios()[1].prompt, "Search for shoes");
    }

    #[test]
    fn test_parse_wrapped() {
        let catalog = Catalog::from_yaml(
            "scenarios:\n  - tag: a\n    prompt: do a\n",
            "inline",
        )
        .unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_duplicate_tags_kept() {
        let catalog = Catalog::from_scenarios(vec![
            Scenario::new("a", "", "one"),
            Scenario::new("b", "", "two"),
            Scenario::new("a", "", "three"),
            Scenario::new("a", "", "four"),
        ])
        .unwrap();

        assert_eq!(catalog.tags(), vec!["a", "b", "a", "a"]);
        assert_eq!(duplicate_tags(catalog.scenarios()), vec!["a"]);
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let err = Catalog::from_scenarios(vec![Scenario::new("a", "", "   ")]).unwrap_err();
        assert!(matches!(err, Error::EmptyPrompt { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Catalog::from_yaml("tag: [unclosed", "broken.yaml").unwrap_err();
        match err {
            Error::CatalogParse { path, .. } => assert_eq!(path, "broken.yaml"),
            other => panic!("Expected CatalogParse, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.yaml");
        std::fs::write(&path, "- tag: a\n  prompt: do a\n").unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.path(), Some(path.as_path()));
        assert_eq!(catalog.tags(), vec!["a"]);
    }
}
