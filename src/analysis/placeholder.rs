use async_trait::async_trait;

use super::{AnalysisError, Analyzer};
use crate::config::ReviewConfig;
use crate::github::ChangedFile;
use crate::report::ReviewComment;

/// Placeholder Analyzer
///
/// Stands in for real static or LLM analysis: emits one generic comment per
/// changed file, all at the same configured position.
pub struct PlaceholderAnalyzer {
    position: u32,
    body: String,
}

impl PlaceholderAnalyzer {
    pub fn new(position: u32, body: impl Into<String>) -> Self {
        Self {
            position,
            body: body.into(),
        }
    }

    pub fn from_config(config: &ReviewConfig) -> Self {
        Self::new(config.position, config.body.clone())
    }
}

impl Default for PlaceholderAnalyzer {
    fn default() -> Self {
        Self::from_config(&ReviewConfig::default())
    }
}

#[async_trait]
impl Analyzer for PlaceholderAnalyzer {
    fn name(&self) -> &str {
        "Placeholder Review"
    }

    async fn analyze(&self, files: &[ChangedFile]) -> Result<Vec<ReviewComment>, AnalysisError> {
        Ok(files
            .iter()
            .map(|file| ReviewComment::new(file.path.clone(), self.position, self.body.clone()))
            .collect())
    }
}
