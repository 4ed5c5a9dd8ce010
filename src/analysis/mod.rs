pub mod placeholder;

pub use placeholder::PlaceholderAnalyzer;

use async_trait::async_trait;
use thiserror::Error;

use crate::github::ChangedFile;
use crate::report::ReviewComment;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis failed for {analyzer}: {reason}")]
    #[allow(dead_code)] // Used by future analyzer implementations
    Failed { analyzer: String, reason: String },
}

/// Turns the changed files of a pull request into review comments.
///
/// The pipeline holds one analyzer behind `Arc<dyn Analyzer>`, so
/// implementations must be Send + Sync.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Human-readable name of this analyzer, used in logs.
    fn name(&self) -> &str;

    /// Produce comments for `files`. Must not print to stdout.
    async fn analyze(&self, files: &[ChangedFile]) -> Result<Vec<ReviewComment>, AnalysisError>;
}
