use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::analysis::{AnalysisError, Analyzer};
use crate::config::ReviewConfig;
use crate::github::{ChangedFile, GitHubClient, GitHubError};
use crate::pr::PullRequestEvent;
use crate::report::ReviewComment;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Failed to get changed files: {0}")]
    ChangedFiles(#[source] GitHubError),

    #[error("Failed to analyze changed files: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Failed to create review: {0}")]
    Submit(#[source] GitHubError),
}

/// Per-run switches for the review pipeline.
#[derive(Debug, Clone)]
pub struct ReviewOptions {
    /// Post the rendered comment back to the pull request
    pub post_comments: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            post_comments: true,
        }
    }
}

impl From<&ReviewConfig> for ReviewOptions {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            post_comments: config.post_comments,
        }
    }
}

/// What one pipeline run saw and did.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub files: Vec<ChangedFile>,
    pub comments: Vec<ReviewComment>,
    pub posted: bool,
}

/// Review one pull request: fetch its changed files, run the analyzer over
/// them and post the result as a single issue comment.
///
/// Stops at the first failing step. Nothing is posted unless every earlier
/// step succeeded.
#[instrument(skip_all, fields(owner = %event.owner, repo = %event.repo, pr = event.number, analyzer = analyzer.name()))]
pub async fn process_pull_request_review(
    client: &GitHubClient,
    analyzer: &dyn Analyzer,
    event: &PullRequestEvent,
    options: &ReviewOptions,
    cancel: &CancellationToken,
) -> Result<ReviewOutcome, ReviewError> {
    info!("fetching changed files");
    let files = client
        .fetch_changed_files(&event.owner, &event.repo, event.number, cancel)
        .await
        .map_err(ReviewError::ChangedFiles)?;

    info!(files = files.len(), "running analysis");
    let comments = analyzer.analyze(&files).await?;
    for comment in &comments {
        debug!(path = %comment.path, position = comment.position, "review comment");
    }

    if !options.post_comments {
        info!(comments = comments.len(), "posting disabled, skipping submission");
        return Ok(ReviewOutcome {
            files,
            comments,
            posted: false,
        });
    }

    client
        .submit_review_comment(&event.owner, &event.repo, event.number, &comments, cancel)
        .await
        .map_err(ReviewError::Submit)?;
    info!(comments = comments.len(), "review submitted");

    Ok(ReviewOutcome {
        files,
        comments,
        posted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::FailingAnalyzer;
    use crate::analysis::PlaceholderAnalyzer;
    use crate::test_support::MockGitHub;
    use reqwest::StatusCode;

    fn event() -> PullRequestEvent {
        PullRequestEvent {
            action: "opened".to_string(),
            owner: "octo".to_string(),
            repo: "hello".to_string(),
            number: 42,
            head_sha: "abc123".to_string(),
            base_sha: "def456".to_string(),
        }
    }

    fn modified_and_removed(mock: &MockGitHub) {
        mock.set_files(
            StatusCode::OK,
            serde_json::json!([
                {"filename": "src/lib.rs", "status": "modified", "raw_url": mock.raw_url("src/lib.rs")},
                {"filename": "legacy.rs", "status": "removed", "raw_url": mock.raw_url("legacy.rs")},
            ]),
        );
        mock.set_raw("src/lib.rs", StatusCode::OK, "pub fn answer() -> u32 { 42 }\n");
    }

    #[tokio::test]
    async fn test_end_to_end_posts_one_bullet() {
        let mock = MockGitHub::start().await;
        modified_and_removed(&mock);

        let outcome = process_pull_request_review(
            &mock.client(),
            &PlaceholderAnalyzer::default(),
            &event(),
            &ReviewOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.posted);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(mock.raw_requests(), vec!["src/lib.rs"]);

        let posted = mock.posted_comments();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].path, "/repos/octo/hello/issues/42/comments");
        assert_eq!(posted[0].body.matches("- **File:**").count(), 1);
        assert!(posted[0].body.contains("`src/lib.rs`"));
        assert!(posted[0].body.contains("**Position:** 1"));
        assert!(posted[0].body.contains("Please review this file."));
        assert!(!posted[0].body.contains("legacy.rs"));
    }

    #[tokio::test]
    async fn test_posting_disabled_skips_submission() {
        let mock = MockGitHub::start().await;
        modified_and_removed(&mock);

        let outcome = process_pull_request_review(
            &mock.client(),
            &PlaceholderAnalyzer::default(),
            &event(),
            &ReviewOptions {
                post_comments: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(!outcome.posted);
        assert_eq!(outcome.comments.len(), 1);
        assert!(mock.posted_comments().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_short_circuits() {
        let mock = MockGitHub::start().await;
        mock.set_files_raw(StatusCode::UNAUTHORIZED, "Bad credentials");

        let err = process_pull_request_review(
            &mock.client(),
            &PlaceholderAnalyzer::default(),
            &event(),
            &ReviewOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ReviewError::ChangedFiles(GitHubError::Api { status, .. }) if status == StatusCode::UNAUTHORIZED
        ));
        assert!(err.to_string().starts_with("Failed to get changed files"));
        assert!(mock.posted_comments().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_failure_posts_nothing() {
        let mock = MockGitHub::start().await;
        modified_and_removed(&mock);

        let err = process_pull_request_review(
            &mock.client(),
            &FailingAnalyzer,
            &event(),
            &ReviewOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReviewError::Analysis(_)));
        assert!(mock.posted_comments().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_is_wrapped() {
        let mock = MockGitHub::start().await;
        modified_and_removed(&mock);
        mock.set_comment_status(StatusCode::UNPROCESSABLE_ENTITY, "Validation Failed");

        let err = process_pull_request_review(
            &mock.client(),
            &PlaceholderAnalyzer::default(),
            &event(),
            &ReviewOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        match err {
            ReviewError::Submit(GitHubError::Api { status, body, .. }) => {
                assert_eq!(status.as_u16(), 422);
                assert_eq!(body, "Validation Failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_pull_request_posts_preamble() {
        let mock = MockGitHub::start().await;

        let outcome = process_pull_request_review(
            &mock.client(),
            &PlaceholderAnalyzer::default(),
            &event(),
            &ReviewOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.comments.is_empty());
        let posted = mock.posted_comments();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].body, crate::report::render_comments(&[]));
    }
}
