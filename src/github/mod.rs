pub mod types;

pub use types::{ChangedFile, PullRequestFile};

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::GitHubConfig;
use crate::report::{self, ReviewComment};

/// Media type requested on every GitHub call.
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {status} from {url}, response: {body}")]
    Api {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to fetch content for {path}: {source}")]
    RawContent {
        path: String,
        #[source]
        source: Box<GitHubError>,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Client for the handful of GitHub REST endpoints the relay needs.
///
/// A single `reqwest::Client` is shared by all calls, so the configured
/// timeout bounds every request whatever the caller's cancellation token does.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, token: &str) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(GitHubError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// List the files changed by a pull request and fetch the raw content of
    /// every file that still exists at head.
    ///
    /// Removed files are skipped. A failed content fetch fails the whole call.
    #[instrument(skip(self, cancel), fields(owner = %owner, repo = %repo, pr = pull_number))]
    pub async fn fetch_changed_files(
        &self,
        owner: &str,
        repo: &str,
        pull_number: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChangedFile>, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files",
            self.base_url, owner, repo, pull_number
        );

        debug!(url = %url, "fetching changed files");
        let request = self.http.get(&url).bearer_auth(&self.token);
        let response = self.send(request, &url, cancel).await?;
        let response = expect_status(response, &url, &[StatusCode::OK], cancel).await?;
        let body = read_text(response, &url, cancel).await?;

        let entries: Vec<PullRequestFile> =
            serde_json::from_str(&body).map_err(|source| GitHubError::Decode {
                url: url.clone(),
                source,
            })?;
        debug!(entries = entries.len(), "received changed file listing");

        let mut files = Vec::new();
        for entry in entries {
            if entry.is_removed() {
                debug!(path = %entry.filename, "skipping removed file");
                continue;
            }

            let content = self
                .fetch_raw_content(&entry.raw_url, cancel)
                .await
                .map_err(|source| GitHubError::RawContent {
                    path: entry.filename.clone(),
                    source: Box::new(source),
                })?;

            files.push(ChangedFile {
                path: entry.filename,
                content,
            });
        }

        info!(files = files.len(), "fetched changed files");
        Ok(files)
    }

    /// Fetch a file body from its raw URL. No credentials are sent.
    pub async fn fetch_raw_content(
        &self,
        raw_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GitHubError> {
        let request = self.http.get(raw_url);
        let response = self.send(request, raw_url, cancel).await?;
        let response = expect_status(response, raw_url, &[StatusCode::OK], cancel).await?;
        let content = read_text(response, raw_url, cancel).await?;
        debug!(raw_url = %raw_url, bytes = content.len(), "fetched raw content");
        Ok(content)
    }

    /// Post the rendered comments as one issue comment on the pull request.
    #[instrument(skip(self, comments, cancel), fields(owner = %owner, repo = %repo, pr = pull_number, comments = comments.len()))]
    pub async fn submit_review_comment(
        &self,
        owner: &str,
        repo: &str,
        pull_number: u64,
        comments: &[ReviewComment],
        cancel: &CancellationToken,
    ) -> Result<(), GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_url, owner, repo, pull_number
        );
        let markdown = report::render_comments(comments);
        debug!(url = %url, bytes = markdown.len(), "posting review comment");

        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "body": markdown }));
        let response = self.send(request, &url, cancel).await?;
        expect_status(response, &url, &[StatusCode::OK, StatusCode::CREATED], cancel).await?;

        info!("review comment posted");
        Ok(())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, GitHubError> {
        let request = request.header(ACCEPT, GITHUB_ACCEPT);
        let response = until_cancelled(cancel, request.send())
            .await?
            .map_err(|source| GitHubError::Network {
                url: url.to_string(),
                source,
            })?;
        Ok(response)
    }
}

async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, GitHubError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GitHubError::Cancelled),
        output = future => Ok(output),
    }
}

async fn expect_status(
    response: Response,
    url: &str,
    accepted: &[StatusCode],
    cancel: &CancellationToken,
) -> Result<Response, GitHubError> {
    let status = response.status();
    if accepted.contains(&status) {
        return Ok(response);
    }

    let body = match read_text(response, url, cancel).await {
        Ok(body) => body,
        Err(GitHubError::Cancelled) => return Err(GitHubError::Cancelled),
        Err(e) => {
            warn!(url = %url, error = %e, "failed to read error response body");
            String::new()
        }
    };
    warn!(url = %url, status = %status, "GitHub returned an error status");
    Err(GitHubError::Api {
        url: url.to_string(),
        status,
        body,
    })
}

async fn read_text(
    response: Response,
    url: &str,
    cancel: &CancellationToken,
) -> Result<String, GitHubError> {
    until_cancelled(cancel, response.text())
        .await?
        .map_err(|source| GitHubError::Network {
            url: url.to_string(),
            source,
        })
}
