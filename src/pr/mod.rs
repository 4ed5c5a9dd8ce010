pub mod types;

pub use types::{Payload, PrUrl, PullRequestEvent};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid PR number {segment:?} in URL {url}")]
    InvalidNumber { url: String, segment: String },
}

/// Parse a pull request URL into its component parts.
///
/// Only the trailing path segments matter: the owner and repository are the
/// fourth- and third-from-last segments and the number is the last one, so
/// both `https://github.com/{owner}/{repo}/pull/{n}` and
/// `https://api.github.com/repos/{owner}/{repo}/pulls/{n}` are accepted.
/// Trailing slashes are ignored.
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let trimmed = url.trim().trim_end_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.len() < 5 {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let last = segments.len() - 1;
    let owner = segments[last - 3];
    let repo = segments[last - 2];
    let number = segments[last];

    if owner.is_empty() || repo.is_empty() {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = number.parse::<u64>().map_err(|_| PrError::InvalidNumber {
        url: url.to_string(),
        segment: number.to_string(),
    })?;

    Ok(PrUrl {
        owner: owner.to_string(),
        repo: repo.to_string(),
        pr_number,
    })
}
