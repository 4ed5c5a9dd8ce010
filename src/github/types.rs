use serde::Deserialize;

/// One entry of `GET /repos/{owner}/{repo}/pulls/{number}/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
    /// added, modified, removed, renamed, copied, changed or unchanged
    pub status: String,
    pub raw_url: String,
}

impl PullRequestFile {
    pub fn is_removed(&self) -> bool {
        self.status == "removed"
    }
}

/// A file touched by the pull request together with its raw content at head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    pub content: String,
}
