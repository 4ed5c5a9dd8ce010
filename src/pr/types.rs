use serde::{Deserialize, Serialize};

/// Represents the parsed components of a pull request URL.
/// Extracted by parse_pr_url() in pr/mod.rs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

/// One pull request event, as handed to the review pipeline.
///
/// Built either from a webhook delivery or synthesized by the demo emitter,
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: String,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub head_sha: String,
    pub base_sha: String,
}

impl From<Payload> for PullRequestEvent {
    fn from(payload: Payload) -> Self {
        Self {
            action: payload.action,
            owner: payload.repository.owner.login,
            repo: payload.repository.name,
            number: payload.pull_request.number,
            head_sha: payload.pull_request.head.sha,
            base_sha: payload.pull_request.base.sha,
        }
    }
}

/// Body of a `pull_request` webhook delivery. Only the fields the relay
/// reads are modelled; GitHub sends many more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub action: String,
    pub pull_request: PullRequestRef,
    pub repository: Repository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub head: CommitRef,
    pub base: CommitRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}
