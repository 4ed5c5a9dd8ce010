//! Demo event emitter: turns a pull request URL into a synthetic
//! `pull_request` webhook delivery and sends it to a webhook receiver.

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::EmitterConfig;
use crate::pr::types::{CommitRef, Owner, PullRequestRef, Repository};
use crate::pr::{Payload, PrUrl};

#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("Failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to deliver webhook to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Webhook receiver at {url} rejected the event: {status}, response: {body}")]
    Rejected {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Webhook delivery cancelled")]
    Cancelled,
}

/// Receiver's answer to an accepted delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: StatusCode,
    pub body: String,
}

/// Synthesize the body GitHub would send when the pull request is opened.
pub fn build_demo_payload(pr: &PrUrl, config: &EmitterConfig) -> Payload {
    Payload {
        action: "opened".to_string(),
        pull_request: PullRequestRef {
            number: pr.pr_number,
            head: CommitRef {
                sha: config.head_sha.clone(),
            },
            base: CommitRef {
                sha: config.base_sha.clone(),
            },
        },
        repository: Repository {
            name: pr.repo.clone(),
            owner: Owner {
                login: pr.owner.clone(),
            },
        },
    }
}

/// POST `payload` to `target_url` as a `pull_request` webhook delivery.
///
/// Any non-2xx answer is an error carrying the receiver's status and body.
#[instrument(skip(client, signature, payload, cancel), fields(pr = payload.pull_request.number))]
pub async fn emit(
    client: &reqwest::Client,
    target_url: &str,
    signature: &str,
    payload: &Payload,
    cancel: &CancellationToken,
) -> Result<Delivery, EmitterError> {
    let body = serde_json::to_string(payload)?;
    debug!(bytes = body.len(), "sending demo pull_request event");

    let request = client
        .post(target_url)
        .header(CONTENT_TYPE, "application/json")
        .header("X-GitHub-Event", "pull_request")
        .header("X-Hub-Signature-256", signature)
        .body(body);

    let to_request_error = |source| EmitterError::Request {
        url: target_url.to_string(),
        source,
    };

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EmitterError::Cancelled),
        response = request.send() => response.map_err(to_request_error)?,
    };

    let status = response.status();
    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EmitterError::Cancelled),
        body = response.text() => body.map_err(to_request_error)?,
    };

    if !status.is_success() {
        return Err(EmitterError::Rejected {
            url: target_url.to_string(),
            status,
            body,
        });
    }

    info!(%status, "webhook delivered");
    Ok(Delivery { status, body })
}
