//! HTTP handlers for the webhook receiver.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::AppState;
use crate::pipeline::process_pull_request_review;
use crate::pr::{Payload, PullRequestEvent};

/// Pull request actions that trigger a review.
const REVIEWED_ACTIONS: &[&str] = &["opened", "reopened", "synchronize"];

pub async fn root() -> &'static str {
    "Welcome"
}

/// Receive one GitHub webhook delivery and, for pull request events worth
/// reviewing, queue the review pipeline on the state's task tracker and
/// answer `202 Accepted` without waiting for it.
pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let event = header(&headers, "x-github-event").unwrap_or_default();
    let delivery = header(&headers, "x-github-delivery").unwrap_or("-");

    match event {
        "ping" => return (StatusCode::OK, "pong".to_string()),
        "pull_request" => {}
        other => {
            debug!(event = other, delivery, "ignoring webhook event");
            return (StatusCode::ACCEPTED, "ignored".to_string());
        }
    }

    let payload: Payload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(delivery, error = %e, "rejecting malformed pull_request payload");
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid pull_request payload: {e}"),
            );
        }
    };

    if !REVIEWED_ACTIONS.contains(&payload.action.as_str()) {
        debug!(action = %payload.action, delivery, "ignoring pull_request action");
        return (StatusCode::ACCEPTED, "ignored".to_string());
    }

    let event = PullRequestEvent::from(payload);
    let accepted = format!(
        "review queued for {}/{}#{}",
        event.owner, event.repo, event.number
    );
    let span = info_span!("webhook", delivery, action = %event.action);

    // The review outlives this request; the tracker is drained on shutdown.
    let task_state = state.clone();
    state.tasks.spawn(
        async move {
            let state = task_state;
            // One review at a time.
            let _running = state.in_flight.lock().await;
            info!(
                owner = %event.owner,
                repo = %event.repo,
                pr = event.number,
                head = %event.head_sha,
                base = %event.base_sha,
                "starting review"
            );

            match process_pull_request_review(
                &state.client,
                state.analyzer.as_ref(),
                &event,
                &state.options,
                &state.abort,
            )
            .await
            {
                Ok(outcome) => info!(
                    files = outcome.files.len(),
                    comments = outcome.comments.len(),
                    posted = outcome.posted,
                    "review finished"
                ),
                Err(e) => error!(error = %e, "review pipeline failed"),
            }
        }
        .instrument(span),
    );

    (StatusCode::ACCEPTED, accepted)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
