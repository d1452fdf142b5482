//! Where to answer an event.
//!
//! Both functions return `None` for event types that have nothing to reply
//! to, or when the payload lacks the field the URL is built from.

use serde_json::Value;

use super::payload::{lookup, lookup_str};

/// The URL to POST a comment to in reply to this event.
///
/// For review comments this is the thread's `replies` endpoint, keyed by the
/// comment being replied to (or the comment itself if it starts a thread).
pub fn reply_url(event_type: &str, payload: &Value) -> Option<String> {
    match event_type {
        "issues" | "issue_comment" => lookup_str(payload, "issue.comments_url").map(str::to_string),
        "pull_request" | "pull_request_review" => {
            lookup_str(payload, "pull_request.comments_url").map(str::to_string)
        }
        "pull_request_review_comment" => {
            let base = lookup_str(payload, "pull_request.review_comments_url")?;
            let thread = lookup(payload, "comment.in_reply_to_id")
                .filter(|v| !v.is_null())
                .or_else(|| lookup(payload, "comment.id"))?;
            Some(format!("{base}/{}/replies", id_segment(thread)?))
        }
        _ => None,
    }
}

/// The URL to POST a reaction to for the object that triggered this event.
pub fn reaction_url(event_type: &str, payload: &Value) -> Option<String> {
    let reactions = |url: &str| format!("{url}/reactions");
    match event_type {
        "issues" => lookup_str(payload, "issue.url").map(reactions),
        "pull_request" => lookup_str(payload, "pull_request.issue_url").map(reactions),
        "issue_comment" | "pull_request_review_comment" => {
            lookup_str(payload, "comment.url").map(reactions)
        }
        "pull_request_review" => {
            let pr = lookup_str(payload, "pull_request.url")?;
            let review = id_segment(lookup(payload, "review.id")?)?;
            Some(format!("{pr}/reviews/{review}/reactions"))
        }
        _ => None,
    }
}

fn id_segment(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
