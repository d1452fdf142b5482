//! Dotted-path lookups into webhook payloads.
//!
//! Paths are `.`-separated object keys, e.g. `installation.id` or
//! `pull_request.user.login`. Arrays are not indexed.

use serde_json::Value;

/// Looks up a dotted path, returning `None` if any segment is missing or the
/// value at that point is not an object.
///
/// ```
/// use serde_json::json;
/// use snekomatic::webhooks::lookup;
///
/// let payload = json!({"installation": {"id": 42}});
/// assert_eq!(lookup(&payload, "installation.id"), Some(&json!(42)));
/// assert_eq!(lookup(&payload, "installation.account"), None);
/// ```
pub fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(payload, |value, key| value.as_object()?.get(key))
}

/// Like [`lookup`], but only for string values.
pub fn lookup_str<'a>(payload: &'a Value, path: &str) -> Option<&'a str> {
    lookup(payload, path)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "action": "closed",
            "pull_request": {
                "merged": true,
                "user": {"login": "octocat"},
                "labels": [{"name": "bug"}]
            }
        })
    }

    #[test]
    fn top_level_key() {
        assert_eq!(lookup(&payload(), "action"), Some(&json!("closed")));
    }

    #[test]
    fn nested_key() {
        assert_eq!(lookup_str(&payload(), "pull_request.user.login"), Some("octocat"));
        assert_eq!(lookup(&payload(), "pull_request.merged"), Some(&json!(true)));
    }

    #[test]
    fn missing_segment() {
        assert_eq!(lookup(&payload(), "pull_request.head.sha"), None);
        assert_eq!(lookup(&payload(), "issue"), None);
    }

    #[test]
    fn path_through_non_object() {
        assert_eq!(lookup(&payload(), "action.length"), None);
        assert_eq!(lookup(&payload(), "pull_request.labels.name"), None);
    }

    #[test]
    fn lookup_str_rejects_non_strings() {
        assert_eq!(lookup_str(&payload(), "pull_request.merged"), None);
    }
}
