use crate::record::ContextMap;

/// Variable-name patterns treated as sensitive by the error capturer.
/// Matching is a case-insensitive substring test.
pub const SENSITIVE_VARIABLE_PATTERNS: [&str; 6] =
    ["password", "token", "key", "secret", "credential", "auth"];

/// Context-key patterns stripped from externally-ingested payloads before
/// persistence.
pub const SENSITIVE_CONTEXT_KEYS: [&str; 4] = ["password", "token", "key", "secret"];

/// Value stored in place of a sensitive variable.
pub const REDACTED: &str = "[REDACTED]";

/// Suffix appended when a rendered value is cut at the length cap.
pub const TRUNCATED: &str = "...[truncated]";

/// Value stored when rendering a variable fails.
pub const REPR_FAILED: &str = "[repr failed]";

pub fn is_sensitive_variable(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_VARIABLE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Drop sensitive keys from an externally-supplied context map.
pub fn strip_sensitive_keys(context: ContextMap) -> ContextMap {
    context
        .into_iter()
        .filter(|(key, _)| {
            let lower = key.to_ascii_lowercase();
            !SENSITIVE_CONTEXT_KEYS.iter().any(|p| lower.contains(p))
        })
        .collect()
}

/// Cap a rendered value at `max_len` characters, marking the cut.
pub fn truncate_repr(rendered: String, max_len: usize) -> String {
    match rendered.char_indices().nth(max_len) {
        Some((idx, _)) => {
            let mut cut = rendered[..idx].to_string();
            cut.push_str(TRUNCATED);
            cut
        }
        None => rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_matching_is_substring_and_case_insensitive() {
        assert!(is_sensitive_variable("auth_token"));
        assert!(is_sensitive_variable("API_KEY"));
        assert!(is_sensitive_variable("DbPassword"));
        assert!(is_sensitive_variable("client_secret"));
        assert!(!is_sensitive_variable("order_id"));
        // Substring matching is deliberately broad.
        assert!(is_sensitive_variable("monkeys"));
    }

    #[test]
    fn strip_removes_only_sensitive_keys() {
        let mut ctx = ContextMap::new();
        ctx.insert("session_token".into(), serde_json::json!("abc"));
        ctx.insert("Password".into(), serde_json::json!("hunter2"));
        ctx.insert("page".into(), serde_json::json!("/checkout"));

        let stripped = strip_sensitive_keys(ctx);
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_key("page"));
    }

    #[test]
    fn auth_is_redacted_by_capturer_but_kept_by_strip() {
        // The capturer's pattern list is wider than the ingest strip list.
        assert!(is_sensitive_variable("authorization"));
        let mut ctx = ContextMap::new();
        ctx.insert("authorization".into(), serde_json::json!("Bearer x"));
        assert_eq!(strip_sensitive_keys(ctx).len(), 1);
    }

    #[test]
    fn truncation_appends_marker_only_past_cap() {
        assert_eq!(truncate_repr("short".into(), 10), "short");
        let cut = truncate_repr("abcdefghij".into(), 4);
        assert_eq!(cut, format!("abcd{TRUNCATED}"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let cut = truncate_repr("日本語のログ".into(), 3);
        assert_eq!(cut, format!("日本語{TRUNCATED}"));
    }
}
