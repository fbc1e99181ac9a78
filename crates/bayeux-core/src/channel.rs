//! Channel naming and wildcard matching
//!
//! Bayeux channels are slash-separated paths:
//! ```text
//! /meta/handshake
//! /chat/room/42
//! ```
//!
//! Subscription channels may end with a wildcard:
//! - `*` matches a trailing word run
//! - `**` matches any trailing run of word characters and slashes
//!
//! Matching is case-insensitive and deliberately symmetric: a candidate
//! matches when the query's pattern covers the candidate or the
//! candidate's own pattern covers the query. That means a subscription
//! to `/chat/**` is found both when publishing to `/chat/room` and when
//! unsubscribing with the literal `/chat/**`.

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::debug;

/// Handshake meta channel
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// Connect meta channel
pub const META_CONNECT: &str = "/meta/connect";
/// Disconnect meta channel
pub const META_DISCONNECT: &str = "/meta/disconnect";
/// Subscribe meta channel
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// Unsubscribe meta channel
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";

/// True when `candidate` and `query` match in either direction.
pub fn channel_matches(query: &str, candidate: &str) -> bool {
    matches_one_way(query, candidate) || matches_one_way(candidate, query)
}

/// Filter `candidates` down to those matching `query`.
pub fn prefix_match<'a, I>(query: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|c| channel_matches(query, c))
        .map(|c| c.to_string())
        .collect()
}

/// True for channels that carry application events: anything rooted at
/// `/` that is not the meta tree.
pub fn is_event_channel(channel: &str) -> bool {
    static META: OnceLock<Regex> = OnceLock::new();
    static EVENT: OnceLock<Regex> = OnceLock::new();
    let meta = META.get_or_init(|| Regex::new(r"^/meta/.*$").expect("literal pattern"));
    let event = EVENT.get_or_init(|| Regex::new(r"^/.+$").expect("literal pattern"));

    channel != "/meta" && !meta.is_match(channel) && event.is_match(channel)
}

fn matches_one_way(pattern: &str, text: &str) -> bool {
    match compile(pattern) {
        Some(re) => re.is_match(text),
        // Channel text that breaks regex compilation (stray metacharacters
        // in a non-wildcard name) falls back to a literal comparison.
        None => {
            debug!(pattern, "channel pattern did not compile, comparing literally");
            pattern.eq_ignore_ascii_case(text)
        }
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    let body = if let Some(prefix) = pattern.strip_suffix("**") {
        format!("{prefix}[\\w/]*")
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        format!("{prefix}\\w*")
    } else {
        pattern.to_string()
    };
    Regex::new(&format!("(?i)^(?:{body})$")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_case_insensitive() {
        assert!(channel_matches("/chat/demo", "/chat/demo"));
        assert!(channel_matches("/chat/demo", "/Chat/DEMO"));
        assert!(!channel_matches("/chat/demo", "/chat/other"));
    }

    #[test]
    fn test_single_star_stops_at_slash() {
        assert!(channel_matches("/chat/*", "/chat/demo"));
        assert!(!channel_matches("/chat/*", "/chat/demo/42"));
    }

    #[test]
    fn test_double_star_crosses_slashes() {
        assert!(channel_matches("/chat/**", "/chat/demo"));
        assert!(channel_matches("/chat/**", "/chat/demo/42"));
        assert!(!channel_matches("/chat/**", "/game/demo"));
    }

    #[test]
    fn test_match_is_symmetric() {
        // The stored key may itself be the pattern.
        assert!(channel_matches("/chat/demo", "/chat/**"));
        assert!(channel_matches("/chat/demo/42", "/chat/**"));
    }

    #[test]
    fn test_prefix_match_filters() {
        let keys = ["/chat/demo", "/chat/other", "/game/demo"];
        let hits = prefix_match("/chat/*", keys);
        assert_eq!(hits, vec!["/chat/demo".to_string(), "/chat/other".to_string()]);
    }

    #[test]
    fn test_event_channel_excludes_meta_tree() {
        assert!(is_event_channel("/chat/demo"));
        assert!(is_event_channel("/metadata"));
        assert!(!is_event_channel("/meta"));
        assert!(!is_event_channel("/meta/connect"));
        assert!(!is_event_channel("/"));
        assert!(!is_event_channel("chat"));
    }
}
