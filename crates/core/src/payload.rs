//! Outbound payload shaping: truncation and the relay signature.

/// Banner prepended to every relayed payload. Also a loop-guard marker.
pub const DEFAULT_SIGNATURE: &str = "🤖 Relayed output:";

/// Appended to truncated payloads.
pub const TRUNCATION_MARKER: &str = "...";

/// Default payload cap, in characters.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 4000;

/// Cuts `text` to at most `max_len` characters, replacing the tail with `...`.
///
/// Counts `char`s so multi-byte text is never split inside a code point.
pub fn truncate_payload(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let keep = max_len.saturating_sub(TRUNCATION_MARKER.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Final outbound text: `signature`, blank line, truncated body.
pub fn format_relay(signature: &str, text: &str, max_len: usize) -> String {
    format!("{signature}\n\n{}", truncate_payload(text, max_len))
}

/// Strips the signature prefix added by [`format_relay`], if present.
pub fn relay_body<'a>(signature: &str, relayed: &'a str) -> &'a str {
    relayed
        .strip_prefix(signature)
        .and_then(|rest| rest.strip_prefix("\n\n"))
        .unwrap_or(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_payload("hello", 4000), "hello");
        let exact = "a".repeat(4000);
        assert_eq!(truncate_payload(&exact, 4000), exact);
    }

    #[test]
    fn long_text_is_cut_to_exact_length() {
        let out = truncate_payload(&"x".repeat(4500), 4000);
        assert_eq!(out.chars().count(), 4000);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().filter(|c| *c == 'x').count(), 3997);
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let out = truncate_payload(&"é".repeat(10), 6);
        assert_eq!(out, "ééé...");
    }

    #[test]
    fn formatted_payload_carries_signature() {
        let out = format_relay(DEFAULT_SIGNATURE, "done", 4000);
        assert!(out.starts_with(DEFAULT_SIGNATURE));
        assert_eq!(relay_body(DEFAULT_SIGNATURE, &out), "done");
    }
}
