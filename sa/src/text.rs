//! Text helpers for model output

use std::sync::LazyLock;

use regex::Regex;

/// Triple-backtick fences, bare or with a whole language tag (`json`, `jsonc`, `c++`, ...)
static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").unwrap());

/// Remove code-fence decorations from model output
///
/// Only the fence markers are removed, surrounding whitespace is left alone.
/// Repeats until nothing changes so the result is itself fence-free.
pub fn strip_code_fences(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = CODE_FENCE_RE.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Truncate to at most `max` characters, appending `...` when cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_json_fence() {
        let raw = "```json\n[{\"plugin_name\":\"GPTPlugin\"}]\n```";
        assert_eq!(strip_code_fences(raw), "\n[{\"plugin_name\":\"GPTPlugin\"}]\n");
    }

    #[test]
    fn test_strip_kql_fences() {
        assert_eq!(strip_code_fences("```kql\nSecurityIncident | take 5\n```").trim(), "SecurityIncident | take 5");
        assert_eq!(strip_code_fences("```kusto\nSigninLogs\n```").trim(), "SigninLogs");
    }

    #[test]
    fn test_strip_html_and_plaintext() {
        assert_eq!(strip_code_fences("```html<div>x</div>```"), "<div>x</div>");
        assert_eq!(strip_code_fences("```plaintext\nhi```"), "\nhi");
    }

    #[test]
    fn test_strip_whole_language_tag() {
        let raw = "```jsonc\n[{\"plugin_name\":\"GPTPlugin\"}]\n```";
        assert_eq!(strip_code_fences(raw).trim(), "[{\"plugin_name\":\"GPTPlugin\"}]");
        assert_eq!(strip_code_fences("```python\nprint(1)\n```").trim(), "print(1)");
        assert_eq!(strip_code_fences("```objective-c\nx\n```").trim(), "x");
    }

    #[test]
    fn test_strip_backtick_runs() {
        assert_eq!(strip_code_fences("``````"), "");
        assert_eq!(strip_code_fences("````json"), "`json");
        assert_eq!(strip_code_fences("inline `code` stays"), "inline `code` stays");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }

    proptest! {
        #[test]
        fn prop_strip_is_idempotent(s in ".{0,64}", fence in prop_oneof![
            Just(""), Just("```"), Just("```json"), Just("```kql"), Just("```html")
        ]) {
            let input = format!("{fence}{s}{fence}");
            let once = strip_code_fences(&input);
            prop_assert_eq!(strip_code_fences(&once), once.clone());
            prop_assert!(!once.contains("```"));
        }

        #[test]
        fn prop_clean_text_unchanged(s in "[^`]{0,128}") {
            prop_assert_eq!(strip_code_fences(&s), s);
        }
    }
}
