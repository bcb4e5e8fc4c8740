//! Conservative repair of near-miss JSON returned by an LLM, shared by
//! [`crate::synthesizer::ProfileSynthesizer`] and [`crate::config_synth::ConfigSynthesizer`].

/// Balances unmatched `{`/`[` by appending closing brackets, for responses truncated
/// mid-structure by a token limit.
pub fn repair_truncated(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    let mut repaired = text.trim_end().trim_end_matches(',').to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

/// Strips control characters and flattens raw newlines embedded inside string literals,
/// a common cause of `serde_json` parse failures on LLM output.
pub fn repair_invalid(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                out.push(ch);
                escaped = false;
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' | '\r' => out.push_str("\\n"),
                c if c.is_control() => {}
                c => out.push(c),
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
        if ch.is_control() && ch != '\n' && ch != '\t' {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Extracts the first top-level `{...}` or `[...]` object from `text`, stripping any
/// markdown code fence or leading prose the model wrapped it in.
pub fn extract_json_span(text: &str) -> &str {
    let trimmed = text.trim();
    let start = trimmed.find(['{', '[']);
    match start {
        Some(start) => &trimmed[start..],
        None => trimmed,
    }
}

/// Attempts, in order: parse as-is, parse the extracted span, repair-truncated, then
/// repair-invalid. Returns the first variant that parses.
pub fn parse_with_repair<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let span = extract_json_span(raw);
    if let Ok(value) = serde_json::from_str(span) {
        return Some(value);
    }
    if let Ok(value) = serde_json::from_str(&repair_truncated(span)) {
        return Some(value);
    }
    let invalid_repaired = repair_invalid(span);
    if let Ok(value) = serde_json::from_str(&invalid_repaired) {
        return Some(value);
    }
    serde_json::from_str(&repair_truncated(&invalid_repaired)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn repairs_truncated_object() {
        let truncated = r#"{"a": 1, "b": [1, 2"#;
        let repaired = repair_truncated(truncated);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn repairs_embedded_newlines() {
        let invalid = "{\"a\": \"line one\nline two\"}";
        let repaired = repair_invalid(invalid);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["a"], "line one\nline two");
    }

    #[test]
    fn extracts_json_from_markdown_fence() {
        let wrapped = "Here you go:\n```json\n{\"a\": 1}\n```";
        assert!(extract_json_span(wrapped).starts_with('{'));
    }

    #[test]
    fn parse_with_repair_recovers_from_truncation() {
        #[derive(serde::Deserialize)]
        struct Doc {
            a: i32,
        }
        let doc: Doc = parse_with_repair(r#"{"a": 42"#).unwrap();
        assert_eq!(doc.a, 42);
    }
}
