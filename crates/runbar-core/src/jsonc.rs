//! Comment-tolerant JSON as written in editor configuration files.
//!
//! Line (`// ...`) and block (`/* ... */`) comments are removed, followed by
//! trailing commas before `}` or `]`. Both passes track string literal
//! boundaries so `"http://host"` or `"a/*b"` survive untouched.

use serde::de::DeserializeOwned;

pub fn parse_jsonc<T: DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    let cleaned = strip_trailing_commas(&strip_comments(raw));
    serde_json::from_str(&cleaned)
}

pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                copy_string_tail(&mut chars, &mut out);
            }
            '/' if chars.peek() == Some(&'/') => {
                // keep the line break so line numbers in parse errors stay right
                while let Some(&next) = chars.peek() {
                    if next == '\n' || next == '\r' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn strip_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[idx + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn copy_string_tail(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    let mut escaped = false;
    for c in chars.by_ref() {
        out.push(c);
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn leading_line_comment_parses_to_empty_task_list() {
        let value: Value =
            parse_jsonc("// comment\n{\"version\":\"2.0.0\",\"tasks\":[]}").expect("parse");
        assert_eq!(value, json!({"version": "2.0.0", "tasks": []}));
    }

    #[test]
    fn leading_block_comment_parses_to_empty_task_list() {
        let value: Value =
            parse_jsonc("/* c */{\"version\":\"2.0.0\",\"tasks\":[]}").expect("parse");
        assert_eq!(value["tasks"], json!([]));
    }

    #[test]
    fn block_comment_ends_at_first_terminator() {
        let raw = "{ /* one */ \"a\": 1, /* two */ \"b\": 2 }";
        let value: Value = parse_jsonc(raw).expect("parse");
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn comment_markers_inside_strings_are_preserved() {
        let raw = r#"{
            "url": "http://example.com/a", // trailing
            "glob": "src/*.ts /* not a comment */",
            "quote": "say \"//hi\""
        }"#;
        let value: Value = parse_jsonc(raw).expect("parse");
        assert_eq!(value["url"], "http://example.com/a");
        assert_eq!(value["glob"], "src/*.ts /* not a comment */");
        assert_eq!(value["quote"], "say \"//hi\"");
    }

    #[test]
    fn trailing_commas_are_dropped_outside_strings() {
        let raw = "{\"tasks\": [1, 2, ], \"s\": \"a,]\", }";
        let value: Value = parse_jsonc(raw).expect("parse");
        assert_eq!(value, json!({"tasks": [1, 2], "s": "a,]"}));
    }

    #[test]
    fn unterminated_block_comment_swallows_rest() {
        assert_eq!(strip_comments("{}/* open"), "{} ");
    }

    #[test]
    fn malformed_content_still_reports_error() {
        assert!(parse_jsonc::<Value>("{ invalid json }").is_err());
    }
}
