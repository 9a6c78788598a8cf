//! Properties codec
//!
//! Line-oriented `key=value` parsing and serialization with the standard
//! escaping rules. Both the `/configfiles` rendering and the local cache
//! files go through this module; the cache additionally key-sorts before
//! serializing so file content is stable across publishes.
//!
//! Supported on parse:
//! - `key=value` and `key: value`
//! - comments starting with `#` or `!`
//! - continuation lines ending with an unescaped `\`
//! - `\\`, `\n`, `\r`, `\t`, `\=`, `\:`, `\ ` escape sequences

use crate::release::Items;

/// Parse properties text into ordered items. Lenient: malformed lines are
/// skipped rather than rejected, matching how config files accrete cruft.
pub fn parse(content: &str) -> Items {
    let mut items = Items::new();
    let mut logical = String::new();

    for raw in content.lines() {
        let line = raw.trim_start();

        if logical.is_empty()
            && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }

        if ends_with_continuation(line) {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }

        logical.push_str(line);
        parse_logical_line(&logical, &mut items);
        logical.clear();
    }

    // A dangling continuation at EOF still counts as a line
    if !logical.is_empty() {
        parse_logical_line(&logical, &mut items);
    }

    items
}

/// Serialize items in their current order as escaped `key=value` lines.
pub fn serialize(items: &Items) -> String {
    let mut out = String::new();
    for (key, value) in items {
        out.push_str(&escape_key(key));
        out.push('=');
        out.push_str(&escape_value(value));
        out.push('\n');
    }
    out
}

/// An odd number of trailing backslashes marks a continuation; an even
/// number is escaped backslash content.
fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

fn parse_logical_line(line: &str, items: &mut Items) {
    let mut sep = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                sep = Some(i);
                break;
            }
            _ => {}
        }
    }

    let Some(pos) = sep else { return };
    let key = unescape(line[..pos].trim());
    if key.is_empty() {
        return;
    }
    let value = unescape(line[pos + 1..].trim_start());
    items.insert(key, value);
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, c) in key.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            ':' => out.push_str("\\:"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' ' => out.push_str("\\ "),
            '#' | '!' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut leading = true;
    for c in value.chars() {
        match c {
            '\\' => {
                out.push_str("\\\\");
                leading = false;
            }
            '\n' => {
                out.push_str("\\n");
                leading = false;
            }
            '\r' => {
                out.push_str("\\r");
                leading = false;
            }
            '\t' => out.push_str("\\t"),
            ' ' if leading => out.push_str("\\ "),
            _ => {
                out.push(c);
                leading = false;
            }
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = r#"
# Comment
key1=value1
key2: value2
key3 = value3

! Another comment
key4=value with spaces
"#;
        let items = parse(content);
        assert_eq!(items.get("key1"), Some(&"value1".to_string()));
        assert_eq!(items.get("key2"), Some(&"value2".to_string()));
        assert_eq!(items.get("key3"), Some(&"value3".to_string()));
        assert_eq!(items.get("key4"), Some(&"value with spaces".to_string()));
    }

    #[test]
    fn test_parse_preserves_order() {
        let items = parse("zebra=1\nalpha=2\nmike=3\n");
        let keys: Vec<&String> = items.keys().collect();
        assert_eq!(keys, ["zebra", "alpha", "mike"]);
    }

    #[test]
    fn test_parse_continuation_line() {
        let items = parse("key=part1\\\npart2");
        assert_eq!(items.get("key"), Some(&"part1part2".to_string()));
    }

    #[test]
    fn test_trailing_escaped_backslash_is_not_continuation() {
        let items = parse("key=value\\\\\nother=x");
        assert_eq!(items.get("key"), Some(&"value\\".to_string()));
        assert_eq!(items.get("other"), Some(&"x".to_string()));
    }

    #[test]
    fn test_parse_empty_value() {
        let items = parse("key=\n");
        assert_eq!(items.get("key"), Some(&String::new()));
    }

    #[test]
    fn test_parse_skips_separator_less_lines() {
        let items = parse("not a property line\nkey=value\n");
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_escaped_separator_in_key() {
        let items = parse("a\\=b=c");
        assert_eq!(items.get("a=b"), Some(&"c".to_string()));
    }

    #[test]
    fn test_serialize_escapes_specials() {
        let mut items = Items::new();
        items.insert("url".to_string(), "http://h:8080/x?a=1".to_string());
        items.insert("multi".to_string(), "line1\nline2".to_string());
        items.insert("lead".to_string(), "  indented".to_string());

        let text = serialize(&items);
        // separators in values need no escaping; the first unescaped one wins
        assert!(text.contains("url=http://h:8080/x?a=1"));
        assert!(text.contains("multi=line1\\nline2"));
        assert!(text.contains("lead=\\ \\ indented"));
    }

    #[test]
    fn test_round_trip() {
        let mut items = Items::new();
        items.insert("plain".to_string(), "value".to_string());
        items.insert("empty".to_string(), String::new());
        items.insert("with=eq".to_string(), "a=b".to_string());
        items.insert("spaced key".to_string(), "  lead and trail ".to_string());
        items.insert("multi".to_string(), "l1\nl2\r\tend".to_string());
        items.insert("back".to_string(), "c:\\dir\\".to_string());
        items.insert("#hash".to_string(), "v".to_string());

        let round = parse(&serialize(&items));
        assert_eq!(round, items);
    }
}
