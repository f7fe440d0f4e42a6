//! `key=value` line codec
//!
//! Encodes an ordered list of properties as a single text line, the external
//! representation used by the command dispatch protocol.

/// Encode properties into one line, preserving the caller's field order
pub fn encode_line<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut line = String::new();
    for (key, value) in pairs {
        let key = key.as_ref().trim();
        if key.is_empty() {
            continue;
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(key);
        line.push('=');
        push_value(&mut line, value.as_ref());
    }
    line
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '=' || c == '\\')
}

fn push_value(line: &mut String, value: &str) {
    if !needs_quotes(value) {
        line.push_str(value);
        return;
    }
    line.push('"');
    for c in value.chars() {
        match c {
            '"' => line.push_str("\\\""),
            '\\' => line.push_str("\\\\"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            _ => line.push(c),
        }
    }
    line.push('"');
}

/// Decode one line into its properties, in line order
///
/// A token without `=` is taken as a key with an empty value. An unterminated
/// quoted value runs to the end of the line.
pub fn decode_line(line: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }

        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            if chars.next_if_eq(&'"').is_some() {
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('r') => value.push('\r'),
                            Some(other) => value.push(other),
                            None => break,
                        },
                        _ => value.push(c),
                    }
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }
        }

        if !key.is_empty() {
            pairs.push((key, value));
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that values are quoted only when needed
    #[test]
    fn test_encode_quotes_only_when_needed() {
        let line = encode_line([
            ("account", "demo"),
            ("cmdname", "SetTime"),
            ("arg0", "hello world"),
            ("arg1", ""),
        ]);
        assert_eq!(
            line,
            r#"account=demo cmdname=SetTime arg0="hello world" arg1="""#
        );
    }

    /// Test decoding of quoted, bare and key-only tokens
    #[test]
    fn test_decode_mixed_tokens() {
        let pairs = decode_line("result=OK000 message=\"Command sent\" flag\r\n");
        assert_eq!(
            pairs,
            vec![
                ("result".to_string(), "OK000".to_string()),
                ("message".to_string(), "Command sent".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    /// Test that escaped quotes and backslashes survive
    #[test]
    fn test_escaped_characters_survive() {
        let text = "say \"hi\" a=b c:\\d";
        let line = encode_line([("arg0", text)]);
        let pairs = decode_line(&line);
        assert_eq!(pairs[0].1, text);
    }

    /// Test that an empty line has no fields
    #[test]
    fn test_decode_empty_line() {
        assert!(decode_line("").is_empty());
        assert!(decode_line("   \n").is_empty());
    }
}
