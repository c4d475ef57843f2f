//! Go string literal quoting.

/// Quote `text` as a Go interpreted string literal.
pub fn go_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let code = c as u32;
                if code < 0x80 {
                    out.push_str(&format!("\\x{:02x}", code));
                } else {
                    out.push_str(&format!("\\u{:04x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Decode a Go string literal (interpreted or raw) into its value.
pub fn go_unquote(raw: &str) -> Option<String> {
    if raw.len() >= 2 && raw.starts_with('`') && raw.ends_with('`') {
        return Some(raw[1..raw.len() - 1].replace('\r', ""));
    }
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return None;
    }

    let body = &raw[1..raw.len() - 1];
    let mut out: Vec<u8> = Vec::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let escape = chars.next()?;
        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'x' => out.push(read_radix(&mut chars, 2, 16)? as u8),
            '0'..='7' => {
                let rest = read_radix(&mut chars, 2, 8)?;
                let value = (escape as u32 - '0' as u32) * 64 + rest;
                out.push(u8::try_from(value).ok()?);
            }
            'u' | 'U' => {
                let digits = if escape == 'u' { 4 } else { 8 };
                let c = char::from_u32(read_radix(&mut chars, digits, 16)?)?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

fn read_radix(chars: &mut std::str::Chars<'_>, digits: usize, radix: u32) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..digits {
        value = value * radix + chars.next()?.to_digit(radix)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(go_quote("plain"), "\"plain\"");
        assert_eq!(go_quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(go_quote("a\\b"), "\"a\\\\b\"");
        assert_eq!(go_quote("\u{1}"), "\"\\x01\"");
    }

    #[test]
    fn test_unquote_interpreted() {
        assert_eq!(go_unquote("\"name cannot be empty\"").as_deref(), Some("name cannot be empty"));
        assert_eq!(go_unquote("\"tab\\there\"").as_deref(), Some("tab\there"));
        assert_eq!(go_unquote("\"\\x41\\101\\u00e9\"").as_deref(), Some("AAé"));
        assert_eq!(go_unquote("\"bad \\q\""), None);
        assert_eq!(go_unquote("no quotes"), None);
    }

    #[test]
    fn test_unquote_raw() {
        assert_eq!(go_unquote("`raw \\n text`").as_deref(), Some("raw \\n text"));
    }

    #[test]
    fn test_quote_unquote_agree() {
        let text = "user \"bob\" not found\twith\\slash";
        assert_eq!(go_unquote(&go_quote(text)).as_deref(), Some(text));
    }
}
