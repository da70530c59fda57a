/// Characters the realtime database forbids in path segments.
const ILLEGAL: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Substitution-escape a user identifier for use as a database path
/// segment. `%` itself is escaped first so the mapping round-trips
/// exactly: escape and unescape are inverses for every input.
pub fn escape_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '%' || ILLEGAL.contains(&c) {
            out.push('%');
            out.push_str(&format!("{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse of `escape_key`. Malformed escapes are passed through verbatim
/// rather than dropped, so a read never loses bytes.
pub fn unescape_key(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let hex: String = chars.clone().take(2).collect();
        if hex.len() == 2 {
            if let Ok(code) = u32::from_str_radix(&hex, 16) {
                if let Some(decoded) = char::from_u32(code) {
                    chars.next();
                    chars.next();
                    out.push(decoded);
                    continue;
                }
            }
        }

        out.push('%');
    }

    out
}
