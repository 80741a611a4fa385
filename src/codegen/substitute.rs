//! Identifier substitution over C text.

use std::collections::HashMap;

/// Replaces every identifier token found in `map` with its replacement.
///
/// Member names after `.` or `->`, string and character literals, comments and
/// preprocessor lines are left untouched.
pub fn substitute(text: &str, map: &HashMap<&str, String>) -> String {
    if map.is_empty() {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut copied = 0;
    let mut line_start = true;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => i = skip_literal(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_until(bytes, i, b"\n"),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_until(bytes, i + 2, b"*/"),
            b'#' if line_start => i = skip_until(bytes, i, b"\n"),
            b if b.is_ascii_digit() => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &text[start..i];
                if let Some(replacement) = map.get(word)
                    && !is_member(&bytes[..start])
                {
                    out.push_str(&text[copied..start]);
                    out.push_str(replacement);
                    copied = i;
                }
            }
            _ => i += 1,
        }

        if b == b'\n' {
            line_start = true;
        } else if !b.is_ascii_whitespace() {
            line_start = false;
        }
    }

    out.push_str(&text[copied..]);
    out
}

fn is_member(before: &[u8]) -> bool {
    let trimmed = before.trim_ascii_end();
    trimmed.ends_with(b".") || trimmed.ends_with(b"->")
}

fn skip_literal(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index just past the first `end` at or after `from`, or the end of input. A newline
/// terminator is not consumed.
fn skip_until(bytes: &[u8], from: usize, end: &[u8]) -> usize {
    let mut i = from;
    while i + end.len() <= bytes.len() {
        if &bytes[i..i + end.len()] == end {
            return if end == b"\n" { i } else { i + end.len() };
        }
        i += 1;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_substitutes_whole_identifiers() {
        let m = map(&[("x", "(*(____ctx->x_ptr))")]);
        assert_eq!(
            substitute("x = x + xy + 1x; a[x]++;", &m),
            "(*(____ctx->x_ptr)) = (*(____ctx->x_ptr)) + xy + 1x; a[(*(____ctx->x_ptr))]++;"
        );
    }

    #[test]
    fn test_skips_members_literals_and_comments() {
        let m = map(&[("x", "X")]);
        let src = "p.x = s->x + x; printf(\"x=%d\\n\", 'x'); // x\n/* x */ x";
        assert_eq!(
            substitute(src, &m),
            "p.x = s->x + X; printf(\"x=%d\\n\", 'x'); // x\n/* x */ X"
        );
    }

    #[test]
    fn test_skips_preprocessor_lines() {
        let m = map(&[("N", "M")]);
        assert_eq!(substitute("#define N 3\n  int a = N;\n", &m), "#define N 3\n  int a = M;\n");
    }

    #[test]
    fn test_member_after_space() {
        let m = map(&[("len", "L")]);
        assert_eq!(substitute("v -> len + v . len + len", &m), "v -> len + v . len + L");
    }
}
