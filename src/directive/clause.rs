use std::collections::BTreeMap;

use crate::Error;

/// One occurrence of a clause, e.g. `shared(a, b)` or the bare flag `nowait`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseArgs {
    pub name: String,
    pub args: Vec<String>,
    /// Text between the parentheses, `None` for bare clauses.
    pub raw: Option<String>,
}

/// Clause name to every occurrence of that clause, in source order.
pub type Clauses = BTreeMap<String, Vec<ClauseArgs>>;

/// Parses the clause text that follows a directive name.
///
/// Clauses are separated by top-level spaces or commas. A space that is only followed by
/// more spaces and then `(` does not separate, so `shared (a)` reads like `shared(a)`.
pub fn parse_clauses(text: &str, line: usize) -> Result<Clauses, Error> {
    let mut clauses = Clauses::new();
    for token in split_clauses(text, line)? {
        let clause = parse_clause(&token, line)?;
        clauses.entry(clause.name.clone()).or_default().push(clause);
    }
    Ok(clauses)
}

fn split_clauses(text: &str, line: usize) -> Result<Vec<String>, Error> {
    let unbalanced =
        || Error::semantic(line, format!("unbalanced parentheses in clauses `{}`", text.trim()));

    let mut tokens = vec![];
    let mut current = String::new();
    let mut depth = 0usize;
    let chars: Vec<char> = text.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth = depth.checked_sub(1).ok_or_else(unbalanced)?;
                current.push(c);
            }
            c if depth == 0 && c.is_whitespace() => {
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                if next != Some(&'(') && !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            ',' if depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
        i += 1;
    }

    if depth != 0 {
        return Err(unbalanced());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_clause(token: &str, line: usize) -> Result<ClauseArgs, Error> {
    let Some(open) = token.find('(') else {
        return Ok(ClauseArgs {
            name: token.to_string(),
            args: vec![],
            raw: None,
        });
    };

    let name = token[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::semantic(line, format!("malformed clause `{token}`")));
    }

    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in token.char_indices().skip(open) {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    match close {
        Some(close) if close == token.len() - 1 => {
            let raw = &token[open + 1..close];
            Ok(ClauseArgs {
                name: name.to_string(),
                args: tokenize_args(raw),
                raw: Some(raw.to_string()),
            })
        }
        _ => Err(Error::semantic(
            line,
            format!("clause `{token}` must end with its closing parenthesis"),
        )),
    }
}

/// Splits a clause argument string on top-level `,` and `:`.
///
/// Brackets and parentheses nest, so `a[0:n]` stays one token.
pub fn tokenize_args(text: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            ',' | ':' if depth == 0 => {
                tokens.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&text[start..]);

    tokens
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
