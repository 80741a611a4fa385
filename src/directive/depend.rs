use super::Directive;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// A memory range a task reads or writes, as C expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub direction: Direction,
    pub address: String,
    pub length: String,
}

/// Decomposes every `depend` clause of `directive`, in clause order.
pub fn dependencies(directive: &Directive) -> Result<Vec<Dependency>, Error> {
    let mut deps = vec![];
    for clause in directive.clause("depend") {
        let Some((direction, items)) = clause.args.split_first() else {
            return Err(Error::semantic(directive.line, "empty `depend` clause"));
        };

        let directions: &[Direction] = match direction.as_str() {
            "in" => &[Direction::In],
            "out" => &[Direction::Out],
            "inout" => &[Direction::In, Direction::Out],
            other => {
                return Err(Error::semantic(
                    directive.line,
                    format!("unknown dependency direction `{other}`"),
                ));
            }
        };

        for item in items {
            let (address, length) = address_and_length(item);
            for &direction in directions {
                deps.push(Dependency {
                    direction,
                    address: address.clone(),
                    length: length.clone(),
                });
            }
        }
    }
    Ok(deps)
}

/// `name` covers the whole object, `name[off:len]` a slice, `name[i]` one element.
fn address_and_length(item: &str) -> (String, String) {
    let item = item.trim();
    if let Some(open) = item.find('[')
        && item.ends_with(']')
    {
        let base = item[..open].trim();
        let inner = &item[open + 1..item.len() - 1];
        return match split_slice(inner) {
            Some((offset, length)) => (
                format!("({base}) + ({})", offset.trim()),
                length.trim().to_string(),
            ),
            None => (format!("&({item})"), "0".to_string()),
        };
    }
    (format!("&({item})"), "0".to_string())
}

fn split_slice(inner: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return Some((&inner[..i], &inner[i + 1..])),
            _ => {}
        }
    }
    None
}
