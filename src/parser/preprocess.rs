//! Pragma encoding.
//!
//! Every `#pragma omp` line becomes an inert call to the sentinel symbol so that the
//! directives survive parsing as ordinary statements. The original directive text is kept
//! as a [`PragmaRecord`] and checked against the sentinels found later.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, trace};

use crate::Error;

/// One directive as originally written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaRecord {
    pub line: usize,
    pub last_line: usize,
    pub text: String,
}

impl PragmaRecord {
    /// Directive family name, e.g. `parallel` for `#pragma omp parallel for`.
    pub fn name(&self) -> &str {
        let rest = directive_body(&self.text).unwrap_or(self.text.trim());
        split_name(rest).0
    }
}

impl fmt::Display for PragmaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.line, self.last_line, self.text)
    }
}

/// Side-channel records keyed by start line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PragmaRecords(BTreeMap<usize, PragmaRecord>);

impl PragmaRecords {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, line: usize) -> Option<&PragmaRecord> {
        self.0.get(&line)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PragmaRecord> {
        self.0.values()
    }

    /// Adds a record. A different record already registered on the same line is rejected.
    pub fn insert(&mut self, record: PragmaRecord) -> Result<(), Error> {
        if let Some(existing) = self.0.get(&record.line)
            && existing != &record
        {
            return Err(Error::InvalidMetadata(format!(
                "conflicting records for line {}: `{}` and `{}`",
                record.line, existing.text, record.text
            )));
        }
        self.0.insert(record.line, record);
        Ok(())
    }

    pub fn merge(&mut self, other: PragmaRecords) -> Result<(), Error> {
        for record in other.0.into_values() {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Reads a metadata file: `LINE LAST_LINE TEXT` per line; blank lines and `//` comments
    /// are skipped.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut records = PragmaRecords::default();
        for (n, raw) in input.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            let invalid = |what: &str| Error::InvalidMetadata(format!("line {}: {what}", n + 1));
            let (start, rest) = line
                .split_once(char::is_whitespace)
                .ok_or_else(|| invalid("expected `LINE LAST_LINE TEXT`"))?;
            let (last, text) = rest
                .trim_start()
                .split_once(char::is_whitespace)
                .ok_or_else(|| invalid("missing directive text"))?;

            let start: usize = start.parse().map_err(|_| invalid("bad start line"))?;
            let last: usize = last.parse().map_err(|_| invalid("bad last line"))?;
            if last < start {
                return Err(invalid("last line precedes start line"));
            }

            records.insert(PragmaRecord {
                line: start,
                last_line: last,
                text: text.trim().to_string(),
            })?;
        }
        Ok(records)
    }

    /// Checks the sentinels discovered in the source, given as `(line, directive name)`,
    /// against the records. Nothing is checked when there are no records.
    pub fn validate<'a>(
        &self,
        discovered: impl IntoIterator<Item = (usize, &'a str)>,
    ) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }

        let mut seen = BTreeSet::new();
        for (line, name) in discovered {
            let record = self.get(line).ok_or_else(|| {
                Error::structural(line, format!("no directive record for `{name}` sentinel"))
            })?;
            if record.name() != name {
                return Err(Error::structural(
                    line,
                    format!(
                        "sentinel `{name}` does not match recorded directive `{}`",
                        record.text
                    ),
                ));
            }
            seen.insert(line);
        }

        match self.iter().find(|r| !seen.contains(&r.line)) {
            Some(missing) => Err(Error::structural(
                missing.line,
                format!("recorded directive `{}` has no sentinel in the source", missing.text),
            )),
            None => Ok(()),
        }
    }
}

/// Output of [`encode`].
#[derive(Debug)]
pub struct Encoded {
    pub source: String,
    pub records: PragmaRecords,
}

/// Text after `#pragma omp`, if `line` is such a directive.
fn directive_body(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("pragma")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix("omp")?;
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }
    Some(rest.trim())
}

fn split_name(body: &str) -> (&str, &str) {
    let end = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    (&body[..end], body[end..].trim())
}

fn is_omp_include(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('#')
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("include"))
        .is_some_and(|rest| matches!(rest.trim(), "<omp.h>" | "\"omp.h\""))
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Rewrites every `#pragma omp` directive into a sentinel call on the same line.
pub fn encode(source: &str, sentinel: &str) -> Encoded {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut out = String::with_capacity(source.len());
    let mut records = PragmaRecords::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let content = line.trim_end_matches(['\n', '\r']);
        let ending = &line[content.len()..];

        if is_omp_include(content) {
            trace!("dropping omp include at line {}", i + 1);
            out.push_str(ending);
            i += 1;
            continue;
        }

        if directive_body(content).is_none() {
            out.push_str(line);
            i += 1;
            continue;
        }

        let start = i;
        let mut parts = vec![];
        loop {
            let part = lines[i].trim_end_matches(['\n', '\r']).trim_end();
            match part.strip_suffix('\\') {
                Some(head) if i + 1 < lines.len() => {
                    parts.push(head.trim());
                    i += 1;
                }
                Some(head) => {
                    parts.push(head.trim());
                    break;
                }
                None => {
                    parts.push(part.trim());
                    break;
                }
            }
        }

        let text = parts.join(" ");
        let (name, clauses) = split_name(directive_body(&text).unwrap_or_default());
        let indent = &content[..content.len() - content.trim_start().len()];
        let line_no = start + 1;

        debug!("encoding `{text}` at line {line_no}");
        out.push_str(&format!(
            "{indent}{sentinel}(\"{name}\", \"{}\", \"pragma{line_no}\");{ending}",
            escape(clauses)
        ));
        for continued in &lines[start + 1..=i] {
            let content = continued.trim_end_matches(['\n', '\r']);
            out.push_str(&continued[content.len()..]);
        }

        records.0.insert(
            line_no,
            PragmaRecord {
                line: line_no,
                last_line: i + 1,
                text,
            },
        );
        i += 1;
    }

    Encoded {
        source: out,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_keeps_lines() {
        let src = "#include <omp.h>\nint main() {\n  #pragma omp parallel for \\\n      shared(a)\n  for (;;) {}\n}\n";
        let encoded = encode(src, "__taskify_pragma");
        assert_eq!(
            encoded.source,
            "\nint main() {\n  __taskify_pragma(\"parallel\", \"for shared(a)\", \"pragma3\");\n\n  for (;;) {}\n}\n"
        );

        let record = encoded.records.get(3).unwrap();
        assert_eq!(record.last_line, 4);
        assert_eq!(record.name(), "parallel");
    }

    #[test]
    fn test_encode_escapes_and_names() {
        let encoded = encode("#pragma omp critical(io)\n#pragma once\n", "S");
        assert_eq!(encoded.source, "S(\"critical\", \"(io)\", \"pragma1\");\n#pragma once\n");

        let encoded = encode("#pragma omp task depend(in: \"x\")", "S");
        assert_eq!(
            encoded.source,
            "S(\"task\", \"depend(in: \\\"x\\\")\", \"pragma1\");"
        );
    }

    #[test]
    fn test_parse_metadata() {
        let records = PragmaRecords::parse(
            "// generated\n\n3 3 #pragma omp taskwait\n10  12 #pragma omp parallel for \n",
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records.get(10).unwrap().text, "#pragma omp parallel for");
        assert_eq!(records.get(3).unwrap().name(), "taskwait");

        assert!(PragmaRecords::parse("x 1 #pragma omp task").is_err());
        assert!(PragmaRecords::parse("5 4 #pragma omp task").is_err());
    }

    #[test]
    fn test_conflicting_records_are_rejected() {
        let mut records = PragmaRecords::parse("1 1 #pragma omp task").unwrap();
        let other = PragmaRecords::parse("1 1 #pragma omp taskwait").unwrap();
        assert!(records.merge(other).is_err());
    }

    #[test]
    fn test_validate_against_sentinels() {
        let records = PragmaRecords::parse("2 2 #pragma omp task\n5 5 #pragma omp taskwait").unwrap();
        assert!(records.validate([(2, "task"), (5, "taskwait")]).is_ok());
        assert!(records.validate([(2, "task")]).is_err());
        assert!(records.validate([(2, "single"), (5, "taskwait")]).is_err());
        assert!(records.validate([(3, "task"), (5, "taskwait")]).is_err());

        assert!(PragmaRecords::default().validate([(7, "task")]).is_ok());
    }
}
