//! `{{ name }}` template parser.
//!
//! Grammar:
//! - `{{ name }}` is a placeholder; surrounding whitespace inside the markers
//!   is trimmed and `name` must match `[A-Za-z_][A-Za-z0-9_.]*`.
//! - `\{{` emits a literal `{{` (when escapes are enabled, the default).
//! - Everything else, including lone `{`, `}` and a stray `}}`, is literal.

use super::error::{Error, Position, Result};
use log::trace;
use std::{ops::Range, str::FromStr};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A borrowed view of one parsed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text to emit verbatim.
    Lit(&'a str),
    /// Escaped open marker (`\{{`), emitted as `{{`.
    Esc(&'a str),
    /// Placeholder: the full marker text and the trimmed variable name.
    Var { raw: &'a str, name: &'a str },
}

impl<'a> Segment<'a> {
    /// The exact source text this segment was parsed from.
    pub fn source(&self) -> &'a str {
        match *self {
            Segment::Lit(s) | Segment::Esc(s) => s,
            Segment::Var { raw, .. } => raw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Lit,
    Esc,
    Var { name_start: usize, name_end: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    kind: Kind,
    range: Range<usize>,
}

/// Knobs for the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Treat `\{{` as a literal `{{` instead of an open marker.
    pub escapes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { escapes: true }
    }
}

/// A parsed, immutable template. Parse once, expand many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    spans: Vec<Span>,
}

impl Template {
    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Iterate over the parsed segments in source order.
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> + '_ {
        self.spans.iter().map(|span| {
            let text = &self.source[span.range.clone()];
            match span.kind {
                Kind::Lit => Segment::Lit(text),
                Kind::Esc => Segment::Esc(text),
                Kind::Var {
                    name_start,
                    name_end,
                } => Segment::Var {
                    raw: text,
                    name: &self.source[name_start..name_end],
                },
            }
        })
    }

    /// Distinct placeholder names, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for seg in self.segments() {
            if let Segment::Var { name, .. } = seg {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// True when the template contains no placeholders.
    pub fn is_static(&self) -> bool {
        !self.spans.iter().any(|s| matches!(s.kind, Kind::Var { .. }))
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Parse `input` with the default options.
pub fn parse(input: &str) -> Result<Template> {
    parse_with(input, ParseOptions::default())
}

/// Parse `input` into a [`Template`].
pub fn parse_with(input: &str, opts: ParseOptions) -> Result<Template> {
    let mut spans = Vec::new();
    let mut lit_start = 0;
    let mut pos = 0;

    let push_lit = |spans: &mut Vec<Span>, start: usize, end: usize| {
        // Skip empty slices.
        if end > start {
            spans.push(Span {
                kind: Kind::Lit,
                range: start..end,
            });
        }
    };

    while let Some(found) = input[pos..].find(OPEN) {
        let open = pos + found;

        if opts.escapes && input[..open].ends_with('\\') {
            push_lit(&mut spans, lit_start, open - 1);
            spans.push(Span {
                kind: Kind::Esc,
                range: open - 1..open + OPEN.len(),
            });
            pos = open + OPEN.len();
            lit_start = pos;
            continue;
        }

        push_lit(&mut spans, lit_start, open);

        let inner_start = open + OPEN.len();
        let after_open = &input[inner_start..];
        let close = after_open
            .find(CLOSE)
            .ok_or_else(|| Error::malformed(input, open, "unterminated `{{`"))?;

        let raw = &after_open[..close];
        if let Some(nested) = raw.find(OPEN) {
            return Err(Error::malformed(
                input,
                inner_start + nested,
                "nested `{{` before the previous placeholder was closed",
            ));
        }

        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::malformed(input, open, "empty placeholder"));
        }

        let name_start = inner_start + (raw.len() - raw.trim_start().len());
        if !is_valid_name(name) {
            return Err(Error::InvalidPlaceholderName {
                name: name.to_owned(),
                at: Position::locate(input, name_start),
            });
        }

        let end = inner_start + close + CLOSE.len();
        spans.push(Span {
            kind: Kind::Var {
                name_start,
                name_end: name_start + name.len(),
            },
            range: open..end,
        });
        pos = end;
        lit_start = end;
    }

    push_lit(&mut spans, lit_start, input.len());

    trace!("parsed template into {} segments", spans.len());
    Ok(Template {
        source: input.to_owned(),
        spans,
    })
}

/// `[A-Za-z_][A-Za-z0-9_.]*`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
