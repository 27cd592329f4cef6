use std::{
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

use crate::common::source::Source;

/// A `Span` refers to a section of a source,
/// much like a `&str`, but with a reference to a `Source` rather than a `String`.
/// Tokens carry one, and diagnostics use it to recover
/// line numbers and excerpts.
#[derive(Clone, Eq, PartialEq)]
pub struct Span {
    source: Rc<Source>,
    offset: usize,
    length: usize,
}

impl Span {
    /// Create a new `Span` from an offset with a length.
    pub fn new(source: &Rc<Source>, offset: usize, length: usize) -> Span {
        Span {
            source: Rc::clone(source),
            offset,
            length,
        }
    }

    /// A `Span` that points at a specific point in the source.
    /// Has a length of `0`.
    pub fn point(source: &Rc<Source>, offset: usize) -> Span {
        Span::new(source, offset, 0)
    }

    /// Byte offset of the start of the `Span`.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Return the index of the end of the `Span`.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    /// Creates a new `Span` which spans the space of the previous two.
    /// ```plain
    /// put x into y
    /// ^^^          | Span a
    ///       ^^^^   | Span b
    /// ^^^^^^^^^^   | combined
    /// ```
    pub fn combine(a: &Span, b: &Span) -> Span {
        let offset = a.offset.min(b.offset);
        let end = a.end().max(b.end());
        Span::new(&a.source, offset, end - offset)
    }

    /// Returns the contents of a `Span`.
    pub fn contents(&self) -> String {
        self.source.contents
            .get(self.offset..self.end())
            .unwrap_or("")
            .to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        let lines = split_lines(&self.source.contents);
        let last = lines.len().saturating_sub(1);
        let start_line = self.line(self.offset).min(last);
        let end_line = self.line(self.end()).clamp(start_line, last);
        lines[start_line..=end_line]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn path(&self) -> String {
        self.source.name()
    }

    /// Zero-based line of a byte index into the source.
    /// Both `\n` and lone `\r` end a line, like the lexer sees it.
    pub fn line(&self, index: usize) -> usize {
        let before = self.source.contents.get(..index).unwrap_or(&self.source.contents);
        let mut line = 0;
        let mut chars = before.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\n' => line += 1,
                '\r' if chars.peek() != Some(&'\n') => line += 1,
                _ => (),
            }
        }
        line
    }

    /// One-based line the span starts on, as scripters count them.
    pub fn line_number(&self) -> usize {
        self.line(self.offset) + 1
    }

    pub fn col(&self, index: usize) -> usize {
        self.source.contents
            .get(..index)
            .unwrap_or("")
            .rsplit(|c| c == '\n' || c == '\r')
            .next()
            .unwrap_or("")
            .chars()
            .count()
    }

    pub fn format(&self) -> FormattedSpan {
        FormattedSpan {
            path: self.path(),
            start: self.line(self.offset),
            lines: self.lines(),
            start_col: self.col(self.offset),
            end_col: self.col(self.end()),
        }
    }
}

/// Splits text into lines on `\r\n`, `\n` or a lone `\r`.
/// Always returns at least one (possibly empty) line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = vec![];
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'\n' => {
                lines.push(&text[start..index]);
                start = index + 1;
            },
            b'\r' => {
                lines.push(&text[start..index]);
                if bytes.get(index + 1) == Some(&b'\n') {
                    index += 1;
                }
                start = index + 1;
            },
            _ => (),
        }
        index += 1;
    }

    lines.push(&text[start..]);
    lines
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("contents", &self.contents())
            .field("start", &self.offset)
            .field("end", &self.end())
            .finish()
    }
}

impl Display for Span {
    /// Given a `Span`, `fmt` will print out where the `Span` occurs in its source.
    /// ```plain
    /// 12 | put x intoo y
    ///    |       ^^^^^
    /// ```
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.format())
    }
}

/// Represents a formatted span, ready to be displayed.
pub struct FormattedSpan {
    pub path: String,
    pub start: usize,
    pub lines: Vec<String>,
    pub start_col: usize,
    pub end_col: usize,
}

impl FormattedSpan {
    pub fn is_multiline(&self) -> bool {
        self.lines.len() != 1
    }

    pub fn gutter_padding(&self) -> usize {
        (self.start + self.lines.len()).to_string().len()
    }

    /// If a single line span, returns the number of carets between cols.
    pub fn carets(&self) -> Option<usize> {
        if self.is_multiline() {
            None
        } else {
            Some(self.end_col.saturating_sub(self.start_col))
        }
    }
}

impl Display for FormattedSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "In {}:{}:{}", self.path, self.start + 1, self.start_col + 1)?;
        writeln!(f, "{} |", " ".repeat(self.gutter_padding()))?;

        match self.carets() {
            Some(carets) => {
                writeln!(f, "{} | {}", self.start + 1, self.lines[0])?;
                writeln!(
                    f,
                    "{} | {}{}",
                    " ".repeat(self.gutter_padding()),
                    " ".repeat(self.start_col),
                    "^".repeat(carets.max(1)),
                )?;
            },
            None => {
                for (index, line) in self.lines.iter().enumerate() {
                    let line_no = (self.start + index + 1).to_string();
                    let padding = " ".repeat(self.gutter_padding() - line_no.len());
                    writeln!(f, "{}{} > {}", line_no, padding, line)?;
                }
            },
        }

        Ok(())
    }
}

/// A wrapper for spanning types.
/// Tokens are `Spanned<Token>`s, so the parser always knows
/// which line and offset a diagnostic should point at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Takes a generic item, and wraps in in a `Span` to make it `Spanned`.
    pub fn new(item: T, span: Span) -> Spanned<T> {
        Spanned { item, span }
    }

    /// Applies a function to a `Spanned`'s item.
    pub fn map<B>(self, f: impl FnOnce(T) -> B) -> Spanned<B> {
        Spanned::new(f(self.item), self.span)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn combination() {
        let source = Source::source("put 1 into x");
        let a = Span::new(&source, 0, 3);
        let b = Span::new(&source, 6, 4);

        assert_eq!(Span::combine(&a, &b), Span::new(&source, 0, 10));
        assert_eq!(Span::combine(&a, &b).contents(), "put 1 into");
    }

    #[test]
    fn line_numbers() {
        let source = Source::source("on a\r\n  put 1\rend a\n");
        let put = Span::new(&source, 8, 3);
        let end = Span::new(&source, 14, 3);

        assert_eq!(put.contents(), "put");
        assert_eq!(put.line_number(), 2);
        assert_eq!(end.line_number(), 3);
    }

    #[test]
    fn excerpt() {
        let source = Source::source("put x intoo y");
        let span = Span::new(&source, 6, 5);

        let target = "In ./source:1:7
  |
1 | put x intoo y
  |       ^^^^^
";
        assert_eq!(format!("{}", span.format()), target);
    }

    #[test]
    fn empty() {
        let source = Source::source("");
        let span = Span::point(&source, 0);
        format!("{}", span);
    }
}
