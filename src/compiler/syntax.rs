use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use thiserror::Error;

use crate::common::{
    source::Source,
    span::Span,
};

/// A structural failure while parsing.
/// Lines are 1-based, offsets are byte offsets into the source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{message}")]
    Syntax { message: String, line: usize, offset: usize },

    #[error("Premature end of script.")]
    PrematureEndOfFile { line: usize, offset: usize },

    /// The parser tried to retreat before the first token.
    /// This is a bug in a grammar routine, not in the script.
    #[error("Internal error: backtracked past the start of the script.")]
    BacktrackUnderflow,

    /// Already turned into a diagnostic at the handler boundary,
    /// with the parser moved past the failed handler.
    #[error("{0}")]
    Recorded(Box<ParseError>),
}

impl ParseError {
    /// A syntax error pointing at the start of `span`.
    pub fn syntax(message: impl Into<String>, span: &Span) -> ParseError {
        ParseError::Syntax {
            message: message.into(),
            line: span.line_number(),
            offset: span.offset(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. }
            | ParseError::PrematureEndOfFile { line, .. } => Some(*line),
            ParseError::BacktrackUnderflow => None,
            ParseError::Recorded(inner) => inner.line(),
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { offset, .. }
            | ParseError::PrematureEndOfFile { offset, .. } => Some(*offset),
            ParseError::BacktrackUnderflow => None,
            ParseError::Recorded(inner) => inner.offset(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            ParseError::BacktrackUnderflow => true,
            ParseError::Recorded(inner) => inner.is_fatal(),
            _ => false,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A failure while simplifying or generating code.
/// These abort the compile of the whole file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Can't assign a value to {0}.")]
    NotAssignable(String),

    #[error("Can't convert {value} to {to}.")]
    NotConvertible { value: String, to: &'static str },

    #[error("Can only reference a chunk of a variable or another chunk, found {0}.")]
    NotAChunkTarget(String),

    #[error("The {0} property can't be changed.")]
    ReadOnlyProperty(String),

    #[error("Instruction {0} is not a jump and can't be retargeted.")]
    NotAJump(usize),

    #[error("\"{0}\" can only be used inside a repeat loop.")]
    OutsideLoop(&'static str),

    #[error("This handler has more local variables than fit in a frame.")]
    TooManyLocals,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A problem in a host extension table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read host extension: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("\"{0}\" is neither a keyword nor a word declared by the extension.")]
    UnknownWord(String),

    #[error("Mode \"{0}\" must be a single character.")]
    BadMode(String),

    #[error("Instruction {id} offset by {base} does not fit in an instruction id.")]
    InstructionOverflow { id: u32, base: u32 },

    #[error("A constant needs between one and three words, found {0}.")]
    ConstantLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One entry in the ordered list of messages a compile produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, file: &str, line: usize, offset: Option<usize>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            file: file.to_string(),
            line,
            offset,
        }
    }

    pub fn error(message: impl Into<String>, file: &str, line: usize, offset: Option<usize>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            file: file.to_string(),
            line,
            offset,
        }
    }

    /// Records a parse error against `file`.
    /// Errors without a location (internal errors) are put on line 0.
    pub fn from_parse_error(error: &ParseError, file: &str) -> Diagnostic {
        let error = match error {
            ParseError::Recorded(inner) => inner,
            other => other,
        };
        Diagnostic::error(error.to_string(), file, error.line().unwrap_or(0), error.offset())
    }

    /// Renders the offending line with a caret under the offset.
    /// ```plain
    /// In ./source:2:7
    ///   |
    /// 2 | put x intoo y
    ///   |       ^
    /// ```
    pub fn excerpt(&self, source: &Rc<Source>) -> Option<String> {
        let offset = self.offset?.min(source.contents.len());
        let rest = source.contents.get(offset..).unwrap_or("");
        let length = rest
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
            .map_or(rest.len(), |(index, _)| index);
        Some(Span::new(source, offset, length).format().to_string())
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}:{}:{}: {}: {}", self.file, self.line, offset, self.severity, self.message),
            None => write!(f, "{}:{}: {}: {}", self.file, self.line, self.severity, self.message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let error = Diagnostic::error("Expected \"to\" here, found \"x\".", "stack", 3, Some(40));
        let warning = Diagnostic::warning("Skipping \"x\".", "stack", 1, None);

        assert_eq!(error.to_string(), "stack:3:40: error: Expected \"to\" here, found \"x\".");
        assert_eq!(warning.to_string(), "stack:1: warning: Skipping \"x\".");
    }

    #[test]
    fn recorded_unwraps() {
        let source = Source::source("put 1 intoo x");
        let inner = ParseError::syntax("Bad.", &Span::new(&source, 6, 5));
        let diagnostic = Diagnostic::from_parse_error(&ParseError::Recorded(Box::new(inner)), "./source");

        assert_eq!(diagnostic.line, 1);
        assert_eq!(diagnostic.offset, Some(6));
        assert_eq!(diagnostic.message, "Bad.");
    }

    #[test]
    fn excerpt() {
        let source = Source::source("on a\nput x intoo y\nend a");
        let diagnostic = Diagnostic::error("Bad.", "./source", 2, Some(11));
        let target = "In ./source:2:7
  |
2 | put x intoo y
  |       ^^^^^
";
        assert_eq!(diagnostic.excerpt(&source).as_deref(), Some(target));
    }
}
