use std::fmt::{self, Display, Formatter};

/// Builds the `Identifier` enum from a table of
/// `Variant => "canonical text", "synonym", ...;` rows.
/// Canonical text is what diagnostics print;
/// every spelling is matched case-insensitively by the lexer.
macro_rules! identifiers {
    ($( $variant:ident => $text:literal $(, $synonym:literal)* ; )*) => {
        /// A built-in keyword, after synonym resolution.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Identifier {
            $( $variant, )*
        }

        impl Identifier {
            /// Every keyword, in declaration order.
            pub const ALL: &'static [Identifier] = &[$( Identifier::$variant, )*];

            /// How the keyword is spelled in diagnostics.
            pub fn text(self) -> &'static str {
                match self {
                    $( Identifier::$variant => $text, )*
                }
            }

            /// Other spellings that resolve to this keyword.
            pub fn synonyms(self) -> &'static [&'static str] {
                match self {
                    $( Identifier::$variant => &[$( $synonym, )*], )*
                }
            }
        }
    };
}

identifiers! {
    Newline => "\n";

    // single-character operators and punctuation
    Plus => "+";
    Minus => "-";
    Asterisk => "*";
    Slash => "/";
    Ampersand => "&";
    Equals => "=";
    LessThan => "<";
    GreaterThan => ">";
    Caret => "^";
    OpenBracket => "(";
    CloseBracket => ")";
    Comma => ",";
    Colon => ":";

    // handlers
    Function => "function";
    On => "on";
    To => "to";
    When => "when";
    End => "end";
    Use => "use";

    // commands
    Put => "put";
    Into => "into";
    After => "after";
    Before => "before";
    Get => "get";
    Set => "set";
    Delete => "delete";
    Download => "download";
    Return => "return";
    Pass => "pass";
    Exit => "exit";
    Next => "next";
    Repeat => "repeat";
    Forever => "forever";
    While => "while";
    Until => "until";
    With => "with";
    From => "from";
    Down => "down";
    Through => "through", "thru";
    Times => "times";
    For => "for";
    Each => "each";
    Chunk => "chunk";
    Done => "done";
    If => "if";
    Then => "then";
    Else => "else";
    Add => "add";
    Subtract => "subtract";
    Multiply => "multiply";
    By => "by";
    Divide => "divide";
    Global => "global";

    // word operators
    And => "and";
    Or => "or";
    Not => "not";
    Mod => "mod", "modulo";
    Is => "is";

    // expressions
    The => "the";
    Of => "of";
    In => "in";
    My => "my";
    Me => "me";
    Long => "long";
    Short => "short";
    Abbreviated => "abbreviated", "abbr", "abbrev";
    Entry => "entry";
    Number => "number";
    Param => "param";
    A => "a";
    An => "an";
    Unset => "unset";
    Integer => "integer";
    Array => "array";
    Result => "result";
    ParamCount => "paramCount";
    Parameters => "parameters";
    ItemDelimiter => "itemDelimiter", "itemDel", "itemDelim";

    // chunk types
    Byte => "byte", "bytes";
    Character => "character", "char", "chars", "characters";
    Line => "line", "lines";
    Item => "item", "items";
    Word => "word", "words";
    Row => "row", "rows";
    Column => "column", "columns";

    // units
    Second => "seconds", "second", "secs", "sec";
    Tick => "ticks", "tick";
    Millisecond => "milliseconds", "millisecond", "msecs", "msec";
    Minute => "minutes", "minute", "mins", "min";
    Hour => "hours", "hour";
    Day => "days", "day";
    Week => "weeks", "week";

    // constants
    True => "true";
    False => "false";
    Empty => "empty";
    CommaWord => "comma";
    ColonWord => "colon";
    Cr => "cr";
    Linefeed => "linefeed", "newline";
    Null => "null";
    Quote => "quote";
    Space => "space";
    Tab => "tab";
    Pi => "pi";

    // visual effects
    Barn => "barn";
    Door => "door";
    Open => "open";
    Close => "close";
    Iris => "iris";
    Push => "push";
    Up => "up";
    Left => "left";
    Right => "right";
    Scroll => "scroll";
    Shrink => "shrink";
    Top => "top";
    Center => "center";
    Bottom => "bottom";
    Stretch => "stretch";
    Venetian => "venetian";
    Blinds => "blinds";
    Wipe => "wipe";
    Zoom => "zoom";
    Out => "out";
}

impl Identifier {
    /// Keywords that give a line or an expression its structure.
    /// These can never be used as the name of an implicit local.
    pub fn is_reserved(self) -> bool {
        use Identifier::*;
        !self.is_alphanumeric() || matches!(self,
            Function | On | To | When | End | Use
            | Put | Into | After | Before | Get | Set | Delete | Download
            | Return | Pass | Exit | Next | Repeat | Forever | While | Until
            | With | From | Down | Through | Times | For | Each
            | If | Then | Else | Add | Subtract | Multiply | By | Divide | Global
            | And | Or | Not | Mod | Is | The | Of | In | My | Me | Entry | Param
        )
    }

    fn is_alphanumeric(self) -> bool {
        self.text().chars().next().map_or(false, char::is_alphanumeric)
    }
}

/// An identifier registered by a host extension,
/// numbered in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostWord(pub u16);

/// What an identifier token means to the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtype {
    Keyword(Identifier),
    Host(HostWord),
    /// No built-in meaning. In grammar tables, matches any word.
    UserDefined,
}

impl From<Identifier> for Subtype {
    fn from(identifier: Identifier) -> Subtype {
        Subtype::Keyword(identifier)
    }
}

/// These are the different tokens the lexer will output.
/// Line and offset live in the `Span` of a `Spanned<Token>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    String(String),
    /// `text` is the identifier as written, case and all.
    Identifier { subtype: Subtype, text: String },
    Integer(i64),
    Float(f64),
    /// Only produced by `Lexer::lex_with_comments`.
    Comment(String),
}

impl Token {
    pub fn newline() -> Token {
        Token::Identifier {
            subtype: Subtype::Keyword(Identifier::Newline),
            text: "\n".to_string(),
        }
    }

    pub fn subtype(&self) -> Option<Subtype> {
        match self {
            Token::Identifier { subtype, .. } => Some(*subtype),
            _ => None,
        }
    }

    /// Is this the built-in keyword `identifier`?
    pub fn is(&self, identifier: Identifier) -> bool {
        self.subtype() == Some(Subtype::Keyword(identifier))
    }

    pub fn is_newline(&self) -> bool {
        self.is(Identifier::Newline)
    }

    /// Identifiers that read as a word rather than punctuation.
    pub fn is_word(&self) -> bool {
        match self {
            Token::Identifier { text, .. } => text
                .chars()
                .next()
                .map_or(false, |c| c.is_alphabetic() || c == '_'),
            _ => false,
        }
    }

    /// Does this token fill a grammar slot that expects `word`?
    /// `Subtype::UserDefined` in a table stands for any word.
    pub fn matches(&self, word: Subtype) -> bool {
        match (self.subtype(), word) {
            (Some(_), Subtype::UserDefined) => self.is_word(),
            (Some(subtype), word) => subtype == word,
            (None, _) => false,
        }
    }

    /// The keyword this token resolved to, if any.
    pub fn keyword(&self) -> Option<Identifier> {
        match self.subtype() {
            Some(Subtype::Keyword(identifier)) => Some(identifier),
            _ => None,
        }
    }

    /// Text of an identifier token as written.
    pub fn identifier_text(&self) -> Option<&str> {
        match self {
            Token::Identifier { text, .. } => Some(text),
            _ => None,
        }
    }

    /// How the token is quoted in diagnostics:
    /// numbers as digits, strings in quotes,
    /// user identifiers as written, keywords in canonical spelling.
    pub fn short_description(&self) -> String {
        match self {
            Token::String(s) => format!("\"{}\"", s),
            Token::Integer(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Comment(c) => format!("--{}", c),
            Token::Identifier { subtype: Subtype::Keyword(Identifier::Newline), .. } => {
                "end of line".to_string()
            },
            Token::Identifier { subtype: Subtype::Keyword(identifier), .. } => {
                identifier.text().to_string()
            },
            Token::Identifier { text, .. } => text.to_string(),
        }
    }

    /// Text with keyword casing normalized,
    /// user-defined identifiers keep theirs.
    pub fn normalized_text(&self) -> String {
        match self {
            Token::Identifier { subtype: Subtype::Keyword(identifier), .. } => {
                identifier.text().to_string()
            },
            Token::Identifier { text, .. } => text.to_string(),
            other => other.short_description(),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let message = match self {
            Token::String(s) => format!("String \"{}\"", s),
            Token::Integer(i) => format!("Integer {}", i),
            Token::Float(n) => format!("Float {}", n),
            Token::Comment(c) => format!("Comment --{}", c),
            Token::Identifier { subtype: Subtype::Keyword(Identifier::Newline), .. } => {
                "Newline".to_string()
            },
            Token::Identifier { subtype: Subtype::Keyword(k), text } => {
                format!("Keyword {:?} '{}'", k, text)
            },
            Token::Identifier { subtype: Subtype::Host(HostWord(n)), text } => {
                format!("Host word {} '{}'", n, text)
            },
            Token::Identifier { subtype: Subtype::UserDefined, text } => {
                format!("Identifier '{}'", text)
            },
        };
        write!(f, "{}", message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn descriptions() {
        let word = Token::Identifier { subtype: Subtype::UserDefined, text: "myVar".into() };
        let keyword = Token::Identifier {
            subtype: Subtype::Keyword(Identifier::Through),
            text: "THRU".into(),
        };

        assert_eq!(word.short_description(), "myVar");
        assert_eq!(keyword.short_description(), "through");
        assert_eq!(Token::String("hi".into()).short_description(), "\"hi\"");
        assert_eq!(Token::Integer(42).short_description(), "42");
        assert_eq!(Token::newline().short_description(), "end of line");
    }

    #[test]
    fn user_defined_matches_words() {
        let word = Token::Identifier { subtype: Subtype::UserDefined, text: "x".into() };
        let comma = Token::Identifier {
            subtype: Subtype::Keyword(Identifier::Comma),
            text: ",".into(),
        };

        assert!(word.matches(Subtype::UserDefined));
        assert!(!comma.matches(Subtype::UserDefined));
        assert!(comma.matches(Identifier::Comma.into()));
        assert!(!Token::Integer(1).matches(Subtype::UserDefined));
    }

    #[test]
    fn reserved() {
        assert!(Identifier::End.is_reserved());
        assert!(Identifier::Comma.is_reserved());
        assert!(!Identifier::A.is_reserved());
        assert!(!Identifier::Top.is_reserved());
    }
}
