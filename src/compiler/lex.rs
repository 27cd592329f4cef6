use std::{
    iter::Peekable,
    rc::Rc,
    str::Chars,
};

use log::trace;

use crate::common::{
    source::Source,
    span::{Span, Spanned},
};
use crate::compiler::grammar::GrammarConfig;
use crate::construct::token::{Subtype, Token};

/// Turns source text into tokens.
/// Lexing never fails: an unterminated string just runs
/// to the end of the source.
#[derive(Debug)]
pub struct Lexer<'a> {
    source: Rc<Source>,
    grammar: &'a GrammarConfig,
    index: usize,
    comments: bool,
    tokens: Vec<Spanned<Token>>,
}

impl<'a> Lexer<'a> {
    /// Lexes a source file into a stream of tokens.
    /// Comments are dropped, but the line break that ends
    /// them still becomes a newline token.
    pub fn lex(source: Rc<Source>, grammar: &'a GrammarConfig) -> Vec<Spanned<Token>> {
        Lexer::run(source, grammar, false)
    }

    /// Like `lex`, but keeps a `Token::Comment` ahead of each comment's newline.
    pub fn lex_with_comments(source: Rc<Source>, grammar: &'a GrammarConfig) -> Vec<Spanned<Token>> {
        Lexer::run(source, grammar, true)
    }

    fn run(source: Rc<Source>, grammar: &'a GrammarConfig, comments: bool) -> Vec<Spanned<Token>> {
        let mut lexer = Lexer {
            source,
            grammar,
            index: 0,
            comments,
            tokens: vec![],
        };

        lexer.strip();
        while lexer.index < lexer.source.contents.len() {
            lexer.next_token();
            lexer.strip();
        }

        trace!("lexed {} tokens from {}", lexer.tokens.len(), lexer.source.name());
        lexer.tokens
    }

    /// Returns all characters after the current index position.
    fn remaining(&self) -> Peekable<Chars> {
        self.source.contents[self.index..].chars().peekable()
    }

    fn grab(&self, len: usize) -> &str {
        &self.source.contents[self.index..self.index + len]
    }

    /// Skips whitespace. Line breaks are tokens, so they stay.
    fn strip(&mut self) {
        self.index += self.take_while(|c| c.is_whitespace() && c != '\n' && c != '\r');
    }

    fn push(&mut self, token: Token, len: usize) {
        let span = Span::new(&self.source, self.index, len);
        self.tokens.push(Spanned::new(token, span));
        self.index += len;
    }

    /// Length of the line break at the current position, if there is one.
    fn line_break(&self) -> Option<usize> {
        let mut remaining = self.remaining();
        match remaining.next() {
            Some('\n') => Some(1),
            Some('\r') if remaining.peek() == Some(&'\n') => Some(2),
            Some('\r') => Some(1),
            _ => None,
        }
    }

    fn next_token(&mut self) {
        if let Some(len) = self.line_break() {
            return self.push(Token::newline(), len);
        }

        let mut remaining = self.remaining();
        let c = match remaining.next() {
            Some(c) => c,
            None => return,
        };

        match c {
            '-' if remaining.peek() == Some(&'-') => self.comment(),
            '"' => self.string('"', '"'),
            '“' => self.string('“', '”'),
            c if c.is_ascii_digit() => self.number(),
            c => match self.single_character(c) {
                Some(subtype) => {
                    let text = c.to_string();
                    self.push(Token::Identifier { subtype, text }, c.len_utf8());
                },
                None => self.identifier(),
            },
        }
    }

    /// Punctuation that is a token on its own, like `+` or `(`.
    /// Letters and digits never split this way.
    fn single_character(&self, c: char) -> Option<Subtype> {
        if c.is_alphanumeric() || c.is_whitespace() {
            return None;
        }
        match self.grammar.lookup(&c.to_string()) {
            Subtype::UserDefined => None,
            subtype => Some(subtype),
        }
    }

    /// `--` to the end of the line, including the line break,
    /// which becomes a newline token.
    fn comment(&mut self) {
        let start = self.index;
        let text_len = self.take_while(|c| c != '\n' && c != '\r');
        if self.comments {
            let text = self.grab(text_len)[2..].to_string();
            self.push(Token::Comment(text), text_len);
        } else {
            self.index += text_len;
        }

        let len = self.line_break().unwrap_or(0);
        let span = Span::new(&self.source, start, self.index + len - start);
        self.tokens.push(Spanned::new(Token::newline(), span));
        self.index += len;
    }

    /// Ends at the closing quote, or at the end of the source.
    /// There are no escapes.
    fn string(&mut self, open: char, close: char) {
        let open_len = open.len_utf8();
        let mut len = open_len;
        let mut terminated = false;

        for c in self.source.contents[self.index + open_len..].chars() {
            len += c.len_utf8();
            if c == close {
                terminated = true;
                break;
            }
        }

        let inner_end = if terminated { len - close.len_utf8() } else { len };
        let text = self.grab(inner_end)[open_len..].to_string();
        self.push(Token::String(text), len);
    }

    /// A run of digits, optionally followed by `.` and more digits.
    /// Integers too large for an `i64` become floats.
    fn number(&mut self) {
        let mut len = self.take_while(|c| c.is_ascii_digit());

        let mut after = self.source.contents[self.index + len..].chars();
        let fraction = after.next() == Some('.')
            && after.next().map_or(false, |c| c.is_ascii_digit());

        if fraction {
            len += 1;
            len += self.source.contents[self.index + len..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .count();
        }

        let text = self.grab(len);
        let token = match (fraction, text.parse::<i64>()) {
            (false, Ok(integer)) => Token::Integer(integer),
            _ => Token::Float(text.parse::<f64>().unwrap_or(f64::INFINITY)),
        };
        self.push(token, len);
    }

    /// Accumulates until whitespace, a line break, punctuation,
    /// a comment or a quote.
    fn identifier(&mut self) {
        let mut len = 0;
        let mut remaining = self.remaining();

        while let Some(c) = remaining.next() {
            let ends = c.is_whitespace()
                || c == '"'
                || c == '“'
                || (c == '-' && remaining.peek() == Some(&'-'))
                || (len > 0 && self.single_character(c).is_some());
            if ends { break; }
            len += c.len_utf8();
        }

        // always make progress
        if len == 0 {
            len = self.remaining().next().map_or(0, char::len_utf8);
        }

        let text = self.grab(len).to_string();
        let subtype = self.grammar.lookup(&text);
        self.push(Token::Identifier { subtype, text }, len);
    }

    /// Byte length of the run of characters matching `pred`
    /// from the current position.
    fn take_while(&self, pred: impl Fn(char) -> bool) -> usize {
        self.remaining()
            .take_while(|c| pred(*c))
            .map(char::len_utf8)
            .sum()
    }
}
