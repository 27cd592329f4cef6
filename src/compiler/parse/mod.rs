//! Recursive-descent parser over a lexed script.
//! Statements live in `statement`, expressions and terms in `expression`,
//! assignment destinations in `container`, and the table-driven
//! host commands and functions in `host`.
//!
//! Every routine that might not apply returns `ParseResult<Option<_>>`:
//! `Ok(None)` means "not this production" and leaves the cursor where it was,
//! `Err` means the script is wrong.

mod container;
mod expression;
mod host;
mod statement;

use std::{mem, path::Path, rc::Rc};

use log::{debug, trace, warn};

use crate::common::{
    source::Source,
    span::{Span, Spanned},
};
use crate::compiler::{
    grammar::GrammarConfig,
    lex::Lexer,
    syntax::{Diagnostic, ParseError, ParseResult, Severity},
};
use crate::construct::{
    parse_tree::{FunctionDefinition, ParseTree},
    token::{Identifier, Token},
    tree::{Command, Value},
    variable::{variable_key, Locals, VariableEntry},
};

/// Name of the handler that ad hoc commands and embedded text end up in.
pub const RUN_HANDLER: &str = ":run";

/// Resolves `use "file"` lines to script text.
/// Gets the requested name and the file doing the including.
pub trait Include {
    fn include(&mut self, requested: &str, current_file: &str) -> Option<String>;
}

impl<F> Include for F where F: FnMut(&str, &str) -> Option<String> {
    fn include(&mut self, requested: &str, current_file: &str) -> Option<String> {
        self(requested, current_file)
    }
}

pub struct Parser<'a> {
    source: Rc<Source>,
    tokens: Vec<Spanned<Token>>,
    index: usize,
    grammar: &'a GrammarConfig,
    /// Name of the file being parsed, which changes inside includes.
    file: String,
    diagnostics: Vec<Diagnostic>,
    /// The handler being parsed. Download blocks swap in their own.
    scope: FunctionDefinition,
    tree: ParseTree,
    include: Option<&'a mut dyn Include>,
    web_embedding: bool,
    /// User name of the last handler opened, to resync on its `end`.
    last_handler: String,
}

impl<'a> Parser<'a> {
    pub fn new(source: Rc<Source>, grammar: &'a GrammarConfig) -> Parser<'a> {
        let tokens = Lexer::lex(Rc::clone(&source), grammar);
        let file = source.name();
        Parser {
            scope: FunctionDefinition::new("", true, &file, 0),
            source,
            tokens,
            index: 0,
            grammar,
            file,
            diagnostics: vec![],
            tree: ParseTree::new(),
            include: None,
            web_embedding: false,
            last_handler: String::new(),
        }
    }

    /// Names diagnostics and line markers after `file`
    /// rather than the source's path.
    pub fn file_name(mut self, file: &str) -> Parser<'a> {
        self.file = file.to_string();
        self
    }

    pub fn with_include(mut self, include: &'a mut dyn Include) -> Parser<'a> {
        self.include = Some(include);
        self
    }

    /// Lines outside handlers become text printed by the `:run` handler.
    pub fn web_embedding(mut self, enabled: bool) -> Parser<'a> {
        self.web_embedding = enabled;
        self
    }

    /// Parses a whole script: handlers, includes and nothing else.
    /// Errors in a handler are recorded and parsing goes on;
    /// only internal errors come back as `Err`.
    pub fn parse(mut self) -> ParseResult<(ParseTree, Vec<Diagnostic>)> {
        self.top_level()?;
        Ok((self.tree, self.diagnostics))
    }

    /// Parses text typed as a single command or expression
    /// into one command handler named `:run`.
    /// A lone expression becomes `return <expression>`.
    pub fn parse_command_or_expression(mut self) -> ParseResult<(ParseTree, Vec<Diagnostic>)> {
        let line = self.peek_span().line_number();
        let run = self.new_handler(RUN_HANDLER, true, line);
        let outer = mem::replace(&mut self.scope, run);
        let body = self.run_body();
        let mut run = mem::replace(&mut self.scope, outer);
        run.end_line = self.peek_span().line_number();

        match body {
            Ok(body) => run.body = body,
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => self.fail_handler(&mut run, &error),
        }
        self.add_handler(run);
        Ok((self.tree, self.diagnostics))
    }

    fn run_body(&mut self) -> ParseResult<Vec<Command>> {
        self.skip_newlines();

        if self.is_single_line() {
            let start = self.mark();
            let line = self.line();
            let locals = self.scope.locals.clone();

            match self.parse_expression() {
                Ok(Some(expression))
                    if self.rest_is_blank() && !is_fresh_local(&expression, &locals) =>
                {
                    self.index = self.tokens.len();
                    return Ok(vec![Command::LineMarker(line), Command::Return(expression)]);
                },
                Err(error) if error.is_fatal() => return Err(error),
                _ => {
                    self.reset(start);
                    self.scope.locals = locals;
                },
            }
        }

        let mut body = vec![];
        loop {
            self.skip_newlines();
            if self.peek().is_none() {
                break;
            }
            self.parse_one_line(&mut body, true)?;
        }
        Ok(body)
    }

    // Top level:

    fn top_level(&mut self) -> ParseResult<()> {
        while let Some(token) = self.peek() {
            if token.is_newline() {
                self.index += 1;
                continue;
            }

            match self.top_level_construct() {
                Ok(()) => (),
                Err(error) if error.is_fatal() => return Err(error),
                Err(ParseError::Recorded(_)) => (),
                Err(error) => {
                    let diagnostic = Diagnostic::from_parse_error(&error, &self.file);
                    self.record(diagnostic);
                    self.skip_line();
                },
            }
        }
        Ok(())
    }

    fn top_level_construct(&mut self) -> ParseResult<()> {
        let keyword = self.current()?.keyword();
        match keyword {
            Some(Identifier::Use) => self.include_file(),
            Some(Identifier::Function) => self.handler(false),
            Some(Identifier::On)
            | Some(Identifier::To)
            | Some(Identifier::When) => self.handler(true),
            _ if self.web_embedding => {
                self.embedded_text();
                Ok(())
            },
            _ => {
                let message = format!("Skipping \"{}\".", self.line_text());
                let span = self.peek_span();
                let warning = Diagnostic::warning(message, &self.file, span.line_number(), Some(span.offset()));
                self.record(warning);
                self.skip_line();
                Ok(())
            },
        }
    }

    /// `use "file"` parses another script's handlers into this tree.
    fn include_file(&mut self) -> ParseResult<()> {
        self.advance()?;
        let requested = match self.current()? {
            Token::String(name) => name.clone(),
            token if token.is_word() => token.normalized_text(),
            _ => return Err(self.error(format!("Expected a file name here, found {}.", self.found()))),
        };
        let span = self.peek_span();
        self.advance()?;

        let current_file = self.file.clone();
        let text = match self.include.as_mut() {
            Some(include) => include.include(&requested, &current_file),
            None => None,
        };
        let text = match text {
            Some(text) => text,
            None => {
                return Err(ParseError::syntax(
                    format!("Can't find file \"{}\" to include.", requested),
                    &span,
                ));
            },
        };
        self.expect_line_end()?;

        debug!("including {} from {}", requested, current_file);
        let source = Source::new(&text, Path::new(&requested));
        let tokens = Lexer::lex(Rc::clone(&source), self.grammar);

        let saved_source = mem::replace(&mut self.source, source);
        let saved_tokens = mem::replace(&mut self.tokens, tokens);
        let saved_index = mem::replace(&mut self.index, 0);
        let saved_file = mem::replace(&mut self.file, requested);

        let result = self.top_level();

        self.source = saved_source;
        self.tokens = saved_tokens;
        self.index = saved_index;
        self.file = saved_file;
        result
    }

    /// A line of page text, printed as is.
    fn embedded_text(&mut self) {
        let line = self.line();
        let text = self.line_text();
        self.skip_line();

        if self.tree.function(RUN_HANDLER).is_none() {
            let run = self.new_handler(RUN_HANDLER, true, line);
            self.add_handler(run);
        }
        if let Some(run) = self.tree.function_mut(RUN_HANDLER) {
            run.body.push(Command::LineMarker(line));
            run.body.push(Command::Print(Value::String(text)));
            run.end_line = line;
        }
    }

    // Handlers:

    fn new_handler(&self, name: &str, is_command: bool, line: usize) -> FunctionDefinition {
        let mut handler = FunctionDefinition::new(name, is_command, &self.file, line);
        handler.locals.declare(&variable_key("result"), VariableEntry::new("result").keep_alive());
        handler
    }

    /// `on name a, b` ... `end name`, or `function name ...`.
    fn handler(&mut self, is_command: bool) -> ParseResult<()> {
        let line = self.line();
        self.advance()?;

        let name = self.current()?;
        if !name.is_word() {
            return Err(self.error(format!("Expected a handler name here, found {}.", self.found())));
        }
        let user_name = name.normalized_text();
        self.advance()?;
        self.last_handler = user_name.clone();
        debug!("parsing handler {}", user_name);

        let handler = self.new_handler(&user_name, is_command, line);
        let outer = mem::replace(&mut self.scope, handler);
        let result = self.handler_params_and_body(&user_name);
        let mut handler = mem::replace(&mut self.scope, outer);

        match result {
            Ok(end_line) => {
                handler.end_line = end_line;
                self.add_handler(handler);
                Ok(())
            },
            Err(error) if error.is_fatal() => Err(error),
            Err(error) => {
                self.fail_handler(&mut handler, &error);
                handler.end_line = self.resync();
                self.add_handler(handler);
                Err(ParseError::Recorded(Box::new(error)))
            },
        }
    }

    /// Parses into `self.scope`, returning the line of the `end`.
    fn handler_params_and_body(&mut self, user_name: &str) -> ParseResult<usize> {
        let mut index = 0;
        while !self.at_line_end() {
            let param = self.current()?;
            if !param.is_word() || param.keyword().map_or(false, Identifier::is_reserved) {
                return Err(self.error(format!("Expected comma or end of line here, found {}.", self.found())));
            }
            let name = param.normalized_text();
            let key = variable_key(&name);
            self.advance()?;

            self.scope.locals.declare(&key, VariableEntry::new(&name).parameter());
            self.scope.body.push(Command::GetParam { dest: key, index });
            index += 1;

            if !self.eat(Identifier::Comma) && !self.at_line_end() {
                return Err(self.error(format!("Expected comma or end of line here, found {}.", self.found())));
            }
        }
        self.expect_line_end()?;

        let mut body = mem::take(&mut self.scope.body);
        loop {
            self.skip_newlines();
            if self.current()?.is(Identifier::End) {
                break;
            }
            self.parse_one_line(&mut body, true)?;
        }
        self.scope.body = body;

        let end_line = self.line();
        self.advance()?;
        let matches = self.peek()
            .and_then(Token::identifier_text)
            .map_or(false, |text| text.eq_ignore_ascii_case(user_name));
        if !matches {
            return Err(self.error(format!("Expected \"end {}\" here, found {}.", user_name, self.found())));
        }
        self.advance()?;
        self.expect_line_end()?;
        Ok(end_line)
    }

    /// Replaces a handler's body with a marker the VM reports when it's run.
    fn fail_handler(&mut self, handler: &mut FunctionDefinition, error: &ParseError) {
        let diagnostic = Diagnostic::from_parse_error(error, &self.file);
        handler.body = vec![Command::ParseError {
            message: diagnostic.message.clone(),
            file: diagnostic.file.clone(),
            line: diagnostic.line,
            offset: diagnostic.offset.unwrap_or(0),
        }];
        self.record(diagnostic);
    }

    fn add_handler(&mut self, handler: FunctionDefinition) {
        if let Err(duplicate) = self.tree.add_function(handler) {
            let message = format!("A handler named \"{}\" has already been defined.", duplicate.user_name);
            let diagnostic = Diagnostic::error(message, &duplicate.file, duplicate.line, None);
            self.record(diagnostic);
        }
    }

    /// After a handler failed: skip past its `end`,
    /// or up to the start of the next handler, whichever comes first.
    /// Returns the handler's last line.
    fn resync(&mut self) -> usize {
        let mut line_start = self.index == 0
            || self.tokens.get(self.index - 1).map_or(true, |t| t.item.is_newline());

        while let Some(token) = self.peek() {
            if line_start {
                let ends_handler = token.is(Identifier::End)
                    && self.peek_at(1)
                        .and_then(Token::identifier_text)
                        .map_or(false, |text| text.eq_ignore_ascii_case(&self.last_handler));
                if ends_handler {
                    let end_line = self.line();
                    self.skip_line();
                    return end_line;
                }
                if matches!(
                    token.keyword(),
                    Some(Identifier::Function) | Some(Identifier::On) | Some(Identifier::To) | Some(Identifier::When)
                ) {
                    break;
                }
            }
            line_start = token.is_newline();
            self.index += 1;
        }

        match self.index.checked_sub(1).and_then(|last| self.tokens.get(last)) {
            Some(last) => last.span.line_number(),
            None => self.line(),
        }
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!("{}", diagnostic),
            Severity::Error => debug!("{}", diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    // Locals:

    /// A local the script never declared, like `x` in `put 1 into x`.
    /// Read before it's written, it holds its own name.
    fn implicit_local(&mut self, name: &str, init_with_own_name: bool) -> Value {
        let key = variable_key(name);
        let mut entry = VariableEntry::new(name);
        if init_with_own_name {
            entry = entry.with_own_name();
        }
        self.scope.locals.declare(&key, entry);
        Value::Variable { key, name: name.to_string() }
    }

    /// A local no script can refer to by name. Returns its key.
    fn temporary(&mut self) -> String {
        let key = self.tree.unique_identifier_based_on("temp");
        self.scope.locals.declare(&key, VariableEntry::new(&key));
        key
    }

    fn declare_global(&mut self, name: &str) {
        let key = variable_key(name);
        if !self.scope.locals.declare(&key, VariableEntry::new(name).global()) {
            if let Some(existing) = self.scope.locals.get_mut(&key) {
                existing.is_global = true;
            }
        }
        self.tree.declare_global(&key, name);
    }

    // Cursor helpers:

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.index + ahead).map(|t| &t.item)
    }

    /// The current token, which must exist.
    fn current(&self) -> ParseResult<&Token> {
        match self.tokens.get(self.index) {
            Some(token) => Ok(&token.item),
            None => {
                let span = self.peek_span();
                Err(ParseError::PrematureEndOfFile { line: span.line_number(), offset: span.offset() })
            },
        }
    }

    /// Returns the current token and moves past it.
    fn advance(&mut self) -> ParseResult<Token> {
        let token = self.current()?.clone();
        trace!("advancing past {}", token);
        self.index += 1;
        Ok(token)
    }

    fn retreat(&mut self) -> ParseResult<()> {
        if self.index == 0 {
            return Err(ParseError::BacktrackUnderflow);
        }
        self.index -= 1;
        trace!("backing up to token {}", self.index);
        Ok(())
    }

    fn mark(&self) -> usize {
        self.index
    }

    fn reset(&mut self, mark: usize) {
        self.index = mark;
    }

    /// Span of the current token, or the end of the script.
    fn peek_span(&self) -> Span {
        match self.tokens.get(self.index).or_else(|| self.tokens.last()) {
            Some(token) => token.span.clone(),
            None => Span::point(&self.source, self.source.contents.len()),
        }
    }

    fn line(&self) -> usize {
        self.peek_span().line_number()
    }

    fn is(&self, identifier: Identifier) -> bool {
        self.peek().map_or(false, |t| t.is(identifier))
    }

    fn eat(&mut self, identifier: Identifier) -> bool {
        let found = self.is(identifier);
        if found {
            self.index += 1;
        }
        found
    }

    /// Consumes `identifier` or fails with `Expected "identifier" here`.
    fn expect(&mut self, identifier: Identifier) -> ParseResult<()> {
        if self.eat(identifier) {
            Ok(())
        } else {
            Err(self.error(format!("Expected \"{}\" here, found {}.", identifier.text(), self.found())))
        }
    }

    /// The current token as error messages quote it.
    fn found(&self) -> String {
        match self.peek() {
            None => "end of script".to_string(),
            Some(token) if token.is_newline() => "end of line".to_string(),
            Some(token @ Token::String(_)) => token.short_description(),
            Some(token) => format!("\"{}\"", token.short_description()),
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError::syntax(message, &self.peek_span())
    }

    fn at_line_end(&self) -> bool {
        self.peek().map_or(true, Token::is_newline)
    }

    /// Where a statement nested in a one-line `if` stops.
    fn at_statement_end(&self) -> bool {
        self.at_line_end() || self.is(Identifier::Else) || self.is(Identifier::End)
    }

    fn expect_line_end(&mut self) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.is_newline() => {
                self.index += 1;
                Ok(())
            },
            Some(_) => Err(self.error(format!("Expected end of line, found {}.", self.found()))),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek().map_or(false, Token::is_newline) {
            self.index += 1;
        }
    }

    /// Moves past the next newline.
    fn skip_line(&mut self) {
        while let Some(token) = self.peek() {
            let newline = token.is_newline();
            self.index += 1;
            if newline {
                break;
            }
        }
    }

    fn is_single_line(&self) -> bool {
        self.tokens[self.index..]
            .iter()
            .skip_while(|t| !t.item.is_newline())
            .all(|t| t.item.is_newline())
    }

    fn rest_is_blank(&self) -> bool {
        self.tokens[self.index..].iter().all(|t| t.item.is_newline())
    }

    /// The source text from the current token to the end of its line.
    fn line_text(&self) -> String {
        let start = self.peek_span().offset();
        let rest = self.source.contents.get(start..).unwrap_or("");
        rest.lines().next().unwrap_or("").trim_end().to_string()
    }
}

/// A bare word that only just became a local is more likely
/// a command without parameters, like `beep`.
fn is_fresh_local(expression: &Value, before: &Locals) -> bool {
    match expression {
        Value::Variable { key, .. } => !before.contains(key),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::opcode::Opcode;
    use crate::construct::tree::Call;

    fn parse(source: &str) -> (ParseTree, Vec<Diagnostic>) {
        let grammar = GrammarConfig::default();
        Parser::new(Source::source(source), &grammar).parse().unwrap()
    }

    fn body(tree: &ParseTree, name: &str) -> Vec<Command> {
        tree.function(name)
            .map(|f| f.body.iter().filter(|c| !matches!(c, Command::LineMarker(_))).cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn handlers_and_params() {
        let (tree, diagnostics) = parse("on mouseUp a, b\n  put a into b\nend mouseUp\n\nfunction Twice x\n  return x * 2\nend twice\n");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let mouse_up = tree.function("mouseup").unwrap();
        assert!(mouse_up.is_command);
        assert_eq!(mouse_up.user_name, "mouseUp");
        assert_eq!(mouse_up.end_line, 3);
        assert_eq!(&mouse_up.body[..2], &[
            Command::GetParam { dest: "var_a".into(), index: 0 },
            Command::GetParam { dest: "var_b".into(), index: 1 },
        ]);
        assert!(mouse_up.locals.get("var_a").unwrap().is_parameter);
        assert!(mouse_up.locals.get("var_result").unwrap().keep_alive_past_scope);

        let twice = tree.function("twice").unwrap();
        assert!(!twice.is_command);
        assert_eq!(body(&tree, "twice")[1], Command::Return(
            Value::operator(Opcode::Multiply.id(), vec![Value::variable("var_x", "x"), Value::integer(2)]),
        ));
    }

    #[test]
    fn bad_params() {
        let (tree, diagnostics) = parse("on go a b\nend go\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Expected comma or end of line here, found \"b\".");
        assert!(matches!(body(&tree, "go")[0], Command::ParseError { .. }));
    }

    #[test]
    fn wrong_end() {
        let (_, diagnostics) = parse("on go\n  beep\nend stop\n");
        assert_eq!(diagnostics[0].message, "Expected \"end go\" here, found \"stop\".");
        assert_eq!(diagnostics[0].line, 3);
    }

    #[test]
    fn error_recovery_keeps_later_handlers() {
        let (tree, diagnostics) = parse("on a\n  put 1 intoo x\n  put 2 into y\nend a\non b\n  put 3 into z\nend b\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Expected \"into\", \"before\" or \"after\" here, found \"intoo\".");
        assert_eq!(diagnostics[0].line, 2);

        assert_eq!(body(&tree, "a").len(), 1);
        assert_eq!(body(&tree, "b"), vec![Command::Put {
            value: Value::integer(3),
            dest: Value::variable("var_z", "z"),
        }]);
    }

    #[test]
    fn recovers_at_next_handler_without_end() {
        let (tree, diagnostics) = parse("on a\n  put 1 intoo x\non b\n  beep\nend b\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(tree.function("b").is_some());
    }

    #[test]
    fn failed_handlers_end_at_their_end_line() {
        let (tree, _) = parse("on a\n  put 1 intoo x\n  put 2 into y\nend a\n");
        assert_eq!(tree.function("a").unwrap().end_line, 4);

        let (tree, _) = parse("on a\n  put 1 intoo x\n\non b\nend b\n");
        assert_eq!(tree.function("a").unwrap().end_line, 3);
        assert_eq!(tree.function("b").unwrap().end_line, 5);
    }

    #[test]
    fn skips_stray_lines() {
        let (tree, diagnostics) = parse("hello there\non a\nend a\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].message, "Skipping \"hello there\".");
        assert!(tree.function("a").is_some());
    }

    #[test]
    fn duplicate_handlers() {
        let (tree, diagnostics) = parse("on a\nend a\non A\nend A\n");
        assert_eq!(tree.functions().len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 3);
    }

    #[test]
    fn premature_end() {
        let (tree, diagnostics) = parse("on a\n  put 1 into x\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Premature end of script.");
        assert!(matches!(body(&tree, "a")[0], Command::ParseError { .. }));
    }

    #[test]
    fn includes() {
        let grammar = GrammarConfig::default();
        let mut files = |requested: &str, _: &str| match requested {
            "lib" => Some("function helper\n  return 1\nend helper\n".to_string()),
            _ => None,
        };
        let source = Source::source("use \"lib\"\nuse \"missing\"\non go\n  get helper()\nend go\n");
        let (tree, diagnostics) = Parser::new(source, &grammar)
            .with_include(&mut files)
            .parse()
            .unwrap();

        assert_eq!(tree.function("helper").map(|f| f.file.as_str()), Some("lib"));
        assert!(tree.function("go").is_some());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Can't find file \"missing\" to include.");
    }

    #[test]
    fn web_embedding() {
        let grammar = GrammarConfig::default();
        let source = Source::source("<h1>Hi</h1>\non a\nend a\n<p>there</p>\n");
        let (tree, diagnostics) = Parser::new(source, &grammar)
            .web_embedding(true)
            .parse()
            .unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(body(&tree, RUN_HANDLER), vec![
            Command::Print(Value::string("<h1>Hi</h1>")),
            Command::Print(Value::string("<p>there</p>")),
        ]);
    }

    fn run(source: &str) -> Vec<Command> {
        let grammar = GrammarConfig::default();
        let (tree, diagnostics) = Parser::new(Source::source(source), &grammar)
            .parse_command_or_expression()
            .unwrap();
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        body(&tree, RUN_HANDLER)
    }

    #[test]
    fn lone_expression_is_returned() {
        assert_eq!(run("1 + 2"), vec![Command::Return(
            Value::operator(Opcode::Add.id(), vec![Value::integer(1), Value::integer(2)]),
        )]);
    }

    #[test]
    fn lone_command_is_run() {
        assert_eq!(run("put 1 into x"), vec![Command::Put {
            value: Value::integer(1),
            dest: Value::variable("var_x", "x"),
        }]);
        assert_eq!(run("beep"), vec![Command::Assign {
            dest: "var_result".into(),
            value: Value::Call(Call { name: "beep".into(), is_command: true, pass: false, params: vec![] }),
        }]);
    }

    #[test]
    fn cursor_bounds() {
        let grammar = GrammarConfig::default();
        let mut parser = Parser::new(Source::source("x"), &grammar);
        assert_eq!(parser.retreat(), Err(ParseError::BacktrackUnderflow));
        assert!(parser.advance().is_ok());
        assert!(matches!(parser.advance(), Err(ParseError::PrematureEndOfFile { .. })));
    }
}
