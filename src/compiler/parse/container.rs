//! Things a value can be put into, which double as terms.

use crate::common::opcode::Opcode;
use crate::compiler::syntax::ParseResult;
use crate::construct::{
    token::{Identifier, Token},
    tree::{Chunk, ChunkMode, ChunkType, Operation, PropertyStyle, Value},
    variable::{variable_key, VariableEntry},
};

use super::Parser;

impl<'a> Parser<'a> {
    /// Tries, in order: a chunk, `my`/`me`, a known local, a host function,
    /// `entry ... of`, a built-in variable, `name of object`, a global
    /// property, and finally declares a new local named after the word.
    /// A `destination` writes through chunks instead of reading them.
    pub(super) fn parse_container(&mut self, destination: bool) -> ParseResult<Option<Value>> {
        let start = self.mark();
        let mode = if destination { ChunkMode::Reference } else { ChunkMode::Constant };

        if let Some(chunk) = self.parse_chunk(mode)? {
            return Ok(Some(chunk));
        }
        if let Some(me) = self.me()? {
            return Ok(Some(me));
        }

        let the = self.eat(Identifier::The);
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => {
                self.reset(start);
                return Ok(None);
            },
        };

        if !the {
            if let Some(name) = token.identifier_text().filter(|_| token.is_word()) {
                let key = variable_key(name);
                if self.scope.locals.contains(&key) {
                    let name = name.to_string();
                    self.index += 1;
                    return Ok(Some(Value::Variable { key, name }));
                }
            }
        }

        let grammar = self.grammar;
        if let Some(host) = self.parse_host_entity_with_table(grammar.host_functions())? {
            return Ok(Some(Value::HostFunction(host)));
        }
        if token.is(Identifier::Entry) {
            return self.entry(destination).map(Some);
        }
        if let Some(variable) = self.builtin_variable() {
            return Ok(Some(variable));
        }
        if let Some(property) = self.object_property()? {
            return Ok(Some(property));
        }
        if let Some(property) = self.global_property() {
            return Ok(Some(property));
        }

        let reserved = token.keyword().map_or(false, Identifier::is_reserved);
        if !the && token.is_word() && !reserved {
            let name = token.identifier_text().unwrap_or_default().to_string();
            self.index += 1;
            return Ok(Some(self.implicit_local(&name, !destination)));
        }

        self.reset(start);
        Ok(None)
    }

    pub(super) fn required_container(&mut self, destination: bool) -> ParseResult<Value> {
        match self.parse_container(destination)? {
            Some(container) => Ok(container),
            None => Err(self.error(format!("Expected a container here, found {}.", self.found()))),
        }
    }

    /// `word 2 to 3 of x`. Not a chunk, and nothing consumed,
    /// unless a chunk type is followed by a start index.
    pub(super) fn parse_chunk(&mut self, mode: ChunkMode) -> ParseResult<Option<Value>> {
        let kind = match self.peek().and_then(Token::keyword).and_then(ChunkType::from_identifier) {
            Some(kind) => kind,
            None => return Ok(None),
        };
        let start = self.mark();
        self.index += 1;

        let first = match self.parse_expression()? {
            Some(first) => first,
            None => {
                self.reset(start);
                return Ok(None);
            },
        };

        let had_to = self.eat(Identifier::To) || self.eat(Identifier::Through);
        let last = if had_to { self.required_expression()? } else { first.clone() };

        if !self.eat(Identifier::Of) {
            let expected = if had_to { "\"of\"" } else { "\"to\" or \"of\"" };
            return Err(self.error(format!("Expected {} here, found {}.", expected, self.found())));
        }

        let target = match mode {
            ChunkMode::Reference => match self.parse_container(true)? {
                Some(target) => target,
                None => self.required_term()?,
            },
            ChunkMode::Constant => self.required_term()?,
        };

        Ok(Some(Value::Chunk(Chunk {
            mode,
            kind,
            start: Box::new(first),
            end: Box::new(last),
            target: Box::new(target),
        })))
    }

    /// `me`, or `my [long|short|abbreviated] name`.
    fn me(&mut self) -> ParseResult<Option<Value>> {
        let me = || Value::Operator(Operation::new(Opcode::PushMe.id(), vec![]));

        if self.eat(Identifier::Me) {
            return Ok(Some(me()));
        }
        if !self.eat(Identifier::My) {
            return Ok(None);
        }

        let style = self.property_style();
        let name = match self.peek() {
            Some(token) if token.is_word() => token.identifier_text().unwrap_or_default().to_string(),
            _ => return Err(self.error(format!("Expected a property name here, found {}.", self.found()))),
        };
        self.index += 1;
        Ok(Some(Value::object_property(&name, style, me())))
    }

    fn property_style(&mut self) -> PropertyStyle {
        let style = self.peek()
            .and_then(Token::keyword)
            .and_then(PropertyStyle::from_identifier);
        match style {
            Some(style) => {
                self.index += 1;
                style
            },
            None => PropertyStyle::Plain,
        }
    }

    /// `entry key of array`, readable and writable.
    pub(super) fn entry(&mut self, destination: bool) -> ParseResult<Value> {
        self.expect(Identifier::Entry)?;
        let key = self.required_expression()?;
        self.expect(Identifier::Of)?;
        let array = if destination {
            self.required_container(true)?
        } else {
            self.required_term()?
        };
        Ok(Value::operator(Opcode::GetArrayItemForKey.id(), vec![array, key]))
    }

    /// `the result`, `the download` and whatever else the host declares.
    fn builtin_variable(&mut self) -> Option<Value> {
        let grammar = self.grammar;
        let subtype = self.peek()?.subtype()?;
        let entry = grammar
            .builtin_variables()
            .iter()
            .find(|v| v.name == subtype)?;

        let key = variable_key(&entry.variable);
        self.scope.locals.declare(&key, VariableEntry::new(&entry.variable));
        self.index += 1;
        Some(Value::Variable { key, name: entry.variable.clone() })
    }

    /// `[long|short|abbreviated] name of object`.
    fn object_property(&mut self) -> ParseResult<Option<Value>> {
        let start = self.mark();
        let style = self.property_style();

        let name = match (self.peek(), self.peek_at(1)) {
            (Some(name), Some(of)) if name.is_word() && of.is(Identifier::Of) => {
                let reserved = name.keyword().map_or(false, Identifier::is_reserved);
                if reserved {
                    None
                } else {
                    name.identifier_text().map(str::to_string)
                }
            },
            _ => None,
        };
        let name = match name {
            Some(name) => name,
            None => {
                self.reset(start);
                return Ok(None);
            },
        };
        self.index += 2;

        let target = self.required_term()?;
        Ok(Some(Value::object_property(&name, style, target)))
    }

    /// `the itemDelimiter`, possibly qualified like `the long date`.
    pub(super) fn global_property(&mut self) -> Option<Value> {
        let start = self.mark();
        let qualifier = match self.peek().and_then(Token::keyword) {
            Some(q @ Identifier::Long) | Some(q @ Identifier::Short) | Some(q @ Identifier::Abbreviated) => {
                self.index += 1;
                Some(q.into())
            },
            _ => None,
        };

        let grammar = self.grammar;
        let token = self.peek().cloned();
        let found = token.as_ref().and_then(|token| {
            grammar
                .global_properties()
                .iter()
                .find(|p| token.matches(p.name) && p.qualifier == qualifier)
        });

        match (token, found) {
            (Some(token), Some(property)) => {
                self.index += 1;
                Some(Value::GlobalProperty {
                    name: token.normalized_text(),
                    getter: property.getter,
                    setter: property.setter,
                })
            },
            _ => {
                self.reset(start);
                None
            },
        }
    }
}
