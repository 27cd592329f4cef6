//! Operator precedence and the terms between operators.

use log::trace;

use crate::common::opcode::{InstructionId, Opcode, BACK_OF_STACK};
use crate::compiler::syntax::ParseResult;
use crate::construct::{
    token::{Identifier, Subtype, Token},
    tree::{Call, ChunkMode, ChunkType, Operation, Unit, Value},
};

use super::Parser;

impl<'a> Parser<'a> {
    /// Terms separated by binary operators.
    /// Operands and operators are stacked; whenever an operator binds
    /// looser than the one before it, the whole stack is folded from the
    /// right. Equal precedence therefore groups to the right.
    pub(super) fn parse_expression(&mut self) -> ParseResult<Option<Value>> {
        let first = match self.parse_term()? {
            Some(first) => first,
            None => return Ok(None),
        };

        let mut terms = vec![first];
        let mut operators: Vec<(u32, InstructionId)> = vec![];

        while let Some((length, precedence, instruction)) = self.peek_operator() {
            if operators.last().map_or(false, |(previous, _)| *previous > precedence) {
                collapse(&mut terms, &mut operators);
            }
            self.index += length;
            trace!("operator {} at precedence {}", instruction, precedence);

            let term = match self.parse_term()? {
                Some(term) => term,
                None => return Err(self.error(format!("Expected a term here, found {}.", self.found()))),
            };
            operators.push((precedence, instruction));
            terms.push(term);
        }

        collapse(&mut terms, &mut operators);
        Ok(terms.pop())
    }

    pub(super) fn required_expression(&mut self) -> ParseResult<Value> {
        match self.parse_expression()? {
            Some(expression) => Ok(expression),
            None => Err(self.error(format!("Expected an expression here, found {}.", self.found()))),
        }
    }

    /// The first operator in the table that matches here,
    /// as (tokens it spans, precedence, instruction).
    fn peek_operator(&self) -> Option<(usize, u32, InstructionId)> {
        let first = self.peek()?;
        let second = self.peek_at(1);

        self.grammar.operators().iter().find_map(|op| {
            if !first.matches(op.first) {
                return None;
            }
            match op.second {
                None => Some((1, op.precedence, op.instruction)),
                Some(word) if second.map_or(false, |t| t.matches(word)) => {
                    Some((2, op.precedence, op.instruction))
                },
                Some(_) => None,
            }
        })
    }

    pub(super) fn parse_term(&mut self) -> ParseResult<Option<Value>> {
        let term = match self.term_without_postfix()? {
            Some(term) => term,
            None => return Ok(None),
        };

        let grammar = self.grammar;
        let postfix = self.longest_match(grammar.postfix_operators().iter().map(|op| op.words.as_slice()));
        Ok(Some(match postfix {
            Some((index, length)) => {
                self.index += length;
                Value::operator(grammar.postfix_operators()[index].instruction, vec![term])
            },
            None => term,
        }))
    }

    pub(super) fn required_term(&mut self) -> ParseResult<Value> {
        match self.parse_term()? {
            Some(term) => Ok(term),
            None => Err(self.error(format!("Expected a term here, found {}.", self.found()))),
        }
    }

    fn term_without_postfix(&mut self) -> ParseResult<Option<Value>> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Ok(None),
        };
        let next = self.peek_at(1).cloned();
        let next_is = |identifier| next.as_ref().map_or(false, |t| t.is(identifier));

        let can_be_key = token.is_word() || !matches!(token, Token::Identifier { .. });
        if can_be_key && next_is(Identifier::Colon) {
            return self.array_literal().map(Some);
        }

        match token {
            Token::String(text) => {
                self.index += 1;
                return Ok(Some(Value::String(text)));
            },
            Token::Integer(value) => {
                self.index += 1;
                let unit = self.unit();
                return Ok(Some(Value::Integer { value, unit }));
            },
            Token::Float(value) => {
                self.index += 1;
                let unit = self.unit();
                return Ok(Some(Value::Float { value, unit }));
            },
            _ => (),
        }

        let user_word = matches!(token.subtype(), Some(Subtype::UserDefined) | Some(Subtype::Host(_)));
        if user_word && token.is_word() && next_is(Identifier::OpenBracket) {
            return self.function_call().map(Some);
        }

        match token.keyword() {
            Some(Identifier::OpenBracket) => {
                self.index += 1;
                let inner = self.required_expression()?;
                self.expect(Identifier::CloseBracket)?;
                return Ok(Some(inner));
            },
            Some(Identifier::Entry) => return self.entry(false).map(Some),
            Some(Identifier::Number) => {
                if let Some(count) = self.count_chunks()? {
                    return Ok(Some(count));
                }
            },
            Some(Identifier::The) => {
                let start = self.mark();
                self.index += 1;
                if let Some(function) = self.builtin_function()? {
                    return Ok(Some(function));
                }
                if let Some(count) = self.count_chunks()? {
                    return Ok(Some(count));
                }
                self.reset(start);
                return self.parse_container(false);
            },
            Some(Identifier::Param) if next_is(Identifier::OpenBracket) => {
                self.index += 2;
                let index = self.required_expression()?;
                self.expect(Identifier::CloseBracket)?;
                let param = Operation::new(Opcode::Parameter.id(), vec![index]).with_params(BACK_OF_STACK, 0);
                return Ok(Some(Value::Operator(param)));
            },
            _ => (),
        }

        if let Some(function) = self.builtin_function()? {
            return Ok(Some(function));
        }
        if let Some(property) = self.global_property() {
            return Ok(Some(property));
        }
        if let Some(chunk) = self.parse_chunk(ChunkMode::Constant)? {
            return Ok(Some(chunk));
        }
        if let Some(constant) = self.parse_constant() {
            return Ok(Some(constant));
        }
        if let Some(negated) = self.unary()? {
            return Ok(Some(negated));
        }
        if let Some(container) = self.parse_container(false)? {
            return Ok(Some(container));
        }

        match token {
            Token::Identifier { .. } => Ok(None),
            _ => Err(self.error(format!("Expected a term here, found {}.", self.found()))),
        }
    }

    fn unit(&mut self) -> Unit {
        match self.peek().and_then(Token::keyword).and_then(Unit::from_identifier) {
            Some(unit) => {
                self.index += 1;
                unit
            },
            None => Unit::None,
        }
    }

    /// `name: "Ann", age: 12`. Keys are always strings.
    fn array_literal(&mut self) -> ParseResult<Value> {
        let mut entries = vec![];
        loop {
            let key = match self.advance()? {
                Token::String(text) => text,
                token @ Token::Identifier { .. } => token.identifier_text().unwrap_or_default().to_string(),
                other => other.short_description(),
            };
            self.expect(Identifier::Colon)?;
            let value = self.required_expression()?;
            entries.push((Value::String(key), value));

            let another_key = self.is(Identifier::Comma)
                && self.peek_at(2).map_or(false, |t| t.is(Identifier::Colon));
            if !another_key {
                break;
            }
            self.index += 1;
        }
        Ok(Value::Array(entries))
    }

    /// `name(a, b)`, calling a function handler.
    fn function_call(&mut self) -> ParseResult<Value> {
        let name = self.advance()?.normalized_text().to_lowercase();
        let params = self.bracketed_params()?;
        Ok(Value::Call(Call { name, is_command: false, pass: false, params }))
    }

    /// `(a, b)`, with the cursor on the opening bracket.
    pub(super) fn bracketed_params(&mut self) -> ParseResult<Vec<Value>> {
        self.expect(Identifier::OpenBracket)?;
        let mut params = vec![];
        if self.eat(Identifier::CloseBracket) {
            return Ok(params);
        }
        loop {
            params.push(self.required_expression()?);
            if !self.eat(Identifier::Comma) {
                break;
            }
        }
        self.expect(Identifier::CloseBracket)?;
        Ok(params)
    }

    /// `paramCount`, `the parameters()`, ...
    fn builtin_function(&mut self) -> ParseResult<Option<Value>> {
        let grammar = self.grammar;
        let found = match self.peek() {
            Some(token) => grammar.builtin_functions().iter().find(|f| token.matches(f.name)),
            None => None,
        };
        let function = match found {
            Some(function) => function,
            None => return Ok(None),
        };
        self.index += 1;

        if self.is(Identifier::OpenBracket) && self.peek_at(1).map_or(false, |t| t.is(Identifier::CloseBracket)) {
            self.index += 2;
        }
        let operation = Operation::new(function.instruction, vec![])
            .with_params(function.param1, function.param2);
        Ok(Some(Value::Operator(operation)))
    }

    /// `number of words of x`.
    fn count_chunks(&mut self) -> ParseResult<Option<Value>> {
        let kind = match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(number), Some(of), Some(kind)) if number.is(Identifier::Number) && of.is(Identifier::Of) => {
                kind.keyword().and_then(ChunkType::from_identifier)
            },
            _ => None,
        };
        let kind = match kind {
            Some(kind) => kind,
            None => return Ok(None),
        };
        self.index += 3;
        self.expect(Identifier::Of)?;

        let target = self.required_term()?;
        let count = Operation::new(Opcode::CountChunks.id(), vec![target])
            .with_params(BACK_OF_STACK, kind.id());
        Ok(Some(Value::Operator(count)))
    }

    /// The longest run of words naming a constant, like `barn door open`.
    pub(super) fn parse_constant(&mut self) -> Option<Value> {
        let grammar = self.grammar;
        let (index, length) = self.longest_match(grammar.constants().iter().map(|c| c.words.as_slice()))?;
        self.index += length;
        Some(grammar.constants()[index].value.clone())
    }

    fn unary(&mut self) -> ParseResult<Option<Value>> {
        let grammar = self.grammar;
        let (index, length) = match self.longest_match(grammar.unary_operators().iter().map(|op| op.words.as_slice())) {
            Some(found) => found,
            None => return Ok(None),
        };
        self.index += length;

        let operand = self.required_term()?;
        Ok(Some(Value::operator(grammar.unary_operators()[index].instruction, vec![operand])))
    }

    /// Index and length of the longest candidate matching at the cursor.
    /// Ties go to the earlier entry.
    fn longest_match<'w>(&self, candidates: impl Iterator<Item = &'w [Subtype]>) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (index, words) in candidates.enumerate() {
            if words.is_empty() || !self.matches_words(words) {
                continue;
            }
            if best.map_or(true, |(_, length)| words.len() > length) {
                best = Some((index, words.len()));
            }
        }
        best
    }

    fn matches_words(&self, words: &[Subtype]) -> bool {
        words.iter()
            .enumerate()
            .all(|(ahead, word)| self.peek_at(ahead).map_or(false, |t| t.matches(*word)))
    }
}

/// Folds every stacked operator, innermost on the right.
fn collapse(terms: &mut Vec<Value>, operators: &mut Vec<(u32, InstructionId)>) {
    while let Some((_, instruction)) = operators.pop() {
        let right = terms.pop();
        let left = terms.pop();
        match (left, right) {
            (Some(left), Some(right)) => terms.push(Value::operator(instruction, vec![left, right])),
            (left, right) => {
                terms.extend(left);
                terms.extend(right);
                break;
            },
        }
    }
}

#[cfg(test)]
mod test {
    use crate::common::{opcode::{Opcode, BACK_OF_STACK}, source::Source};
    use crate::compiler::{grammar::GrammarConfig, parse::Parser, syntax::ParseError};
    use crate::construct::tree::{Call, Chunk, ChunkMode, ChunkType, Operation, Unit, Value};

    fn expression(source: &str) -> Value {
        let grammar = GrammarConfig::default();
        let mut parser = Parser::new(Source::source(source), &grammar);
        let value = parser.parse_expression().unwrap().unwrap();
        assert!(parser.rest_is_blank(), "left over after {:?}", value);
        value
    }

    fn op(opcode: Opcode, operands: Vec<Value>) -> Value {
        Value::operator(opcode.id(), operands)
    }

    fn int(value: i64) -> Value {
        Value::integer(value)
    }

    #[test]
    fn precedence() {
        assert_eq!(expression("1 + 2 * 3"), op(Opcode::Add, vec![
            int(1),
            op(Opcode::Multiply, vec![int(2), int(3)]),
        ]));
        assert_eq!(expression("1 * 2 + 3"), op(Opcode::Add, vec![
            op(Opcode::Multiply, vec![int(1), int(2)]),
            int(3),
        ]));
    }

    #[test]
    fn equal_precedence_groups_right() {
        assert_eq!(expression("1 - 2 - 3"), op(Opcode::Subtract, vec![
            int(1),
            op(Opcode::Subtract, vec![int(2), int(3)]),
        ]));
    }

    #[test]
    fn two_token_operators() {
        assert_eq!(expression("1 <> 2"), op(Opcode::NotEqual, vec![int(1), int(2)]));
        assert_eq!(expression("1 is not 2"), op(Opcode::NotEqual, vec![int(1), int(2)]));
        assert_eq!(expression("\"a\" && \"b\""), op(Opcode::ConcatenateValuesWithSpace, vec![
            Value::string("a"),
            Value::string("b"),
        ]));
    }

    #[test]
    fn unary_and_postfix() {
        assert_eq!(expression("not true"), op(Opcode::NegateBool, vec![Value::Boolean(true)]));
        assert_eq!(expression("-(1 + 2)"), op(Opcode::NegateNumber, vec![
            op(Opcode::Add, vec![int(1), int(2)]),
        ]));
        assert_eq!(expression("x is a number"), op(Opcode::IsNumber, vec![Value::variable("var_x", "x")]));
        assert_eq!(expression("1 is 2"), op(Opcode::Equal, vec![int(1), int(2)]));
    }

    #[test]
    fn literals() {
        assert_eq!(expression("5 seconds"), Value::Integer { value: 5, unit: Unit::Seconds });
        assert_eq!(expression("1.5 msecs"), Value::Float { value: 1.5, unit: Unit::Milliseconds });
        assert_eq!(expression("barn door open"), Value::string("barn door open"));
        assert_eq!(expression("name: \"Ann\", 2: x"), Value::Array(vec![
            (Value::string("name"), Value::string("Ann")),
            (Value::string("2"), Value::variable("var_x", "x")),
        ]));
    }

    #[test]
    fn calls_and_builtins() {
        assert_eq!(expression("Twice(1, 2)"), Value::Call(Call {
            name: "twice".into(),
            is_command: false,
            pass: false,
            params: vec![int(1), int(2)],
        }));
        assert_eq!(expression("param(2)"), Value::Operator(
            Operation::new(Opcode::Parameter.id(), vec![int(2)]).with_params(BACK_OF_STACK, 0),
        ));
        assert_eq!(expression("the paramCount()"), Value::Operator(
            Operation::new(Opcode::ParameterCount.id(), vec![]).with_params(BACK_OF_STACK, 0),
        ));
    }

    #[test]
    fn chunks() {
        assert_eq!(expression("the number of words of x"), Value::Operator(
            Operation::new(Opcode::CountChunks.id(), vec![Value::variable("var_x", "x")])
                .with_params(BACK_OF_STACK, ChunkType::Word.id()),
        ));
        assert_eq!(expression("char 2 of \"abc\""), Value::Chunk(Chunk {
            mode: ChunkMode::Constant,
            kind: ChunkType::Character,
            start: Box::new(int(2)),
            end: Box::new(int(2)),
            target: Box::new(Value::string("abc")),
        }));
    }

    #[test]
    fn missing_terms() {
        let grammar = GrammarConfig::default();
        let mut parser = Parser::new(Source::source("1 +"), &grammar);
        match parser.parse_expression() {
            Err(ParseError::Syntax { message, .. }) => {
                assert_eq!(message, "Expected a term here, found end of script.");
            },
            other => panic!("expected an error, got {:?}", other),
        }

        let mut parser = Parser::new(Source::source("then"), &grammar);
        assert_eq!(parser.parse_expression(), Ok(None));

        let mut parser = Parser::new(Source::source("item 1 in x"), &grammar);
        match parser.parse_expression() {
            Err(ParseError::Syntax { message, .. }) => {
                assert_eq!(message, "Expected \"to\" or \"of\" here, found \"in\".");
            },
            other => panic!("expected an error, got {:?}", other),
        }
    }
}
