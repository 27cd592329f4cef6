//! One line of a handler body, and the blocks some lines open.

use std::mem;

use log::trace;

use crate::common::opcode::Opcode;
use crate::compiler::syntax::ParseResult;
use crate::construct::{
    token::{Identifier, Token},
    tree::{Arithmetic, Call, ChunkType, Command, Value},
    variable::{variable_key, VariableEntry},
};

use super::Parser;

impl<'a> Parser<'a> {
    /// Parses a statement into `body`, preceded by its line marker.
    /// With `swallow_newline` the line has to end here and the newline is
    /// consumed. Without it, as for the `then` of a one-line `if`, the
    /// statement may also stop at `else` or `end`.
    pub(super) fn parse_one_line(&mut self, body: &mut Vec<Command>, swallow_newline: bool) -> ParseResult<()> {
        body.push(Command::LineMarker(self.line()));

        let keyword = self.current()?.keyword();
        trace!("statement starting with {:?}", keyword);
        match keyword {
            Some(Identifier::Put) => self.put(body)?,
            Some(Identifier::Get) => {
                self.advance()?;
                let value = self.required_expression()?;
                let it = self.implicit_local("it", false);
                body.push(Command::Put { value, dest: it });
            },
            Some(Identifier::Set) => {
                self.advance()?;
                let dest = self.required_container(true)?;
                self.expect(Identifier::To)?;
                let value = self.required_expression()?;
                body.push(Command::Put { value, dest });
            },
            Some(Identifier::Delete) => {
                self.advance()?;
                let target = self.required_container(true)?;
                body.push(call_for_result("delete", vec![target]));
            },
            Some(Identifier::Download) => self.download(body)?,
            Some(Identifier::Return) => {
                self.advance()?;
                let value = if self.at_statement_end() {
                    Value::string("")
                } else {
                    self.required_expression()?
                };
                body.push(Command::Return(value));
            },
            Some(Identifier::Pass) => self.pass(body)?,
            Some(Identifier::Exit) => self.exit(body)?,
            Some(Identifier::Next) => {
                self.advance()?;
                self.expect(Identifier::Repeat)?;
                body.push(Command::NextRepeat);
            },
            Some(Identifier::Repeat) => self.repeat(body)?,
            Some(Identifier::If) => self.if_(body)?,
            Some(Identifier::Add) => {
                self.advance()?;
                let value = self.required_expression()?;
                self.expect(Identifier::To)?;
                let dest = self.required_container(true)?;
                body.push(Command::Arithmetic { op: Arithmetic::Add, dest, value });
            },
            Some(Identifier::Subtract) => {
                self.advance()?;
                let value = self.required_expression()?;
                self.expect(Identifier::From)?;
                let dest = self.required_container(true)?;
                body.push(Command::Arithmetic { op: Arithmetic::Subtract, dest, value });
            },
            Some(Identifier::Multiply) => {
                self.advance()?;
                let dest = self.required_container(true)?;
                if !self.eat(Identifier::By) && !self.eat(Identifier::With) {
                    return Err(self.error(format!("Expected \"by\" or \"with\" here, found {}.", self.found())));
                }
                let value = self.required_expression()?;
                body.push(Command::Arithmetic { op: Arithmetic::Multiply, dest, value });
            },
            Some(Identifier::Divide) => {
                self.advance()?;
                let dest = self.required_container(true)?;
                self.expect(Identifier::By)?;
                let value = self.required_expression()?;
                body.push(Command::Arithmetic { op: Arithmetic::Divide, dest, value });
            },
            Some(Identifier::Global) => self.global()?,
            _ => self.host_command_or_call(body)?,
        }

        if swallow_newline {
            self.expect_line_end()
        } else if self.at_statement_end() {
            Ok(())
        } else {
            Err(self.error(format!("Expected end of line, found {}.", self.found())))
        }
    }

    /// `put E [into|after|before C]`.
    fn put(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        let start = self.mark();
        self.advance()?;
        let value = self.required_expression()?;

        let keyword = self.peek().and_then(Token::keyword);
        match keyword {
            Some(Identifier::Into) => {
                self.advance()?;
                let dest = self.required_container(true)?;
                body.push(Command::Put { value, dest });
            },
            Some(Identifier::After) => {
                self.advance()?;
                let dest = self.required_container(true)?;
                let joined = Value::operator(Opcode::ConcatenateValues.id(), vec![dest.clone(), value]);
                body.push(Command::Put { value: joined, dest });
            },
            Some(Identifier::Before) => {
                self.advance()?;
                let dest = self.required_container(true)?;
                let joined = Value::operator(Opcode::ConcatenateValues.id(), vec![value, dest.clone()]);
                body.push(Command::Put { value: joined, dest });
            },
            _ if self.at_statement_end() => {
                let end = self.mark();
                self.reset(start);
                let grammar = self.grammar;
                match self.parse_host_entity_with_table(grammar.host_commands())? {
                    Some(host) => body.push(Command::HostCommand(host)),
                    None => {
                        self.reset(end);
                        body.push(Command::Print(value));
                    },
                }
            },
            _ => {
                return Err(self.error(format!(
                    "Expected \"into\", \"before\" or \"after\" here, found {}.",
                    self.found(),
                )));
            },
        }
        Ok(())
    }

    /// `pass name ...` hands the message on and leaves the handler.
    fn pass(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        self.advance()?;
        let name = match self.peek() {
            Some(token) if token.is_word() => token.normalized_text().to_lowercase(),
            _ => return Err(self.error(format!("Expected a handler name here, found {}.", self.found()))),
        };
        self.advance()?;

        let is_command = self.scope.is_command;
        let params = if is_command {
            self.params_to_line_end()?
        } else if self.is(Identifier::OpenBracket) {
            self.bracketed_params()?
        } else {
            vec![]
        };
        body.push(Command::Return(Value::Call(Call { name, is_command, pass: true, params })));
        Ok(())
    }

    /// `exit repeat`, or `exit <handler>` which returns empty.
    fn exit(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        self.advance()?;
        if self.eat(Identifier::Repeat) {
            body.push(Command::ExitRepeat);
            return Ok(());
        }

        let leaves_handler = self.peek()
            .and_then(Token::identifier_text)
            .map_or(false, |text| {
                text.eq_ignore_ascii_case(&self.scope.user_name)
                    || text.eq_ignore_ascii_case(&self.last_handler)
            });
        if !leaves_handler {
            return Err(self.error(format!(
                "Expected \"repeat\" or \"{}\" here, found {}.",
                self.last_handler,
                self.found(),
            )));
        }
        self.advance()?;
        body.push(Command::Return(Value::string("")));
        Ok(())
    }

    /// `global a, b`.
    fn global(&mut self) -> ParseResult<()> {
        self.advance()?;
        loop {
            let name = match self.peek() {
                Some(token) if token.is_word() && !token.keyword().map_or(false, Identifier::is_reserved) => {
                    token.identifier_text().unwrap_or_default().to_string()
                },
                _ => return Err(self.error(format!("Expected a variable name here, found {}.", self.found()))),
            };
            self.advance()?;
            self.declare_global(&name);

            if !self.eat(Identifier::Comma) {
                return Ok(());
            }
        }
    }

    /// Host command templates first, then a call to a command handler.
    fn host_command_or_call(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        let grammar = self.grammar;
        if let Some(host) = self.parse_host_entity_with_table(grammar.host_commands())? {
            body.push(Command::HostCommand(host));
            return Ok(());
        }

        let token = self.current()?;
        if !token.is_word() || token.keyword().map_or(false, Identifier::is_reserved) {
            return Err(self.error(format!("Expected a command here, found {}.", self.found())));
        }
        let name = token.normalized_text().to_lowercase();
        self.advance()?;

        let params = self.params_to_line_end()?;
        body.push(call_for_result(&name, params));
        Ok(())
    }

    /// Comma-separated expressions up to the end of the statement.
    fn params_to_line_end(&mut self) -> ParseResult<Vec<Value>> {
        let mut params = vec![];
        if self.at_statement_end() {
            return Ok(params);
        }
        loop {
            params.push(self.required_expression()?);
            if !self.eat(Identifier::Comma) {
                return Ok(params);
            }
        }
    }

    // Blocks:

    /// Lines up to one starting with `end` (or `else`, if `stop_at_else`).
    /// The stopping keyword is left for the caller.
    fn block(&mut self, stop_at_else: bool) -> ParseResult<Vec<Command>> {
        let mut body = vec![];
        loop {
            self.skip_newlines();
            let token = self.current()?;
            if token.is(Identifier::End) || (stop_at_else && token.is(Identifier::Else)) {
                return Ok(body);
            }
            self.parse_one_line(&mut body, true)?;
        }
    }

    fn expect_end(&mut self, what: Identifier) -> ParseResult<()> {
        self.expect(Identifier::End)?;
        self.expect(what)
    }

    /// `if C then ...`, on one line or many.
    fn if_(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        self.advance()?;
        let condition = self.required_expression()?;
        self.skip_newlines();
        self.expect(Identifier::Then)?;

        let mut then = vec![];
        let mut otherwise = vec![];

        if self.at_line_end() {
            then = self.block(true)?;
            if self.is(Identifier::Else) {
                self.otherwise(&mut otherwise)?;
            } else {
                self.expect_end(Identifier::If)?;
            }
        } else {
            self.parse_one_line(&mut then, false)?;

            if self.is(Identifier::Else) {
                self.otherwise(&mut otherwise)?;
            } else if self.is_end_if() {
                self.index += 2;
            } else {
                let before_newlines = self.mark();
                self.skip_newlines();
                if self.is(Identifier::Else) {
                    self.otherwise(&mut otherwise)?;
                } else {
                    self.reset(before_newlines);
                }
            }
        }

        body.push(Command::If { condition, then, otherwise });
        Ok(())
    }

    /// The `else` part, with the cursor on `else`.
    fn otherwise(&mut self, otherwise: &mut Vec<Command>) -> ParseResult<()> {
        self.expect(Identifier::Else)?;
        if self.at_line_end() {
            *otherwise = self.block(false)?;
            return self.expect_end(Identifier::If);
        }

        self.parse_one_line(otherwise, false)?;
        if self.is_end_if() {
            self.index += 2;
        }
        Ok(())
    }

    fn is_end_if(&self) -> bool {
        self.is(Identifier::End) && self.peek_at(1).map_or(false, |t| t.is(Identifier::If))
    }

    /// Every form of `repeat` becomes a `While`, with whatever set-up
    /// the counting forms need placed before it.
    fn repeat(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        let line = self.line();
        self.advance()?;

        let mut loop_body = vec![];
        let mut step = vec![];

        let keyword = self.peek().and_then(Token::keyword);
        let condition = match keyword {
            _ if self.at_line_end() => Value::Boolean(true),
            Some(Identifier::Forever) => {
                self.advance()?;
                Value::Boolean(true)
            },
            Some(Identifier::While) => {
                self.advance()?;
                self.required_expression()?
            },
            Some(Identifier::Until) => {
                self.advance()?;
                let condition = self.required_expression()?;
                Value::operator(Opcode::NegateBool.id(), vec![condition])
            },
            Some(Identifier::With) => self.repeat_with(body, &mut loop_body, &mut step)?,
            Some(Identifier::For) if self.peek_at(1).map_or(false, |t| t.is(Identifier::Each)) => {
                self.repeat_for_each(body, &mut loop_body, &mut step)?
            },
            _ => {
                self.eat(Identifier::For);
                let counter = self.temporary();
                let times = self.required_expression()?;
                self.eat(Identifier::Times);

                // The count is evaluated again on every pass.
                let counter_value = Value::variable(&counter, &counter);
                body.push(Command::Assign { dest: counter, value: Value::integer(0) });
                step.push(Command::Arithmetic {
                    op: Arithmetic::Add,
                    dest: counter_value.clone(),
                    value: Value::integer(1),
                });
                Value::operator(Opcode::LessThan.id(), vec![counter_value, times])
            },
        };
        self.expect_line_end()?;

        let mut lines = self.block(false)?;
        loop_body.append(&mut lines);
        self.expect_end(Identifier::Repeat)?;

        body.push(Command::While { line, condition, body: loop_body, step });
        Ok(())
    }

    /// `with V = a [down] to b`. A hidden counter does the counting
    /// and is copied into `V` at the top of each pass, so `V` keeps
    /// the last value it was given once the loop is done.
    fn repeat_with(
        &mut self,
        before: &mut Vec<Command>,
        loop_body: &mut Vec<Command>,
        step: &mut Vec<Command>,
    ) -> ParseResult<Value> {
        self.advance()?;
        let (_, variable) = self.loop_variable()?;

        if !self.eat(Identifier::Equals) && !self.eat(Identifier::From) && !self.eat(Identifier::Is) {
            return Err(self.error(format!("Expected \"=\" here, found {}.", self.found())));
        }
        let first = self.required_expression()?;
        let down = self.eat(Identifier::Down);
        if !self.eat(Identifier::To) && !self.eat(Identifier::Through) {
            return Err(self.error(format!("Expected \"to\" or \"through\" here, found {}.", self.found())));
        }
        let last = self.required_expression()?;

        let counter = self.temporary();
        let counter_value = Value::variable(&counter, &counter);
        before.push(Command::Assign { dest: counter, value: first });
        loop_body.push(Command::Put { value: counter_value.clone(), dest: variable });

        let (compare, increment) = if down {
            (Opcode::GreaterThanEqual, -1)
        } else {
            (Opcode::LessThanEqual, 1)
        };
        step.push(Command::Arithmetic {
            op: Arithmetic::Add,
            dest: counter_value.clone(),
            value: Value::integer(increment),
        });
        Ok(Value::operator(compare.id(), vec![counter_value, last]))
    }

    /// `for each <chunk type> V of|in E` walks an array of the chunks.
    fn repeat_for_each(
        &mut self,
        before: &mut Vec<Command>,
        loop_body: &mut Vec<Command>,
        step: &mut Vec<Command>,
    ) -> ParseResult<Value> {
        self.index += 2;
        let kind = match self.peek().and_then(Token::keyword).and_then(ChunkType::from_identifier) {
            Some(kind) => kind,
            None => return Err(self.error(format!("Expected a chunk type here, found {}.", self.found()))),
        };
        self.advance()?;
        let (dest, _) = self.loop_variable()?;

        if !self.eat(Identifier::Of) && !self.eat(Identifier::In) {
            return Err(self.error(format!("Expected \"of\" or \"in\" here, found {}.", self.found())));
        }
        let chunks = self.required_expression()?;

        let array = self.temporary();
        let count = self.temporary();
        let counter = self.temporary();
        let array_value = Value::variable(&array, &array);
        let counter_value = Value::variable(&counter, &counter);

        before.push(Command::AssignChunkArray { dest: array.clone(), kind, value: chunks });
        before.push(Command::GetArrayItemCount { dest: count.clone(), array: array_value.clone() });
        before.push(Command::Assign { dest: counter.clone(), value: Value::integer(1) });

        loop_body.push(Command::GetArrayItem { dest, index: counter_value.clone(), array: array_value });
        step.push(Command::Arithmetic {
            op: Arithmetic::Add,
            dest: counter_value.clone(),
            value: Value::integer(1),
        });
        Ok(Value::operator(
            Opcode::LessThanEqual.id(),
            vec![counter_value, Value::variable(&count, &count)],
        ))
    }

    /// The counting variable of a loop, which is always a plain local.
    fn loop_variable(&mut self) -> ParseResult<(String, Value)> {
        let name = match self.peek() {
            Some(token) if token.is_word() && !token.keyword().map_or(false, Identifier::is_reserved) => {
                token.identifier_text().unwrap_or_default().to_string()
            },
            _ => return Err(self.error(format!("Expected a variable name here, found {}.", self.found()))),
        };
        self.advance()?;

        let key = variable_key(&name);
        if !self.scope.locals.contains(&key) {
            self.implicit_local(&name, false);
        }
        Ok((key.clone(), Value::Variable { key, name }))
    }

    /// `download E into C`, optionally followed by a
    /// `for each chunk` block and a `when done` block.
    fn download(&mut self, body: &mut Vec<Command>) -> ParseResult<()> {
        self.advance()?;
        let url = self.required_expression()?;
        if !self.eat(Identifier::Into) && !self.eat(Identifier::To) {
            return Err(self.error(format!("Expected \"into\" or \"to\" here, found {}.", self.found())));
        }
        let dest = self.required_container(true)?;

        let mut progress = String::new();
        let mut completion = String::new();

        let after_dest = self.mark();
        self.skip_newlines();
        let each_chunk = self.is(Identifier::For)
            && self.peek_at(1).map_or(false, |t| t.is(Identifier::Each))
            && self.peek_at(2).map_or(false, |t| t.is(Identifier::Chunk));
        if each_chunk {
            self.index += 3;
            progress = self.download_handler("::downloadProgress", true)?;
        } else {
            self.reset(after_dest);
        }

        let before_when = self.mark();
        self.skip_newlines();
        let when_done = self.is(Identifier::When) && self.peek_at(1).map_or(false, |t| t.is(Identifier::Done));
        if when_done {
            self.index += 2;
            completion = self.download_handler("::downloadCompletion", false)?;
        } else {
            self.reset(before_when);
        }

        body.push(Command::Download { url, dest, progress, completion });
        Ok(())
    }

    /// Parses a download block into a handler of its own
    /// and returns the handler's name.
    fn download_handler(&mut self, base: &str, stop_at_when: bool) -> ParseResult<String> {
        let name = self.tree.unique_identifier_based_on(base);
        let download = variable_key("download");

        let mut handler = self.new_handler(&name, true, self.line());
        handler.locals.declare(&download, VariableEntry::new("download").parameter());
        handler.body.push(Command::GetParam { dest: download, index: 0 });

        let outer = mem::replace(&mut self.scope, handler);
        let result = self.download_body(stop_at_when);
        let mut handler = mem::replace(&mut self.scope, outer);

        handler.end_line = result?;
        self.add_handler(handler);
        Ok(name)
    }

    /// Returns the line the block ends on.
    fn download_body(&mut self, stop_at_when: bool) -> ParseResult<usize> {
        let mut body = mem::take(&mut self.scope.body);

        let end_line = if self.at_line_end() {
            loop {
                self.skip_newlines();
                let token = self.current()?;
                if token.is(Identifier::End) || (stop_at_when && token.is(Identifier::When)) {
                    break;
                }
                self.parse_one_line(&mut body, true)?;
            }
            let end_line = self.line();
            if self.is(Identifier::End) {
                self.expect_end(Identifier::Download)?;
            }
            end_line
        } else {
            self.parse_one_line(&mut body, false)?;
            self.line()
        };

        self.scope.body = body;
        Ok(end_line)
    }
}

/// `name params` as a statement, whose value lands in `the result`.
fn call_for_result(name: &str, params: Vec<Value>) -> Command {
    Command::Assign {
        dest: variable_key("result"),
        value: Value::Call(Call { name: name.to_string(), is_command: true, pass: false, params }),
    }
}

#[cfg(test)]
mod test {
    use crate::common::{opcode::Opcode, source::Source};
    use crate::compiler::{grammar::GrammarConfig, parse::Parser, syntax::Diagnostic};
    use crate::construct::{
        parse_tree::ParseTree,
        tree::{Arithmetic, Call, ChunkType, Command, Value},
    };

    fn parse(source: &str) -> (ParseTree, Vec<Diagnostic>) {
        let grammar = GrammarConfig::default();
        Parser::new(Source::source(source), &grammar).parse().unwrap()
    }

    /// Body of `on go` with line markers dropped, at any depth.
    fn go(lines: &str) -> Vec<Command> {
        let (tree, diagnostics) = parse(&format!("on go\n{}\nend go\n", lines));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        strip(&tree.function("go").unwrap().body)
    }

    fn strip(commands: &[Command]) -> Vec<Command> {
        commands.iter()
            .filter(|c| !matches!(c, Command::LineMarker(_)))
            .map(|c| match c {
                Command::If { condition, then, otherwise } => Command::If {
                    condition: condition.clone(),
                    then: strip(then),
                    otherwise: strip(otherwise),
                },
                Command::While { line, condition, body, step } => Command::While {
                    line: *line,
                    condition: condition.clone(),
                    body: strip(body),
                    step: strip(step),
                },
                other => other.clone(),
            })
            .collect()
    }

    fn error(lines: &str) -> String {
        let (_, diagnostics) = parse(&format!("on go\n{}\nend go\n", lines));
        assert_eq!(diagnostics.len(), 1, "{:?}", diagnostics);
        diagnostics[0].message.clone()
    }

    fn var(name: &str) -> Value {
        Value::variable(&format!("var_{}", name), name)
    }

    fn temp(n: usize) -> Value {
        let key = format!("temp:{}", n);
        Value::variable(&key, &key)
    }

    fn print(n: i64) -> Command {
        Command::Print(Value::integer(n))
    }

    #[test]
    fn put_forms() {
        assert_eq!(go("put 1 after x\nput 2 before x\nput 3"), vec![
            Command::Put {
                value: Value::operator(Opcode::ConcatenateValues.id(), vec![var("x"), Value::integer(1)]),
                dest: var("x"),
            },
            Command::Put {
                value: Value::operator(Opcode::ConcatenateValues.id(), vec![Value::integer(2), var("x")]),
                dest: var("x"),
            },
            print(3),
        ]);
        assert_eq!(
            error("put 1 onto x"),
            "Expected \"into\", \"before\" or \"after\" here, found \"onto\".",
        );
    }

    #[test]
    fn get_set_and_arithmetic() {
        assert_eq!(go("get 5\nset y to it\nadd 1 to y\nsubtract 2 from y\nmultiply y with 3\ndivide y by 4"), vec![
            Command::Put { value: Value::integer(5), dest: var("it") },
            Command::Put { value: var("it"), dest: var("y") },
            Command::Arithmetic { op: Arithmetic::Add, dest: var("y"), value: Value::integer(1) },
            Command::Arithmetic { op: Arithmetic::Subtract, dest: var("y"), value: Value::integer(2) },
            Command::Arithmetic { op: Arithmetic::Multiply, dest: var("y"), value: Value::integer(3) },
            Command::Arithmetic { op: Arithmetic::Divide, dest: var("y"), value: Value::integer(4) },
        ]);
    }

    #[test]
    fn handler_calls() {
        assert_eq!(go("doThing 1, x\ndelete y"), vec![
            Command::Assign {
                dest: "var_result".into(),
                value: Value::Call(Call {
                    name: "dothing".into(),
                    is_command: true,
                    pass: false,
                    params: vec![Value::integer(1), var("x")],
                }),
            },
            Command::Assign {
                dest: "var_result".into(),
                value: Value::Call(Call { name: "delete".into(), is_command: true, pass: false, params: vec![var("y")] }),
            },
        ]);
        assert_eq!(error("then 1"), "Expected a command here, found \"then\".");
        assert_eq!(error("doThing 1 2"), "Expected end of line, found \"2\".");
    }

    #[test]
    fn returns_and_exits() {
        assert_eq!(go("return\nexit go\npass go 1"), vec![
            Command::Return(Value::string("")),
            Command::Return(Value::string("")),
            Command::Return(Value::Call(Call {
                name: "go".into(),
                is_command: true,
                pass: true,
                params: vec![Value::integer(1)],
            })),
        ]);
        assert_eq!(error("exit stop"), "Expected \"repeat\" or \"go\" here, found \"stop\".");
    }

    #[test]
    fn globals() {
        let (tree, diagnostics) = parse("on go\n  global a, b\n  put 1 into a\nend go\n");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(tree.globals().len(), 2);
        assert!(tree.function("go").unwrap().locals.get("var_a").unwrap().is_global);
    }

    #[test]
    fn one_line_if() {
        let expected = vec![Command::If {
            condition: Value::Boolean(true),
            then: vec![print(1)],
            otherwise: vec![print(2)],
        }];
        assert_eq!(go("if true then put 1 else put 2"), expected);
        assert_eq!(go("if true then put 1\nelse put 2"), expected);
        assert_eq!(go("if true\nthen put 1\nelse put 2 end if"), expected);
        assert_eq!(go("if true then put 1\nput 2"), vec![
            Command::If { condition: Value::Boolean(true), then: vec![print(1)], otherwise: vec![] },
            print(2),
        ]);
    }

    #[test]
    fn block_if() {
        assert_eq!(go("if true then\n  put 1\n  put 2\nelse\n  put 3\nend if"), vec![Command::If {
            condition: Value::Boolean(true),
            then: vec![print(1), print(2)],
            otherwise: vec![print(3)],
        }]);
        assert_eq!(go("if true then\n  put 1\nelse if false then\n  put 2\nend if"), vec![Command::If {
            condition: Value::Boolean(true),
            then: vec![print(1)],
            otherwise: vec![Command::If { condition: Value::Boolean(false), then: vec![print(2)], otherwise: vec![] }],
        }]);
        assert_eq!(error("if true then\n  put 1\nend repeat"), "Expected \"if\" here, found \"repeat\".");
    }

    #[test]
    fn repeat_forms() {
        match &go("repeat\n  exit repeat\nend repeat")[0] {
            Command::While { line, condition, body, step } => {
                assert_eq!(*line, 2);
                assert_eq!(condition, &Value::Boolean(true));
                assert_eq!(body, &vec![Command::ExitRepeat]);
                assert!(step.is_empty());
            },
            other => panic!("expected a loop, got {:?}", other),
        }

        match &go("repeat until x\n  next repeat\nend repeat")[0] {
            Command::While { condition, .. } => {
                assert_eq!(condition, &Value::operator(Opcode::NegateBool.id(), vec![var("x")]));
            },
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn repeat_times() {
        assert_eq!(go("repeat 3 times\n  put 1\nend repeat"), vec![
            Command::Assign { dest: "temp:1".into(), value: Value::integer(0) },
            Command::While {
                line: 2,
                condition: Value::operator(Opcode::LessThan.id(), vec![temp(1), Value::integer(3)]),
                body: vec![print(1)],
                step: vec![Command::Arithmetic { op: Arithmetic::Add, dest: temp(1), value: Value::integer(1) }],
            },
        ]);
    }

    #[test]
    fn repeat_times_rereads_the_count() {
        match &go("repeat for n\n  put 1\nend repeat")[1] {
            Command::While { condition, .. } => {
                assert_eq!(condition, &Value::operator(Opcode::LessThan.id(), vec![temp(1), var("n")]));
            },
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn repeat_with() {
        assert_eq!(go("repeat with i = 10 down to 1\n  put i\nend repeat"), vec![
            Command::Assign { dest: "temp:1".into(), value: Value::integer(10) },
            Command::While {
                line: 2,
                condition: Value::operator(Opcode::GreaterThanEqual.id(), vec![temp(1), Value::integer(1)]),
                body: vec![
                    Command::Put { value: temp(1), dest: var("i") },
                    Command::Print(var("i")),
                ],
                step: vec![Command::Arithmetic { op: Arithmetic::Add, dest: temp(1), value: Value::integer(-1) }],
            },
        ]);
    }

    #[test]
    fn repeat_with_rereads_the_limit() {
        match &go("repeat with i = 1 to last\n  put i\nend repeat")[1] {
            Command::While { condition, step, .. } => {
                assert_eq!(condition, &Value::operator(Opcode::LessThanEqual.id(), vec![temp(1), var("last")]));
                assert_eq!(step, &vec![Command::Arithmetic { op: Arithmetic::Add, dest: temp(1), value: Value::integer(1) }]);
            },
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn repeat_for_each() {
        let body = go("repeat for each word w of \"a b\"\n  put w\nend repeat");
        assert_eq!(&body[..3], &[
            Command::AssignChunkArray { dest: "temp:1".into(), kind: ChunkType::Word, value: Value::string("a b") },
            Command::GetArrayItemCount { dest: "temp:2".into(), array: temp(1) },
            Command::Assign { dest: "temp:3".into(), value: Value::integer(1) },
        ]);
        match &body[3] {
            Command::While { condition, body, step, .. } => {
                assert_eq!(condition, &Value::operator(Opcode::LessThanEqual.id(), vec![temp(3), temp(2)]));
                assert_eq!(body, &vec![
                    Command::GetArrayItem { dest: "var_w".into(), index: temp(3), array: temp(1) },
                    Command::Print(var("w")),
                ]);
                assert_eq!(step.len(), 1);
            },
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn download_blocks() {
        let source = "on go\n  download \"u\" into x\n  for each chunk\n    put the download\n  when done\n    beep\n  end download\nend go\n";
        let (tree, diagnostics) = parse(source);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);

        let body = strip(&tree.function("go").unwrap().body);
        let (progress, completion) = match &body[0] {
            Command::Download { url, dest, progress, completion } => {
                assert_eq!(url, &Value::string("u"));
                assert_eq!(dest, &var("x"));
                (progress.clone(), completion.clone())
            },
            other => panic!("expected a download, got {:?}", other),
        };
        assert!(progress.starts_with("::downloadProgress:"));
        assert!(completion.starts_with("::downloadCompletion:"));

        let progress = tree.function(&progress).unwrap();
        assert!(progress.is_command);
        assert!(progress.locals.get("var_download").unwrap().is_parameter);
        assert_eq!(strip(&progress.body), vec![
            Command::GetParam { dest: "var_download".into(), index: 0 },
            Command::Print(var("download")),
        ]);
        assert_eq!(tree.functions().len(), 3);
    }

    #[test]
    fn one_line_download() {
        let (tree, diagnostics) = parse("on go\n  download \"u\" into x when done put 1\nend go\n");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        match &strip(&tree.function("go").unwrap().body)[0] {
            Command::Download { progress, completion, .. } => {
                assert_eq!(progress, "");
                assert!(tree.function(completion).is_some());
            },
            other => panic!("expected a download, got {:?}", other),
        }
    }
}
