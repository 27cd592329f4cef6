//! Commands and functions the host describes as templates of slots,
//! like `visual effect <constant> [speed <expression>]`.
//!
//! A template is tried by walking its slots in order. Until a slot has
//! parsed a value, only words have been consumed, so a mismatch can back up
//! over them and let the next template with the same name have a go.
//! Once a value has been parsed the template is committed to.

use log::trace;

use crate::compiler::{
    grammar::{HostEntity, HostSlot, SlotKind},
    syntax::ParseResult,
};
use crate::construct::{
    token::{Subtype, Token},
    tree::{Operation, Value},
};

use super::Parser;

/// What a single slot made of the tokens at the cursor.
enum SlotMatch {
    Value(Value),
    Word(String),
    Missing,
}

/// Progress through one template.
struct Attempt {
    /// Words consumed so far, all of which can be given back.
    to_backtrack: usize,
    /// Set once a value has been parsed.
    frozen: bool,
    mode: char,
}

impl<'a> Parser<'a> {
    /// Tries every template named like the current token, in table order.
    /// `Ok(None)` leaves the cursor where it was.
    pub(super) fn parse_host_entity_with_table(&mut self, table: &[HostEntity]) -> ParseResult<Option<Operation>> {
        let subtype = match self.peek().and_then(Token::subtype) {
            Some(subtype @ Subtype::Keyword(_)) | Some(subtype @ Subtype::Host(_)) => subtype,
            _ => return Ok(None),
        };

        for entity in table.iter().filter(|entity| entity.name == subtype) {
            if let Some(operation) = self.host_template(entity)? {
                return Ok(Some(operation));
            }
        }
        Ok(None)
    }

    fn host_template(&mut self, entity: &HostEntity) -> ParseResult<Option<Operation>> {
        trace!("trying host template {:?} with {} slots", entity.name, entity.slots.len());
        self.advance()?;

        let mut instruction = entity.instruction;
        let mut param1 = entity.param1;
        let mut param2 = entity.param2;
        let mut operands = vec![];
        let mut attempt = Attempt { to_backtrack: 1, frozen: false, mode: '\0' };

        for slot in entity.slots.iter() {
            if slot.mode_required != '\0' && slot.mode_required != attempt.mode {
                continue;
            }

            match self.host_slot(slot, &mut attempt)? {
                SlotMatch::Value(value) => {
                    attempt.frozen = true;
                    operands.push(value);
                },
                SlotMatch::Word(text) => {
                    if slot.overriding.is_none() && slot.kind != SlotKind::InvisibleIdentifier {
                        operands.push(Value::String(text));
                    }
                },
                SlotMatch::Missing if slot.optional => {
                    if slot.overriding.is_none() && slot.kind != SlotKind::InvisibleIdentifier {
                        operands.push(Value::String(String::new()));
                    }
                    continue;
                },
                SlotMatch::Missing => {
                    let expected = self.expectation(slot);
                    return self.abandon(&attempt, &expected);
                },
            }

            if let Some(overriding) = slot.overriding {
                instruction = overriding.instruction;
                param1 = overriding.param1;
                param2 = overriding.param2;
            }
            if slot.mode_to_set != '\0' {
                attempt.mode = slot.mode_to_set;
            }
        }

        if entity.terminal_mode != '\0' && entity.terminal_mode != attempt.mode {
            let expected = entity.slots
                .iter()
                .find(|slot| slot.mode_to_set == entity.terminal_mode)
                .map(|slot| self.expectation(slot))
                .unwrap_or_else(|| "more".to_string());
            return self.abandon(&attempt, &expected);
        }

        trace!("matched host template {:?}", entity.name);
        Ok(Some(Operation::new(instruction, operands).with_params(param1, param2)))
    }

    /// Gives the consumed words back, or fails if a value was parsed.
    fn abandon(&mut self, attempt: &Attempt, expected: &str) -> ParseResult<Option<Operation>> {
        if attempt.frozen {
            return Err(self.error(format!("Expected {} here, found {}.", expected, self.found())));
        }
        for _ in 0..attempt.to_backtrack {
            self.retreat()?;
        }
        Ok(None)
    }

    fn host_slot(&mut self, slot: &HostSlot, attempt: &mut Attempt) -> ParseResult<SlotMatch> {
        match slot.kind {
            SlotKind::Identifier | SlotKind::InvisibleIdentifier => Ok(self.slot_word(slot, attempt)),
            SlotKind::ImmediateValue | SlotKind::Expression | SlotKind::Container | SlotKind::ConstantOrExpression => {
                self.slot_value(slot.kind)
            },
            SlotKind::LabeledValue | SlotKind::LabeledExpression | SlotKind::LabeledContainer => {
                if let SlotMatch::Missing = self.slot_word(slot, attempt) {
                    return Ok(SlotMatch::Missing);
                }
                match self.slot_value(slot.kind)? {
                    SlotMatch::Missing if attempt.frozen => {
                        let expected = self.expectation(slot);
                        Err(self.error(format!("Expected {} here, found {}.", expected, self.found())))
                    },
                    SlotMatch::Missing => {
                        self.retreat()?;
                        attempt.to_backtrack -= 1;
                        Ok(SlotMatch::Missing)
                    },
                    found => Ok(found),
                }
            },
        }
    }

    fn slot_word(&mut self, slot: &HostSlot, attempt: &mut Attempt) -> SlotMatch {
        let text = match self.peek() {
            Some(token) if token.matches(slot.word) => token.normalized_text(),
            _ => return SlotMatch::Missing,
        };
        self.index += 1;
        attempt.to_backtrack += 1;
        SlotMatch::Word(text)
    }

    fn slot_value(&mut self, kind: SlotKind) -> ParseResult<SlotMatch> {
        let value = match kind {
            SlotKind::ImmediateValue | SlotKind::LabeledValue => self.parse_term()?,
            SlotKind::Container | SlotKind::LabeledContainer => self.parse_container(true)?,
            SlotKind::ConstantOrExpression => match self.parse_constant() {
                Some(constant) => Some(constant),
                None => self.parse_expression()?,
            },
            _ => self.parse_expression()?,
        };
        Ok(value.map_or(SlotMatch::Missing, SlotMatch::Value))
    }

    /// How a missing slot is described in an error.
    fn expectation(&self, slot: &HostSlot) -> String {
        match slot.kind {
            SlotKind::Identifier | SlotKind::InvisibleIdentifier => self.word_text(slot.word),
            SlotKind::ImmediateValue | SlotKind::LabeledValue => "a term".to_string(),
            SlotKind::Container | SlotKind::LabeledContainer => "a container".to_string(),
            _ => "an expression".to_string(),
        }
    }

    fn word_text(&self, word: Subtype) -> String {
        match word {
            Subtype::Keyword(identifier) => format!("\"{}\"", identifier.text()),
            Subtype::Host(host) => match self.grammar.host_word_text(host) {
                Some(text) => format!("\"{}\"", text),
                None => "a word".to_string(),
            },
            Subtype::UserDefined => "a word".to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::common::{opcode::{Opcode, FIRST_HOST_INSTRUCTION}, source::Source};
    use crate::compiler::{
        grammar::{GrammarConfig, HostEntity, HostSlot, SlotKind},
        parse::{Parser, RUN_HANDLER},
        syntax::Diagnostic,
    };
    use crate::construct::{
        token::{Identifier, Subtype},
        tree::{Call, Command, Operation, Value},
    };

    /// `go [to] card <expression>`, `go back`,
    /// `show <container> [at <expression>]` and `beep <term> [times <term>]`.
    fn grammar() -> GrammarConfig {
        let mut grammar = GrammarConfig::default();
        let go = grammar.add_word("go");
        let card = grammar.add_word("card");
        let back = grammar.add_word("back");
        let show = grammar.add_word("show");
        let at = grammar.add_word("at");
        let beep = grammar.add_word("beep");
        let times = Subtype::Keyword(Identifier::Times);
        let to = Subtype::Keyword(Identifier::To);

        grammar.add_host_commands_and_offset(vec![
            HostEntity::new(go, 0, vec![
                HostSlot::new(SlotKind::InvisibleIdentifier, to).optional(),
                HostSlot::new(SlotKind::InvisibleIdentifier, card),
                HostSlot::new(SlotKind::Expression, Subtype::UserDefined),
            ]),
            HostEntity::new(go, 0, vec![
                HostSlot::new(SlotKind::Identifier, back).overriding(1, 0, 0),
            ]),
            HostEntity::new(show, 2, vec![
                HostSlot::new(SlotKind::Container, Subtype::UserDefined),
                HostSlot::new(SlotKind::LabeledExpression, at).optional(),
            ]),
            HostEntity::new(beep, 3, vec![
                HostSlot::new(SlotKind::ImmediateValue, Subtype::UserDefined),
                HostSlot::new(SlotKind::LabeledValue, times).optional(),
            ]),
        ], FIRST_HOST_INSTRUCTION).unwrap();
        grammar
    }

    fn run(source: &str) -> (Vec<Command>, Vec<Diagnostic>) {
        let grammar = grammar();
        let (tree, diagnostics) = Parser::new(Source::source(source), &grammar)
            .parse_command_or_expression()
            .unwrap();
        let body = tree.function(RUN_HANDLER)
            .map(|f| f.body.iter().filter(|c| !matches!(c, Command::LineMarker(_))).cloned().collect())
            .unwrap_or_default();
        (body, diagnostics)
    }

    fn host(instruction: u16, operands: Vec<Value>) -> Command {
        Command::HostCommand(Operation::new(FIRST_HOST_INSTRUCTION + instruction, operands))
    }

    #[test]
    fn invisible_words_push_nothing() {
        let (body, diagnostics) = run("go to card 3");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(body, vec![host(0, vec![Value::integer(3)])]);

        let (body, _) = run("go card 3");
        assert_eq!(body, vec![host(0, vec![Value::integer(3)])]);
    }

    #[test]
    fn backtracks_to_next_template() {
        let (body, diagnostics) = run("go back");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(body, vec![host(1, vec![])]);
    }

    #[test]
    fn optional_labels_push_empty() {
        let (body, _) = run("show x");
        assert_eq!(body, vec![host(2, vec![Value::variable("var_x", "x"), Value::string("")])]);

        let (body, _) = run("show x at 4");
        assert_eq!(body, vec![host(2, vec![Value::variable("var_x", "x"), Value::integer(4)])]);
    }

    #[test]
    fn committed_template_fails() {
        let (_, diagnostics) = run("show x at");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Expected an expression here, found end of script.");
    }

    #[test]
    fn value_slots_take_terms() {
        let (body, diagnostics) = run("put 4 into y\nbeep y times (y + 1)");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(body[1], host(3, vec![
            Value::variable("var_y", "y"),
            Value::operator(Opcode::Add.id(), vec![Value::variable("var_y", "y"), Value::integer(1)]),
        ]));

        let (_, diagnostics) = run("beep 2 + 3");
        assert_eq!(diagnostics[0].message, "Expected end of line, found \"+\".");
    }

    #[test]
    fn no_template_is_a_handler_call() {
        let (body, diagnostics) = run("go home");
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(body, vec![Command::Assign {
            dest: "var_result".into(),
            value: Value::Call(Call {
                name: "go".into(),
                is_command: true,
                pass: false,
                params: vec![Value::variable("var_home", "home")],
            }),
        }]);
    }
}
