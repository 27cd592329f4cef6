//! The tables that drive the parser.
//! A `GrammarConfig` starts out with the built-in language
//! and is extended by the host before any script is parsed,
//! either in code through the `add_*_and_offset` operations
//! or from a TOML `HostExtension`.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::Deserialize;

use crate::common::opcode::{InstructionId, Opcode, BACK_OF_STACK};
use crate::compiler::syntax::ConfigError;
use crate::construct::{
    token::{HostWord, Identifier, Subtype},
    tree::Value,
};

/// A binary operator. `second` makes it a two-token operator like `<>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub first: Subtype,
    pub second: Option<Subtype>,
    pub precedence: u32,
    pub instruction: InstructionId,
}

/// A prefix or postfix operator spelled as a run of words,
/// like `not` or `is a number`.
#[derive(Debug, Clone, PartialEq)]
pub struct WordOperator {
    pub words: Vec<Subtype>,
    pub instruction: InstructionId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalProperty {
    pub name: Subtype,
    /// `long`, `short` or `abbreviated`.
    pub qualifier: Option<Subtype>,
    pub setter: Option<InstructionId>,
    pub getter: Option<InstructionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinFunction {
    pub name: Subtype,
    pub instruction: InstructionId,
    pub param1: u16,
    pub param2: u32,
}

/// A word that always refers to the same local, like `the result`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinVariable {
    pub name: Subtype,
    pub variable: String,
}

/// One to three words that stand for a constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub words: Vec<Subtype>,
    pub value: Value,
}

/// What a slot of a host command or function template accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    ImmediateValue,
    Expression,
    Container,
    Identifier,
    /// Like `Identifier`, but never pushes anything.
    InvisibleIdentifier,
    LabeledValue,
    LabeledExpression,
    LabeledContainer,
    ConstantOrExpression,
}

/// An instruction a matched slot substitutes for its template's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overriding {
    pub instruction: InstructionId,
    pub param1: u16,
    pub param2: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostSlot {
    pub kind: SlotKind,
    /// The identifier or label. `UserDefined` accepts any word.
    pub word: Subtype,
    pub optional: bool,
    pub overriding: Option<Overriding>,
    /// `'\0'` means the slot is always active.
    pub mode_required: char,
    /// `'\0'` leaves the mode as it is.
    pub mode_to_set: char,
}

impl HostSlot {
    pub fn new(kind: SlotKind, word: Subtype) -> HostSlot {
        HostSlot {
            kind,
            word,
            optional: false,
            overriding: None,
            mode_required: '\0',
            mode_to_set: '\0',
        }
    }

    pub fn optional(mut self) -> HostSlot {
        self.optional = true;
        self
    }

    pub fn overriding(mut self, instruction: InstructionId, param1: u16, param2: u32) -> HostSlot {
        self.overriding = Some(Overriding { instruction, param1, param2 });
        self
    }

    pub fn requires_mode(mut self, mode: char) -> HostSlot {
        self.mode_required = mode;
        self
    }

    pub fn sets_mode(mut self, mode: char) -> HostSlot {
        self.mode_to_set = mode;
        self
    }
}

/// A host command or host function template.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEntity {
    pub name: Subtype,
    pub instruction: InstructionId,
    pub param1: u16,
    pub param2: u32,
    /// The mode a match must end in, `'\0'` for any.
    pub terminal_mode: char,
    pub slots: Vec<HostSlot>,
}

impl HostEntity {
    pub fn new(name: Subtype, instruction: InstructionId, slots: Vec<HostSlot>) -> HostEntity {
        HostEntity {
            name,
            instruction,
            param1: 0,
            param2: 0,
            terminal_mode: '\0',
            slots,
        }
    }

    pub fn terminal_mode(mut self, mode: char) -> HostEntity {
        self.terminal_mode = mode;
        self
    }
}

/// The built-in grammar merged with whatever the host registered.
/// Built once at start-up and passed by reference to the lexer and parser.
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    words: HashMap<String, Subtype>,
    host_words: Vec<String>,
    operators: Vec<Operator>,
    unary_operators: Vec<WordOperator>,
    postfix_operators: Vec<WordOperator>,
    global_properties: Vec<GlobalProperty>,
    builtin_functions: Vec<BuiltinFunction>,
    builtin_variables: Vec<BuiltinVariable>,
    constants: Vec<Constant>,
    host_commands: Vec<HostEntity>,
    host_functions: Vec<HostEntity>,
}

fn offset(id: InstructionId, base: InstructionId) -> Result<InstructionId, ConfigError> {
    id.checked_add(base).ok_or(ConfigError::InstructionOverflow {
        id: id as u32,
        base: base as u32,
    })
}

impl GrammarConfig {
    /// Keywords only, all tables empty.
    pub fn bare() -> GrammarConfig {
        let mut words = HashMap::new();
        for identifier in Identifier::ALL {
            words.insert(identifier.text().to_lowercase(), Subtype::Keyword(*identifier));
            for synonym in identifier.synonyms() {
                words.insert(synonym.to_lowercase(), Subtype::Keyword(*identifier));
            }
        }

        GrammarConfig {
            words,
            host_words: vec![],
            operators: vec![],
            unary_operators: vec![],
            postfix_operators: vec![],
            global_properties: vec![],
            builtin_functions: vec![],
            builtin_variables: vec![],
            constants: vec![],
            host_commands: vec![],
            host_functions: vec![],
        }
    }

    /// Resolves an identifier's text, case-insensitively.
    pub fn lookup(&self, text: &str) -> Subtype {
        self.words
            .get(&text.to_lowercase())
            .copied()
            .unwrap_or(Subtype::UserDefined)
    }

    /// Registers a word for host tables to refer to.
    /// Words that already mean something resolve to that meaning.
    pub fn add_word(&mut self, text: &str) -> Subtype {
        let key = text.to_lowercase();
        if let Some(existing) = self.words.get(&key) {
            return *existing;
        }

        let word = Subtype::Host(HostWord(self.host_words.len() as u16));
        self.host_words.push(text.to_string());
        self.words.insert(key, word);
        word
    }

    /// Makes `synonym` lex as `word`, which must already be known.
    pub fn add_synonym(&mut self, synonym: &str, word: &str) -> Result<Subtype, ConfigError> {
        let resolved = self.known_word(word)?;
        self.words.insert(synonym.to_lowercase(), resolved);
        Ok(resolved)
    }

    /// Text a host word was registered with.
    pub fn host_word_text(&self, word: HostWord) -> Option<&str> {
        self.host_words.get(word.0 as usize).map(String::as_str)
    }

    fn known_word(&self, text: &str) -> Result<Subtype, ConfigError> {
        match self.lookup(text) {
            Subtype::UserDefined => Err(ConfigError::UnknownWord(text.to_string())),
            word => Ok(word),
        }
    }

    pub fn add_operators_and_offset(&mut self, entries: Vec<Operator>, base: InstructionId) -> Result<(), ConfigError> {
        for mut entry in entries {
            entry.instruction = offset(entry.instruction, base)?;
            self.operators.push(entry);
        }
        Ok(())
    }

    pub fn add_unary_operators_and_offset(&mut self, entries: Vec<WordOperator>, base: InstructionId) -> Result<(), ConfigError> {
        for mut entry in entries {
            entry.instruction = offset(entry.instruction, base)?;
            self.unary_operators.push(entry);
        }
        Ok(())
    }

    pub fn add_postfix_operators_and_offset(&mut self, entries: Vec<WordOperator>, base: InstructionId) -> Result<(), ConfigError> {
        for mut entry in entries {
            entry.instruction = offset(entry.instruction, base)?;
            self.postfix_operators.push(entry);
        }
        Ok(())
    }

    pub fn add_global_properties_and_offset(&mut self, entries: Vec<GlobalProperty>, base: InstructionId) -> Result<(), ConfigError> {
        for mut entry in entries {
            entry.setter = entry.setter.map(|id| offset(id, base)).transpose()?;
            entry.getter = entry.getter.map(|id| offset(id, base)).transpose()?;
            self.global_properties.push(entry);
        }
        Ok(())
    }

    pub fn add_builtin_functions_and_offset(&mut self, entries: Vec<BuiltinFunction>, base: InstructionId) -> Result<(), ConfigError> {
        for mut entry in entries {
            entry.instruction = offset(entry.instruction, base)?;
            self.builtin_functions.push(entry);
        }
        Ok(())
    }

    pub fn add_builtin_variables(&mut self, entries: Vec<BuiltinVariable>) {
        self.builtin_variables.extend(entries);
    }

    pub fn add_constants(&mut self, entries: Vec<Constant>) -> Result<(), ConfigError> {
        for entry in entries {
            if entry.words.is_empty() || entry.words.len() > 3 {
                return Err(ConfigError::ConstantLength(entry.words.len()));
            }
            self.constants.push(entry);
        }
        Ok(())
    }

    pub fn add_host_commands_and_offset(&mut self, entries: Vec<HostEntity>, base: InstructionId) -> Result<(), ConfigError> {
        for entry in entries {
            let entry = GrammarConfig::offset_entity(entry, base)?;
            self.host_commands.push(entry);
        }
        Ok(())
    }

    pub fn add_host_functions_and_offset(&mut self, entries: Vec<HostEntity>, base: InstructionId) -> Result<(), ConfigError> {
        for entry in entries {
            let entry = GrammarConfig::offset_entity(entry, base)?;
            self.host_functions.push(entry);
        }
        Ok(())
    }

    fn offset_entity(mut entry: HostEntity, base: InstructionId) -> Result<HostEntity, ConfigError> {
        entry.instruction = offset(entry.instruction, base)?;
        for slot in entry.slots.iter_mut() {
            if let Some(overriding) = slot.overriding.as_mut() {
                overriding.instruction = offset(overriding.instruction, base)?;
            }
        }
        Ok(entry)
    }

    pub fn operators(&self) -> &[Operator] { &self.operators }
    pub fn unary_operators(&self) -> &[WordOperator] { &self.unary_operators }
    pub fn postfix_operators(&self) -> &[WordOperator] { &self.postfix_operators }
    pub fn global_properties(&self) -> &[GlobalProperty] { &self.global_properties }
    pub fn builtin_functions(&self) -> &[BuiltinFunction] { &self.builtin_functions }
    pub fn builtin_variables(&self) -> &[BuiltinVariable] { &self.builtin_variables }
    pub fn constants(&self) -> &[Constant] { &self.constants }
    pub fn host_commands(&self) -> &[HostEntity] { &self.host_commands }
    pub fn host_functions(&self) -> &[HostEntity] { &self.host_functions }

    /// Merges a deserialized extension into the tables.
    /// Words are registered first, so every table may refer to them.
    pub fn extend(&mut self, extension: &HostExtension, base: InstructionId) -> Result<(), ConfigError> {
        debug!("extending grammar, instructions from {}", base);

        for word in extension.words.iter() {
            self.add_word(word);
        }
        for (synonym, word) in extension.synonyms.iter() {
            self.add_synonym(synonym, word)?;
        }

        let operators = extension.operators.iter()
            .map(|spec| -> Result<Operator, ConfigError> { Ok(Operator {
                first: self.known_word(&spec.first)?,
                second: spec.second.as_deref().map(|w| self.known_word(w)).transpose()?,
                precedence: spec.precedence,
                instruction: spec.instruction,
            }) })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        self.add_operators_and_offset(operators, base)?;

        let unary = self.word_operators(&extension.unary_operators)?;
        self.add_unary_operators_and_offset(unary, base)?;
        let postfix = self.word_operators(&extension.postfix_operators)?;
        self.add_postfix_operators_and_offset(postfix, base)?;

        let properties = extension.global_properties.iter()
            .map(|spec| -> Result<GlobalProperty, ConfigError> { Ok(GlobalProperty {
                name: self.known_word(&spec.name)?,
                qualifier: spec.qualifier.as_deref().map(|w| self.known_word(w)).transpose()?,
                setter: spec.setter,
                getter: spec.getter,
            }) })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        self.add_global_properties_and_offset(properties, base)?;

        let functions = extension.functions.iter()
            .map(|spec| -> Result<BuiltinFunction, ConfigError> { Ok(BuiltinFunction {
                name: self.known_word(&spec.name)?,
                instruction: spec.instruction,
                param1: spec.param1,
                param2: spec.param2,
            }) })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        self.add_builtin_functions_and_offset(functions, base)?;

        let variables = extension.variables.iter()
            .map(|spec| -> Result<BuiltinVariable, ConfigError> { Ok(BuiltinVariable {
                name: self.known_word(&spec.name)?,
                variable: spec.variable.clone(),
            }) })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        self.add_builtin_variables(variables);

        let constants = extension.constants.iter()
            .map(|spec| -> Result<Constant, ConfigError> { Ok(Constant {
                words: self.words_of(&spec.words)?,
                value: spec.value.to_value(),
            }) })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        self.add_constants(constants)?;

        let commands = self.host_entities(&extension.commands)?;
        self.add_host_commands_and_offset(commands, base)?;
        let functions = self.host_entities(&extension.host_functions)?;
        self.add_host_functions_and_offset(functions, base)?;

        Ok(())
    }

    /// Parses a TOML extension and merges it in one go.
    pub fn extend_from_toml(&mut self, source: &str, base: InstructionId) -> Result<(), ConfigError> {
        let extension = HostExtension::parse(source)?;
        self.extend(&extension, base)
    }

    fn words_of(&self, words: &[String]) -> Result<Vec<Subtype>, ConfigError> {
        words.iter().map(|w| self.known_word(w)).collect()
    }

    fn word_operators(&self, specs: &[WordOperatorSpec]) -> Result<Vec<WordOperator>, ConfigError> {
        specs.iter()
            .map(|spec| -> Result<WordOperator, ConfigError> { Ok(WordOperator {
                words: self.words_of(&spec.words)?,
                instruction: spec.instruction,
            }) })
            .collect()
    }

    fn host_entities(&self, specs: &[HostEntitySpec]) -> Result<Vec<HostEntity>, ConfigError> {
        specs.iter()
            .map(|spec| -> Result<HostEntity, ConfigError> {
                let slots = spec.slots.iter()
                    .map(|slot| -> Result<HostSlot, ConfigError> { Ok(HostSlot {
                        kind: slot.kind,
                        word: match &slot.word {
                            Some(word) => self.known_word(word)?,
                            None => Subtype::UserDefined,
                        },
                        optional: slot.optional,
                        overriding: slot.instruction.map(|instruction| Overriding {
                            instruction,
                            param1: slot.param1,
                            param2: slot.param2,
                        }),
                        mode_required: mode(&slot.mode_required)?,
                        mode_to_set: mode(&slot.mode_to_set)?,
                    }) })
                    .collect::<Result<Vec<_>, ConfigError>>()?;

                Ok(HostEntity {
                    name: self.known_word(&spec.name)?,
                    instruction: spec.instruction,
                    param1: spec.param1,
                    param2: spec.param2,
                    terminal_mode: mode(&spec.terminal_mode)?,
                    slots,
                })
            })
            .collect()
    }
}

fn mode(text: &str) -> Result<char, ConfigError> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok('\0'),
        (Some(c), None) => Ok(c),
        _ => Err(ConfigError::BadMode(text.to_string())),
    }
}

fn op(first: Identifier, second: Option<Identifier>, precedence: u32, instruction: Opcode) -> Operator {
    Operator {
        first: first.into(),
        second: second.map(Subtype::from),
        precedence,
        instruction: instruction.id(),
    }
}

fn words(identifiers: &[Identifier]) -> Vec<Subtype> {
    identifiers.iter().map(|i| Subtype::from(*i)).collect()
}

fn constant(identifiers: &[Identifier], value: Value) -> Constant {
    Constant { words: words(identifiers), value }
}

impl Default for GrammarConfig {
    /// The built-in language.
    fn default() -> GrammarConfig {
        use Identifier::*;
        let mut grammar = GrammarConfig::bare();

        // two-token operators come before their one-token prefixes
        grammar.operators = vec![
            op(And,         None,              100,  Opcode::And),
            op(Or,          None,              100,  Opcode::Or),
            op(LessThan,    Some(GreaterThan), 200,  Opcode::NotEqual),
            op(LessThan,    Some(Equals),      200,  Opcode::LessThanEqual),
            op(LessThan,    None,              200,  Opcode::LessThan),
            op(GreaterThan, Some(Equals),      200,  Opcode::GreaterThanEqual),
            op(GreaterThan, None,              200,  Opcode::GreaterThan),
            op(Equals,      None,              200,  Opcode::Equal),
            op(Is,          Some(Not),         200,  Opcode::NotEqual),
            op(Is,          None,              200,  Opcode::Equal),
            op(Ampersand,   Some(Ampersand),   300,  Opcode::ConcatenateValuesWithSpace),
            op(Ampersand,   None,              300,  Opcode::ConcatenateValues),
            op(Plus,        None,              500,  Opcode::Add),
            op(Minus,       None,              500,  Opcode::Subtract),
            op(Asterisk,    None,              1000, Opcode::Multiply),
            op(Slash,       None,              1000, Opcode::Divide),
            op(Mod,         None,              1000, Opcode::Modulo),
            op(Caret,       None,              1100, Opcode::Power),
        ];

        grammar.unary_operators = vec![
            WordOperator { words: words(&[Not]), instruction: Opcode::NegateBool.id() },
            WordOperator { words: words(&[Minus]), instruction: Opcode::NegateNumber.id() },
        ];

        grammar.postfix_operators = vec![
            WordOperator { words: words(&[Is, Unset]), instruction: Opcode::IsUnset.id() },
            WordOperator { words: words(&[Is, A, Number]), instruction: Opcode::IsNumber.id() },
            WordOperator { words: words(&[Is, An, Integer]), instruction: Opcode::IsInteger.id() },
            WordOperator { words: words(&[Is, An, Array]), instruction: Opcode::IsArray.id() },
        ];

        grammar.global_properties = vec![
            GlobalProperty {
                name: ItemDelimiter.into(),
                qualifier: None,
                setter: Some(Opcode::SetItemDelimiter.id()),
                getter: Some(Opcode::PushItemDelimiter.id()),
            },
        ];

        grammar.builtin_functions = vec![
            BuiltinFunction {
                name: ParamCount.into(),
                instruction: Opcode::ParameterCount.id(),
                param1: BACK_OF_STACK,
                param2: 0,
            },
            BuiltinFunction {
                name: Parameters.into(),
                instruction: Opcode::PushParameters.id(),
                param1: 0,
                param2: 0,
            },
        ];

        grammar.builtin_variables = vec![
            BuiltinVariable { name: Result.into(), variable: "result".to_string() },
            BuiltinVariable { name: Download.into(), variable: "download".to_string() },
        ];

        let text = |s: &str| Value::String(s.to_string());
        grammar.constants = vec![
            constant(&[True], Value::Boolean(true)),
            constant(&[False], Value::Boolean(false)),
            constant(&[Empty], text("")),
            constant(&[CommaWord], text(",")),
            constant(&[ColonWord], text(":")),
            constant(&[Cr], text("\r")),
            constant(&[Linefeed], text("\n")),
            constant(&[Null], text("")),
            constant(&[Quote], text("\"")),
            constant(&[Return], text("\r")),
            constant(&[Space], text(" ")),
            constant(&[Tab], text("\t")),
            constant(&[Pi], Value::float(std::f64::consts::PI)),
            constant(&[Barn, Door, Open], text("barn door open")),
            constant(&[Barn, Door, Close], text("barn door close")),
            constant(&[Iris, Open], text("iris open")),
            constant(&[Iris, Close], text("iris close")),
            constant(&[Push, Up], text("push up")),
            constant(&[Push, Down], text("push down")),
            constant(&[Push, Left], text("push left")),
            constant(&[Push, Right], text("push right")),
            constant(&[Scroll, Up], text("scroll up")),
            constant(&[Scroll, Down], text("scroll down")),
            constant(&[Scroll, Left], text("scroll left")),
            constant(&[Scroll, Right], text("scroll right")),
            constant(&[Shrink, To, Top], text("shrink to top")),
            constant(&[Shrink, To, Center], text("shrink to center")),
            constant(&[Shrink, To, Bottom], text("shrink to bottom")),
            constant(&[Stretch, From, Top], text("stretch from top")),
            constant(&[Stretch, From, Center], text("stretch from center")),
            constant(&[Stretch, From, Bottom], text("stretch from bottom")),
            constant(&[Venetian, Blinds], text("venetian blinds")),
            constant(&[Wipe, Up], text("wipe up")),
            constant(&[Wipe, Down], text("wipe down")),
            constant(&[Wipe, Left], text("wipe left")),
            constant(&[Wipe, Right], text("wipe right")),
            constant(&[Zoom, Close], text("zoom close")),
            constant(&[Zoom, In], text("zoom in")),
            constant(&[Zoom, Open], text("zoom open")),
            constant(&[Zoom, Out], text("zoom out")),
        ];

        grammar
    }
}

/// A host's grammar additions, as read from TOML.
/// Instruction ids are relative; `GrammarConfig::extend` adds the base.
/// ```toml
/// words = ["beep", "card", "field"]
///
/// [synonyms]
/// fld = "field"
///
/// [[commands]]
/// name = "beep"
/// instruction = 0
///
///   [[commands.slots]]
///   kind = "expression"
///   optional = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostExtension {
    pub words: Vec<String>,
    pub synonyms: BTreeMap<String, String>,
    pub operators: Vec<OperatorSpec>,
    pub unary_operators: Vec<WordOperatorSpec>,
    pub postfix_operators: Vec<WordOperatorSpec>,
    pub global_properties: Vec<GlobalPropertySpec>,
    pub functions: Vec<FunctionSpec>,
    pub variables: Vec<VariableSpec>,
    pub constants: Vec<ConstantSpec>,
    pub commands: Vec<HostEntitySpec>,
    pub host_functions: Vec<HostEntitySpec>,
}

impl HostExtension {
    pub fn parse(source: &str) -> Result<HostExtension, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorSpec {
    pub first: String,
    pub second: Option<String>,
    pub precedence: u32,
    pub instruction: InstructionId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WordOperatorSpec {
    pub words: Vec<String>,
    pub instruction: InstructionId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalPropertySpec {
    pub name: String,
    pub qualifier: Option<String>,
    pub setter: Option<InstructionId>,
    pub getter: Option<InstructionId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSpec {
    pub name: String,
    pub instruction: InstructionId,
    #[serde(default)]
    pub param1: u16,
    #[serde(default)]
    pub param2: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableSpec {
    pub name: String,
    pub variable: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantSpec {
    pub words: Vec<String>,
    pub value: ConstantLiteral,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConstantLiteral {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConstantLiteral {
    fn to_value(&self) -> Value {
        match self {
            ConstantLiteral::Boolean(b) => Value::Boolean(*b),
            ConstantLiteral::Integer(i) => Value::integer(*i),
            ConstantLiteral::Float(f) => Value::float(*f),
            ConstantLiteral::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostEntitySpec {
    pub name: String,
    pub instruction: InstructionId,
    #[serde(default)]
    pub param1: u16,
    #[serde(default)]
    pub param2: u32,
    #[serde(default)]
    pub terminal_mode: String,
    #[serde(default)]
    pub slots: Vec<SlotSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    pub kind: SlotKind,
    pub word: Option<String>,
    #[serde(default)]
    pub optional: bool,
    pub instruction: Option<InstructionId>,
    #[serde(default)]
    pub param1: u16,
    #[serde(default)]
    pub param2: u32,
    #[serde(default)]
    pub mode_required: String,
    #[serde(default)]
    pub mode_to_set: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::opcode::FIRST_HOST_INSTRUCTION;

    #[test]
    fn synonyms_fold() {
        let grammar = GrammarConfig::default();
        assert_eq!(grammar.lookup("THRU"), grammar.lookup("through"));
        assert_eq!(grammar.lookup("itemDel"), Subtype::Keyword(Identifier::ItemDelimiter));
        assert_eq!(grammar.lookup("abbrev"), Subtype::Keyword(Identifier::Abbreviated));
        assert_eq!(grammar.lookup("frobnicate"), Subtype::UserDefined);
    }

    #[test]
    fn two_token_operators_first() {
        let grammar = GrammarConfig::default();
        let less = Subtype::Keyword(Identifier::LessThan);
        let position = |second: Option<Subtype>| grammar.operators()
            .iter()
            .position(|o| o.first == less && o.second == second);

        assert!(position(Some(Identifier::GreaterThan.into())) < position(None));
        assert!(position(Some(Identifier::Equals.into())) < position(None));
    }

    #[test]
    fn host_words() {
        let mut grammar = GrammarConfig::bare();
        let card = grammar.add_word("card");
        assert_eq!(card, Subtype::Host(HostWord(0)));
        assert_eq!(grammar.add_word("Card"), card);
        assert_eq!(grammar.add_word("put"), Subtype::Keyword(Identifier::Put));
        assert_eq!(grammar.add_synonym("cd", "card").ok(), Some(card));
        assert_eq!(grammar.lookup("CD"), card);
        assert!(grammar.add_synonym("x", "nothing").is_err());
    }

    #[test]
    fn offsets() {
        let mut grammar = GrammarConfig::bare();
        let beep = grammar.add_word("beep");
        let entity = HostEntity::new(beep, 2, vec![
            HostSlot::new(SlotKind::Expression, Subtype::UserDefined).overriding(3, 0, 0),
        ]);
        grammar.add_host_commands_and_offset(vec![entity], FIRST_HOST_INSTRUCTION).unwrap();

        let added = &grammar.host_commands()[0];
        assert_eq!(added.instruction, FIRST_HOST_INSTRUCTION + 2);
        assert_eq!(added.slots[0].overriding.unwrap().instruction, FIRST_HOST_INSTRUCTION + 3);
        assert!(grammar.add_builtin_functions_and_offset(vec![BuiltinFunction {
            name: beep, instruction: u16::MAX, param1: 0, param2: 0,
        }], 1).is_err());
    }

    #[test]
    fn toml_extension() {
        let source = r#"
            words = ["beep", "card", "field", "contains"]

            [synonyms]
            fld = "field"

            [[operators]]
            first = "contains"
            precedence = 200
            instruction = 0

            [[constants]]
            words = ["card"]
            value = 7

            [[commands]]
            name = "beep"
            instruction = 1
            terminal_mode = "b"

              [[commands.slots]]
              kind = "expression"
              optional = true
              mode_to_set = "b"
        "#;

        let mut grammar = GrammarConfig::default();
        let before = grammar.operators().len();
        grammar.extend_from_toml(source, 100).unwrap();

        assert_eq!(grammar.lookup("fld"), grammar.lookup("field"));
        assert_eq!(grammar.operators().len(), before + 1);
        assert_eq!(grammar.operators()[before].instruction, 100);
        assert_eq!(grammar.host_commands()[0].instruction, 101);
        assert_eq!(grammar.host_commands()[0].terminal_mode, 'b');
        assert_eq!(grammar.host_commands()[0].slots[0].mode_to_set, 'b');
        assert_eq!(grammar.constants().last().map(|c| c.value.clone()), Some(Value::integer(7)));
    }

    #[test]
    fn toml_errors() {
        let mut grammar = GrammarConfig::default();
        assert!(matches!(
            grammar.extend_from_toml("[[operators]]\nfirst = \"frob\"\nprecedence = 1\ninstruction = 0\n", 0),
            Err(ConfigError::UnknownWord(_)),
        ));
        assert!(matches!(
            grammar.extend_from_toml("colour = 3\n", 0),
            Err(ConfigError::Toml(_)),
        ));
        assert!(matches!(
            grammar.extend_from_toml("words = [\"go\"]\n[[commands]]\nname = \"go\"\ninstruction = 0\nterminal_mode = \"ab\"\n", 0),
            Err(ConfigError::BadMode(_)),
        ));
    }
}
