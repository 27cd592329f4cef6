//! The syntax tree the parser builds.
//! `Value`s produce something on the stack, `Command`s are statements.
//! Every node owns its children outright; the only state shared
//! across a walk is the enclosing handler's `Locals`, which is
//! passed down by `&mut`.

use log::debug;
use proptest_derive::Arbitrary;

use crate::common::opcode::{instruction_name, InstructionId};
use crate::compiler::{
    gen::Generator,
    syntax::CompileError,
};
use crate::construct::{
    token::Identifier,
    transform::Rule,
    variable::Locals,
};

/// Time unit attached to a number literal, like `5 seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum Unit {
    None,
    Seconds,
    Ticks,
    Milliseconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl Unit {
    pub fn from_identifier(identifier: Identifier) -> Option<Unit> {
        Some(match identifier {
            Identifier::Second      => Unit::Seconds,
            Identifier::Tick        => Unit::Ticks,
            Identifier::Millisecond => Unit::Milliseconds,
            Identifier::Minute      => Unit::Minutes,
            Identifier::Hour        => Unit::Hours,
            Identifier::Day         => Unit::Days,
            Identifier::Week        => Unit::Weeks,
            _ => { return None; },
        })
    }

    /// Passed to the VM in `param1` of number pushes.
    pub fn id(self) -> u16 {
        self as u16
    }

    fn suffix(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Seconds => " seconds",
            Unit::Ticks => " ticks",
            Unit::Milliseconds => " milliseconds",
            Unit::Minutes => " minutes",
            Unit::Hours => " hours",
            Unit::Days => " days",
            Unit::Weeks => " weeks",
        }
    }
}

/// The unit a chunk expression counts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum ChunkType {
    Byte,
    Character,
    Line,
    Item,
    Word,
    Row,
    Column,
}

impl ChunkType {
    pub fn from_identifier(identifier: Identifier) -> Option<ChunkType> {
        Some(match identifier {
            Identifier::Byte      => ChunkType::Byte,
            Identifier::Character => ChunkType::Character,
            Identifier::Line      => ChunkType::Line,
            Identifier::Item      => ChunkType::Item,
            Identifier::Word      => ChunkType::Word,
            Identifier::Row       => ChunkType::Row,
            Identifier::Column    => ChunkType::Column,
            _ => { return None; },
        })
    }

    /// Passed to the VM in `param2` of chunk instructions.
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// `the long name of ...` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyStyle {
    Plain,
    Long,
    Short,
    Abbreviated,
}

impl PropertyStyle {
    pub fn from_identifier(identifier: Identifier) -> Option<PropertyStyle> {
        Some(match identifier {
            Identifier::Long        => PropertyStyle::Long,
            Identifier::Short       => PropertyStyle::Short,
            Identifier::Abbreviated => PropertyStyle::Abbreviated,
            _ => { return None; },
        })
    }

    pub fn id(self) -> u16 {
        self as u16
    }
}

/// A chunk is read-only and evaluated on the spot,
/// a reference can be written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    Constant,
    Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub mode: ChunkMode,
    pub kind: ChunkType,
    pub start: Box<Value>,
    pub end: Box<Value>,
    pub target: Box<Value>,
}

/// A handler call, either as a command or as a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Lowercased, as in the handler index.
    pub name: String,
    pub is_command: bool,
    /// `pass`: hand the message on to the next handler in line.
    pub pass: bool,
    pub params: Vec<Value>,
}

/// An instruction applied to operands pushed in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub instruction: InstructionId,
    pub param1: u16,
    pub param2: u32,
    pub operands: Vec<Value>,
}

impl Operation {
    pub fn new(instruction: InstructionId, operands: Vec<Value>) -> Operation {
        Operation { instruction, param1: 0, param2: 0, operands }
    }

    pub fn with_params(mut self, param1: u16, param2: u32) -> Operation {
        self.param1 = param1;
        self.param2 = param2;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer { value: i64, unit: Unit },
    Float { value: f64, unit: Unit },
    Boolean(bool),
    String(String),
    Unset,
    /// `key` indexes the handler's `Locals`, `name` is what the script wrote.
    Variable { key: String, name: String },
    /// Key/value pairs of an array literal.
    Array(Vec<(Value, Value)>),
    Call(Call),
    Operator(Operation),
    HostFunction(Operation),
    /// `path` holds one name, or several once nested properties are merged.
    /// Names run from the object outwards: `the a of the b of x` is `[b, a]`.
    ObjectProperty { path: Vec<String>, style: PropertyStyle, target: Box<Value> },
    GlobalProperty {
        name: String,
        getter: Option<InstructionId>,
        setter: Option<InstructionId>,
    },
    Chunk(Chunk),
    /// A property of a range of text, like `the textStyle of word 2 of fld 1`.
    ChunkProperty { name: String, chunk: Chunk },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LineMarker(usize),
    /// Replaces the contents of a local outright.
    Assign { dest: String, value: Value },
    Put { value: Value, dest: Value },
    Print(Value),
    Arithmetic { op: Arithmetic, dest: Value, value: Value },
    If { condition: Value, then: Vec<Command>, otherwise: Vec<Command> },
    /// `step` runs at the end of every iteration and is where `next repeat` lands.
    While { line: usize, condition: Value, body: Vec<Command>, step: Vec<Command> },
    ExitRepeat,
    NextRepeat,
    Return(Value),
    /// Binds a local to the handler's parameter `index`, counting from 0.
    GetParam { dest: String, index: usize },
    /// Stands in for a handler body that failed to parse.
    ParseError { message: String, file: String, line: usize, offset: usize },
    Download { url: Value, dest: Value, progress: String, completion: String },
    HostCommand(Operation),
    Operator(Operation),
    AssignChunkArray { dest: String, kind: ChunkType, value: Value },
    GetArrayItem { dest: String, index: Value, array: Value },
    GetArrayItemCount { dest: String, array: Value },
}

/// Every kind of node, for scoping transformation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum NodeKind {
    Integer,
    Float,
    Boolean,
    String,
    Unset,
    Variable,
    Array,
    Call,
    Operator,
    HostFunction,
    ObjectProperty,
    GlobalProperty,
    Chunk,
    ChunkProperty,
    LineMarker,
    Assign,
    Put,
    Print,
    Arithmetic,
    If,
    While,
    ExitRepeat,
    NextRepeat,
    Return,
    GetParam,
    ParseError,
    Download,
    HostCommand,
    OperatorCommand,
    AssignChunkArray,
    GetArrayItem,
    GetArrayItemCount,
}

impl NodeKind {
    pub fn is_value(self) -> bool {
        use NodeKind::*;
        matches!(self,
            Integer | Float | Boolean | String | Unset | Variable | Array | Call
            | Operator | HostFunction | ObjectProperty | GlobalProperty | Chunk | ChunkProperty
        )
    }
}

/// A borrowed node, handed to `visit` callbacks.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Value(&'a Value),
    Command(&'a Command),
}

impl Value {
    pub fn integer(value: i64) -> Value {
        Value::Integer { value, unit: Unit::None }
    }

    pub fn float(value: f64) -> Value {
        Value::Float { value, unit: Unit::None }
    }

    pub fn string(value: &str) -> Value {
        Value::String(value.to_string())
    }

    pub fn variable(key: &str, name: &str) -> Value {
        Value::Variable { key: key.to_string(), name: name.to_string() }
    }

    pub fn operator(instruction: InstructionId, operands: Vec<Value>) -> Value {
        Value::Operator(Operation::new(instruction, operands))
    }

    pub fn object_property(name: &str, style: PropertyStyle, target: Value) -> Value {
        Value::ObjectProperty { path: vec![name.to_string()], style, target: Box::new(target) }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Value::Integer { .. } => NodeKind::Integer,
            Value::Float { .. } => NodeKind::Float,
            Value::Boolean(_) => NodeKind::Boolean,
            Value::String(_) => NodeKind::String,
            Value::Unset => NodeKind::Unset,
            Value::Variable { .. } => NodeKind::Variable,
            Value::Array(_) => NodeKind::Array,
            Value::Call(_) => NodeKind::Call,
            Value::Operator(_) => NodeKind::Operator,
            Value::HostFunction(_) => NodeKind::HostFunction,
            Value::ObjectProperty { .. } => NodeKind::ObjectProperty,
            Value::GlobalProperty { .. } => NodeKind::GlobalProperty,
            Value::Chunk(_) => NodeKind::Chunk,
            Value::ChunkProperty { .. } => NodeKind::ChunkProperty,
        }
    }

    /// The instruction an operator or host function emits.
    pub fn instruction(&self) -> Option<InstructionId> {
        match self {
            Value::Operator(op) | Value::HostFunction(op) => Some(op.instruction),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        match self {
            Value::Integer { .. }
            | Value::Float { .. }
            | Value::Boolean(_)
            | Value::String(_)
            | Value::Unset => true,
            Value::Array(entries) => entries.iter().all(|(k, v)| k.is_constant() && v.is_constant()),
            _ => false,
        }
    }

    fn not_convertible(&self, to: &'static str) -> CompileError {
        CompileError::NotConvertible { value: self.describe(), to }
    }

    pub fn as_string(&self) -> Result<String, CompileError> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Integer { value, .. } => Ok(value.to_string()),
            Value::Float { value, .. } => Ok(value.to_string()),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Unset => Ok(String::new()),
            _ => Err(self.not_convertible("a string")),
        }
    }

    pub fn as_int(&self) -> Result<i64, CompileError> {
        match self {
            Value::Integer { value, .. } => Ok(*value),
            Value::Float { value, .. } if value.fract() == 0.0 => Ok(*value as i64),
            Value::String(s) => s.trim().parse().map_err(|_| self.not_convertible("an integer")),
            _ => Err(self.not_convertible("an integer")),
        }
    }

    pub fn as_float(&self) -> Result<f64, CompileError> {
        match self {
            Value::Integer { value, .. } => Ok(*value as f64),
            Value::Float { value, .. } => Ok(*value),
            Value::String(s) => s.trim().parse().map_err(|_| self.not_convertible("a number")),
            _ => Err(self.not_convertible("a number")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, CompileError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.not_convertible("a boolean")),
        }
    }

    /// A few words naming the node, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Value::Variable { name, .. } => format!("the variable \"{}\"", name),
            Value::Call(call) => format!("the result of \"{}\"", call.name),
            Value::Operator(op) | Value::HostFunction(op) => {
                format!("the result of {}", instruction_name(op.instruction))
            },
            Value::ObjectProperty { path, .. } => {
                format!("the {} property", path.join("."))
            },
            Value::GlobalProperty { name, .. } => format!("the {} property", name),
            Value::ChunkProperty { name, .. } => format!("the {} of a chunk", name),
            Value::Chunk(_) => "a chunk".to_string(),
            Value::Array(_) => "an array".to_string(),
            constant => match constant.as_string() {
                Ok(text) => format!("\"{}\"", text),
                Err(_) => "a constant".to_string(),
            },
        }
    }

    /// Simplifies children first, then runs every rule for this
    /// kind of node, each seeing the previous rule's result.
    /// Also gives every variable it reaches a slot.
    pub fn simplify(&mut self, rules: &[Rule], locals: &mut Locals) {
        match self {
            Value::Variable { key, .. } => locals.reserve(key),
            Value::Array(entries) => {
                for (key, value) in entries.iter_mut() {
                    key.simplify(rules, locals);
                    value.simplify(rules, locals);
                }
            },
            Value::Call(call) => {
                for param in call.params.iter_mut() {
                    param.simplify(rules, locals);
                }
            },
            Value::Operator(op) | Value::HostFunction(op) => {
                for operand in op.operands.iter_mut() {
                    operand.simplify(rules, locals);
                }
            },
            Value::ObjectProperty { target, .. } => target.simplify(rules, locals),
            Value::Chunk(chunk) | Value::ChunkProperty { chunk, .. } => chunk.simplify(rules, locals),
            Value::Integer { .. }
            | Value::Float { .. }
            | Value::Boolean(_)
            | Value::String(_)
            | Value::Unset
            | Value::GlobalProperty { .. } => (),
        }

        for rule in rules {
            if let Some(replacement) = rule.apply_to_value(self) {
                debug!("rule {} rewrote {:?}", rule.name, self.kind());
                *self = replacement;
            }
        }
    }

    /// Calls `visitor` on this node, then on its children, in evaluation order.
    pub fn visit(&self, visitor: &mut dyn FnMut(Node<'_>)) {
        visitor(Node::Value(self));
        match self {
            Value::Array(entries) => {
                for (key, value) in entries {
                    key.visit(visitor);
                    value.visit(visitor);
                }
            },
            Value::Call(call) => call.params.iter().for_each(|p| p.visit(visitor)),
            Value::Operator(op) | Value::HostFunction(op) => {
                op.operands.iter().for_each(|o| o.visit(visitor))
            },
            Value::ObjectProperty { target, .. } => target.visit(visitor),
            Value::Chunk(chunk) | Value::ChunkProperty { chunk, .. } => chunk.visit(visitor),
            _ => (),
        }
    }

    pub fn generate_code(&self, gen: &mut Generator) -> Result<(), CompileError> {
        gen.value(self)
    }

    /// An indented outline of the node, one line per node.
    pub fn debug_print(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        let children = |values: &mut dyn Iterator<Item = &Value>| values
            .map(|v| v.debug_print(indent + 1))
            .collect::<String>();

        match self {
            Value::Integer { value, unit } => format!("{}Integer {}{}\n", pad, value, unit.suffix()),
            Value::Float { value, unit } => format!("{}Float {}{}\n", pad, value, unit.suffix()),
            Value::Boolean(b) => format!("{}Boolean {}\n", pad, b),
            Value::String(s) => format!("{}String {:?}\n", pad, s),
            Value::Unset => format!("{}Unset\n", pad),
            Value::Variable { key, name } => format!("{}Variable {} ({})\n", pad, name, key),
            Value::Array(entries) => format!(
                "{}Array\n{}",
                pad,
                children(&mut entries.iter().flat_map(|(k, v)| vec![k, v])),
            ),
            Value::Call(call) => format!(
                "{}Call {}{}{}\n{}",
                pad,
                call.name,
                if call.is_command { " command" } else { " function" },
                if call.pass { " pass" } else { "" },
                children(&mut call.params.iter()),
            ),
            Value::Operator(op) => format!(
                "{}Operator {}({}, {})\n{}",
                pad, instruction_name(op.instruction), op.param1, op.param2,
                children(&mut op.operands.iter()),
            ),
            Value::HostFunction(op) => format!(
                "{}HostFunction {}({}, {})\n{}",
                pad, instruction_name(op.instruction), op.param1, op.param2,
                children(&mut op.operands.iter()),
            ),
            Value::ObjectProperty { path, style, target } => format!(
                "{}ObjectProperty {} {:?}\n{}",
                pad, path.join("."), style, target.debug_print(indent + 1),
            ),
            Value::GlobalProperty { name, .. } => format!("{}GlobalProperty {}\n", pad, name),
            Value::Chunk(chunk) => chunk.debug_print("Chunk", indent),
            Value::ChunkProperty { name, chunk } => chunk.debug_print(&format!("ChunkProperty {}", name), indent),
        }
    }
}

impl Chunk {
    fn simplify(&mut self, rules: &[Rule], locals: &mut Locals) {
        self.target.simplify(rules, locals);
        self.start.simplify(rules, locals);
        self.end.simplify(rules, locals);
    }

    fn visit(&self, visitor: &mut dyn FnMut(Node<'_>)) {
        self.target.visit(visitor);
        self.start.visit(visitor);
        self.end.visit(visitor);
    }

    fn debug_print(&self, label: &str, indent: usize) -> String {
        format!(
            "{}{} {:?} {:?}\n{}{}{}",
            "  ".repeat(indent), label, self.mode, self.kind,
            self.target.debug_print(indent + 1),
            self.start.debug_print(indent + 1),
            self.end.debug_print(indent + 1),
        )
    }
}

fn simplify_block(block: &mut [Command], rules: &[Rule], locals: &mut Locals) {
    for command in block.iter_mut() {
        command.simplify(rules, locals);
    }
}

fn print_block(label: &str, block: &[Command], indent: usize) -> String {
    let pad = "  ".repeat(indent);
    let body = block.iter().map(|c| c.debug_print(indent + 1)).collect::<String>();
    format!("{}{}\n{}", pad, label, body)
}

impl Command {
    pub fn kind(&self) -> NodeKind {
        match self {
            Command::LineMarker(_) => NodeKind::LineMarker,
            Command::Assign { .. } => NodeKind::Assign,
            Command::Put { .. } => NodeKind::Put,
            Command::Print(_) => NodeKind::Print,
            Command::Arithmetic { .. } => NodeKind::Arithmetic,
            Command::If { .. } => NodeKind::If,
            Command::While { .. } => NodeKind::While,
            Command::ExitRepeat => NodeKind::ExitRepeat,
            Command::NextRepeat => NodeKind::NextRepeat,
            Command::Return(_) => NodeKind::Return,
            Command::GetParam { .. } => NodeKind::GetParam,
            Command::ParseError { .. } => NodeKind::ParseError,
            Command::Download { .. } => NodeKind::Download,
            Command::HostCommand(_) => NodeKind::HostCommand,
            Command::Operator(_) => NodeKind::OperatorCommand,
            Command::AssignChunkArray { .. } => NodeKind::AssignChunkArray,
            Command::GetArrayItem { .. } => NodeKind::GetArrayItem,
            Command::GetArrayItemCount { .. } => NodeKind::GetArrayItemCount,
        }
    }

    pub fn instruction(&self) -> Option<InstructionId> {
        match self {
            Command::HostCommand(op) | Command::Operator(op) => Some(op.instruction),
            _ => None,
        }
    }

    pub fn simplify(&mut self, rules: &[Rule], locals: &mut Locals) {
        match self {
            Command::Assign { dest, value } => {
                value.simplify(rules, locals);
                locals.reserve(dest);
            },
            Command::Put { value, dest } => {
                value.simplify(rules, locals);
                dest.simplify(rules, locals);
            },
            Command::Print(value) | Command::Return(value) => value.simplify(rules, locals),
            Command::Arithmetic { dest, value, .. } => {
                dest.simplify(rules, locals);
                value.simplify(rules, locals);
            },
            Command::If { condition, then, otherwise } => {
                condition.simplify(rules, locals);
                simplify_block(then, rules, locals);
                simplify_block(otherwise, rules, locals);
            },
            Command::While { condition, body, step, .. } => {
                condition.simplify(rules, locals);
                simplify_block(body, rules, locals);
                simplify_block(step, rules, locals);
            },
            Command::GetParam { dest, .. } => locals.reserve(dest),
            Command::Download { url, dest, .. } => {
                url.simplify(rules, locals);
                dest.simplify(rules, locals);
            },
            Command::HostCommand(op) | Command::Operator(op) => {
                for operand in op.operands.iter_mut() {
                    operand.simplify(rules, locals);
                }
            },
            Command::AssignChunkArray { dest, value, .. } => {
                value.simplify(rules, locals);
                locals.reserve(dest);
            },
            Command::GetArrayItem { dest, index, array } => {
                index.simplify(rules, locals);
                array.simplify(rules, locals);
                locals.reserve(dest);
            },
            Command::GetArrayItemCount { dest, array } => {
                array.simplify(rules, locals);
                locals.reserve(dest);
            },
            Command::LineMarker(_)
            | Command::ExitRepeat
            | Command::NextRepeat
            | Command::ParseError { .. } => (),
        }

        for rule in rules {
            if let Some(replacement) = rule.apply_to_command(self) {
                debug!("rule {} rewrote {:?}", rule.name, self.kind());
                *self = replacement;
            }
        }
    }

    pub fn visit(&self, visitor: &mut dyn FnMut(Node<'_>)) {
        visitor(Node::Command(self));
        match self {
            Command::Assign { value, .. }
            | Command::Print(value)
            | Command::Return(value)
            | Command::AssignChunkArray { value, .. } => value.visit(visitor),
            Command::Put { value, dest } => {
                value.visit(visitor);
                dest.visit(visitor);
            },
            Command::Arithmetic { dest, value, .. } => {
                dest.visit(visitor);
                value.visit(visitor);
            },
            Command::If { condition, then, otherwise } => {
                condition.visit(visitor);
                then.iter().for_each(|c| c.visit(visitor));
                otherwise.iter().for_each(|c| c.visit(visitor));
            },
            Command::While { condition, body, step, .. } => {
                condition.visit(visitor);
                body.iter().for_each(|c| c.visit(visitor));
                step.iter().for_each(|c| c.visit(visitor));
            },
            Command::Download { url, dest, .. } => {
                url.visit(visitor);
                dest.visit(visitor);
            },
            Command::HostCommand(op) | Command::Operator(op) => {
                op.operands.iter().for_each(|o| o.visit(visitor))
            },
            Command::GetArrayItem { index, array, .. } => {
                index.visit(visitor);
                array.visit(visitor);
            },
            Command::GetArrayItemCount { array, .. } => array.visit(visitor),
            Command::LineMarker(_)
            | Command::ExitRepeat
            | Command::NextRepeat
            | Command::GetParam { .. }
            | Command::ParseError { .. } => (),
        }
    }

    pub fn generate_code(&self, gen: &mut Generator) -> Result<(), CompileError> {
        gen.command(self)
    }

    pub fn debug_print(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        let inner = indent + 1;

        match self {
            Command::LineMarker(line) => format!("{}LineMarker {}\n", pad, line),
            Command::Assign { dest, value } => format!("{}Assign {}\n{}", pad, dest, value.debug_print(inner)),
            Command::Put { value, dest } => format!(
                "{}Put\n{}{}", pad, value.debug_print(inner), dest.debug_print(inner),
            ),
            Command::Print(value) => format!("{}Print\n{}", pad, value.debug_print(inner)),
            Command::Arithmetic { op, dest, value } => format!(
                "{}{:?}\n{}{}", pad, op, dest.debug_print(inner), value.debug_print(inner),
            ),
            Command::If { condition, then, otherwise } => format!(
                "{}If\n{}{}{}",
                pad,
                condition.debug_print(inner),
                print_block("Then", then, inner),
                print_block("Else", otherwise, inner),
            ),
            Command::While { line, condition, body, step } => format!(
                "{}While (line {})\n{}{}{}",
                pad, line,
                condition.debug_print(inner),
                print_block("Body", body, inner),
                print_block("Step", step, inner),
            ),
            Command::ExitRepeat => format!("{}ExitRepeat\n", pad),
            Command::NextRepeat => format!("{}NextRepeat\n", pad),
            Command::Return(value) => format!("{}Return\n{}", pad, value.debug_print(inner)),
            Command::GetParam { dest, index } => format!("{}GetParam {} {}\n", pad, dest, index),
            Command::ParseError { message, line, .. } => {
                format!("{}ParseError line {}: {}\n", pad, line, message)
            },
            Command::Download { url, dest, progress, completion } => format!(
                "{}Download {:?} {:?}\n{}{}",
                pad, progress, completion, url.debug_print(inner), dest.debug_print(inner),
            ),
            Command::HostCommand(op) => format!(
                "{}HostCommand {}({}, {})\n{}",
                pad, instruction_name(op.instruction), op.param1, op.param2,
                op.operands.iter().map(|o| o.debug_print(inner)).collect::<String>(),
            ),
            Command::Operator(op) => format!(
                "{}Operator {}({}, {})\n{}",
                pad, instruction_name(op.instruction), op.param1, op.param2,
                op.operands.iter().map(|o| o.debug_print(inner)).collect::<String>(),
            ),
            Command::AssignChunkArray { dest, kind, value } => format!(
                "{}AssignChunkArray {} {:?}\n{}", pad, dest, kind, value.debug_print(inner),
            ),
            Command::GetArrayItem { dest, index, array } => format!(
                "{}GetArrayItem {}\n{}{}", pad, dest, index.debug_print(inner), array.debug_print(inner),
            ),
            Command::GetArrayItemCount { dest, array } => format!(
                "{}GetArrayItemCount {}\n{}", pad, dest, array.debug_print(inner),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::common::opcode::Opcode;

    #[test]
    fn conversions() {
        assert_eq!(Value::integer(3).as_string(), Ok("3".to_string()));
        assert_eq!(Value::float(2.5).as_string(), Ok("2.5".to_string()));
        assert_eq!(Value::float(4.0).as_int(), Ok(4));
        assert_eq!(Value::string(" 12 ").as_int(), Ok(12));
        assert_eq!(Value::string("TRUE").as_bool(), Ok(true));
        assert!(Value::string("maybe").as_bool().is_err());
        assert!(Value::variable("var_x", "x").as_string().is_err());
    }

    #[test]
    fn constants() {
        assert!(Value::string("a").is_constant());
        assert!(Value::Unset.is_constant());
        assert!(Value::Array(vec![(Value::string("k"), Value::integer(1))]).is_constant());
        assert!(!Value::variable("var_x", "x").is_constant());
        assert!(!Value::operator(Opcode::Add.id(), vec![Value::integer(1), Value::integer(2)]).is_constant());
    }

    #[test]
    fn slots_follow_first_reference() {
        let mut locals = Locals::new();
        let mut command = Command::Put {
            value: Value::operator(Opcode::Add.id(), vec![
                Value::variable("var_b", "b"),
                Value::variable("var_a", "a"),
            ]),
            dest: Value::variable("var_b", "b"),
        };
        command.simplify(&[], &mut locals);

        assert_eq!(locals.existing_slot("var_b"), Some(0));
        assert_eq!(locals.existing_slot("var_a"), Some(1));
        assert_eq!(locals.num_slots(), 2);
    }

    #[test]
    fn visit_order() {
        let command = Command::If {
            condition: Value::Boolean(true),
            then: vec![Command::Print(Value::integer(1))],
            otherwise: vec![Command::ExitRepeat],
        };

        let mut kinds = vec![];
        command.visit(&mut |node| kinds.push(match node {
            Node::Value(v) => v.kind(),
            Node::Command(c) => c.kind(),
        }));

        assert_eq!(kinds, vec![
            NodeKind::If,
            NodeKind::Boolean,
            NodeKind::Print,
            NodeKind::Integer,
            NodeKind::ExitRepeat,
        ]);
    }

    #[test]
    fn outline() {
        let command = Command::Put {
            value: Value::Integer { value: 5, unit: Unit::Seconds },
            dest: Value::variable("var_x", "x"),
        };
        assert_eq!(
            command.debug_print(0),
            "Put\n  Integer 5 seconds\n  Variable x (var_x)\n",
        );
    }

    proptest! {
        #[test]
        fn numbers_keep_their_value(value: i64, unit: Unit) {
            let number = Value::Integer { value, unit };
            prop_assert!(number.is_constant());
            prop_assert_eq!(number.as_int(), Ok(value));
            prop_assert_eq!(number.as_string(), Ok(value.to_string()));
        }

        #[test]
        fn chunks_are_never_constant(kind: ChunkType) {
            let chunk = Value::Chunk(Chunk {
                mode: ChunkMode::Constant,
                kind,
                start: Box::new(Value::integer(1)),
                end: Box::new(Value::integer(1)),
                target: Box::new(Value::string("a b c")),
            });
            prop_assert!(!chunk.is_constant());
            prop_assert_eq!(chunk.kind(), NodeKind::Chunk);
        }

        #[test]
        fn rules_only_fire_on_their_kind(kind: NodeKind) {
            let rule = Rule::value("unset", kind, |_| Some(Value::Unset));
            let mut value = Value::string("a");
            value.simplify(&[rule], &mut Locals::new());
            prop_assert_eq!(value == Value::Unset, kind == NodeKind::String);
        }
    }
}
