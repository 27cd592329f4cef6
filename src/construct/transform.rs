//! Rewrite rules applied bottom-up by `simplify`.
//! A rule is bound to one kind of node, and optionally
//! to a single instruction for operators and host entities.

use crate::common::opcode::{InstructionId, Opcode, BACK_OF_STACK};
use crate::construct::tree::{Chunk, ChunkMode, Command, NodeKind, Operation, Value};

/// Returns `None` to leave the node as it is.
#[derive(Clone, Copy)]
pub enum Rewrite {
    Value(fn(&Value) -> Option<Value>),
    Command(fn(&Command) -> Option<Command>),
}

impl std::fmt::Debug for Rewrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rewrite::Value(_) => write!(f, "Rewrite::Value"),
            Rewrite::Command(_) => write!(f, "Rewrite::Command"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub kind: NodeKind,
    pub instruction: Option<InstructionId>,
    pub rewrite: Rewrite,
}

impl Rule {
    pub fn value(name: &str, kind: NodeKind, rewrite: fn(&Value) -> Option<Value>) -> Rule {
        Rule { name: name.to_string(), kind, instruction: None, rewrite: Rewrite::Value(rewrite) }
    }

    pub fn command(name: &str, kind: NodeKind, rewrite: fn(&Command) -> Option<Command>) -> Rule {
        Rule { name: name.to_string(), kind, instruction: None, rewrite: Rewrite::Command(rewrite) }
    }

    /// Only fire on nodes emitting `instruction`.
    pub fn only_for(mut self, instruction: impl Into<InstructionId>) -> Rule {
        self.instruction = Some(instruction.into());
        self
    }

    fn applies(&self, kind: NodeKind, instruction: Option<InstructionId>) -> bool {
        self.kind == kind
            && (self.instruction.is_none() || self.instruction == instruction)
    }

    pub fn apply_to_value(&self, value: &Value) -> Option<Value> {
        match self.rewrite {
            Rewrite::Value(rewrite) if self.applies(value.kind(), value.instruction()) => rewrite(value),
            _ => None,
        }
    }

    pub fn apply_to_command(&self, command: &Command) -> Option<Command> {
        match self.rewrite {
            Rewrite::Command(rewrite) if self.applies(command.kind(), command.instruction()) => rewrite(command),
            _ => None,
        }
    }
}

/// The built-in rules, in the order they are tried.
/// Hosts push their own onto the end.
pub fn build_default_transformations() -> Vec<Rule> {
    vec![
        Rule::value("concat", NodeKind::Operator, fold_concatenation)
            .only_for(Opcode::ConcatenateValues),
        Rule::value("concat-space", NodeKind::Operator, fold_concatenation_with_space)
            .only_for(Opcode::ConcatenateValuesWithSpace),
        Rule::value("chunk-property", NodeKind::ObjectProperty, property_of_chunk),
        Rule::command("chunk-property-put", NodeKind::Put, put_into_chunk_property),
    ]
}

fn constant_pair(operands: &[Value]) -> Option<(&Value, &Value)> {
    match operands {
        [left, right] => Some((left, right)),
        _ => None,
    }
}

/// `"a" & "b"` is `"ab"`.
fn fold_concatenation(value: &Value) -> Option<Value> {
    let (left, right) = match value {
        Value::Operator(op) => constant_pair(&op.operands)?,
        _ => return None,
    };
    if !left.is_constant() || !right.is_constant() {
        return None;
    }

    let joined = format!("{}{}", left.as_string().ok()?, right.as_string().ok()?);
    Some(Value::String(joined))
}

/// `"a" && "b"` is `"a b"`. With one constant side,
/// the space moves into the constant and a plain `&` remains.
fn fold_concatenation_with_space(value: &Value) -> Option<Value> {
    let (left, right) = match value {
        Value::Operator(op) => constant_pair(&op.operands)?,
        _ => return None,
    };

    let concatenate = |left: Value, right: Value| {
        Value::operator(Opcode::ConcatenateValues.id(), vec![left, right])
    };

    match (left.is_constant(), right.is_constant()) {
        (true, true) => Some(Value::String(format!(
            "{} {}",
            left.as_string().ok()?,
            right.as_string().ok()?,
        ))),
        (true, false) => Some(concatenate(
            Value::String(format!("{} ", left.as_string().ok()?)),
            right.clone(),
        )),
        (false, true) => Some(concatenate(
            left.clone(),
            Value::String(format!(" {}", right.as_string().ok()?)),
        )),
        (false, false) => None,
    }
}

/// A property of a constant chunk is a property of that range of text,
/// so it has to be read and written through a chunk reference.
/// A property of a property becomes one key path on the inner object.
fn property_of_chunk(value: &Value) -> Option<Value> {
    let (path, style, target) = match value {
        Value::ObjectProperty { path, style, target } => (path, *style, target.as_ref()),
        _ => return None,
    };

    match target {
        Value::Chunk(chunk) if chunk.mode == ChunkMode::Constant => Some(Value::ChunkProperty {
            name: path.join("."),
            chunk: Chunk { mode: ChunkMode::Reference, ..chunk.clone() },
        }),
        Value::ObjectProperty { path: inner, target: object, .. } => Some(Value::ObjectProperty {
            path: inner.iter().chain(path.iter()).cloned().collect(),
            style,
            target: object.clone(),
        }),
        _ => None,
    }
}

/// `put v into the textStyle of word 2 of x` sets the property in one instruction.
fn put_into_chunk_property(command: &Command) -> Option<Command> {
    match command {
        Command::Put { value, dest: Value::ChunkProperty { name, chunk } } => {
            let operands = vec![
                chunk.target.as_ref().clone(),
                chunk.start.as_ref().clone(),
                chunk.end.as_ref().clone(),
                value.clone(),
                Value::String(name.clone()),
            ];
            Some(Command::Operator(
                Operation::new(Opcode::SetChunkProperty.id(), operands)
                    .with_params(BACK_OF_STACK, chunk.kind.id()),
            ))
        },
        _ => None,
    }
}
