use std::convert::TryFrom;

use crate::common::opcode::{Opcode, BACK_OF_STACK};
use crate::compiler::{
    code_block::CodeBlock,
    syntax::CompileError,
};
use crate::construct::{
    tree::{Arithmetic, Call, Chunk, ChunkMode, Command, Operation, Unit, Value},
    variable::Locals,
};

/// Jumps out of a loop that can't be patched until its end is known.
#[derive(Debug, Default)]
struct Loop {
    exits: Vec<usize>,
    nexts: Vec<usize>,
}

/// Walks the commands of one handler, sending instructions to a `CodeBlock`.
/// Operands are pushed in the order the VM pops them;
/// nothing is evaluated here.
pub struct Generator<'a> {
    code: &'a mut dyn CodeBlock,
    locals: &'a mut Locals,
    file: &'a str,
    /// Line of the last marker, for `return`s.
    line: usize,
    loops: Vec<Loop>,
}

impl<'a> Generator<'a> {
    pub fn new(code: &'a mut dyn CodeBlock, locals: &'a mut Locals, file: &'a str) -> Generator<'a> {
        Generator { code, locals, file, line: 0, loops: vec![] }
    }

    /// Generates a whole handler.
    /// Every local must have its slot by now (see `simplify`),
    /// as the prolog fixes the frame size.
    pub fn function(
        &mut self,
        is_command: bool,
        name: &str,
        body: &[Command],
        line: usize,
        end_line: usize,
    ) -> Result<(), CompileError> {
        self.line = line;
        self.code.generate_function_prolog(is_command, name, self.locals, self.file, line);
        self.block(body)?;
        self.code.generate_function_epilog(is_command, name, self.locals, self.file, end_line);
        Ok(())
    }

    pub fn block(&mut self, block: &[Command]) -> Result<(), CompileError> {
        for command in block {
            command.generate_code(self)?;
        }
        Ok(())
    }

    fn slot(&mut self, key: &str) -> Result<i16, CompileError> {
        self.locals.slot(key)
    }

    fn integer(&mut self, value: i64, unit: Unit) {
        match i32::try_from(value) {
            Ok(small) => self.code.generate_push_int(small, unit.id()),
            Err(_) => self.code.generate_push_int64(value, unit.id()),
        }
    }

    pub fn value(&mut self, value: &Value) -> Result<(), CompileError> {
        match value {
            Value::Integer { value, unit } => self.integer(*value, *unit),
            Value::Float { value, unit } => self.code.generate_push_float(*value, unit.id()),
            Value::Boolean(b) => self.code.generate_push_bool(*b),
            Value::String(s) => self.code.generate_push_string(s),
            Value::Unset => self.code.generate_push_unset(),
            Value::Variable { key, .. } => {
                let slot = self.slot(key)?;
                self.code.generate_push_variable(slot);
            },
            Value::Array(entries) => {
                for (key, value) in entries {
                    self.value(key)?;
                    self.value(value)?;
                }
                self.code.generate_push_array_constant(entries.len());
            },
            Value::Call(call) => self.call(call)?,
            Value::Operator(op) if op.instruction == Opcode::PushMe.id() => self.code.generate_push_me(),
            Value::Operator(op) => self.operation(op)?,
            Value::HostFunction(op) => self.host_entity(op)?,
            Value::ObjectProperty { path, style, target } => {
                self.property_path(path)?;
                self.value(target)?;
                self.code.generate_push_property_of_object(style.id());
            },
            Value::GlobalProperty { getter: Some(getter), .. } => {
                self.code.generate_operator(*getter, 0, 0);
            },
            Value::GlobalProperty { .. } => {
                return Err(CompileError::NotConvertible { value: value.describe(), to: "a value" });
            },
            Value::Chunk(chunk) => match chunk.mode {
                ChunkMode::Constant => {
                    self.value(&chunk.target)?;
                    self.value(&chunk.start)?;
                    self.value(&chunk.end)?;
                    self.code.generate_push_chunk(chunk.kind);
                },
                ChunkMode::Reference => self.chunk_reference(chunk)?,
            },
            Value::ChunkProperty { name, chunk } => {
                self.value(&chunk.target)?;
                self.value(&chunk.start)?;
                self.value(&chunk.end)?;
                self.code.generate_push_string(name);
                self.code.generate_push_chunk_property(chunk.kind);
            },
        }
        Ok(())
    }

    /// A lone property name goes on as a string, a key path as a list.
    fn property_path(&mut self, path: &[String]) -> Result<(), CompileError> {
        match path {
            [name] => {
                self.code.generate_push_string(name);
                Ok(())
            },
            _ => {
                let keys = path
                    .iter()
                    .enumerate()
                    .map(|(index, name)| (Value::integer(index as i64 + 1), Value::string(name)))
                    .collect();
                self.value(&Value::Array(keys))
            },
        }
    }

    /// Parameters go on in reverse, so the first is on top.
    fn call(&mut self, call: &Call) -> Result<(), CompileError> {
        for param in call.params.iter().rev() {
            self.value(param)?;
        }
        self.integer(call.params.len() as i64, Unit::None);
        self.code.generate_call(call.is_command, call.pass, &call.name);
        Ok(())
    }

    fn operation(&mut self, op: &Operation) -> Result<(), CompileError> {
        for operand in op.operands.iter() {
            self.value(operand)?;
        }
        self.code.generate_operator(op.instruction, op.param1, op.param2);
        Ok(())
    }

    /// Host instructions also get the number of parameters.
    fn host_entity(&mut self, op: &Operation) -> Result<(), CompileError> {
        for operand in op.operands.iter() {
            self.value(operand)?;
        }
        self.integer(op.operands.len() as i64, Unit::None);
        self.code.generate_operator(op.instruction, op.param1, op.param2);
        Ok(())
    }

    /// A chunk that can be written through.
    /// It has to bottom out in a local.
    fn chunk_reference(&mut self, chunk: &Chunk) -> Result<(), CompileError> {
        let param1 = match chunk.target.as_ref() {
            Value::Variable { key, .. } => self.slot(key)? as u16,
            Value::Chunk(inner) if inner.mode == ChunkMode::Reference => {
                self.chunk_reference(inner)?;
                BACK_OF_STACK
            },
            other => return Err(CompileError::NotAChunkTarget(other.describe())),
        };

        self.value(&chunk.start)?;
        self.value(&chunk.end)?;
        self.code.generate_push_chunk_reference(param1, chunk.kind);
        Ok(())
    }

    fn put(&mut self, value: &Value, dest: &Value) -> Result<(), CompileError> {
        match dest {
            Value::Variable { key, .. } => {
                self.value(value)?;
                let slot = self.slot(key)?;
                self.code.generate_pop_into_variable(slot);
            },
            Value::GlobalProperty { name, setter, .. } => match setter {
                Some(setter) => {
                    self.value(value)?;
                    self.code.generate_operator(*setter, 0, 0);
                },
                None => return Err(CompileError::ReadOnlyProperty(name.clone())),
            },
            Value::ObjectProperty { path, target, .. } => {
                self.property_path(path)?;
                self.value(target)?;
                self.value(value)?;
                self.code.generate_set_property_of_object();
            },
            Value::Chunk(Chunk { mode: ChunkMode::Reference, .. })
            | Value::HostFunction(_) => {
                self.value(dest)?;
                self.value(value)?;
                self.code.generate_put_value_into_value();
            },
            Value::Operator(op) if op.instruction == Opcode::GetArrayItemForKey.id() => {
                self.value(dest)?;
                self.value(value)?;
                self.code.generate_put_value_into_value();
            },
            other => return Err(CompileError::NotAssignable(other.describe())),
        }
        Ok(())
    }

    fn arithmetic(&mut self, op: Arithmetic, dest: &Value, value: &Value) -> Result<(), CompileError> {
        if let (Arithmetic::Add, Value::Variable { key, .. }) = (op, dest) {
            match value {
                Value::Integer { value, unit: Unit::None } => {
                    if let Ok(small) = i32::try_from(*value) {
                        let slot = self.slot(key)?;
                        self.code.generate_add_integer(slot, small);
                        return Ok(());
                    }
                },
                Value::Float { value, unit: Unit::None } => {
                    let slot = self.slot(key)?;
                    self.code.generate_add_number(slot, *value);
                    return Ok(());
                },
                _ => (),
            }
        }

        let (first, second, instruction) = match op {
            Arithmetic::Add      => (dest, value, Opcode::AddCommand),
            Arithmetic::Subtract => (value, dest, Opcode::SubtractCommand),
            Arithmetic::Multiply => (dest, value, Opcode::MultiplyCommand),
            Arithmetic::Divide   => (value, dest, Opcode::DivideCommand),
        };
        self.value(first)?;
        self.value(second)?;
        self.code.generate_operator(instruction.id(), 0, 0);
        Ok(())
    }

    /// Emits a jump to be patched later, returning its index.
    fn placeholder(&mut self, conditional: bool) -> usize {
        let index = self.code.next_instruction_offset();
        if conditional {
            self.code.generate_jump_relative_if_false(0);
        } else {
            self.code.generate_jump_relative(0);
        }
        index
    }

    fn patch_to_here(&mut self, jump: usize) -> Result<(), CompileError> {
        let here = self.code.next_instruction_offset();
        self.code.set_jump_address_of_instruction_at(jump, here)
    }

    fn if_(&mut self, condition: &Value, then: &[Command], otherwise: &[Command]) -> Result<(), CompileError> {
        self.value(condition)?;
        let skip_then = self.placeholder(true);
        self.block(then)?;
        let skip_else = self.placeholder(false);
        self.patch_to_here(skip_then)?;
        self.block(otherwise)?;
        self.patch_to_here(skip_else)
    }

    fn while_(&mut self, line: usize, condition: &Value, body: &[Command], step: &[Command]) -> Result<(), CompileError> {
        let start = self.code.next_instruction_offset();
        self.line = line;
        self.code.generate_line_marker(self.file, line);
        self.value(condition)?;
        let leave = self.placeholder(true);

        self.loops.push(Loop::default());
        self.block(body)?;
        let step_start = self.code.next_instruction_offset();
        self.block(step)?;
        let back = self.placeholder(false);
        self.code.set_jump_address_of_instruction_at(back, start)?;
        let finished = self.loops.pop().unwrap_or_default();

        let after = self.code.next_instruction_offset();
        self.code.set_jump_address_of_instruction_at(leave, after)?;
        for exit in finished.exits {
            self.code.set_jump_address_of_instruction_at(exit, after)?;
        }
        for next in finished.nexts {
            self.code.set_jump_address_of_instruction_at(next, step_start)?;
        }
        Ok(())
    }

    pub fn command(&mut self, command: &Command) -> Result<(), CompileError> {
        match command {
            Command::LineMarker(line) => {
                self.line = *line;
                self.code.generate_line_marker(self.file, *line);
            },
            Command::Assign { dest, value } => {
                self.value(value)?;
                let slot = self.slot(dest)?;
                self.code.generate_pop_simple_value_into_variable(slot);
            },
            Command::Put { value, dest } => self.put(value, dest)?,
            Command::Print(value) => {
                self.value(value)?;
                self.code.generate_print();
            },
            Command::Arithmetic { op, dest, value } => self.arithmetic(*op, dest, value)?,
            Command::If { condition, then, otherwise } => self.if_(condition, then, otherwise)?,
            Command::While { line, condition, body, step } => self.while_(*line, condition, body, step)?,
            Command::ExitRepeat => {
                let jump = self.placeholder(false);
                self.loops.last_mut()
                    .ok_or(CompileError::OutsideLoop("exit repeat"))?
                    .exits.push(jump);
            },
            Command::NextRepeat => {
                let jump = self.placeholder(false);
                self.loops.last_mut()
                    .ok_or(CompileError::OutsideLoop("next repeat"))?
                    .nexts.push(jump);
            },
            Command::Return(value) => {
                self.value(value)?;
                self.code.generate_set_return_value();
                self.code.prepare_to_exit_function(self.locals, self.file, self.line);
                self.code.generate_return();
            },
            Command::GetParam { dest, index } => {
                let slot = self.slot(dest)?;
                self.code.generate_parameter_assignment(slot, *index, false);
            },
            Command::ParseError { message, file, line, offset } => {
                self.code.generate_parse_error(message, file, *line, *offset);
            },
            Command::Download { url, dest, progress, completion } => {
                self.value(url)?;
                self.value(dest)?;
                self.code.generate_push_string(progress);
                self.code.generate_push_string(completion);
                self.code.generate_operator(Opcode::Download.id(), 0, 0);
            },
            Command::HostCommand(op) => self.host_entity(op)?,
            Command::Operator(op) => self.operation(op)?,
            Command::AssignChunkArray { dest, kind, value } => {
                self.value(value)?;
                let slot = self.slot(dest)?;
                self.code.generate_assign_chunk_array(slot, *kind);
            },
            Command::GetArrayItem { dest, index, array } => {
                self.value(index)?;
                self.value(array)?;
                let slot = self.slot(dest)?;
                self.code.generate_get_array_item(slot);
            },
            Command::GetArrayItemCount { dest, array } => {
                self.value(array)?;
                let slot = self.slot(dest)?;
                self.code.generate_get_array_item_count(slot);
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::code_block::{Instruction, Script};
    use crate::construct::tree::{ChunkType, PropertyStyle};

    fn generate(commands: &[Command]) -> (Vec<Instruction>, Locals) {
        let mut script = Script::new();
        let mut locals = Locals::new();
        let mut generator = Generator::new(&mut script, &mut locals, "./source");
        generator.block(commands).unwrap();
        (script.pending().to_vec(), locals)
    }

    fn opcodes(instructions: &[Instruction]) -> Vec<Opcode> {
        instructions.iter().filter_map(|i| Opcode::from_id(i.opcode)).collect()
    }

    fn x() -> Value {
        Value::variable("var_x", "x")
    }

    #[test]
    fn put_into_local() {
        let put = Command::Put {
            value: Value::operator(Opcode::Add.id(), vec![Value::integer(1), Value::integer(2)]),
            dest: x(),
        };
        let (code, locals) = generate(&[put]);

        assert_eq!(opcodes(&code), vec![
            Opcode::PushInteger,
            Opcode::PushInteger,
            Opcode::Add,
            Opcode::PopValue,
        ]);
        assert_eq!(code[3].param1, locals.existing_slot("var_x").unwrap() as u16);
    }

    #[test]
    fn if_jumps() {
        let command = Command::If {
            condition: Value::Boolean(true),
            then: vec![Command::Print(Value::integer(1))],
            otherwise: vec![Command::Print(Value::integer(2))],
        };
        let (code, _) = generate(&[command]);

        assert_eq!(opcodes(&code), vec![
            Opcode::PushBoolean,
            Opcode::JumpRelativeIfFalse,
            Opcode::PushInteger,
            Opcode::PrintValue,
            Opcode::JumpRelative,
            Opcode::PushInteger,
            Opcode::PrintValue,
        ]);
        assert_eq!(1 + code[1].offset(), 5);
        assert_eq!(4 + code[4].offset(), 7);
    }

    #[test]
    fn while_jumps() {
        let command = Command::While {
            line: 2,
            condition: Value::Boolean(true),
            body: vec![Command::NextRepeat, Command::ExitRepeat],
            step: vec![Command::Print(Value::integer(1))],
        };
        let (code, _) = generate(&[command]);

        assert_eq!(opcodes(&code), vec![
            Opcode::LineMarker,
            Opcode::PushBoolean,
            Opcode::JumpRelativeIfFalse,
            Opcode::JumpRelative,
            Opcode::JumpRelative,
            Opcode::PushInteger,
            Opcode::PrintValue,
            Opcode::JumpRelative,
        ]);
        assert_eq!(2 + code[2].offset(), 8);
        assert_eq!(3 + code[3].offset(), 5);
        assert_eq!(4 + code[4].offset(), 8);
        assert_eq!(7 + code[7].offset(), 0);
    }

    #[test]
    fn exit_outside_loop() {
        let mut script = Script::new();
        let mut locals = Locals::new();
        let mut generator = Generator::new(&mut script, &mut locals, "./source");
        assert_eq!(
            generator.command(&Command::ExitRepeat),
            Err(CompileError::OutsideLoop("exit repeat")),
        );
    }

    #[test]
    fn calls_push_params_in_reverse() {
        let call = Value::Call(Call {
            name: "foo".to_string(),
            is_command: false,
            pass: false,
            params: vec![Value::string("a"), Value::string("b")],
        });
        let mut script = Script::new();
        let mut locals = Locals::new();
        Generator::new(&mut script, &mut locals, "./source").value(&call).unwrap();

        let dump = script.dump();
        let b = dump.find("\"b\"").unwrap();
        let a = dump.find("\"a\"").unwrap();
        assert!(b < a, "{}", dump);
        assert!(dump.contains("CALL_HANDLER"));
    }

    #[test]
    fn arithmetic_shortcuts_and_orders() {
        let add = Command::Arithmetic { op: Arithmetic::Add, dest: x(), value: Value::integer(3) };
        let subtract = Command::Arithmetic { op: Arithmetic::Subtract, dest: x(), value: Value::integer(3) };
        let (code, _) = generate(&[add, subtract]);

        assert_eq!(opcodes(&code), vec![
            Opcode::AddInteger,
            Opcode::PushInteger,
            Opcode::PushReference,
            Opcode::SubtractCommand,
        ]);
        assert_eq!(code[0].param2, 3);
    }

    #[test]
    fn assignable_destinations() {
        let chunk = Value::Chunk(Chunk {
            mode: ChunkMode::Reference,
            kind: ChunkType::Word,
            start: Box::new(Value::integer(1)),
            end: Box::new(Value::integer(1)),
            target: Box::new(x()),
        });
        let into_chunk = Command::Put { value: Value::string("hi"), dest: chunk };
        let (code, _) = generate(&[into_chunk]);
        assert_eq!(opcodes(&code), vec![
            Opcode::PushInteger,
            Opcode::PushInteger,
            Opcode::PushChunkReference,
            Opcode::PushStrFromTable,
            Opcode::PutValueIntoValue,
        ]);
        assert_eq!(code[2].param2, ChunkType::Word.id());

        let property = Value::object_property("name", PropertyStyle::Plain, x());
        let (code, _) = generate(&[Command::Put { value: Value::integer(1), dest: property }]);
        assert_eq!(opcodes(&code).last(), Some(&Opcode::SetPropertyOfObject));

        let mut script = Script::new();
        let mut locals = Locals::new();
        let mut generator = Generator::new(&mut script, &mut locals, "./source");
        let result = generator.command(&Command::Put { value: Value::integer(1), dest: Value::integer(2) });
        assert!(matches!(result, Err(CompileError::NotAssignable(_))));
    }

    #[test]
    fn chunks_need_a_local() {
        let chunk = Chunk {
            mode: ChunkMode::Reference,
            kind: ChunkType::Line,
            start: Box::new(Value::integer(1)),
            end: Box::new(Value::integer(1)),
            target: Box::new(Value::string("text")),
        };
        let mut script = Script::new();
        let mut locals = Locals::new();
        let mut generator = Generator::new(&mut script, &mut locals, "./source");
        assert!(matches!(
            generator.value(&Value::Chunk(chunk)),
            Err(CompileError::NotAChunkTarget(_)),
        ));
    }

    #[test]
    fn wide_integers() {
        let (code, _) = generate(&[Command::Print(Value::integer(1 << 40))]);
        assert_eq!(opcodes(&code), vec![Opcode::PushInteger64, Opcode::PrintValue]);
    }
}
