use std::fmt::Write;

use log::debug;

use crate::common::opcode::{
    instruction_name,
    InstructionId,
    Opcode,
    BACK_OF_STACK,
    CALL_IS_COMMAND,
    CALL_IS_FUNCTION,
    CALL_PASS_MESSAGE,
};
use crate::compiler::syntax::CompileError;
use crate::construct::{
    tree::ChunkType,
    variable::Locals,
};

/// Where generated code goes.
/// Calls arrive in the order the instructions run;
/// the only thing ever rewritten afterwards is a jump's offset.
pub trait CodeBlock {
    /// Opens a handler and initializes the locals that have a slot.
    fn generate_function_prolog(&mut self, is_command: bool, name: &str, locals: &Locals, file: &str, line: usize);
    /// Releases the locals, returns `""` and closes the handler.
    fn generate_function_epilog(&mut self, is_command: bool, name: &str, locals: &Locals, file: &str, line: usize);
    /// Releases the locals ahead of a `return` in the middle of a handler.
    fn prepare_to_exit_function(&mut self, locals: &Locals, file: &str, line: usize);

    fn generate_push_int(&mut self, value: i32, unit: u16);
    fn generate_push_int64(&mut self, value: i64, unit: u16);
    fn generate_push_float(&mut self, value: f64, unit: u16);
    fn generate_push_bool(&mut self, value: bool);
    fn generate_push_string(&mut self, value: &str);
    fn generate_push_unset(&mut self);
    fn generate_push_variable(&mut self, slot: i16);

    /// Replaces the slot's value; references to the slot stay valid.
    fn generate_pop_simple_value_into_variable(&mut self, slot: i16);
    /// Writes through the reference the slot holds, if any.
    fn generate_pop_into_variable(&mut self, slot: i16);
    /// Drops the top of the stack.
    fn generate_pop_value(&mut self);

    /// Parameters and their count must already be on the stack.
    fn generate_call(&mut self, is_command: bool, pass: bool, name: &str);
    fn generate_operator(&mut self, instruction: InstructionId, param1: u16, param2: u32);
    /// `index` counts from 0.
    fn generate_parameter_assignment(&mut self, slot: i16, index: usize, keep_refs: bool);
    fn generate_set_return_value(&mut self);
    fn generate_return(&mut self);

    /// Index the next instruction will land at, for jumps.
    fn next_instruction_offset(&self) -> usize;
    fn generate_jump_relative(&mut self, offset: i32);
    fn generate_jump_relative_if_false(&mut self, offset: i32);
    /// Retargets the jump at `index` to land on `target`.
    fn set_jump_address_of_instruction_at(&mut self, index: usize, target: usize) -> Result<(), CompileError>;

    fn generate_add_number(&mut self, slot: i16, value: f64);
    fn generate_add_integer(&mut self, slot: i16, value: i32);
    fn generate_line_marker(&mut self, file: &str, line: usize);

    fn generate_assign_chunk_array(&mut self, slot: i16, kind: ChunkType);
    /// `param1` is a slot, or `BACK_OF_STACK` for a chunk of a chunk.
    fn generate_push_chunk_reference(&mut self, param1: u16, kind: ChunkType);
    fn generate_push_chunk(&mut self, kind: ChunkType);
    fn generate_push_chunk_property(&mut self, kind: ChunkType);
    fn generate_push_array_constant(&mut self, count: usize);
    fn generate_get_array_item(&mut self, slot: i16);
    fn generate_get_array_item_count(&mut self, slot: i16);
    fn generate_put_value_into_value(&mut self);

    fn generate_push_property_of_object(&mut self, style: u16);
    fn generate_set_property_of_object(&mut self);
    fn generate_push_me(&mut self);
    fn generate_print(&mut self);
    fn generate_parse_error(&mut self, message: &str, file: &str, line: usize, offset: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: InstructionId,
    pub param1: u16,
    pub param2: u32,
}

impl Instruction {
    pub fn new(opcode: impl Into<InstructionId>, param1: u16, param2: u32) -> Instruction {
        Instruction { opcode: opcode.into(), param1, param2 }
    }

    pub fn is(&self, opcode: Opcode) -> bool {
        self.opcode == opcode.id()
    }

    /// The signed offset of a jump.
    pub fn offset(&self) -> i32 {
        self.param2 as i32
    }
}

/// One compiled handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Handler {
    pub name: String,
    pub is_command: bool,
    pub instructions: Vec<Instruction>,
    /// Display names of the locals, by slot.
    pub variable_names: Vec<String>,
}

/// A `CodeBlock` that records everything it is sent.
/// Constants are interned into tables that instructions index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub strings: Vec<String>,
    pub numbers: Vec<f64>,
    pub integers: Vec<i64>,
    pub files: Vec<String>,
    pub handler_names: Vec<String>,
    pub handlers: Vec<Handler>,
    building: Option<Handler>,
}

fn intern<T: PartialEq + Clone>(table: &mut Vec<T>, item: &T) -> u32 {
    match table.iter().position(|t| t == item) {
        Some(index) => index as u32,
        None => {
            table.push(item.clone());
            (table.len() - 1) as u32
        },
    }
}

impl Script {
    pub fn new() -> Script {
        Script::default()
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.name == name)
    }

    /// Instructions of the handler still being generated.
    pub fn pending(&self) -> &[Instruction] {
        self.building.as_ref().map_or(&[], |h| h.instructions.as_slice())
    }

    /// The handler being generated, opened implicitly when
    /// instructions arrive without a prolog.
    fn current(&mut self) -> &mut Handler {
        self.building.get_or_insert_with(Handler::default)
    }

    fn emit(&mut self, opcode: impl Into<InstructionId>, param1: u16, param2: u32) {
        self.current().instructions.push(Instruction::new(opcode, param1, param2));
    }

    fn string_index(&mut self, string: &str) -> u32 {
        intern(&mut self.strings, &string.to_string())
    }

    fn file_index(&mut self, file: &str) -> u16 {
        intern(&mut self.files, &file.to_string()) as u16
    }

    fn handler_index(&mut self, name: &str) -> u32 {
        intern(&mut self.handler_names, &name.to_lowercase())
    }

    /// A table of every handler's instructions, for inspection.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let handlers = self.handlers.iter().chain(self.building.iter());

        for handler in handlers {
            let _ = writeln!(
                out,
                "{} {} ({} locals)",
                if handler.is_command { "on" } else { "function" },
                handler.name,
                handler.variable_names.len(),
            );
            let _ = writeln!(out, "Index\tInst.                       \tParam 1\tParam 2\tComment");
            let _ = writeln!(out, "---");
            for (index, instruction) in handler.instructions.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}\t{:<28}\t{}\t{}\t{}",
                    index,
                    instruction_name(instruction.opcode),
                    self.param1_text(instruction.param1),
                    instruction.param2,
                    self.comment(handler, index, instruction),
                );
            }
            out.push('\n');
        }

        out
    }

    fn param1_text(&self, param1: u16) -> String {
        if param1 == BACK_OF_STACK {
            "BOS".to_string()
        } else {
            param1.to_string()
        }
    }

    fn comment(&self, handler: &Handler, index: usize, instruction: &Instruction) -> String {
        let string = |i: u32| self.strings.get(i as usize).map(|s| format!("{:?}", s));
        let local = |p: u16| handler.variable_names.get(p as usize).cloned();

        let comment = match Opcode::from_id(instruction.opcode) {
            Some(Opcode::PushStrFromTable)
            | Some(Opcode::PushStrVariantFromTable)
            | Some(Opcode::ParseError) => string(instruction.param2),
            Some(Opcode::PushNumber) => self.numbers.get(instruction.param2 as usize).map(f64::to_string),
            Some(Opcode::PushInteger64) => self.integers.get(instruction.param2 as usize).map(i64::to_string),
            Some(Opcode::PushInteger) => Some((instruction.param2 as i32).to_string()),
            Some(Opcode::CallHandler) => self.handler_names.get(instruction.param2 as usize).cloned(),
            Some(Opcode::JumpRelative) | Some(Opcode::JumpRelativeIfFalse) => {
                Some(format!("to {}", index as i64 + instruction.offset() as i64))
            },
            Some(Opcode::LineMarker) => self.files
                .get(instruction.param1 as usize)
                .map(|f| format!("{}:{}", f, instruction.param2)),
            Some(Opcode::PushReference)
            | Some(Opcode::PopValue)
            | Some(Opcode::PopSimpleValue)
            | Some(Opcode::Parameter)
            | Some(Opcode::ParameterKeepRefs)
            | Some(Opcode::AddInteger)
            | Some(Opcode::AddNumber) => local(instruction.param1),
            _ => None,
        };

        comment.unwrap_or_default()
    }
}

impl CodeBlock for Script {
    fn generate_function_prolog(&mut self, is_command: bool, name: &str, locals: &Locals, file: &str, line: usize) {
        debug!("generating {} {}", if is_command { "command" } else { "function" }, name);
        self.building = Some(Handler {
            name: name.to_string(),
            is_command,
            instructions: vec![],
            variable_names: vec![],
        });

        self.generate_line_marker(file, line);
        for (key, entry) in locals.in_slot_order() {
            if entry.is_global {
                let global = self.string_index(&entry.display_name);
                self.emit(Opcode::PushStrVariantFromTable, 0, global);
                self.emit(Opcode::PushGlobalReference, 0, 0);
            } else {
                let initial = if entry.init_with_own_name { entry.display_name.as_str() } else { "" };
                let initial = self.string_index(initial);
                self.emit(Opcode::PushStrVariantFromTable, 0, initial);
            }
            self.current().variable_names.push(
                if entry.display_name.is_empty() { key.to_string() } else { entry.display_name.clone() }
            );
        }
    }

    fn generate_function_epilog(&mut self, _is_command: bool, _name: &str, locals: &Locals, file: &str, line: usize) {
        self.prepare_to_exit_function(locals, file, line);
        self.generate_push_string("");
        self.generate_set_return_value();
        self.emit(Opcode::ReturnFromHandler, BACK_OF_STACK, 0);

        if let Some(handler) = self.building.take() {
            debug!("{} is {} instructions long", handler.name, handler.instructions.len());
            self.handlers.push(handler);
        }
    }

    fn prepare_to_exit_function(&mut self, locals: &Locals, file: &str, line: usize) {
        self.generate_line_marker(file, line);
        for _ in 0..locals.num_slots() {
            self.generate_pop_value();
        }
    }

    fn generate_push_int(&mut self, value: i32, unit: u16) {
        self.emit(Opcode::PushInteger, unit, value as u32);
    }

    fn generate_push_int64(&mut self, value: i64, unit: u16) {
        let index = intern(&mut self.integers, &value);
        self.emit(Opcode::PushInteger64, unit, index);
    }

    fn generate_push_float(&mut self, value: f64, unit: u16) {
        let index = intern(&mut self.numbers, &value);
        self.emit(Opcode::PushNumber, unit, index);
    }

    fn generate_push_bool(&mut self, value: bool) {
        self.emit(Opcode::PushBoolean, 0, value as u32);
    }

    fn generate_push_string(&mut self, value: &str) {
        let index = self.string_index(value);
        self.emit(Opcode::PushStrFromTable, 0, index);
    }

    fn generate_push_unset(&mut self) {
        self.emit(Opcode::PushUnset, 0, 0);
    }

    fn generate_push_variable(&mut self, slot: i16) {
        self.emit(Opcode::PushReference, slot as u16, 0);
    }

    fn generate_pop_simple_value_into_variable(&mut self, slot: i16) {
        self.emit(Opcode::PopSimpleValue, slot as u16, 0);
    }

    fn generate_pop_into_variable(&mut self, slot: i16) {
        self.emit(Opcode::PopValue, slot as u16, 0);
    }

    fn generate_pop_value(&mut self) {
        self.emit(Opcode::PopValue, BACK_OF_STACK, 0);
    }

    fn generate_call(&mut self, is_command: bool, pass: bool, name: &str) {
        let mut flags = if is_command { CALL_IS_COMMAND } else { CALL_IS_FUNCTION };
        if pass {
            flags |= CALL_PASS_MESSAGE;
        }
        let handler = self.handler_index(name);
        self.emit(Opcode::CallHandler, flags, handler);
    }

    fn generate_operator(&mut self, instruction: InstructionId, param1: u16, param2: u32) {
        self.emit(instruction, param1, param2);
    }

    fn generate_parameter_assignment(&mut self, slot: i16, index: usize, keep_refs: bool) {
        let opcode = if keep_refs { Opcode::ParameterKeepRefs } else { Opcode::Parameter };
        self.emit(opcode, slot as u16, index as u32 + 1);
    }

    fn generate_set_return_value(&mut self) {
        self.emit(Opcode::SetReturnValue, 0, 0);
    }

    fn generate_return(&mut self) {
        self.emit(Opcode::ReturnFromHandler, 0, 0);
    }

    fn next_instruction_offset(&self) -> usize {
        self.building.as_ref().map_or(0, |h| h.instructions.len())
    }

    fn generate_jump_relative(&mut self, offset: i32) {
        self.emit(Opcode::JumpRelative, BACK_OF_STACK, offset as u32);
    }

    fn generate_jump_relative_if_false(&mut self, offset: i32) {
        self.emit(Opcode::JumpRelativeIfFalse, BACK_OF_STACK, offset as u32);
    }

    fn set_jump_address_of_instruction_at(&mut self, index: usize, target: usize) -> Result<(), CompileError> {
        let instruction = self.current()
            .instructions
            .get_mut(index)
            .ok_or(CompileError::NotAJump(index))?;

        if !instruction.is(Opcode::JumpRelative) && !instruction.is(Opcode::JumpRelativeIfFalse) {
            return Err(CompileError::NotAJump(index));
        }

        instruction.param2 = (target as i64 - index as i64) as i32 as u32;
        Ok(())
    }

    fn generate_add_number(&mut self, slot: i16, value: f64) {
        let index = intern(&mut self.numbers, &value);
        self.emit(Opcode::AddNumber, slot as u16, index);
    }

    fn generate_add_integer(&mut self, slot: i16, value: i32) {
        self.emit(Opcode::AddInteger, slot as u16, value as u32);
    }

    fn generate_line_marker(&mut self, file: &str, line: usize) {
        let file = self.file_index(file);
        self.emit(Opcode::LineMarker, file, line as u32);
    }

    fn generate_assign_chunk_array(&mut self, slot: i16, kind: ChunkType) {
        self.emit(Opcode::AssignChunkArray, slot as u16, kind.id());
    }

    fn generate_push_chunk_reference(&mut self, param1: u16, kind: ChunkType) {
        self.emit(Opcode::PushChunkReference, param1, kind.id());
    }

    fn generate_push_chunk(&mut self, kind: ChunkType) {
        self.emit(Opcode::PushChunk, BACK_OF_STACK, kind.id());
    }

    fn generate_push_chunk_property(&mut self, kind: ChunkType) {
        self.emit(Opcode::PushChunkProperty, BACK_OF_STACK, kind.id());
    }

    fn generate_push_array_constant(&mut self, count: usize) {
        self.emit(Opcode::PushArrayConstant, 0, count as u32);
    }

    fn generate_get_array_item(&mut self, slot: i16) {
        self.emit(Opcode::GetArrayItem, slot as u16, 0);
    }

    fn generate_get_array_item_count(&mut self, slot: i16) {
        self.emit(Opcode::GetArrayItemCount, slot as u16, 0);
    }

    fn generate_put_value_into_value(&mut self) {
        self.emit(Opcode::PutValueIntoValue, 0, 0);
    }

    fn generate_push_property_of_object(&mut self, style: u16) {
        self.emit(Opcode::PushPropertyOfObject, style, 0);
    }

    fn generate_set_property_of_object(&mut self) {
        self.emit(Opcode::SetPropertyOfObject, 0, 0);
    }

    fn generate_push_me(&mut self) {
        self.emit(Opcode::PushMe, 0, 0);
    }

    fn generate_print(&mut self) {
        self.emit(Opcode::PrintValue, BACK_OF_STACK, 0);
    }

    fn generate_parse_error(&mut self, message: &str, file: &str, line: usize, offset: usize) {
        self.generate_line_marker(file, line);
        let message = self.string_index(message);
        self.emit(Opcode::ParseError, offset.min(u16::MAX as usize) as u16, message);
    }
}
