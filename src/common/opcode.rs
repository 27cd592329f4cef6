//! The instruction set the code generator targets.
//! Built-in instructions are numbered from zero in the order
//! they are declared here; host extensions get the ids from
//! `FIRST_HOST_INSTRUCTION` upwards (see `GrammarConfig`'s
//! `add_*_and_offset` operations).

/// Numeric id of an instruction, built-in or host-registered.
pub type InstructionId = u16;

/// `param1` value meaning "operate on the value on top of the stack"
/// rather than on a frame slot.
pub const BACK_OF_STACK: u16 = i16::MIN as u16;

/// `CALL_HANDLER` flag bits, stored in `param1`.
pub const CALL_IS_COMMAND: u16 = 0;
pub const CALL_IS_FUNCTION: u16 = 1;
pub const CALL_PASS_MESSAGE: u16 = 2;

macro_rules! opcodes {
    ($( $(#[$doc:meta])* $variant:ident => $name:literal, )*) => {
        /// A built-in instruction.
        /// Under the hood, it's just a `u16`.
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $( $(#[$doc])* $variant, )*
        }

        impl Opcode {
            /// Every built-in, in id order.
            pub const ALL: &'static [Opcode] = &[$( Opcode::$variant, )*];

            /// The mnemonic used in dumps.
            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }
        }
    };
}

opcodes! {
    /// Never emitted; marks "no instruction" in tables loaded from old hosts.
    Invalid => "INVALID",
    /// Do nothing.
    NoOp => "NO_OP",
    /// Push a reference to the frame slot in `param1`.
    PushReference => "PUSH_REFERENCE",
    /// Push entry `param2` of the number table, unit in `param1`.
    PushNumber => "PUSH_NUMBER",
    /// Push the integer in `param2`, unit in `param1`.
    PushInteger => "PUSH_INTEGER",
    /// Push entry `param2` of the integer table, for integers too wide for `param2`.
    PushInteger64 => "PUSH_INTEGER_64",
    /// Push string `param2` of the string table.
    PushStrFromTable => "PUSH_STR_FROM_TABLE",
    /// Push `param2 != 0`.
    PushBoolean => "PUSH_BOOLEAN",
    /// Push the unset value.
    PushUnset => "PUSH_UNSET",
    /// Pop `param2` key/value pairs and push an array built from them.
    PushArrayConstant => "PUSH_ARRAY_CONSTANT",
    /// Push a string from the table as a variant local's initial value.
    PushStrVariantFromTable => "PUSH_STR_VARIANT_FROM_TABLE",
    /// Replace the top of the stack (a name) with a reference to that global.
    PushGlobalReference => "PUSH_GLOBAL_REFERENCE",
    /// Pop into slot `param1`, writing through references,
    /// or just drop the value if `param1` is `BACK_OF_STACK`.
    PopValue => "POP_VALUE",
    /// Pop into slot `param1`, replacing whatever it held.
    PopSimpleValue => "POP_SIMPLE_VALUE",
    /// Copy the value of parameter `param2` (1-based) into slot `param1`.
    Parameter => "PARAMETER",
    /// Make slot `param1` refer to parameter `param2` (1-based).
    ParameterKeepRefs => "PARAMETER_KEEPREFS",
    /// Push the number of parameters passed to this handler.
    ParameterCount => "PARAMETER_COUNT",
    /// Push all parameters as one list.
    PushParameters => "PUSH_PARAMETERS",
    /// Pop the handler's return value.
    SetReturnValue => "SET_RETURN_VALUE",
    /// Leave the handler.
    ReturnFromHandler => "RETURN_FROM_HANDLER",
    /// Call handler `param2` with the flags in `param1`.
    CallHandler => "CALL_HANDLER",
    /// Jump by `param2` (a signed offset) instructions.
    JumpRelative => "JUMP_RELATIVE",
    /// Pop a boolean and jump by `param2` if it is false.
    JumpRelativeIfFalse => "JUMP_RELATIVE_IF_FALSE",
    /// Record that execution reached line `param2` of file `param1`.
    LineMarker => "LINE_MARKER",
    /// Raise the parse error whose message is string `param2`.
    ParseError => "PARSE_ERROR",
    /// Add entry `param2` of the number table to slot `param1`.
    AddNumber => "ADD_NUMBER",
    /// Add the integer in `param2` to slot `param1`.
    AddInteger => "ADD_INTEGER",
    Add => "ADD",
    Subtract => "SUBTRACT",
    Multiply => "MULTIPLY",
    Divide => "DIVIDE",
    Modulo => "MODULO",
    Power => "POWER",
    NegateNumber => "NEGATE_NUMBER",
    NegateBool => "NEGATE_BOOL",
    And => "AND",
    Or => "OR",
    Equal => "EQUAL",
    NotEqual => "NOT_EQUAL",
    LessThan => "LESS_THAN",
    LessThanEqual => "LESS_THAN_EQUAL",
    GreaterThan => "GREATER_THAN",
    GreaterThanEqual => "GREATER_THAN_EQUAL",
    ConcatenateValues => "CONCATENATE_VALUES",
    ConcatenateValuesWithSpace => "CONCATENATE_VALUES_WITH_SPACE",
    /// `add`: add the top value into the reference below it.
    AddCommand => "ADD_COMMAND",
    /// `subtract`: subtract the value below from the reference on top.
    SubtractCommand => "SUBTRACT_COMMAND",
    MultiplyCommand => "MULTIPLY_COMMAND",
    DivideCommand => "DIVIDE_COMMAND",
    /// Pop a value and store it through the reference below it.
    PutValueIntoValue => "PUT_VALUE_INTO_VALUE",
    /// Split the top value into chunks of type `param2`, storing the list in slot `param1`.
    AssignChunkArray => "ASSIGN_CHUNK_ARRAY",
    /// Push a reference to a chunk of type `param2` of slot `param1`.
    PushChunkReference => "PUSH_CHUNK_REFERENCE",
    /// Push a copy of a chunk of type `param2`.
    PushChunk => "PUSH_CHUNK",
    SetChunkProperty => "SET_CHUNK_PROPERTY",
    PushChunkProperty => "PUSH_CHUNK_PROPERTY",
    /// Push the number of chunks of type `param2` in the top value.
    CountChunks => "COUNT_CHUNKS",
    /// Store the item count of the top value in slot `param1`.
    GetArrayItemCount => "GET_ARRAY_ITEM_COUNT",
    /// Store item `index` of `array` in slot `param1`.
    GetArrayItem => "GET_ARRAY_ITEM",
    /// Push the entry for a key of an array.
    GetArrayItemForKey => "GET_ARRAY_ITEM_FOR_KEY",
    IsUnset => "IS_UNSET",
    IsNumber => "IS_NUMBER",
    IsInteger => "IS_INTEGER",
    IsArray => "IS_ARRAY",
    SetItemDelimiter => "SET_ITEMDELIMITER",
    PushItemDelimiter => "PUSH_ITEMDELIMITER",
    /// Push the object the running script belongs to.
    PushMe => "PUSH_ME",
    PushPropertyOfObject => "PUSH_PROPERTY_OF_OBJECT",
    SetPropertyOfObject => "SET_PROPERTY_OF_OBJECT",
    /// Print the top value to the message box or web page.
    PrintValue => "PRINT_VALUE",
    /// Start a download; block handler names are the top two values.
    Download => "DOWNLOAD",
}

/// First id available to host extensions.
pub const FIRST_HOST_INSTRUCTION: InstructionId = Opcode::ALL.len() as InstructionId;

impl Opcode {
    pub fn id(self) -> InstructionId {
        self as InstructionId
    }

    /// Convert a raw id back to a built-in, if it is one.
    pub fn from_id(id: InstructionId) -> Option<Opcode> {
        Opcode::ALL.get(id as usize).copied()
    }
}

impl From<Opcode> for InstructionId {
    fn from(opcode: Opcode) -> InstructionId {
        opcode.id()
    }
}

/// Mnemonic for any instruction id, host ids included.
pub fn instruction_name(id: InstructionId) -> String {
    match Opcode::from_id(id) {
        Some(opcode) => opcode.name().to_string(),
        None => format!("HOST_{}", id - FIRST_HOST_INSTRUCTION),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for (index, opcode) in Opcode::ALL.iter().enumerate() {
            assert_eq!(opcode.id() as usize, index);
            assert_eq!(Opcode::from_id(opcode.id()), Some(*opcode));
        }
        assert_eq!(Opcode::from_id(FIRST_HOST_INSTRUCTION), None);
    }

    #[test]
    fn host_names() {
        assert_eq!(instruction_name(Opcode::Add.id()), "ADD");
        assert_eq!(instruction_name(FIRST_HOST_INSTRUCTION + 3), "HOST_3");
    }
}
