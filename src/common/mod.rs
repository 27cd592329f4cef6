//! Contains datastructures and utility functions
//! shared by the `compiler` and the `construct`s it builds.
//!
//! - Source code representation and span annotations.
//! - The instruction set the code generator targets.

pub mod source;
pub mod span;
pub mod opcode;
