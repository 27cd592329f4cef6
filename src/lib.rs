//! # Thrush
//! This repository contains the front end of a compiler for a
//! HyperTalk-style scripting language: a lexer, a table-driven parser,
//! a rewriting syntax tree and a bytecode emitter.
//! The virtual machine that runs the emitted instructions lives elsewhere;
//! this crate only promises the *shape* of the instruction stream.
//!
//! ## Compiling a script
//! Add thrush to your `Cargo.toml`:
//! ```toml
//! thrush = "0.3"
//! ```
//! Then:
//! ```ignore
//! use thrush::{common::source::Source, compiler::{compile, CompileOptions, grammar::GrammarConfig}};
//!
//! let grammar = GrammarConfig::default();
//! let source = Source::source("on mouseUp\n  put 1 + 2 into x\nend mouseUp\n");
//! let compiled = compile(source, &grammar, &CompileOptions::default())?;
//! println!("{}", compiled.script.dump());
//! ```
//!
//! ## Overview of the compilation process
//! Within the compiler pipeline, source code is represented as a `Source` object.
//! 1. The `Lexer` turns it into `Spanned<Token>`s, folding keyword synonyms
//!    through the `GrammarConfig`.
//! 2. The `Parser` builds a `ParseTree`: one `FunctionDefinition` per handler,
//!    each owning its body of `Command`s and its table of locals.
//! 3. `ParseTree::simplify` runs the transformation `Rule`s bottom-up and
//!    assigns local-variable slots.
//! 4. `ParseTree::generate_code` walks every handler into a `CodeBlock`,
//!    by default the recording `Script`.
//!
//! Hosts extend the grammar with their own commands, functions, properties
//! and operators, either in code or from a TOML `HostExtension`.

pub mod common;
pub mod compiler;
pub mod construct;
