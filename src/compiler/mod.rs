//! This module contains the compiler implementation.
//!
//! Each step in the compiler pipeline turns one datatype into another,
//! starting with `Source` (string + path):
//!
//! 1. Tokens:     `lex.rs`, driven by the tables in `grammar.rs`
//! 2. Parse tree: `parse/`
//! 3. Simplified parse tree: `ParseTree::simplify` with the rules in `construct::transform`
//! 4. Bytecode:   `gen.rs`, into any `CodeBlock` (`code_block.rs`)
//!
//! `compile` and friends run the whole pipeline.

use std::rc::Rc;

use log::info;

use crate::common::source::Source;
use crate::construct::{parse_tree::ParseTree, transform::build_default_transformations};

pub mod code_block;
pub mod gen;
pub mod grammar;
pub mod lex;
pub mod parse;
pub mod syntax;

pub use code_block::{CodeBlock, Script};
pub use grammar::GrammarConfig;
pub use parse::{Include, Parser};
pub use syntax::{Diagnostic, Severity};

use syntax::ParseResult;

/// How a compile should go.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Run the default transformation rules before generating code.
    pub optimize: bool,
    /// Treat lines outside handlers as page text to print.
    pub web_embedding: bool,
    /// Name diagnostics and line markers use instead of the source's path.
    pub file_name: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            optimize: true,
            web_embedding: false,
            file_name: None,
        }
    }
}

/// Everything a successful compile produces.
/// `diagnostics` holds warnings and the errors of handlers that
/// were replaced by a `PARSE_ERROR` instruction.
#[derive(Debug)]
pub struct Compiled {
    pub tree: ParseTree,
    pub script: Script,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles a whole script.
/// Fails with a single diagnostic only when nothing sensible can be generated.
pub fn compile(source: Rc<Source>, grammar: &GrammarConfig, options: &CompileOptions) -> Result<Compiled, Diagnostic> {
    let file = file_name(&source, options);
    let parsed = parser(source, grammar, options).parse();
    finish(parsed, &file, options)
}

/// Like `compile`, resolving `use "file"` lines through `include`.
pub fn compile_with_includes(
    source: Rc<Source>,
    grammar: &GrammarConfig,
    options: &CompileOptions,
    include: &mut dyn Include,
) -> Result<Compiled, Diagnostic> {
    let file = file_name(&source, options);
    let parsed = parser(source, grammar, options).with_include(include).parse();
    finish(parsed, &file, options)
}

/// Compiles a command or expression typed by the user
/// into a single `:run` handler.
pub fn compile_command_or_expression(
    source: Rc<Source>,
    grammar: &GrammarConfig,
    options: &CompileOptions,
) -> Result<Compiled, Diagnostic> {
    let file = file_name(&source, options);
    let parsed = parser(source, grammar, options).parse_command_or_expression();
    finish(parsed, &file, options)
}

fn file_name(source: &Source, options: &CompileOptions) -> String {
    options.file_name.clone().unwrap_or_else(|| source.name())
}

fn parser<'a>(source: Rc<Source>, grammar: &'a GrammarConfig, options: &CompileOptions) -> Parser<'a> {
    let parser = Parser::new(source, grammar).web_embedding(options.web_embedding);
    match &options.file_name {
        Some(file) => parser.file_name(file),
        None => parser,
    }
}

fn finish(
    parsed: ParseResult<(ParseTree, Vec<Diagnostic>)>,
    file: &str,
    options: &CompileOptions,
) -> Result<Compiled, Diagnostic> {
    let (mut tree, diagnostics) = parsed.map_err(|error| Diagnostic::from_parse_error(&error, file))?;

    let rules = if options.optimize { build_default_transformations() } else { vec![] };
    tree.simplify(&rules);

    let mut script = Script::new();
    tree.generate_code(&mut script)
        .map_err(|error| Diagnostic::error(error.to_string(), file, 0, None))?;

    info!(
        "compiled {}: {} handlers, {} diagnostics",
        file,
        tree.functions().len(),
        diagnostics.len(),
    );
    Ok(Compiled { tree, script, diagnostics })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::opcode::Opcode;

    fn opcodes(script: &Script, handler: &str) -> Vec<Opcode> {
        script.handler(handler)
            .map(|h| h.instructions.iter().filter_map(|i| Opcode::from_id(i.opcode)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn optimize_folds_constants() {
        let grammar = GrammarConfig::default();
        let source = || Source::source("on go\n  put \"a\" & \"b\" into x\nend go\n");

        let folded = compile(source(), &grammar, &CompileOptions::default()).unwrap();
        assert!(!opcodes(&folded.script, "go").contains(&Opcode::ConcatenateValues));

        let options = CompileOptions { optimize: false, ..CompileOptions::default() };
        let unfolded = compile(source(), &grammar, &options).unwrap();
        assert!(opcodes(&unfolded.script, "go").contains(&Opcode::ConcatenateValues));
    }

    #[test]
    fn handler_errors_are_diagnostics() {
        let grammar = GrammarConfig::default();
        let options = CompileOptions { file_name: Some("stack".into()), ..CompileOptions::default() };
        let compiled = compile(Source::source("on go\n  put 1 intoo x\nend go\n"), &grammar, &options).unwrap();

        assert_eq!(compiled.diagnostics.len(), 1);
        assert_eq!(compiled.diagnostics[0].file, "stack");
        assert!(opcodes(&compiled.script, "go").contains(&Opcode::ParseError));

        let handler = compiled.script.handler("go").unwrap();
        let epilog = handler.instructions.iter().rev().find(|i| i.is(Opcode::LineMarker)).unwrap();
        assert_eq!(epilog.param2, 3);
    }

    #[test]
    fn generation_errors_fail_the_compile() {
        let grammar = GrammarConfig::default();
        let error = compile(Source::source("on go\n  exit repeat\nend go\n"), &grammar, &CompileOptions::default())
            .unwrap_err();
        assert_eq!(error.message, "\"exit repeat\" can only be used inside a repeat loop.");
    }

    #[test]
    fn counted_loops_step_a_hidden_counter() {
        let grammar = GrammarConfig::default();
        let source = Source::source("on go\n  repeat with i = 1 to 3\n    put i\n  end repeat\n  put i\nend go\n");
        let compiled = compile(source, &grammar, &CompileOptions::default()).unwrap();
        let handler = compiled.script.handler("go").unwrap();
        let slot = |name: &str| handler.variable_names.iter().position(|n| n == name).unwrap() as u16;

        let step = handler.instructions.iter().find(|i| i.is(Opcode::AddInteger)).unwrap();
        assert_eq!(step.param1, slot("temp:1"));

        let test = handler.instructions.iter().position(|i| i.is(Opcode::JumpRelativeIfFalse)).unwrap();
        let copy = &handler.instructions[test + 1..test + 3];
        assert!(copy[0].is(Opcode::PushReference));
        assert_eq!(copy[0].param1, slot("temp:1"));
        assert!(copy[1].is(Opcode::PopValue));
        assert_eq!(copy[1].param1, slot("i"));
    }

    #[test]
    fn nested_properties_read_one_key_path() {
        let grammar = GrammarConfig::default();
        let source = Source::source("on go\n  put the a of the b of x into y\nend go\n");
        let compiled = compile(source, &grammar, &CompileOptions::default()).unwrap();
        assert!(compiled.diagnostics.is_empty());

        let ops = opcodes(&compiled.script, "go");
        assert_eq!(ops.iter().filter(|op| **op == Opcode::PushPropertyOfObject).count(), 1);
        assert!(ops.windows(2).any(|w| w == [Opcode::PushStrFromTable, Opcode::PushArrayConstant]));

        let handler = compiled.script.handler("go").unwrap();
        let path = handler.instructions.iter().position(|i| i.is(Opcode::PushArrayConstant)).unwrap();
        assert_eq!(handler.instructions[path].param2, 2);
    }

    #[test]
    fn ad_hoc_commands() {
        let grammar = GrammarConfig::default();
        let compiled = compile_command_or_expression(Source::source("2 * 3"), &grammar, &CompileOptions::default())
            .unwrap();
        assert!(opcodes(&compiled.script, parse::RUN_HANDLER).contains(&Opcode::Multiply));
    }
}
