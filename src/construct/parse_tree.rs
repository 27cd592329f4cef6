use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::compiler::{
    code_block::CodeBlock,
    gen::Generator,
    syntax::CompileError,
};
use crate::construct::{
    transform::Rule,
    tree::Command,
    variable::Locals,
};

/// One handler: `on`, `to` and `when` make commands, `function` makes functions.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// Lowercased, as the handler is looked up.
    pub name: String,
    /// As the script spelled it.
    pub user_name: String,
    pub is_command: bool,
    pub file: String,
    pub line: usize,
    /// Line of the `end`, where the epilog is attributed.
    pub end_line: usize,
    pub locals: Locals,
    pub body: Vec<Command>,
}

impl FunctionDefinition {
    pub fn new(user_name: &str, is_command: bool, file: &str, line: usize) -> FunctionDefinition {
        FunctionDefinition {
            name: user_name.to_lowercase(),
            user_name: user_name.to_string(),
            is_command,
            file: file.to_string(),
            line,
            end_line: line,
            locals: Locals::new(),
            body: vec![],
        }
    }

    pub fn simplify(&mut self, rules: &[Rule]) {
        for command in self.body.iter_mut() {
            command.simplify(rules, &mut self.locals);
        }
    }

    pub fn generate_code(&mut self, code: &mut dyn CodeBlock) -> Result<(), CompileError> {
        let mut generator = Generator::new(code, &mut self.locals, &self.file);
        generator.function(self.is_command, &self.name, &self.body, self.line, self.end_line)
    }

    pub fn debug_print(&self, indent: usize) -> String {
        let header = format!(
            "{}{} {} (line {}, {} locals)\n",
            "  ".repeat(indent),
            if self.is_command { "on" } else { "function" },
            self.user_name,
            self.line,
            self.locals.num_slots(),
        );
        let body = self.body
            .iter()
            .map(|c| c.debug_print(indent + 1))
            .collect::<String>();
        header + &body
    }
}

/// Everything parsed from one compilation unit.
/// Owns every handler; `index` finds them by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseTree {
    functions: Vec<FunctionDefinition>,
    index: HashMap<String, usize>,
    /// Key to display name. Only ever grows.
    globals: BTreeMap<String, String>,
    unique: usize,
}

impl ParseTree {
    pub fn new() -> ParseTree {
        ParseTree::default()
    }

    /// Adds a handler, handing it back if one with the same name exists.
    pub fn add_function(&mut self, function: FunctionDefinition) -> Result<(), FunctionDefinition> {
        if self.index.contains_key(&function.name) {
            return Err(function);
        }
        debug!("adding handler {}", function.name);
        self.index.insert(function.name.clone(), self.functions.len());
        self.functions.push(function);
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.index.get(&name.to_lowercase()).map(|i| &self.functions[*i])
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut FunctionDefinition> {
        match self.index.get(&name.to_lowercase()) {
            Some(i) => self.functions.get_mut(*i),
            None => None,
        }
    }

    pub fn functions(&self) -> &[FunctionDefinition] {
        &self.functions
    }

    pub fn declare_global(&mut self, key: &str, name: &str) {
        self.globals
            .entry(key.to_string())
            .or_insert_with(|| name.to_string());
    }

    pub fn globals(&self) -> &BTreeMap<String, String> {
        &self.globals
    }

    /// A name no script can spell, like `temp:3`.
    pub fn unique_identifier_based_on(&mut self, base: &str) -> String {
        self.unique += 1;
        format!("{}:{}", base, self.unique)
    }

    pub fn simplify(&mut self, rules: &[Rule]) {
        for function in self.functions.iter_mut() {
            function.simplify(rules);
        }
    }

    pub fn generate_code(&mut self, code: &mut dyn CodeBlock) -> Result<(), CompileError> {
        for function in self.functions.iter_mut() {
            function.generate_code(code)?;
        }
        Ok(())
    }

    pub fn debug_print(&self) -> String {
        self.functions.iter().map(|f| f.debug_print(0)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::code_block::Script;
    use crate::construct::tree::Value;

    #[test]
    fn names_are_unique() {
        let mut tree = ParseTree::new();
        assert!(tree.add_function(FunctionDefinition::new("Go", true, "./source", 1)).is_ok());
        assert!(tree.add_function(FunctionDefinition::new("go", false, "./source", 5)).is_err());
        assert_eq!(tree.functions().len(), 1);
        assert_eq!(tree.function("GO").map(|f| f.user_name.as_str()), Some("Go"));
    }

    #[test]
    fn globals_accumulate() {
        let mut tree = ParseTree::new();
        tree.declare_global("var_a", "a");
        tree.declare_global("var_a", "A");
        tree.declare_global("var_b", "b");
        assert_eq!(tree.globals().len(), 2);
        assert_eq!(tree.globals()["var_a"], "a");
    }

    #[test]
    fn unique_identifiers() {
        let mut tree = ParseTree::new();
        let a = tree.unique_identifier_based_on("temp");
        let b = tree.unique_identifier_based_on("temp");
        assert_ne!(a, b);
        assert!(a.starts_with("temp:"));
    }

    #[test]
    fn generates_every_handler() {
        let mut tree = ParseTree::new();
        let mut go = FunctionDefinition::new("go", true, "./source", 1);
        go.body.push(Command::Print(Value::variable("var_x", "x")));
        tree.add_function(go).unwrap();
        tree.add_function(FunctionDefinition::new("stop", true, "./source", 4)).unwrap();

        tree.simplify(&[]);
        let mut script = Script::new();
        tree.generate_code(&mut script).unwrap();

        assert_eq!(script.handlers.len(), 2);
        assert_eq!(script.handler("go").map(|h| h.variable_names.len()), Some(1));
    }
}
