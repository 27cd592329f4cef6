use std::collections::BTreeMap;

use log::debug;

use crate::compiler::syntax::CompileError;

/// What a local was declared as.
/// Nothing checks this yet, it is carried for the VM's debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Variant,
    Integer,
    Array,
}

/// Everything known about one local of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableEntry {
    pub display_name: String,
    pub declared_type: VariableType,
    /// Undeclared HyperTalk variables evaluate to their own name.
    pub init_with_own_name: bool,
    pub is_parameter: bool,
    pub is_global: bool,
    pub keep_alive_past_scope: bool,
    /// Frame slot, assigned the first time the variable is referenced.
    pub slot: Option<i16>,
}

impl VariableEntry {
    pub fn new(display_name: &str) -> VariableEntry {
        VariableEntry {
            display_name: display_name.to_string(),
            declared_type: VariableType::Variant,
            init_with_own_name: false,
            is_parameter: false,
            is_global: false,
            keep_alive_past_scope: false,
            slot: None,
        }
    }

    pub fn typed(mut self, declared_type: VariableType) -> VariableEntry {
        self.declared_type = declared_type;
        self
    }

    pub fn with_own_name(mut self) -> VariableEntry {
        self.init_with_own_name = true;
        self
    }

    pub fn parameter(mut self) -> VariableEntry {
        self.is_parameter = true;
        self
    }

    pub fn global(mut self) -> VariableEntry {
        self.is_global = true;
        self
    }

    pub fn keep_alive(mut self) -> VariableEntry {
        self.keep_alive_past_scope = true;
        self
    }
}

/// The locals of one handler, keyed by their internal name
/// (`var_` plus the lowercased script name for user variables).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locals {
    variables: BTreeMap<String, VariableEntry>,
    next_slot: i16,
}

impl Locals {
    pub fn new() -> Locals {
        Locals::default()
    }

    /// Adds a local unless one with this key exists already.
    /// Returns whether it was added.
    pub fn declare(&mut self, key: &str, entry: VariableEntry) -> bool {
        if self.variables.contains_key(key) {
            return false;
        }
        self.variables.insert(key.to_string(), entry);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&VariableEntry> {
        self.variables.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut VariableEntry> {
        self.variables.get_mut(key)
    }

    /// The slot of `key`, assigning the next free one on first use.
    /// Keys nobody declared become plain variants.
    pub fn slot(&mut self, key: &str) -> Result<i16, CompileError> {
        if let Some(slot) = self.existing_slot(key) {
            return Ok(slot);
        }

        let slot = self.next_slot;
        self.next_slot = slot.checked_add(1).ok_or(CompileError::TooManyLocals)?;
        self.variables
            .entry(key.to_string())
            .or_insert_with(|| VariableEntry::new(key))
            .slot = Some(slot);
        Ok(slot)
    }

    /// Like `slot`, for passes that only number locals.
    /// Running out is reported when code is generated.
    pub fn reserve(&mut self, key: &str) {
        if self.slot(key).is_err() {
            debug!("no slot left for {}", key);
        }
    }

    /// Slot of an already-referenced local, without assigning one.
    pub fn existing_slot(&self, key: &str) -> Option<i16> {
        self.variables.get(key).and_then(|v| v.slot)
    }

    /// How many locals have a slot, which is the frame size.
    pub fn num_slots(&self) -> usize {
        self.next_slot as usize
    }

    /// Every local that has a slot, in slot order.
    pub fn in_slot_order(&self) -> Vec<(&str, &VariableEntry)> {
        let mut slotted = self.variables
            .iter()
            .filter(|(_, v)| v.slot.is_some())
            .map(|(k, v)| (k.as_str(), v))
            .collect::<Vec<_>>();
        slotted.sort_by_key(|(_, v)| v.slot);
        slotted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariableEntry)> {
        self.variables.iter()
    }
}

/// Internal key for a variable named in a script.
pub fn variable_key(name: &str) -> String {
    format!("var_{}", name.to_lowercase())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lazy_contiguous_slots() {
        let mut locals = Locals::new();
        locals.declare("var_a", VariableEntry::new("a"));
        locals.declare("var_b", VariableEntry::new("b"));
        locals.declare("var_unused", VariableEntry::new("unused"));

        assert_eq!(locals.slot("var_b").unwrap(), 0);
        assert_eq!(locals.slot("var_a").unwrap(), 1);
        assert_eq!(locals.slot("var_b").unwrap(), 0);
        assert_eq!(locals.num_slots(), 2);
        assert_eq!(locals.existing_slot("var_unused"), None);

        let order = locals.in_slot_order()
            .into_iter()
            .map(|(k, _)| k)
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["var_b", "var_a"]);
    }

    #[test]
    fn running_out_of_slots() {
        let mut locals = Locals::new();
        locals.next_slot = i16::MAX - 1;

        assert_eq!(locals.slot("var_a").unwrap(), i16::MAX - 1);
        assert!(matches!(locals.slot("var_b"), Err(CompileError::TooManyLocals)));
        assert_eq!(locals.existing_slot("var_b"), None);
        assert_eq!(locals.slot("var_a").unwrap(), i16::MAX - 1);

        locals.reserve("var_c");
        assert_eq!(locals.existing_slot("var_c"), None);
    }

    #[test]
    fn declare_keeps_first() {
        let mut locals = Locals::new();
        assert!(locals.declare("var_x", VariableEntry::new("X").parameter()));
        assert!(!locals.declare("var_x", VariableEntry::new("x")));
        assert_eq!(locals.get("var_x").map(|v| v.display_name.as_str()), Some("X"));
        assert!(locals.get("var_x").map_or(false, |v| v.is_parameter));
    }

    #[test]
    fn keys() {
        assert_eq!(variable_key("MyVar"), "var_myvar");
    }
}
