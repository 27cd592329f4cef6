//! The data the compiler passes between stages:
//! tokens, the syntax tree, the rewrite rules that run over it,
//! and the locals each handler declares.

pub mod token;
pub mod tree;
pub mod transform;
pub mod variable;
pub mod parse_tree;
