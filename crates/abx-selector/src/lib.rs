//! ABX Cosmetic-Selector Compiler
//!
//! This crate compiles the selector part of extended (cosmetic) filters
//! into either plain CSS or a list of procedural tasks, and decompiles the
//! result back into a canonical string form.
//!
//! # Modules
//!
//! - `compiler`: the procedural selector compiler and its compiled form
//! - `oracle`: injected CSS/declaration/XPath validity predicates

pub mod compiler;
pub mod oracle;

// Re-export commonly used types
pub use compiler::{CompiledSelector, RegexLiteral, SelectorCompiler, SelectorTask, UpwardArg};
pub use oracle::{CssValidity, HeuristicOracle, SelectorOracle};
