//! ABX Core Library
//!
//! This crate provides the core single-line analyzer for ABP/uBO-style
//! filter lists. One reusable parser decomposes a line into a flat integer
//! slice array in a single scan, classifies it (comment, network filter,
//! extended filter), and exposes spans, options, pattern tokens and
//! compiled cosmetic selectors over that representation. All per-token
//! extraction is zero-copy against the parser's line buffer.
//!
//! # Modules
//!
//! - `charclass`: byte-to-class-bit table and composite masks
//! - `slicer`: the slice array, spans, and slot splitting
//! - `parser`: the `FilterParser` facade and analysis pipeline
//! - `net`: network-filter analysis and the options iterator
//! - `ext`: extended-filter analysis and the hostname-list iterator
//! - `domains`: domain-list/entity validation
//! - `tokens`: pattern-token (index key) extraction
//! - `support`: injected regex/punycode predicates

pub mod charclass;
pub mod domains;
pub mod ext;
pub mod net;
pub mod parser;
pub mod slicer;
pub mod support;
pub mod tokens;

// Re-export commonly used types
pub use charclass::CharClass;
pub use ext::{ExtCompiled, ExtDomain, ExtOptionsIter};
pub use net::{NetOption, NetOptionId, NetOptionsIter, OptionFlags};
pub use parser::{Category, FilterParser, Flavor, ParserOptions};
pub use slicer::{Span, Spans};
pub use support::{DefaultNetSupport, NetSupport};
pub use tokens::{PatternToken, PatternTokenIter};
