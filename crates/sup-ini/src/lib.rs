//! Ordered ini documents
//!
//! Parses ini-style text into an ordered, structured document, folds
//! documents together key by key, and writes them back out. Section order
//! and option order follow first appearance, so a merged document
//! serializes deterministically.

pub mod boolean;
pub mod document;
pub mod error;
mod parser;

pub use boolean::parse_bool;
pub use document::{IniDocument, Section};
pub use error::IniError;
