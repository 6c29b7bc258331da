//! extrait-ingest: statement text tokenizer and transaction extractor.
//!
//! Consumes the raw text produced by an external PDF-to-text step (layout
//! mode) and turns it into `extrait-core` model types.

pub mod extractor;
pub mod tokenizer;

pub use extractor::extract;
pub use tokenizer::{tokenize, ColumnLayout, LineGroups, RawLineGroup};
