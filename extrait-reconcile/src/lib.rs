//! extrait-reconcile: reference cache, identity assignment, and the
//! conversion pipeline.
//!
//! Previously downloaded official OFX exports are loaded into a cache so
//! repeated conversions of the same statement keep handing the same
//! persistent identifiers to downstream accounting tools.

pub mod assign;
pub mod cache;
pub mod ofx;
pub mod pipeline;

pub use assign::{assign_identifiers, synthesize_id};
pub use cache::ReferenceCache;
pub use ofx::{read_reference, ReferenceExport, ReferenceRecord};
pub use pipeline::{convert, Conversion, ConvertOptions};
