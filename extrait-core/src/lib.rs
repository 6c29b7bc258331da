//! extrait-core: shared types for the statement conversion pipeline.
//!
//! Data model, partial-date resolution against the statement period,
//! balance validation, and the error kinds shared by every stage.

pub mod dates;
pub mod errors;
pub mod model;
pub mod validate;

pub use dates::StatementPeriod;
pub use errors::{
    ConvertError, DateResolutionError, ReferenceFormatError, TransactionParseError,
    ValidationError,
};
pub use model::{LayoutVariant, StatementHeader, Transaction, TransactionKey};
pub use validate::validate;
