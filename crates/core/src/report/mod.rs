//! Report rows and their durable CSV output.
//!
//! # Features
//!
//! - Flattening of IQ Server policy reports into `ViolationRow`s
//! - CSV encoding with sequential 1-based row numbers
//! - Temp-file-and-rename writes that never expose a partial file
//! - Automatic creation of the output directory

mod encode;
mod error;
mod row;
mod writer;

pub use encode::encode_csv;
pub use error::WriteError;
pub use row::{ViolationRow, HEADERS};
pub use writer::{DurableWriter, StagedFile};
