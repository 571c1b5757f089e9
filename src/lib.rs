//! NYSE TAQ record file decoder.
//!
//! This crate turns the fixed-width lines of a TAQ record file into a typed,
//! columnar table:
//!
//! - `record`: byte layouts per record kind (only BBO is defined)
//! - `header`: the self-describing header line and the US Eastern midnight
//!   base timestamp of the trading day
//! - `decoder`: the chunked streaming decoder and the one-shot [`load`]
//! - `table`: the columnar [`DecodedTable`] and its numeric/categorical views
//!
//! The decoder reads from any `std::io::Read` positioned at the start of the
//! record file; unpacking the distribution archive is left to the caller.
pub mod config;
pub mod decoder;
pub mod error;
pub mod header;
pub mod record;
pub mod table;

pub use config::DecoderConfig;
pub use decoder::{load, DecoderState, LoadedFile, TaqDecoder};
pub use error::{Phase, Result, TaqError};
pub use header::{BaseTimestamp, Header};
pub use record::{categorical_fields, layout_for, numeric_fields, FieldKind, FieldSpec, RecordKind, RecordLayout};
pub use table::{Column, DecodedTable, FieldValue, TableView};
