use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::record::RecordKind;

/// Rows read per I/O call unless configured otherwise.
pub const DEFAULT_CHUNK_ROWS: NonZeroUsize = NonZeroUsize::new(100).unwrap();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub kind: RecordKind,
    /// Record lines per read; batching only, results do not depend on it.
    pub chunk_rows: NonZeroUsize,
    /// Expose numeric and categorical projections on the loaded file.
    pub processed: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig { kind: RecordKind::Bbo, chunk_rows: DEFAULT_CHUNK_ROWS, processed: true }
    }
}
