use thiserror::Error;

use crate::record::RecordKind;

pub type Result<T> = std::result::Result<T, TaqError>;

/// Stage of a decode session an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Layout,
    Header,
    Row,
    Io,
    Usage,
}

#[derive(Debug, Error)]
pub enum TaqError {
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("no field layout defined for record kind `{kind}`")]
    UndefinedLayout { kind: RecordKind },

    #[error("header line length {line_length} does not match layout width {layout_width}")]
    LineLengthMismatch { line_length: usize, layout_width: usize },

    #[error("truncated record: chunk at byte {offset} has {len} bytes, not a multiple of {line_length}")]
    TruncatedRecord { offset: u64, len: usize, line_length: usize },

    #[error("stream contained a valid header but no records")]
    EmptyResult,

    #[error("row {row}: field `{field}` is not unsigned decimal text: {bytes:?}")]
    FieldDecodeError { row: usize, field: &'static str, bytes: Vec<u8> },

    #[error("`{op}` called while decoder is {state:?}")]
    InvalidState { op: &'static str, state: crate::decoder::DecoderState },

    #[error("time zone: {0}")]
    TimeZone(#[from] jiff::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TaqError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        TaqError::MalformedHeader { reason: reason.into() }
    }

    pub fn phase(&self) -> Phase {
        match self {
            TaqError::UndefinedLayout { .. } => Phase::Layout,
            TaqError::MalformedHeader { .. } | TaqError::LineLengthMismatch { .. } | TaqError::TimeZone(_) => {
                Phase::Header
            }
            TaqError::TruncatedRecord { .. }
            | TaqError::EmptyResult
            | TaqError::FieldDecodeError { .. } => Phase::Row,
            TaqError::Io(_) => Phase::Io,
            TaqError::InvalidState { .. } => Phase::Usage,
        }
    }
}
