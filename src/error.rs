use thiserror::Error;

/// Errors arising from command validation and encoding.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("invalid {table} index {index} (valid: 1..={len})")]
    InvalidIndex {
        table: &'static str,
        index: i64,
        len: usize,
    },

    #[error("{what} out of range: {value} (allowed {min}..={max})")]
    ValueOutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{what} is not a finite number")]
    NonFiniteAngle { what: &'static str },

    #[error("frame length {len} outside 1..=6")]
    FrameLength { len: usize },

    #[error("unrecognised command frame {0}")]
    UnknownFrame(String),
}

impl CommandError {
    /// Create an `InvalidIndex` error for a 1-based preset table.
    pub(crate) fn invalid_index(table: &'static str, index: impl Into<i64>, len: usize) -> Self {
        Self::InvalidIndex { table, index: index.into(), len }
    }

    /// Create a `ValueOutOfRange` error for a single-byte field.
    pub(crate) fn byte_out_of_range(what: &'static str, value: impl Into<i64>) -> Self {
        Self::ValueOutOfRange { what, value: value.into(), min: 0, max: 0xFF }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
