mod index;
mod markdown;
mod task;

pub use index::{decode_index, decode_index_bytes, encode_index};
pub use task::{TaskCodec, decode_task, decode_task_bytes, encode_task};

/// Failures raised while converting between text and records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input is empty (or whitespace only).
    #[error("data is null or empty")]
    Empty,
    /// Input bytes are not valid UTF-8 text.
    #[error("data is not a string")]
    NotText,
    /// No level-1 heading carrying a name.
    #[error("data is missing a name heading")]
    MissingName,
    /// Front matter present but not a mapping of known shape.
    #[error("invalid front matter content")]
    InvalidFrontMatter,
    /// `Options` section present but not a mapping of known shape.
    #[error("invalid options content")]
    InvalidOptions,
    /// A column body contains something other than list items.
    #[error("column \"{0}\" must contain a list")]
    ColumnNotList(String),
    /// Task metadata is not a mapping or holds ill-typed values.
    #[error("invalid metadata content")]
    InvalidMetadata,
    /// Serializing a mapping to YAML failed.
    #[error("failed to encode {what}: {message}")]
    Encode {
        /// Which block was being written.
        what: &'static str,
        /// Serializer message.
        message: String,
    },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

fn text_from_bytes(data: &[u8]) -> CodecResult<&str> {
    if data.is_empty() {
        return Err(CodecError::Empty);
    }
    std::str::from_utf8(data).map_err(|_| CodecError::NotText)
}
