//! Crate-wide error type.
//!
//! Every public operation in this crate returns `Result<_, Error>`. The
//! variants cover the ways PAC, Huffman, LZSS, and script handling can fail:
//! an I/O failure, a structurally invalid encoded blob, an encoder that
//! overran its scratch buffer, a name that won't fit in the on-disk record,
//! a transcoding failure, or a malformed script transcript.

/// Errors produced by this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("huffman output exceeded the {0}-byte scratch bound")]
    EncodingOverflow(usize),

    #[error("entry name '{name}' needs {needed} Shift-JIS bytes, limit is {limit}")]
    NameTooLong {
        name: String,
        needed: usize,
        limit: usize,
    },

    #[error("Shift-JIS/UTF-16 transcoding failed: {0}")]
    TranscodeFailure(String),

    #[error("script transcript format mismatch: {0}")]
    FormatMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
