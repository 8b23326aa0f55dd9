//! PTP (ISO 15740) / MTP wire structures and codecs.
//!
//! Everything in this crate is transport-agnostic: containers, code spaces,
//! the paginating payload writer, and the small fixed-layout datasets that
//! arrive on the bulk OUT pipe.

pub mod codes;
pub mod container;
pub mod datetime;
pub mod object_info;
pub mod writer;

pub use codes::*;
pub use container::*;
pub use writer::PayloadWriter;

/// Errors raised while decoding inbound wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("container too short: {0} bytes")]
    TruncatedContainer(usize),

    #[error("dataset truncated at offset {0}")]
    TruncatedDataset(usize),

    #[error("malformed string at offset {0}")]
    BadString(usize),

    #[error("binary decode error: {0}")]
    Decode(#[from] binrw::Error),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
