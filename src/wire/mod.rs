//! Wire-level codec: byte primitives, framing, and the shared error taxonomy.

pub mod frame;
pub mod primitives;

pub use primitives::{
    read_bytes, read_gamma, read_string, read_uint8, read_uint16, read_uint24, read_uint32,
    read_uint64, write_gamma, write_raw, write_string, write_uint8, write_uint16, write_uint32,
    write_uint64,
};

use thiserror::Error;

/// Errors raised while decoding bytes off the wire.
///
/// `PacketTooShort` is recoverable at the two call sites the protocol marks
/// optional (`SERVER_ERROR`'s `error_str`, `SERVER_FRAME`'s `token`); anywhere
/// else it propagates like `PacketInvalidData` and kills the connection.
#[derive(Debug, Error)]
pub enum WireError {
    /// Not enough bytes remained to decode the requested field.
    #[error("packet too short")]
    PacketTooShort,

    /// A decoder left bytes unconsumed, or consumed more than it had.
    #[error("invalid packet data in {context}: {remaining} bytes remaining")]
    PacketInvalidData {
        /// Name of the decoder that tripped the invariant.
        context: &'static str,
        /// Bytes left over (or missing) when the mismatch was detected.
        remaining: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    /// A savegame chunk tag was not a recognized chunk.
    #[error("unknown chunk tag {0:?}")]
    UnknownChunkTag([u8; 4]),

    /// A savegame chunk's low-nibble shape selector isn't one we handle.
    #[error("unsupported chunk shape {0}")]
    UnsupportedChunkShape(u8),

    /// The savegame container's compression tag wasn't `OTTN` or `OTTX`.
    #[error("unsupported savegame compression tag {0:?}")]
    UnsupportedCompression([u8; 4]),

    /// The savegame version predates what this decoder understands.
    #[error("savegame version {0} is older than the minimum supported version")]
    SavegameTooOld(u16),

    /// A table chunk's header declared a size that didn't match what was consumed.
    #[error("table header size mismatch: expected {expected} bytes remaining, got {got}")]
    TableHeaderSizeMismatch {
        /// Bytes the header declared should remain.
        expected: usize,
        /// Bytes that actually remained.
        got: usize,
    },

    /// A table chunk's row declared a size that didn't match what was consumed.
    #[error("table row size mismatch: expected {expected} bytes remaining, got {got}")]
    TableRowSizeMismatch {
        /// Bytes the row declared should remain.
        expected: usize,
        /// Bytes that actually remained.
        got: usize,
    },

    /// A table field carried a low-nibble type this decoder doesn't know.
    #[error("unhandled table field type {0}")]
    UnhandledFieldType(u8),

    /// A Squirrel-like script data tag this decoder doesn't know.
    #[error("unhandled script field type {0}")]
    UnhandledScriptFieldType(u8),

    /// LZMA decompression of an `OTTX` savegame body failed.
    #[error("lzma decompression failed: {0}")]
    LzmaError(String),

    /// An outbound frame exceeded the TCP MTU cap.
    #[error("outbound frame of {0} bytes exceeds the MTU cap")]
    FrameTooLarge(usize),

    /// An inbound frame's declared type byte isn't one the protocol knows.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),
}
