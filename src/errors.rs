use std::io;

use crate::{armor::BlockType, packet::PacketTag};

pub type Result<T> = std::result::Result<T, IngestError>;

pub(crate) const ERROR_PREFIX: &str = "pgp-ingest";

/// The coarse error classification exposed by the ingestion facade.
///
/// Internal decode and assembly errors are collapsed into one of these
/// kinds at the facade boundary; the precise cause remains reachable
/// through the error source chain.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{ERROR_PREFIX}: input is not valid armored OpenPGP data: {0}")]
    InvalidFormat(#[from] ArmorError),

    #[error("{ERROR_PREFIX}: packet stream is malformed: {0}")]
    Malformed(#[from] PacketError),

    #[error("{ERROR_PREFIX}: key is not supported: {0}")]
    KeyNotSupported(#[from] KeyRejection),

    #[error("{ERROR_PREFIX}: failed to read key file: {0}")]
    Io(#[from] io::Error),
}

/// The reasons a structurally decodable input can still be rejected.
#[derive(Debug, thiserror::Error)]
pub enum KeyRejection {
    #[error(transparent)]
    Grouping(#[from] AssembleError),

    #[error(transparent)]
    Validation(#[from] KeyNotSupportedError),
}

#[derive(Debug, thiserror::Error)]
pub enum ArmorError {
    #[error("input is not ASCII-encodable")]
    NotAscii,

    #[error("no armor begin line found")]
    MissingHeader,

    #[error("unknown armor block type: {0}")]
    UnknownBlockType(String),

    #[error("armor block has no end line")]
    MissingFooter,

    #[error("wrong armor footer, got {got} expected {expected}")]
    MismatchedFooter { got: BlockType, expected: BlockType },

    #[error("failed to decode armor body: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("armor checksum line is malformed")]
    MalformedChecksum,

    #[error("armor checksum mismatch, got {got:06x} expected {expected:06x}")]
    ChecksumMismatch { got: u32, expected: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("packet header byte {0:#04x} has the always-set bit clear")]
    InvalidHeader(u8),

    #[error("unsupported packet tag: {0}")]
    UnsupportedTag(u8),

    #[error("packet stream ends inside a packet header")]
    Truncated,

    #[error("declared packet length {declared} exceeds the {remaining} remaining bytes")]
    LengthOverrun { declared: usize, remaining: usize },

    #[error("old-format packet with an indeterminate length")]
    IndeterminateLength,

    #[error("new-format packet with a partial body length")]
    PartialBodyLength,
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("{0} packet appears before any primary key packet")]
    OrphanPacket(PacketTag),

    #[error("unsupported key version: {0}")]
    UnsupportedKeyVersion(u8),

    #[error("primary key packet has an empty body")]
    EmptyKeyPacket,

    #[error("primary key packet body of {0} bytes exceeds the v4 length field")]
    OversizedKeyPacket(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum KeyNotSupportedError {
    #[error("primary key packet is too short to carry an algorithm id")]
    MissingAlgorithm,

    #[error("unsupported public-key algorithm id: {0}")]
    UnsupportedAlgorithm(u8),

    #[error("failed to re-decode the exported key: {0}")]
    Reparse(#[from] PacketError),

    #[error("failed to re-assemble the exported key: {0}")]
    Reassemble(#[from] AssembleError),

    #[error("export round-trip produced {0} keys instead of one")]
    RoundTripCount(usize),

    #[error("export round-trip does not match the assembled key")]
    RoundTripMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("failed to decode hex string: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("invalid fingerprint length: {0}")]
    InvalidLength(usize),
}
