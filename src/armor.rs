use std::fmt::{self, Display};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::{ArmorError, ResolvedDataEncoding};

const ARMOR_BEGIN: &str = "-----BEGIN PGP ";
const ARMOR_END: &str = "-----END PGP ";
const ARMOR_TRAILER: &str = "-----";
const ARMOR_COLUMNS: usize = 64;

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// The block type named in an armor begin/end line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    PublicKey,
    PrivateKey,
    Signature,
    Message,
}

impl BlockType {
    fn label(self) -> &'static str {
        match self {
            BlockType::PublicKey => "PUBLIC KEY BLOCK",
            BlockType::PrivateKey => "PRIVATE KEY BLOCK",
            BlockType::Signature => "SIGNATURE",
            BlockType::Message => "MESSAGE",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "PUBLIC KEY BLOCK" => Some(BlockType::PublicKey),
            "PRIVATE KEY BLOCK" => Some(BlockType::PrivateKey),
            "SIGNATURE" => Some(BlockType::Signature),
            "MESSAGE" => Some(BlockType::Message),
            _ => None,
        }
    }
}

impl Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Armors binary data as a public key block.
///
/// Produces data of the form:
/// ```skip
/// -----BEGIN PGP PUBLIC KEY BLOCK-----
///
/// ...
/// -----END PGP PUBLIC KEY BLOCK-----
/// ```
pub fn armor_public_key(public_key: impl AsRef<[u8]>) -> String {
    encode(BlockType::PublicKey, public_key.as_ref())
}

/// Armors binary data as a private key block.
pub fn armor_private_key(private_key: impl AsRef<[u8]>) -> String {
    encode(BlockType::PrivateKey, private_key.as_ref())
}

pub(crate) fn encode(block_type: BlockType, data: &[u8]) -> String {
    let body = BASE64.encode(data);
    let mut armored = String::with_capacity(body.len() + 128);
    armored.push_str(ARMOR_BEGIN);
    armored.push_str(block_type.label());
    armored.push_str(ARMOR_TRAILER);
    armored.push_str("\n\n");
    for chunk in body.as_bytes().chunks(ARMOR_COLUMNS) {
        // Chunks of an ASCII string are valid UTF-8.
        armored.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        armored.push('\n');
    }
    armored.push('=');
    armored.push_str(&BASE64.encode(&crc24(data).to_be_bytes()[1..]));
    armored.push('\n');
    armored.push_str(ARMOR_END);
    armored.push_str(block_type.label());
    armored.push_str(ARMOR_TRAILER);
    armored.push('\n');
    armored
}

/// Unarmors every armor block in the input and concatenates the decoded
/// binary streams.
///
/// Each block must have the form:
/// ```skip
/// -----BEGIN PGP <TYPE>-----
///
/// ...
/// -----END PGP <TYPE>-----
/// ```
/// Armor headers (`Key: Value` lines) are skipped; the trailing CRC-24
/// checksum line is verified when present. Fails with [`ArmorError`] if
/// no block is found, a block is unterminated, the base64 body or
/// checksum is malformed, or the footer type does not match the header.
pub fn unarmor(input: &str) -> Result<Vec<u8>, ArmorError> {
    let mut output = Vec::new();
    let mut lines = input.lines();
    let mut found_block = false;

    while let Some(block_type) = next_begin_line(&mut lines)? {
        found_block = true;
        decode_block(&mut lines, block_type, &mut output)?;
    }

    if !found_block {
        return Err(ArmorError::MissingHeader);
    }
    Ok(output)
}

/// Scans forward to the next armor begin line.
///
/// Text between blocks is ignored, which keeps keyserver-style output
/// with comments between keys readable.
fn next_begin_line<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
) -> Result<Option<BlockType>, ArmorError> {
    for line in lines {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(ARMOR_BEGIN) else {
            continue;
        };
        let label = rest
            .strip_suffix(ARMOR_TRAILER)
            .ok_or(ArmorError::MissingHeader)?;
        return BlockType::from_label(label)
            .map(Some)
            .ok_or_else(|| ArmorError::UnknownBlockType(label.to_owned()));
    }
    Ok(None)
}

fn decode_block<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    block_type: BlockType,
    output: &mut Vec<u8>,
) -> Result<(), ArmorError> {
    let mut body = String::new();
    let mut checksum = None;
    let mut in_headers = true;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            in_headers = false;
            continue;
        }
        if let Some(rest) = line.strip_prefix(ARMOR_END) {
            let label = rest
                .strip_suffix(ARMOR_TRAILER)
                .ok_or(ArmorError::MissingFooter)?;
            let footer_type = BlockType::from_label(label)
                .ok_or_else(|| ArmorError::UnknownBlockType(label.to_owned()))?;
            if footer_type != block_type {
                return Err(ArmorError::MismatchedFooter {
                    got: footer_type,
                    expected: block_type,
                });
            }
            let data = BASE64.decode(&body)?;
            if let Some(expected) = checksum {
                let got = crc24(&data);
                if got != expected {
                    return Err(ArmorError::ChecksumMismatch { got, expected });
                }
            }
            output.extend_from_slice(&data);
            return Ok(());
        }
        if in_headers && line.contains(':') && !line.starts_with('=') {
            // Armor header such as `Version: ...` or `Comment: ...`.
            continue;
        }
        in_headers = false;
        if let Some(encoded) = line.strip_prefix('=') {
            checksum = Some(decode_checksum(encoded)?);
            continue;
        }
        body.push_str(line);
    }

    Err(ArmorError::MissingFooter)
}

fn decode_checksum(encoded: &str) -> Result<u32, ArmorError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|_| ArmorError::MalformedChecksum)?;
    let &[hi, mid, lo] = bytes.as_slice() else {
        return Err(ArmorError::MalformedChecksum);
    };
    Ok(u32::from_be_bytes([0, hi, mid, lo]))
}

/// CRC-24 over the decoded armor body, per RFC 4880 section 6.1.
fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for byte in data {
        crc ^= u32::from(*byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// Tries to heuristically detect if the input is armored.
pub(crate) fn detect_encoding(input: impl AsRef<[u8]>) -> ResolvedDataEncoding {
    let buffer = input.as_ref();

    if buffer.len() < ARMOR_BEGIN.len() {
        return ResolvedDataEncoding::Unarmored;
    }

    if std::str::from_utf8(buffer).is_ok_and(|s| s.trim_start().starts_with(ARMOR_BEGIN)) {
        ResolvedDataEncoding::Armored
    } else {
        ResolvedDataEncoding::Unarmored
    }
}
