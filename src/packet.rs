use std::fmt::{self, Display};

use crate::PacketError;

/// The packet types relevant for transferable key material,
/// per RFC 4880 section 4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketTag {
    Signature,
    SecretKey,
    PublicKey,
    SecretSubkey,
    UserId,
    PublicSubkey,
    UserAttribute,
}

impl PacketTag {
    pub(crate) fn from_value(value: u8) -> Result<Self, PacketError> {
        match value {
            2 => Ok(PacketTag::Signature),
            5 => Ok(PacketTag::SecretKey),
            6 => Ok(PacketTag::PublicKey),
            7 => Ok(PacketTag::SecretSubkey),
            13 => Ok(PacketTag::UserId),
            14 => Ok(PacketTag::PublicSubkey),
            17 => Ok(PacketTag::UserAttribute),
            other => Err(PacketError::UnsupportedTag(other)),
        }
    }

    pub(crate) fn value(self) -> u8 {
        match self {
            PacketTag::Signature => 2,
            PacketTag::SecretKey => 5,
            PacketTag::PublicKey => 6,
            PacketTag::SecretSubkey => 7,
            PacketTag::UserId => 13,
            PacketTag::PublicSubkey => 14,
            PacketTag::UserAttribute => 17,
        }
    }

    /// Indicates if a packet with this tag opens a new key.
    pub fn is_primary(self) -> bool {
        matches!(self, PacketTag::PublicKey | PacketTag::SecretKey)
    }

    pub fn is_subkey(self) -> bool {
        matches!(self, PacketTag::PublicSubkey | PacketTag::SecretSubkey)
    }
}

impl Display for PacketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketTag::Signature => "signature",
            PacketTag::SecretKey => "secret-key",
            PacketTag::PublicKey => "public-key",
            PacketTag::SecretSubkey => "secret-subkey",
            PacketTag::UserId => "user-id",
            PacketTag::PublicSubkey => "public-subkey",
            PacketTag::UserAttribute => "user-attribute",
        };
        write!(f, "{name}")
    }
}

/// A raw `OpenPGP` packet: a tag plus its body bytes.
///
/// Immutable once decoded. Equality is structural (tag and body), so the
/// same packet decoded from old-format and new-format framing compares
/// equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    tag: PacketTag,
    body: Vec<u8>,
}

impl RawPacket {
    pub fn new(tag: PacketTag, body: Vec<u8>) -> Self {
        Self { tag, body }
    }

    pub fn tag(&self) -> PacketTag {
        self.tag
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The declared body length of the packet.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Serializes the packet with new-format framing.
    pub(crate) fn encode_into(&self, output: &mut Vec<u8>) {
        output.push(0xC0 | self.tag.value());
        encode_new_length(self.body.len(), output);
        output.extend_from_slice(&self.body);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.body.len() + 6);
        self.encode_into(&mut output);
        output
    }
}

/// Decodes a binary stream into its ordered packet sequence.
///
/// Purely functional over the input bytes; fails without partial results
/// when any packet header, length, or body is broken.
pub fn decode_packets(input: &[u8]) -> Result<Vec<RawPacket>, PacketError> {
    let mut packets = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (packet, remaining) = decode_packet(rest)?;
        packets.push(packet);
        rest = remaining;
    }
    Ok(packets)
}

fn decode_packet(input: &[u8]) -> Result<(RawPacket, &[u8]), PacketError> {
    let header = input[0];
    if header & 0x80 == 0 {
        return Err(PacketError::InvalidHeader(header));
    }

    let (tag_value, length, body_start) = if header & 0x40 != 0 {
        let (length, consumed) = decode_new_length(&input[1..])?;
        (header & 0x3F, length, 1 + consumed)
    } else {
        let (length, consumed) = decode_old_length(&input[1..], header & 0x03)?;
        ((header >> 2) & 0x0F, length, 1 + consumed)
    };

    let tag = PacketTag::from_value(tag_value)?;
    let remaining = input.len() - body_start;
    if length > remaining {
        return Err(PacketError::LengthOverrun {
            declared: length,
            remaining,
        });
    }

    let body = input[body_start..body_start + length].to_vec();
    Ok((RawPacket::new(tag, body), &input[body_start + length..]))
}

/// New-format packet lengths, RFC 4880 section 4.2.2.
///
/// Partial body lengths (first octet 224..=254) are rejected: they are
/// not legal in transferable key material.
fn decode_new_length(input: &[u8]) -> Result<(usize, usize), PacketError> {
    let first = *input.first().ok_or(PacketError::Truncated)?;
    match first {
        0..=191 => Ok((usize::from(first), 1)),
        192..=223 => {
            let second = *input.get(1).ok_or(PacketError::Truncated)?;
            Ok((
                ((usize::from(first) - 192) << 8) + usize::from(second) + 192,
                2,
            ))
        }
        255 => {
            let bytes: [u8; 4] = input
                .get(1..5)
                .ok_or(PacketError::Truncated)?
                .try_into()
                .map_err(|_| PacketError::Truncated)?;
            Ok((u32::from_be_bytes(bytes) as usize, 5))
        }
        _ => Err(PacketError::PartialBodyLength),
    }
}

/// Old-format packet lengths, RFC 4880 section 4.2.1.
///
/// Indeterminate lengths (length type 3) are rejected.
fn decode_old_length(input: &[u8], length_type: u8) -> Result<(usize, usize), PacketError> {
    match length_type {
        0 => {
            let first = *input.first().ok_or(PacketError::Truncated)?;
            Ok((usize::from(first), 1))
        }
        1 => {
            let bytes: [u8; 2] = input
                .get(..2)
                .ok_or(PacketError::Truncated)?
                .try_into()
                .map_err(|_| PacketError::Truncated)?;
            Ok((usize::from(u16::from_be_bytes(bytes)), 2))
        }
        2 => {
            let bytes: [u8; 4] = input
                .get(..4)
                .ok_or(PacketError::Truncated)?
                .try_into()
                .map_err(|_| PacketError::Truncated)?;
            Ok((u32::from_be_bytes(bytes) as usize, 4))
        }
        _ => Err(PacketError::IndeterminateLength),
    }
}

fn encode_new_length(length: usize, output: &mut Vec<u8>) {
    #[allow(clippy::cast_possible_truncation)]
    if length < 192 {
        output.push(length as u8);
    } else if length < 8384 {
        let adjusted = length - 192;
        output.push(((adjusted >> 8) + 192) as u8);
        output.push((adjusted & 0xFF) as u8);
    } else {
        output.push(255);
        output.extend_from_slice(&(length as u32).to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_bytes(tag_value: u8, body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xC0 | tag_value];
        encode_new_length(body.len(), &mut bytes);
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn decode_new_format_one_octet_length() {
        let bytes = packet_bytes(13, b"alice");
        let packets = decode_packets(&bytes).expect("Failed to decode");
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].tag(), PacketTag::UserId);
        assert_eq!(packets[0].body(), b"alice");
    }

    #[test]
    fn decode_new_format_two_octet_length() {
        let body = vec![0xAB_u8; 300];
        let bytes = packet_bytes(6, &body);
        let packets = decode_packets(&bytes).expect("Failed to decode");
        assert_eq!(packets[0].len(), 300);
    }

    #[test]
    fn decode_new_format_five_octet_length() {
        let body = vec![0xCD_u8; 9000];
        let bytes = packet_bytes(6, &body);
        assert_eq!(bytes[1], 255);
        let packets = decode_packets(&bytes).expect("Failed to decode");
        assert_eq!(packets[0].len(), 9000);
    }

    #[test]
    fn decode_old_format_lengths() {
        // Tag 13 (user id), one-octet old-format length.
        let mut bytes = vec![0x80 | (13 << 2), 3];
        bytes.extend_from_slice(b"bob");
        // Tag 6 (public key), two-octet old-format length.
        bytes.extend_from_slice(&[0x80 | (6 << 2) | 1, 0x01, 0x00]);
        bytes.extend_from_slice(&[0_u8; 256]);
        let packets = decode_packets(&bytes).expect("Failed to decode");
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].tag(), PacketTag::UserId);
        assert_eq!(packets[1].tag(), PacketTag::PublicKey);
        assert_eq!(packets[1].len(), 256);
    }

    #[test]
    fn old_and_new_framing_of_same_packet_compare_equal() {
        let old_format = [0x80 | (13 << 2), 3, b'e', b'v', b'e'];
        let new_format = packet_bytes(13, b"eve");
        let old = decode_packets(&old_format).expect("Failed to decode");
        let new = decode_packets(&new_format).expect("Failed to decode");
        assert_eq!(old, new);
    }

    #[test]
    fn declared_length_past_end_of_input_fails() {
        let bytes = [0xC0 | 13, 10, b'x'];
        let result = decode_packets(&bytes);
        assert!(matches!(
            result,
            Err(PacketError::LengthOverrun {
                declared: 10,
                remaining: 1,
            })
        ));
    }

    #[test]
    fn truncated_header_fails() {
        let result = decode_packets(&[0xC0 | 13]);
        assert!(matches!(result, Err(PacketError::Truncated)));

        // Two-octet length cut short.
        let result = decode_packets(&[0xC0 | 6, 192]);
        assert!(matches!(result, Err(PacketError::Truncated)));
    }

    #[test]
    fn first_bit_clear_fails() {
        let result = decode_packets(&[0x36, 0x00]);
        assert!(matches!(result, Err(PacketError::InvalidHeader(0x36))));
    }

    #[test]
    fn unsupported_tag_fails() {
        // Tag 1 is a public-key encrypted session key, not key material.
        let result = decode_packets(&[0xC0 | 1, 0]);
        assert!(matches!(result, Err(PacketError::UnsupportedTag(1))));
    }

    #[test]
    fn partial_body_length_fails() {
        let result = decode_packets(&[0xC0 | 6, 224, 0]);
        assert!(matches!(result, Err(PacketError::PartialBodyLength)));
    }

    #[test]
    fn indeterminate_old_length_fails() {
        let result = decode_packets(&[0x80 | (6 << 2) | 3, 0]);
        assert!(matches!(result, Err(PacketError::IndeterminateLength)));
    }

    #[test]
    fn serialization_round_trips() {
        let packet = RawPacket::new(PacketTag::UserId, b"carol".to_vec());
        let decoded = decode_packets(&packet.to_bytes()).expect("Failed to decode");
        assert_eq!(decoded, vec![packet]);
    }
}
