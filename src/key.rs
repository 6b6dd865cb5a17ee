use std::iter;

use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::{
    armor, armor::BlockType, AssembleError, DataEncoding, Fingerprint, PacketTag, RawPacket,
    ResolvedDataEncoding,
};

/// An assembled `OpenPGP` key.
///
/// An `OpenPGP` key consists of a primary key packet and the subkeys,
/// user IDs, user attributes and signatures grouped behind it. The key
/// owns its constituent packets exclusively; the fingerprint is derived
/// from the primary packet body and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    primary: RawPacket,
    subkeys: Vec<RawPacket>,
    user_ids: Vec<UserId>,
    user_attributes: Vec<RawPacket>,
    signatures: Vec<Signature>,
    fingerprint: Fingerprint,
}

impl Key {
    pub fn primary(&self) -> &RawPacket {
        &self.primary
    }

    pub fn subkeys(&self) -> &[RawPacket] {
        &self.subkeys
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    pub fn user_attributes(&self) -> &[RawPacket] {
        &self.user_attributes
    }

    /// Key-level signatures: direct-key, subkey binding and revocation
    /// signatures. Certifications over a user ID live on the [`UserId`].
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The version octet of the primary key packet.
    pub fn version(&self) -> u8 {
        self.fingerprint.version()
    }

    /// Indicates if the primary packet carries secret key material.
    pub fn is_secret(&self) -> bool {
        self.primary.tag() == PacketTag::SecretKey
    }

    /// The constituent packets in canonical order: primary, key-level
    /// signatures, user IDs each followed by their certifications, user
    /// attributes, subkeys.
    pub fn packets(&self) -> impl Iterator<Item = &RawPacket> {
        iter::once(&self.primary)
            .chain(self.signatures.iter().map(Signature::packet))
            .chain(self.user_ids.iter().flat_map(|user_id| {
                iter::once(user_id.packet()).chain(user_id.signatures().iter().map(Signature::packet))
            }))
            .chain(self.user_attributes.iter())
            .chain(self.subkeys.iter())
    }

    /// Serializes the key back to a binary packet stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::new();
        for packet in self.packets() {
            packet.encode_into(&mut output);
        }
        output
    }

    /// Exports the key, armored or as raw bytes.
    pub fn export(&self, encoding: DataEncoding) -> Vec<u8> {
        match encoding.resolve_for_write() {
            ResolvedDataEncoding::Armored => {
                let block_type = if self.is_secret() {
                    BlockType::PrivateKey
                } else {
                    BlockType::PublicKey
                };
                armor::encode(block_type, &self.to_bytes()).into_bytes()
            }
            ResolvedDataEncoding::Unarmored => self.to_bytes(),
        }
    }
}

/// A user ID packet together with the certifications made over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId {
    text: String,
    signatures: Vec<Signature>,
    raw: RawPacket,
}

impl UserId {
    fn from_packet(raw: RawPacket) -> Self {
        Self {
            text: String::from_utf8_lossy(raw.body()).into_owned(),
            signatures: Vec::new(),
            raw,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn packet(&self) -> &RawPacket {
        &self.raw
    }
}

/// A signature packet with the fields the assembler cares about.
///
/// The issuer fingerprint is a lookup handle taken from the issuer
/// fingerprint subpacket, never ownership of the issuing key. The
/// signature is not cryptographically verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    issuer_fingerprint: Option<Vec<u8>>,
    signature_type: SignatureType,
    raw: RawPacket,
}

impl Signature {
    fn from_packet(raw: RawPacket) -> Self {
        Self {
            issuer_fingerprint: scan_issuer_fingerprint(raw.body()),
            signature_type: signature_type(raw.body()),
            raw,
        }
    }

    pub fn issuer_fingerprint(&self) -> Option<&[u8]> {
        self.issuer_fingerprint.as_deref()
    }

    pub fn signature_type(&self) -> SignatureType {
        self.signature_type
    }

    pub fn packet(&self) -> &RawPacket {
        &self.raw
    }
}

/// Signature types, RFC 4880 section 5.2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    Binary,
    Text,
    Standalone,
    GenericCertification,
    PersonaCertification,
    CasualCertification,
    PositiveCertification,
    SubkeyBinding,
    PrimaryKeyBinding,
    DirectKey,
    KeyRevocation,
    SubkeyRevocation,
    CertificationRevocation,
    Timestamp,
    ThirdParty,
    Unknown(u8),
}

impl SignatureType {
    fn from_value(value: u8) -> Self {
        match value {
            0x00 => SignatureType::Binary,
            0x01 => SignatureType::Text,
            0x02 => SignatureType::Standalone,
            0x10 => SignatureType::GenericCertification,
            0x11 => SignatureType::PersonaCertification,
            0x12 => SignatureType::CasualCertification,
            0x13 => SignatureType::PositiveCertification,
            0x18 => SignatureType::SubkeyBinding,
            0x19 => SignatureType::PrimaryKeyBinding,
            0x1F => SignatureType::DirectKey,
            0x20 => SignatureType::KeyRevocation,
            0x28 => SignatureType::SubkeyRevocation,
            0x30 => SignatureType::CertificationRevocation,
            0x40 => SignatureType::Timestamp,
            0x50 => SignatureType::ThirdParty,
            other => SignatureType::Unknown(other),
        }
    }

    /// Indicates if the signature certifies a user ID.
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::GenericCertification
                | SignatureType::PersonaCertification
                | SignatureType::CasualCertification
                | SignatureType::PositiveCertification
        )
    }
}

fn signature_type(body: &[u8]) -> SignatureType {
    let Some(version) = body.first() else {
        return SignatureType::Unknown(0xFF);
    };
    let type_octet = match version {
        2 | 3 => body.get(2),
        4 | 6 => body.get(1),
        _ => None,
    };
    type_octet
        .copied()
        .map_or(SignatureType::Unknown(0xFF), SignatureType::from_value)
}

/// Walks the hashed and unhashed subpacket areas of a v4/v6 signature
/// looking for the issuer fingerprint subpacket (type 33).
///
/// Returns `None` when the packet carries no such subpacket or its
/// subpacket areas cannot be walked; the assembler treats that as a
/// signature without a resolvable issuer, not as an error.
fn scan_issuer_fingerprint(body: &[u8]) -> Option<Vec<u8>> {
    const ISSUER_FINGERPRINT: u8 = 33;

    let version = *body.first()?;
    // Area length fields are two octets in v4 and four octets in v6.
    let length_octets = match version {
        4 => 2,
        6 => 4,
        _ => return None,
    };
    let read_area_length = |offset: usize| -> Option<usize> {
        let bytes = body.get(offset..offset + length_octets)?;
        Some(match bytes {
            [hi, lo] => usize::from(u16::from_be_bytes([*hi, *lo])),
            [b0, b1, b2, b3] => u32::from_be_bytes([*b0, *b1, *b2, *b3]) as usize,
            _ => return None,
        })
    };

    let hashed_length = read_area_length(4)?;
    let hashed_start = 4 + length_octets;
    let hashed = body.get(hashed_start..hashed_start + hashed_length)?;

    let unhashed_length_offset = hashed_start + hashed_length;
    let unhashed_length = read_area_length(unhashed_length_offset)?;
    let unhashed_start = unhashed_length_offset + length_octets;
    let unhashed = body.get(unhashed_start..unhashed_start + unhashed_length)?;

    scan_subpackets(hashed, ISSUER_FINGERPRINT)
        .or_else(|| scan_subpackets(unhashed, ISSUER_FINGERPRINT))
        // Strip the key version octet, keeping the fingerprint bytes.
        .and_then(|data| data.get(1..).map(<[u8]>::to_vec))
}

fn scan_subpackets<'a>(mut area: &'a [u8], wanted: u8) -> Option<&'a [u8]> {
    while !area.is_empty() {
        let first = area[0];
        let (length, consumed) = match first {
            0..=191 => (usize::from(first), 1),
            192..=254 => {
                let second = *area.get(1)?;
                (((usize::from(first) - 192) << 8) + usize::from(second) + 192, 2)
            }
            255 => {
                let bytes: [u8; 4] = area.get(1..5)?.try_into().ok()?;
                (u32::from_be_bytes(bytes) as usize, 5)
            }
        };
        let data = area.get(consumed..consumed + length)?;
        if let Some(subpacket_type) = data.first() {
            // Mask the critical bit.
            if subpacket_type & 0x7F == wanted {
                return Some(&data[1..]);
            }
        }
        area = area.get(consumed + length..)?;
    }
    None
}

/// Computes the fingerprint of a primary key packet body.
///
/// v4: SHA-1 over `0x99 || two-octet length || body`.
/// v6: SHA-256 over `0x9B || four-octet length || body`.
pub(crate) fn compute_fingerprint(primary_body: &[u8]) -> Result<Fingerprint, AssembleError> {
    let version = *primary_body
        .first()
        .ok_or(AssembleError::EmptyKeyPacket)?;
    match version {
        4 => {
            let length = u16::try_from(primary_body.len())
                .map_err(|_| AssembleError::OversizedKeyPacket(primary_body.len()))?;
            let mut hasher = Sha1::new();
            hasher.update([0x99]);
            hasher.update(length.to_be_bytes());
            hasher.update(primary_body);
            Ok(Fingerprint::V4(hasher.finalize().into()))
        }
        6 => {
            let length = u32::try_from(primary_body.len())
                .map_err(|_| AssembleError::OversizedKeyPacket(primary_body.len()))?;
            let mut hasher = Sha256::new();
            hasher.update([0x9B]);
            hasher.update(length.to_be_bytes());
            hasher.update(primary_body);
            Ok(Fingerprint::V6(hasher.finalize().into()))
        }
        other => Err(AssembleError::UnsupportedKeyVersion(other)),
    }
}

/// Where a signature packet attaches while assembling a key.
#[derive(Clone, Copy)]
enum AttachTarget {
    Key,
    LastUserId,
}

struct KeyBuilder {
    primary: RawPacket,
    subkeys: Vec<RawPacket>,
    user_ids: Vec<UserId>,
    user_attributes: Vec<RawPacket>,
    signatures: Vec<Signature>,
    fingerprint: Fingerprint,
    target: AttachTarget,
}

impl KeyBuilder {
    fn new(primary: RawPacket) -> Result<Self, AssembleError> {
        let fingerprint = compute_fingerprint(primary.body())?;
        Ok(Self {
            primary,
            subkeys: Vec::new(),
            user_ids: Vec::new(),
            user_attributes: Vec::new(),
            signatures: Vec::new(),
            fingerprint,
            target: AttachTarget::Key,
        })
    }

    fn attach_signature(&mut self, signature: Signature) {
        match self.target {
            AttachTarget::LastUserId => {
                if let Some(user_id) = self.user_ids.last_mut() {
                    user_id.signatures.push(signature);
                } else {
                    self.signatures.push(signature);
                }
            }
            AttachTarget::Key => self.signatures.push(signature),
        }
    }

    fn finish(self) -> Key {
        Key {
            primary: self.primary,
            subkeys: self.subkeys,
            user_ids: self.user_ids,
            user_attributes: self.user_attributes,
            signatures: self.signatures,
            fingerprint: self.fingerprint,
        }
    }
}

/// Groups a flat packet sequence into keys.
///
/// A public-key or secret-key packet opens a new key; subsequent subkey,
/// user ID, user attribute and signature packets attach to the most
/// recently opened key until the next primary packet. Signatures
/// directly following a user ID certify that user ID; all others attach
/// at key level. Does not validate cryptographic correctness of
/// signatures, only structural grouping.
pub fn assemble_keys(packets: Vec<RawPacket>) -> Result<Vec<Key>, AssembleError> {
    let mut keys = Vec::new();
    let mut current: Option<KeyBuilder> = None;

    for packet in packets {
        if packet.tag().is_primary() {
            if let Some(finished) = current.take() {
                keys.push(finished.finish());
            }
            current = Some(KeyBuilder::new(packet)?);
            continue;
        }

        let Some(builder) = current.as_mut() else {
            return Err(AssembleError::OrphanPacket(packet.tag()));
        };
        match packet.tag() {
            PacketTag::PublicSubkey | PacketTag::SecretSubkey => {
                builder.subkeys.push(packet);
                builder.target = AttachTarget::Key;
            }
            PacketTag::UserId => {
                builder.user_ids.push(UserId::from_packet(packet));
                builder.target = AttachTarget::LastUserId;
            }
            PacketTag::UserAttribute => {
                builder.user_attributes.push(packet);
                builder.target = AttachTarget::Key;
            }
            PacketTag::Signature => {
                builder.attach_signature(Signature::from_packet(packet));
            }
            // Primary tags are handled above.
            PacketTag::PublicKey | PacketTag::SecretKey => {}
        }
    }

    if let Some(finished) = current.take() {
        keys.push(finished.finish());
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary_packet(version: u8, algorithm: u8) -> RawPacket {
        // Version, four-octet creation time, algorithm octet. v6 keys
        // add a four-octet key material length before the material.
        let mut body = vec![version, 0x60, 0x00, 0x00, 0x00, algorithm];
        if version == 6 {
            body.extend_from_slice(&4_u32.to_be_bytes());
        }
        body.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        RawPacket::new(PacketTag::PublicKey, body)
    }

    fn user_id_packet(text: &str) -> RawPacket {
        RawPacket::new(PacketTag::UserId, text.as_bytes().to_vec())
    }

    fn signature_packet(signature_type: u8) -> RawPacket {
        // Minimal v4 signature: version, type, public-key algorithm,
        // hash algorithm, empty hashed and unhashed areas.
        RawPacket::new(
            PacketTag::Signature,
            vec![4, signature_type, 1, 8, 0, 0, 0, 0],
        )
    }

    #[test]
    fn assemble_groups_packets_behind_the_primary() {
        let packets = vec![
            primary_packet(4, 1),
            signature_packet(0x1F),
            user_id_packet("alice"),
            signature_packet(0x13),
            RawPacket::new(PacketTag::PublicSubkey, vec![4, 0, 0, 0, 0, 1]),
            signature_packet(0x18),
        ];
        let keys = assemble_keys(packets).expect("Failed to assemble");
        assert_eq!(keys.len(), 1);

        let key = &keys[0];
        assert_eq!(key.user_ids().len(), 1);
        assert_eq!(key.user_ids()[0].text(), "alice");
        assert_eq!(key.user_ids()[0].signatures().len(), 1);
        assert_eq!(
            key.user_ids()[0].signatures()[0].signature_type(),
            SignatureType::PositiveCertification
        );
        assert_eq!(key.subkeys().len(), 1);
        // The direct-key and subkey binding signatures are key-level.
        assert_eq!(key.signatures().len(), 2);
    }

    #[test]
    fn assemble_splits_on_each_primary() {
        let packets = vec![
            primary_packet(4, 1),
            user_id_packet("alice"),
            primary_packet(4, 17),
            user_id_packet("bob"),
        ];
        let keys = assemble_keys(packets).expect("Failed to assemble");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].user_ids()[0].text(), "alice");
        assert_eq!(keys[1].user_ids()[0].text(), "bob");
    }

    #[test]
    fn orphan_packet_before_any_primary_fails() {
        let packets = vec![user_id_packet("orphan"), primary_packet(4, 1)];
        let result = assemble_keys(packets);
        assert!(matches!(
            result,
            Err(AssembleError::OrphanPacket(PacketTag::UserId))
        ));
    }

    #[test]
    fn legacy_key_version_fails() {
        let packets = vec![primary_packet(3, 1)];
        let result = assemble_keys(packets);
        assert!(matches!(
            result,
            Err(AssembleError::UnsupportedKeyVersion(3))
        ));
    }

    #[test]
    fn fingerprint_lengths_match_key_versions() {
        let v4 = assemble_keys(vec![primary_packet(4, 1)]).expect("Failed to assemble");
        assert_eq!(v4[0].fingerprint().as_bytes().len(), 20);

        let v6 = assemble_keys(vec![primary_packet(6, 27)]).expect("Failed to assemble");
        assert_eq!(v6[0].fingerprint().as_bytes().len(), 32);
    }

    #[test]
    fn fingerprint_is_a_pure_function_of_the_primary_body() {
        let with_user_id = assemble_keys(vec![primary_packet(4, 1), user_id_packet("alice")])
            .expect("Failed to assemble");
        let bare = assemble_keys(vec![primary_packet(4, 1)]).expect("Failed to assemble");
        assert_eq!(with_user_id[0].fingerprint(), bare[0].fingerprint());
    }

    #[test]
    fn serialization_preserves_every_packet() {
        let packets = vec![
            primary_packet(4, 1),
            user_id_packet("alice"),
            signature_packet(0x13),
            RawPacket::new(PacketTag::UserAttribute, vec![0x01]),
            RawPacket::new(PacketTag::PublicSubkey, vec![4, 0, 0, 0, 0, 1]),
        ];
        let keys = assemble_keys(packets.clone()).expect("Failed to assemble");
        assert_eq!(keys[0].packets().count(), packets.len());

        let reparsed = crate::decode_packets(&keys[0].to_bytes()).expect("Failed to re-decode");
        let reassembled = assemble_keys(reparsed).expect("Failed to re-assemble");
        assert_eq!(reassembled, keys);
    }

    #[test]
    fn issuer_fingerprint_subpacket_is_extracted() {
        let fingerprint = [0xAA_u8; 20];
        // Hashed area holds one issuer fingerprint subpacket: a length
        // octet plus 22 data bytes (type, key version, fingerprint).
        let mut body = vec![4, 0x13, 1, 8, 0, 23];
        body.push(22);
        body.push(33);
        body.push(4);
        body.extend_from_slice(&fingerprint);
        // Empty unhashed area.
        body.extend_from_slice(&[0, 0]);

        let signature = Signature::from_packet(RawPacket::new(PacketTag::Signature, body));
        assert_eq!(signature.issuer_fingerprint(), Some(&fingerprint[..]));
    }

    #[test]
    fn signature_without_issuer_subpacket_has_no_issuer() {
        let signature = Signature::from_packet(signature_packet(0x13));
        assert_eq!(signature.issuer_fingerprint(), None);
    }
}
