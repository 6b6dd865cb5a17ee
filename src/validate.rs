use crate::{assemble_keys, decode_packets, Key, KeyNotSupportedError};

/// Checks that a key is structurally supported.
///
/// Mirrors an export-only probe: the key is re-serialized and re-parsed
/// purely to detect unsupported material, and the exported bytes are
/// discarded. A key is rejected when its primary public-key algorithm is
/// outside the supported set, or when the export round-trip fails to
/// re-parse into an equivalent key.
///
/// Equivalence is structural (tag and body per packet), not
/// byte-identical framing, so re-framed packets still validate.
pub fn validate_key(key: &Key) -> Result<(), KeyNotSupportedError> {
    let algorithm = public_key_algorithm(key.primary().body())
        .ok_or(KeyNotSupportedError::MissingAlgorithm)?;
    if !algorithm_supported(algorithm) {
        return Err(KeyNotSupportedError::UnsupportedAlgorithm(algorithm));
    }

    let exported = key.to_bytes();
    let packets = decode_packets(&exported)?;
    let mut keys = assemble_keys(packets)?;
    if keys.len() != 1 {
        return Err(KeyNotSupportedError::RoundTripCount(keys.len()));
    }
    let reparsed = keys.remove(0);
    if reparsed != *key {
        return Err(KeyNotSupportedError::RoundTripMismatch);
    }
    Ok(())
}

/// Reads the public-key algorithm octet out of a key packet body.
///
/// The octet follows the version and creation time: offset 5 for v4 and
/// v6 keys, offset 7 for the legacy v2/v3 layout with its two-octet
/// validity period.
fn public_key_algorithm(body: &[u8]) -> Option<u8> {
    match body.first()? {
        2 | 3 => body.get(7).copied(),
        4 | 6 => body.get(5).copied(),
        _ => None,
    }
}

/// The supported public-key algorithm ids, RFC 4880 section 9.1 and
/// RFC 9580 section 9.1.
///
/// Experimental (100..=110), reserved and unknown ids are rejected.
fn algorithm_supported(id: u8) -> bool {
    const RSA: u8 = 1;
    const RSA_ENCRYPT_ONLY: u8 = 2;
    const RSA_SIGN_ONLY: u8 = 3;
    const ELGAMAL: u8 = 16;
    const DSA: u8 = 17;
    const ECDH: u8 = 18;
    const ECDSA: u8 = 19;
    const EDDSA_LEGACY: u8 = 22;
    const X25519: u8 = 25;
    const X448: u8 = 26;
    const ED25519: u8 = 27;
    const ED448: u8 = 28;

    matches!(
        id,
        RSA | RSA_ENCRYPT_ONLY
            | RSA_SIGN_ONLY
            | ELGAMAL
            | DSA
            | ECDH
            | ECDSA
            | EDDSA_LEGACY
            | X25519
            | X448
            | ED25519
            | ED448
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PacketTag, RawPacket};

    fn key_with_algorithm(algorithm: u8) -> Key {
        let body = vec![4, 0x60, 0x00, 0x00, 0x00, algorithm, 0x01, 0x02];
        let packets = vec![
            RawPacket::new(PacketTag::PublicKey, body),
            RawPacket::new(PacketTag::UserId, b"alice".to_vec()),
        ];
        assemble_keys(packets)
            .expect("Failed to assemble")
            .remove(0)
    }

    #[test]
    fn rsa_key_validates() {
        let key = key_with_algorithm(1);
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn ed25519_key_validates() {
        let key = key_with_algorithm(27);
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn experimental_algorithm_is_rejected() {
        let key = key_with_algorithm(100);
        assert!(matches!(
            validate_key(&key),
            Err(KeyNotSupportedError::UnsupportedAlgorithm(100))
        ));
    }

    #[test]
    fn reserved_algorithm_is_rejected() {
        let key = key_with_algorithm(0);
        assert!(matches!(
            validate_key(&key),
            Err(KeyNotSupportedError::UnsupportedAlgorithm(0))
        ));
    }

    #[test]
    fn truncated_key_body_is_rejected() {
        let packets = vec![RawPacket::new(PacketTag::PublicKey, vec![4, 0x60, 0x00])];
        let key = assemble_keys(packets)
            .expect("Failed to assemble")
            .remove(0);
        assert!(matches!(
            validate_key(&key),
            Err(KeyNotSupportedError::MissingAlgorithm)
        ));
    }
}
