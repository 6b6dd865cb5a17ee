use std::{fs, path::Path};

use log::{debug, warn};

use crate::{
    armor, assemble_keys, decode_packets, validate_key, ArmorError, DataEncoding, IngestError, Key,
    KeyRejection, ResolvedDataEncoding,
};

/// Reads every `OpenPGP` key out of an armored text.
///
/// The text must be ASCII-encodable and contain one or more armor
/// blocks. Every key in the input must pass the supported check:
/// ingestion is all-or-nothing, so a single invalid key discards all
/// results.
///
/// Stateless and reentrant; the same input always yields the same
/// output.
pub fn keys_from_string(text: &str) -> crate::Result<Vec<Key>> {
    if !text.is_ascii() {
        warn!("key text is not ASCII-encodable");
        return Err(ArmorError::NotAscii.into());
    }
    keys_from_bytes(text.as_bytes(), DataEncoding::Auto)
}

/// Reads every `OpenPGP` key out of a file with armored or binary key
/// data.
///
/// Fails with [`IngestError::Io`] when the path cannot be read;
/// otherwise behaves like [`keys_from_string`].
pub fn keys_from_path(path: impl AsRef<Path>) -> crate::Result<Vec<Key>> {
    let bytes = fs::read(path.as_ref())?;
    keys_from_bytes(&bytes, DataEncoding::Auto)
}

/// Reads every `OpenPGP` key out of a byte buffer.
///
/// Runs the full pipeline: optional de-armoring, packet decoding, key
/// assembly and the per-key supported check. Internal errors are logged
/// and collapsed into the coarse [`IngestError`] classification.
pub fn keys_from_bytes(bytes: &[u8], encoding: DataEncoding) -> crate::Result<Vec<Key>> {
    let binary = match encoding.resolve_for_read(bytes) {
        ResolvedDataEncoding::Armored => {
            let text = std::str::from_utf8(bytes).map_err(|_| ArmorError::NotAscii)?;
            armor::unarmor(text).map_err(|err| {
                warn!("failed to unarmor input: {err}");
                err
            })?
        }
        ResolvedDataEncoding::Unarmored => bytes.to_vec(),
    };

    let packets = decode_packets(&binary).map_err(|err| {
        warn!("failed to decode packet stream: {err}");
        err
    })?;
    let keys = assemble_keys(packets).map_err(|err| {
        warn!("failed to assemble keys: {err}");
        IngestError::KeyNotSupported(KeyRejection::Grouping(err))
    })?;

    for key in &keys {
        validate_key(key).map_err(|err| {
            warn!(
                "key {} failed the supported check: {err}",
                key.fingerprint()
            );
            IngestError::KeyNotSupported(KeyRejection::Validation(err))
        })?;
    }

    debug!("ingested {} keys", keys.len());
    Ok(keys)
}
