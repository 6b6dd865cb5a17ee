use std::fmt::{self, Display};

use crate::{armor, FingerprintError};

/// Possible encodings of `OpenPGP` key data.
///
/// The data is either armored i.e., base64 encoded with a header
/// -----BEGIN PGP ... -----
/// ...
/// -----END PGP ... -----
/// or encoded as raw bytes.
/// Auto is used to indicate that the encoding is unknown and should be
/// detected automatically.
#[derive(Default, PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum DataEncoding {
    /// The data is armored.
    #[default]
    Armored,
    /// The data is encoded as raw bytes.
    Unarmored,
    /// Try to detect the encoding automatically.
    ///
    /// On read:
    /// - Tries to detect the encoding (armored or unarmored) automatically.
    ///
    /// On write:
    /// - Auto will be resolved to [`DataEncoding::default`].
    Auto,
}

impl DataEncoding {
    pub fn is_armor(&self) -> bool {
        *self == DataEncoding::Armored
    }

    pub(crate) fn resolve_for_read(self, data: &[u8]) -> ResolvedDataEncoding {
        match self {
            DataEncoding::Armored => ResolvedDataEncoding::Armored,
            DataEncoding::Unarmored => ResolvedDataEncoding::Unarmored,
            DataEncoding::Auto => armor::detect_encoding(data),
        }
    }

    pub(crate) fn resolve_for_write(self) -> ResolvedDataEncoding {
        match self {
            DataEncoding::Armored => ResolvedDataEncoding::Armored,
            DataEncoding::Unarmored => ResolvedDataEncoding::Unarmored,
            DataEncoding::Auto => match DataEncoding::default() {
                DataEncoding::Armored => ResolvedDataEncoding::Armored,
                _ => ResolvedDataEncoding::Unarmored,
            },
        }
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ResolvedDataEncoding {
    /// The data is armored.
    Armored,
    /// The data is encoded as raw bytes.
    Unarmored,
}

impl From<ResolvedDataEncoding> for DataEncoding {
    fn from(value: ResolvedDataEncoding) -> Self {
        match value {
            ResolvedDataEncoding::Armored => DataEncoding::Armored,
            ResolvedDataEncoding::Unarmored => DataEncoding::Unarmored,
        }
    }
}

/// A fingerprint of an `OpenPGP` primary key.
///
/// The fingerprint is a pure function of the primary key packet body:
/// SHA-1 for v4 keys and SHA-256 for v6 keys.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Fingerprint {
    V4([u8; 20]),
    V6([u8; 32]),
}

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Fingerprint::V4(bytes) => bytes,
            Fingerprint::V6(bytes) => bytes,
        }
    }

    /// The key version the fingerprint was derived for.
    pub fn version(&self) -> u8 {
        match self {
            Fingerprint::V4(_) => 4,
            Fingerprint::V6(_) => 6,
        }
    }

    pub fn from_hex(hex: &str) -> Result<Self, FingerprintError> {
        let bytes = hex::decode(hex)?;
        match bytes.len() {
            20 => {
                let mut raw_fp = [0_u8; 20];
                raw_fp.copy_from_slice(&bytes);
                Ok(Fingerprint::V4(raw_fp))
            }
            32 => {
                let mut raw_fp = [0_u8; 32];
                raw_fp.copy_from_slice(&bytes);
                Ok(Fingerprint::V6(raw_fp))
            }
            len => Err(FingerprintError::InvalidLength(len)),
        }
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}
